//! Storage policy keeping the value inside the handle itself.

use core::marker::PhantomData;

use polystore_internals::{
    CapacityError, RawInline, RawValueRef,
    alignment::{Align16, Alignment},
    handlers::ValueHandler,
};

use crate::{
    builder::Builder,
    handlers::Invoke,
    policy::{Construct, Policy},
};

/// Storage policy keeping the value in a fixed-capacity buffer inside the
/// handle.
///
/// The handle provides `N` bytes aligned to the marker type `A`;
/// construction never allocates. A value whose erased wrapper does not fit
/// those bounds is rejected at compile time, so a live handle always holds
/// a fitting payload.
///
/// Handles of different capacities interoperate: swaps and transfers
/// between them are checked at runtime in both directions and fail without
/// side effects.
///
/// # Examples
///
/// ```
/// use polystore::{Inert, OnStack, Storage};
///
/// let handle: Storage<OnStack<Inert, 64>> = Storage::new([1_u64, 2, 3]);
/// assert_eq!(handle.downcast_ref::<[u64; 3]>(), Some(&[1, 2, 3]));
/// ```
pub struct OnStack<H = Invoke, const N: usize = 128, A: Alignment = Align16> {
    /// The inline slot holding the erased value.
    slot: RawInline<N, A>,
    /// The handler baked into values built by this policy.
    _handler: PhantomData<fn() -> H>,
}

impl<H: 'static, const N: usize, A: Alignment> OnStack<H, N, A> {
    /// Capacity of the handle's buffer in bytes.
    pub const CAPACITY: usize = N;

    /// Moves the value into a fresh buffer-backed handle.
    ///
    /// A value whose erased wrapper exceeds `N` bytes or requires stricter
    /// alignment than `A` fails to compile:
    ///
    /// ```compile_fail
    /// use polystore::{Inert, OnStack};
    ///
    /// // A 256-byte payload can never enter a 64-byte buffer.
    /// let handle = OnStack::<Inert, 64>::new([0_u8; 256]);
    /// ```
    pub fn new<V>(value: V) -> Self
    where
        V: Clone + 'static,
        H: ValueHandler<V>,
    {
        Self::from_slot(Builder::<H>::build_inline(value))
    }

    /// Wraps an already-filled inline slot.
    pub(crate) fn from_slot(slot: RawInline<N, A>) -> Self {
        Self {
            slot,
            _handler: PhantomData,
        }
    }

    /// Exclusive access to the underlying slot, for the swap machinery.
    pub(crate) fn slot_mut(&mut self) -> &mut RawInline<N, A> {
        &mut self.slot
    }

    /// Unwraps the underlying slot.
    pub(crate) fn into_slot(self) -> RawInline<N, A> {
        self.slot
    }

    /// Exchanges the payloads of two handles of the same capacity.
    ///
    /// The payloads are relocated through a stack temporary; no allocation
    /// happens.
    pub fn swap(&mut self, other: &mut Self) {
        match self.slot.try_swap(&mut other.slot) {
            Ok(()) => {}
            // Both payloads fit this capacity already, so a same-capacity
            // exchange cannot be rejected.
            Err(_) => unreachable!(),
        }
    }

    /// Exchanges the payloads of two handles of possibly different
    /// capacities.
    ///
    /// Fails without mutating either handle unless each payload fits the
    /// other buffer.
    pub fn try_swap<const M: usize>(
        &mut self,
        other: &mut OnStack<H, M, A>,
    ) -> Result<(), CapacityError> {
        self.slot.try_swap(&mut other.slot)
    }

    /// Relocates the payload into a handle of a different capacity, or
    /// returns the handle untouched if the payload does not fit.
    pub fn try_resize<const M: usize>(self) -> Result<OnStack<H, M, A>, (Self, CapacityError)> {
        match RawInline::<M, A>::try_from_other(self.into_slot()) {
            Ok(slot) => Ok(OnStack::from_slot(slot)),
            Err((slot, err)) => Err((Self::from_slot(slot), err)),
        }
    }
}

impl<H: 'static, const N: usize, A: Alignment> Policy for OnStack<H, N, A> {
    #[inline]
    fn as_raw(&self) -> RawValueRef<'_> {
        self.slot.as_ref()
    }

    #[inline]
    fn downcast_mut<V: 'static>(&mut self) -> Option<&mut V> {
        self.slot.downcast_mut::<V>()
    }
}

impl<H: 'static, V, const N: usize, A: Alignment> Construct<V> for OnStack<H, N, A>
where
    V: Clone + 'static,
    H: ValueHandler<V>,
{
    fn construct(value: V) -> Self {
        Self::new(value)
    }
}

impl<H: 'static, const N: usize, A: Alignment> Clone for OnStack<H, N, A> {
    /// Deep-clones the payload into a fresh buffer through its vtable.
    fn clone(&self) -> Self {
        Self::from_slot(self.slot.clone())
    }
}

impl<H: 'static, const N: usize, A: Alignment> core::fmt::Debug for OnStack<H, N, A> {
    fn fmt(&self, formatter: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        formatter
            .debug_tuple("OnStack")
            .field(&crate::policy::debug_value(self))
            .finish()
    }
}
