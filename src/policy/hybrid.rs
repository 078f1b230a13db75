//! Storage policy with an inline buffer and heap fallback.

use core::marker::PhantomData;

use polystore_internals::{
    RawInline, RawValue, RawValueRef,
    alignment::{Align16, Alignment},
    handlers::ValueHandler,
};

use crate::{
    builder::Builder,
    handlers::Invoke,
    policy::{Construct, Policy},
};

/// Where a [`Hybrid`] payload currently lives.
pub(crate) enum Repr<const N: usize, A: Alignment> {
    /// The payload fits the buffer and lives inside the handle.
    Inline(RawInline<N, A>),
    /// The payload is too large for the buffer and lives on the heap.
    Boxed(RawValue),
}

impl<const N: usize, A: Alignment> Repr<N, A> {
    /// Returns a borrowed erased view of the payload, wherever it lives.
    fn as_ref(&self) -> RawValueRef<'_> {
        match self {
            Repr::Inline(slot) => slot.as_ref(),
            Repr::Boxed(raw) => raw.as_ref(),
        }
    }

    /// Returns a mutable reference to the payload if it is a `V`.
    fn downcast_mut<V: 'static>(&mut self) -> Option<&mut V> {
        match self {
            Repr::Inline(slot) => slot.downcast_mut::<V>(),
            Repr::Boxed(raw) => raw.downcast_mut::<V>(),
        }
    }

    /// Moves the payload onto the heap, wherever it currently lives.
    pub(crate) fn into_raw_value(self) -> RawValue {
        match self {
            Repr::Inline(slot) => slot.into_heap(),
            Repr::Boxed(raw) => raw,
        }
    }

    /// Moves a payload from a representation of a different capacity into
    /// this one, preferring the buffer and falling back to the heap.
    ///
    /// This cannot fail: a payload that does not fit the buffer goes to (or
    /// stays on) the heap.
    pub(crate) fn rehome<const M: usize>(src: Repr<M, A>) -> Self {
        match src {
            Repr::Inline(slot) => match RawInline::<N, A>::try_from_other(slot) {
                Ok(slot) => Repr::Inline(slot),
                Err((slot, _)) => Repr::Boxed(slot.into_heap()),
            },
            Repr::Boxed(raw) => match RawInline::<N, A>::try_from_heap(raw) {
                Ok(slot) => Repr::Inline(slot),
                Err((raw, _)) => Repr::Boxed(raw),
            },
        }
    }
}

/// Storage policy keeping small values in a buffer inside the handle and
/// spilling large ones to the heap.
///
/// Construction stores the value inline when its erased wrapper fits `N`
/// bytes aligned to `A`, and heap-allocates otherwise, so any value can be
/// stored regardless of the capacity. Operations that move payloads between
/// handles keep this rule: an incoming payload lands in the buffer exactly
/// when it fits.
///
/// Swaps between hybrids always succeed, whatever the two capacities and
/// however the payloads are currently placed. Swaps with an [`OnStack`]
/// handle can fail, because that side has no heap to fall back to.
///
/// [`OnStack`]: crate::OnStack
///
/// # Examples
///
/// ```
/// use polystore::{Hybrid, Inert, Storage};
///
/// let small: Storage<Hybrid<Inert, 64>> = Storage::new(7_u32);
/// let large: Storage<Hybrid<Inert, 64>> = Storage::new([0_u64; 32]);
///
/// assert!(small.policy().is_inline());
/// assert!(!large.policy().is_inline());
/// ```
pub struct Hybrid<H = Invoke, const N: usize = 128, A: Alignment = Align16> {
    /// The payload, inline or spilled.
    repr: Repr<N, A>,
    /// The handler baked into values built by this policy.
    _handler: PhantomData<fn() -> H>,
}

impl<H: 'static, const N: usize, A: Alignment> Hybrid<H, N, A> {
    /// Capacity of the handle's buffer in bytes.
    pub const CAPACITY: usize = N;

    /// Moves the value into a fresh handle, storing it inline if it fits
    /// and on the heap otherwise.
    pub fn new<V>(value: V) -> Self
    where
        V: Clone + 'static,
        H: ValueHandler<V>,
    {
        let repr = match Builder::<H>::try_build_inline(value) {
            Ok(slot) => Repr::Inline(slot),
            Err((value, _)) => Repr::Boxed(Builder::<H>::build(value)),
        };
        Self::from_repr(repr)
    }

    /// Whether the payload currently lives in the handle's buffer.
    #[must_use]
    pub fn is_inline(&self) -> bool {
        matches!(self.repr, Repr::Inline(_))
    }

    /// Wraps an already-placed payload.
    pub(crate) fn from_repr(repr: Repr<N, A>) -> Self {
        Self {
            repr,
            _handler: PhantomData,
        }
    }

    /// Exclusive access to the payload placement, for the swap machinery.
    pub(crate) fn repr_mut(&mut self) -> &mut Repr<N, A> {
        &mut self.repr
    }

    /// Unwraps the payload placement.
    pub(crate) fn into_repr(self) -> Repr<N, A> {
        self.repr
    }

    /// Forces the payload onto the heap and returns exclusive access to it.
    ///
    /// After this returns, the handle is in the spilled state until a later
    /// operation pulls the payload back in.
    pub(crate) fn spill_mut(&mut self) -> &mut RawValue {
        if matches!(self.repr, Repr::Inline(_)) {
            // SAFETY: The placement is duplicated only across the
            // `into_raw_value` call, which cannot unwind; the write below
            // restores unique ownership.
            let repr = unsafe { core::ptr::read(&self.repr) };
            let raw = repr.into_raw_value();
            // SAFETY: Overwrites the duplicated placement without dropping
            // it, restoring unique ownership.
            unsafe { core::ptr::write(&mut self.repr, Repr::Boxed(raw)) };
        }
        match &mut self.repr {
            Repr::Boxed(raw) => raw,
            // The payload was just spilled
            Repr::Inline(_) => unreachable!(),
        }
    }

    /// Pulls a spilled payload back into the buffer if it fits.
    ///
    /// Restores the placement rule after an operation that parked a small
    /// payload on the heap.
    pub(crate) fn normalize(&mut self) {
        let fits = match &self.repr {
            Repr::Boxed(raw) => RawInline::<N, A>::fits(raw.as_ref().layout()),
            Repr::Inline(_) => return,
        };
        if !fits {
            return;
        }
        // SAFETY: The placement is duplicated only across the `rehome`
        // call, which cannot unwind; the write below restores unique
        // ownership.
        let repr = unsafe { core::ptr::read(&self.repr) };
        let repr = Repr::rehome(repr);
        // SAFETY: Overwrites the duplicated placement without dropping it,
        // restoring unique ownership.
        unsafe { core::ptr::write(&mut self.repr, repr) };
    }

    /// Exchanges the payloads of two hybrid handles of possibly different
    /// capacities.
    ///
    /// This cannot fail: each payload lands inline in its new handle when
    /// it fits and on the heap otherwise. Two spilled payloads are swapped
    /// by pointer; two inline payloads that fit each other's buffers are
    /// relocated without allocation. Only the mixed cases may allocate.
    pub fn swap<const M: usize>(&mut self, other: &mut Hybrid<H, M, A>) {
        match (&mut self.repr, &mut other.repr) {
            (Repr::Boxed(a), Repr::Boxed(b)) => return core::mem::swap(a, b),
            (Repr::Inline(a), Repr::Inline(b)) => {
                if a.try_swap(b).is_ok() {
                    return;
                }
            }
            _ => {}
        }

        // General path: move both payloads out by value and re-home each in
        // the opposite handle.
        // SAFETY: Both placements are duplicated; the `rehome` calls cannot
        // unwind, and the writes below restore unique ownership of both.
        let a = unsafe { core::ptr::read(&self.repr) };
        // SAFETY: As above.
        let b = unsafe { core::ptr::read(&other.repr) };
        // SAFETY: Overwrites the duplicated placement without dropping it.
        unsafe { core::ptr::write(&mut self.repr, Repr::rehome(b)) };
        // SAFETY: Overwrites the duplicated placement without dropping it.
        unsafe { core::ptr::write(&mut other.repr, Repr::rehome(a)) };
    }

    /// Relocates the payload into a handle of a different capacity.
    ///
    /// This cannot fail; the payload's placement is re-decided against the
    /// new capacity.
    #[must_use]
    pub fn resize<const M: usize>(self) -> Hybrid<H, M, A> {
        Hybrid::from_repr(Repr::rehome(self.into_repr()))
    }
}

impl<H: 'static, const N: usize, A: Alignment> Policy for Hybrid<H, N, A> {
    #[inline]
    fn as_raw(&self) -> RawValueRef<'_> {
        self.repr.as_ref()
    }

    #[inline]
    fn downcast_mut<V: 'static>(&mut self) -> Option<&mut V> {
        self.repr.downcast_mut::<V>()
    }
}

impl<H: 'static, V, const N: usize, A: Alignment> Construct<V> for Hybrid<H, N, A>
where
    V: Clone + 'static,
    H: ValueHandler<V>,
{
    fn construct(value: V) -> Self {
        Self::new(value)
    }
}

impl<H: 'static, const N: usize, A: Alignment> Clone for Hybrid<H, N, A> {
    /// Deep-clones the payload through its vtable, preserving its placement.
    ///
    /// A payload small enough for the buffer was stored inline, so the
    /// clone's placement also follows the placement rule.
    fn clone(&self) -> Self {
        let repr = match &self.repr {
            Repr::Inline(slot) => Repr::Inline(slot.clone()),
            Repr::Boxed(raw) => Repr::Boxed(raw.as_ref().clone_boxed()),
        };
        Self::from_repr(repr)
    }
}

impl<H: 'static, const N: usize, A: Alignment> core::fmt::Debug for Hybrid<H, N, A> {
    fn fmt(&self, formatter: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let placement = if self.is_inline() { "inline" } else { "boxed" };
        formatter
            .debug_struct("Hybrid")
            .field("placement", &placement)
            .field("value", &crate::policy::debug_value(self))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handlers::Inert;
    use alloc::string::String;

    #[test]
    fn construction_places_by_fit() {
        let small = Hybrid::<Inert, 64>::new(7_u32);
        assert!(small.is_inline());

        let large = Hybrid::<Inert, 64>::new([0_u64; 32]);
        assert!(!large.is_inline());
        assert_eq!(large.as_raw().downcast_ref::<[u64; 32]>(), Some(&[0; 32]));
    }

    #[test]
    fn clone_preserves_placement() {
        let small = Hybrid::<Inert, 64>::new(String::from("s"));
        let clone = small.clone();
        assert!(clone.is_inline());
        assert_eq!(clone.as_raw().downcast_ref::<String>(), Some(&String::from("s")));

        let large = Hybrid::<Inert, 64>::new([1_u64; 32]);
        let clone = large.clone();
        assert!(!clone.is_inline());
        assert_eq!(clone.as_raw().downcast_ref::<[u64; 32]>(), Some(&[1; 32]));
    }

    #[test]
    fn swap_crosses_placements() {
        let mut small = Hybrid::<Inert, 64>::new(7_u32);
        let mut large = Hybrid::<Inert, 64>::new([9_u64; 32]);

        small.swap(&mut large);
        assert!(!small.is_inline());
        assert!(large.is_inline());
        assert_eq!(small.as_raw().downcast_ref::<[u64; 32]>(), Some(&[9; 32]));
        assert_eq!(large.as_raw().downcast_ref::<u32>(), Some(&7));
    }

    #[test]
    fn swap_crosses_capacities() {
        // Fits 128 but not 32.
        let mut wide = Hybrid::<Inert, 128>::new([1_u64; 8]);
        let mut narrow = Hybrid::<Inert, 32>::new(2_u32);

        wide.swap(&mut narrow);
        assert!(wide.is_inline());
        assert!(!narrow.is_inline());
        assert_eq!(wide.as_raw().downcast_ref::<u32>(), Some(&2));
        assert_eq!(narrow.as_raw().downcast_ref::<[u64; 8]>(), Some(&[1; 8]));
    }

    #[test]
    fn resize_redecides_placement() {
        let spilled = Hybrid::<Inert, 32>::new([3_u64; 8]);
        assert!(!spilled.is_inline());

        let wide: Hybrid<Inert, 128> = spilled.resize();
        assert!(wide.is_inline());
        assert_eq!(wide.as_raw().downcast_ref::<[u64; 8]>(), Some(&[3; 8]));
    }
}
