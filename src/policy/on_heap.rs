//! Storage policy keeping every value in its own heap allocation.

use core::marker::PhantomData;

use polystore_internals::{RawValue, RawValueRef, handlers::ValueHandler};

use crate::{
    builder::Builder,
    handlers::Invoke,
    policy::{Construct, Policy},
};

/// Storage policy keeping the value in a dedicated heap allocation.
///
/// The handle itself is one pointer wide, so moving and swapping it never
/// touches the payload. Construction and cloning allocate; there is no size
/// limit on the stored value.
///
/// # Examples
///
/// ```
/// use polystore::{Inert, OnHeap, Storage};
///
/// let handle: Storage<OnHeap<Inert>> = Storage::new(String::from("payload"));
/// assert_eq!(handle.downcast_ref::<String>(), Some(&String::from("payload")));
/// ```
pub struct OnHeap<H = Invoke> {
    /// The heap-allocated erased value.
    raw: RawValue,
    /// The handler baked into values built by this policy.
    _handler: PhantomData<fn() -> H>,
}

impl<H: 'static> OnHeap<H> {
    /// Moves the value into a fresh heap-backed handle.
    pub fn new<V>(value: V) -> Self
    where
        V: Clone + 'static,
        H: ValueHandler<V>,
    {
        Self::from_raw(Builder::<H>::build(value))
    }

    /// Wraps an already-erased heap value.
    pub(crate) fn from_raw(raw: RawValue) -> Self {
        Self {
            raw,
            _handler: PhantomData,
        }
    }

    /// Exclusive access to the underlying heap value, for the swap
    /// machinery.
    pub(crate) fn raw_mut(&mut self) -> &mut RawValue {
        &mut self.raw
    }

    /// Unwraps the underlying heap value.
    pub(crate) fn into_raw(self) -> RawValue {
        self.raw
    }

    /// Exchanges the payloads of two heap-backed handles.
    ///
    /// This is a pointer swap; the payloads themselves do not move.
    pub fn swap(&mut self, other: &mut Self) {
        core::mem::swap(&mut self.raw, &mut other.raw);
    }
}

impl<H: 'static> Policy for OnHeap<H> {
    #[inline]
    fn as_raw(&self) -> RawValueRef<'_> {
        self.raw.as_ref()
    }

    #[inline]
    fn downcast_mut<V: 'static>(&mut self) -> Option<&mut V> {
        self.raw.downcast_mut::<V>()
    }
}

impl<H: 'static, V> Construct<V> for OnHeap<H>
where
    V: Clone + 'static,
    H: ValueHandler<V>,
{
    fn construct(value: V) -> Self {
        Self::new(value)
    }
}

impl<H: 'static> Clone for OnHeap<H> {
    /// Deep-clones the payload into a fresh allocation through its vtable.
    fn clone(&self) -> Self {
        Self::from_raw(self.as_raw().clone_boxed())
    }
}

impl<H: 'static> core::fmt::Debug for OnHeap<H> {
    fn fmt(&self, formatter: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        formatter
            .debug_tuple("OnHeap")
            .field(&crate::policy::debug_value(self))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handlers::Inert;
    use alloc::string::String;

    #[test]
    fn handle_is_pointer_sized() {
        assert_eq!(
            core::mem::size_of::<OnHeap<Inert>>(),
            core::mem::size_of::<usize>()
        );
    }

    #[test]
    fn clone_is_deep() {
        let a = OnHeap::<Inert>::new(String::from("deep"));
        let b = a.clone();
        drop(a);
        assert_eq!(b.as_raw().downcast_ref::<String>(), Some(&String::from("deep")));
    }

    #[test]
    fn swap_exchanges_pointers() {
        let mut a = OnHeap::<Inert>::new(1_u32);
        let mut b = OnHeap::<Inert>::new(2_u32);
        a.swap(&mut b);
        assert_eq!(a.as_raw().downcast_ref::<u32>(), Some(&2));
        assert_eq!(b.as_raw().downcast_ref::<u32>(), Some(&1));
    }
}
