//! Construction of erased values, shared by every storage policy.

use core::alloc::Layout;
use core::marker::PhantomData;

use polystore_internals::{
    CapacityError, RawInline, RawValue, alignment::Alignment, handlers::ValueHandler,
    wrapper_layout,
};

/// Builds erased values for the storage policies, with the behavior of
/// handler `H` captured in the vtable.
///
/// The builder is the single place where a concrete value type meets its
/// handler. The policies delegate construction here, so the capacity and
/// alignment arithmetic lives in one spot.
///
/// Most code never names this type; it goes through
/// [`Storage::new`](crate::Storage::new) instead. It is public for callers
/// that want to precompute fit decisions, e.g. to pick a policy at compile
/// time.
///
/// # Examples
///
/// ```
/// use polystore::{Builder, Inert, alignment::Align16};
///
/// // A u64 payload fits a 64-byte slot together with its vtable pointer.
/// assert!(Builder::<Inert>::fits::<u64, 64, Align16>());
/// assert!(Builder::<Inert>::required_capacity::<u64>() <= 64);
/// ```
#[derive(Debug, Clone, Copy)]
pub struct Builder<H> {
    /// The handler whose behavior is baked into built values.
    _handler: PhantomData<fn() -> H>,
}

impl<H: 'static> Builder<H> {
    /// Moves the value into a fresh heap allocation and erases its type.
    #[must_use]
    pub fn build<V>(value: V) -> RawValue
    where
        V: Clone + 'static,
        H: ValueHandler<V>,
    {
        RawValue::new::<V, H>(value)
    }

    /// Moves the value into a fresh inline slot and erases its type.
    ///
    /// A value whose wrapper exceeds the capacity or alignment of the slot
    /// is rejected at compile time.
    #[must_use]
    pub fn build_inline<V, const N: usize, A>(value: V) -> RawInline<N, A>
    where
        V: Clone + 'static,
        H: ValueHandler<V>,
        A: Alignment,
    {
        RawInline::new::<V, H>(value)
    }

    /// Moves the value into a fresh inline slot, or returns it untouched if
    /// its wrapper does not fit.
    pub fn try_build_inline<V, const N: usize, A>(
        value: V,
    ) -> Result<RawInline<N, A>, (V, CapacityError)>
    where
        V: Clone + 'static,
        H: ValueHandler<V>,
        A: Alignment,
    {
        RawInline::try_new::<V, H>(value)
    }

    /// Layout of the erased wrapper built for a value of type `V`.
    ///
    /// This includes the vtable pointer, so it is what a slot's capacity
    /// must cover.
    #[must_use]
    pub const fn layout_of<V: 'static>() -> Layout {
        wrapper_layout::<V>()
    }

    /// Bytes of inline capacity needed to store a value of type `V`.
    #[must_use]
    pub const fn required_capacity<V: 'static>() -> usize {
        wrapper_layout::<V>().size()
    }

    /// Whether a value of type `V` fits an inline slot of capacity `N`
    /// aligned to `A`.
    #[must_use]
    pub const fn fits<V: 'static, const N: usize, A: Alignment>() -> bool {
        let layout = wrapper_layout::<V>();
        layout.size() <= N && layout.align() <= core::mem::align_of::<A>()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handlers::Inert;
    use polystore_internals::alignment::{Align16, Align1};

    #[test]
    fn capacity_covers_the_vtable_pointer() {
        assert!(Builder::<Inert>::required_capacity::<u8>() > 1);
        assert_eq!(
            Builder::<Inert>::layout_of::<u8>().size(),
            Builder::<Inert>::required_capacity::<u8>()
        );
    }

    #[test]
    fn fit_accounts_for_alignment() {
        assert!(Builder::<Inert>::fits::<u64, 64, Align16>());
        assert!(!Builder::<Inert>::fits::<u64, 64, Align1>());
        assert!(!Builder::<Inert>::fits::<[u64; 32], 64, Align16>());
    }
}
