//! Conversions moving a payload from one storage policy into another.
//!
//! Directions that cannot fail implement [`From`]: any payload fits on the
//! heap, and any payload fits a [`Hybrid`] thanks to its heap fallback.
//! Every ordered pair of policies additionally implements
//! [`TransferFrom`], the fallible form used by
//! [`Storage::try_transfer`](crate::Storage::try_transfer); on failure the
//! source comes back untouched.

use polystore_internals::{CapacityError, RawInline, alignment::Alignment};

use crate::policy::{Hybrid, OnHeap, OnStack, Repr, TransferFrom};

impl<H: 'static, const N: usize, A: Alignment> From<OnStack<H, N, A>> for OnHeap<H> {
    /// Moves the buffer payload into a fresh heap allocation.
    fn from(src: OnStack<H, N, A>) -> Self {
        OnHeap::from_raw(src.into_slot().into_heap())
    }
}

impl<H: 'static, const N: usize, A: Alignment> From<Hybrid<H, N, A>> for OnHeap<H> {
    /// Reuses the allocation of a spilled payload; promotes an inline one.
    fn from(src: Hybrid<H, N, A>) -> Self {
        OnHeap::from_raw(src.into_repr().into_raw_value())
    }
}

impl<H: 'static, const N: usize, A: Alignment> From<OnHeap<H>> for Hybrid<H, N, A> {
    /// Pulls the payload into the buffer if it fits, keeping the
    /// allocation otherwise.
    fn from(src: OnHeap<H>) -> Self {
        Hybrid::from_repr(Repr::rehome(Repr::<N, A>::Boxed(src.into_raw())))
    }
}

impl<H: 'static, const N: usize, const M: usize, A: Alignment> From<OnStack<H, M, A>>
    for Hybrid<H, N, A>
{
    /// Relocates the payload into the buffer if it fits, spilling it to
    /// the heap otherwise.
    fn from(src: OnStack<H, M, A>) -> Self {
        Hybrid::from_repr(Repr::rehome(Repr::<M, A>::Inline(src.into_slot())))
    }
}

impl<H: 'static> TransferFrom<OnHeap<H>> for OnHeap<H> {
    /// Identity; cannot fail.
    fn transfer_from(src: OnHeap<H>) -> Result<Self, (OnHeap<H>, CapacityError)> {
        Ok(src)
    }
}

impl<H: 'static, const N: usize, A: Alignment> TransferFrom<OnStack<H, N, A>> for OnHeap<H> {
    /// Cannot fail; see the [`From`] impl.
    fn transfer_from(src: OnStack<H, N, A>) -> Result<Self, (OnStack<H, N, A>, CapacityError)> {
        Ok(src.into())
    }
}

impl<H: 'static, const N: usize, A: Alignment> TransferFrom<Hybrid<H, N, A>> for OnHeap<H> {
    /// Cannot fail; see the [`From`] impl.
    fn transfer_from(src: Hybrid<H, N, A>) -> Result<Self, (Hybrid<H, N, A>, CapacityError)> {
        Ok(src.into())
    }
}

impl<H: 'static, const N: usize, A: Alignment> TransferFrom<OnHeap<H>> for OnStack<H, N, A> {
    /// Fails when the payload does not fit the buffer.
    fn transfer_from(src: OnHeap<H>) -> Result<Self, (OnHeap<H>, CapacityError)> {
        match RawInline::try_from_heap(src.into_raw()) {
            Ok(slot) => Ok(OnStack::from_slot(slot)),
            Err((raw, err)) => Err((OnHeap::from_raw(raw), err)),
        }
    }
}

impl<H: 'static, const N: usize, const M: usize, A: Alignment> TransferFrom<OnStack<H, M, A>>
    for OnStack<H, N, A>
{
    /// Fails when the payload does not fit the target capacity.
    fn transfer_from(src: OnStack<H, M, A>) -> Result<Self, (OnStack<H, M, A>, CapacityError)> {
        src.try_resize()
    }
}

impl<H: 'static, const N: usize, const M: usize, A: Alignment> TransferFrom<Hybrid<H, M, A>>
    for OnStack<H, N, A>
{
    /// Fails when the payload does not fit the buffer, wherever it
    /// currently lives.
    fn transfer_from(src: Hybrid<H, M, A>) -> Result<Self, (Hybrid<H, M, A>, CapacityError)> {
        match src.into_repr() {
            Repr::Inline(slot) => match RawInline::try_from_other(slot) {
                Ok(slot) => Ok(OnStack::from_slot(slot)),
                Err((slot, err)) => Err((Hybrid::from_repr(Repr::Inline(slot)), err)),
            },
            Repr::Boxed(raw) => match RawInline::try_from_heap(raw) {
                Ok(slot) => Ok(OnStack::from_slot(slot)),
                Err((raw, err)) => Err((Hybrid::from_repr(Repr::Boxed(raw)), err)),
            },
        }
    }
}

impl<H: 'static, const N: usize, A: Alignment> TransferFrom<OnHeap<H>> for Hybrid<H, N, A> {
    /// Cannot fail; see the [`From`] impl.
    fn transfer_from(src: OnHeap<H>) -> Result<Self, (OnHeap<H>, CapacityError)> {
        Ok(src.into())
    }
}

impl<H: 'static, const N: usize, const M: usize, A: Alignment> TransferFrom<OnStack<H, M, A>>
    for Hybrid<H, N, A>
{
    /// Cannot fail; see the [`From`] impl.
    fn transfer_from(src: OnStack<H, M, A>) -> Result<Self, (OnStack<H, M, A>, CapacityError)> {
        Ok(src.into())
    }
}

impl<H: 'static, const N: usize, const M: usize, A: Alignment> TransferFrom<Hybrid<H, M, A>>
    for Hybrid<H, N, A>
{
    /// Cannot fail; the placement is re-decided against the new capacity.
    fn transfer_from(src: Hybrid<H, M, A>) -> Result<Self, (Hybrid<H, M, A>, CapacityError)> {
        Ok(src.resize())
    }
}

#[cfg(test)]
mod tests {
    use alloc::string::String;

    use super::*;
    use crate::{handlers::Inert, policy::Policy};

    #[test]
    fn every_policy_reaches_the_heap() {
        let stack = OnStack::<Inert, 64>::new(String::from("a"));
        let heap: OnHeap<Inert> = stack.into();
        assert_eq!(heap.as_raw().downcast_ref::<String>(), Some(&String::from("a")));

        let hybrid = Hybrid::<Inert, 64>::new(String::from("b"));
        let heap: OnHeap<Inert> = hybrid.into();
        assert_eq!(heap.as_raw().downcast_ref::<String>(), Some(&String::from("b")));
    }

    #[test]
    fn hybrid_redecides_placement_on_entry() {
        let heap = OnHeap::<Inert>::new(1_u32);
        let hybrid: Hybrid<Inert, 64> = heap.into();
        assert!(hybrid.is_inline());

        let heap = OnHeap::<Inert>::new([2_u64; 32]);
        let hybrid: Hybrid<Inert, 64> = heap.into();
        assert!(!hybrid.is_inline());
        assert_eq!(hybrid.as_raw().downcast_ref::<[u64; 32]>(), Some(&[2; 32]));
    }

    #[test]
    fn rejected_transfer_hands_the_source_back() {
        let hybrid = Hybrid::<Inert, 256>::new([3_u64; 16]);
        assert!(hybrid.is_inline());

        let (hybrid, err) =
            <OnStack<Inert, 64> as TransferFrom<_>>::transfer_from(hybrid).unwrap_err();
        assert_eq!(err.capacity(), 64);
        assert!(hybrid.is_inline());
        assert_eq!(hybrid.as_raw().downcast_ref::<[u64; 16]>(), Some(&[3; 16]));
    }
}
