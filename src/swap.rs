//! Payload exchange between handles of any two storage policies.
//!
//! Every ordered pair of policies implements [`SwapWith`], so handles can
//! trade payloads across policy and capacity boundaries. A swap either
//! succeeds with both payloads exchanged or fails with both handles
//! untouched; partial exchanges cannot be observed.
//!
//! Which pairs can fail follows from where the payloads may land:
//!
//! | | [`OnHeap`] | [`OnStack`] | [`Hybrid`] |
//! |---|---|---|---|
//! | [`OnHeap`] | never fails | checked | never fails |
//! | [`OnStack`] | checked | checked | checked |
//! | [`Hybrid`] | never fails | checked | never fails |
//!
//! "Checked" means the incoming payload must fit the fixed-capacity buffer
//! on the [`OnStack`] side; same-capacity [`OnStack`] pairs cannot actually
//! fail, since both payloads already fit that capacity.

use polystore_internals::{CapacityError, RawInline, alignment::Alignment};

use crate::policy::{Hybrid, OnHeap, OnStack, Policy, Repr};

/// Exchanging payloads with a handle of policy `Rhs`.
///
/// The impls are symmetric: `a.try_swap(&mut b)` and `b.try_swap(&mut a)`
/// behave identically. Use the free functions [`try_swap`] and [`swap`] to
/// avoid spelling out which side carries the impl.
pub trait SwapWith<Rhs: Policy = Self>: Policy {
    /// Exchanges the two payloads, or fails without mutating either handle.
    ///
    /// # Errors
    ///
    /// Fails when one of the payloads does not fit the buffer it would move
    /// into. The error names the violated capacity or alignment bound.
    fn try_swap(&mut self, other: &mut Rhs) -> Result<(), CapacityError>;
}

/// Exchanges the payloads of two handles, or fails without mutating either.
///
/// Free-function form of [`SwapWith::try_swap`].
///
/// # Errors
///
/// Fails when one of the payloads does not fit the buffer it would move
/// into.
///
/// # Examples
///
/// ```
/// use polystore::{Inert, OnHeap, OnStack, Storage, try_swap};
///
/// let mut heap: Storage<OnHeap<Inert>> = Storage::new([1_u64; 32]);
/// let mut stack: Storage<OnStack<Inert, 64>> = Storage::new(2_u32);
///
/// // The array does not fit the 64-byte buffer: nothing moves.
/// assert!(heap.try_swap(&mut stack).is_err());
/// assert_eq!(stack.downcast_ref::<u32>(), Some(&2));
/// ```
pub fn try_swap<L, R>(left: &mut L, right: &mut R) -> Result<(), CapacityError>
where
    L: SwapWith<R>,
    R: Policy,
{
    left.try_swap(right)
}

/// Exchanges the payloads of two handles.
///
/// # Panics
///
/// Panics when the exchange is infeasible; both handles are left untouched
/// in that case. Use [`try_swap`] to handle infeasibility without
/// panicking.
pub fn swap<L, R>(left: &mut L, right: &mut R)
where
    L: SwapWith<R>,
    R: Policy,
{
    if let Err(err) = left.try_swap(right) {
        panic!("cannot swap payloads: {err}");
    }
}

impl<H: 'static> SwapWith for OnHeap<H> {
    /// Pointer swap; infallible.
    fn try_swap(&mut self, other: &mut Self) -> Result<(), CapacityError> {
        self.swap(other);
        Ok(())
    }
}

impl<H: 'static, const N: usize, const M: usize, A: Alignment> SwapWith<OnStack<H, M, A>>
    for OnStack<H, N, A>
{
    /// Relocation through a stack temporary, checked in both directions.
    fn try_swap(&mut self, other: &mut OnStack<H, M, A>) -> Result<(), CapacityError> {
        self.slot_mut().try_swap(other.slot_mut())
    }
}

impl<H: 'static, const N: usize, const M: usize, A: Alignment> SwapWith<Hybrid<H, M, A>>
    for Hybrid<H, N, A>
{
    /// Infallible; payload placement is re-decided on both sides.
    fn try_swap(&mut self, other: &mut Hybrid<H, M, A>) -> Result<(), CapacityError> {
        self.swap(other);
        Ok(())
    }
}

impl<H: 'static, const N: usize, A: Alignment> SwapWith<OnStack<H, N, A>> for OnHeap<H> {
    /// Checked against the buffer capacity on the stack side.
    fn try_swap(&mut self, other: &mut OnStack<H, N, A>) -> Result<(), CapacityError> {
        other.slot_mut().swap_with_heap(self.raw_mut())
    }
}

impl<H: 'static, const N: usize, A: Alignment> SwapWith<OnHeap<H>> for OnStack<H, N, A> {
    /// Checked against the buffer capacity on the stack side.
    fn try_swap(&mut self, other: &mut OnHeap<H>) -> Result<(), CapacityError> {
        self.slot_mut().swap_with_heap(other.raw_mut())
    }
}

impl<H: 'static, const N: usize, A: Alignment> SwapWith<OnHeap<H>> for Hybrid<H, N, A> {
    /// Infallible; the buffer payload is spilled first, and the incoming
    /// payload is pulled inline when it fits.
    fn try_swap(&mut self, other: &mut OnHeap<H>) -> Result<(), CapacityError> {
        core::mem::swap(self.spill_mut(), other.raw_mut());
        self.normalize();
        Ok(())
    }
}

impl<H: 'static, const N: usize, A: Alignment> SwapWith<Hybrid<H, N, A>> for OnHeap<H> {
    /// Infallible; see the reversed impl.
    fn try_swap(&mut self, other: &mut Hybrid<H, N, A>) -> Result<(), CapacityError> {
        other.try_swap(self)
    }
}

impl<H: 'static, const N: usize, const M: usize, A: Alignment> SwapWith<OnStack<H, M, A>>
    for Hybrid<H, N, A>
{
    /// Checked against the buffer capacity on the stack side only: the
    /// hybrid can take any payload, falling back to the heap.
    fn try_swap(&mut self, other: &mut OnStack<H, M, A>) -> Result<(), CapacityError> {
        // The only infeasible case: our payload has nowhere to go on the
        // stack side. Checking up front keeps failed swaps free of side
        // effects, including placement changes.
        RawInline::<M, A>::check_fits(self.as_raw().layout())?;

        let incoming = other.as_raw().layout();
        if self.is_inline() && RawInline::<N, A>::fits(incoming) {
            if let Repr::Inline(slot) = self.repr_mut() {
                return slot.try_swap(other.slot_mut());
            }
        }

        // The stack payload cannot enter our buffer (or we are already
        // spilled), so it trades places with our payload through the heap.
        let result = other.slot_mut().swap_with_heap(self.spill_mut());
        self.normalize();
        result
    }
}

impl<H: 'static, const N: usize, const M: usize, A: Alignment> SwapWith<Hybrid<H, M, A>>
    for OnStack<H, N, A>
{
    /// Checked against the buffer capacity on the stack side; see the
    /// reversed impl.
    fn try_swap(&mut self, other: &mut Hybrid<H, M, A>) -> Result<(), CapacityError> {
        other.try_swap(self)
    }
}

#[cfg(test)]
mod tests {
    use alloc::string::String;

    use super::*;
    use crate::handlers::Inert;

    #[test]
    fn heap_and_stack_exchange() {
        let mut heap = OnHeap::<Inert>::new(String::from("heap"));
        let mut stack = OnStack::<Inert, 64>::new(String::from("stack"));

        try_swap(&mut heap, &mut stack).unwrap();
        assert_eq!(
            heap.as_raw().downcast_ref::<String>(),
            Some(&String::from("stack"))
        );
        assert_eq!(
            stack.as_raw().downcast_ref::<String>(),
            Some(&String::from("heap"))
        );
    }

    #[test]
    fn failed_swap_has_no_side_effects() {
        let mut heap = OnHeap::<Inert>::new([1_u64; 32]);
        let mut stack = OnStack::<Inert, 64>::new(2_u32);

        let err = try_swap(&mut heap, &mut stack).unwrap_err();
        assert_eq!(err.capacity(), 64);
        assert_eq!(heap.as_raw().downcast_ref::<[u64; 32]>(), Some(&[1; 32]));
        assert_eq!(stack.as_raw().downcast_ref::<u32>(), Some(&2));
    }

    #[test]
    fn hybrid_takes_any_heap_payload() {
        let mut hybrid = Hybrid::<Inert, 64>::new(1_u32);
        let mut heap = OnHeap::<Inert>::new([2_u64; 32]);

        try_swap(&mut hybrid, &mut heap).unwrap();
        assert!(!hybrid.is_inline());
        assert_eq!(hybrid.as_raw().downcast_ref::<[u64; 32]>(), Some(&[2; 32]));
        assert_eq!(heap.as_raw().downcast_ref::<u32>(), Some(&1));

        // Swapping back demotes the small payload into the buffer again.
        try_swap(&mut heap, &mut hybrid).unwrap();
        assert!(hybrid.is_inline());
        assert_eq!(hybrid.as_raw().downcast_ref::<u32>(), Some(&1));
    }

    #[test]
    fn hybrid_and_stack_route_through_the_heap_when_needed() {
        // The stack payload fits 96 bytes but not the hybrid's 32.
        let mut hybrid = Hybrid::<Inert, 32>::new(1_u32);
        let mut stack = OnStack::<Inert, 96>::new([2_u64; 8]);

        try_swap(&mut hybrid, &mut stack).unwrap();
        assert!(!hybrid.is_inline());
        assert_eq!(hybrid.as_raw().downcast_ref::<[u64; 8]>(), Some(&[2; 8]));
        assert_eq!(stack.as_raw().downcast_ref::<u32>(), Some(&1));
    }

    #[test]
    fn hybrid_and_stack_swap_inline_when_possible() {
        let mut hybrid = Hybrid::<Inert, 64>::new(1_u32);
        let mut stack = OnStack::<Inert, 64>::new(2_u64);

        try_swap(&mut stack, &mut hybrid).unwrap();
        assert!(hybrid.is_inline());
        assert_eq!(hybrid.as_raw().downcast_ref::<u64>(), Some(&2));
        assert_eq!(stack.as_raw().downcast_ref::<u32>(), Some(&1));
    }

    #[test]
    fn spilled_hybrid_cannot_enter_a_small_stack() {
        let mut hybrid = Hybrid::<Inert, 32>::new([1_u64; 16]);
        assert!(!hybrid.is_inline());
        let mut stack = OnStack::<Inert, 64>::new(2_u32);

        let err = try_swap(&mut hybrid, &mut stack).unwrap_err();
        assert_eq!(err.capacity(), 64);
        // Nothing moved, including the hybrid's placement.
        assert!(!hybrid.is_inline());
        assert_eq!(hybrid.as_raw().downcast_ref::<[u64; 16]>(), Some(&[1; 16]));
        assert_eq!(stack.as_raw().downcast_ref::<u32>(), Some(&2));
    }

    #[test]
    #[should_panic(expected = "cannot swap payloads")]
    fn panicking_swap_reports_infeasibility() {
        let mut heap = OnHeap::<Inert>::new([1_u64; 32]);
        let mut stack = OnStack::<Inert, 64>::new(2_u32);
        swap(&mut heap, &mut stack);
    }
}
