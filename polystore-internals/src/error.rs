//! Error type reported when an inline slot cannot hold a value.

use core::alloc::Layout;

/// Error returned when an erased value does not fit a fixed-capacity inline
/// slot, either because it needs more bytes than the slot provides or
/// because it requires stricter alignment than the slot guarantees.
///
/// Operations returning this error perform no mutation: both operands of a
/// failed swap and the source of a failed placement are left exactly as they
/// were before the call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error(
    "value needs {required_size} bytes aligned to {required_align}, \
     but the inline slot provides {capacity} bytes aligned to {slot_align}"
)]
pub struct CapacityError {
    /// Size in bytes required by the value's wrapper.
    required_size: usize,
    /// Alignment required by the value's wrapper.
    required_align: usize,
    /// Capacity in bytes of the rejecting slot.
    capacity: usize,
    /// Alignment guaranteed by the rejecting slot.
    slot_align: usize,
}

impl CapacityError {
    /// Creates a new [`CapacityError`] for a value with layout `required`
    /// rejected by a slot of `capacity` bytes aligned to `slot_align`.
    pub(crate) fn new(required: Layout, capacity: usize, slot_align: usize) -> Self {
        Self {
            required_size: required.size(),
            required_align: required.align(),
            capacity,
            slot_align,
        }
    }

    /// Size in bytes the rejected value requires.
    #[inline]
    pub fn required_size(&self) -> usize {
        self.required_size
    }

    /// Alignment the rejected value requires.
    #[inline]
    pub fn required_align(&self) -> usize {
        self.required_align
    }

    /// Capacity in bytes of the slot that rejected the value.
    #[inline]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Alignment guaranteed by the slot that rejected the value.
    #[inline]
    pub fn slot_align(&self) -> usize {
        self.slot_align
    }
}
