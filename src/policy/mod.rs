//! The storage policies and the traits tying them together.
//!
//! A policy decides **where** an erased value lives: on the heap
//! ([`OnHeap`]), inside a fixed-capacity buffer in the handle itself
//! ([`OnStack`]), or in a buffer with heap fallback ([`Hybrid`]). All three
//! expose the same erased view, so [`Storage`](crate::Storage) and the swap
//! machinery work uniformly across them.

mod convert;
mod hybrid;
mod on_heap;
mod on_stack;

pub use self::{hybrid::Hybrid, on_heap::OnHeap, on_stack::OnStack};

pub(crate) use self::hybrid::Repr;

use polystore_internals::RawValueRef;

/// A storage location holding exactly one erased value.
///
/// Implemented by [`OnHeap`], [`OnStack`] and [`Hybrid`]. A policy value is
/// never empty: constructing one requires a payload and dropping it destroys
/// the payload.
pub trait Policy: Sized {
    /// Returns a borrowed erased view of the stored value.
    fn as_raw(&self) -> RawValueRef<'_>;

    /// Returns a mutable reference to the stored value if it is a `V`.
    ///
    /// The value is edited in place wherever the policy keeps it; its type
    /// and placement do not change.
    fn downcast_mut<V: 'static>(&mut self) -> Option<&mut V>;
}

/// Construction of a policy from a concrete value.
///
/// This is a separate trait rather than a method on [`Policy`] because the
/// bounds differ per policy: [`OnStack`] additionally rejects oversized
/// values at compile time, which only works when the value type is known at
/// the construction site.
pub trait Construct<V>: Policy {
    /// Moves the value into a fresh instance of this policy.
    fn construct(value: V) -> Self;
}

/// Adapter formatting a policy's payload through its vtable, so the
/// policies' `Debug` impls can show the value they store.
pub(crate) struct DebugValue<'a>(RawValueRef<'a>);

impl core::fmt::Debug for DebugValue<'_> {
    fn fmt(&self, formatter: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        self.0.debug_value(formatter)
    }
}

/// Formats the payload of the given policy through its vtable.
pub(crate) fn debug_value<P: Policy>(policy: &P) -> DebugValue<'_> {
    DebugValue(policy.as_raw())
}

/// Fallible re-homing of a payload from one policy into another.
///
/// Every ordered pair of policies implements this. Directions that cannot
/// fail (everything fits on the heap, and everything fits a [`Hybrid`])
/// additionally implement [`From`]; this trait exists for the directions
/// into a fixed-capacity buffer, where the payload may be too large. On
/// failure the source is returned untouched together with the reason.
pub trait TransferFrom<P: Policy>: Policy {
    /// Moves the payload of `src` into a fresh instance of this policy,
    /// or returns it untouched if it does not fit.
    fn transfer_from(src: P) -> Result<Self, (P, polystore_internals::CapacityError)>;
}
