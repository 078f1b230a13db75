//! Module containing the type-erased value slots

pub(crate) mod data;
mod inline;
mod raw;
pub(crate) mod vtable;

pub use self::{
    inline::RawInline,
    raw::{RawValue, RawValueRef},
};

/// Layout of the erased wrapper a slot must hold for a value of type `V`.
///
/// This covers the vtable pointer in addition to the value itself, so it is
/// the layout to check against a slot's capacity, not `Layout::new::<V>()`.
#[must_use]
pub const fn wrapper_layout<V: 'static>() -> core::alloc::Layout {
    core::alloc::Layout::new::<data::ValueData<V>>()
}
