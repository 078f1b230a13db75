//! Vtable for type-erased value operations.
//!
//! This module contains the [`ValueVtable`] which enables copying,
//! destroying, inspecting, and invoking stored values when their concrete
//! type `V` and handler type `H` have been erased. The vtable stores the
//! wrapper's layout together with function pointers that dispatch to the
//! correct typed implementations.
//!
//! This module encapsulates the fields of [`ValueVtable`] so they cannot be
//! accessed directly. This visibility restriction guarantees the safety
//! invariant: **the vtable's type parameters must match the actual value
//! type and handler stored in the [`ValueData`]**.
//!
//! # Safety Invariant
//!
//! This invariant is maintained because vtables are created as `&'static`
//! references via [`ValueVtable::new`], which pairs the function pointers
//! with specific types `V` and `H` at compile time.

use alloc::boxed::Box;
use core::{alloc::Layout, any::TypeId, ptr::NonNull};

use crate::{
    handlers::ValueHandler,
    util::Erased,
    value::{
        data::ValueData,
        raw::{RawValue, RawValueRef},
    },
};

/// Vtable for type-erased value operations.
///
/// Contains the layout of the concrete wrapper and function pointers for
/// performing operations on stored values without knowing their concrete
/// type at compile time.
///
/// # Safety Invariant
///
/// Every function pointer field is guaranteed to point to the function
/// defined below instantiated with the value type `V` and handler type `H`
/// that were used to create this [`ValueVtable`], and `layout` is guaranteed
/// to be `Layout::new::<ValueData<V>>()` for that same `V`.
pub(crate) struct ValueVtable {
    /// Layout of the `ValueData<V>` wrapper this vtable describes. Every
    /// placement decision (inline vs. heap, capacity checks) reads this.
    layout: Layout,
    /// Gets the [`TypeId`] of the value type that was used to create this
    /// [`ValueVtable`].
    type_id: fn() -> TypeId,
    /// Gets the [`core::any::type_name`] of the value type that was used to
    /// create this [`ValueVtable`].
    type_name: fn() -> &'static str,
    /// Clones the value into a fresh heap slot.
    clone_boxed: unsafe fn(RawValueRef<'_>) -> RawValue,
    /// Clones the value into caller-supplied uninitialized memory.
    clone_into: unsafe fn(RawValueRef<'_>, NonNull<u8>),
    /// Performs the handler's domain action on the value.
    invoke: unsafe fn(RawValueRef<'_>),
    /// Formats the value using the `debug` method on the handler.
    debug: unsafe fn(RawValueRef<'_>, &mut core::fmt::Formatter<'_>) -> core::fmt::Result,
    /// Drops the `Box<ValueData<V>>` instance pointed to by this pointer.
    drop_boxed: unsafe fn(NonNull<ValueData<Erased>>),
    /// Drops the `ValueData<V>` pointed to by this pointer in place, without
    /// releasing its backing memory.
    drop_in_place: unsafe fn(NonNull<ValueData<Erased>>),
}

impl ValueVtable {
    /// Creates a new [`ValueVtable`] for the value type `V` and the handler
    /// type `H`.
    pub(super) const fn new<V: Clone + 'static, H: ValueHandler<V>>() -> &'static Self {
        const {
            &Self {
                layout: Layout::new::<ValueData<V>>(),
                type_id: TypeId::of::<V>,
                type_name: core::any::type_name::<V>,
                clone_boxed: clone_boxed::<V, H>,
                clone_into: clone_into::<V, H>,
                invoke: invoke::<V, H>,
                debug: debug::<V, H>,
                drop_boxed: drop_boxed::<V>,
                drop_in_place: drop_in_place::<V>,
            }
        }
    }

    /// Layout of the concrete `ValueData<V>` wrapper.
    #[inline]
    pub(super) fn layout(&self) -> Layout {
        self.layout
    }

    /// Gets the [`TypeId`] of the value type that was used to create this
    /// [`ValueVtable`].
    #[inline]
    pub(super) fn type_id(&self) -> TypeId {
        (self.type_id)()
    }

    /// Gets the [`core::any::type_name`] of the value type that was used to
    /// create this [`ValueVtable`].
    #[inline]
    pub(super) fn type_name(&self) -> &'static str {
        (self.type_name)()
    }

    /// Clones the value behind `ptr` into a fresh heap slot using the
    /// [`Clone`] impl of the value type used when creating this vtable.
    ///
    /// # Safety
    ///
    /// The caller must ensure:
    ///
    /// 1. This [`ValueVtable`] must be a vtable for the value type stored in
    ///    the [`ValueData`] behind `ptr`.
    #[inline]
    pub(super) unsafe fn clone_boxed(&self, ptr: RawValueRef<'_>) -> RawValue {
        // SAFETY: We know that `self.clone_boxed` points to the function
        // `clone_boxed::<V, H>` below. That function's safety requirements are
        // upheld:
        // 1. Guaranteed by the caller
        unsafe { (self.clone_boxed)(ptr) }
    }

    /// Clones the value behind `ptr` into `dst`.
    ///
    /// # Safety
    ///
    /// The caller must ensure:
    ///
    /// 1. This [`ValueVtable`] must be a vtable for the value type stored in
    ///    the [`ValueData`] behind `ptr`.
    /// 2. `dst` must point to unconstructed memory of at least
    ///    `self.layout().size()` bytes, aligned to `self.layout().align()`,
    ///    valid for writes.
    #[inline]
    pub(super) unsafe fn clone_into(&self, ptr: RawValueRef<'_>, dst: NonNull<u8>) {
        // SAFETY: We know that `self.clone_into` points to the function
        // `clone_into::<V, H>` below. That function's safety requirements are
        // upheld:
        // 1. Guaranteed by the caller
        // 2. Guaranteed by the caller
        unsafe { (self.clone_into)(ptr, dst) }
    }

    /// Performs the domain action using the [`H::invoke`] function used when
    /// creating this [`ValueVtable`].
    ///
    /// [`H::invoke`]: ValueHandler::invoke
    ///
    /// # Safety
    ///
    /// The caller must ensure:
    ///
    /// 1. This [`ValueVtable`] must be a vtable for the value type stored in
    ///    the [`ValueData`] behind `ptr`.
    #[inline]
    pub(super) unsafe fn invoke(&self, ptr: RawValueRef<'_>) {
        // SAFETY: We know that `self.invoke` points to the function
        // `invoke::<V, H>` below. That function's safety requirements are
        // upheld:
        // 1. Guaranteed by the caller
        unsafe { (self.invoke)(ptr) }
    }

    /// Formats the value using the [`H::debug`] function used when creating
    /// this [`ValueVtable`].
    ///
    /// [`H::debug`]: ValueHandler::debug
    ///
    /// # Safety
    ///
    /// The caller must ensure:
    ///
    /// 1. This [`ValueVtable`] must be a vtable for the value type stored in
    ///    the [`ValueData`] behind `ptr`.
    #[inline]
    pub(super) unsafe fn debug(
        &self,
        ptr: RawValueRef<'_>,
        formatter: &mut core::fmt::Formatter<'_>,
    ) -> core::fmt::Result {
        // SAFETY: We know that `self.debug` points to the function
        // `debug::<V, H>` below. That function's safety requirements are
        // upheld:
        // 1. Guaranteed by the caller
        unsafe { (self.debug)(ptr, formatter) }
    }

    /// Drops the `Box<ValueData<V>>` instance pointed to by this pointer.
    ///
    /// # Safety
    ///
    /// The caller must ensure:
    ///
    /// 1. The pointer comes from `Box<ValueData<V>>` via [`Box::into_raw`]
    /// 2. This [`ValueVtable`] must be a vtable for the value type stored in
    ///    the [`ValueData`].
    /// 3. This method drops the `Box<ValueData<V>>`, so the caller must
    ///    ensure that the pointer has not previously been dropped, that it is
    ///    able to transfer ownership of the pointer, and that it will not use
    ///    the pointer after calling this method.
    #[inline]
    pub(super) unsafe fn drop_boxed(&self, ptr: NonNull<ValueData<Erased>>) {
        // SAFETY: We know that `self.drop_boxed` points to the function
        // `drop_boxed::<V>` below. That function's safety requirements are
        // upheld:
        // 1. Guaranteed by the caller
        // 2. Guaranteed by the caller
        // 3. Guaranteed by the caller
        unsafe { (self.drop_boxed)(ptr) }
    }

    /// Drops the `ValueData<V>` pointed to by this pointer in place. The
    /// backing memory is not released; the caller may reuse or discard it.
    ///
    /// # Safety
    ///
    /// The caller must ensure:
    ///
    /// 1. `ptr` points to a live, properly constructed `ValueData<V>`.
    /// 2. This [`ValueVtable`] must be a vtable for the value type stored in
    ///    the [`ValueData`].
    /// 3. This method destroys the pointee, so the caller must ensure it is
    ///    not used again except as unconstructed memory.
    #[inline]
    pub(super) unsafe fn drop_in_place(&self, ptr: NonNull<ValueData<Erased>>) {
        // SAFETY: We know that `self.drop_in_place` points to the function
        // `drop_in_place::<V>` below. That function's safety requirements are
        // upheld:
        // 1. Guaranteed by the caller
        // 2. Guaranteed by the caller
        // 3. Guaranteed by the caller
        unsafe { (self.drop_in_place)(ptr) }
    }
}

/// Clones the value behind `ptr` into a fresh heap slot.
///
/// # Safety
///
/// The caller must ensure:
///
/// 1. The type `V` matches the actual value type stored in the
///    [`ValueData`] behind `ptr`.
unsafe fn clone_boxed<V: Clone + 'static, H: ValueHandler<V>>(ptr: RawValueRef<'_>) -> RawValue {
    // SAFETY:
    // 1. Guaranteed by the caller
    let value: &V = unsafe { ptr.downcast_unchecked::<V>() };
    RawValue::new::<V, H>(value.clone())
}

/// Clones the value behind `ptr` into the unconstructed memory at `dst`.
///
/// # Safety
///
/// The caller must ensure:
///
/// 1. The type `V` matches the actual value type stored in the
///    [`ValueData`] behind `ptr`.
/// 2. `dst` points to unconstructed memory large enough and sufficiently
///    aligned for a `ValueData<V>`, valid for writes.
unsafe fn clone_into<V: Clone + 'static, H: ValueHandler<V>>(
    ptr: RawValueRef<'_>,
    dst: NonNull<u8>,
) {
    // SAFETY:
    // 1. Guaranteed by the caller
    let value: &V = unsafe { ptr.downcast_unchecked::<V>() };
    let data = ValueData::new::<H>(value.clone());
    // SAFETY: `dst` is valid for writes of a `ValueData<V>` and properly
    // aligned, as guaranteed by the caller.
    unsafe { dst.cast::<ValueData<V>>().write(data) };
}

/// Performs the handler's domain action on the value behind `ptr`.
///
/// # Safety
///
/// The caller must ensure:
///
/// 1. The type `V` matches the actual value type stored in the
///    [`ValueData`] behind `ptr`.
unsafe fn invoke<V: 'static, H: ValueHandler<V>>(ptr: RawValueRef<'_>) {
    // SAFETY:
    // 1. Guaranteed by the caller
    let value: &V = unsafe { ptr.downcast_unchecked::<V>() };
    H::invoke(value);
}

/// Formats the value behind `ptr` using its handler's debug implementation.
///
/// # Safety
///
/// The caller must ensure:
///
/// 1. The type `V` matches the actual value type stored in the
///    [`ValueData`] behind `ptr`.
unsafe fn debug<V: 'static, H: ValueHandler<V>>(
    ptr: RawValueRef<'_>,
    formatter: &mut core::fmt::Formatter<'_>,
) -> core::fmt::Result {
    // SAFETY:
    // 1. Guaranteed by the caller
    let value: &V = unsafe { ptr.downcast_unchecked::<V>() };
    H::debug(value, formatter)
}

/// Drops the `Box<ValueData<V>>` instance pointed to by this pointer.
///
/// # Safety
///
/// The caller must ensure:
///
/// 1. The pointer comes from `Box<ValueData<V>>` via [`Box::into_raw`]
/// 2. The value type `V` matches the actual value type stored in the
///    [`ValueData`]
/// 3. This method drops the `Box<ValueData<V>>`, so the caller must ensure
///    that the pointer has not previously been dropped, that it is able to
///    transfer ownership of the pointer, and that it will not use the
///    pointer after calling this method.
unsafe fn drop_boxed<V: 'static>(ptr: NonNull<ValueData<Erased>>) {
    let ptr: NonNull<ValueData<V>> = ptr.cast();
    let ptr = ptr.as_ptr();
    // SAFETY: Our pointer has the correct type as guaranteed by the caller,
    // and it came from a call to `Box::into_raw` as also guaranteed by our
    // caller.
    let boxed = unsafe { Box::from_raw(ptr) };
    core::mem::drop(boxed);
}

/// Drops the `ValueData<V>` pointed to by this pointer in place.
///
/// # Safety
///
/// The caller must ensure:
///
/// 1. `ptr` points to a live, properly constructed `ValueData<V>`.
/// 2. The value type `V` matches the actual value type stored in the
///    [`ValueData`]
/// 3. The pointee must not be used again after this call except as
///    unconstructed memory.
unsafe fn drop_in_place<V: 'static>(ptr: NonNull<ValueData<Erased>>) {
    let ptr: NonNull<ValueData<V>> = ptr.cast();
    // SAFETY: The pointee is a live `ValueData<V>` as guaranteed by the
    // caller, and ownership of it is transferred to us.
    unsafe { core::ptr::drop_in_place(ptr.as_ptr()) };
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handlers::ValueHandler;

    struct HandlerI32;
    impl ValueHandler<i32> for HandlerI32 {
        fn invoke(_value: &i32) {}

        fn debug(value: &i32, formatter: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
            core::fmt::Debug::fmt(value, formatter)
        }
    }

    #[test]
    fn vtable_is_deduplicated() {
        // Vtables have static lifetime and a single instance per (V, H) pair
        let vtable1 = ValueVtable::new::<i32, HandlerI32>();
        let vtable2 = ValueVtable::new::<i32, HandlerI32>();

        assert!(core::ptr::eq(vtable1, vtable2));
    }

    #[test]
    fn vtable_reports_type_and_layout() {
        let vtable = ValueVtable::new::<i32, HandlerI32>();
        assert_eq!(vtable.type_id(), TypeId::of::<i32>());
        assert_eq!(vtable.layout(), Layout::new::<ValueData<i32>>());
        assert!(vtable.type_name().contains("i32"));
    }
}
