//! Type-erased owned heap slot and borrowed reference types.
//!
//! This module encapsulates the `ptr` field of [`RawValue`] and
//! [`RawValueRef`], ensuring it is only visible within this module. This
//! visibility restriction guarantees the safety invariant: **the pointer
//! always comes from a heap allocation holding a live `ValueData<V>`**.
//!
//! # Safety Invariant
//!
//! The `ptr` field can only be set via [`RawValue::new`] (which creates it
//! from `Box::into_raw`) or via [`RawValue::from_ptr`] (whose caller must
//! provide an equivalent allocation, used when an inline payload is
//! relocated onto the heap). It cannot be modified afterward, so the pointer
//! provenance remains valid throughout the value's lifetime.
//!
//! The [`RawValue`] drop implementation relies on this invariant to safely
//! reconstruct the box and deallocate the memory.
//!
//! # Type Erasure
//!
//! The concrete type parameter `V` is erased by casting to
//! `ValueData<Erased>`. The vtable stored within the `ValueData` provides
//! the runtime type information needed to safely copy, destroy, relocate,
//! and invoke values.

use alloc::boxed::Box;
use core::{alloc::Layout, any::TypeId, ptr::NonNull};

use crate::{handlers::ValueHandler, util::Erased, value::data::ValueData};

/// A pointer to a [`ValueData`] that is guaranteed to point to an
/// initialized, heap-allocated instance of a `ValueData<V>` for some
/// specific `V`, though we do not know which actual `V` it is.
///
/// The allocation is owned exclusively: dropping the [`RawValue`] destroys
/// the value and releases the memory, and relocation helpers may instead
/// release the memory without destroying the value after its bytes have
/// been moved elsewhere.
///
/// We cannot use a `Box<ValueData<V>>` directly, because that does not
/// allow us to type-erase the `V`.
#[repr(transparent)]
pub struct RawValue {
    /// Pointer to the inner value data
    ///
    /// # Safety
    ///
    /// The following safety invariants are guaranteed to be upheld as long as
    /// this struct exists:
    ///
    /// 1. The pointer must point to a heap allocation with the layout of the
    ///    concrete `ValueData<V>`, allocated by the global allocator.
    /// 2. The pointer will point to the same `ValueData<V>` for the entire
    ///    lifetime of this object.
    /// 3. The pointee is properly initialized for the entire lifetime of this
    ///    object, except during the execution of the `Drop` implementation or
    ///    after ownership has been given up through [`RawValue::into_ptr`].
    ptr: NonNull<ValueData<Erased>>,
}

impl RawValue {
    /// Creates a new [`RawValue`] holding the given value, with the behavior
    /// of handler `H` captured in its vtable.
    #[inline]
    pub fn new<V, H>(value: V) -> Self
    where
        V: Clone + 'static,
        H: ValueHandler<V>,
    {
        let ptr = Box::new(ValueData::new::<H>(value));
        let ptr: *mut ValueData<V> = Box::into_raw(ptr);
        let ptr: *mut ValueData<Erased> = ptr.cast::<ValueData<Erased>>();

        // SAFETY: `Box::into_raw` returns a non-null pointer
        let ptr: NonNull<ValueData<Erased>> = unsafe { NonNull::new_unchecked(ptr) };

        Self { ptr }
    }

    /// Returns a borrowed reference to the erased value.
    #[inline]
    pub fn as_ref(&self) -> RawValueRef<'_> {
        RawValueRef {
            ptr: self.ptr,
            _marker: core::marker::PhantomData,
        }
    }

    /// Accesses the stored value as a `&mut V`, if `V` is its actual type.
    ///
    /// Mutation through the reference cannot change the stored type or the
    /// wrapper's layout, so the type invariants are unaffected.
    #[inline]
    pub fn downcast_mut<V: 'static>(&mut self) -> Option<&mut V> {
        if self.as_ref().value_type_id() != TypeId::of::<V>() {
            return None;
        }
        let mut ptr = self.ptr.cast::<ValueData<V>>();
        // SAFETY: Converting the NonNull pointer to a reference is sound because:
        // - The pointer is non-null, properly aligned, and dereferenceable
        //   (type invariant 1)
        // - The pointee is properly initialized (type invariant 3)
        // - The type `V` matches the actual value type (checked against the
        //   vtable above)
        // - The `&mut self` borrow grants exclusive access for the returned
        //   lifetime
        let data = unsafe { ptr.as_mut() };
        Some(data.value_mut())
    }

    /// Creates a [`RawValue`] from a raw allocation.
    ///
    /// # Safety
    ///
    /// The caller must ensure:
    ///
    /// 1. `ptr` points to a heap allocation made by the global allocator
    ///    with exactly the layout reported by the pointee's vtable.
    /// 2. The pointee is a live, properly constructed `ValueData<V>` whose
    ///    vtable matches `V`.
    /// 3. Ownership of both the value and the allocation is transferred to
    ///    the returned [`RawValue`].
    #[inline]
    pub(super) unsafe fn from_ptr(ptr: NonNull<ValueData<Erased>>) -> Self {
        Self { ptr }
    }

    /// Consumes the [`RawValue`] and returns the inner pointer without
    /// dropping the value or releasing the allocation.
    ///
    /// The caller takes over responsibility for both.
    #[inline]
    pub(super) fn into_ptr(self) -> NonNull<ValueData<Erased>> {
        let ptr = self.ptr;
        core::mem::forget(self);
        ptr
    }

    /// Releases the heap allocation without dropping the stored value.
    ///
    /// # Safety
    ///
    /// The caller must ensure the value's bytes have been relocated
    /// elsewhere (or otherwise taken over), so that skipping its destructor
    /// here does not leak or double-drop it.
    #[inline]
    pub(super) unsafe fn release_allocation(self) {
        let layout = self.as_ref().layout();
        let ptr = self.into_ptr();
        // SAFETY: The pointer was allocated by the global allocator with
        // exactly this layout (type invariant 1), and ownership of the
        // allocation is ours to give up.
        unsafe { alloc::alloc::dealloc(ptr.as_ptr().cast::<u8>(), layout) };
    }
}

impl core::ops::Drop for RawValue {
    #[inline]
    fn drop(&mut self) {
        let vtable = self.as_ref().vtable();

        // SAFETY:
        // 1. The pointer comes from `Box::into_raw` or an equivalent
        //    allocation (type invariant 1)
        // 2. The vtable returned by `self.as_ref().vtable()` is guaranteed to
        //    match the data in the `ValueData`.
        // 3. The pointer is initialized and has not previously been freed as
        //    guaranteed by the invariants on this type. We are correctly
        //    transferring ownership here and the pointer is not used
        //    afterwards, as we are in the drop function.
        unsafe { vtable.drop_boxed(self.ptr) };
    }
}

/// A lifetime-bound pointer to a [`ValueData`] that is guaranteed to point
/// to an initialized instance of a `ValueData<V>` for some specific `V`,
/// though we do not know which actual `V` it is.
///
/// Unlike [`RawValue`], the pointee may live either on the heap or inside
/// an inline buffer; the reference does not own it either way.
///
/// We cannot use a `&'a ValueData<V>` directly, because that would require
/// us to know the actual type of the value, which we do not.
#[derive(Clone, Copy)]
#[repr(transparent)]
pub struct RawValueRef<'a> {
    /// Pointer to the inner value data
    ///
    /// # Safety
    ///
    /// The following safety invariants are guaranteed to be upheld as long as
    /// this struct exists:
    ///
    /// 1. The pointer points to a live, properly constructed `ValueData<V>`
    ///    for some `V`, whose vtable matches `V`.
    /// 2. The pointee outlives `'a` and is not mutated or relocated during
    ///    `'a`.
    ptr: NonNull<ValueData<Erased>>,

    /// Marker to tell the compiler that we should behave the same as a
    /// `&'a ValueData<Erased>`
    _marker: core::marker::PhantomData<&'a ValueData<Erased>>,
}

impl<'a> RawValueRef<'a> {
    /// Creates a [`RawValueRef`] from a pointer to an erased value slot.
    ///
    /// # Safety
    ///
    /// The caller must ensure:
    ///
    /// 1. `ptr` points to a live, properly constructed `ValueData<V>` for
    ///    some `V`, whose vtable matches `V`.
    /// 2. The pointee outlives `'a` and is not mutated or relocated during
    ///    `'a`.
    #[inline]
    pub(super) unsafe fn from_ptr(ptr: NonNull<ValueData<Erased>>) -> Self {
        Self {
            ptr,
            _marker: core::marker::PhantomData,
        }
    }

    /// Casts the [`RawValueRef`] to a [`ValueData<V>`] reference.
    ///
    /// # Safety
    ///
    /// The caller must ensure:
    ///
    /// 1. The type `V` matches the actual value type stored in the
    ///    [`ValueData`].
    #[inline]
    pub(super) unsafe fn cast_inner<V: 'static>(self) -> &'a ValueData<V> {
        // Debug assertion to catch type mismatches in case of bugs
        debug_assert_eq!(self.vtable().type_id(), TypeId::of::<V>());

        let this = self.ptr.cast::<ValueData<V>>();
        // SAFETY: Converting the NonNull pointer to a reference is sound because:
        // - The pointer is non-null, properly aligned, and dereferenceable
        //   (guaranteed by RawValueRef's type invariants)
        // - The pointee is properly initialized (type invariant 1)
        // - The type `V` matches the actual value type (guaranteed by caller)
        // - Shared access is allowed
        // - The reference lifetime 'a is valid (type invariant 2)
        unsafe { this.as_ref() }
    }

    /// Returns a raw pointer to the [`ValueData`] instance.
    #[inline]
    pub(super) fn as_ptr(self) -> *const ValueData<Erased> {
        self.ptr.as_ptr()
    }

    /// Returns the layout of the concrete wrapper behind this reference.
    ///
    /// This is the number of bytes (and the alignment) a slot must provide
    /// to hold the value, vtable pointer included.
    #[inline]
    pub fn layout(self) -> Layout {
        self.vtable().layout()
    }

    /// Returns the size in bytes of the concrete wrapper behind this
    /// reference.
    #[inline]
    pub fn size(self) -> usize {
        self.layout().size()
    }

    /// Returns the [`TypeId`] of the stored value.
    #[inline]
    pub fn value_type_id(self) -> TypeId {
        self.vtable().type_id()
    }

    /// Returns the [`core::any::type_name`] of the stored value.
    #[inline]
    pub fn value_type_name(self) -> &'static str {
        self.vtable().type_name()
    }

    /// Accesses the stored value as a `&V`, if `V` is its actual type.
    #[inline]
    pub fn downcast_ref<V: 'static>(self) -> Option<&'a V> {
        if self.value_type_id() == TypeId::of::<V>() {
            // SAFETY: We just checked that `V` matches the stored type.
            Some(unsafe { self.downcast_unchecked::<V>() })
        } else {
            None
        }
    }

    /// Clones the stored value into a fresh heap slot, using the [`Clone`]
    /// impl of its concrete type.
    #[inline]
    pub fn clone_boxed(self) -> RawValue {
        let vtable = self.vtable();
        // SAFETY:
        // 1. The vtable returned by `self.vtable()` is guaranteed to match the
        //    data in the `ValueData`.
        unsafe { vtable.clone_boxed(self) }
    }

    /// Clones the stored value into the unconstructed memory at `dst`.
    ///
    /// # Safety
    ///
    /// The caller must ensure:
    ///
    /// 1. `dst` points to unconstructed memory of at least
    ///    `self.layout().size()` bytes, aligned to `self.layout().align()`,
    ///    valid for writes.
    #[inline]
    pub(super) unsafe fn clone_into_unchecked(self, dst: NonNull<u8>) {
        let vtable = self.vtable();
        // SAFETY:
        // 1. The vtable returned by `self.vtable()` is guaranteed to match the
        //    data in the `ValueData`.
        // 2. Guaranteed by the caller
        unsafe { vtable.clone_into(self, dst) };
    }

    /// Performs the domain action captured in the vtable on the stored
    /// value.
    #[inline]
    pub fn invoke(self) {
        let vtable = self.vtable();
        // SAFETY:
        // 1. The vtable returned by `self.vtable()` is guaranteed to match the
        //    data in the `ValueData`.
        unsafe { vtable.invoke(self) };
    }

    /// Formats the stored value by using the handler's debug implementation
    /// captured in the vtable.
    #[inline]
    pub fn debug_value(self, formatter: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let vtable = self.vtable();
        // SAFETY:
        // 1. The vtable returned by `self.vtable()` is guaranteed to match the
        //    data in the `ValueData`.
        unsafe { vtable.debug(self, formatter) }
    }
}

#[cfg(test)]
mod tests {
    use alloc::string::String;

    use super::*;
    use crate::handlers::ValueHandler;

    struct HandlerI32;
    impl ValueHandler<i32> for HandlerI32 {
        fn invoke(_value: &i32) {}

        fn debug(value: &i32, formatter: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
            core::fmt::Debug::fmt(value, formatter)
        }
    }

    struct HandlerString;
    impl ValueHandler<String> for HandlerString {
        fn invoke(_value: &String) {}

        fn debug(value: &String, formatter: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
            core::fmt::Debug::fmt(value, formatter)
        }
    }

    #[test]
    fn raw_value_is_pointer_sized() {
        assert_eq!(
            core::mem::size_of::<RawValue>(),
            core::mem::size_of::<usize>()
        );
        assert_eq!(
            core::mem::size_of::<Option<RawValue>>(),
            core::mem::size_of::<usize>()
        );
        assert_eq!(
            core::mem::size_of::<RawValueRef<'_>>(),
            core::mem::size_of::<usize>()
        );
        assert_eq!(
            core::mem::size_of::<Option<RawValueRef<'_>>>(),
            core::mem::size_of::<usize>()
        );
    }

    #[test]
    fn raw_value_reports_type() {
        let int_value = RawValue::new::<i32, HandlerI32>(42);
        let string_value = RawValue::new::<String, HandlerString>(String::from("test"));

        assert_eq!(int_value.as_ref().value_type_id(), TypeId::of::<i32>());
        assert_eq!(
            string_value.as_ref().value_type_id(),
            TypeId::of::<String>()
        );
        assert!(!core::ptr::eq(
            int_value.as_ref().vtable(),
            string_value.as_ref().vtable()
        ));
    }

    #[test]
    fn raw_value_downcast() {
        let value = RawValue::new::<i32, HandlerI32>(42);
        assert_eq!(value.as_ref().downcast_ref::<i32>(), Some(&42));
        assert_eq!(value.as_ref().downcast_ref::<u8>(), None);
    }

    #[test]
    fn raw_value_downcast_mut() {
        let mut value = RawValue::new::<i32, HandlerI32>(42);
        assert!(value.downcast_mut::<u8>().is_none());

        *value.downcast_mut::<i32>().unwrap() += 1;
        assert_eq!(value.as_ref().downcast_ref::<i32>(), Some(&43));
    }

    #[test]
    fn raw_value_clone_boxed_is_deep() {
        let value = RawValue::new::<String, HandlerString>(String::from("payload"));
        let clone = value.as_ref().clone_boxed();

        assert_eq!(
            clone.as_ref().downcast_ref::<String>(),
            Some(&String::from("payload"))
        );
        // The original is unaffected
        assert_eq!(
            value.as_ref().downcast_ref::<String>(),
            Some(&String::from("payload"))
        );
        assert_ne!(value.as_ref().as_ptr(), clone.as_ref().as_ptr());
    }

    #[test]
    fn raw_value_layout_covers_vtable_and_value() {
        let value = RawValue::new::<[u64; 4], HandlerArray>([1, 2, 3, 4]);
        let layout = value.as_ref().layout();
        assert!(layout.size() >= core::mem::size_of::<[u64; 4]>());
        assert!(layout.align() >= core::mem::align_of::<[u64; 4]>());
    }

    struct HandlerArray;
    impl ValueHandler<[u64; 4]> for HandlerArray {
        fn invoke(_value: &[u64; 4]) {}

        fn debug(value: &[u64; 4], formatter: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
            core::fmt::Debug::fmt(value, formatter)
        }
    }

    #[test]
    fn send_sync_are_not_implemented() {
        static_assertions::assert_not_impl_any!(RawValue: Send, Sync);
        static_assertions::assert_not_impl_any!(RawValueRef<'_>: Send, Sync);
    }
}
