//! Type-erased owned inline slot.
//!
//! This module encapsulates the buffer of [`RawInline`], ensuring it is only
//! visible within this module. This visibility restriction guarantees the
//! safety invariant: **the buffer always starts with one live, properly
//! constructed `ValueData<V>` whose layout fits the buffer**.
//!
//! # Safety Invariant
//!
//! The buffer can only be filled via [`RawInline::new`] (compile-time fit
//! check) or via the relocation constructors (runtime fit check), and every
//! operation that overwrites it first transfers ownership of the previous
//! payload elsewhere. The [`RawInline`] drop implementation relies on this
//! invariant to destroy the payload in place through its vtable.
//!
//! # Relocation
//!
//! Every value stored in a slot may be moved by copying
//! `layout().size()` bytes to a suitably aligned destination and abandoning
//! the source without running its destructor. All cross-slot transfers in
//! this module (inline to inline, inline to heap, heap to inline) are built
//! from this single primitive.

use core::{alloc::Layout, any::TypeId, mem::MaybeUninit, ptr::NonNull};

use crate::{
    alignment::Alignment,
    error::CapacityError,
    handlers::ValueHandler,
    util::Erased,
    value::{
        data::ValueData,
        raw::{RawValue, RawValueRef},
    },
};

/// A fixed-capacity inline slot holding one type-erased value.
///
/// The slot provides `N` bytes aligned to the marker type `A` and always
/// contains a live `ValueData<V>` for some `V` whose layout fits those
/// bounds. There is no empty state: constructing a slot requires a value and
/// dropping the slot destroys it.
///
/// Moving a [`RawInline`] moves the payload bytes with it, which is sound
/// for every `V`: Rust values are relocatable by byte copy.
#[repr(C)]
pub struct RawInline<const N: usize, A: Alignment> {
    /// Zero-sized field raising the buffer alignment to that of `A`.
    _align: [A; 0],
    /// The buffer holding the erased `ValueData<V>`.
    ///
    /// # Safety
    ///
    /// The following safety invariants are guaranteed to be upheld as long
    /// as this struct exists:
    ///
    /// 1. The buffer starts with a live, properly constructed `ValueData<V>`
    ///    for some `V`, whose vtable matches `V`.
    /// 2. `size_of::<ValueData<V>>() <= N` and
    ///    `align_of::<ValueData<V>>() <= align_of::<A>()`.
    bytes: [MaybeUninit<u8>; N],
    /// The payload's concrete type is unknown, so the slot must not be sent
    /// or shared across threads.
    _marker: core::marker::PhantomData<*mut ()>,
}

impl<const N: usize, A: Alignment> RawInline<N, A> {
    /// Capacity of the slot in bytes.
    pub const fn capacity() -> usize {
        N
    }

    /// Alignment guaranteed by the slot.
    pub const fn align() -> usize {
        core::mem::align_of::<A>()
    }

    /// Whether a wrapper with the given layout fits this slot.
    #[inline]
    pub const fn fits(layout: Layout) -> bool {
        layout.size() <= N && layout.align() <= core::mem::align_of::<A>()
    }

    /// The error reported when a wrapper with the given layout is rejected.
    fn capacity_error(layout: Layout) -> CapacityError {
        CapacityError::new(layout, N, core::mem::align_of::<A>())
    }

    /// Checks that a wrapper with the given layout fits this slot type,
    /// reporting the violated bounds if it does not.
    pub fn check_fits(layout: Layout) -> Result<(), CapacityError> {
        if Self::fits(layout) {
            Ok(())
        } else {
            Err(Self::capacity_error(layout))
        }
    }

    /// Creates a new [`RawInline`] holding the given value, with the
    /// behavior of handler `H` captured in its vtable.
    ///
    /// A value whose wrapper exceeds the capacity or alignment of the slot
    /// is rejected at compile time.
    #[inline]
    pub fn new<V, H>(value: V) -> Self
    where
        V: Clone + 'static,
        H: ValueHandler<V>,
    {
        const {
            assert!(
                core::mem::size_of::<ValueData<V>>() <= N,
                "value does not fit the inline slot capacity",
            );
            assert!(
                core::mem::align_of::<ValueData<V>>() <= core::mem::align_of::<A>(),
                "value requires stricter alignment than the inline slot provides",
            );
        }

        let mut slot = MaybeUninit::<Self>::uninit();
        let data = ValueData::new::<H>(value);
        // SAFETY: The const block above proves the wrapper fits the buffer,
        // and the buffer sits at offset 0 of the `repr(C)` slot, aligned to
        // `A`.
        unsafe { slot.as_mut_ptr().cast::<ValueData<V>>().write(data) };
        // SAFETY: The buffer now holds a live wrapper; the remaining fields
        // are zero-sized or `MaybeUninit` and need no initialization.
        unsafe { slot.assume_init() }
    }

    /// Creates a new [`RawInline`] holding the given value, returning it
    /// untouched if its wrapper does not fit the slot.
    ///
    /// Unlike [`RawInline::new`], the fit check happens at runtime, so this
    /// can be used where the value may legitimately be too large and another
    /// storage location is available as a fallback.
    pub fn try_new<V, H>(value: V) -> Result<Self, (V, CapacityError)>
    where
        V: Clone + 'static,
        H: ValueHandler<V>,
    {
        let layout = crate::value::wrapper_layout::<V>();
        if !Self::fits(layout) {
            let err = Self::capacity_error(layout);
            return Err((value, err));
        }

        let mut slot = MaybeUninit::<Self>::uninit();
        let data = ValueData::new::<H>(value);
        // SAFETY: The check above proves the wrapper fits the buffer, and the
        // buffer sits at offset 0 of the `repr(C)` slot, aligned to `A`.
        unsafe { slot.as_mut_ptr().cast::<ValueData<V>>().write(data) };
        // SAFETY: The buffer now holds a live wrapper; the remaining fields
        // are zero-sized or `MaybeUninit` and need no initialization.
        Ok(unsafe { slot.assume_init() })
    }

    /// Returns a pointer to the erased wrapper at the start of the buffer.
    #[inline]
    fn data_ptr(&self) -> NonNull<ValueData<Erased>> {
        NonNull::from(&self.bytes).cast::<ValueData<Erased>>()
    }

    /// Returns a borrowed reference to the erased value.
    #[inline]
    pub fn as_ref(&self) -> RawValueRef<'_> {
        // SAFETY: The buffer holds a live wrapper with a matching vtable
        // (type invariant 1), it outlives the borrow of `self`, and it
        // cannot be mutated or relocated while that borrow exists.
        unsafe { RawValueRef::from_ptr(self.data_ptr()) }
    }

    /// Returns a pointer to the erased wrapper, carrying the mutable
    /// provenance of the buffer.
    #[inline]
    fn data_ptr_mut(&mut self) -> NonNull<ValueData<Erased>> {
        NonNull::from(&mut self.bytes).cast::<ValueData<Erased>>()
    }

    /// Accesses the stored value as a `&mut V`, if `V` is its actual type.
    ///
    /// Mutation through the reference cannot change the stored type or the
    /// wrapper's layout, so the fit invariants are unaffected.
    #[inline]
    pub fn downcast_mut<V: 'static>(&mut self) -> Option<&mut V> {
        if self.as_ref().value_type_id() != TypeId::of::<V>() {
            return None;
        }
        let mut ptr = self.data_ptr_mut().cast::<ValueData<V>>();
        // SAFETY: Converting the NonNull pointer to a reference is sound because:
        // - The buffer starts with a live, properly aligned `ValueData<V>`
        //   (type invariants 1 and 2)
        // - The type `V` matches the actual value type (checked against the
        //   vtable above)
        // - The `&mut self` borrow grants exclusive access for the returned
        //   lifetime
        let data = unsafe { ptr.as_mut() };
        Some(data.value_mut())
    }

    /// Clones the value behind `src` into a fresh slot, or reports why it
    /// does not fit.
    ///
    /// The source is unaffected either way.
    pub fn try_clone_from(src: RawValueRef<'_>) -> Result<Self, CapacityError> {
        let layout = src.layout();
        if !Self::fits(layout) {
            return Err(Self::capacity_error(layout));
        }

        let mut slot = MaybeUninit::<Self>::uninit();
        let dst = slot.as_mut_ptr().cast::<u8>();
        // SAFETY: `MaybeUninit::as_mut_ptr` never returns null.
        let dst = unsafe { NonNull::new_unchecked(dst) };
        // SAFETY: The buffer at offset 0 of the slot is unconstructed, large
        // enough, and aligned to `A` which covers the wrapper's alignment
        // (checked above). If the clone panics, `slot` is abandoned without
        // being interpreted as initialized.
        unsafe { src.clone_into_unchecked(dst) };
        // SAFETY: The clone completed, so the buffer holds a live wrapper.
        Ok(unsafe { slot.assume_init() })
    }

    /// Moves the payload of `src` into a smaller or larger slot, or returns
    /// it untouched if it does not fit.
    pub fn try_from_other<const M: usize>(
        src: RawInline<M, A>,
    ) -> Result<Self, (RawInline<M, A>, CapacityError)> {
        let layout = src.as_ref().layout();
        if !Self::fits(layout) {
            let err = Self::capacity_error(layout);
            return Err((src, err));
        }

        let mut slot = MaybeUninit::<Self>::uninit();
        // SAFETY: Distinct non-overlapping buffers; the destination is large
        // enough and aligned (checked above).
        unsafe {
            core::ptr::copy_nonoverlapping(
                src.bytes.as_ptr().cast::<u8>(),
                slot.as_mut_ptr().cast::<u8>(),
                layout.size(),
            )
        };
        // Ownership of the payload moved with its bytes
        core::mem::forget(src);
        // SAFETY: The buffer now holds the relocated live wrapper.
        Ok(unsafe { slot.assume_init() })
    }

    /// Moves a heap-allocated payload into an inline slot, releasing the
    /// allocation, or returns it untouched if it does not fit.
    pub fn try_from_heap(raw: RawValue) -> Result<Self, (RawValue, CapacityError)> {
        let layout = raw.as_ref().layout();
        if !Self::fits(layout) {
            let err = Self::capacity_error(layout);
            return Err((raw, err));
        }

        let mut slot = MaybeUninit::<Self>::uninit();
        // SAFETY: The heap wrapper and the fresh slot do not overlap; the
        // destination is large enough and aligned (checked above).
        unsafe {
            core::ptr::copy_nonoverlapping(
                raw.as_ref().as_ptr().cast::<u8>(),
                slot.as_mut_ptr().cast::<u8>(),
                layout.size(),
            )
        };
        // SAFETY: The payload bytes were relocated into the slot, so the
        // allocation must be released without dropping the value.
        unsafe { raw.release_allocation() };
        // SAFETY: The buffer now holds the relocated live wrapper.
        Ok(unsafe { slot.assume_init() })
    }

    /// Moves the payload onto the heap, consuming the slot without running
    /// the payload's destructor in the buffer.
    pub fn into_heap(self) -> RawValue {
        // SAFETY: Ownership of the payload transfers to the returned
        // `RawValue`; `self` is forgotten below so the buffer copy is never
        // dropped.
        let raw = unsafe { self.promote_untracked() };
        core::mem::forget(self);
        raw
    }

    /// Copies the payload into a fresh heap allocation without invalidating
    /// the buffer.
    ///
    /// # Safety
    ///
    /// The caller must ensure that exactly one of the two copies is treated
    /// as the live payload from here on: either the buffer is overwritten or
    /// forgotten without being dropped, or the returned [`RawValue`] is.
    unsafe fn promote_untracked(&self) -> RawValue {
        let layout = self.as_ref().layout();
        // SAFETY: `layout` comes from a vtable, so it has non-zero size (it
        // includes the vtable pointer) and a valid alignment.
        let ptr = unsafe { alloc::alloc::alloc(layout) };
        let Some(ptr) = NonNull::new(ptr) else {
            alloc::alloc::handle_alloc_error(layout)
        };
        // SAFETY: A fresh allocation cannot overlap the buffer, and it was
        // made with the wrapper's exact layout.
        unsafe {
            core::ptr::copy_nonoverlapping(
                self.bytes.as_ptr().cast::<u8>(),
                ptr.as_ptr(),
                layout.size(),
            )
        };
        // SAFETY: The allocation has the wrapper's exact layout and holds a
        // live copy of it; the caller takes responsibility for the
        // double-ownership window.
        unsafe { RawValue::from_ptr(ptr.cast::<ValueData<Erased>>()) }
    }

    /// Exchanges the payloads of two inline slots of possibly different
    /// capacities.
    ///
    /// Fails without mutating either slot unless each payload fits the
    /// other slot. Same-capacity exchanges cannot fail. No heap allocation
    /// is performed; the payloads travel through a stack temporary.
    pub fn try_swap<const M: usize>(
        &mut self,
        other: &mut RawInline<M, A>,
    ) -> Result<(), CapacityError> {
        let self_layout = self.as_ref().layout();
        let other_layout = other.as_ref().layout();
        if !Self::fits(other_layout) {
            return Err(Self::capacity_error(other_layout));
        }
        if !RawInline::<M, A>::fits(self_layout) {
            return Err(RawInline::<M, A>::capacity_error(self_layout));
        }

        // Three-way shuffle through a stack temporary. Our own payload
        // trivially fits a temporary of our own capacity.
        let mut tmp = MaybeUninit::<Self>::uninit();
        // SAFETY: `tmp` is a distinct stack location with the same capacity
        // and alignment as our buffer.
        unsafe {
            core::ptr::copy_nonoverlapping(
                self.bytes.as_ptr().cast::<u8>(),
                tmp.as_mut_ptr().cast::<u8>(),
                self_layout.size(),
            )
        };
        // SAFETY: `self` and `other` are distinct `&mut`, so the buffers do
        // not overlap; the incoming payload fits (checked above).
        unsafe {
            core::ptr::copy_nonoverlapping(
                other.bytes.as_ptr().cast::<u8>(),
                self.bytes.as_mut_ptr().cast::<u8>(),
                other_layout.size(),
            )
        };
        // SAFETY: The temporary does not overlap `other`; our old payload
        // fits `other` (checked above).
        unsafe {
            core::ptr::copy_nonoverlapping(
                tmp.as_ptr().cast::<u8>(),
                other.bytes.as_mut_ptr().cast::<u8>(),
                self_layout.size(),
            )
        };
        Ok(())
    }

    /// Exchanges this slot's payload with a heap-allocated one.
    ///
    /// Fails without mutating either side if the heap payload does not fit
    /// the buffer. On success the old inline payload lives in a fresh heap
    /// allocation owned by `heap`, and the old heap allocation is released.
    pub fn swap_with_heap(&mut self, heap: &mut RawValue) -> Result<(), CapacityError> {
        let incoming = heap.as_ref().layout();
        if !Self::fits(incoming) {
            return Err(Self::capacity_error(incoming));
        }

        // Promote our payload first, so the only fallible step (allocation)
        // happens before anything is mutated.
        // SAFETY: Ownership of the buffer payload transfers to `promoted`;
        // the buffer is overwritten below without being dropped.
        let promoted = unsafe { self.promote_untracked() };
        // SAFETY: `heap` is temporarily duplicated; none of the operations
        // up to the final write can unwind, so exactly one copy survives.
        let old = unsafe { core::ptr::read(heap) };
        // SAFETY: The heap wrapper and the buffer do not overlap, and the
        // incoming payload fits the buffer (checked above).
        unsafe {
            core::ptr::copy_nonoverlapping(
                old.as_ref().as_ptr().cast::<u8>(),
                self.bytes.as_mut_ptr().cast::<u8>(),
                incoming.size(),
            )
        };
        // SAFETY: The payload bytes were relocated into the buffer, so the
        // old allocation must be released without dropping the value.
        unsafe { old.release_allocation() };
        // SAFETY: Overwrites the duplicated `RawValue` with the promoted
        // payload, restoring unique ownership of both values.
        unsafe { core::ptr::write(heap, promoted) };
        Ok(())
    }
}

impl<const N: usize, A: Alignment> Clone for RawInline<N, A> {
    fn clone(&self) -> Self {
        match Self::try_clone_from(self.as_ref()) {
            Ok(slot) => slot,
            // The payload fit this capacity when it was stored (type
            // invariant 2), so a same-capacity clone cannot be rejected.
            Err(_) => unreachable!(),
        }
    }
}

impl<const N: usize, A: Alignment> core::ops::Drop for RawInline<N, A> {
    #[inline]
    fn drop(&mut self) {
        let vtable = self.as_ref().vtable();
        // SAFETY:
        // 1. The buffer holds a live wrapper (type invariant 1).
        // 2. The vtable returned by `self.as_ref().vtable()` is guaranteed to
        //    match the wrapper.
        // 3. We are in drop, so the buffer is not used again.
        unsafe { vtable.drop_in_place(self.data_ptr()) };
    }
}
