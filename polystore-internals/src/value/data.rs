//! This module encapsulates the fields of the [`ValueData`]. Since this is
//! the only place they are visible, this means that the type of the
//! [`ValueVtable`] is guaranteed to always be in sync with the type of the
//! actual value. This follows from the fact that they are in sync when
//! created and that the API offers no way to change the [`ValueVtable`] or
//! value type after creation.

use crate::{
    handlers::ValueHandler,
    value::{raw::RawValueRef, vtable::ValueVtable},
};

/// Type-erased value wrapper with vtable-based dispatch.
///
/// This struct uses `#[repr(C)]` to enable safe field access in type-erased
/// contexts, allowing access to the vtable field even when the concrete
/// value type `V` is unknown. This is what every storage slot physically
/// holds: one vtable pointer followed by the value itself, so
/// `size_of::<ValueData<V>>()` is the capacity a slot must provide for `V`.
#[repr(C)]
pub(crate) struct ValueData<V: 'static> {
    /// The vtable of this value
    vtable: &'static ValueVtable,
    /// The actual stored value
    value: V,
}

impl<V: 'static> ValueData<V> {
    /// Creates a new [`ValueData`] wrapping the given value, with the
    /// behavior of handler `H` baked into the vtable.
    #[inline]
    pub(super) fn new<H: ValueHandler<V>>(value: V) -> Self
    where
        V: Clone,
    {
        Self {
            vtable: ValueVtable::new::<V, H>(),
            value,
        }
    }

    /// Mutable access to the wrapped value.
    ///
    /// The vtable is not reachable through the returned reference, so the
    /// pairing between vtable and value type stays intact.
    #[inline]
    pub(super) fn value_mut(&mut self) -> &mut V {
        &mut self.value
    }
}

impl<'a> RawValueRef<'a> {
    /// Returns a reference to the [`ValueVtable`] of the [`ValueData`]
    /// instance.
    #[inline]
    pub(super) fn vtable(self) -> &'static ValueVtable {
        let ptr = self.as_ptr();
        // SAFETY: We don't know the actual inner value type, but we do know
        // that it points to an instance of `ValueData<V>` for some specific `V`.
        // Since `ValueData<V>` is `#[repr(C)]`, that means that it's safe to
        // create pointers to the fields before the actual value.
        //
        // We need to take care to avoid creating an actual reference to the
        // `ValueData` itself though, as that would still be undefined behavior
        // since we don't have the right type.
        let vtable_ptr: *const &'static ValueVtable = unsafe { &raw const (*ptr).vtable };

        // SAFETY: Dereferencing the pointer and getting out the `&'static
        // ValueVtable` is valid for the same reasons
        unsafe { *vtable_ptr }
    }

    /// Accesses the inner value of the [`ValueData`] instance as a reference
    /// to the specified type.
    ///
    /// # Safety
    ///
    /// The caller must ensure that the type `V` matches the actual value
    /// type stored in the [`ValueData`].
    #[inline]
    pub unsafe fn downcast_unchecked<V: 'static>(self) -> &'a V {
        // SAFETY: The inner function requires that `V` matches the type stored,
        // but that is guaranteed by our caller.
        let this = unsafe { self.cast_inner::<V>() };
        &this.value
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn value_field_offsets() {
        use core::mem::{offset_of, size_of};

        #[repr(align(32))]
        struct LargeAlignment {
            _value: u8,
        }

        assert_eq!(offset_of!(ValueData<u8>, vtable), 0);
        assert_eq!(offset_of!(ValueData<u32>, vtable), 0);
        assert_eq!(offset_of!(ValueData<[u64; 4]>, vtable), 0);
        assert_eq!(offset_of!(ValueData<LargeAlignment>, vtable), 0);

        assert!(offset_of!(ValueData<u8>, value) >= size_of::<&'static ValueVtable>());
        assert!(offset_of!(ValueData<[u64; 4]>, value) >= size_of::<&'static ValueVtable>());
        assert!(offset_of!(ValueData<LargeAlignment>, value) >= size_of::<&'static ValueVtable>());
    }
}
