//! Marker types fixing the alignment of inline buffers.
//!
//! An inline slot such as [`RawInline`] cannot take its alignment as a
//! `const` parameter, because `#[repr(align(N))]` does not accept generic
//! arguments. Instead the slot takes one of the zero-sized marker types
//! defined here; embedding a `[A; 0]` field raises the slot's alignment to
//! that of the marker without occupying any space.
//!
//! [`RawInline`]: crate::RawInline

/// Alignment guarantee provided by an inline slot.
///
/// Implemented only by the zero-sized marker types in this module. The
/// alignment a marker stands for is simply `align_of::<Self>()`.
pub trait Alignment: sealed::Sealed + Copy + 'static {}

/// Private module preventing downstream implementations of [`Alignment`].
mod sealed {
    /// Sealing trait for [`Alignment`](super::Alignment).
    pub trait Sealed {}
}

/// Declares one alignment marker type.
macro_rules! alignment_marker {
    ($(#[$doc:meta])* $name:ident, $align:literal) => {
        $(#[$doc])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
        #[repr(align($align))]
        pub struct $name;

        impl sealed::Sealed for $name {}
        impl Alignment for $name {}
    };
}

alignment_marker!(
    /// Buffer aligned to 1 byte.
    Align1, 1
);
alignment_marker!(
    /// Buffer aligned to 2 bytes.
    Align2, 2
);
alignment_marker!(
    /// Buffer aligned to 4 bytes.
    Align4, 4
);
alignment_marker!(
    /// Buffer aligned to 8 bytes.
    Align8, 8
);
alignment_marker!(
    /// Buffer aligned to 16 bytes. The default for the storage policies.
    Align16, 16
);
alignment_marker!(
    /// Buffer aligned to 32 bytes.
    Align32, 32
);
alignment_marker!(
    /// Buffer aligned to 64 bytes.
    Align64, 64
);
alignment_marker!(
    /// Buffer aligned to 128 bytes.
    Align128, 128
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn markers_are_zero_sized() {
        assert_eq!(core::mem::size_of::<Align1>(), 0);
        // A zero-sized type keeps its alignment even with no payload.
        assert_eq!(core::mem::align_of::<Align1>(), 1);
        assert_eq!(core::mem::align_of::<Align16>(), 16);
        assert_eq!(core::mem::align_of::<Align128>(), 128);
    }
}
