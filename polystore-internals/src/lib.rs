#![no_std]
#![forbid(
    missing_docs,
    clippy::alloc_instead_of_core,
    clippy::std_instead_of_alloc,
    clippy::std_instead_of_core,
    clippy::missing_safety_doc,
    clippy::missing_docs_in_private_items,
    clippy::undocumented_unsafe_blocks,
    clippy::multiple_unsafe_ops_per_block,
    rustdoc::invalid_rust_codeblocks,
    rustdoc::broken_intra_doc_links,
    missing_copy_implementations,
    unused_doc_comments
)]
#![allow(rustdoc::private_intra_doc_links)]
//! Internal implementation crate for [`polystore`].
//!
//! # Overview
//!
//! This crate contains the low-level, type-erased value slots and unsafe
//! operations that power the [`polystore`] storage library. It provides the
//! foundation for zero-cost type erasure through vtable-based dispatch and
//! for relocating erased values between heap allocations and fixed-capacity
//! inline buffers.
//!
//! **This crate is an implementation detail.** No semantic versioning
//! guarantees are provided. Users should depend on the [`polystore`] crate,
//! not this one.
//!
//! # Architecture
//!
//! - **[`value`]**: Type-erased value slots
//!   - [`RawValue`]: Owned value in a [`Box`]-style heap allocation
//!   - [`RawValueRef`]: Borrowed reference to an erased value
//!   - [`RawInline`]: Owned value living inside a fixed-capacity inline buffer
//!   - [`ValueData`]: `#[repr(C)]` wrapper enabling field access on erased types
//!   - [`ValueVtable`]: Function pointers for type-erased dispatch
//!
//! - **[`handlers`]**: The behavior contract captured per value type
//!   - [`ValueHandler`]: Defines the forwarded domain action and formatting
//!
//! - **[`alignment`]**: Marker types fixing the alignment of inline buffers
//!
//! # Safety Strategy
//!
//! Type erasure requires careful handling to maintain Rust's type safety
//! guarantees. When we erase a type like `ValueData<MyValue>` to
//! `ValueData<Erased>`, we must ensure that the vtable function pointers
//! still match the actual concrete type stored in memory.
//!
//! This crate maintains safety through:
//!
//! - **Module-based encapsulation**: Safety-critical types keep fields
//!   module-private, making invariants locally verifiable within a single file
//! - **`#[repr(C)]` layout**: Enables safe field projection on type-erased
//!   pointers without constructing invalid references
//! - **Documented vtable contracts**: Each vtable method specifies exactly when
//!   it can be safely called
//!
//! A second pillar is *relocation*: every Rust value may be moved by copying
//! its bytes to a new location, provided the old location is abandoned
//! without running its destructor. The slot types use this to move erased
//! payloads between heap allocations and inline buffers while dispatching
//! clone and drop through the vtable.
//!
//! [`polystore`]: https://docs.rs/polystore/latest/polystore/
//! [`ValueData`]: value::data::ValueData
//! [`ValueVtable`]: value::vtable::ValueVtable
//! [`ValueHandler`]: handlers::ValueHandler
//! [`Box`]: alloc::boxed::Box

extern crate alloc;

pub mod alignment;
mod error;
pub mod handlers;
mod util;
mod value;

pub use error::CapacityError;
pub use value::{RawInline, RawValue, RawValueRef, wrapper_layout};
