#![cfg_attr(not(doc), no_std)]
#![deny(
    missing_docs,
    clippy::alloc_instead_of_core,
    clippy::std_instead_of_alloc,
    clippy::std_instead_of_core,
    clippy::missing_safety_doc,
    clippy::undocumented_unsafe_blocks,
    clippy::multiple_unsafe_ops_per_block,
    clippy::as_ptr_cast_mut,
    clippy::ptr_as_ptr,
    rustdoc::invalid_rust_codeblocks,
    rustdoc::broken_intra_doc_links,
    missing_copy_implementations,
    unused_doc_comments
)]

//! Type-erased value storage with pluggable placement policies.
//!
//! ## Overview
//!
//! This crate stores values of arbitrary types behind a uniform handle,
//! [`Storage`], while letting the caller choose **where** each value lives:
//!
//! - [`OnHeap`] keeps the value in its own allocation; the handle is one
//!   pointer wide and swaps are pointer swaps.
//! - [`OnStack`] keeps the value in a fixed-capacity buffer inside the
//!   handle; no allocation ever happens, and oversized values are rejected
//!   at compile time.
//! - [`Hybrid`] keeps small values in a buffer and spills large ones to the
//!   heap, trading the hard capacity limit for occasional allocation.
//!
//! All three expose the same API, and handles of *different* policies
//! interoperate: payloads can be swapped or transferred across policy and
//! capacity boundaries, with infeasible moves reported as [`CapacityError`]
//! before anything is mutated.
//!
//! ## Quick Example
//!
//! ```
//! use polystore::{Invokable, OnHeap, OnStack, Storage};
//!
//! #[derive(Clone, Debug)]
//! struct Task(u32);
//!
//! impl Invokable for Task {
//!     fn invoke(&self) {
//!         println!("running task {}", self.0);
//!     }
//! }
//!
//! // Same payload type, different placement.
//! let mut boxed: Storage<OnHeap> = Storage::new(Task(1));
//! let mut inline: Storage<OnStack<_, 64>> = Storage::new(Task(2));
//!
//! // The handles interoperate regardless.
//! boxed.swap(&mut inline);
//! boxed.invoke(); // running task 2
//! assert_eq!(inline.downcast_ref::<Task>().map(|t| t.0), Some(1));
//! ```
//!
//! ## Core Concepts
//!
//! **Erasure.** A stored value is wrapped together with a vtable pointer;
//! the handle only ever sees the erased wrapper. Cloning, dropping,
//! formatting and the forwarded domain action all dispatch through the
//! vtable, so a handle's type names the policy, never the payload.
//!
//! **Handlers.** The behavior available through a handle is captured at
//! construction by a [`ValueHandler`]. The built-in [`Invoke`] handler
//! forwards [`Storage::invoke`] to the value's [`Invokable`] impl; the
//! built-in [`Inert`] handler is for pure containers. Custom handlers can
//! capture any other per-type behavior.
//!
//! **Relocation.** Values move between buffers and allocations by byte
//! copy, with the source abandoned rather than dropped. This is what makes
//! cross-policy swaps and transfers cheap: no clone is ever involved, and
//! a failed operation leaves both sides exactly as they were.
//!
//! ## Choosing a policy
//!
//! Reach for [`OnHeap`] by default, [`OnStack`] when allocation is off the
//! table and the payload sizes are known, and [`Hybrid`] when most
//! payloads are small but outliers must still be storable. The capacity
//! arithmetic is public on [`Builder`], so the fit of a given type can be
//! checked where the policy is chosen.

extern crate alloc;

mod builder;
mod handlers;
mod policy;
pub mod prelude;
mod storage;
mod swap;

pub use polystore_internals::{
    CapacityError, RawValue, RawValueRef, alignment, handlers::ValueHandler,
};

pub use crate::{
    builder::Builder,
    handlers::{Inert, Invokable, Invoke},
    policy::{Construct, Hybrid, OnHeap, OnStack, Policy, TransferFrom},
    storage::Storage,
    swap::{SwapWith, swap, try_swap},
};
