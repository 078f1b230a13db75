//! Convenience re-export of the items most code needs.
//!
//! ```
//! use polystore::prelude::*;
//!
//! let handle: Storage<Hybrid<Inert, 64>> = Storage::new(7_u32);
//! assert_eq!(handle.downcast_ref::<u32>(), Some(&7));
//! ```

pub use crate::{
    CapacityError, Hybrid, Inert, Invokable, Invoke, OnHeap, OnStack, Policy, Storage, SwapWith,
    swap::{swap, try_swap},
};
