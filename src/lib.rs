//! # arena-memory
//!
//! Arena-based memory allocators for applications that need to control
//! placement, lifetime, and locality of objects without paying for a
//! general-purpose heap allocation on every object:
//!
//! - [`PoolAllocator`] — O(1) allocation of fixed-size slots from a
//!   preallocated slab, free slots chained through an intrusive free list
//! - [`StackAllocator`] — LIFO allocation from a contiguous buffer with
//!   marker-based rewind and deferred destructor invocation
//! - [`GeneralAllocator`] — variable-size allocation from a single arena
//!   with first-fit placement, coalescing free, and online defragmentation
//!   behind relocation-stable [`Handle`]s
//!
//! ## Quick Start
//!
//! ```rust
//! use arena_memory::prelude::*;
//!
//! let mut arena = GeneralAllocator::new(1024)?;
//! let handle = arena.allocate(42u64)?;
//!
//! // blocks may move under defragmentation; dereference through the handle
//! arena.defragment();
//! assert_eq!(*arena.get(&handle)?, 42);
//!
//! arena.deallocate(&handle)?;
//! assert!(!arena.is_handle_valid(&handle));
//! # Ok::<(), arena_memory::AllocError>(())
//! ```
//!
//! ## Features
//!
//! - `logging`: emit allocation and defragmentation diagnostics via
//!   [`tracing`](https://docs.rs/tracing)
//!
//! ## Threading
//!
//! All allocators are single-threaded by design: no locking, no atomics.
//! None of the types are `Sync`; wrap an allocator in external mutual
//! exclusion if it must be shared.
//!
//! [`PoolAllocator`]: allocator::PoolAllocator
//! [`StackAllocator`]: allocator::StackAllocator
//! [`GeneralAllocator`]: allocator::GeneralAllocator
//! [`Handle`]: allocator::Handle

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(rust_2018_idioms)]

pub mod allocator;
pub mod error;
pub mod utils;

pub use crate::error::{AllocError, AllocErrorKind, AllocResult};

pub mod prelude {
    //! Convenient re-exports of commonly used types and traits.

    pub use crate::allocator::{
        GeneralAllocator, GeneralConfig, Handle, PoolAllocator, PoolBox, PoolConfig,
        StackAllocator, StackConfig, StackFrame, StackMarker,
    };
    pub use crate::allocator::{AllocatorStats, MemoryUsage, StatisticsProvider};
    pub use crate::error::{AllocError, AllocErrorKind, AllocResult};
}
