//! Allocation error types
//!
//! A single error type covers all fallible allocator operations. Exhaustion
//! of the pool and stack allocators is reported as `None` rather than an
//! error; precondition violations (bad markers, zero-size requests) are
//! assertion failures, not errors.

use core::alloc::Layout;
use core::fmt;

/// Result type for allocation operations
pub type AllocResult<T> = Result<T, AllocError>;

/// Allocation error kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AllocErrorKind {
    /// No free chunk is large enough for the request
    OutOfMemory,
    /// The handle pool has reached its configured capacity
    OutOfHandles,
    /// The handle does not refer to a live block of this allocator
    InvalidHandle,
    /// Size overflow when computing the total allocation size
    SizeOverflow,
    /// Invalid layout parameters
    InvalidLayout,
}

impl AllocErrorKind {
    /// Returns a static string describing the error
    pub const fn as_str(&self) -> &'static str {
        match self {
            AllocErrorKind::OutOfMemory => "out of memory",
            AllocErrorKind::OutOfHandles => "out of memory handles",
            AllocErrorKind::InvalidHandle => "invalid handle",
            AllocErrorKind::SizeOverflow => "size overflow",
            AllocErrorKind::InvalidLayout => "invalid layout",
        }
    }
}

impl fmt::Display for AllocErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Error returned by fallible allocator operations
///
/// Carries the specific failure [`kind`](AllocError::kind) and, where it is
/// known, the [`Layout`] of the request that failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AllocError {
    kind: AllocErrorKind,
    layout: Option<Layout>,
}

impl AllocError {
    /// Creates an error of the given kind without layout information
    #[inline]
    pub const fn new(kind: AllocErrorKind) -> Self {
        Self { kind, layout: None }
    }

    /// Creates an error of the given kind with the layout that failed
    #[inline]
    pub const fn with_layout(kind: AllocErrorKind, layout: Layout) -> Self {
        Self {
            kind,
            layout: Some(layout),
        }
    }

    /// Creates an out-of-memory error for a request of `size` bytes
    pub fn out_of_memory(size: usize) -> Self {
        match Layout::from_size_align(size, 1) {
            Ok(layout) => Self::with_layout(AllocErrorKind::OutOfMemory, layout),
            Err(_) => Self::new(AllocErrorKind::OutOfMemory),
        }
    }

    /// Creates an out-of-handles error
    #[inline]
    pub const fn out_of_handles() -> Self {
        Self::new(AllocErrorKind::OutOfHandles)
    }

    /// Creates an invalid-handle error
    #[inline]
    pub const fn invalid_handle() -> Self {
        Self::new(AllocErrorKind::InvalidHandle)
    }

    /// Creates a size-overflow error
    #[inline]
    pub const fn size_overflow() -> Self {
        Self::new(AllocErrorKind::SizeOverflow)
    }

    /// Returns the specific error kind
    #[inline]
    pub const fn kind(&self) -> AllocErrorKind {
        self.kind
    }

    /// Returns the layout associated with this error, if any
    #[inline]
    pub const fn layout(&self) -> Option<Layout> {
        self.layout
    }

    /// Checks if this is an out-of-memory error
    #[inline]
    pub const fn is_out_of_memory(&self) -> bool {
        matches!(self.kind, AllocErrorKind::OutOfMemory)
    }

    /// Checks if this is an out-of-handles error
    #[inline]
    pub const fn is_out_of_handles(&self) -> bool {
        matches!(self.kind, AllocErrorKind::OutOfHandles)
    }

    /// Checks if this is an invalid-handle error
    #[inline]
    pub const fn is_invalid_handle(&self) -> bool {
        matches!(self.kind, AllocErrorKind::InvalidHandle)
    }
}

impl fmt::Display for AllocError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.layout {
            Some(layout) => write!(
                f,
                "allocation failed ({}): {} bytes with alignment {}",
                self.kind,
                layout.size(),
                layout.align()
            ),
            None => write!(f, "allocation failed ({})", self.kind),
        }
    }
}

impl std::error::Error for AllocError {}
