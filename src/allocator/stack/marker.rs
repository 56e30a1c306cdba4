//! Position markers for scoped deallocation

/// Snapshot of a [`StackAllocator`](super::StackAllocator) position
///
/// Captures the head cursor and the length of the deferred-destructor list
/// at the moment [`mark`](super::StackAllocator::mark) was called. Passing
/// the marker to [`release`](super::StackAllocator::release) rewinds the
/// allocator to exactly this state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StackMarker {
    pub(crate) head: usize,
    pub(crate) droppers: usize,
}
