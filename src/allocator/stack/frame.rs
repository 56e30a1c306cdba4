//! RAII-based stack frame for automatic restoration

use super::{StackAllocator, StackMarker};

/// RAII helper for stack-based scoped allocation
///
/// Captures a marker on creation and releases back to it on drop, so every
/// allocation made through the frame is reclaimed when the frame ends.
///
/// # Examples
///
/// ```rust
/// use arena_memory::allocator::{StackAllocator, StackFrame};
///
/// let mut stack = StackAllocator::new(1024)?;
/// {
///     let frame = StackFrame::new(&mut stack);
///     let value = frame.allocator().allocate(1u32).expect("stack has room");
///     assert_eq!(*value, 1);
/// } // frame drops, the allocation is released
/// assert_eq!(stack.used(), 0);
/// # Ok::<(), arena_memory::AllocError>(())
/// ```
pub struct StackFrame<'a> {
    allocator: &'a mut StackAllocator,
    marker: StackMarker,
}

impl<'a> StackFrame<'a> {
    /// Creates a frame that restores the current position when dropped
    pub fn new(allocator: &'a mut StackAllocator) -> Self {
        let marker = allocator.mark();
        Self { allocator, marker }
    }

    /// Gets the underlying allocator for allocation
    ///
    /// The shared borrow ties everything allocated through it to the
    /// frame, so no reference can survive the restore on drop.
    pub fn allocator(&self) -> &StackAllocator {
        self.allocator
    }

    /// Manually restore and consume this frame
    pub fn restore(self) {
        drop(self);
    }
}

impl Drop for StackFrame<'_> {
    fn drop(&mut self) {
        self.allocator.release(self.marker);
    }
}
