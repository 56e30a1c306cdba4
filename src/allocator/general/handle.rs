//! Relocation-stable block handles
//!
//! User code must hold blocks through a [`Handle`] so that pointer
//! validity survives defragmentation: the handle names a slot record
//! inside the allocator, and the slot tracks the block's current offset
//! wherever it moves. Dereference goes through the owning allocator
//! (`get`, `get_slice`, …), which validates the handle on every access.

use core::fmt;
use core::marker::PhantomData;
use core::mem;
use core::ptr;

/// Stable, opaque identity for a block of `T` elements
///
/// Handles are small `Copy` descriptors. They stay valid across
/// [`defragment`](super::GeneralAllocator::defragment), and become invalid
/// (rejected on every access) after
/// [`deallocate`](super::GeneralAllocator::deallocate). A handle is only
/// meaningful to the allocator that issued it.
pub struct Handle<T> {
    slot: usize,
    generation: u32,
    _marker: PhantomData<fn() -> T>,
}

impl<T> Handle<T> {
    pub(crate) fn new(slot: usize, generation: u32) -> Self {
        Self {
            slot,
            generation,
            _marker: PhantomData,
        }
    }

    pub(crate) fn slot(&self) -> usize {
        self.slot
    }

    pub(crate) fn generation(&self) -> u32 {
        self.generation
    }
}

impl<T> Clone for Handle<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for Handle<T> {}

impl<T> PartialEq for Handle<T> {
    fn eq(&self, other: &Self) -> bool {
        self.slot == other.slot && self.generation == other.generation
    }
}

impl<T> Eq for Handle<T> {}

impl<T> fmt::Debug for Handle<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Handle")
            .field("slot", &self.slot)
            .field("generation", &self.generation)
            .finish()
    }
}

/// Record backing one handle inside the allocator
///
/// A slot is either live (offset set, sizes and routines describing the
/// block) or vacant (offset cleared, waiting on the free-slot list).
/// Reuse bumps the generation so stale handles to the old incarnation
/// stop validating.
pub(crate) struct HandleSlot {
    /// Current offset of the block from the arena base; `None` when vacant
    pub offset: Option<usize>,
    /// Block size in bytes
    pub total_size: usize,
    /// Size of one element in bytes
    pub elem_size: usize,
    /// Incremented every time the slot is retired
    pub generation: u32,
    /// Moves the block's elements to a new address
    pub relocate: unsafe fn(*mut u8, *mut u8, usize),
    /// Destroys the block's elements; `None` for types without drop glue
    pub drop_elems: Option<unsafe fn(*mut u8, usize)>,
}

impl HandleSlot {
    pub(crate) fn vacant() -> Self {
        Self {
            offset: None,
            total_size: 0,
            elem_size: 0,
            generation: 0,
            relocate: relocate_nothing,
            drop_elems: None,
        }
    }

    /// Number of elements in the block (live slots only)
    pub(crate) fn element_count(&self) -> usize {
        self.total_size / self.elem_size
    }
}

/// Moves `count` elements of `T` from `src` to `dst`
///
/// A Rust move is a bitwise relocation with no source destructor, so one
/// overlap-safe typed copy covers every `T`. The monomorphized routine is
/// stored per block, keeping relocation typed even though the allocator
/// holds blocks of many element types.
///
/// # Safety
/// `src` must hold `count` live elements; `dst` must be in bounds for
/// them. Overlapping ranges are fine.
pub(crate) unsafe fn relocate_elements<T>(src: *mut u8, dst: *mut u8, count: usize) {
    // Compaction adds no alignment padding either; the caller's sizing
    // contract keeps packed offsets aligned.
    debug_assert!(
        dst as usize % mem::align_of::<T>() == 0,
        "relocation target is not aligned for the element type"
    );
    // SAFETY: forwarded from the caller's contract.
    unsafe { ptr::copy(src.cast::<T>(), dst.cast::<T>(), count) }
}

/// Runs the destructor of `count` elements of `T` at `data`
///
/// # Safety
/// `data` must hold `count` live elements, which are dead afterwards.
pub(crate) unsafe fn drop_elements<T>(data: *mut u8, count: usize) {
    // SAFETY: forwarded from the caller's contract.
    unsafe { ptr::drop_in_place(ptr::slice_from_raw_parts_mut(data.cast::<T>(), count)) }
}

/// Placeholder routine for vacant slots
unsafe fn relocate_nothing(_src: *mut u8, _dst: *mut u8, _count: usize) {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn handles_compare_by_slot_and_generation() {
        let a: Handle<u32> = Handle::new(3, 0);
        let b: Handle<u32> = Handle::new(3, 0);
        let stale: Handle<u32> = Handle::new(3, 1);

        assert_eq!(a, b);
        assert_ne!(a, stale);
    }

    #[test]
    fn vacant_slot_has_no_offset() {
        let slot = HandleSlot::vacant();
        assert!(slot.offset.is_none());
        assert_eq!(slot.generation, 0);
    }
}
