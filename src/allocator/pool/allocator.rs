//! Main pool allocator implementation
//!
//! # Safety
//!
//! - Every slot is sized and aligned for both `T` and the free-list link,
//!   so a slot is either a live `T` or a link to the next free slot
//! - The free list contains only slots inside the slab bounds
//! - Live slots are reachable only through the [`PoolBox`] handed out for
//!   them; free slots only through the free-list head
//!
//! The allocator is single-threaded: the free-list head lives in a `Cell`
//! and the type is deliberately `!Sync`.

use core::alloc::Layout;
use core::cell::Cell;
use core::marker::PhantomData;
use core::mem;
use core::ptr::{self, NonNull};
use std::alloc::{alloc, dealloc, handle_alloc_error};

use super::{PoolBox, PoolConfig};
use crate::allocator::{AllocatorStats, MemoryUsage, StatisticsProvider};
use crate::error::{AllocError, AllocErrorKind, AllocResult};
use crate::utils::align_up;

/// Link stored in the first bytes of a free slot
#[repr(C)]
struct FreeSlot {
    next: *mut FreeSlot,
}

/// Pool allocator for fixed-size slots of `T`
///
/// Manages a slab of equally-sized slots through an intrusive free list.
/// Allocation pops the list head, deallocation pushes the slot back; both
/// are O(1) and never touch the rest of the slab.
///
/// # Memory Layout
/// ```text
/// [Slot0][Slot1][Slot2][Slot3]...[SlotN]
///    ↓       ↓              ↓
/// [free] → [free]    →    [free] → null      (live slots hold a T)
/// ```
///
/// # Examples
///
/// ```rust
/// use arena_memory::allocator::PoolAllocator;
///
/// let pool: PoolAllocator<u64> = PoolAllocator::new(16)?;
/// let value = pool.allocate(7).expect("pool has room");
/// assert_eq!(*value, 7);
/// drop(value); // slot returns to the free list
/// assert_eq!(pool.free_slots(), 16);
/// # Ok::<(), arena_memory::AllocError>(())
/// ```
pub struct PoolAllocator<T> {
    /// Owned slab holding every slot
    memory: NonNull<u8>,

    /// Layout the slab was allocated with
    layout: Layout,

    /// Size of each slot, aligned for both `T` and the free-list link
    slot_size: usize,

    /// Number of slots in the slab
    slot_count: usize,

    /// Head of the intrusive free list
    free_head: Cell<*mut FreeSlot>,

    /// Number of slots currently on the free list
    free_count: Cell<usize>,

    /// Slab bounds, cached for pointer validation
    start_addr: usize,
    end_addr: usize,

    config: PoolConfig,

    total_allocs: Cell<usize>,
    total_deallocs: Cell<usize>,
    peak_usage: Cell<usize>,

    _marker: PhantomData<T>,
}

impl<T> PoolAllocator<T> {
    /// Creates a pool of `capacity` slots with custom configuration
    ///
    /// # Errors
    /// Returns an error if `capacity` is zero or the slab size overflows.
    pub fn with_config(capacity: usize, config: PoolConfig) -> AllocResult<Self> {
        if capacity == 0 {
            return Err(AllocError::new(AllocErrorKind::InvalidLayout));
        }

        // A slot must be able to hold the free-list link while unused.
        let slot_align = mem::align_of::<T>().max(mem::align_of::<FreeSlot>());
        let slot_size = align_up(
            mem::size_of::<T>().max(mem::size_of::<FreeSlot>()),
            slot_align,
        );

        let total_size = slot_size
            .checked_mul(capacity)
            .ok_or_else(AllocError::size_overflow)?;
        let layout = Layout::from_size_align(total_size, slot_align)
            .map_err(|_| AllocError::new(AllocErrorKind::InvalidLayout))?;

        // SAFETY: layout has non-zero size (capacity and slot_size are
        // both non-zero here).
        let raw = unsafe { alloc(layout) };
        let Some(memory) = NonNull::new(raw) else {
            handle_alloc_error(layout);
        };

        let start_addr = memory.as_ptr() as usize;
        let allocator = Self {
            memory,
            layout,
            slot_size,
            slot_count: capacity,
            free_head: Cell::new(ptr::null_mut()),
            free_count: Cell::new(0),
            start_addr,
            end_addr: start_addr + total_size,
            config,
            total_allocs: Cell::new(0),
            total_deallocs: Cell::new(0),
            peak_usage: Cell::new(0),
            _marker: PhantomData,
        };

        allocator.initialize_free_list();
        Ok(allocator)
    }

    /// Creates a pool of `capacity` slots with default configuration
    pub fn new(capacity: usize) -> AllocResult<Self> {
        Self::with_config(capacity, PoolConfig::default())
    }

    /// Allocates a slot and moves `value` into it
    ///
    /// Pops the free-list head; returns `None` when the pool is exhausted.
    /// The returned [`PoolBox`] gives the slot back when dropped.
    pub fn allocate(&self, value: T) -> Option<PoolBox<'_, T>> {
        let head = self.free_head.get();
        if head.is_null() {
            return None;
        }

        // SAFETY: head came from the free list, so it points to a free
        // slot inside the slab and its link field is initialized.
        let next = unsafe { (*head).next };
        self.free_head.set(next);
        self.free_count.set(self.free_count.get() - 1);

        if self.config.track_stats {
            self.total_allocs.set(self.total_allocs.get() + 1);
            let used = (self.slot_count - self.free_count.get()) * self.slot_size;
            if used > self.peak_usage.get() {
                self.peak_usage.set(used);
            }
        }

        if let Some(pattern) = self.config.alloc_pattern {
            // SAFETY: the slot is ours now; slot_size bytes are in bounds.
            unsafe { ptr::write_bytes(head.cast::<u8>(), pattern, self.slot_size) };
        }

        let slot = head.cast::<T>();
        // SAFETY: the slot is free, in bounds, and aligned for T.
        unsafe { slot.write(value) };

        let slot = NonNull::new(slot)?;
        Some(PoolBox::new(slot, self))
    }

    /// Returns the number of slots in the pool
    pub fn capacity(&self) -> usize {
        self.slot_count
    }

    /// Returns the size of each slot in bytes
    pub fn slot_size(&self) -> usize {
        self.slot_size
    }

    /// Returns the number of free slots
    pub fn free_slots(&self) -> usize {
        self.free_count.get()
    }

    /// Returns the number of allocated slots
    pub fn allocated_slots(&self) -> usize {
        self.slot_count - self.free_count.get()
    }

    /// Checks if the pool has no free slots left
    pub fn is_full(&self) -> bool {
        self.free_head.get().is_null()
    }

    /// Checks if all slots are free
    pub fn is_empty(&self) -> bool {
        self.free_count.get() == self.slot_count
    }

    /// Checks if a pointer falls inside this pool's slab
    pub fn contains(&self, ptr: *const u8) -> bool {
        let addr = ptr as usize;
        addr >= self.start_addr && addr < self.end_addr
    }

    /// Links every slot onto the free list, last slot first
    fn initialize_free_list(&self) {
        let mut prev: *mut FreeSlot = ptr::null_mut();

        for i in (0..self.slot_count).rev() {
            // SAFETY: i * slot_size is within the slab; the slab start is
            // aligned for FreeSlot and slot_size is a multiple of its
            // alignment, so every slot start is aligned too.
            let slot = unsafe { self.memory.as_ptr().add(i * self.slot_size) }.cast::<FreeSlot>();
            unsafe { (*slot).next = prev };
            prev = slot;
        }

        self.free_head.set(prev);
        self.free_count.set(self.slot_count);
    }

    /// Pushes a slot whose value has already been destroyed back onto the
    /// free list
    pub(crate) fn release_slot(&self, slot: NonNull<T>) {
        let slot = slot.as_ptr().cast::<u8>();
        debug_assert!(self.contains(slot));
        debug_assert!((slot as usize - self.start_addr) % self.slot_size == 0);

        if let Some(pattern) = self.config.dealloc_pattern {
            // SAFETY: the slot's value was destroyed by the caller; the
            // bytes are dead and in bounds.
            unsafe { ptr::write_bytes(slot, pattern, self.slot_size) };
        }

        let slot = slot.cast::<FreeSlot>();
        // SAFETY: the slot is in bounds, aligned, and no longer holds a T.
        unsafe { (*slot).next = self.free_head.get() };
        self.free_head.set(slot);
        self.free_count.set(self.free_count.get() + 1);

        if self.config.track_stats {
            self.total_deallocs.set(self.total_deallocs.get() + 1);
        }
    }
}

impl<T> Drop for PoolAllocator<T> {
    fn drop(&mut self) {
        // Live PoolBoxes borrow the pool, so every slot is free by now;
        // only the slab itself remains.
        // SAFETY: memory was allocated with this layout in with_config.
        unsafe { dealloc(self.memory.as_ptr(), self.layout) };
    }
}

impl<T> MemoryUsage for PoolAllocator<T> {
    fn used_memory(&self) -> usize {
        self.allocated_slots() * self.slot_size
    }

    fn available_memory(&self) -> Option<usize> {
        Some(self.free_slots() * self.slot_size)
    }

    fn total_memory(&self) -> Option<usize> {
        Some(self.slot_count * self.slot_size)
    }
}

impl<T> StatisticsProvider for PoolAllocator<T> {
    fn statistics(&self) -> AllocatorStats {
        AllocatorStats {
            allocated_bytes: self.used_memory(),
            peak_allocated_bytes: if self.config.track_stats {
                self.peak_usage.get()
            } else {
                self.used_memory()
            },
            allocation_count: self.total_allocs.get(),
            deallocation_count: self.total_deallocs.get(),
            failed_allocations: 0,
        }
    }

    fn reset_statistics(&self) {
        self.total_allocs.set(0);
        self.total_deallocs.set(0);
        self.peak_usage.set(0);
    }

    fn statistics_enabled(&self) -> bool {
        self.config.track_stats
    }
}

// SAFETY: the pool owns its slab and the T values stored in it; moving the
// allocator to another thread moves them with it. The Cell-based free list
// keeps the type !Sync, which is the intended single-threaded contract.
unsafe impl<T: Send> Send for PoolAllocator<T> {}
