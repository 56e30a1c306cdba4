//! Main general allocator implementation
//!
//! # Safety
//!
//! - Live blocks (tracked by the handle table) and free chunks exactly
//!   tile the arena; neither overlaps the other
//! - Free chunks are sorted by offset and eagerly coalesced, so no two
//!   are ever adjacent
//! - A live slot's offset is always a key in the handle table mapping
//!   back to that slot; vacant slots carry no offset
//! - Mutating operations take `&mut self`, so references handed out by
//!   `get`/`get_slice` can never witness a move or free
//!
//! The allocator is single-threaded and deliberately `!Sync`.

use core::alloc::Layout;
use core::cell::Cell;
use core::mem;
use core::ptr::{self, NonNull};
use std::alloc::{alloc, dealloc, handle_alloc_error};
use std::collections::BTreeMap;

#[cfg(feature = "logging")]
use tracing::{debug, trace};

use super::chunk::FreeChunk;
use super::handle::{self, Handle, HandleSlot};
use super::GeneralConfig;
use crate::allocator::{AllocatorStats, MemoryUsage, StatisticsProvider};
use crate::error::{AllocError, AllocErrorKind, AllocResult};

/// Arena base alignment; matches what operator new would hand out
const BUFFER_ALIGN: usize = 16;

/// General-purpose arena allocator with relocation-stable handles
///
/// Carves variable-size blocks out of one contiguous arena using
/// first-fit placement over an address-ordered free list. Freed blocks
/// coalesce with their neighbors eagerly, and
/// [`defragment`](Self::defragment) compacts all live blocks toward the
/// low end of the arena, merging the free space into a single tail chunk.
///
/// Blocks are addressed through [`Handle`]s rather than raw pointers.
/// Handles survive relocation; raw references obtained through
/// [`get`](Self::get) borrow the allocator and therefore cannot outlive
/// the next mutating call.
///
/// # Examples
///
/// ```rust
/// use arena_memory::allocator::GeneralAllocator;
///
/// let mut arena = GeneralAllocator::new(1024)?;
/// let a = arena.allocate([1u64; 8])?;
/// let b = arena.allocate([2u64; 8])?;
///
/// arena.deallocate(&a)?;
/// arena.defragment(); // b moves down to offset 0
/// assert_eq!(arena.get(&b)?[0], 2);
/// # Ok::<(), arena_memory::AllocError>(())
/// ```
pub struct GeneralAllocator {
    /// Owned arena bytes
    memory: NonNull<u8>,

    /// Layout the arena was allocated with
    layout: Layout,

    capacity: usize,

    /// Free chunks, sorted by offset, never overlapping or adjacent
    chunks: Vec<FreeChunk>,

    /// Current block start offset → handle slot index
    table: BTreeMap<usize, usize>,

    /// Handle records; grows on demand up to the configured capacity
    slots: Vec<HandleSlot>,

    /// Indices of vacant slots available for reuse
    free_slots: Vec<usize>,

    config: GeneralConfig,

    total_allocs: Cell<usize>,
    total_deallocs: Cell<usize>,
    failed_allocs: Cell<usize>,
    peak_usage: Cell<usize>,
}

impl GeneralAllocator {
    /// Default arena capacity in bytes
    pub const DEFAULT_CAPACITY: usize = 1024;

    /// Creates an arena of `capacity` bytes with custom configuration
    ///
    /// # Errors
    /// Returns an error if `capacity` is zero or overflows a [`Layout`].
    pub fn with_config(capacity: usize, config: GeneralConfig) -> AllocResult<Self> {
        if capacity == 0 {
            return Err(AllocError::new(AllocErrorKind::InvalidLayout));
        }

        let layout = Layout::from_size_align(capacity, BUFFER_ALIGN)
            .map_err(|_| AllocError::new(AllocErrorKind::InvalidLayout))?;

        // SAFETY: layout has non-zero size.
        let raw = unsafe { alloc(layout) };
        let Some(memory) = NonNull::new(raw) else {
            handle_alloc_error(layout);
        };

        #[cfg(feature = "logging")]
        debug!(capacity, "created general allocator");

        Ok(Self {
            memory,
            layout,
            capacity,
            chunks: vec![FreeChunk {
                offset: 0,
                size: capacity,
            }],
            table: BTreeMap::new(),
            slots: Vec::new(),
            free_slots: Vec::new(),
            config,
            total_allocs: Cell::new(0),
            total_deallocs: Cell::new(0),
            failed_allocs: Cell::new(0),
            peak_usage: Cell::new(0),
        })
    }

    /// Creates an arena of `capacity` bytes with default configuration
    pub fn new(capacity: usize) -> AllocResult<Self> {
        Self::with_config(capacity, GeneralConfig::default())
    }

    /// Allocates a block holding one `T`
    ///
    /// Placement carves from the low end of the first fitting chunk with
    /// no alignment padding; it is the caller's responsibility to keep
    /// every block size a multiple of the element alignments in use, so
    /// that carved offsets stay aligned (debug-asserted).
    ///
    /// # Errors
    /// [`OutOfMemory`](AllocErrorKind::OutOfMemory) when no free chunk is
    /// large enough, [`OutOfHandles`](AllocErrorKind::OutOfHandles) when
    /// the configured handle capacity is exhausted. The allocator is left
    /// unchanged on error.
    pub fn allocate<T>(&mut self, value: T) -> AllocResult<Handle<T>> {
        let (handle, data) = self.reserve_block::<T>(1)?;
        // SAFETY: reserve_block carved an in-bounds region for one T.
        unsafe { data.write(value) };
        Ok(handle)
    }

    /// Allocates a block of `count` elements constructed by `f(index)`
    ///
    /// Elements are constructed in index order. Errors as
    /// [`allocate`](Self::allocate), plus
    /// [`SizeOverflow`](AllocErrorKind::SizeOverflow) when
    /// `count * size_of::<T>()` overflows.
    pub fn allocate_array_with<T, F>(&mut self, count: usize, mut f: F) -> AllocResult<Handle<T>>
    where
        F: FnMut(usize) -> T,
    {
        let (handle, data) = self.reserve_block::<T>(count)?;
        for i in 0..count {
            // SAFETY: the carved region holds count elements of T.
            unsafe { data.add(i).write(f(i)) };
        }
        Ok(handle)
    }

    /// Allocates a block of `count` clones of `value`
    pub fn allocate_array<T: Clone>(&mut self, count: usize, value: T) -> AllocResult<Handle<T>> {
        self.allocate_array_with(count, |_| value.clone())
    }

    /// Destroys a block and returns its bytes to the free list
    ///
    /// Runs the destructor of every element, then inserts the freed range
    /// at its sorted position, merging with whichever neighbors touch it.
    /// The handle becomes invalid; every further use of it fails.
    ///
    /// # Errors
    /// [`InvalidHandle`](AllocErrorKind::InvalidHandle) when the handle is
    /// not live on this allocator (already deallocated, stale, or foreign).
    pub fn deallocate<T>(&mut self, handle: &Handle<T>) -> AllocResult<()> {
        let (index, offset) = self.live_slot(handle)?;
        let total_size = self.slots[index].total_size;
        let count = self.slots[index].element_count();

        if let Some(drop_fn) = self.slots[index].drop_elems {
            // SAFETY: a live block holds count initialized elements.
            unsafe { drop_fn(self.memory.as_ptr().add(offset), count) };
        }
        if let Some(pattern) = self.config.dealloc_pattern {
            // SAFETY: the block's bytes are dead and in bounds.
            unsafe { ptr::write_bytes(self.memory.as_ptr().add(offset), pattern, total_size) };
        }

        self.insert_free_chunk(FreeChunk {
            offset,
            size: total_size,
        });
        self.table.remove(&offset);

        let slot = &mut self.slots[index];
        slot.offset = None;
        slot.generation = slot.generation.wrapping_add(1);
        self.free_slots.push(index);

        if self.config.track_stats {
            self.total_deallocs.set(self.total_deallocs.get() + 1);
        }
        #[cfg(feature = "logging")]
        trace!(offset, size = total_size, "deallocated block");

        Ok(())
    }

    /// Compacts all live blocks toward the low end of the arena
    ///
    /// Walks the handle table in ascending offset order, moving each block
    /// down to the write cursor; afterwards the free list holds at most a
    /// single chunk at the high end. Every live handle remains valid and
    /// keeps its element values; raw references obtained before the call
    /// are invalidated (enforced by the `&mut self` borrow).
    pub fn defragment(&mut self) {
        let base = self.memory.as_ptr();
        let mut cursor = 0usize;
        #[cfg(feature = "logging")]
        let mut moved = 0usize;

        // Ascending offset order guarantees every destination lies at or
        // below its source, so later blocks are never overwritten.
        for (&offset, &index) in self.table.iter() {
            let slot = &mut self.slots[index];
            if offset == cursor {
                cursor += slot.total_size;
                continue;
            }
            let count = slot.element_count();
            // SAFETY: the source holds count live elements, the
            // destination range is in bounds below the source, and the
            // routine is overlap-safe.
            unsafe { (slot.relocate)(base.add(offset), base.add(cursor), count) };
            slot.offset = Some(cursor);
            cursor += slot.total_size;
            #[cfg(feature = "logging")]
            {
                moved += 1;
            }
        }

        self.chunks.clear();
        if cursor < self.capacity {
            self.chunks.push(FreeChunk {
                offset: cursor,
                size: self.capacity - cursor,
            });
        }

        // Re-key the table strictly after the walk; the walk itself must
        // see the old ordering.
        let stale: Vec<(usize, usize, usize)> = self
            .table
            .iter()
            .filter_map(|(&key, &index)| match self.slots[index].offset {
                Some(current) if current != key => Some((key, current, index)),
                _ => None,
            })
            .collect();
        for (old_key, new_key, index) in stale {
            self.table.remove(&old_key);
            self.table.insert(new_key, index);
        }

        self.assert_coalesced();
        #[cfg(feature = "logging")]
        debug!(moved, free = self.available(), "defragmented arena");
    }

    /// Checks whether a handle refers to a live block of this allocator
    pub fn is_handle_valid<T>(&self, handle: &Handle<T>) -> bool {
        self.live_slot(handle).is_ok()
    }

    /// Returns a reference to the first (or only) element of a block
    ///
    /// # Errors
    /// [`InvalidHandle`](AllocErrorKind::InvalidHandle) when the handle is
    /// not live.
    pub fn get<T>(&self, handle: &Handle<T>) -> AllocResult<&T> {
        let (_, offset) = self.live_slot(handle)?;
        // SAFETY: a live block holds at least one initialized T.
        Ok(unsafe { &*self.memory.as_ptr().add(offset).cast::<T>() })
    }

    /// Returns a mutable reference to the first element of a block
    pub fn get_mut<T>(&mut self, handle: &Handle<T>) -> AllocResult<&mut T> {
        let (_, offset) = self.live_slot(handle)?;
        // SAFETY: as in get; &mut self gives exclusive access.
        Ok(unsafe { &mut *self.memory.as_ptr().add(offset).cast::<T>() })
    }

    /// Returns the whole block as a slice
    pub fn get_slice<T>(&self, handle: &Handle<T>) -> AllocResult<&[T]> {
        let (index, offset) = self.live_slot(handle)?;
        let count = self.slots[index].element_count();
        // SAFETY: a live block holds count initialized elements.
        Ok(unsafe {
            core::slice::from_raw_parts(self.memory.as_ptr().add(offset).cast::<T>(), count)
        })
    }

    /// Returns the whole block as a mutable slice
    pub fn get_slice_mut<T>(&mut self, handle: &Handle<T>) -> AllocResult<&mut [T]> {
        let (index, offset) = self.live_slot(handle)?;
        let count = self.slots[index].element_count();
        // SAFETY: as in get_slice; &mut self gives exclusive access.
        Ok(unsafe {
            core::slice::from_raw_parts_mut(self.memory.as_ptr().add(offset).cast::<T>(), count)
        })
    }

    /// Returns the number of elements in a block
    pub fn handle_len<T>(&self, handle: &Handle<T>) -> AllocResult<usize> {
        let (index, _) = self.live_slot(handle)?;
        Ok(self.slots[index].element_count())
    }

    /// Returns the arena capacity in bytes
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Returns the total free memory in bytes
    pub fn available(&self) -> usize {
        self.chunks.iter().map(|c| c.size).sum()
    }

    /// Returns the total allocated memory in bytes
    pub fn used(&self) -> usize {
        self.capacity - self.available()
    }

    /// Returns the number of live blocks
    pub fn live_blocks(&self) -> usize {
        self.table.len()
    }

    /// Enumerates free chunks as `(offset, size)` pairs in offset order
    pub fn free_chunks(&self) -> impl Iterator<Item = (usize, usize)> + '_ {
        self.chunks.iter().map(|c| (c.offset, c.size))
    }

    /// First-fit carve plus handle registration; elements uninitialized
    fn reserve_block<T>(&mut self, count: usize) -> AllocResult<(Handle<T>, *mut T)> {
        let elem_size = mem::size_of::<T>();
        assert!(elem_size > 0, "zero-sized element types are not supported");
        assert!(count > 0, "cannot allocate an empty block");

        let requested = elem_size
            .checked_mul(count)
            .ok_or_else(AllocError::size_overflow)?;

        // The scan is read-only and the slot is acquired before carving,
        // so either failure leaves the allocator untouched.
        let Some(chunk_index) = self.chunks.iter().position(|c| c.size >= requested) else {
            if self.config.track_stats {
                self.failed_allocs.set(self.failed_allocs.get() + 1);
            }
            return Err(AllocError::out_of_memory(requested));
        };
        let slot_index = self.acquire_slot()?;

        // Carve from the low end of the chunk.
        let chunk = &mut self.chunks[chunk_index];
        let offset = chunk.offset;
        chunk.offset += requested;
        chunk.size -= requested;
        if chunk.size == 0 {
            self.chunks.remove(chunk_index);
        }

        // Placement adds no alignment padding; the caller keeps offsets
        // aligned by sizing blocks in multiples of the alignments in use.
        debug_assert!(
            offset % mem::align_of::<T>() == 0,
            "carved offset {offset} is not aligned for the element type"
        );

        let slot = &mut self.slots[slot_index];
        let generation = slot.generation;
        slot.offset = Some(offset);
        slot.total_size = requested;
        slot.elem_size = elem_size;
        slot.relocate = handle::relocate_elements::<T>;
        slot.drop_elems = if mem::needs_drop::<T>() {
            Some(handle::drop_elements::<T>)
        } else {
            None
        };
        self.table.insert(offset, slot_index);

        if self.config.track_stats {
            self.total_allocs.set(self.total_allocs.get() + 1);
            let used = self.used();
            if used > self.peak_usage.get() {
                self.peak_usage.set(used);
            }
        }
        #[cfg(feature = "logging")]
        trace!(offset, size = requested, count, "allocated block");

        // SAFETY: offset + requested is within the arena.
        let data = unsafe { self.memory.as_ptr().add(offset) }.cast::<T>();
        Ok((Handle::new(slot_index, generation), data))
    }

    /// Pops a vacant slot or grows the slot pool
    fn acquire_slot(&mut self) -> AllocResult<usize> {
        if let Some(index) = self.free_slots.pop() {
            return Ok(index);
        }
        if let Some(limit) = self.config.handle_capacity {
            if self.slots.len() >= limit {
                return Err(AllocError::out_of_handles());
            }
        }
        self.slots.push(HandleSlot::vacant());
        Ok(self.slots.len() - 1)
    }

    /// Validates a handle and returns its slot index and block offset
    fn live_slot<T>(&self, handle: &Handle<T>) -> AllocResult<(usize, usize)> {
        let index = handle.slot();
        let Some(slot) = self.slots.get(index) else {
            return Err(AllocError::invalid_handle());
        };
        if slot.generation != handle.generation() {
            return Err(AllocError::invalid_handle());
        }
        let Some(offset) = slot.offset else {
            return Err(AllocError::invalid_handle());
        };
        // A handle is valid iff the table maps its block start to it.
        if self.table.get(&offset) != Some(&index) {
            return Err(AllocError::invalid_handle());
        }
        debug_assert_eq!(slot.elem_size, mem::size_of::<T>());
        Ok((index, offset))
    }

    /// Inserts a freed range at its sorted position, merging neighbors
    fn insert_free_chunk(&mut self, freed: FreeChunk) {
        let pos = self.chunks.partition_point(|c| c.offset < freed.offset);

        let mut merged = false;
        if pos > 0 && self.chunks[pos - 1].end() == freed.offset {
            self.chunks[pos - 1].size += freed.size;
            merged = true;
        }
        if pos < self.chunks.len() {
            let new_end = if merged {
                self.chunks[pos - 1].end()
            } else {
                freed.end()
            };
            if new_end == self.chunks[pos].offset {
                if merged {
                    let right = self.chunks.remove(pos);
                    self.chunks[pos - 1].size += right.size;
                } else {
                    let right = &mut self.chunks[pos];
                    right.size += freed.size;
                    right.offset = freed.offset;
                    merged = true;
                }
            }
        }
        if !merged {
            self.chunks.insert(pos, freed);
        }

        self.assert_coalesced();
    }

    /// Free-list invariant: strictly ascending, never touching
    fn assert_coalesced(&self) {
        for pair in self.chunks.windows(2) {
            debug_assert!(pair[0].offset < pair[1].offset);
            debug_assert!(!pair[0].is_adjacent(&pair[1]));
        }
    }
}

impl Drop for GeneralAllocator {
    fn drop(&mut self) {
        // Element destructors do not run here: block lifetimes belong to
        // the caller, who deallocates through handles.
        // SAFETY: memory was allocated with this layout in with_config.
        unsafe { dealloc(self.memory.as_ptr(), self.layout) };
    }
}

impl MemoryUsage for GeneralAllocator {
    fn used_memory(&self) -> usize {
        self.used()
    }

    fn available_memory(&self) -> Option<usize> {
        Some(self.available())
    }

    fn total_memory(&self) -> Option<usize> {
        Some(self.capacity())
    }
}

impl StatisticsProvider for GeneralAllocator {
    fn statistics(&self) -> AllocatorStats {
        AllocatorStats {
            allocated_bytes: self.used(),
            peak_allocated_bytes: if self.config.track_stats {
                self.peak_usage.get()
            } else {
                self.used()
            },
            allocation_count: self.total_allocs.get(),
            deallocation_count: self.total_deallocs.get(),
            failed_allocations: self.failed_allocs.get(),
        }
    }

    fn reset_statistics(&self) {
        self.total_allocs.set(0);
        self.total_deallocs.set(0);
        self.failed_allocs.set(0);
        self.peak_usage.set(0);
    }

    fn statistics_enabled(&self) -> bool {
        self.config.track_stats
    }
}
