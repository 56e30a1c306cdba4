//! RAII owner for pool-allocated values

use core::fmt;
use core::ops::{Deref, DerefMut};
use core::ptr::{self, NonNull};

use super::PoolAllocator;

/// Owning handle for a value allocated from a [`PoolAllocator`]
///
/// Dropping the box runs the value's destructor and returns the slot to
/// the pool's free list. Borrowing the pool means a box can never outlive
/// its allocator and a slot can never be freed twice.
pub struct PoolBox<'a, T> {
    slot: NonNull<T>,
    pool: &'a PoolAllocator<T>,
}

impl<'a, T> PoolBox<'a, T> {
    pub(crate) fn new(slot: NonNull<T>, pool: &'a PoolAllocator<T>) -> Self {
        Self { slot, pool }
    }

    /// Consumes the box and returns the contained value
    ///
    /// The slot goes back to the free list without running the destructor
    /// in place; the value is moved out instead.
    pub fn into_inner(self) -> T {
        // SAFETY: the slot holds a live T that this box owns.
        let value = unsafe { ptr::read(self.slot.as_ptr()) };
        self.pool.release_slot(self.slot);
        core::mem::forget(self);
        value
    }
}

impl<T> Deref for PoolBox<'_, T> {
    type Target = T;

    fn deref(&self) -> &T {
        // SAFETY: the slot holds a live T for as long as this box exists.
        unsafe { self.slot.as_ref() }
    }
}

impl<T> DerefMut for PoolBox<'_, T> {
    fn deref_mut(&mut self) -> &mut T {
        // SAFETY: as above; &mut self gives exclusive access.
        unsafe { self.slot.as_mut() }
    }
}

impl<T> Drop for PoolBox<'_, T> {
    fn drop(&mut self) {
        // SAFETY: the slot holds a live T owned by this box; after the
        // drop the slot bytes are dead and may rejoin the free list.
        unsafe { ptr::drop_in_place(self.slot.as_ptr()) };
        self.pool.release_slot(self.slot);
    }
}

impl<T: fmt::Debug> fmt::Debug for PoolBox<'_, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&**self, f)
    }
}

impl<T: fmt::Display> fmt::Display for PoolBox<'_, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&**self, f)
    }
}
