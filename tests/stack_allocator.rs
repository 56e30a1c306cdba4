//! Integration tests for the stack allocator

use std::cell::RefCell;
use std::rc::Rc;

use arena_memory::allocator::{
    MemoryUsage, StackAllocator, StackConfig, StackFrame, StatisticsProvider,
};

/// Records its id into a shared log when dropped
struct Tracked {
    id: u32,
    log: Rc<RefCell<Vec<u32>>>,
}

impl Tracked {
    fn new(id: u32, log: &Rc<RefCell<Vec<u32>>>) -> Self {
        Self {
            id,
            log: Rc::clone(log),
        }
    }
}

impl Drop for Tracked {
    fn drop(&mut self) {
        self.log.borrow_mut().push(self.id);
    }
}

#[test]
fn test_stack_allocator_basic() {
    let mut stack = StackAllocator::new(4096).expect("Failed to create stack allocator");

    let marker = stack.mark();
    let value = stack.allocate(0x55u64).expect("Allocation failed");
    assert_eq!(*value, 0x55);

    *value = 7;
    assert_eq!(*value, 7);

    stack.release(marker);
    assert_eq!(stack.used(), 0);
}

#[test]
fn test_stack_allocator_alignment() {
    let mut stack = StackAllocator::new(4096).expect("Failed to create stack allocator");
    let marker = stack.mark();

    // A one-byte allocation first forces the head off alignment.
    let _byte = stack.allocate(1u8).expect("Allocation failed");

    let word = stack.allocate(2u64).expect("Allocation failed");
    assert_eq!(word as *mut u64 as usize % 8, 0);

    #[repr(align(32))]
    struct Aligned([u8; 32]);
    let wide = stack.allocate(Aligned([0; 32])).expect("Allocation failed");
    assert_eq!(wide as *mut Aligned as usize % 32, 0);

    stack.release(marker);
}

#[test]
fn test_stack_allocator_marker_rewind_reuses_space() {
    let mut stack = StackAllocator::new(4096).expect("Failed to create stack allocator");

    let marker = stack.mark();
    let addr1 = stack
        .allocate(1u64)
        .map(|r| r as *mut u64 as usize)
        .expect("Allocation failed");
    stack.release(marker);

    let addr2 = stack
        .allocate(2u64)
        .map(|r| r as *mut u64 as usize)
        .expect("Allocation failed");
    assert_eq!(addr1, addr2, "rewound space should be reused");

    stack.release_all();
}

#[test]
fn test_stack_allocator_nested_markers() {
    let mut stack = StackAllocator::new(4096).expect("Failed to create stack allocator");

    let outer = stack.mark();
    let _a = stack.allocate([1u8; 32]).expect("Allocation failed");
    let used_outer = stack.used();

    let middle = stack.mark();
    let _b = stack.allocate([2u8; 64]).expect("Allocation failed");
    let used_middle = stack.used();

    let inner = stack.mark();
    let _c = stack.allocate([3u8; 128]).expect("Allocation failed");

    stack.release(inner);
    assert_eq!(stack.used(), used_middle);

    stack.release(middle);
    assert_eq!(stack.used(), used_outer);

    stack.release(outer);
    assert_eq!(stack.used(), 0);
}

#[test]
fn test_stack_allocator_destructor_order() {
    // Allocate 10 tracked values, take a marker, allocate 5 more; releasing
    // the marker must run exactly the newest 5 destructors in reverse order,
    // and release_all the remaining 10, also in reverse.
    let log = Rc::new(RefCell::new(Vec::new()));
    let mut stack = StackAllocator::new(4096).expect("Failed to create stack allocator");

    for i in 0..10 {
        stack
            .allocate(Tracked::new(i, &log))
            .expect("Allocation failed");
    }
    let marker = stack.mark();
    for i in 10..15 {
        stack
            .allocate(Tracked::new(i, &log))
            .expect("Allocation failed");
    }

    stack.release(marker);
    assert_eq!(*log.borrow(), vec![14, 13, 12, 11, 10]);

    stack.release_all();
    let expected: Vec<u32> = (0..15).rev().collect();
    assert_eq!(*log.borrow(), expected);
}

#[test]
fn test_stack_allocator_array() {
    let log = Rc::new(RefCell::new(Vec::new()));
    let mut stack = StackAllocator::new(4096).expect("Failed to create stack allocator");

    {
        let values = stack
            .allocate_array_with(4, |i| Tracked::new(i as u32, &log))
            .expect("Array allocation failed");
        assert_eq!(values.len(), 4);
        assert_eq!(values[2].id, 2);
    }

    // One destructor entry per element, discharged newest-first.
    stack.release_all();
    assert_eq!(*log.borrow(), vec![3, 2, 1, 0]);
}

#[test]
fn test_stack_allocator_exhaustion() {
    let mut stack = StackAllocator::new(64).expect("Failed to create stack allocator");

    let marker = stack.mark();
    assert!(stack.allocate([0u8; 128]).is_none(), "must not fit");
    assert_eq!(stack.used(), 0, "failed allocation must not move the head");

    let _fits = stack.allocate([0u8; 64]).expect("Allocation failed");
    assert!(stack.allocate(1u8).is_none());

    stack.release(marker);
}

#[test]
fn test_stack_allocator_frame() {
    let mut stack = StackAllocator::new(4096).expect("Failed to create stack allocator");

    {
        let frame = StackFrame::new(&mut stack);
        let value = frame.allocator().allocate(11u32).expect("Allocation failed");
        assert_eq!(*value, 11);
        let other = frame.allocator().allocate(22u32).expect("Allocation failed");
        assert_eq!(*other, 22);
    } // frame drops, both allocations are released

    assert_eq!(stack.used(), 0);
}

#[test]
fn test_stack_allocator_nested_frames_run_destructors() {
    let log = Rc::new(RefCell::new(Vec::new()));
    let mut stack = StackAllocator::new(4096).expect("Failed to create stack allocator");

    {
        let outer = StackFrame::new(&mut stack);
        outer
            .allocator()
            .allocate(Tracked::new(1, &log))
            .expect("Allocation failed");
    }
    assert_eq!(*log.borrow(), vec![1]);
    assert_eq!(stack.used(), 0);
}

#[test]
fn test_stack_allocator_memory_usage() {
    let mut stack = StackAllocator::new(256).expect("Failed to create stack allocator");

    assert_eq!(stack.used_memory(), 0);
    assert_eq!(stack.total_memory(), Some(256));

    let marker = stack.mark();
    let _a = stack.allocate([0u8; 100]).expect("Allocation failed");
    assert_eq!(stack.used_memory(), 100);
    assert_eq!(stack.available_memory(), Some(156));

    stack.release(marker);
    assert_eq!(stack.used_memory(), 0);
}

#[test]
fn test_stack_allocator_statistics() {
    let mut stack = StackAllocator::with_config(1024, StackConfig::debug())
        .expect("Failed to create stack allocator");

    let marker = stack.mark();
    let _a = stack.allocate([0u8; 64]).expect("Allocation failed");
    let _b = stack.allocate([0u8; 32]).expect("Allocation failed");
    stack.release(marker);

    let stats = stack.statistics();
    assert_eq!(stats.allocation_count, 2);
    assert_eq!(stats.deallocation_count, 1);
    assert_eq!(stats.peak_allocated_bytes, 96);
    assert_eq!(stats.allocated_bytes, 0);
}

#[test]
fn test_stack_allocator_zero_capacity_rejected() {
    assert!(StackAllocator::new(0).is_err());
}
