//! Defragmentation scenarios for the general allocator

use std::cell::RefCell;
use std::rc::Rc;

use arena_memory::allocator::GeneralAllocator;
use arena_memory::AllocErrorKind;

/// 64-byte element used by the arena layout scenarios
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Particle {
    id: u64,
    payload: [u8; 56],
}

impl Particle {
    fn new(id: u64) -> Self {
        Self {
            id,
            payload: [id as u8; 56],
        }
    }
}

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
fn test_defragment_closes_interior_hole() {
    // A,B,C,D allocated; B and C freed. Defragmenting must slide D down
    // next to A and leave a single high-end chunk.
    let mut arena = GeneralAllocator::new(1024).expect("Failed to create arena");

    let a = arena.allocate(Particle::new(1)).expect("Allocation failed");
    let b = arena.allocate(Particle::new(2)).expect("Allocation failed");
    let c = arena.allocate(Particle::new(3)).expect("Allocation failed");
    let d = arena.allocate(Particle::new(4)).expect("Allocation failed");

    arena.deallocate(&b).expect("Deallocation failed");
    arena.deallocate(&c).expect("Deallocation failed");

    arena.defragment();

    let chunks: Vec<_> = arena.free_chunks().collect();
    assert_eq!(chunks, vec![(128, 896)]);

    // Handles survive the move with their values intact.
    assert!(arena.is_handle_valid(&a));
    assert!(arena.is_handle_valid(&d));
    assert_eq!(*arena.get(&a).expect("Dereference failed"), Particle::new(1));
    assert_eq!(*arena.get(&d).expect("Dereference failed"), Particle::new(4));

    // Dead handles stay dead.
    assert!(!arena.is_handle_valid(&b));
    assert!(!arena.is_handle_valid(&c));
}

#[test]
fn test_defragment_out_of_memory_then_retry() {
    // Fragmented state where no single chunk fits 192 bytes even though
    // 256 are free in total; defragmenting makes the request satisfiable.
    let mut arena = GeneralAllocator::new(1024).expect("Failed to create arena");

    let handles: Vec<_> = (0..14)
        .map(|i| arena.allocate(Particle::new(i)).expect("Allocation failed"))
        .collect();

    arena.deallocate(&handles[1]).expect("Deallocation failed");
    arena.deallocate(&handles[2]).expect("Deallocation failed");

    let chunks: Vec<_> = arena.free_chunks().collect();
    assert_eq!(chunks, vec![(64, 128), (896, 128)]);

    let err = arena
        .allocate_array_with(3, |i| Particle::new(90 + i as u64))
        .expect_err("no chunk fits 192 bytes");
    assert_eq!(err.kind(), AllocErrorKind::OutOfMemory);

    arena.defragment();
    let chunks: Vec<_> = arena.free_chunks().collect();
    assert_eq!(chunks, vec![(768, 256)]);

    let block = arena
        .allocate_array_with(3, |i| Particle::new(90 + i as u64))
        .expect("retry after defragment must succeed");
    assert_eq!(arena.get_slice(&block).expect("Dereference failed").len(), 3);

    // Survivors kept their values through the compaction.
    for (i, handle) in handles.iter().enumerate() {
        if i == 1 || i == 2 {
            assert!(!arena.is_handle_valid(handle));
        } else {
            let particle = arena.get(handle).expect("Dereference failed");
            assert_eq!(*particle, Particle::new(i as u64));
        }
    }
}

#[test]
fn test_defragment_empty_arena() {
    let mut arena = GeneralAllocator::new(1024).expect("Failed to create arena");
    arena.defragment();

    let chunks: Vec<_> = arena.free_chunks().collect();
    assert_eq!(chunks, vec![(0, 1024)]);
}

#[test]
fn test_defragment_full_arena() {
    let mut arena = GeneralAllocator::new(512).expect("Failed to create arena");

    let handles: Vec<_> = (0..8)
        .map(|i| arena.allocate(Particle::new(i)).expect("Allocation failed"))
        .collect();

    arena.defragment();
    assert_eq!(arena.free_chunks().count(), 0, "full arena stays chunkless");
    for (i, handle) in handles.iter().enumerate() {
        assert_eq!(arena.get(handle).expect("Dereference failed").id, i as u64);
    }
}

#[test]
fn test_defragment_already_packed_is_noop() {
    let mut arena = GeneralAllocator::new(1024).expect("Failed to create arena");

    let a = arena.allocate(Particle::new(1)).expect("Allocation failed");
    let b = arena.allocate(Particle::new(2)).expect("Allocation failed");
    let before: Vec<_> = arena.free_chunks().collect();

    arena.defragment();

    let after: Vec<_> = arena.free_chunks().collect();
    assert_eq!(before, after);
    assert_eq!(arena.get(&a).expect("Dereference failed").id, 1);
    assert_eq!(arena.get(&b).expect("Dereference failed").id, 2);
}

#[test]
fn test_defragment_moves_without_dropping() {
    // Relocation must not run destructors; each element drops exactly once,
    // at deallocation.
    let log = Rc::new(RefCell::new(Vec::new()));
    let mut arena = GeneralAllocator::new(1024).expect("Failed to create arena");

    let a = arena
        .allocate_array_with(2, |i| Tracked::new(i as u32, &log))
        .expect("Allocation failed");
    let b = arena
        .allocate_array_with(2, |i| Tracked::new(10 + i as u32, &log))
        .expect("Allocation failed");

    arena.deallocate(&a).expect("Deallocation failed");
    assert_eq!(*log.borrow(), vec![0, 1]);

    arena.defragment(); // b slides down to the arena base
    assert!(
        log.borrow().len() == 2,
        "defragmentation must not run destructors"
    );

    assert!(arena.is_handle_valid(&b));
    let values = arena.get_slice(&b).expect("Dereference failed");
    assert_eq!(values[0].id, 10);
    assert_eq!(values[1].id, 11);

    arena.deallocate(&b).expect("Deallocation failed");
    assert_eq!(*log.borrow(), vec![0, 1, 10, 11]);
}

#[test]
fn test_defragment_mixed_block_sizes() {
    // Blocks of different sizes pack tightly in address order.
    let mut arena = GeneralAllocator::new(1024).expect("Failed to create arena");

    let small = arena.allocate([0xAAu8; 32]).expect("Allocation failed");
    let big = arena.allocate(Particle::new(5)).expect("Allocation failed");
    let tail = arena.allocate([0xBBu8; 16]).expect("Allocation failed");

    arena.deallocate(&big).expect("Deallocation failed");
    arena.defragment();

    // 32 + 16 live bytes packed at the bottom, remainder in one tail chunk.
    let chunks: Vec<_> = arena.free_chunks().collect();
    assert_eq!(chunks, vec![(48, 976)]);

    assert_eq!(arena.get(&small).expect("Dereference failed")[0], 0xAA);
    assert_eq!(arena.get(&tail).expect("Dereference failed")[15], 0xBB);
}

#[test]
fn test_defragment_then_mutate() {
    let mut arena = GeneralAllocator::new(512).expect("Failed to create arena");

    let a = arena.allocate(Particle::new(1)).expect("Allocation failed");
    let b = arena.allocate(Particle::new(2)).expect("Allocation failed");
    arena.deallocate(&a).expect("Deallocation failed");
    arena.defragment();

    arena.get_mut(&b).expect("Dereference failed").id = 20;
    assert_eq!(arena.get(&b).expect("Dereference failed").id, 20);

    // The compacted block participates in normal free/coalesce afterwards.
    arena.deallocate(&b).expect("Deallocation failed");
    let chunks: Vec<_> = arena.free_chunks().collect();
    assert_eq!(chunks, vec![(0, 512)]);
}

#[test]
fn test_defragment_repeated_cycles() {
    // Allocate/free/defragment repeatedly; handles allocated in earlier
    // rounds stay valid and readable throughout.
    let mut arena = GeneralAllocator::new(1024).expect("Failed to create arena");
    let mut keepers = Vec::new();

    for round in 0..4u64 {
        let keeper = arena
            .allocate(Particle::new(round))
            .expect("Allocation failed");
        let scratch = arena
            .allocate_array(2, Particle::new(100 + round))
            .expect("Allocation failed");
        keepers.push(keeper);

        arena.deallocate(&scratch).expect("Deallocation failed");
        arena.defragment();

        let chunks: Vec<_> = arena.free_chunks().collect();
        assert_eq!(chunks.len(), 1, "defragment leaves one tail chunk");

        for (i, keeper) in keepers.iter().enumerate() {
            assert_eq!(
                arena.get(keeper).expect("Dereference failed").id,
                i as u64
            );
        }
    }

    assert_eq!(arena.used(), 4 * 64);
}
