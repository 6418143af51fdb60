//! Integration tests for the LRU replacer

use strata::buffer::LruReplacer;
use strata::common::FrameId;

#[test]
fn test_lru_eviction_order() {
    let replacer = LruReplacer::new(7);

    for i in 0..6 {
        replacer.unpin(FrameId::new(i));
    }
    assert_eq!(replacer.size(), 6);

    // Least recently unpinned leaves first
    assert_eq!(replacer.victim(), Some(FrameId::new(0)));
    assert_eq!(replacer.victim(), Some(FrameId::new(1)));
    assert_eq!(replacer.victim(), Some(FrameId::new(2)));
    assert_eq!(replacer.size(), 3);
}

#[test]
fn test_lru_pin_then_unpin_moves_to_mru_end() {
    let replacer = LruReplacer::new(7);

    for i in 0..4 {
        replacer.unpin(FrameId::new(i));
    }

    // Re-pinning frame 1 removes it; unpinning it again makes it the
    // most recently used
    replacer.pin(FrameId::new(1));
    replacer.unpin(FrameId::new(1));

    assert_eq!(replacer.victim(), Some(FrameId::new(0)));
    assert_eq!(replacer.victim(), Some(FrameId::new(2)));
    assert_eq!(replacer.victim(), Some(FrameId::new(3)));
    assert_eq!(replacer.victim(), Some(FrameId::new(1)));
    assert_eq!(replacer.victim(), None);
}

#[test]
fn test_lru_unpin_is_idempotent() {
    let replacer = LruReplacer::new(7);

    replacer.unpin(FrameId::new(0));
    replacer.unpin(FrameId::new(1));
    replacer.unpin(FrameId::new(0));
    replacer.unpin(FrameId::new(0));

    assert_eq!(replacer.size(), 2);
    // Frame 0 keeps its original position
    assert_eq!(replacer.victim(), Some(FrameId::new(0)));
    assert_eq!(replacer.victim(), Some(FrameId::new(1)));
}

#[test]
fn test_lru_pin_absent_frame() {
    let replacer = LruReplacer::new(3);
    replacer.pin(FrameId::new(2));
    assert_eq!(replacer.size(), 0);
    assert_eq!(replacer.victim(), None);
}

#[test]
fn test_lru_capacity() {
    let replacer = LruReplacer::new(3);

    for i in 0..5 {
        replacer.unpin(FrameId::new(i));
    }
    // Frames past capacity were ignored
    assert_eq!(replacer.size(), 3);
    assert_eq!(replacer.victim(), Some(FrameId::new(0)));
    assert_eq!(replacer.victim(), Some(FrameId::new(1)));
    assert_eq!(replacer.victim(), Some(FrameId::new(2)));
    assert_eq!(replacer.victim(), None);
}

#[test]
fn test_lru_churn() {
    let replacer = LruReplacer::new(5);

    for round in 0..50u32 {
        let a = FrameId::new(round % 5);
        replacer.unpin(a);
        assert_eq!(replacer.victim(), Some(a));
    }
    assert_eq!(replacer.size(), 0);
}
