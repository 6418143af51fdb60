use std::collections::HashMap;

use parking_lot::Mutex;

use crate::common::FrameId;

/// A node in the slab-backed doubly linked list. Links are slab indices.
#[derive(Debug, Clone, Copy)]
struct Node {
    frame_id: FrameId,
    prev: Option<usize>,
    next: Option<usize>,
}

#[derive(Debug)]
struct LruState {
    nodes: Vec<Node>,
    free_slots: Vec<usize>,
    /// FrameId -> slab index of its node
    map: HashMap<FrameId, usize>,
    /// Most recently unpinned
    head: Option<usize>,
    /// Least recently unpinned (victim end)
    tail: Option<usize>,
}

impl LruState {
    fn detach(&mut self, slot: usize) {
        let Node { prev, next, .. } = self.nodes[slot];
        match prev {
            Some(p) => self.nodes[p].next = next,
            None => self.head = next,
        }
        match next {
            Some(n) => self.nodes[n].prev = prev,
            None => self.tail = prev,
        }
        self.free_slots.push(slot);
    }

    fn push_front(&mut self, frame_id: FrameId) -> usize {
        let node = Node {
            frame_id,
            prev: None,
            next: self.head,
        };
        let slot = match self.free_slots.pop() {
            Some(slot) => {
                self.nodes[slot] = node;
                slot
            }
            None => {
                self.nodes.push(node);
                self.nodes.len() - 1
            }
        };
        match self.head {
            Some(h) => self.nodes[h].prev = Some(slot),
            None => self.tail = Some(slot),
        }
        self.head = Some(slot);
        slot
    }
}

/// LRU replacement policy over the frames currently eligible for eviction.
///
/// Frames enter at the most-recently-unpinned end when their pin count drops
/// to zero and leave either by being pinned again or by being chosen as the
/// victim at the least-recently-unpinned end. All operations are O(1): a
/// doubly linked list carries the order, a hash map finds list positions.
pub struct LruReplacer {
    /// Maximum number of frames the replacer can hold (= pool size)
    capacity: usize,
    state: Mutex<LruState>,
}

impl LruReplacer {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            state: Mutex::new(LruState {
                nodes: Vec::with_capacity(capacity),
                free_slots: Vec::new(),
                map: HashMap::with_capacity(capacity),
                head: None,
                tail: None,
            }),
        }
    }

    /// Removes and returns the least-recently-unpinned frame.
    /// Returns None if no frame is evictable.
    pub fn victim(&self) -> Option<FrameId> {
        let mut state = self.state.lock();
        let slot = state.tail?;
        let frame_id = state.nodes[slot].frame_id;
        state.detach(slot);
        state.map.remove(&frame_id);
        Some(frame_id)
    }

    /// Removes a frame from the replacer because a caller pinned it.
    /// No-op if the frame is not tracked.
    pub fn pin(&self, frame_id: FrameId) {
        let mut state = self.state.lock();
        if let Some(slot) = state.map.remove(&frame_id) {
            state.detach(slot);
        }
    }

    /// Makes a frame eligible for eviction at the most-recently-used end.
    /// No-op if the frame is already tracked or the replacer is full.
    pub fn unpin(&self, frame_id: FrameId) {
        let mut state = self.state.lock();
        if state.map.contains_key(&frame_id) || state.map.len() == self.capacity {
            return;
        }
        let slot = state.push_front(frame_id);
        state.map.insert(frame_id, slot);
    }

    /// Returns the number of evictable frames.
    pub fn size(&self) -> usize {
        self.state.lock().map.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lru_replacer_empty() {
        let replacer = LruReplacer::new(5);
        assert_eq!(replacer.size(), 0);
        assert_eq!(replacer.victim(), None);
    }

    #[test]
    fn test_lru_replacer_victim_order() {
        let replacer = LruReplacer::new(5);

        replacer.unpin(FrameId::new(0));
        replacer.unpin(FrameId::new(1));
        replacer.unpin(FrameId::new(2));
        assert_eq!(replacer.size(), 3);

        // Least recently unpinned goes first
        assert_eq!(replacer.victim(), Some(FrameId::new(0)));
        assert_eq!(replacer.victim(), Some(FrameId::new(1)));
        assert_eq!(replacer.victim(), Some(FrameId::new(2)));
        assert_eq!(replacer.victim(), None);
    }

    #[test]
    fn test_lru_replacer_pin_removes() {
        let replacer = LruReplacer::new(5);

        replacer.unpin(FrameId::new(0));
        replacer.unpin(FrameId::new(1));
        replacer.unpin(FrameId::new(2));

        replacer.pin(FrameId::new(1));
        assert_eq!(replacer.size(), 2);

        assert_eq!(replacer.victim(), Some(FrameId::new(0)));
        assert_eq!(replacer.victim(), Some(FrameId::new(2)));
        assert_eq!(replacer.victim(), None);
    }

    #[test]
    fn test_lru_replacer_pin_untracked_is_noop() {
        let replacer = LruReplacer::new(5);

        replacer.unpin(FrameId::new(0));
        replacer.pin(FrameId::new(4));
        assert_eq!(replacer.size(), 1);
    }

    #[test]
    fn test_lru_replacer_unpin_twice_keeps_position() {
        let replacer = LruReplacer::new(5);

        replacer.unpin(FrameId::new(0));
        replacer.unpin(FrameId::new(1));
        // Frame 0 is already present, its position must not move
        replacer.unpin(FrameId::new(0));

        assert_eq!(replacer.size(), 2);
        assert_eq!(replacer.victim(), Some(FrameId::new(0)));
    }

    #[test]
    fn test_lru_replacer_capacity_bound() {
        let replacer = LruReplacer::new(2);

        replacer.unpin(FrameId::new(0));
        replacer.unpin(FrameId::new(1));
        replacer.unpin(FrameId::new(2));

        assert_eq!(replacer.size(), 2);
        assert_eq!(replacer.victim(), Some(FrameId::new(0)));
        assert_eq!(replacer.victim(), Some(FrameId::new(1)));
        assert_eq!(replacer.victim(), None);
    }

    #[test]
    fn test_lru_replacer_slot_reuse() {
        let replacer = LruReplacer::new(3);

        for round in 0..4 {
            replacer.unpin(FrameId::new(round));
            assert_eq!(replacer.victim(), Some(FrameId::new(round)));
        }
        assert_eq!(replacer.size(), 0);
    }

    #[test]
    fn test_lru_replacer_interleaved() {
        let replacer = LruReplacer::new(7);

        for i in 0..7 {
            replacer.unpin(FrameId::new(i));
        }
        replacer.pin(FrameId::new(0));
        replacer.pin(FrameId::new(3));
        replacer.unpin(FrameId::new(3));

        assert_eq!(replacer.victim(), Some(FrameId::new(1)));
        assert_eq!(replacer.victim(), Some(FrameId::new(2)));
        assert_eq!(replacer.victim(), Some(FrameId::new(4)));
        assert_eq!(replacer.victim(), Some(FrameId::new(5)));
        assert_eq!(replacer.victim(), Some(FrameId::new(6)));
        assert_eq!(replacer.victim(), Some(FrameId::new(3)));
        assert_eq!(replacer.victim(), None);
    }
}
