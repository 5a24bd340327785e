//! Global LRU (Least Recently Used) list
//!
//! One recency order over every resident node, whatever its class. The
//! links live in the arena nodes, so unlink and relink are O(1).
//! Head is most recently used, tail is the next eviction candidate.

use crate::node::Arena;

pub(crate) struct LruList {
    head: Option<usize>,
    tail: Option<usize>,
    len: usize,
}

impl LruList {
    pub fn new() -> Self {
        Self {
            head: None,
            tail: None,
            len: 0,
        }
    }

    pub fn head(&self) -> Option<usize> {
        self.head
    }

    pub fn tail(&self) -> Option<usize> {
        self.tail
    }

    pub fn len(&self) -> usize {
        self.len
    }

    /// Link a node that is not yet in the list at the MRU end
    pub fn push_front(&mut self, arena: &mut Arena, idx: usize) {
        let node = arena.node_mut(idx);
        node.lru_prev = None;
        node.lru_next = self.head;

        match self.head {
            Some(head_idx) => arena.node_mut(head_idx).lru_prev = Some(idx),
            None => self.tail = Some(idx),
        }

        self.head = Some(idx);
        self.len += 1;
    }

    pub fn move_to_front(&mut self, arena: &mut Arena, idx: usize) {
        if self.head == Some(idx) {
            return; // Already at front
        }

        self.unlink(arena, idx);
        self.push_front(arena, idx);
    }

    pub fn unlink(&mut self, arena: &mut Arena, idx: usize) {
        let (prev, next) = {
            let node = arena.node(idx);
            (node.lru_prev, node.lru_next)
        };

        match prev {
            Some(prev_idx) => arena.node_mut(prev_idx).lru_next = next,
            None => self.head = next,
        }

        match next {
            Some(next_idx) => arena.node_mut(next_idx).lru_prev = prev,
            None => self.tail = prev,
        }

        let node = arena.node_mut(idx);
        node.lru_prev = None;
        node.lru_next = None;
        self.len -= 1;
    }
}
