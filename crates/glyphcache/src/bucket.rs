//! Hash bucket index
//!
//! Maps a query hash to a chain of candidate nodes. Chains are doubly
//! linked through the arena so a node can leave its bucket in O(1). The
//! table doubles when the average chain exceeds [`MAX_LOAD`] and halves
//! (never below its initial size) when it falls under one node per two
//! buckets.
//! Every node remembers its own hash, so rehashing needs no queries.

use tracing::{debug, warn};

use crate::node::Arena;

/// Average chain length that triggers growth
const MAX_LOAD: usize = 2;

pub(crate) struct BucketIndex {
    heads: Vec<Option<usize>>,
    count: usize,
    min_buckets: usize,
}

impl BucketIndex {
    /// `buckets` must be a power of two
    pub fn new(buckets: usize) -> Self {
        Self {
            heads: vec![None; buckets],
            count: 0,
            min_buckets: buckets,
        }
    }

    fn slot(&self, hash: u64) -> usize {
        (hash & (self.heads.len() as u64 - 1)) as usize
    }

    /// First node of the chain `hash` falls into
    pub fn first(&self, hash: u64) -> Option<usize> {
        self.heads[self.slot(hash)]
    }

    pub fn bucket_count(&self) -> usize {
        self.heads.len()
    }

    pub fn count(&self) -> usize {
        self.count
    }

    pub fn insert(&mut self, arena: &mut Arena, idx: usize) {
        self.link_front(arena, idx);
        self.count += 1;

        if self.count > self.heads.len() * MAX_LOAD {
            self.resize(arena, self.heads.len() * 2);
        }
    }

    pub fn remove(&mut self, arena: &mut Arena, idx: usize) {
        self.unlink(arena, idx);
        self.count -= 1;

        if self.heads.len() > self.min_buckets && self.count < self.heads.len() / 2 {
            self.resize(arena, self.heads.len() / 2);
        }
    }

    /// Move a hit to the front of its chain
    pub fn promote(&mut self, arena: &mut Arena, idx: usize) {
        if arena.node(idx).bucket_prev.is_none() {
            return;
        }
        self.unlink(arena, idx);
        self.link_front(arena, idx);
    }

    fn link_front(&mut self, arena: &mut Arena, idx: usize) {
        let slot = self.slot(arena.node(idx).hash);
        let head = self.heads[slot];

        let node = arena.node_mut(idx);
        node.bucket_prev = None;
        node.bucket_next = head;

        if let Some(head_idx) = head {
            arena.node_mut(head_idx).bucket_prev = Some(idx);
        }
        self.heads[slot] = Some(idx);
    }

    fn unlink(&mut self, arena: &mut Arena, idx: usize) {
        let (prev, next, hash) = {
            let node = arena.node(idx);
            (node.bucket_prev, node.bucket_next, node.hash)
        };

        match prev {
            Some(prev_idx) => arena.node_mut(prev_idx).bucket_next = next,
            None => {
                let slot = self.slot(hash);
                self.heads[slot] = next;
            }
        }

        if let Some(next_idx) = next {
            arena.node_mut(next_idx).bucket_prev = prev;
        }

        let node = arena.node_mut(idx);
        node.bucket_prev = None;
        node.bucket_next = None;
    }

    fn resize(&mut self, arena: &mut Arena, buckets: usize) {
        let mut heads = Vec::new();
        if heads.try_reserve_exact(buckets).is_err() {
            // Longer chains are still correct, just slower
            warn!(buckets, "bucket table allocation failed, keeping current size");
            return;
        }
        heads.resize(buckets, None);

        let old = std::mem::replace(&mut self.heads, heads);
        for head in old {
            let mut cursor = head;
            while let Some(idx) = cursor {
                cursor = arena.node(idx).bucket_next;
                self.link_front(arena, idx);
            }
        }

        debug!(buckets, nodes = self.count, "rehashed bucket table");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::Node;

    fn chain(index: &BucketIndex, arena: &Arena, hash: u64) -> Vec<usize> {
        let mut out = Vec::new();
        let mut cursor = index.first(hash);
        while let Some(idx) = cursor {
            out.push(idx);
            cursor = arena.node(idx).bucket_next;
        }
        out
    }

    fn add(index: &mut BucketIndex, arena: &mut Arena, hash: u64) -> usize {
        let idx = arena.insert(Node::new(0, hash, 1, Box::new(hash)));
        index.insert(arena, idx);
        idx
    }

    #[test]
    fn test_collisions_share_chain() {
        let mut arena = Arena::new();
        let mut index = BucketIndex::new(4);

        let a = add(&mut index, &mut arena, 1);
        let b = add(&mut index, &mut arena, 5); // 5 & 3 == 1
        let c = add(&mut index, &mut arena, 2);

        assert_eq!(chain(&index, &arena, 1), vec![b, a]);
        assert_eq!(chain(&index, &arena, 2), vec![c]);
        assert_eq!(index.count(), 3);
    }

    #[test]
    fn test_promote_and_remove() {
        let mut arena = Arena::new();
        let mut index = BucketIndex::new(4);

        let a = add(&mut index, &mut arena, 1);
        let b = add(&mut index, &mut arena, 5);
        let c = add(&mut index, &mut arena, 9);

        index.promote(&mut arena, a);
        assert_eq!(chain(&index, &arena, 1), vec![a, c, b]);

        index.remove(&mut arena, c);
        arena.remove(c);
        assert_eq!(chain(&index, &arena, 1), vec![a, b]);

        index.remove(&mut arena, a);
        arena.remove(a);
        assert_eq!(chain(&index, &arena, 1), vec![b]);
    }

    #[test]
    fn test_grow_and_shrink() {
        let mut arena = Arena::new();
        let mut index = BucketIndex::new(2);

        let nodes: Vec<_> = (0..5).map(|h| add(&mut index, &mut arena, h)).collect();
        assert_eq!(index.bucket_count(), 4);

        // Every node is still reachable after the rehash
        for (hash, &idx) in nodes.iter().enumerate() {
            assert!(chain(&index, &arena, hash as u64).contains(&idx));
        }

        for &idx in &nodes[..4] {
            index.remove(&mut arena, idx);
            arena.remove(idx);
        }
        assert_eq!(index.bucket_count(), 2);
        assert_eq!(chain(&index, &arena, 4), vec![nodes[4]]);
    }
}
