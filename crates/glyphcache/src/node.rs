//! Node arena
//!
//! Resident nodes live in a slot vector addressed by index. Freed slots go
//! on a free list and bump their generation, so a [`NodeId`] taken before a
//! removal never resolves to whatever reuses the slot.

use std::any::Any;

use crate::error::{CacheError, Result};

/// Stable handle to a resident node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId {
    index: usize,
    generation: u32,
}

impl NodeId {
    /// Slot index
    pub fn index(&self) -> usize {
        self.index
    }

    /// Slot generation at the time the node was inserted
    pub fn generation(&self) -> u32 {
        self.generation
    }
}

/// Cached unit plus its list and bucket links
pub(crate) struct Node {
    pub class: usize,
    pub hash: u64,
    pub weight: usize,
    pub pins: u32,
    pub lru_prev: Option<usize>,
    pub lru_next: Option<usize>,
    pub bucket_prev: Option<usize>,
    pub bucket_next: Option<usize>,
    pub payload: Box<dyn Any + Send>,
}

impl Node {
    pub fn new(class: usize, hash: u64, weight: usize, payload: Box<dyn Any + Send>) -> Self {
        Self {
            class,
            hash,
            weight,
            pins: 0,
            lru_prev: None,
            lru_next: None,
            bucket_prev: None,
            bucket_next: None,
            payload,
        }
    }
}

struct Slot {
    generation: u32,
    node: Option<Node>,
}

pub(crate) struct Arena {
    slots: Vec<Slot>,
    free_list: Vec<usize>,
    len: usize,
}

impl Arena {
    pub fn new() -> Self {
        Self {
            slots: Vec::new(),
            free_list: Vec::new(),
            len: 0,
        }
    }

    /// Make sure the next `insert` does not need to allocate
    pub fn reserve_one(&mut self) -> Result<()> {
        if self.free_list.is_empty() {
            self.slots
                .try_reserve(1)
                .map_err(|_| CacheError::OutOfMemory)?;
        }
        Ok(())
    }

    pub fn insert(&mut self, node: Node) -> usize {
        self.len += 1;
        if let Some(idx) = self.free_list.pop() {
            self.slots[idx].node = Some(node);
            idx
        } else {
            self.slots.push(Slot {
                generation: 0,
                node: Some(node),
            });
            self.slots.len() - 1
        }
    }

    pub fn remove(&mut self, idx: usize) -> Option<Node> {
        let slot = self.slots.get_mut(idx)?;
        let node = slot.node.take()?;
        slot.generation = slot.generation.wrapping_add(1);
        self.free_list.push(idx);
        self.len -= 1;
        Some(node)
    }

    /// Panics on a vacant slot; links only ever point at resident nodes.
    pub fn node(&self, idx: usize) -> &Node {
        match self.slots[idx].node.as_ref() {
            Some(node) => node,
            None => panic!("dangling node link {}", idx),
        }
    }

    pub fn node_mut(&mut self, idx: usize) -> &mut Node {
        match self.slots[idx].node.as_mut() {
            Some(node) => node,
            None => panic!("dangling node link {}", idx),
        }
    }

    pub fn id_of(&self, idx: usize) -> NodeId {
        NodeId {
            index: idx,
            generation: self.slots[idx].generation,
        }
    }

    /// Slot index of `id` if it still names a resident node
    pub fn resolve(&self, id: NodeId) -> Option<usize> {
        let idx = id.index();
        let slot = self.slots.get(idx)?;
        (slot.generation == id.generation && slot.node.is_some()).then_some(idx)
    }

    pub fn len(&self) -> usize {
        self.len
    }

    /// Indices of every resident node, in slot order
    pub fn indices(&self) -> impl Iterator<Item = usize> + '_ {
        self.slots
            .iter()
            .enumerate()
            .filter(|(_, slot)| slot.node.is_some())
            .map(|(idx, _)| idx)
    }
}
