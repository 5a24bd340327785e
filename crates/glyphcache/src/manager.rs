//! Cache manager
//!
//! Owns every resident node of every registered class, the bucket index,
//! the global LRU list and the weight budget. Not internally synchronised;
//! see [`SharedManager`](crate::SharedManager) for a locked wrapper.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use facesource::FaceSource;
use tracing::{debug, trace, warn};

use crate::bucket::BucketIndex;
use crate::class::{CacheClass, ClassHandle, ErasedClass};
use crate::config::ManagerConfig;
use crate::error::{CacheError, Result};
use crate::face::FaceClass;
use crate::lru::LruList;
use crate::node::{Arena, Node, NodeId};
use crate::stats::CacheStats;

static NEXT_MANAGER_ID: AtomicU64 = AtomicU64::new(1);

type Classes<S> = [Box<dyn ErasedClass<S>>];

/// Weight-bounded, LRU-evicting store shared by all cache classes
pub struct CacheManager<S: FaceSource> {
    id: u64,
    source: S,
    classes: Vec<Box<dyn ErasedClass<S>>>,
    store: Store,
    faces: ClassHandle<FaceClass<S>>,
    stats: Arc<CacheStats>,
}

/// Node structures plus weight accounting
struct Store {
    arena: Arena,
    lru: LruList,
    buckets: BucketIndex,
    cur_weight: usize,
    max_weight: usize,
}

impl Store {
    fn new(config: &ManagerConfig) -> Self {
        Self {
            arena: Arena::new(),
            lru: LruList::new(),
            buckets: BucketIndex::new(config.initial_buckets),
            cur_weight: 0,
            max_weight: config.max_weight,
        }
    }

    /// Unlink a node from both structures and hand it to its class
    fn remove<S: FaceSource>(&mut self, idx: usize, classes: &Classes<S>, source: &mut S) {
        self.buckets.remove(&mut self.arena, idx);
        self.lru.unlink(&mut self.arena, idx);

        if let Some(node) = self.arena.remove(idx) {
            self.cur_weight -= node.weight;
            classes[node.class].free(node.payload, source);
        }
    }

    /// Evict from the LRU end until the budget holds.
    ///
    /// Pinned nodes and `keep` are skipped, so the budget may stay
    /// exceeded when nothing else is left to evict.
    fn compress<S: FaceSource>(
        &mut self,
        classes: &Classes<S>,
        source: &mut S,
        stats: &CacheStats,
        keep: Option<usize>,
    ) -> usize {
        let mut evicted = 0;
        let mut cursor = self.lru.tail();

        while self.cur_weight > self.max_weight {
            let Some(idx) = cursor else { break };
            let node = self.arena.node(idx);
            cursor = node.lru_prev;

            if Some(idx) == keep || node.pins > 0 {
                continue;
            }

            trace!(
                class = classes[node.class].name(),
                weight = node.weight,
                "evicting node"
            );
            self.remove(idx, classes, source);
            stats.record_eviction();
            evicted += 1;
        }

        if evicted > 0 {
            debug!(
                evicted,
                cur_weight = self.cur_weight,
                max_weight = self.max_weight,
                "compressed cache"
            );
        }
        evicted
    }

    /// Resident node answering `query`, or `NotCached`
    fn find<S: FaceSource, C: CacheClass<S>>(
        &self,
        class: &C,
        class_index: usize,
        hash: u64,
        query: &C::Query,
    ) -> Result<usize> {
        let mut cursor = self.buckets.first(hash);

        while let Some(idx) = cursor {
            let node = self.arena.node(idx);
            cursor = node.bucket_next;

            if node.class != class_index || node.hash != hash {
                continue;
            }
            if node
                .payload
                .downcast_ref::<C::Node>()
                .is_some_and(|payload| class.compare(payload, query))
            {
                return Ok(idx);
            }
        }

        Err(CacheError::NotCached)
    }
}

fn typed_class<'a, S: FaceSource, C: CacheClass<S>>(
    classes: &'a Classes<S>,
    manager: u64,
    handle: ClassHandle<C>,
) -> Result<&'a C> {
    if handle.manager != manager {
        return Err(CacheError::InvalidArgument(
            "class handle belongs to another manager".to_string(),
        ));
    }

    classes
        .get(handle.index)
        .and_then(|class| class.as_any().downcast_ref::<C>())
        .ok_or_else(|| {
            CacheError::InvalidArgument(format!("no such class registered at {}", handle.index))
        })
}

impl<S: FaceSource> CacheManager<S> {
    /// Create a manager over `source`
    ///
    /// # Arguments
    /// * `source` - Face source used to open and reopen faces
    /// * `config` - Budget and bucket settings
    ///
    /// # Returns
    /// * `Result<CacheManager<S>>` - `InvalidArgument` for a bad config
    pub fn new(source: S, config: ManagerConfig) -> Result<Self> {
        config.validate()?;

        let id = NEXT_MANAGER_ID.fetch_add(1, Ordering::Relaxed);
        let classes: Vec<Box<dyn ErasedClass<S>>> = vec![Box::new(FaceClass::<S>::new())];

        debug!(
            manager = id,
            max_weight = config.max_weight,
            buckets = config.initial_buckets,
            "created cache manager"
        );

        Ok(Self {
            id,
            source,
            classes,
            store: Store::new(&config),
            faces: ClassHandle::new(id, 0),
            stats: Arc::new(CacheStats::new()),
        })
    }

    /// Create a manager with a weight budget and default buckets
    pub fn with_budget(source: S, max_weight: usize) -> Result<Self> {
        Self::new(source, ManagerConfig::with_budget(max_weight))
    }

    /// Register a cache class
    pub fn register_class<C: CacheClass<S>>(&mut self, class: C) -> ClassHandle<C> {
        let index = self.classes.len();
        debug!(
            class = <C as CacheClass<S>>::name(&class),
            index,
            "registered cache class"
        );
        self.classes.push(Box::new(class));
        ClassHandle::new(self.id, index)
    }

    /// Handle of the built-in face class
    pub fn face_class(&self) -> ClassHandle<FaceClass<S>> {
        self.faces
    }

    /// Find or build the node answering `query` and return its id.
    ///
    /// A hit moves the node to the MRU end. A miss constructs the payload,
    /// inserts it at the MRU end and evicts from the LRU end while the
    /// budget is exceeded; the new node itself is never evicted here.
    /// Construction failures propagate and leave the cache unchanged.
    pub fn lookup_node<C: CacheClass<S>>(
        &mut self,
        handle: ClassHandle<C>,
        query: &C::Query,
    ) -> Result<NodeId> {
        if let Some(id) = self.find_node(handle, query)? {
            return Ok(id);
        }

        let class = typed_class(&self.classes, self.id, handle)?;
        let name = <C as CacheClass<S>>::name(class);
        let hash = class.hash(query);
        let store = &mut self.store;

        self.stats.record_miss();
        trace!(class = name, hash, "cache miss");

        store.arena.reserve_one()?;
        let payload = class.construct(query, &mut self.source)?;
        let weight = class.weight(&payload);
        if weight > store.max_weight {
            warn!(
                class = name,
                weight,
                max_weight = store.max_weight,
                "node alone exceeds the cache budget"
            );
        }

        let idx = store
            .arena
            .insert(Node::new(handle.index, hash, weight, Box::new(payload)));
        store.buckets.insert(&mut store.arena, idx);
        store.lru.push_front(&mut store.arena, idx);
        store.cur_weight += weight;
        self.stats.record_insert();

        if store.cur_weight > store.max_weight {
            store.compress(&self.classes, &mut self.source, &self.stats, Some(idx));
        }

        Ok(store.arena.id_of(idx))
    }

    /// Resident node answering `query`, moved to the MRU end.
    ///
    /// Never constructs: a miss returns `Ok(None)` and leaves the cache
    /// untouched.
    pub fn find_node<C: CacheClass<S>>(
        &mut self,
        handle: ClassHandle<C>,
        query: &C::Query,
    ) -> Result<Option<NodeId>> {
        let class = typed_class(&self.classes, self.id, handle)?;
        let hash = class.hash(query);
        let store = &mut self.store;

        match store.find::<S, C>(class, handle.index, hash, query) {
            Ok(idx) => {
                store.buckets.promote(&mut store.arena, idx);
                store.lru.move_to_front(&mut store.arena, idx);
                self.stats.record_hit();
                trace!(class = <C as CacheClass<S>>::name(class), hash, "cache hit");
                Ok(Some(store.arena.id_of(idx)))
            }
            Err(CacheError::NotCached) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Find or build the node answering `query` and borrow its payload.
    ///
    /// The borrow ends before any other manager call, so a payload can
    /// never be observed after its eviction.
    pub fn lookup_or_create<C: CacheClass<S>>(
        &mut self,
        handle: ClassHandle<C>,
        query: &C::Query,
    ) -> Result<&mut C::Node> {
        let id = self.lookup_node(handle, query)?;
        self.payload_mut(handle, id).ok_or(CacheError::NotCached)
    }

    /// Opened face for `face_id`, reopened through the source if evicted
    pub fn lookup_face(&mut self, face_id: &S::FaceId) -> Result<&mut S::Face> {
        let faces = self.faces;
        self.lookup_or_create(faces, face_id)
            .map(|node| node.face_mut())
    }

    /// Payload of a resident node of class `handle`
    pub fn payload<C: CacheClass<S>>(&self, handle: ClassHandle<C>, id: NodeId) -> Option<&C::Node> {
        if handle.manager != self.id {
            return None;
        }
        let idx = self.store.arena.resolve(id)?;
        let node = self.store.arena.node(idx);
        if node.class != handle.index {
            return None;
        }
        node.payload.downcast_ref::<C::Node>()
    }

    /// Mutable payload of a resident node of class `handle`.
    ///
    /// Callers may fill in lazily computed parts of a payload but must not
    /// change what its weight accounts for.
    pub fn payload_mut<C: CacheClass<S>>(
        &mut self,
        handle: ClassHandle<C>,
        id: NodeId,
    ) -> Option<&mut C::Node> {
        if handle.manager != self.id {
            return None;
        }
        let idx = self.store.arena.resolve(id)?;
        let node = self.store.arena.node_mut(idx);
        if node.class != handle.index {
            return None;
        }
        node.payload.downcast_mut::<C::Node>()
    }

    /// Whether `id` still names a resident node
    pub fn contains(&self, id: NodeId) -> bool {
        self.store.arena.resolve(id).is_some()
    }

    /// Weight recorded for a resident node
    pub fn node_weight(&self, id: NodeId) -> Option<usize> {
        let idx = self.store.arena.resolve(id)?;
        Some(self.store.arena.node(idx).weight)
    }

    /// Protect a node from eviction until a matching [`unpin`](Self::unpin).
    ///
    /// Pins nest. Explicit removal (invalidation, flush) ignores pins.
    pub fn pin(&mut self, id: NodeId) -> Result<()> {
        let idx = self
            .store
            .arena
            .resolve(id)
            .ok_or_else(|| CacheError::InvalidArgument(format!("stale node id {:?}", id)))?;
        self.store.arena.node_mut(idx).pins += 1;
        Ok(())
    }

    /// Drop one pin; returns false if the node is gone or was not pinned.
    ///
    /// Evicts right away if pins had kept the cache over budget.
    pub fn unpin(&mut self, id: NodeId) -> bool {
        self.release_pin(id, false)
    }

    /// [`unpin`](Self::unpin) for a node the caller is still using: the
    /// follow-up eviction spares it even if it alone exceeds the budget.
    pub(crate) fn unpin_keep(&mut self, id: NodeId) -> bool {
        self.release_pin(id, true)
    }

    fn release_pin(&mut self, id: NodeId, keep: bool) -> bool {
        let Some(idx) = self.store.arena.resolve(id) else {
            return false;
        };
        let node = self.store.arena.node_mut(idx);
        if node.pins == 0 {
            return false;
        }
        node.pins -= 1;

        if self.store.cur_weight > self.store.max_weight {
            let keep = keep.then_some(idx);
            self.store
                .compress(&self.classes, &mut self.source, &self.stats, keep);
        }
        true
    }

    /// Mark a resident node most recently used; false if it is gone
    pub fn touch(&mut self, id: NodeId) -> bool {
        match self.store.arena.resolve(id) {
            Some(idx) => {
                let store = &mut self.store;
                store.lru.move_to_front(&mut store.arena, idx);
                true
            }
            None => false,
        }
    }

    /// Remove one node regardless of pins
    pub fn remove_node(&mut self, id: NodeId) -> bool {
        match self.store.arena.resolve(id) {
            Some(idx) => {
                self.store.remove(idx, &self.classes, &mut self.source);
                true
            }
            None => false,
        }
    }

    /// Remove every node, of any class, derived from `face_id`.
    ///
    /// Use when a face is unloaded or changed behind the cache's back.
    /// Returns the number of nodes removed.
    pub fn invalidate_face(&mut self, face_id: &S::FaceId) -> usize {
        let store = &mut self.store;
        let mut removed = 0;
        let mut cursor = store.lru.head();

        while let Some(idx) = cursor {
            let node = store.arena.node(idx);
            cursor = node.lru_next;

            if self.classes[node.class].owned_by(&*node.payload, face_id) {
                store.remove(idx, &self.classes, &mut self.source);
                removed += 1;
            }
        }

        self.stats.record_invalidations(removed as u64);
        debug!(face = ?face_id, removed, "invalidated face");
        removed
    }

    /// Remove every node of class `handle` matching `predicate`
    pub fn invalidate_where<C, F>(&mut self, handle: ClassHandle<C>, mut predicate: F) -> Result<usize>
    where
        C: CacheClass<S>,
        F: FnMut(&C::Node) -> bool,
    {
        let class = typed_class(&self.classes, self.id, handle)?;
        let store = &mut self.store;
        let mut removed = 0;
        let mut cursor = store.lru.head();

        while let Some(idx) = cursor {
            let node = store.arena.node(idx);
            cursor = node.lru_next;

            if node.class != handle.index {
                continue;
            }
            if node
                .payload
                .downcast_ref::<C::Node>()
                .is_some_and(&mut predicate)
            {
                store.remove(idx, &self.classes, &mut self.source);
                removed += 1;
            }
        }

        self.stats.record_invalidations(removed as u64);
        debug!(
            class = <C as CacheClass<S>>::name(class),
            removed,
            "invalidated nodes"
        );
        Ok(removed)
    }

    /// Evict until the budget holds (pinned nodes excepted)
    pub fn compress(&mut self) -> usize {
        self.store
            .compress(&self.classes, &mut self.source, &self.stats, None)
    }

    /// Change the budget, evicting right away if it shrank
    pub fn set_max_weight(&mut self, max_weight: usize) -> Result<()> {
        if max_weight == 0 {
            return Err(CacheError::InvalidArgument(
                "max_weight must be greater than 0".to_string(),
            ));
        }
        self.store.max_weight = max_weight;
        self.compress();
        Ok(())
    }

    /// Free every resident node through its class
    pub fn flush(&mut self) {
        let mut removed = 0;
        while let Some(idx) = self.store.lru.tail() {
            self.store.remove(idx, &self.classes, &mut self.source);
            removed += 1;
        }
        if removed > 0 {
            debug!(removed, "flushed cache");
        }
    }

    /// Tear the manager down, freeing every node through its class
    pub fn destroy(mut self) {
        self.flush();
        debug!(manager = self.id, "destroyed cache manager");
    }

    /// Total weight of resident nodes
    pub fn cur_weight(&self) -> usize {
        self.store.cur_weight
    }

    /// Weight budget
    pub fn max_weight(&self) -> usize {
        self.store.max_weight
    }

    /// Number of resident nodes
    pub fn len(&self) -> usize {
        self.store.arena.len()
    }

    /// Whether no node is resident
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Current number of hash buckets
    pub fn bucket_count(&self) -> usize {
        self.store.buckets.bucket_count()
    }

    /// Get cache statistics
    pub fn stats(&self) -> &CacheStats {
        &self.stats
    }

    /// Shared handle to the statistics, readable without the manager
    pub fn stats_handle(&self) -> Arc<CacheStats> {
        Arc::clone(&self.stats)
    }

    /// Face source
    pub fn source(&self) -> &S {
        &self.source
    }

    /// Face source, mutably
    pub fn source_mut(&mut self) -> &mut S {
        &mut self.source
    }

    /// Recheck weight accounting and link structure.
    ///
    /// Diagnostic aid for tests and debugging; walks every node.
    pub fn check_invariants(&self) -> std::result::Result<(), String> {
        let store = &self.store;
        let arena = &store.arena;

        let weight: usize = arena.indices().map(|idx| arena.node(idx).weight).sum();
        if weight != store.cur_weight {
            return Err(format!(
                "weight sum {} != recorded weight {}",
                weight, store.cur_weight
            ));
        }

        let mut count = 0;
        let mut prev = None;
        let mut cursor = store.lru.head();
        while let Some(idx) = cursor {
            let node = arena.node(idx);
            if node.lru_prev != prev {
                return Err(format!("broken LRU back link at {}", idx));
            }
            count += 1;
            if count > arena.len() {
                return Err("LRU list has a cycle".to_string());
            }
            prev = Some(idx);
            cursor = node.lru_next;
        }
        if prev != store.lru.tail() {
            return Err("LRU tail does not match the last node".to_string());
        }
        if count != arena.len() || store.lru.len() != count {
            return Err(format!(
                "LRU holds {} nodes (recorded {}), arena holds {}",
                count,
                store.lru.len(),
                arena.len()
            ));
        }

        if store.buckets.count() != arena.len() {
            return Err(format!(
                "bucket index holds {} nodes, arena holds {}",
                store.buckets.count(),
                arena.len()
            ));
        }
        for idx in arena.indices() {
            let mut cursor = store.buckets.first(arena.node(idx).hash);
            let mut found = false;
            while let Some(candidate) = cursor {
                if candidate == idx {
                    found = true;
                    break;
                }
                cursor = arena.node(candidate).bucket_next;
            }
            if !found {
                return Err(format!("node {} missing from its bucket", idx));
            }
        }

        Ok(())
    }
}

impl<S: FaceSource> Drop for CacheManager<S> {
    fn drop(&mut self) {
        self.flush();
    }
}
