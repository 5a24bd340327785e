//! Cache classes
//!
//! A cache class is one kind of cached object (charmap windows, opened
//! faces, glyph images, ...). Every class plugs into the same manager, so
//! all of them share one LRU list, one bucket index and one weight budget.

use std::any::Any;
use std::hash::{BuildHasher, Hash, Hasher};
use std::marker::PhantomData;

use ahash::RandomState;
use facesource::FaceSource;

use crate::error::Result;

/// Behaviour of one kind of cached object.
///
/// Callbacks only see the node, the query and the face source handed to
/// them; they never reach into the manager, which is what lets classes
/// interleave freely in the shared structures.
pub trait CacheClass<S: FaceSource>: Send + 'static {
    /// Transient lookup key
    type Query;

    /// Cached payload
    type Node: Send + 'static;

    /// Short name used in logs
    fn name(&self) -> &'static str;

    /// Hash of a query.
    ///
    /// Queries answered by the same node must hash alike; `compare` does
    /// the authoritative match.
    fn hash(&self, query: &Self::Query) -> u64;

    /// Build the payload for a query that missed
    fn construct(&self, query: &Self::Query, source: &mut S) -> Result<Self::Node>;

    /// Byte cost of a payload, computed once at insertion
    fn weight(&self, node: &Self::Node) -> usize;

    /// Whether `node` answers `query`
    fn compare(&self, node: &Self::Node, query: &Self::Query) -> bool;

    /// Whether `node` was derived from the face `face_id`
    fn owned_by(&self, node: &Self::Node, face_id: &S::FaceId) -> bool;

    /// Dispose of a payload leaving the cache
    fn free(&self, node: Self::Node, source: &mut S) {
        let _ = source;
        drop(node);
    }
}

/// Typed handle to a registered class
pub struct ClassHandle<C> {
    pub(crate) manager: u64,
    pub(crate) index: usize,
    _class: PhantomData<fn() -> C>,
}

impl<C> ClassHandle<C> {
    pub(crate) fn new(manager: u64, index: usize) -> Self {
        Self {
            manager,
            index,
            _class: PhantomData,
        }
    }

    /// Registration slot of the class within its manager
    pub fn index(&self) -> usize {
        self.index
    }
}

impl<C> Clone for ClassHandle<C> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<C> Copy for ClassHandle<C> {}

impl<C> std::fmt::Debug for ClassHandle<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClassHandle")
            .field("manager", &self.manager)
            .field("index", &self.index)
            .finish()
    }
}

/// Class callbacks the manager needs without knowing payload types
pub(crate) trait ErasedClass<S: FaceSource>: Send {
    fn name(&self) -> &'static str;
    fn as_any(&self) -> &dyn Any;
    fn owned_by(&self, payload: &(dyn Any + Send), face_id: &S::FaceId) -> bool;
    fn free(&self, payload: Box<dyn Any + Send>, source: &mut S);
}

impl<S: FaceSource, C: CacheClass<S>> ErasedClass<S> for C {
    fn name(&self) -> &'static str {
        <C as CacheClass<S>>::name(self)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn owned_by(&self, payload: &(dyn Any + Send), face_id: &S::FaceId) -> bool {
        payload
            .downcast_ref::<C::Node>()
            .is_some_and(|node| <C as CacheClass<S>>::owned_by(self, node, face_id))
    }

    fn free(&self, payload: Box<dyn Any + Send>, source: &mut S) {
        if let Ok(node) = payload.downcast::<C::Node>() {
            <C as CacheClass<S>>::free(self, *node, source);
        }
    }
}

// Fixed seeds keep face hashes stable across managers and runs.
const FACE_HASH_SEEDS: [u64; 4] = [
    0x243f_6a88_85a3_08d3,
    0x1319_8a2e_0370_7344,
    0xa409_3822_299f_31d0,
    0x082e_fa98_ec4e_6c89,
];

/// Identity hash of a face id, for use in class `hash` callbacks
pub fn face_id_hash<T: Hash + ?Sized>(face_id: &T) -> u64 {
    let [k0, k1, k2, k3] = FACE_HASH_SEEDS;
    let mut hasher = RandomState::with_seeds(k0, k1, k2, k3).build_hasher();
    face_id.hash(&mut hasher);
    hasher.finish()
}
