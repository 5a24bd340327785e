//! Face cache class
//!
//! Opened faces are cached nodes like any other: they count against the
//! budget, age in the shared LRU list and go back to the face source via
//! [`FaceSource::release`] when evicted. The next lookup reopens them.

use std::marker::PhantomData;

use facesource::{FaceSource, FontFace};

use crate::class::{face_id_hash, CacheClass};
use crate::error::{CacheError, Result};

/// A cached, opened face
pub struct FaceNode<S: FaceSource> {
    id: S::FaceId,
    face: S::Face,
}

impl<S: FaceSource> FaceNode<S> {
    /// Identifier the face was resolved from
    pub fn id(&self) -> &S::FaceId {
        &self.id
    }

    /// Opened face
    pub fn face(&self) -> &S::Face {
        &self.face
    }

    /// Opened face, mutably (e.g. to switch subtables)
    pub fn face_mut(&mut self) -> &mut S::Face {
        &mut self.face
    }
}

/// Built-in class keyed by face id; registered by every manager
pub struct FaceClass<S> {
    _source: PhantomData<fn() -> S>,
}

impl<S> FaceClass<S> {
    pub(crate) fn new() -> Self {
        Self {
            _source: PhantomData,
        }
    }
}

impl<S: FaceSource> CacheClass<S> for FaceClass<S> {
    type Query = S::FaceId;
    type Node = FaceNode<S>;

    fn name(&self) -> &'static str {
        "face"
    }

    fn hash(&self, query: &S::FaceId) -> u64 {
        face_id_hash(query)
    }

    fn construct(&self, query: &S::FaceId, source: &mut S) -> Result<FaceNode<S>> {
        let face = source.resolve(query).map_err(|e| match e {
            facesource::Error::FontUnavailable(msg) => CacheError::FontUnavailable(msg),
            other => CacheError::FontUnavailable(format!("{:?}: {}", query, other)),
        })?;

        Ok(FaceNode {
            id: query.clone(),
            face,
        })
    }

    fn weight(&self, node: &FaceNode<S>) -> usize {
        std::mem::size_of::<FaceNode<S>>() + node.face.weight()
    }

    fn compare(&self, node: &FaceNode<S>, query: &S::FaceId) -> bool {
        node.id == *query
    }

    fn owned_by(&self, node: &FaceNode<S>, face_id: &S::FaceId) -> bool {
        node.id == *face_id
    }

    fn free(&self, node: FaceNode<S>, source: &mut S) {
        source.release(&node.id, node.face);
    }
}
