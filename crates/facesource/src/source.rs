//! The contract between the glyph cache and whatever opens fonts

use std::fmt::Debug;
use std::hash::Hash;

use crate::error::Result;

/// An opened font handle.
///
/// The cache never interprets font data; it only asks the handle for the
/// raw, uncached character map operations below.
pub trait FontFace: Send {
    /// Number of character map subtables in the face
    fn subtable_count(&self) -> usize;

    /// Currently active subtable, if any
    fn active_subtable(&self) -> Option<usize>;

    /// Select the active subtable (`None` deselects)
    ///
    /// Fails with [`Error::InvalidSubtable`](crate::Error::InvalidSubtable)
    /// when the index is out of range.
    fn set_active_subtable(&mut self, index: Option<usize>) -> Result<()>;

    /// Glyph index of `char_code` in the active subtable, 0 for "no glyph"
    fn glyph_index(&self, char_code: u32) -> u32;

    /// Approximate resident size in bytes
    fn weight(&self) -> usize {
        std::mem::size_of_val(self)
    }
}

/// Factory resolving opaque face identifiers to opened faces.
///
/// `resolve` must be idempotent: the cache calls it again whenever a face
/// it previously released is needed.
pub trait FaceSource: 'static {
    /// Caller-defined face identifier
    type FaceId: Clone + Eq + Hash + Debug + Send + 'static;

    /// Opened face handle
    type Face: FontFace + 'static;

    /// Open or reopen the face identified by `id`
    fn resolve(&mut self, id: &Self::FaceId) -> Result<Self::Face>;

    /// Take back a face the cache no longer holds
    fn release(&mut self, id: &Self::FaceId, face: Self::Face) {
        let _ = id;
        drop(face);
    }
}
