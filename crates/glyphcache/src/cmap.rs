//! Charmap cache
//!
//! Each node maps a window of [`CMAP_WINDOW`] consecutive character codes
//! of one (face, subtable) pair to glyph indices. Slots start unresolved
//! and are filled from the face on first use; a resolved slot, including
//! glyph 0 ("no glyph"), is never asked for again while the node lives.

use std::marker::PhantomData;

use facesource::{FaceSource, FontFace};
use tracing::debug;

use crate::class::{face_id_hash, CacheClass, ClassHandle};
use crate::error::{CacheError, Result};
use crate::manager::CacheManager;

/// Character codes per charmap node
pub const CMAP_WINDOW: u32 = 128;

const SUBTABLE_HASH_STRIDE: u64 = 211;

/// Which character map a lookup reads
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Subtable {
    /// Whatever subtable the face has active; never switched by the cache
    Current,
    /// Subtable at this index, activated for the duration of the lookup
    Index(usize),
}

impl Subtable {
    /// Negative indices select [`Subtable::Current`]
    pub fn from_raw(index: i32) -> Self {
        match usize::try_from(index) {
            Ok(index) => Subtable::Index(index),
            Err(_) => Subtable::Current,
        }
    }

    fn hash_key(self) -> u64 {
        match self {
            Subtable::Current => 0,
            Subtable::Index(index) => index as u64,
        }
    }
}

/// Charmap lookup key
#[derive(Debug, Clone)]
pub struct CmapQuery<F> {
    /// Face to read
    pub face_id: F,
    /// Character map to read
    pub subtable: Subtable,
    /// Character code requested
    pub char_code: u32,
}

/// One window of cached glyph indices
#[derive(Debug, Clone)]
pub struct CmapNode<F> {
    face_id: F,
    subtable: Subtable,
    first: u32,
    glyphs: [Option<u32>; CMAP_WINDOW as usize],
}

impl<F> CmapNode<F> {
    /// First character code covered (a multiple of [`CMAP_WINDOW`])
    pub fn first(&self) -> u32 {
        self.first
    }

    /// Face the window belongs to
    pub fn face_id(&self) -> &F {
        &self.face_id
    }

    /// Subtable the window belongs to
    pub fn subtable(&self) -> Subtable {
        self.subtable
    }

    fn slot(&self, char_code: u32) -> Option<usize> {
        let offset = char_code.wrapping_sub(self.first);
        (offset < CMAP_WINDOW).then_some(offset as usize)
    }

    /// Cached glyph index; `None` if out of window or not yet resolved
    pub fn glyph(&self, char_code: u32) -> Option<u32> {
        self.slot(char_code).and_then(|slot| self.glyphs[slot])
    }

    /// Number of resolved slots
    pub fn resolved(&self) -> usize {
        self.glyphs.iter().filter(|g| g.is_some()).count()
    }

    fn store(&mut self, char_code: u32, glyph: u32) {
        if let Some(slot) = self.slot(char_code) {
            self.glyphs[slot] = Some(glyph);
        }
    }
}

/// Cache class behind [`CmapCache`]
pub struct CmapClass<S> {
    _source: PhantomData<fn() -> S>,
}

impl<S: FaceSource> CacheClass<S> for CmapClass<S> {
    type Query = CmapQuery<S::FaceId>;
    type Node = CmapNode<S::FaceId>;

    fn name(&self) -> &'static str {
        "cmap"
    }

    fn hash(&self, query: &Self::Query) -> u64 {
        face_id_hash(&query.face_id)
            .wrapping_add(SUBTABLE_HASH_STRIDE.wrapping_mul(query.subtable.hash_key()))
            .wrapping_add(u64::from(query.char_code / CMAP_WINDOW))
    }

    fn construct(&self, query: &Self::Query, _source: &mut S) -> Result<Self::Node> {
        Ok(CmapNode {
            face_id: query.face_id.clone(),
            subtable: query.subtable,
            first: (query.char_code / CMAP_WINDOW) * CMAP_WINDOW,
            glyphs: [None; CMAP_WINDOW as usize],
        })
    }

    fn weight(&self, _node: &Self::Node) -> usize {
        std::mem::size_of::<Self::Node>()
    }

    fn compare(&self, node: &Self::Node, query: &Self::Query) -> bool {
        node.face_id == query.face_id
            && node.subtable == query.subtable
            && node.slot(query.char_code).is_some()
    }

    fn owned_by(&self, node: &Self::Node, face_id: &S::FaceId) -> bool {
        node.face_id == *face_id
    }
}

/// Character code to glyph index cache
pub struct CmapCache<S> {
    class: ClassHandle<CmapClass<S>>,
}

impl<S> Clone for CmapCache<S> {
    fn clone(&self) -> Self {
        Self { class: self.class }
    }
}

impl<S: FaceSource> CmapCache<S> {
    /// Register a charmap cache with `manager`
    pub fn new(manager: &mut CacheManager<S>) -> Self {
        let class = manager.register_class(CmapClass {
            _source: PhantomData,
        });
        Self { class }
    }

    /// Class handle, for generic manager calls such as `invalidate_where`
    pub fn class(&self) -> ClassHandle<CmapClass<S>> {
        self.class
    }

    /// Glyph index of `char_code` in a face's character map.
    ///
    /// A negative `subtable` reads the face's active subtable without
    /// switching it. Otherwise the requested subtable is activated only if
    /// it is not already active, and the previous one is restored after
    /// the query.
    ///
    /// # Returns
    /// * `Ok(0)` - the face has no glyph for `char_code`
    /// * `Err(InvalidArgument)` - subtable out of range or foreign manager
    /// * `Err(FontUnavailable)` - the face could not be opened
    pub fn lookup(
        &self,
        manager: &mut CacheManager<S>,
        face_id: &S::FaceId,
        subtable: i32,
        char_code: u32,
    ) -> Result<u32> {
        let query = CmapQuery {
            face_id: face_id.clone(),
            subtable: Subtable::from_raw(subtable),
            char_code,
        };

        let Some(id) = manager.find_node(self.class, &query)? else {
            // Resolve before inserting, so a failed lookup adds no window.
            let glyph = resolve_glyph(manager, face_id, query.subtable, char_code)?;
            let id = manager.lookup_node(self.class, &query)?;
            if let Some(node) = manager.payload_mut(self.class, id) {
                node.store(char_code, glyph);
            }
            return Ok(glyph);
        };

        if let Some(glyph) = manager
            .payload(self.class, id)
            .and_then(|node| node.glyph(char_code))
        {
            return Ok(glyph);
        }

        // Opening the face may evict; keep the window resident meanwhile.
        manager.pin(id)?;
        let resolved = resolve_glyph(manager, face_id, query.subtable, char_code);
        if let Ok(glyph) = &resolved {
            if let Some(node) = manager.payload_mut(self.class, id) {
                node.store(char_code, *glyph);
            }
        }
        // The face was opened after the window; the window is still the
        // more recent use.
        manager.touch(id);
        manager.unpin_keep(id);

        resolved
    }

    /// Compatibility mode of [`lookup`](Self::lookup): every error reads
    /// as glyph 0, so "no glyph" and "lookup failed" are indistinguishable.
    pub fn lookup_or_zero(
        &self,
        manager: &mut CacheManager<S>,
        face_id: &S::FaceId,
        subtable: i32,
        char_code: u32,
    ) -> u32 {
        match self.lookup(manager, face_id, subtable, char_code) {
            Ok(glyph) => glyph,
            Err(e) => {
                debug!(face = ?face_id, subtable, char_code, error = %e, "cmap lookup failed, returning 0");
                0
            }
        }
    }
}

/// Ask the face itself, switching subtables around the query if needed
fn resolve_glyph<S: FaceSource>(
    manager: &mut CacheManager<S>,
    face_id: &S::FaceId,
    subtable: Subtable,
    char_code: u32,
) -> Result<u32> {
    let face = manager.lookup_face(face_id)?;
    let count = face.subtable_count();

    let index = match subtable {
        Subtable::Current if count == 0 => {
            return Err(CacheError::InvalidArgument(format!(
                "face {:?} has no character maps",
                face_id
            )))
        }
        Subtable::Current => return Ok(face.glyph_index(char_code)),
        Subtable::Index(index) if index >= count => {
            return Err(CacheError::InvalidArgument(format!(
                "subtable {} out of range for face {:?} ({} available)",
                index, face_id, count
            )))
        }
        Subtable::Index(index) => index,
    };

    let previous = face.active_subtable();
    if previous == Some(index) {
        return Ok(face.glyph_index(char_code));
    }

    face.set_active_subtable(Some(index))?;
    let glyph = face.glyph_index(char_code);
    face.set_active_subtable(previous)?;

    Ok(glyph)
}

#[cfg(test)]
mod tests {
    use super::*;
    use facesource::TableFaceSource;

    const FACE: &str = "\
CMAP1
subtable 3 1
0x41..0x5A 10
0x100 99
subtable 1 0
0x41 200
";

    fn setup(max_weight: usize) -> (CacheManager<TableFaceSource>, CmapCache<TableFaceSource>) {
        let mut source = TableFaceSource::new();
        source.register_text(1, FACE);
        let mut manager = CacheManager::with_budget(source, max_weight).unwrap();
        let cmap = CmapCache::new(&mut manager);
        (manager, cmap)
    }

    #[test]
    fn test_subtable_from_raw() {
        assert_eq!(Subtable::from_raw(-1), Subtable::Current);
        assert_eq!(Subtable::from_raw(i32::MIN), Subtable::Current);
        assert_eq!(Subtable::from_raw(0), Subtable::Index(0));
        assert_eq!(Subtable::from_raw(3), Subtable::Index(3));
    }

    #[test]
    fn test_node_window() {
        let class: CmapClass<TableFaceSource> = CmapClass {
            _source: PhantomData,
        };
        let query = CmapQuery {
            face_id: 1,
            subtable: Subtable::Index(0),
            char_code: 300,
        };
        let node = class.construct(&query, &mut TableFaceSource::new()).unwrap();

        assert_eq!(node.first(), 256);
        assert_eq!(node.resolved(), 0);
        assert!(class.compare(&node, &query));
        assert!(class.compare(&node, &CmapQuery { char_code: 383, ..query.clone() }));
        assert!(!class.compare(&node, &CmapQuery { char_code: 384, ..query.clone() }));
        assert!(!class.compare(&node, &CmapQuery { char_code: 255, ..query.clone() }));
        assert!(!class.compare(
            &node,
            &CmapQuery {
                subtable: Subtable::Current,
                ..query.clone()
            }
        ));
        assert_eq!(
            class.hash(&query),
            class.hash(&CmapQuery { char_code: 256, ..query })
        );
    }

    #[test]
    fn test_lookup_resolves_and_caches() {
        let (mut manager, cmap) = setup(100_000);

        assert_eq!(cmap.lookup(&mut manager, &1, 0, 0x41).unwrap(), 10);
        assert_eq!(cmap.lookup(&mut manager, &1, 0, 0x42).unwrap(), 11);
        assert_eq!(cmap.lookup(&mut manager, &1, 0, 0x41).unwrap(), 10);

        // One face node plus one window
        assert_eq!(manager.len(), 2);
        manager.check_invariants().unwrap();
    }

    #[test]
    fn test_no_glyph_is_cached() {
        let (mut manager, cmap) = setup(100_000);

        assert_eq!(cmap.lookup(&mut manager, &1, 0, 0x7F).unwrap(), 0);

        // The face is gone but the cached answer still stands
        manager.source_mut().unregister(1);
        manager.invalidate_where(manager.face_class(), |_| true).unwrap();
        assert_eq!(cmap.lookup(&mut manager, &1, 0, 0x7F).unwrap(), 0);
        assert!(cmap.lookup(&mut manager, &1, 0, 0x7E).is_err());
    }

    #[test]
    fn test_other_subtable_is_restored() {
        let (mut manager, cmap) = setup(100_000);

        assert_eq!(cmap.lookup(&mut manager, &1, 1, 0x41).unwrap(), 200);
        assert_eq!(manager.lookup_face(&1).unwrap().active_subtable(), Some(0));
        assert_eq!(cmap.lookup(&mut manager, &1, 0, 0x41).unwrap(), 10);
    }

    #[test]
    fn test_current_subtable() {
        let (mut manager, cmap) = setup(100_000);

        manager
            .lookup_face(&1)
            .unwrap()
            .set_active_subtable(Some(1))
            .unwrap();
        assert_eq!(cmap.lookup(&mut manager, &1, -1, 0x41).unwrap(), 200);
        assert_eq!(manager.lookup_face(&1).unwrap().active_subtable(), Some(1));
    }

    #[test]
    fn test_invalid_subtable() {
        let (mut manager, cmap) = setup(100_000);

        cmap.lookup(&mut manager, &1, 0, 0x41).unwrap();
        let (len, weight) = (manager.len(), manager.cur_weight());

        let result = cmap.lookup(&mut manager, &1, 5, 0x41);
        assert!(matches!(result, Err(CacheError::InvalidArgument(_))));
        assert_eq!(cmap.lookup_or_zero(&mut manager, &1, 5, 0x41), 0);

        // No window for subtable 5
        assert_eq!(manager.len(), len);
        assert_eq!(manager.cur_weight(), weight);
    }

    #[test]
    fn test_unavailable_face() {
        let (mut manager, cmap) = setup(100_000);

        let result = cmap.lookup(&mut manager, &42, 0, 0x41);
        assert!(matches!(result, Err(CacheError::FontUnavailable(_))));
        assert_eq!(cmap.lookup_or_zero(&mut manager, &42, 0, 0x41), 0);
        assert!(manager.is_empty());
        assert_eq!(manager.cur_weight(), 0);
    }

    #[test]
    fn test_failed_lookups_keep_resolved_windows() {
        // Room for the face and two windows, nothing more
        let window = std::mem::size_of::<CmapNode<u32>>();
        let (mut manager, cmap) = setup(2 * window + 4096);

        assert_eq!(cmap.lookup(&mut manager, &1, 0, 0x41).unwrap(), 10);
        for code in [0x41, 0x200, 0x400, 0x600] {
            assert!(cmap.lookup(&mut manager, &42, 0, code).is_err());
        }

        assert_eq!(manager.len(), 2);
        assert_eq!(cmap.lookup(&mut manager, &1, 0, 0x41).unwrap(), 10);
        assert_eq!(manager.source().open_count(), 1);
    }

    #[test]
    fn test_oversized_window_is_kept() {
        let window = std::mem::size_of::<CmapNode<u32>>();
        let (mut manager, cmap) = setup(100);

        assert_eq!(cmap.lookup(&mut manager, &1, 0, 0x41).unwrap(), 10);
        assert_eq!(manager.len(), 1);
        assert_eq!(manager.cur_weight(), window);

        // Filling another slot reopens the face and keeps the window
        assert_eq!(cmap.lookup(&mut manager, &1, 0, 0x42).unwrap(), 11);
        assert_eq!(manager.len(), 1);
        assert_eq!(manager.cur_weight(), window);
        assert_eq!(manager.source().open_count(), 2);

        assert_eq!(cmap.lookup(&mut manager, &1, 0, 0x41).unwrap(), 10);
        assert_eq!(manager.source().open_count(), 2);
        manager.check_invariants().unwrap();
    }

    #[test]
    fn test_window_survives_face_eviction() {
        // Budget smaller than window plus face: the face goes, the window
        // it filled stays.
        let window = std::mem::size_of::<CmapNode<u32>>();
        let (mut manager, cmap) = setup(window);

        assert_eq!(cmap.lookup(&mut manager, &1, 0, 0x100).unwrap(), 99);
        assert!(manager.cur_weight() <= window);
        manager.check_invariants().unwrap();
    }
}
