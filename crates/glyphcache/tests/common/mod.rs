//! Recording face source shared by the integration tests

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::Arc;

use facesource::{Error, FaceSource, FontFace, Result};
use glyphcache::{face_id_hash, CacheClass, CacheError};
use parking_lot::Mutex;

/// Collaborator calls, in order
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Open(u32),
    Activate(Option<usize>),
    Resolve(u32),
    Release(u32),
}

pub type Log = Arc<Mutex<Vec<Call>>>;

/// Face whose subtable `i` maps `code` to `code + 1000 * (i + 1)`, except
/// multiples of 7 which have no glyph.
pub struct MockFace {
    subtables: usize,
    active: Option<usize>,
    log: Log,
}

impl FontFace for MockFace {
    fn subtable_count(&self) -> usize {
        self.subtables
    }

    fn active_subtable(&self) -> Option<usize> {
        self.active
    }

    fn set_active_subtable(&mut self, index: Option<usize>) -> Result<()> {
        if let Some(index) = index {
            if index >= self.subtables {
                return Err(Error::InvalidSubtable {
                    index,
                    count: self.subtables,
                });
            }
        }
        self.log.lock().push(Call::Activate(index));
        self.active = index;
        Ok(())
    }

    fn glyph_index(&self, char_code: u32) -> u32 {
        self.log.lock().push(Call::Resolve(char_code));
        match self.active {
            Some(_) if char_code % 7 == 0 => 0,
            Some(i) => char_code + 1000 * (i as u32 + 1),
            None => 0,
        }
    }

    fn weight(&self) -> usize {
        256
    }
}

pub fn expected_glyph(subtable: usize, char_code: u32) -> u32 {
    if char_code % 7 == 0 {
        0
    } else {
        char_code + 1000 * (subtable as u32 + 1)
    }
}

/// Source of mock faces keyed by id, recording every call
#[derive(Default)]
pub struct MockSource {
    faces: HashMap<u32, usize>,
    log: Log,
}

impl MockSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register face `id` with `subtables` character maps
    pub fn with_face(mut self, id: u32, subtables: usize) -> Self {
        self.faces.insert(id, subtables);
        self
    }

    pub fn remove_face(&mut self, id: u32) {
        self.faces.remove(&id);
    }

    pub fn log(&self) -> Log {
        Arc::clone(&self.log)
    }
}

impl FaceSource for MockSource {
    type FaceId = u32;
    type Face = MockFace;

    fn resolve(&mut self, id: &u32) -> Result<MockFace> {
        let subtables = *self
            .faces
            .get(id)
            .ok_or_else(|| Error::FontUnavailable(id.to_string()))?;
        self.log.lock().push(Call::Open(*id));
        Ok(MockFace {
            subtables,
            active: (subtables > 0).then_some(0),
            log: Arc::clone(&self.log),
        })
    }

    fn release(&mut self, id: &u32, _face: MockFace) {
        self.log.lock().push(Call::Release(*id));
    }
}

/// Count calls matching `pred`
pub fn count(log: &Log, pred: impl Fn(&Call) -> bool) -> usize {
    log.lock().iter().filter(|call| pred(call)).count()
}

/// Stand-in for a rendered glyph: fixed-weight payload tagged with a face
#[derive(Debug, Clone, PartialEq)]
pub struct Blob {
    pub face: u32,
    pub key: u32,
    pub bytes: Vec<u8>,
}

pub struct BlobClass {
    pub weight: usize,
}

impl CacheClass<MockSource> for BlobClass {
    type Query = (u32, u32);
    type Node = Blob;

    fn name(&self) -> &'static str {
        "blob"
    }

    fn hash(&self, query: &(u32, u32)) -> u64 {
        face_id_hash(&query.0).wrapping_add(u64::from(query.1))
    }

    fn construct(&self, query: &(u32, u32), _source: &mut MockSource) -> glyphcache::Result<Blob> {
        if query.1 == u32::MAX {
            return Err(CacheError::OutOfMemory);
        }
        Ok(Blob {
            face: query.0,
            key: query.1,
            bytes: vec![query.1 as u8; 16],
        })
    }

    fn weight(&self, _node: &Blob) -> usize {
        self.weight
    }

    fn compare(&self, node: &Blob, query: &(u32, u32)) -> bool {
        node.face == query.0 && node.key == query.1
    }

    fn owned_by(&self, node: &Blob, face_id: &u32) -> bool {
        node.face == *face_id
    }
}

/// Tiny deterministic generator so tests need no extra crates
pub struct Lcg(pub u64);

impl Lcg {
    pub fn next(&mut self, bound: u32) -> u32 {
        self.0 = self
            .0
            .wrapping_mul(6364136223846793005)
            .wrapping_add(1442695040888963407);
        ((self.0 >> 33) % u64::from(bound)) as u32
    }
}
