//! Face source backed by charmap table files
//!
//! Faces are registered under a numeric id, either as a path to a `.cmap`
//! table (memory-mapped on every open) or as in-memory text.

use std::collections::HashMap;
use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use ahash::RandomState;
use memmap2::Mmap;
use tracing::debug;

use crate::error::{Error, Result};
use crate::parser::{parse_table, CmapTable, Subtable};
use crate::source::{FaceSource, FontFace};

/// An opened charmap table
#[derive(Debug, Clone)]
pub struct TableFace {
    table: CmapTable,
    active: Option<usize>,
}

impl TableFace {
    /// Open a face over a parsed table; the first subtable starts active
    pub fn new(table: CmapTable) -> Self {
        let active = if table.subtables.is_empty() {
            None
        } else {
            Some(0)
        };
        Self { table, active }
    }

    /// Subtable at `index`
    pub fn subtable(&self, index: usize) -> Option<&Subtable> {
        self.table.subtables.get(index)
    }
}

impl FontFace for TableFace {
    fn subtable_count(&self) -> usize {
        self.table.subtables.len()
    }

    fn active_subtable(&self) -> Option<usize> {
        self.active
    }

    fn set_active_subtable(&mut self, index: Option<usize>) -> Result<()> {
        if let Some(index) = index {
            let count = self.subtable_count();
            if index >= count {
                return Err(Error::InvalidSubtable { index, count });
            }
        }
        self.active = index;
        Ok(())
    }

    fn glyph_index(&self, char_code: u32) -> u32 {
        self.active
            .and_then(|i| self.table.subtables.get(i))
            .map_or(0, |subtable| subtable.glyph_index(char_code))
    }

    fn weight(&self) -> usize {
        let segments: usize = self
            .table
            .subtables
            .iter()
            .map(|s| std::mem::size_of_val(s.segments()))
            .sum();
        std::mem::size_of::<Self>()
            + self.table.subtables.len() * std::mem::size_of::<Subtable>()
            + segments
    }
}

#[derive(Debug, Clone)]
enum Origin {
    Path(PathBuf),
    Text(Arc<str>),
}

/// Face source resolving numeric ids to charmap tables
#[derive(Debug, Default)]
pub struct TableFaceSource {
    origins: HashMap<u32, Origin, RandomState>,
    opens: u64,
    releases: u64,
}

impl TableFaceSource {
    /// Create an empty source
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a table file under `id`, replacing any previous origin
    pub fn register_path<P: AsRef<Path>>(&mut self, id: u32, path: P) {
        self.origins
            .insert(id, Origin::Path(path.as_ref().to_path_buf()));
    }

    /// Register in-memory table text under `id`
    pub fn register_text(&mut self, id: u32, text: &str) {
        self.origins.insert(id, Origin::Text(Arc::from(text)));
    }

    /// Forget `id`; later resolves fail with `FontUnavailable`
    pub fn unregister(&mut self, id: u32) -> bool {
        self.origins.remove(&id).is_some()
    }

    /// Number of successful opens so far
    pub fn open_count(&self) -> u64 {
        self.opens
    }

    /// Number of faces handed back by the cache
    pub fn release_count(&self) -> u64 {
        self.releases
    }

    fn load_path(path: &Path) -> Result<CmapTable> {
        let file = File::open(path)?;
        if file.metadata()?.len() == 0 {
            return parse_table("");
        }

        // SAFETY: the mapping is read once and dropped before returning;
        // table files are not expected to change while being parsed.
        let map = unsafe { Mmap::map(&file)? };
        let text = std::str::from_utf8(&map)
            .map_err(|e| Error::Parse(format!("{}: {}", path.display(), e)))?;
        parse_table(text)
    }
}

impl FaceSource for TableFaceSource {
    type FaceId = u32;
    type Face = TableFace;

    fn resolve(&mut self, id: &u32) -> Result<TableFace> {
        let table = match self.origins.get(id) {
            Some(Origin::Path(path)) => Self::load_path(path)?,
            Some(Origin::Text(text)) => parse_table(text)?,
            None => return Err(Error::FontUnavailable(format!("no face registered as {}", id))),
        };

        self.opens += 1;
        debug!(face = id, subtables = table.subtables.len(), "opened table face");
        Ok(TableFace::new(table))
    }

    fn release(&mut self, id: &u32, face: TableFace) {
        self.releases += 1;
        debug!(face = id, "released table face");
        drop(face);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const TWO_MAPS: &str = "CMAP1\nsubtable 3 1\n65 10\nsubtable 1 0\n65 20\n";

    #[test]
    fn test_resolve_text() {
        let mut source = TableFaceSource::new();
        source.register_text(1, TWO_MAPS);

        let face = source.resolve(&1).unwrap();
        assert_eq!(face.subtable_count(), 2);
        assert_eq!(face.active_subtable(), Some(0));
        assert_eq!(face.glyph_index(65), 10);
        assert_eq!(source.open_count(), 1);
    }

    #[test]
    fn test_switch_subtable() {
        let mut source = TableFaceSource::new();
        source.register_text(1, TWO_MAPS);

        let mut face = source.resolve(&1).unwrap();
        face.set_active_subtable(Some(1)).unwrap();
        assert_eq!(face.glyph_index(65), 20);

        let result = face.set_active_subtable(Some(2));
        assert!(matches!(
            result,
            Err(Error::InvalidSubtable { index: 2, count: 2 })
        ));
        assert_eq!(face.active_subtable(), Some(1));

        face.set_active_subtable(None).unwrap();
        assert_eq!(face.glyph_index(65), 0);
    }

    #[test]
    fn test_resolve_path() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(TWO_MAPS.as_bytes()).unwrap();
        file.flush().unwrap();

        let mut source = TableFaceSource::new();
        source.register_path(7, file.path());

        let face = source.resolve(&7).unwrap();
        assert_eq!(face.glyph_index(65), 10);
        assert!(face.weight() >= std::mem::size_of::<TableFace>());
    }

    #[test]
    fn test_resolve_empty_file() {
        let file = NamedTempFile::new().unwrap();
        let mut source = TableFaceSource::new();
        source.register_path(7, file.path());

        // An empty file lacks the magic line
        assert!(matches!(source.resolve(&7), Err(Error::Parse(_))));
    }

    #[test]
    fn test_unknown_face() {
        let mut source = TableFaceSource::new();
        assert!(matches!(source.resolve(&3), Err(Error::FontUnavailable(_))));

        source.register_text(3, TWO_MAPS);
        assert!(source.unregister(3));
        assert!(matches!(source.resolve(&3), Err(Error::FontUnavailable(_))));
    }

    #[test]
    fn test_release_counts() {
        let mut source = TableFaceSource::new();
        source.register_text(1, TWO_MAPS);

        let face = source.resolve(&1).unwrap();
        source.release(&1, face);
        assert_eq!(source.release_count(), 1);
    }
}
