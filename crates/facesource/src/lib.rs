//! # facesource
//!
//! Face-source contract consumed by `glyphcache`.
//!
//! A face source turns an opaque, caller-defined face id into an opened
//! font handle and exposes the raw (uncached) character map operations the
//! cache memorizes. The cache may drop a face at any time and ask for it
//! again later, so resolving must be idempotent.
//!
//! [`TableFaceSource`] is a small reference implementation reading
//! text charmap tables, used by the `gcq` tool and the test suites.

#![warn(missing_docs)]

mod error;
mod parser;
mod source;
mod table;

pub use error::{Error, Result};
pub use parser::{parse_char_code, parse_table, CmapTable, Segment, Subtable, CMAP_MAGIC};
pub use source::{FaceSource, FontFace};
pub use table::{TableFace, TableFaceSource};
