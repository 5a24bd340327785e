//! # glyphcache
//!
//! Memory-bounded cache for derived font data.
//!
//! ## Architecture
//! - **Cache classes**: one [`CacheClass`] per kind of cached object
//!   (opened faces, charmap windows, ...), each supplying construct,
//!   weight, compare, ownership and free callbacks
//! - **Bucket index**: query hash to candidate chain, resolved by the
//!   class's compare callback
//! - **LRU list**: one recency order across all classes; eviction takes
//!   from the least recently used end until the weight budget holds
//! - **Arena**: nodes addressed by generation-checked [`NodeId`]s
//!
//! The manager is single-threaded by contract; wrap it in
//! [`SharedManager`] to share it.
//!
//! ```
//! use facesource::TableFaceSource;
//! use glyphcache::{CacheManager, CmapCache};
//!
//! let mut source = TableFaceSource::new();
//! source.register_text(1, "CMAP1\nsubtable 3 1\n0x41..0x5A 36\n");
//!
//! let mut manager = CacheManager::with_budget(source, 64 * 1024).unwrap();
//! let cmap = CmapCache::new(&mut manager);
//!
//! assert_eq!(cmap.lookup(&mut manager, &1, 0, 'B' as u32).unwrap(), 37);
//! assert_eq!(cmap.lookup(&mut manager, &1, 0, 'b' as u32).unwrap(), 0);
//! ```

#![warn(missing_docs)]

mod bucket;
mod class;
mod cmap;
mod config;
mod error;
mod face;
mod lru;
mod manager;
mod node;
mod shared;
mod stats;

pub use class::{face_id_hash, CacheClass, ClassHandle};
pub use cmap::{CmapCache, CmapClass, CmapNode, CmapQuery, Subtable, CMAP_WINDOW};
pub use config::{ManagerConfig, DEFAULT_BUCKETS, DEFAULT_MAX_WEIGHT};
pub use error::{CacheError, Result};
pub use face::{FaceClass, FaceNode};
pub use manager::CacheManager;
pub use node::NodeId;
pub use shared::SharedManager;
pub use stats::{CacheStats, StatsSnapshot};
