//! Mutex-guarded manager for use across threads
//!
//! [`CacheManager`] does no locking of its own; this wrapper serialises
//! every call behind one `parking_lot::Mutex`, mirroring how a shared
//! manager must be used.

use std::sync::Arc;

use facesource::FaceSource;
use parking_lot::Mutex;

use crate::cmap::CmapCache;
use crate::error::Result;
use crate::manager::CacheManager;
use crate::stats::CacheStats;

/// Cloneable, thread-safe handle to one cache manager
pub struct SharedManager<S: FaceSource> {
    inner: Arc<Mutex<CacheManager<S>>>,
    stats: Arc<CacheStats>,
}

impl<S: FaceSource> Clone for SharedManager<S> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
            stats: Arc::clone(&self.stats),
        }
    }
}

impl<S: FaceSource> SharedManager<S> {
    /// Wrap a manager
    pub fn new(manager: CacheManager<S>) -> Self {
        let stats = manager.stats_handle();
        Self {
            inner: Arc::new(Mutex::new(manager)),
            stats,
        }
    }

    /// Run `f` with exclusive access to the manager.
    ///
    /// Borrowed payloads cannot escape the closure.
    pub fn with<R>(&self, f: impl FnOnce(&mut CacheManager<S>) -> R) -> R {
        let mut manager = self.inner.lock();
        f(&mut *manager)
    }

    /// Register a charmap cache with the shared manager
    pub fn cmap_cache(&self) -> CmapCache<S> {
        self.with(CmapCache::new)
    }

    /// Locked [`CmapCache::lookup`]
    pub fn cmap_lookup(
        &self,
        cmap: &CmapCache<S>,
        face_id: &S::FaceId,
        subtable: i32,
        char_code: u32,
    ) -> Result<u32> {
        self.with(|manager| cmap.lookup(manager, face_id, subtable, char_code))
    }

    /// Locked [`CacheManager::invalidate_face`]
    pub fn invalidate_face(&self, face_id: &S::FaceId) -> usize {
        self.with(|manager| manager.invalidate_face(face_id))
    }

    /// Statistics, readable without taking the lock
    pub fn stats(&self) -> &CacheStats {
        &self.stats
    }
}
