//! Per-processor resource cache.
//!
//! Each filesystem path owns a slot guarded by its own mutex. A request that
//! finds the slot empty (or stale) compiles while holding the lock, so
//! concurrent requests for the same path wait for that single compilation
//! instead of repeating it. Requests for different paths never contend.
//!
//! Slots are never removed. Invalidation empties a slot under its lock, so a
//! request that already holds the slot and one that arrives afterwards still
//! share it.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::SystemTime;

use dashmap::DashMap;
use parking_lot::Mutex;
use trellis_telemetry::metrics::record_compilation;

use crate::error::{ResourceError, ResourceResult};
use crate::renderer::RendererRegistry;
use crate::resource::{LoadOptions, Resource};

#[derive(Debug)]
struct Compiled {
    modified: Option<SystemTime>,
    resource: Arc<Resource>,
}

type Slot = Arc<Mutex<Option<Compiled>>>;

/// Cache statistics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Lookups served from a compiled entry.
    pub hits: u64,
    /// Lookups that had to compile.
    pub misses: u64,
    /// Successful compilations.
    pub compilations: u64,
    /// Paths with a compiled entry.
    pub size: usize,
}

/// Compiled resources keyed by filesystem path.
///
/// # Example
///
/// ```rust
/// use trellis_resource::{LoadOptions, RendererRegistry, ResourceCache};
/// # let dir = tempfile::tempdir().unwrap();
/// # let file = dir.path().join("hello.txt");
/// # std::fs::write(&file, "hello").unwrap();
///
/// let cache = ResourceCache::new(false);
/// let options = LoadOptions::default();
/// let renderers = RendererRegistry::default();
///
/// let first = cache.get_or_load(&file, false, &options, &renderers).unwrap();
/// let second = cache.get_or_load(&file, false, &options, &renderers).unwrap();
/// assert!(std::sync::Arc::ptr_eq(&first, &second));
/// assert_eq!(cache.stats().compilations, 1);
/// ```
#[derive(Debug)]
pub struct ResourceCache {
    slots: DashMap<PathBuf, Slot>,
    changes_reload: bool,
    entries: AtomicUsize,
    hits: AtomicU64,
    misses: AtomicU64,
    compilations: AtomicU64,
}

impl ResourceCache {
    /// Creates an empty cache.
    ///
    /// With `changes_reload`, every lookup compares the file's modification
    /// time against the compiled entry and recompiles on change.
    #[must_use]
    pub fn new(changes_reload: bool) -> Self {
        Self {
            slots: DashMap::new(),
            changes_reload,
            entries: AtomicUsize::new(0),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            compilations: AtomicU64::new(0),
        }
    }

    /// Whether modification times are checked.
    #[must_use]
    pub const fn changes_reload(&self) -> bool {
        self.changes_reload
    }

    /// Returns the compiled resource for `path`, compiling it if needed.
    ///
    /// Failed compilations are not cached; the next lookup tries again.
    pub fn get_or_load(
        &self,
        path: &Path,
        is_dynamic: bool,
        options: &LoadOptions,
        renderers: &RendererRegistry,
    ) -> ResourceResult<Arc<Resource>> {
        // Clone the slot out so the map shard is unlocked while compiling.
        let slot: Slot = self.slots.entry(path.to_path_buf()).or_default().clone();
        let mut compiled = slot.lock();

        let modified = if self.changes_reload || compiled.is_none() {
            modified_time(path)?
        } else {
            None
        };

        if let Some(entry) = compiled.as_ref() {
            if !self.changes_reload || entry.modified == modified {
                self.hits.fetch_add(1, Ordering::Relaxed);
                return Ok(Arc::clone(&entry.resource));
            }
            tracing::debug!(path = %path.display(), "resource changed on disk, recompiling");
        }

        self.misses.fetch_add(1, Ordering::Relaxed);
        match Resource::load(path, is_dynamic, options, renderers) {
            Ok(resource) => {
                let resource = Arc::new(resource);
                let previous = compiled.replace(Compiled {
                    modified,
                    resource: Arc::clone(&resource),
                });
                if previous.is_none() {
                    self.entries.fetch_add(1, Ordering::Relaxed);
                }
                self.compilations.fetch_add(1, Ordering::Relaxed);
                record_compilation(true);
                tracing::debug!(path = %path.display(), is_dynamic, "resource compiled");
                Ok(resource)
            }
            Err(e) => {
                if compiled.take().is_some() {
                    self.entries.fetch_sub(1, Ordering::Relaxed);
                }
                record_compilation(false);
                tracing::warn!(path = %path.display(), error = %e, "resource compilation failed");
                Err(e)
            }
        }
    }

    /// Drops the compiled entry for `path`. Returns `true` if one existed.
    ///
    /// Waits for a compilation of `path` that is already running.
    pub fn invalidate(&self, path: &Path) -> bool {
        let Some(slot) = self.slots.get(path).map(|s| Arc::clone(s.value())) else {
            return false;
        };
        self.empty(&slot)
    }

    /// Drops every compiled entry.
    pub fn clear(&self) {
        let slots: Vec<Slot> = self.slots.iter().map(|s| Arc::clone(s.value())).collect();
        let dropped = slots.iter().filter(|slot| self.empty(slot)).count();
        tracing::debug!(dropped, "resource cache cleared");
    }

    fn empty(&self, slot: &Slot) -> bool {
        let dropped = slot.lock().take().is_some();
        if dropped {
            self.entries.fetch_sub(1, Ordering::Relaxed);
        }
        dropped
    }

    /// Number of compiled entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.load(Ordering::Relaxed)
    }

    /// Returns `true` if nothing is compiled.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Current statistics.
    #[must_use]
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            compilations: self.compilations.load(Ordering::Relaxed),
            size: self.len(),
        }
    }
}

fn modified_time(path: &Path) -> ResourceResult<Option<SystemTime>> {
    let meta = fs::metadata(path).map_err(|source| ResourceError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(meta.modified().ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;
    use std::time::Duration;
    use tempfile::TempDir;

    fn setup(contents: &str) -> (TempDir, PathBuf) {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("page.txt.spt");
        fs::write(&file, contents).unwrap();
        (dir, file)
    }

    fn load(cache: &ResourceCache, path: &Path) -> ResourceResult<Arc<Resource>> {
        cache.get_or_load(path, true, &LoadOptions::default(), &RendererRegistry::default())
    }

    fn template(resource: &Resource) -> &str {
        match resource {
            Resource::Dynamic { template, .. } => template,
            Resource::Static { .. } => panic!("expected dynamic resource"),
        }
    }

    #[test]
    fn test_second_lookup_hits() {
        let (_dir, file) = setup("one");
        let cache = ResourceCache::new(false);

        load(&cache, &file).unwrap();
        load(&cache, &file).unwrap();

        let stats = cache.stats();
        assert_eq!((stats.hits, stats.misses, stats.compilations, stats.size), (1, 1, 1, 1));
    }

    #[test]
    fn test_without_reload_changes_are_ignored() {
        let (_dir, file) = setup("one");
        let cache = ResourceCache::new(false);
        load(&cache, &file).unwrap();

        fs::write(&file, "two").unwrap();
        assert_eq!(template(&load(&cache, &file).unwrap()), "one");
    }

    #[test]
    fn test_reload_recompiles_changed_file() {
        let (_dir, file) = setup("one");
        let cache = ResourceCache::new(true);
        assert_eq!(template(&load(&cache, &file).unwrap()), "one");

        // Push the mtime forward explicitly; coarse filesystem clocks would
        // otherwise make back-to-back writes indistinguishable.
        fs::write(&file, "two").unwrap();
        let later = SystemTime::now() + Duration::from_secs(5);
        fs::File::options()
            .write(true)
            .open(&file)
            .unwrap()
            .set_modified(later)
            .unwrap();

        assert_eq!(template(&load(&cache, &file).unwrap()), "two");
        assert_eq!(cache.stats().compilations, 2);
    }

    #[test]
    fn test_invalidate_and_clear() {
        let (_dir, file) = setup("one");
        let cache = ResourceCache::new(false);
        load(&cache, &file).unwrap();

        fs::write(&file, "two").unwrap();
        assert!(cache.invalidate(&file));
        assert!(!cache.invalidate(&file));
        assert_eq!(template(&load(&cache, &file).unwrap()), "two");

        cache.clear();
        assert!(cache.is_empty());
        assert_eq!(template(&load(&cache, &file).unwrap()), "two");
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_invalidate_waits_for_running_compilation() {
        let (_dir, file) = setup("one");
        let cache = Arc::new(ResourceCache::new(false));
        load(&cache, &file).unwrap();

        let slot = Arc::clone(cache.slots.get(&file).unwrap().value());
        let running = slot.lock();

        let invalidator = {
            let cache = Arc::clone(&cache);
            let file = file.clone();
            thread::spawn(move || cache.invalidate(&file))
        };
        let loaders: Vec<_> = (0..4)
            .map(|_| {
                let cache = Arc::clone(&cache);
                let file = file.clone();
                thread::spawn(move || load(&cache, &file).unwrap())
            })
            .collect();

        thread::sleep(Duration::from_millis(50));
        assert_eq!(cache.stats().compilations, 1);
        drop(running);

        assert!(invalidator.join().unwrap());
        for loader in loaders {
            assert_eq!(template(&loader.join().unwrap()), "one");
        }
        assert!(Arc::ptr_eq(&slot, cache.slots.get(&file).unwrap().value()));
        assert!(cache.stats().compilations <= 2);
        assert_eq!(cache.slots.len(), 1);
    }

    #[test]
    fn test_failures_are_not_cached() {
        let (_dir, file) = setup("[---] nope\nbody");
        let cache = ResourceCache::new(false);
        assert!(matches!(
            load(&cache, &file),
            Err(ResourceError::UnknownRenderer { .. })
        ));

        fs::write(&file, "[---] raw\nbody").unwrap();
        assert_eq!(template(&load(&cache, &file).unwrap()), "body");
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let dir = TempDir::new().unwrap();
        let cache = ResourceCache::new(false);
        let err = load(&cache, &dir.path().join("gone.spt")).unwrap_err();
        assert!(matches!(err, ResourceError::Io { .. }));
    }

    #[test]
    fn test_concurrent_lookups_compile_once() {
        let (_dir, file) = setup("shared");
        let cache = Arc::new(ResourceCache::new(false));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let cache = Arc::clone(&cache);
                let file = file.clone();
                thread::spawn(move || load(&cache, &file).unwrap())
            })
            .collect();
        let resources: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();

        assert_eq!(cache.stats().compilations, 1);
        assert!(resources.windows(2).all(|w| Arc::ptr_eq(&w[0], &w[1])));
    }
}
