//! Bounded template content cache
//!
//! Maps a template path to its file contents. When full, the entry inserted
//! first is evicted (insertion order, not access order). Entries are never
//! invalidated when the file changes on disk; call [`TemplateCache::clear`].

use std::collections::{HashMap, VecDeque};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::Mutex;

/// Default number of cached templates
pub const DEFAULT_CAPACITY: usize = 100;

#[derive(Debug, Default)]
struct Entries {
    capacity: usize,
    contents: HashMap<PathBuf, Arc<str>>,
    order: VecDeque<PathBuf>,
}

impl Entries {
    fn insert(&mut self, path: &Path, content: &Arc<str>) {
        if self.capacity == 0 {
            return;
        }
        self.evict_to(self.capacity - 1);
        self.order.push_back(path.to_path_buf());
        self.contents.insert(path.to_path_buf(), Arc::clone(content));
    }

    fn evict_to(&mut self, limit: usize) {
        while self.contents.len() > limit {
            let Some(oldest) = self.order.pop_front() else {
                break;
            };
            self.contents.remove(&oldest);
        }
    }
}

#[derive(Debug)]
pub struct TemplateCache {
    entries: Mutex<Entries>,
}

impl Default for TemplateCache {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl TemplateCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: Mutex::new(Entries {
                capacity,
                ..Entries::default()
            }),
        }
    }

    /// Template contents for `path`
    ///
    /// With `use_cache == false` the file is read directly and the cache is
    /// left untouched. On a miss the file is read outside the lock; if two
    /// callers miss concurrently the first insert wins.
    pub fn get(&self, path: &Path, use_cache: bool) -> io::Result<Arc<str>> {
        if !use_cache {
            return read_template(path);
        }
        if let Some(hit) = self.entries.lock().contents.get(path) {
            return Ok(Arc::clone(hit));
        }

        let content = read_template(path)?;
        let mut entries = self.entries.lock();
        if let Some(existing) = entries.contents.get(path) {
            return Ok(Arc::clone(existing));
        }
        entries.insert(path, &content);
        Ok(content)
    }

    pub fn clear(&self) {
        let mut entries = self.entries.lock();
        entries.contents.clear();
        entries.order.clear();
    }

    /// Change the bound; shrinking evicts the oldest entries immediately
    pub fn set_capacity(&self, capacity: usize) {
        let mut entries = self.entries.lock();
        entries.capacity = capacity;
        entries.evict_to(capacity);
    }

    pub fn capacity(&self) -> usize {
        self.entries.lock().capacity
    }

    pub fn len(&self) -> usize {
        self.entries.lock().contents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains(&self, path: &Path) -> bool {
        self.entries.lock().contents.contains_key(path)
    }
}

fn read_template(path: &Path) -> io::Result<Arc<str>> {
    std::fs::read_to_string(path).map(Arc::from)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn write_templates(dir: &Path, names: &[&str]) -> Vec<PathBuf> {
        names
            .iter()
            .map(|name| {
                let path = dir.join(name);
                fs::write(&path, format!("<p>{name}</p>")).unwrap();
                path
            })
            .collect()
    }

    #[test]
    fn test_evicts_oldest_inserted() {
        let dir = tempfile::tempdir().unwrap();
        let paths = write_templates(dir.path(), &["a.html", "b.html", "c.html"]);
        let cache = TemplateCache::new(2);

        for path in &paths {
            cache.get(path, true).unwrap();
        }

        assert_eq!(cache.len(), 2);
        assert!(!cache.contains(&paths[0]));
        assert!(cache.contains(&paths[1]));
        assert!(cache.contains(&paths[2]));
    }

    #[test]
    fn test_hit_does_not_refresh_order() {
        let dir = tempfile::tempdir().unwrap();
        let paths = write_templates(dir.path(), &["a.html", "b.html", "c.html"]);
        let cache = TemplateCache::new(2);

        cache.get(&paths[0], true).unwrap();
        cache.get(&paths[1], true).unwrap();
        cache.get(&paths[0], true).unwrap();
        cache.get(&paths[2], true).unwrap();

        assert!(!cache.contains(&paths[0]));
        assert!(cache.contains(&paths[1]));
    }

    #[test]
    fn test_cached_content_survives_file_change() {
        let dir = tempfile::tempdir().unwrap();
        let paths = write_templates(dir.path(), &["a.html"]);
        let cache = TemplateCache::default();

        let first = cache.get(&paths[0], true).unwrap();
        fs::write(&paths[0], "changed").unwrap();

        assert_eq!(cache.get(&paths[0], true).unwrap(), first);
        assert_eq!(&*cache.get(&paths[0], false).unwrap(), "changed");

        cache.clear();
        assert!(cache.is_empty());
        assert_eq!(&*cache.get(&paths[0], true).unwrap(), "changed");
    }

    #[test]
    fn test_bypass_leaves_cache_untouched() {
        let dir = tempfile::tempdir().unwrap();
        let paths = write_templates(dir.path(), &["a.html"]);
        let cache = TemplateCache::new(4);

        cache.get(&paths[0], false).unwrap();
        assert!(cache.is_empty());
    }

    #[test]
    fn test_shrinking_evicts_immediately() {
        let dir = tempfile::tempdir().unwrap();
        let paths = write_templates(dir.path(), &["a.html", "b.html", "c.html"]);
        let cache = TemplateCache::new(3);
        for path in &paths {
            cache.get(path, true).unwrap();
        }

        cache.set_capacity(1);
        assert_eq!(cache.capacity(), 1);
        assert_eq!(cache.len(), 1);
        assert!(cache.contains(&paths[2]));
    }

    #[test]
    fn test_bound_holds_while_capacity_changes_concurrently() {
        let dir = tempfile::tempdir().unwrap();
        let names: Vec<String> = (0..16).map(|i| format!("t{i}.html")).collect();
        let names: Vec<&str> = names.iter().map(String::as_str).collect();
        let paths = write_templates(dir.path(), &names);
        let cache = Arc::new(TemplateCache::new(8));

        std::thread::scope(|scope| {
            for worker in 0..4 {
                let cache = Arc::clone(&cache);
                let paths = &paths;
                scope.spawn(move || {
                    for round in 0..50 {
                        let path = &paths[(worker * 7 + round) % paths.len()];
                        cache.get(path, true).unwrap();
                    }
                });
            }
            let cache = Arc::clone(&cache);
            scope.spawn(move || {
                for round in 0..50 {
                    cache.set_capacity(if round % 2 == 0 { 2 } else { 6 });
                }
            });
        });

        cache.set_capacity(3);
        assert!(cache.len() <= 3);
        let entries = cache.entries.lock();
        assert_eq!(entries.order.len(), entries.contents.len());
        assert!(entries.order.iter().all(|p| entries.contents.contains_key(p)));
    }

    #[test]
    fn test_zero_capacity_caches_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let paths = write_templates(dir.path(), &["a.html"]);
        let cache = TemplateCache::new(0);

        assert_eq!(&*cache.get(&paths[0], true).unwrap(), "<p>a.html</p>");
        assert!(cache.is_empty());
    }

    #[test]
    fn test_missing_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let cache = TemplateCache::default();
        let err = cache.get(&dir.path().join("absent.html"), true).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::NotFound);
        assert!(cache.is_empty());
    }
}
