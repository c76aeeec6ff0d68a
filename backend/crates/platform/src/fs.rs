//! Filesystem helpers
//!
//! Collision-free scratch file names, scope-bound temp file cleanup and
//! move-into-place for finished artifacts.

use std::collections::hash_map::DefaultHasher;
use std::fs;
use std::hash::{Hash, Hasher};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use crate::crypto;

// ============================================================================
// Unique names
// ============================================================================

/// Generator of file names that never collide within a process
///
/// Each name combines a high-resolution timestamp, a hash of the calling
/// thread id, a monotonically increasing counter and a random value, so two
/// concurrent callers can never be handed the same name.
#[derive(Debug, Default)]
pub struct UniqueNamer {
    counter: AtomicU64,
}

impl UniqueNamer {
    pub fn new() -> Self {
        Self::default()
    }

    /// `<prefix><nanos>_<thread>_<counter>_<random><suffix>`
    pub fn next_name(&self, prefix: &str, suffix: &str) -> String {
        let count = self.counter.fetch_add(1, Ordering::Relaxed);
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_nanos())
            .unwrap_or_default();
        let mut hasher = DefaultHasher::new();
        std::thread::current().id().hash(&mut hasher);
        let thread = hasher.finish();
        let random = crypto::random_u64() & 0xFFFF_FFFF;

        format!("{prefix}{nanos}_{thread:x}_{count}_{random:08x}{suffix}")
    }

    /// Number of names handed out so far
    pub fn issued(&self) -> u64 {
        self.counter.load(Ordering::Relaxed)
    }
}

// ============================================================================
// Scope-bound temp files
// ============================================================================

/// Set of scratch files deleted when the guard goes out of scope
///
/// Register a path *before* creating the file so a half-written artifact is
/// removed as well. Missing files are ignored on cleanup.
#[derive(Debug, Default)]
pub struct TempFiles {
    paths: Vec<PathBuf>,
}

impl TempFiles {
    pub fn new() -> Self {
        Self::default()
    }

    /// Track `path` for deletion and hand it back
    pub fn track(&mut self, path: PathBuf) -> PathBuf {
        self.paths.push(path.clone());
        path
    }

    pub fn paths(&self) -> &[PathBuf] {
        &self.paths
    }
}

impl Drop for TempFiles {
    fn drop(&mut self) {
        for path in &self.paths {
            match fs::remove_file(path) {
                Ok(()) => {}
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "Failed to remove temp file");
                }
            }
        }
    }
}

// ============================================================================
// Helpers
// ============================================================================

/// Create `dir` and any missing parents
pub fn ensure_dir(dir: &Path) -> io::Result<()> {
    fs::create_dir_all(dir)
}

/// Move `from` to `to`, falling back to copy + delete across filesystems
///
/// The fallback copies into a staging file beside `to` and renames it into
/// place, so `to` never holds a partially written file.
pub fn move_file(from: &Path, to: &Path) -> io::Result<()> {
    match fs::rename(from, to) {
        Ok(()) => Ok(()),
        Err(e) => {
            tracing::debug!(error = %e, to = %to.display(), "Rename failed, copying into place");
            copy_into_place(from, to, |src, dst| fs::copy(src, dst).map(|_| ()))
        }
    }
}

fn copy_into_place<F>(from: &Path, to: &Path, copy: F) -> io::Result<()>
where
    F: FnOnce(&Path, &Path) -> io::Result<()>,
{
    let staging = staging_path(to);
    if let Err(e) = copy(from, &staging).and_then(|()| fs::rename(&staging, to)) {
        if let Err(cleanup) = fs::remove_file(&staging)
            && cleanup.kind() != io::ErrorKind::NotFound
        {
            tracing::warn!(path = %staging.display(), error = %cleanup, "Failed to remove staging file");
        }
        return Err(e);
    }
    if let Err(e) = fs::remove_file(from) {
        let _ = fs::remove_file(to);
        return Err(e);
    }
    Ok(())
}

/// Hidden sibling of `to` used while copying
fn staging_path(to: &Path) -> PathBuf {
    let name = to
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let random = crypto::random_u64() & 0xFFFF_FFFF;
    to.with_file_name(format!(".{name}.{random:08x}.partial"))
}
