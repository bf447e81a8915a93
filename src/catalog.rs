//! Record catalog
//!
//! Path-indexed cache of persisted records. Listings only need headers, so
//! most entries are header-only; a full body is decoded on demand when a
//! record is played back.
//!
//! # Directory Layout
//!
//! ```text
//! <base_dir>/<category>/<map_name>[/<subdir>]/<end_time>.<ext>
//! ```
//!
//! The catalog keeps two derived orderings in sync with its cache: record
//! paths ascending by end time (ties broken by path) and categories sorted
//! case-insensitively.

use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::codec;
use crate::error::{MimicError, Result};
use crate::types::{Record, RecordHeader};

#[derive(Debug, Clone)]
struct CachedRecord {
    record: Arc<Record>,
    /// Whether the frame body was decoded
    full: bool,
}

/// Cache of record headers and bodies keyed by file path
#[derive(Debug)]
pub struct Catalog {
    base_dir: PathBuf,
    extension: String,
    entries: HashMap<PathBuf, CachedRecord>,
    categories_by_path: HashMap<PathBuf, String>,
    sorted_paths: Vec<PathBuf>,
    categories: Vec<String>,
    /// Output paths handed out for writes that have not landed yet
    reserved: HashSet<PathBuf>,
}

impl Catalog {
    /// Create an empty catalog rooted at `base_dir`
    pub fn new(base_dir: impl Into<PathBuf>, extension: impl Into<String>) -> Self {
        Self {
            base_dir: base_dir.into(),
            extension: extension.into(),
            entries: HashMap::new(),
            categories_by_path: HashMap::new(),
            sorted_paths: Vec::new(),
            categories: Vec::new(),
            reserved: HashSet::new(),
        }
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    pub fn extension(&self) -> &str {
        &self.extension
    }

    /// Number of cached records
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Load a record into the cache and return it
    ///
    /// A cached entry is returned as-is unless `force_reload` is set or a
    /// full body is requested and only the header is cached. On error the
    /// cache is left untouched.
    pub fn load(
        &mut self,
        path: &Path,
        category: &str,
        only_header: bool,
        force_reload: bool,
    ) -> Result<Arc<Record>> {
        if !path.is_file() {
            return Err(MimicError::FileNotFound(path.to_path_buf()));
        }

        if !force_reload {
            if let Some(cached) = self.entries.get(path) {
                if only_header || cached.full {
                    return Ok(Arc::clone(&cached.record));
                }
            }
        }

        let record = Arc::new(codec::read_file(path, only_header)?);
        tracing::debug!(
            "Loaded {} '{}' ({} frames) from {}",
            if only_header { "header" } else { "record" },
            record.header.name,
            record.header.frame_count,
            path.display()
        );

        self.entries.insert(
            path.to_path_buf(),
            CachedRecord {
                record: Arc::clone(&record),
                full: !only_header,
            },
        );
        self.categories_by_path
            .insert(path.to_path_buf(), category.to_string());
        self.resort();

        Ok(record)
    }

    /// Header-load every record under `<base_dir>/<category>/<map_name>`
    ///
    /// Returns the number of records loaded. Files that fail to decode are
    /// logged and skipped. A file with a dangling bookmark still lists here
    /// and only fails once its body is loaded for playback.
    pub fn scan(&mut self, map_name: &str) -> usize {
        let category_dirs = match fs::read_dir(&self.base_dir) {
            Ok(dirs) => dirs,
            Err(e) => {
                tracing::debug!("No record directory at {}: {}", self.base_dir.display(), e);
                return 0;
            }
        };

        let mut loaded = 0;
        for entry in category_dirs.flatten() {
            let dir = entry.path();
            if !dir.is_dir() {
                continue;
            }
            let category = entry.file_name().to_string_lossy().into_owned();

            let mut files = Vec::new();
            collect_files(&dir.join(map_name), &self.extension, &mut files);

            for file in files {
                match self.load(&file, &category, true, false) {
                    Ok(_) => loaded += 1,
                    Err(e) => tracing::warn!("Skipping record {}: {}", file.display(), e),
                }
            }
        }

        tracing::info!("Scanned {} records for map '{}'", loaded, map_name);
        loaded
    }

    /// Evict a record and remove its file
    ///
    /// Returns whether a file was removed. Deleting an unknown or already
    /// deleted path is not an error.
    pub fn delete(&mut self, path: &Path) -> bool {
        self.evict(path);

        match fs::remove_file(path) {
            Ok(()) => {
                tracing::info!("Deleted record {}", path.display());
                true
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => false,
            Err(e) => {
                tracing::warn!("Failed to delete record {}: {}", path.display(), e);
                false
            }
        }
    }

    /// Drop all cached state
    pub fn clear(&mut self) {
        self.entries.clear();
        self.categories_by_path.clear();
        self.sorted_paths.clear();
        self.categories.clear();
    }

    /// Known categories, sorted case-insensitively
    pub fn list_categories(&self) -> &[String] {
        &self.categories
    }

    /// Paths in `category` (case-insensitive), oldest first
    pub fn list_records(&self, category: &str) -> Vec<&Path> {
        self.sorted_paths
            .iter()
            .filter(|p| {
                self.categories_by_path
                    .get(*p)
                    .is_some_and(|c| c.eq_ignore_ascii_case(category))
            })
            .map(PathBuf::as_path)
            .collect()
    }

    /// All cached paths, oldest first
    pub fn paths(&self) -> &[PathBuf] {
        &self.sorted_paths
    }

    pub fn header(&self, path: &Path) -> Option<&RecordHeader> {
        self.entries.get(path).map(|c| &c.record.header)
    }

    pub fn category(&self, path: &Path) -> Option<&str> {
        self.categories_by_path.get(path).map(String::as_str)
    }

    /// Whether the cached entry for `path` carries the frame body
    pub fn is_fully_loaded(&self, path: &Path) -> bool {
        self.entries.get(path).is_some_and(|c| c.full)
    }

    /// Newest record whose name matches `name` case-insensitively
    pub fn find_latest_by_name(&self, name: &str) -> Option<&Path> {
        let name = name.to_lowercase();
        self.sorted_paths
            .iter()
            .rev()
            .find(|p| {
                self.entries
                    .get(*p)
                    .is_some_and(|c| c.record.header.name.to_lowercase() == name)
            })
            .map(PathBuf::as_path)
    }

    /// Output path for a record ending at `end_time`
    ///
    /// If the file already exists, or the path is [reserved](Self::reserve)
    /// by a write still in flight, a `_<n>` suffix is appended so two saves
    /// within the same second never overwrite each other.
    pub fn record_path(
        &self,
        category: &str,
        map_name: &str,
        subdir: Option<&str>,
        end_time: i32,
    ) -> PathBuf {
        let mut dir = self.base_dir.join(category).join(map_name);
        if let Some(subdir) = subdir.filter(|s| !s.is_empty()) {
            dir = dir.join(subdir);
        }

        let path = dir.join(format!("{}.{}", end_time, self.extension));
        if self.is_free(&path) {
            return path;
        }

        (1u32..)
            .map(|n| dir.join(format!("{}_{}.{}", end_time, n, self.extension)))
            .find(|p| self.is_free(p))
            .unwrap_or(path)
    }

    /// Hold `path` until [`release`](Self::release) so `record_path` skips it
    ///
    /// Reservations survive [`clear`](Self::clear).
    pub fn reserve(&mut self, path: PathBuf) {
        self.reserved.insert(path);
    }

    pub fn release(&mut self, path: &Path) {
        self.reserved.remove(path);
    }

    fn is_free(&self, path: &Path) -> bool {
        !path.exists() && !self.reserved.contains(path)
    }

    fn evict(&mut self, path: &Path) {
        if self.entries.remove(path).is_some() {
            tracing::debug!("Evicted {}", path.display());
        }
        self.categories_by_path.remove(path);
        self.resort();
    }

    fn resort(&mut self) {
        let mut paths: Vec<PathBuf> = self.entries.keys().cloned().collect();
        paths.sort_by(|a, b| {
            let ta = self.entries[a].record.header.end_time;
            let tb = self.entries[b].record.header.end_time;
            ta.cmp(&tb).then_with(|| a.cmp(b))
        });
        self.sorted_paths = paths;

        let mut categories: Vec<String> = Vec::new();
        for category in self.categories_by_path.values() {
            if !categories.iter().any(|c| c.eq_ignore_ascii_case(category)) {
                categories.push(category.clone());
            }
        }
        categories.sort_by_key(|c| c.to_lowercase());
        self.categories = categories;
    }
}

fn collect_files(dir: &Path, extension: &str, out: &mut Vec<PathBuf>) {
    let Ok(entries) = fs::read_dir(dir) else {
        return;
    };
    for entry in entries.flatten() {
        let path = entry.path();
        if path.is_dir() {
            collect_files(&path, extension, out);
        } else if path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case(extension))
        {
            out.push(path);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Angles, Frame, Vec3};
    use tempfile::TempDir;

    fn record(name: &str, end_time: i32, frames: usize) -> Record {
        Record::new(
            name,
            end_time,
            Vec3::ZERO,
            Angles::default(),
            vec![Frame::default(); frames],
            vec![],
            vec![],
        )
    }

    fn write(catalog: &Catalog, category: &str, map: &str, rec: &Record) -> PathBuf {
        let path = catalog.record_path(category, map, None, rec.header.end_time);
        codec::write_file(&path, rec).unwrap();
        path
    }

    #[test]
    fn test_load_missing_file() {
        let dir = TempDir::new().unwrap();
        let mut catalog = Catalog::new(dir.path(), "rec");
        let err = catalog
            .load(&dir.path().join("nope.rec"), "c", true, false)
            .unwrap_err();
        assert!(matches!(err, MimicError::FileNotFound(_)));
        assert!(catalog.is_empty());
    }

    #[test]
    fn test_header_then_full_load() {
        let dir = TempDir::new().unwrap();
        let mut catalog = Catalog::new(dir.path(), "rec");
        let path = write(&catalog, "default", "map", &record("a", 10, 5));

        let header = catalog.load(&path, "default", true, false).unwrap();
        assert!(header.frames.is_empty());
        assert!(!catalog.is_fully_loaded(&path));

        let full = catalog.load(&path, "default", false, false).unwrap();
        assert_eq!(full.frames.len(), 5);
        assert!(catalog.is_fully_loaded(&path));

        // Header request after a full load returns the cached body
        let again = catalog.load(&path, "default", true, false).unwrap();
        assert!(Arc::ptr_eq(&full, &again));
    }

    #[test]
    fn test_failed_reload_keeps_cache() {
        let dir = TempDir::new().unwrap();
        let mut catalog = Catalog::new(dir.path(), "rec");
        let path = write(&catalog, "default", "map", &record("a", 10, 2));
        catalog.load(&path, "default", true, false).unwrap();

        fs::write(&path, b"garbage").unwrap();
        let err = catalog.load(&path, "default", true, true).unwrap_err();
        assert!(matches!(err, MimicError::BadFile(_)));
        assert_eq!(catalog.header(&path).unwrap().name, "a");
    }

    #[test]
    fn test_scan_sorts_and_skips_bad_files() {
        let dir = TempDir::new().unwrap();
        let mut catalog = Catalog::new(dir.path(), "rec");
        let newer = write(&catalog, "Zeta", "map", &record("newer", 200, 1));
        let older = write(&catalog, "alpha", "map", &record("older", 100, 1));
        write(&catalog, "alpha", "other_map", &record("elsewhere", 50, 1));

        let nested = dir.path().join("alpha/map/sub/300.rec");
        codec::write_file(&nested, &record("nested", 300, 1)).unwrap();
        fs::write(dir.path().join("alpha/map/broken.rec"), b"xx").unwrap();
        fs::write(dir.path().join("alpha/map/notes.txt"), b"xx").unwrap();

        assert_eq!(catalog.scan("map"), 3);
        assert_eq!(catalog.paths(), &[older.clone(), newer.clone(), nested.clone()]);
        assert_eq!(catalog.list_categories(), &["alpha".to_string(), "Zeta".to_string()]);
        assert_eq!(catalog.list_records("ALPHA"), vec![older.as_path(), nested.as_path()]);
        assert_eq!(catalog.category(&newer), Some("Zeta"));
    }

    #[test]
    fn test_delete_is_idempotent() {
        let dir = TempDir::new().unwrap();
        let mut catalog = Catalog::new(dir.path(), "rec");
        let path = write(&catalog, "default", "map", &record("a", 10, 1));
        catalog.load(&path, "default", true, false).unwrap();

        assert!(catalog.delete(&path));
        assert!(!path.exists());
        assert!(catalog.header(&path).is_none());
        assert!(catalog.list_categories().is_empty());
        assert!(!catalog.delete(&path));
    }

    #[test]
    fn test_find_latest_by_name() {
        let dir = TempDir::new().unwrap();
        let mut catalog = Catalog::new(dir.path(), "rec");
        let first = write(&catalog, "default", "map", &record("Route", 10, 1));
        let second = write(&catalog, "default", "map", &record("route", 20, 1));
        catalog.load(&second, "default", true, false).unwrap();
        catalog.load(&first, "default", true, false).unwrap();

        assert_eq!(catalog.find_latest_by_name("ROUTE"), Some(second.as_path()));
        assert_eq!(catalog.find_latest_by_name("missing"), None);
    }

    #[test]
    fn test_record_path_avoids_collisions() {
        let dir = TempDir::new().unwrap();
        let catalog = Catalog::new(dir.path(), "rec");

        let first = write(&catalog, "default", "map", &record("a", 42, 1));
        assert_eq!(first, dir.path().join("default/map/42.rec"));

        let second = catalog.record_path("default", "map", None, 42);
        assert_eq!(second, dir.path().join("default/map/42_1.rec"));

        let nested = catalog.record_path("default", "map", Some("team"), 42);
        assert_eq!(nested, dir.path().join("default/map/team/42.rec"));
    }

    #[test]
    fn test_reserved_paths_are_skipped_until_released() {
        let dir = TempDir::new().unwrap();
        let mut catalog = Catalog::new(dir.path(), "rec");

        let first = catalog.record_path("default", "map", None, 42);
        catalog.reserve(first.clone());
        let second = catalog.record_path("default", "map", None, 42);
        assert_eq!(second, dir.path().join("default/map/42_1.rec"));

        catalog.reserve(second.clone());
        catalog.clear();
        assert_eq!(
            catalog.record_path("default", "map", None, 42),
            dir.path().join("default/map/42_2.rec")
        );

        catalog.release(&first);
        assert_eq!(catalog.record_path("default", "map", None, 42), first);
    }
}
