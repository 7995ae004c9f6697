//! Shared thumbnail cache with binary persistence.
//!
//! The cache maps asset paths to their last-known icon, stamped with the
//! modification time the icon was resolved at. All open folder views share
//! one instance behind a single lock; entries are built fully before the
//! lock is taken, so a reader never observes a partially written entry.
//!
//! On-disk format (`ContentInfoCache.bin`, little-endian):
//! `i32` entry count, then per entry `{i32 path length + UTF-8 path,
//! i64 modification ticks, i32 icon size + icon bytes}`.

use std::collections::HashMap;
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, ErrorKind, Read, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::SystemTime;

use tempfile::NamedTempFile;

use crate::binio::{read_i32, read_i64, read_vec, write_i32, write_i64};
use crate::error::{lock_poisoned_error, AssetError, Result};
use crate::header::{system_time_from_ticks, ticks_from_system_time};

/// Upper bound accepted for a persisted icon. Larger declared sizes are
/// treated as corruption.
const MAX_ICON_LEN: i32 = 16 * 1024 * 1024;

struct ThumbEntry {
    modified: SystemTime,
    icon: Arc<Vec<u8>>,
}

/// Path-keyed icon cache shared across folder views and sessions.
pub struct ThumbnailCache {
    cache_path: PathBuf,
    entries: Mutex<HashMap<PathBuf, ThumbEntry>>,
}

impl ThumbnailCache {
    /// Loads the persisted cache from `cache_path`.
    ///
    /// A missing file starts an empty cache; a corrupt or unreadable one is
    /// discarded with a warning and rebuilt from scratch. Entries whose
    /// asset file no longer exists on disk are dropped silently.
    pub fn load(cache_path: impl Into<PathBuf>) -> Self {
        let cache_path = cache_path.into();
        let entries = match read_cache_file(&cache_path) {
            Ok(entries) => entries,
            Err(AssetError::Io(error)) if error.kind() == ErrorKind::NotFound => HashMap::new(),
            Err(error) => {
                log::warn!(
                    "failed to read content cache {}: {error}",
                    cache_path.display()
                );
                HashMap::new()
            }
        };
        Self {
            cache_path,
            entries: Mutex::new(entries),
        }
    }

    /// Returns the cached icon for `path` when the cache entry is at least
    /// as new as `modified`.
    pub fn lookup(&self, path: &Path, modified: SystemTime) -> Option<Arc<Vec<u8>>> {
        let entries = self.entries.lock().ok()?;
        let entry = entries.get(path)?;
        (entry.modified >= modified).then(|| entry.icon.clone())
    }

    /// Refreshes the entry for `path`.
    pub fn insert(&self, path: &Path, modified: SystemTime, icon: Arc<Vec<u8>>) {
        let entry = ThumbEntry { modified, icon };
        if let Ok(mut entries) = self.entries.lock() {
            entries.insert(path.to_path_buf(), entry);
        }
    }

    pub fn len(&self) -> usize {
        self.entries.lock().map(|entries| entries.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Writes the cache to its backing file, replacing it atomically.
    pub fn flush(&self) -> Result<()> {
        let entries = self
            .entries
            .lock()
            .map_err(|_| lock_poisoned_error("thumbnail cache"))?;

        let parent = self
            .cache_path
            .parent()
            .filter(|parent| !parent.as_os_str().is_empty())
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));
        fs::create_dir_all(&parent)?;

        let mut temp = NamedTempFile::new_in(&parent)?;
        {
            let mut writer = BufWriter::new(temp.as_file_mut());
            write_i32(&mut writer, entries.len() as i32)?;
            for (path, entry) in entries.iter() {
                let path_bytes = path.to_string_lossy();
                let path_bytes = path_bytes.as_bytes();
                write_i32(&mut writer, path_bytes.len() as i32)?;
                writer.write_all(path_bytes)?;
                write_i64(&mut writer, ticks_from_system_time(entry.modified))?;
                write_i32(&mut writer, entry.icon.len() as i32)?;
                writer.write_all(&entry.icon)?;
            }
            writer.flush()?;
        }
        temp.persist(&self.cache_path)
            .map_err(|error| AssetError::Io(error.error))?;

        log::debug!(
            "wrote content cache {} ({} entries)",
            self.cache_path.display(),
            entries.len()
        );
        Ok(())
    }
}

impl Drop for ThumbnailCache {
    fn drop(&mut self) {
        // best effort on shutdown; a failed flush must not block exit
        if let Err(error) = self.flush() {
            log::warn!(
                "content cache flush failed for {}: {error}",
                self.cache_path.display()
            );
        }
    }
}

fn cache_corrupt(what: &str) -> AssetError {
    AssetError::CacheCorrupt(what.to_string())
}

fn read_cache_file(path: &Path) -> Result<HashMap<PathBuf, ThumbEntry>> {
    let file = File::open(path)?;
    let mut reader = BufReader::new(file);

    let count = read_i32(&mut reader).map_err(|_| cache_corrupt("truncated entry count"))?;
    if count < 0 {
        return Err(cache_corrupt("negative entry count"));
    }

    let mut entries = HashMap::new();
    for _ in 0..count {
        let (path, entry) = read_cache_record(&mut reader)?;
        // keep only entries whose asset still exists
        if path.exists() {
            entries.insert(path, entry);
        }
    }
    Ok(entries)
}

fn read_cache_record<R: Read>(reader: &mut R) -> Result<(PathBuf, ThumbEntry)> {
    let path_len = read_i32(reader).map_err(|_| cache_corrupt("truncated path length"))?;
    if path_len < 0 {
        return Err(cache_corrupt("negative path length"));
    }
    let path_bytes =
        read_vec(reader, path_len as usize).map_err(|_| cache_corrupt("truncated path"))?;
    let path = String::from_utf8(path_bytes).map_err(|_| cache_corrupt("path is not UTF-8"))?;

    let ticks = read_i64(reader).map_err(|_| cache_corrupt("truncated timestamp"))?;

    let icon_len = read_i32(reader).map_err(|_| cache_corrupt("truncated icon size"))?;
    if !(0..=MAX_ICON_LEN).contains(&icon_len) {
        return Err(cache_corrupt("icon size out of range"));
    }
    let icon = read_vec(reader, icon_len as usize).map_err(|_| cache_corrupt("truncated icon"))?;

    Ok((
        PathBuf::from(path),
        ThumbEntry {
            modified: system_time_from_ticks(ticks),
            icon: Arc::new(icon),
        },
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tempfile::TempDir;

    fn touch(path: &Path) {
        fs::write(path, b"asset bytes").unwrap();
    }

    #[test]
    fn missing_cache_file_starts_empty() {
        let dir = TempDir::new().unwrap();
        let cache = ThumbnailCache::load(dir.path().join("ContentInfoCache.bin"));
        assert!(cache.is_empty());
    }

    #[test]
    fn lookup_honors_the_modification_stamp() {
        let dir = TempDir::new().unwrap();
        let cache = ThumbnailCache::load(dir.path().join("cache.bin"));
        let asset = dir.path().join("rock.asset");

        let stamp = SystemTime::now();
        cache.insert(&asset, stamp, Arc::new(vec![1, 2, 3]));

        // same age or older file: reuse
        assert!(cache.lookup(&asset, stamp).is_some());
        assert!(cache
            .lookup(&asset, stamp - Duration::from_secs(1))
            .is_some());
        // newer file: stale
        assert!(cache
            .lookup(&asset, stamp + Duration::from_secs(1))
            .is_none());
        // unknown path
        assert!(cache.lookup(Path::new("/other"), stamp).is_none());
    }

    #[test]
    fn flush_and_load_round_trip() {
        let dir = TempDir::new().unwrap();
        let cache_file = dir.path().join("cache.bin");
        let asset = dir.path().join("rock.asset");
        touch(&asset);

        let stamp = SystemTime::now();
        {
            let cache = ThumbnailCache::load(&cache_file);
            cache.insert(&asset, stamp, Arc::new(vec![9, 8, 7]));
            cache.flush().unwrap();
        }

        let reloaded = ThumbnailCache::load(&cache_file);
        assert_eq!(reloaded.len(), 1);
        let icon = reloaded.lookup(&asset, stamp).unwrap();
        assert_eq!(*icon, vec![9, 8, 7]);
    }

    #[test]
    fn drop_flushes_best_effort() {
        let dir = TempDir::new().unwrap();
        let cache_file = dir.path().join("cache.bin");
        let asset = dir.path().join("rock.asset");
        touch(&asset);

        {
            let cache = ThumbnailCache::load(&cache_file);
            cache.insert(&asset, SystemTime::now(), Arc::new(vec![1]));
        }
        assert!(cache_file.exists());
        assert_eq!(ThumbnailCache::load(&cache_file).len(), 1);
    }

    #[test]
    fn entries_for_vanished_files_are_dropped_on_load() {
        let dir = TempDir::new().unwrap();
        let cache_file = dir.path().join("cache.bin");
        let asset = dir.path().join("rock.asset");
        touch(&asset);

        {
            let cache = ThumbnailCache::load(&cache_file);
            cache.insert(&asset, SystemTime::now(), Arc::new(vec![1]));
            cache.flush().unwrap();
        }

        fs::remove_file(&asset).unwrap();
        let reloaded = ThumbnailCache::load(&cache_file);
        assert!(reloaded.is_empty());
    }

    #[test]
    fn truncated_cache_file_loads_empty_without_panicking() {
        let dir = TempDir::new().unwrap();
        let cache_file = dir.path().join("cache.bin");
        let asset = dir.path().join("rock.asset");
        touch(&asset);

        {
            let cache = ThumbnailCache::load(&cache_file);
            cache.insert(&asset, SystemTime::now(), Arc::new(vec![1, 2, 3, 4]));
            cache.flush().unwrap();
        }

        // cut the file mid-record
        let bytes = fs::read(&cache_file).unwrap();
        fs::write(&cache_file, &bytes[..bytes.len() - 3]).unwrap();

        let cache = ThumbnailCache::load(&cache_file);
        assert!(cache.is_empty());

        // and the cache repopulates normally afterwards
        cache.insert(&asset, SystemTime::now(), Arc::new(vec![5]));
        cache.flush().unwrap();
        assert_eq!(ThumbnailCache::load(&cache_file).len(), 1);
    }

    #[test]
    fn garbage_cache_file_loads_empty() {
        let dir = TempDir::new().unwrap();
        let cache_file = dir.path().join("cache.bin");
        fs::write(&cache_file, b"\xff\xff\xff\xff not a cache").unwrap();

        let cache = ThumbnailCache::load(&cache_file);
        assert!(cache.is_empty());
    }

    #[test]
    fn persisted_layout_is_stable() {
        let dir = TempDir::new().unwrap();
        let cache_file = dir.path().join("cache.bin");
        let asset = dir.path().join("a.asset");
        touch(&asset);

        let stamp = SystemTime::UNIX_EPOCH + Duration::from_secs(100);
        {
            let cache = ThumbnailCache::load(&cache_file);
            cache.insert(&asset, stamp, Arc::new(vec![0xaa, 0xbb]));
            cache.flush().unwrap();
        }

        let bytes = fs::read(&cache_file).unwrap();
        let path_str = asset.to_string_lossy();
        let path_len = path_str.as_bytes().len();

        assert_eq!(&bytes[0..4], &1i32.to_le_bytes());
        assert_eq!(&bytes[4..8], &(path_len as i32).to_le_bytes());
        assert_eq!(&bytes[8..8 + path_len], path_str.as_bytes());
        let at = 8 + path_len;
        assert_eq!(
            &bytes[at..at + 8],
            &(100i64 * 10_000_000).to_le_bytes(),
            "timestamp is written as 100 ns ticks"
        );
        assert_eq!(&bytes[at + 8..at + 12], &2i32.to_le_bytes());
        assert_eq!(&bytes[at + 12..], &[0xaa, 0xbb]);
    }
}
