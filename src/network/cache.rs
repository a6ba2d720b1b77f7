//! File-backed response cache
//!
//! Entries live in `<directory>/<sha256 of request identity>.cache`.
//! Freshness is the file's age against a configured expiry; no expiry
//! means entries never go stale. Concurrent writers to one key race with
//! last-write-wins, which is fine because entries are reproducible.

use crate::utils::Result;
use ring::digest::{digest, SHA256};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::Duration;

const EXTENSION: &str = "cache";

/// Content-addressed response store
#[derive(Debug, Clone)]
pub struct FileCache {
    directory: PathBuf,
    expire_after: Option<Duration>,
}

impl FileCache {
    /// Create a cache rooted at `directory`
    pub fn new(directory: impl Into<PathBuf>, expire_after: Option<Duration>) -> Self {
        Self {
            directory: directory.into(),
            expire_after,
        }
    }

    /// Deterministic key for a request identity
    pub fn key(identity: &str) -> String {
        digest(&SHA256, identity.as_bytes())
            .as_ref()
            .iter()
            .map(|byte| format!("{byte:02x}"))
            .collect()
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    fn path(&self, key: &str) -> PathBuf {
        self.directory.join(format!("{key}.{EXTENSION}"))
    }

    pub fn exists(&self, key: &str) -> bool {
        self.path(key).is_file()
    }

    pub fn read(&self, key: &str) -> Result<String> {
        Ok(fs::read_to_string(self.path(key))?)
    }

    /// Store an entry, creating the cache directory on first use
    pub fn write(&self, key: &str, value: &str) -> Result<()> {
        fs::create_dir_all(&self.directory)?;
        fs::write(self.path(key), value)?;
        Ok(())
    }

    /// Time since the entry was last written
    pub fn age(&self, key: &str) -> Result<Duration> {
        let modified = fs::metadata(self.path(key))?.modified()?;
        Ok(modified.elapsed().unwrap_or_default())
    }

    pub fn delete(&self, key: &str) -> Result<()> {
        fs::remove_file(self.path(key))?;
        Ok(())
    }

    /// Check expiry, deleting the entry once it has gone stale
    ///
    /// A missing entry counts as expired.
    pub fn is_expired(&self, key: &str) -> Result<bool> {
        let Some(expire_after) = self.expire_after else {
            return Ok(false);
        };
        if !self.exists(key) {
            log::warn!("cache entry {key} does not exist");
            return Ok(true);
        }
        if self.age(key)? < expire_after {
            return Ok(false);
        }
        self.delete(key)?;
        Ok(true)
    }

    /// Get an entry if present and fresh
    pub fn get(&self, key: &str) -> Result<Option<String>> {
        if !self.exists(key) || self.is_expired(key)? {
            return Ok(None);
        }
        self.read(key).map(Some)
    }

    /// Remove every entry, returning how many were deleted
    pub fn clear(&self) -> Result<usize> {
        let entries = match fs::read_dir(&self.directory) {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(0),
            Err(e) => return Err(e.into()),
        };
        let mut removed = 0;
        for entry in entries {
            let path = entry?.path();
            if path.extension().is_some_and(|ext| ext == EXTENSION) {
                fs::remove_file(&path)?;
                removed += 1;
            }
        }
        Ok(removed)
    }

    /// Get cache statistics
    pub fn stats(&self) -> Result<CacheStats> {
        let mut stats = CacheStats::default();
        let entries = match fs::read_dir(&self.directory) {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(stats),
            Err(e) => return Err(e.into()),
        };
        for entry in entries {
            let entry = entry?;
            if entry.path().extension().is_some_and(|ext| ext == EXTENSION) {
                stats.entries += 1;
                stats.size_bytes += entry.metadata()?.len();
            }
        }
        Ok(stats)
    }
}

/// Cache statistics
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Number of cached entries
    pub entries: usize,
    /// Total size in bytes
    pub size_bytes: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_is_stable_hex_sha256() {
        let key = FileCache::key("https://example.com/");
        assert_eq!(key.len(), 64);
        assert!(key.chars().all(|c| c.is_ascii_hexdigit()));
        assert_eq!(key, FileCache::key("https://example.com/"));
        assert_ne!(key, FileCache::key("https://example.com/other"));
    }

    #[test]
    fn test_write_read_delete() {
        let dir = tempfile::tempdir().unwrap();
        let cache = FileCache::new(dir.path().join("nested"), None);
        let key = FileCache::key("http://x/");

        assert!(!cache.exists(&key));
        cache.write(&key, "HTTP/1.1 200 OK\r\n\r\nhello").unwrap();
        assert!(cache.exists(&key));
        assert_eq!(cache.read(&key).unwrap(), "HTTP/1.1 200 OK\r\n\r\nhello");

        cache.delete(&key).unwrap();
        assert!(!cache.exists(&key));
    }

    #[test]
    fn test_no_expiry_never_goes_stale() {
        let dir = tempfile::tempdir().unwrap();
        let cache = FileCache::new(dir.path(), None);
        let key = FileCache::key("http://x/");
        cache.write(&key, "body").unwrap();

        assert!(!cache.is_expired(&key).unwrap());
        assert_eq!(cache.get(&key).unwrap().as_deref(), Some("body"));
    }

    #[test]
    fn test_zero_expiry_deletes_entry() {
        let dir = tempfile::tempdir().unwrap();
        let cache = FileCache::new(dir.path(), Some(Duration::ZERO));
        let key = FileCache::key("http://x/");
        cache.write(&key, "body").unwrap();

        assert!(cache.is_expired(&key).unwrap());
        assert!(!cache.exists(&key));
        assert_eq!(cache.get(&key).unwrap(), None);
    }

    #[test]
    fn test_missing_entry_counts_as_expired() {
        let dir = tempfile::tempdir().unwrap();
        let cache = FileCache::new(dir.path(), Some(Duration::from_secs(60)));
        assert!(cache.is_expired(&FileCache::key("http://missing/")).unwrap());
    }

    #[test]
    fn test_clear_and_stats() {
        let dir = tempfile::tempdir().unwrap();
        let cache = FileCache::new(dir.path(), None);
        cache.write(&FileCache::key("a"), "12345").unwrap();
        cache.write(&FileCache::key("b"), "678").unwrap();
        fs::write(dir.path().join("keep.txt"), "not a cache file").unwrap();

        let stats = cache.stats().unwrap();
        assert_eq!(stats.entries, 2);
        assert_eq!(stats.size_bytes, 8);

        assert_eq!(cache.clear().unwrap(), 2);
        assert_eq!(cache.stats().unwrap(), CacheStats::default());
        assert!(dir.path().join("keep.txt").exists());
    }

    #[test]
    fn test_clear_missing_directory() {
        let dir = tempfile::tempdir().unwrap();
        let cache = FileCache::new(dir.path().join("absent"), None);
        assert_eq!(cache.clear().unwrap(), 0);
    }
}
