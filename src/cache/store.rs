//! Size-bounded on-disk HTTP response store
//!
//! Each entry is a pair of files named by the SHA-256 of the request URL:
//! `<key>.meta` (JSON `CachedResponse`) and `<key>.body`. Both are written to a
//! temp file first and renamed into place. An in-memory index tracks entry
//! sizes and last use so the store can evict least-recently-used entries when
//! it grows past its byte budget.

use crate::cache::freshness::CachedResponse;
use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::fs::{self, File};
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use tempfile::NamedTempFile;
use tracing::{debug, info, warn};

const META_EXT: &str = "meta";
const BODY_EXT: &str = "body";

#[derive(Debug, Clone, Copy)]
struct IndexEntry {
    size: u64,
    last_used: DateTime<Utc>,
}

#[derive(Debug, Default)]
struct Index {
    entries: HashMap<String, IndexEntry>,
    size: u64,
}

impl Index {
    fn insert(&mut self, key: String, entry: IndexEntry) {
        if let Some(old) = self.entries.insert(key, entry) {
            self.size -= old.size;
        }
        self.size += entry.size;
    }

    fn remove(&mut self, key: &str) -> Option<IndexEntry> {
        let removed = self.entries.remove(key)?;
        self.size -= removed.size;
        Some(removed)
    }

    fn least_recently_used(&self) -> Option<String> {
        self.entries
            .iter()
            .min_by_key(|(_, e)| e.last_used)
            .map(|(k, _)| k.clone())
    }
}

/// A stored response: its metadata and an open handle on its body
#[derive(Debug)]
pub struct CacheHit {
    pub meta: CachedResponse,
    pub body: File,
}

/// Disk-backed response cache shared by every request of a client
#[derive(Debug)]
pub struct DiskCache {
    dir: PathBuf,
    max_size: u64,
    closed: AtomicBool,
    index: Mutex<Index>,
}

impl DiskCache {
    /// Open (or create) a cache in `dir` holding at most `max_size` bytes of bodies.
    ///
    /// A directory that cannot be created or read is logged and the cache
    /// starts empty; writes into it fail later and are reported then.
    pub fn open(dir: impl Into<PathBuf>, max_size: u64) -> Self {
        let dir = dir.into();
        if let Err(e) = fs::create_dir_all(&dir) {
            warn!("Could not create cache directory {}: {}", dir.display(), e);
        }

        let index = match Self::scan(&dir) {
            Ok(index) => index,
            Err(e) => {
                warn!("Could not read cache directory {}: {}", dir.display(), e);
                Index::default()
            }
        };

        let cache = Self {
            index: Mutex::new(index),
            dir,
            max_size,
            closed: AtomicBool::new(false),
        };

        {
            let mut index = cache.lock_index();
            cache.trim_locked(&mut index);
            debug!(
                "Opened cache {} ({} entries, {} of {} bytes)",
                cache.dir.display(),
                index.entries.len(),
                index.size,
                cache.max_size
            );
        }
        cache
    }

    /// Rebuild the index from the entries on disk, dropping broken ones
    fn scan(dir: &Path) -> io::Result<Index> {
        let mut index = Index::default();

        for entry in fs::read_dir(dir)? {
            let path = entry?.path();
            let name = path
                .file_name()
                .and_then(|n| n.to_str())
                .unwrap_or_default()
                .to_string();

            // Leftovers from interrupted writes
            if name.starts_with(".tmp") {
                let _ = fs::remove_file(&path);
                continue;
            }

            if path.extension().and_then(|e| e.to_str()) != Some(META_EXT) {
                continue;
            }
            let Some(key) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };

            match read_meta(&path) {
                Ok(meta) if path.with_extension(BODY_EXT).is_file() => {
                    index.insert(
                        key.to_string(),
                        IndexEntry {
                            size: meta.size_bytes,
                            last_used: meta.last_used_at,
                        },
                    );
                }
                _ => {
                    debug!("Dropping unreadable cache entry {}", key);
                    let _ = fs::remove_file(&path);
                    let _ = fs::remove_file(path.with_extension(BODY_EXT));
                }
            }
        }

        // Bodies whose metadata never made it to disk
        for entry in fs::read_dir(dir)? {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) == Some(BODY_EXT)
                && !path.with_extension(META_EXT).exists()
            {
                let _ = fs::remove_file(&path);
            }
        }

        Ok(index)
    }

    /// Cache key for a URL
    pub fn key(url: &str) -> String {
        hex::encode(Sha256::digest(url.as_bytes()))
    }

    pub fn directory(&self) -> &Path {
        &self.dir
    }

    /// Byte budget for stored bodies
    pub fn max_size(&self) -> u64 {
        self.max_size
    }

    /// Bytes currently stored
    pub fn size(&self) -> u64 {
        self.lock_index().size
    }

    pub fn len(&self) -> usize {
        self.lock_index().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Look up the entry for `url`, marking it as used. A closed cache always misses.
    pub fn get(&self, url: &str) -> io::Result<Option<CacheHit>> {
        if self.is_closed() {
            return Ok(None);
        }

        let key = Self::key(url);
        // Held until the touch is written so a concurrent commit of the same
        // key cannot pair its body with this metadata
        let mut index = self.lock_index();
        let mut meta = match read_meta(&self.meta_path(&key)) {
            Ok(meta) => meta,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) if !index.entries.contains_key(&key) => {
                debug!("No usable cache entry for {}: {}", url, e);
                return Ok(None);
            }
            Err(e) => {
                warn!("Discarding corrupt cache entry for {}: {}", url, e);
                self.remove_locked(&mut index, &key);
                return Ok(None);
            }
        };
        if meta.url != url {
            return Ok(None);
        }

        let body = match File::open(self.body_path(&key)) {
            Ok(file) => file,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                self.remove_locked(&mut index, &key);
                return Ok(None);
            }
            Err(e) => return Err(e),
        };

        meta.touch();
        if let Err(e) = self.write_meta(&key, &meta) {
            debug!("Could not record use of {}: {}", url, e);
        }
        if let Some(entry) = index.entries.get_mut(&key) {
            entry.last_used = meta.last_used_at;
        }

        Ok(Some(CacheHit { meta, body }))
    }

    /// Rewrite the metadata of an existing entry after revalidation.
    ///
    /// `stored_received_at` is the `received_at` of the entry as it was read.
    /// Nothing is written if the entry has since been replaced or removed.
    pub fn update(
        &self,
        meta: &CachedResponse,
        stored_received_at: DateTime<Utc>,
    ) -> io::Result<()> {
        if self.is_closed() {
            return Ok(());
        }
        let key = Self::key(&meta.url);
        let index = self.lock_index();
        if !index.entries.contains_key(&key) {
            return Ok(());
        }

        let current = read_meta(&self.meta_path(&key))?;
        if current.received_at != stored_received_at {
            debug!("Not updating {}: entry was replaced", meta.url);
            return Ok(());
        }
        self.write_meta(&key, meta)
    }

    /// Wrap a response body so that reading it to the end stores it under `meta.url`.
    ///
    /// Storage is best effort: any write failure turns the wrapper into a plain
    /// pass-through and is only logged.
    pub fn begin_store<R: Read>(
        self: &Arc<Self>,
        meta: CachedResponse,
        source: R,
    ) -> CacheWriter<R> {
        let temp = if self.is_closed() {
            None
        } else {
            match NamedTempFile::new_in(&self.dir) {
                Ok(temp) => Some(temp),
                Err(e) => {
                    warn!("Not caching {}: {}", meta.url, e);
                    None
                }
            }
        };

        CacheWriter {
            source,
            cache: Arc::clone(self),
            key: Self::key(&meta.url),
            meta: Some(meta),
            temp,
            written: 0,
        }
    }

    /// Remove the entry for `url`. Returns whether one existed.
    pub fn remove(&self, url: &str) -> bool {
        self.remove_key(&Self::key(url))
    }

    /// Metadata of every stored entry, most recently used first
    pub fn entries(&self) -> io::Result<Vec<CachedResponse>> {
        let keys: Vec<String> = self.lock_index().entries.keys().cloned().collect();
        let mut entries = Vec::with_capacity(keys.len());
        for key in keys {
            match read_meta(&self.meta_path(&key)) {
                Ok(meta) => entries.push(meta),
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(e) => return Err(e),
            }
        }
        entries.sort_by(|a, b| b.last_used_at.cmp(&a.last_used_at));
        Ok(entries)
    }

    /// Remove every entry, keeping the directory
    pub fn clear(&self) -> io::Result<()> {
        let mut index = self.lock_index();
        let keys: Vec<String> = index.entries.keys().cloned().collect();
        for key in keys {
            self.delete_files(&key)?;
            index.remove(&key);
        }
        info!("Cleared cache {}", self.dir.display());
        Ok(())
    }

    /// Stop serving and storing entries, trimming the store to its budget.
    ///
    /// Only the first call does any work.
    pub fn close(&self) -> io::Result<()> {
        if self.closed.swap(true, Ordering::AcqRel) {
            return Ok(());
        }

        let mut index = self.lock_index();
        self.trim_locked(&mut index);
        debug!(
            "Closed cache {} ({} bytes in {} entries)",
            self.dir.display(),
            index.size,
            index.entries.len()
        );

        // Surface an unusable directory to the caller of close
        fs::metadata(&self.dir).map(|_| ())
    }

    fn commit(
        &self,
        key: &str,
        mut meta: CachedResponse,
        body: NamedTempFile,
        size: u64,
    ) -> io::Result<()> {
        if self.is_closed() {
            return Ok(());
        }
        if size > self.max_size {
            debug!("Not caching {}: {} bytes exceeds budget", meta.url, size);
            return Ok(());
        }

        meta.size_bytes = size;
        let mut index = self.lock_index();
        body.persist(self.body_path(key))?;
        self.write_meta(key, &meta)?;
        index.insert(
            key.to_string(),
            IndexEntry {
                size,
                last_used: meta.last_used_at,
            },
        );
        debug!("Cached {} ({} bytes)", meta.url, size);

        self.trim_locked(&mut index);
        Ok(())
    }

    /// Evict least-recently-used entries until the store fits its budget
    fn trim_locked(&self, index: &mut Index) {
        while index.size > self.max_size {
            let Some(key) = index.least_recently_used() else {
                break;
            };
            if let Err(e) = self.delete_files(&key) {
                warn!("Failed to evict cache entry {}: {}", key, e);
            }
            if let Some(evicted) = index.remove(&key) {
                debug!("Evicted cache entry {} ({} bytes)", key, evicted.size);
            }
        }
    }

    fn remove_key(&self, key: &str) -> bool {
        let mut index = self.lock_index();
        self.remove_locked(&mut index, key)
    }

    fn remove_locked(&self, index: &mut Index, key: &str) -> bool {
        if let Err(e) = self.delete_files(key) {
            warn!("Failed to remove cache entry {}: {}", key, e);
        }
        index.remove(key).is_some()
    }

    fn delete_files(&self, key: &str) -> io::Result<()> {
        for path in [self.meta_path(key), self.body_path(key)] {
            match fs::remove_file(&path) {
                Ok(()) => {}
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(e) => return Err(e),
            }
        }
        Ok(())
    }

    fn write_meta(&self, key: &str, meta: &CachedResponse) -> io::Result<()> {
        let mut temp = NamedTempFile::new_in(&self.dir)?;
        serde_json::to_writer(&mut temp, meta)?;
        temp.persist(self.meta_path(key))?;
        Ok(())
    }

    fn meta_path(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}.{}", key, META_EXT))
    }

    fn body_path(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}.{}", key, BODY_EXT))
    }

    fn lock_index(&self) -> MutexGuard<'_, Index> {
        self.index.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

fn read_meta(path: &Path) -> io::Result<CachedResponse> {
    let content = fs::read(path)?;
    Ok(serde_json::from_slice(&content)?)
}

/// Tee over a network body that commits it to the cache at end of stream.
///
/// Dropping the reader before the end discards the partial copy.
pub struct CacheWriter<R> {
    source: R,
    cache: Arc<DiskCache>,
    key: String,
    meta: Option<CachedResponse>,
    temp: Option<NamedTempFile>,
    written: u64,
}

impl<R> CacheWriter<R> {
    fn abort(&mut self, reason: &str) {
        if self.temp.take().is_some() {
            if let Some(meta) = &self.meta {
                debug!("Abandoned caching {}: {}", meta.url, reason);
            }
        }
    }

    fn finish(&mut self) {
        let (Some(temp), Some(meta)) = (self.temp.take(), self.meta.take()) else {
            return;
        };
        let url = meta.url.clone();
        if let Err(e) = self.cache.commit(&self.key, meta, temp, self.written) {
            warn!("Failed to cache {}: {}", url, e);
        }
    }
}

impl<R: Read> Read for CacheWriter<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = self.source.read(buf)?;
        if n == 0 {
            if !buf.is_empty() {
                self.finish();
            }
            return Ok(0);
        }

        if let Some(temp) = self.temp.as_mut() {
            match temp.write_all(&buf[..n]) {
                Ok(()) => {
                    self.written += n as u64;
                    if self.written > self.cache.max_size {
                        self.abort("body exceeds cache budget");
                    }
                }
                Err(e) => self.abort(&e.to_string()),
            }
        }
        Ok(n)
    }
}
