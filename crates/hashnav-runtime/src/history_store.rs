#![forbid(unsafe_code)]

//! Persistent key-value store for page state.
//!
//! The store maps opaque keys to JSON values. Keys are history
//! identifiers (one per navigation, correlating a history entry with the
//! page-state snapshot saved when that page was left) or fixed
//! well-known application keys such as a cached username.
//!
//! # Architecture
//!
//! [`HistoryStore`] keeps an in-memory cache of entries and delegates
//! durability to a pluggable [`StoreBackend`]: [`MemoryStore`] for tests
//! and ephemeral sessions, [`FileStore`] for a JSON file written with the
//! write-to-temp-then-rename pattern.
//!
//! # Best-effort contract
//!
//! Navigation never depends on the store working. Read failures are
//! treated as "no saved state", write failures are logged and dropped;
//! neither propagates. The explicit [`load`](HistoryStore::load) and
//! [`flush`](HistoryStore::flush) operations do return errors for hosts
//! that want to know.
//!
//! # Growth
//!
//! Entries are never evicted: one is written per navigation away from a
//! page with a history identifier, and they accumulate for the life of
//! the storage area. Bounding this is a product decision, deliberately
//! not taken here.

use std::collections::HashMap;
use std::fmt;
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::RwLock;

use serde::{Deserialize, Serialize};
use serde_json::Value;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors from store operations.
#[derive(Debug)]
pub enum StoreError {
    /// I/O failure in a file backend.
    Io(std::io::Error),
    /// JSON encode/decode failure.
    Serialization(String),
    /// The storage area is structurally unusable.
    Corruption(String),
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreError::Io(e) => write!(f, "I/O error: {e}"),
            StoreError::Serialization(msg) => write!(f, "serialization error: {msg}"),
            StoreError::Corruption(msg) => write!(f, "storage corruption: {msg}"),
        }
    }
}

impl std::error::Error for StoreError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            StoreError::Io(e) => Some(e),
            StoreError::Serialization(_) | StoreError::Corruption(_) => None,
        }
    }
}

impl From<std::io::Error> for StoreError {
    fn from(e: std::io::Error) -> Self {
        StoreError::Io(e)
    }
}

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

// ---------------------------------------------------------------------------
// Backends
// ---------------------------------------------------------------------------

/// Pluggable durability backend for the history store.
///
/// Implementations must be thread-safe. `load_all` should tolerate
/// partial corruption; `save_all` should be atomic.
pub trait StoreBackend: Send + Sync {
    /// Human-readable name for logging.
    fn name(&self) -> &str;

    /// Load every stored entry. An empty map means no state yet.
    fn load_all(&self) -> StoreResult<HashMap<String, Value>>;

    /// Replace all stored entries atomically.
    fn save_all(&self, entries: &HashMap<String, Value>) -> StoreResult<()>;

    /// Remove all stored entries.
    fn clear(&self) -> StoreResult<()>;

    /// Whether the backend is usable.
    fn is_available(&self) -> bool {
        true
    }
}

/// In-memory backend for tests and ephemeral sessions.
#[derive(Default)]
pub struct MemoryStore {
    data: RwLock<HashMap<String, Value>>,
}

impl MemoryStore {
    /// Create an empty memory store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a memory store pre-populated with entries.
    #[must_use]
    pub fn with_entries(entries: HashMap<String, Value>) -> Self {
        Self {
            data: RwLock::new(entries),
        }
    }
}

impl StoreBackend for MemoryStore {
    fn name(&self) -> &str {
        "MemoryStore"
    }

    fn load_all(&self) -> StoreResult<HashMap<String, Value>> {
        let guard = self
            .data
            .read()
            .map_err(|_| StoreError::Corruption("lock poisoned".into()))?;
        Ok(guard.clone())
    }

    fn save_all(&self, entries: &HashMap<String, Value>) -> StoreResult<()> {
        let mut guard = self
            .data
            .write()
            .map_err(|_| StoreError::Corruption("lock poisoned".into()))?;
        *guard = entries.clone();
        Ok(())
    }

    fn clear(&self) -> StoreResult<()> {
        let mut guard = self
            .data
            .write()
            .map_err(|_| StoreError::Corruption("lock poisoned".into()))?;
        guard.clear();
        Ok(())
    }
}

impl fmt::Debug for MemoryStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let count = self.data.read().map(|g| g.len()).unwrap_or(0);
        f.debug_struct("MemoryStore").field("entries", &count).finish()
    }
}

/// On-disk file format (JSON).
#[derive(Serialize, Deserialize)]
struct StoreFile {
    format_version: u32,
    entries: HashMap<String, Value>,
}

impl StoreFile {
    const FORMAT_VERSION: u32 = 1;

    fn new() -> Self {
        Self {
            format_version: Self::FORMAT_VERSION,
            entries: HashMap::new(),
        }
    }
}

/// File-backed store using a single JSON document.
///
/// Writes go to `{path}.tmp` first, are flushed and synced, then renamed
/// over the real path so a crash never leaves a half-written file.
pub struct FileStore {
    path: PathBuf,
}

impl FileStore {
    /// Create a file store at the given path.
    ///
    /// The file need not exist; it is created on first save.
    #[must_use]
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    fn temp_path(&self) -> PathBuf {
        let mut tmp = self.path.clone();
        tmp.set_extension("json.tmp");
        tmp
    }
}

impl StoreBackend for FileStore {
    fn name(&self) -> &str {
        "FileStore"
    }

    fn load_all(&self) -> StoreResult<HashMap<String, Value>> {
        if !self.path.exists() {
            // First run.
            return Ok(HashMap::new());
        }

        let file = File::open(&self.path)?;
        let reader = BufReader::new(file);
        let store_file: StoreFile = serde_json::from_reader(reader)
            .map_err(|e| StoreError::Serialization(format!("failed to parse store file: {e}")))?;

        if store_file.format_version != StoreFile::FORMAT_VERSION {
            tracing::warn!(
                stored = store_file.format_version,
                expected = StoreFile::FORMAT_VERSION,
                "store file format version mismatch, ignoring stored state"
            );
            return Ok(HashMap::new());
        }

        Ok(store_file.entries)
    }

    fn save_all(&self, entries: &HashMap<String, Value>) -> StoreResult<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }

        let mut store_file = StoreFile::new();
        store_file.entries = entries.clone();

        let tmp_path = self.temp_path();
        {
            let file = File::create(&tmp_path)?;
            let mut writer = BufWriter::new(file);
            serde_json::to_writer_pretty(&mut writer, &store_file)
                .map_err(|e| StoreError::Serialization(format!("failed to serialize store: {e}")))?;
            writer.flush()?;
            writer.get_ref().sync_all()?;
        }
        fs::rename(&tmp_path, &self.path)?;

        tracing::debug!(path = %self.path.display(), entries = entries.len(), "saved history store");
        Ok(())
    }

    fn clear(&self) -> StoreResult<()> {
        if self.path.exists() {
            fs::remove_file(&self.path)?;
        }
        Ok(())
    }

    fn is_available(&self) -> bool {
        match self.path.parent() {
            Some(parent) if parent.exists() => {
                let probe = parent.join(".hashnav_write_probe");
                if fs::write(&probe, b"probe").is_ok() {
                    let _ = fs::remove_file(&probe);
                    true
                } else {
                    false
                }
            }
            Some(parent) => fs::create_dir_all(parent).is_ok(),
            None => false,
        }
    }
}

impl fmt::Debug for FileStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FileStore").field("path", &self.path).finish()
    }
}

// ---------------------------------------------------------------------------
// History store
// ---------------------------------------------------------------------------

/// Cache-fronted key-value store for page state.
///
/// `get`/`put` operate on the in-memory cache; `load`/`flush` move data
/// between the cache and the backend. [`persist`](Self::persist) is the
/// best-effort write-through the navigator uses.
pub struct HistoryStore {
    backend: Box<dyn StoreBackend>,
    cache: RwLock<HashMap<String, Value>>,
    dirty: RwLock<bool>,
}

impl HistoryStore {
    /// Create a store over the given backend.
    ///
    /// The cache starts empty; call [`load`](Self::load) to read
    /// existing entries.
    #[must_use]
    pub fn new(backend: Box<dyn StoreBackend>) -> Self {
        Self {
            backend,
            cache: RwLock::new(HashMap::new()),
            dirty: RwLock::new(false),
        }
    }

    /// Create a store over ephemeral memory.
    #[must_use]
    pub fn in_memory() -> Self {
        Self::new(Box::new(MemoryStore::new()))
    }

    /// Create a store over a JSON file.
    #[must_use]
    pub fn with_file(path: impl AsRef<Path>) -> Self {
        Self::new(Box::new(FileStore::new(path)))
    }

    /// Load all entries from the backend, replacing the cache.
    pub fn load(&self) -> StoreResult<usize> {
        let entries = self.backend.load_all()?;
        let count = entries.len();

        *self.write_cache()? = entries;
        *self.write_dirty()? = false;

        tracing::debug!(backend = %self.backend.name(), count, "loaded history store");
        Ok(count)
    }

    /// Flush dirty entries to the backend.
    ///
    /// Returns `Ok(true)` if data was written, `Ok(false)` if nothing
    /// had changed.
    pub fn flush(&self) -> StoreResult<bool> {
        if !*self
            .dirty
            .read()
            .map_err(|_| StoreError::Corruption("dirty lock poisoned".into()))?
        {
            return Ok(false);
        }

        let cache = self
            .cache
            .read()
            .map_err(|_| StoreError::Corruption("cache lock poisoned".into()))?;
        self.backend.save_all(&cache)?;
        drop(cache);

        *self.write_dirty()? = false;
        Ok(true)
    }

    /// Look up an entry.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<Value> {
        self.cache.read().ok()?.get(key).cloned()
    }

    /// Insert or replace an entry, marking the store dirty.
    pub fn put(&self, key: impl Into<String>, value: Value) {
        if let Ok(mut cache) = self.cache.write() {
            cache.insert(key.into(), value);
            if let Ok(mut dirty) = self.dirty.write() {
                *dirty = true;
            }
        }
    }

    /// Best-effort write-through: insert the entry and flush, logging
    /// (not propagating) any failure.
    pub fn persist(&self, key: &str, value: Value) {
        self.put(key, value);
        if let Err(e) = self.flush() {
            tracing::warn!(key, error = %e, "failed to persist history entry");
        }
    }

    /// Remove an entry, returning its previous value.
    pub fn remove(&self, key: &str) -> Option<Value> {
        let removed = self.cache.write().ok()?.remove(key);
        if removed.is_some()
            && let Ok(mut dirty) = self.dirty.write()
        {
            *dirty = true;
        }
        removed
    }

    /// Clear the cache and the backend.
    pub fn clear(&self) -> StoreResult<()> {
        self.backend.clear()?;
        *self.write_cache()? = HashMap::new();
        *self.write_dirty()? = false;
        Ok(())
    }

    /// Number of cached entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.cache.read().map(|c| c.len()).unwrap_or(0)
    }

    /// Whether the cache is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether there are unflushed changes.
    #[must_use]
    pub fn is_dirty(&self) -> bool {
        self.dirty.read().map(|d| *d).unwrap_or(false)
    }

    /// The backend name for logging.
    #[must_use]
    pub fn backend_name(&self) -> &str {
        self.backend.name()
    }

    /// Whether the backend is usable.
    #[must_use]
    pub fn is_available(&self) -> bool {
        self.backend.is_available()
    }

    fn write_cache(&self) -> StoreResult<std::sync::RwLockWriteGuard<'_, HashMap<String, Value>>> {
        self.cache
            .write()
            .map_err(|_| StoreError::Corruption("cache lock poisoned".into()))
    }

    fn write_dirty(&self) -> StoreResult<std::sync::RwLockWriteGuard<'_, bool>> {
        self.dirty
            .write()
            .map_err(|_| StoreError::Corruption("dirty lock poisoned".into()))
    }
}

impl fmt::Debug for HistoryStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HistoryStore")
            .field("backend", &self.backend.name())
            .field("entries", &self.len())
            .field("dirty", &self.is_dirty())
            .finish()
    }
}


#[cfg(test)]
mod file_store_tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    #[test]
    fn file_store_round_trip() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("history.json");
        let store = FileStore::new(&path);

        let mut entries = HashMap::new();
        entries.insert("1a_0".to_owned(), json!({"scroll": 42}));
        store.save_all(&entries).unwrap();
        assert!(path.exists());

        let loaded = store.load_all().unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded["1a_0"], json!({"scroll": 42}));
    }

    #[test]
    fn file_store_missing_file_is_empty() {
        let tmp = TempDir::new().unwrap();
        let store = FileStore::new(tmp.path().join("absent.json"));
        assert!(store.load_all().unwrap().is_empty());
    }

    #[test]
    fn file_store_rejects_garbage() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("history.json");
        fs::write(&path, b"not json").unwrap();

        let store = FileStore::new(&path);
        assert!(matches!(
            store.load_all(),
            Err(StoreError::Serialization(_))
        ));
    }

    #[test]
    fn file_store_ignores_unknown_format_version() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("history.json");
        fs::write(&path, br#"{"format_version": 99, "entries": {"k": 1}}"#).unwrap();

        let store = FileStore::new(&path);
        assert!(store.load_all().unwrap().is_empty());
    }

    #[test]
    fn file_store_creates_parent_dirs() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("nested").join("deep").join("history.json");
        let store = FileStore::new(&path);
        store.save_all(&HashMap::new()).unwrap();
        assert!(path.exists());
    }

    #[test]
    fn file_store_clear_removes_file() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("history.json");
        fs::write(&path, "{}").unwrap();

        FileStore::new(&path).clear().unwrap();
        assert!(!path.exists());
    }
}
