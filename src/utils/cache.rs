//! TTL result cache with atomic JSON snapshots.
//!
//! The cache is an in-memory map guarded by a single mutex. Entries expire
//! lazily: a read older than the TTL counts as a miss and evicts the entry,
//! nothing is swept proactively.
//!
//! # File Format
//!
//! ```text
//! {
//!   "query:deep learning": {"timestamp": 1700000000.5, "data": {...record...}},
//!   "author:Smith, J:year_from=2020": {"timestamp": 1700000100.0, "data": [ ... ]},
//!   "query:legacy entry": {...record without wrapper...}
//! }
//! ```
//!
//! Entries without the `timestamp`/`data` wrapper come from older versions
//! and never expire.

use crate::config::CacheConfig;
use crate::models::{Record, SearchFilters};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration, SystemTime};
use tempfile::NamedTempFile;

/// Default entry lifetime (7 days)
pub const DEFAULT_TTL: Duration = Duration::from_secs(7 * 24 * 60 * 60);

/// A cached search result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CachedValue {
    /// Result list (author searches, multi-result searches)
    Many(Vec<Record>),
    /// Single best match
    One(Record),
}

impl CachedValue {
    /// Flatten into a list of records
    pub fn into_records(self) -> Vec<Record> {
        match self {
            CachedValue::Many(records) => records,
            CachedValue::One(record) => vec![record],
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, CachedValue::Many(records) if records.is_empty())
    }
}

/// One cache slot; `timestamp` is `None` for legacy entries
#[derive(Debug, Clone, PartialEq)]
pub struct CacheEntry {
    /// Unix seconds at write time
    pub timestamp: Option<f64>,
    pub data: CachedValue,
}

impl CacheEntry {
    fn to_json(&self) -> Result<Value, serde_json::Error> {
        let data = serde_json::to_value(&self.data)?;
        Ok(match self.timestamp {
            Some(ts) => serde_json::json!({ "timestamp": ts, "data": data }),
            None => data,
        })
    }

    fn from_json(value: Value) -> Result<Self, serde_json::Error> {
        if let Value::Object(map) = &value {
            if let (Some(ts), Some(data)) = (map.get("timestamp"), map.get("data")) {
                if let Some(ts) = ts.as_f64() {
                    return Ok(Self {
                        timestamp: Some(ts),
                        data: serde_json::from_value(data.clone())?,
                    });
                }
            }
        }

        Ok(Self {
            timestamp: None,
            data: serde_json::from_value(value)?,
        })
    }
}

/// Cache errors
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialize error: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("Failed to replace cache file: {0}")]
    Persist(#[from] tempfile::PersistError),
}

/// Statistics about the cache
#[derive(Debug, Clone)]
pub struct CacheStats {
    /// Entries currently held
    pub entries: usize,

    /// Entries without a timestamp
    pub legacy_entries: usize,

    /// Entries past their TTL that have not been read yet
    pub stale_entries: usize,

    /// Durable file, if any
    pub path: Option<PathBuf>,

    pub ttl: Duration,
}

/// Thread-safe TTL cache keyed by canonical query strings
#[derive(Debug)]
pub struct ResultCache {
    entries: Mutex<HashMap<String, CacheEntry>>,

    /// Orders snapshot writes so an older snapshot never lands last
    write_lock: Mutex<()>,

    path: Option<PathBuf>,
    ttl: Duration,
}

/// Current time as Unix seconds
pub fn now_unix() -> f64 {
    SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .map(|d| d.as_secs_f64())
        .unwrap_or_default()
}

impl ResultCache {
    /// A cache that is never written to disk
    pub fn in_memory(ttl: Duration) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            write_lock: Mutex::new(()),
            path: None,
            ttl,
        }
    }

    /// Load the cache from `path`
    ///
    /// A missing file gives an empty cache. An unreadable or corrupt file is
    /// logged and also gives an empty cache; individual bad entries are
    /// skipped.
    pub fn load(path: impl Into<PathBuf>, ttl: Duration) -> Self {
        let path = path.into();
        let entries = read_entries(&path);

        tracing::debug!(
            "Cache loaded from {} ({} entries)",
            path.display(),
            entries.len()
        );

        Self {
            entries: Mutex::new(entries),
            write_lock: Mutex::new(()),
            path: Some(path),
            ttl,
        }
    }

    /// Build from configuration, loading the configured file when enabled
    pub fn from_config(config: &CacheConfig) -> Self {
        let ttl = Duration::from_secs(config.ttl_seconds);
        match config.path.clone() {
            Some(path) => Self::load(path, ttl),
            None => Self::load(crate::config::default_cache_file(), ttl),
        }
    }

    /// Cache key for a single-work search
    pub fn query_key(query: &str) -> String {
        format!("query:{}", query)
    }

    /// Cache key for an author search
    pub fn author_key(author: &str, filters: &SearchFilters) -> String {
        format!("author:{}:{}", author, filters.cache_fragment())
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, CacheEntry>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn is_expired(&self, entry: &CacheEntry, now: f64) -> bool {
        match entry.timestamp {
            Some(ts) => now - ts > self.ttl.as_secs_f64(),
            None => false,
        }
    }

    /// Look up a key; the returned value is an independent copy
    pub fn get(&self, key: &str) -> Option<CachedValue> {
        self.get_at(key, now_unix())
    }

    /// [`get`](Self::get) with an explicit clock (Unix seconds)
    pub fn get_at(&self, key: &str, now: f64) -> Option<CachedValue> {
        let mut entries = self.lock();

        let expired = match entries.get(key) {
            None => {
                tracing::debug!("Cache MISS: {}", key);
                return None;
            }
            Some(entry) => self.is_expired(entry, now),
        };

        if expired {
            entries.remove(key);
            tracing::info!("Cache expired for: {}", key);
            return None;
        }

        tracing::debug!("Cache HIT: {}", key);
        entries.get(key).map(|entry| entry.data.clone())
    }

    /// Store a value, replacing any previous entry
    pub fn put(&self, key: impl Into<String>, value: CachedValue) {
        self.put_at(key, value, now_unix());
    }

    /// [`put`](Self::put) with an explicit clock (Unix seconds)
    pub fn put_at(&self, key: impl Into<String>, value: CachedValue, now: f64) {
        self.lock().insert(
            key.into(),
            CacheEntry {
                timestamp: Some(now),
                data: value,
            },
        );
    }

    pub fn remove(&self, key: &str) -> Option<CachedValue> {
        self.lock().remove(key).map(|entry| entry.data)
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Drop every entry (the file is rewritten on the next persist)
    pub fn clear(&self) {
        self.lock().clear();
        tracing::info!("Cache cleared");
    }

    pub fn stats(&self) -> CacheStats {
        let now = now_unix();
        let entries = self.lock();
        CacheStats {
            entries: entries.len(),
            legacy_entries: entries.values().filter(|e| e.timestamp.is_none()).count(),
            stale_entries: entries.values().filter(|e| self.is_expired(e, now)).count(),
            path: self.path.clone(),
            ttl: self.ttl,
        }
    }

    /// Write a snapshot of the whole cache to its file
    ///
    /// The map is copied under the lock and serialized after releasing it.
    /// The snapshot goes to a temporary file in the same directory, is
    /// fsynced, and then renamed over the old file.
    pub fn persist(&self) -> Result<(), CacheError> {
        let Some(path) = &self.path else {
            return Ok(());
        };

        let _writer = self.write_lock.lock().unwrap_or_else(PoisonError::into_inner);
        let snapshot: BTreeMap<String, CacheEntry> = self
            .lock()
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();

        let mut map = Map::with_capacity(snapshot.len());
        for (key, entry) in snapshot {
            map.insert(key, entry.to_json()?);
        }
        let bytes = serde_json::to_vec_pretty(&Value::Object(map))?;

        let dir = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        fs::create_dir_all(&dir)?;

        let mut tmp = NamedTempFile::new_in(&dir)?;
        tmp.write_all(&bytes)?;
        tmp.as_file().sync_all()?;
        tmp.persist(path)?;

        tracing::debug!("Cache persisted to {}", path.display());
        Ok(())
    }
}

fn read_entries(path: &Path) -> HashMap<String, CacheEntry> {
    let content = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return HashMap::new(),
        Err(e) => {
            tracing::warn!("Failed to read cache file {}: {}", path.display(), e);
            return HashMap::new();
        }
    };

    let root: Map<String, Value> = match serde_json::from_str(&content) {
        Ok(root) => root,
        Err(e) => {
            tracing::warn!(
                "Cache file {} is corrupt, starting empty: {}",
                path.display(),
                e
            );
            return HashMap::new();
        }
    };

    let mut entries = HashMap::with_capacity(root.len());
    for (key, value) in root {
        match CacheEntry::from_json(value) {
            Ok(entry) => {
                entries.insert(key, entry);
            }
            Err(e) => tracing::warn!("Skipping unreadable cache entry {}: {}", key, e),
        }
    }
    entries
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::RecordBuilder;
    use tempfile::TempDir;

    fn record(title: &str) -> Record {
        RecordBuilder::new(title, "crossref").doi("10.1/x").build()
    }

    #[test]
    fn test_put_get() {
        let cache = ResultCache::in_memory(DEFAULT_TTL);
        cache.put("query:a", CachedValue::One(record("A")));

        match cache.get("query:a") {
            Some(CachedValue::One(r)) => assert_eq!(r.title, "A"),
            other => panic!("Expected cache hit, got {:?}", other),
        }
        assert!(cache.get("query:b").is_none());
    }

    #[test]
    fn test_returned_values_are_isolated() {
        let cache = ResultCache::in_memory(DEFAULT_TTL);
        cache.put("query:a", CachedValue::Many(vec![record("A")]));

        let mut first = cache.get("query:a").unwrap().into_records();
        first[0].title = "Mutated".to_string();
        first.push(record("Extra"));

        let second = cache.get("query:a").unwrap().into_records();
        assert_eq!(second.len(), 1);
        assert_eq!(second[0].title, "A");
    }

    #[test]
    fn test_ttl_boundary() {
        let ttl = Duration::from_secs(100);
        let cache = ResultCache::in_memory(ttl);
        let t = 1_000_000.0;
        cache.put_at("k", CachedValue::One(record("A")), t);

        assert!(cache.get_at("k", t + 100.0 - 0.001).is_some());
        assert!(cache.get_at("k", t + 100.0 + 0.001).is_none());
    }

    #[test]
    fn test_expired_entry_is_evicted_on_read_only() {
        let cache = ResultCache::in_memory(Duration::from_secs(10));
        cache.put_at("k", CachedValue::One(record("A")), 0.0);

        // nothing is swept before the entry is read
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.stats().stale_entries, 1);

        assert!(cache.get_at("k", 11.0).is_none());
        assert_eq!(cache.len(), 0);
    }

    #[test]
    fn test_put_replaces_entry() {
        let cache = ResultCache::in_memory(Duration::from_secs(10));
        cache.put_at("k", CachedValue::One(record("Old")), 0.0);
        cache.put_at("k", CachedValue::One(record("New")), 5.0);

        match cache.get_at("k", 12.0) {
            Some(CachedValue::One(r)) => assert_eq!(r.title, "New"),
            other => panic!("Expected refreshed entry, got {:?}", other),
        }
    }

    #[test]
    fn test_persist_and_reload() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("cache.json");

        let cache = ResultCache::load(&path, DEFAULT_TTL);
        assert!(cache.is_empty());
        cache.put("query:a", CachedValue::One(record("A")));
        cache.put(
            "author:Smith:",
            CachedValue::Many(vec![record("B"), record("C")]),
        );
        cache.persist().unwrap();

        let reloaded = ResultCache::load(&path, DEFAULT_TTL);
        assert_eq!(reloaded.len(), 2);
        assert_eq!(reloaded.get("author:Smith:").unwrap().into_records().len(), 2);

        // only the final file remains, no stray temp files
        let files: Vec<_> = fs::read_dir(dir.path()).unwrap().collect();
        assert_eq!(files.len(), 1);
    }

    #[test]
    fn test_legacy_entries_never_expire() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("cache.json");
        fs::write(
            &path,
            r#"{
                "query:old": {"title": "Legacy Work", "authors": ["Doe, J"], "year": "1999"},
                "author:Doe:": [{"title": "One"}, {"title": "Two"}]
            }"#,
        )
        .unwrap();

        let cache = ResultCache::load(&path, Duration::from_secs(1));
        assert_eq!(cache.stats().legacy_entries, 2);

        let far_future = now_unix() + 1e9;
        match cache.get_at("query:old", far_future) {
            Some(CachedValue::One(r)) => assert_eq!(r.title, "Legacy Work"),
            other => panic!("Expected legacy hit, got {:?}", other),
        }
        assert_eq!(
            cache.get_at("author:Doe:", far_future).unwrap().into_records().len(),
            2
        );

        // legacy entries are written back without a wrapper
        cache.persist().unwrap();
        let raw: Value = serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert!(raw["query:old"].get("timestamp").is_none());
    }

    #[test]
    fn test_corrupt_file_gives_empty_cache() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("cache.json");
        fs::write(&path, "{ not json").unwrap();

        let cache = ResultCache::load(&path, DEFAULT_TTL);
        assert!(cache.is_empty());

        // the cache still works and can overwrite the bad file
        cache.put("query:a", CachedValue::One(record("A")));
        cache.persist().unwrap();
        assert_eq!(ResultCache::load(&path, DEFAULT_TTL).len(), 1);
    }

    #[test]
    fn test_bad_entry_is_skipped() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("cache.json");
        fs::write(
            &path,
            r#"{"query:good": {"timestamp": 1.0, "data": {"title": "Good"}}, "query:bad": 42}"#,
        )
        .unwrap();

        let cache = ResultCache::load(&path, DEFAULT_TTL);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_concurrent_persist() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("cache.json");
        let cache = ResultCache::load(&path, DEFAULT_TTL);

        std::thread::scope(|scope| {
            for i in 0..8 {
                let cache = &cache;
                scope.spawn(move || {
                    cache.put(format!("query:{}", i), CachedValue::One(record("T")));
                    cache.persist().unwrap();
                });
            }
        });
        cache.persist().unwrap();

        assert_eq!(ResultCache::load(&path, DEFAULT_TTL).len(), 8);
    }

    #[test]
    fn test_keys() {
        assert_eq!(ResultCache::query_key("deep learning"), "query:deep learning");
        let filters = SearchFilters::new().year_from(2020).document_type("book");
        assert_eq!(
            ResultCache::author_key("Smith, J", &filters),
            "author:Smith, J:document_type=book,year_from=2020"
        );
    }
}
