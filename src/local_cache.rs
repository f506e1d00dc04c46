// Local Cache: advisory key/value mirror of the hotel catalog and the user's choices.
// Nothing here is authoritative; every reader must cope with absent or stale data.

use crate::bookings::Booking;
use crate::hotel::{normalize_records, Hotel};
use parking_lot::Mutex;
use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use thiserror::Error;
use tracing::{debug, warn};

pub const HOTELS_KEY: &str = "hotels";
pub const SORT_ORDER_KEY: &str = "sortOrder";
pub const AVAILABILITY_KEY: &str = "availabilityFilter";
pub const CITY_KEY: &str = "cityFilter";
pub const SEARCH_KEY: &str = "searchText";
pub const BOOKINGS_KEY: &str = "bookings";

#[derive(Error, Debug)]
pub enum CacheError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Malformed cache entry under '{key}': {reason}")]
    MalformedCacheEntry { key: String, reason: String },
}

#[derive(Debug, Default)]
pub struct CacheStats {
    pub reads: AtomicUsize,
    pub hits: AtomicUsize,
    pub misses: AtomicUsize,
    pub writes: AtomicUsize,
    pub write_failures: AtomicUsize,
    pub malformed_dropped: AtomicUsize,
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct CacheStatsReport {
    pub reads: usize,
    pub hits: usize,
    pub misses: usize,
    pub writes: usize,
    pub write_failures: usize,
    pub malformed_dropped: usize,
}

// String store supplied by the host environment
pub trait KeyValueStore: Send + Sync + 'static {
    fn get(&self, key: &str) -> Option<String>;

    // Full overwrite of the value under `key`
    fn set(&self, key: &str, value: String) -> Result<(), CacheError>;
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Option<String> {
        self.entries.lock().get(key).cloned()
    }

    fn set(&self, key: &str, value: String) -> Result<(), CacheError> {
        self.entries.lock().insert(key.to_string(), value);
        Ok(())
    }
}

/// Key/value store persisted as a single JSON object on disk.
///
/// The whole file is rewritten on every change (write to a sibling temp file,
/// then rename). A missing or corrupt file opens as an empty store.
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    entries: Mutex<BTreeMap<String, String>>,
}

impl FileStore {
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let entries = match fs::read_to_string(&path) {
            Ok(content) => match serde_json::from_str::<BTreeMap<String, String>>(&content) {
                Ok(entries) => entries,
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "Cache file is corrupt, starting empty");
                    BTreeMap::new()
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Cache file unreadable, starting empty");
                BTreeMap::new()
            }
        };

        debug!(path = %path.display(), entries = entries.len(), "Opened file store");
        Self {
            path,
            entries: Mutex::new(entries),
        }
    }

    fn flush(&self, entries: &BTreeMap<String, String>) -> Result<(), CacheError> {
        let content = serde_json::to_string_pretty(entries)
            .map_err(|e| CacheError::Serialization(e.to_string()))?;
        let tmp_path = self.path.with_extension("tmp");
        fs::write(&tmp_path, content)?;
        fs::rename(&tmp_path, &self.path)?;
        Ok(())
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Option<String> {
        self.entries.lock().get(key).cloned()
    }

    fn set(&self, key: &str, value: String) -> Result<(), CacheError> {
        let mut entries = self.entries.lock();
        entries.insert(key.to_string(), value);
        self.flush(&entries)
    }
}

pub struct LocalCache<S> {
    store: S,
    stats: CacheStats,
}

impl<S: KeyValueStore> LocalCache<S> {
    pub fn new(store: S) -> Self {
        Self {
            store,
            stats: CacheStats::default(),
        }
    }

    // Cached catalog; empty when absent, malformed entries dropped
    pub fn read_hotels(&self) -> Vec<Hotel> {
        let values = self.read_array(HOTELS_KEY);
        let (hotels, dropped) = normalize_records(values, "local cache");
        self.stats
            .malformed_dropped
            .fetch_add(dropped, Ordering::SeqCst);
        hotels
    }

    pub fn write_hotels(&self, hotels: &[Hotel]) -> Result<(), CacheError> {
        let value =
            serde_json::to_string(hotels).map_err(|e| CacheError::Serialization(e.to_string()))?;
        self.put(HOTELS_KEY, value)
    }

    pub fn read_preference(&self, key: &str) -> Option<String> {
        self.fetch(key)
    }

    pub fn write_preference(&self, key: &str, value: &str) -> Result<(), CacheError> {
        self.put(key, value.to_string())
    }

    pub fn read_bookings(&self) -> Vec<Booking> {
        self.read_array(BOOKINGS_KEY)
            .into_iter()
            .filter_map(|value| match serde_json::from_value::<Booking>(value) {
                Ok(booking) => Some(booking),
                Err(e) => {
                    self.stats.malformed_dropped.fetch_add(1, Ordering::SeqCst);
                    warn!(error = %e, "Dropping malformed booking entry");
                    None
                }
            })
            .collect()
    }

    pub fn write_bookings(&self, bookings: &[Booking]) -> Result<(), CacheError> {
        let value = serde_json::to_string(bookings)
            .map_err(|e| CacheError::Serialization(e.to_string()))?;
        self.put(BOOKINGS_KEY, value)
    }

    pub fn stats(&self) -> CacheStatsReport {
        CacheStatsReport {
            reads: self.stats.reads.load(Ordering::SeqCst),
            hits: self.stats.hits.load(Ordering::SeqCst),
            misses: self.stats.misses.load(Ordering::SeqCst),
            writes: self.stats.writes.load(Ordering::SeqCst),
            write_failures: self.stats.write_failures.load(Ordering::SeqCst),
            malformed_dropped: self.stats.malformed_dropped.load(Ordering::SeqCst),
        }
    }

    fn fetch(&self, key: &str) -> Option<String> {
        self.stats.reads.fetch_add(1, Ordering::SeqCst);
        let value = self.store.get(key);
        if value.is_some() {
            self.stats.hits.fetch_add(1, Ordering::SeqCst);
        } else {
            self.stats.misses.fetch_add(1, Ordering::SeqCst);
        }
        value
    }

    fn put(&self, key: &str, value: String) -> Result<(), CacheError> {
        let size = value.len();
        match self.store.set(key, value) {
            Ok(()) => {
                self.stats.writes.fetch_add(1, Ordering::SeqCst);
                debug!(key, size, "Cache entry written");
                Ok(())
            }
            Err(e) => {
                self.stats.write_failures.fetch_add(1, Ordering::SeqCst);
                Err(e)
            }
        }
    }

    // A value that isn't a JSON array is treated the same as an absent one
    fn read_array(&self, key: &str) -> Vec<serde_json::Value> {
        let Some(raw) = self.fetch(key) else {
            return Vec::new();
        };

        match serde_json::from_str::<serde_json::Value>(&raw) {
            Ok(serde_json::Value::Array(values)) => values,
            Ok(other) => {
                self.record_malformed(key, format!("expected an array, found {}", json_kind(&other)));
                Vec::new()
            }
            Err(e) => {
                self.record_malformed(key, e.to_string());
                Vec::new()
            }
        }
    }

    fn record_malformed(&self, key: &str, reason: String) {
        self.stats.malformed_dropped.fetch_add(1, Ordering::SeqCst);
        let err = CacheError::MalformedCacheEntry {
            key: key.to_string(),
            reason,
        };
        warn!(error = %err, "Ignoring cache entry");
    }
}

fn json_kind(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "a boolean",
        serde_json::Value::Number(_) => "a number",
        serde_json::Value::String(_) => "a string",
        serde_json::Value::Array(_) => "an array",
        serde_json::Value::Object(_) => "an object",
    }
}
