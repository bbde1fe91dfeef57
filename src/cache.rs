//! Time-bounded cache of loaded source tables.
//!
//! Entries are keyed by [`SourceDescriptor`] and consulted through
//! [`is_stale`]. Lookups take a read lock; a miss fetches with no lock held and
//! then takes the write lock only long enough to insert that one entry. Failed
//! loads are never cached, so the next call tries the source again.

use std::{
    collections::HashMap,
    sync::{Arc, PoisonError, RwLock},
    time::{Duration, Instant},
};

use chrono::{DateTime, Utc};
use log::debug;

use crate::{
    error::LoadError,
    source::{LoadOutcome, SourceDescriptor},
    table::Table,
};

pub const DEFAULT_TTL_SECS: u64 = 600;

#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub table: Arc<Table>,
    pub fetched_at: Instant,
    pub refreshed_at: DateTime<Utc>,
}

impl CacheEntry {
    pub fn new(table: Table) -> Self {
        Self {
            table: Arc::new(table),
            fetched_at: Instant::now(),
            refreshed_at: Utc::now(),
        }
    }
}

/// True once `entry` is at least `ttl` old. A zero TTL is always stale.
pub fn is_stale(entry: &CacheEntry, ttl: Duration) -> bool {
    entry.fetched_at.elapsed() >= ttl
}

/// Result of [`SourceCache::get_or_load`].
#[derive(Debug)]
pub struct Fetched {
    pub table: Arc<Table>,
    pub refreshed_at: DateTime<Utc>,
    pub from_cache: bool,
    pub error: Option<LoadError>,
}

#[derive(Debug)]
pub struct SourceCache {
    ttl: Duration,
    entries: RwLock<HashMap<SourceDescriptor, CacheEntry>>,
}

impl SourceCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: RwLock::new(HashMap::new()),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// The cached entry for `descriptor`, if present and fresh.
    pub fn get(&self, descriptor: &SourceDescriptor) -> Option<CacheEntry> {
        let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
        entries
            .get(descriptor)
            .filter(|entry| !is_stale(entry, self.ttl))
            .cloned()
    }

    pub fn insert(&self, descriptor: SourceDescriptor, entry: CacheEntry) {
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        entries.insert(descriptor, entry);
    }

    /// Serves a fresh cached table or calls `load` and caches a success.
    pub fn get_or_load<F>(&self, descriptor: &SourceDescriptor, load: F) -> Fetched
    where
        F: FnOnce(&SourceDescriptor) -> LoadOutcome,
    {
        if let Some(entry) = self.get(descriptor) {
            debug!("Cache hit for {descriptor}");
            return Fetched {
                table: entry.table,
                refreshed_at: entry.refreshed_at,
                from_cache: true,
                error: None,
            };
        }
        debug!("Cache miss for {descriptor}");
        match load(descriptor) {
            LoadOutcome::Loaded(table) => {
                let entry = CacheEntry::new(table);
                self.insert(descriptor.clone(), entry.clone());
                Fetched {
                    table: entry.table,
                    refreshed_at: entry.refreshed_at,
                    from_cache: false,
                    error: None,
                }
            }
            LoadOutcome::Failed(err) => Fetched {
                table: Arc::new(Table::empty()),
                refreshed_at: Utc::now(),
                from_cache: false,
                error: Some(err),
            },
        }
    }

    pub fn invalidate(&self, descriptor: &SourceDescriptor) -> bool {
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        entries.remove(descriptor).is_some()
    }

    pub fn clear(&self) {
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }

    pub fn len(&self) -> usize {
        self.entries.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for SourceCache {
    fn default() -> Self {
        Self::new(Duration::from_secs(DEFAULT_TTL_SECS))
    }
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;
    use std::path::PathBuf;

    use super::*;
    use crate::{data::Value, source::Location};

    fn descriptor(name: &str) -> SourceDescriptor {
        SourceDescriptor::new(Location::Path(PathBuf::from(name)))
    }

    fn one_row() -> Table {
        Table::new(vec!["no_tienda".into()], vec![vec![Some(Value::from("1001"))]]).unwrap()
    }

    #[test]
    fn fresh_entry_is_served_without_reloading() {
        let cache = SourceCache::new(Duration::from_secs(60));
        let calls = Cell::new(0);
        let load = |_: &SourceDescriptor| {
            calls.set(calls.get() + 1);
            LoadOutcome::Loaded(one_row())
        };
        let first = cache.get_or_load(&descriptor("ventas.csv"), load);
        let second = cache.get_or_load(&descriptor("ventas.csv"), load);
        assert_eq!(calls.get(), 1);
        assert!(!first.from_cache);
        assert!(second.from_cache);
        assert_eq!(second.table.row_count(), 1);
    }

    #[test]
    fn zero_ttl_always_reloads() {
        let cache = SourceCache::new(Duration::ZERO);
        let calls = Cell::new(0);
        let load = |_: &SourceDescriptor| {
            calls.set(calls.get() + 1);
            LoadOutcome::Loaded(one_row())
        };
        cache.get_or_load(&descriptor("ventas.csv"), load);
        cache.get_or_load(&descriptor("ventas.csv"), load);
        assert_eq!(calls.get(), 2);
    }

    #[test]
    fn failures_are_not_cached() {
        let cache = SourceCache::new(Duration::from_secs(60));
        let fetched = cache.get_or_load(&descriptor("missing.csv"), |d| {
            LoadOutcome::Failed(LoadError::MissingSheet(d.to_string()))
        });
        assert!(fetched.error.is_some());
        assert!(fetched.table.is_empty());
        assert!(cache.is_empty());
    }

    #[test]
    fn entries_are_keyed_per_descriptor() {
        let cache = SourceCache::new(Duration::from_secs(60));
        cache.insert(descriptor("a.csv"), CacheEntry::new(one_row()));
        assert!(cache.get(&descriptor("a.csv")).is_some());
        assert!(cache.get(&descriptor("b.csv")).is_none());
        assert!(cache.get(&descriptor("a.csv").with_sheet("Tab")).is_none());
        assert!(cache.invalidate(&descriptor("a.csv")));
        assert!(cache.get(&descriptor("a.csv")).is_none());
    }

    #[test]
    fn is_stale_respects_ttl_boundary() {
        let mut entry = CacheEntry::new(one_row());
        assert!(!is_stale(&entry, Duration::from_secs(60)));
        assert!(is_stale(&entry, Duration::ZERO));
        entry.fetched_at = Instant::now()
            .checked_sub(Duration::from_secs(120))
            .expect("monotonic clock past two minutes");
        assert!(is_stale(&entry, Duration::from_secs(60)));
        assert!(!is_stale(&entry, Duration::from_secs(600)));
    }
}
