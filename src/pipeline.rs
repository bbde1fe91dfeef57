//! Load → reconcile wiring for one deployment.
//!
//! A [`Pipeline`] owns the loader, the source cache and the reconciler built
//! from a [`Config`]. Each call to [`Pipeline::snapshot`] fetches every
//! configured source (through the cache, in parallel) and reconciles the
//! results into a fresh unified table.

use std::{collections::BTreeMap, sync::Arc, thread};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use log::{debug, warn};
use serde::Serialize;

use crate::{
    cache::{Fetched, SourceCache},
    config::Config,
    error::LoadError,
    reconcile::{Reconciler, Reconciliation, SourceWarning},
    source::{LoadOutcome, Loader, SourceDescriptor, SourceKind},
    table::Table,
};

/// Per-source provenance for one snapshot.
#[derive(Debug, Clone, Serialize)]
pub struct SourceStatus {
    pub kind: SourceKind,
    pub location: String,
    pub rows: usize,
    pub refreshed_at: DateTime<Utc>,
    pub from_cache: bool,
    pub loaded: bool,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct Snapshot {
    #[serde(flatten)]
    pub reconciliation: Reconciliation,
    pub sources: Vec<SourceStatus>,
}

impl Snapshot {
    pub fn unified(&self) -> &Table {
        &self.reconciliation.unified
    }
}

#[derive(Debug)]
pub struct Pipeline {
    config: Config,
    loader: Loader,
    cache: SourceCache,
    reconciler: Reconciler,
}

impl Pipeline {
    pub fn new(config: Config) -> Result<Self> {
        config.validate()?;
        let loader = Loader::new(config.timeout(), config.encoding()?)
            .context("Building HTTP client")?;
        let cache = SourceCache::new(config.ttl());
        let reconciler = Reconciler::new(config.key_aliases(), config.classifier());
        Ok(Self {
            config,
            loader,
            cache,
            reconciler,
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn cache(&self) -> &SourceCache {
        &self.cache
    }

    /// Fetches all sources and reconciles them.
    pub fn snapshot(&self) -> Snapshot {
        self.snapshot_with(|d| self.loader.load_outcome(d))
    }

    fn snapshot_with<F>(&self, load: F) -> Snapshot
    where
        F: Fn(&SourceDescriptor) -> LoadOutcome + Sync,
    {
        let fetched = self.fetch_all(&load);

        let mut warnings = Vec::new();
        let mut statuses = Vec::with_capacity(fetched.len());
        let mut tables: BTreeMap<SourceKind, Arc<Table>> = BTreeMap::new();
        for (kind, location, fetched) in fetched {
            if let Some(err) = &fetched.error {
                warnings.push(SourceWarning::LoadFailed {
                    source: kind,
                    reason: err.to_string(),
                });
            }
            statuses.push(SourceStatus {
                kind,
                location,
                rows: fetched.table.row_count(),
                refreshed_at: fetched.refreshed_at,
                from_cache: fetched.from_cache,
                loaded: fetched.error.is_none(),
            });
            tables.insert(kind, fetched.table);
        }

        let mut reconciliation = self.reconciler.reconcile(&tables);
        warnings.append(&mut reconciliation.warnings);
        reconciliation.warnings = warnings;
        Snapshot {
            reconciliation,
            sources: statuses,
        }
    }

    fn fetch_all<F>(&self, load: &F) -> Vec<(SourceKind, String, Fetched)>
    where
        F: Fn(&SourceDescriptor) -> LoadOutcome + Sync,
    {
        thread::scope(|scope| {
            let handles = self
                .config
                .sources
                .iter()
                .map(|source| {
                    let descriptor = source.descriptor();
                    debug!("Scheduling fetch of {} from {descriptor}", source.kind);
                    let handle = scope.spawn(move || self.cache.get_or_load(&descriptor, load));
                    (source.kind, source.descriptor().to_string(), handle)
                })
                .collect::<Vec<_>>();
            handles
                .into_iter()
                .map(|(kind, location, handle)| {
                    let fetched = handle.join().unwrap_or_else(|_| {
                        warn!("Fetching {kind} from {location} panicked; treating as empty");
                        Fetched {
                            table: Arc::new(Table::empty()),
                            refreshed_at: Utc::now(),
                            from_cache: false,
                            error: Some(LoadError::Panicked),
                        }
                    });
                    (kind, location, fetched)
                })
                .collect()
        })
    }
}
