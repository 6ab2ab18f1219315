//! Rebuild, update and transcript runs over the master list
//!
//! Every operation follows the same shape: load, compute the new collection
//! in memory, take one snapshot of the persisted file, then one atomic write.
//! An error anywhere before the write leaves the persisted file as it was.

use std::path::Path;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use crate::backup::{BackupManager, BackupSnapshot, RestoreOutcome};
use crate::config::{ConfigFile, ConfigSpec, Environment};
use crate::error::{LedgerError, Result};
use crate::merge::{merge, MergeOptions, MergeStats};
use crate::model::MasterCollection;
use crate::provider::{Backends, ChannelListing, TranscriptRetrieval};
use crate::store::MasterListStore;
use crate::transcript::{BatchReport, TranscriptService};

/// Source of "now" for timestamps and backup names
pub type Clock = Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>;

#[derive(Debug, Clone, Copy)]
pub struct RebuildOptions {
    /// Skip the inventory guard
    pub force: bool,
    /// Keep curated fields of matched items
    pub preserve: bool,
    pub download_transcripts: bool,
    pub max_transcripts: Option<usize>,
    pub force_transcripts: bool,
}

impl Default for RebuildOptions {
    fn default() -> Self {
        Self {
            force: false,
            preserve: true,
            download_transcripts: false,
            max_transcripts: None,
            force_transcripts: false,
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct UpdateOptions {
    /// Overrides `listing.max_items`
    pub max_items: Option<usize>,
    pub download_transcripts: bool,
}

#[derive(Debug, Clone)]
pub struct RebuildReport {
    pub strategy: &'static str,
    pub fetched: usize,
    pub stats: MergeStats,
    pub total: usize,
    pub backup: Option<BackupSnapshot>,
    pub transcripts: Option<BatchReport>,
}

#[derive(Debug, Clone)]
pub struct UpdateReport {
    pub strategy: &'static str,
    pub fetched: usize,
    pub stats: MergeStats,
    pub created_ids: Vec<String>,
    pub total: usize,
    pub backup: Option<BackupSnapshot>,
    pub transcripts: Option<BatchReport>,
}

#[derive(Debug, Clone)]
pub struct TranscriptRunReport {
    pub strategy: &'static str,
    pub batch: BatchReport,
    /// `None` when nothing changed and the master list was not rewritten
    pub backup: Option<BackupSnapshot>,
}

/// Read `config.toml` and validate it against the captured environment
pub fn load_spec(base_dir: &Path, env: &Environment) -> Result<ConfigSpec> {
    let file = ConfigFile::load(base_dir)?;
    ConfigSpec::validate(base_dir, &file, env)
}

pub struct Orchestrator {
    spec: ConfigSpec,
    listing: ChannelListing,
    transcripts: TranscriptService,
    store: MasterListStore,
    backups: BackupManager,
    clock: Clock,
}

impl Orchestrator {
    pub fn new(spec: ConfigSpec, backends: &Backends) -> Self {
        let listing = ChannelListing::from_config(&spec, backends);
        let transcripts = TranscriptService::new(
            TranscriptRetrieval::from_config(&spec, backends),
            spec.transcripts_dir.clone(),
            spec.concurrency,
        );
        let store = MasterListStore::new(spec.master_file.clone());
        let backups = BackupManager::new(&store);
        Self {
            spec,
            listing,
            transcripts,
            store,
            backups,
            clock: Arc::new(Utc::now),
        }
    }

    /// Validate configuration, then wire up the real HTTP and subprocess backends
    pub fn open(base_dir: &Path, env: &Environment) -> Result<Self> {
        let spec = load_spec(base_dir, env)?;
        let backends = Backends::system(&spec.network)?;
        Ok(Self::new(spec, &backends))
    }

    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    pub fn spec(&self) -> &ConfigSpec {
        &self.spec
    }

    pub fn store(&self) -> &MasterListStore {
        &self.store
    }

    pub fn backups(&self) -> &BackupManager {
        &self.backups
    }

    pub fn transcripts(&self) -> &TranscriptService {
        &self.transcripts
    }

    fn now(&self) -> DateTime<Utc> {
        (self.clock)()
    }

    /// Effective configuration, secrets masked. Makes no network call.
    pub fn validate_config(&self) -> Vec<(String, String)> {
        self.spec.summary()
    }

    pub fn load(&self) -> Result<MasterCollection> {
        self.store.load()
    }

    /// Replace the master list with the channel's full inventory
    pub fn rebuild(&self, options: RebuildOptions) -> Result<RebuildReport> {
        let now = self.now();
        let existing = self.store.load_or_empty(&self.spec.source_url)?;
        let limit = self.spec.rebuild_max_items;

        info!(strategy = self.listing.strategy(), limit, preserve = options.preserve, "rebuilding master list");
        let stubs = self.listing.fetch_all(&self.spec.source_url, limit)?;

        let outcome = merge(&existing, &stubs, MergeOptions::rebuild(options.preserve), now)?;
        check_inventory(stubs.len(), limit, outcome.stats.dropped, options.force)?;
        if outcome.stats.dropped > 0 {
            warn!(dropped = outcome.stats.dropped, "items no longer listed upstream will be dropped");
        }

        let mut collection = outcome.collection;
        collection.source_url = self.spec.source_url.clone();

        let transcripts = if options.download_transcripts {
            let ids = self.transcripts.select(
                &collection,
                &[],
                options.max_transcripts,
                options.force_transcripts,
            )?;
            Some(self.transcripts.run_batch(&mut collection, &ids, options.force_transcripts)?)
        } else {
            None
        };

        let backup = self.backups.snapshot(now)?;
        self.store.write(&mut collection, now)?;

        Ok(RebuildReport {
            strategy: self.listing.strategy(),
            fetched: stubs.len(),
            stats: outcome.stats,
            total: collection.len(),
            backup,
            transcripts,
        })
    }

    /// Add newly listed items; nothing already stored is dropped
    pub fn update(&self, options: UpdateOptions) -> Result<UpdateReport> {
        let now = self.now();
        let existing = self.store.load_or_empty(&self.spec.source_url)?;
        let limit = options.max_items.unwrap_or(self.spec.max_items);

        info!(strategy = self.listing.strategy(), limit, "checking for new items");
        let stubs = self.listing.fetch_all(&self.spec.source_url, limit)?;
        let outcome = merge(&existing, &stubs, MergeOptions::update(), now)?;
        let mut collection = outcome.collection;
        collection.source_url = self.spec.source_url.clone();

        let transcripts = if options.download_transcripts && !outcome.created_ids.is_empty() {
            Some(self.transcripts.run_batch(&mut collection, &outcome.created_ids, false)?)
        } else {
            None
        };

        let backup = self.backups.snapshot(now)?;
        self.store.write(&mut collection, now)?;

        Ok(UpdateReport {
            strategy: self.listing.strategy(),
            fetched: stubs.len(),
            stats: outcome.stats,
            created_ids: outcome.created_ids,
            total: collection.len(),
            backup,
            transcripts,
        })
    }

    /// Fetch transcripts for stored items: the given ids, or all that lack one
    pub fn download_transcripts(
        &self,
        ids: &[String],
        max: Option<usize>,
        force: bool,
    ) -> Result<TranscriptRunReport> {
        let now = self.now();
        let mut collection = self.store.load()?;
        let selected = self.transcripts.select(&collection, ids, max, force)?;
        let batch = self.transcripts.run_batch(&mut collection, &selected, force)?;

        let backup = if batch.downloaded > 0 {
            let backup = self.backups.snapshot(now)?;
            self.store.write(&mut collection, now)?;
            backup
        } else {
            None
        };

        Ok(TranscriptRunReport {
            strategy: self.transcripts.strategy(),
            batch,
            backup,
        })
    }

    /// Whether a stored item has a transcript upstream. Reads only.
    pub fn check_transcript(&self, item_id: &str) -> Result<bool> {
        let collection = self.store.load()?;
        let record = collection
            .get(item_id)
            .ok_or_else(|| LedgerError::ItemNotFound {
                item_id: item_id.to_string(),
            })?;
        Ok(self.transcripts.is_available(record)?)
    }

    /// Load, apply a curation edit, snapshot, write back
    ///
    /// An edit that leaves the collection unchanged writes nothing.
    pub fn curate<T>(&self, edit: impl FnOnce(&mut MasterCollection) -> Result<T>) -> Result<T> {
        let mut collection = self.store.load()?;
        let before = collection.clone();
        let value = edit(&mut collection)?;
        if collection == before {
            debug!("curation left the master list unchanged");
            return Ok(value);
        }

        let now = self.now();
        self.backups.snapshot(now)?;
        self.store.write(&mut collection, now)?;
        Ok(value)
    }

    pub fn restore_backup(&self, name: &str) -> Result<RestoreOutcome> {
        self.backups.restore(&self.store, name, self.now())
    }
}

/// Refuse a rebuild whose fetch may not be the full inventory
///
/// An empty fetch, or one that hit the limit exactly, cannot be told apart
/// from an outage or a truncated listing.
fn check_inventory(fetched: usize, limit: usize, would_drop: usize, force: bool) -> Result<()> {
    if force || would_drop == 0 {
        return Ok(());
    }
    let reason = if fetched == 0 {
        "the provider returned no items".to_string()
    } else if fetched >= limit {
        format!(
            "the fetch returned exactly the limit of {} items and may be truncated (raise listing.rebuild_max_items)",
            limit
        )
    } else {
        return Ok(());
    };
    Err(LedgerError::AmbiguousInventory { would_drop, reason })
}
