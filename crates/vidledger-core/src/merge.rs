//! Reconcile a stored collection with freshly fetched stubs
//!
//! [`merge`] never mutates its inputs: it builds a new [`MasterCollection`]
//! whose per-item values depend only on `(existing, incoming, options)`.
//! Stub order only decides presentation order in the output.

use std::collections::{BTreeMap, HashSet};

use chrono::{DateTime, Utc};
use tracing::debug;

use crate::error::{LedgerError, Result};
use crate::model::{ItemRecord, ItemStub, MasterCollection};

/// Whether `incoming` is the full inventory or just the latest items
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeMode {
    /// Records missing from `incoming` are dropped
    Rebuild,
    /// Records missing from `incoming` are kept as they are
    Update,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MergeOptions {
    /// Keep curated fields of matched records
    pub preserve: bool,
    pub mode: MergeMode,
}

impl MergeOptions {
    pub fn rebuild(preserve: bool) -> Self {
        Self {
            preserve,
            mode: MergeMode::Rebuild,
        }
    }

    pub fn update() -> Self {
        Self {
            preserve: true,
            mode: MergeMode::Update,
        }
    }
}

/// Counters for reporting
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MergeStats {
    /// Matched, curated fields kept
    pub preserved: usize,
    /// Matched, curated fields reset
    pub reset: usize,
    pub created: usize,
    /// Existing records absent from `incoming` in rebuild mode
    pub dropped: usize,
    /// Existing records absent from `incoming` in update mode
    pub retained: usize,
}

#[derive(Debug, Clone)]
pub struct MergeOutcome {
    pub collection: MasterCollection,
    pub stats: MergeStats,
    /// Ids of records created by this merge, in output order
    pub created_ids: Vec<String>,
}

/// Merge `incoming` into `existing`
pub fn merge(
    existing: &MasterCollection,
    incoming: &[ItemStub],
    options: MergeOptions,
    now: DateTime<Utc>,
) -> Result<MergeOutcome> {
    let incoming = dedupe(incoming)?;
    let existing_by_id = existing.by_id();
    let mut stats = MergeStats::default();
    let mut created_ids = Vec::new();

    let mut merged: BTreeMap<&str, ItemRecord> = BTreeMap::new();
    for stub in &incoming {
        let record = match existing_by_id.get(stub.item_id.as_str()) {
            Some(current) => {
                let mut record = (*current).clone();
                record.refresh_from(stub, now);
                if options.preserve {
                    stats.preserved += 1;
                } else {
                    record.reset_curation();
                    stats.reset += 1;
                }
                record
            }
            None => {
                stats.created += 1;
                created_ids.push(stub.item_id.clone());
                ItemRecord::from_stub(stub, now)
            }
        };
        merged.insert(stub.item_id.as_str(), record);
    }

    let incoming_ids: HashSet<&str> = incoming.iter().map(|s| s.item_id.as_str()).collect();
    let mut items = Vec::with_capacity(existing.len() + stats.created);

    match options.mode {
        MergeMode::Rebuild => {
            stats.dropped = existing
                .items
                .iter()
                .filter(|r| !incoming_ids.contains(r.item_id.as_str()))
                .count();
            for stub in &incoming {
                if let Some(record) = merged.remove(stub.item_id.as_str()) {
                    items.push(record);
                }
            }
        }
        MergeMode::Update => {
            for current in &existing.items {
                match merged.remove(current.item_id.as_str()) {
                    Some(record) => items.push(record),
                    None => {
                        stats.retained += 1;
                        items.push(current.clone());
                    }
                }
            }
            for stub in &incoming {
                if let Some(record) = merged.remove(stub.item_id.as_str()) {
                    items.push(record);
                }
            }
        }
    }

    debug!(?options, ?stats, "merge complete");

    let collection = MasterCollection {
        total_count: items.len(),
        items,
        last_updated: existing.last_updated,
        source_url: existing.source_url.clone(),
    };
    Ok(MergeOutcome {
        collection,
        stats,
        created_ids,
    })
}

/// Collapse identical repeats of an id; differing repeats are a conflict
fn dedupe(incoming: &[ItemStub]) -> Result<Vec<&ItemStub>> {
    let mut first_seen: BTreeMap<&str, &ItemStub> = BTreeMap::new();
    let mut unique = Vec::with_capacity(incoming.len());
    for stub in incoming {
        if stub.item_id.trim().is_empty() {
            return Err(LedgerError::MergeConflict {
                item_id: stub.item_id.clone(),
                reason: format!("fetched item '{}' has an empty id", stub.title),
            });
        }
        match first_seen.get(stub.item_id.as_str()) {
            Some(previous) if *previous == stub => continue,
            Some(_) => {
                return Err(LedgerError::MergeConflict {
                    item_id: stub.item_id.clone(),
                    reason: "fetched twice with different metadata".to_string(),
                })
            }
            None => {
                first_seen.insert(stub.item_id.as_str(), stub);
                unique.push(stub);
            }
        }
    }
    Ok(unique)
}
