//! Transcript downloads for master list items
//!
//! Downloads run on a bounded rayon pool. Each worker only sees its own job
//! and reports an outcome; outcomes are applied to the collection by
//! `item_id` once every worker is done, so completion order never matters.

use std::path::{Path, PathBuf};

use rayon::prelude::*;
use rayon::ThreadPoolBuilder;
use sha2::{Digest, Sha256};
use tracing::{debug, info, warn};

use crate::error::{LedgerError, ProviderError, ProviderErrorKind, Result};
use crate::model::{ItemRecord, MasterCollection};
use crate::provider::TranscriptRetrieval;

const ARTIFACT_EXTENSION: &str = "vtt";
const HASHED_KEY_LEN: usize = 16;

/// What happened to one item
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchOutcome {
    /// Artifact already present, provider not called
    Skipped(PathBuf),
    Downloaded(PathBuf),
    Unavailable,
    Failed(ProviderErrorKind, String),
}

/// Summary of a batch
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchReport {
    pub downloaded: usize,
    pub skipped: usize,
    pub unavailable: usize,
    pub failed: Vec<(String, ProviderErrorKind)>,
}

impl BatchReport {
    pub fn attempted(&self) -> usize {
        self.downloaded + self.skipped + self.unavailable + self.failed.len()
    }

    pub fn has_failures(&self) -> bool {
        !self.failed.is_empty()
    }
}

/// Transcript coverage of a collection
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TranscriptStats {
    pub total: usize,
    pub with_transcript: usize,
    pub file_present: usize,
    pub without_transcript: usize,
}

struct Job {
    item_id: String,
    url: String,
    current: Option<PathBuf>,
}

pub struct TranscriptService {
    retrieval: TranscriptRetrieval,
    dir: PathBuf,
    concurrency: usize,
}

impl TranscriptService {
    pub fn new(retrieval: TranscriptRetrieval, dir: impl Into<PathBuf>, concurrency: usize) -> Self {
        Self {
            retrieval,
            dir: dir.into(),
            concurrency: concurrency.max(1),
        }
    }

    pub fn strategy(&self) -> &'static str {
        self.retrieval.strategy()
    }

    /// `<dir>/<key>.vtt`, one file per item id
    pub fn artifact_path(&self, item_id: &str) -> PathBuf {
        self.dir
            .join(format!("{}.{}", artifact_key(item_id), ARTIFACT_EXTENSION))
    }

    /// Fetch one item unless its artifact already exists
    pub fn fetch_one(&self, record: &ItemRecord, force: bool) -> FetchOutcome {
        self.run_job(
            &Job {
                item_id: record.item_id.clone(),
                url: record.url.clone(),
                current: record.transcript_file.clone(),
            },
            force,
        )
    }

    /// Ask the provider whether the item has a transcript; nothing is written
    pub fn is_available(&self, record: &ItemRecord) -> std::result::Result<bool, ProviderError> {
        let available = self.retrieval.is_available(&record.item_id, &record.url)?;
        info!(item_id = %record.item_id, strategy = self.strategy(), available, "transcript availability checked");
        Ok(available)
    }

    fn run_job(&self, job: &Job, force: bool) -> FetchOutcome {
        if !force {
            if let Some(existing) = job.current.as_ref().filter(|p| p.is_file()) {
                debug!(item_id = %job.item_id, "transcript already present");
                return FetchOutcome::Skipped(existing.clone());
            }
        }

        let dest = self.artifact_path(&job.item_id);
        match self.retrieval.fetch(&job.item_id, &job.url, &dest) {
            Ok(path) => {
                info!(item_id = %job.item_id, path = %path.display(), "transcript downloaded");
                FetchOutcome::Downloaded(path)
            }
            Err(e) if e.kind == ProviderErrorKind::NotAvailable => {
                info!(item_id = %job.item_id, "no transcript available");
                FetchOutcome::Unavailable
            }
            Err(e) => {
                warn!(item_id = %job.item_id, strategy = e.strategy, kind = %e.kind, "transcript failed: {}", e.message);
                FetchOutcome::Failed(e.kind, e.message)
            }
        }
    }

    /// Records to work on: the named ids, or every record still missing a transcript
    pub fn select(
        &self,
        collection: &MasterCollection,
        ids: &[String],
        max: Option<usize>,
        force: bool,
    ) -> Result<Vec<String>> {
        let mut selected: Vec<String> = if ids.is_empty() {
            collection
                .items
                .iter()
                .filter(|r| force || !has_artifact(r))
                .map(|r| r.item_id.clone())
                .collect()
        } else {
            let mut named = Vec::new();
            for id in ids {
                if !collection.contains(id) {
                    return Err(LedgerError::ItemNotFound {
                        item_id: id.clone(),
                    });
                }
                if !named.contains(id) {
                    named.push(id.clone());
                }
            }
            named
        };
        if let Some(max) = max {
            selected.truncate(max);
        }
        Ok(selected)
    }

    /// Fetch transcripts for `ids` in parallel and record the results on `collection`
    pub fn run_batch(
        &self,
        collection: &mut MasterCollection,
        ids: &[String],
        force: bool,
    ) -> Result<BatchReport> {
        let jobs: Vec<Job> = ids
            .iter()
            .filter_map(|id| collection.get(id))
            .map(|r| Job {
                item_id: r.item_id.clone(),
                url: r.url.clone(),
                current: r.transcript_file.clone(),
            })
            .collect();
        if jobs.is_empty() {
            return Ok(BatchReport::default());
        }

        let pool = ThreadPoolBuilder::new()
            .num_threads(self.concurrency.min(jobs.len()))
            .thread_name(|idx| format!("transcripts-{}", idx))
            .build()
            .map_err(|e| LedgerError::configuration("transcripts.concurrency", e.to_string()))?;

        info!(
            strategy = self.strategy(),
            items = jobs.len(),
            workers = self.concurrency.min(jobs.len()),
            "fetching transcripts"
        );
        let outcomes: Vec<(String, FetchOutcome)> = pool.install(|| {
            jobs.par_iter()
                .map(|job| (job.item_id.clone(), self.run_job(job, force)))
                .collect()
        });

        Ok(apply_outcomes(collection, outcomes))
    }

    pub fn stats(&self, collection: &MasterCollection) -> TranscriptStats {
        stats(collection)
    }

    pub fn missing<'a>(&self, collection: &'a MasterCollection) -> Vec<&'a ItemRecord> {
        missing(collection)
    }
}

/// Record outcomes on the matching records and tally them
fn apply_outcomes(collection: &mut MasterCollection, outcomes: Vec<(String, FetchOutcome)>) -> BatchReport {
    let mut report = BatchReport::default();
    for (item_id, outcome) in outcomes {
        match outcome {
            FetchOutcome::Skipped(_) => report.skipped += 1,
            FetchOutcome::Downloaded(path) => {
                if let Some(record) = collection.get_mut(&item_id) {
                    record.transcript_file = Some(path);
                }
                report.downloaded += 1;
            }
            FetchOutcome::Unavailable => report.unavailable += 1,
            FetchOutcome::Failed(kind, _) => report.failed.push((item_id, kind)),
        }
    }
    report.failed.sort();
    report
}

fn has_artifact(record: &ItemRecord) -> bool {
    record.transcript_file.as_deref().is_some_and(Path::is_file)
}

pub fn stats(collection: &MasterCollection) -> TranscriptStats {
    let with_transcript = collection
        .items
        .iter()
        .filter(|r| r.transcript_file.is_some())
        .count();
    TranscriptStats {
        total: collection.len(),
        with_transcript,
        file_present: collection.items.iter().filter(|r| has_artifact(r)).count(),
        without_transcript: collection.len() - with_transcript,
    }
}

/// Records whose transcript is unset or points at a missing file
pub fn missing(collection: &MasterCollection) -> Vec<&ItemRecord> {
    collection.items.iter().filter(|r| !has_artifact(r)).collect()
}

/// File name stem for an item: the id when it is path-safe, else a hash of it
pub fn artifact_key(item_id: &str) -> String {
    let safe = !item_id.is_empty()
        && item_id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
    if safe {
        item_id.to_string()
    } else {
        let digest = Sha256::digest(item_id.as_bytes());
        hex::encode(digest)[..HASHED_KEY_LEN].to_string()
    }
}
