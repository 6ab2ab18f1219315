//! Human curation of master list items
//!
//! These functions edit curated fields in memory; persisting is up to the
//! caller (see [`crate::pipeline::Orchestrator::curate`]).

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};

use crate::error::{LedgerError, Result};
use crate::model::{ItemRecord, ItemStatus, MasterCollection, MAX_RELEVANCE, MIN_RELEVANCE};

/// Relevance given by [`mark_priority`] when none is supplied
pub const PRIORITY_RELEVANCE: u8 = 10;
const PRIORITY_NOTE: &str = "Priority video";
const RECENT_LIMIT: usize = 5;

/// Check a user-supplied relevance score
pub fn relevance(value: i64) -> Result<u8> {
    if (i64::from(MIN_RELEVANCE)..=i64::from(MAX_RELEVANCE)).contains(&value) {
        Ok(value as u8)
    } else {
        Err(LedgerError::InvalidRelevance { value })
    }
}

fn record_mut<'a>(collection: &'a mut MasterCollection, item_id: &str) -> Result<&'a mut ItemRecord> {
    collection
        .get_mut(item_id)
        .ok_or_else(|| LedgerError::ItemNotFound {
            item_id: item_id.to_string(),
        })
}

/// Assign categories (replacing any previous ones) and mark the item reviewed
pub fn categorize(
    collection: &mut MasterCollection,
    item_id: &str,
    categories: &[String],
    relevance_score: Option<i64>,
    notes: Option<&str>,
) -> Result<()> {
    let score = relevance_score.map(relevance).transpose()?;
    let record = record_mut(collection, item_id)?;
    record.categories = categories
        .iter()
        .map(|c| c.trim().to_string())
        .filter(|c| !c.is_empty())
        .collect();
    if let Some(score) = score {
        record.relevance_score = Some(score);
    }
    if let Some(notes) = notes.filter(|n| !n.is_empty()) {
        record.notes = notes.to_string();
    }
    record.status = ItemStatus::Categorized;
    record.needs_review = false;
    Ok(())
}

/// Categorize under a single category with a high relevance
pub fn mark_priority(
    collection: &mut MasterCollection,
    item_id: &str,
    category: &str,
    relevance_score: Option<i64>,
) -> Result<()> {
    categorize(
        collection,
        item_id,
        &[category.to_string()],
        Some(relevance_score.unwrap_or(i64::from(PRIORITY_RELEVANCE))),
        Some(PRIORITY_NOTE),
    )
}

pub fn set_key_topics(collection: &mut MasterCollection, item_id: &str, topics: &[String]) -> Result<()> {
    let record = record_mut(collection, item_id)?;
    record.key_topics = topics
        .iter()
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
        .collect();
    record.needs_review = false;
    Ok(())
}

pub fn archive(collection: &mut MasterCollection, item_id: &str) -> Result<()> {
    let record = record_mut(collection, item_id)?;
    record.status = ItemStatus::Archived;
    record.needs_review = false;
    Ok(())
}

pub fn list_uncategorized(collection: &MasterCollection) -> Vec<&ItemRecord> {
    collection
        .items
        .iter()
        .filter(|r| r.status == ItemStatus::Uncategorized)
        .collect()
}

/// Answer for one item during [`review`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReviewDecision {
    Categorize {
        categories: Vec<String>,
        relevance: Option<i64>,
        notes: Option<String>,
    },
    Skip,
    Quit,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReviewSummary {
    /// Uncategorized items when the review started
    pub pending: usize,
    pub categorized: usize,
    pub skipped: usize,
}

/// Walk uncategorized items in list order, asking `decide` about each one.
///
/// `decide` gets the 1-based position, the number pending, and the record.
/// A categorize answer without any category counts as a skip.
pub fn review<F>(collection: &mut MasterCollection, mut decide: F) -> Result<ReviewSummary>
where
    F: FnMut(usize, usize, &ItemRecord) -> Result<ReviewDecision>,
{
    let ids: Vec<String> = list_uncategorized(collection)
        .into_iter()
        .map(|r| r.item_id.clone())
        .collect();
    let mut summary = ReviewSummary {
        pending: ids.len(),
        ..ReviewSummary::default()
    };

    for (index, item_id) in ids.iter().enumerate() {
        let decision = match collection.get(item_id) {
            Some(record) => decide(index + 1, ids.len(), record)?,
            None => continue,
        };
        match decision {
            ReviewDecision::Quit => break,
            ReviewDecision::Categorize {
                categories,
                relevance,
                notes,
            } if categories.iter().any(|c| !c.trim().is_empty()) => {
                categorize(collection, item_id, &categories, relevance, notes.as_deref())?;
                summary.categorized += 1;
            }
            _ => summary.skipped += 1,
        }
    }
    Ok(summary)
}

/// Overview of a collection's curation state
#[derive(Debug, Clone, PartialEq)]
pub struct CurationReport {
    pub total: usize,
    pub last_updated: Option<DateTime<Utc>>,
    pub source_url: String,
    pub needs_review: usize,
    pub by_status: BTreeMap<ItemStatus, usize>,
    /// Includes configured default categories even when unused
    pub by_category: BTreeMap<String, usize>,
    pub average_relevance: Option<f64>,
    pub scored: usize,
    /// Most recent uploads first
    pub recent: Vec<ItemRecord>,
}

pub fn report(collection: &MasterCollection, default_categories: &[String]) -> CurationReport {
    let mut by_status = BTreeMap::new();
    let mut by_category: BTreeMap<String, usize> = default_categories
        .iter()
        .map(|c| (c.clone(), 0))
        .collect();
    for record in &collection.items {
        *by_status.entry(record.status).or_insert(0) += 1;
        for category in &record.categories {
            *by_category.entry(category.clone()).or_insert(0) += 1;
        }
    }

    let scores: Vec<u8> = collection
        .items
        .iter()
        .filter_map(|r| r.relevance_score)
        .collect();
    let average_relevance = if scores.is_empty() {
        None
    } else {
        Some(scores.iter().map(|&s| f64::from(s)).sum::<f64>() / scores.len() as f64)
    };

    let mut recent: Vec<ItemRecord> = collection.items.clone();
    // Stable sort keeps provider order among equal dates
    recent.sort_by(|a, b| b.upload_date.cmp(&a.upload_date));
    recent.truncate(RECENT_LIMIT);

    CurationReport {
        total: collection.len(),
        last_updated: collection.last_updated,
        source_url: collection.source_url.clone(),
        needs_review: collection.items.iter().filter(|r| r.needs_review).count(),
        by_status,
        by_category,
        average_relevance,
        scored: scores.len(),
        recent,
    }
}
