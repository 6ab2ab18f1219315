//! Master list data types
//!
//! An [`ItemRecord`] mixes two kinds of fields:
//!
//! - **refreshable**: overwritten from the upstream provider on every fetch
//! - **curated**: owned by a human and carried across refreshes
//!
//! [`ItemStub`] is what a provider hands back and only carries the former.

use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::fmt;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub const MIN_RELEVANCE: u8 = 1;
pub const MAX_RELEVANCE: u8 = 10;

/// Descriptions are clipped to this many characters when fetched
pub const DESCRIPTION_LIMIT: usize = 500;

/// Curation state of an item
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemStatus {
    #[default]
    Uncategorized,
    Categorized,
    Archived,
}

impl ItemStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Uncategorized => "uncategorized",
            Self::Categorized => "categorized",
            Self::Archived => "archived",
        }
    }
}

impl fmt::Display for ItemStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Freshly fetched item as reported by a listing provider
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemStub {
    pub item_id: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub upload_date: String,
    pub url: String,
    #[serde(default)]
    pub duration: Option<u64>,
}

impl ItemStub {
    pub fn new(item_id: impl Into<String>, title: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            item_id: item_id.into(),
            title: title.into(),
            description: String::new(),
            upload_date: String::new(),
            url: url.into(),
            duration: None,
        }
    }
}

/// One entry of the master list
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemRecord {
    pub item_id: String,

    // Refreshable
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub upload_date: String,
    pub url: String,
    #[serde(default)]
    pub duration: Option<u64>,
    #[serde(default)]
    pub last_checked: Option<DateTime<Utc>>,
    #[serde(default)]
    pub auto_detected: bool,

    // Curated
    #[serde(default)]
    pub categories: BTreeSet<String>,
    #[serde(default)]
    pub relevance_score: Option<u8>,
    #[serde(default)]
    pub key_topics: Vec<String>,
    #[serde(default)]
    pub notes: String,
    #[serde(default)]
    pub transcript_file: Option<PathBuf>,
    #[serde(default)]
    pub status: ItemStatus,

    #[serde(default)]
    pub needs_review: bool,
}

impl ItemRecord {
    /// Create a never-touched record from a fetched stub
    pub fn from_stub(stub: &ItemStub, now: DateTime<Utc>) -> Self {
        let mut record = Self {
            item_id: stub.item_id.clone(),
            title: String::new(),
            description: String::new(),
            upload_date: String::new(),
            url: String::new(),
            duration: None,
            last_checked: None,
            auto_detected: true,
            categories: BTreeSet::new(),
            relevance_score: None,
            key_topics: Vec::new(),
            notes: String::new(),
            transcript_file: None,
            status: ItemStatus::Uncategorized,
            needs_review: true,
        };
        record.refresh_from(stub, now);
        record
    }

    /// Overwrite refreshable fields, leaving curated ones alone
    pub fn refresh_from(&mut self, stub: &ItemStub, now: DateTime<Utc>) {
        self.title = stub.title.clone();
        self.description = stub.description.clone();
        self.upload_date = stub.upload_date.clone();
        self.url = stub.url.clone();
        self.duration = stub.duration;
        self.last_checked = Some(now);
        self.auto_detected = true;
    }

    /// Put every curated field back to its default
    pub fn reset_curation(&mut self) {
        self.categories.clear();
        self.relevance_score = None;
        self.key_topics.clear();
        self.notes.clear();
        self.transcript_file = None;
        self.status = ItemStatus::Uncategorized;
        self.needs_review = true;
    }

    /// True when any curated field differs from its default
    pub fn has_curation(&self) -> bool {
        !self.categories.is_empty()
            || self.relevance_score.is_some()
            || !self.key_topics.is_empty()
            || !self.notes.is_empty()
            || self.transcript_file.is_some()
            || self.status != ItemStatus::Uncategorized
    }
}

/// The persisted master list for one channel
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MasterCollection {
    pub items: Vec<ItemRecord>,
    #[serde(default)]
    pub last_updated: Option<DateTime<Utc>>,
    #[serde(default)]
    pub total_count: usize,
    #[serde(default)]
    pub source_url: String,
}

impl MasterCollection {
    pub fn new(source_url: impl Into<String>) -> Self {
        Self {
            items: Vec::new(),
            last_updated: None,
            total_count: 0,
            source_url: source_url.into(),
        }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn get(&self, item_id: &str) -> Option<&ItemRecord> {
        self.items.iter().find(|r| r.item_id == item_id)
    }

    pub fn get_mut(&mut self, item_id: &str) -> Option<&mut ItemRecord> {
        self.items.iter_mut().find(|r| r.item_id == item_id)
    }

    pub fn contains(&self, item_id: &str) -> bool {
        self.get(item_id).is_some()
    }

    /// Index of records by id, for order-independent comparison and lookup
    pub fn by_id(&self) -> BTreeMap<&str, &ItemRecord> {
        self.items
            .iter()
            .map(|r| (r.item_id.as_str(), r))
            .collect()
    }

    /// Stamp collection-level metadata before persisting
    pub fn touch(&mut self, now: DateTime<Utc>) {
        self.last_updated = Some(now);
        self.total_count = self.items.len();
    }

    /// Check the structural invariants a loaded document must satisfy
    pub fn check_invariants(&self) -> std::result::Result<(), String> {
        let mut seen = HashSet::new();
        for record in &self.items {
            if record.item_id.is_empty() {
                return Err("record with empty item_id".to_string());
            }
            if !seen.insert(record.item_id.as_str()) {
                return Err(format!("duplicate item_id '{}'", record.item_id));
            }
            if let Some(score) = record.relevance_score {
                if !(MIN_RELEVANCE..=MAX_RELEVANCE).contains(&score) {
                    return Err(format!(
                        "relevance_score {} out of range for '{}'",
                        score, record.item_id
                    ));
                }
            }
        }
        Ok(())
    }
}

/// Normalise provider dates (`20240131`, `2024-01-31T10:00:00Z`) to `YYYY-MM-DD`
pub fn normalize_upload_date(raw: &str) -> String {
    let raw = raw.trim();
    if raw.len() == 8 && raw.chars().all(|c| c.is_ascii_digit()) {
        return format!("{}-{}-{}", &raw[..4], &raw[4..6], &raw[6..]);
    }
    if raw.len() >= 10 && raw.is_char_boundary(10) && raw.as_bytes()[4] == b'-' {
        return raw[..10].to_string();
    }
    raw.to_string()
}

/// Clip a provider description to [`DESCRIPTION_LIMIT`] characters
pub fn clip_description(raw: &str) -> String {
    raw.chars().take(DESCRIPTION_LIMIT).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stub(id: &str) -> ItemStub {
        ItemStub::new(id, format!("Title {}", id), format!("https://example.com/{}", id))
    }

    #[test]
    fn from_stub_is_untouched() {
        let record = ItemRecord::from_stub(&stub("v1"), Utc::now());
        assert_eq!(record.status, ItemStatus::Uncategorized);
        assert!(record.needs_review);
        assert!(record.auto_detected);
        assert!(!record.has_curation());
    }

    #[test]
    fn refresh_keeps_curation() {
        let mut record = ItemRecord::from_stub(&stub("v1"), Utc::now());
        record.categories.insert("theology".into());
        record.relevance_score = Some(9);

        let mut newer = stub("v1");
        newer.title = "Renamed".into();
        record.refresh_from(&newer, Utc::now());

        assert_eq!(record.title, "Renamed");
        assert!(record.categories.contains("theology"));
        assert_eq!(record.relevance_score, Some(9));
    }

    #[test]
    fn reset_curation_clears_everything() {
        let mut record = ItemRecord::from_stub(&stub("v1"), Utc::now());
        record.categories.insert("debate".into());
        record.notes = "keep".into();
        record.status = ItemStatus::Categorized;
        record.needs_review = false;
        record.reset_curation();
        assert!(!record.has_curation());
        assert!(record.needs_review);
    }

    #[test]
    fn invariants_reject_duplicates_and_bad_scores() {
        let mut collection = MasterCollection::new("https://example.com");
        collection.items.push(ItemRecord::from_stub(&stub("v1"), Utc::now()));
        assert!(collection.check_invariants().is_ok());

        collection.items.push(ItemRecord::from_stub(&stub("v1"), Utc::now()));
        assert!(collection.check_invariants().is_err());

        collection.items.pop();
        collection.items[0].relevance_score = Some(11);
        assert!(collection.check_invariants().is_err());
    }

    #[test]
    fn absent_curated_fields_serialize_as_null() {
        let record = ItemRecord::from_stub(&stub("v1"), Utc::now());
        let json = serde_json::to_value(&record).unwrap();
        assert!(json["relevance_score"].is_null());
        assert!(json["transcript_file"].is_null());
        assert_eq!(json["status"], "uncategorized");
    }

    #[test]
    fn upload_dates_are_normalized() {
        assert_eq!(normalize_upload_date("20240131"), "2024-01-31");
        assert_eq!(normalize_upload_date("2024-01-31T10:00:00Z"), "2024-01-31");
        assert_eq!(normalize_upload_date(""), "");
    }
}
