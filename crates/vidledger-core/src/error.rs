use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

/// Kind of failure reported by a listing or transcript provider
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ProviderErrorKind {
    /// Provider quota exhausted for the current window
    Quota,
    /// Credentials rejected or missing on the provider side
    Auth,
    /// Channel, playlist or item does not exist
    NotFound,
    /// Provider asked us to slow down
    RateLimited,
    /// Transport failure, timeout or provider-side 5xx
    NetworkError,
    /// Response could not be decoded
    ParseError,
    /// Item exists but has no transcript
    NotAvailable,
}

impl ProviderErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Quota => "quota",
            Self::Auth => "auth",
            Self::NotFound => "not-found",
            Self::RateLimited => "rate-limited",
            Self::NetworkError => "network",
            Self::ParseError => "parse",
            Self::NotAvailable => "not-available",
        }
    }

    /// Only transport-level failures are worth repeating within the same strategy
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::NetworkError)
    }
}

impl fmt::Display for ProviderErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Failure of a single provider call, tagged with the strategy that produced it
#[derive(Debug, Clone, Error)]
#[error("{strategy} provider failed ({kind}): {message}")]
pub struct ProviderError {
    pub strategy: &'static str,
    pub kind: ProviderErrorKind,
    pub message: String,
}

impl ProviderError {
    pub fn new(strategy: &'static str, kind: ProviderErrorKind, message: impl Into<String>) -> Self {
        Self {
            strategy,
            kind,
            message: message.into(),
        }
    }
}

#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("Configuration error in '{field}': {reason}")]
    Configuration { field: String, reason: String },

    #[error(transparent)]
    Provider(#[from] ProviderError),

    #[error("Merge conflict for item '{item_id}': {reason}")]
    MergeConflict { item_id: String, reason: String },

    #[error("Refusing to drop {would_drop} item(s): {reason} (use --force to rebuild anyway)")]
    AmbiguousInventory { would_drop: usize, reason: String },

    #[error("Master list not found: {path}")]
    StoreMissing { path: PathBuf },

    #[error("Master list is corrupt: {path}: {message}")]
    StoreCorrupt { path: PathBuf, message: String },

    #[error("Failed to write master list {path}: {source}")]
    StoreWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write backup {path}: {source}")]
    BackupWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Backup already exists, refusing to overwrite: {path}")]
    BackupCollision { path: PathBuf },

    #[error("Backup not found: {name}")]
    BackupNotFound { name: String },

    #[error("Item not found: {item_id}")]
    ItemNotFound { item_id: String },

    #[error("Invalid relevance score {value} - must be between 1 and 10")]
    InvalidRelevance { value: i64 },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML serialization error: {0}")]
    TomlSer(#[from] toml::ser::Error),

    #[error("TOML deserialization error: {0}")]
    TomlDe(#[from] toml::de::Error),
}

pub type Result<T> = std::result::Result<T, LedgerError>;

impl LedgerError {
    pub fn configuration(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Configuration {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// Process exit code for this error class
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Configuration { .. } | Self::TomlDe(_) => 2,
            Self::Provider(_) | Self::AmbiguousInventory { .. } => 3,
            Self::StoreWrite { .. }
            | Self::StoreCorrupt { .. }
            | Self::BackupWrite { .. }
            | Self::BackupCollision { .. } => 4,
            _ => 1,
        }
    }
}
