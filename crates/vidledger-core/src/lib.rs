pub mod backup;
pub mod config;
pub mod curate;
pub mod error;
pub mod merge;
pub mod model;
pub mod pipeline;
pub mod provider;
pub mod store;
pub mod transcript;

pub use backup::{BackupManager, BackupSnapshot, RestoreOutcome};
pub use config::{
    ConfigFile, ConfigSpec, Environment, ListingConfig, NetworkSpec, TranscriptConfig,
};
pub use curate::{CurationReport, ReviewDecision, ReviewSummary};
pub use error::{LedgerError, ProviderError, ProviderErrorKind, Result};
pub use merge::{merge, MergeMode, MergeOptions, MergeOutcome, MergeStats};
pub use model::{ItemRecord, ItemStatus, ItemStub, MasterCollection};
pub use pipeline::{
    load_spec, Clock, Orchestrator, RebuildOptions, RebuildReport, TranscriptRunReport,
    UpdateOptions, UpdateReport,
};
pub use provider::{Backends, ChannelListing, TranscriptRetrieval};
pub use store::MasterListStore;
pub use transcript::{BatchReport, FetchOutcome, TranscriptService, TranscriptStats};
