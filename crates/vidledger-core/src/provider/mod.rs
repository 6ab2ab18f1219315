//! Provider strategies for listing items and retrieving transcripts
//!
//! Each concern has exactly one active strategy, chosen once from the
//! validated [`ConfigSpec`]. A failing strategy surfaces its error; nothing
//! here re-dispatches to the sibling strategy.

mod command;
mod http;
mod listing_api;
mod listing_tool;
mod retry;
mod transcript_api;
mod transcript_tool;

#[cfg(test)]
pub(crate) mod testing;

use std::path::{Path, PathBuf};
use std::sync::Arc;

pub use command::{CommandError, CommandOutput, CommandRunner, SystemRunner};
pub use http::{classify_status, HttpClient, HttpResponse, ReqwestClient, TransportError};
pub use listing_api::ApiListing;
pub use listing_tool::{ToolListing, ToolOptions};
pub use retry::RetryPolicy;
pub use transcript_api::ApiTranscripts;
pub use transcript_tool::ToolTranscripts;

use crate::config::{ConfigSpec, ListingConfig, NetworkSpec, TranscriptConfig};
use crate::error::{ProviderError, Result};
use crate::model::ItemStub;

/// I/O backends the strategies are built on
#[derive(Clone)]
pub struct Backends {
    pub http: Arc<dyn HttpClient>,
    pub runner: Arc<dyn CommandRunner>,
}

impl Backends {
    /// reqwest for HTTP, `std::process` for the extraction tool
    pub fn system(network: &NetworkSpec) -> Result<Self> {
        Ok(Self {
            http: Arc::new(ReqwestClient::new(network)?),
            runner: Arc::new(SystemRunner),
        })
    }
}

fn tool_options(network: &NetworkSpec) -> ToolOptions {
    ToolOptions {
        program: network.extractor.clone(),
        cookies_file: network.cookies_file.clone(),
        proxy: network.proxy.clone(),
        timeout: network.timeout,
    }
}

/// The single configured listing strategy
pub enum ChannelListing {
    Api(ApiListing),
    Tool(ToolListing),
}

impl ChannelListing {
    pub fn from_config(spec: &ConfigSpec, backends: &Backends) -> Self {
        let retry = RetryPolicy::from_network(&spec.network);
        match &spec.listing {
            ListingConfig::Api { api_key, base_url } => Self::Api(ApiListing::new(
                backends.http.clone(),
                api_key.clone(),
                base_url.clone(),
                retry,
            )),
            ListingConfig::Tool => Self::Tool(ToolListing::new(
                backends.runner.clone(),
                tool_options(&spec.network),
                retry,
            )),
        }
    }

    pub fn strategy(&self) -> &'static str {
        match self {
            Self::Api(_) => listing_api::STRATEGY,
            Self::Tool(_) => listing_tool::STRATEGY,
        }
    }

    /// Newest-first stubs, at most `max_items`
    pub fn fetch_all(
        &self,
        source_url: &str,
        max_items: usize,
    ) -> std::result::Result<Vec<ItemStub>, ProviderError> {
        match self {
            Self::Api(api) => api.fetch_all(source_url, max_items),
            Self::Tool(tool) => tool.fetch_all(source_url, max_items),
        }
    }
}

/// The single configured transcript strategy
pub enum TranscriptRetrieval {
    Tool(ToolTranscripts),
    Api(ApiTranscripts),
}

impl TranscriptRetrieval {
    pub fn from_config(spec: &ConfigSpec, backends: &Backends) -> Self {
        let retry = RetryPolicy::from_network(&spec.network);
        match &spec.transcripts {
            TranscriptConfig::Tool => Self::Tool(ToolTranscripts::new(
                backends.runner.clone(),
                tool_options(&spec.network),
                retry,
            )),
            TranscriptConfig::Api { endpoint, api_key } => Self::Api(ApiTranscripts::new(
                backends.http.clone(),
                endpoint.clone(),
                api_key.clone(),
                retry,
            )),
        }
    }

    pub fn strategy(&self) -> &'static str {
        match self {
            Self::Tool(_) => transcript_tool::STRATEGY,
            Self::Api(_) => transcript_api::STRATEGY,
        }
    }

    pub fn fetch(
        &self,
        item_id: &str,
        item_url: &str,
        dest: &Path,
    ) -> std::result::Result<PathBuf, ProviderError> {
        match self {
            Self::Tool(tool) => tool.fetch(item_id, item_url, dest),
            Self::Api(api) => api.fetch(item_id, item_url, dest),
        }
    }

    /// Whether a transcript could be fetched, without writing one
    pub fn is_available(
        &self,
        item_id: &str,
        item_url: &str,
    ) -> std::result::Result<bool, ProviderError> {
        match self {
            Self::Tool(tool) => tool.is_available(item_id, item_url),
            Self::Api(api) => api.is_available(item_id, item_url),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ConfigFile, Environment};
    use crate::error::ProviderErrorKind;
    use crate::provider::testing::{FakeHttp, FakeRunner};
    use tempfile::TempDir;

    fn spec(listing: &str, transcripts: &str) -> (TempDir, ConfigSpec) {
        let temp = TempDir::new().unwrap();
        let mut file = ConfigFile::default();
        file.listing.strategy = listing.to_string();
        file.listing.source_url = "https://www.youtube.com/@someone".to_string();
        file.transcripts.strategy = transcripts.to_string();
        file.transcripts.api_endpoint = Some("https://transcripts.example.com/t".to_string());
        file.network.max_retries = 0;
        let env = Environment::from_pairs([("YOUTUBE_API_KEY", "key")]);
        let spec = ConfigSpec::validate(temp.path(), &file, &env).unwrap();
        (temp, spec)
    }

    fn fakes() -> (Arc<FakeHttp>, Arc<FakeRunner>, Backends) {
        let http = Arc::new(FakeHttp::default());
        let runner = Arc::new(FakeRunner::default());
        let backends = Backends {
            http: http.clone(),
            runner: runner.clone(),
        };
        (http, runner, backends)
    }

    #[test]
    fn api_listing_failure_does_not_touch_tool() {
        let (_temp, spec) = spec("api", "tool");
        let (http, runner, backends) = fakes();
        http.respond("channels", 403, r#"{"error":{"errors":[{"reason":"quotaExceeded"}]}}"#);

        let listing = ChannelListing::from_config(&spec, &backends);
        assert_eq!(listing.strategy(), "listing:api");
        let err = listing.fetch_all(&spec.source_url, 10).unwrap_err();
        assert_eq!(err.kind, ProviderErrorKind::Quota);
        assert_eq!(err.strategy, "listing:api");
        assert_eq!(runner.call_count(), 0);
    }

    #[test]
    fn tool_listing_failure_does_not_touch_api() {
        let (_temp, spec) = spec("tool", "tool");
        let (http, runner, backends) = fakes();
        runner.push_failure(1, "ERROR: This channel does not exist.");

        let listing = ChannelListing::from_config(&spec, &backends);
        let err = listing.fetch_all(&spec.source_url, 10).unwrap_err();
        assert_eq!(err.kind, ProviderErrorKind::NotFound);
        assert_eq!(err.strategy, "listing:tool");
        assert!(http.calls().is_empty());
    }

    #[test]
    fn transcript_strategies_stay_separate() {
        let (temp, spec) = spec("tool", "api");
        let (http, runner, backends) = fakes();
        http.respond("t", 404, "");

        let retrieval = TranscriptRetrieval::from_config(&spec, &backends);
        assert_eq!(retrieval.strategy(), "transcripts:api");
        let err = retrieval
            .fetch("abc", "https://youtu.be/abc", &temp.path().join("abc.vtt"))
            .unwrap_err();
        assert_eq!(err.kind, ProviderErrorKind::NotAvailable);
        assert_eq!(runner.call_count(), 0);
    }

    #[test]
    fn availability_uses_configured_strategy_only() {
        let (_tool_temp, tool_spec) = spec("tool", "tool");
        let (_api_temp, api_spec) = spec("tool", "api");

        let (http, runner, backends) = fakes();
        runner.push_failure(1, "ERROR: HTTP Error 429: Too Many Requests");
        let retrieval = TranscriptRetrieval::from_config(&tool_spec, &backends);
        let err = retrieval.is_available("abc", "https://youtu.be/abc").unwrap_err();
        assert_eq!(err.strategy, "transcripts:tool");
        assert_eq!(err.kind, ProviderErrorKind::RateLimited);
        assert!(http.calls().is_empty());

        let (http, runner, backends) = fakes();
        http.respond("t", 404, "");
        let retrieval = TranscriptRetrieval::from_config(&api_spec, &backends);
        assert!(!retrieval.is_available("abc", "https://youtu.be/abc").unwrap());
        assert_eq!(runner.call_count(), 0);
    }
}
