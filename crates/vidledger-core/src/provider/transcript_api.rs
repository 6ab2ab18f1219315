//! Transcripts from an HTTP transcript service
//!
//! The service answers `GET <endpoint>?id=<item_id>&url=<item_url>` with the
//! transcript body, or 404 when the item has none.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tempfile::NamedTempFile;

use super::http::{status_error, HttpClient};
use super::retry::RetryPolicy;
use crate::error::{ProviderError, ProviderErrorKind};

pub const STRATEGY: &str = "transcripts:api";

pub struct ApiTranscripts {
    http: Arc<dyn HttpClient>,
    endpoint: String,
    api_key: Option<String>,
    retry: RetryPolicy,
}

impl ApiTranscripts {
    pub fn new(
        http: Arc<dyn HttpClient>,
        endpoint: impl Into<String>,
        api_key: Option<String>,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            http,
            endpoint: endpoint.into(),
            api_key,
            retry,
        }
    }

    pub fn fetch(&self, item_id: &str, item_url: &str, dest: &Path) -> Result<PathBuf, ProviderError> {
        let response = self.retry.run("transcript request", || {
            let response = self
                .http
                .get(
                    &self.endpoint,
                    &[("id", item_id), ("url", item_url)],
                    self.api_key.as_deref(),
                )
                .map_err(|e| {
                    ProviderError::new(STRATEGY, ProviderErrorKind::NetworkError, e.message)
                })?;
            match response.status {
                404 => Err(not_available(item_id)),
                _ if response.is_success() => Ok(response),
                _ => Err(status_error(STRATEGY, &response)),
            }
        })?;

        if response.body.trim().is_empty() {
            return Err(not_available(item_id));
        }
        write_artifact(dest, response.body.as_bytes())?;
        Ok(dest.to_path_buf())
    }
}

impl ApiTranscripts {
    /// Whether the service holds a transcript for the item; 404 means no
    pub fn is_available(&self, item_id: &str, item_url: &str) -> Result<bool, ProviderError> {
        self.retry.run("transcript availability", || {
            let response = self
                .http
                .get(
                    &self.endpoint,
                    &[("id", item_id), ("url", item_url)],
                    self.api_key.as_deref(),
                )
                .map_err(|e| {
                    ProviderError::new(STRATEGY, ProviderErrorKind::NetworkError, e.message)
                })?;
            match response.status {
                404 => Ok(false),
                _ if response.is_success() => Ok(!response.body.trim().is_empty()),
                _ => Err(status_error(STRATEGY, &response)),
            }
        })
    }
}

fn not_available(item_id: &str) -> ProviderError {
    ProviderError::new(
        STRATEGY,
        ProviderErrorKind::NotAvailable,
        format!("no transcript for {}", item_id),
    )
}

/// Write via a sibling temp file so a partial body never lands at `dest`
fn write_artifact(dest: &Path, body: &[u8]) -> Result<(), ProviderError> {
    let io = |e: std::io::Error| {
        ProviderError::new(
            STRATEGY,
            ProviderErrorKind::NetworkError,
            format!("cannot write {}: {}", dest.display(), e),
        )
    };
    let dir = dest.parent().unwrap_or_else(|| Path::new("."));
    std::fs::create_dir_all(dir).map_err(io)?;
    let mut file = NamedTempFile::new_in(dir).map_err(io)?;
    file.write_all(body).map_err(io)?;
    file.persist(dest).map_err(|e| io(e.error))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::testing::FakeHttp;
    use tempfile::TempDir;

    const ENDPOINT: &str = "https://transcripts.example.com/v1/transcript";

    #[test]
    fn writes_body_as_artifact() {
        let temp = TempDir::new().unwrap();
        let dest = temp.path().join("t").join("abc.vtt");
        let http = Arc::new(FakeHttp::default());
        http.respond("transcript?id=abc", 200, "WEBVTT\n\n00:00.000 --> 00:01.000\nhi");

        let api = ApiTranscripts::new(http.clone(), ENDPOINT, Some("k".into()), RetryPolicy::immediate(0));
        api.fetch("abc", "https://youtu.be/abc", &dest).unwrap();

        assert!(std::fs::read_to_string(&dest).unwrap().starts_with("WEBVTT"));
        assert_eq!(http.calls_matching("transcript?url"), 1);
    }

    #[test]
    fn missing_and_empty_are_not_available() {
        let temp = TempDir::new().unwrap();
        let http = Arc::new(FakeHttp::default());
        http.respond("transcript?id=gone", 404, "");
        http.respond("transcript?id=blank", 200, "  \n");
        let api = ApiTranscripts::new(http, ENDPOINT, None, RetryPolicy::immediate(0));

        for id in ["gone", "blank"] {
            let dest = temp.path().join(format!("{}.vtt", id));
            let err = api.fetch(id, "https://youtu.be/x", &dest).unwrap_err();
            assert_eq!(err.kind, ProviderErrorKind::NotAvailable);
            assert!(!dest.exists());
        }
    }

    #[test]
    fn availability_follows_status() {
        let temp = TempDir::new().unwrap();
        let http = Arc::new(FakeHttp::default());
        http.respond("transcript?id=abc", 200, "WEBVTT\n");
        http.respond("transcript?id=gone", 404, "");
        let api = ApiTranscripts::new(http.clone(), ENDPOINT, None, RetryPolicy::immediate(0));

        assert!(api.is_available("abc", "https://youtu.be/abc").unwrap());
        assert!(!api.is_available("gone", "https://youtu.be/gone").unwrap());
        assert_eq!(http.calls().len(), 2);
        assert_eq!(std::fs::read_dir(temp.path()).unwrap().count(), 0);
    }

    #[test]
    fn server_errors_retry_then_fail() {
        let temp = TempDir::new().unwrap();
        let http = Arc::new(FakeHttp::default());
        http.respond("transcript", 503, "");
        let api = ApiTranscripts::new(http.clone(), ENDPOINT, None, RetryPolicy::immediate(2));

        let err = api
            .fetch("abc", "https://youtu.be/abc", &temp.path().join("abc.vtt"))
            .unwrap_err();
        assert_eq!(err.kind, ProviderErrorKind::NetworkError);
        assert_eq!(http.calls().len(), 3);
    }

    #[test]
    fn unauthorized_is_auth() {
        let temp = TempDir::new().unwrap();
        let http = Arc::new(FakeHttp::default());
        http.respond("transcript", 401, "{}");
        let api = ApiTranscripts::new(http, ENDPOINT, None, RetryPolicy::immediate(2));

        let err = api
            .fetch("abc", "https://youtu.be/abc", &temp.path().join("abc.vtt"))
            .unwrap_err();
        assert_eq!(err.kind, ProviderErrorKind::Auth);
    }
}
