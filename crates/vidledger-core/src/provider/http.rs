//! HTTP seam used by the API strategies

use reqwest::blocking::Client;
use thiserror::Error;

use crate::config::NetworkSpec;
use crate::error::{LedgerError, ProviderError, ProviderErrorKind, Result};

/// Raw response: status and body text
#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: u16,
    pub body: String,
}

impl HttpResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Request never produced a response (connect failure, timeout, broken body)
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct TransportError {
    pub message: String,
}

/// Minimal GET interface the providers need
pub trait HttpClient: Send + Sync {
    fn get(
        &self,
        url: &str,
        query: &[(&str, &str)],
        bearer: Option<&str>,
    ) -> std::result::Result<HttpResponse, TransportError>;
}

/// Blocking reqwest client with the configured timeout and proxy
pub struct ReqwestClient {
    client: Client,
}

impl ReqwestClient {
    pub fn new(network: &NetworkSpec) -> Result<Self> {
        let mut builder = Client::builder()
            .timeout(network.timeout)
            .user_agent(concat!("vidledger/", env!("CARGO_PKG_VERSION")));

        if let Some(proxy) = &network.proxy {
            let proxy = reqwest::Proxy::all(proxy.as_str())
                .map_err(|e| LedgerError::configuration("network.proxy", e.to_string()))?;
            builder = builder.proxy(proxy);
        }

        let client = builder
            .build()
            .map_err(|e| LedgerError::configuration("network", e.to_string()))?;
        Ok(Self { client })
    }
}

impl HttpClient for ReqwestClient {
    fn get(
        &self,
        url: &str,
        query: &[(&str, &str)],
        bearer: Option<&str>,
    ) -> std::result::Result<HttpResponse, TransportError> {
        let mut request = self.client.get(url).query(query);
        if let Some(token) = bearer {
            request = request.bearer_auth(token);
        }

        let response = request.send().map_err(|e| TransportError {
            message: if e.is_timeout() {
                format!("request to {} timed out", url)
            } else {
                format!("request to {} failed: {}", url, e)
            },
        })?;

        let status = response.status().as_u16();
        let body = response.text().map_err(|e| TransportError {
            message: format!("failed to read response body from {}: {}", url, e),
        })?;

        Ok(HttpResponse { status, body })
    }
}

/// Map a non-success response to a provider error kind
pub fn classify_status(status: u16, body: &str) -> ProviderErrorKind {
    let reason_has = |needle: &str| body.contains(needle);
    match status {
        403 if reason_has("quotaExceeded") || reason_has("dailyLimitExceeded") => {
            ProviderErrorKind::Quota
        }
        403 if reason_has("rateLimitExceeded") => ProviderErrorKind::RateLimited,
        400 if reason_has("keyInvalid") || reason_has("API key not valid") => {
            ProviderErrorKind::Auth
        }
        401 | 403 => ProviderErrorKind::Auth,
        404 | 410 => ProviderErrorKind::NotFound,
        429 => ProviderErrorKind::RateLimited,
        408 | 500..=599 => ProviderErrorKind::NetworkError,
        _ => ProviderErrorKind::ParseError,
    }
}

/// Build the provider error for a failed response, pulling the API's own message when present
pub fn status_error(strategy: &'static str, response: &HttpResponse) -> ProviderError {
    let kind = classify_status(response.status, &response.body);
    let detail = serde_json::from_str::<serde_json::Value>(&response.body)
        .ok()
        .and_then(|v| {
            v.pointer("/error/message")
                .and_then(|m| m.as_str())
                .map(str::to_string)
        })
        .unwrap_or_else(|| {
            let snippet: String = response.body.chars().take(200).collect();
            snippet
        });
    ProviderError::new(
        strategy,
        kind,
        format!("HTTP {}: {}", response.status, detail),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quota_is_distinguished_from_auth() {
        let body = r#"{"error":{"errors":[{"reason":"quotaExceeded"}],"message":"quota"}}"#;
        assert_eq!(classify_status(403, body), ProviderErrorKind::Quota);
        assert_eq!(classify_status(403, "{}"), ProviderErrorKind::Auth);
        assert_eq!(classify_status(401, ""), ProviderErrorKind::Auth);
    }

    #[test]
    fn status_classes() {
        assert_eq!(classify_status(404, ""), ProviderErrorKind::NotFound);
        assert_eq!(classify_status(429, ""), ProviderErrorKind::RateLimited);
        assert_eq!(classify_status(503, ""), ProviderErrorKind::NetworkError);
        assert_eq!(
            classify_status(400, r#"{"error":{"message":"API key not valid"}}"#),
            ProviderErrorKind::Auth
        );
    }

    #[test]
    fn status_error_uses_api_message() {
        let response = HttpResponse {
            status: 403,
            body: r#"{"error":{"message":"The request cannot be completed because you have exceeded your quota.","errors":[{"reason":"quotaExceeded"}]}}"#.to_string(),
        };
        let err = status_error("listing:api", &response);
        assert_eq!(err.kind, ProviderErrorKind::Quota);
        assert!(err.message.contains("exceeded your quota"));
    }
}
