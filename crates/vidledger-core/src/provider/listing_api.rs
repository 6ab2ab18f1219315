//! Listing through the YouTube Data API v3
//!
//! Resolve the channel id, look up its uploads playlist, then page through
//! `playlistItems` until the API stops returning a `nextPageToken` or the
//! requested number of items has been collected.

use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, info};

use super::http::{status_error, HttpClient};
use super::retry::RetryPolicy;
use crate::error::{ProviderError, ProviderErrorKind};
use crate::model::{clip_description, normalize_upload_date, ItemStub};

pub const STRATEGY: &str = "listing:api";

/// The API caps `maxResults` at 50
const PAGE_SIZE: usize = 50;

pub struct ApiListing {
    http: Arc<dyn HttpClient>,
    api_key: String,
    base_url: String,
    retry: RetryPolicy,
}

impl ApiListing {
    pub fn new(
        http: Arc<dyn HttpClient>,
        api_key: impl Into<String>,
        base_url: impl Into<String>,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            http,
            api_key: api_key.into(),
            base_url: base_url.into(),
            retry,
        }
    }

    pub fn fetch_all(&self, source_url: &str, max_items: usize) -> Result<Vec<ItemStub>, ProviderError> {
        let channel_id = self.resolve_channel_id(source_url)?;
        let playlist_id = self.uploads_playlist(&channel_id)?;
        info!(strategy = STRATEGY, channel_id = %channel_id, playlist_id = %playlist_id, "resolved uploads playlist");

        let mut stubs = Vec::new();
        let mut page_token: Option<String> = None;
        let mut pages = 0usize;

        while stubs.len() < max_items {
            let page_size = PAGE_SIZE.min(max_items - stubs.len()).to_string();
            let mut params = vec![
                ("part", "snippet,contentDetails"),
                ("playlistId", playlist_id.as_str()),
                ("maxResults", page_size.as_str()),
            ];
            if let Some(token) = page_token.as_deref() {
                params.push(("pageToken", token));
            }

            let page = self.call("playlistItems", &params)?;
            pages += 1;

            let items = page
                .get("items")
                .and_then(Value::as_array)
                .ok_or_else(|| parse_error("playlistItems response has no 'items' array"))?;
            for item in items {
                stubs.push(parse_playlist_item(item)?);
            }
            debug!(strategy = STRATEGY, page = pages, total = stubs.len(), "fetched page");

            page_token = page
                .get("nextPageToken")
                .and_then(Value::as_str)
                .map(str::to_string);
            if page_token.is_none() || items.is_empty() {
                break;
            }
        }

        stubs.truncate(max_items);
        info!(strategy = STRATEGY, count = stubs.len(), pages, "listing complete");
        Ok(stubs)
    }

    fn resolve_channel_id(&self, source_url: &str) -> Result<String, ProviderError> {
        match parse_channel_url(source_url) {
            ChannelRef::Id(id) => Ok(id),
            ChannelRef::Handle(handle) => {
                let handle_param = format!("@{}", handle);
                let response = self.call("channels", &[("part", "id"), ("forHandle", handle_param.as_str())])?;
                if let Some(id) = first_item_str(&response, "/id") {
                    return Ok(id);
                }
                // Older handles are sometimes only reachable through search
                let response = self.call(
                    "search",
                    &[
                        ("part", "snippet"),
                        ("type", "channel"),
                        ("maxResults", "1"),
                        ("q", handle.as_str()),
                    ],
                )?;
                first_item_str(&response, "/id/channelId").ok_or_else(|| {
                    ProviderError::new(
                        STRATEGY,
                        ProviderErrorKind::NotFound,
                        format!("no channel found for handle @{}", handle),
                    )
                })
            }
            ChannelRef::User(user) => {
                let response = self.call("channels", &[("part", "id"), ("forUsername", user.as_str())])?;
                first_item_str(&response, "/id").ok_or_else(|| {
                    ProviderError::new(
                        STRATEGY,
                        ProviderErrorKind::NotFound,
                        format!("no channel found for user {}", user),
                    )
                })
            }
            ChannelRef::Unknown => Err(ProviderError::new(
                STRATEGY,
                ProviderErrorKind::NotFound,
                format!("cannot derive a channel from {}", source_url),
            )),
        }
    }

    fn uploads_playlist(&self, channel_id: &str) -> Result<String, ProviderError> {
        let response = self.call("channels", &[("part", "contentDetails"), ("id", channel_id)])?;
        let first = response
            .get("items")
            .and_then(Value::as_array)
            .and_then(|items| items.first())
            .ok_or_else(|| {
                ProviderError::new(
                    STRATEGY,
                    ProviderErrorKind::NotFound,
                    format!("channel {} not found", channel_id),
                )
            })?;
        first
            .pointer("/contentDetails/relatedPlaylists/uploads")
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| parse_error("channel has no uploads playlist"))
    }

    /// GET `<base>/<endpoint>` with the API key, retrying transport failures
    fn call(&self, endpoint: &str, params: &[(&str, &str)]) -> Result<Value, ProviderError> {
        let url = format!("{}/{}", self.base_url, endpoint);
        let mut query: Vec<(&str, &str)> = params.to_vec();
        query.push(("key", self.api_key.as_str()));

        self.retry.run(endpoint, || {
            let response = self
                .http
                .get(&url, &query, None)
                .map_err(|e| ProviderError::new(STRATEGY, ProviderErrorKind::NetworkError, e.message))?;
            if !response.is_success() {
                return Err(status_error(STRATEGY, &response));
            }
            serde_json::from_str(&response.body)
                .map_err(|e| parse_error(format!("{} returned invalid JSON: {}", endpoint, e)))
        })
    }
}

#[derive(Debug, PartialEq, Eq)]
enum ChannelRef {
    Id(String),
    Handle(String),
    User(String),
    Unknown,
}

fn parse_channel_url(url: &str) -> ChannelRef {
    let path = url
        .split_once("://")
        .map(|(_, rest)| rest)
        .unwrap_or(url);
    let segments: Vec<&str> = path
        .split(['/', '?', '#'])
        .skip(1)
        .filter(|s| !s.is_empty())
        .collect();

    match segments.as_slice() {
        ["channel", id, ..] => ChannelRef::Id(id.to_string()),
        ["user", user, ..] => ChannelRef::User(user.to_string()),
        [first, ..] if first.starts_with('@') && first.len() > 1 => {
            ChannelRef::Handle(first[1..].to_string())
        }
        ["c", name, ..] => ChannelRef::Handle(name.to_string()),
        _ => ChannelRef::Unknown,
    }
}

fn first_item_str(response: &Value, pointer: &str) -> Option<String> {
    response
        .get("items")?
        .as_array()?
        .first()?
        .pointer(pointer)?
        .as_str()
        .map(str::to_string)
}

fn parse_playlist_item(item: &Value) -> Result<ItemStub, ProviderError> {
    let snippet = item
        .get("snippet")
        .ok_or_else(|| parse_error("playlist item without snippet"))?;
    let video_id = item
        .pointer("/contentDetails/videoId")
        .or_else(|| snippet.pointer("/resourceId/videoId"))
        .and_then(Value::as_str)
        .ok_or_else(|| parse_error("playlist item without videoId"))?;
    let text = |key: &str| {
        snippet
            .get(key)
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string()
    };
    let published = item
        .pointer("/contentDetails/videoPublishedAt")
        .and_then(Value::as_str)
        .map(str::to_string)
        .unwrap_or_else(|| text("publishedAt"));

    Ok(ItemStub {
        item_id: video_id.to_string(),
        title: text("title"),
        description: clip_description(&text("description")),
        upload_date: normalize_upload_date(&published),
        url: format!("https://www.youtube.com/watch?v={}", video_id),
        duration: None,
    })
}

fn parse_error(message: impl Into<String>) -> ProviderError {
    ProviderError::new(STRATEGY, ProviderErrorKind::ParseError, message)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::testing::FakeHttp;

    fn listing(http: Arc<FakeHttp>) -> ApiListing {
        ApiListing::new(http, "key", "https://api.test/v3", RetryPolicy::immediate(1))
    }

    fn playlist_page(ids: &[&str], next: Option<&str>) -> String {
        let items: Vec<Value> = ids
            .iter()
            .map(|id| {
                serde_json::json!({
                    "snippet": {
                        "title": format!("Video {}", id),
                        "description": "desc",
                        "publishedAt": "2024-03-01T10:00:00Z",
                        "resourceId": { "videoId": id }
                    },
                    "contentDetails": { "videoId": id, "videoPublishedAt": "2024-02-28T09:00:00Z" }
                })
            })
            .collect();
        let mut page = serde_json::json!({ "items": items });
        if let Some(token) = next {
            page["nextPageToken"] = Value::from(token);
        }
        page.to_string()
    }

    fn channel_lookup(http: &FakeHttp) {
        http.respond("channels?forHandle", 200, r#"{"items":[{"id":"UC123"}]}"#);
        http.respond(
            "channels?id",
            200,
            r#"{"items":[{"contentDetails":{"relatedPlaylists":{"uploads":"UU123"}}}]}"#,
        );
    }

    #[test]
    fn parses_channel_urls() {
        assert_eq!(
            parse_channel_url("https://www.youtube.com/channel/UCabc/videos"),
            ChannelRef::Id("UCabc".into())
        );
        assert_eq!(
            parse_channel_url("https://www.youtube.com/@Someone"),
            ChannelRef::Handle("Someone".into())
        );
        assert_eq!(
            parse_channel_url("https://www.youtube.com/user/legacy"),
            ChannelRef::User("legacy".into())
        );
        assert_eq!(parse_channel_url("https://www.youtube.com/"), ChannelRef::Unknown);
    }

    #[test]
    fn paginates_until_no_next_token() {
        let http = Arc::new(FakeHttp::default());
        channel_lookup(&http);
        http.respond_seq(
            "playlistItems",
            vec![
                (200, playlist_page(&["a", "b"], Some("p2"))),
                (200, playlist_page(&["c"], None)),
            ],
        );

        let stubs = listing(http.clone()).fetch_all("https://www.youtube.com/@x", 100).unwrap();
        let ids: Vec<_> = stubs.iter().map(|s| s.item_id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b", "c"]);
        assert_eq!(stubs[0].upload_date, "2024-02-28");
        assert_eq!(stubs[0].url, "https://www.youtube.com/watch?v=a");
        assert_eq!(http.calls_matching("playlistItems"), 2);
        assert!(http.calls_matching("playlistItems?pageToken=p2") == 1);
    }

    #[test]
    fn stops_at_max_items() {
        let http = Arc::new(FakeHttp::default());
        channel_lookup(&http);
        http.respond("playlistItems", 200, &playlist_page(&["a", "b"], Some("more")));

        let stubs = listing(http.clone()).fetch_all("https://www.youtube.com/@x", 2).unwrap();
        assert_eq!(stubs.len(), 2);
        assert_eq!(http.calls_matching("playlistItems"), 1);
        assert_eq!(http.calls_matching("playlistItems?maxResults=2"), 1);
    }

    #[test]
    fn mid_pagination_failure_fails_whole_fetch() {
        let http = Arc::new(FakeHttp::default());
        channel_lookup(&http);
        http.respond_seq(
            "playlistItems",
            vec![
                (200, playlist_page(&["a"], Some("p2"))),
                (
                    403,
                    r#"{"error":{"message":"quota","errors":[{"reason":"quotaExceeded"}]}}"#.to_string(),
                ),
            ],
        );

        let err = listing(http).fetch_all("https://www.youtube.com/@x", 100).unwrap_err();
        assert_eq!(err.kind, ProviderErrorKind::Quota);
        assert_eq!(err.strategy, STRATEGY);
    }

    #[test]
    fn malformed_response_is_parse_error() {
        let http = Arc::new(FakeHttp::default());
        channel_lookup(&http);
        http.respond("playlistItems", 200, "<html>not json</html>");
        let err = listing(http).fetch_all("https://www.youtube.com/@x", 10).unwrap_err();
        assert_eq!(err.kind, ProviderErrorKind::ParseError);
    }

    #[test]
    fn transport_failures_retry_then_surface_as_network_error() {
        let http = Arc::new(FakeHttp::default());
        let err = listing(http.clone())
            .fetch_all("https://www.youtube.com/channel/UC1", 10)
            .unwrap_err();
        assert_eq!(err.kind, ProviderErrorKind::NetworkError);
        // one call plus one retry
        assert_eq!(http.calls_matching("channels"), 2);
    }

    #[test]
    fn unknown_handle_is_not_found() {
        let http = Arc::new(FakeHttp::default());
        http.respond("channels?forHandle", 200, r#"{"items":[]}"#);
        http.respond("search", 200, r#"{"items":[]}"#);
        let err = listing(http).fetch_all("https://www.youtube.com/@ghost", 10).unwrap_err();
        assert_eq!(err.kind, ProviderErrorKind::NotFound);
    }
}
