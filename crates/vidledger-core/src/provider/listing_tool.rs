//! Listing through an external extraction tool (yt-dlp)
//!
//! Runs the tool in flat-playlist mode and parses its single JSON document.

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;
use tracing::info;

use super::command::{CommandError, CommandOutput, CommandRunner};
use super::retry::RetryPolicy;
use crate::config::mask_proxy;
use crate::error::{ProviderError, ProviderErrorKind};
use crate::model::{clip_description, normalize_upload_date, ItemStub};

pub const STRATEGY: &str = "listing:tool";

/// Channel tabs that already point at a flat list of videos
const LISTING_TABS: &[&str] = &["videos", "streams", "shorts", "playlists", "featured"];

/// Options shared by every invocation of the extraction tool
#[derive(Clone)]
pub struct ToolOptions {
    pub program: String,
    pub cookies_file: Option<PathBuf>,
    pub proxy: Option<String>,
    pub timeout: Duration,
}

impl ToolOptions {
    /// `--cookies` / `--proxy` arguments
    pub fn network_args(&self) -> Vec<String> {
        let mut args = Vec::new();
        if let Some(cookies) = &self.cookies_file {
            args.push("--cookies".to_string());
            args.push(cookies.display().to_string());
        }
        if let Some(proxy) = &self.proxy {
            args.push("--proxy".to_string());
            args.push(proxy.clone());
        }
        args
    }
}

impl fmt::Debug for ToolOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ToolOptions")
            .field("program", &self.program)
            .field("cookies_file", &self.cookies_file)
            .field("proxy", &self.proxy.as_deref().map(mask_proxy))
            .field("timeout", &self.timeout)
            .finish()
    }
}

pub struct ToolListing {
    runner: Arc<dyn CommandRunner>,
    options: ToolOptions,
    retry: RetryPolicy,
}

#[derive(Debug, Deserialize)]
struct FlatPlaylist {
    #[serde(default)]
    entries: Vec<FlatEntry>,
}

#[derive(Debug, Deserialize)]
struct FlatEntry {
    #[serde(default)]
    id: Option<String>,
    #[serde(default, rename = "_type")]
    kind: Option<String>,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    upload_date: Option<String>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    duration: Option<f64>,
}

impl ToolListing {
    pub fn new(runner: Arc<dyn CommandRunner>, options: ToolOptions, retry: RetryPolicy) -> Self {
        Self {
            runner,
            options,
            retry,
        }
    }

    pub fn fetch_all(&self, source_url: &str, max_items: usize) -> Result<Vec<ItemStub>, ProviderError> {
        let target = videos_tab_url(source_url);
        let mut args = vec![
            "--flat-playlist".to_string(),
            "--dump-single-json".to_string(),
            "--no-warnings".to_string(),
            "--playlist-end".to_string(),
            max_items.to_string(),
        ];
        args.extend(self.options.network_args());
        args.push(target.clone());

        let output = self.retry.run("flat playlist extraction", || {
            let output = self
                .runner
                .run(&self.options.program, &args, self.options.timeout)
                .map_err(|e| command_error(STRATEGY, e))?;
            if !output.success {
                return Err(failed_run(STRATEGY, &output));
            }
            Ok(output)
        })?;

        let mut stubs = parse_flat_playlist(&output.stdout)?;
        stubs.truncate(max_items);
        info!(strategy = STRATEGY, url = %target, count = stubs.len(), "listing complete");
        Ok(stubs)
    }
}

/// Point a bare channel URL at its uploads tab so the flat listing yields videos, not tabs
fn videos_tab_url(source_url: &str) -> String {
    let trimmed = source_url.trim_end_matches('/');
    let is_channel = trimmed.contains("/@") || trimmed.contains("/channel/") || trimmed.contains("/c/") || trimmed.contains("/user/");
    let last = trimmed.rsplit('/').next().unwrap_or_default();
    if is_channel && !trimmed.contains('?') && !LISTING_TABS.contains(&last) {
        format!("{}/videos", trimmed)
    } else {
        source_url.to_string()
    }
}

fn parse_flat_playlist(stdout: &str) -> Result<Vec<ItemStub>, ProviderError> {
    let playlist: FlatPlaylist = serde_json::from_str(stdout.trim()).map_err(|e| {
        ProviderError::new(
            STRATEGY,
            ProviderErrorKind::ParseError,
            format!("extractor output is not a playlist document: {}", e),
        )
    })?;

    Ok(playlist
        .entries
        .into_iter()
        .filter(|e| e.kind.as_deref() != Some("playlist"))
        .filter_map(|entry| {
            let id = entry.id.filter(|id| !id.is_empty())?;
            let url = entry
                .url
                .filter(|u| u.starts_with("http"))
                .unwrap_or_else(|| format!("https://www.youtube.com/watch?v={}", id));
            Some(ItemStub {
                title: entry.title.unwrap_or_else(|| "Unknown Title".to_string()),
                description: clip_description(entry.description.as_deref().unwrap_or_default()),
                upload_date: normalize_upload_date(entry.upload_date.as_deref().unwrap_or_default()),
                url,
                duration: entry.duration.filter(|d| *d >= 0.0).map(|d| d.round() as u64),
                item_id: id,
            })
        })
        .collect())
}

/// Map a spawn/timeout failure of the tool
pub(crate) fn command_error(strategy: &'static str, error: CommandError) -> ProviderError {
    ProviderError::new(strategy, ProviderErrorKind::NetworkError, error.to_string())
}

/// Classify a non-zero exit from the tool's stderr
pub(crate) fn failed_run(strategy: &'static str, output: &CommandOutput) -> ProviderError {
    let stderr = output.stderr.trim();
    let lower = stderr.to_ascii_lowercase();
    let kind = if lower.contains("http error 429") || lower.contains("too many requests") {
        ProviderErrorKind::RateLimited
    } else if lower.contains("sign in")
        || lower.contains("cookies")
        || lower.contains("http error 403")
        || lower.contains("private video")
    {
        ProviderErrorKind::Auth
    } else if lower.contains("does not exist")
        || lower.contains("http error 404")
        || lower.contains("video unavailable")
    {
        ProviderErrorKind::NotFound
    } else {
        ProviderErrorKind::NetworkError
    };
    let last_line = stderr.lines().last().unwrap_or("no output");
    ProviderError::new(
        strategy,
        kind,
        format!("exited with {:?}: {}", output.code, last_line),
    )
}
