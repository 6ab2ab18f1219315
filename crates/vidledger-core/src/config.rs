//! Configuration loading and validation
//!
//! Two inputs feed a [`ConfigSpec`]:
//!
//! - [`ConfigFile`]: `config.toml` in the base directory (strategies, limits, paths)
//! - [`Environment`]: credentials captured once at startup (process env and `.env`)
//!
//! [`ConfigSpec::validate`] combines them into the immutable value every other
//! component receives. A strategy whose credential is missing is an error;
//! the other strategy is never picked in its place.

use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{LedgerError, Result};

const CONFIG_FILE: &str = "config.toml";
const ENV_FILE: &str = ".env";

pub const API_KEY_VAR: &str = "YOUTUBE_API_KEY";
pub const PROXY_USERNAME_VAR: &str = "PROXY_USERNAME";
pub const PROXY_PASSWORD_VAR: &str = "PROXY_PASSWORD";
pub const TRANSCRIPT_API_KEY_VAR: &str = "TRANSCRIPT_API_KEY";

pub const DEFAULT_API_BASE_URL: &str = "https://www.googleapis.com/youtube/v3";

/// Default config template with rich comments
const DEFAULT_CONFIG_TEMPLATE: &str = r#"# vidledger configuration file
# Location: ~/.vidledger/config.toml
# Credentials are read from the environment (or ~/.vidledger/.env):
#   YOUTUBE_API_KEY                   required when listing.strategy = "api"
#   PROXY_USERNAME / PROXY_PASSWORD   optional, spliced into network.proxy
#   TRANSCRIPT_API_KEY                optional bearer token for transcripts.strategy = "api"

[listing]
# How the channel's videos are discovered: "api" (YouTube Data API) or "tool" (yt-dlp)
strategy = "tool"
source_url = "https://www.youtube.com/@example"
# Videos fetched by `update`
max_items = 50
# Videos fetched by `rebuild`
rebuild_max_items = 1000

[transcripts]
# How transcripts are retrieved: "tool" (yt-dlp) or "api" (HTTP endpoint)
strategy = "tool"
dir = "data/transcripts"
# Parallel transcript downloads
concurrency = 4
# Required when strategy = "api"
# api_endpoint = "https://transcripts.example.com/v1/transcript"

[network]
# proxy = "http://proxy.example.com:8080"
# cookies_file = "cookies.txt"
timeout_secs = 30
max_retries = 2
extractor = "yt-dlp"

[store]
master_file = "data/videos_master.json"

[curation]
default_categories = []
"#;

// ============================================================================
// Raw file
// ============================================================================

/// `config.toml` as written by the user, before validation
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConfigFile {
    #[serde(default)]
    pub listing: ListingSection,
    #[serde(default)]
    pub transcripts: TranscriptSection,
    #[serde(default)]
    pub network: NetworkSection,
    #[serde(default)]
    pub store: StoreSection,
    #[serde(default)]
    pub curation: CurationSection,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListingSection {
    #[serde(default = "default_listing_strategy")]
    pub strategy: String,
    #[serde(default)]
    pub source_url: String,
    #[serde(default = "default_max_items")]
    pub max_items: i64,
    #[serde(default = "default_rebuild_max_items")]
    pub rebuild_max_items: i64,
    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,
}

impl Default for ListingSection {
    fn default() -> Self {
        Self {
            strategy: default_listing_strategy(),
            source_url: String::new(),
            max_items: default_max_items(),
            rebuild_max_items: default_rebuild_max_items(),
            api_base_url: default_api_base_url(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranscriptSection {
    #[serde(default = "default_transcript_strategy")]
    pub strategy: String,
    #[serde(default = "default_transcripts_dir")]
    pub dir: String,
    #[serde(default = "default_concurrency")]
    pub concurrency: i64,
    #[serde(default)]
    pub api_endpoint: Option<String>,
}

impl Default for TranscriptSection {
    fn default() -> Self {
        Self {
            strategy: default_transcript_strategy(),
            dir: default_transcripts_dir(),
            concurrency: default_concurrency(),
            api_endpoint: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkSection {
    #[serde(default)]
    pub proxy: Option<String>,
    #[serde(default)]
    pub cookies_file: Option<String>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: i64,
    #[serde(default = "default_max_retries")]
    pub max_retries: i64,
    #[serde(default = "default_extractor")]
    pub extractor: String,
}

impl Default for NetworkSection {
    fn default() -> Self {
        Self {
            proxy: None,
            cookies_file: None,
            timeout_secs: default_timeout_secs(),
            max_retries: default_max_retries(),
            extractor: default_extractor(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreSection {
    #[serde(default = "default_master_file")]
    pub master_file: String,
}

impl Default for StoreSection {
    fn default() -> Self {
        Self {
            master_file: default_master_file(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CurationSection {
    #[serde(default)]
    pub default_categories: Vec<String>,
}

fn default_listing_strategy() -> String {
    "tool".to_string()
}

fn default_transcript_strategy() -> String {
    "tool".to_string()
}

fn default_max_items() -> i64 {
    50
}

fn default_rebuild_max_items() -> i64 {
    1000
}

fn default_api_base_url() -> String {
    DEFAULT_API_BASE_URL.to_string()
}

fn default_transcripts_dir() -> String {
    "data/transcripts".to_string()
}

fn default_concurrency() -> i64 {
    4
}

fn default_timeout_secs() -> i64 {
    30
}

fn default_max_retries() -> i64 {
    2
}

fn default_extractor() -> String {
    "yt-dlp".to_string()
}

fn default_master_file() -> String {
    "data/videos_master.json".to_string()
}

impl ConfigFile {
    /// Load config from base directory
    pub fn load(base_dir: &Path) -> Result<Self> {
        let path = base_dir.join(CONFIG_FILE);
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = fs::read_to_string(&path)?;
        toml::from_str(&content).map_err(|e| {
            LedgerError::configuration(path.display().to_string(), e.to_string())
        })
    }

    /// Get config file path
    pub fn path(base_dir: &Path) -> PathBuf {
        base_dir.join(CONFIG_FILE)
    }

    /// Initialize config with default template (rich comments)
    pub fn init(base_dir: &Path) -> Result<PathBuf> {
        let path = base_dir.join(CONFIG_FILE);
        fs::create_dir_all(base_dir)?;

        if !path.exists() {
            fs::write(&path, DEFAULT_CONFIG_TEMPLATE)?;
        }

        Ok(path)
    }

    /// Get a config value by dot-notation key (e.g. `listing.strategy`)
    pub fn get(&self, key: &str) -> Result<Option<String>> {
        let value = toml::Value::try_from(self)?;
        let mut current = &value;
        for part in key.split('.') {
            match current.get(part) {
                Some(next) => current = next,
                None => return Ok(None),
            }
        }
        Ok(Some(match current {
            toml::Value::String(s) => s.clone(),
            other => other.to_string(),
        }))
    }

    /// Effective file contents, defaults filled in
    pub fn to_toml(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }
}

// ============================================================================
// Environment
// ============================================================================

/// Credential snapshot taken once at startup
#[derive(Debug, Clone, Default)]
pub struct Environment {
    vars: HashMap<String, String>,
}

impl Environment {
    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            vars: pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }

    /// Add `KEY=VALUE` lines from `<base_dir>/.env`; variables already set win
    pub fn with_env_file(mut self, base_dir: &Path) -> Result<Self> {
        let path = base_dir.join(ENV_FILE);
        if !path.exists() {
            return Ok(self);
        }
        let content = fs::read_to_string(&path)?;
        for (key, value) in parse_env_file(&content) {
            self.vars.entry(key).or_insert(value);
        }
        Ok(self)
    }

    /// Non-empty value of a variable
    pub fn get(&self, key: &str) -> Option<&str> {
        self.vars
            .get(key)
            .map(|v| v.as_str())
            .filter(|v| !v.trim().is_empty())
    }
}

fn parse_env_file(content: &str) -> Vec<(String, String)> {
    content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .filter_map(|line| line.split_once('='))
        .map(|(k, v)| {
            let v = v.trim().trim_matches('"').trim_matches('\'');
            (k.trim().to_string(), v.to_string())
        })
        .collect()
}

// ============================================================================
// Validated configuration
// ============================================================================

/// How the channel's item list is fetched
#[derive(Clone, PartialEq, Eq)]
pub enum ListingConfig {
    Api { api_key: String, base_url: String },
    Tool,
}

impl ListingConfig {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Api { .. } => "api",
            Self::Tool => "tool",
        }
    }
}

impl fmt::Debug for ListingConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Api { base_url, .. } => f
                .debug_struct("Api")
                .field("api_key", &"***")
                .field("base_url", base_url)
                .finish(),
            Self::Tool => write!(f, "Tool"),
        }
    }
}

/// How transcripts are retrieved
#[derive(Clone, PartialEq, Eq)]
pub enum TranscriptConfig {
    Tool,
    Api {
        endpoint: String,
        api_key: Option<String>,
    },
}

impl TranscriptConfig {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Tool => "tool",
            Self::Api { .. } => "api",
        }
    }
}

impl fmt::Debug for TranscriptConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Tool => write!(f, "Tool"),
            Self::Api { endpoint, api_key } => f
                .debug_struct("Api")
                .field("endpoint", endpoint)
                .field("api_key", &api_key.as_ref().map(|_| "***"))
                .finish(),
        }
    }
}

/// Settings shared by every provider call
#[derive(Clone, PartialEq, Eq)]
pub struct NetworkSpec {
    /// Proxy URL with credentials already spliced in
    pub proxy: Option<String>,
    pub cookies_file: Option<PathBuf>,
    pub timeout: Duration,
    pub max_retries: u32,
    pub extractor: String,
}

impl fmt::Debug for NetworkSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NetworkSpec")
            .field("proxy", &self.proxy.as_deref().map(mask_proxy))
            .field("cookies_file", &self.cookies_file)
            .field("timeout", &self.timeout)
            .field("max_retries", &self.max_retries)
            .field("extractor", &self.extractor)
            .finish()
    }
}

/// Validated, immutable configuration
#[derive(Debug, Clone)]
pub struct ConfigSpec {
    pub base_dir: PathBuf,
    pub source_url: String,
    pub max_items: usize,
    pub rebuild_max_items: usize,
    pub listing: ListingConfig,
    pub transcripts: TranscriptConfig,
    pub transcripts_dir: PathBuf,
    pub concurrency: usize,
    pub network: NetworkSpec,
    pub master_file: PathBuf,
    pub default_categories: Vec<String>,
}

impl ConfigSpec {
    /// Validate raw settings against the captured environment
    pub fn validate(base_dir: &Path, file: &ConfigFile, env: &Environment) -> Result<Self> {
        let listing = match parse_listing_strategy(&file.listing.strategy)? {
            ListingKind::Api => {
                let api_key = env.get(API_KEY_VAR).ok_or_else(|| {
                    LedgerError::configuration(
                        API_KEY_VAR,
                        "required when listing.strategy = \"api\" but not set",
                    )
                })?;
                let base_url = file.listing.api_base_url.trim_end_matches('/').to_string();
                require_http_url("listing.api_base_url", &base_url)?;
                ListingConfig::Api {
                    api_key: api_key.to_string(),
                    base_url,
                }
            }
            ListingKind::Tool => ListingConfig::Tool,
        };

        let transcripts = match parse_transcript_strategy(&file.transcripts.strategy)? {
            TranscriptKind::Tool => TranscriptConfig::Tool,
            TranscriptKind::Api => {
                let endpoint = file
                    .transcripts
                    .api_endpoint
                    .as_deref()
                    .map(str::trim)
                    .filter(|e| !e.is_empty())
                    .ok_or_else(|| {
                        LedgerError::configuration(
                            "transcripts.api_endpoint",
                            "required when transcripts.strategy = \"api\" but not set",
                        )
                    })?;
                require_http_url("transcripts.api_endpoint", endpoint)?;
                TranscriptConfig::Api {
                    endpoint: endpoint.to_string(),
                    api_key: env.get(TRANSCRIPT_API_KEY_VAR).map(str::to_string),
                }
            }
        };

        let source_url = file.listing.source_url.trim().to_string();
        if source_url.is_empty() {
            return Err(LedgerError::configuration(
                "listing.source_url",
                "channel URL is not set",
            ));
        }
        if !source_url.starts_with("https://") {
            return Err(LedgerError::configuration(
                "listing.source_url",
                format!("must be an https:// URL, got '{}'", source_url),
            ));
        }

        let max_items = positive("listing.max_items", file.listing.max_items)?;
        let rebuild_max_items = positive("listing.rebuild_max_items", file.listing.rebuild_max_items)?;
        let concurrency = positive("transcripts.concurrency", file.transcripts.concurrency)?;
        let timeout_secs = positive("network.timeout_secs", file.network.timeout_secs)?;
        if file.network.max_retries < 0 {
            return Err(LedgerError::configuration(
                "network.max_retries",
                "must not be negative",
            ));
        }

        let proxy = resolve_proxy(file.network.proxy.as_deref(), env)?;

        let cookies_file = match file.network.cookies_file.as_deref() {
            Some(raw) if !raw.trim().is_empty() => {
                let path = resolve_path(base_dir, raw.trim());
                if !path.is_file() {
                    return Err(LedgerError::configuration(
                        "network.cookies_file",
                        format!("cookie bundle not found: {}", path.display()),
                    ));
                }
                Some(path)
            }
            _ => None,
        };

        let extractor = file.network.extractor.trim().to_string();
        if extractor.is_empty() {
            return Err(LedgerError::configuration(
                "network.extractor",
                "extractor command cannot be empty",
            ));
        }

        if file.store.master_file.trim().is_empty() {
            return Err(LedgerError::configuration(
                "store.master_file",
                "cannot be empty",
            ));
        }

        Ok(Self {
            base_dir: base_dir.to_path_buf(),
            source_url,
            max_items,
            rebuild_max_items,
            listing,
            transcripts,
            transcripts_dir: resolve_path(base_dir, &file.transcripts.dir),
            concurrency,
            network: NetworkSpec {
                proxy,
                cookies_file,
                timeout: Duration::from_secs(timeout_secs as u64),
                max_retries: file.network.max_retries as u32,
                extractor,
            },
            master_file: resolve_path(base_dir, file.store.master_file.trim()),
            default_categories: file
                .curation
                .default_categories
                .iter()
                .map(|c| c.trim().to_string())
                .filter(|c| !c.is_empty())
                .collect(),
        })
    }

    /// Effective settings for display, secrets masked
    pub fn summary(&self) -> Vec<(String, String)> {
        let mut rows = vec![
            ("listing.strategy".to_string(), self.listing.name().to_string()),
            ("listing.source_url".to_string(), self.source_url.clone()),
            ("listing.max_items".to_string(), self.max_items.to_string()),
            (
                "listing.rebuild_max_items".to_string(),
                self.rebuild_max_items.to_string(),
            ),
        ];
        if let ListingConfig::Api { api_key, base_url } = &self.listing {
            rows.push(("listing.api_base_url".to_string(), base_url.clone()));
            rows.push((API_KEY_VAR.to_string(), mask_secret(api_key)));
        }
        rows.push((
            "transcripts.strategy".to_string(),
            self.transcripts.name().to_string(),
        ));
        if let TranscriptConfig::Api { endpoint, api_key } = &self.transcripts {
            rows.push(("transcripts.api_endpoint".to_string(), endpoint.clone()));
            rows.push((
                TRANSCRIPT_API_KEY_VAR.to_string(),
                api_key
                    .as_deref()
                    .map(mask_secret)
                    .unwrap_or_else(|| "(not set)".to_string()),
            ));
        }
        rows.push((
            "transcripts.dir".to_string(),
            self.transcripts_dir.display().to_string(),
        ));
        rows.push((
            "transcripts.concurrency".to_string(),
            self.concurrency.to_string(),
        ));
        rows.push((
            "network.proxy".to_string(),
            self.network
                .proxy
                .as_deref()
                .map(mask_proxy)
                .unwrap_or_else(|| "(none)".to_string()),
        ));
        rows.push((
            "network.cookies_file".to_string(),
            self.network
                .cookies_file
                .as_ref()
                .map(|p| p.display().to_string())
                .unwrap_or_else(|| "(none)".to_string()),
        ));
        rows.push((
            "network.timeout_secs".to_string(),
            self.network.timeout.as_secs().to_string(),
        ));
        rows.push((
            "network.max_retries".to_string(),
            self.network.max_retries.to_string(),
        ));
        rows.push(("network.extractor".to_string(), self.network.extractor.clone()));
        rows.push((
            "store.master_file".to_string(),
            self.master_file.display().to_string(),
        ));
        rows
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ListingKind {
    Api,
    Tool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TranscriptKind {
    Tool,
    Api,
}

fn parse_listing_strategy(value: &str) -> Result<ListingKind> {
    match value.trim().to_ascii_lowercase().as_str() {
        "api" | "youtube_api" => Ok(ListingKind::Api),
        "tool" | "ytdlp" | "yt-dlp" => Ok(ListingKind::Tool),
        other => Err(LedgerError::configuration(
            "listing.strategy",
            format!("unknown strategy '{}' - must be \"api\" or \"tool\"", other),
        )),
    }
}

fn parse_transcript_strategy(value: &str) -> Result<TranscriptKind> {
    match value.trim().to_ascii_lowercase().as_str() {
        "tool" | "ytdlp" | "yt-dlp" => Ok(TranscriptKind::Tool),
        "api" | "youtube_transcript_api" => Ok(TranscriptKind::Api),
        other => Err(LedgerError::configuration(
            "transcripts.strategy",
            format!("unknown strategy '{}' - must be \"tool\" or \"api\"", other),
        )),
    }
}

fn positive(field: &str, value: i64) -> Result<usize> {
    if value <= 0 {
        return Err(LedgerError::configuration(
            field,
            format!("must be a positive integer, got {}", value),
        ));
    }
    Ok(value as usize)
}

fn require_http_url(field: &str, value: &str) -> Result<()> {
    if value.starts_with("http://") || value.starts_with("https://") {
        Ok(())
    } else {
        Err(LedgerError::configuration(
            field,
            format!("must start with http:// or https://, got '{}'", value),
        ))
    }
}

/// Combine the configured proxy endpoint with optional credentials
fn resolve_proxy(proxy: Option<&str>, env: &Environment) -> Result<Option<String>> {
    let username = env.get(PROXY_USERNAME_VAR);
    let password = env.get(PROXY_PASSWORD_VAR);
    if username.is_some() != password.is_some() {
        return Err(LedgerError::configuration(
            if username.is_none() {
                PROXY_USERNAME_VAR
            } else {
                PROXY_PASSWORD_VAR
            },
            format!(
                "{} and {} must be provided together",
                PROXY_USERNAME_VAR, PROXY_PASSWORD_VAR
            ),
        ));
    }

    let endpoint = match proxy.map(str::trim).filter(|p| !p.is_empty()) {
        Some(endpoint) => endpoint,
        None => {
            if username.is_some() {
                return Err(LedgerError::configuration(
                    "network.proxy",
                    "proxy credentials are set but no proxy endpoint is configured",
                ));
            }
            return Ok(None);
        }
    };
    require_http_url("network.proxy", endpoint)?;

    match (username, password) {
        (Some(user), Some(pass)) => {
            let (scheme, rest) = endpoint.split_once("://").unwrap_or(("http", endpoint));
            if rest.contains('@') {
                return Err(LedgerError::configuration(
                    "network.proxy",
                    "endpoint already embeds credentials; unset PROXY_USERNAME/PROXY_PASSWORD",
                ));
            }
            Ok(Some(format!("{}://{}:{}@{}", scheme, user, pass, rest)))
        }
        _ => Ok(Some(endpoint.to_string())),
    }
}

fn resolve_path(base_dir: &Path, raw: &str) -> PathBuf {
    let path = PathBuf::from(raw);
    if path.is_absolute() {
        path
    } else {
        base_dir.join(path)
    }
}

fn mask_secret(secret: &str) -> String {
    let visible: String = secret.chars().take(4).collect();
    format!("{}***", visible)
}

pub(crate) fn mask_proxy(proxy: &str) -> String {
    match (proxy.split_once("://"), proxy.rsplit_once('@')) {
        (Some((scheme, _)), Some((_, host))) => format!("{}://***@{}", scheme, host),
        _ => proxy.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn file_with(strategy: &str) -> ConfigFile {
        let mut file = ConfigFile::default();
        file.listing.strategy = strategy.to_string();
        file.listing.source_url = "https://www.youtube.com/@example".to_string();
        file
    }

    #[test]
    fn api_listing_without_key_fails_naming_credential() {
        let err = ConfigSpec::validate(Path::new("/tmp"), &file_with("api"), &Environment::default())
            .unwrap_err();
        match err {
            LedgerError::Configuration { field, .. } => assert_eq!(field, API_KEY_VAR),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn api_listing_with_key_validates() {
        let env = Environment::from_pairs([(API_KEY_VAR, "AIzaSecret")]);
        let spec = ConfigSpec::validate(Path::new("/tmp"), &file_with("api"), &env).unwrap();
        assert_eq!(spec.listing.name(), "api");
        assert_eq!(spec.transcripts.name(), "tool");
        assert!(!format!("{:?}", spec).contains("AIzaSecret"));
    }

    #[test]
    fn debug_output_masks_proxy_password() {
        let mut file = file_with("api");
        file.network.proxy = Some("http://proxy.example.com:80".to_string());
        let env = Environment::from_pairs([
            (API_KEY_VAR, "AIzaSecret"),
            (PROXY_USERNAME_VAR, "user"),
            (PROXY_PASSWORD_VAR, "hunter2"),
        ]);
        let spec = ConfigSpec::validate(Path::new("/tmp"), &file, &env).unwrap();
        let rendered = format!("{:?}", spec);
        assert!(!rendered.contains("hunter2"));
        assert!(!rendered.contains("AIzaSecret"));
        assert!(rendered.contains("***@proxy.example.com:80"));
    }

    #[test]
    fn legacy_strategy_names_are_accepted() {
        let env = Environment::from_pairs([(API_KEY_VAR, "k")]);
        let spec = ConfigSpec::validate(Path::new("/tmp"), &file_with("youtube_api"), &env).unwrap();
        assert_eq!(spec.listing.name(), "api");
        let spec = ConfigSpec::validate(Path::new("/tmp"), &file_with("ytdlp"), &env).unwrap();
        assert_eq!(spec.listing.name(), "tool");
    }

    #[test]
    fn unknown_strategy_is_rejected() {
        let err = ConfigSpec::validate(Path::new("/tmp"), &file_with("rss"), &Environment::default())
            .unwrap_err();
        assert!(err.to_string().contains("listing.strategy"));
    }

    #[test]
    fn transcript_api_requires_endpoint() {
        let mut file = file_with("tool");
        file.transcripts.strategy = "api".to_string();
        let err = ConfigSpec::validate(Path::new("/tmp"), &file, &Environment::default()).unwrap_err();
        assert!(err.to_string().contains("transcripts.api_endpoint"));

        file.transcripts.api_endpoint = Some("https://t.example.com/v1".to_string());
        let spec = ConfigSpec::validate(Path::new("/tmp"), &file, &Environment::default()).unwrap();
        assert_eq!(spec.transcripts.name(), "api");
    }

    #[test]
    fn non_positive_limits_are_rejected() {
        let mut file = file_with("tool");
        file.listing.max_items = 0;
        let err = ConfigSpec::validate(Path::new("/tmp"), &file, &Environment::default()).unwrap_err();
        assert!(err.to_string().contains("listing.max_items"));
    }

    #[test]
    fn proxy_credentials_must_come_in_pairs() {
        let mut file = file_with("tool");
        file.network.proxy = Some("http://proxy.example.com:80".to_string());

        let env = Environment::from_pairs([(PROXY_USERNAME_VAR, "user")]);
        let err = ConfigSpec::validate(Path::new("/tmp"), &file, &env).unwrap_err();
        assert!(err.to_string().contains(PROXY_PASSWORD_VAR));

        let env = Environment::from_pairs([(PROXY_USERNAME_VAR, "user"), (PROXY_PASSWORD_VAR, "pw")]);
        let spec = ConfigSpec::validate(Path::new("/tmp"), &file, &env).unwrap();
        assert_eq!(
            spec.network.proxy.as_deref(),
            Some("http://user:pw@proxy.example.com:80")
        );
    }

    #[test]
    fn proxy_must_be_http_url() {
        let mut file = file_with("tool");
        file.network.proxy = Some("socks5://proxy:1080".to_string());
        let err = ConfigSpec::validate(Path::new("/tmp"), &file, &Environment::default()).unwrap_err();
        assert!(err.to_string().contains("network.proxy"));
    }

    #[test]
    fn missing_cookie_bundle_is_an_error() {
        let temp = TempDir::new().unwrap();
        let mut file = file_with("tool");
        file.network.cookies_file = Some("cookies.txt".to_string());
        let err = ConfigSpec::validate(temp.path(), &file, &Environment::default()).unwrap_err();
        assert!(err.to_string().contains("network.cookies_file"));

        fs::write(temp.path().join("cookies.txt"), "# Netscape HTTP Cookie File\n").unwrap();
        let spec = ConfigSpec::validate(temp.path(), &file, &Environment::default()).unwrap();
        assert_eq!(spec.network.cookies_file, Some(temp.path().join("cookies.txt")));
    }

    #[test]
    fn paths_resolve_against_base_dir() {
        let spec = ConfigSpec::validate(Path::new("/data/ledger"), &file_with("tool"), &Environment::default())
            .unwrap();
        assert_eq!(
            spec.master_file,
            PathBuf::from("/data/ledger/data/videos_master.json")
        );
        assert_eq!(spec.transcripts_dir, PathBuf::from("/data/ledger/data/transcripts"));
    }

    #[test]
    fn template_round_trips_through_load() {
        let temp = TempDir::new().unwrap();
        ConfigFile::init(temp.path()).unwrap();
        let file = ConfigFile::load(temp.path()).unwrap();
        assert_eq!(file.listing.strategy, "tool");
        assert_eq!(file.listing.max_items, 50);
        assert_eq!(file.get("store.master_file").unwrap().as_deref(), Some("data/videos_master.json"));
        assert_eq!(file.get("listing.nope").unwrap(), None);
    }

    #[test]
    fn env_file_does_not_override_process_env() {
        let temp = TempDir::new().unwrap();
        fs::write(
            temp.path().join(".env"),
            "# creds\nYOUTUBE_API_KEY=from-file\nPROXY_USERNAME=\"bob\"\n",
        )
        .unwrap();
        let env = Environment::from_pairs([(API_KEY_VAR, "from-process")])
            .with_env_file(temp.path())
            .unwrap();
        assert_eq!(env.get(API_KEY_VAR), Some("from-process"));
        assert_eq!(env.get(PROXY_USERNAME_VAR), Some("bob"));
    }

    #[test]
    fn summary_masks_secrets() {
        let mut file = file_with("api");
        file.network.proxy = Some("http://proxy.example.com:80".to_string());
        let env = Environment::from_pairs([
            (API_KEY_VAR, "AIzaVerySecret"),
            (PROXY_USERNAME_VAR, "user"),
            (PROXY_PASSWORD_VAR, "hunter2"),
        ]);
        let spec = ConfigSpec::validate(Path::new("/tmp"), &file, &env).unwrap();
        let rendered: String = spec
            .summary()
            .into_iter()
            .map(|(k, v)| format!("{k}={v}\n"))
            .collect();
        assert!(!rendered.contains("VerySecret"));
        assert!(!rendered.contains("hunter2"));
        assert!(rendered.contains("proxy.example.com:80"));
    }
}
