// src/config/digest.rs
use anyhow::{anyhow, bail, Context, Result};
use chrono::{FixedOffset, Offset, Utc};
use serde::Deserialize;
use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use super::seed;
use crate::ingest::types::SourceKind;
use crate::scoring::KeywordTable;

pub const DEFAULT_CONFIG_PATH: &str = "config/digest.toml";
pub const ENV_CONFIG_PATH: &str = "DIGEST_CONFIG_PATH";

pub const ENV_MIN_SCORE: &str = "DIGEST_MIN_SCORE";
pub const ENV_MAX_ITEMS: &str = "DIGEST_MAX_ITEMS";
pub const ENV_BIG_RELEASE_THRESHOLD: &str = "DIGEST_BIG_RELEASE_THRESHOLD";
pub const ENV_STORE_PATH: &str = "DIGEST_STORE_PATH";

/// Smallest message budget that still fits a header, footer and one item.
pub const MIN_MESSAGE_LEN: usize = 256;

fn default_title() -> String {
    "AI News Digest".to_string()
}
fn default_min_score() -> i32 {
    3
}
fn default_max_items() -> usize {
    30
}
fn default_big_release_threshold() -> i32 {
    5
}
fn default_max_message_len() -> usize {
    4096 // Telegram sendMessage limit
}
fn default_inter_message_delay_ms() -> u64 {
    3_000
}
fn default_store_path() -> PathBuf {
    PathBuf::from("state/sent_links.json")
}
fn default_lock_stale_secs() -> u64 {
    3_600
}
fn default_concurrency() -> usize {
    4
}
fn default_timeout_secs() -> u64 {
    20
}
fn default_user_agent() -> String {
    concat!("ai-news-digest/", env!("CARGO_PKG_VERSION")).to_string()
}
fn default_feed_kind() -> SourceKind {
    SourceKind::ResearchBlog
}
fn default_limit() -> usize {
    10
}

/// Whole-process configuration. Immutable once a run starts.
#[derive(Debug, Clone, Deserialize)]
pub struct DigestConfig {
    #[serde(default)]
    pub digest: DigestSection,
    #[serde(default)]
    pub store: StoreSection,
    #[serde(default)]
    pub collect: CollectSection,
    #[serde(default = "seed::default_keywords")]
    pub keywords: BTreeMap<String, i32>,
    #[serde(default = "seed::default_sources")]
    pub sources: Vec<SourceSpec>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DigestSection {
    #[serde(default = "default_title")]
    pub title: String,
    /// Footer channel label. Empty means "use TELEGRAM_CHANNEL_ID".
    #[serde(default)]
    pub channel: String,
    #[serde(default = "default_min_score")]
    pub min_score: i32,
    #[serde(default = "default_max_items")]
    pub max_items: usize,
    #[serde(default = "default_big_release_threshold")]
    pub big_release_threshold: i32,
    #[serde(default = "default_max_message_len")]
    pub max_message_len: usize,
    #[serde(default = "default_inter_message_delay_ms")]
    pub inter_message_delay_ms: u64,
    #[serde(default)]
    pub utc_offset_minutes: i32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StoreSection {
    #[serde(default = "default_store_path")]
    pub path: PathBuf,
    #[serde(default = "default_lock_stale_secs")]
    pub lock_stale_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CollectSection {
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

/// One configured source. Tagged by `type` in TOML.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SourceSpec {
    Rss {
        name: String,
        url: String,
        #[serde(default = "default_feed_kind")]
        kind: SourceKind,
        #[serde(default = "default_limit")]
        limit: usize,
        #[serde(default)]
        emoji: Option<String>,
    },
    HackerNews {
        #[serde(default = "default_limit")]
        limit: usize,
        #[serde(default)]
        emoji: Option<String>,
    },
    GithubTrending {
        topic: String,
        #[serde(default = "default_limit")]
        limit: usize,
        #[serde(default)]
        emoji: Option<String>,
    },
}

impl SourceSpec {
    /// Source name stamped on every item this source yields.
    pub fn display_name(&self) -> String {
        match self {
            SourceSpec::Rss { name, .. } => name.clone(),
            SourceSpec::HackerNews { .. } => "Hacker News".to_string(),
            SourceSpec::GithubTrending { topic, .. } => format!("GitHub Trending ({topic})"),
        }
    }

    pub fn emoji(&self) -> Option<&str> {
        match self {
            SourceSpec::Rss { emoji, .. }
            | SourceSpec::HackerNews { emoji, .. }
            | SourceSpec::GithubTrending { emoji, .. } => emoji.as_deref(),
        }
    }
}

impl Default for DigestSection {
    fn default() -> Self {
        Self {
            title: default_title(),
            channel: String::new(),
            min_score: default_min_score(),
            max_items: default_max_items(),
            big_release_threshold: default_big_release_threshold(),
            max_message_len: default_max_message_len(),
            inter_message_delay_ms: default_inter_message_delay_ms(),
            utc_offset_minutes: 0,
        }
    }
}

impl Default for StoreSection {
    fn default() -> Self {
        Self {
            path: default_store_path(),
            lock_stale_secs: default_lock_stale_secs(),
        }
    }
}

impl Default for CollectSection {
    fn default() -> Self {
        Self {
            concurrency: default_concurrency(),
            timeout_secs: default_timeout_secs(),
            user_agent: default_user_agent(),
        }
    }
}

impl Default for DigestConfig {
    fn default() -> Self {
        Self {
            digest: DigestSection::default(),
            store: StoreSection::default(),
            collect: CollectSection::default(),
            keywords: seed::default_keywords(),
            sources: seed::default_sources(),
        }
    }
}

impl StoreSection {
    /// Advisory lock file that sits next to the store file.
    pub fn lock_path(&self) -> PathBuf {
        let mut os = self.path.clone().into_os_string();
        os.push(".lock");
        PathBuf::from(os)
    }

    /// Age after which a leftover lock is taken over. Zero disables takeover.
    pub fn lock_stale(&self) -> Duration {
        Duration::from_secs(self.lock_stale_secs)
    }
}

impl CollectSection {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl DigestConfig {
    pub fn from_toml_str(s: &str) -> Result<Self> {
        let cfg: DigestConfig = toml::from_str(s).context("parsing digest config TOML")?;
        Ok(cfg)
    }

    /// Load from an explicit path, apply env overrides and validate.
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("reading digest config from {}", path.display()))?;
        let mut cfg = Self::from_toml_str(&content)?;
        cfg.apply_env_overrides()?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Load using env var + fallbacks:
    /// 1) $DIGEST_CONFIG_PATH (must exist)
    /// 2) config/digest.toml
    /// 3) built-in defaults
    pub fn load_default() -> Result<Self> {
        if let Ok(p) = std::env::var(ENV_CONFIG_PATH) {
            let pb = PathBuf::from(p);
            if !pb.exists() {
                return Err(anyhow!("{ENV_CONFIG_PATH} points to non-existent path"));
            }
            return Self::load_from(&pb);
        }
        let default_p = PathBuf::from(DEFAULT_CONFIG_PATH);
        if default_p.exists() {
            return Self::load_from(&default_p);
        }
        tracing::info!("no digest config file found, using built-in defaults");
        let mut cfg = Self::default();
        cfg.apply_env_overrides()?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Scalar overrides from the environment. A present but unparsable value is an error.
    pub fn apply_env_overrides(&mut self) -> Result<()> {
        if let Some(v) = parse_env::<i32>(ENV_MIN_SCORE)? {
            self.digest.min_score = v;
        }
        if let Some(v) = parse_env::<usize>(ENV_MAX_ITEMS)? {
            self.digest.max_items = v;
        }
        if let Some(v) = parse_env::<i32>(ENV_BIG_RELEASE_THRESHOLD)? {
            self.digest.big_release_threshold = v;
        }
        if let Ok(p) = std::env::var(ENV_STORE_PATH) {
            if !p.trim().is_empty() {
                self.store.path = PathBuf::from(p.trim());
            }
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        let d = &self.digest;
        if d.min_score < 0 {
            bail!("digest.min_score must be >= 0 (got {})", d.min_score);
        }
        if d.max_items == 0 {
            bail!("digest.max_items must be > 0");
        }
        if d.max_message_len < MIN_MESSAGE_LEN {
            bail!(
                "digest.max_message_len must be >= {MIN_MESSAGE_LEN} (got {})",
                d.max_message_len
            );
        }
        if FixedOffset::east_opt(d.utc_offset_minutes.saturating_mul(60)).is_none() {
            bail!("digest.utc_offset_minutes out of range ({})", d.utc_offset_minutes);
        }
        if self.collect.concurrency == 0 {
            bail!("collect.concurrency must be > 0");
        }
        self.keyword_table()?;
        Ok(())
    }

    pub fn keyword_table(&self) -> Result<KeywordTable> {
        KeywordTable::from_pairs(self.keywords.iter().map(|(k, w)| (k.as_str(), *w)))
            .context("invalid [keywords] table")
    }

    /// Emoji marker per source name, for sources that set one.
    pub fn markers(&self) -> HashMap<String, String> {
        self.sources
            .iter()
            .filter_map(|s| s.emoji().map(|e| (s.display_name(), e.to_string())))
            .collect()
    }

    /// Offset used for the digest header timestamp. Falls back to UTC.
    pub fn utc_offset(&self) -> FixedOffset {
        FixedOffset::east_opt(self.digest.utc_offset_minutes.saturating_mul(60))
            .unwrap_or_else(|| Utc.fix())
    }

    pub fn inter_message_delay(&self) -> Duration {
        Duration::from_millis(self.digest.inter_message_delay_ms)
    }
}

fn parse_env<T: FromStr>(name: &str) -> Result<Option<T>>
where
    T::Err: std::fmt::Display,
{
    match std::env::var(name) {
        Ok(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|e| anyhow!("{name}={raw:?} is not valid: {e}")),
        _ => Ok(None),
    }
}
