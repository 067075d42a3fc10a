//! Typed errors for the digest pipeline.
//!
//! Only [`DeliveryError`] can stop a run early, and only for the message that
//! failed and the ones after it. Everything else degrades the run.

use std::path::PathBuf;
use std::time::Duration;

/// A collected item whose link is not a usable absolute http(s) URL.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("malformed item link {link:?}: {reason}")]
pub struct MalformedItemError {
    pub link: String,
    pub reason: String,
}

impl MalformedItemError {
    pub fn new(link: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            link: link.into(),
            reason: reason.into(),
        }
    }
}

/// A source that errored or timed out during collection.
#[derive(Debug, thiserror::Error)]
pub enum SourceUnavailableError {
    #[error("source {provider} timed out after {timeout:?}")]
    Timeout { provider: String, timeout: Duration },

    #[error("source {provider} failed: {message}")]
    Failed { provider: String, message: String },
}

impl SourceUnavailableError {
    pub fn provider(&self) -> &str {
        match self {
            Self::Timeout { provider, .. } | Self::Failed { provider, .. } => provider,
        }
    }
}

/// The notifier could not confirm delivery of a message.
#[derive(Debug, thiserror::Error)]
pub enum DeliveryError {
    #[error("transport error: {0}")]
    Transport(String),

    #[error("destination rejected message (status {status}): {description}")]
    Rejected { status: u16, description: String },

    #[error("gave up after {attempts} attempts: {last}")]
    Exhausted { attempts: u8, last: String },
}

/// The persisted sent store cannot be read or written.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("store I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("store file {path:?} is corrupt: {source}")]
    Corrupt {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("store is locked by another run ({path:?})")]
    Locked { path: PathBuf },

    #[error("store unavailable: {0}")]
    Unavailable(String),
}
