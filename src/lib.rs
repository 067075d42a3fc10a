// src/lib.rs
// Public library surface for the binary and integration tests.

pub mod config;
pub mod error;
pub mod metrics;

// Collection
pub mod ingest;

// Core pipeline: normalize → score → dedup → categorize → assemble
pub mod categorize;
pub mod dedup;
pub mod digest;
pub mod normalize;
pub mod scoring;

// Delivery & persistence
pub mod notify;
pub mod pipeline;
pub mod store;

// ---- Re-exports for stable public API ----
pub use crate::categorize::{Categorized, Categorizer, Category};
pub use crate::config::DigestConfig;
pub use crate::digest::{DigestAssembler, DigestMessage};
pub use crate::error::{DeliveryError, MalformedItemError, SourceUnavailableError, StoreError};
pub use crate::ingest::types::{RawItem, SourceKind, SourceProvider};
pub use crate::normalize::{IdentityKey, NewsItem};
pub use crate::notify::{Notifier, TelegramNotifier};
pub use crate::pipeline::{DigestPipeline, PreparedDigest, RunReport, RunStats};
pub use crate::scoring::{KeywordTable, Scorer};
pub use crate::store::{JsonFileStore, MemoryStore, RunLock, SentStore, UnavailableStore};
