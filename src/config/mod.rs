// src/config/mod.rs
pub mod digest;
pub(crate) mod seed;

pub use digest::{CollectSection, DigestConfig, DigestSection, SourceSpec, StoreSection};
