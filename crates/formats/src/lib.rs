//! Bibliographic record model and metadata views
//!
//! This crate provides the typed documents the dedup engine operates on,
//! the per-format metadata view implementations with their factory, and
//! a streaming reader for harvested record dumps.

pub mod dc;
pub mod error;
pub mod jsonl;
pub mod marc;
pub mod metadata;
pub mod record;

pub use error::{Error, Result};
pub use metadata::{MetadataView, RecordFactory};
pub use record::{now_millis, DedupGroup, KeyField, Record};
