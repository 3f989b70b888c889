//! String utilities for bibliographic record comparison
//!
//! This crate provides the normalization and comparison helpers the
//! dedup engine relies on: text normalization, candidate-key derivation,
//! author matching, and sortable id keys.

pub mod author;
pub mod sort_key;
pub mod text_normalization;

pub use author::author_match;
pub use sort_key::create_id_sort_key;
pub use text_normalization::{create_title_key, normalize};
