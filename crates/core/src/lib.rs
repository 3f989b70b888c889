//! Core deduplication engine for bibliographic records
//!
//! This crate decides which records from different catalog sources
//! describe the same work and maintains the persistent dedup groups:
//! candidate generation over indexed keys, the rule-ladder match
//! predicate, transactional group maintenance, and the component-part
//! cascade.

pub mod candidates;
pub mod components;
pub mod engine;
pub mod error;
pub mod matching;
pub mod overload;
pub mod sled_store;
pub mod store;

pub use engine::{DedupEngine, EngineStats};
pub use error::{Error, Result};
pub use matching::{FormatMapper, IdentityFormatMapper};
pub use sled_store::SledStore;
pub use store::{MemoryStore, RecordStore};

#[cfg(test)]
mod tests {
    #[test]
    fn it_works() {
        assert_eq!(2 + 2, 4);
    }
}
