// SSAHA: Sequence Search and Alignment by Hashing Algorithm
//
// An on-disk k-mer DataStore for biological sequences, with exact-match
// seed search and chaining of collinear hits.

#![doc = include_str!("../README.md")]
#![warn(missing_docs)]

pub mod constants;
pub mod error;
pub mod packing;
pub mod sequence;
pub mod words;
pub mod large_buffer;
pub mod serialization;
pub mod builder;
pub mod datastore;
pub mod search;
pub mod hit_merger;
pub mod check;

// Re-export common types at crate root
pub use error::{ErrorCategory, Result, SsahaError};
pub use packing::{Packing, PackingKind, Word};
pub use sequence::{NamedSequence, SequenceDatabase, SequenceRef, SymbolSequence};
pub use words::WordIterator;
pub use large_buffer::{LargeBuffer, MapMode};
pub use builder::{BuildConfiguration, BuildReport, DataStoreBuilder, FastxDatabase};
pub use datastore::{DataStore, HitEntry, Hits};
pub use search::{Hit, HitCollector, QueryHits, SearchListener, SearchReport, Searcher};
pub use hit_merger::{merge_hits, HitMerger};
pub use check::{check_datastore, CheckReport};

/// Version information
pub fn version() -> (u8, u8, u8) {
    constants::VERSION
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        let (major, minor, patch) = version();
        assert_eq!(major, 0);
        assert_eq!(minor, 1);
        assert_eq!(patch, 0);
    }
}
