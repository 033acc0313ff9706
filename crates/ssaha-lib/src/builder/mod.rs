//! Builder module for constructing DataStore files
//!
//! This module implements the two-pass build:
//! 1. Parse input sequences (FASTA/FASTQ, or any [`SequenceDatabase`])
//! 2. Count sampled words per word
//! 3. Lay out hash, name and hit tables
//! 4. Fill names and hit lists in a second pass
//! 5. Finalize and publish the file
//!
//! [`SequenceDatabase`]: crate::sequence::SequenceDatabase

pub mod config;
pub mod parse;
pub mod word_counts;
pub mod datastore_builder;

pub use config::BuildConfiguration;
pub use datastore_builder::{BuildReport, DataStoreBuilder};
pub use parse::FastxDatabase;
pub use word_counts::WordCounts;
