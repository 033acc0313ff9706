//! Verification of a DataStore against its source database
//!
//! Recounts every sampled word of the database and checks that words below
//! the threshold return exactly their true occurrences, and that every other
//! word returns nothing.

use crate::builder::word_counts::{is_indexed_count, WordCounts};
use crate::datastore::{DataStore, HitEntry};
use crate::error::Result;
use crate::packing::Word;
use crate::sequence::SequenceDatabase;
use crate::words::WordIterator;
use ahash::AHashMap;
use tracing::{info, warn};

/// Mismatches recorded in detail before the rest are only counted
const MAX_REPORTED_MISMATCHES: usize = 10;

/// Outcome of [`check_datastore`]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CheckReport {
    /// Words looked up
    pub words_checked: u64,
    /// Occurrences found where they were expected
    pub occurrences_verified: u64,
    /// Words whose hit list was wrong
    pub mismatched_words: u64,
    /// Descriptions of the first few mismatches
    pub mismatches: Vec<String>,
}

impl CheckReport {
    /// Whether the store matched the database everywhere
    pub fn is_ok(&self) -> bool {
        self.mismatched_words == 0
    }

    fn record(&mut self, description: String) {
        self.mismatched_words += 1;
        if self.mismatches.len() < MAX_REPORTED_MISMATCHES {
            warn!("{}", description);
            self.mismatches.push(description);
        }
    }
}

/// Check `store` against the database it was built from
///
/// Uses the packing, word length and step stored in `store`. Sequences are
/// numbered the way the builder numbers them, skipping those shorter than
/// one word.
pub fn check_datastore<D>(store: &DataStore, database: &D) -> Result<CheckReport>
where
    D: SequenceDatabase + ?Sized,
{
    let packing = store.packing();
    let word_length = store.word_length();
    let threshold = store.threshold();
    info!("Checking DataStore {} against its source...", store.path().display());

    // Expected occurrences, plus counts for words at or above the threshold
    let mut counts = WordCounts::for_space(store.word_space());
    let mut occurrences: AHashMap<Word, Vec<HitEntry>> = AHashMap::new();
    let mut sequence_id = 0u64;
    database.for_each_sequence(&mut |sequence| {
        if sequence.len() < word_length {
            return Ok(());
        }
        for (position, word) in WordIterator::new(sequence, packing, word_length, store.step()) {
            counts.increment(word);
            occurrences.entry(word).or_default().push(HitEntry {
                sequence_id,
                position: position as u32,
            });
        }
        sequence_id += 1;
        Ok(())
    })?;

    let mut report = CheckReport::default();
    if sequence_id != store.num_sequences() {
        report.record(format!(
            "database has {sequence_id} indexable sequences, store has {}",
            store.num_sequences()
        ));
    }

    for word in 0..store.word_space() {
        let count = counts.get(word);
        let found: Vec<HitEntry> = store.lookup(word)?.collect();
        report.words_checked += 1;

        if !is_indexed_count(count, threshold) {
            if !found.is_empty() {
                report.record(format!(
                    "word {word} occurs {count} times but returned {} hits",
                    found.len()
                ));
            }
            continue;
        }

        let expected = occurrences.get(&word).map(Vec::as_slice).unwrap_or_default();
        if found == expected {
            report.occurrences_verified += found.len() as u64;
        } else {
            report.record(format!(
                "word {word}: expected {} hits, found {}",
                expected.len(),
                found.len()
            ));
        }
    }

    info!(
        "  checked {} words, verified {} occurrences, {} mismatched",
        report.words_checked, report.occurrences_verified, report.mismatched_words
    );
    Ok(report)
}
