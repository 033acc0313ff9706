//! Per-word occurrence counts from the build's counting pass
//!
//! Small word spaces are counted in a flat array indexed by word; larger ones
//! use a hash map holding only the words actually seen.

use crate::constants::DENSE_COUNT_LIMIT;
use crate::packing::Word;
use ahash::AHashMap;

/// Occurrence count of every word seen in a database
#[derive(Debug, Clone)]
pub enum WordCounts {
    /// One counter per word of the space
    Dense(Vec<u32>),
    /// Counters for the words seen, keyed by word
    Sparse(AHashMap<Word, u32>),
}

impl WordCounts {
    /// Empty counts for a word space of `space` words
    pub fn for_space(space: u64) -> Self {
        if space <= DENSE_COUNT_LIMIT {
            WordCounts::Dense(vec![0; space as usize])
        } else {
            WordCounts::Sparse(AHashMap::new())
        }
    }

    /// Record one more occurrence of `word`
    ///
    /// Counts saturate at `u32::MAX`, far above any usable threshold.
    #[inline]
    pub fn increment(&mut self, word: Word) {
        let slot = match self {
            WordCounts::Dense(counts) => &mut counts[word as usize],
            WordCounts::Sparse(counts) => counts.entry(word).or_insert(0),
        };
        *slot = slot.saturating_add(1);
    }

    /// Occurrences of `word`
    #[inline]
    pub fn get(&self, word: Word) -> u32 {
        match self {
            WordCounts::Dense(counts) => counts.get(word as usize).copied().unwrap_or(0),
            WordCounts::Sparse(counts) => counts.get(&word).copied().unwrap_or(0),
        }
    }

    /// Whether `word` gets a hit list under `threshold`
    #[inline]
    pub fn is_indexed(&self, word: Word, threshold: u32) -> bool {
        is_indexed_count(self.get(word), threshold)
    }

    /// Number of distinct words seen
    pub fn distinct(&self) -> u64 {
        match self {
            WordCounts::Dense(counts) => counts.iter().filter(|&&c| c > 0).count() as u64,
            WordCounts::Sparse(counts) => counts.len() as u64,
        }
    }

    /// Whether the dense representation is in use
    pub fn is_dense(&self) -> bool {
        matches!(self, WordCounts::Dense(_))
    }

    /// `(word, count)` for every word seen, in ascending word order
    pub fn iter_nonzero(&self) -> Box<dyn Iterator<Item = (Word, u32)> + '_> {
        match self {
            WordCounts::Dense(counts) => Box::new(
                counts
                    .iter()
                    .enumerate()
                    .filter(|&(_, &c)| c > 0)
                    .map(|(w, &c)| (w as Word, c)),
            ),
            WordCounts::Sparse(counts) => {
                let mut entries: Vec<(Word, u32)> =
                    counts.iter().map(|(&w, &c)| (w, c)).collect();
                entries.sort_unstable_by_key(|&(w, _)| w);
                Box::new(entries.into_iter())
            }
        }
    }
}

/// A word with `count` occurrences is indexed iff `0 < count < threshold`
#[inline]
pub fn is_indexed_count(count: u32, threshold: u32) -> bool {
    count > 0 && count < threshold
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_representation_choice() {
        assert!(WordCounts::for_space(256).is_dense());
        assert!(WordCounts::for_space(DENSE_COUNT_LIMIT).is_dense());
        assert!(!WordCounts::for_space(DENSE_COUNT_LIMIT * 4).is_dense());
    }

    #[test]
    fn test_dense_and_sparse_agree() {
        let words = [5u64, 9, 5, 200, 5, 9];
        let mut dense = WordCounts::for_space(256);
        let mut sparse = WordCounts::Sparse(AHashMap::new());
        for &w in &words {
            dense.increment(w);
            sparse.increment(w);
        }
        for w in 0..256 {
            assert_eq!(dense.get(w), sparse.get(w), "word {w}");
        }
        assert_eq!(dense.get(5), 3);
        assert_eq!(dense.distinct(), 3);
        assert_eq!(sparse.distinct(), 3);

        let expected = vec![(5, 3), (9, 2), (200, 1)];
        assert_eq!(dense.iter_nonzero().collect::<Vec<_>>(), expected);
        assert_eq!(sparse.iter_nonzero().collect::<Vec<_>>(), expected);
    }

    #[test]
    fn test_threshold_is_strict() {
        assert!(!is_indexed_count(0, 10));
        assert!(is_indexed_count(1, 10));
        assert!(is_indexed_count(9, 10));
        assert!(!is_indexed_count(10, 10));
        // A threshold of 1 indexes nothing
        assert!(!is_indexed_count(1, 1));
    }

    #[test]
    fn test_saturating_increment() {
        let mut counts = WordCounts::Dense(vec![u32::MAX - 1; 2]);
        counts.increment(0);
        counts.increment(0);
        assert_eq!(counts.get(0), u32::MAX);
    }
}
