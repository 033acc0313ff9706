//! Sampled word windows over a sequence
//!
//! [`WordIterator`] is the only place that walks a sequence into words. The
//! builder's count and fill passes, the searcher and the self-check all go
//! through it, so every caller sees exactly the same windows.

use crate::packing::{Packing, Word};
use crate::sequence::SymbolSequence;

/// Iterator over `(start_position, word)` for the sampled windows of a sequence
///
/// Windows start at positions `1, 1 + step, 1 + 2*step, ...` (1-based) and
/// are `word_length` residues long. The word is rolled one residue at a time.
/// A residue outside the alphabet resets the rolling state, and every sampled
/// window that covers it is skipped and counted rather than yielded.
pub struct WordIterator<'a, S: SymbolSequence + ?Sized> {
    sequence: &'a S,
    packing: &'a Packing,
    word_length: usize,
    step: usize,
    mask: Word,
    /// 1-based position of the next residue to roll in
    next_pos: usize,
    word: Word,
    /// Number of consecutive valid residues ending at the last rolled position
    valid_run: usize,
    sampled: u64,
    skipped: u64,
}

impl<'a, S: SymbolSequence + ?Sized> WordIterator<'a, S> {
    /// Create an iterator over `sequence`
    ///
    /// `word_length` must already be valid for `packing`, and `step` at least 1.
    pub fn new(sequence: &'a S, packing: &'a Packing, word_length: usize, step: usize) -> Self {
        debug_assert!(step >= 1);
        debug_assert!(packing.validate_word_length(word_length).is_ok());
        Self {
            sequence,
            packing,
            word_length,
            step: step.max(1),
            mask: packing.word_mask(word_length),
            next_pos: 1,
            word: 0,
            valid_run: 0,
            sampled: 0,
            skipped: 0,
        }
    }

    /// Windows sampled so far, yielded or skipped
    pub fn windows_sampled(&self) -> u64 {
        self.sampled
    }

    /// Sampled windows skipped because they hold an unsupported residue
    pub fn windows_skipped(&self) -> u64 {
        self.skipped
    }

    #[inline]
    fn is_sampled(&self, start: usize) -> bool {
        (start - 1) % self.step == 0
    }
}

impl<S: SymbolSequence + ?Sized> Iterator for WordIterator<'_, S> {
    type Item = (usize, Word);

    fn next(&mut self) -> Option<Self::Item> {
        let len = self.sequence.len();
        while self.next_pos <= len {
            let end = self.next_pos;
            self.next_pos += 1;

            match self.packing.code(self.sequence.residue_at(end)) {
                Some(code) => {
                    self.word = self.packing.roll(self.word, code, self.mask);
                    self.valid_run += 1;
                }
                None => {
                    self.word = 0;
                    self.valid_run = 0;
                }
            }

            if end < self.word_length {
                continue;
            }
            let start = end + 1 - self.word_length;
            if !self.is_sampled(start) {
                continue;
            }
            self.sampled += 1;
            if self.valid_run >= self.word_length {
                return Some((start, self.word));
            }
            self.skipped += 1;
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sequence::NamedSequence;

    fn collect(residues: &str, k: usize, step: usize) -> (Vec<(usize, Word)>, u64, u64) {
        let p = Packing::dna();
        let seq = NamedSequence::new("s", residues);
        let mut it = WordIterator::new(&seq, &p, k, step);
        let words: Vec<_> = it.by_ref().collect();
        (words, it.windows_sampled(), it.windows_skipped())
    }

    #[test]
    fn test_every_window_step_one() {
        let p = Packing::dna();
        let residues = "ACGTTGCA";
        let (words, sampled, skipped) = collect(residues, 3, 1);
        assert_eq!(sampled, 6);
        assert_eq!(skipped, 0);
        let expected: Vec<_> = (1..=6)
            .map(|start| (start, p.pack_word(&residues.as_bytes()[start - 1..start + 2]).unwrap()))
            .collect();
        assert_eq!(words, expected);
    }

    #[test]
    fn test_step_samples_from_first_position() {
        let (words, sampled, _) = collect("ACGTACGTAC", 4, 3);
        let starts: Vec<_> = words.iter().map(|&(s, _)| s).collect();
        // Windows start at 1, 4, 7; 10 would run off the end
        assert_eq!(starts, [1, 4, 7]);
        assert_eq!(sampled, 3);
    }

    #[test]
    fn test_unsupported_residue_skips_covering_windows() {
        let p = Packing::dna();
        // N at position 4 spoils windows starting at 2, 3, 4
        let (words, sampled, skipped) = collect("ACGNTACG", 3, 1);
        assert_eq!(sampled, 6);
        assert_eq!(skipped, 3);
        assert_eq!(
            words,
            vec![
                (1, p.pack_word(b"ACG").unwrap()),
                (5, p.pack_word(b"TAC").unwrap()),
                (6, p.pack_word(b"ACG").unwrap()),
            ]
        );
    }

    #[test]
    fn test_short_sequence_yields_nothing() {
        let (words, sampled, skipped) = collect("AC", 3, 1);
        assert!(words.is_empty());
        assert_eq!(sampled, 0);
        assert_eq!(skipped, 0);
    }

    #[test]
    fn test_lowercase_residues() {
        let p = Packing::dna();
        let (words, _, _) = collect("acgt", 4, 1);
        assert_eq!(words, vec![(1, p.pack_word(b"ACGT").unwrap())]);
    }
}
