//! Sequence sources consumed by the builder and searcher
//!
//! The core only needs a name and random access to residues by 1-based
//! position. Anything that can hand out such sequences, possibly more than
//! once, is a [`SequenceDatabase`].

use crate::error::Result;
use crate::packing::PackingKind;

/// A named sequence of residues addressable by 1-based position
pub trait SymbolSequence {
    /// Sequence name
    fn name(&self) -> &str;

    /// Number of residues
    fn len(&self) -> usize;

    /// Residue at 1-based `position`
    ///
    /// # Panics
    /// May panic if `position` is 0 or greater than `len()`.
    fn residue_at(&self, position: usize) -> u8;

    /// Whether the sequence has no residues
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Alphabet the sequence declares, if it declares one
    ///
    /// Undeclared sequences are checked residue by residue against the
    /// packing instead.
    fn alphabet(&self) -> Option<PackingKind> {
        None
    }
}

/// An owned sequence
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamedSequence {
    name: String,
    residues: Vec<u8>,
    alphabet: Option<PackingKind>,
}

impl NamedSequence {
    /// Create a sequence with no declared alphabet
    pub fn new(name: impl Into<String>, residues: impl Into<Vec<u8>>) -> Self {
        Self {
            name: name.into(),
            residues: residues.into(),
            alphabet: None,
        }
    }

    /// Declare the alphabet of this sequence
    pub fn with_alphabet(mut self, alphabet: PackingKind) -> Self {
        self.alphabet = Some(alphabet);
        self
    }

    /// Raw residues
    pub fn residues(&self) -> &[u8] {
        &self.residues
    }
}

impl SymbolSequence for NamedSequence {
    fn name(&self) -> &str {
        &self.name
    }

    fn len(&self) -> usize {
        self.residues.len()
    }

    #[inline]
    fn residue_at(&self, position: usize) -> u8 {
        self.residues[position - 1]
    }

    fn alphabet(&self) -> Option<PackingKind> {
        self.alphabet
    }
}

/// A borrowed sequence, used to avoid copying parser-owned records
#[derive(Debug, Clone, Copy)]
pub struct SequenceRef<'a> {
    name: &'a str,
    residues: &'a [u8],
}

impl<'a> SequenceRef<'a> {
    /// Wrap a name and residue slice
    pub fn new(name: &'a str, residues: &'a [u8]) -> Self {
        Self { name, residues }
    }
}

impl SymbolSequence for SequenceRef<'_> {
    fn name(&self) -> &str {
        self.name
    }

    fn len(&self) -> usize {
        self.residues.len()
    }

    #[inline]
    fn residue_at(&self, position: usize) -> u8 {
        self.residues[position - 1]
    }
}

/// A re-iterable collection of sequences
///
/// The builder walks the database twice and relies on both walks presenting
/// the same sequences in the same order.
pub trait SequenceDatabase {
    /// Call `f` once per sequence, in database order, stopping at the first error
    fn for_each_sequence(
        &self,
        f: &mut dyn FnMut(&dyn SymbolSequence) -> Result<()>,
    ) -> Result<()>;
}

impl SequenceDatabase for [NamedSequence] {
    fn for_each_sequence(
        &self,
        f: &mut dyn FnMut(&dyn SymbolSequence) -> Result<()>,
    ) -> Result<()> {
        self.iter().try_for_each(|seq| f(seq))
    }
}

impl SequenceDatabase for Vec<NamedSequence> {
    fn for_each_sequence(
        &self,
        f: &mut dyn FnMut(&dyn SymbolSequence) -> Result<()>,
    ) -> Result<()> {
        self.as_slice().for_each_sequence(f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_one_based_access() {
        let seq = NamedSequence::new("chr1", "ACGT");
        assert_eq!(seq.name(), "chr1");
        assert_eq!(seq.len(), 4);
        assert_eq!(seq.residue_at(1), b'A');
        assert_eq!(seq.residue_at(4), b'T');
        assert!(!seq.is_empty());
        assert_eq!(seq.alphabet(), None);

        let borrowed = SequenceRef::new("r", b"GG");
        assert_eq!(borrowed.residue_at(2), b'G');
    }

    #[test]
    fn test_declared_alphabet() {
        let seq = NamedSequence::new("p", "MKV").with_alphabet(PackingKind::Protein);
        assert_eq!(seq.alphabet(), Some(PackingKind::Protein));
    }

    #[test]
    fn test_database_order_and_early_stop() {
        let db = vec![
            NamedSequence::new("a", "A"),
            NamedSequence::new("b", "C"),
            NamedSequence::new("c", "G"),
        ];
        let mut names = Vec::new();
        db.for_each_sequence(&mut |s| {
            names.push(s.name().to_string());
            Ok(())
        })
        .unwrap();
        assert_eq!(names, ["a", "b", "c"]);

        let mut seen = 0;
        let res = db.for_each_sequence(&mut |s| {
            seen += 1;
            if s.name() == "b" {
                Err(crate::error::SsahaError::source_failure("stop"))
            } else {
                Ok(())
            }
        });
        assert!(res.is_err());
        assert_eq!(seen, 2);
    }
}
