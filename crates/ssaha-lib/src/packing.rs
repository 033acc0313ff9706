//! Residue packing
//!
//! A [`Packing`] maps each residue of a small alphabet to an integer code and
//! packs `word_length` consecutive codes into a single [`Word`], most
//! significant residue first, using `ceil(log2(alphabet_size))` bits per
//! residue.
//!
//! Default DNA encoding:
//! - A (65/97)  -> 00
//! - C (67/99)  -> 01
//! - G (71/103) -> 10
//! - T (84/116) -> 11
//!
//! Ambiguity codes (N, R, Y, ...) have no code and are rejected.

use crate::constants::{ceil_log2, MAX_WORD_BITS};
use crate::error::{Result, SsahaError};
use crate::sequence::SymbolSequence;
use std::fmt;

/// A packed word of residue codes
pub type Word = u64;

/// Marks a byte with no code in the lookup table
const NO_CODE: u8 = u8::MAX;

const DNA_SYMBOLS: &[u8] = b"ACGT";
const PROTEIN_SYMBOLS: &[u8] = b"ACDEFGHIKLMNPQRSTVWY";

/// Which alphabet a packing encodes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PackingKind {
    /// Unambiguous DNA (A, C, G, T), 2 bits per residue
    Dna,
    /// The 20 standard amino acids, 5 bits per residue
    Protein,
    /// A caller-defined alphabet
    Custom,
}

impl PackingKind {
    fn tag(self) -> u8 {
        match self {
            Self::Dna => 1,
            Self::Protein => 2,
            Self::Custom => 3,
        }
    }

    fn from_tag(tag: u8) -> Option<Self> {
        match tag {
            1 => Some(Self::Dna),
            2 => Some(Self::Protein),
            3 => Some(Self::Custom),
            _ => None,
        }
    }
}

impl fmt::Display for PackingKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Dna => write!(f, "DNA"),
            Self::Protein => write!(f, "protein"),
            Self::Custom => write!(f, "custom"),
        }
    }
}

/// Bijective mapping between residues and codes, and between residue
/// windows and packed words
#[derive(Clone, PartialEq, Eq)]
pub struct Packing {
    kind: PackingKind,
    symbols: Vec<u8>,
    codes: [u8; 256],
    bits_per_residue: usize,
}

impl Packing {
    /// Packing for unambiguous DNA
    pub fn dna() -> Self {
        Self::from_symbols(PackingKind::Dna, DNA_SYMBOLS)
    }

    /// Packing for the 20 standard amino acids
    pub fn protein() -> Self {
        Self::from_symbols(PackingKind::Protein, PROTEIN_SYMBOLS)
    }

    /// Packing for a caller-defined alphabet
    ///
    /// Symbols are matched case-insensitively; codes follow the order given.
    ///
    /// # Errors
    /// Returns `InvalidPacking` for fewer than two symbols, more than 255,
    /// non-graphic ASCII, or duplicates.
    pub fn custom(symbols: &[u8]) -> Result<Self> {
        if symbols.len() < 2 || symbols.len() >= NO_CODE as usize {
            return Err(SsahaError::InvalidPacking(format!(
                "alphabet must have between 2 and {} symbols, got {}",
                NO_CODE - 1,
                symbols.len()
            )));
        }
        let mut upper = Vec::with_capacity(symbols.len());
        for &s in symbols {
            if !s.is_ascii_graphic() {
                return Err(SsahaError::InvalidPacking(format!(
                    "symbol byte {s} is not printable ASCII"
                )));
            }
            let s = s.to_ascii_uppercase();
            if upper.contains(&s) {
                return Err(SsahaError::InvalidPacking(format!(
                    "duplicate symbol {:?}",
                    s as char
                )));
            }
            upper.push(s);
        }
        Ok(Self::from_symbols(PackingKind::Custom, &upper))
    }

    fn from_symbols(kind: PackingKind, symbols: &[u8]) -> Self {
        let mut codes = [NO_CODE; 256];
        for (code, &s) in symbols.iter().enumerate() {
            codes[s.to_ascii_uppercase() as usize] = code as u8;
            codes[s.to_ascii_lowercase() as usize] = code as u8;
        }
        Self {
            kind,
            symbols: symbols.to_vec(),
            codes,
            bits_per_residue: ceil_log2(symbols.len() as u64),
        }
    }

    /// Alphabet variant
    pub fn kind(&self) -> PackingKind {
        self.kind
    }

    /// Symbols in code order
    pub fn symbols(&self) -> &[u8] {
        &self.symbols
    }

    /// Number of symbols
    pub fn alphabet_size(&self) -> usize {
        self.symbols.len()
    }

    /// Bits used per residue
    pub fn bits_per_residue(&self) -> usize {
        self.bits_per_residue
    }

    /// Longest word whose packed form fits the word-space limit
    pub fn max_word_length(&self) -> usize {
        MAX_WORD_BITS / self.bits_per_residue
    }

    /// Check that `word_length` is usable with this packing
    pub fn validate_word_length(&self, word_length: usize) -> Result<()> {
        let max = self.max_word_length();
        if word_length == 0 || word_length > max {
            return Err(SsahaError::InvalidWordLength { word_length, max });
        }
        Ok(())
    }

    /// Number of distinct words of `word_length` residues
    #[inline]
    pub fn word_space(&self, word_length: usize) -> u64 {
        1u64 << (word_length * self.bits_per_residue)
    }

    /// Mask selecting the bits of a word of `word_length` residues
    #[inline]
    pub fn word_mask(&self, word_length: usize) -> Word {
        self.word_space(word_length) - 1
    }

    /// Code for `residue`, if it belongs to the alphabet
    #[inline]
    pub fn code(&self, residue: u8) -> Option<u8> {
        match self.codes[residue as usize] {
            NO_CODE => None,
            code => Some(code),
        }
    }

    /// Encode a single residue
    ///
    /// # Errors
    /// Returns `UnsupportedResidue` for symbols outside the alphabet
    #[inline]
    pub fn encode(&self, residue: u8) -> Result<u8> {
        self.code(residue)
            .ok_or(SsahaError::UnsupportedResidue { residue })
    }

    /// Upper-case symbol for `code`, if the code is in range
    #[inline]
    pub fn decode(&self, code: u8) -> Option<u8> {
        self.symbols.get(code as usize).copied()
    }

    /// Shift one more residue code into `word`
    #[inline]
    pub fn roll(&self, word: Word, code: u8, mask: Word) -> Word {
        ((word << self.bits_per_residue) | code as Word) & mask
    }

    /// Pack a whole residue window into a word
    pub fn pack_word(&self, residues: &[u8]) -> Result<Word> {
        self.validate_word_length(residues.len())?;
        let mask = self.word_mask(residues.len());
        residues
            .iter()
            .try_fold(0, |word, &r| Ok(self.roll(word, self.encode(r)?, mask)))
    }

    /// Unpack a word back into its `word_length` residues
    ///
    /// Returns `None` if any packed code has no symbol (possible for
    /// alphabets whose size is not a power of two).
    pub fn unpack_word(&self, word: Word, word_length: usize) -> Option<Vec<u8>> {
        let residue_mask = (1u64 << self.bits_per_residue) - 1;
        (0..word_length)
            .rev()
            .map(|i| self.decode(((word >> (i * self.bits_per_residue)) & residue_mask) as u8))
            .collect()
    }

    /// Word for the first `word_length` residues of `sequence` (positions `1..=word_length`)
    ///
    /// # Errors
    /// `SequenceTooShort` if the sequence has fewer than `word_length`
    /// residues; `UnsupportedResidue` if the window holds a residue outside
    /// the alphabet.
    pub fn prime_word<S>(&self, sequence: &S, word_length: usize) -> Result<Word>
    where
        S: SymbolSequence + ?Sized,
    {
        self.validate_word_length(word_length)?;
        if sequence.len() < word_length {
            return Err(SsahaError::SequenceTooShort {
                length: sequence.len(),
                word_length,
            });
        }
        let mask = self.word_mask(word_length);
        (1..=word_length).try_fold(0, |word, pos| {
            Ok(self.roll(word, self.encode(sequence.residue_at(pos))?, mask))
        })
    }

    /// Word for the window ending at `new_end` (1-based), computed from the
    /// word of the window ending at `new_end - 1`
    ///
    /// # Errors
    /// `SequenceTooShort` if `new_end < word_length`; `OutOfBounds` if
    /// `new_end` is past the end of the sequence; `UnsupportedResidue` for a
    /// residue outside the alphabet.
    pub fn next_word<S>(
        &self,
        sequence: &S,
        previous: Word,
        new_end: usize,
        word_length: usize,
    ) -> Result<Word>
    where
        S: SymbolSequence + ?Sized,
    {
        self.validate_word_length(word_length)?;
        if new_end < word_length {
            return Err(SsahaError::SequenceTooShort {
                length: new_end,
                word_length,
            });
        }
        if new_end == 0 || new_end > sequence.len() {
            return Err(SsahaError::OutOfBounds {
                offset: new_end as u64,
                width: 1,
                size: sequence.len() as u64,
            });
        }
        let code = self.encode(sequence.residue_at(new_end))?;
        Ok(self.roll(previous, code, self.word_mask(word_length)))
    }

    /// Serialized form stored in the DataStore header
    ///
    /// Layout: `u8 kind tag, u8 bits_per_residue, u16 symbol_count, u8[] symbols`
    pub fn descriptor(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(4 + self.symbols.len());
        out.push(self.kind.tag());
        out.push(self.bits_per_residue as u8);
        out.extend_from_slice(&(self.symbols.len() as u16).to_le_bytes());
        out.extend_from_slice(&self.symbols);
        out
    }

    /// Rebuild a packing from its serialized descriptor
    pub fn from_descriptor(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < 4 {
            return Err(SsahaError::InvalidPacking(format!(
                "descriptor of {} bytes is too short",
                bytes.len()
            )));
        }
        let kind = PackingKind::from_tag(bytes[0]).ok_or_else(|| {
            SsahaError::InvalidPacking(format!("unknown packing tag {}", bytes[0]))
        })?;
        let bits = bytes[1] as usize;
        let count = u16::from_le_bytes([bytes[2], bytes[3]]) as usize;
        let symbols = &bytes[4..];
        if symbols.len() != count {
            return Err(SsahaError::InvalidPacking(format!(
                "descriptor declares {count} symbols but holds {}",
                symbols.len()
            )));
        }
        let packing = match kind {
            PackingKind::Dna => Self::dna(),
            PackingKind::Protein => Self::protein(),
            PackingKind::Custom => Self::custom(symbols)?,
        };
        if packing.symbols != symbols || packing.bits_per_residue != bits {
            return Err(SsahaError::InvalidPacking(format!(
                "descriptor for {kind} packing does not match its alphabet"
            )));
        }
        Ok(packing)
    }
}

impl Default for Packing {
    fn default() -> Self {
        Self::dna()
    }
}

impl fmt::Debug for Packing {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Packing")
            .field("kind", &self.kind)
            .field("symbols", &String::from_utf8_lossy(&self.symbols))
            .field("bits_per_residue", &self.bits_per_residue)
            .finish()
    }
}

impl fmt::Display for Packing {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} ({}, {} bits/residue)",
            self.kind,
            String::from_utf8_lossy(&self.symbols),
            self.bits_per_residue
        )
    }
}
