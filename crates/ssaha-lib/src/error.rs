//! Error types for DataStore construction and search
//!
//! Every failure surfaces as one [`SsahaError`] variant. Variants are grouped
//! into four [`ErrorCategory`] values so callers can decide whether to skip an
//! input, fix their configuration, retry, or rebuild the index.

use thiserror::Error;

/// Broad class of an [`SsahaError`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Invalid parameters or mismatched packing; fatal to the operation
    Configuration,
    /// A residue or sequence that cannot be indexed; skipped by builds and searches
    Data,
    /// I/O failure while reading input or mapping/writing the index
    Resource,
    /// The index file is inconsistent with itself or with its source
    Corruption,
}

/// Error type for DataStore operations
#[derive(Error, Debug)]
pub enum SsahaError {
    /// Word length is zero or its word space does not fit the packing's bit budget
    #[error("Invalid word length {word_length}: must be in 1..={max} for this packing")]
    InvalidWordLength {
        /// Requested word length
        word_length: usize,
        /// Largest word length the packing supports
        max: usize,
    },

    /// Step between sampled windows must be at least 1
    #[error("Invalid step {0}: must be at least 1")]
    InvalidStep(usize),

    /// Repetitiveness threshold must be at least 1
    #[error("Invalid threshold {0}: must be at least 1")]
    InvalidThreshold(u32),

    /// Buffer page size smaller than the page overlap
    #[error("Invalid page size {page_size}: must be at least {min}")]
    InvalidPageSize {
        /// Requested page size
        page_size: u64,
        /// Smallest accepted page size
        min: u64,
    },

    /// Packing definition or descriptor is unusable
    #[error("Invalid packing: {0}")]
    InvalidPacking(String),

    /// A sequence declares an alphabet other than the configured packing
    #[error("Sequence {sequence:?} uses alphabet {found}, but the packing is {expected}")]
    IllegalAlphabet {
        /// Sequence name
        sequence: String,
        /// Packing configured for the build
        expected: String,
        /// Alphabet declared by the sequence
        found: String,
    },

    /// Query packing differs from the packing stored in the index
    #[error("Packing mismatch: index uses {stored}, query uses {requested}")]
    PackingMismatch {
        /// Packing stored in the index
        stored: String,
        /// Packing supplied by the caller
        requested: String,
    },

    /// Query word length differs from the word length stored in the index
    #[error("Unknown word length {requested}: index was built with word length {stored}")]
    UnknownWordLength {
        /// Word length stored in the index
        stored: usize,
        /// Word length supplied by the caller
        requested: usize,
    },

    /// Sequence name longer than the name field allows
    #[error("Sequence name is {length} bytes, longer than the maximum of {max}")]
    NameTooLong {
        /// Name length in bytes
        length: usize,
        /// Maximum name length in bytes
        max: usize,
    },

    /// Name table larger than its `u32` size field allows
    #[error("Name table of {bytes} bytes exceeds the maximum of {max}")]
    NameTableTooLarge {
        /// Total bytes of name table entries
        bytes: u64,
        /// Largest representable name table
        max: u64,
    },

    /// Sequence longer than a stored position can address
    #[error("Sequence {sequence:?} has {length} residues, more than {max} positions can address")]
    SequenceTooLong {
        /// Sequence name
        sequence: String,
        /// Sequence length
        length: usize,
        /// Largest addressable position
        max: u64,
    },

    /// Word value outside the word space of the index
    #[error("Word {word} is outside the word space of size {space}")]
    WordOutOfRange {
        /// Requested word
        word: u64,
        /// Number of distinct words
        space: u64,
    },

    /// Sequence id not present in the index
    #[error("Unknown sequence id {id}: index holds {count} sequences")]
    UnknownSequence {
        /// Requested id
        id: u64,
        /// Number of sequences in the index
        count: u64,
    },

    /// Write attempted through a read-only mapping
    #[error("Buffer is mapped read-only")]
    ReadOnlyBuffer,

    /// Access past the end of a large buffer
    #[error("Access of {width} bytes at offset {offset} is outside buffer of size {size}")]
    OutOfBounds {
        /// Requested offset
        offset: u64,
        /// Width of the access in bytes
        width: u64,
        /// Buffer size in bytes
        size: u64,
    },

    /// Residue not in the packing's alphabet
    #[error("Unsupported residue {:?} (byte {residue})", residue_char(.residue))]
    UnsupportedResidue {
        /// Offending residue byte
        residue: u8,
    },

    /// Sequence shorter than one word
    #[error("Sequence of length {length} is shorter than word length {word_length}")]
    SequenceTooShort {
        /// Sequence length
        length: usize,
        /// Word length
        word_length: usize,
    },

    /// I/O error while reading input or mapping the index
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Sequence source failed to produce records
    #[error("Sequence source error: {message}")]
    Source {
        /// Description of the failure
        message: String,
    },

    /// Index file structure is inconsistent
    #[error("Corrupt index: {reason}")]
    CorruptIndex {
        /// What was inconsistent
        reason: String,
    },

    /// The sequence database changed between the two build passes
    #[error("Sequence database changed between build passes: {reason}")]
    InconsistentPasses {
        /// What differed
        reason: String,
    },
}

fn residue_char(residue: &u8) -> char {
    *residue as char
}

/// Result alias used throughout the library
pub type Result<T> = std::result::Result<T, SsahaError>;

impl SsahaError {
    /// Create a corrupt-index error
    pub fn corrupt(reason: impl Into<String>) -> Self {
        Self::CorruptIndex {
            reason: reason.into(),
        }
    }

    /// Create a sequence-source error
    pub fn source_failure(message: impl Into<String>) -> Self {
        Self::Source {
            message: message.into(),
        }
    }

    /// Create an inconsistent-passes error
    pub fn inconsistent(reason: impl Into<String>) -> Self {
        Self::InconsistentPasses {
            reason: reason.into(),
        }
    }

    /// The category this error belongs to
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::UnsupportedResidue { .. } | Self::SequenceTooShort { .. } => ErrorCategory::Data,
            Self::Io(_) | Self::Source { .. } => ErrorCategory::Resource,
            Self::CorruptIndex { .. } | Self::InconsistentPasses { .. } => {
                ErrorCategory::Corruption
            }
            _ => ErrorCategory::Configuration,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_categories() {
        assert_eq!(
            SsahaError::UnsupportedResidue { residue: b'N' }.category(),
            ErrorCategory::Data
        );
        assert_eq!(
            SsahaError::corrupt("bad offsets").category(),
            ErrorCategory::Corruption
        );
        assert_eq!(
            SsahaError::from(std::io::Error::other("disk full")).category(),
            ErrorCategory::Resource
        );
        assert_eq!(SsahaError::InvalidStep(0).category(), ErrorCategory::Configuration);
    }

    #[test]
    fn test_display() {
        let err = SsahaError::UnsupportedResidue { residue: b'N' };
        assert_eq!(err.to_string(), "Unsupported residue 'N' (byte 78)");

        let err = SsahaError::UnknownWordLength { stored: 10, requested: 12 };
        assert!(err.to_string().contains("word length 10"));
    }
}
