//! Constants shared by the builder, reader and buffer
//!
//! Format identifiers, word-space limits and default build parameters live
//! here so the writer and reader cannot drift apart.

/// Magic bytes at the start of every DataStore file
pub const MAGIC: &[u8; 8] = b"SSAHADS1";

/// On-disk format version
pub const FORMAT_VERSION: u32 = 1;

/// Library version
pub const VERSION: (u8, u8, u8) = (0, 1, 0);

/// Largest number of bits a packed word may occupy
///
/// The hash table holds one entry per possible word, so this bounds the table
/// at 2^30 entries (a DNA word length of 15).
pub const MAX_WORD_BITS: usize = 30;

/// Word spaces up to this many entries are counted in a dense array
pub const DENSE_COUNT_LIMIT: u64 = 1 << 26;

/// Longest sequence name, in bytes (the name length field is a `u16`)
pub const MAX_NAME_BYTES: usize = u16::MAX as usize;

/// Default word length
pub const DEFAULT_WORD_LENGTH: usize = 12;

/// Default stride between sampled windows
pub const DEFAULT_STEP: usize = 1;

/// Default repetitiveness threshold
pub const DEFAULT_THRESHOLD: u32 = 1000;

/// Bytes of one hash table entry: `u64` hit list start + `u32` hit count
pub const HASH_ENTRY_BYTES: u64 = 12;

/// Bytes of one hit table entry: `u64` sequence id + `u32` position
pub const HIT_ENTRY_BYTES: u64 = 12;

/// Bytes of the fixed header fields before the packing descriptor
///
/// magic (8) + version (4) + three section offsets (24) + word length (4)
/// + descriptor length (4)
pub const HEADER_PREFIX_BYTES: u64 = 8 + 4 + 8 * 3 + 4 + 4;

/// Bytes of the build parameters after the packing descriptor
///
/// step (4) + threshold (4) + sequence count (8)
pub const HEADER_SUFFIX_BYTES: u64 = 4 + 4 + 8;

/// Compute ceil(log2(x)).
///
/// Returns 0 for x <= 1, and the minimum number of bits needed to
/// represent values in [0, x) for x >= 2.
#[inline]
pub const fn ceil_log2(x: u64) -> usize {
    if x <= 1 {
        0
    } else {
        64 - (x - 1).leading_zeros() as usize
    }
}
