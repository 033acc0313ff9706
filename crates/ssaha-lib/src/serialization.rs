//! DataStore file header
//!
//! # File Format
//!
//! A DataStore is a single file of four sections, all scalars little-endian:
//!
//! ```text
//! Header
//!   ├─ magic: "SSAHADS1"
//!   ├─ format_version: u32
//!   ├─ hash_table_offset: u64
//!   ├─ hit_table_offset: u64
//!   ├─ name_table_offset: u64
//!   ├─ word_length: u32
//!   ├─ packing_descriptor_length: u32
//!   ├─ packing_descriptor: u8[]
//!   ├─ step: u32
//!   ├─ threshold: u32
//!   └─ sequence_count: u64
//! Hash table (at hash_table_offset, right after the header)
//!   ├─ table_length: u32 (= word space)
//!   └─ (hit_list_start: u64, hit_count: u32)[table_length]
//! Name table (at name_table_offset)
//!   ├─ table_size_bytes: u32 (bytes of entries after this field)
//!   └─ (name_length: u16, name: u8[name_length])[sequence_count]
//! Hit table (at hit_table_offset, to end of file)
//!   └─ (sequence_id: u64, position: u32)[]
//! ```
//!
//! A hash entry's `hit_list_start` is an absolute file offset into the hit
//! table. Words that were never seen or were too frequent have the entry
//! `(0, 0)`.

use crate::constants::{FORMAT_VERSION, HEADER_PREFIX_BYTES, HEADER_SUFFIX_BYTES, MAGIC};
use crate::error::{Result, SsahaError};
use crate::packing::Packing;
use std::io::{self, Read, Write};

/// Longest packing descriptor accepted when reading a header
const MAX_DESCRIPTOR_BYTES: u32 = 4 + 255;

/// Header of a DataStore file
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DataStoreHeader {
    /// Offset of the hash table section
    pub hash_table_offset: u64,
    /// Offset of the hit table section
    pub hit_table_offset: u64,
    /// Offset of the name table section
    pub name_table_offset: u64,
    /// Residues per word
    pub word_length: u32,
    /// Packing the words were built with
    pub packing: Packing,
    /// Stride between indexed windows
    pub step: u32,
    /// Repetitiveness threshold the index was built with
    pub threshold: u32,
    /// Number of sequences in the name table
    pub sequence_count: u64,
}

impl DataStoreHeader {
    /// Encoded size of a header carrying `packing`
    pub fn encoded_len(packing: &Packing) -> u64 {
        HEADER_PREFIX_BYTES + packing.descriptor().len() as u64 + HEADER_SUFFIX_BYTES
    }

    /// Write header to a writer
    pub fn write(&self, writer: &mut dyn Write) -> io::Result<()> {
        let descriptor = self.packing.descriptor();
        writer.write_all(MAGIC)?;
        writer.write_all(&FORMAT_VERSION.to_le_bytes())?;
        writer.write_all(&self.hash_table_offset.to_le_bytes())?;
        writer.write_all(&self.hit_table_offset.to_le_bytes())?;
        writer.write_all(&self.name_table_offset.to_le_bytes())?;
        writer.write_all(&self.word_length.to_le_bytes())?;
        writer.write_all(&(descriptor.len() as u32).to_le_bytes())?;
        writer.write_all(&descriptor)?;
        writer.write_all(&self.step.to_le_bytes())?;
        writer.write_all(&self.threshold.to_le_bytes())?;
        writer.write_all(&self.sequence_count.to_le_bytes())?;
        Ok(())
    }

    /// Encode the header into a byte vector
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(Self::encoded_len(&self.packing) as usize);
        // Writing into a Vec cannot fail
        let _ = self.write(&mut out);
        out
    }

    /// Read header from a reader
    ///
    /// # Errors
    /// `CorruptIndex` for a bad magic number, an unsupported version, a
    /// truncated header or an unreadable packing descriptor; `Io` for other
    /// read failures.
    pub fn read(reader: &mut dyn Read) -> Result<Self> {
        let mut magic = [0u8; 8];
        read_exact(reader, &mut magic)?;
        if &magic != MAGIC {
            return Err(SsahaError::corrupt("invalid magic number for DataStore file"));
        }

        let version = read_u32(reader)?;
        if version != FORMAT_VERSION {
            return Err(SsahaError::corrupt(format!(
                "unsupported format version {version} (expected {FORMAT_VERSION})"
            )));
        }

        let hash_table_offset = read_u64(reader)?;
        let hit_table_offset = read_u64(reader)?;
        let name_table_offset = read_u64(reader)?;
        let word_length = read_u32(reader)?;

        let descriptor_len = read_u32(reader)?;
        if descriptor_len > MAX_DESCRIPTOR_BYTES {
            return Err(SsahaError::corrupt(format!(
                "packing descriptor length {descriptor_len} exceeds {MAX_DESCRIPTOR_BYTES}"
            )));
        }
        let mut descriptor = vec![0u8; descriptor_len as usize];
        read_exact(reader, &mut descriptor)?;
        let packing = Packing::from_descriptor(&descriptor)
            .map_err(|e| SsahaError::corrupt(format!("bad packing descriptor: {e}")))?;

        let step = read_u32(reader)?;
        let threshold = read_u32(reader)?;
        let sequence_count = read_u64(reader)?;

        Ok(Self {
            hash_table_offset,
            hit_table_offset,
            name_table_offset,
            word_length,
            packing,
            step,
            threshold,
            sequence_count,
        })
    }
}

fn read_exact(reader: &mut dyn Read, buf: &mut [u8]) -> Result<()> {
    reader.read_exact(buf).map_err(|e| {
        if e.kind() == io::ErrorKind::UnexpectedEof {
            SsahaError::corrupt("truncated header")
        } else {
            SsahaError::Io(e)
        }
    })
}

fn read_u32(reader: &mut dyn Read) -> Result<u32> {
    let mut bytes = [0u8; 4];
    read_exact(reader, &mut bytes)?;
    Ok(u32::from_le_bytes(bytes))
}

fn read_u64(reader: &mut dyn Read) -> Result<u64> {
    let mut bytes = [0u8; 8];
    read_exact(reader, &mut bytes)?;
    Ok(u64::from_le_bytes(bytes))
}
