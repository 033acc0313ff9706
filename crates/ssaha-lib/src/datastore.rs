//! Read-only access to a built DataStore
//!
//! [`DataStore::open`] validates the header against the file, maps the whole
//! file read-only and scans the name table once. After that, word lookups and
//! name lookups are plain reads from the mapping, so a single store can serve
//! any number of searching threads.

use crate::constants::{HASH_ENTRY_BYTES, HIT_ENTRY_BYTES};
use crate::error::{Result, SsahaError};
use crate::large_buffer::{LargeBuffer, MapMode, PAGE_SIZE};
use crate::packing::{Packing, Word};
use crate::serialization::DataStoreHeader;
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use tracing::info;

/// One occurrence of a word in the database
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct HitEntry {
    /// Id of the sequence holding the occurrence
    pub sequence_id: u64,
    /// 1-based position of the word's first residue
    pub position: u32,
}

/// Iterator over the hit list of one word
pub struct Hits<'a> {
    buffer: &'a LargeBuffer,
    offset: u64,
    remaining: u32,
}

impl Iterator for Hits<'_> {
    type Item = HitEntry;

    fn next(&mut self) -> Option<HitEntry> {
        if self.remaining == 0 {
            return None;
        }
        // The whole list was bounds-checked by `lookup`
        let sequence_id = self.buffer.get_u64(self.offset).ok()?;
        let position = self.buffer.get_u32(self.offset + 8).ok()?;
        self.offset += HIT_ENTRY_BYTES;
        self.remaining -= 1;
        Some(HitEntry {
            sequence_id,
            position,
        })
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining as usize, Some(self.remaining as usize))
    }
}

impl ExactSizeIterator for Hits<'_> {}

/// An open DataStore file
pub struct DataStore {
    path: PathBuf,
    header: DataStoreHeader,
    buffer: LargeBuffer,
    name_offsets: Vec<u64>,
    word_space: u64,
    file_size: u64,
}

impl DataStore {
    /// Open and validate the DataStore at `path`
    ///
    /// # Errors
    /// `CorruptIndex` if the header is unreadable or its offsets and sizes
    /// disagree with each other or with the file; `Io` if the file cannot be
    /// opened or mapped.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::open_with_page_size(path, PAGE_SIZE)
    }

    /// Open with a custom mapping page size
    pub fn open_with_page_size<P: AsRef<Path>>(path: P, page_size: u64) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path)?;
        let file_size = file.metadata()?.len();
        let header = DataStoreHeader::read(&mut BufReader::new(&file))?;
        let word_space = validate_layout(&header, file_size)?;

        let buffer =
            LargeBuffer::map_with_page_size(&file, MapMode::ReadOnly, 0, file_size, page_size)?;

        let table_length = buffer.get_u32(header.hash_table_offset)? as u64;
        if table_length != word_space {
            return Err(SsahaError::corrupt(format!(
                "hash table length {table_length} does not match word space {word_space}"
            )));
        }

        let name_offsets = scan_names(&buffer, &header)?;

        Ok(Self {
            path: path.to_path_buf(),
            header,
            buffer,
            name_offsets,
            word_space,
            file_size,
        })
    }

    /// Open the DataStore at `path`, checking that it was built with
    /// `packing` and `word_length`
    ///
    /// # Errors
    /// `PackingMismatch` or `UnknownWordLength` if the stored parameters
    /// differ, plus everything [`DataStore::open`] returns.
    pub fn open_with_packing<P: AsRef<Path>>(
        path: P,
        packing: &Packing,
        word_length: usize,
    ) -> Result<Self> {
        let store = Self::open(path)?;
        if store.packing() != packing {
            return Err(SsahaError::PackingMismatch {
                stored: store.packing().to_string(),
                requested: packing.to_string(),
            });
        }
        if store.word_length() != word_length {
            return Err(SsahaError::UnknownWordLength {
                stored: store.word_length(),
                requested: word_length,
            });
        }
        Ok(store)
    }

    /// Every occurrence of `word`, in sequence-then-position order
    ///
    /// Words that never occurred or occurred too often yield nothing.
    ///
    /// # Errors
    /// `WordOutOfRange` if `word` is outside the word space, `CorruptIndex`
    /// if its hash entry points outside the hit table.
    pub fn lookup(&self, word: Word) -> Result<Hits<'_>> {
        if word >= self.word_space {
            return Err(SsahaError::WordOutOfRange {
                word,
                space: self.word_space,
            });
        }
        let entry = self.header.hash_table_offset + 4 + HASH_ENTRY_BYTES * word;
        let start = self.buffer.get_u64(entry)?;
        let count = self.buffer.get_u32(entry + 8)?;
        if count > 0 {
            let hit_offset = self.header.hit_table_offset;
            let aligned = start >= hit_offset && (start - hit_offset) % HIT_ENTRY_BYTES == 0;
            let end = start.checked_add(HIT_ENTRY_BYTES * count as u64);
            if !aligned || !matches!(end, Some(end) if end <= self.file_size) {
                return Err(SsahaError::corrupt(format!(
                    "hit list of word {word} ({count} entries at {start}) lies outside the hit table"
                )));
            }
        }
        Ok(Hits {
            buffer: &self.buffer,
            offset: start,
            remaining: count,
        })
    }

    /// Name of the sequence with id `id`
    pub fn name_for_id(&self, id: u64) -> Result<String> {
        let offset = *self
            .name_offsets
            .get(id as usize)
            .ok_or(SsahaError::UnknownSequence {
                id,
                count: self.num_sequences(),
            })?;
        let len = self.buffer.get_u16(offset)? as usize;
        let mut bytes = vec![0u8; len];
        self.buffer.get_bytes(offset + 2, &mut bytes)?;
        String::from_utf8(bytes)
            .map_err(|_| SsahaError::corrupt(format!("name of sequence {id} is not valid UTF-8")))
    }

    /// Path the store was opened from
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Parsed file header
    pub fn header(&self) -> &DataStoreHeader {
        &self.header
    }

    /// Residues per word
    pub fn word_length(&self) -> usize {
        self.header.word_length as usize
    }

    /// Packing the store was built with
    pub fn packing(&self) -> &Packing {
        &self.header.packing
    }

    /// Stride between indexed windows
    pub fn step(&self) -> usize {
        self.header.step as usize
    }

    /// Repetitiveness threshold the store was built with
    pub fn threshold(&self) -> u32 {
        self.header.threshold
    }

    /// Number of distinct words
    pub fn word_space(&self) -> u64 {
        self.word_space
    }

    /// Number of sequences
    pub fn num_sequences(&self) -> u64 {
        self.name_offsets.len() as u64
    }

    /// Number of entries in the hit table
    pub fn num_hit_entries(&self) -> u64 {
        (self.file_size - self.header.hit_table_offset) / HIT_ENTRY_BYTES
    }

    /// File size in bytes
    pub fn file_size(&self) -> u64 {
        self.file_size
    }

    /// Log the store parameters and a space breakdown via tracing
    pub fn print_summary(&self) {
        let h = &self.header;
        let header_bytes = h.hash_table_offset;
        let hash_bytes = h.name_table_offset - h.hash_table_offset;
        let name_bytes = h.hit_table_offset - h.name_table_offset;
        let hit_bytes = self.file_size - h.hit_table_offset;
        let pct = |bytes: u64| {
            if self.file_size == 0 {
                0.0
            } else {
                bytes as f64 * 100.0 / self.file_size as f64
            }
        };

        info!("=== DataStore {} ===", self.path.display());
        info!("Word length: {}", self.word_length());
        info!("Packing: {}", self.packing());
        info!("Step: {}", self.step());
        info!("Threshold: {}", self.threshold());
        info!("Sequences: {}", self.num_sequences());
        info!("Hit entries: {}", self.num_hit_entries());
        info!("Space breakdown ({} bytes):", self.file_size);
        info!("  header:     {:>14} bytes ({:5.2}%)", header_bytes, pct(header_bytes));
        info!("  hash table: {:>14} bytes ({:5.2}%)", hash_bytes, pct(hash_bytes));
        info!("  name table: {:>14} bytes ({:5.2}%)", name_bytes, pct(name_bytes));
        info!("  hit table:  {:>14} bytes ({:5.2}%)", hit_bytes, pct(hit_bytes));
    }
}

impl std::fmt::Debug for DataStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DataStore")
            .field("path", &self.path)
            .field("word_length", &self.header.word_length)
            .field("packing", &self.header.packing)
            .field("sequences", &self.name_offsets.len())
            .field("file_size", &self.file_size)
            .finish()
    }
}

/// Check header parameters and section offsets; returns the word space
fn validate_layout(header: &DataStoreHeader, file_size: u64) -> Result<u64> {
    let word_length = header.word_length as usize;
    header
        .packing
        .validate_word_length(word_length)
        .map_err(|e| SsahaError::corrupt(format!("stored word length: {e}")))?;
    if header.step == 0 {
        return Err(SsahaError::corrupt("stored step is zero"));
    }
    if header.threshold == 0 {
        return Err(SsahaError::corrupt("stored threshold is zero"));
    }

    let word_space = header.packing.word_space(word_length);
    let header_len = DataStoreHeader::encoded_len(&header.packing);
    if header.hash_table_offset != header_len {
        return Err(SsahaError::corrupt(format!(
            "hash table offset {} does not follow the {header_len}-byte header",
            header.hash_table_offset
        )));
    }
    let expected_names = header.hash_table_offset + 4 + HASH_ENTRY_BYTES * word_space;
    if header.name_table_offset != expected_names {
        return Err(SsahaError::corrupt(format!(
            "name table offset {} does not follow the hash table (expected {expected_names})",
            header.name_table_offset
        )));
    }
    if header.hit_table_offset < header.name_table_offset + 4 || header.hit_table_offset > file_size {
        return Err(SsahaError::corrupt(format!(
            "hit table offset {} outside [{}, {file_size}]",
            header.hit_table_offset,
            header.name_table_offset + 4
        )));
    }
    if (file_size - header.hit_table_offset) % HIT_ENTRY_BYTES != 0 {
        return Err(SsahaError::corrupt(format!(
            "hit table of {} bytes is not a whole number of entries",
            file_size - header.hit_table_offset
        )));
    }
    Ok(word_space)
}

/// Offsets of every name table entry, checked against the header
fn scan_names(buffer: &LargeBuffer, header: &DataStoreHeader) -> Result<Vec<u64>> {
    let table_bytes = buffer.get_u32(header.name_table_offset)? as u64;
    let end = header.name_table_offset + 4 + table_bytes;
    if end != header.hit_table_offset {
        return Err(SsahaError::corrupt(format!(
            "name table of {table_bytes} bytes does not end at the hit table offset {}",
            header.hit_table_offset
        )));
    }

    // Each entry takes at least two bytes
    let capacity = header.sequence_count.min(table_bytes / 2) as usize;
    let mut offsets = Vec::with_capacity(capacity);
    let mut pos = header.name_table_offset + 4;
    for id in 0..header.sequence_count {
        if pos + 2 > end {
            return Err(SsahaError::corrupt(format!(
                "name table ends before sequence {id} of {}",
                header.sequence_count
            )));
        }
        let len = buffer.get_u16(pos)? as u64;
        offsets.push(pos);
        pos += 2 + len;
        if pos > end {
            return Err(SsahaError::corrupt(format!("name of sequence {id} overruns the name table")));
        }
    }
    if pos != end {
        return Err(SsahaError::corrupt(format!(
            "name table holds {} unused bytes after {} names",
            end - pos,
            header.sequence_count
        )));
    }
    Ok(offsets)
}
