//! DataStore builder orchestration
//!
//! Builds a DataStore file from a sequence database in two passes:
//! 1. Count every sampled word and total the name table
//! 2. Lay out the file: one hash entry per possible word, then the name
//!    table, then a contiguous hit list per indexed word
//! 3. Fill pass: walk the database again, writing names and hits
//! 4. Write the header, flush, and rename the file into place
//!
//! The output is written to a temporary file beside the target path, so a
//! failed build never leaves a partial DataStore behind.

use crate::builder::config::BuildConfiguration;
use crate::builder::word_counts::{is_indexed_count, WordCounts};
use crate::constants::{HASH_ENTRY_BYTES, HIT_ENTRY_BYTES, MAX_NAME_BYTES};
use crate::datastore::DataStore;
use crate::error::{Result, SsahaError};
use crate::large_buffer::{LargeBuffer, MapMode};
use crate::sequence::{SequenceDatabase, SymbolSequence};
use crate::serialization::DataStoreHeader;
use crate::words::WordIterator;
use std::path::Path;
use tracing::{debug, info, warn};

/// Statistics gathered while building a DataStore
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BuildReport {
    /// Sequences given an id
    pub sequences_indexed: u64,
    /// Sequences shorter than one word, left out entirely
    pub sequences_skipped_short: u64,
    /// Sampled windows
    pub windows_sampled: u64,
    /// Sampled windows holding a residue outside the alphabet
    pub windows_skipped_invalid: u64,
    /// Distinct words seen
    pub distinct_words: u64,
    /// Words given a hit list
    pub words_indexed: u64,
    /// Words seen `threshold` times or more
    pub words_excluded: u64,
    /// Occurrences of the excluded words
    pub occurrences_excluded: u64,
    /// Entries in the hit table
    pub hit_entries: u64,
    /// Names shortened to fit the name field
    pub names_truncated: u64,
    /// Size of the DataStore file in bytes
    pub file_size: u64,
}

impl BuildReport {
    /// Log the report via tracing
    pub fn print_summary(&self) {
        info!("=== DataStore Build Summary ===");
        info!("Sequences indexed: {}", self.sequences_indexed);
        info!("Sequences skipped (shorter than word length): {}", self.sequences_skipped_short);
        info!("Windows sampled: {}", self.windows_sampled);
        if self.windows_skipped_invalid > 0 {
            info!("Windows skipped (unsupported residues): {}", self.windows_skipped_invalid);
        }
        info!("Distinct words: {}", self.distinct_words);
        info!("Indexed words: {}", self.words_indexed);
        info!(
            "Excluded words: {} ({} occurrences)",
            self.words_excluded, self.occurrences_excluded
        );
        info!("Hit entries: {}", self.hit_entries);
        if self.names_truncated > 0 {
            info!("Names truncated: {}", self.names_truncated);
        }
        info!(
            "File size: {} bytes ({:.2} MB)",
            self.file_size,
            self.file_size as f64 / (1024.0 * 1024.0)
        );
    }
}

/// Section offsets of the file being built
#[derive(Debug, Clone, Copy)]
struct Layout {
    hash_table_offset: u64,
    name_table_offset: u64,
    hit_table_offset: u64,
    names_bytes: u64,
    sequence_count: u64,
}

impl Layout {
    #[inline]
    fn hash_entry(&self, word: u64) -> u64 {
        self.hash_table_offset + 4 + HASH_ENTRY_BYTES * word
    }
}

/// Builder for DataStore files
pub struct DataStoreBuilder {
    config: BuildConfiguration,
}

impl DataStoreBuilder {
    /// Create a new builder with the given configuration
    pub fn new(config: BuildConfiguration) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    /// The configuration this builder uses
    pub fn config(&self) -> &BuildConfiguration {
        &self.config
    }

    /// Build a DataStore at `path` from `database` and open it
    ///
    /// `database` is walked twice and must present the same sequences both
    /// times. An existing file at `path` is replaced only once the new one
    /// is complete.
    ///
    /// # Errors
    /// `IllegalAlphabet` for a sequence declaring another alphabet,
    /// `NameTooLong` when truncation is disabled, `SequenceTooLong`,
    /// `NameTableTooLarge`, `InconsistentPasses` if the two walks differ, and
    /// any I/O or source error.
    pub fn build<P, D>(&self, path: P, database: &D) -> Result<(DataStore, BuildReport)>
    where
        P: AsRef<Path>,
        D: SequenceDatabase + ?Sized,
    {
        let path = path.as_ref();
        self.config.print();
        info!("Building DataStore at {}", path.display());

        let mut report = BuildReport::default();

        // Step 1: Count words and names
        info!("Step 1: Counting words...");
        let (counts, names_bytes) = self.count_pass(database, &mut report)?;
        report.distinct_words = counts.distinct();
        info!(
            "  Counted {} windows over {} sequences ({} distinct words)",
            report.windows_sampled, report.sequences_indexed, report.distinct_words
        );

        // Step 2: Lay out the file
        info!("Step 2: Laying out hash, name and hit tables...");
        let layout = self.layout(names_bytes, report.sequences_indexed)?;
        let file_size = self.assign_hit_lists(&counts, &layout, &mut report);
        report.file_size = file_size;
        info!(
            "  {} words indexed, {} excluded at threshold {}",
            report.words_indexed, report.words_excluded, self.config.threshold
        );

        let dir = match path.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => dir,
            _ => Path::new("."),
        };
        let tmp = tempfile::Builder::new()
            .prefix(".ssaha")
            .suffix(".tmp")
            .tempfile_in(dir)?;
        tmp.as_file().set_len(file_size)?;
        let mut buffer = LargeBuffer::map_with_page_size(
            tmp.as_file(),
            MapMode::ReadWrite,
            0,
            file_size,
            self.config.page_size,
        )?;
        self.write_hash_table(&mut buffer, &counts, &layout)?;

        // Step 3: Fill names and hits
        info!("Step 3: Writing names and hits...");
        self.fill_pass(database, &mut buffer, &counts, &layout)?;
        self.verify_fill(&buffer, &counts, &layout)?;

        // Step 4: Finalize
        info!("Step 4: Writing header and publishing...");
        let header = DataStoreHeader {
            hash_table_offset: layout.hash_table_offset,
            hit_table_offset: layout.hit_table_offset,
            name_table_offset: layout.name_table_offset,
            word_length: self.config.word_length as u32,
            packing: self.config.packing.clone(),
            step: self.config.step as u32,
            threshold: self.config.threshold,
            sequence_count: layout.sequence_count,
        };
        buffer.put_bytes(0, &header.to_bytes())?;
        buffer.force()?;
        drop(buffer);
        tmp.persist(path).map_err(|e| SsahaError::Io(e.error))?;

        report.print_summary();
        let store = DataStore::open(path)?;
        Ok((store, report))
    }

    /// Reject sequences with a foreign alphabet; `false` for sequences too
    /// short to hold a word
    fn admit(&self, sequence: &dyn SymbolSequence) -> Result<bool> {
        if let Some(kind) = sequence.alphabet() {
            if kind != self.config.packing.kind() {
                return Err(SsahaError::IllegalAlphabet {
                    sequence: sequence.name().to_string(),
                    expected: self.config.packing.kind().to_string(),
                    found: kind.to_string(),
                });
            }
        }
        if sequence.len() < self.config.word_length {
            return Ok(false);
        }
        if sequence.len() as u64 > u32::MAX as u64 {
            return Err(SsahaError::SequenceTooLong {
                sequence: sequence.name().to_string(),
                length: sequence.len(),
                max: u32::MAX as u64,
            });
        }
        Ok(true)
    }

    /// Name as stored, truncated at a char boundary if allowed
    fn stored_name<'n>(&self, name: &'n str) -> Result<&'n str> {
        if name.len() <= MAX_NAME_BYTES {
            return Ok(name);
        }
        if !self.config.truncate_long_names {
            return Err(SsahaError::NameTooLong {
                length: name.len(),
                max: MAX_NAME_BYTES,
            });
        }
        let mut end = MAX_NAME_BYTES;
        while !name.is_char_boundary(end) {
            end -= 1;
        }
        Ok(&name[..end])
    }

    fn words<'a>(&'a self, sequence: &'a dyn SymbolSequence) -> WordIterator<'a, dyn SymbolSequence + 'a> {
        WordIterator::new(
            sequence,
            &self.config.packing,
            self.config.word_length,
            self.config.step,
        )
    }

    /// Returns the word counts and the total bytes of name table entries
    fn count_pass<D>(&self, database: &D, report: &mut BuildReport) -> Result<(WordCounts, u64)>
    where
        D: SequenceDatabase + ?Sized,
    {
        let space = self.config.packing.word_space(self.config.word_length);
        let mut counts = WordCounts::for_space(space);
        debug!(
            "  word space {} ({} counts)",
            space,
            if counts.is_dense() { "dense" } else { "sparse" }
        );

        let mut names_bytes = 0u64;
        database.for_each_sequence(&mut |sequence| {
            if !self.admit(sequence)? {
                report.sequences_skipped_short += 1;
                return Ok(());
            }
            let name = self.stored_name(sequence.name())?;
            if name.len() < sequence.name().len() {
                warn!(
                    "Truncated name of sequence {} from {} to {} bytes",
                    report.sequences_indexed,
                    sequence.name().len(),
                    name.len()
                );
                report.names_truncated += 1;
            }
            names_bytes += 2 + name.len() as u64;

            let mut words = self.words(sequence);
            for (_, word) in words.by_ref() {
                counts.increment(word);
            }
            report.windows_sampled += words.windows_sampled();
            report.windows_skipped_invalid += words.windows_skipped();
            report.sequences_indexed += 1;
            Ok(())
        })?;

        Ok((counts, names_bytes))
    }

    /// Fill in the section offsets
    fn layout(&self, names_bytes: u64, sequence_count: u64) -> Result<Layout> {
        if names_bytes > u32::MAX as u64 {
            return Err(SsahaError::NameTableTooLarge {
                bytes: names_bytes,
                max: u32::MAX as u64,
            });
        }
        let space = self.config.packing.word_space(self.config.word_length);
        let hash_table_offset = DataStoreHeader::encoded_len(&self.config.packing);
        let name_table_offset = hash_table_offset + 4 + HASH_ENTRY_BYTES * space;
        let hit_table_offset = name_table_offset + 4 + names_bytes;
        debug!(
            "  hash table at {}, name table at {}, hit table at {}",
            hash_table_offset, name_table_offset, hit_table_offset
        );
        Ok(Layout {
            hash_table_offset,
            name_table_offset,
            hit_table_offset,
            names_bytes,
            sequence_count,
        })
    }

    /// Tally indexed and excluded words; returns the total file size
    fn assign_hit_lists(&self, counts: &WordCounts, layout: &Layout, report: &mut BuildReport) -> u64 {
        let mut end = layout.hit_table_offset;
        for (_, count) in counts.iter_nonzero() {
            if is_indexed_count(count, self.config.threshold) {
                report.words_indexed += 1;
                report.hit_entries += count as u64;
                end += HIT_ENTRY_BYTES * count as u64;
            } else {
                report.words_excluded += 1;
                report.occurrences_excluded += count as u64;
            }
        }
        end
    }

    /// Write the table length and the hit list start of every indexed word
    ///
    /// Count fields stay zero; the fill pass uses them as write cursors.
    fn write_hash_table(&self, buffer: &mut LargeBuffer, counts: &WordCounts, layout: &Layout) -> Result<()> {
        let space = self.config.packing.word_space(self.config.word_length);
        buffer.put_u32(layout.hash_table_offset, space as u32)?;
        let mut start = layout.hit_table_offset;
        for (word, count) in counts.iter_nonzero() {
            if is_indexed_count(count, self.config.threshold) {
                buffer.put_u64(layout.hash_entry(word), start)?;
                start += HIT_ENTRY_BYTES * count as u64;
            }
        }
        Ok(())
    }

    fn fill_pass<D>(
        &self,
        database: &D,
        buffer: &mut LargeBuffer,
        counts: &WordCounts,
        layout: &Layout,
    ) -> Result<()>
    where
        D: SequenceDatabase + ?Sized,
    {
        buffer.set_position(layout.name_table_offset);
        buffer.write_u32(layout.names_bytes as u32)?;

        let mut sequence_id = 0u64;
        database.for_each_sequence(&mut |sequence| {
            if !self.admit(sequence)? {
                return Ok(());
            }
            if sequence_id >= layout.sequence_count {
                return Err(SsahaError::inconsistent(format!(
                    "more than {} indexable sequences on the second pass",
                    layout.sequence_count
                )));
            }

            let name = self.stored_name(sequence.name())?;
            if buffer.position() + 2 + name.len() as u64 > layout.hit_table_offset {
                return Err(SsahaError::inconsistent(format!(
                    "name of sequence {sequence_id} overruns the name table"
                )));
            }
            buffer.write_u16(name.len() as u16)?;
            buffer.write_bytes(name.as_bytes())?;

            for (position, word) in self.words(sequence) {
                let count = counts.get(word);
                if count >= self.config.threshold {
                    continue;
                }
                if count == 0 {
                    return Err(SsahaError::inconsistent(format!(
                        "word {word} in sequence {sequence_id} was not seen on the first pass"
                    )));
                }
                let entry = layout.hash_entry(word);
                let start = buffer.get_u64(entry)?;
                let filled = buffer.get_u32(entry + 8)?;
                if filled >= count {
                    return Err(SsahaError::inconsistent(format!(
                        "word {word} occurs more than {count} times on the second pass"
                    )));
                }
                let slot = start + HIT_ENTRY_BYTES * filled as u64;
                buffer.put_u64(slot, sequence_id)?;
                buffer.put_u32(slot + 8, position as u32)?;
                buffer.put_u32(entry + 8, filled + 1)?;
            }

            sequence_id += 1;
            Ok(())
        })?;

        if sequence_id != layout.sequence_count {
            return Err(SsahaError::inconsistent(format!(
                "{} indexable sequences on the first pass, {} on the second",
                layout.sequence_count, sequence_id
            )));
        }
        if buffer.position() != layout.hit_table_offset {
            return Err(SsahaError::inconsistent("name table bytes differ between passes"));
        }
        Ok(())
    }

    /// Every reserved hit list must be exactly full
    fn verify_fill(&self, buffer: &LargeBuffer, counts: &WordCounts, layout: &Layout) -> Result<()> {
        for (word, count) in counts.iter_nonzero() {
            if !is_indexed_count(count, self.config.threshold) {
                continue;
            }
            let filled = buffer.get_u32(layout.hash_entry(word) + 8)?;
            if filled != count {
                return Err(SsahaError::inconsistent(format!(
                    "word {word} occurs {count} times on the first pass, {filled} on the second"
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::packing::{Packing, PackingKind};
    use crate::sequence::NamedSequence;
    use std::cell::Cell;

    fn config(word_length: usize) -> BuildConfiguration {
        BuildConfiguration {
            word_length,
            threshold: 100,
            ..BuildConfiguration::default()
        }
    }

    #[test]
    fn test_build_small_store() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("small.ds");
        let db = vec![
            NamedSequence::new("s1", "ACGTACGT"),
            NamedSequence::new("tiny", "AC"),
            NamedSequence::new("s2", "TTTTACGA"),
        ];
        let builder = DataStoreBuilder::new(config(4)).unwrap();
        let (store, report) = builder.build(&path, &db).unwrap();

        assert_eq!(report.sequences_indexed, 2);
        assert_eq!(report.sequences_skipped_short, 1);
        assert_eq!(report.windows_sampled, 10);
        assert_eq!(report.hit_entries, 10);
        assert_eq!(report.file_size, std::fs::metadata(&path).unwrap().len());

        assert_eq!(store.num_sequences(), 2);
        assert_eq!(store.name_for_id(0).unwrap(), "s1");
        assert_eq!(store.name_for_id(1).unwrap(), "s2");

        let acgt = Packing::dna().pack_word(b"ACGT").unwrap();
        let hits: Vec<_> = store
            .lookup(acgt)
            .unwrap()
            .map(|h| (h.sequence_id, h.position))
            .collect();
        assert_eq!(hits, vec![(0, 1), (0, 5)]);
    }

    #[test]
    fn test_threshold_excludes_frequent_words() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("thr.ds");
        let db = vec![NamedSequence::new("poly", "AAAAAAAA"), NamedSequence::new("x", "ACGA")];
        let builder = DataStoreBuilder::new(BuildConfiguration {
            threshold: 3,
            ..config(4)
        })
        .unwrap();
        let (store, report) = builder.build(&path, &db).unwrap();

        // AAAA occurs 5 times, ACGA once
        assert_eq!(report.words_excluded, 1);
        assert_eq!(report.occurrences_excluded, 5);
        assert_eq!(report.words_indexed, 1);
        let aaaa = Packing::dna().pack_word(b"AAAA").unwrap();
        assert_eq!(store.lookup(aaaa).unwrap().len(), 0);
    }

    #[test]
    fn test_illegal_alphabet() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("alpha.ds");
        let db = vec![NamedSequence::new("p", "MKVLA").with_alphabet(PackingKind::Protein)];
        let err = DataStoreBuilder::new(config(4))
            .unwrap()
            .build(&path, &db)
            .unwrap_err();
        assert!(matches!(err, SsahaError::IllegalAlphabet { .. }));
        assert!(!path.exists());
    }

    #[test]
    fn test_long_names() {
        let dir = tempfile::tempdir().unwrap();
        // Multi-byte characters straddle the 65535-byte limit
        let long_name = "é".repeat(40_000);
        let db = vec![NamedSequence::new(long_name.clone(), "ACGTACGT")];

        let path = dir.path().join("trunc.ds");
        let (store, report) = DataStoreBuilder::new(config(4))
            .unwrap()
            .build(&path, &db)
            .unwrap();
        assert_eq!(report.names_truncated, 1);
        let stored = store.name_for_id(0).unwrap();
        assert_eq!(stored.len(), 65534);
        assert!(long_name.starts_with(&stored));

        let path = dir.path().join("strict.ds");
        let err = DataStoreBuilder::new(BuildConfiguration {
            truncate_long_names: false,
            ..config(4)
        })
        .unwrap()
        .build(&path, &db)
        .unwrap_err();
        assert!(matches!(err, SsahaError::NameTooLong { length: 80_000, .. }));
        assert!(!path.exists());
    }

    /// A database that grows between walks
    struct GrowingDatabase {
        walks: Cell<usize>,
    }

    impl SequenceDatabase for GrowingDatabase {
        fn for_each_sequence(
            &self,
            f: &mut dyn FnMut(&dyn SymbolSequence) -> Result<()>,
        ) -> Result<()> {
            let walk = self.walks.get();
            self.walks.set(walk + 1);
            f(&NamedSequence::new("a", "ACGTACGT"))?;
            if walk > 0 {
                f(&NamedSequence::new("b", "ACGTACGT"))?;
            }
            Ok(())
        }
    }

    #[test]
    fn test_inconsistent_passes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("grow.ds");
        let db = GrowingDatabase { walks: Cell::new(0) };
        let err = DataStoreBuilder::new(config(4))
            .unwrap()
            .build(&path, &db)
            .unwrap_err();
        assert!(matches!(err, SsahaError::InconsistentPasses { .. }));
        assert!(!path.exists());
        // Only the target directory's temp file was ever created, and it is gone
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_empty_database() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("empty.ds");
        let db: Vec<NamedSequence> = Vec::new();
        let (store, report) = DataStoreBuilder::new(config(3)).unwrap().build(&path, &db).unwrap();
        assert_eq!(report.sequences_indexed, 0);
        assert_eq!(store.num_sequences(), 0);
        assert_eq!(store.num_hit_entries(), 0);
        assert_eq!(store.lookup(0).unwrap().len(), 0);
    }

    #[test]
    fn test_rebuild_replaces_existing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("re.ds");
        std::fs::write(&path, b"stale").unwrap();
        let db = vec![NamedSequence::new("s", "GATTACA")];
        let (store, _) = DataStoreBuilder::new(config(3)).unwrap().build(&path, &db).unwrap();
        assert_eq!(store.name_for_id(0).unwrap(), "s");
    }
}
