//! FASTA/FASTQ input with automatic decompression
//!
//! Reads sequences from FASTA or FASTQ files, with transparent gzip
//! decompression. Residues are passed through untouched; checking them
//! against the packing is left to the word iterator.

use crate::error::{Result, SsahaError};
use crate::sequence::{NamedSequence, SequenceDatabase, SequenceRef, SymbolSequence};
use needletail::parse_fastx_file;
use std::path::{Path, PathBuf};

/// Parse a FASTA/FASTQ file and call a function for each record
///
/// # Arguments
/// * `path` - Path to input file (may be gzipped)
/// * `callback` - Function called for each record, receives (name, residues)
///
/// The name is the first whitespace-delimited token of the record id.
///
/// # Errors
/// Returns `Source` if the file cannot be opened or a record is malformed,
/// and whatever `callback` returns.
pub fn parse_sequences<P, F>(path: P, mut callback: F) -> Result<()>
where
    P: AsRef<Path>,
    F: FnMut(&str, &[u8]) -> Result<()>,
{
    let path = path.as_ref();

    // needletail automatically handles gzip decompression
    let mut reader = parse_fastx_file(path).map_err(|e| {
        SsahaError::source_failure(format!(
            "failed to open sequence file {}: {e}",
            path.display()
        ))
    })?;

    while let Some(record) = reader.next() {
        let record = record.map_err(|e| {
            SsahaError::source_failure(format!(
                "failed to parse sequence record in {}: {e}",
                path.display()
            ))
        })?;
        let name = record_name(record.id());
        let seq = record.seq();
        callback(&name, &seq)?;
    }

    Ok(())
}

/// First whitespace-delimited token of a record id
fn record_name(id: &[u8]) -> String {
    let token = id
        .split(|b| b.is_ascii_whitespace())
        .next()
        .unwrap_or_default();
    String::from_utf8_lossy(token).into_owned()
}

/// Load every record of a file into memory
pub fn read_sequences<P: AsRef<Path>>(path: P) -> Result<Vec<NamedSequence>> {
    let mut sequences = Vec::new();
    parse_sequences(path, |name, seq| {
        sequences.push(NamedSequence::new(name, seq));
        Ok(())
    })?;
    Ok(sequences)
}

/// Count sequences and total residues in a file
///
/// # Returns
/// `(num_sequences, total_residues)`
pub fn count_sequences<P: AsRef<Path>>(path: P) -> Result<(usize, usize)> {
    let mut num_sequences = 0;
    let mut total_residues = 0;

    parse_sequences(path, |_name, seq| {
        num_sequences += 1;
        total_residues += seq.len();
        Ok(())
    })?;

    Ok((num_sequences, total_residues))
}

/// A sequence file used as a [`SequenceDatabase`]
///
/// Each walk re-reads the file, so a build streams its input twice instead
/// of holding it in memory.
#[derive(Debug, Clone)]
pub struct FastxDatabase {
    path: PathBuf,
}

impl FastxDatabase {
    /// Database backed by the file at `path`
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Path of the backing file
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl SequenceDatabase for FastxDatabase {
    fn for_each_sequence(
        &self,
        f: &mut dyn FnMut(&dyn SymbolSequence) -> Result<()>,
    ) -> Result<()> {
        parse_sequences(&self.path, |name, seq| f(&SequenceRef::new(name, seq)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_record_name() {
        assert_eq!(record_name(b"chr1 some description"), "chr1");
        assert_eq!(record_name(b"read/1\tlane=2"), "read/1");
        assert_eq!(record_name(b""), "");
    }

    #[test]
    fn test_parse_fasta_file() -> Result<()> {
        let mut temp_file = NamedTempFile::new()?;
        writeln!(temp_file, ">seq1 first")?;
        writeln!(temp_file, "ACGT")?;
        writeln!(temp_file, "NNAC")?;
        writeln!(temp_file, ">seq2")?;
        writeln!(temp_file, "TGCA")?;
        temp_file.flush()?;

        let sequences = read_sequences(temp_file.path())?;
        assert_eq!(sequences.len(), 2);
        assert_eq!(sequences[0].name(), "seq1");
        // Multi-line records are joined and ambiguity codes kept
        assert_eq!(sequences[0].residues(), b"ACGTNNAC");
        assert_eq!(sequences[1].name(), "seq2");
        assert_eq!(sequences[1].residues(), b"TGCA");

        Ok(())
    }

    #[test]
    fn test_parse_fastq_file() -> Result<()> {
        let mut temp_file = NamedTempFile::new()?;
        writeln!(temp_file, "@r1")?;
        writeln!(temp_file, "GATTACA")?;
        writeln!(temp_file, "+")?;
        writeln!(temp_file, "IIIIIII")?;
        temp_file.flush()?;

        let (num_seqs, total) = count_sequences(temp_file.path())?;
        assert_eq!(num_seqs, 1);
        assert_eq!(total, 7);
        Ok(())
    }

    #[test]
    fn test_fastx_database_is_reiterable() -> Result<()> {
        let mut temp_file = NamedTempFile::new()?;
        writeln!(temp_file, ">a")?;
        writeln!(temp_file, "ACGTACGT")?;
        writeln!(temp_file, ">b")?;
        writeln!(temp_file, "TT")?;
        temp_file.flush()?;

        let db = FastxDatabase::new(temp_file.path());
        for _ in 0..2 {
            let mut seen = Vec::new();
            db.for_each_sequence(&mut |s| {
                seen.push((s.name().to_string(), s.len(), s.residue_at(1)));
                Ok(())
            })?;
            assert_eq!(seen, vec![("a".to_string(), 8, b'A'), ("b".to_string(), 2, b'T')]);
        }
        Ok(())
    }

    #[test]
    fn test_missing_file() {
        let err = read_sequences("/nonexistent/input.fa").unwrap_err();
        assert!(matches!(err, SsahaError::Source { .. }));
    }
}
