//! Query-side search over a DataStore
//!
//! A [`Searcher`] walks the sampled words of a query and reports one raw
//! [`Hit`] per indexed occurrence to a [`SearchListener`]. Listeners compose:
//! wrapping a listener in a [`HitMerger`] chains collinear raw hits before
//! they reach it.

use crate::datastore::DataStore;
use crate::error::{Result, SsahaError};
use crate::hit_merger::HitMerger;
use crate::sequence::{NamedSequence, SymbolSequence};
use crate::words::WordIterator;
use rayon::prelude::*;

/// An exact match between a query window and a database window
///
/// Offsets are 1-based. Raw hits are one word long; merged hits cover a run
/// of collinear raw hits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Hit {
    /// Id of the matching database sequence
    pub target_id: u64,
    /// Start of the match in the query
    pub query_offset: u32,
    /// Start of the match in the target
    pub target_offset: u32,
    /// Residues covered
    pub length: u32,
}

impl Hit {
    /// `target_offset - query_offset`, shared by collinear hits
    #[inline]
    pub fn diagonal(&self) -> i64 {
        self.target_offset as i64 - self.query_offset as i64
    }
}

/// Receiver of the hits produced by one or more searches
///
/// For each search, `start_search` is called once, then `hit` for every
/// hit, then `end_search` once.
pub trait SearchListener {
    /// A search for `query_id` is starting
    fn start_search(&mut self, query_id: &str) -> Result<()>;

    /// One hit of the current search
    fn hit(&mut self, hit: Hit) -> Result<()>;

    /// The search for `query_id` has finished
    fn end_search(&mut self, query_id: &str) -> Result<()>;
}

impl<L: SearchListener + ?Sized> SearchListener for &mut L {
    fn start_search(&mut self, query_id: &str) -> Result<()> {
        (**self).start_search(query_id)
    }

    fn hit(&mut self, hit: Hit) -> Result<()> {
        (**self).hit(hit)
    }

    fn end_search(&mut self, query_id: &str) -> Result<()> {
        (**self).end_search(query_id)
    }
}

/// Hits reported for one query
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryHits {
    /// Query name
    pub query_id: String,
    /// Hits in the order they were reported
    pub hits: Vec<Hit>,
}

/// Listener that keeps every hit, grouped by query
#[derive(Debug, Default)]
pub struct HitCollector {
    results: Vec<QueryHits>,
}

impl HitCollector {
    /// Empty collector
    pub fn new() -> Self {
        Self::default()
    }

    /// Hits collected so far, one entry per search started
    pub fn results(&self) -> &[QueryHits] {
        &self.results
    }

    /// Take the collected hits
    pub fn into_results(self) -> Vec<QueryHits> {
        self.results
    }
}

impl SearchListener for HitCollector {
    fn start_search(&mut self, query_id: &str) -> Result<()> {
        self.results.push(QueryHits {
            query_id: query_id.to_string(),
            hits: Vec::new(),
        });
        Ok(())
    }

    fn hit(&mut self, hit: Hit) -> Result<()> {
        match self.results.last_mut() {
            Some(current) => current.hits.push(hit),
            None => self.results.push(QueryHits {
                query_id: String::new(),
                hits: vec![hit],
            }),
        }
        Ok(())
    }

    fn end_search(&mut self, _query_id: &str) -> Result<()> {
        Ok(())
    }
}

/// Counters for one search
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SearchReport {
    /// Query windows looked up
    pub windows_searched: u64,
    /// Query windows skipped for holding an unsupported residue
    pub windows_skipped: u64,
    /// Raw hits reported
    pub raw_hits: u64,
}

/// Runs queries against a DataStore
#[derive(Debug, Clone, Copy)]
pub struct Searcher<'a> {
    store: &'a DataStore,
    step: usize,
}

impl<'a> Searcher<'a> {
    /// Searcher sampling every query window
    pub fn new(store: &'a DataStore) -> Self {
        Self { store, step: 1 }
    }

    /// Sample query windows every `step` residues
    pub fn with_step(mut self, step: usize) -> Result<Self> {
        if step == 0 {
            return Err(SsahaError::InvalidStep(step));
        }
        self.step = step;
        Ok(self)
    }

    /// Store being searched
    pub fn store(&self) -> &'a DataStore {
        self.store
    }

    /// Query sampling step
    pub fn step(&self) -> usize {
        self.step
    }

    /// Report every raw hit of `query` to `listener`
    ///
    /// Queries shorter than the word length produce `start_search` and
    /// `end_search` with no hits in between.
    ///
    /// # Errors
    /// `PackingMismatch` if the query declares an alphabet other than the
    /// store's, and `SequenceTooLong` for queries whose offsets do not fit in
    /// a `u32`; both before `start_search`. Any error from the store or the
    /// listener aborts the search.
    pub fn search<S, L>(&self, query_id: &str, query: &S, listener: &mut L) -> Result<SearchReport>
    where
        S: SymbolSequence + ?Sized,
        L: SearchListener + ?Sized,
    {
        let packing = self.store.packing();
        if let Some(kind) = query.alphabet() {
            if kind != packing.kind() {
                return Err(SsahaError::PackingMismatch {
                    stored: packing.to_string(),
                    requested: kind.to_string(),
                });
            }
        }
        if query.len() as u64 > u32::MAX as u64 {
            return Err(SsahaError::SequenceTooLong {
                sequence: query_id.to_string(),
                length: query.len(),
                max: u32::MAX as u64,
            });
        }

        listener.start_search(query_id)?;

        let word_length = self.store.word_length();
        let mut report = SearchReport::default();
        let mut words = WordIterator::new(query, packing, word_length, self.step);
        for (query_offset, word) in words.by_ref() {
            for entry in self.store.lookup(word)? {
                listener.hit(Hit {
                    target_id: entry.sequence_id,
                    query_offset: query_offset as u32,
                    target_offset: entry.position,
                    length: word_length as u32,
                })?;
                report.raw_hits += 1;
            }
        }
        report.windows_skipped = words.windows_skipped();
        report.windows_searched = words.windows_sampled() - report.windows_skipped;

        listener.end_search(query_id)?;
        Ok(report)
    }

    /// Search many queries in parallel, merging each query's hits
    ///
    /// Each query gets its own [`HitMerger`] with `min_length`. Results come
    /// back in the order of `queries`.
    pub fn search_batch(&self, queries: &[NamedSequence], min_length: u32) -> Result<Vec<QueryHits>> {
        queries
            .par_iter()
            .map(|query| {
                let mut merger = HitMerger::new(HitCollector::new(), min_length);
                self.search(query.name(), query, &mut merger)?;
                Ok(merger
                    .into_inner()
                    .into_results()
                    .pop()
                    .unwrap_or_default())
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::{BuildConfiguration, DataStoreBuilder};
    use crate::packing::PackingKind;
    use tempfile::TempDir;

    fn store(dir: &TempDir, db: &[NamedSequence], word_length: usize) -> DataStore {
        let config = BuildConfiguration {
            word_length,
            threshold: 50,
            ..BuildConfiguration::default()
        };
        let path = dir.path().join("search.ds");
        DataStoreBuilder::new(config).unwrap().build(path, db).unwrap().0
    }

    /// Records the exact call sequence
    #[derive(Default)]
    struct Trace(Vec<String>);

    impl SearchListener for Trace {
        fn start_search(&mut self, query_id: &str) -> Result<()> {
            self.0.push(format!("start {query_id}"));
            Ok(())
        }
        fn hit(&mut self, hit: Hit) -> Result<()> {
            self.0.push(format!(
                "hit {} {} {} {}",
                hit.target_id, hit.query_offset, hit.target_offset, hit.length
            ));
            Ok(())
        }
        fn end_search(&mut self, query_id: &str) -> Result<()> {
            self.0.push(format!("end {query_id}"));
            Ok(())
        }
    }

    #[test]
    fn test_diagonal() {
        let hit = Hit { target_id: 0, query_offset: 7, target_offset: 3, length: 4 };
        assert_eq!(hit.diagonal(), -4);
    }

    #[test]
    fn test_raw_hits_in_call_order() {
        let dir = tempfile::tempdir().unwrap();
        let db = vec![NamedSequence::new("t", "GGACGTGG")];
        let store = store(&dir, &db, 4);
        let mut trace = Trace::default();
        let report = Searcher::new(&store)
            .search("q", &NamedSequence::new("q", "ACGTA"), &mut trace)
            .unwrap();
        assert_eq!(trace.0, ["start q", "hit 0 1 3 4", "end q"]);
        assert_eq!(report.windows_searched, 2);
        assert_eq!(report.raw_hits, 1);
    }

    #[test]
    fn test_short_query() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(&dir, &[NamedSequence::new("t", "ACGTACGT")], 4);
        let mut trace = Trace::default();
        Searcher::new(&store)
            .search("tiny", &NamedSequence::new("tiny", "ACG"), &mut trace)
            .unwrap();
        assert_eq!(trace.0, ["start tiny", "end tiny"]);
    }

    #[test]
    fn test_query_with_unsupported_residues() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(&dir, &[NamedSequence::new("t", "ACGTACGT")], 4);
        let mut collector = HitCollector::new();
        let report = Searcher::new(&store)
            .search("q", &NamedSequence::new("q", "ACGTNACGT"), &mut collector)
            .unwrap();
        assert_eq!(report.windows_skipped, 4);
        assert_eq!(report.windows_searched, 2);
        // ACGT at query 1 and 6, each matching target 1 and 5
        assert_eq!(collector.results()[0].hits.len(), 4);
    }

    #[test]
    fn test_alphabet_mismatch_before_start() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(&dir, &[NamedSequence::new("t", "ACGTACGT")], 4);
        let mut trace = Trace::default();
        let query = NamedSequence::new("p", "MKVL").with_alphabet(PackingKind::Protein);
        let err = Searcher::new(&store).search("p", &query, &mut trace).unwrap_err();
        assert!(matches!(err, SsahaError::PackingMismatch { .. }));
        assert!(trace.0.is_empty());
    }

    #[test]
    fn test_query_step() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(&dir, &[NamedSequence::new("t", "ACGTACGTAC")], 4);
        assert!(Searcher::new(&store).with_step(0).is_err());
        let searcher = Searcher::new(&store).with_step(2).unwrap();
        let mut collector = HitCollector::new();
        let report = searcher
            .search("q", &NamedSequence::new("q", "ACGTACGT"), &mut collector)
            .unwrap();
        // Windows at 1, 3, 5
        assert_eq!(report.windows_searched, 3);
        let offsets: Vec<_> = collector.results()[0].hits.iter().map(|h| h.query_offset).collect();
        assert!(offsets.iter().all(|&q| q % 2 == 1));
    }

    #[test]
    fn test_search_batch_keeps_input_order() {
        let dir = tempfile::tempdir().unwrap();
        let db = vec![
            NamedSequence::new("a", "GATTACAGATTACA"),
            NamedSequence::new("b", "CCCCGGGGTTTTAA"),
        ];
        let store = store(&dir, &db, 5);
        let queries = vec![
            NamedSequence::new("qb", "CCCCGGGGTTTTAA"),
            NamedSequence::new("none", "ACACACACACAC"),
            NamedSequence::new("qa", "TTACAGATT"),
        ];
        let results = Searcher::new(&store).search_batch(&queries, 5).unwrap();
        let names: Vec<_> = results.iter().map(|r| r.query_id.as_str()).collect();
        assert_eq!(names, ["qb", "none", "qa"]);
        assert_eq!(
            results[0].hits,
            vec![Hit { target_id: 1, query_offset: 1, target_offset: 1, length: 14 }]
        );
        assert!(results[1].hits.is_empty());
        assert!(results[2].hits.iter().all(|h| h.target_id == 0));
    }
}
