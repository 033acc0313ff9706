//! Chaining of collinear raw hits
//!
//! Raw hits of one query are buffered until the search ends, sorted so that
//! hits on the same diagonal of the same target sit next to each other, and
//! merged in a single linear scan. Two hits chain when they share a target
//! and a diagonal and the second starts no later than one past the end of the
//! run so far, on both the query and the target.

use crate::error::Result;
use crate::search::{Hit, SearchListener};

/// Merge collinear hits, keeping runs of at least `min_length` residues
///
/// The output does not depend on the order of `hits`.
pub fn merge_hits(mut hits: Vec<Hit>, min_length: u32) -> Vec<Hit> {
    // Equal keys imply equal hits, so an unstable sort is deterministic
    hits.sort_unstable_by_key(|h| {
        (
            h.target_id,
            h.target_offset as u64 + h.query_offset as u64,
            h.target_offset,
            h.length,
        )
    });

    let mut merged = Vec::new();
    let mut iter = hits.into_iter();
    let Some(mut run) = iter.next() else {
        return merged;
    };
    for hit in iter {
        if extends(&run, &hit) {
            let end = hit.target_offset as u64 + hit.length as u64 - run.target_offset as u64;
            run.length = run.length.max(end.min(u32::MAX as u64) as u32);
        } else {
            if run.length >= min_length {
                merged.push(run);
            }
            run = hit;
        }
    }
    if run.length >= min_length {
        merged.push(run);
    }
    merged
}

#[inline]
fn extends(run: &Hit, hit: &Hit) -> bool {
    hit.target_id == run.target_id
        && hit.diagonal() == run.diagonal()
        && hit.query_offset as u64 <= run.query_offset as u64 + run.length as u64
        && hit.target_offset as u64 <= run.target_offset as u64 + run.length as u64
}

/// Listener that merges each query's raw hits before passing them on
///
/// Hits are held until `end_search`; the delegate then receives the merged
/// hits followed by `end_search`.
#[derive(Debug)]
pub struct HitMerger<L> {
    delegate: L,
    min_length: u32,
    pending: Vec<Hit>,
}

impl<L: SearchListener> HitMerger<L> {
    /// Merge hits for `delegate`, dropping runs shorter than `min_length`
    pub fn new(delegate: L, min_length: u32) -> Self {
        Self {
            delegate,
            min_length,
            pending: Vec::new(),
        }
    }

    /// Shortest run forwarded
    pub fn min_length(&self) -> u32 {
        self.min_length
    }

    /// The wrapped listener
    pub fn delegate(&self) -> &L {
        &self.delegate
    }

    /// Unwrap the listener
    pub fn into_inner(self) -> L {
        self.delegate
    }
}

impl<L: SearchListener> SearchListener for HitMerger<L> {
    fn start_search(&mut self, query_id: &str) -> Result<()> {
        self.pending.clear();
        self.delegate.start_search(query_id)
    }

    fn hit(&mut self, hit: Hit) -> Result<()> {
        self.pending.push(hit);
        Ok(())
    }

    fn end_search(&mut self, query_id: &str) -> Result<()> {
        let pending = std::mem::take(&mut self.pending);
        for hit in merge_hits(pending, self.min_length) {
            self.delegate.hit(hit)?;
        }
        self.delegate.end_search(query_id)
    }
}
