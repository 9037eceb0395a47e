//! Column coverage queries over a set of placed reads.

use crate::range::Range;

/// Reads sorted by gapped start for fast "which reads cover this column"
/// lookups. Results are read indices in insertion order.
#[derive(Debug, Clone, Default)]
pub struct CoverageIndex {
    /// `(start, end, read index)`, sorted by start.
    spans: Vec<(usize, usize, usize)>,
    max_len: usize,
}

impl CoverageIndex {
    /// Build from the gapped ranges of reads, in insertion order.
    pub fn from_ranges<I>(ranges: I) -> Self
    where
        I: IntoIterator<Item = Range>,
    {
        let mut spans: Vec<(usize, usize, usize)> = ranges
            .into_iter()
            .enumerate()
            .filter(|(_, r)| !r.is_empty() && r.begin() >= 0)
            .map(|(idx, r)| (r.begin() as usize, r.end() as usize, idx))
            .collect();
        spans.sort_unstable();
        let max_len = spans.iter().map(|&(s, e, _)| e - s + 1).max().unwrap_or(0);
        Self { spans, max_len }
    }

    /// Indices of every read covering `column`, in insertion order.
    pub fn covering(&self, column: usize) -> Vec<usize> {
        let lowest = column.saturating_sub(self.max_len.saturating_sub(1));
        let first = self.spans.partition_point(|&(s, _, _)| s < lowest);
        let mut hits: Vec<usize> = self.spans[first..]
            .iter()
            .take_while(|&&(s, _, _)| s <= column)
            .filter(|&&(_, e, _)| e >= column)
            .map(|&(_, _, idx)| idx)
            .collect();
        hits.sort_unstable();
        hits
    }

    /// Number of reads covering `column`.
    pub fn depth(&self, column: usize) -> usize {
        self.covering(column).len()
    }

    /// True if at least one read covers `column`.
    pub fn is_covered(&self, column: usize) -> bool {
        let lowest = column.saturating_sub(self.max_len.saturating_sub(1));
        let first = self.spans.partition_point(|&(s, _, _)| s < lowest);
        self.spans[first..]
            .iter()
            .take_while(|&&(s, _, _)| s <= column)
            .any(|&(_, e, _)| e >= column)
    }

    /// Number of indexed reads.
    pub fn len(&self) -> usize {
        self.spans.len()
    }

    pub fn is_empty(&self) -> bool {
        self.spans.is_empty()
    }
}
