//! Best-segment calculation.
//!
//! Partitions the gapped consensus into consecutive segments, each naming a
//! read whose bases match the consensus across the whole segment. These are
//! the `BS` records of an ACE file.

use crate::contig::Contig;
use crate::range::Range;
use crate::sequence::bases_match;
use log::warn;

/// One consensus range attributed to a read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BaseSegment {
    /// 0-based gapped consensus range.
    pub range: Range,
    pub read_id: String,
}

impl BaseSegment {
    pub fn new(range: Range, read_id: impl Into<String>) -> Self {
        Self {
            range,
            read_id: read_id.into(),
        }
    }
}

/// The segments of a contig plus the columns no read matched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BestSegments {
    pub segments: Vec<BaseSegment>,
    /// Columns where no covering read matched the consensus, or no read
    /// covered at all; these were attributed by fallback.
    pub unmatched_columns: Vec<usize>,
}

impl BestSegments {
    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &BaseSegment> {
        self.segments.iter()
    }
}

/// Compute the best segments of `contig`.
///
/// The current segment's read is kept as long as it covers and matches.
/// Otherwise the first matching covering read in insertion order starts a
/// new segment. With no match the current read is kept if it still covers
/// the column, else the first covering read is used; with no coverage the
/// current segment is extended.
pub fn compute_best_segments(contig: &Contig) -> BestSegments {
    let consensus = contig.consensus().as_bytes();
    let reads: Vec<_> = contig.reads().collect();
    let coverage = contig.coverage();

    let mut result = BestSegments::default();
    // (read index, first column)
    let mut current: Option<(usize, usize)> = None;
    let mut uncovered_prefix = false;

    let matches = |idx: usize, column: usize| {
        reads[idx]
            .base_at(column, consensus)
            .is_some_and(|b| bases_match(b, consensus[column]))
    };

    for column in 0..consensus.len() {
        if let Some((idx, _)) = current {
            if matches(idx, column) {
                continue;
            }
        }

        let covering = coverage.covering(column);
        let chosen = match covering.iter().copied().find(|&idx| matches(idx, column)) {
            Some(idx) => idx,
            None => {
                result.unmatched_columns.push(column);
                let fallback = current
                    .map(|(idx, _)| idx)
                    .filter(|idx| covering.contains(idx))
                    .or_else(|| covering.first().copied());
                match fallback {
                    Some(idx) => {
                        warn!(
                            "contig {}: no read matches consensus at column {}, using {}",
                            contig.id(),
                            column,
                            reads[idx].id()
                        );
                        idx
                    }
                    None => {
                        warn!("contig {}: column {} has no coverage", contig.id(), column);
                        if current.is_none() {
                            uncovered_prefix = true;
                        }
                        continue;
                    }
                }
            }
        };

        match current {
            Some((idx, _)) if idx == chosen => {}
            Some((idx, start)) => {
                result
                    .segments
                    .push(BaseSegment::new(Range::new(start as i64, column as i64 - 1), reads[idx].id()));
                current = Some((chosen, column));
            }
            None => {
                let start = if uncovered_prefix { 0 } else { column };
                current = Some((chosen, start));
            }
        }
    }

    if let Some((idx, start)) = current {
        result.segments.push(BaseSegment::new(
            Range::new(start as i64, consensus.len() as i64 - 1),
            reads[idx].id(),
        ));
    }
    result
}
