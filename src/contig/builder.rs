//! Mutable contig construction and editing.

use super::consensus::ConsensusCaller;
use super::coverage::CoverageIndex;
use super::read::{GapQualityPolicy, ReadBuilder};
use super::{report_drop, Contig, DropHook, DropReason};
use crate::error::{AceError, Result};
use crate::phd::PhdLookup;
use crate::range::{CoordinateSystem, Range};
use crate::sequence::{count_bases, ungap, GappedSequence, GAP};
use log::debug;
use rustc_hash::FxHashMap;
use std::sync::Arc;

/// Builds and edits a contig. Freeze it with [`ContigBuilder::build`].
///
/// Column arguments are 0-based gapped consensus positions.
#[derive(Clone)]
pub struct ContigBuilder {
    id: String,
    consensus: Vec<u8>,
    qualities: Option<Vec<u8>>,
    complemented: bool,
    reads: Vec<ReadBuilder>,
    index: FxHashMap<String, usize>,
    drop_hook: Option<Arc<dyn DropHook>>,
}

impl ContigBuilder {
    pub fn new(id: impl Into<String>, consensus: impl Into<Vec<u8>>) -> Self {
        Self {
            id: id.into(),
            consensus: consensus.into(),
            qualities: None,
            complemented: false,
            reads: Vec::new(),
            index: FxHashMap::default(),
            drop_hook: None,
        }
    }

    /// Start editing a copy of a frozen contig.
    pub fn from_contig(contig: &Contig) -> Self {
        let consensus = contig.consensus().as_bytes();
        let mut builder = Self::new(contig.id(), consensus.to_vec())
            .complemented(contig.is_complemented());
        builder.qualities = contig.consensus_qualities().map(<[u8]>::to_vec);
        for read in contig.reads() {
            builder.push_read(ReadBuilder::from_read(read, consensus));
        }
        builder
    }

    pub fn complemented(mut self, complemented: bool) -> Self {
        self.complemented = complemented;
        self
    }

    /// Qualities of the ungapped consensus bases.
    pub fn consensus_qualities(mut self, qualities: Vec<u8>) -> Self {
        self.qualities = Some(qualities);
        self
    }

    pub fn with_drop_hook(mut self, hook: Arc<dyn DropHook>) -> Self {
        self.drop_hook = Some(hook);
        self
    }

    pub(crate) fn set_drop_hook(&mut self, hook: Option<Arc<dyn DropHook>>) {
        self.drop_hook = hook;
    }

    #[inline]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Gapped consensus bases.
    #[inline]
    pub fn consensus(&self) -> &[u8] {
        &self.consensus
    }

    #[inline]
    pub fn qualities(&self) -> Option<&[u8]> {
        self.qualities.as_deref()
    }

    #[inline]
    pub fn num_reads(&self) -> usize {
        self.reads.len()
    }

    pub fn reads(&self) -> impl Iterator<Item = &ReadBuilder> {
        self.reads.iter()
    }

    pub fn read(&self, id: &str) -> Option<&ReadBuilder> {
        self.index.get(id).map(|&i| &self.reads[i])
    }

    /// Mutable access for placement-neutral changes such as phd info.
    pub fn read_mut(&mut self, id: &str) -> Option<&mut ReadBuilder> {
        self.index.get(id).map(|&i| &mut self.reads[i])
    }

    fn push_read(&mut self, read: ReadBuilder) {
        self.index.insert(read.id().to_string(), self.reads.len());
        self.reads.push(read);
    }

    fn read_index(&self, id: &str) -> Result<usize> {
        self.index
            .get(id)
            .copied()
            .ok_or_else(|| AceError::UnknownRead(id.to_string()))
    }

    fn invalid(&self, message: String) -> AceError {
        AceError::InvalidEdit(format!("contig {}: {}", self.id, message))
    }

    pub fn add_read(&mut self, read: ReadBuilder) -> Result<()> {
        if self.index.contains_key(read.id()) {
            return Err(AceError::DuplicateRead(read.id().to_string()));
        }
        self.push_read(read);
        Ok(())
    }

    pub fn remove_read(&mut self, id: &str) -> Result<ReadBuilder> {
        let idx = self.read_index(id)?;
        let read = self.reads.remove(idx);
        self.index.remove(id);
        for slot in self.index.values_mut() {
            if *slot > idx {
                *slot -= 1;
            }
        }
        Ok(read)
    }

    /// Insert a gap column before `column`. Reads starting at or after it
    /// move right; reads spanning it receive a gap.
    pub fn insert_gap(&mut self, column: usize) -> Result<()> {
        if column > self.consensus.len() {
            return Err(self.invalid(format!(
                "gap column {} past consensus end {}",
                column,
                self.consensus.len()
            )));
        }
        self.consensus.insert(column, GAP);
        for read in &mut self.reads {
            if read.offset() >= column {
                read.set_offset(read.offset() + 1);
            } else if read.end() >= column {
                read.insert_base(column - read.offset(), GAP);
            }
        }
        Ok(())
    }

    /// Remove a gap column. Fails unless the consensus and every read
    /// covering the column hold a gap there.
    pub fn delete_gap(&mut self, column: usize) -> Result<()> {
        match self.consensus.get(column) {
            Some(&GAP) => {}
            Some(&b) => {
                return Err(self.invalid(format!(
                    "consensus column {} is '{}', not a gap",
                    column, b as char
                )))
            }
            None => return Err(self.invalid(format!("column {} out of bounds", column))),
        }
        if let Some(read) = self
            .reads
            .iter()
            .find(|r| r.base_at(column).is_some_and(|b| b != GAP))
        {
            return Err(self.invalid(format!(
                "read {} has a base at column {}",
                read.id(),
                column
            )));
        }

        self.consensus.remove(column);
        for read in &mut self.reads {
            if read.offset() > column {
                read.set_offset(read.offset() - 1);
            } else if read.covers(column) {
                read.remove_base(column - read.offset());
            }
        }
        Ok(())
    }

    /// Replace the gap layout of one read over the consensus columns in
    /// `range`. `new_bases` must hold exactly the same ungapped bases.
    pub fn reabacus(&mut self, read_id: &str, range: Range, new_bases: &[u8]) -> Result<()> {
        let idx = self.read_index(read_id)?;
        let read = &self.reads[idx];
        if range.is_empty() || !read.gapped_range().contains(&range) {
            return Err(self.invalid(format!(
                "reabacus range {} outside read {}",
                range, read_id
            )));
        }
        let start = range.begin() as usize - read.offset();
        let end = range.end() as usize - read.offset() + 1;

        let expected = ungap(&read.bases()[start..end]);
        let actual = ungap(new_bases);
        if !expected.eq_ignore_ascii_case(&actual) {
            return Err(AceError::ReabacusMismatch {
                read_id: read_id.to_string(),
                expected: String::from_utf8_lossy(&expected).into_owned(),
                actual: String::from_utf8_lossy(&actual).into_owned(),
            });
        }
        let new_end = read.offset() + read.len() - (end - start) + new_bases.len();
        if new_end > self.consensus.len() {
            return Err(self.invalid(format!(
                "reabacus of read {} runs past the consensus",
                read_id
            )));
        }

        let upper = new_bases.to_ascii_uppercase();
        self.reads[idx].splice(start, end, &upper);
        Ok(())
    }

    /// Move a read by `delta` columns.
    pub fn shift_read(&mut self, read_id: &str, delta: i64) -> Result<()> {
        let idx = self.read_index(read_id)?;
        let read = &self.reads[idx];
        let offset = read.offset() as i64 + delta;
        if offset < 0 {
            return Err(self.invalid(format!(
                "shifting read {} by {} gives negative offset {}",
                read_id, delta, offset
            )));
        }
        if offset as usize + read.len() > self.consensus.len() {
            return Err(self.invalid(format!(
                "shifting read {} by {} runs past the consensus",
                read_id, delta
            )));
        }
        self.reads[idx].set_offset(offset as usize);
        Ok(())
    }

    /// Split into one builder per range. Each read goes to the first range
    /// it intersects, trimmed to it; reads intersecting no range are
    /// dropped. New ids are `<id>_<begin>_<end>` with 1-based bounds.
    pub fn split(&self, ranges: &[Range]) -> Result<Vec<ContigBuilder>> {
        let split_error = |message: String| AceError::InvalidSplit {
            contig_id: self.id.clone(),
            message,
        };
        let bounds = Range::of_length(0, self.consensus.len());
        for range in ranges {
            if range.is_empty() || !bounds.contains(range) {
                return Err(split_error(format!("range {} outside consensus {}", range, bounds)));
            }
        }
        let mut sorted = ranges.to_vec();
        sorted.sort();
        if let Some(pair) = sorted.windows(2).find(|w| w[0].intersects(&w[1])) {
            return Err(split_error(format!("ranges {} and {} overlap", pair[0], pair[1])));
        }

        let mut parts: Vec<ContigBuilder> = ranges
            .iter()
            .map(|range| {
                let begin = range.begin() as usize;
                let end = range.end() as usize + 1;
                let id = format!(
                    "{}_{}_{}",
                    self.id,
                    range.begin_in(CoordinateSystem::ResidueBased),
                    range.end_in(CoordinateSystem::ResidueBased)
                );
                let mut part = ContigBuilder::new(id, self.consensus[begin..end].to_vec())
                    .complemented(self.complemented);
                part.drop_hook = self.drop_hook.clone();
                if let Some(qualities) = &self.qualities {
                    let skip = count_bases(&self.consensus[..begin]);
                    let take = count_bases(&self.consensus[begin..end]);
                    part.qualities = qualities.get(skip..skip + take).map(<[u8]>::to_vec);
                }
                part
            })
            .collect();

        for read in &self.reads {
            let Some(target) = ranges.iter().position(|r| r.intersects(&read.gapped_range())) else {
                report_drop(self.drop_hook.as_ref(), &self.id, read.id(), DropReason::OutsideConsensus);
                continue;
            };
            let mut trimmed = read.clone();
            if !trimmed.trim_to(ranges[target]) {
                report_drop(self.drop_hook.as_ref(), &self.id, read.id(), DropReason::NoBases);
                continue;
            }
            trimmed.set_offset(trimmed.offset() - ranges[target].begin() as usize);
            parts[target].push_read(trimmed);
        }
        Ok(parts)
    }

    /// Recall every covered consensus column with `caller`. When a phd
    /// lookup is given, per-read qualities are passed along with the bases;
    /// reads without usable phd data then vote with quality 0.
    ///
    /// Stored consensus qualities no longer describe the recalled bases and
    /// are discarded.
    pub fn recall_consensus(
        &mut self,
        caller: &dyn ConsensusCaller,
        quality_source: Option<(&dyn PhdLookup, GapQualityPolicy)>,
    ) -> Result<()> {
        let read_qualities: Option<Vec<Option<Vec<u8>>>> = quality_source.map(|(lookup, policy)| {
            self.reads
                .iter()
                .map(|read| {
                    lookup
                        .get(read.id())
                        .and_then(|phd| read.qualities(&phd, policy))
                })
                .collect()
        });

        let coverage = CoverageIndex::from_ranges(self.reads.iter().map(|r| r.gapped_range()));
        let mut bases = Vec::new();
        let mut qualities = Vec::new();
        for column in 0..self.consensus.len() {
            let covering = coverage.covering(column);
            if covering.is_empty() {
                continue;
            }
            bases.clear();
            qualities.clear();
            for &idx in &covering {
                let read = &self.reads[idx];
                let i = column - read.offset();
                bases.push(read.bases()[i]);
                if let Some(all) = &read_qualities {
                    qualities.push(all[idx].as_ref().map_or(0, |q| q[i]));
                }
            }
            let q = read_qualities.as_ref().map(|_| qualities.as_slice());
            self.consensus[column] = caller.call(&bases, q);
        }
        if self.qualities.take().is_some() {
            debug!("contig {}: recalled consensus, stored qualities discarded", self.id);
        }
        Ok(())
    }

    /// Freeze into an immutable [`Contig`].
    ///
    /// Reads not lying within the consensus are dropped. The consensus (and
    /// its qualities) is trimmed to the columns covered by the remaining
    /// reads, which are shifted to match.
    pub fn build(self) -> Result<Contig> {
        let ContigBuilder {
            id,
            consensus,
            qualities,
            complemented,
            reads,
            drop_hook,
            ..
        } = self;

        if let Some(q) = &qualities {
            let expected = count_bases(&consensus);
            if q.len() != expected {
                return Err(AceError::Build {
                    contig_id: id,
                    message: format!(
                        "{} consensus qualities for {} ungapped bases",
                        q.len(),
                        expected
                    ),
                });
            }
        }

        let bounds = Range::of_length(0, consensus.len());
        let mut kept = Vec::with_capacity(reads.len());
        for read in reads {
            if read.is_empty() || !bounds.contains(&read.gapped_range()) {
                report_drop(drop_hook.as_ref(), &id, read.id(), DropReason::OutsideConsensus);
                continue;
            }
            if read.valid_range().len() != read.ungapped_len()
                || read.valid_range().begin() < 0
                || read.valid_range().end() >= read.full_length() as i64
            {
                return Err(AceError::Build {
                    contig_id: id,
                    message: format!(
                        "read {} valid range {} does not match its {} bases (full length {})",
                        read.id(),
                        read.valid_range(),
                        read.ungapped_len(),
                        read.full_length()
                    ),
                });
            }
            kept.push(read);
        }
        if kept.is_empty() {
            return Err(AceError::NoReads { contig_id: id });
        }

        let span = kept
            .iter()
            .fold(Range::empty(0), |acc, r| acc.union_span(&r.gapped_range()));
        let begin = span.begin() as usize;
        let end = span.end() as usize + 1;

        let qualities = qualities.map(|q| {
            let skip = count_bases(&consensus[..begin]);
            let take = count_bases(&consensus[begin..end]);
            q[skip..skip + take].to_vec()
        });
        let consensus = consensus[begin..end].to_vec();
        let reads = kept
            .into_iter()
            .map(|mut read| {
                read.set_offset(read.offset() - begin);
                read.freeze(&consensus)
            })
            .collect();

        Ok(Contig::from_parts(
            id,
            GappedSequence::new(consensus),
            qualities,
            complemented,
            reads,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contig::MostFrequentBase;
    use crate::phd::PhdRecord;
    use crate::sequence::Direction;
    use rustc_hash::FxHashMap;

    fn builder() -> ContigBuilder {
        let mut b = ContigBuilder::new("ctg", "ACGTACGT");
        b.add_read(ReadBuilder::untrimmed("r1", "ACGTA", 0, Direction::Forward))
            .unwrap();
        b.add_read(ReadBuilder::untrimmed("r2", "ACGT", 4, Direction::Forward))
            .unwrap();
        b
    }

    #[test]
    fn test_duplicate_and_unknown_reads() {
        let mut b = builder();
        let err = b
            .add_read(ReadBuilder::untrimmed("r1", "A", 0, Direction::Forward))
            .unwrap_err();
        assert!(matches!(err, AceError::DuplicateRead(id) if id == "r1"));
        assert!(matches!(b.remove_read("zz"), Err(AceError::UnknownRead(_))));
        let removed = b.remove_read("r1").unwrap();
        assert_eq!(removed.bases(), b"ACGTA");
        assert_eq!(b.read("r2").unwrap().offset(), 4);
        assert!(b.read("r1").is_none());
    }

    #[test]
    fn test_insert_then_delete_gap() {
        let mut b = builder();
        b.insert_gap(4).unwrap();
        assert_eq!(b.consensus(), b"ACGT*ACGT");
        assert_eq!(b.read("r1").unwrap().bases(), b"ACGT*A");
        assert_eq!(b.read("r2").unwrap().offset(), 5);

        b.delete_gap(4).unwrap();
        assert_eq!(b.consensus(), b"ACGTACGT");
        assert_eq!(b.read("r1").unwrap().bases(), b"ACGTA");
        assert_eq!(b.read("r2").unwrap().offset(), 4);

        assert!(matches!(b.delete_gap(2), Err(AceError::InvalidEdit(_))));
        assert!(b.insert_gap(100).is_err());
    }

    #[test]
    fn test_delete_gap_rejects_read_base() {
        let mut b = ContigBuilder::new("ctg", "AC*GT");
        b.add_read(ReadBuilder::untrimmed("r1", "ACTGT", 0, Direction::Forward))
            .unwrap();
        assert!(b.delete_gap(2).is_err());
        assert_eq!(b.consensus(), b"AC*GT");
    }

    #[test]
    fn test_reabacus() {
        let mut b = ContigBuilder::new("ctg", "AC**GTAC");
        b.add_read(ReadBuilder::untrimmed("r1", "AC**GTAC", 0, Direction::Forward))
            .unwrap();
        b.reabacus("r1", Range::new(1, 4), b"*CG*").unwrap();
        assert_eq!(b.read("r1").unwrap().bases(), b"A*CG*TAC");

        let err = b.reabacus("r1", Range::new(1, 4), b"C*T*").unwrap_err();
        assert!(matches!(err, AceError::ReabacusMismatch { .. }));
        assert!(b.reabacus("r1", Range::new(6, 9), b"AC").is_err());
    }

    #[test]
    fn test_shift_read() {
        let mut b = builder();
        b.shift_read("r2", -1).unwrap();
        assert_eq!(b.read("r2").unwrap().offset(), 3);
        assert!(b.shift_read("r1", -1).is_err());
        assert!(b.shift_read("r2", 2).is_err());
    }

    #[test]
    fn test_build_trims_uncovered_consensus() {
        let mut b = ContigBuilder::new("ctg", "TTACGTAA").consensus_qualities(vec![1, 2, 3, 4, 5, 6, 7, 8]);
        b.add_read(ReadBuilder::untrimmed("r1", "ACG", 2, Direction::Forward))
            .unwrap();
        b.add_read(ReadBuilder::untrimmed("r2", "GT", 4, Direction::Reverse))
            .unwrap();
        b.add_read(ReadBuilder::untrimmed("out", "AAAA", 6, Direction::Forward))
            .unwrap();
        let contig = b.build().unwrap();
        assert_eq!(contig.consensus().as_bytes(), b"ACGT");
        assert_eq!(contig.consensus_qualities(), Some(&[3, 4, 5, 6][..]));
        assert_eq!(contig.read("r1").unwrap().offset(), 0);
        assert_eq!(contig.read("r2").unwrap().offset(), 2);
        assert!(!contig.contains_read("out"));
    }

    #[test]
    fn test_build_without_reads() {
        let err = ContigBuilder::new("empty", "ACGT").build().unwrap_err();
        assert!(matches!(err, AceError::NoReads { contig_id } if contig_id == "empty"));
    }

    #[test]
    fn test_split() {
        let mut b = ContigBuilder::new("ctg", "ACGTACGTAC").consensus_qualities(vec![9; 10]);
        b.add_read(ReadBuilder::untrimmed("a", "ACGTAC", 0, Direction::Forward))
            .unwrap();
        b.add_read(ReadBuilder::untrimmed("b", "GTAC", 6, Direction::Reverse))
            .unwrap();
        b.add_read(ReadBuilder::untrimmed("c", "C", 5, Direction::Forward))
            .unwrap();

        let parts = b.split(&[Range::new(0, 3), Range::new(6, 9)]).unwrap();
        assert_eq!(parts.len(), 2);
        assert_eq!(parts[0].id(), "ctg_1_4");
        assert_eq!(parts[1].id(), "ctg_7_10");
        assert_eq!(parts[0].num_reads(), 1);
        assert_eq!(parts[0].read("a").unwrap().bases(), b"ACGT");
        assert_eq!(parts[0].read("a").unwrap().valid_range(), Range::new(0, 3));
        assert_eq!(parts[1].read("b").unwrap().offset(), 0);
        assert!(parts.iter().all(|p| p.read("c").is_none()));
        assert_eq!(parts[1].qualities().unwrap().len(), 4);

        assert!(matches!(
            b.split(&[Range::new(0, 5), Range::new(5, 9)]),
            Err(AceError::InvalidSplit { .. })
        ));
        assert!(b.split(&[Range::new(0, 10)]).is_err());
    }

    #[test]
    fn test_recall_consensus() {
        let mut b = ContigBuilder::new("ctg", "ACGT").consensus_qualities(vec![5; 4]);
        b.add_read(ReadBuilder::untrimmed("r1", "ACTT", 0, Direction::Forward))
            .unwrap();
        b.add_read(ReadBuilder::untrimmed("r2", "ACTT", 0, Direction::Forward))
            .unwrap();
        b.add_read(ReadBuilder::untrimmed("r3", "ACGT", 0, Direction::Forward))
            .unwrap();
        b.recall_consensus(&MostFrequentBase, None).unwrap();
        assert_eq!(b.consensus(), b"ACTT");
        assert!(b.qualities().is_none());

        let mut phd: FxHashMap<String, PhdRecord> = FxHashMap::default();
        phd.insert("r1".into(), PhdRecord::with_uniform_quality("ACTT", 10));
        phd.insert("r2".into(), PhdRecord::with_uniform_quality("ACTT", 10));
        phd.insert("r3".into(), PhdRecord::with_uniform_quality("ACGT", 40));
        let lookup: &dyn PhdLookup = &phd;
        b.recall_consensus(&MostFrequentBase, Some((lookup, GapQualityPolicy::LowestFlanking)))
            .unwrap();
        assert_eq!(b.consensus(), b"ACGT");
    }
}
