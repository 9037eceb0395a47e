//! Reads placed on a contig.
//!
//! [`AssembledRead`] is the frozen form stored in a [`Contig`](super::Contig):
//! its bases are kept as differences from the consensus. [`ReadBuilder`]
//! holds the full gapped bases and is what contig edits operate on.

use crate::phd::{PhdInfo, PhdRecord};
use crate::range::Range;
use crate::sequence::{count_bases, Direction, ReferenceMappedSequence, GAP};

/// Quality assigned to a gap when per-read qualities are derived from phd
/// data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum GapQualityPolicy {
    /// The lower of the two flanking base qualities.
    #[default]
    LowestFlanking,
    /// The higher of the two flanking base qualities.
    HighestFlanking,
    /// Always zero.
    Zero,
}

/// Index into the read's native full-length sequence of the `ungapped`-th
/// valid base, counted in contig orientation.
#[inline]
pub(crate) fn native_index(direction: Direction, valid_range: Range, ungapped: usize) -> i64 {
    match direction {
        Direction::Forward => valid_range.begin() + ungapped as i64,
        Direction::Reverse => valid_range.end() - ungapped as i64,
    }
}

/// Native quality of every gapped position; `None` at gaps. Returns `None`
/// when the phd record does not cover the valid range.
pub(crate) fn native_qualities(
    bases: &[u8],
    direction: Direction,
    valid_range: Range,
    full_length: usize,
    phd: &PhdRecord,
) -> Option<Vec<Option<u8>>> {
    if phd.qualities.len() != full_length || valid_range.end() >= full_length as i64 {
        return None;
    }
    let mut ungapped = 0usize;
    let mut out = Vec::with_capacity(bases.len());
    for &b in bases {
        if b == GAP {
            out.push(None);
        } else {
            let i = native_index(direction, valid_range, ungapped);
            out.push(Some(*phd.qualities.get(usize::try_from(i).ok()?)?));
            ungapped += 1;
        }
    }
    Some(out)
}

/// Fill gap qualities from their flanking bases.
pub(crate) fn fill_gap_qualities(qualities: &[Option<u8>], policy: GapQualityPolicy) -> Vec<u8> {
    (0..qualities.len())
        .map(|i| match qualities[i] {
            Some(q) => q,
            None if policy == GapQualityPolicy::Zero => 0,
            None => {
                let left = qualities[..i].iter().rev().find_map(|q| *q);
                let right = qualities[i + 1..].iter().find_map(|q| *q);
                match (left, right, policy) {
                    (Some(l), Some(r), GapQualityPolicy::HighestFlanking) => l.max(r),
                    (Some(l), Some(r), _) => l.min(r),
                    (Some(q), None, _) | (None, Some(q), _) => q,
                    (None, None, _) => 0,
                }
            }
        })
        .collect()
}

/// A read aligned to a frozen contig.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssembledRead {
    id: String,
    direction: Direction,
    offset: usize,
    sequence: ReferenceMappedSequence,
    valid_range: Range,
    full_length: usize,
    phd_info: PhdInfo,
}

impl AssembledRead {
    #[inline]
    pub fn id(&self) -> &str {
        &self.id
    }

    #[inline]
    pub fn direction(&self) -> Direction {
        self.direction
    }

    /// 0-based gapped start in the contig.
    #[inline]
    pub fn offset(&self) -> usize {
        self.offset
    }

    /// 0-based gapped end (inclusive) in the contig.
    #[inline]
    pub fn end(&self) -> usize {
        self.offset + self.sequence.len() - 1
    }

    /// Columns covered, as a 0-based gapped range.
    #[inline]
    pub fn gapped_range(&self) -> Range {
        Range::of_length(self.offset as i64, self.sequence.len())
    }

    /// Gapped length.
    #[inline]
    pub fn len(&self) -> usize {
        self.sequence.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.sequence.is_empty()
    }

    #[inline]
    pub fn ungapped_len(&self) -> usize {
        self.sequence.ungapped_len()
    }

    /// The aligned part of the read, as a 0-based range into its ungapped
    /// full-length sequence in native orientation.
    #[inline]
    pub fn valid_range(&self) -> Range {
        self.valid_range
    }

    /// Ungapped length of the whole read, including the unaligned ends.
    #[inline]
    pub fn full_length(&self) -> usize {
        self.full_length
    }

    #[inline]
    pub fn phd_info(&self) -> &PhdInfo {
        &self.phd_info
    }

    #[inline]
    pub fn sequence(&self) -> &ReferenceMappedSequence {
        &self.sequence
    }

    #[inline]
    pub fn covers(&self, column: usize) -> bool {
        column >= self.offset && column <= self.end()
    }

    /// Consensus bases this read is anchored to.
    #[inline]
    fn reference<'a>(&self, consensus: &'a [u8]) -> &'a [u8] {
        let start = self.offset.min(consensus.len());
        let end = (self.offset + self.len()).min(consensus.len());
        &consensus[start..end]
    }

    /// Base at a contig column, or `None` if the read does not cover it.
    #[inline]
    pub fn base_at(&self, column: usize, consensus: &[u8]) -> Option<u8> {
        if !self.covers(column) {
            return None;
        }
        Some(self.sequence.base(column - self.offset, self.reference(consensus)))
    }

    /// Full gapped bases in contig orientation.
    pub fn gapped_bases(&self, consensus: &[u8]) -> Vec<u8> {
        self.sequence.decode(self.reference(consensus))
    }

    /// Native quality of each gapped base (`None` at gaps), or `None` if the
    /// phd record is inconsistent with this read.
    pub fn native_qualities(&self, consensus: &[u8], phd: &PhdRecord) -> Option<Vec<Option<u8>>> {
        native_qualities(
            &self.gapped_bases(consensus),
            self.direction,
            self.valid_range,
            self.full_length,
            phd,
        )
    }

    /// Native index of each gapped base (`None` at gaps).
    pub fn native_offsets(&self) -> Vec<Option<usize>> {
        (0..self.len())
            .map(|i| {
                if self.sequence.is_gap(i) {
                    None
                } else {
                    let u = self.sequence.ungapped_offset(i);
                    usize::try_from(native_index(self.direction, self.valid_range, u)).ok()
                }
            })
            .collect()
    }
}

/// A mutable read: full gapped bases plus placement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadBuilder {
    id: String,
    direction: Direction,
    offset: usize,
    bases: Vec<u8>,
    valid_range: Range,
    full_length: usize,
    phd_info: PhdInfo,
}

impl ReadBuilder {
    /// A read whose gapped `bases` start at contig column `offset`.
    /// `valid_range` indexes the ungapped full-length read in native
    /// orientation.
    pub fn new(
        id: impl Into<String>,
        bases: impl Into<Vec<u8>>,
        offset: usize,
        direction: Direction,
        valid_range: Range,
        full_length: usize,
    ) -> Self {
        Self {
            id: id.into(),
            direction,
            offset,
            bases: bases.into(),
            valid_range,
            full_length,
            phd_info: PhdInfo::default(),
        }
    }

    /// A read covering its whole full-length sequence.
    pub fn untrimmed(
        id: impl Into<String>,
        bases: impl Into<Vec<u8>>,
        offset: usize,
        direction: Direction,
    ) -> Self {
        let bases = bases.into();
        let full_length = count_bases(&bases);
        let valid_range = Range::of_length(0, full_length);
        Self::new(id, bases, offset, direction, valid_range, full_length)
    }

    pub fn with_phd_info(mut self, phd_info: PhdInfo) -> Self {
        self.phd_info = phd_info;
        self
    }

    /// Unfreeze a contig read.
    pub fn from_read(read: &AssembledRead, consensus: &[u8]) -> Self {
        Self {
            id: read.id.clone(),
            direction: read.direction,
            offset: read.offset,
            bases: read.gapped_bases(consensus),
            valid_range: read.valid_range,
            full_length: read.full_length,
            phd_info: read.phd_info.clone(),
        }
    }

    #[inline]
    pub fn id(&self) -> &str {
        &self.id
    }

    #[inline]
    pub fn direction(&self) -> Direction {
        self.direction
    }

    #[inline]
    pub fn offset(&self) -> usize {
        self.offset
    }

    /// Inclusive gapped end; only meaningful for non-empty reads.
    #[inline]
    pub fn end(&self) -> usize {
        (self.offset + self.bases.len()).saturating_sub(1)
    }

    #[inline]
    pub fn gapped_range(&self) -> Range {
        Range::of_length(self.offset as i64, self.bases.len())
    }

    /// Gapped bases in contig orientation.
    #[inline]
    pub fn bases(&self) -> &[u8] {
        &self.bases
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.bases.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.bases.is_empty()
    }

    #[inline]
    pub fn ungapped_len(&self) -> usize {
        count_bases(&self.bases)
    }

    #[inline]
    pub fn valid_range(&self) -> Range {
        self.valid_range
    }

    #[inline]
    pub fn full_length(&self) -> usize {
        self.full_length
    }

    #[inline]
    pub fn phd_info(&self) -> &PhdInfo {
        &self.phd_info
    }

    #[inline]
    pub fn covers(&self, column: usize) -> bool {
        !self.bases.is_empty() && column >= self.offset && column <= self.end()
    }

    /// Base at a contig column, if covered.
    #[inline]
    pub fn base_at(&self, column: usize) -> Option<u8> {
        column
            .checked_sub(self.offset)
            .and_then(|i| self.bases.get(i).copied())
    }

    /// Per-base qualities from phd data with gaps filled by `policy`.
    pub fn qualities(&self, phd: &PhdRecord, policy: GapQualityPolicy) -> Option<Vec<u8>> {
        let native = native_qualities(
            &self.bases,
            self.direction,
            self.valid_range,
            self.full_length,
            phd,
        )?;
        Some(fill_gap_qualities(&native, policy))
    }

    #[inline]
    pub(crate) fn set_offset(&mut self, offset: usize) {
        self.offset = offset;
    }

    pub(crate) fn insert_base(&mut self, i: usize, base: u8) {
        self.bases.insert(i, base);
    }

    pub(crate) fn remove_base(&mut self, i: usize) -> u8 {
        self.bases.remove(i)
    }

    /// Replace read-relative positions `[start, end)` with `replacement`.
    pub(crate) fn splice(&mut self, start: usize, end: usize, replacement: &[u8]) {
        self.bases.splice(start..end, replacement.iter().copied());
    }

    /// Keep only the contig columns in `columns`, adjusting the valid range
    /// for the bases cut off each end. Returns `false` if nothing but gaps
    /// would remain.
    pub(crate) fn trim_to(&mut self, columns: Range) -> bool {
        let window = columns.intersection(&self.gapped_range());
        if window.is_empty() {
            return false;
        }
        let start = window.begin() as usize - self.offset;
        let end = window.end() as usize - self.offset + 1;
        let cut_left = count_bases(&self.bases[..start]) as i64;
        let cut_right = count_bases(&self.bases[end..]) as i64;
        if count_bases(&self.bases[start..end]) == 0 {
            return false;
        }
        self.bases = self.bases[start..end].to_vec();
        self.offset = window.begin() as usize;
        let (b, e) = (self.valid_range.begin(), self.valid_range.end());
        self.valid_range = match self.direction {
            Direction::Forward => Range::new(b + cut_left, e - cut_right),
            Direction::Reverse => Range::new(b + cut_right, e - cut_left),
        };
        true
    }

    /// Freeze against the final consensus.
    pub(crate) fn freeze(self, consensus: &[u8]) -> AssembledRead {
        let start = self.offset.min(consensus.len());
        let end = (self.offset + self.bases.len()).min(consensus.len());
        AssembledRead {
            sequence: ReferenceMappedSequence::encode(&self.bases, &consensus[start..end]),
            id: self.id,
            direction: self.direction,
            offset: self.offset,
            valid_range: self.valid_range,
            full_length: self.full_length,
            phd_info: self.phd_info,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_freeze_keeps_bases() {
        let consensus = b"ACGTAC*GTA";
        let read = ReadBuilder::untrimmed("r1", b"GTTC*G".to_vec(), 2, Direction::Forward);
        let frozen = read.clone().freeze(consensus);
        assert_eq!(frozen.gapped_bases(consensus), b"GTTC*G");
        assert_eq!(frozen.sequence().num_differences(), 1);
        assert_eq!(frozen.base_at(4, consensus), Some(b'T'));
        assert_eq!(frozen.base_at(1, consensus), None);
        assert_eq!(frozen.end(), 7);
        assert_eq!(ReadBuilder::from_read(&frozen, consensus), read);
    }

    #[test]
    fn test_trim_adjusts_valid_range() {
        let mut fwd = ReadBuilder::new(
            "f",
            b"AC*GTA".to_vec(),
            10,
            Direction::Forward,
            Range::new(3, 7),
            12,
        );
        assert!(fwd.trim_to(Range::new(12, 14)));
        assert_eq!(fwd.bases(), b"*GT");
        assert_eq!(fwd.offset(), 12);
        assert_eq!(fwd.valid_range(), Range::new(5, 6));

        let mut rev = ReadBuilder::new(
            "r",
            b"AC*GTA".to_vec(),
            10,
            Direction::Reverse,
            Range::new(3, 7),
            12,
        );
        assert!(rev.trim_to(Range::new(12, 14)));
        assert_eq!(rev.valid_range(), Range::new(4, 5));

        let mut gaps_only = ReadBuilder::untrimmed("g", b"A*C".to_vec(), 0, Direction::Forward);
        assert!(!gaps_only.trim_to(Range::new(1, 1)));
    }

    #[test]
    fn test_native_qualities_reverse() {
        let phd = PhdRecord::new(b"AAGTC".to_vec(), vec![10, 20, 30, 40, 50]);
        // native valid bases 1..=3 ("AGT"), contig orientation "AC*T"
        let read = ReadBuilder::new("r", b"AC*T".to_vec(), 0, Direction::Reverse, Range::new(1, 3), 5);
        let q = read.qualities(&phd, GapQualityPolicy::LowestFlanking).unwrap();
        assert_eq!(q, vec![40, 30, 20, 20]);
        let q = read.qualities(&phd, GapQualityPolicy::HighestFlanking).unwrap();
        assert_eq!(q[2], 30);
        let q = read.qualities(&phd, GapQualityPolicy::Zero).unwrap();
        assert_eq!(q[2], 0);

        let short = PhdRecord::new(b"AAG".to_vec(), vec![1, 2, 3]);
        assert!(read.qualities(&short, GapQualityPolicy::Zero).is_none());
    }
}
