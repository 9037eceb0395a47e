//! Nucleotide sequences, gaps and read orientation.
//!
//! A gapped sequence keeps a sorted index of its gap offsets so that
//! gapped and ungapped coordinates can be converted in `O(log g)`.

use crate::range::Range;
use std::fmt;

/// The ACE gap symbol.
pub const GAP: u8 = b'*';

/// Orientation of a read relative to the contig.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    Forward,
    Reverse,
}

impl Direction {
    /// Parse the ACE `U`/`C` symbol.
    #[inline]
    pub fn from_ace(symbol: &[u8]) -> Option<Self> {
        match symbol {
            b"U" => Some(Direction::Forward),
            b"C" => Some(Direction::Reverse),
            _ => None,
        }
    }

    /// The ACE `U`/`C` symbol.
    #[inline]
    pub fn ace_symbol(self) -> &'static str {
        match self {
            Direction::Forward => "U",
            Direction::Reverse => "C",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.ace_symbol())
    }
}

/// True for IUPAC nucleotide codes (either case), `X`, and the gap symbol.
#[inline]
pub fn is_valid_base(b: u8) -> bool {
    matches!(
        b.to_ascii_uppercase(),
        b'A' | b'C'
            | b'G'
            | b'T'
            | b'U'
            | b'N'
            | b'R'
            | b'Y'
            | b'K'
            | b'M'
            | b'S'
            | b'W'
            | b'B'
            | b'D'
            | b'H'
            | b'V'
            | b'X'
            | GAP
    )
}

/// Complement of one IUPAC base; gaps and unknown codes map to themselves.
#[inline]
pub fn complement(b: u8) -> u8 {
    match b {
        b'A' => b'T',
        b'T' | b'U' => b'A',
        b'C' => b'G',
        b'G' => b'C',
        b'R' => b'Y',
        b'Y' => b'R',
        b'K' => b'M',
        b'M' => b'K',
        b'B' => b'V',
        b'V' => b'B',
        b'D' => b'H',
        b'H' => b'D',
        b'a' => b't',
        b't' | b'u' => b'a',
        b'c' => b'g',
        b'g' => b'c',
        other => other,
    }
}

/// Reverse complement of a (possibly gapped) sequence.
pub fn reverse_complement(bases: &[u8]) -> Vec<u8> {
    bases.iter().rev().map(|&b| complement(b)).collect()
}

/// Remove all gaps.
pub fn ungap(bases: &[u8]) -> Vec<u8> {
    bases.iter().copied().filter(|&b| b != GAP).collect()
}

/// Count the non-gap symbols.
#[inline]
pub fn count_bases(bases: &[u8]) -> usize {
    bases.iter().filter(|&&b| b != GAP).count()
}

/// Case-insensitive base equality.
#[inline]
pub fn bases_match(a: u8, b: u8) -> bool {
    a.eq_ignore_ascii_case(&b)
}

/// Sorted offsets of the gaps in a sequence.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
struct GapIndex {
    gaps: Vec<u32>,
}

impl GapIndex {
    fn of(bases: &[u8]) -> Self {
        Self {
            gaps: bases
                .iter()
                .enumerate()
                .filter(|(_, &b)| b == GAP)
                .map(|(i, _)| i as u32)
                .collect(),
        }
    }

    #[inline]
    fn len(&self) -> usize {
        self.gaps.len()
    }

    #[inline]
    fn contains(&self, gapped: usize) -> bool {
        self.gaps.binary_search(&(gapped as u32)).is_ok()
    }

    #[inline]
    fn gaps_before(&self, gapped: usize) -> usize {
        self.gaps.partition_point(|&g| (g as usize) < gapped)
    }

    #[inline]
    fn ungapped_offset(&self, gapped: usize) -> usize {
        gapped - self.gaps_before(gapped)
    }

    /// Gapped offset of the `ungapped`-th base. `gaps[i] - i` counts the
    /// bases before gap `i` and is non-decreasing, so binary search applies.
    fn gapped_offset(&self, ungapped: usize) -> usize {
        let (mut lo, mut hi) = (0, self.gaps.len());
        while lo < hi {
            let mid = (lo + hi) / 2;
            if self.gaps[mid] as usize - mid <= ungapped {
                lo = mid + 1;
            } else {
                hi = mid;
            }
        }
        ungapped + lo
    }

    fn offsets(&self) -> impl Iterator<Item = usize> + '_ {
        self.gaps.iter().map(|&g| g as usize)
    }
}

/// An owned nucleotide sequence that may contain gaps.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct GappedSequence {
    bases: Vec<u8>,
    gaps: GapIndex,
}

impl GappedSequence {
    /// Wrap already validated, uppercase bases.
    pub fn new(bases: Vec<u8>) -> Self {
        let gaps = GapIndex::of(&bases);
        Self { bases, gaps }
    }

    #[inline]
    pub fn as_bytes(&self) -> &[u8] {
        &self.bases
    }

    #[inline]
    pub fn into_bytes(self) -> Vec<u8> {
        self.bases
    }

    /// Gapped length.
    #[inline]
    pub fn len(&self) -> usize {
        self.bases.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.bases.is_empty()
    }

    /// Length without gaps.
    #[inline]
    pub fn ungapped_len(&self) -> usize {
        self.bases.len() - self.gaps.len()
    }

    #[inline]
    pub fn num_gaps(&self) -> usize {
        self.gaps.len()
    }

    /// Gapped offsets of every gap, ascending.
    pub fn gap_offsets(&self) -> impl Iterator<Item = usize> + '_ {
        self.gaps.offsets()
    }

    #[inline]
    pub fn base(&self, gapped: usize) -> Option<u8> {
        self.bases.get(gapped).copied()
    }

    #[inline]
    pub fn is_gap(&self, gapped: usize) -> bool {
        self.gaps.contains(gapped)
    }

    /// Number of gaps strictly before `gapped`.
    #[inline]
    pub fn gaps_before(&self, gapped: usize) -> usize {
        self.gaps.gaps_before(gapped)
    }

    /// Ungapped offset of `gapped`; a gap maps to the base that follows it.
    #[inline]
    pub fn ungapped_offset(&self, gapped: usize) -> usize {
        self.gaps.ungapped_offset(gapped)
    }

    /// Gapped offset of the `ungapped`-th base.
    #[inline]
    pub fn gapped_offset(&self, ungapped: usize) -> usize {
        self.gaps.gapped_offset(ungapped)
    }

    /// Bases without gaps.
    pub fn ungapped(&self) -> Vec<u8> {
        ungap(&self.bases)
    }

    /// Copy of the bases inside a 0-based gapped range.
    pub fn subsequence(&self, range: Range) -> GappedSequence {
        if range.is_empty() {
            return GappedSequence::default();
        }
        let begin = range.begin().max(0) as usize;
        let end = (range.end() as usize + 1).min(self.bases.len());
        GappedSequence::new(self.bases[begin.min(end)..end].to_vec())
    }
}

impl From<&str> for GappedSequence {
    fn from(s: &str) -> Self {
        GappedSequence::new(s.as_bytes().to_ascii_uppercase())
    }
}

impl fmt::Display for GappedSequence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&String::from_utf8_lossy(&self.bases))
    }
}

/// A read's gapped bases stored as differences from the consensus window it
/// is aligned to.
///
/// Only positions where the read disagrees with the consensus are kept, so
/// a well-assembled read costs little more than its gap index. Decoding
/// needs the consensus bases the read is anchored to.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ReferenceMappedSequence {
    length: u32,
    differences: Vec<(u32, u8)>,
    gaps: GapIndex,
}

impl ReferenceMappedSequence {
    /// Encode `bases` against `reference`, the consensus bases starting at the
    /// read's offset. Positions past the end of `reference` are stored as
    /// differences.
    pub fn encode(bases: &[u8], reference: &[u8]) -> Self {
        let differences = bases
            .iter()
            .enumerate()
            .filter(|&(i, &b)| reference.get(i).is_none_or(|&r| !bases_match(r, b)))
            .map(|(i, &b)| (i as u32, b))
            .collect();
        Self {
            length: bases.len() as u32,
            differences,
            gaps: GapIndex::of(bases),
        }
    }

    /// Gapped length.
    #[inline]
    pub fn len(&self) -> usize {
        self.length as usize
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.length == 0
    }

    #[inline]
    pub fn ungapped_len(&self) -> usize {
        self.len() - self.gaps.len()
    }

    #[inline]
    pub fn num_gaps(&self) -> usize {
        self.gaps.len()
    }

    /// Number of positions that disagree with the consensus.
    #[inline]
    pub fn num_differences(&self) -> usize {
        self.differences.len()
    }

    /// Offsets (relative to the read start) that disagree with the consensus.
    pub fn difference_offsets(&self) -> impl Iterator<Item = usize> + '_ {
        self.differences.iter().map(|&(i, _)| i as usize)
    }

    /// Base at read-relative gapped offset `i`.
    #[inline]
    pub fn base(&self, i: usize, reference: &[u8]) -> u8 {
        match self.differences.binary_search_by_key(&(i as u32), |&(o, _)| o) {
            Ok(idx) => self.differences[idx].1,
            Err(_) => reference[i],
        }
    }

    #[inline]
    pub fn is_gap(&self, i: usize) -> bool {
        self.gaps.contains(i)
    }

    #[inline]
    pub fn gaps_before(&self, i: usize) -> usize {
        self.gaps.gaps_before(i)
    }

    #[inline]
    pub fn ungapped_offset(&self, i: usize) -> usize {
        self.gaps.ungapped_offset(i)
    }

    #[inline]
    pub fn gapped_offset(&self, ungapped: usize) -> usize {
        self.gaps.gapped_offset(ungapped)
    }

    /// Full gapped bases.
    pub fn decode(&self, reference: &[u8]) -> Vec<u8> {
        let mut bases = Vec::with_capacity(self.len());
        let mut diffs = self.differences.iter().peekable();
        for i in 0..self.len() {
            match diffs.peek() {
                Some(&&(o, b)) if o as usize == i => {
                    bases.push(b);
                    diffs.next();
                }
                _ => bases.push(reference[i]),
            }
        }
        bases
    }
}
