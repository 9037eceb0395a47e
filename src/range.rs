//! Closed integer ranges with explicit coordinate systems.
//!
//! ACE files use 1-based inclusive ("residue based") positions while the
//! in-memory model is 0-based. A [`Range`] always stores 0-based inclusive
//! bounds; the [`CoordinateSystem`] is only used when converting to or from
//! external numbers.

use crate::error::{AceError, Result};
use std::cmp::Ordering;
use std::fmt;

/// The numbering convention of a coordinate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CoordinateSystem {
    /// 0-based inclusive positions.
    ZeroBased,
    /// 1-based inclusive positions, as written in ACE files.
    ResidueBased,
}

impl CoordinateSystem {
    #[inline]
    fn shift(self) -> i64 {
        match self {
            CoordinateSystem::ZeroBased => 0,
            CoordinateSystem::ResidueBased => 1,
        }
    }
}

/// A closed interval `[begin, end]`.
///
/// The empty range is represented by `end == begin - 1`; any other
/// `end < begin` is rejected on construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Range {
    begin: i64,
    end: i64,
}

impl Range {
    /// Create a 0-based range.
    ///
    /// # Panics
    ///
    /// Panics if `end < begin - 1`. Use [`Range::of`] for checked input.
    #[inline]
    pub fn new(begin: i64, end: i64) -> Self {
        assert!(end >= begin - 1, "invalid range [{}, {}]", begin, end);
        Self { begin, end }
    }

    /// Create a range from coordinates in the given system.
    pub fn of(system: CoordinateSystem, begin: i64, end: i64) -> Result<Self> {
        let shift = system.shift();
        let (begin, end) = (begin - shift, end - shift);
        if end < begin - 1 {
            return Err(AceError::InvalidRange(format!(
                "end ({}) precedes begin ({})",
                end + shift,
                begin + shift
            )));
        }
        Ok(Self { begin, end })
    }

    /// Create a range of `length` positions starting at 0-based `begin`.
    #[inline]
    pub fn of_length(begin: i64, length: usize) -> Self {
        Self {
            begin,
            end: begin + length as i64 - 1,
        }
    }

    /// An empty range anchored at `begin`.
    #[inline]
    pub fn empty(begin: i64) -> Self {
        Self {
            begin,
            end: begin - 1,
        }
    }

    /// 0-based begin.
    #[inline]
    pub fn begin(&self) -> i64 {
        self.begin
    }

    /// 0-based end (inclusive).
    #[inline]
    pub fn end(&self) -> i64 {
        self.end
    }

    /// Begin in the given coordinate system.
    #[inline]
    pub fn begin_in(&self, system: CoordinateSystem) -> i64 {
        self.begin + system.shift()
    }

    /// End in the given coordinate system.
    #[inline]
    pub fn end_in(&self, system: CoordinateSystem) -> i64 {
        self.end + system.shift()
    }

    /// Number of positions covered.
    #[inline]
    pub fn len(&self) -> usize {
        (self.end - self.begin + 1).max(0) as usize
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.end < self.begin
    }

    /// True if `position` (0-based) lies inside the range.
    #[inline]
    pub fn contains_offset(&self, position: i64) -> bool {
        position >= self.begin && position <= self.end
    }

    /// True if `other` lies entirely inside this range.
    #[inline]
    pub fn contains(&self, other: &Range) -> bool {
        !other.is_empty() && other.begin >= self.begin && other.end <= self.end
    }

    /// True if the two ranges share at least one position.
    #[inline]
    pub fn intersects(&self, other: &Range) -> bool {
        !self.is_empty()
            && !other.is_empty()
            && self.begin <= other.end
            && other.begin <= self.end
    }

    /// The shared positions of both ranges, or an empty range.
    pub fn intersection(&self, other: &Range) -> Range {
        if !self.intersects(other) {
            return Range::empty(self.begin.max(other.begin));
        }
        Range {
            begin: self.begin.max(other.begin),
            end: self.end.min(other.end),
        }
    }

    /// The smallest range spanning both ranges.
    pub fn union_span(&self, other: &Range) -> Range {
        if self.is_empty() {
            return *other;
        }
        if other.is_empty() {
            return *self;
        }
        Range {
            begin: self.begin.min(other.begin),
            end: self.end.max(other.end),
        }
    }

    /// Move the range by `delta` positions.
    #[inline]
    pub fn shift(&self, delta: i64) -> Range {
        Range {
            begin: self.begin + delta,
            end: self.end + delta,
        }
    }

    /// Merge overlapping or adjacent ranges into a sorted, disjoint list.
    pub fn merge_all(mut ranges: Vec<Range>) -> Vec<Range> {
        ranges.retain(|r| !r.is_empty());
        ranges.sort();
        let mut merged: Vec<Range> = Vec::with_capacity(ranges.len());
        for range in ranges {
            match merged.last_mut() {
                Some(last) if range.begin <= last.end + 1 => {
                    last.end = last.end.max(range.end);
                }
                _ => merged.push(range),
            }
        }
        merged
    }
}

impl fmt::Display for Range {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{} .. {}]/0B", self.begin, self.end)
    }
}

impl Ord for Range {
    fn cmp(&self, other: &Self) -> Ordering {
        self.begin
            .cmp(&other.begin)
            .then(self.end.cmp(&other.end))
    }
}

impl PartialOrd for Range {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_residue_conversion() {
        let r = Range::of(CoordinateSystem::ResidueBased, 1, 10).unwrap();
        assert_eq!(r.begin(), 0);
        assert_eq!(r.end(), 9);
        assert_eq!(r.len(), 10);
        assert_eq!(r.begin_in(CoordinateSystem::ResidueBased), 1);
        assert_eq!(r.end_in(CoordinateSystem::ResidueBased), 10);
    }

    #[test]
    fn test_invalid_range_rejected() {
        assert!(Range::of(CoordinateSystem::ZeroBased, 5, 2).is_err());
        // begin - 1 is the empty range
        let empty = Range::of(CoordinateSystem::ZeroBased, 5, 4).unwrap();
        assert!(empty.is_empty());
        assert_eq!(empty.len(), 0);
    }

    #[test]
    fn test_intersection() {
        let a = Range::new(0, 10);
        let b = Range::new(5, 20);
        let c = Range::new(11, 20);

        assert_eq!(a.intersection(&b), Range::new(5, 10));
        assert!(a.intersection(&c).is_empty());
        assert!(!a.intersects(&c));
    }

    #[test]
    fn test_quality_and_alignment_disagree() {
        // Edited reads may declare a quality range wider than the alignment.
        let qual = Range::of(CoordinateSystem::ResidueBased, 3, 40).unwrap();
        let align = Range::of(CoordinateSystem::ResidueBased, 5, 35).unwrap();
        let clear = qual.intersection(&align);
        assert_eq!(clear.begin_in(CoordinateSystem::ResidueBased), 5);
        assert_eq!(clear.end_in(CoordinateSystem::ResidueBased), 35);
    }

    #[test]
    fn test_merge_and_shift() {
        let merged = Range::merge_all(vec![
            Range::new(10, 12),
            Range::new(0, 3),
            Range::new(4, 6),
            Range::new(11, 20),
        ]);
        assert_eq!(merged, vec![Range::new(0, 6), Range::new(10, 20)]);
        assert_eq!(Range::new(2, 4).shift(-2), Range::new(0, 2));
        assert_eq!(
            Range::new(2, 4).union_span(&Range::new(8, 9)),
            Range::new(2, 9)
        );
    }

    #[test]
    fn test_contains() {
        let outer = Range::new(0, 9);
        assert!(outer.contains(&Range::new(2, 9)));
        assert!(!outer.contains(&Range::new(2, 10)));
        assert!(outer.contains_offset(0));
        assert!(!outer.contains_offset(-1));
    }
}
