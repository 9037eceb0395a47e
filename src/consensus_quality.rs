//! Consensus quality from per-read phd qualities.
//!
//! For each ungapped consensus base the score window runs from the previous
//! to the next non-gap consensus column. A covering read agrees when it
//! matches the consensus on every window column it covers; its score is the
//! lowest native quality of its bases inside the window. Each direction
//! contributes its best agreeing score, plus [`AGREEMENT_BONUS`] when two
//! agreeing reads of that direction come from different native positions.
//! The sum is capped at [`MAX_CONSENSUS_QUALITY`]. A column with no agreeing
//! read gets the best disagreeing score as is.

use crate::config::PARALLEL_THRESHOLD;
use crate::contig::Contig;
use crate::phd::PhdLookup;
use crate::sequence::{bases_match, Direction, GAP};
use rayon::prelude::*;

/// Added per direction when independent reads confirm a column.
pub const AGREEMENT_BONUS: u32 = 5;

/// Upper bound for a computed consensus quality.
pub const MAX_CONSENSUS_QUALITY: u32 = 90;

/// Data needed per read, resolved up front so columns can be scored in
/// parallel without touching the phd lookup.
struct ScoredRead {
    offset: usize,
    direction: Direction,
    bases: Vec<u8>,
    qualities: Vec<Option<u8>>,
    native_offsets: Vec<Option<usize>>,
}

impl ScoredRead {
    #[inline]
    fn covers(&self, column: usize) -> bool {
        column >= self.offset && column < self.offset + self.bases.len()
    }
}

/// Consensus qualities, one per ungapped consensus base.
pub fn compute_consensus_qualities(contig: &Contig, phd: &dyn PhdLookup) -> Vec<u8> {
    let consensus = contig.consensus();
    let bases = consensus.as_bytes();

    let reads: Vec<ScoredRead> = contig
        .reads()
        .filter_map(|read| {
            let record = phd.get(read.id())?;
            let qualities = read.native_qualities(bases, &record)?;
            Some(ScoredRead {
                offset: read.offset(),
                direction: read.direction(),
                bases: read.gapped_bases(bases),
                qualities,
                native_offsets: read.native_offsets(),
            })
        })
        .collect();

    let score = |ungapped: usize| -> u8 {
        let column = consensus.gapped_offset(ungapped);
        let first = if ungapped == 0 {
            column
        } else {
            consensus.gapped_offset(ungapped - 1)
        };
        let last = if ungapped + 1 < consensus.ungapped_len() {
            consensus.gapped_offset(ungapped + 1)
        } else {
            column
        };
        score_column(bases, &reads, column, first, last)
    };

    let n = consensus.ungapped_len();
    if n >= PARALLEL_THRESHOLD {
        (0..n).into_par_iter().map(score).collect()
    } else {
        (0..n).map(score).collect()
    }
}

#[derive(Default)]
struct DirectionScore {
    best: Option<u32>,
    first_native: Option<usize>,
    independent: bool,
}

impl DirectionScore {
    fn add(&mut self, score: u32, native: Option<usize>) {
        self.best = Some(self.best.map_or(score, |b| b.max(score)));
        match (self.first_native, native) {
            (None, n) => self.first_native = n,
            (Some(a), Some(b)) if a != b => self.independent = true,
            _ => {}
        }
    }

    fn total(&self) -> Option<u32> {
        self.best
            .map(|b| b + if self.independent { AGREEMENT_BONUS } else { 0 })
    }
}

fn score_column(consensus: &[u8], reads: &[ScoredRead], column: usize, first: usize, last: usize) -> u8 {
    let mut forward = DirectionScore::default();
    let mut reverse = DirectionScore::default();
    let mut best_disagreeing: Option<u32> = None;

    for read in reads.iter().filter(|r| r.covers(column)) {
        let mut agrees = true;
        let mut lowest: Option<u32> = None;
        for c in first..=last {
            if !read.covers(c) {
                continue;
            }
            let i = c - read.offset;
            if !bases_match(read.bases[i], consensus[c]) {
                agrees = false;
            }
            if read.bases[i] != GAP {
                if let Some(q) = read.qualities[i] {
                    lowest = Some(lowest.map_or(q as u32, |l| l.min(q as u32)));
                }
            }
        }
        let window_score = lowest.unwrap_or(0);

        if agrees {
            let native = read.native_offsets[column - read.offset];
            match read.direction {
                Direction::Forward => forward.add(window_score, native),
                Direction::Reverse => reverse.add(window_score, native),
            }
        } else {
            best_disagreeing = Some(best_disagreeing.map_or(window_score, |b| b.max(window_score)));
        }
    }

    let quality = match (forward.total(), reverse.total()) {
        (None, None) => best_disagreeing.unwrap_or(0),
        (f, r) => (f.unwrap_or(0) + r.unwrap_or(0)).min(MAX_CONSENSUS_QUALITY),
    };
    quality.min(u8::MAX as u32) as u8
}
