//! Contig assembly model.
//!
//! A [`Contig`] is immutable once built. It is produced either from parser
//! events by [`ContigBuilderVisitor`] or directly through a
//! [`ContigBuilder`], which is also the only way to edit a contig:
//!
//! ```
//! use ace_assembly::contig::{ContigBuilder, ReadBuilder};
//! use ace_assembly::sequence::Direction;
//!
//! let mut builder = ContigBuilder::new("ctg1", "ACGTACGT");
//! builder.add_read(ReadBuilder::untrimmed("read1", "ACGTA", 0, Direction::Forward))?;
//! builder.add_read(ReadBuilder::untrimmed("read2", "ACGT", 4, Direction::Forward))?;
//! let contig = builder.build()?;
//!
//! let mut edit = ContigBuilder::from_contig(&contig);
//! edit.insert_gap(2)?;
//! let edited = edit.build()?;
//! assert_eq!(edited.consensus().to_string(), "AC*GTACGT");
//! # Ok::<(), ace_assembly::error::AceError>(())
//! ```

mod builder;
mod consensus;
mod coverage;
mod read;
mod visitor;

pub use builder::ContigBuilder;
pub use consensus::{ConsensusCaller, MostFrequentBase};
pub use coverage::CoverageIndex;
pub use read::{AssembledRead, GapQualityPolicy, ReadBuilder};
pub use visitor::{ContigBuilderVisitor, ReadBuilderVisitor};

use crate::sequence::GappedSequence;
use log::debug;
use rustc_hash::FxHashMap;
use std::fmt;
use std::sync::Arc;

/// Why a read was left out of a contig.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DropReason {
    /// `QA -1 -1`: no high-quality bases.
    Unusable,
    /// The quality clip range ends before it starts.
    InvertedQualityRange,
    /// Quality and alignment clip ranges do not overlap.
    EmptyClearRange,
    MissingQualityLine,
    /// No `AF` record names the read.
    MissingAlignment,
    /// The clear window holds only gaps.
    NoBases,
    /// The read does not lie within the consensus.
    OutsideConsensus,
}

impl fmt::Display for DropReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            DropReason::Unusable => "no high-quality bases",
            DropReason::InvertedQualityRange => "inverted quality range",
            DropReason::EmptyClearRange => "quality and alignment ranges do not overlap",
            DropReason::MissingQualityLine => "missing QA record",
            DropReason::MissingAlignment => "missing AF record",
            DropReason::NoBases => "clear range contains only gaps",
            DropReason::OutsideConsensus => "outside consensus bounds",
        };
        f.write_str(s)
    }
}

/// A read that was not placed, and why.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DroppedRead {
    pub contig_id: String,
    pub read_id: String,
    pub reason: DropReason,
}

/// Receives reads dropped while building contigs.
pub trait DropHook: Send + Sync {
    fn on_drop(&self, dropped: &DroppedRead);
}

impl<F> DropHook for F
where
    F: Fn(&DroppedRead) + Send + Sync,
{
    fn on_drop(&self, dropped: &DroppedRead) {
        self(dropped)
    }
}

/// Log a dropped read and pass it to the hook, if any.
pub(crate) fn report_drop(
    hook: Option<&Arc<dyn DropHook>>,
    contig_id: &str,
    read_id: &str,
    reason: DropReason,
) {
    debug!("contig {}: dropping read {}: {}", contig_id, read_id, reason);
    if let Some(hook) = hook {
        hook.on_drop(&DroppedRead {
            contig_id: contig_id.to_string(),
            read_id: read_id.to_string(),
            reason,
        });
    }
}

/// A consensus sequence with its aligned reads.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Contig {
    id: String,
    consensus: GappedSequence,
    qualities: Option<Vec<u8>>,
    complemented: bool,
    reads: Vec<AssembledRead>,
    index: FxHashMap<String, usize>,
}

impl Contig {
    pub(crate) fn from_parts(
        id: String,
        consensus: GappedSequence,
        qualities: Option<Vec<u8>>,
        complemented: bool,
        reads: Vec<AssembledRead>,
    ) -> Self {
        let index = reads
            .iter()
            .enumerate()
            .map(|(i, r)| (r.id().to_string(), i))
            .collect();
        Self {
            id,
            consensus,
            qualities,
            complemented,
            reads,
            index,
        }
    }

    #[inline]
    pub fn id(&self) -> &str {
        &self.id
    }

    #[inline]
    pub fn consensus(&self) -> &GappedSequence {
        &self.consensus
    }

    /// Stored consensus qualities, one per ungapped consensus base.
    #[inline]
    pub fn consensus_qualities(&self) -> Option<&[u8]> {
        self.qualities.as_deref()
    }

    #[inline]
    pub fn is_complemented(&self) -> bool {
        self.complemented
    }

    #[inline]
    pub fn num_reads(&self) -> usize {
        self.reads.len()
    }

    /// Reads in insertion order.
    pub fn reads(&self) -> impl ExactSizeIterator<Item = &AssembledRead> {
        self.reads.iter()
    }

    pub fn read(&self, id: &str) -> Option<&AssembledRead> {
        self.index.get(id).map(|&i| &self.reads[i])
    }

    pub fn contains_read(&self, id: &str) -> bool {
        self.index.contains_key(id)
    }

    pub fn read_ids(&self) -> impl Iterator<Item = &str> {
        self.reads.iter().map(|r| r.id())
    }

    /// Gapped bases of a read in contig orientation.
    pub fn read_bases(&self, read: &AssembledRead) -> Vec<u8> {
        read.gapped_bases(self.consensus.as_bytes())
    }

    /// Index of the reads covering each column.
    pub fn coverage(&self) -> CoverageIndex {
        CoverageIndex::from_ranges(self.reads.iter().map(|r| r.gapped_range()))
    }

    /// Reads covering `column`, in insertion order.
    pub fn reads_covering(&self, column: usize) -> impl Iterator<Item = &AssembledRead> {
        self.reads.iter().filter(move |r| r.covers(column))
    }
}
