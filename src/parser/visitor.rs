//! Visitor protocol driven by the line dispatcher.
//!
//! Callbacks return a [`Flow`] or a [`Visit`] telling the dispatcher whether
//! to continue, descend into a nested visitor, skip a block, or halt. When a
//! nested visitor is finished it is handed back to its parent by value.

use crate::error::Result;
use crate::phd::PhdInfo;
use crate::range::Range;
use crate::sequence::Direction;
use crate::tags::{ConsensusTag, ReadTag, WholeAssemblyTag};

/// Continue or stop the parse.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Halt,
}

/// Answer to a block header (contig or read).
#[derive(Debug)]
pub enum Visit<T> {
    /// Visit the block's records with this visitor.
    Descend(T),
    /// Consume and discard the block.
    Skip,
    /// Stop parsing immediately.
    Halt,
}

/// How a parse ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseOutcome {
    Completed,
    Halted,
}

/// Byte offset from which a fresh parse reproduces the rest of the file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ResumePoint {
    offset: u64,
}

impl ResumePoint {
    #[inline]
    pub fn new(offset: u64) -> Self {
        Self { offset }
    }

    #[inline]
    pub fn offset(&self) -> u64 {
        self.offset
    }
}

/// Inclusive byte range of a contig's records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ByteSpan {
    pub start: u64,
    pub end: u64,
}

impl ByteSpan {
    #[inline]
    pub fn len(&self) -> u64 {
        self.end + 1 - self.start
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.end < self.start
    }
}

/// The `CO` record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContigHeader {
    pub id: String,
    /// Gapped consensus length.
    pub num_bases: usize,
    pub num_reads: usize,
    pub num_base_segments: usize,
    pub complemented: bool,
    /// Where this contig's records begin.
    pub resume_point: ResumePoint,
}

/// The `AF` record: a read's direction and declared 1-based gapped start of
/// its full-length sequence. The offset may be zero or negative.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlignedReadInfo {
    pub read_id: String,
    pub direction: Direction,
    pub start_offset: i64,
}

/// The `QA` record, 1-based positions in the read's gapped full sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QualityLine {
    pub qual_left: i64,
    pub qual_right: i64,
    pub align_left: i64,
    pub align_right: i64,
}

impl QualityLine {
    /// `-1 -1` marks a read with no high-quality bases.
    #[inline]
    pub fn is_unusable(&self) -> bool {
        self.qual_left == -1 && self.qual_right == -1
    }
}

/// Receives the records of one read.
pub trait ReadVisitor {
    /// One line of validated, uppercased basecalls.
    fn visit_bases_line(&mut self, _bases: &[u8]) -> Result<Flow> {
        Ok(Flow::Continue)
    }

    fn visit_quality_line(&mut self, _line: QualityLine) -> Result<Flow> {
        Ok(Flow::Continue)
    }

    fn visit_trace_description(&mut self, _info: PhdInfo) -> Result<Flow> {
        Ok(Flow::Continue)
    }

    /// The parse stopped while this read was open.
    fn halted(&mut self) {}
}

/// Receives the records of one contig.
pub trait ContigVisitor {
    type Read: ReadVisitor;

    /// One line of validated, uppercased consensus basecalls.
    fn visit_bases_line(&mut self, _bases: &[u8]) -> Result<Flow> {
        Ok(Flow::Continue)
    }

    /// All values of the `BQ` block, one per ungapped consensus base.
    fn visit_consensus_qualities(&mut self, _qualities: Vec<u8>) -> Result<Flow> {
        Ok(Flow::Continue)
    }

    fn visit_aligned_read_info(&mut self, _info: AlignedReadInfo) -> Result<Flow> {
        Ok(Flow::Continue)
    }

    /// A `BS` record as a 0-based gapped range.
    fn visit_base_segment(&mut self, _range: Range, _read_id: &str) -> Result<Flow> {
        Ok(Flow::Continue)
    }

    fn visit_read(&mut self, read_id: &str, gapped_length: usize) -> Result<Visit<Self::Read>>;

    /// The read's records are complete.
    fn visit_read_end(&mut self, _read: Self::Read) -> Result<Flow> {
        Ok(Flow::Continue)
    }

    /// The parse stopped while this contig was open.
    fn halted(&mut self) {}
}

/// Receives the top-level records of an ACE file.
pub trait AceVisitor {
    type Contig: ContigVisitor;

    fn visit_header(&mut self, _num_contigs: usize, _total_reads: usize) -> Result<Flow> {
        Ok(Flow::Continue)
    }

    fn visit_contig(&mut self, header: &ContigHeader) -> Result<Visit<Self::Contig>>;

    /// The contig's records are complete; `span` covers them in the input.
    fn visit_contig_end(&mut self, _contig: Self::Contig, _span: ByteSpan) -> Result<Flow> {
        Ok(Flow::Continue)
    }

    fn visit_read_tag(&mut self, _tag: ReadTag) -> Result<Flow> {
        Ok(Flow::Continue)
    }

    fn visit_consensus_tag(&mut self, _tag: ConsensusTag) -> Result<Flow> {
        Ok(Flow::Continue)
    }

    fn visit_whole_assembly_tag(&mut self, _tag: WholeAssemblyTag) -> Result<Flow> {
        Ok(Flow::Continue)
    }

    /// End of input reached without a halt.
    fn visit_end(&mut self) -> Result<()> {
        Ok(())
    }

    fn halted(&mut self) {}
}

/// The unit visitor ignores everything; useful as the nested visitor type of
/// top-level visitors that only look at headers or tags.
impl ReadVisitor for () {}

impl ContigVisitor for () {
    type Read = ();

    fn visit_read(&mut self, _read_id: &str, _gapped_length: usize) -> Result<Visit<()>> {
        Ok(Visit::Skip)
    }
}
