//! Streaming ACE line dispatcher.
//!
//! Reads an ACE stream line by line, classifies each record and drives an
//! [`AceVisitor`]. Everything the dispatcher needs between lines lives in an
//! explicit [`ParseState`] value: the open contig (its visitor, phase, and
//! start offset) and the read currently owning basecall lines. Contigs and
//! reads a visitor skipped stay open without a visitor so their lines are
//! consumed and dropped rather than routed elsewhere.
//!
//! # Resuming
//!
//! Every contig header reports a [`ResumePoint`]. Parsing a file from that
//! offset with [`AceParser::resume`] replays the same events as a full scan
//! from that contig on.

mod line;
pub mod visitor;

pub use visitor::{
    AceVisitor, AlignedReadInfo, ByteSpan, ContigHeader, ContigVisitor, Flow, ParseOutcome,
    QualityLine, ReadVisitor, ResumePoint, Visit,
};

use crate::config::DEFAULT_INPUT_BUFFER;
use crate::error::{AceError, Result};
use line::{
    classify, normalize_basecalls, parse_aligned_read, parse_base_segment, parse_consensus_tag,
    parse_contig_header, parse_description, parse_header, parse_quality_line,
    parse_quality_values, parse_read_header, parse_read_tag, parse_whole_assembly_tag,
    trim_line_end, BasecallError, LineKind,
};
use log::trace;
use std::fs::File;
use std::io::{self, BufRead, BufReader, Seek, SeekFrom};
use std::path::Path;

/// Initial capacity of the line buffer.
const LINE_BUFFER: usize = 1024;

/// A one-shot ACE parser over a buffered reader.
pub struct AceParser<R> {
    reader: R,
    start_offset: u64,
}

impl AceParser<BufReader<File>> {
    /// Open an ACE file from a path.
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::open(path)?;
        Ok(Self::new(BufReader::with_capacity(DEFAULT_INPUT_BUFFER, file)))
    }

    /// Open an ACE file and start at a previously reported resume point.
    pub fn resume<P: AsRef<Path>>(path: P, point: ResumePoint) -> Result<Self> {
        let mut file = File::open(path)?;
        file.seek(SeekFrom::Start(point.offset()))?;
        trace!("resuming parse at byte {}", point.offset());
        Ok(Self::with_offset(
            BufReader::with_capacity(DEFAULT_INPUT_BUFFER, file),
            point.offset(),
        ))
    }
}

impl<'a> AceParser<&'a [u8]> {
    /// Parse an in-memory buffer.
    pub fn from_bytes(bytes: &'a [u8]) -> Self {
        Self::new(bytes)
    }
}

impl<R: BufRead> AceParser<R> {
    pub fn new(reader: R) -> Self {
        Self::with_offset(reader, 0)
    }

    /// Parse a reader already positioned at byte `start_offset` of a file.
    /// Reported offsets and spans are relative to the file start.
    pub fn with_offset(reader: R, start_offset: u64) -> Self {
        Self {
            reader,
            start_offset,
        }
    }

    /// Drive `visitor` over the whole input.
    ///
    /// Returns [`ParseOutcome::Halted`] if any callback asked to stop; in
    /// that case `visit_end` is not called and every open visitor receives
    /// `halted` instead. Grammar errors and visitor errors abort the parse.
    pub fn accept<V: AceVisitor>(self, visitor: &mut V) -> Result<ParseOutcome> {
        let mut source = LineSource::new(self.reader, self.start_offset);
        let mut state = ParseState::new();
        let mut buf = Vec::with_capacity(LINE_BUFFER);

        while let Some(start) = source.next_line(&mut buf)? {
            let flow = dispatch_line(&mut source, &mut state, visitor, &buf, start)?;
            if flow == Flow::Halt {
                trace!("parse halted at byte {}", start);
                notify_halted(&mut state, visitor);
                return Ok(ParseOutcome::Halted);
            }
        }

        let end = source.offset;
        if close_contig(&mut state, visitor, end)? == Flow::Halt {
            notify_halted(&mut state, visitor);
            return Ok(ParseOutcome::Halted);
        }
        visitor.visit_end()?;
        Ok(ParseOutcome::Completed)
    }
}

/// Parse the file at `path` with `visitor`.
pub fn parse_path<P: AsRef<Path>, V: AceVisitor>(path: P, visitor: &mut V) -> Result<ParseOutcome> {
    AceParser::from_path(path)?.accept(visitor)
}

/// Raw line reader tracking byte offsets and line numbers.
struct LineSource<R> {
    reader: R,
    /// Offset of the next unread byte.
    offset: u64,
    line_number: usize,
}

impl<R: BufRead> LineSource<R> {
    fn new(reader: R, offset: u64) -> Self {
        Self {
            reader,
            offset,
            line_number: 0,
        }
    }

    /// Read the next raw line into `buf`, returning its start offset.
    fn next_line(&mut self, buf: &mut Vec<u8>) -> io::Result<Option<u64>> {
        buf.clear();
        let n = self.reader.read_until(b'\n', buf)?;
        if n == 0 {
            return Ok(None);
        }
        let start = self.offset;
        self.offset += n as u64;
        self.line_number += 1;
        Ok(Some(start))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    /// Basecall lines belong to the consensus.
    Consensus,
    /// Inside a `BQ` block.
    Qualities,
    /// The first `AF` was seen; basecalls belong to the open read.
    AlignedReads,
}

/// An open read; `visitor` is `None` when the read is being skipped.
struct ReadFrame<R> {
    visitor: Option<R>,
}

/// An open contig; `visitor` is `None` when the contig is being skipped.
struct ContigFrame<C: ContigVisitor> {
    visitor: Option<C>,
    start: u64,
    phase: Phase,
    qualities: Vec<u8>,
    read: Option<ReadFrame<C::Read>>,
}

impl<C: ContigVisitor> ContigFrame<C> {
    fn new(visitor: Option<C>, start: u64) -> Self {
        Self {
            visitor,
            start,
            phase: Phase::Consensus,
            qualities: Vec::new(),
            read: None,
        }
    }

    fn flush_qualities(&mut self) -> Result<Flow> {
        if self.phase != Phase::Qualities {
            return Ok(Flow::Continue);
        }
        self.phase = Phase::AlignedReads;
        let qualities = std::mem::take(&mut self.qualities);
        match self.visitor.as_mut() {
            Some(contig) => contig.visit_consensus_qualities(qualities),
            None => Ok(Flow::Continue),
        }
    }

    fn close_read(&mut self) -> Result<Flow> {
        let Some(read) = self.read.take() else {
            return Ok(Flow::Continue);
        };
        match (self.visitor.as_mut(), read.visitor) {
            (Some(contig), Some(read)) => contig.visit_read_end(read),
            _ => Ok(Flow::Continue),
        }
    }

    /// Leave the consensus section (if still in it) and close any open read.
    fn enter_reads(&mut self) -> Result<Flow> {
        if self.flush_qualities()? == Flow::Halt {
            return Ok(Flow::Halt);
        }
        self.phase = Phase::AlignedReads;
        self.close_read()
    }
}

/// Mutable parse state threaded through the dispatch loop.
struct ParseState<C: ContigVisitor> {
    contig: Option<ContigFrame<C>>,
}

impl<C: ContigVisitor> ParseState<C> {
    fn new() -> Self {
        Self { contig: None }
    }

    fn open_read(&mut self) -> Option<&mut ReadFrame<C::Read>> {
        self.contig.as_mut().and_then(|frame| frame.read.as_mut())
    }
}

/// Finish the open contig; `next_offset` is the first byte not part of it.
fn close_contig<V: AceVisitor>(
    state: &mut ParseState<V::Contig>,
    visitor: &mut V,
    next_offset: u64,
) -> Result<Flow> {
    let Some(frame) = state.contig.as_mut() else {
        return Ok(Flow::Continue);
    };
    if frame.flush_qualities()? == Flow::Halt || frame.close_read()? == Flow::Halt {
        return Ok(Flow::Halt);
    }
    let Some(frame) = state.contig.take() else {
        return Ok(Flow::Continue);
    };
    match frame.visitor {
        Some(contig) => {
            let span = ByteSpan {
                start: frame.start,
                end: next_offset.saturating_sub(1),
            };
            visitor.visit_contig_end(contig, span)
        }
        None => Ok(Flow::Continue),
    }
}

/// Tell every still-open visitor, innermost first, that the parse stopped.
fn notify_halted<V: AceVisitor>(state: &mut ParseState<V::Contig>, visitor: &mut V) {
    if let Some(mut frame) = state.contig.take() {
        if let Some(mut read) = frame.read.take().and_then(|r| r.visitor) {
            read.halted();
        }
        if let Some(contig) = frame.visitor.as_mut() {
            contig.halted();
        }
    }
    visitor.halted();
}

fn basecalls(line: &[u8], line_number: usize) -> Result<Vec<u8>> {
    normalize_basecalls(line).map_err(|e| {
        let text = String::from_utf8_lossy(line).into_owned();
        match e {
            BasecallError::DashGap => AceError::InvalidGapCharacter {
                line: line_number,
                text,
            },
            BasecallError::InvalidBase(b) => AceError::InvalidBase {
                line: line_number,
                text,
                base: b as char,
            },
        }
    })
}

fn dispatch_line<R: BufRead, V: AceVisitor>(
    source: &mut LineSource<R>,
    state: &mut ParseState<V::Contig>,
    visitor: &mut V,
    raw: &[u8],
    start: u64,
) -> Result<Flow> {
    let line = trim_line_end(raw);
    let line_number = source.line_number;
    let fail = |message: String| AceError::parse(line_number, line, message);
    let missing = |what: &str| {
        let record = String::from_utf8_lossy(line.get(..2).unwrap_or(line));
        AceError::parse(line_number, line, format!("{} record outside {}", record, what))
    };

    match classify(line) {
        LineKind::Blank => Ok(Flow::Continue),
        LineKind::Header => {
            if state.contig.is_some() {
                return Err(fail("AS record inside a contig".to_string()));
            }
            let (num_contigs, num_reads) = parse_header(line).map_err(fail)?;
            visitor.visit_header(num_contigs, num_reads)
        }
        LineKind::Contig => {
            if close_contig(state, visitor, start)? == Flow::Halt {
                return Ok(Flow::Halt);
            }
            let fields = parse_contig_header(line).map_err(fail)?;
            let header = ContigHeader {
                id: fields.id,
                num_bases: fields.num_bases,
                num_reads: fields.num_reads,
                num_base_segments: fields.num_base_segments,
                complemented: fields.complemented,
                resume_point: ResumePoint::new(start),
            };
            let contig = match visitor.visit_contig(&header)? {
                Visit::Descend(contig) => Some(contig),
                Visit::Skip => None,
                Visit::Halt => return Ok(Flow::Halt),
            };
            state.contig = Some(ContigFrame::new(contig, start));
            Ok(Flow::Continue)
        }
        LineKind::BaseQualities => {
            let frame = state.contig.as_mut().ok_or_else(|| missing("a contig"))?;
            if frame.phase != Phase::Consensus {
                return Err(fail("BQ record after the consensus section".to_string()));
            }
            frame.phase = Phase::Qualities;
            Ok(Flow::Continue)
        }
        LineKind::AlignedRead => {
            let frame = state.contig.as_mut().ok_or_else(|| missing("a contig"))?;
            if frame.enter_reads()? == Flow::Halt {
                return Ok(Flow::Halt);
            }
            let info = parse_aligned_read(line).map_err(fail)?;
            match frame.visitor.as_mut() {
                Some(contig) => contig.visit_aligned_read_info(info),
                None => Ok(Flow::Continue),
            }
        }
        LineKind::BaseSegment => {
            let frame = state.contig.as_mut().ok_or_else(|| missing("a contig"))?;
            if frame.enter_reads()? == Flow::Halt {
                return Ok(Flow::Halt);
            }
            let (range, read_id) = parse_base_segment(line).map_err(fail)?;
            match frame.visitor.as_mut() {
                Some(contig) => contig.visit_base_segment(range, &read_id),
                None => Ok(Flow::Continue),
            }
        }
        LineKind::Read => {
            let frame = state.contig.as_mut().ok_or_else(|| missing("a contig"))?;
            if frame.enter_reads()? == Flow::Halt {
                return Ok(Flow::Halt);
            }
            let (read_id, gapped_length) = parse_read_header(line).map_err(fail)?;
            let read = match frame.visitor.as_mut() {
                Some(contig) => match contig.visit_read(&read_id, gapped_length)? {
                    Visit::Descend(read) => Some(read),
                    Visit::Skip => None,
                    Visit::Halt => return Ok(Flow::Halt),
                },
                None => None,
            };
            frame.read = Some(ReadFrame { visitor: read });
            Ok(Flow::Continue)
        }
        LineKind::QualityClip => {
            let read = state.open_read().ok_or_else(|| missing("a read"))?;
            let quality = parse_quality_line(line).map_err(fail)?;
            match read.visitor.as_mut() {
                Some(read) => read.visit_quality_line(quality),
                None => Ok(Flow::Continue),
            }
        }
        LineKind::Description => {
            let read = state.open_read().ok_or_else(|| missing("a read"))?;
            let info = parse_description(line).map_err(fail)?;
            match read.visitor.as_mut() {
                Some(read) => read.visit_trace_description(info),
                None => Ok(Flow::Continue),
            }
        }
        LineKind::ReadTag => {
            if close_contig(state, visitor, start)? == Flow::Halt {
                return Ok(Flow::Halt);
            }
            let block = read_tag_block(source, line, false)?;
            let tag = parse_read_tag(block.header.as_bytes()).map_err(|m| block.error(m))?;
            visitor.visit_read_tag(tag)
        }
        LineKind::WholeAssemblyTag => {
            if close_contig(state, visitor, start)? == Flow::Halt {
                return Ok(Flow::Halt);
            }
            let block = read_tag_block(source, line, false)?;
            let tag = parse_whole_assembly_tag(block.header.as_bytes(), block.body.clone())
                .map_err(|m| block.error(m))?;
            visitor.visit_whole_assembly_tag(tag)
        }
        LineKind::ConsensusTag => {
            if close_contig(state, visitor, start)? == Flow::Halt {
                return Ok(Flow::Halt);
            }
            let block = read_tag_block(source, line, true)?;
            let tag = parse_consensus_tag(
                block.header.as_bytes(),
                block.body.clone(),
                block.comments.clone(),
            )
            .map_err(|m| block.error(m))?;
            visitor.visit_consensus_tag(tag)
        }
        LineKind::Data => {
            let Some(frame) = state.contig.as_mut() else {
                return Err(fail("unexpected line outside a contig".to_string()));
            };
            match frame.phase {
                Phase::Consensus => match frame.visitor.as_mut() {
                    Some(contig) => contig.visit_bases_line(&basecalls(line, line_number)?),
                    None => Ok(Flow::Continue),
                },
                Phase::Qualities => {
                    if frame.visitor.is_some() {
                        parse_quality_values(line, &mut frame.qualities).map_err(fail)?;
                    }
                    Ok(Flow::Continue)
                }
                Phase::AlignedReads => {
                    let Some(read) = frame.read.as_mut() else {
                        return Err(fail("basecalls outside a read".to_string()));
                    };
                    match read.visitor.as_mut() {
                        Some(read) => read.visit_bases_line(&basecalls(line, line_number)?),
                        None => Ok(Flow::Continue),
                    }
                }
            }
        }
    }
}

/// The lines of a `{ ... }` tag block.
struct TagBlock {
    header: String,
    header_line: usize,
    body: Vec<String>,
    comments: Vec<String>,
}

impl TagBlock {
    fn error(&self, message: String) -> AceError {
        AceError::Parse {
            line: self.header_line,
            text: self.header.clone(),
            message,
        }
    }
}

/// Read the rest of a tag block whose opening line was `opening`.
/// Consensus tags may nest a `COMMENT{ ... C}` block.
fn read_tag_block<R: BufRead>(
    source: &mut LineSource<R>,
    opening: &[u8],
    allow_comment: bool,
) -> Result<TagBlock> {
    let opened_at = source.line_number;
    let mut buf = Vec::with_capacity(LINE_BUFFER);
    let mut header: Option<(usize, String)> = None;
    let mut body = Vec::new();
    let mut comments = Vec::new();
    let mut in_comment = false;

    loop {
        if source.next_line(&mut buf)?.is_none() {
            return Err(AceError::parse(opened_at, opening, "unterminated tag block"));
        }
        let line = trim_line_end(&buf);
        let trimmed = line.trim_ascii();
        let text = || String::from_utf8_lossy(line).into_owned();

        if in_comment {
            if trimmed == b"C}" {
                in_comment = false;
            } else {
                comments.push(text());
            }
            continue;
        }
        if trimmed == b"}" {
            break;
        }
        if header.is_none() {
            if !trimmed.is_empty() {
                header = Some((
                    source.line_number,
                    String::from_utf8_lossy(trimmed).into_owned(),
                ));
            }
            continue;
        }
        if allow_comment && trimmed == b"COMMENT{" {
            in_comment = true;
            continue;
        }
        body.push(text());
    }

    let Some((header_line, header)) = header else {
        return Err(AceError::parse(opened_at, opening, "empty tag block"));
    };
    Ok(TagBlock {
        header,
        header_line,
        body,
        comments,
    })
}
