//! Record classification and field parsing for single ACE lines.
//!
//! Functions here work on raw bytes and never allocate unless the record
//! carries owned data (ids, names). Errors are plain messages; the
//! dispatcher attaches the line number and text.

use crate::phd::PhdInfo;
use crate::range::{CoordinateSystem, Range};
use crate::sequence::{is_valid_base, Direction, GAP};
use crate::tags::{ConsensusTag, ReadTag, WholeAssemblyTag, NO_TRANS};

use super::visitor::{AlignedReadInfo, QualityLine};

/// Kind of a logical ACE line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineKind {
    Blank,
    Header,
    Contig,
    BaseQualities,
    AlignedRead,
    BaseSegment,
    Read,
    QualityClip,
    Description,
    ReadTag,
    WholeAssemblyTag,
    ConsensusTag,
    /// Basecalls or quality values, depending on context.
    Data,
}

/// Classify a line with its line terminator already removed.
#[inline]
pub fn classify(line: &[u8]) -> LineKind {
    let line = line.trim_ascii();
    if line.is_empty() {
        return LineKind::Blank;
    }
    match line {
        b"BQ" => return LineKind::BaseQualities,
        b"DS" => return LineKind::Description,
        b"RT{" => return LineKind::ReadTag,
        b"WA{" => return LineKind::WholeAssemblyTag,
        b"CT{" => return LineKind::ConsensusTag,
        _ => {}
    }
    if line.len() > 3 && line[2].is_ascii_whitespace() {
        match &line[..2] {
            b"AS" => return LineKind::Header,
            b"CO" => return LineKind::Contig,
            b"AF" => return LineKind::AlignedRead,
            b"BS" => return LineKind::BaseSegment,
            b"RD" => return LineKind::Read,
            b"QA" => return LineKind::QualityClip,
            b"DS" => return LineKind::Description,
            _ => {}
        }
    }
    LineKind::Data
}

/// Strip a trailing `\n` / `\r\n`.
#[inline]
pub fn trim_line_end(line: &[u8]) -> &[u8] {
    let mut end = line.len();
    while end > 0 && (line[end - 1] == b'\n' || line[end - 1] == b'\r') {
        end -= 1;
    }
    &line[..end]
}

/// Whitespace-separated fields.
#[inline]
pub fn fields(line: &[u8]) -> impl Iterator<Item = &[u8]> {
    line.split(|b| b.is_ascii_whitespace())
        .filter(|f| !f.is_empty())
}

/// Fast u64 parsing, no allocation.
#[inline(always)]
pub fn parse_u64_fast(bytes: &[u8]) -> Option<u64> {
    if bytes.is_empty() {
        return None;
    }
    let mut n: u64 = 0;
    for &b in bytes {
        let d = b.wrapping_sub(b'0');
        if d > 9 {
            return None;
        }
        n = n.checked_mul(10)?.checked_add(d as u64)?;
    }
    Some(n)
}

/// Signed variant of [`parse_u64_fast`].
#[inline]
pub fn parse_i64_fast(bytes: &[u8]) -> Option<i64> {
    match bytes.split_first() {
        Some((b'-', rest)) => parse_u64_fast(rest).and_then(|n| i64::try_from(n).ok()).map(|n| -n),
        Some((b'+', rest)) => parse_u64_fast(rest).and_then(|n| i64::try_from(n).ok()),
        _ => parse_u64_fast(bytes).and_then(|n| i64::try_from(n).ok()),
    }
}

fn owned(field: &[u8]) -> String {
    String::from_utf8_lossy(field).into_owned()
}

fn next_usize<'a>(
    it: &mut impl Iterator<Item = &'a [u8]>,
    name: &'static str,
) -> Result<usize, String> {
    let field = it.next().ok_or_else(|| format!("missing {}", name))?;
    parse_u64_fast(field)
        .map(|n| n as usize)
        .ok_or_else(|| format!("invalid {} '{}'", name, owned(field)))
}

fn next_i64<'a>(it: &mut impl Iterator<Item = &'a [u8]>, name: &'static str) -> Result<i64, String> {
    let field = it.next().ok_or_else(|| format!("missing {}", name))?;
    parse_i64_fast(field).ok_or_else(|| format!("invalid {} '{}'", name, owned(field)))
}

fn next_str<'a>(
    it: &mut impl Iterator<Item = &'a [u8]>,
    name: &'static str,
) -> Result<String, String> {
    it.next()
        .map(owned)
        .ok_or_else(|| format!("missing {}", name))
}

fn next_direction<'a>(it: &mut impl Iterator<Item = &'a [u8]>) -> Result<Direction, String> {
    let field = it.next().ok_or("missing direction")?;
    Direction::from_ace(field)
        .ok_or_else(|| format!("invalid direction '{}', expected U or C", owned(field)))
}

fn no_trailing<'a>(mut it: impl Iterator<Item = &'a [u8]>, record: &str) -> Result<(), String> {
    match it.next() {
        Some(extra) => Err(format!(
            "unexpected trailing field '{}' in {} record",
            owned(extra),
            record
        )),
        None => Ok(()),
    }
}

/// `AS <numContigs> <numReads>`
pub fn parse_header(line: &[u8]) -> Result<(usize, usize), String> {
    let mut it = fields(line).skip(1);
    let contigs = next_usize(&mut it, "contig count")?;
    let reads = next_usize(&mut it, "read count")?;
    no_trailing(it, "AS")?;
    Ok((contigs, reads))
}

/// Fields of a `CO` line (everything but the resume point).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContigFields {
    pub id: String,
    pub num_bases: usize,
    pub num_reads: usize,
    pub num_base_segments: usize,
    pub complemented: bool,
}

/// `CO <contigId> <numBases> <numReads> <numBaseSegments> <U|C>`
pub fn parse_contig_header(line: &[u8]) -> Result<ContigFields, String> {
    let mut it = fields(line).skip(1);
    let id = next_str(&mut it, "contig id")?;
    let num_bases = next_usize(&mut it, "base count")?;
    let num_reads = next_usize(&mut it, "read count")?;
    let num_base_segments = next_usize(&mut it, "base segment count")?;
    let complemented = next_direction(&mut it)? == Direction::Reverse;
    no_trailing(it, "CO")?;
    Ok(ContigFields {
        id,
        num_bases,
        num_reads,
        num_base_segments,
        complemented,
    })
}

/// `AF <readId> <U|C> <gappedStartOffset>`
pub fn parse_aligned_read(line: &[u8]) -> Result<AlignedReadInfo, String> {
    let mut it = fields(line).skip(1);
    let read_id = next_str(&mut it, "read id")?;
    let direction = next_direction(&mut it)?;
    let start_offset = next_i64(&mut it, "start offset")?;
    no_trailing(it, "AF")?;
    Ok(AlignedReadInfo {
        read_id,
        direction,
        start_offset,
    })
}

/// `BS <gappedStart> <gappedEnd> <readId>`, returned as a 0-based range.
pub fn parse_base_segment(line: &[u8]) -> Result<(Range, String), String> {
    let mut it = fields(line).skip(1);
    let start = next_i64(&mut it, "segment start")?;
    let end = next_i64(&mut it, "segment end")?;
    let read_id = next_str(&mut it, "read id")?;
    no_trailing(it, "BS")?;
    let range =
        Range::of(CoordinateSystem::ResidueBased, start, end).map_err(|e| e.to_string())?;
    Ok((range, read_id))
}

/// `RD <readId> <gappedLength> <numInfoItems> <numReadTags>`
pub fn parse_read_header(line: &[u8]) -> Result<(String, usize), String> {
    let mut it = fields(line).skip(1);
    let read_id = next_str(&mut it, "read id")?;
    let length = next_usize(&mut it, "gapped length")?;
    // the two trailing counts are informational
    for name in ["info item count", "read tag count"] {
        if let Some(field) = it.next() {
            parse_u64_fast(field).ok_or_else(|| format!("invalid {} '{}'", name, owned(field)))?;
        }
    }
    no_trailing(it, "RD")?;
    Ok((read_id, length))
}

/// `QA <qualLeft> <qualRight> <alignLeft> <alignRight>`
pub fn parse_quality_line(line: &[u8]) -> Result<QualityLine, String> {
    let mut it = fields(line).skip(1);
    let qual_left = next_i64(&mut it, "quality clip left")?;
    let qual_right = next_i64(&mut it, "quality clip right")?;
    let align_left = next_i64(&mut it, "alignment clip left")?;
    let align_right = next_i64(&mut it, "alignment clip right")?;
    no_trailing(it, "QA")?;
    Ok(QualityLine {
        qual_left,
        qual_right,
        align_left,
        align_right,
    })
}

/// `DS KEY: value KEY: value ...`; only the chromat, phd and time keys are
/// kept. Values may contain spaces (the time stamp does).
pub fn parse_description(line: &[u8]) -> Result<PhdInfo, String> {
    let mut info = PhdInfo::default();
    let mut current: Option<&[u8]> = None;
    let mut value: Vec<&[u8]> = Vec::new();

    let mut store = |key: Option<&[u8]>, value: &mut Vec<&[u8]>| {
        if let Some(key) = key {
            let joined = value
                .iter()
                .map(|v| String::from_utf8_lossy(v))
                .collect::<Vec<_>>()
                .join(" ");
            match key {
                b"CHROMAT_FILE" => info.trace_name = joined,
                b"PHD_FILE" => info.phd_name = joined,
                b"TIME" => info.date = joined,
                _ => {}
            }
        }
        value.clear();
    };

    for field in fields(line).skip(1) {
        let is_key = field.len() > 1
            && field.ends_with(b":")
            && field[..field.len() - 1]
                .iter()
                .all(|b| b.is_ascii_uppercase() || *b == b'_');
        if is_key {
            store(current, &mut value);
            current = Some(&field[..field.len() - 1]);
        } else if current.is_some() {
            value.push(field);
        } else {
            return Err(format!("value '{}' without a key", owned(field)));
        }
    }
    store(current, &mut value);
    Ok(info)
}

/// Whitespace-separated quality values of a `BQ` block.
pub fn parse_quality_values(line: &[u8], out: &mut Vec<u8>) -> Result<(), String> {
    for field in fields(line) {
        let q = parse_u64_fast(field)
            .filter(|&q| q <= u8::MAX as u64)
            .ok_or_else(|| format!("invalid quality value '{}'", owned(field)))?;
        out.push(q as u8);
    }
    Ok(())
}

/// Why a basecall line was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BasecallError {
    /// The line contains `-`, which is not the ACE gap symbol.
    DashGap,
    InvalidBase(u8),
}

/// Validate a basecall line and return it uppercased.
pub fn normalize_basecalls(line: &[u8]) -> Result<Vec<u8>, BasecallError> {
    let line = line.trim_ascii();
    if memchr::memchr(b'-', line).is_some() {
        return Err(BasecallError::DashGap);
    }
    let mut out = Vec::with_capacity(line.len());
    for &b in line {
        if !is_valid_base(b) {
            return Err(BasecallError::InvalidBase(b));
        }
        out.push(if b == GAP { GAP } else { b.to_ascii_uppercase() });
    }
    Ok(out)
}

fn tag_range(start: i64, end: i64) -> Result<Range, String> {
    Range::of(CoordinateSystem::ResidueBased, start, end).map_err(|e| e.to_string())
}

fn transient_flag<'a>(it: impl Iterator<Item = &'a [u8]>, record: &str) -> Result<bool, String> {
    let mut it = it.peekable();
    let transient = it.next_if(|f| *f == NO_TRANS.as_bytes()).is_some();
    no_trailing(it, record)?;
    Ok(transient)
}

/// `<readId> <type> <creator> <start> <end> <date> [NoTrans]`
pub fn parse_read_tag(header: &[u8]) -> Result<ReadTag, String> {
    let mut it = fields(header);
    let read_id = next_str(&mut it, "read id")?;
    let tag_type = next_str(&mut it, "tag type")?;
    let creator = next_str(&mut it, "tag creator")?;
    let start = next_i64(&mut it, "tag start")?;
    let end = next_i64(&mut it, "tag end")?;
    let timestamp = next_str(&mut it, "tag timestamp")?;
    let transient = transient_flag(it, "RT")?;
    Ok(ReadTag::new(read_id, tag_type, creator, tag_range(start, end)?, timestamp).transient(transient))
}

/// `<contigId> <type> <creator> <start> <end> <date> [NoTrans]` followed by
/// data lines and the lines of an optional comment block.
pub fn parse_consensus_tag(
    header: &[u8],
    data: Vec<String>,
    comments: Vec<String>,
) -> Result<ConsensusTag, String> {
    let mut it = fields(header);
    let contig_id = next_str(&mut it, "contig id")?;
    let tag_type = next_str(&mut it, "tag type")?;
    let creator = next_str(&mut it, "tag creator")?;
    let start = next_i64(&mut it, "tag start")?;
    let end = next_i64(&mut it, "tag end")?;
    let timestamp = next_str(&mut it, "tag timestamp")?;
    let transient = transient_flag(it, "CT")?;
    Ok(
        ConsensusTag::new(contig_id, tag_type, creator, tag_range(start, end)?, timestamp)
            .transient(transient)
            .with_data(data)
            .with_comments(comments),
    )
}

/// `<type> <creator> <date>` followed by body lines.
pub fn parse_whole_assembly_tag(header: &[u8], body: Vec<String>) -> Result<WholeAssemblyTag, String> {
    let mut it = fields(header);
    let tag_type = next_str(&mut it, "tag type")?;
    let creator = next_str(&mut it, "tag creator")?;
    let timestamp = next_str(&mut it, "tag timestamp")?;
    no_trailing(it, "WA")?;
    Ok(WholeAssemblyTag::new(tag_type, creator, timestamp).with_body(body))
}
