//! ACE serialization.
//!
//! Integers are formatted with itoa. The `AS` header carries totals that
//! are only known at the end, so [`AceWriter::new`] spools records to an
//! anonymous temporary file and prepends the header in
//! [`finish`](AceWriter::finish). [`AceWriter::with_counts`] writes straight
//! through when the totals are known up front.

use crate::best_segment::compute_best_segments;
use crate::config::{BASES_PER_LINE, DEFAULT_CONSENSUS_QUALITY, DEFAULT_OUTPUT_BUFFER, QUALITIES_PER_LINE};
use crate::consensus_quality::compute_consensus_qualities;
use crate::contig::{AssembledRead, Contig};
use crate::error::{AceError, Result};
use crate::phd::{PhdInfo, PhdLookup};
use crate::range::{CoordinateSystem, Range};
use crate::sequence::{is_valid_base, reverse_complement, Direction, GAP};
use crate::tags::{ConsensusTag, ReadTag, WholeAssemblyTag, NO_TRANS};
use std::fs::File;
use std::io::{self, BufWriter, Seek, SeekFrom, Write};

/// Optional output sections.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WriterOptions {
    base_segments: bool,
    computed_qualities: bool,
}

impl WriterOptions {
    /// Emit `BS` lines computed by [`compute_best_segments`].
    pub fn with_base_segments(mut self, enabled: bool) -> Self {
        self.base_segments = enabled;
        self
    }

    /// Recompute `BQ` values from phd qualities when a lookup is given.
    pub fn with_computed_consensus_qualities(mut self, enabled: bool) -> Self {
        self.computed_qualities = enabled;
        self
    }
}

enum Destination<W: Write> {
    Spool { out: W, spool: BufWriter<File> },
    Direct { out: BufWriter<W>, contigs: usize, reads: usize },
}

/// Writes contigs and tags as an ACE file.
///
/// ```
/// use ace_assembly::contig::{ContigBuilder, ReadBuilder};
/// use ace_assembly::sequence::Direction;
/// use ace_assembly::writer::AceWriter;
///
/// let mut builder = ContigBuilder::new("Contig1", "ACGT");
/// builder.add_read(ReadBuilder::untrimmed("read1", "ACGT", 0, Direction::Forward))?;
/// let contig = builder.build()?;
///
/// let mut writer = AceWriter::new(Vec::new())?;
/// writer.write_contig(&contig, None)?;
/// let bytes = writer.finish()?;
/// assert!(bytes.starts_with(b"AS 1 1\n"));
/// # Ok::<(), ace_assembly::error::AceError>(())
/// ```
pub struct AceWriter<W: Write> {
    dest: Destination<W>,
    num: itoa::Buffer,
    options: WriterOptions,
    contigs: usize,
    reads: usize,
}

impl<W: Write> AceWriter<W> {
    /// Spool records until [`finish`](Self::finish) writes the header.
    pub fn new(out: W) -> Result<Self> {
        let spool = BufWriter::with_capacity(DEFAULT_OUTPUT_BUFFER, tempfile::tempfile()?);
        Ok(Self::from_destination(Destination::Spool { out, spool }))
    }

    /// Write the header now and stream records directly. `finish` fails
    /// if the written totals differ from the declared ones.
    pub fn with_counts(out: W, contigs: usize, reads: usize) -> Result<Self> {
        let out = BufWriter::with_capacity(DEFAULT_OUTPUT_BUFFER, out);
        let mut writer = Self::from_destination(Destination::Direct { out, contigs, reads });
        writer.write_header(contigs, reads)?;
        Ok(writer)
    }

    fn from_destination(dest: Destination<W>) -> Self {
        Self {
            dest,
            num: itoa::Buffer::new(),
            options: WriterOptions::default(),
            contigs: 0,
            reads: 0,
        }
    }

    pub fn with_options(mut self, options: WriterOptions) -> Self {
        self.options = options;
        self
    }

    /// Contigs written so far.
    pub fn contigs_written(&self) -> usize {
        self.contigs
    }

    /// Reads written so far.
    pub fn reads_written(&self) -> usize {
        self.reads
    }

    fn out(&mut self) -> Out<'_> {
        let w: &mut dyn Write = match &mut self.dest {
            Destination::Spool { spool, .. } => spool,
            Destination::Direct { out, .. } => out,
        };
        Out { w, num: &mut self.num }
    }

    fn write_header(&mut self, contigs: usize, reads: usize) -> Result<()> {
        self.out().header(contigs, reads)
    }

    /// Write one contig and its reads. `phd` supplies full-length read
    /// sequences and, when enabled, the qualities for recomputed `BQ` values.
    pub fn write_contig(&mut self, contig: &Contig, phd: Option<&dyn PhdLookup>) -> Result<()> {
        let consensus = contig.consensus().as_bytes();
        let segments = self
            .options
            .base_segments
            .then(|| compute_best_segments(contig));
        let qualities = match phd {
            Some(phd) if self.options.computed_qualities => compute_consensus_qualities(contig, phd),
            _ => contig
                .consensus_qualities()
                .map(<[u8]>::to_vec)
                .unwrap_or_else(|| vec![DEFAULT_CONSENSUS_QUALITY; contig.consensus().ungapped_len()]),
        };

        let mut out = self.out();
        out.bytes(b"CO ")?;
        out.str(contig.id())?;
        out.bytes(b" ")?;
        out.int(consensus.len())?;
        out.bytes(b" ")?;
        out.int(contig.num_reads())?;
        out.bytes(b" ")?;
        out.int(segments.as_ref().map_or(0, |s| s.len()))?;
        out.bytes(if contig.is_complemented() { b" C\n" } else { b" U\n" })?;
        out.basecalls(consensus)?;
        out.bytes(b"\nBQ\n")?;
        for chunk in qualities.chunks(QUALITIES_PER_LINE) {
            for &q in chunk {
                out.bytes(b" ")?;
                out.int(q)?;
            }
            out.bytes(b"\n")?;
        }
        out.bytes(b"\n")?;

        let placed: Vec<PlacedRead> = contig
            .reads()
            .map(|read| PlacedRead::new(read, consensus, phd))
            .collect();
        for read in &placed {
            out.bytes(b"AF ")?;
            out.str(&read.id)?;
            out.bytes(b" ")?;
            out.str(read.direction.ace_symbol())?;
            out.bytes(b" ")?;
            out.int(read.start_offset)?;
            out.bytes(b"\n")?;
        }
        if let Some(segments) = &segments {
            for segment in segments.iter() {
                out.bytes(b"BS ")?;
                out.range(segment.range)?;
                out.bytes(b" ")?;
                out.str(&segment.read_id)?;
                out.bytes(b"\n")?;
            }
        }
        out.bytes(b"\n")?;

        for read in &placed {
            out.bytes(b"RD ")?;
            out.str(&read.id)?;
            out.bytes(b" ")?;
            out.int(read.bases.len())?;
            out.bytes(b" 0 0\n")?;
            out.basecalls(&read.bases)?;
            out.bytes(b"\nQA ")?;
            out.range(read.clear)?;
            out.bytes(b" ")?;
            out.range(read.clear)?;
            out.bytes(b"\n")?;
            out.description(read.phd_info)?;
            out.bytes(b"\n")?;
        }

        self.contigs += 1;
        self.reads += placed.len();
        Ok(())
    }

    pub fn write_read_tag(&mut self, tag: &ReadTag) -> Result<()> {
        let mut out = self.out();
        out.bytes(b"RT{\n")?;
        out.str(&tag.read_id)?;
        out.tag_fields(&tag.tag_type, &tag.creator, tag.range, &tag.timestamp, tag.transient)?;
        out.bytes(b"}\n\n")
    }

    pub fn write_consensus_tag(&mut self, tag: &ConsensusTag) -> Result<()> {
        let mut out = self.out();
        out.bytes(b"CT{\n")?;
        out.str(&tag.contig_id)?;
        out.tag_fields(&tag.tag_type, &tag.creator, tag.range, &tag.timestamp, tag.transient)?;
        out.lines(&tag.data)?;
        if !tag.comments.is_empty() {
            out.bytes(b"COMMENT{\n")?;
            out.lines(&tag.comments)?;
            out.bytes(b"C}\n")?;
        }
        out.bytes(b"}\n\n")
    }

    pub fn write_whole_assembly_tag(&mut self, tag: &WholeAssemblyTag) -> Result<()> {
        let mut out = self.out();
        out.bytes(b"WA{\n")?;
        out.str(&tag.tag_type)?;
        out.bytes(b" ")?;
        out.str(&tag.creator)?;
        out.bytes(b" ")?;
        out.str(&tag.timestamp)?;
        out.bytes(b"\n")?;
        out.lines(&tag.body)?;
        out.bytes(b"}\n\n")
    }

    /// Complete the file and hand back the underlying writer.
    pub fn finish(mut self) -> Result<W> {
        let (contigs, reads) = (self.contigs, self.reads);
        match self.dest {
            Destination::Spool { out, spool } => {
                let mut spool = spool.into_inner().map_err(|e| e.into_error())?;
                spool.seek(SeekFrom::Start(0))?;
                let mut out = BufWriter::with_capacity(DEFAULT_OUTPUT_BUFFER, out);
                Out {
                    w: &mut out,
                    num: &mut self.num,
                }
                .header(contigs, reads)?;
                io::copy(&mut spool, &mut out)?;
                Ok(out.into_inner().map_err(|e| e.into_error())?)
            }
            Destination::Direct {
                out,
                contigs: declared_contigs,
                reads: declared_reads,
            } => {
                if declared_contigs != contigs {
                    return Err(AceError::CountMismatch {
                        what: "contig",
                        declared: declared_contigs,
                        actual: contigs,
                    });
                }
                if declared_reads != reads {
                    return Err(AceError::CountMismatch {
                        what: "read",
                        declared: declared_reads,
                        actual: reads,
                    });
                }
                Ok(out.into_inner().map_err(|e| e.into_error())?)
            }
        }
    }
}

/// Formatting helpers over the active destination.
struct Out<'a> {
    w: &'a mut dyn Write,
    num: &'a mut itoa::Buffer,
}

impl Out<'_> {
    #[inline]
    fn bytes(&mut self, bytes: &[u8]) -> Result<()> {
        self.w.write_all(bytes)?;
        Ok(())
    }

    #[inline]
    fn str(&mut self, s: &str) -> Result<()> {
        self.bytes(s.as_bytes())
    }

    #[inline]
    fn int<I: itoa::Integer>(&mut self, n: I) -> Result<()> {
        self.w.write_all(self.num.format(n).as_bytes())?;
        Ok(())
    }

    fn header(&mut self, contigs: usize, reads: usize) -> Result<()> {
        self.bytes(b"AS ")?;
        self.int(contigs)?;
        self.bytes(b" ")?;
        self.int(reads)?;
        self.bytes(b"\n\n")
    }

    /// `<start> <end>` in residue coordinates.
    fn range(&mut self, range: Range) -> Result<()> {
        self.int(range.begin_in(CoordinateSystem::ResidueBased))?;
        self.bytes(b" ")?;
        self.int(range.end_in(CoordinateSystem::ResidueBased))
    }

    fn basecalls(&mut self, bases: &[u8]) -> Result<()> {
        for line in bases.chunks(BASES_PER_LINE) {
            self.bytes(line)?;
            self.bytes(b"\n")?;
        }
        Ok(())
    }

    fn lines(&mut self, lines: &[String]) -> Result<()> {
        for line in lines {
            self.str(line)?;
            self.bytes(b"\n")?;
        }
        Ok(())
    }

    fn description(&mut self, info: &PhdInfo) -> Result<()> {
        self.bytes(b"DS")?;
        let fields: [(&[u8], &str); 3] = [
            (b" CHROMAT_FILE:", &info.trace_name),
            (b" PHD_FILE:", &info.phd_name),
            (b" TIME:", &info.date),
        ];
        for (key, value) in fields {
            self.bytes(key)?;
            if !value.is_empty() {
                self.bytes(b" ")?;
                self.str(value)?;
            }
        }
        self.bytes(b"\n")
    }

    /// The fields after the target id of an `RT` or `CT` header line.
    fn tag_fields(&mut self, tag_type: &str, creator: &str, range: Range, timestamp: &str, transient: bool) -> Result<()> {
        self.bytes(b" ")?;
        self.str(tag_type)?;
        self.bytes(b" ")?;
        self.str(creator)?;
        self.bytes(b" ")?;
        self.range(range)?;
        self.bytes(b" ")?;
        self.str(timestamp)?;
        if transient {
            self.bytes(b" ")?;
            self.str(NO_TRANS)?;
        }
        self.bytes(b"\n")
    }
}

/// A read laid out for output: its full-length basecalls in contig
/// orientation with the gapped valid part spliced in.
struct PlacedRead<'a> {
    id: String,
    direction: Direction,
    phd_info: &'a PhdInfo,
    bases: Vec<u8>,
    /// Gapped window of `bases` that re-parses as the valid part.
    clear: Range,
    start_offset: i64,
}

impl<'a> PlacedRead<'a> {
    fn new(read: &'a AssembledRead, consensus: &[u8], phd: Option<&dyn PhdLookup>) -> Self {
        let full_length = read.full_length();
        let valid = read.valid_range();
        let gapped = read.gapped_bases(consensus);

        let full = phd
            .and_then(|phd| phd.get(read.id()))
            .filter(|record| record.sequence.len() == full_length)
            .map(|record| match read.direction() {
                Direction::Forward => record.sequence,
                Direction::Reverse => reverse_complement(&record.sequence),
            })
            .map(|bases| {
                bases
                    .into_iter()
                    .map(|b| if b != GAP && is_valid_base(b) { b.to_ascii_uppercase() } else { b'N' })
                    .collect()
            })
            .unwrap_or_else(|| vec![b'N'; full_length]);

        // first valid base in contig orientation
        let leading = match read.direction() {
            Direction::Forward => valid.begin(),
            Direction::Reverse => full_length as i64 - 1 - valid.end(),
        }
        .max(0) as usize;
        let trailing_start = (leading + valid.len()).min(full.len());
        let leading = leading.min(full.len());

        let mut bases = Vec::with_capacity(full.len() + gapped.len() - valid.len().min(gapped.len()));
        bases.extend_from_slice(&full[..leading]);
        bases.extend_from_slice(&gapped);
        bases.extend_from_slice(&full[trailing_start..]);

        Self {
            id: read.id().to_string(),
            direction: read.direction(),
            phd_info: read.phd_info(),
            bases,
            clear: Range::of_length(leading as i64, gapped.len()),
            start_offset: read.offset() as i64 + 1 - leading as i64,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contig::{ContigBuilder, ContigBuilderVisitor, ReadBuilder};
    use crate::parser::{AceParser, AceVisitor, ByteSpan, ContigHeader, Flow, Visit};
    use crate::phd::PhdRecord;
    use crate::store::{AceStore, AceStoreBuilder, StoreHint};
    use crate::test_support::{write_temp, SAMPLE_ACE};
    use rustc_hash::FxHashMap;

    fn load_sample() -> Vec<std::sync::Arc<Contig>> {
        let file = write_temp(SAMPLE_ACE);
        let store = AceStoreBuilder::new(file.path())
            .hint(StoreHint::InMemory)
            .build()
            .unwrap();
        store.iter().unwrap().map(|c| c.unwrap()).collect()
    }

    #[derive(Default)]
    struct Collect {
        contigs: Vec<Contig>,
        read_tags: Vec<ReadTag>,
        consensus_tags: Vec<ConsensusTag>,
        whole_assembly_tags: Vec<WholeAssemblyTag>,
    }

    impl AceVisitor for Collect {
        type Contig = ContigBuilderVisitor;

        fn visit_contig(&mut self, header: &ContigHeader) -> Result<Visit<ContigBuilderVisitor>> {
            Ok(Visit::Descend(ContigBuilderVisitor::new(header)))
        }

        fn visit_contig_end(&mut self, contig: ContigBuilderVisitor, _span: ByteSpan) -> Result<Flow> {
            self.contigs.push(contig.build()?);
            Ok(Flow::Continue)
        }

        fn visit_read_tag(&mut self, tag: ReadTag) -> Result<Flow> {
            self.read_tags.push(tag);
            Ok(Flow::Continue)
        }

        fn visit_consensus_tag(&mut self, tag: ConsensusTag) -> Result<Flow> {
            self.consensus_tags.push(tag);
            Ok(Flow::Continue)
        }

        fn visit_whole_assembly_tag(&mut self, tag: WholeAssemblyTag) -> Result<Flow> {
            self.whole_assembly_tags.push(tag);
            Ok(Flow::Continue)
        }
    }

    fn reparse(bytes: &[u8]) -> Collect {
        let mut visitor = Collect::default();
        AceParser::from_bytes(bytes).accept(&mut visitor).unwrap();
        visitor
    }

    #[test]
    fn test_sample_round_trip() {
        let contigs = load_sample();
        let mut writer = AceWriter::new(Vec::new()).unwrap();
        for contig in &contigs {
            writer.write_contig(contig, None).unwrap();
        }
        let bytes = writer.finish().unwrap();
        assert!(bytes.starts_with(b"AS 2 3\n\nCO Contig1 8 2 0 U\nACGTACGT\n\nBQ\n 20 20"));

        let again = reparse(&bytes).contigs;
        assert_eq!(again.len(), 2);
        for (a, b) in contigs.iter().zip(&again) {
            assert_eq!(**a, *b);
        }
    }

    #[test]
    fn test_trimmed_reverse_read_reproduced() {
        let mut builder = ContigBuilder::new("ctg", "ACGTAC");
        builder
            .add_read(ReadBuilder::new(
                "r",
                "GTAC",
                2,
                Direction::Reverse,
                Range::new(1, 4),
                7,
            ))
            .unwrap();
        builder
            .add_read(ReadBuilder::untrimmed("f", "ACGTAC", 0, Direction::Forward))
            .unwrap();
        let contig = builder.build().unwrap();

        let mut phd = FxHashMap::default();
        // native orientation of ACGTACT
        phd.insert("r".to_string(), PhdRecord::with_uniform_quality("AGTACGT", 30));
        let mut writer = AceWriter::new(Vec::new()).unwrap();
        writer.write_contig(&contig, Some(&phd)).unwrap();
        let bytes = writer.finish().unwrap();
        let text = String::from_utf8(bytes.clone()).unwrap();
        assert!(text.contains("RD r 7 0 0\nACGTACT\n\nQA 3 6 3 6\n"), "{text}");
        assert!(text.contains("AF r C 1\n"));

        let again = &reparse(&bytes).contigs[0];
        assert_eq!(again.consensus(), contig.consensus());
        assert!(again.reads().eq(contig.reads()));
    }

    #[test]
    fn test_counts_checked_at_finish() {
        let contig = &load_sample()[1];
        let mut writer = AceWriter::with_counts(Vec::new(), 1, 2).unwrap();
        writer.write_contig(contig, None).unwrap();
        match writer.finish() {
            Err(AceError::CountMismatch {
                what: "read",
                declared: 2,
                actual: 1,
            }) => {}
            other => panic!("unexpected {:?}", other.map(|_| ())),
        }

        let mut writer = AceWriter::with_counts(Vec::new(), 1, 1).unwrap();
        writer.write_contig(contig, None).unwrap();
        assert!(writer.finish().unwrap().starts_with(b"AS 1 1\n\nCO Contig2"));
    }

    #[test]
    fn test_default_and_computed_qualities() {
        let mut builder = ContigBuilder::new("ctg", "ACGT");
        builder
            .add_read(ReadBuilder::untrimmed("a", "ACGT", 0, Direction::Forward))
            .unwrap();
        let contig = builder.build().unwrap();

        let mut writer = AceWriter::new(Vec::new()).unwrap();
        writer.write_contig(&contig, None).unwrap();
        let text = String::from_utf8(writer.finish().unwrap()).unwrap();
        assert!(text.contains("BQ\n 99 99 99 99\n"));

        let mut phd = FxHashMap::default();
        phd.insert("a".to_string(), PhdRecord::with_uniform_quality("ACGT", 25));
        let options = WriterOptions::default().with_computed_consensus_qualities(true);
        let mut writer = AceWriter::new(Vec::new()).unwrap().with_options(options);
        writer.write_contig(&contig, Some(&phd)).unwrap();
        let text = String::from_utf8(writer.finish().unwrap()).unwrap();
        assert!(text.contains("BQ\n 25 25 25 25\n"));
    }

    #[test]
    fn test_base_segments_written() {
        let contigs = load_sample();
        let options = WriterOptions::default().with_base_segments(true);
        let mut writer = AceWriter::new(Vec::new()).unwrap().with_options(options);
        writer.write_contig(&contigs[1], None).unwrap();
        let text = String::from_utf8(writer.finish().unwrap()).unwrap();
        assert!(text.contains("CO Contig2 4 1 1 U\n"));
        assert!(text.contains("AF read3 U 1\nBS 1 4 read3\n\n"));
    }

    #[test]
    fn test_tags_round_trip() {
        let read_tag = ReadTag::new("read1", "matchElsewhereHighQual", "consed", Range::new(0, 2), "040610:145628");
        let consensus_tag = ConsensusTag::new("Contig1", "comment", "consed", Range::new(1, 3), "040610:145628")
            .transient(true)
            .with_comments(vec!["looks fine".to_string()]);
        let wa = WholeAssemblyTag::new("phrap_params", "phrap", "040610:145628")
            .with_body(vec!["phrap reads.fasta".to_string()]);

        let mut writer = AceWriter::new(Vec::new()).unwrap();
        writer.write_whole_assembly_tag(&wa).unwrap();
        writer.write_consensus_tag(&consensus_tag).unwrap();
        writer.write_read_tag(&read_tag).unwrap();
        let bytes = writer.finish().unwrap();
        let text = String::from_utf8(bytes.clone()).unwrap();
        assert!(text.contains("CT{\nContig1 comment consed 2 4 040610:145628 NoTrans\nCOMMENT{\nlooks fine\nC}\n}\n"));

        let visitor = reparse(&bytes);
        assert_eq!(visitor.read_tags, vec![read_tag]);
        assert_eq!(visitor.consensus_tags, vec![consensus_tag]);
        assert_eq!(visitor.whole_assembly_tags, vec![wa]);
    }
}
