//! Builds contigs from parser events.

use super::builder::ContigBuilder;
use super::read::ReadBuilder;
use super::{report_drop, Contig, DropHook, DropReason};
use crate::error::{AceError, Result};
use crate::parser::{AlignedReadInfo, ContigHeader, ContigVisitor, Flow, QualityLine, ReadVisitor, Visit};
use crate::phd::PhdInfo;
use crate::range::{CoordinateSystem, Range};
use crate::sequence::{count_bases, Direction};
use log::debug;
use rustc_hash::FxHashMap;
use std::sync::Arc;

/// Collects the records of one read.
#[derive(Debug, Clone)]
pub struct ReadBuilderVisitor {
    id: String,
    gapped_length: usize,
    bases: Vec<u8>,
    quality: Option<QualityLine>,
    phd_info: Option<PhdInfo>,
}

impl ReadBuilderVisitor {
    pub fn new(id: impl Into<String>, gapped_length: usize) -> Self {
        Self {
            id: id.into(),
            gapped_length,
            bases: Vec::with_capacity(gapped_length),
            quality: None,
            phd_info: None,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }
}

impl ReadVisitor for ReadBuilderVisitor {
    fn visit_bases_line(&mut self, bases: &[u8]) -> Result<Flow> {
        self.bases.extend_from_slice(bases);
        Ok(Flow::Continue)
    }

    fn visit_quality_line(&mut self, line: QualityLine) -> Result<Flow> {
        self.quality = Some(line);
        Ok(Flow::Continue)
    }

    fn visit_trace_description(&mut self, info: PhdInfo) -> Result<Flow> {
        self.phd_info = Some(info);
        Ok(Flow::Continue)
    }
}

/// The 0-based gapped window of the read that is both high quality and
/// aligned.
fn clear_window(quality: &QualityLine, gapped_length: usize) -> std::result::Result<Range, DropReason> {
    if quality.is_unusable() {
        return Err(DropReason::Unusable);
    }
    let quality_range = Range::of(CoordinateSystem::ResidueBased, quality.qual_left, quality.qual_right)
        .map_err(|_| DropReason::InvertedQualityRange)?;
    let alignment = Range::of(
        CoordinateSystem::ResidueBased,
        quality.align_left,
        quality.align_right,
    )
    .map_err(|_| DropReason::EmptyClearRange)?;
    let window = quality_range
        .intersection(&alignment)
        .intersection(&Range::of_length(0, gapped_length));
    if window.is_empty() {
        return Err(DropReason::EmptyClearRange);
    }
    Ok(window)
}

/// A [`ContigVisitor`] that assembles a [`Contig`].
///
/// Reads are placed as soon as their records are complete; reads that
/// cannot be placed are reported to the drop hook and skipped.
pub struct ContigBuilderVisitor {
    id: String,
    declared_bases: usize,
    complemented: bool,
    consensus: Vec<u8>,
    qualities: Option<Vec<u8>>,
    aligned: FxHashMap<String, AlignedReadInfo>,
    reads: Vec<ReadBuilder>,
    drop_hook: Option<Arc<dyn DropHook>>,
}

impl ContigBuilderVisitor {
    pub fn new(header: &ContigHeader) -> Self {
        Self {
            id: header.id.clone(),
            declared_bases: header.num_bases,
            complemented: header.complemented,
            consensus: Vec::with_capacity(header.num_bases),
            qualities: None,
            aligned: FxHashMap::default(),
            reads: Vec::with_capacity(header.num_reads),
            drop_hook: None,
        }
    }

    pub fn with_drop_hook(mut self, hook: Option<Arc<dyn DropHook>>) -> Self {
        self.drop_hook = hook;
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    fn drop_read(&self, read_id: &str, reason: DropReason) {
        report_drop(self.drop_hook.as_ref(), &self.id, read_id, reason);
    }

    fn place_read(&mut self, read: ReadBuilderVisitor) -> Result<()> {
        if read.bases.len() != read.gapped_length {
            return Err(AceError::Build {
                contig_id: self.id.clone(),
                message: format!(
                    "read {} declares {} bases but has {}",
                    read.id,
                    read.gapped_length,
                    read.bases.len()
                ),
            });
        }
        let Some(info) = self.aligned.remove(&read.id) else {
            self.drop_read(&read.id, DropReason::MissingAlignment);
            return Ok(());
        };
        let Some(quality) = read.quality else {
            self.drop_read(&read.id, DropReason::MissingQualityLine);
            return Ok(());
        };
        let window = match clear_window(&quality, read.bases.len()) {
            Ok(window) => window,
            Err(reason) => {
                self.drop_read(&read.id, reason);
                return Ok(());
            }
        };

        let start = window.begin() as usize;
        let end = window.end() as usize + 1;
        let clear = &read.bases[start..end];
        let num_bases = count_bases(clear);
        if num_bases == 0 {
            self.drop_read(&read.id, DropReason::NoBases);
            return Ok(());
        }
        let offset = info.start_offset + window.begin_in(CoordinateSystem::ResidueBased) - 2;
        if offset < 0 {
            self.drop_read(&read.id, DropReason::OutsideConsensus);
            return Ok(());
        }

        let full_length = count_bases(&read.bases);
        let leading = count_bases(&read.bases[..start]) as i64;
        let last = leading + num_bases as i64 - 1;
        let valid_range = match info.direction {
            Direction::Forward => Range::new(leading, last),
            Direction::Reverse => {
                let flip = full_length as i64 - 1;
                Range::new(flip - last, flip - leading)
            }
        };

        let placed = ReadBuilder::new(
            read.id,
            clear.to_vec(),
            offset as usize,
            info.direction,
            valid_range,
            full_length,
        )
        .with_phd_info(read.phd_info.unwrap_or_default());
        self.reads.push(placed);
        Ok(())
    }

    /// Freeze the collected records into a contig.
    pub fn build(self) -> Result<Contig> {
        if self.consensus.len() != self.declared_bases {
            return Err(AceError::Build {
                contig_id: self.id,
                message: format!(
                    "declares {} consensus bases but has {}",
                    self.declared_bases,
                    self.consensus.len()
                ),
            });
        }
        for orphan in self.aligned.keys() {
            debug!("contig {}: AF record for {} has no read", self.id, orphan);
        }
        let mut builder = ContigBuilder::new(self.id, self.consensus).complemented(self.complemented);
        if let Some(qualities) = self.qualities {
            builder = builder.consensus_qualities(qualities);
        }
        builder.set_drop_hook(self.drop_hook);
        for read in self.reads {
            builder.add_read(read)?;
        }
        builder.build()
    }
}

impl ContigVisitor for ContigBuilderVisitor {
    type Read = ReadBuilderVisitor;

    fn visit_bases_line(&mut self, bases: &[u8]) -> Result<Flow> {
        self.consensus.extend_from_slice(bases);
        Ok(Flow::Continue)
    }

    fn visit_consensus_qualities(&mut self, qualities: Vec<u8>) -> Result<Flow> {
        self.qualities = Some(qualities);
        Ok(Flow::Continue)
    }

    fn visit_aligned_read_info(&mut self, info: AlignedReadInfo) -> Result<Flow> {
        self.aligned.insert(info.read_id.clone(), info);
        Ok(Flow::Continue)
    }

    fn visit_read(&mut self, read_id: &str, gapped_length: usize) -> Result<Visit<ReadBuilderVisitor>> {
        Ok(Visit::Descend(ReadBuilderVisitor::new(read_id, gapped_length)))
    }

    fn visit_read_end(&mut self, read: ReadBuilderVisitor) -> Result<Flow> {
        self.place_read(read)?;
        Ok(Flow::Continue)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contig::DroppedRead;
    use crate::parser::{AceParser, AceVisitor, ByteSpan};
    use crate::test_support::SAMPLE_ACE;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Collect {
        contigs: Vec<Contig>,
        hook: Option<Arc<dyn DropHook>>,
    }

    impl AceVisitor for Collect {
        type Contig = ContigBuilderVisitor;

        fn visit_contig(&mut self, header: &ContigHeader) -> Result<Visit<ContigBuilderVisitor>> {
            Ok(Visit::Descend(
                ContigBuilderVisitor::new(header).with_drop_hook(self.hook.clone()),
            ))
        }

        fn visit_contig_end(&mut self, contig: ContigBuilderVisitor, _span: ByteSpan) -> Result<Flow> {
            self.contigs.push(contig.build()?);
            Ok(Flow::Continue)
        }
    }

    fn parse(input: &str, hook: Option<Arc<dyn DropHook>>) -> Result<Vec<Contig>> {
        let mut collect = Collect {
            contigs: Vec::new(),
            hook,
        };
        AceParser::from_bytes(input.as_bytes()).accept(&mut collect)?;
        Ok(collect.contigs)
    }

    fn recording_hook() -> (Arc<dyn DropHook>, Arc<Mutex<Vec<DroppedRead>>>) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let hook: Arc<dyn DropHook> = Arc::new(move |d: &DroppedRead| sink.lock().unwrap().push(d.clone()));
        (hook, seen)
    }

    #[test]
    fn test_builds_sample() {
        let contigs = parse(SAMPLE_ACE, None).unwrap();
        assert_eq!(contigs.len(), 2);
        let c1 = &contigs[0];
        assert_eq!(c1.id(), "Contig1");
        assert_eq!(c1.consensus().as_bytes(), b"ACGTACGT");
        assert_eq!(c1.consensus_qualities().unwrap().len(), 8);
        let read2 = c1.read("read2").unwrap();
        assert_eq!(read2.offset(), 2);
        assert_eq!(read2.direction(), Direction::Reverse);
        assert_eq!(read2.valid_range(), Range::new(0, 5));
        assert_eq!(c1.read_bases(read2), b"GTACGT");
        assert_eq!(read2.phd_info().phd_name, "read2.phd.1");
    }

    #[test]
    fn test_clear_range_trims_read() {
        let input = "\
CO c1 6 1 0 U
ACGTAC

AF r1 C -1
RD r1 9 0 0
TTACG*TAC

QA 3 8 2 9
DS CHROMAT_FILE: r1 PHD_FILE: r1.phd.1 TIME: Thu Jun 10 14:56:28 2004
";
        let contigs = parse(input, None).unwrap();
        let read = contigs[0].read("r1").unwrap();
        // window 3..=8 of the read, offset -1 + 3 - 2
        assert_eq!(read.offset(), 0);
        assert_eq!(contigs[0].read_bases(read), b"ACG*TA");
        // ungapped read has 8 bases, window holds bases 2..=6 in contig
        // orientation, flipped for a complemented read
        assert_eq!(read.full_length(), 8);
        assert_eq!(read.valid_range(), Range::new(1, 5));
        assert_eq!(contigs[0].consensus().as_bytes(), b"ACGTAC");
    }

    #[test]
    fn test_unusable_reads_dropped() {
        let input = "\
CO c1 4 4 0 U
ACGT

AF good U 1
AF lowq U 1
AF noqa U 1
AF flipped U 1
RD good 4 0 0
ACGT

QA 1 4 1 4
RD lowq 4 0 0
ACGT

QA -1 -1 1 4
RD noqa 4 0 0
ACGT

RD flipped 4 0 0
ACGT

QA 4 1 1 4
RD noaf 4 0 0
ACGT

QA 1 4 1 4
";
        let (hook, seen) = recording_hook();
        let contigs = parse(input, Some(hook)).unwrap();
        assert_eq!(contigs[0].read_ids().collect::<Vec<_>>(), vec!["good"]);
        let reasons: Vec<_> = seen
            .lock()
            .unwrap()
            .iter()
            .map(|d| (d.read_id.clone(), d.reason))
            .collect();
        assert_eq!(
            reasons,
            vec![
                ("lowq".to_string(), DropReason::Unusable),
                ("noqa".to_string(), DropReason::MissingQualityLine),
                ("flipped".to_string(), DropReason::InvertedQualityRange),
                ("noaf".to_string(), DropReason::MissingAlignment),
            ]
        );
    }

    #[test]
    fn test_disjoint_clip_ranges_dropped() {
        let quality = QualityLine {
            qual_left: 1,
            qual_right: 3,
            align_left: 5,
            align_right: 8,
        };
        assert_eq!(clear_window(&quality, 10), Err(DropReason::EmptyClearRange));
    }

    #[test]
    fn test_no_reads_is_error() {
        let input = "CO c1 4 1 0 U\nACGT\n\nAF r1 U 1\nRD r1 4 0 0\nACGT\n\nQA -1 -1 1 4\n";
        let err = parse(input, None).unwrap_err();
        assert!(matches!(err, AceError::NoReads { contig_id } if contig_id == "c1"));
    }

    #[test]
    fn test_length_mismatch_is_error() {
        let input = "CO c1 5 1 0 U\nACGT\n";
        assert!(matches!(parse(input, None), Err(AceError::Build { .. })));
    }
}
