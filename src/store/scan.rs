//! Visitors shared by the store implementations.

use crate::contig::{Contig, ContigBuilderVisitor, DropHook};
use crate::error::Result;
use crate::parser::{AceVisitor, AlignedReadInfo, ByteSpan, ContigHeader, ContigVisitor, Flow, Visit};
use crate::range::Range;
use crate::tags::{ConsensusTag, ReadTag, WholeAssemblyTag};
use log::debug;
use rustc_hash::FxHashSet;
use std::sync::Arc;

/// Predicate selecting the contig ids a store exposes.
pub type ContigFilter = Arc<dyn Fn(&str) -> bool + Send + Sync>;

/// Construction-time settings every scan honors.
#[derive(Clone, Default)]
pub(crate) struct ScanOptions {
    pub filter: Option<ContigFilter>,
    pub drop_hook: Option<Arc<dyn DropHook>>,
}

impl ScanOptions {
    #[inline]
    pub fn includes(&self, contig_id: &str) -> bool {
        self.filter.as_ref().is_none_or(|f| f(contig_id))
    }

    pub fn contig_visitor(&self, header: &ContigHeader) -> ContigBuilderVisitor {
        ContigBuilderVisitor::new(header).with_drop_hook(self.drop_hook.clone())
    }
}

/// Build a contig, logging contig-local failures. The caller decides
/// whether the failure ends the scan.
pub(crate) fn build_contig(contig: ContigBuilderVisitor) -> Result<Contig> {
    let built = contig.build();
    if let Err(e) = &built {
        if e.is_contig_local() {
            debug!("contig cannot be built: {}", e);
        }
    }
    built
}

/// Collects the read ids of a contig without visiting the reads.
#[derive(Debug, Default)]
pub(crate) struct ReadIds(Vec<String>);

/// Included contigs get the scan's own visitor; excluded ones only report
/// their read ids so that tags on those reads can be dropped.
pub(crate) enum Gate<C> {
    Included(C),
    Excluded(ReadIds),
}

impl<C: ContigVisitor> ContigVisitor for Gate<C> {
    type Read = C::Read;

    fn visit_bases_line(&mut self, bases: &[u8]) -> Result<Flow> {
        match self {
            Gate::Included(c) => c.visit_bases_line(bases),
            Gate::Excluded(_) => Ok(Flow::Continue),
        }
    }

    fn visit_consensus_qualities(&mut self, qualities: Vec<u8>) -> Result<Flow> {
        match self {
            Gate::Included(c) => c.visit_consensus_qualities(qualities),
            Gate::Excluded(_) => Ok(Flow::Continue),
        }
    }

    fn visit_aligned_read_info(&mut self, info: AlignedReadInfo) -> Result<Flow> {
        match self {
            Gate::Included(c) => c.visit_aligned_read_info(info),
            Gate::Excluded(_) => Ok(Flow::Continue),
        }
    }

    fn visit_base_segment(&mut self, range: Range, read_id: &str) -> Result<Flow> {
        match self {
            Gate::Included(c) => c.visit_base_segment(range, read_id),
            Gate::Excluded(_) => Ok(Flow::Continue),
        }
    }

    fn visit_read(&mut self, read_id: &str, gapped_length: usize) -> Result<Visit<C::Read>> {
        match self {
            Gate::Included(c) => c.visit_read(read_id, gapped_length),
            Gate::Excluded(ids) => {
                ids.0.push(read_id.to_string());
                Ok(Visit::Skip)
            }
        }
    }

    fn visit_read_end(&mut self, read: C::Read) -> Result<Flow> {
        match self {
            Gate::Included(c) => c.visit_read_end(read),
            Gate::Excluded(_) => Ok(Flow::Continue),
        }
    }

    fn halted(&mut self) {
        if let Gate::Included(c) = self {
            c.halted();
        }
    }
}

/// Tags of a file. Consensus tags of excluded contigs and read tags of
/// their reads are left out.
#[derive(Debug, Clone, Default)]
pub(crate) struct TagSet {
    pub read: Vec<ReadTag>,
    pub consensus: Vec<ConsensusTag>,
    pub whole_assembly: Vec<WholeAssemblyTag>,
    excluded_reads: FxHashSet<String>,
}

impl TagSet {
    fn add_consensus(&mut self, options: &ScanOptions, tag: ConsensusTag) {
        if options.includes(&tag.contig_id) {
            self.consensus.push(tag);
        }
    }

    fn add_read(&mut self, tag: ReadTag) {
        if !self.excluded_reads.contains(&tag.read_id) {
            self.read.push(tag);
        }
    }

    fn exclude(&mut self, reads: ReadIds) {
        self.excluded_reads.extend(reads.0);
    }

    /// Drop read tags seen before the contig that excludes their read.
    fn finish(&mut self) {
        if self.excluded_reads.is_empty() {
            return;
        }
        let excluded = std::mem::take(&mut self.excluded_reads);
        self.read.retain(|tag| !excluded.contains(&tag.read_id));
    }
}

/// One included contig as seen in a scan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ContigEntry {
    pub id: String,
    /// Read count declared on the `CO` line.
    pub num_reads: usize,
    pub span: Option<ByteSpan>,
}

impl ContigEntry {
    fn new(header: &ContigHeader) -> Self {
        Self {
            id: header.id.clone(),
            num_reads: header.num_reads,
            span: None,
        }
    }
}

/// Builds every included contig. A contig that cannot be built keeps its
/// place as an error.
pub(crate) struct LoadVisitor {
    pub options: ScanOptions,
    pub contigs: Vec<Result<Arc<Contig>>>,
    pub entries: Vec<ContigEntry>,
    pub tags: TagSet,
}

impl LoadVisitor {
    pub fn new(options: ScanOptions) -> Self {
        Self {
            options,
            contigs: Vec::new(),
            entries: Vec::new(),
            tags: TagSet::default(),
        }
    }
}

impl AceVisitor for LoadVisitor {
    type Contig = Gate<ContigBuilderVisitor>;

    fn visit_contig(&mut self, header: &ContigHeader) -> Result<Visit<Self::Contig>> {
        if !self.options.includes(&header.id) {
            return Ok(Visit::Descend(Gate::Excluded(ReadIds::default())));
        }
        self.entries.push(ContigEntry::new(header));
        Ok(Visit::Descend(Gate::Included(self.options.contig_visitor(header))))
    }

    fn visit_contig_end(&mut self, contig: Self::Contig, span: ByteSpan) -> Result<Flow> {
        match contig {
            Gate::Included(contig) => {
                if let Some(entry) = self.entries.last_mut() {
                    entry.span = Some(span);
                }
                match build_contig(contig) {
                    Ok(built) => self.contigs.push(Ok(Arc::new(built))),
                    Err(e) if e.is_contig_local() => self.contigs.push(Err(e)),
                    Err(e) => return Err(e),
                }
            }
            Gate::Excluded(reads) => self.tags.exclude(reads),
        }
        Ok(Flow::Continue)
    }

    fn visit_read_tag(&mut self, tag: ReadTag) -> Result<Flow> {
        self.tags.add_read(tag);
        Ok(Flow::Continue)
    }

    fn visit_consensus_tag(&mut self, tag: ConsensusTag) -> Result<Flow> {
        self.tags.add_consensus(&self.options, tag);
        Ok(Flow::Continue)
    }

    fn visit_whole_assembly_tag(&mut self, tag: WholeAssemblyTag) -> Result<Flow> {
        self.tags.whole_assembly.push(tag);
        Ok(Flow::Continue)
    }

    fn visit_end(&mut self) -> Result<()> {
        self.tags.finish();
        Ok(())
    }
}

/// Records the byte span of every included contig without building it.
/// With `with_spans` unset included contigs are skipped outright.
pub(crate) struct IndexVisitor {
    pub options: ScanOptions,
    pub entries: Vec<ContigEntry>,
    pub tags: TagSet,
    with_spans: bool,
}

impl IndexVisitor {
    pub fn new(options: ScanOptions, with_spans: bool) -> Self {
        Self {
            options,
            entries: Vec::new(),
            tags: TagSet::default(),
            with_spans,
        }
    }
}

impl AceVisitor for IndexVisitor {
    type Contig = Gate<()>;

    fn visit_contig(&mut self, header: &ContigHeader) -> Result<Visit<Gate<()>>> {
        if !self.options.includes(&header.id) {
            return Ok(Visit::Descend(Gate::Excluded(ReadIds::default())));
        }
        self.entries.push(ContigEntry::new(header));
        Ok(if self.with_spans {
            Visit::Descend(Gate::Included(()))
        } else {
            Visit::Skip
        })
    }

    fn visit_contig_end(&mut self, contig: Gate<()>, span: ByteSpan) -> Result<Flow> {
        match contig {
            Gate::Included(()) => {
                if let Some(entry) = self.entries.last_mut() {
                    entry.span = Some(span);
                }
            }
            Gate::Excluded(reads) => self.tags.exclude(reads),
        }
        Ok(Flow::Continue)
    }

    fn visit_read_tag(&mut self, tag: ReadTag) -> Result<Flow> {
        self.tags.add_read(tag);
        Ok(Flow::Continue)
    }

    fn visit_consensus_tag(&mut self, tag: ConsensusTag) -> Result<Flow> {
        self.tags.add_consensus(&self.options, tag);
        Ok(Flow::Continue)
    }

    fn visit_whole_assembly_tag(&mut self, tag: WholeAssemblyTag) -> Result<Flow> {
        self.tags.whole_assembly.push(tag);
        Ok(Flow::Continue)
    }

    fn visit_end(&mut self) -> Result<()> {
        self.tags.finish();
        Ok(())
    }
}

/// Builds one contig and halts.
pub(crate) struct FindVisitor<'a> {
    options: &'a ScanOptions,
    target: &'a str,
    pub found: Option<Contig>,
}

impl<'a> FindVisitor<'a> {
    pub fn new(options: &'a ScanOptions, target: &'a str) -> Self {
        Self {
            options,
            target,
            found: None,
        }
    }
}

impl AceVisitor for FindVisitor<'_> {
    type Contig = ContigBuilderVisitor;

    fn visit_contig(&mut self, header: &ContigHeader) -> Result<Visit<ContigBuilderVisitor>> {
        if header.id != self.target || !self.options.includes(&header.id) {
            return Ok(Visit::Skip);
        }
        Ok(Visit::Descend(self.options.contig_visitor(header)))
    }

    fn visit_contig_end(&mut self, contig: ContigBuilderVisitor, _span: ByteSpan) -> Result<Flow> {
        self.found = Some(build_contig(contig)?);
        Ok(Flow::Halt)
    }
}
