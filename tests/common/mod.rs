//! Fixtures shared by the integration tests.

#![allow(dead_code)]

use ace_assembly::contig::{Contig, ContigBuilderVisitor};
use ace_assembly::parser::{AceParser, AceVisitor, ByteSpan, ContigHeader, Flow, Visit};
use ace_assembly::tags::{ConsensusTag, ReadTag, WholeAssemblyTag};
use ace_assembly::Result;
use std::io::Write;
use tempfile::NamedTempFile;

/// One contig with a consensus gap, a trimmed reverse read and a read whose
/// quality and alignment clips differ; followed by one tag of each kind.
pub const GAPPED_ACE: &str = "\
AS 1 3

CO Contig7 12 3 0 U
ACGT*ACGTACG

BQ
 30 30 30 30 30 30 30 30 30 30 30

AF r1 U 1
AF r2 C -1
AF r3 U 7
RD r1 12 0 0
ACGT*ACGTACG

QA 1 12 1 12
DS CHROMAT_FILE: r1 PHD_FILE: r1.phd.1 TIME: Mon Jan 5 10:00:00 2009

RD r2 9 0 0
nnACGT*AC

QA 3 9 3 9
DS CHROMAT_FILE: r2 PHD_FILE: r2.phd.1 TIME: Mon Jan 5 10:00:00 2009

RD r3 6 0 0
CGTACG

QA 2 6 1 5
DS CHROMAT_FILE: r3 PHD_FILE: r3.phd.1 TIME: Mon Jan 5 10:00:00 2009

WA{
phrap_params phrap 090105:100000
phrap reads.fasta -new_ace
}

CT{
Contig7 repeat consed 3 6 090105:100000
COMMENT{
tandem repeat
C}
}

RT{
r2 matchElsewhereHighQual consed 2 4 090105:100000 NoTrans
}
";

/// `count` single-read contigs named `c0`, `c1`, ...
pub fn many_contigs(count: usize) -> String {
    let mut content = format!("AS {count} {count}\n\n");
    for i in 0..count {
        content.push_str(&format!(
            "CO c{i} 8 1 0 U\nACGTACGT\n\nBQ\n 20 20 20 20 20 20 20 20\n\n\
             AF r{i} U 1\nRD r{i} 8 0 0\nACGTACGT\n\nQA 1 8 1 8\n\
             DS CHROMAT_FILE: r{i} PHD_FILE: r{i}.phd.1 TIME: Mon Jan 5 10:00:00 2009\n\n"
        ));
    }
    content
}

pub fn write_temp(content: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(content.as_bytes()).unwrap();
    file.flush().unwrap();
    file
}

/// Everything a full parse produces.
#[derive(Default)]
pub struct Collect {
    pub contigs: Vec<Contig>,
    pub read_tags: Vec<ReadTag>,
    pub consensus_tags: Vec<ConsensusTag>,
    pub whole_assembly_tags: Vec<WholeAssemblyTag>,
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

pub fn parse_all(bytes: &[u8]) -> Collect {
    let mut collect = Collect::default();
    AceParser::from_bytes(bytes).accept(&mut collect).unwrap();
    collect
}
