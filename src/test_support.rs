//! Shared fixtures for unit tests.

/// Two contigs, three reads and one tag of each kind.
pub(crate) const SAMPLE_ACE: &str = "\
AS 2 3

CO Contig1 8 2 0 U
ACGTACGT

BQ
 20 20 20 20 20 20 20 20

AF read1 U 1
AF read2 C 3
RD read1 8 0 0
ACGTACGT

QA 1 8 1 8
DS CHROMAT_FILE: read1 PHD_FILE: read1.phd.1 TIME: Thu Jun 10 14:56:28 2004

RD read2 6 0 0
GTACGT

QA 1 6 1 6
DS CHROMAT_FILE: read2 PHD_FILE: read2.phd.1 TIME: Thu Jun 10 14:56:28 2004

CO Contig2 4 1 0 U
TTGA

BQ
 30 30 30 30

AF read3 U 1
RD read3 4 0 0
TTGA

QA 1 4 1 4
DS CHROMAT_FILE: read3 PHD_FILE: read3.phd.1 TIME: Thu Jun 10 14:56:28 2004

WA{
phrap_params phrap 040610:145628
phrap reads.fasta
}

CT{
Contig1 comment consed 2 4 040610:145628 NoTrans
COMMENT{
looks fine
C}
}

RT{
read1 matchElsewhereHighQual consed 1 3 040610:145628
}
";

/// Write `content` to a fresh temporary file.
pub(crate) fn write_temp(content: &str) -> tempfile::NamedTempFile {
    use std::io::Write;
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(content.as_bytes()).unwrap();
    file.flush().unwrap();
    file
}
