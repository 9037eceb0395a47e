//! Parse, serialize and re-parse.

mod common;

use ace_assembly::phd::PhdRecord;
use ace_assembly::range::Range;
use ace_assembly::sequence::Direction;
use ace_assembly::writer::{AceWriter, WriterOptions};
use common::{parse_all, GAPPED_ACE};
use rustc_hash::FxHashMap;

fn rewrite(options: WriterOptions, phd: Option<&FxHashMap<String, PhdRecord>>) -> Vec<u8> {
    let parsed = parse_all(GAPPED_ACE.as_bytes());
    let mut writer = AceWriter::new(Vec::new()).unwrap().with_options(options);
    for contig in &parsed.contigs {
        writer
            .write_contig(contig, phd.map(|p| p as &dyn ace_assembly::phd::PhdLookup))
            .unwrap();
    }
    for tag in &parsed.whole_assembly_tags {
        writer.write_whole_assembly_tag(tag).unwrap();
    }
    for tag in &parsed.consensus_tags {
        writer.write_consensus_tag(tag).unwrap();
    }
    for tag in &parsed.read_tags {
        writer.write_read_tag(tag).unwrap();
    }
    writer.finish().unwrap()
}

#[test]
fn test_fixture_reads_as_expected() {
    let parsed = parse_all(GAPPED_ACE.as_bytes());
    let contig = &parsed.contigs[0];
    assert_eq!(contig.consensus().to_string(), "ACGT*ACGTACG");

    let r2 = contig.read("r2").unwrap();
    assert_eq!(r2.direction(), Direction::Reverse);
    assert_eq!(r2.offset(), 0);
    assert_eq!(r2.full_length(), 8);
    assert_eq!(r2.valid_range(), Range::new(0, 5));
    assert_eq!(contig.read_bases(r2), b"ACGT*AC");

    let r3 = contig.read("r3").unwrap();
    assert_eq!(r3.offset(), 7);
    assert_eq!(r3.valid_range(), Range::new(1, 4));
    assert_eq!(contig.read_bases(r3), b"GTAC");
}

#[test]
fn test_round_trip_is_identical() {
    let original = parse_all(GAPPED_ACE.as_bytes());
    let bytes = rewrite(WriterOptions::default(), None);
    let again = parse_all(&bytes);

    assert_eq!(again.contigs, original.contigs);
    assert_eq!(again.read_tags, original.read_tags);
    assert_eq!(again.consensus_tags, original.consensus_tags);
    assert_eq!(again.whole_assembly_tags, original.whole_assembly_tags);
}

#[test]
fn test_phd_sequence_fills_clipped_ends() {
    let mut phd = FxHashMap::default();
    phd.insert("r3".to_string(), PhdRecord::with_uniform_quality("CGTACG", 30));
    let bytes = rewrite(WriterOptions::default(), Some(&phd));
    let text = String::from_utf8(bytes.clone()).unwrap();

    assert!(text.contains("RD r3 6 0 0\nCGTACG\n\nQA 2 5 2 5\n"), "{text}");
    // no phd record: clipped bases become N
    assert!(text.contains("RD r2 9 0 0\nNNACGT*AC\n"), "{text}");
    assert!(text.contains("AF r2 C -1\n"));
    assert_eq!(parse_all(&bytes).contigs, parse_all(GAPPED_ACE.as_bytes()).contigs);
}

#[test]
fn test_base_segments_do_not_change_contig() {
    let bytes = rewrite(WriterOptions::default().with_base_segments(true), None);
    let text = String::from_utf8(bytes.clone()).unwrap();

    assert!(text.contains("CO Contig7 12 3 1 U\n"));
    assert!(text.contains("BS 1 12 r1\n"));
    assert_eq!(parse_all(&bytes).contigs, parse_all(GAPPED_ACE.as_bytes()).contigs);
}

#[test]
fn test_header_counts_written_contigs() {
    let bytes = rewrite(WriterOptions::default(), None);
    assert!(bytes.starts_with(b"AS 1 3\n\nCO Contig7 12 3 0 U\nACGT*ACGTACG\n\nBQ\n 30 30"));
}
