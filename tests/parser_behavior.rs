//! Dispatcher behavior observable through the public visitor API.

mod common;

use ace_assembly::parser::{
    AceParser, AceVisitor, ByteSpan, ContigHeader, Flow, ParseOutcome, ResumePoint, Visit,
};
use ace_assembly::AceError;
use common::{many_contigs, parse_all, write_temp, GAPPED_ACE};

/// Records contig ids and spans; halts after `limit` contigs.
#[derive(Default)]
struct Headers {
    ids: Vec<String>,
    points: Vec<ResumePoint>,
    spans: Vec<ByteSpan>,
    limit: Option<usize>,
    ended: bool,
    halted: bool,
}

impl AceVisitor for Headers {
    type Contig = ();

    fn visit_contig(&mut self, header: &ContigHeader) -> ace_assembly::Result<Visit<()>> {
        if self.limit == Some(self.ids.len()) {
            return Ok(Visit::Halt);
        }
        self.ids.push(header.id.clone());
        self.points.push(header.resume_point);
        Ok(Visit::Descend(()))
    }

    fn visit_contig_end(&mut self, _contig: (), span: ByteSpan) -> ace_assembly::Result<Flow> {
        self.spans.push(span);
        Ok(Flow::Continue)
    }

    fn visit_end(&mut self) -> ace_assembly::Result<()> {
        self.ended = true;
        Ok(())
    }

    fn halted(&mut self) {
        self.halted = true;
    }
}

#[test]
fn test_dash_gap_names_line() {
    let content = GAPPED_ACE.replace("nnACGT*AC", "nnACGT-AC");
    let mut visitor = common::Collect::default();
    let err = AceParser::from_bytes(content.as_bytes())
        .accept(&mut visitor)
        .unwrap_err();
    match err {
        AceError::InvalidGapCharacter { line, text } => {
            assert_eq!(line, 19);
            assert_eq!(text, "nnACGT-AC");
        }
        other => panic!("unexpected error {other}"),
    }
}

#[test]
fn test_resume_replays_remaining_contigs() {
    let file = write_temp(&many_contigs(30));
    let mut full = Headers::default();
    AceParser::from_path(file.path())
        .unwrap()
        .accept(&mut full)
        .unwrap();
    assert_eq!(full.ids.len(), 30);

    let mut resumed = Headers::default();
    AceParser::resume(file.path(), full.points[12])
        .unwrap()
        .accept(&mut resumed)
        .unwrap();
    assert_eq!(resumed.ids, full.ids[12..]);
    assert_eq!(resumed.points, full.points[12..]);
    assert_eq!(resumed.spans, full.spans[12..]);
}

#[test]
fn test_halt_skips_end() {
    let file = write_temp(&many_contigs(10));
    let mut visitor = Headers {
        limit: Some(3),
        ..Headers::default()
    };
    let outcome = AceParser::from_path(file.path())
        .unwrap()
        .accept(&mut visitor)
        .unwrap();
    assert_eq!(outcome, ParseOutcome::Halted);
    assert_eq!(visitor.ids, vec!["c0", "c1", "c2"]);
    assert!(visitor.halted);
    assert!(!visitor.ended);
}

#[test]
fn test_spans_cover_contig_text() {
    let content = many_contigs(3);
    let mut visitor = Headers::default();
    AceParser::from_bytes(content.as_bytes())
        .accept(&mut visitor)
        .unwrap();
    assert!(visitor.ended);
    for (span, id) in visitor.spans.iter().zip(&visitor.ids) {
        let text = &content[span.start as usize..=span.end as usize];
        assert!(text.starts_with(&format!("CO {id} ")));
        assert!(!text[1..].contains("\nCO "));
    }
}

#[test]
fn test_crlf_input_parses_like_lf() {
    let crlf = GAPPED_ACE.replace('\n', "\r\n");
    assert_eq!(parse_all(crlf.as_bytes()).contigs, parse_all(GAPPED_ACE.as_bytes()).contigs);
}
