//! Annotation tags: whole-assembly (`WA{`), consensus (`CT{`) and read (`RT{`).
//!
//! Tags never affect read placement. Ranges are 0-based gapped positions;
//! timestamps are kept verbatim in the compact `yyMMdd:HHmmss` form.

use crate::range::Range;

/// Marker written after a tag header line for tags that must not be
/// transferred to a new assembly.
pub const NO_TRANS: &str = "NoTrans";

/// A tag attached to the assembly as a whole.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WholeAssemblyTag {
    pub tag_type: String,
    pub creator: String,
    pub timestamp: String,
    /// Body lines without trailing newlines.
    pub body: Vec<String>,
}

impl WholeAssemblyTag {
    pub fn new(
        tag_type: impl Into<String>,
        creator: impl Into<String>,
        timestamp: impl Into<String>,
    ) -> Self {
        Self {
            tag_type: tag_type.into(),
            creator: creator.into(),
            timestamp: timestamp.into(),
            body: Vec::new(),
        }
    }

    pub fn with_body(mut self, body: Vec<String>) -> Self {
        self.body = body;
        self
    }
}

/// A tag on a range of a contig's gapped consensus.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConsensusTag {
    pub contig_id: String,
    pub tag_type: String,
    pub creator: String,
    pub range: Range,
    pub timestamp: String,
    pub transient: bool,
    /// Free-form data lines between the header and any comment block.
    pub data: Vec<String>,
    /// Lines of the nested `COMMENT{ ... C}` block.
    pub comments: Vec<String>,
}

impl ConsensusTag {
    pub fn new(
        contig_id: impl Into<String>,
        tag_type: impl Into<String>,
        creator: impl Into<String>,
        range: Range,
        timestamp: impl Into<String>,
    ) -> Self {
        Self {
            contig_id: contig_id.into(),
            tag_type: tag_type.into(),
            creator: creator.into(),
            range,
            timestamp: timestamp.into(),
            transient: false,
            data: Vec::new(),
            comments: Vec::new(),
        }
    }

    pub fn transient(mut self, transient: bool) -> Self {
        self.transient = transient;
        self
    }

    pub fn with_data(mut self, data: Vec<String>) -> Self {
        self.data = data;
        self
    }

    pub fn with_comments(mut self, comments: Vec<String>) -> Self {
        self.comments = comments;
        self
    }
}

/// A tag on a range of one read's gapped bases.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadTag {
    pub read_id: String,
    pub tag_type: String,
    pub creator: String,
    pub range: Range,
    pub timestamp: String,
    pub transient: bool,
}

impl ReadTag {
    pub fn new(
        read_id: impl Into<String>,
        tag_type: impl Into<String>,
        creator: impl Into<String>,
        range: Range,
        timestamp: impl Into<String>,
    ) -> Self {
        Self {
            read_id: read_id.into(),
            tag_type: tag_type.into(),
            creator: creator.into(),
            range,
            timestamp: timestamp.into(),
            transient: false,
        }
    }

    pub fn transient(mut self, transient: bool) -> Self {
        self.transient = transient;
        self
    }
}
