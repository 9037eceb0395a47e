//! Error types shared by the parser, contig model, stores and writer.

use std::io;
use thiserror::Error;

/// Errors that can occur while reading, editing or writing ACE data.
#[derive(Error, Debug)]
pub enum AceError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("Parse error at line {line}: {message} ('{text}')")]
    Parse {
        line: usize,
        text: String,
        message: String,
    },

    #[error("Invalid gap character '-' in basecalls at line {line} ('{text}'); ACE gaps are '*'")]
    InvalidGapCharacter { line: usize, text: String },

    #[error("Invalid base '{base}' in basecalls at line {line} ('{text}')")]
    InvalidBase { line: usize, text: String, base: char },

    #[error("Contig {contig_id}: no reads remain after trimming")]
    NoReads { contig_id: String },

    #[error("Contig {contig_id}: {message}")]
    Build { contig_id: String, message: String },

    #[error("Contig {contig_id}: invalid split: {message}")]
    InvalidSplit { contig_id: String, message: String },

    #[error("Read {0} is already present in the contig")]
    DuplicateRead(String),

    #[error("Read {0} is not part of the contig")]
    UnknownRead(String),

    #[error("Reabacus of read {read_id} changes its ungapped bases: expected {expected}, got {actual}")]
    ReabacusMismatch {
        read_id: String,
        expected: String,
        actual: String,
    },

    #[error("Invalid edit: {0}")]
    InvalidEdit(String),

    #[error("Invalid range: {0}")]
    InvalidRange(String),

    #[error("Declared {what} count {declared} does not match {actual} written")]
    CountMismatch {
        what: &'static str,
        declared: usize,
        actual: usize,
    },

    #[error("Data store is closed")]
    Closed,

    #[error("Background parser thread panicked")]
    WorkerPanicked,
}

pub type Result<T> = std::result::Result<T, AceError>;

impl AceError {
    /// Build a parse error for the given line.
    pub(crate) fn parse(line: usize, text: &[u8], message: impl Into<String>) -> Self {
        AceError::Parse {
            line,
            text: String::from_utf8_lossy(text).into_owned(),
            message: message.into(),
        }
    }

    /// Whether the error concerns one contig only. Stores report such errors
    /// for that contig and keep serving the rest of the file.
    pub fn is_contig_local(&self) -> bool {
        matches!(
            self,
            AceError::NoReads { .. }
                | AceError::Build { .. }
                | AceError::InvalidSplit { .. }
                | AceError::DuplicateRead(_)
        )
    }

    /// A copy of this error; I/O errors keep their kind and message.
    pub(crate) fn duplicate(&self) -> Self {
        match self {
            AceError::Io(e) => AceError::Io(io::Error::new(e.kind(), e.to_string())),
            AceError::Parse { line, text, message } => AceError::Parse {
                line: *line,
                text: text.clone(),
                message: message.clone(),
            },
            AceError::InvalidGapCharacter { line, text } => AceError::InvalidGapCharacter {
                line: *line,
                text: text.clone(),
            },
            AceError::InvalidBase { line, text, base } => AceError::InvalidBase {
                line: *line,
                text: text.clone(),
                base: *base,
            },
            AceError::NoReads { contig_id } => AceError::NoReads {
                contig_id: contig_id.clone(),
            },
            AceError::Build { contig_id, message } => AceError::Build {
                contig_id: contig_id.clone(),
                message: message.clone(),
            },
            AceError::InvalidSplit { contig_id, message } => AceError::InvalidSplit {
                contig_id: contig_id.clone(),
                message: message.clone(),
            },
            AceError::DuplicateRead(id) => AceError::DuplicateRead(id.clone()),
            AceError::UnknownRead(id) => AceError::UnknownRead(id.clone()),
            AceError::ReabacusMismatch {
                read_id,
                expected,
                actual,
            } => AceError::ReabacusMismatch {
                read_id: read_id.clone(),
                expected: expected.clone(),
                actual: actual.clone(),
            },
            AceError::InvalidEdit(m) => AceError::InvalidEdit(m.clone()),
            AceError::InvalidRange(m) => AceError::InvalidRange(m.clone()),
            AceError::CountMismatch {
                what,
                declared,
                actual,
            } => AceError::CountMismatch {
                what: *what,
                declared: *declared,
                actual: *actual,
            },
            AceError::Closed => AceError::Closed,
            AceError::WorkerPanicked => AceError::WorkerPanicked,
        }
    }
}
