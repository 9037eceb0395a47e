//! Links to a read's original base and quality data.
//!
//! The ACE file only names where the data lives (`DS` line). The data itself
//! is supplied by the caller through [`PhdLookup`].

use rustc_hash::FxHashMap;
use std::collections::HashMap;

/// The `DS` line of a read: trace name, phd file name and phd timestamp.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct PhdInfo {
    pub trace_name: String,
    pub phd_name: String,
    /// Human-readable timestamp, e.g. `Thu Jun 10 14:56:28 2004`.
    pub date: String,
}

impl PhdInfo {
    pub fn new(
        trace_name: impl Into<String>,
        phd_name: impl Into<String>,
        date: impl Into<String>,
    ) -> Self {
        Self {
            trace_name: trace_name.into(),
            phd_name: phd_name.into(),
            date: date.into(),
        }
    }
}

/// Original full-length basecalls and qualities of a read, in the read's
/// native (uncomplemented) orientation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PhdRecord {
    pub sequence: Vec<u8>,
    pub qualities: Vec<u8>,
}

impl PhdRecord {
    pub fn new(sequence: impl Into<Vec<u8>>, qualities: impl Into<Vec<u8>>) -> Self {
        Self {
            sequence: sequence.into(),
            qualities: qualities.into(),
        }
    }

    /// A record where every base has the same quality.
    pub fn with_uniform_quality(sequence: impl Into<Vec<u8>>, quality: u8) -> Self {
        let sequence = sequence.into();
        let qualities = vec![quality; sequence.len()];
        Self {
            sequence,
            qualities,
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.sequence.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.sequence.is_empty()
    }
}

/// Lookup of original read data by read id.
pub trait PhdLookup {
    fn get(&self, read_id: &str) -> Option<PhdRecord>;
}

impl PhdLookup for FxHashMap<String, PhdRecord> {
    fn get(&self, read_id: &str) -> Option<PhdRecord> {
        HashMap::get(self, read_id).cloned()
    }
}

impl PhdLookup for HashMap<String, PhdRecord> {
    fn get(&self, read_id: &str) -> Option<PhdRecord> {
        HashMap::get(self, read_id).cloned()
    }
}
