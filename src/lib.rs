// Clippy allows for the whole crate
#![allow(clippy::too_many_arguments)]
#![allow(clippy::type_complexity)]

//! ACE genome-assembly toolkit
//!
//! Reads and writes ACE files: consensus sequences, the reads aligned to
//! them, and the tags curators attach to both.
//!
//! # Features
//!
//! - **Streaming parser**: a visitor-driven line dispatcher that can skip,
//!   halt, and resume at any contig
//! - **Contig model**: immutable contigs with a builder for gap edits,
//!   reabacus, read shifts and splits
//! - **Random access**: in-memory, indexed (memory mapped) and rescanning
//!   stores behind one trait
//! - **Derived data**: best-segment tiling and phd-based consensus qualities,
//!   written back out by [`writer::AceWriter`]
//!
//! # Example
//!
//! ```rust,no_run
//! use ace_assembly::prelude::*;
//!
//! let store = AceStoreBuilder::new("assembly.ace").build()?;
//! let contig = store.get("Contig1")?.expect("present");
//! for segment in compute_best_segments(&contig).iter() {
//!     println!("{} {}", segment.range, segment.read_id);
//! }
//!
//! let mut writer = AceWriter::new(std::fs::File::create("copy.ace")?)?;
//! for contig in store.iter()? {
//!     writer.write_contig(&*contig?, None)?;
//! }
//! writer.finish()?;
//! # Ok::<(), ace_assembly::error::AceError>(())
//! ```

pub mod best_segment;
pub mod config;
pub mod consensus_quality;
pub mod contig;
pub mod error;
pub mod parser;
pub mod phd;
pub mod range;
pub mod sequence;
pub mod store;
pub mod tags;
pub mod writer;

#[cfg(test)]
mod test_support;

// Re-export commonly used types
pub use contig::{AssembledRead, Contig, ContigBuilder, ReadBuilder};
pub use error::{AceError, Result};
pub use range::Range;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::best_segment::{compute_best_segments, BaseSegment, BestSegments};
    pub use crate::consensus_quality::compute_consensus_qualities;
    pub use crate::contig::{AssembledRead, Contig, ContigBuilder, DropHook, DroppedRead, ReadBuilder};
    pub use crate::error::{AceError, Result};
    pub use crate::parser::{AceParser, AceVisitor, ContigVisitor, Flow, ReadVisitor, Visit};
    pub use crate::phd::{PhdLookup, PhdRecord};
    pub use crate::range::{CoordinateSystem, Range};
    pub use crate::sequence::{Direction, GappedSequence};
    pub use crate::store::{AceFileStore, AceStore, AceStoreBuilder, StoreHint};
    pub use crate::tags::{ConsensusTag, ReadTag, WholeAssemblyTag};
    pub use crate::writer::{AceWriter, WriterOptions};
}

#[cfg(test)]
mod tests {
    use crate::prelude::*;
    use crate::test_support::SAMPLE_ACE;

    #[test]
    fn test_edit_and_rewrite_workflow() {
        let file = crate::test_support::write_temp(SAMPLE_ACE);
        let store = AceStoreBuilder::new(file.path())
            .hint(StoreHint::InMemory)
            .build()
            .unwrap();
        let contig = store.get("Contig1").unwrap().unwrap();

        let mut edit = ContigBuilder::from_contig(&contig);
        edit.insert_gap(4).unwrap();
        let edited = edit.build().unwrap();
        assert_eq!(edited.consensus().to_string(), "ACGT*ACGT");

        let mut writer = AceWriter::new(Vec::new()).unwrap();
        writer.write_contig(&edited, None).unwrap();
        let text = String::from_utf8(writer.finish().unwrap()).unwrap();
        assert!(text.starts_with("AS 1 2\n\nCO Contig1 9 2 0 U\nACGT*ACGT\n"));
    }

    #[test]
    fn test_best_segments_of_sample() {
        let file = crate::test_support::write_temp(SAMPLE_ACE);
        let store = AceStoreBuilder::new(file.path()).build().unwrap();
        let contig = store.get("Contig2").unwrap().unwrap();
        let segments = compute_best_segments(&contig);
        assert_eq!(segments.len(), 1);
        assert_eq!(segments.segments[0].range, Range::new(0, 3));
    }
}
