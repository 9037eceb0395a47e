//! Byte-range access to an ACE file.
//!
//! Large files are memory mapped when enabled; otherwise each request
//! opens the file and reads just the requested span.

use crate::config::should_memory_map;
use crate::error::{AceError, Result};
use crate::parser::ByteSpan;
use memmap2::Mmap;
use std::borrow::Cow;
use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};

/// Resolves [`ByteSpan`]s of one file to bytes.
pub enum SliceSource {
    Mapped { path: PathBuf, map: Mmap },
    Direct { path: PathBuf },
}

impl SliceSource {
    /// Open `path`. `memory_map` overrides the global setting; files below
    /// [`MMAP_THRESHOLD`](crate::config::MMAP_THRESHOLD) are never mapped.
    pub fn open<P: AsRef<Path>>(path: P, memory_map: Option<bool>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = File::open(&path)?;
        let len = file.metadata()?.len();
        if should_memory_map(memory_map, len) {
            // Safety: read-only map owned by the store; the file must not be
            // truncated while the store is open.
            let map = unsafe { Mmap::map(&file)? };
            Ok(SliceSource::Mapped { path, map })
        } else {
            Ok(SliceSource::Direct { path })
        }
    }

    pub fn path(&self) -> &Path {
        match self {
            SliceSource::Mapped { path, .. } | SliceSource::Direct { path } => path,
        }
    }

    pub fn is_mapped(&self) -> bool {
        matches!(self, SliceSource::Mapped { .. })
    }

    /// The bytes of `span` (inclusive).
    pub fn read_span(&self, span: ByteSpan) -> Result<Cow<'_, [u8]>> {
        let start = span.start as usize;
        let len = span.len() as usize;
        match self {
            SliceSource::Mapped { map, .. } => map
                .get(start..start + len)
                .map(Cow::Borrowed)
                .ok_or_else(|| out_of_bounds(span, map.len() as u64)),
            SliceSource::Direct { path } => {
                let mut file = File::open(path)?;
                let file_len = file.metadata()?.len();
                if span.end >= file_len {
                    return Err(out_of_bounds(span, file_len));
                }
                file.seek(SeekFrom::Start(span.start))?;
                let mut buf = vec![0u8; len];
                file.read_exact(&mut buf)?;
                Ok(Cow::Owned(buf))
            }
        }
    }
}

fn out_of_bounds(span: ByteSpan, file_len: u64) -> AceError {
    AceError::InvalidRange(format!(
        "byte span {}..={} beyond file length {}",
        span.start, span.end, file_len
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MMAP_THRESHOLD;
    use crate::test_support::write_temp;

    #[test]
    fn test_direct_and_mapped_agree() {
        let mut content = String::from("header\n");
        while (content.len() as u64) < MMAP_THRESHOLD {
            content.push_str("ACGTACGTACGTACGTACGTACGTACGTACGTACGTACGTACGTACGTAC\n");
        }
        let file = write_temp(&content);
        let span = ByteSpan { start: 7, end: 16 };

        let direct = SliceSource::open(file.path(), Some(false)).unwrap();
        let mapped = SliceSource::open(file.path(), Some(true)).unwrap();
        assert!(!direct.is_mapped());
        assert!(mapped.is_mapped());
        assert_eq!(direct.read_span(span).unwrap(), mapped.read_span(span).unwrap());
        assert_eq!(&direct.read_span(span).unwrap()[..], b"ACGTACGTAC");
    }

    #[test]
    fn test_small_files_not_mapped() {
        let file = write_temp("tiny\n");
        let source = SliceSource::open(file.path(), Some(true)).unwrap();
        assert!(!source.is_mapped());
        assert!(source.read_span(ByteSpan { start: 0, end: 10 }).is_err());
    }
}
