use super::scan::{ContigEntry, FindVisitor, IndexVisitor, TagSet};
use super::streaming::ContigStream;
use super::{AceStore, IterSource, StoreCore, StoreIter};
use crate::contig::Contig;
use crate::error::Result;
use crate::parser::AceParser;
use crate::tags::{ConsensusTag, ReadTag, WholeAssemblyTag};
use log::{debug, trace};
use rustc_hash::FxHashSet;
use std::sync::{Arc, Mutex, PoisonError};

/// Ids and declared read counts of the included contigs.
struct Summary {
    entries: Vec<ContigEntry>,
    ids: FxHashSet<String>,
}

/// Holds no contig data: every request re-reads the file.
///
/// The contig summary behind `ids`, `len` and `total_reads` is computed on
/// first use and kept until close.
pub struct RescanStore {
    core: StoreCore,
    summary: Mutex<Option<Arc<Summary>>>,
}

impl RescanStore {
    pub(crate) fn open(core: StoreCore) -> Result<Self> {
        // fail early on a missing file
        std::fs::metadata(&core.path)?;
        debug!("opened rescan store for {}", core.path.display());
        Ok(Self {
            core,
            summary: Mutex::new(None),
        })
    }

    fn scan_headers(&self) -> Result<IndexVisitor> {
        let mut visitor = IndexVisitor::new(self.core.options.clone(), false);
        AceParser::from_path(&self.core.path)?.accept(&mut visitor)?;
        Ok(visitor)
    }

    fn summary(&self) -> Result<Arc<Summary>> {
        self.core.ensure_open()?;
        let mut cached = self.summary.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(summary) = cached.as_ref() {
            return Ok(Arc::clone(summary));
        }
        let entries = self.scan_headers()?.entries;
        let ids = entries.iter().map(|e| e.id.clone()).collect();
        let summary = Arc::new(Summary { entries, ids });
        *cached = Some(Arc::clone(&summary));
        Ok(summary)
    }

    fn tags(&self) -> Result<TagSet> {
        self.core.ensure_open()?;
        Ok(self.scan_headers()?.tags)
    }

    fn cached_summary(&self) -> Option<Arc<Summary>> {
        self.summary
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl AceStore for RescanStore {
    fn get(&self, id: &str) -> Result<Option<Arc<Contig>>> {
        self.core.ensure_open()?;
        if let Some(summary) = self.cached_summary() {
            if !summary.ids.contains(id) {
                return Ok(None);
            }
        }
        trace!("scanning {} for {}", self.core.path.display(), id);
        let mut find = FindVisitor::new(&self.core.options, id);
        AceParser::from_path(&self.core.path)?.accept(&mut find)?;
        Ok(find.found.map(Arc::new))
    }

    fn contains(&self, id: &str) -> Result<bool> {
        Ok(self.summary()?.ids.contains(id))
    }

    fn iter(&self) -> Result<StoreIter> {
        self.core.ensure_open()?;
        let stream = ContigStream::spawn(
            self.core.path.clone(),
            self.core.options.clone(),
            Arc::clone(&self.core.closed),
        );
        Ok(StoreIter::new(Arc::clone(&self.core.closed), IterSource::Stream(stream)))
    }

    fn ids(&self) -> Result<Vec<String>> {
        Ok(self.summary()?.entries.iter().map(|e| e.id.clone()).collect())
    }

    fn read_tags(&self) -> Result<Vec<ReadTag>> {
        Ok(self.tags()?.read)
    }

    fn consensus_tags(&self) -> Result<Vec<ConsensusTag>> {
        Ok(self.tags()?.consensus)
    }

    fn whole_assembly_tags(&self) -> Result<Vec<WholeAssemblyTag>> {
        Ok(self.tags()?.whole_assembly)
    }

    fn len(&self) -> Result<usize> {
        Ok(self.summary()?.entries.len())
    }

    fn total_reads(&self) -> Result<usize> {
        Ok(self.summary()?.entries.iter().map(|e| e.num_reads).sum())
    }

    fn close(&self) {
        if self.core.mark_closed() {
            self.summary.lock().unwrap_or_else(PoisonError::into_inner).take();
            debug!("closed rescan store for {}", self.core.path.display());
        }
    }

    fn is_closed(&self) -> bool {
        self.core.is_closed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AceError;
    use crate::store::scan::ScanOptions;
    use crate::test_support::{write_temp, SAMPLE_ACE};

    #[test]
    fn test_missing_file_fails_on_open() {
        let core = StoreCore::new("/nonexistent/assembly.ace".into(), ScanOptions::default());
        assert!(matches!(RescanStore::open(core), Err(AceError::Io(_))));
    }

    #[test]
    fn test_reads_current_file_contents() {
        let file = write_temp(SAMPLE_ACE);
        let store = RescanStore::open(StoreCore::new(file.path().to_path_buf(), ScanOptions::default())).unwrap();
        assert_eq!(store.get("Contig2").unwrap().unwrap().num_reads(), 1);

        std::fs::write(file.path(), SAMPLE_ACE.replace("Contig2", "Contig9")).unwrap();
        assert!(store.get("Contig2").unwrap().is_none());
        assert!(store.get("Contig9").unwrap().is_some());
    }

    #[test]
    fn test_iter_streams_in_file_order() {
        let file = write_temp(SAMPLE_ACE);
        let store = RescanStore::open(StoreCore::new(file.path().to_path_buf(), ScanOptions::default())).unwrap();
        let ids: Vec<String> = store
            .iter()
            .unwrap()
            .map(|c| c.unwrap().id().to_string())
            .collect();
        assert_eq!(ids, vec!["Contig1", "Contig2"]);
    }
}
