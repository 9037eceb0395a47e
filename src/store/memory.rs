use super::scan::{LoadVisitor, TagSet};
use super::{AceStore, IterSource, StoreCore, StoreIter};
use crate::contig::Contig;
use crate::error::{AceError, Result};
use crate::parser::AceParser;
use crate::tags::{ConsensusTag, ReadTag, WholeAssemblyTag};
use log::debug;
use rustc_hash::FxHashMap;
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Instant;

struct Loaded {
    /// Ids in file order, parallel to `contigs`.
    ids: Vec<String>,
    contigs: Vec<Result<Arc<Contig>>>,
    by_id: FxHashMap<String, usize>,
    total_reads: usize,
    tags: TagSet,
}

/// Parses the whole file up front and serves every request from memory.
///
/// A contig that cannot be built is kept as its error: `get` and `iter`
/// report it while the other contigs stay available.
pub struct InMemoryStore {
    core: StoreCore,
    data: RwLock<Option<Loaded>>,
}

impl InMemoryStore {
    pub(crate) fn open(core: StoreCore) -> Result<Self> {
        let started = Instant::now();
        let mut visitor = LoadVisitor::new(core.options.clone());
        AceParser::from_path(&core.path)?.accept(&mut visitor)?;

        let total_reads = visitor.entries.iter().map(|e| e.num_reads).sum();
        let ids: Vec<String> = visitor.entries.into_iter().map(|e| e.id).collect();
        let by_id = ids.iter().enumerate().map(|(i, id)| (id.clone(), i)).collect();
        debug!(
            "loaded {} contigs from {} in {:.2?}",
            visitor.contigs.len(),
            core.path.display(),
            started.elapsed()
        );

        Ok(Self {
            core,
            data: RwLock::new(Some(Loaded {
                ids,
                contigs: visitor.contigs,
                by_id,
                total_reads,
                tags: visitor.tags,
            })),
        })
    }

    fn with<T>(&self, f: impl FnOnce(&Loaded) -> T) -> Result<T> {
        self.core.ensure_open()?;
        let guard = self.data.read().unwrap_or_else(PoisonError::into_inner);
        guard.as_ref().map(f).ok_or(AceError::Closed)
    }
}

fn share(slot: &Result<Arc<Contig>>) -> Result<Arc<Contig>> {
    match slot {
        Ok(contig) => Ok(Arc::clone(contig)),
        Err(e) => Err(e.duplicate()),
    }
}

impl AceStore for InMemoryStore {
    fn get(&self, id: &str) -> Result<Option<Arc<Contig>>> {
        self.with(|d| d.by_id.get(id).map(|&i| share(&d.contigs[i])))?
            .transpose()
    }

    fn contains(&self, id: &str) -> Result<bool> {
        self.with(|d| d.by_id.contains_key(id))
    }

    fn iter(&self) -> Result<StoreIter> {
        let contigs: Vec<_> = self.with(|d| d.contigs.iter().map(share).collect())?;
        Ok(StoreIter::new(
            Arc::clone(&self.core.closed),
            IterSource::Contigs(contigs.into_iter()),
        ))
    }

    fn ids(&self) -> Result<Vec<String>> {
        self.with(|d| d.ids.clone())
    }

    fn read_tags(&self) -> Result<Vec<ReadTag>> {
        self.with(|d| d.tags.read.clone())
    }

    fn consensus_tags(&self) -> Result<Vec<ConsensusTag>> {
        self.with(|d| d.tags.consensus.clone())
    }

    fn whole_assembly_tags(&self) -> Result<Vec<WholeAssemblyTag>> {
        self.with(|d| d.tags.whole_assembly.clone())
    }

    fn len(&self) -> Result<usize> {
        self.with(|d| d.ids.len())
    }

    fn total_reads(&self) -> Result<usize> {
        self.with(|d| d.total_reads)
    }

    fn close(&self) {
        if self.core.mark_closed() {
            self.data.write().unwrap_or_else(PoisonError::into_inner).take();
            debug!("closed in-memory store for {}", self.core.path.display());
        }
    }

    fn is_closed(&self) -> bool {
        self.core.is_closed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::scan::ScanOptions;
    use crate::test_support::{write_temp, SAMPLE_ACE};

    #[test]
    fn test_contigs_shared_between_calls() {
        let file = write_temp(SAMPLE_ACE);
        let store = InMemoryStore::open(StoreCore::new(file.path().to_path_buf(), ScanOptions::default())).unwrap();
        let a = store.get("Contig2").unwrap().unwrap();
        let b = store.get("Contig2").unwrap().unwrap();
        assert!(Arc::ptr_eq(&a, &b));
    }

    #[test]
    fn test_held_contig_outlives_close() {
        let file = write_temp(SAMPLE_ACE);
        let store = InMemoryStore::open(StoreCore::new(file.path().to_path_buf(), ScanOptions::default())).unwrap();
        let contig = store.get("Contig1").unwrap().unwrap();
        store.close();
        assert_eq!(contig.num_reads(), 2);
        assert!(matches!(store.contains("Contig1"), Err(AceError::Closed)));
    }

    #[test]
    fn test_filtered_contig_absent() {
        let file = write_temp(SAMPLE_ACE);
        let options = ScanOptions {
            filter: Some(Arc::new(|id: &str| id == "Contig2")),
            drop_hook: None,
        };
        let store = InMemoryStore::open(StoreCore::new(file.path().to_path_buf(), options)).unwrap();
        assert_eq!(store.len().unwrap(), 1);
        assert_eq!(store.total_reads().unwrap(), 1);
        assert!(store.get("Contig1").unwrap().is_none());
        assert!(store.consensus_tags().unwrap().is_empty());
    }
}
