use super::scan::{ContigEntry, FindVisitor, IndexVisitor, ScanOptions, TagSet};
use super::slice::SliceSource;
use super::{AceStore, IterSource, StoreCore, StoreIter};
use crate::contig::Contig;
use crate::error::{AceError, Result};
use crate::parser::AceParser;
use crate::tags::{ConsensusTag, ReadTag, WholeAssemblyTag};
use log::debug;
use rustc_hash::FxHashMap;
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Instant;

/// Byte spans of the included contigs, in file order.
struct Index {
    entries: Vec<ContigEntry>,
    by_id: FxHashMap<String, usize>,
    tags: TagSet,
}

impl Index {
    fn entry(&self, id: &str) -> Option<&ContigEntry> {
        self.by_id.get(id).map(|&i| &self.entries[i])
    }
}

type SharedSource = Arc<RwLock<Option<SliceSource>>>;

/// Indexes contig byte spans once, then re-parses a single span per `get`.
///
/// Each `get` builds a fresh contig; nothing is cached.
pub struct IndexedStore {
    core: StoreCore,
    index: Arc<Index>,
    source: SharedSource,
}

impl IndexedStore {
    pub(crate) fn open(core: StoreCore, memory_map: Option<bool>) -> Result<Self> {
        let started = Instant::now();
        let mut visitor = IndexVisitor::new(core.options.clone(), true);
        AceParser::from_path(&core.path)?.accept(&mut visitor)?;

        let by_id = visitor
            .entries
            .iter()
            .enumerate()
            .map(|(i, e)| (e.id.clone(), i))
            .collect();
        let source = SliceSource::open(&core.path, memory_map)?;
        debug!(
            "indexed {} contigs of {} in {:.2?} (mapped: {})",
            visitor.entries.len(),
            core.path.display(),
            started.elapsed(),
            source.is_mapped()
        );

        Ok(Self {
            core,
            index: Arc::new(Index {
                entries: visitor.entries,
                by_id,
                tags: visitor.tags,
            }),
            source: Arc::new(RwLock::new(Some(source))),
        })
    }

    /// Whether contig spans are served from a memory map.
    pub fn is_memory_mapped(&self) -> bool {
        self.source
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .is_some_and(SliceSource::is_mapped)
    }
}

fn load(source: &SharedSource, options: &ScanOptions, entry: &ContigEntry) -> Result<Arc<Contig>> {
    let guard = source.read().unwrap_or_else(PoisonError::into_inner);
    let source = guard.as_ref().ok_or(AceError::Closed)?;
    let span = entry
        .span
        .ok_or_else(|| AceError::InvalidRange(format!("no byte span recorded for {}", entry.id)))?;
    let bytes = source.read_span(span)?;

    let mut find = FindVisitor::new(options, &entry.id);
    AceParser::with_offset(&bytes[..], span.start).accept(&mut find)?;
    find.found.map(Arc::new).ok_or_else(|| {
        AceError::InvalidRange(format!(
            "contig {} not found at bytes {}..={}; file changed since indexing?",
            entry.id, span.start, span.end
        ))
    })
}

impl AceStore for IndexedStore {
    fn get(&self, id: &str) -> Result<Option<Arc<Contig>>> {
        self.core.ensure_open()?;
        match self.index.entry(id) {
            Some(entry) => load(&self.source, &self.core.options, entry).map(Some),
            None => Ok(None),
        }
    }

    fn contains(&self, id: &str) -> Result<bool> {
        self.core.ensure_open()?;
        Ok(self.index.by_id.contains_key(id))
    }

    fn iter(&self) -> Result<StoreIter> {
        let ids = self.ids()?;
        let index = Arc::clone(&self.index);
        let source = Arc::clone(&self.source);
        let options = self.core.options.clone();
        let fetch = move |id: &str| match index.entry(id) {
            Some(entry) => load(&source, &options, entry).map(Some),
            None => Ok(None),
        };
        Ok(StoreIter::new(
            Arc::clone(&self.core.closed),
            IterSource::Lookup {
                ids: ids.into_iter(),
                fetch: Box::new(fetch),
            },
        ))
    }

    fn ids(&self) -> Result<Vec<String>> {
        self.core.ensure_open()?;
        Ok(self.index.entries.iter().map(|e| e.id.clone()).collect())
    }

    fn read_tags(&self) -> Result<Vec<ReadTag>> {
        self.core.ensure_open()?;
        Ok(self.index.tags.read.clone())
    }

    fn consensus_tags(&self) -> Result<Vec<ConsensusTag>> {
        self.core.ensure_open()?;
        Ok(self.index.tags.consensus.clone())
    }

    fn whole_assembly_tags(&self) -> Result<Vec<WholeAssemblyTag>> {
        self.core.ensure_open()?;
        Ok(self.index.tags.whole_assembly.clone())
    }

    fn len(&self) -> Result<usize> {
        self.core.ensure_open()?;
        Ok(self.index.entries.len())
    }

    fn total_reads(&self) -> Result<usize> {
        self.core.ensure_open()?;
        Ok(self.index.entries.iter().map(|e| e.num_reads).sum())
    }

    fn close(&self) {
        if self.core.mark_closed() {
            self.source.write().unwrap_or_else(PoisonError::into_inner).take();
            debug!("closed indexed store for {}", self.core.path.display());
        }
    }

    fn is_closed(&self) -> bool {
        self.core.is_closed()
    }
}
