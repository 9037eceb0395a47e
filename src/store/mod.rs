//! Random access to the contigs of an ACE file.
//!
//! Three strategies trade memory for latency behind one [`AceStore`]
//! contract:
//!
//! - [`InMemoryStore`]: parses once and keeps every contig.
//! - [`IndexedStore`]: records the byte span of each contig and re-parses
//!   just that span on `get`, through a memory map or ranged reads.
//! - [`RescanStore`]: keeps nothing; every `get` scans the file and `iter`
//!   streams contigs from a background thread.
//!
//! ```no_run
//! use ace_assembly::store::{AceStore, AceStoreBuilder, StoreHint};
//!
//! let store = AceStoreBuilder::new("assembly.ace")
//!     .hint(StoreHint::Indexed)
//!     .filter(|id| id != "Contig7")
//!     .build()?;
//! for contig in store.iter()? {
//!     let contig = contig?;
//!     println!("{} {}", contig.id(), contig.num_reads());
//! }
//! store.close();
//! # Ok::<(), ace_assembly::error::AceError>(())
//! ```

mod indexed;
mod memory;
mod rescan;
mod scan;
mod slice;
mod streaming;

pub use indexed::IndexedStore;
pub use memory::InMemoryStore;
pub use rescan::RescanStore;
pub use scan::ContigFilter;
pub use slice::SliceSource;
pub use streaming::ContigStream;

use crate::contig::{Contig, DropHook};
use crate::error::{AceError, Result};
use crate::tags::{ConsensusTag, ReadTag, WholeAssemblyTag};
use scan::ScanOptions;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Read access to the contigs and tags of one ACE file.
///
/// Every method fails with [`AceError::Closed`] after [`close`](Self::close).
/// Contigs excluded by the store's filter are absent from every method,
/// including the consensus tags that target them.
pub trait AceStore {
    fn get(&self, id: &str) -> Result<Option<Arc<Contig>>>;

    fn contains(&self, id: &str) -> Result<bool>;

    /// Contigs in file order.
    fn iter(&self) -> Result<StoreIter>;

    /// Contig ids in file order.
    fn ids(&self) -> Result<Vec<String>>;

    fn read_tags(&self) -> Result<Vec<ReadTag>>;

    fn consensus_tags(&self) -> Result<Vec<ConsensusTag>>;

    fn whole_assembly_tags(&self) -> Result<Vec<WholeAssemblyTag>>;

    /// Number of contigs.
    fn len(&self) -> Result<usize>;

    fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    /// Sum of the read counts declared by the contigs' `CO` lines.
    fn total_reads(&self) -> Result<usize>;

    /// Release resources. Idempotent.
    fn close(&self);

    fn is_closed(&self) -> bool;
}

/// State shared by all strategies.
pub(crate) struct StoreCore {
    path: PathBuf,
    options: ScanOptions,
    closed: Arc<AtomicBool>,
}

impl StoreCore {
    fn new(path: PathBuf, options: ScanOptions) -> Self {
        Self {
            path,
            options,
            closed: Arc::new(AtomicBool::new(false)),
        }
    }

    #[inline]
    fn ensure_open(&self) -> Result<()> {
        if self.is_closed() {
            Err(AceError::Closed)
        } else {
            Ok(())
        }
    }

    #[inline]
    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Mark closed; returns `true` on the first call.
    fn mark_closed(&self) -> bool {
        !self.closed.swap(true, Ordering::AcqRel)
    }
}

type Fetch = Box<dyn FnMut(&str) -> Result<Option<Arc<Contig>>> + Send>;

enum IterSource {
    Contigs(std::vec::IntoIter<Result<Arc<Contig>>>),
    Lookup {
        ids: std::vec::IntoIter<String>,
        fetch: Fetch,
    },
    Stream(ContigStream),
}

/// Iterator over a store's contigs.
///
/// Once it has returned `None` it keeps doing so, even after the store is
/// closed. An unfinished iterator yields `Err(Closed)` once the store is
/// closed, and `None` after that. A contig that cannot be built is yielded
/// as its error and iteration goes on; any other error ends it.
pub struct StoreIter {
    closed: Arc<AtomicBool>,
    source: IterSource,
    done: bool,
}

impl StoreIter {
    fn new(closed: Arc<AtomicBool>, source: IterSource) -> Self {
        Self {
            closed,
            source,
            done: false,
        }
    }

    fn finish(&mut self) {
        self.done = true;
        // drops any stream, stopping its worker
        self.source = IterSource::Contigs(Vec::new().into_iter());
    }
}

impl Iterator for StoreIter {
    type Item = Result<Arc<Contig>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        if self.closed.load(Ordering::Acquire) {
            self.finish();
            return Some(Err(AceError::Closed));
        }

        let item = match &mut self.source {
            IterSource::Contigs(contigs) => contigs.next(),
            IterSource::Lookup { ids, fetch } => loop {
                let Some(id) = ids.next() else {
                    break None;
                };
                match fetch(&id) {
                    Ok(Some(contig)) => break Some(Ok(contig)),
                    Ok(None) => continue,
                    Err(e) => break Some(Err(e)),
                }
            },
            IterSource::Stream(stream) => stream.recv().map(|r| r.map(Arc::new)),
        };

        match item {
            Some(Ok(contig)) => Some(Ok(contig)),
            Some(Err(e)) if e.is_contig_local() => Some(Err(e)),
            Some(Err(e)) => {
                self.finish();
                Some(Err(e))
            }
            // a stream cut short by close ends without an error of its own
            None if self.closed.load(Ordering::Acquire) => {
                self.finish();
                Some(Err(AceError::Closed))
            }
            None => {
                self.finish();
                None
            }
        }
    }
}

/// Which strategy [`AceStoreBuilder`] creates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StoreHint {
    InMemory,
    #[default]
    Indexed,
    Rescan,
}

/// Configures and opens an [`AceFileStore`].
pub struct AceStoreBuilder {
    path: PathBuf,
    hint: StoreHint,
    filter: Option<ContigFilter>,
    memory_map: Option<bool>,
    drop_hook: Option<Arc<dyn DropHook>>,
}

impl AceStoreBuilder {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            hint: StoreHint::default(),
            filter: None,
            memory_map: None,
            drop_hook: None,
        }
    }

    pub fn hint(mut self, hint: StoreHint) -> Self {
        self.hint = hint;
        self
    }

    /// Only contigs whose id passes `filter` are visible.
    pub fn filter<F>(mut self, filter: F) -> Self
    where
        F: Fn(&str) -> bool + Send + Sync + 'static,
    {
        self.filter = Some(Arc::new(filter));
        self
    }

    /// Override the global memory-map setting for an indexed store.
    pub fn memory_map(mut self, enabled: bool) -> Self {
        self.memory_map = Some(enabled);
        self
    }

    /// Receive the reads dropped while contigs are built.
    pub fn drop_hook<H: DropHook + 'static>(mut self, hook: H) -> Self {
        self.drop_hook = Some(Arc::new(hook));
        self
    }

    pub fn build(self) -> Result<AceFileStore> {
        let options = ScanOptions {
            filter: self.filter,
            drop_hook: self.drop_hook,
        };
        let core = StoreCore::new(self.path, options);
        Ok(match self.hint {
            StoreHint::InMemory => AceFileStore::InMemory(InMemoryStore::open(core)?),
            StoreHint::Indexed => AceFileStore::Indexed(IndexedStore::open(core, self.memory_map)?),
            StoreHint::Rescan => AceFileStore::Rescan(RescanStore::open(core)?),
        })
    }
}

/// A store of any strategy.
pub enum AceFileStore {
    InMemory(InMemoryStore),
    Indexed(IndexedStore),
    Rescan(RescanStore),
}

impl AceFileStore {
    fn inner(&self) -> &dyn AceStore {
        match self {
            AceFileStore::InMemory(s) => s,
            AceFileStore::Indexed(s) => s,
            AceFileStore::Rescan(s) => s,
        }
    }

    pub fn hint(&self) -> StoreHint {
        match self {
            AceFileStore::InMemory(_) => StoreHint::InMemory,
            AceFileStore::Indexed(_) => StoreHint::Indexed,
            AceFileStore::Rescan(_) => StoreHint::Rescan,
        }
    }
}

impl AceStore for AceFileStore {
    fn get(&self, id: &str) -> Result<Option<Arc<Contig>>> {
        self.inner().get(id)
    }

    fn contains(&self, id: &str) -> Result<bool> {
        self.inner().contains(id)
    }

    fn iter(&self) -> Result<StoreIter> {
        self.inner().iter()
    }

    fn ids(&self) -> Result<Vec<String>> {
        self.inner().ids()
    }

    fn read_tags(&self) -> Result<Vec<ReadTag>> {
        self.inner().read_tags()
    }

    fn consensus_tags(&self) -> Result<Vec<ConsensusTag>> {
        self.inner().consensus_tags()
    }

    fn whole_assembly_tags(&self) -> Result<Vec<WholeAssemblyTag>> {
        self.inner().whole_assembly_tags()
    }

    fn len(&self) -> Result<usize> {
        self.inner().len()
    }

    fn total_reads(&self) -> Result<usize> {
        self.inner().total_reads()
    }

    fn close(&self) {
        self.inner().close()
    }

    fn is_closed(&self) -> bool {
        self.inner().is_closed()
    }
}
