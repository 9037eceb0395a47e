//! Background-thread contig iteration.
//!
//! A worker thread runs the parser over the whole file and sends each built
//! contig through a bounded channel, blocking when the consumer falls
//! behind. A contig that cannot be built is sent as its error and the
//! worker moves on. Dropping the stream, or closing the store it came from, raises a
//! flag that every parser callback checks, so the worker halts at the next
//! record.

use super::scan::{build_contig, ScanOptions};
use crate::config::STREAM_QUEUE_CAPACITY;
use crate::contig::{Contig, ContigBuilderVisitor, ReadBuilderVisitor};
use crate::error::{AceError, Result};
use crate::parser::{
    AceParser, AceVisitor, AlignedReadInfo, ByteSpan, ContigHeader, ContigVisitor, Flow, Visit,
};
use crate::range::Range;
use crate::tags::{ConsensusTag, ReadTag, WholeAssemblyTag};
use crossbeam_channel::{bounded, Receiver, Sender};
use log::trace;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

/// Cancellation flags observed by the worker.
#[derive(Clone)]
struct Cancel {
    stream: Arc<AtomicBool>,
    store: Arc<AtomicBool>,
}

impl Cancel {
    #[inline]
    fn is_set(&self) -> bool {
        self.stream.load(Ordering::Acquire) || self.store.load(Ordering::Acquire)
    }

    #[inline]
    fn flow(&self) -> Flow {
        if self.is_set() {
            Flow::Halt
        } else {
            Flow::Continue
        }
    }
}

/// Wraps a contig visitor so that every callback can halt the parse.
struct CancellableContig {
    inner: ContigBuilderVisitor,
    cancel: Cancel,
}

impl CancellableContig {
    fn then(&self, flow: Flow) -> Flow {
        match flow {
            Flow::Continue => self.cancel.flow(),
            Flow::Halt => Flow::Halt,
        }
    }
}

impl ContigVisitor for CancellableContig {
    type Read = ReadBuilderVisitor;

    fn visit_bases_line(&mut self, bases: &[u8]) -> Result<Flow> {
        let flow = self.inner.visit_bases_line(bases)?;
        Ok(self.then(flow))
    }

    fn visit_consensus_qualities(&mut self, qualities: Vec<u8>) -> Result<Flow> {
        let flow = self.inner.visit_consensus_qualities(qualities)?;
        Ok(self.then(flow))
    }

    fn visit_aligned_read_info(&mut self, info: AlignedReadInfo) -> Result<Flow> {
        let flow = self.inner.visit_aligned_read_info(info)?;
        Ok(self.then(flow))
    }

    fn visit_base_segment(&mut self, range: Range, read_id: &str) -> Result<Flow> {
        let flow = self.inner.visit_base_segment(range, read_id)?;
        Ok(self.then(flow))
    }

    fn visit_read(&mut self, read_id: &str, gapped_length: usize) -> Result<Visit<ReadBuilderVisitor>> {
        if self.cancel.is_set() {
            return Ok(Visit::Halt);
        }
        self.inner.visit_read(read_id, gapped_length)
    }

    fn visit_read_end(&mut self, read: ReadBuilderVisitor) -> Result<Flow> {
        let flow = self.inner.visit_read_end(read)?;
        Ok(self.then(flow))
    }
}

/// Top-level visitor of the worker thread.
struct StreamVisitor {
    options: ScanOptions,
    sender: Sender<Result<Contig>>,
    cancel: Cancel,
}

impl AceVisitor for StreamVisitor {
    type Contig = CancellableContig;

    fn visit_header(&mut self, _num_contigs: usize, _total_reads: usize) -> Result<Flow> {
        Ok(self.cancel.flow())
    }

    fn visit_contig(&mut self, header: &ContigHeader) -> Result<Visit<CancellableContig>> {
        if self.cancel.is_set() {
            return Ok(Visit::Halt);
        }
        if !self.options.includes(&header.id) {
            return Ok(Visit::Skip);
        }
        Ok(Visit::Descend(CancellableContig {
            inner: self.options.contig_visitor(header),
            cancel: self.cancel.clone(),
        }))
    }

    fn visit_contig_end(&mut self, contig: CancellableContig, _span: ByteSpan) -> Result<Flow> {
        if self.cancel.is_set() {
            return Ok(Flow::Halt);
        }
        let built = match build_contig(contig.inner) {
            Err(e) if !e.is_contig_local() => return Err(e),
            built => built,
        };
        // a send error means the receiver is gone
        if self.sender.send(built).is_err() {
            return Ok(Flow::Halt);
        }
        Ok(self.cancel.flow())
    }

    fn visit_read_tag(&mut self, _tag: ReadTag) -> Result<Flow> {
        Ok(self.cancel.flow())
    }

    fn visit_consensus_tag(&mut self, _tag: ConsensusTag) -> Result<Flow> {
        Ok(self.cancel.flow())
    }

    fn visit_whole_assembly_tag(&mut self, _tag: WholeAssemblyTag) -> Result<Flow> {
        Ok(self.cancel.flow())
    }

    fn halted(&mut self) {
        trace!("contig stream halted");
    }
}

/// Contigs of a file, produced by a background parser thread.
pub struct ContigStream {
    receiver: Option<Receiver<Result<Contig>>>,
    cancel: Arc<AtomicBool>,
    worker: Option<JoinHandle<()>>,
}

impl ContigStream {
    /// Start parsing `path` on a new thread. `store_closed` is the owning
    /// store's close flag.
    pub(crate) fn spawn(path: PathBuf, options: ScanOptions, store_closed: Arc<AtomicBool>) -> Self {
        let (sender, receiver) = bounded(STREAM_QUEUE_CAPACITY);
        let cancel = Arc::new(AtomicBool::new(false));
        let flags = Cancel {
            stream: Arc::clone(&cancel),
            store: store_closed,
        };

        let worker = thread::spawn(move || {
            let error_sender = sender.clone();
            let mut visitor = StreamVisitor {
                options,
                sender,
                cancel: flags,
            };
            let outcome = AceParser::from_path(&path).and_then(|parser| parser.accept(&mut visitor));
            if let Err(e) = outcome {
                // the consumer may already be gone
                let _ = error_sender.send(Err(e));
            }
        });

        Self {
            receiver: Some(receiver),
            cancel,
            worker: Some(worker),
        }
    }

    /// Stop the worker and release the channel.
    pub fn cancel(&mut self) {
        self.cancel.store(true, Ordering::Release);
        self.receiver.take();
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
    }

    /// Block for the next contig. `None` once the worker has finished.
    pub fn recv(&mut self) -> Option<Result<Contig>> {
        let receiver = self.receiver.as_ref()?;
        match receiver.recv() {
            Ok(item) => Some(item),
            Err(_) => {
                self.receiver.take();
                let panicked = self
                    .worker
                    .take()
                    .map(|worker| worker.join().is_err())
                    .unwrap_or(false);
                panicked.then_some(Err(AceError::WorkerPanicked))
            }
        }
    }
}

impl Iterator for ContigStream {
    type Item = Result<Contig>;

    fn next(&mut self) -> Option<Self::Item> {
        self.recv()
    }
}

impl Drop for ContigStream {
    fn drop(&mut self) {
        self.cancel();
    }
}
