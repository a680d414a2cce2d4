//! # Parallel fetching
//!
//! Fans a batch of regions out over worker threads. Every worker opens its own
//! [`SequenceReader`] on a share of the same [`IndexMetadata`] and hands each
//! fetched sequence to its own clone of a [`FetchProcessor`].

use std::thread;

use auto_impl::auto_impl;
use log::debug;

use crate::error::{ReadError, Result};
use crate::metadata::IndexMetadata;
use crate::reader::SequenceReader;
use crate::region::Region;

/// Trait for types that consume fetched sequences
///
/// For parallel use the processor is cloned once per worker thread, so any
/// state shared between workers should live behind an `Arc`.
#[auto_impl(&mut, Box)]
pub trait FetchProcessor {
    /// Processes the residues fetched for one region
    fn process_sequence(&mut self, region: &Region, sequence: &[u8]) -> Result<()>;

    /// Called when a worker finishes its batch
    /// Default implementation does nothing
    fn on_batch_complete(&mut self) -> Result<()> {
        Ok(())
    }

    /// Set the thread ID for this processor
    ///
    /// Each worker calls this with its own unique ID before fetching.
    fn set_tid(&mut self, _tid: usize) {
        // Default implementation does nothing
    }

    /// Get the thread ID for this processor
    fn get_tid(&self) -> Option<usize> {
        None
    }
}

impl IndexMetadata {
    /// Fetches `regions` on `n_threads` worker threads
    ///
    /// Regions are split into contiguous chunks, one per thread, and processed in
    /// order within each chunk. Regions that resolve to nothing are skipped.
    /// Passing `0` threads uses one per available CPU.
    ///
    /// # Errors
    ///
    /// The first error raised by any worker, in thread order. A panicking worker
    /// is reported as [`ReadError::WorkerPanic`].
    ///
    /// # Examples
    ///
    /// ```rust,no_run
    /// use std::sync::atomic::{AtomicUsize, Ordering};
    /// use std::sync::Arc;
    /// use faigz::{FetchProcessor, Format, IndexMetadata, Region, Result};
    ///
    /// #[derive(Clone, Default)]
    /// struct GcCounter {
    ///     gc: Arc<AtomicUsize>,
    /// }
    /// impl FetchProcessor for GcCounter {
    ///     fn process_sequence(&mut self, _region: &Region, sequence: &[u8]) -> Result<()> {
    ///         let gc = sequence.iter().filter(|&&b| matches!(b, b'G' | b'C')).count();
    ///         self.gc.fetch_add(gc, Ordering::Relaxed);
    ///         Ok(())
    ///     }
    /// }
    ///
    /// let meta = IndexMetadata::acquire("genome.fa.gz", Format::Fasta, true).unwrap();
    /// let regions: Vec<Region> = meta.sequence_names().map(Region::whole).collect();
    /// let counter = GcCounter::default();
    /// meta.process_parallel(&regions, counter.clone(), 4).unwrap();
    /// println!("GC bases: {}", counter.gc.load(Ordering::Relaxed));
    /// ```
    pub fn process_parallel<P>(&self, regions: &[Region], processor: P, n_threads: usize) -> Result<()>
    where
        P: FetchProcessor + Clone + Send + 'static,
    {
        if regions.is_empty() {
            return Ok(());
        }
        let n_threads = if n_threads == 0 {
            num_cpus::get()
        } else {
            n_threads
        };
        let chunk_size = regions.len().div_ceil(n_threads);
        debug!(
            "Fetching {} regions on {} threads",
            regions.len(),
            regions.len().div_ceil(chunk_size)
        );

        let mut handles = Vec::new();
        for (tid, chunk) in regions.chunks(chunk_size).enumerate() {
            let meta = self.share();
            let chunk = chunk.to_vec();
            let mut proc = processor.clone();
            proc.set_tid(tid);

            let handle = thread::spawn(move || -> Result<()> {
                let mut reader = SequenceReader::open(&meta)?;
                reader.process_regions(&chunk, &mut proc)
            });
            handles.push((tid, handle));
        }

        // join everything before reporting
        let mut outcome = Ok(());
        for (tid, handle) in handles {
            let result = handle
                .join()
                .unwrap_or_else(|_| Err(ReadError::WorkerPanic(tid).into()));
            if outcome.is_ok() {
                outcome = result;
            }
        }
        outcome
    }
}

#[cfg(test)]
mod testing {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    use super::*;
    use crate::format::Format;

    const FASTA: &str = ">seq1\nAAAAAAAAAA\nCCCCCCCCCC\nGGGGGGGGGG\n>seq2\nTTTTT\n>seq3\nACGTACGT\n";

    #[derive(Clone, Default)]
    struct Collector {
        tid: Option<usize>,
        seen: Arc<Mutex<Vec<(String, Vec<u8>)>>>,
        batches: Arc<AtomicUsize>,
    }
    impl FetchProcessor for Collector {
        fn process_sequence(&mut self, region: &Region, sequence: &[u8]) -> Result<()> {
            self.seen
                .lock()
                .unwrap()
                .push((region.to_string(), sequence.to_vec()));
            Ok(())
        }

        fn on_batch_complete(&mut self) -> Result<()> {
            self.batches.fetch_add(1, Ordering::Relaxed);
            Ok(())
        }

        fn set_tid(&mut self, tid: usize) {
            self.tid = Some(tid);
        }

        fn get_tid(&self) -> Option<usize> {
            self.tid
        }
    }

    #[derive(Clone)]
    struct Failing;
    impl FetchProcessor for Failing {
        fn process_sequence(&mut self, region: &Region, _sequence: &[u8]) -> Result<()> {
            if region.name == "seq2" {
                return Err(anyhow::anyhow!("refusing {}", region.name).into());
            }
            Ok(())
        }
    }

    #[derive(Clone)]
    struct Panicking;
    impl FetchProcessor for Panicking {
        fn process_sequence(&mut self, _region: &Region, _sequence: &[u8]) -> Result<()> {
            panic!("processor failure");
        }
    }

    fn meta(dir: &std::path::Path) -> Result<IndexMetadata> {
        let path = dir.join("parallel.fa");
        std::fs::write(&path, FASTA)?;
        IndexMetadata::acquire(&path, Format::Fasta, true)
    }

    fn regions() -> Vec<Region> {
        vec![
            Region::new("seq1", 8, 12),
            Region::whole("seq2"),
            Region::new("missing", 0, 4),
            Region::new("seq3", 2, 6),
            Region::new("seq1", 20, 20),
        ]
    }

    #[test]
    fn test_process_parallel() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let meta = meta(dir.path())?;
        let collector = Collector::default();
        meta.process_parallel(&regions(), collector.clone(), 2)?;

        let mut seen = collector.seen.lock().unwrap().clone();
        seen.sort();
        assert_eq!(
            seen,
            vec![
                ("seq1:9-12".to_string(), b"AACC".to_vec()),
                ("seq2".to_string(), b"TTTTT".to_vec()),
                ("seq3:3-6".to_string(), b"GTAC".to_vec()),
            ]
        );
        assert_eq!(collector.batches.load(Ordering::Relaxed), 2);
        assert_eq!(meta.share_count(), 1);
        Ok(())
    }

    #[test]
    fn test_more_threads_than_regions() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let meta = meta(dir.path())?;
        let collector = Collector::default();
        meta.process_parallel(&regions()[..2], collector.clone(), 16)?;
        assert_eq!(collector.seen.lock().unwrap().len(), 2);
        assert_eq!(collector.batches.load(Ordering::Relaxed), 2);

        meta.process_parallel(&[], collector.clone(), 0)?;
        assert_eq!(collector.batches.load(Ordering::Relaxed), 2);
        Ok(())
    }

    #[test]
    fn test_process_regions_by_reference() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let meta = meta(dir.path())?;
        let mut collector = Collector::default();
        collector.set_tid(7);

        let mut reader = SequenceReader::open(&meta)?;
        reader.process_regions(&regions(), &mut collector)?;
        assert_eq!(collector.get_tid(), Some(7));
        assert_eq!(collector.seen.lock().unwrap().len(), 3);

        let boxed: Box<dyn FetchProcessor> = Box::new(collector.clone());
        reader.process_regions(&regions()[..1], boxed)?;
        assert_eq!(collector.seen.lock().unwrap().len(), 4);
        assert_eq!(collector.batches.load(Ordering::Relaxed), 2);
        Ok(())
    }

    #[test]
    fn test_worker_error_is_returned() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let meta = meta(dir.path())?;
        let err = meta.process_parallel(&regions(), Failing, 3).unwrap_err();
        assert!(matches!(err, crate::Error::AnyhowError(_)));
        assert_eq!(err.to_string(), "refusing seq2");
        Ok(())
    }

    #[test]
    fn test_worker_panic_is_reported() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let meta = meta(dir.path())?;
        let err = meta.process_parallel(&regions(), Panicking, 1).unwrap_err();
        assert!(matches!(
            err,
            crate::Error::ReadError(ReadError::WorkerPanic(0))
        ));
        assert_eq!(meta.share_count(), 1);
        Ok(())
    }
}
