//! # Sequence readers
//!
//! A [`SequenceReader`] resolves `(name, begin, end)` queries into residues. Each
//! reader owns its own handle on the source file and holds one share of the
//! [`IndexMetadata`] it was opened on, so any number of readers can work on the
//! same index concurrently as long as each thread uses its own reader.
//!
//! Coordinates are 0-based and half-open. Requests are clamped into the sequence
//! bounds, and an empty range after clamping is reported the same way as an
//! unknown name: `Ok(None)`.
//!
//! For plain sources the first residue is found by line arithmetic and read
//! directly. For block-compressed sources the block offset index translates the
//! uncompressed position into a compressed seek point, and decoding resumes from
//! that block with a short forward skip.

mod scan;
mod stream;

use log::warn;

use crate::error::{ReadError, Result};
use crate::format::Format;
use crate::metadata::IndexMetadata;
use crate::parallel::FetchProcessor;
use crate::region::Region;
use stream::SourceStream;

/// Upper bound on the buffer reserved ahead of a fetch; longer reads grow it as they go
const MAX_RESERVE: u64 = 64 * 1024;

/// Per-consumer random access handle on an indexed source
///
/// # Examples
///
/// ```rust,no_run
/// use faigz::{Format, IndexMetadata, SequenceReader};
///
/// let meta = IndexMetadata::acquire("genome.fa", Format::Fasta, true).unwrap();
/// let mut reader = SequenceReader::open(&meta).unwrap();
///
/// let mut buffer = Vec::new();
/// for name in ["chr1", "chr2"] {
///     if reader.fetch_sequence_into(name, 0, 100, &mut buffer).unwrap() {
///         println!(">{name}\n{}", String::from_utf8_lossy(&buffer));
///     }
/// }
/// reader.close();
/// ```
#[derive(Debug)]
pub struct SequenceReader {
    meta: IndexMetadata,
    stream: SourceStream,
}
impl SequenceReader {
    /// Opens a reader on the source described by `meta`
    ///
    /// The reader takes its own share of the metadata, which is released again if
    /// the source cannot be opened.
    ///
    /// # Errors
    ///
    /// * [`ReadError::StreamOpenFailed`] if the source file cannot be opened
    pub fn open(meta: &IndexMetadata) -> Result<Self> {
        let meta = meta.share();
        let stream = SourceStream::open(meta.source_path(), meta.is_compressed())?;
        Ok(Self { meta, stream })
    }

    /// Closes the source handle and releases the metadata share
    pub fn close(self) {
        drop(self);
    }

    #[must_use]
    pub fn metadata(&self) -> &IndexMetadata {
        &self.meta
    }

    /// Fetches residues `[begin, end)` of a sequence
    ///
    /// Returns `Ok(None)` if the name is unknown or the clamped range is empty.
    ///
    /// # Errors
    ///
    /// * [`ReadError::RandomAccessUnavailable`] for a compressed source without a block index
    /// * [`ReadError::HeaderMismatch`] if the index does not match the source
    /// * I/O errors from the underlying file or decoder
    pub fn fetch_sequence(&mut self, name: &str, begin: i64, end: i64) -> Result<Option<Vec<u8>>> {
        let mut sequence = Vec::new();
        let found = self.fetch_sequence_into(name, begin, end, &mut sequence)?;
        Ok(found.then_some(sequence))
    }

    /// Fetches residues `[begin, end)` of a sequence into a reusable buffer
    ///
    /// The buffer is cleared first. Returns `false` where
    /// [`fetch_sequence`](Self::fetch_sequence) would return `None`.
    pub fn fetch_sequence_into(
        &mut self,
        name: &str,
        begin: i64,
        end: i64,
        sequence: &mut Vec<u8>,
    ) -> Result<bool> {
        sequence.clear();
        let Some(record) = self.meta.record(name) else {
            return Ok(false);
        };
        let Some((begin, end)) = record.clamp(begin, end) else {
            return Ok(false);
        };

        sequence.reserve((end - begin).min(MAX_RESERVE) as usize);
        let emitted = self
            .stream
            .read_residues(&self.meta, record, begin, end, sequence)?;
        if emitted < end - begin {
            warn!(
                "Short read for {name}:{begin}-{end}: got {emitted} of {} residues; is {} out of date?",
                end - begin,
                self.meta.fai_path().display()
            );
        }
        Ok(true)
    }

    /// Fetches a whole sequence
    pub fn fetch_all(&mut self, name: &str) -> Result<Option<Vec<u8>>> {
        self.fetch_sequence(name, 0, i64::MAX)
    }

    /// Fetches the residues covered by a region
    pub fn fetch_region(&mut self, region: &Region) -> Result<Option<Vec<u8>>> {
        let (begin, end) = region.bounds();
        self.fetch_sequence(&region.name, begin, end)
    }

    /// Fetches quality characters `[begin, end)` of a FASTQ record
    ///
    /// Quality retrieval is not supported: FASTQ sources always yield `Ok(None)`.
    ///
    /// # Errors
    ///
    /// * [`ReadError::WrongFormat`] if the source is FASTA
    pub fn fetch_quality(&mut self, _name: &str, _begin: i64, _end: i64) -> Result<Option<Vec<u8>>> {
        match self.meta.format() {
            Format::Fasta => Err(ReadError::WrongFormat.into()),
            Format::Fastq => Ok(None),
        }
    }

    /// Fetches every region in turn and hands the residues to `processor`
    ///
    /// Regions that resolve to nothing are skipped. `on_batch_complete` is called
    /// once at the end.
    pub fn process_regions<P: FetchProcessor>(
        &mut self,
        regions: &[Region],
        mut processor: P,
    ) -> Result<()> {
        let mut sequence = Vec::new();
        for region in regions {
            let (begin, end) = region.bounds();
            if self.fetch_sequence_into(&region.name, begin, end, &mut sequence)? {
                processor.process_sequence(region, &sequence)?;
            }
        }
        processor.on_batch_complete()
    }
}
