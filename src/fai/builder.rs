use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use flate2::read::MultiGzDecoder;
use log::{debug, info, warn};
use memmap2::Mmap;

use super::{header_name, SequenceDirectory, SequenceRecord};
use crate::error::{IndexError, Result};
use crate::format::{is_block_compressed, is_terminator, Format};

/// Where the scanner is within a FASTQ record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FastqState {
    Header,
    Sequence,
    Quality { remaining: u64 },
}

/// Streaming directory builder
///
/// Consumes the uncompressed text of a source one line at a time while tracking
/// the running byte offset. Line geometry is captured from the first body line of
/// each record and never updated, so records must use a constant interior line
/// width for arithmetic seeking to stay valid.
#[derive(Debug)]
struct DirectoryScanner {
    format: Format,
    offset: u64,
    pending: Option<SequenceRecord>,
    records: Vec<SequenceRecord>,
    state: FastqState,
}
impl DirectoryScanner {
    fn new(format: Format) -> Self {
        Self {
            format,
            offset: 0,
            pending: None,
            records: Vec::new(),
            state: FastqState::Header,
        }
    }

    fn open_record(&mut self, line: &[u8]) {
        self.finish_record();
        self.pending = Some(SequenceRecord {
            id: self.records.len(),
            name: header_name(&line[1..]),
            length: 0,
            seq_offset: self.offset + line.len() as u64,
            line_bases: 0,
            line_bytes: 0,
            qual_offset: 0,
        });
    }

    /// Closes the pending record
    ///
    /// Records whose header has no name cannot be written to the directory and
    /// are dropped here, after their body has been consumed.
    fn finish_record(&mut self) {
        match self.pending.take() {
            Some(record) if record.name.is_empty() => warn!(
                "Skipping unnamed record with {} residues at byte {}",
                record.length, record.seq_offset
            ),
            Some(record) => self.records.push(record),
            None => {}
        }
    }

    fn count_bases(&mut self, line: &[u8]) {
        let bases = line.iter().filter(|&&b| !is_terminator(b)).count() as u64;
        if let Some(record) = self.pending.as_mut() {
            record.length += bases;
            if record.line_bases == 0 {
                record.line_bases = bases;
                record.line_bytes = line.len() as u64;
            }
        }
    }

    fn ingest_fasta(&mut self, line: &[u8]) {
        if line[0] == b'>' {
            self.open_record(line);
        } else if self.pending.is_none() {
            debug!("Ignoring text before the first header at byte {}", self.offset);
        } else {
            self.count_bases(line);
        }
    }

    fn ingest_fastq(&mut self, line: &[u8]) {
        match self.state {
            FastqState::Header => {
                if line[0] == b'@' {
                    self.open_record(line);
                    self.state = FastqState::Sequence;
                } else {
                    debug!("Ignoring text outside a record at byte {}", self.offset);
                }
            }
            FastqState::Sequence if line[0] == b'+' => {
                let next = self.offset + line.len() as u64;
                let remaining = match self.pending.as_mut() {
                    Some(record) => {
                        record.qual_offset = next;
                        record.length
                    }
                    None => 0,
                };
                self.state = if remaining == 0 {
                    self.finish_record();
                    FastqState::Header
                } else {
                    FastqState::Quality { remaining }
                };
            }
            FastqState::Sequence => self.count_bases(line),
            FastqState::Quality { remaining } => {
                let quals = line.iter().filter(|&&b| !is_terminator(b)).count() as u64;
                let remaining = remaining.saturating_sub(quals);
                self.state = if remaining == 0 {
                    self.finish_record();
                    FastqState::Header
                } else {
                    FastqState::Quality { remaining }
                };
            }
        }
    }

    /// Processes one raw line, terminator included
    fn ingest(&mut self, line: &[u8]) {
        // blank lines still advance the offset
        if !line.is_empty() && !is_terminator(line[0]) {
            match self.format {
                Format::Fasta => self.ingest_fasta(line),
                Format::Fastq => self.ingest_fastq(line),
            }
        }
        self.offset += line.len() as u64;
    }

    fn finish(mut self) -> Result<SequenceDirectory> {
        self.finish_record();
        SequenceDirectory::from_records(self.records, self.format == Format::Fastq)
    }
}

impl SequenceDirectory {
    /// Builds a directory by scanning uncompressed source text
    ///
    /// # Parameters
    ///
    /// * `reader` - Buffered reader positioned at the start of the source text
    /// * `format` - Whether the text holds FASTA or FASTQ records
    ///
    /// # Errors
    ///
    /// * [`IndexError::DuplicateName`] if two records share a name
    /// * I/O errors raised by the reader
    pub fn scan<R: BufRead>(mut reader: R, format: Format) -> Result<Self> {
        let mut scanner = DirectoryScanner::new(format);
        let mut line = Vec::new();
        loop {
            line.clear();
            if reader.read_until(b'\n', &mut line)? == 0 {
                break;
            }
            scanner.ingest(&line);
        }
        scanner.finish()
    }

    /// Builds a directory for a source file and writes it to `output`
    ///
    /// Plain sources are memory-mapped; block-compressed sources are scanned
    /// through a decompressing stream so that every offset is expressed in
    /// uncompressed coordinates.
    ///
    /// # Errors
    ///
    /// * [`IndexError::SourceUnreadable`] if the source cannot be opened
    /// * [`IndexError::IndexWriteFailed`] if the output cannot be written
    /// * [`IndexError::DuplicateName`] if two records share a name
    ///
    /// # Examples
    ///
    /// ```rust,no_run
    /// use faigz::fai::SequenceDirectory;
    /// use faigz::Format;
    ///
    /// let directory = SequenceDirectory::build("genome.fa", "genome.fa.fai", Format::Fasta).unwrap();
    /// println!("Indexed {} sequences", directory.len());
    /// ```
    pub fn build<P, Q>(source: P, output: Q, format: Format) -> Result<Self>
    where
        P: AsRef<Path>,
        Q: AsRef<Path>,
    {
        let source = source.as_ref();
        let unreadable = |source_err| IndexError::SourceUnreadable {
            path: source.display().to_string(),
            source: source_err,
        };

        let compressed = is_block_compressed(source).map_err(unreadable)?;
        let handle = File::open(source).map_err(unreadable)?;
        let directory = if compressed {
            debug!("Scanning {} through a BGZF decoder", source.display());
            Self::scan(BufReader::new(MultiGzDecoder::new(handle)), format)?
        } else {
            // Safety: the source is opened read-only and is not modified while indexed
            let mmap = unsafe { Mmap::map(&handle).map_err(unreadable)? };
            Self::scan(&mmap[..], format)?
        };

        directory.save(output.as_ref())?;
        info!(
            "Indexed {} sequences from {} into {}",
            directory.len(),
            source.display(),
            output.as_ref().display()
        );
        Ok(directory)
    }
}
