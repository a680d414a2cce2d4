use std::fs::File;
use std::io::{BufReader, Seek, SeekFrom};
use std::path::Path;

use flate2::read::MultiGzDecoder;
use log::debug;

use super::scan::{header_names, skip_bytes, skip_tracking_lines, take_residues, LineTracker};
use crate::error::{ReadError, Result};
use crate::fai::{header_name, SequenceRecord};
use crate::gzi::BlockOffsetEntry;
use crate::metadata::IndexMetadata;

type BlockDecoder = BufReader<MultiGzDecoder<File>>;

/// Per-reader handle on the source file
///
/// Plain sources are read through a seekable buffer. Compressed sources keep the
/// raw file and start a fresh decoder at a block boundary for every fetch.
#[derive(Debug)]
pub(crate) enum SourceStream {
    Plain(BufReader<File>),
    Bgzf(File),
}
impl SourceStream {
    pub(crate) fn open(path: &Path, compressed: bool) -> Result<Self> {
        let handle = File::open(path).map_err(|source| ReadError::StreamOpenFailed {
            path: path.display().to_string(),
            source,
        })?;
        if compressed {
            Ok(Self::Bgzf(handle))
        } else {
            Ok(Self::Plain(BufReader::new(handle)))
        }
    }

    /// Reads residues `[begin, end)` of `record` into `out`
    ///
    /// Returns the number of residues emitted, which is less than requested if
    /// the source ends or a record boundary is reached first.
    pub(crate) fn read_residues(
        &mut self,
        meta: &IndexMetadata,
        record: &SequenceRecord,
        begin: u64,
        end: u64,
        out: &mut Vec<u8>,
    ) -> Result<u64> {
        let format = meta.format();
        match self {
            Self::Plain(reader) => {
                if record.has_line_geometry() {
                    let Some(target) = record.offset_of(begin) else {
                        return Ok(0);
                    };
                    reader.seek(SeekFrom::Start(target))?;
                } else {
                    reader.seek(SeekFrom::Start(record.seq_offset))?;
                    if take_residues(reader, begin, format, None)? < begin {
                        return Ok(0);
                    }
                }
                take_residues(reader, end - begin, format, Some(out))
            }
            Self::Bgzf(file) => {
                let Some(blocks) = meta.block_index() else {
                    return Err(ReadError::RandomAccessUnavailable(
                        meta.source_path().display().to_string(),
                    )
                    .into());
                };

                // decode from the block holding the first residue, checking the header on the way
                let mut entry = blocks.locate_entry(record.seq_offset);
                let Some((mut decoder, mut lines)) = decode_until(file, entry, record.seq_offset)?
                else {
                    return Ok(0);
                };
                if lines.finished_line().is_none() && entry.uncompressed_offset > 0 {
                    // the header may start exactly at the block boundary or in an earlier block
                    let previous = blocks.locate_entry(entry.uncompressed_offset - 1);
                    let Some(window) = decode_until(file, previous, record.seq_offset)? else {
                        return Ok(0);
                    };
                    (decoder, lines) = window;
                    entry = previous;
                }
                check_header(meta, record, &lines)?;

                if record.has_line_geometry() {
                    let Some(target) = record.offset_of(begin) else {
                        return Ok(0);
                    };
                    let target_entry = blocks.locate_entry(target);
                    let from = if target_entry == entry {
                        record.seq_offset
                    } else {
                        decoder = decoder_at(file, target_entry)?;
                        target_entry.uncompressed_offset
                    };
                    let wanted = target.saturating_sub(from);
                    if skip_bytes(&mut decoder, wanted)? < wanted {
                        return Ok(0);
                    }
                } else if take_residues(&mut decoder, begin, format, None)? < begin {
                    return Ok(0);
                }
                take_residues(&mut decoder, end - begin, format, Some(out))
            }
        }
    }
}

/// Starts decoding at a block boundary
fn decoder_at(file: &mut File, entry: BlockOffsetEntry) -> Result<BlockDecoder> {
    file.seek(SeekFrom::Start(entry.compressed_offset))?;
    let handle = file.try_clone()?;
    Ok(BufReader::new(MultiGzDecoder::new(handle)))
}

/// Decodes from `entry` up to the uncompressed `offset`, tracking lines on the way
///
/// Returns `None` if the stream ends first.
fn decode_until(
    file: &mut File,
    entry: BlockOffsetEntry,
    offset: u64,
) -> Result<Option<(BlockDecoder, LineTracker)>> {
    let mut decoder = decoder_at(file, entry)?;
    let mut lines = LineTracker::new(entry.uncompressed_offset == 0);
    let wanted = offset - entry.uncompressed_offset;
    if skip_tracking_lines(&mut decoder, wanted, &mut lines)? < wanted {
        return Ok(None);
    }
    Ok(Some((decoder, lines)))
}

/// Verifies that the line preceding a sequence is its header
///
/// The check is skipped when the start of that line was not decoded, which
/// happens when the header began more than one block before its sequence.
fn check_header(meta: &IndexMetadata, record: &SequenceRecord, lines: &LineTracker) -> Result<()> {
    let Some(line) = lines.finished_line() else {
        debug!(
            "Header of {} is not within the decoded window; skipping check",
            record.name
        );
        return Ok(());
    };
    if header_names(line, meta.format().record_marker(), &record.name) {
        return Ok(());
    }
    let found = match line.split_first() {
        Some((_, rest)) => header_name(rest),
        None => String::new(),
    };
    Err(ReadError::HeaderMismatch {
        expected: record.name.clone(),
        found,
    }
    .into())
}
