use std::fs::File;
use std::io::{BufWriter, Read, Write};
use std::path::Path;

use byteorder::{ByteOrder, LittleEndian};
use log::{debug, warn};
use memmap2::Mmap;

use super::bgzf::{block_uncompressed_size, parse_block_size};
use crate::error::{IndexError, Result};

/// Size of the entry count at the start of a block offset index file
pub const SIZE_COUNT: usize = 8;

/// Size of one serialized `BlockOffsetEntry`
pub const SIZE_ENTRY: usize = 16;

/// Start of one compression block in both coordinate spaces
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BlockOffsetEntry {
    /// Byte offset of the block in the compressed file
    pub compressed_offset: u64,

    /// Offset of the block's first byte in the uncompressed text
    pub uncompressed_offset: u64,
}
impl BlockOffsetEntry {
    /// Deserializes an entry from a 16-byte little-endian buffer
    #[must_use]
    pub fn from_bytes(buffer: &[u8]) -> Self {
        Self {
            compressed_offset: LittleEndian::read_u64(&buffer[0..8]),
            uncompressed_offset: LittleEndian::read_u64(&buffer[8..16]),
        }
    }

    /// Serializes the entry as two little-endian `u64` values
    pub fn write_bytes<W: Write>(&self, writer: &mut W) -> Result<()> {
        let mut buf = [0; SIZE_ENTRY];
        LittleEndian::write_u64(&mut buf[0..8], self.compressed_offset);
        LittleEndian::write_u64(&mut buf[8..16], self.uncompressed_offset);
        writer.write_all(&buf)?;
        Ok(())
    }
}

/// Table of compression block starts (`.gzi`)
///
/// A `BlockOffsetIndex` maps positions in the uncompressed text of a BGZF file to
/// the compressed offset of the block that holds them. Entries are sorted by
/// uncompressed offset and, by construction of BGZF, compressed offsets are
/// non-decreasing as well. The first block (at `(0, 0)`) is implicit and never
/// stored, matching the files written by `bgzip -i`.
///
/// On disk the index is a little-endian `u64` count followed by that many
/// `(compressed_offset, uncompressed_offset)` pairs of `u64`.
///
/// # Examples
///
/// ```rust,no_run
/// use faigz::gzi::BlockOffsetIndex;
///
/// if let Some(index) = BlockOffsetIndex::from_path("genome.fa.gz.gzi") {
///     let block = index.locate(1_000_000);
///     println!("uncompressed byte 1000000 lives in the block at {block}");
/// }
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BlockOffsetIndex {
    entries: Vec<BlockOffsetEntry>,
}
impl BlockOffsetIndex {
    /// Creates an index from entries already in block order
    #[must_use]
    pub fn from_entries(entries: Vec<BlockOffsetEntry>) -> Self {
        Self { entries }
    }

    /// Loads an index file
    ///
    /// The block index only accelerates access, so a missing, truncated or
    /// unsorted file yields `None` instead of an error.
    pub fn from_path<P: AsRef<Path>>(path: P) -> Option<Self> {
        let path = path.as_ref();
        let mut handle = File::open(path).ok()?;
        match Self::from_reader(&mut handle) {
            Ok(index) => {
                debug!(
                    "Loaded {} block offsets from {}",
                    index.len(),
                    path.display()
                );
                Some(index)
            }
            Err(err) => {
                warn!("Ignoring unreadable block index {}: {err}", path.display());
                None
            }
        }
    }

    /// Reads an index from its binary representation
    pub fn from_reader<R: Read>(reader: &mut R) -> Result<Self> {
        let mut buffer = Vec::new();
        reader.read_to_end(&mut buffer)?;
        let invalid = |msg: &str| std::io::Error::new(std::io::ErrorKind::InvalidData, msg.to_string());

        if buffer.len() < SIZE_COUNT {
            return Err(invalid("block index is missing its entry count").into());
        }
        let count = LittleEndian::read_u64(&buffer[..SIZE_COUNT]);
        let needed = usize::try_from(count)
            .ok()
            .and_then(|n| n.checked_mul(SIZE_ENTRY))
            .and_then(|n| n.checked_add(SIZE_COUNT));
        match needed {
            Some(needed) if needed <= buffer.len() => {}
            _ => return Err(invalid("block index is truncated").into()),
        }

        let entries: Vec<BlockOffsetEntry> = buffer[SIZE_COUNT..]
            .chunks_exact(SIZE_ENTRY)
            .take(count as usize)
            .map(BlockOffsetEntry::from_bytes)
            .collect();
        let sorted = entries.windows(2).all(|pair| {
            pair[0].uncompressed_offset <= pair[1].uncompressed_offset
                && pair[0].compressed_offset <= pair[1].compressed_offset
        });
        if !sorted {
            return Err(invalid("block index entries are not sorted").into());
        }
        Ok(Self { entries })
    }

    /// Builds an index by scanning the block headers of a BGZF file
    ///
    /// The file is memory-mapped and walked block by block using the `BSIZE`
    /// field of each header; uncompressed sizes come from each block trailer so
    /// no data is inflated. Empty blocks (such as the EOF marker) are not
    /// recorded.
    ///
    /// # Errors
    ///
    /// * [`IndexError::SourceUnreadable`] if the file cannot be opened or mapped
    /// * [`IndexError::InvalidBlockHeader`] if a block header is malformed
    pub fn from_bgzf<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let unreadable = |source| IndexError::SourceUnreadable {
            path: path.display().to_string(),
            source,
        };
        let file = File::open(path).map_err(unreadable)?;
        // Safety: the file is opened read-only and is not modified while mapped
        let mmap = unsafe { Mmap::map(&file).map_err(unreadable)? };

        let mut entries = Vec::new();
        let mut pos = 0;
        let mut uncompressed = 0;
        while pos < mmap.len() {
            let Some(size) = parse_block_size(&mmap[pos..]) else {
                return Err(IndexError::InvalidBlockHeader(pos as u64).into());
            };
            let block_len = block_uncompressed_size(&mmap[pos..pos + size]);
            if pos > 0 && block_len > 0 {
                entries.push(BlockOffsetEntry {
                    compressed_offset: pos as u64,
                    uncompressed_offset: uncompressed,
                });
            }
            uncompressed += block_len;
            pos += size;
        }
        debug!("Found {} block starts in {}", entries.len() + 1, path.display());
        Ok(Self { entries })
    }

    /// Returns the number of stored entries
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Checks if no entries are stored
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Returns the stored entries in block order
    #[must_use]
    pub fn entries(&self) -> &[BlockOffsetEntry] {
        &self.entries
    }

    /// Finds the block containing or immediately preceding an uncompressed offset
    ///
    /// This is a floor search: the greatest entry whose uncompressed offset is
    /// `<= target`. When several entries share that offset the last one wins, so
    /// the forward skip from the block start is as short as possible. The
    /// implicit first block `(0, 0)` is returned when the table is empty or the
    /// target precedes every entry.
    #[must_use]
    pub fn locate_entry(&self, target: u64) -> BlockOffsetEntry {
        let idx = self
            .entries
            .partition_point(|entry| entry.uncompressed_offset <= target);
        match idx {
            0 => BlockOffsetEntry::default(),
            idx => self.entries[idx - 1],
        }
    }

    /// Returns the compressed offset of the block holding `target`
    #[must_use]
    pub fn locate(&self, target: u64) -> u64 {
        self.locate_entry(target).compressed_offset
    }

    /// Writes the index in its binary representation
    pub fn write<W: Write>(&self, writer: &mut W) -> Result<()> {
        let mut buf = [0; SIZE_COUNT];
        LittleEndian::write_u64(&mut buf, self.entries.len() as u64);
        writer.write_all(&buf)?;
        self.entries
            .iter()
            .try_for_each(|entry| entry.write_bytes(writer))
    }

    /// Saves the index to a file
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let write_failed = |source| IndexError::IndexWriteFailed {
            path: path.display().to_string(),
            source,
        };
        let mut writer = File::create(path).map(BufWriter::new).map_err(write_failed)?;
        let mut buffer = Vec::with_capacity(SIZE_COUNT + SIZE_ENTRY * self.len());
        self.write(&mut buffer)?;
        writer.write_all(&buffer).map_err(write_failed)?;
        writer.flush().map_err(write_failed)?;
        Ok(())
    }
}
