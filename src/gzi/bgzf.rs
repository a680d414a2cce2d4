//! # BGZF block codec helpers
//!
//! A BGZF file is a series of independent gzip members ("blocks"), each holding
//! at most 64 KiB of uncompressed data and advertising its own compressed size in
//! a `BC` extra subfield. Because every block is a complete gzip member, a
//! decoder can start at any block boundary.
//!
//! Each block is laid out as:
//!
//! ```text
//! ┌──────────────────────────┐
//! │ gzip header    10 bytes  │ ID1=31 ID2=139 CM=8 FLG=4 MTIME XFL OS
//! ├──────────────────────────┤
//! │ XLEN            2 bytes  │ = 6
//! │ SI1 SI2 SLEN    4 bytes  │ = 'B' 'C' 2
//! │ BSIZE           2 bytes  │ total block size - 1
//! ├──────────────────────────┤
//! │ deflate payload          │
//! ├──────────────────────────┤
//! │ CRC32           4 bytes  │
//! │ ISIZE           4 bytes  │ uncompressed size
//! └──────────────────────────┘
//! ```

use std::io::{self, Write};

use byteorder::{ByteOrder, LittleEndian};
use flate2::write::DeflateEncoder;
use flate2::{Compression, Crc};

use super::{BlockOffsetEntry, BlockOffsetIndex};
use crate::error::Result;
use crate::format::GZIP_MAGIC;

/// Size of a BGZF block header including the `BC` subfield
pub const SIZE_BLOCK_HEADER: usize = 18;

/// Size of the CRC32 + ISIZE trailer
pub const SIZE_BLOCK_FOOTER: usize = 8;

/// Maximum uncompressed payload of a block, as written by bgzip
pub const BLOCK_SIZE: usize = 0xff00;

/// The empty block that terminates every BGZF file
pub const EOF_BLOCK: [u8; 28] = [
    0x1f, 0x8b, 0x08, 0x04, 0x00, 0x00, 0x00, 0x00, 0x00, 0xff, 0x06, 0x00, 0x42, 0x43, 0x02,
    0x00, 0x1b, 0x00, 0x03, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
];

/// FEXTRA flag of the gzip header
const FLAG_EXTRA: u8 = 0x04;

/// Parses the total size of the block starting at `bytes[0]`
///
/// Returns `None` if the bytes do not start with a gzip header carrying a `BC`
/// subfield, or if the advertised size runs past the end of `bytes`.
#[must_use]
pub fn parse_block_size(bytes: &[u8]) -> Option<usize> {
    if bytes.len() < SIZE_BLOCK_HEADER || bytes[..2] != GZIP_MAGIC {
        return None;
    }
    if bytes[3] & FLAG_EXTRA == 0 {
        return None;
    }
    let xlen = LittleEndian::read_u16(&bytes[10..12]) as usize;
    let extra = bytes.get(12..12 + xlen)?;

    let mut pos = 0;
    while pos + 4 <= extra.len() {
        let slen = LittleEndian::read_u16(&extra[pos + 2..pos + 4]) as usize;
        if extra[pos] == b'B' && extra[pos + 1] == b'C' && slen == 2 {
            let bsize = LittleEndian::read_u16(extra.get(pos + 4..pos + 6)?) as usize;
            let size = bsize + 1;
            return (size <= bytes.len() && size >= SIZE_BLOCK_HEADER + SIZE_BLOCK_FOOTER)
                .then_some(size);
        }
        pos += 4 + slen;
    }
    None
}

/// Reads the uncompressed size (ISIZE) from the trailer of a complete block
#[must_use]
pub fn block_uncompressed_size(block: &[u8]) -> u64 {
    u64::from(LittleEndian::read_u32(&block[block.len() - 4..]))
}

/// Compresses one payload into a standalone BGZF block
fn compress_block(data: &[u8], level: Compression) -> io::Result<Vec<u8>> {
    let mut deflate = DeflateEncoder::new(Vec::with_capacity(data.len()), level);
    deflate.write_all(data)?;
    let payload = deflate.finish()?;

    let mut crc = Crc::new();
    crc.update(data);

    let total = SIZE_BLOCK_HEADER + payload.len() + SIZE_BLOCK_FOOTER;
    let Ok(bsize) = u16::try_from(total - 1) else {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            "compressed block exceeds the BGZF size limit",
        ));
    };

    let mut block = Vec::with_capacity(total);
    block.extend_from_slice(&[0x1f, 0x8b, 0x08, FLAG_EXTRA, 0, 0, 0, 0, 0, 0xff]);
    block.extend_from_slice(&[6, 0, b'B', b'C', 2, 0]);
    block.extend_from_slice(&bsize.to_le_bytes());
    block.extend_from_slice(&payload);
    block.extend_from_slice(&crc.sum().to_le_bytes());
    block.extend_from_slice(&(data.len() as u32).to_le_bytes());
    Ok(block)
}

/// Writer producing BGZF output and its block offset index
///
/// Data is buffered into blocks of at most `block_size` uncompressed bytes. The
/// start of every block after the first is recorded, so that the index returned
/// by [`BgzfWriter::finish`] is exactly what `bgzip -i` would write.
///
/// # Examples
///
/// ```rust,no_run
/// use std::fs::File;
/// use std::io::Write;
/// use faigz::gzi::BgzfWriter;
///
/// let mut writer = BgzfWriter::new(File::create("genome.fa.gz").unwrap());
/// writer.write_all(b">chr1\nACGTACGT\n").unwrap();
/// let (_file, index) = writer.finish().unwrap();
/// index.save("genome.fa.gz.gzi").unwrap();
/// ```
pub struct BgzfWriter<W: Write> {
    inner: W,
    buffer: Vec<u8>,
    block_size: usize,
    level: Compression,
    compressed_pos: u64,
    uncompressed_pos: u64,
    entries: Vec<BlockOffsetEntry>,
}
impl<W: Write> BgzfWriter<W> {
    /// Creates a writer using the standard block size
    pub fn new(inner: W) -> Self {
        Self::with_block_size(inner, BLOCK_SIZE)
    }

    /// Creates a writer with a custom uncompressed block size
    ///
    /// The size is capped at [`BLOCK_SIZE`] and raised to at least one byte.
    pub fn with_block_size(inner: W, block_size: usize) -> Self {
        let block_size = block_size.clamp(1, BLOCK_SIZE);
        Self {
            inner,
            buffer: Vec::with_capacity(block_size),
            block_size,
            level: Compression::default(),
            compressed_pos: 0,
            uncompressed_pos: 0,
            entries: Vec::new(),
        }
    }

    /// Sets the deflate compression level of subsequent blocks
    #[must_use]
    pub fn level(mut self, level: Compression) -> Self {
        self.level = level;
        self
    }

    fn flush_block(&mut self) -> io::Result<()> {
        if self.buffer.is_empty() {
            return Ok(());
        }
        if self.compressed_pos > 0 {
            self.entries.push(BlockOffsetEntry {
                compressed_offset: self.compressed_pos,
                uncompressed_offset: self.uncompressed_pos,
            });
        }
        let block = compress_block(&self.buffer, self.level)?;
        self.inner.write_all(&block)?;
        self.compressed_pos += block.len() as u64;
        self.uncompressed_pos += self.buffer.len() as u64;
        self.buffer.clear();
        Ok(())
    }

    /// Flushes the last block, appends the EOF marker and returns the inner writer
    /// with the block offset index of everything written
    pub fn finish(mut self) -> Result<(W, BlockOffsetIndex)> {
        self.flush_block()?;
        self.inner.write_all(&EOF_BLOCK)?;
        self.inner.flush()?;
        let index = BlockOffsetIndex::from_entries(self.entries);
        Ok((self.inner, index))
    }
}

impl<W: Write> Write for BgzfWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let room = self.block_size - self.buffer.len();
        let n = buf.len().min(room);
        self.buffer.extend_from_slice(&buf[..n]);
        if self.buffer.len() == self.block_size {
            self.flush_block()?;
        }
        Ok(n)
    }

    /// Flushes complete blocks only; a partial block stays buffered so that
    /// block boundaries do not depend on flush timing
    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}
