//! # Source formats
//!
//! Discriminates FASTA from FASTQ sources and detects block-gzip compression
//! from the leading magic bytes of a file.

use std::fs::File;
use std::io::Read;
use std::path::Path;

/// Leading bytes of every gzip member, and therefore of every BGZF file
pub const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

/// Line terminators, which never count toward sequence positions
pub const TERMINATORS: [u8; 2] = [b'\n', b'\r'];

/// Text format of an indexed source
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Format {
    /// Header lines start with `>`, followed by (possibly wrapped) sequence lines
    #[default]
    Fasta,
    /// Four-part records: `@` header, sequence, `+` separator, qualities
    Fastq,
}
impl Format {
    /// Returns the byte that opens a record header in this format
    #[must_use]
    pub fn record_marker(self) -> u8 {
        match self {
            Self::Fasta => b'>',
            Self::Fastq => b'@',
        }
    }

    /// Checks whether `byte` marks the end of a sequence body
    ///
    /// Reading stops at these bytes so that an index which does not match its
    /// source can never return residues of the following record.
    #[inline]
    #[must_use]
    pub fn is_boundary(self, byte: u8) -> bool {
        match self {
            Self::Fasta => byte == b'>' || byte == b'+',
            Self::Fastq => byte == b'+' || byte == b'@',
        }
    }
}

/// Checks if `byte` is a line terminator
#[inline]
#[must_use]
pub fn is_terminator(byte: u8) -> bool {
    TERMINATORS.contains(&byte)
}

/// Inspects the first two bytes of a file for the gzip magic signature
///
/// Files shorter than two bytes are treated as uncompressed.
pub fn is_block_compressed<P: AsRef<Path>>(path: P) -> std::io::Result<bool> {
    let mut handle = File::open(path)?;
    let mut magic = [0u8; 2];
    let mut filled = 0;
    while filled < magic.len() {
        match handle.read(&mut magic[filled..])? {
            0 => return Ok(false),
            n => filled += n,
        }
    }
    Ok(magic == GZIP_MAGIC)
}
