//! # Compressed block index (`.gzi`)
//!
//! Block-compressed sources are BGZF files: a concatenation of gzip members, each
//! covering a bounded slice of the uncompressed text. The block offset index
//! records where every block starts in both coordinate spaces, so that an
//! uncompressed position can be translated into a compressed seek point plus a
//! short forward skip inside the block.
//!
//! ```text
//!  uncompressed   0 ........ 65280 ........ 130560 ......
//!                 |  block 0  |   block 1    |  block 2
//!  compressed     0 .. 17390  .. 34711 ...
//! ```
//!
//! The first block always starts at `(0, 0)` and is not stored.
//!
//! This module also provides [`BgzfWriter`] to produce block-compressed sources
//! together with their index, and [`BlockOffsetIndex::from_bgzf`] to rebuild the
//! index of an existing BGZF file from its block headers.

mod bgzf;
mod index;

pub use bgzf::{
    block_uncompressed_size, parse_block_size, BgzfWriter, BLOCK_SIZE, EOF_BLOCK,
    SIZE_BLOCK_FOOTER, SIZE_BLOCK_HEADER,
};
pub use index::{BlockOffsetEntry, BlockOffsetIndex, SIZE_COUNT, SIZE_ENTRY};
