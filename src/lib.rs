//! # faigz
//!
//! Reentrant random access to named sequences in FASTA and FASTQ files, either
//! plain or compressed with BGZF (block gzip).
//!
//! Random access relies on two companion indices:
//!
//! * a **sequence directory** (`.fai`) giving, for each named sequence, its
//!   length, the uncompressed byte offset of its first residue and the width of
//!   its wrapped lines; and
//! * for compressed sources, a **block offset index** (`.gzi`) mapping
//!   uncompressed offsets to the compressed offsets of BGZF blocks.
//!
//! Both are held by an [`IndexMetadata`], which is loaded (or built) once and
//! shared by reference counting between any number of [`SequenceReader`]s. Each
//! reader owns its own file handle, so concurrent fetches only need one reader
//! per thread.
//!
//! ## Example
//!
//! ```rust,no_run
//! use faigz::{Format, IndexMetadata, SequenceReader};
//!
//! // Load genome.fa.gz.fai and genome.fa.gz.gzi, building the directory if missing
//! let meta = IndexMetadata::acquire("genome.fa.gz", Format::Fasta, true).unwrap();
//!
//! let mut reader = SequenceReader::open(&meta).unwrap();
//! match reader.fetch_sequence("chr1", 10_000, 10_100).unwrap() {
//!     Some(seq) => println!("{}", String::from_utf8_lossy(&seq)),
//!     None => println!("chr1:10000-10100 is not in the index"),
//! }
//! ```
//!
//! ## Modules
//!
//! * [`fai`] - the sequence directory and its builder
//! * [`gzi`] - the block offset index and a BGZF writer
//! * [`prelude`] - the commonly used types in one import

pub mod error;
pub mod fai;
mod format;
pub mod gzi;
mod metadata;
mod parallel;
pub mod prelude;
mod reader;
mod region;

pub use error::{Error, IndexError, ReadError, RegionError, Result};
pub use format::{is_block_compressed, Format};
pub use metadata::{IndexMetadata, IndexOptions, FAI_SUFFIX, GZI_SUFFIX};
pub use parallel::FetchProcessor;
pub use reader::SequenceReader;
pub use region::Region;

#[cfg(test)]
mod testing {
    use std::fs::File;
    use std::io::Write;

    use anyhow::Result;

    use super::*;
    use crate::gzi::{BgzfWriter, BlockOffsetIndex};

    const FASTA: &str = ">seq1 first\nAAAAAAAAAA\nCCCCCCCCCC\nGGGGGGGGGG\n>seq2\nTTTTT\n";

    #[test]
    fn test_build_then_fetch_plain() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("genome.fa");
        std::fs::write(&path, FASTA)?;

        let meta = IndexMetadata::acquire(&path, Format::Fasta, true)?;
        assert_eq!(
            std::fs::read_to_string(dir.path().join("genome.fa.fai"))?,
            "seq1\t30\t12\t10\t11\nseq2\t5\t51\t5\t6\n"
        );

        let mut reader = SequenceReader::open(&meta)?;
        assert_eq!(reader.fetch_sequence("seq1", 8, 12)?.as_deref(), Some(&b"AACC"[..]));
        assert_eq!(reader.fetch_sequence("seq2", 0, 5)?.as_deref(), Some(&b"TTTTT"[..]));
        reader.close();
        meta.release();
        Ok(())
    }

    #[test]
    fn test_bgzip_layout_end_to_end() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("genome.fa.gz");
        let mut writer = BgzfWriter::with_block_size(File::create(&path)?, 20);
        writer.write_all(FASTA.as_bytes())?;
        let (_, written) = writer.finish()?;

        // the block index is rebuilt from the block headers alone
        let meta = IndexOptions::new()
            .create_if_missing(true)
            .build_block_index(true)
            .acquire(&path)?;
        assert_eq!(meta.block_index(), Some(&written));
        assert_eq!(BlockOffsetIndex::from_path(meta.gzi_path()), Some(written));

        let mut reader = SequenceReader::open(&meta)?;
        for (name, begin, end, expected) in [
            ("seq1", 0, 10, &b"AAAAAAAAAA"[..]),
            ("seq1", 8, 12, &b"AACC"[..]),
            ("seq1", 19, 21, &b"CG"[..]),
            ("seq2", 1, 4, &b"TTT"[..]),
        ] {
            assert_eq!(reader.fetch_sequence(name, begin, end)?.as_deref(), Some(expected));
        }
        assert!(reader.fetch_quality("seq1", 0, 1).is_err());
        Ok(())
    }

    #[test]
    fn test_not_indexed() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("genome.fa");
        std::fs::write(&path, FASTA).unwrap();
        let err = IndexMetadata::acquire(&path, Format::Fasta, false).unwrap_err();
        assert!(err.is_not_indexed());
    }
}
