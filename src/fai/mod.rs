//! # Sequence directory (`.fai`)
//!
//! The sequence directory maps each sequence name to the layout of its residues
//! in the uncompressed source text. It is stored as a tab-delimited text file with
//! one line per sequence and no header row:
//!
//! ```text
//! name<TAB>length<TAB>seq_offset<TAB>line_bases<TAB>line_bytes[<TAB>qual_offset]
//! ```
//!
//! For the FASTA source
//!
//! ```text
//! >seq1
//! AAAAAAAAAA
//! CCCCCCCCCC
//! GGGGGGGGGG
//! >seq2
//! TTTTT
//! ```
//!
//! the directory is
//!
//! ```text
//! seq1	30	6	10	11
//! seq2	5	45	5	6
//! ```
//!
//! The directory can be loaded from disk with [`SequenceDirectory::from_path`] or
//! built by scanning a source with [`SequenceDirectory::build`]. Loading is
//! best-effort: malformed lines are skipped so that a partially corrupt index
//! still serves the records it does describe.

mod builder;
mod directory;
mod record;

pub use directory::SequenceDirectory;
pub use record::{header_name, SequenceRecord, MAX_NAME_LEN};
