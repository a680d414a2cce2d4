//! # Shared index metadata
//!
//! [`IndexMetadata`] bundles everything a reader needs to resolve queries
//! against one source file: the sequence directory, the optional block offset
//! index, the three file paths and the format. It is built once and then shared
//! read-only by any number of [`SequenceReader`](crate::SequenceReader)s, possibly
//! on different threads.
//!
//! Sharing is reference counted. Cloning (or [`IndexMetadata::share`]) takes a new
//! share, dropping (or [`IndexMetadata::release`]) gives it back, and the index
//! data is freed when the last share goes away.

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use log::{debug, info, warn};

use crate::error::{IndexError, Result};
use crate::fai::{SequenceDirectory, SequenceRecord};
use crate::format::{is_block_compressed, Format};
use crate::gzi::BlockOffsetIndex;

/// Suffix of the sequence directory file
pub const FAI_SUFFIX: &str = ".fai";

/// Suffix of the block offset index file
pub const GZI_SUFFIX: &str = ".gzi";

/// Appends a suffix to a path without replacing its extension
fn with_suffix(path: &Path, suffix: &str) -> PathBuf {
    let mut name = OsString::from(path.as_os_str());
    name.push(suffix);
    PathBuf::from(name)
}

#[derive(Debug)]
struct MetadataInner {
    directory: SequenceDirectory,
    blocks: Option<BlockOffsetIndex>,
    source: PathBuf,
    fai_path: PathBuf,
    gzi_path: PathBuf,
    format: Format,
    compressed: bool,
}

/// Shared, immutable index of one FASTA/FASTQ source
///
/// # Examples
///
/// ```rust,no_run
/// use faigz::{Format, IndexMetadata, SequenceReader};
///
/// let meta = IndexMetadata::acquire("genome.fa.gz", Format::Fasta, true).unwrap();
/// println!("{} sequences", meta.sequence_count());
///
/// let mut reader = SequenceReader::open(&meta).unwrap();
/// if let Some(seq) = reader.fetch_sequence("chr1", 0, 60).unwrap() {
///     println!("{}", String::from_utf8_lossy(&seq));
/// }
/// ```
#[derive(Debug, Clone)]
pub struct IndexMetadata {
    inner: Arc<MetadataInner>,
}
impl IndexMetadata {
    /// Loads (or builds) the index of a source file with default options
    ///
    /// This is shorthand for
    /// `IndexOptions::new().format(format).create_if_missing(create_if_missing).acquire(path)`.
    ///
    /// # Errors
    ///
    /// * [`IndexError::SourceUnreadable`] if the source cannot be opened
    /// * [`IndexError::IndexMissing`] if no directory exists and `create_if_missing` is unset
    /// * [`IndexError::IndexWriteFailed`] if a freshly built directory cannot be saved
    pub fn acquire<P: AsRef<Path>>(path: P, format: Format, create_if_missing: bool) -> Result<Self> {
        IndexOptions::new()
            .format(format)
            .create_if_missing(create_if_missing)
            .acquire(path)
    }

    /// Takes a new share of the same index
    #[must_use]
    pub fn share(&self) -> Self {
        self.clone()
    }

    /// Gives this share back
    ///
    /// The index is freed once every share has been released.
    pub fn release(self) {
        drop(self);
    }

    /// Returns the number of live shares, readers included
    #[must_use]
    pub fn share_count(&self) -> usize {
        Arc::strong_count(&self.inner)
    }

    /// Returns the number of sequences in the directory
    #[must_use]
    pub fn sequence_count(&self) -> usize {
        self.inner.directory.len()
    }

    /// Returns the name of the `i`-th sequence in directory order
    #[must_use]
    pub fn sequence_name(&self, i: usize) -> Option<&str> {
        self.inner.directory.name_at(i)
    }

    /// Returns the residue count of a sequence
    #[must_use]
    pub fn sequence_length(&self, name: &str) -> Option<u64> {
        self.inner.directory.get(name).map(|record| record.length)
    }

    /// Checks if a sequence with this exact name is indexed
    #[must_use]
    pub fn has_sequence(&self, name: &str) -> bool {
        self.inner.directory.contains(name)
    }

    /// Iterates over sequence names in directory order
    pub fn sequence_names(&self) -> impl Iterator<Item = &str> {
        self.inner.directory.iter().map(|record| record.name.as_str())
    }

    /// Returns the layout record of a sequence
    #[must_use]
    pub fn record(&self, name: &str) -> Option<&SequenceRecord> {
        self.inner.directory.get(name)
    }

    #[must_use]
    pub fn directory(&self) -> &SequenceDirectory {
        &self.inner.directory
    }

    #[must_use]
    pub fn block_index(&self) -> Option<&BlockOffsetIndex> {
        self.inner.blocks.as_ref()
    }

    #[must_use]
    pub fn source_path(&self) -> &Path {
        &self.inner.source
    }

    #[must_use]
    pub fn fai_path(&self) -> &Path {
        &self.inner.fai_path
    }

    #[must_use]
    pub fn gzi_path(&self) -> &Path {
        &self.inner.gzi_path
    }

    #[must_use]
    pub fn format(&self) -> Format {
        self.inner.format
    }

    /// Checks if the source is block-gzip compressed
    #[must_use]
    pub fn is_compressed(&self) -> bool {
        self.inner.compressed
    }
}

/// Options controlling how [`IndexMetadata`] is acquired
///
/// # Examples
///
/// ```rust,no_run
/// use faigz::{Format, IndexOptions};
///
/// let meta = IndexOptions::new()
///     .format(Format::Fastq)
///     .create_if_missing(true)
///     .build_block_index(true)
///     .acquire("reads.fq.gz")
///     .unwrap();
/// assert!(meta.block_index().is_some());
/// ```
#[derive(Debug, Clone, Default)]
pub struct IndexOptions {
    /// Source format, FASTA unless set
    format: Option<Format>,
    /// Build and save a missing directory
    create_if_missing: Option<bool>,
    /// Build and save a missing block index for compressed sources
    build_block_index: Option<bool>,
    /// Directory path, `<source>.fai` unless set
    fai_path: Option<PathBuf>,
    /// Block index path, `<source>.gzi` unless set
    gzi_path: Option<PathBuf>,
}
impl IndexOptions {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn format(mut self, format: Format) -> Self {
        self.format = Some(format);
        self
    }

    #[must_use]
    pub fn create_if_missing(mut self, create: bool) -> Self {
        self.create_if_missing = Some(create);
        self
    }

    #[must_use]
    pub fn build_block_index(mut self, build: bool) -> Self {
        self.build_block_index = Some(build);
        self
    }

    #[must_use]
    pub fn fai_path<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.fai_path = Some(path.into());
        self
    }

    #[must_use]
    pub fn gzi_path<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.gzi_path = Some(path.into());
        self
    }

    /// Loads (or builds) the index of `path` according to these options
    ///
    /// A missing block index is not an error: compressed sources without one can
    /// still be queried for names and lengths, but fetches will fail with
    /// [`ReadError::RandomAccessUnavailable`](crate::error::ReadError::RandomAccessUnavailable).
    pub fn acquire<P: AsRef<Path>>(self, path: P) -> Result<IndexMetadata> {
        let source = path.as_ref().to_path_buf();
        let format = self.format.unwrap_or_default();
        let fai_path = self
            .fai_path
            .unwrap_or_else(|| with_suffix(&source, FAI_SUFFIX));
        let gzi_path = self
            .gzi_path
            .unwrap_or_else(|| with_suffix(&source, GZI_SUFFIX));

        let compressed =
            is_block_compressed(&source).map_err(|err| IndexError::SourceUnreadable {
                path: source.display().to_string(),
                source: err,
            })?;

        let directory = match SequenceDirectory::from_path(&fai_path) {
            Ok(directory) => directory,
            Err(err) if err.is_not_indexed() && self.create_if_missing.unwrap_or(false) => {
                info!("No index found at {}, building it", fai_path.display());
                SequenceDirectory::build(&source, &fai_path, format)?;
                SequenceDirectory::from_path(&fai_path)?
            }
            Err(err) => return Err(err),
        };

        let blocks = if compressed {
            match BlockOffsetIndex::from_path(&gzi_path) {
                Some(blocks) => Some(blocks),
                None if self.build_block_index.unwrap_or(false) => {
                    info!("No block index found at {}, building it", gzi_path.display());
                    let blocks = BlockOffsetIndex::from_bgzf(&source)?;
                    blocks.save(&gzi_path)?;
                    Some(blocks)
                }
                None => {
                    warn!(
                        "No block index for {}; random access is unavailable",
                        source.display()
                    );
                    None
                }
            }
        } else {
            None
        };

        debug!(
            "Acquired index of {} ({} sequences, compressed: {compressed})",
            source.display(),
            directory.len()
        );
        Ok(IndexMetadata {
            inner: Arc::new(MetadataInner {
                directory,
                blocks,
                source,
                fai_path,
                gzi_path,
                format,
                compressed,
            }),
        })
    }
}

#[cfg(test)]
mod testing {
    use std::io::Write;
    use std::sync::Arc;
    use std::thread;

    use super::*;
    use crate::gzi::BgzfWriter;

    const FASTA: &str = ">seq1\nAAAAAAAAAA\nCCCCCCCCCC\nGGGGGGGGGG\n>seq2\nTTTTT\n";

    fn write_source(dir: &Path, name: &str) -> Result<PathBuf> {
        let path = dir.join(name);
        std::fs::write(&path, FASTA)?;
        Ok(path)
    }

    #[test]
    fn test_acquire_builds_when_requested() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let source = write_source(dir.path(), "build.fa")?;

        let err = IndexMetadata::acquire(&source, Format::Fasta, false).unwrap_err();
        assert!(err.is_not_indexed());
        assert!(!dir.path().join("build.fa.fai").exists());

        let meta = IndexMetadata::acquire(&source, Format::Fasta, true)?;
        assert!(dir.path().join("build.fa.fai").exists());
        assert_eq!(meta.fai_path(), dir.path().join("build.fa.fai"));
        assert_eq!(meta.sequence_count(), 2);
        assert_eq!(meta.sequence_name(0), Some("seq1"));
        assert_eq!(meta.sequence_name(2), None);
        assert_eq!(meta.sequence_length("seq1"), Some(30));
        assert_eq!(meta.sequence_length("seq3"), None);
        assert!(meta.has_sequence("seq2"));
        assert!(!meta.is_compressed());
        assert!(meta.block_index().is_none());
        assert_eq!(meta.sequence_names().collect::<Vec<_>>(), ["seq1", "seq2"]);

        // a second acquire loads the saved directory
        let again = IndexMetadata::acquire(&source, Format::Fasta, false)?;
        assert_eq!(again.record("seq2"), meta.record("seq2"));
        Ok(())
    }

    #[test]
    fn test_missing_source() {
        let err = IndexMetadata::acquire("/nonexistent/genome.fa", Format::Fasta, true).unwrap_err();
        assert!(matches!(
            err,
            crate::Error::IndexError(IndexError::SourceUnreadable { .. })
        ));
    }

    #[test]
    fn test_malformed_directory_line() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let source = write_source(dir.path(), "broken.fa")?;
        std::fs::write(
            dir.path().join("broken.fa.fai"),
            "seq1\t30\t6\t10\t11\nbad\t1\t2\nseq2\t5\t45\t5\t6\n",
        )?;
        let meta = IndexMetadata::acquire(&source, Format::Fasta, false)?;
        assert_eq!(meta.sequence_count(), 2);
        assert!(!meta.has_sequence("bad"));

        // a line that is not text is skipped the same way
        std::fs::write(
            dir.path().join("broken.fa.fai"),
            b"seq1\t30\t6\t10\t11\nbad\xff\x01\nseq2\t5\t45\t5\t6\n",
        )?;
        let meta = IndexMetadata::acquire(&source, Format::Fasta, false)?;
        assert_eq!(meta.sequence_names().collect::<Vec<_>>(), ["seq1", "seq2"]);
        Ok(())
    }

    #[test]
    fn test_custom_paths() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let source = write_source(dir.path(), "custom.fa")?;
        let fai = dir.path().join("elsewhere.idx");
        let meta = IndexOptions::new()
            .create_if_missing(true)
            .fai_path(&fai)
            .acquire(&source)?;
        assert_eq!(meta.fai_path(), fai);
        assert!(fai.exists());
        assert_eq!(meta.gzi_path(), dir.path().join("custom.fa.gzi"));
        Ok(())
    }

    #[test]
    fn test_compressed_block_index_optional() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let source = dir.path().join("packed.fa.gz");
        let mut writer = BgzfWriter::with_block_size(std::fs::File::create(&source)?, 16);
        writer.write_all(FASTA.as_bytes())?;
        writer.finish()?;

        let meta = IndexMetadata::acquire(&source, Format::Fasta, true)?;
        assert!(meta.is_compressed());
        assert!(meta.block_index().is_none());
        assert_eq!(meta.sequence_length("seq2"), Some(5));
        assert_eq!(meta.record("seq2").map(|r| r.seq_offset), Some(45));

        let meta = IndexOptions::new()
            .create_if_missing(true)
            .build_block_index(true)
            .acquire(&source)?;
        let blocks = meta.block_index().unwrap();
        assert_eq!(blocks.len(), FASTA.len().div_ceil(16) - 1);
        assert!(dir.path().join("packed.fa.gz.gzi").exists());
        Ok(())
    }

    #[test]
    fn test_share_and_release_across_threads() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let source = write_source(dir.path(), "shared.fa")?;
        let meta = IndexMetadata::acquire(&source, Format::Fasta, true)?;
        let weak = Arc::downgrade(&meta.inner);
        assert_eq!(meta.share_count(), 1);

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let share = meta.share();
                thread::spawn(move || {
                    let inner = share.share();
                    assert!(inner.share_count() >= 2);
                    assert_eq!(inner.sequence_count(), 2);
                    inner.release();
                    share.release();
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(meta.share_count(), 1);
        assert!(weak.upgrade().is_some());
        meta.release();
        // the last release frees the index exactly once
        assert!(weak.upgrade().is_none());
        Ok(())
    }
}
