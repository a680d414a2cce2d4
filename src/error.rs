/// Custom Result type for faigz operations, wrapping the custom [`Error`] type
pub type Result<T> = std::result::Result<T, Error>;

/// The main error type for the faigz library, encompassing all possible error cases
/// that can occur while indexing and reading sequence files.
#[derive(thiserror::Error, Debug)]
#[error(transparent)]
pub enum Error {
    /// Errors related to loading, building or writing the sequence and block indices
    IndexError(#[from] IndexError),
    /// Errors that occur while fetching from a source file
    ReadError(#[from] ReadError),
    /// Errors that occur while parsing region strings
    RegionError(#[from] RegionError),
    /// Standard I/O errors from the Rust standard library
    IoError(#[from] std::io::Error),
    /// Generic errors raised by user-provided processors
    AnyhowError(#[from] anyhow::Error),
}
impl Error {
    /// Checks if the error is caused by a missing sequence directory
    ///
    /// This is the error callers see when acquiring metadata without
    /// `create_if_missing` for a source that was never indexed.
    #[must_use]
    pub fn is_not_indexed(&self) -> bool {
        matches!(self, Self::IndexError(IndexError::IndexMissing(_)))
    }

    /// Checks if the error is caused by a compressed source without a block index
    #[must_use]
    pub fn is_random_access_unavailable(&self) -> bool {
        matches!(self, Self::ReadError(ReadError::RandomAccessUnavailable(_)))
    }
}

/// Errors raised while acquiring, building or persisting an index
#[derive(thiserror::Error, Debug)]
pub enum IndexError {
    /// The source file is missing or cannot be opened
    #[error("Unable to read source file {path}: {source}")]
    SourceUnreadable {
        path: String,
        source: std::io::Error,
    },

    /// No sequence directory exists and index creation was not requested
    ///
    /// # Arguments
    /// * `String` - The path of the expected directory index
    #[error("Missing sequence index: {0}")]
    IndexMissing(String),

    /// The index file could not be written
    #[error("Unable to write index file {path}: {source}")]
    IndexWriteFailed {
        path: String,
        source: std::io::Error,
    },

    /// The same sequence name appears more than once in a source
    #[error("Duplicate sequence name found while indexing: {0}")]
    DuplicateName(String),

    /// A BGZF block header could not be parsed
    ///
    /// # Arguments
    /// * `u64` - The compressed offset where the block was expected
    #[error("Invalid BGZF block header at compressed offset {0}")]
    InvalidBlockHeader(u64),
}

/// Errors that can occur while fetching sequence data
#[derive(thiserror::Error, Debug)]
pub enum ReadError {
    /// The source is block-compressed but no block offset index is loaded
    #[error("Random access unavailable for {0}: no block offset index is loaded")]
    RandomAccessUnavailable(String),

    /// Quality strings were requested from a FASTA source
    #[error("Quality data is only available for FASTQ sources")]
    WrongFormat,

    /// The source stream could not be opened by a reader
    #[error("Unable to open stream on {path}: {source}")]
    StreamOpenFailed {
        path: String,
        source: std::io::Error,
    },

    /// The header line preceding a sequence does not name that sequence
    #[error("Index does not match source: expected header for {expected}, found {found}")]
    HeaderMismatch { expected: String, found: String },

    /// A worker thread panicked while fetching in parallel
    #[error("Worker thread {0} panicked")]
    WorkerPanic(usize),
}

/// Errors that can occur while parsing a region string
#[derive(thiserror::Error, Debug)]
pub enum RegionError {
    /// The region string is malformed
    #[error("Invalid region: {0}")]
    InvalidRegion(String),

    /// The region start lies after its end
    #[error("Region start ({start}) is after its end ({end})")]
    InvertedRange { start: i64, end: i64 },
}

#[cfg(test)]
mod testing {
    use super::*;

    #[test]
    fn test_error_predicates() {
        let err: Error = IndexError::IndexMissing("x.fa.fai".into()).into();
        assert!(err.is_not_indexed());
        assert!(!err.is_random_access_unavailable());

        let err: Error = ReadError::RandomAccessUnavailable("x.fa.gz".into()).into();
        assert!(err.is_random_access_unavailable());
        assert!(!err.is_not_indexed());
    }

    #[test]
    fn test_transparent_display() {
        let err: Error = ReadError::WrongFormat.into();
        assert_eq!(
            err.to_string(),
            "Quality data is only available for FASTQ sources"
        );
    }
}
