use std::collections::HashMap;
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;

use log::{debug, warn};

use super::SequenceRecord;
use crate::error::{IndexError, Result};

/// Mapping from sequence name to its on-disk layout
///
/// The directory keeps records in the order they were first seen, which defines
/// their ordinal `id`, and a hash map from name to position for exact,
/// case-sensitive lookups. It is immutable once loaded or built.
///
/// # Examples
///
/// ```rust,no_run
/// use faigz::fai::SequenceDirectory;
///
/// let directory = SequenceDirectory::from_path("genome.fa.fai").unwrap();
/// if let Some(record) = directory.get("chr1") {
///     println!("chr1 has {} bases starting at byte {}", record.length, record.seq_offset);
/// }
/// ```
#[derive(Debug, Clone, Default)]
pub struct SequenceDirectory {
    /// Records in order of first appearance
    records: Vec<SequenceRecord>,

    /// Name to position in `records`
    lookup: HashMap<String, usize>,

    /// Whether any loaded line carried a quality offset column
    with_quality: bool,
}
impl SequenceDirectory {
    /// Loads a directory index file
    ///
    /// Malformed lines are skipped. Fails with [`IndexError::IndexMissing`] if the
    /// file cannot be opened.
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let Ok(handle) = File::open(path) else {
            return Err(IndexError::IndexMissing(path.display().to_string()).into());
        };
        let directory = Self::from_reader(BufReader::new(handle))?;
        debug!(
            "Loaded {} sequences from {}",
            directory.len(),
            path.display()
        );
        Ok(directory)
    }

    /// Reads directory lines from any buffered reader
    ///
    /// Lines that are not valid UTF-8, have fewer than five fields or carry
    /// unparseable numbers are skipped, and only the first occurrence of a name
    /// is kept.
    pub fn from_reader<R: BufRead>(mut reader: R) -> Result<Self> {
        let mut directory = Self::default();
        let mut buffer = Vec::new();
        let mut lineno = 0;
        loop {
            buffer.clear();
            if reader.read_until(b'\n', &mut buffer)? == 0 {
                break;
            }
            lineno += 1;
            let Some(record) = std::str::from_utf8(&buffer)
                .ok()
                .and_then(|line| SequenceRecord::from_line(directory.len(), line))
            else {
                debug!("Skipping malformed index line {lineno}");
                continue;
            };
            if buffer.split(|&b| b == b'\t').nth(5).is_some() {
                directory.with_quality = true;
            }
            if directory.lookup.contains_key(&record.name) {
                warn!(
                    "Ignoring duplicate sequence name {} on index line {lineno}",
                    record.name
                );
                continue;
            }
            directory.push(record);
        }
        Ok(directory)
    }

    /// Builds a directory from records already in order
    ///
    /// Ids are reassigned densely. Fails on duplicate names.
    pub fn from_records<I>(records: I, with_quality: bool) -> Result<Self>
    where
        I: IntoIterator<Item = SequenceRecord>,
    {
        let mut directory = Self {
            with_quality,
            ..Self::default()
        };
        for mut record in records {
            if directory.lookup.contains_key(&record.name) {
                return Err(IndexError::DuplicateName(record.name).into());
            }
            record.id = directory.len();
            directory.push(record);
        }
        Ok(directory)
    }

    fn push(&mut self, record: SequenceRecord) {
        self.lookup.insert(record.name.clone(), self.records.len());
        self.records.push(record);
    }

    /// Returns the number of sequences in the directory
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Checks if the directory holds no sequences
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Checks if records carry quality offsets
    #[must_use]
    pub fn with_quality(&self) -> bool {
        self.with_quality
    }

    /// Looks up a record by exact name
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&SequenceRecord> {
        self.lookup.get(name).map(|&idx| &self.records[idx])
    }

    /// Returns the record with ordinal `id`
    #[must_use]
    pub fn get_by_id(&self, id: usize) -> Option<&SequenceRecord> {
        self.records.get(id)
    }

    /// Returns the name of the record with ordinal `id`
    #[must_use]
    pub fn name_at(&self, id: usize) -> Option<&str> {
        self.records.get(id).map(|record| record.name.as_str())
    }

    /// Checks if a sequence with this exact name exists
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.lookup.contains_key(name)
    }

    /// Iterates over records in order of appearance
    pub fn iter(&self) -> std::slice::Iter<'_, SequenceRecord> {
        self.records.iter()
    }

    /// Writes every record as a directory line
    pub fn write<W: Write>(&self, writer: &mut W) -> Result<()> {
        self.records
            .iter()
            .try_for_each(|record| record.write_line(writer, self.with_quality))
    }

    /// Saves the directory to a file
    ///
    /// Any failure to create or write the file is reported as
    /// [`IndexError::IndexWriteFailed`].
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let write_failed = |source| IndexError::IndexWriteFailed {
            path: path.display().to_string(),
            source,
        };
        let mut writer = File::create(path).map(BufWriter::new).map_err(write_failed)?;
        let mut buffer = Vec::new();
        self.write(&mut buffer)?;
        writer.write_all(&buffer).map_err(write_failed)?;
        writer.flush().map_err(write_failed)?;
        Ok(())
    }
}

impl<'a> IntoIterator for &'a SequenceDirectory {
    type Item = &'a SequenceRecord;
    type IntoIter = std::slice::Iter<'a, SequenceRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}
