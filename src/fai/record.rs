use std::io::Write;

use crate::error::Result;

/// Maximum number of bytes kept from a header name
pub const MAX_NAME_LEN: usize = 255;

/// Layout descriptor of a single named sequence
///
/// A `SequenceRecord` describes where the residues of one sequence live in the
/// uncompressed text of its source, and how the text is wrapped into lines. This
/// is enough to turn a residue position into a byte offset without reading the
/// sequence itself.
///
/// Records are serialized as one tab-delimited line of the directory index:
///
/// ```text
/// name<TAB>length<TAB>seq_offset<TAB>line_bases<TAB>line_bytes[<TAB>qual_offset]
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SequenceRecord {
    /// Ordinal position of the record in its directory
    pub id: usize,

    /// Sequence name (header text up to the first whitespace)
    pub name: String,

    /// Total number of residues
    pub length: u64,

    /// Uncompressed byte offset of the first residue
    pub seq_offset: u64,

    /// Residues per wrapped line (0 when unknown)
    pub line_bases: u64,

    /// Bytes per wrapped line, including the line terminator
    pub line_bytes: u64,

    /// Uncompressed byte offset of the first quality character (FASTQ only)
    pub qual_offset: u64,
}
impl SequenceRecord {
    /// Parses a single directory line
    ///
    /// Returns `None` for lines with fewer than five fields or with numeric
    /// fields that do not parse. Trailing line terminators are ignored.
    #[must_use]
    pub fn from_line(id: usize, line: &str) -> Option<Self> {
        let line = line.trim_end_matches(['\n', '\r']);
        let mut fields = line.split('\t');

        let name = fields.next().filter(|name| !name.is_empty())?;
        let length = fields.next()?.parse().ok()?;
        let seq_offset = fields.next()?.parse().ok()?;
        let line_bases = fields.next()?.parse().ok()?;
        let line_bytes = fields.next()?.parse().ok()?;
        let qual_offset = match fields.next() {
            Some(field) => field.parse().ok()?,
            None => 0,
        };

        Some(Self {
            id,
            name: name.to_string(),
            length,
            seq_offset,
            line_bases,
            line_bytes,
            qual_offset,
        })
    }

    /// Writes the record as a directory line, including the trailing newline
    ///
    /// The quality offset column is only written when `with_quality` is set.
    pub fn write_line<W: Write>(&self, writer: &mut W, with_quality: bool) -> Result<()> {
        let mut ibuf = itoa::Buffer::new();
        writer.write_all(self.name.as_bytes())?;
        for value in [self.length, self.seq_offset, self.line_bases, self.line_bytes] {
            writer.write_all(b"\t")?;
            writer.write_all(ibuf.format(value).as_bytes())?;
        }
        if with_quality {
            writer.write_all(b"\t")?;
            writer.write_all(ibuf.format(self.qual_offset).as_bytes())?;
        }
        writer.write_all(b"\n")?;
        Ok(())
    }

    /// Checks whether the line geometry allows seeking by arithmetic alone
    #[must_use]
    pub fn has_line_geometry(&self) -> bool {
        self.line_bases > 0 && self.line_bytes >= self.line_bases
    }

    /// Converts a residue position into an uncompressed byte offset
    ///
    /// Positions are 0-based. Without usable line geometry the offset of the
    /// first residue is returned and callers must scan forward. Returns `None`
    /// if the offset does not fit in a `u64`, which only a corrupt record allows.
    #[must_use]
    pub fn offset_of(&self, position: u64) -> Option<u64> {
        if !self.has_line_geometry() {
            return Some(self.seq_offset);
        }
        (position / self.line_bases)
            .checked_mul(self.line_bytes)?
            .checked_add(position % self.line_bases)?
            .checked_add(self.seq_offset)
    }

    /// Clamps a signed `[begin, end)` request into the sequence bounds
    ///
    /// Returns `None` when the clamped range is empty.
    #[must_use]
    pub fn clamp(&self, begin: i64, end: i64) -> Option<(u64, u64)> {
        let clamp = |pos: i64| u64::try_from(pos).unwrap_or(0).min(self.length);
        let (begin, end) = (clamp(begin), clamp(end));
        (begin < end).then_some((begin, end))
    }
}

/// Truncates a header line to its name
///
/// `header` starts after the record marker. The name ends at the first
/// whitespace and is cut to [`MAX_NAME_LEN`] bytes, backing off to a character
/// boundary for non-ASCII names.
#[must_use]
pub fn header_name(header: &[u8]) -> String {
    let end = header
        .iter()
        .position(u8::is_ascii_whitespace)
        .unwrap_or(header.len());
    let name = String::from_utf8_lossy(&header[..end]);
    if name.len() <= MAX_NAME_LEN {
        return name.into_owned();
    }
    let mut cut = MAX_NAME_LEN;
    while !name.is_char_boundary(cut) {
        cut -= 1;
    }
    name[..cut].to_string()
}
