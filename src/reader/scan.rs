//! Forward scanning primitives shared by the plain and compressed fetch paths

use std::io::{self, BufRead, Read};

use memchr::{memchr, memchr2};

use crate::error::Result;
use crate::fai::header_name;
use crate::format::Format;

/// Consumes up to `count` residues, appending them to `out` when given
///
/// Line terminators are skipped and never counted. Scanning stops early, without
/// consuming it, at a byte that marks a record boundary in `format`, or at the
/// end of the stream. Returns the number of residues taken.
pub(crate) fn take_residues<R: BufRead>(
    reader: &mut R,
    count: u64,
    format: Format,
    mut out: Option<&mut Vec<u8>>,
) -> Result<u64> {
    let mut remaining = count;
    while remaining > 0 {
        let buf = reader.fill_buf()?;
        if buf.is_empty() {
            break;
        }

        let mut used = 0;
        let mut boundary = false;
        while used < buf.len() && remaining > 0 {
            let rest = &buf[used..];
            let run = memchr2(b'\n', b'\r', rest).unwrap_or(rest.len());
            let take = run.min(remaining as usize);
            let chunk = &rest[..take];
            if let Some(stop) = chunk.iter().position(|&b| format.is_boundary(b)) {
                if let Some(out) = out.as_deref_mut() {
                    out.extend_from_slice(&chunk[..stop]);
                }
                used += stop;
                remaining -= stop as u64;
                boundary = true;
                break;
            }
            if let Some(out) = out.as_deref_mut() {
                out.extend_from_slice(chunk);
            }
            used += take;
            remaining -= take as u64;
            if take == run && run < rest.len() {
                // step over the terminator
                used += 1;
            }
        }
        reader.consume(used);
        if boundary {
            break;
        }
    }
    Ok(count - remaining)
}

/// Discards exactly `count` raw bytes, or fewer at end of stream
pub(crate) fn skip_bytes<R: Read>(reader: &mut R, count: u64) -> Result<u64> {
    Ok(io::copy(&mut reader.by_ref().take(count), &mut io::sink())?)
}

/// Remembers the most recent complete line of a byte stream
///
/// A line is only reported as whole if its first byte was observed, either
/// because a newline preceded it or because tracking started at the beginning of
/// the text.
#[derive(Debug)]
pub(crate) struct LineTracker {
    current: Vec<u8>,
    current_whole: bool,
    last: Vec<u8>,
    last_whole: bool,
    seen_newline: bool,
}
impl LineTracker {
    pub(crate) fn new(at_line_start: bool) -> Self {
        Self {
            current: Vec::new(),
            current_whole: at_line_start,
            last: Vec::new(),
            last_whole: false,
            seen_newline: false,
        }
    }

    fn feed(&mut self, mut chunk: &[u8]) {
        while let Some(i) = memchr(b'\n', chunk) {
            self.last.clear();
            self.last.extend_from_slice(&self.current);
            self.last.extend_from_slice(&chunk[..i]);
            self.last_whole = self.current_whole;
            self.seen_newline = true;
            self.current.clear();
            self.current_whole = true;
            chunk = &chunk[i + 1..];
        }
        self.current.extend_from_slice(chunk);
    }

    /// Returns the line that ends exactly at the current position, if it was seen whole
    pub(crate) fn finished_line(&self) -> Option<&[u8]> {
        (self.seen_newline && self.current.is_empty() && self.last_whole)
            .then_some(self.last.as_slice())
    }
}

/// Discards `count` raw bytes while tracking lines
pub(crate) fn skip_tracking_lines<R: BufRead>(
    reader: &mut R,
    count: u64,
    lines: &mut LineTracker,
) -> Result<u64> {
    let mut remaining = count;
    while remaining > 0 {
        let buf = reader.fill_buf()?;
        if buf.is_empty() {
            break;
        }
        let take = buf.len().min(remaining as usize);
        lines.feed(&buf[..take]);
        reader.consume(take);
        remaining -= take as u64;
    }
    Ok(count - remaining)
}

/// Checks whether a header line (marker included) names `name`
///
/// The header is cut to its name the same way it was on ingestion, so names
/// that were truncated or held invalid UTF-8 still match.
pub(crate) fn header_names(line: &[u8], marker: u8, name: &str) -> bool {
    match line.split_first() {
        Some((&first, rest)) => first == marker && header_name(rest) == name,
        None => false,
    }
}
