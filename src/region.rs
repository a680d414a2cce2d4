//! # Region strings
//!
//! Regions name a sequence and, optionally, a window of it:
//!
//! ```text
//! chr1                 whole sequence
//! chr1:1,001           from position 1001 to the end
//! chr1:1,001-2,000     positions 1001 through 2000
//! ```
//!
//! [`Region::parse`] reads the samtools convention (1-based, inclusive) and
//! [`Region::parse_zero_based`] the bedtools convention (0-based, half-open).
//! Either way the parsed [`Region`] stores 0-based half-open coordinates, which
//! is what [`SequenceReader::fetch_region`](crate::SequenceReader::fetch_region)
//! expects.

use std::fmt;
use std::str::FromStr;

use crate::error::{RegionError, Result};

/// A named window of a sequence in 0-based half-open coordinates
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Region {
    /// Sequence name
    pub name: String,

    /// First residue (0-based, inclusive)
    pub start: u64,

    /// One past the last residue, or `None` for the end of the sequence
    pub end: Option<u64>,
}
impl Region {
    /// Creates a region covering `[start, end)`
    pub fn new(name: impl Into<String>, start: u64, end: u64) -> Self {
        Self {
            name: name.into(),
            start,
            end: Some(end),
        }
    }

    /// Creates a region covering a whole sequence
    pub fn whole(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            start: 0,
            end: None,
        }
    }

    /// Parses a 1-based inclusive region string
    ///
    /// # Examples
    ///
    /// ```rust
    /// use faigz::Region;
    ///
    /// let region = Region::parse("chr1:1,001-2,000").unwrap();
    /// assert_eq!(region.name, "chr1");
    /// assert_eq!(region.start, 1000);
    /// assert_eq!(region.end, Some(2000));
    /// ```
    pub fn parse(region: &str) -> Result<Self> {
        let Some((name, start, end)) = split(region)? else {
            return Ok(Self::whole(region));
        };
        if start == 0 {
            return Err(RegionError::InvalidRegion(format!(
                "{region}: positions start at 1"
            ))
            .into());
        }
        let start = start - 1;
        if let Some(end) = end {
            check_order(start, end)?;
        }
        Ok(Self {
            name: name.to_string(),
            start,
            end,
        })
    }

    /// Parses a 0-based half-open region string
    pub fn parse_zero_based(region: &str) -> Result<Self> {
        let Some((name, start, end)) = split(region)? else {
            return Ok(Self::whole(region));
        };
        if let Some(end) = end {
            check_order(start, end)?;
        }
        Ok(Self {
            name: name.to_string(),
            start,
            end,
        })
    }

    /// Returns the signed `[begin, end)` pair accepted by the fetch operations
    #[must_use]
    pub fn bounds(&self) -> (i64, i64) {
        let signed = |pos: u64| i64::try_from(pos).unwrap_or(i64::MAX);
        (signed(self.start), self.end.map_or(i64::MAX, signed))
    }
}

impl FromStr for Region {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl fmt::Display for Region {
    /// Formats the region as a 1-based inclusive string
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.start, self.end) {
            (0, None) => write!(f, "{}", self.name),
            (start, None) => write!(f, "{}:{}", self.name, start + 1),
            (start, Some(end)) => write!(f, "{}:{}-{}", self.name, start + 1, end),
        }
    }
}

fn check_order(start: u64, end: u64) -> Result<()> {
    if start > end {
        let signed = |pos: u64| i64::try_from(pos).unwrap_or(i64::MAX);
        return Err(RegionError::InvertedRange {
            start: signed(start),
            end: signed(end),
        }
        .into());
    }
    Ok(())
}

fn parse_position(region: &str, field: &str) -> Result<u64> {
    let digits: String = field.chars().filter(|&c| c != ',').collect();
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return Err(RegionError::InvalidRegion(format!("{region}: bad position {field:?}")).into());
    }
    digits.parse().map_err(|_| {
        crate::Error::from(RegionError::InvalidRegion(format!(
            "{region}: position out of range"
        )))
    })
}

/// Splits `name:start[-end]` into its parts
///
/// Returns `None` when the string carries no coordinate suffix. A suffix that
/// does not look like coordinates at all is treated as part of the name, so
/// names containing `:` still work as whole-sequence regions.
fn split(region: &str) -> Result<Option<(&str, u64, Option<u64>)>> {
    if region.is_empty() {
        return Err(RegionError::InvalidRegion("empty region".to_string()).into());
    }
    let Some((name, coords)) = region.rsplit_once(':') else {
        return Ok(None);
    };
    if coords.is_empty() || !coords.starts_with(|c: char| c.is_ascii_digit()) {
        return Ok(None);
    }
    if name.is_empty() {
        return Err(RegionError::InvalidRegion(format!("{region}: missing name")).into());
    }
    let (start, end) = match coords.split_once('-') {
        Some((start, "")) => (parse_position(region, start)?, None),
        Some((start, end)) => (
            parse_position(region, start)?,
            Some(parse_position(region, end)?),
        ),
        None => (parse_position(region, coords)?, None),
    };
    Ok(Some((name, start, end)))
}

#[cfg(test)]
mod testing {
    use super::*;
    use crate::error::Error;

    #[test]
    fn test_parse_one_based() -> Result<()> {
        assert_eq!(Region::parse("chr1")?, Region::whole("chr1"));
        assert_eq!(Region::parse("chr1:1-10")?, Region::new("chr1", 0, 10));
        assert_eq!(Region::parse("chr1:1,001-2,000")?, Region::new("chr1", 1000, 2000));

        let open = Region::parse("chr1:5")?;
        assert_eq!(open.start, 4);
        assert_eq!(open.end, None);
        assert_eq!(Region::parse("chr1:5-")?, open);

        // a single residue
        assert_eq!(Region::parse("chr1:7-7")?, Region::new("chr1", 6, 7));
        Ok(())
    }

    #[test]
    fn test_parse_zero_based() -> Result<()> {
        assert_eq!(Region::parse_zero_based("chr1:0-10")?, Region::new("chr1", 0, 10));
        assert_eq!(Region::parse_zero_based("chr1:5-5")?, Region::new("chr1", 5, 5));
        assert_eq!(Region::parse_zero_based("chrX")?, Region::whole("chrX"));
        Ok(())
    }

    #[test]
    fn test_names_with_colons() -> Result<()> {
        assert_eq!(Region::parse("ns:chr1")?, Region::whole("ns:chr1"));
        assert_eq!(Region::parse("ns:chr1:3-4")?, Region::new("ns:chr1", 2, 4));
        Ok(())
    }

    #[test]
    fn test_parse_errors() {
        for bad in ["", "chr1:0-10", ":1-10", "chr1:1-x", "chr1:1-2-3"] {
            assert!(
                matches!(
                    Region::parse(bad),
                    Err(Error::RegionError(RegionError::InvalidRegion(_)))
                ),
                "{bad:?} should be rejected"
            );
        }
        assert!(matches!(
            Region::parse("chr1:20-10"),
            Err(Error::RegionError(RegionError::InvertedRange { start: 19, end: 10 }))
        ));
    }

    #[test]
    fn test_display_roundtrip() -> Result<()> {
        for text in ["chr1", "chr1:5", "chr1:1-10"] {
            let region: Region = text.parse()?;
            assert_eq!(region.to_string(), text);
        }
        Ok(())
    }

    #[test]
    fn test_empty_range_display_roundtrip() -> Result<()> {
        // an empty window prints with end one below its 1-based start
        let empty = Region::new("a", 5, 5);
        assert_eq!(empty.to_string(), "a:6-5");
        assert_eq!(empty.to_string().parse::<Region>()?, empty);
        for region in [Region::new("a", 0, 0), Region::new("chr1", 6, 7)] {
            assert_eq!(Region::parse(&region.to_string())?, region);
        }
        Ok(())
    }

    #[test]
    fn test_bounds() {
        assert_eq!(Region::new("a", 3, 9).bounds(), (3, 9));
        assert_eq!(Region::whole("a").bounds(), (0, i64::MAX));
    }
}
