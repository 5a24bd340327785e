//! Charmap table parser using nom
//!
//! File format:
//! ```text
//! CMAP1
//! # comments run to end of line
//! subtable <platform> <encoding>
//! <code> <glyph>
//! <first>..<last> <first_glyph>
//! ```
//!
//! Codes are decimal, `0x`-prefixed hex, or `U+`-prefixed hex. A range
//! maps `first + k` to `first_glyph + k`.

use nom::{
    branch::alt,
    bytes::complete::{tag, tag_no_case},
    character::complete::{digit1, hex_digit1, space0, space1},
    combinator::{all_consuming, map_res, opt},
    sequence::{preceded, terminated, tuple},
    IResult,
};

use crate::error::{Error, Result};

/// Magic first line of a charmap table
pub const CMAP_MAGIC: &str = "CMAP1";

/// Contiguous run of character codes mapped to consecutive glyphs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Segment {
    /// First character code (inclusive)
    pub first: u32,
    /// Last character code (inclusive)
    pub last: u32,
    /// Glyph index of `first`
    pub glyph: u32,
}

/// One character map of a face
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Subtable {
    /// Platform identifier
    pub platform_id: u16,
    /// Platform-specific encoding identifier
    pub encoding_id: u16,
    segments: Vec<Segment>,
}

impl Subtable {
    /// Create an empty subtable
    pub fn new(platform_id: u16, encoding_id: u16) -> Self {
        Self {
            platform_id,
            encoding_id,
            segments: Vec::new(),
        }
    }

    /// Add a mapping for `first..=last`
    pub fn push(&mut self, segment: Segment) {
        self.segments.push(segment);
    }

    /// Segments sorted by first code
    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// Glyph index for `char_code`, 0 when unmapped
    pub fn glyph_index(&self, char_code: u32) -> u32 {
        let at = self.segments.partition_point(|s| s.last < char_code);
        match self.segments.get(at) {
            Some(s) if s.first <= char_code => s.glyph + (char_code - s.first),
            _ => 0,
        }
    }

    fn finish(&mut self) -> Result<()> {
        self.segments.sort_by_key(|s| s.first);
        for pair in self.segments.windows(2) {
            if pair[1].first <= pair[0].last {
                return Err(Error::Parse(format!(
                    "overlapping mappings at {:#x}",
                    pair[1].first
                )));
            }
        }
        Ok(())
    }
}

/// Parsed charmap table
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CmapTable {
    /// Subtables in file order
    pub subtables: Vec<Subtable>,
}

enum Line {
    Subtable(u16, u16),
    Mapping(Segment),
}

fn hex_code(input: &str) -> IResult<&str, u32> {
    map_res(
        preceded(alt((tag_no_case("0x"), tag_no_case("U+"))), hex_digit1),
        |s: &str| u32::from_str_radix(s, 16),
    )(input)
}

fn dec_number(input: &str) -> IResult<&str, u32> {
    map_res(digit1, |s: &str| s.parse::<u32>())(input)
}

fn small_number(input: &str) -> IResult<&str, u16> {
    map_res(digit1, |s: &str| s.parse::<u16>())(input)
}

/// Parse a character code in decimal, `0x` hex or `U+` notation
pub fn char_code(input: &str) -> IResult<&str, u32> {
    alt((hex_code, dec_number))(input)
}

fn subtable_line(input: &str) -> IResult<&str, (u16, u16)> {
    let (rest, (_, _, platform, _, encoding)) =
        tuple((tag("subtable"), space1, small_number, space1, small_number))(input)?;
    Ok((rest, (platform, encoding)))
}

fn mapping_line(input: &str) -> IResult<&str, (u32, Option<u32>, u32)> {
    let (rest, (first, last, _, glyph)) = tuple((
        char_code,
        opt(preceded(tag(".."), char_code)),
        space1,
        dec_number,
    ))(input)?;
    Ok((rest, (first, last, glyph)))
}

fn parse_line(line: &str, number: usize) -> Result<Line> {
    if let Ok((_, (platform, encoding))) =
        all_consuming(terminated(subtable_line, space0))(line)
    {
        return Ok(Line::Subtable(platform, encoding));
    }

    let (_, (first, last, glyph)) = all_consuming(terminated(mapping_line, space0))(line)
        .map_err(|_| Error::Parse(format!("line {}: unrecognised entry {:?}", number, line)))?;
    let last = last.unwrap_or(first);
    if last < first {
        return Err(Error::Parse(format!(
            "line {}: range end {:#x} precedes start {:#x}",
            number, last, first
        )));
    }
    if glyph.checked_add(last - first).is_none() {
        return Err(Error::Parse(format!("line {}: glyph range overflows", number)));
    }

    Ok(Line::Mapping(Segment { first, last, glyph }))
}

/// Parse a complete charmap table
pub fn parse_table(input: &str) -> Result<CmapTable> {
    let mut lines = input
        .lines()
        .enumerate()
        .map(|(i, raw)| (i + 1, raw.split('#').next().unwrap_or("").trim()))
        .filter(|(_, line)| !line.is_empty());

    match lines.next() {
        Some((_, CMAP_MAGIC)) => {}
        _ => return Err(Error::Parse("Missing CMAP1 header".to_string())),
    }

    let mut table = CmapTable::default();
    for (number, line) in lines {
        match parse_line(line, number)? {
            Line::Subtable(platform, encoding) => {
                table.subtables.push(Subtable::new(platform, encoding));
            }
            Line::Mapping(segment) => match table.subtables.last_mut() {
                Some(subtable) => subtable.push(segment),
                None => {
                    return Err(Error::Parse(format!(
                        "line {}: mapping outside of a subtable",
                        number
                    )))
                }
            },
        }
    }

    for subtable in &mut table.subtables {
        subtable.finish()?;
    }

    Ok(table)
}

/// Parse a standalone character code such as `65`, `0x41` or `U+0041`
pub fn parse_char_code(input: &str) -> Result<u32> {
    let (_, code) = all_consuming(char_code)(input.trim())?;
    Ok(code)
}
