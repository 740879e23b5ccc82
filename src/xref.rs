//! Cross-reference table parser.
//!
//! Reads classic `xref` sections and their trailers, following `/Prev` links
//! through incremental updates. Cross-reference *streams* are not decoded:
//! meeting one yields [`Error::XrefStream`], which tells the signer the
//! document has to be normalized before an incremental update can be
//! appended.

use crate::error::{Error, Result};
use crate::lexer::{skip_ws, token, unsigned, Token};
use crate::object::{Dictionary, Object};
use crate::parser::{parse_indirect_object, parse_object};
use std::collections::HashMap;

/// Maximum number of `/Prev` links followed.
pub const MAX_PREV_DEPTH: u32 = 100;

/// Largest subsection entry count accepted.
const MAX_SUBSECTION_COUNT: u64 = 10_000_000;

/// Cross-reference table entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct XRefEntry {
    /// Byte offset of the object (next free object number for free entries)
    pub offset: u64,
    /// Generation number
    pub generation: u16,
    /// `n` entries are in use, `f` entries are free
    pub in_use: bool,
}

impl XRefEntry {
    /// In-use entry.
    pub fn in_use(offset: u64, generation: u16) -> Self {
        Self {
            offset,
            generation,
            in_use: true,
        }
    }

    /// Free entry.
    pub fn free(next_free: u64, generation: u16) -> Self {
        Self {
            offset: next_free,
            generation,
            in_use: false,
        }
    }
}

/// Merged cross-reference table with the newest trailer.
#[derive(Debug, Clone, Default)]
pub struct CrossRefTable {
    entries: HashMap<u32, XRefEntry>,
    trailer: Dictionary,
    /// Offsets of every section read, newest first
    sections: Vec<usize>,
}

impl CrossRefTable {
    /// Create an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace an entry.
    pub fn add_entry(&mut self, object_number: u32, entry: XRefEntry) {
        self.entries.insert(object_number, entry);
    }

    /// Look up an entry.
    pub fn get(&self, object_number: u32) -> Option<&XRefEntry> {
        self.entries.get(&object_number)
    }

    /// Trailer dictionary of the newest section.
    pub fn trailer(&self) -> &Dictionary {
        &self.trailer
    }

    /// Offsets of the sections that were read, newest first.
    pub fn sections(&self) -> &[usize] {
        &self.sections
    }

    /// Highest object number with an entry.
    pub fn max_object_number(&self) -> u32 {
        self.entries.keys().copied().max().unwrap_or(0)
    }

    /// Iterate over in-use entries.
    pub fn in_use_entries(&self) -> impl Iterator<Item = (u32, &XRefEntry)> + '_ {
        self.entries
            .iter()
            .filter(|(_, e)| e.in_use)
            .map(|(num, e)| (*num, e))
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the table has no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Merge an older section: its entries only fill numbers this table lacks.
    fn merge_older(&mut self, older: CrossRefTable) {
        for (num, entry) in older.entries {
            self.entries.entry(num).or_insert(entry);
        }
        for (key, value) in older.trailer {
            self.trailer.entry(key).or_insert(value);
        }
        self.sections.extend(older.sections);
    }
}

/// Find the offset named by the last `startxref` keyword.
pub fn find_xref_offset(pdf: &[u8]) -> Result<usize> {
    let tail_start = pdf.len().saturating_sub(4096);
    let tail = &pdf[tail_start..];
    let pos = tail
        .windows(b"startxref".len())
        .rposition(|w| w == b"startxref")
        .ok_or(Error::InvalidXref)?;

    let after = &tail[pos + b"startxref".len()..];
    let (_, offset) = unsigned(after).map_err(|_| Error::InvalidXref)?;
    let offset = usize::try_from(offset).map_err(|_| Error::InvalidXref)?;
    if offset >= pdf.len() {
        log::warn!("startxref {} points past end of file ({} bytes)", offset, pdf.len());
        return Err(Error::InvalidXref);
    }
    Ok(offset)
}

/// Parse the cross-reference chain starting at `offset`.
pub fn parse_xref_chain(pdf: &[u8], offset: usize) -> Result<CrossRefTable> {
    let mut table = parse_section(pdf, offset)?;
    let mut next = prev_offset(table.trailer());
    let mut depth = 0;

    while let Some(prev) = next {
        depth += 1;
        if depth > MAX_PREV_DEPTH {
            return Err(Error::RecursionLimitExceeded(MAX_PREV_DEPTH));
        }
        if table.sections.contains(&prev) {
            log::warn!("Circular /Prev link to {} ignored", prev);
            break;
        }
        log::debug!("Following /Prev to xref section at {}", prev);
        let older = parse_section(pdf, prev)?;
        next = prev_offset(older.trailer());
        table.merge_older(older);
    }

    Ok(table)
}

fn prev_offset(trailer: &Dictionary) -> Option<usize> {
    trailer
        .get("Prev")
        .and_then(Object::as_integer)
        .and_then(|p| usize::try_from(p).ok())
}

fn parse_section(pdf: &[u8], offset: usize) -> Result<CrossRefTable> {
    let start = pdf.get(offset..).ok_or(Error::InvalidXref)?;
    let (body, _) = skip_ws(start).map_err(|_| Error::InvalidXref)?;

    if !body.starts_with(b"xref") {
        if is_xref_stream(pdf, offset) {
            return Err(Error::XrefStream { offset });
        }
        log::warn!("No xref keyword at byte {}", offset);
        return Err(Error::InvalidXref);
    }

    let mut input = &body[b"xref".len()..];
    let mut table = CrossRefTable::new();
    table.sections.push(offset);

    loop {
        let (rest, _) = skip_ws(input).map_err(|_| Error::InvalidXref)?;
        input = rest;

        if let Some(after) = input.strip_prefix(b"trailer") {
            let (_, trailer) = parse_object(after).map_err(|_| Error::ParseError {
                offset: pdf.len() - after.len(),
                reason: "unreadable trailer dictionary".to_string(),
            })?;
            table.trailer = trailer.into_dict()?;
            return Ok(table);
        }

        let (rest, first) = unsigned(input).map_err(|_| Error::InvalidXref)?;
        let (rest, count) = unsigned(rest).map_err(|_| Error::InvalidXref)?;
        if count > MAX_SUBSECTION_COUNT {
            return Err(Error::InvalidXref);
        }
        input = rest;

        for i in 0..count {
            let object_number = u32::try_from(first + i).map_err(|_| Error::InvalidXref)?;
            let (rest, entry) = parse_entry(input);
            let entry = entry.unwrap_or_else(|| {
                log::warn!("Malformed xref entry for object {}, treating as free", object_number);
                XRefEntry::free(0, 65535)
            });
            table.add_entry(object_number, entry);
            input = rest;
        }
    }
}

/// Parse one `oooooooooo ggggg n` entry. On failure the input is advanced
/// past the current line and `None` is returned.
fn parse_entry(input: &[u8]) -> (&[u8], Option<XRefEntry>) {
    let parsed = unsigned(input).and_then(|(rest, offset)| {
        let (rest, gen) = unsigned(rest)?;
        let (rest, _) = skip_ws(rest)?;
        Ok((rest, offset, gen))
    });

    if let Ok((rest, offset, gen)) = parsed {
        if let Ok(generation) = u16::try_from(gen) {
            match rest.first() {
                Some(b'n') => return (&rest[1..], Some(XRefEntry::in_use(offset, generation))),
                Some(b'f') => return (&rest[1..], Some(XRefEntry::free(offset, generation))),
                _ => {},
            }
        }
    }

    let (trimmed, _) = skip_ws(input).unwrap_or((input, ()));
    let line_end = trimmed
        .iter()
        .position(|&c| c == b'\n' || c == b'\r')
        .unwrap_or(trimmed.len());
    (&trimmed[line_end..], None)
}

/// Whether the object at `offset` is a `/Type /XRef` stream.
pub fn is_xref_stream(pdf: &[u8], offset: usize) -> bool {
    matches!(
        parse_indirect_object(pdf, offset),
        Ok((_, obj @ Object::Stream { .. }, _)) if obj.dict_type() == Some("XRef")
    )
}

/// Whether `pdf` has an `N G obj` header at `offset`.
pub fn has_object_header(pdf: &[u8], offset: usize) -> bool {
    let Some(mut input) = pdf.get(offset..) else {
        return false;
    };
    for expected in [0u8, 1, 2] {
        match (expected, token(input)) {
            (0 | 1, Ok((rest, Token::Integer(n)))) if n >= 0 => input = rest,
            (2, Ok((_, Token::ObjStart))) => return true,
            _ => return false,
        }
    }
    false
}
