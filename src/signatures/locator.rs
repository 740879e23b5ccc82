//! Signature placeholder location.
//!
//! Finds the `/Contents` and `/ByteRange` tokens of a signature dictionary
//! in raw bytes, without parsing the document. The search works on any byte
//! snapshot: a freshly prepared placeholder, or an already signed file being
//! checked again.

use super::types::SignaturePlaceholder;
use crate::error::{Error, Result};
use crate::lexer::{is_whitespace, literal_string_len};
use std::ops::Range;

const CONTENTS_MARKER: &[u8] = b"/Contents";
const BYTE_RANGE_MARKER: &[u8] = b"/ByteRange";

/// Longest `/ByteRange` array accepted, brackets included.
const MAX_BYTE_RANGE_LEN: usize = 512;

/// Encoding of a `/Contents` string.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentsEncoding {
    /// `<...>` hex string
    Hex,
    /// `(...)` literal string
    Literal,
}

/// Location of a `/Contents` string body, delimiters excluded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContentsSpan {
    /// First byte after the opening delimiter
    pub start: usize,
    /// Offset of the closing delimiter
    pub end: usize,
    /// String form
    pub encoding: ContentsEncoding,
}

impl ContentsSpan {
    /// Length of the string body.
    pub fn len(&self) -> usize {
        self.end - self.start
    }

    /// Whether the string body is empty.
    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }
}

/// Locate the first signature placeholder in `pdf`.
pub fn locate_placeholder(pdf: &[u8]) -> Result<SignaturePlaceholder> {
    locate_placeholder_from(pdf, 0)
}

/// Locate the first signature placeholder at or after byte `start`.
///
/// Only a hex `/Contents` string qualifies. `/ByteRange` fields may hold
/// filler or concrete numbers.
pub fn locate_placeholder_from(pdf: &[u8], start: usize) -> Result<SignaturePlaceholder> {
    let contents =
        scan_contents(pdf, start, false).ok_or(Error::PlaceholderNotFound {
            marker: "/Contents <",
            searched_from: start,
        })?;
    let byte_range = find_byte_range(pdf, start).ok_or(Error::PlaceholderNotFound {
        marker: "/ByteRange [",
        searched_from: start,
    })?;

    log::debug!(
        "Placeholder: contents {}..{}, ByteRange {}..{}",
        contents.start,
        contents.end,
        byte_range.start,
        byte_range.end
    );

    Ok(SignaturePlaceholder {
        contents_start: contents.start,
        contents_end: contents.end,
        byte_range_start: byte_range.start,
        byte_range_end: byte_range.end,
        capacity_hex_chars: contents.len(),
    })
}

/// Locate the signature placeholder inside `span` only.
///
/// Used once the signature object's position is known, so that `/Contents`
/// strings of other objects (annotation text, earlier signatures) are never
/// taken for the placeholder.
pub fn locate_placeholder_within(pdf: &[u8], span: Range<usize>) -> Result<SignaturePlaceholder> {
    let end = span.end.min(pdf.len());
    locate_placeholder_from(&pdf[..end], span.start)
}

/// Find the first `/Contents` string at or after `from`, hex or literal.
///
/// `/Contents` entries holding references or arrays (page content streams)
/// are skipped.
pub fn find_contents(pdf: &[u8], from: usize) -> Option<ContentsSpan> {
    scan_contents(pdf, from, true)
}

fn scan_contents(pdf: &[u8], from: usize, accept_literal: bool) -> Option<ContentsSpan> {
    let mut pos = from;
    while let Some(found) = find_bytes(pdf, pos, CONTENTS_MARKER) {
        let value = skip_whitespace(pdf, found + CONTENTS_MARKER.len());
        pos = found + CONTENTS_MARKER.len();

        match pdf.get(value) {
            Some(b'<') if pdf.get(value + 1) != Some(&b'<') => {
                let start = value + 1;
                let len = pdf[start..]
                    .iter()
                    .position(|&c| !(c.is_ascii_hexdigit() || is_whitespace(c)));
                if let Some(len) = len {
                    if pdf[start + len] == b'>' {
                        return Some(ContentsSpan {
                            start,
                            end: start + len,
                            encoding: ContentsEncoding::Hex,
                        });
                    }
                }
            },
            Some(b'(') if accept_literal => {
                let start = value + 1;
                if let Some(len) = literal_string_len(&pdf[start..]) {
                    return Some(ContentsSpan {
                        start,
                        end: start + len,
                        encoding: ContentsEncoding::Literal,
                    });
                }
            },
            _ => {},
        }
    }
    None
}

/// Find the first `/ByteRange [...]` array at or after `from`.
///
/// Returns the span from `[` to just past `]`.
pub fn find_byte_range(pdf: &[u8], from: usize) -> Option<Range<usize>> {
    let mut pos = from;
    while let Some(found) = find_bytes(pdf, pos, BYTE_RANGE_MARKER) {
        pos = found + BYTE_RANGE_MARKER.len();
        let open = skip_whitespace(pdf, pos);
        if pdf.get(open) != Some(&b'[') {
            continue;
        }
        let window_end = (open + MAX_BYTE_RANGE_LEN).min(pdf.len());
        if let Some(close) = pdf[open..window_end].iter().position(|&c| c == b']') {
            return Some(open..open + close + 1);
        }
    }
    None
}

/// Character slots of the four `/ByteRange` fields.
///
/// A slot runs from the first character of a field to the separator before
/// the next field; the last slot runs up to `]`. Writing a value left-aligned
/// and space-padded within its slot keeps the array length unchanged.
pub fn byte_range_slots(pdf: &[u8], placeholder: &SignaturePlaceholder) -> Result<[Range<usize>; 4]> {
    let inner_start = placeholder.byte_range_start + 1;
    let inner_end = placeholder.byte_range_end.saturating_sub(1);
    let inner = pdf.get(inner_start..inner_end).ok_or_else(|| {
        Error::InvalidPdfFormat(format!(
            "/ByteRange span {}..{} is not inside the file",
            placeholder.byte_range_start, placeholder.byte_range_end
        ))
    })?;

    let mut starts = Vec::with_capacity(4);
    for (i, &c) in inner.iter().enumerate() {
        let begins_token = !is_whitespace(c) && (i == 0 || is_whitespace(inner[i - 1]));
        if begins_token {
            starts.push(inner_start + i);
        }
    }
    if starts.len() != 4 {
        return Err(Error::InvalidPdfFormat(format!(
            "/ByteRange at byte {} has {} fields, expected 4",
            placeholder.byte_range_start,
            starts.len()
        )));
    }

    Ok([
        starts[0]..starts[1] - 1,
        starts[1]..starts[2] - 1,
        starts[2]..starts[3] - 1,
        starts[3]..inner_end,
    ])
}

/// Concrete `/ByteRange` values, or `None` while the fields are still
/// filler (nines or asterisks) or unreadable.
pub fn parse_byte_range_values(pdf: &[u8], placeholder: &SignaturePlaceholder) -> Option<[u64; 4]> {
    parse_byte_range_array(pdf.get(placeholder.byte_range_start..placeholder.byte_range_end)?)
}

/// Concrete values of a `[a b c d]` array, as [`parse_byte_range_values`].
pub fn parse_byte_range_array(array: &[u8]) -> Option<[u64; 4]> {
    let inner = array.strip_prefix(b"[")?.strip_suffix(b"]")?;
    let fields: Vec<&[u8]> = inner
        .split(|&c| is_whitespace(c))
        .filter(|field| !field.is_empty())
        .collect();
    if fields.len() != 4 || !fields.iter().all(|f| f.iter().all(u8::is_ascii_digit)) {
        return None;
    }
    if fields.iter().all(|f| f.iter().all(|&c| c == b'9')) {
        return None;
    }

    let mut values = [0u64; 4];
    for (value, field) in values.iter_mut().zip(&fields) {
        *value = std::str::from_utf8(field).ok()?.parse().ok()?;
    }
    Some(values)
}

pub(crate) fn find_bytes(haystack: &[u8], from: usize, needle: &[u8]) -> Option<usize> {
    if from >= haystack.len() {
        return None;
    }
    haystack[from..]
        .windows(needle.len())
        .position(|w| w == needle)
        .map(|p| from + p)
}

fn skip_whitespace(pdf: &[u8], mut pos: usize) -> usize {
    while pos < pdf.len() && is_whitespace(pdf[pos]) {
        pos += 1;
    }
    pos
}

#[cfg(test)]
mod tests {
    use super::*;

    const SIG: &[u8] = b"5 0 obj\n<< /Type /Sig /ByteRange [9999999999 9999999999 9999999999 9999999999]\n/Contents <0000000000> >>\nendobj\n";

    #[test]
    fn test_locate_placeholder() {
        let p = locate_placeholder(SIG).unwrap();
        assert_eq!(&SIG[p.contents_start - 1..p.contents_start], b"<");
        assert_eq!(&SIG[p.contents_end..p.contents_end + 1], b">");
        assert_eq!(p.capacity_hex_chars, 10);
        assert_eq!(SIG[p.byte_range_start], b'[');
        assert_eq!(SIG[p.byte_range_end - 1], b']');
    }

    #[test]
    fn test_missing_markers() {
        let err = locate_placeholder(b"<< /Type /Sig /ByteRange [0 1 2 3] >>").unwrap_err();
        assert!(matches!(err, Error::PlaceholderNotFound { marker: "/Contents <", .. }));

        let err = locate_placeholder(b"<< /Type /Sig /Contents <00> >>").unwrap_err();
        assert!(matches!(err, Error::PlaceholderNotFound { marker: "/ByteRange [", .. }));
    }

    #[test]
    fn test_page_contents_reference_skipped() {
        let pdf = b"3 0 obj << /Type /Page /Contents 4 0 R >> endobj 5 0 obj << /Contents <ABCD> /ByteRange [0 1 2 3] >> endobj";
        let p = locate_placeholder(pdf).unwrap();
        assert_eq!(&pdf[p.contents_start..p.contents_end], b"ABCD");
    }

    #[test]
    fn test_search_start_skips_earlier_signature() {
        let mut pdf = SIG.to_vec();
        let original_len = pdf.len();
        pdf.extend_from_slice(b"6 0 obj\n<< /ByteRange [1 2 3 4] /Contents <1234> >>\nendobj\n");
        let p = locate_placeholder_from(&pdf, original_len).unwrap();
        assert_eq!(&pdf[p.contents_start..p.contents_end], b"1234");
        assert!(p.byte_range_start > original_len);
    }

    #[test]
    fn test_within_ignores_other_objects() {
        let mut pdf = b"3 0 obj\n<< /Annots [<< /Subtype /Text /Contents <FEFF0048> >>] >>\nendobj\n".to_vec();
        let sig_start = pdf.len();
        pdf.extend_from_slice(SIG);
        pdf.extend_from_slice(b"6 0 obj\n<< /Contents <ABCD> >>\nendobj\n");

        assert_eq!(locate_placeholder(&pdf).unwrap().capacity_hex_chars, 8);
        let p = locate_placeholder_within(&pdf, sig_start..sig_start + SIG.len()).unwrap();
        assert_eq!(p.capacity_hex_chars, 10);
        assert!(p.contents_start > sig_start && p.byte_range_start > sig_start);

        let err = locate_placeholder_within(&pdf, 0..sig_start).unwrap_err();
        assert!(matches!(err, Error::PlaceholderNotFound { marker: "/ByteRange [", .. }));
    }

    #[test]
    fn test_literal_contents_detected_but_not_a_placeholder() {
        let pdf = b"<< /Type /Sig /Contents (a\\)b) /ByteRange [0 1 2 3] >>";
        let span = find_contents(pdf, 0).unwrap();
        assert_eq!(span.encoding, ContentsEncoding::Literal);
        assert_eq!(&pdf[span.start..span.end], b"a\\)b");
        assert!(locate_placeholder(pdf).is_err());
    }

    #[test]
    fn test_dictionary_after_contents_is_not_hex() {
        assert!(find_contents(b"/Contents << /Length 3 >>", 0).is_none());
    }

    #[test]
    fn test_byte_range_slots() {
        let p = locate_placeholder(SIG).unwrap();
        let slots = byte_range_slots(SIG, &p).unwrap();
        for slot in &slots {
            assert_eq!(slot.len(), 10);
            assert!(SIG[slot.clone()].iter().all(|&c| c == b'9'));
        }
    }

    #[test]
    fn test_byte_range_slots_wrong_arity() {
        let pdf = b"/ByteRange [0 1 2] /Contents <00>";
        let p = locate_placeholder(pdf).unwrap();
        assert!(byte_range_slots(pdf, &p).is_err());
    }

    #[test]
    fn test_parse_byte_range_values() {
        let p = locate_placeholder(SIG).unwrap();
        assert_eq!(parse_byte_range_values(SIG, &p), None);

        let stars = b"/ByteRange [********** ********** ********** **********] /Contents <00>";
        let p = locate_placeholder(stars).unwrap();
        assert_eq!(parse_byte_range_values(stars, &p), None);

        let concrete = b"/ByteRange [0          120        150        40        ] /Contents <00>";
        let p = locate_placeholder(concrete).unwrap();
        assert_eq!(parse_byte_range_values(concrete, &p), Some([0, 120, 150, 40]));
    }
}
