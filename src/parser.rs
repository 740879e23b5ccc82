//! PDF object parser.
//!
//! Recursive descent over [`lexer`](crate::lexer) tokens producing [`Object`]
//! values. [`parse_object`] is the nom-level entry point; [`parse_indirect_object`]
//! wraps it for `N G obj ... endobj` definitions found through the
//! cross-reference table and reports failures as crate errors with byte
//! offsets.

use crate::error::{Error, Result};
use crate::lexer::{token, Token};
use crate::object::{Dictionary, Object, ObjectRef};
use nom::error::{Error as NomError, ErrorKind};
use nom::IResult;

/// Maximum nesting of arrays and dictionaries.
pub const MAX_NESTING: u32 = 256;

/// Decode the escape sequences of a literal string body.
///
/// Handles the single-character escapes, `\ddd` octal codes and backslash
/// line continuations. Unknown escapes keep the escaped byte.
///
/// ```
/// # use pdf_seal::parser::decode_literal_string;
/// assert_eq!(decode_literal_string(b"Signed as \\(CEO\\)"), b"Signed as (CEO)");
/// assert_eq!(decode_literal_string(b"\\101BC"), b"ABC");
/// ```
pub fn decode_literal_string(raw: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(raw.len());
    let mut iter = raw.iter().copied().peekable();

    while let Some(b) = iter.next() {
        if b != b'\\' {
            out.push(b);
            continue;
        }
        let Some(esc) = iter.next() else {
            break;
        };
        match esc {
            b'n' => out.push(b'\n'),
            b'r' => out.push(b'\r'),
            b't' => out.push(b'\t'),
            b'b' => out.push(0x08),
            b'f' => out.push(0x0C),
            b'\n' => {},
            b'\r' => {
                if iter.peek() == Some(&b'\n') {
                    iter.next();
                }
            },
            b'0'..=b'7' => {
                let mut code = u32::from(esc - b'0');
                for _ in 0..2 {
                    match iter.peek() {
                        Some(&d @ b'0'..=b'7') => {
                            code = code * 8 + u32::from(d - b'0');
                            iter.next();
                        },
                        _ => break,
                    }
                }
                out.push((code & 0xFF) as u8);
            },
            other => out.push(other),
        }
    }

    out
}

/// Decode a hex string body. Whitespace is ignored and an odd trailing digit
/// is padded with `0`.
pub fn decode_hex(hex: &[u8]) -> Result<Vec<u8>> {
    let digits: Vec<u8> = hex.iter().copied().filter(|c| !c.is_ascii_whitespace()).collect();
    let mut out = Vec::with_capacity(digits.len().div_ceil(2));
    for chunk in digits.chunks(2) {
        let hi = hex_value(chunk[0])?;
        let lo = match chunk.get(1) {
            Some(&c) => hex_value(c)?,
            None => 0,
        };
        out.push((hi << 4) | lo);
    }
    Ok(out)
}

fn hex_value(c: u8) -> Result<u8> {
    match c {
        b'0'..=b'9' => Ok(c - b'0'),
        b'a'..=b'f' => Ok(c - b'a' + 10),
        b'A'..=b'F' => Ok(c - b'A' + 10),
        _ => Err(Error::Decode(format!("invalid hex digit 0x{:02X}", c))),
    }
}

fn fail(input: &[u8], kind: ErrorKind) -> nom::Err<NomError<&[u8]>> {
    nom::Err::Error(NomError::new(input, kind))
}

/// Parse one PDF object.
///
/// `N G R` triples become [`Object::Reference`]; a dictionary followed by
/// the `stream` keyword becomes [`Object::Stream`].
pub fn parse_object(input: &[u8]) -> IResult<&[u8], Object> {
    parse_nested(input, 0)
}

fn parse_nested(input: &[u8], depth: u32) -> IResult<&[u8], Object> {
    if depth > MAX_NESTING {
        return Err(nom::Err::Failure(NomError::new(input, ErrorKind::TooLarge)));
    }

    let (rest, tok) = token(input)?;
    match tok {
        Token::Null => Ok((rest, Object::Null)),
        Token::True => Ok((rest, Object::Boolean(true))),
        Token::False => Ok((rest, Object::Boolean(false))),
        Token::Real(r) => Ok((rest, Object::Real(r))),
        Token::Name(name) => Ok((rest, Object::Name(name))),
        Token::LiteralString(raw) => Ok((rest, Object::String(decode_literal_string(raw)))),
        Token::HexString(raw) => {
            let bytes = decode_hex(raw).map_err(|_| fail(input, ErrorKind::HexDigit))?;
            Ok((rest, Object::String(bytes)))
        },
        Token::Integer(n) => {
            if let Ok((after_gen, Token::Integer(gen))) = token(rest) {
                if let Ok((after_r, Token::R)) = token(after_gen) {
                    if n >= 0 && (0..=i64::from(u16::MAX)).contains(&gen) {
                        let r = ObjectRef::new(n as u32, gen as u16);
                        return Ok((after_r, Object::Reference(r)));
                    }
                }
            }
            Ok((rest, Object::Integer(n)))
        },
        Token::ArrayStart => parse_array(rest, depth),
        Token::DictStart => {
            let (rest, dict) = parse_dictionary(rest, depth)?;
            match token(rest) {
                Ok((data, Token::StreamStart)) => {
                    let (rest, data) = parse_stream_data(data, &dict)?;
                    Ok((rest, Object::Stream { dict, data: bytes::Bytes::from(data) }))
                },
                _ => Ok((rest, Object::Dictionary(dict))),
            }
        },
        _ => Err(fail(input, ErrorKind::Tag)),
    }
}

fn parse_array(mut input: &[u8], depth: u32) -> IResult<&[u8], Object> {
    let mut items = Vec::new();
    loop {
        if let Ok((rest, Token::ArrayEnd)) = token(input) {
            return Ok((rest, Object::Array(items)));
        }
        let (rest, item) = parse_nested(input, depth + 1)?;
        items.push(item);
        input = rest;
    }
}

fn parse_dictionary(mut input: &[u8], depth: u32) -> IResult<&[u8], Dictionary> {
    let mut dict = Dictionary::new();
    loop {
        let (rest, tok) = token(input)?;
        match tok {
            Token::DictEnd => return Ok((rest, dict)),
            Token::Name(key) => {
                let (rest, value) = parse_nested(rest, depth + 1)?;
                // A null value is equivalent to an absent key
                if value != Object::Null {
                    dict.insert(key, value);
                }
                input = rest;
            },
            _ => return Err(fail(input, ErrorKind::Tag)),
        }
    }
}

/// Read stream bytes following the `stream` keyword.
///
/// A direct `/Length` is trusted when `endstream` follows it; otherwise the
/// data runs to the next `endstream`, minus the end-of-line before it.
fn parse_stream_data<'a>(input: &'a [u8], dict: &Dictionary) -> IResult<&'a [u8], Vec<u8>> {
    let data = if let Some(rest) = input.strip_prefix(b"\r\n") {
        rest
    } else if let Some(rest) = input.strip_prefix(b"\n").or_else(|| input.strip_prefix(b"\r")) {
        rest
    } else {
        input
    };

    if let Some(len) = dict.get("Length").and_then(Object::as_integer) {
        let len = len.max(0) as usize;
        if len <= data.len() {
            if let Ok((rest, Token::StreamEnd)) = token(&data[len..]) {
                return Ok((rest, data[..len].to_vec()));
            }
        }
        log::warn!("Stream /Length {} does not reach endstream, scanning instead", len);
    }

    let pos = find_endstream(data).ok_or_else(|| fail(data, ErrorKind::Eof))?;
    let mut end = pos;
    if end > 0 && data[end - 1] == b'\n' {
        end -= 1;
    }
    if end > 0 && data[end - 1] == b'\r' {
        end -= 1;
    }
    let rest = &data[pos + b"endstream".len()..];
    Ok((rest, data[..end].to_vec()))
}

fn find_endstream(input: &[u8]) -> Option<usize> {
    input.windows(b"endstream".len()).position(|w| w == b"endstream")
}

/// Parse an indirect object definition `N G obj <object> endobj` at `offset`.
///
/// Returns the object's reference, its value, and the offset just past the
/// object (past `endobj` when present).
pub fn parse_indirect_object(pdf: &[u8], offset: usize) -> Result<(ObjectRef, Object, usize)> {
    let input = pdf.get(offset..).ok_or_else(|| Error::ParseError {
        offset,
        reason: "offset beyond end of file".to_string(),
    })?;

    let header_err = |reason: &str| Error::ParseError {
        offset,
        reason: reason.to_string(),
    };

    let (rest, id) = match token(input) {
        Ok((rest, Token::Integer(n))) if n >= 0 => (rest, n as u32),
        _ => return Err(header_err("expected object number")),
    };
    let (rest, gen) = match token(rest) {
        Ok((rest, Token::Integer(g))) if (0..=i64::from(u16::MAX)).contains(&g) => (rest, g as u16),
        _ => return Err(header_err("expected generation number")),
    };
    let rest = match token(rest) {
        Ok((rest, Token::ObjStart)) => rest,
        _ => return Err(header_err("expected 'obj' keyword")),
    };

    let (rest, object) = parse_object(rest).map_err(|e| {
        let at = match &e {
            nom::Err::Error(inner) | nom::Err::Failure(inner) => pdf.len() - inner.input.len(),
            nom::Err::Incomplete(_) => pdf.len(),
        };
        if let nom::Err::Failure(NomError { code: ErrorKind::TooLarge, .. }) = e {
            return Error::RecursionLimitExceeded(MAX_NESTING);
        }
        Error::ParseError {
            offset: at,
            reason: format!("malformed body of object {} {}", id, gen),
        }
    })?;

    let rest = match token(rest) {
        Ok((after, Token::ObjEnd)) => after,
        _ => {
            log::warn!("Object {} {} at byte {} is missing endobj", id, gen, offset);
            rest
        },
    };

    Ok((ObjectRef::new(id, gen), object, pdf.len() - rest.len()))
}
