//! PDF object serialization.
//!
//! Renders [`Object`] values back to PDF syntax. Output is compact and
//! deterministic: dictionary keys are written in sorted order so the same
//! object always produces the same bytes.

use crate::object::{Dictionary, Object};

/// Serializer for PDF objects.
#[derive(Debug, Clone, Copy, Default)]
pub struct ObjectSerializer;

impl ObjectSerializer {
    /// Create a serializer.
    pub fn new() -> Self {
        Self
    }

    /// Serialize an object to bytes.
    pub fn serialize(&self, obj: &Object) -> Vec<u8> {
        let mut out = Vec::new();
        self.write_object(&mut out, obj);
        out
    }

    /// Serialize an indirect object definition: `{id} {gen} obj\n{object}\nendobj\n`.
    pub fn serialize_indirect(&self, id: u32, gen: u16, obj: &Object) -> Vec<u8> {
        let mut out = format!("{} {} obj\n", id, gen).into_bytes();
        self.write_object(&mut out, obj);
        out.extend_from_slice(b"\nendobj\n");
        out
    }

    fn write_object(&self, out: &mut Vec<u8>, obj: &Object) {
        match obj {
            Object::Null => out.extend_from_slice(b"null"),
            Object::Boolean(true) => out.extend_from_slice(b"true"),
            Object::Boolean(false) => out.extend_from_slice(b"false"),
            Object::Integer(i) => out.extend_from_slice(i.to_string().as_bytes()),
            Object::Real(r) => out.extend_from_slice(format_real(*r).as_bytes()),
            Object::String(s) => write_string(out, s),
            Object::Name(n) => write_name(out, n),
            Object::Array(items) => {
                out.push(b'[');
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        out.push(b' ');
                    }
                    self.write_object(out, item);
                }
                out.push(b']');
            },
            Object::Dictionary(dict) => self.write_dictionary(out, dict),
            Object::Stream { dict, data } => {
                let mut dict = dict.clone();
                dict.insert("Length".to_string(), Object::Integer(data.len() as i64));
                self.write_dictionary(out, &dict);
                out.extend_from_slice(b"\nstream\n");
                out.extend_from_slice(data);
                out.extend_from_slice(b"\nendstream");
            },
            Object::Reference(r) => out.extend_from_slice(r.to_string().as_bytes()),
        }
    }

    fn write_dictionary(&self, out: &mut Vec<u8>, dict: &Dictionary) {
        let mut keys: Vec<&String> = dict.keys().collect();
        keys.sort();

        out.extend_from_slice(b"<<");
        for key in keys {
            out.push(b' ');
            write_name(out, key);
            out.push(b' ');
            self.write_object(out, &dict[key]);
        }
        out.extend_from_slice(b" >>");
    }
}

/// Format a real number with at most five decimals and no trailing zeros.
fn format_real(value: f64) -> String {
    if !value.is_finite() {
        return "0".to_string();
    }
    if value.fract() == 0.0 && value.abs() < 1e15 {
        return format!("{}", value as i64);
    }
    let formatted = format!("{:.5}", value);
    formatted.trim_end_matches('0').trim_end_matches('.').to_string()
}

/// Write a string as a literal when it is printable ASCII, otherwise as hex.
fn write_string(out: &mut Vec<u8>, data: &[u8]) {
    let printable = data
        .iter()
        .all(|&b| matches!(b, b'\n' | b'\r' | b'\t' | 0x20..=0x7E));

    if printable {
        out.extend_from_slice(escape_literal(data).as_bytes());
    } else {
        out.push(b'<');
        out.extend_from_slice(crate::signatures::bytes_to_hex(data).as_bytes());
        out.push(b'>');
    }
}

/// Escape printable bytes as a parenthesised literal string.
pub fn escape_literal(data: &[u8]) -> String {
    let mut s = String::with_capacity(data.len() + 2);
    s.push('(');
    for &b in data {
        match b {
            b'(' => s.push_str("\\("),
            b')' => s.push_str("\\)"),
            b'\\' => s.push_str("\\\\"),
            b'\n' => s.push_str("\\n"),
            b'\r' => s.push_str("\\r"),
            b'\t' => s.push_str("\\t"),
            _ => s.push(b as char),
        }
    }
    s.push(')');
    s
}

/// Write a name, escaping delimiters, whitespace, `#` and non-ASCII as `#XX`.
fn write_name(out: &mut Vec<u8>, name: &str) {
    out.push(b'/');
    for b in name.bytes() {
        let regular = (0x21..=0x7E).contains(&b)
            && !matches!(b, b'#' | b'(' | b')' | b'<' | b'>' | b'[' | b']' | b'{' | b'}' | b'/' | b'%');
        if regular {
            out.push(b);
        } else {
            out.extend_from_slice(format!("#{:02X}", b).as_bytes());
        }
    }
}

/// Encode text as a PDF text string: ASCII stays as is, anything else
/// becomes UTF-16BE with a byte order mark.
pub fn text_string(text: &str) -> Object {
    if text.is_ascii() {
        return Object::String(text.as_bytes().to_vec());
    }
    let mut bytes = vec![0xFE, 0xFF];
    for unit in text.encode_utf16() {
        bytes.extend_from_slice(&unit.to_be_bytes());
    }
    Object::String(bytes)
}
