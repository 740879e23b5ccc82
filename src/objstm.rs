//! Object stream expansion.
//!
//! A `/Type /ObjStm` stream packs `/N` objects: its decoded data starts with
//! `N` pairs of integers (object number, offset relative to `/First`),
//! followed by the object bodies. Normalization unpacks these so every
//! object can be written as a plain indirect object.

use crate::error::{Error, Result};
use crate::lexer::unsigned;
use crate::object::Object;
use crate::parser::parse_object;

const MAX_OBJECTS: i64 = 1_000_000;

/// Expand an object stream into `(object number, object)` pairs in stream
/// order.
///
/// Objects whose bodies cannot be parsed are skipped with a warning; a
/// stream whose header cannot be read is an error.
pub fn expand_object_stream(stream: &Object) -> Result<Vec<(u32, Object)>> {
    let dict = match stream {
        Object::Stream { dict, .. } => dict,
        other => {
            return Err(Error::InvalidObjectType {
                expected: "Stream".to_string(),
                found: other.type_name().to_string(),
            })
        },
    };
    if stream.dict_type() != Some("ObjStm") {
        return Err(Error::InvalidObjectType {
            expected: "ObjStm".to_string(),
            found: stream.dict_type().unwrap_or("untyped stream").to_string(),
        });
    }

    let n = dict.get("N").and_then(Object::as_integer).unwrap_or(-1);
    let first = dict.get("First").and_then(Object::as_integer).unwrap_or(-1);
    if !(0..=MAX_OBJECTS).contains(&n) || first < 0 {
        return Err(Error::Decode(format!("object stream has invalid /N {} or /First {}", n, first)));
    }
    let first = first as usize;

    let data = stream.decode_stream_data()?;
    if data.len() < first {
        return Err(Error::Decode(format!(
            "object stream data is {} bytes, /First is {}",
            data.len(),
            first
        )));
    }

    let mut header = &data[..first];
    let mut index = Vec::with_capacity(n as usize);
    for _ in 0..n {
        let (rest, number) =
            unsigned(header).map_err(|_| Error::Decode("truncated object stream header".to_string()))?;
        let (rest, offset) =
            unsigned(rest).map_err(|_| Error::Decode("truncated object stream header".to_string()))?;
        let number = u32::try_from(number).map_err(|_| Error::Decode("object number overflow".to_string()))?;
        index.push((number, first.saturating_add(offset as usize)));
        header = rest;
    }

    let mut objects = Vec::with_capacity(index.len());
    for (number, start) in index {
        let parsed = data.get(start..).map(parse_object);
        match parsed {
            Some(Ok((_, object))) => objects.push((number, object)),
            _ => log::warn!("Skipping unreadable object {} in object stream", number),
        }
    }

    Ok(objects)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::object::Dictionary;
    use flate2::write::ZlibEncoder;
    use flate2::Compression;
    use std::io::Write;

    fn objstm(body: &[u8], n: i64, first: i64) -> Object {
        let mut enc = ZlibEncoder::new(Vec::new(), Compression::default());
        enc.write_all(body).unwrap();
        let mut dict = Dictionary::new();
        dict.insert("Type".to_string(), Object::Name("ObjStm".to_string()));
        dict.insert("Filter".to_string(), Object::Name("FlateDecode".to_string()));
        dict.insert("N".to_string(), Object::Integer(n));
        dict.insert("First".to_string(), Object::Integer(first));
        Object::Stream {
            dict,
            data: bytes::Bytes::from(enc.finish().unwrap()),
        }
    }

    #[test]
    fn test_expand() {
        let header = b"2 0 3 28 ";
        let body = b"<< /Type /Pages /Count 1 >> << /Type /Page >>";
        let mut data = header.to_vec();
        data.extend_from_slice(body);
        let objects = expand_object_stream(&objstm(&data, 2, header.len() as i64)).unwrap();
        assert_eq!(objects.len(), 2);
        assert_eq!(objects[0].0, 2);
        assert_eq!(objects[0].1.dict_type(), Some("Pages"));
        assert_eq!(objects[1].0, 3);
        assert_eq!(objects[1].1.dict_type(), Some("Page"));
    }

    #[test]
    fn test_first_beyond_data() {
        let err = expand_object_stream(&objstm(b"1 0 ", 1, 500)).unwrap_err();
        assert!(matches!(err, Error::Decode(_)));
    }

    #[test]
    fn test_not_an_object_stream() {
        assert!(expand_object_stream(&Object::Integer(4)).is_err());
        let mut stream = objstm(b"", 0, 0);
        if let Object::Stream { dict, .. } = &mut stream {
            dict.insert("Type".to_string(), Object::Name("XRef".to_string()));
        }
        assert!(expand_object_stream(&stream).is_err());
    }
}
