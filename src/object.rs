//! PDF object types.

use crate::error::{Error, Result};
use std::collections::HashMap;

/// Dictionary of PDF objects keyed by name (without the leading `/`).
pub type Dictionary = HashMap<String, Object>;

/// PDF object representation.
#[derive(Debug, Clone, PartialEq)]
pub enum Object {
    /// Null object
    Null,
    /// Boolean value
    Boolean(bool),
    /// Integer value
    Integer(i64),
    /// Real (floating-point) value
    Real(f64),
    /// String (byte array)
    String(Vec<u8>),
    /// Name (starting with /)
    Name(String),
    /// Array of objects
    Array(Vec<Object>),
    /// Dictionary (key-value pairs)
    Dictionary(Dictionary),
    /// Stream (dictionary + data)
    Stream {
        /// Stream dictionary
        dict: Dictionary,
        /// Raw (still encoded) stream data
        data: bytes::Bytes,
    },
    /// Indirect object reference
    Reference(ObjectRef),
}

/// Reference to an indirect object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectRef {
    /// Object number
    pub id: u32,
    /// Generation number
    pub gen: u16,
}

impl ObjectRef {
    /// Create a new object reference.
    pub fn new(id: u32, gen: u16) -> Self {
        Self { id, gen }
    }
}

impl std::fmt::Display for ObjectRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {} R", self.id, self.gen)
    }
}

impl Object {
    /// Get the type name of this object (without data).
    pub fn type_name(&self) -> &'static str {
        match self {
            Object::Null => "Null",
            Object::Boolean(_) => "Boolean",
            Object::Integer(_) => "Integer",
            Object::Real(_) => "Real",
            Object::String(_) => "String",
            Object::Name(_) => "Name",
            Object::Array(_) => "Array",
            Object::Dictionary(_) => "Dictionary",
            Object::Stream { .. } => "Stream",
            Object::Reference(_) => "Reference",
        }
    }

    /// Try to cast to integer.
    pub fn as_integer(&self) -> Option<i64> {
        match self {
            Object::Integer(i) => Some(*i),
            _ => None,
        }
    }

    /// Try to cast to name.
    pub fn as_name(&self) -> Option<&str> {
        match self {
            Object::Name(s) => Some(s),
            _ => None,
        }
    }

    /// Try to cast to dictionary. Works for both Dictionary and Stream objects.
    pub fn as_dict(&self) -> Option<&Dictionary> {
        match self {
            Object::Dictionary(d) => Some(d),
            Object::Stream { dict, .. } => Some(dict),
            _ => None,
        }
    }

    /// Try to cast to array.
    pub fn as_array(&self) -> Option<&Vec<Object>> {
        match self {
            Object::Array(arr) => Some(arr),
            _ => None,
        }
    }

    /// Try to cast to reference.
    pub fn as_reference(&self) -> Option<ObjectRef> {
        match self {
            Object::Reference(r) => Some(*r),
            _ => None,
        }
    }

    /// Try to cast to string (bytes).
    pub fn as_string(&self) -> Option<&[u8]> {
        match self {
            Object::String(s) => Some(s),
            _ => None,
        }
    }

    /// Value of `/Type` when this is a dictionary or stream.
    pub fn dict_type(&self) -> Option<&str> {
        self.as_dict()?.get("Type")?.as_name()
    }

    /// Consume the object and return its dictionary.
    pub fn into_dict(self) -> Result<Dictionary> {
        match self {
            Object::Dictionary(d) => Ok(d),
            Object::Stream { dict, .. } => Ok(dict),
            other => Err(Error::InvalidObjectType {
                expected: "Dictionary".to_string(),
                found: other.type_name().to_string(),
            }),
        }
    }

    /// Decode stream data using the filters named in the stream dictionary.
    pub fn decode_stream_data(&self) -> Result<Vec<u8>> {
        match self {
            Object::Stream { dict, data } => {
                let filters = dict
                    .get("Filter")
                    .map(extract_filter_names)
                    .unwrap_or_default();

                if filters.is_empty() {
                    Ok(data.to_vec())
                } else {
                    crate::decoders::decode_stream(data, &filters)
                }
            },
            _ => Err(Error::InvalidObjectType {
                expected: "Stream".to_string(),
                found: self.type_name().to_string(),
            }),
        }
    }
}

/// Extract filter names from a Filter object.
///
/// The Filter entry can be either a single Name (`/FlateDecode`) or an
/// Array of Names (`[/ASCII85Decode /FlateDecode]`).
fn extract_filter_names(filter_obj: &Object) -> Vec<String> {
    match filter_obj {
        Object::Name(name) => vec![name.clone()],
        Object::Array(arr) => arr
            .iter()
            .filter_map(|obj| obj.as_name().map(|s| s.to_string()))
            .collect(),
        _ => vec![],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::write::ZlibEncoder;
    use flate2::Compression;
    use std::io::Write;

    #[test]
    fn test_object_ref_display() {
        assert_eq!(ObjectRef::new(12, 0).to_string(), "12 0 R");
    }

    #[test]
    fn test_accessors() {
        assert_eq!(Object::Integer(7).as_integer(), Some(7));
        assert_eq!(Object::Name("Sig".into()).as_name(), Some("Sig"));
        assert_eq!(Object::String(b"x".to_vec()).as_string(), Some(&b"x"[..]));
        assert_eq!(Object::Reference(ObjectRef::new(3, 0)).as_reference(), Some(ObjectRef::new(3, 0)));
        assert!(Object::Null.as_dict().is_none());
        assert_eq!(Object::Array(vec![]).type_name(), "Array");
    }

    #[test]
    fn test_dict_type() {
        let mut dict = Dictionary::new();
        dict.insert("Type".to_string(), Object::Name("Catalog".to_string()));
        assert_eq!(Object::Dictionary(dict).dict_type(), Some("Catalog"));
        assert_eq!(Object::Integer(1).dict_type(), None);
    }

    #[test]
    fn test_into_dict_rejects_array() {
        let err = Object::Array(vec![]).into_dict().unwrap_err();
        assert!(matches!(err, Error::InvalidObjectType { .. }));
    }

    #[test]
    fn test_decode_flate_stream() {
        let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(b"1 0 2 5 << >> [ ]").unwrap();
        let compressed = encoder.finish().unwrap();

        let mut dict = Dictionary::new();
        dict.insert("Filter".to_string(), Object::Name("FlateDecode".to_string()));
        let stream = Object::Stream {
            dict,
            data: bytes::Bytes::from(compressed),
        };
        assert_eq!(stream.decode_stream_data().unwrap(), b"1 0 2 5 << >> [ ]");
    }

    #[test]
    fn test_decode_non_stream_fails() {
        assert!(Object::Integer(1).decode_stream_data().is_err());
    }
}
