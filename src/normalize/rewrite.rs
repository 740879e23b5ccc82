//! Built-in normalization by full rewrite.
//!
//! Every `N G obj` header in the file is parsed, in file order, so later
//! definitions replace earlier ones the same way incremental updates do.
//! Object streams are unpacked, cross-reference and object streams are
//! dropped, and the result is written out with a single classic xref table.

use super::Normalizer;
use crate::document::find_header;
use crate::error::{Error, Result};
use crate::object::{Dictionary, Object, ObjectRef};
use crate::objstm::expand_object_stream;
use crate::parser::{parse_indirect_object, parse_object};
use crate::writer::ObjectSerializer;
use lazy_static::lazy_static;
use regex::bytes::Regex;
use std::collections::BTreeMap;

lazy_static! {
    static ref RE_OBJ_HEADER: Regex = Regex::new(r"(?-u)(\d+)\s+(\d+)\s+obj").unwrap();
    static ref RE_TRAILER: Regex = Regex::new(r"(?-u)trailer\s*<<").unwrap();
}

/// Trailer keys carried over into the rewritten file.
const TRAILER_KEYS: [&str; 4] = ["Root", "Info", "ID", "Encrypt"];

/// Rewrites a document with uncompressed objects and a classic xref table.
#[derive(Debug, Clone, Copy, Default)]
pub struct RewriteNormalizer;

impl RewriteNormalizer {
    /// Create the normalizer.
    pub fn new() -> Self {
        Self
    }
}

impl Normalizer for RewriteNormalizer {
    fn name(&self) -> &'static str {
        "built-in rewrite"
    }

    fn normalize(&self, pdf: &[u8]) -> Result<Vec<u8>> {
        let header = find_header(pdf)
            .ok_or_else(|| Error::InvalidPdfFormat("missing %PDF header".to_string()))?;
        let version = header_version(&pdf[header..]);

        let (mut objects, mut trailer) = scan_objects(pdf);
        for (key, value) in scan_trailers(pdf) {
            trailer.insert(key, value);
        }
        if trailer.contains_key("Encrypt") {
            return Err(Error::Unsupported("normalizing encrypted documents".to_string()));
        }

        unpack_object_streams(&mut objects);
        if objects.is_empty() {
            return Err(Error::InvalidPdfFormat("no objects found".to_string()));
        }

        let root = resolve_root(&trailer, &objects)?;
        log::debug!("Rewriting {} objects, catalog {}", objects.len(), root);

        Ok(write_document(&version, &objects, &trailer, root))
    }
}

fn header_version(header: &[u8]) -> String {
    let digits: String = header[5..]
        .iter()
        .take_while(|c| c.is_ascii_digit() || **c == b'.')
        .map(|&c| c as char)
        .collect();
    if digits.is_empty() {
        "1.4".to_string()
    } else {
        digits
    }
}

/// Parse every object definition. Cross-reference streams contribute their
/// trailer keys; later definitions of a number replace earlier ones.
fn scan_objects(pdf: &[u8]) -> (BTreeMap<u32, (u16, Object)>, Dictionary) {
    let mut objects = BTreeMap::new();
    let mut trailer = Dictionary::new();
    let mut resume_at = 0;

    for m in RE_OBJ_HEADER.find_iter(pdf) {
        let start = m.start();
        if start < resume_at || (start > 0 && pdf[start - 1].is_ascii_digit()) {
            continue;
        }
        match parse_indirect_object(pdf, start) {
            Ok((r, object, end)) => {
                resume_at = end;
                if object.dict_type() == Some("XRef") {
                    if let Some(dict) = object.as_dict() {
                        for key in TRAILER_KEYS {
                            if let Some(value) = dict.get(key) {
                                trailer.insert(key.to_string(), value.clone());
                            }
                        }
                    }
                }
                objects.insert(r.id, (r.gen, object));
            },
            Err(e) => log::warn!("Skipping unreadable object at byte {}: {}", start, e),
        }
    }

    (objects, trailer)
}

/// Trailer keys from classic trailers, later trailers winning.
fn scan_trailers(pdf: &[u8]) -> Dictionary {
    let mut merged = Dictionary::new();
    for m in RE_TRAILER.find_iter(pdf) {
        let dict_start = m.end() - 2;
        if let Ok((_, Object::Dictionary(dict))) = parse_object(&pdf[dict_start..]) {
            for key in TRAILER_KEYS {
                if let Some(value) = dict.get(key) {
                    merged.insert(key.to_string(), value.clone());
                }
            }
        }
    }
    merged
}

/// Replace object streams by their contents and drop xref streams.
///
/// Objects defined directly in the file win over compressed copies.
fn unpack_object_streams(objects: &mut BTreeMap<u32, (u16, Object)>) {
    let streams: Vec<u32> = objects
        .iter()
        .filter(|(_, (_, obj))| obj.dict_type() == Some("ObjStm"))
        .map(|(num, _)| *num)
        .collect();

    let mut unpacked = Vec::new();
    for num in &streams {
        if let Some((_, stream)) = objects.get(num) {
            match expand_object_stream(stream) {
                Ok(contained) => unpacked.extend(contained),
                Err(e) => log::warn!("Cannot expand object stream {}: {}", num, e),
            }
        }
    }

    objects.retain(|_, (_, obj)| !matches!(obj.dict_type(), Some("ObjStm") | Some("XRef")));
    for (num, object) in unpacked {
        objects.entry(num).or_insert((0, object));
    }
}

fn resolve_root(trailer: &Dictionary, objects: &BTreeMap<u32, (u16, Object)>) -> Result<ObjectRef> {
    if let Some(r) = trailer.get("Root").and_then(Object::as_reference) {
        if objects.get(&r.id).is_some_and(|(_, obj)| obj.as_dict().is_some()) {
            return Ok(ObjectRef::new(r.id, objects[&r.id].0));
        }
        log::warn!("Trailer /Root {} is missing, searching for the catalog", r);
    }

    objects
        .iter()
        .rev()
        .find(|(_, (_, obj))| obj.dict_type() == Some("Catalog"))
        .map(|(num, (gen, _))| ObjectRef::new(*num, *gen))
        .ok_or_else(|| Error::InvalidPdfFormat("document catalog not found".to_string()))
}

fn write_document(
    version: &str,
    objects: &BTreeMap<u32, (u16, Object)>,
    trailer: &Dictionary,
    root: ObjectRef,
) -> Vec<u8> {
    let serializer = ObjectSerializer::new();
    let mut out = format!("%PDF-{}\n", version).into_bytes();
    out.extend_from_slice(b"%\xE2\xE3\xCF\xD3\n");

    let mut offsets = Vec::with_capacity(objects.len());
    for (&num, (gen, object)) in objects {
        offsets.push((num, *gen, out.len()));
        out.extend_from_slice(&serializer.serialize_indirect(num, *gen, object));
    }

    let max = objects.keys().next_back().copied().unwrap_or(0);
    let xref_offset = out.len();
    out.extend_from_slice(&full_xref_table(&offsets, max));

    let mut new_trailer = Dictionary::new();
    new_trailer.insert("Size".to_string(), Object::Integer(i64::from(max) + 1));
    new_trailer.insert("Root".to_string(), Object::Reference(root));
    if let Some(info) = trailer.get("Info").and_then(Object::as_reference) {
        if objects.contains_key(&info.id) {
            new_trailer.insert("Info".to_string(), Object::Reference(info));
        }
    }
    if let Some(id) = trailer.get("ID") {
        new_trailer.insert("ID".to_string(), id.clone());
    }

    out.extend_from_slice(b"trailer\n");
    out.extend_from_slice(&serializer.serialize(&Object::Dictionary(new_trailer)));
    out.extend_from_slice(format!("\nstartxref\n{}\n%%EOF\n", xref_offset).as_bytes());
    out
}

/// One xref table covering objects `0..=max`, gaps as free entries.
fn full_xref_table(offsets: &[(u32, u16, usize)], max: u32) -> Vec<u8> {
    let mut table = format!("xref\n0 {}\n", max + 1).into_bytes();
    let mut iter = offsets.iter().peekable();
    for num in 0..=max {
        let entry = iter.next_if(|(id, ..)| *id == num);
        match entry {
            Some((_, gen, offset)) if num != 0 => {
                table.extend_from_slice(format!("{:010} {:05} n \n", offset, gen).as_bytes());
            },
            _ => table.extend_from_slice(b"0000000000 65535 f \n"),
        }
    }
    table
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::PdfStructure;
    use crate::test_pdf::{build_pdf, one_page_pdf};

    #[test]
    fn test_rewrite_simple_document() {
        let pdf = one_page_pdf();
        let out = RewriteNormalizer.normalize(&pdf).unwrap();
        assert!(out.starts_with(b"%PDF-1.4\n"));
        let doc = PdfStructure::load(&out).unwrap();
        assert_eq!(doc.root_ref().unwrap(), ObjectRef::new(1, 0));
        assert_eq!(doc.first_page_ref().unwrap(), ObjectRef::new(3, 0));
    }

    #[test]
    fn test_rewrite_recovers_from_broken_xref() {
        let mut pdf = one_page_pdf();
        let pos = pdf.windows(9).rposition(|w| w == b"startxref").unwrap();
        pdf.truncate(pos);
        pdf.extend_from_slice(b"startxref\n3\n%%EOF\n");
        assert!(PdfStructure::load(&pdf).is_err());

        let out = RewriteNormalizer.normalize(&pdf).unwrap();
        assert_eq!(PdfStructure::load(&out).unwrap().first_page_ref().unwrap().id, 3);
    }

    #[test]
    fn test_later_definition_wins() {
        let mut pdf = one_page_pdf();
        pdf.extend_from_slice(b"3 0 obj\n<< /Type /Page /Parent 2 0 R /Rotate 90 >>\nendobj\n");
        let out = RewriteNormalizer.normalize(&pdf).unwrap();
        let doc = PdfStructure::load(&out).unwrap();
        let page = doc.get_object(ObjectRef::new(3, 0)).unwrap();
        assert_eq!(page.as_dict().unwrap().get("Rotate"), Some(&Object::Integer(90)));
    }

    #[test]
    fn test_catalog_found_without_trailer() {
        let pdf = b"%PDF-1.6\n5 0 obj\n<< /Type /Catalog /Pages 6 0 R >>\nendobj\n6 0 obj\n<< /Type /Pages /Kids [] /Count 0 >>\nendobj\n%%EOF\n";
        let out = RewriteNormalizer.normalize(pdf).unwrap();
        assert!(out.starts_with(b"%PDF-1.6\n"));
        let doc = PdfStructure::load(&out).unwrap();
        assert_eq!(doc.root_ref().unwrap(), ObjectRef::new(5, 0));
        assert_eq!(doc.next_object_number(), 7);
    }

    #[test]
    fn test_encrypted_rejected() {
        let pdf = build_pdf(&[(1, "<< /Type /Catalog >>"), (2, "<< /Filter /Standard >>")]);
        let text = String::from_utf8_lossy(&pdf).into_owned();
        assert!(text.contains("/Root 1 0 R"));
        let mut encrypted = pdf.clone();
        encrypted.extend_from_slice(b"trailer\n<< /Root 1 0 R /Encrypt 2 0 R >>\n");
        assert!(matches!(
            RewriteNormalizer.normalize(&encrypted),
            Err(Error::Unsupported(_))
        ));
    }

    #[test]
    fn test_not_a_pdf() {
        assert!(matches!(
            RewriteNormalizer.normalize(b"GIF89a"),
            Err(Error::InvalidPdfFormat(_))
        ));
    }

    #[test]
    fn test_full_xref_table_gaps() {
        let table = full_xref_table(&[(1, 0, 15), (3, 0, 40)], 3);
        let text = String::from_utf8(table).unwrap();
        assert_eq!(
            text,
            "xref\n0 4\n0000000000 65535 f \n0000000015 00000 n \n0000000000 65535 f \n0000000040 00000 n \n"
        );
    }
}
