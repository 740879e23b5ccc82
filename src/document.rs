//! Read-only structural view of a PDF.
//!
//! [`PdfStructure`] answers the questions an incremental update needs:
//! where the catalog and first page live, which object number comes next,
//! and where the current cross-reference section starts. It resolves only
//! objects reachable through classic xref tables; anything else is left to
//! normalization.

use crate::error::{Error, Result};
use crate::object::{Dictionary, Object, ObjectRef};
use crate::parser::parse_indirect_object;
use crate::xref::{find_xref_offset, parse_xref_chain, CrossRefTable};

/// Maximum depth of the page tree walk.
const MAX_PAGE_TREE_DEPTH: u32 = 64;

/// Bytes searched for the `%PDF-` header.
const HEADER_SEARCH_WINDOW: usize = 1024;

/// Offset of the `%PDF-` header, if present near the start of the file.
pub fn find_header(pdf: &[u8]) -> Option<usize> {
    let window = &pdf[..pdf.len().min(HEADER_SEARCH_WINDOW)];
    window.windows(5).position(|w| w == b"%PDF-")
}

/// Reject input that does not carry a `%PDF-` header.
pub fn ensure_pdf_header(pdf: &[u8]) -> Result<()> {
    match find_header(pdf) {
        Some(_) => Ok(()),
        None => Err(Error::InvalidPdfFormat("missing %PDF header".to_string())),
    }
}

/// Structural view over borrowed PDF bytes.
#[derive(Debug)]
pub struct PdfStructure<'a> {
    bytes: &'a [u8],
    xref: CrossRefTable,
    startxref: usize,
}

impl<'a> PdfStructure<'a> {
    /// Validate the header and read the cross-reference chain.
    pub fn load(bytes: &'a [u8]) -> Result<Self> {
        ensure_pdf_header(bytes)?;
        let startxref = find_xref_offset(bytes)?;
        let xref = parse_xref_chain(bytes, startxref)?;
        log::debug!(
            "Loaded xref chain: {} entries in {} section(s), startxref {}",
            xref.len(),
            xref.sections().len(),
            startxref
        );
        Ok(Self {
            bytes,
            xref,
            startxref,
        })
    }

    /// The underlying bytes.
    pub fn bytes(&self) -> &'a [u8] {
        self.bytes
    }

    /// Newest trailer dictionary (older trailers fill missing keys).
    pub fn trailer(&self) -> &Dictionary {
        self.xref.trailer()
    }

    /// Offset of the newest cross-reference section.
    pub fn startxref(&self) -> usize {
        self.startxref
    }

    /// Reference to the document catalog.
    pub fn root_ref(&self) -> Result<ObjectRef> {
        self.trailer()
            .get("Root")
            .and_then(Object::as_reference)
            .ok_or_else(|| Error::InvalidObjectType {
                expected: "trailer /Root reference".to_string(),
                found: "nothing".to_string(),
            })
    }

    /// Reference to the document information dictionary, if any.
    pub fn info_ref(&self) -> Option<ObjectRef> {
        self.trailer().get("Info").and_then(Object::as_reference)
    }

    /// Whether the trailer declares encryption.
    pub fn is_encrypted(&self) -> bool {
        self.trailer().contains_key("Encrypt")
    }

    /// Load an indirect object through the cross-reference table.
    pub fn get_object(&self, r: ObjectRef) -> Result<Object> {
        let entry = self
            .xref
            .get(r.id)
            .filter(|e| e.in_use && e.generation == r.gen)
            .ok_or(Error::ObjectNotFound(r.id, r.gen))?;
        let offset = usize::try_from(entry.offset).map_err(|_| Error::ObjectNotFound(r.id, r.gen))?;

        let (found, object, _) = parse_indirect_object(self.bytes, offset)?;
        if found != r {
            log::warn!("xref entry for {} points at object {} (byte {})", r, found, offset);
            return Err(Error::ObjectNotFound(r.id, r.gen));
        }
        Ok(object)
    }

    /// Follow `obj` when it is a reference; otherwise return it as is.
    pub fn resolve(&self, obj: &Object) -> Result<Object> {
        match obj {
            Object::Reference(r) => self.get_object(*r),
            other => Ok(other.clone()),
        }
    }

    /// The catalog dictionary.
    pub fn catalog(&self) -> Result<Dictionary> {
        self.get_object(self.root_ref()?)?.into_dict()
    }

    /// Reference to the first page in document order.
    pub fn first_page_ref(&self) -> Result<ObjectRef> {
        let catalog = self.catalog()?;
        let mut node = catalog
            .get("Pages")
            .and_then(Object::as_reference)
            .ok_or_else(|| Error::InvalidObjectType {
                expected: "catalog /Pages reference".to_string(),
                found: "nothing".to_string(),
            })?;

        for _ in 0..MAX_PAGE_TREE_DEPTH {
            let dict = self.get_object(node)?.into_dict()?;
            let kids = match dict.get("Kids") {
                Some(kids) => self.resolve(kids)?,
                None => return Ok(node),
            };
            if dict.get("Type").and_then(Object::as_name) == Some("Page") {
                return Ok(node);
            }
            node = kids
                .as_array()
                .and_then(|k| k.first())
                .and_then(Object::as_reference)
                .ok_or_else(|| Error::InvalidObjectType {
                    expected: "page reference in /Kids".to_string(),
                    found: kids.type_name().to_string(),
                })?;
        }

        Err(Error::RecursionLimitExceeded(MAX_PAGE_TREE_DEPTH))
    }

    /// First unused object number: trailer `/Size`, never below the highest
    /// known object number plus one.
    pub fn next_object_number(&self) -> u32 {
        let size = self
            .trailer()
            .get("Size")
            .and_then(Object::as_integer)
            .and_then(|s| u32::try_from(s).ok())
            .unwrap_or(0);
        size.max(self.xref.max_object_number() + 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_pdf::{build_pdf, one_page_pdf};

    #[test]
    fn test_find_header() {
        assert_eq!(find_header(b"%PDF-1.7\n"), Some(0));
        assert_eq!(find_header(b"\xEF\xBB\xBF%PDF-1.4"), Some(3));
        assert_eq!(find_header(b"PK\x03\x04 zip archive"), None);
    }

    #[test]
    fn test_load_rejects_non_pdf() {
        let err = PdfStructure::load(b"hello world").unwrap_err();
        assert!(matches!(err, Error::InvalidPdfFormat(_)));
    }

    #[test]
    fn test_catalog_and_first_page() {
        let pdf = one_page_pdf();
        let doc = PdfStructure::load(&pdf).unwrap();
        assert_eq!(doc.root_ref().unwrap(), ObjectRef::new(1, 0));
        assert_eq!(doc.catalog().unwrap().get("Type").and_then(Object::as_name), Some("Catalog"));
        assert_eq!(doc.first_page_ref().unwrap(), ObjectRef::new(3, 0));
        assert_eq!(doc.next_object_number(), 4);
        assert!(!doc.is_encrypted());
        assert!(doc.info_ref().is_none());
    }

    #[test]
    fn test_nested_page_tree() {
        let pdf = build_pdf(&[
            (1, "<< /Type /Catalog /Pages 2 0 R >>"),
            (2, "<< /Type /Pages /Kids [4 0 R] /Count 1 >>"),
            (4, "<< /Type /Pages /Kids 5 0 R /Count 1 /Parent 2 0 R >>"),
            (5, "[6 0 R]"),
            (6, "<< /Type /Page /Parent 4 0 R >>"),
        ]);
        let doc = PdfStructure::load(&pdf).unwrap();
        assert_eq!(doc.first_page_ref().unwrap(), ObjectRef::new(6, 0));
        assert_eq!(doc.next_object_number(), 7);
    }

    #[test]
    fn test_missing_object() {
        let pdf = one_page_pdf();
        let doc = PdfStructure::load(&pdf).unwrap();
        assert!(matches!(doc.get_object(ObjectRef::new(40, 0)), Err(Error::ObjectNotFound(40, 0))));
        assert!(matches!(doc.get_object(ObjectRef::new(1, 3)), Err(Error::ObjectNotFound(1, 3))));
    }

    #[test]
    fn test_wrong_offset_detected() {
        let find = |hay: &[u8], needle: &[u8]| hay.windows(needle.len()).position(|w| w == needle).unwrap();
        let mut pdf = one_page_pdf();
        // Point object 3's xref entry at object 2
        let obj2 = find(&pdf, b"2 0 obj");
        let obj3 = find(&pdf, b"3 0 obj");
        let pos = find(&pdf, format!("{:010} 00000 n", obj3).as_bytes());
        pdf[pos..pos + 10].copy_from_slice(format!("{:010}", obj2).as_bytes());
        let doc = PdfStructure::load(&pdf).unwrap();
        assert!(matches!(doc.get_object(ObjectRef::new(3, 0)), Err(Error::ObjectNotFound(3, 0))));
    }
}
