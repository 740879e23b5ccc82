//! Signature placeholder insertion.
//!
//! The signature dictionary is written with fixed-width spans: `/ByteRange`
//! holds filler nines and `/Contents` holds zero hex digits. Later steps only
//! overwrite those bytes, so the file length never changes after insertion.
//!
//! Two insertion strategies exist. [`insert_structured`] appends a proper
//! incremental update: the signature dictionary, a signature widget on the
//! first page and an AcroForm field. [`insert_standalone`] appends only the
//! signature dictionary after the last object and needs nothing beyond a
//! valid header.

use super::credentials::SignerIdentity;
use crate::config::SignerConfig;
use crate::document::{ensure_pdf_header, PdfStructure};
use crate::error::{Error, Result};
use crate::object::{Dictionary, Object, ObjectRef};
use crate::writer::{text_string, IncrementalUpdate, ObjectSerializer};
use bitflags::bitflags;
use chrono::{DateTime, Utc};
use lazy_static::lazy_static;
use regex::bytes::Regex;
use std::ops::Range;

lazy_static! {
    static ref RE_OBJ_HEADER: Regex = Regex::new(r"(?-u)(\d+)\s+\d+\s+obj\b").unwrap();
}

bitflags! {
    /// AcroForm signature flags.
    ///
    /// Per PDF spec Table 225 (Signature flags).
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct SigFlags: u32 {
        /// Bit 1: The document contains at least one signature field
        const SIGNATURES_EXIST = 1 << 0;
        /// Bit 2: The document must be saved by incremental update only
        const APPEND_ONLY = 1 << 1;
    }
}

/// Annotation flags of the signature widget: Print and Locked.
const WIDGET_FLAGS: i64 = 4 | 128;

/// A document with a signature placeholder appended.
#[derive(Debug, Clone)]
pub struct PreparedSignature {
    /// The whole prepared document
    pub bytes: Vec<u8>,
    /// Span of the signature dictionary object, `N 0 obj` to `endobj`
    pub signature_object: Range<usize>,
}

/// Values written into the signature dictionary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignatureMetadata {
    /// `/Name`
    pub name: String,
    /// `/Reason`
    pub reason: String,
    /// `/Location`
    pub location: String,
    /// `/M`
    pub signing_time: DateTime<Utc>,
}

impl SignatureMetadata {
    /// Metadata describing `identity`, signed at `signing_time`.
    pub fn for_identity(identity: &SignerIdentity, signing_time: DateTime<Utc>) -> Self {
        let display_name = identity.display_name.trim();
        let organization = identity.organization.as_deref().map(str::trim).filter(|o| !o.is_empty());

        let name = match (display_name.is_empty(), organization) {
            (true, _) => "Digital Signature".to_string(),
            (false, Some(org)) => format!("{} ({})", display_name, org),
            (false, None) => display_name.to_string(),
        };
        let reason = match identity.position.as_deref().map(str::trim).filter(|p| !p.is_empty()) {
            Some(position) => format!("Signed as {}", position),
            None => "Document signed digitally".to_string(),
        };

        Self {
            name,
            reason,
            location: organization.unwrap_or_default().to_string(),
            signing_time,
        }
    }
}

/// Format a timestamp as a PDF date: `D:YYYYMMDDHHmmSSZ`.
pub fn pdf_date(time: &DateTime<Utc>) -> String {
    time.format("D:%Y%m%d%H%M%SZ").to_string()
}

/// Signature dictionary text with reserved `/ByteRange` and `/Contents` spans.
pub fn signature_dictionary(config: &SignerConfig, metadata: &SignatureMetadata) -> Result<Vec<u8>> {
    if config.byte_range_field_width == 0 || config.signature_capacity == 0 {
        return Err(Error::Unsupported(format!(
            "signature capacity {} with ByteRange field width {}",
            config.signature_capacity, config.byte_range_field_width
        )));
    }

    let serializer = ObjectSerializer::new();
    let filler = "9".repeat(config.byte_range_field_width);
    let mut dict = format!(
        "<< /Type /Sig /Filter /Adobe.PPKLite /SubFilter /{}\n/ByteRange [{} {} {} {}]\n/Contents <{}>\n",
        config.sub_filter.as_pdf_name(),
        filler,
        filler,
        filler,
        filler,
        "0".repeat(config.capacity_hex_chars())
    )
    .into_bytes();

    for (key, value) in [
        ("/Name ", &metadata.name),
        (" /Reason ", &metadata.reason),
        (" /Location ", &metadata.location),
    ] {
        dict.extend_from_slice(key.as_bytes());
        dict.extend_from_slice(&serializer.serialize(&text_string(value)));
    }
    dict.extend_from_slice(format!(" /M ({}) >>", pdf_date(&metadata.signing_time)).as_bytes());
    Ok(dict)
}

/// Append the signature dictionary, a signature widget and an AcroForm field
/// as an incremental update.
///
/// Fails with the structural error of the document (`XrefStream`,
/// `ObjectNotFound`, ...) when it cannot take an update as it is.
pub fn insert_structured(
    pdf: &[u8],
    config: &SignerConfig,
    metadata: &SignatureMetadata,
) -> Result<PreparedSignature> {
    let structure = PdfStructure::load(pdf)?;
    if structure.is_encrypted() {
        return Err(Error::Unsupported("signing encrypted documents".to_string()));
    }

    let root_ref = structure.root_ref()?;
    let mut catalog = structure.catalog()?;
    let page_ref = structure.first_page_ref()?;
    let mut page = structure.get_object(page_ref)?.into_dict()?;

    let mut update = IncrementalUpdate::new(&structure);
    let sig_ref = update.allocate();
    let widget_ref = update.allocate();
    let field_name = format!(
        "{}-{}",
        config.field_name_prefix,
        &uuid::Uuid::new_v4().simple().to_string()[..8]
    );
    log::debug!("Signature {} with widget {} ('{}') on page {}", sig_ref, widget_ref, field_name, page_ref);

    update.set_raw_object(sig_ref, signature_dictionary(config, metadata)?);
    update.set_object(widget_ref, &widget_annotation(sig_ref, page_ref, &field_name));

    let widget = Object::Reference(widget_ref);
    match page.get("Annots").cloned() {
        Some(Object::Reference(annots_ref)) => {
            let mut annots = array_object(structure.get_object(annots_ref)?, "/Annots")?;
            annots.push(widget.clone());
            update.set_object(annots_ref, &Object::Array(annots));
        },
        Some(Object::Array(mut annots)) => {
            annots.push(widget.clone());
            page.insert("Annots".to_string(), Object::Array(annots));
            update.set_object(page_ref, &Object::Dictionary(page));
        },
        _ => {
            page.insert("Annots".to_string(), Object::Array(vec![widget.clone()]));
            update.set_object(page_ref, &Object::Dictionary(page));
        },
    }

    match catalog.get("AcroForm").cloned() {
        Some(Object::Reference(form_ref)) => {
            let mut form = structure.get_object(form_ref)?.into_dict()?;
            add_signature_field(&structure, &mut update, &mut form, widget)?;
            update.set_object(form_ref, &Object::Dictionary(form));
        },
        Some(Object::Dictionary(mut form)) => {
            add_signature_field(&structure, &mut update, &mut form, widget)?;
            catalog.insert("AcroForm".to_string(), Object::Dictionary(form));
            update.set_object(root_ref, &Object::Dictionary(catalog));
        },
        _ => {
            let mut form = Dictionary::new();
            add_signature_field(&structure, &mut update, &mut form, widget)?;
            catalog.insert("AcroForm".to_string(), Object::Dictionary(form));
            update.set_object(root_ref, &Object::Dictionary(catalog));
        },
    }

    let (bytes, spans) = update.finish_with_spans()?;
    let signature_object = spans
        .get(&sig_ref.id)
        .cloned()
        .ok_or(Error::ObjectNotFound(sig_ref.id, sig_ref.gen))?;
    Ok(PreparedSignature {
        bytes,
        signature_object,
    })
}

fn widget_annotation(sig_ref: ObjectRef, page_ref: ObjectRef, field_name: &str) -> Object {
    let mut widget = Dictionary::new();
    widget.insert("Type".to_string(), Object::Name("Annot".to_string()));
    widget.insert("Subtype".to_string(), Object::Name("Widget".to_string()));
    widget.insert("FT".to_string(), Object::Name("Sig".to_string()));
    widget.insert("T".to_string(), text_string(field_name));
    widget.insert("V".to_string(), Object::Reference(sig_ref));
    widget.insert("F".to_string(), Object::Integer(WIDGET_FLAGS));
    widget.insert("Rect".to_string(), Object::Array(vec![Object::Integer(0); 4]));
    widget.insert("P".to_string(), Object::Reference(page_ref));
    Object::Dictionary(widget)
}

fn add_signature_field(
    structure: &PdfStructure<'_>,
    update: &mut IncrementalUpdate<'_>,
    form: &mut Dictionary,
    field: Object,
) -> Result<()> {
    match form.get("Fields").cloned() {
        Some(Object::Reference(fields_ref)) => {
            let mut fields = array_object(structure.get_object(fields_ref)?, "/Fields")?;
            fields.push(field);
            update.set_object(fields_ref, &Object::Array(fields));
        },
        Some(Object::Array(mut fields)) => {
            fields.push(field);
            form.insert("Fields".to_string(), Object::Array(fields));
        },
        _ => {
            form.insert("Fields".to_string(), Object::Array(vec![field]));
        },
    }

    let existing = form
        .get("SigFlags")
        .and_then(Object::as_integer)
        .and_then(|bits| u32::try_from(bits).ok())
        .map(SigFlags::from_bits_truncate)
        .unwrap_or_else(SigFlags::empty);
    let flags = existing | SigFlags::SIGNATURES_EXIST | SigFlags::APPEND_ONLY;
    form.insert("SigFlags".to_string(), Object::Integer(i64::from(flags.bits())));
    Ok(())
}

fn array_object(obj: Object, what: &str) -> Result<Vec<Object>> {
    match obj {
        Object::Array(items) => Ok(items),
        other => Err(Error::InvalidObjectType {
            expected: format!("{} array", what),
            found: other.type_name().to_string(),
        }),
    }
}

/// Append the signature dictionary as object `max + 1` at the end of file.
///
/// The cross-reference data is left as it is.
pub fn insert_standalone(
    pdf: &[u8],
    config: &SignerConfig,
    metadata: &SignatureMetadata,
) -> Result<PreparedSignature> {
    ensure_pdf_header(pdf)?;
    let number = highest_object_number(pdf) + 1;
    let dict = signature_dictionary(config, metadata)?;

    let mut out = Vec::with_capacity(pdf.len() + dict.len() + 32);
    out.extend_from_slice(pdf);
    if !matches!(pdf.last(), Some(b'\n') | Some(b'\r')) {
        out.push(b'\n');
    }
    let start = out.len();
    out.extend_from_slice(format!("{} 0 obj\n", number).as_bytes());
    out.extend_from_slice(&dict);
    out.extend_from_slice(b"\nendobj\n");

    log::debug!("Standalone signature dictionary appended as object {}", number);
    Ok(PreparedSignature {
        signature_object: start..out.len(),
        bytes: out,
    })
}

/// Highest object number declared anywhere in the file.
fn highest_object_number(pdf: &[u8]) -> u32 {
    RE_OBJ_HEADER
        .captures_iter(pdf)
        .filter(|caps| caps.get(0).is_some_and(|m| m.start() == 0 || !pdf[m.start() - 1].is_ascii_digit()))
        .filter_map(|caps| std::str::from_utf8(&caps[1]).ok()?.parse::<u32>().ok())
        .max()
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signatures::credentials::KeyMaterial;
    use crate::signatures::locator::{locate_placeholder, locate_placeholder_within};
    use crate::test_pdf::{build_pdf, one_page_pdf};
    use chrono::TimeZone;

    fn metadata() -> SignatureMetadata {
        SignatureMetadata {
            name: "Jane Doe (Acme)".to_string(),
            reason: "Signed as CEO".to_string(),
            location: "Acme".to_string(),
            signing_time: Utc.with_ymd_and_hms(2026, 5, 1, 12, 30, 0).unwrap(),
        }
    }

    fn small_config() -> SignerConfig {
        SignerConfig::new().with_signature_capacity(16)
    }

    fn identity() -> SignerIdentity {
        let material = KeyMaterial::from_pem(
            include_str!("../../tests/fixtures/private_key.pem"),
            include_str!("../../tests/fixtures/certificate.pem"),
            None,
        )
        .unwrap();
        SignerIdentity::new(material, "Jane Doe")
    }

    #[test]
    fn test_metadata_for_identity() {
        let time = Utc.with_ymd_and_hms(2026, 5, 1, 12, 30, 0).unwrap();
        let full = identity().with_organization("Acme").with_position("CEO");
        let meta = SignatureMetadata::for_identity(&full, time);
        assert_eq!(meta.name, "Jane Doe (Acme)");
        assert_eq!(meta.reason, "Signed as CEO");
        assert_eq!(meta.location, "Acme");

        let meta = SignatureMetadata::for_identity(&identity(), time);
        assert_eq!(meta.name, "Jane Doe");
        assert_eq!(meta.reason, "Document signed digitally");
        assert_eq!(meta.location, "");

        let mut anonymous = identity();
        anonymous.display_name = "  ".to_string();
        assert_eq!(SignatureMetadata::for_identity(&anonymous, time).name, "Digital Signature");
    }

    #[test]
    fn test_pdf_date() {
        let time = Utc.with_ymd_and_hms(2025, 12, 8, 13, 59, 51).unwrap();
        assert_eq!(pdf_date(&time), "D:20251208135951Z");
    }

    #[test]
    fn test_signature_dictionary_layout() {
        let dict = signature_dictionary(&small_config(), &metadata()).unwrap();
        let text = String::from_utf8(dict.clone()).unwrap();
        assert!(text.starts_with("<< /Type /Sig /Filter /Adobe.PPKLite /SubFilter /adbe.pkcs7.detached\n"));
        assert!(text.contains("/ByteRange [9999999999 9999999999 9999999999 9999999999]"));
        assert!(text.contains(&format!("/Contents <{}>", "0".repeat(32))));
        assert!(text.contains("/Name (Jane Doe \\(Acme\\))"));
        assert!(text.contains("/M (D:20260501123000Z)"));

        let p = locate_placeholder(&dict).unwrap();
        assert_eq!(p.capacity_hex_chars, 32);
    }

    #[test]
    fn test_zero_width_rejected() {
        let config = small_config().with_byte_range_field_width(0);
        assert!(signature_dictionary(&config, &metadata()).is_err());
    }

    #[test]
    fn test_insert_structured() {
        let pdf = one_page_pdf();
        let prepared = insert_structured(&pdf, &small_config(), &metadata()).unwrap();
        let out = prepared.bytes;
        assert!(out.starts_with(&pdf));
        assert!(out[prepared.signature_object.clone()].starts_with(b"4 0 obj\n<< /Type /Sig"));

        let structure = PdfStructure::load(&out).unwrap();
        let sig = structure.get_object(ObjectRef::new(4, 0)).unwrap();
        assert_eq!(sig.dict_type(), Some("Sig"));
        let widget = structure.get_object(ObjectRef::new(5, 0)).unwrap();
        let widget = widget.as_dict().unwrap();
        assert_eq!(widget.get("FT").and_then(Object::as_name), Some("Sig"));
        assert_eq!(widget.get("V"), Some(&Object::Reference(ObjectRef::new(4, 0))));
        let name = widget.get("T").and_then(Object::as_string).unwrap();
        assert!(name.starts_with(b"Signature-"));
        assert_eq!(name.len(), "Signature-".len() + 8);

        let page = structure.get_object(ObjectRef::new(3, 0)).unwrap();
        assert_eq!(
            page.as_dict().unwrap().get("Annots"),
            Some(&Object::Array(vec![Object::Reference(ObjectRef::new(5, 0))]))
        );

        let catalog = structure.catalog().unwrap();
        let form = catalog.get("AcroForm").and_then(Object::as_dict).unwrap();
        assert_eq!(form.get("SigFlags"), Some(&Object::Integer(3)));
        assert_eq!(
            form.get("Fields"),
            Some(&Object::Array(vec![Object::Reference(ObjectRef::new(5, 0))]))
        );

        let p = locate_placeholder_within(&out, prepared.signature_object).unwrap();
        assert_eq!(p.capacity_hex_chars, 32);
    }

    #[test]
    fn test_insert_structured_page_with_text_annotation() {
        let pdf = build_pdf(&[
            (1, "<< /Type /Catalog /Pages 2 0 R >>"),
            (2, "<< /Type /Pages /Kids [3 0 R] /Count 1 >>"),
            (
                3,
                "<< /Type /Page /Parent 2 0 R /Annots [<< /Type /Annot /Subtype /Text /Rect [0 0 10 10] /Contents <FEFF00480069> >>] >>",
            ),
        ]);
        let prepared = insert_structured(&pdf, &small_config(), &metadata()).unwrap();
        let page_end = prepared.signature_object.start;
        let rewritten_page = &prepared.bytes[pdf.len()..page_end];
        assert!(rewritten_page.windows(9).any(|w| w == b"/Contents"));

        let p = locate_placeholder_within(&prepared.bytes, prepared.signature_object).unwrap();
        assert_eq!(p.capacity_hex_chars, 32);
    }

    #[test]
    fn test_insert_structured_extends_indirect_arrays() {
        let pdf = build_pdf(&[
            (1, "<< /Type /Catalog /Pages 2 0 R /AcroForm 5 0 R >>"),
            (2, "<< /Type /Pages /Kids [3 0 R] /Count 1 >>"),
            (3, "<< /Type /Page /Parent 2 0 R /Annots 4 0 R >>"),
            (4, "[6 0 R]"),
            (5, "<< /Fields 7 0 R /SigFlags 1 >>"),
            (6, "<< /Type /Annot /Subtype /Link >>"),
            (7, "[]"),
        ]);
        let out = insert_structured(&pdf, &small_config(), &metadata()).unwrap().bytes;
        let structure = PdfStructure::load(&out).unwrap();

        let widget = Object::Reference(ObjectRef::new(9, 0));
        let annots = structure.get_object(ObjectRef::new(4, 0)).unwrap();
        assert_eq!(annots, Object::Array(vec![Object::Reference(ObjectRef::new(6, 0)), widget.clone()]));
        let fields = structure.get_object(ObjectRef::new(7, 0)).unwrap();
        assert_eq!(fields, Object::Array(vec![widget]));
        let form = structure.get_object(ObjectRef::new(5, 0)).unwrap();
        assert_eq!(form.as_dict().unwrap().get("SigFlags"), Some(&Object::Integer(3)));
    }

    #[test]
    fn test_insert_structured_rejects_xref_stream() {
        let mut pdf = b"%PDF-1.5\n".to_vec();
        let offset = pdf.len();
        pdf.extend_from_slice(b"1 0 obj\n<< /Type /XRef /Size 1 /W [1 1 1] /Length 0 >>\nstream\n\nendstream\nendobj\n");
        pdf.extend_from_slice(format!("startxref\n{}\n%%EOF\n", offset).as_bytes());
        let err = insert_structured(&pdf, &small_config(), &metadata()).unwrap_err();
        assert!(matches!(err, Error::XrefStream { .. }));
    }

    #[test]
    fn test_insert_standalone() {
        let pdf = one_page_pdf();
        let prepared = insert_standalone(&pdf, &small_config(), &metadata()).unwrap();
        let out = &prepared.bytes;
        assert!(out.starts_with(&pdf));
        assert_eq!(prepared.signature_object, pdf.len()..out.len());
        let tail = String::from_utf8_lossy(&out[pdf.len()..]).into_owned();
        assert!(tail.starts_with("4 0 obj\n<< /Type /Sig"));
        assert!(tail.ends_with(">>\nendobj\n"));
        assert!(locate_placeholder_within(out, prepared.signature_object.clone()).is_ok());
    }

    #[test]
    fn test_insert_standalone_requires_header() {
        let err = insert_standalone(b"hello world", &small_config(), &metadata()).unwrap_err();
        assert!(matches!(err, Error::InvalidPdfFormat(_)));
    }

    #[test]
    fn test_highest_object_number() {
        assert_eq!(highest_object_number(b"%PDF-1.4\n3 0 obj\n12 0 obj\n7 1 obj\n"), 12);
        assert_eq!(highest_object_number(b"%PDF-1.4\n"), 0);
    }
}
