//! Signing documents whose cross-reference data needs normalization first.

mod common;

use common::{compressed_pdf, identity, one_page_pdf};
use pdf_seal::normalize::{normalize_pdf, Normalizer, RewriteNormalizer};
use pdf_seal::signatures::{check_integrity, detect_signature, locate_placeholder};
use pdf_seal::{Capabilities, Error, PdfSigner, PdfStructure, SignatureStrength, SignerConfig};

#[test]
fn test_compressed_document_needs_normalization() {
    let pdf = compressed_pdf();
    assert!(matches!(PdfStructure::load(&pdf), Err(Error::XrefStream { .. })));
}

#[test]
fn test_rewrite_unpacks_object_stream() {
    let normalized = RewriteNormalizer::new().normalize(&compressed_pdf()).unwrap();
    assert!(normalized.starts_with(b"%PDF-1.5\n"));

    let structure = PdfStructure::load(&normalized).unwrap();
    let catalog = structure.catalog().unwrap();
    assert_eq!(catalog.get("Type").and_then(|t| t.as_name()), Some("Catalog"));
    assert_eq!(structure.first_page_ref().unwrap().id, 3);

    let text = String::from_utf8_lossy(&normalized);
    assert!(!text.contains("/ObjStm"));
    assert!(!text.contains("/XRef"));
}

#[test]
fn test_sign_compressed_document() {
    let pdf = compressed_pdf();
    let signer = PdfSigner::new(SignerConfig::default(), Capabilities::none());
    let signed = signer.sign(&pdf, &identity()).unwrap();

    assert!(!signed.starts_with(&pdf));
    assert!(PdfStructure::load(&signed).is_ok());

    let result = detect_signature(&signed);
    assert_eq!(result.strength, SignatureStrength::Strong);
    assert!(String::from_utf8_lossy(&signed).contains("/SigFlags 3"));
    assert!(check_integrity(&signed).is_intact());
}

#[test]
fn test_normalization_disabled_falls_back_to_standalone() {
    let pdf = compressed_pdf();
    let config = SignerConfig::default().with_normalization(false);
    let signed = PdfSigner::new(config, Capabilities::none())
        .sign(&pdf, &identity())
        .unwrap();

    assert!(signed.starts_with(&pdf));
    let placeholder = locate_placeholder(&signed).unwrap();
    assert!(placeholder.contents_start > pdf.len());
    assert!(check_integrity(&signed).is_intact());
}

#[test]
fn test_normalize_pdf_without_tools() {
    let normalized = normalize_pdf(&one_page_pdf(), &Capabilities::none(), true).unwrap();
    let structure = PdfStructure::load(&normalized).unwrap();
    assert_eq!(structure.root_ref().unwrap().id, 1);
}
