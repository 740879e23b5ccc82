//! PDF Digital Signatures module.
//!
//! Signing appends a signature dictionary through an incremental update,
//! digests everything except the reserved `/Contents` hex digits, and embeds a
//! detached CMS SignedData envelope into the reservation. The file length
//! never changes after the placeholder is written.
//!
//! ## Features
//!
//! - **Signature Creation**: [`PdfSigner`] with fallback [`SigningBackend`]s
//! - **Structural Detection**: [`detect_signature`] classifies raw bytes
//! - **Integrity Check**: [`check_integrity`] re-verifies digest and RSA signature
//! - **Credentials**: PEM keys and certificates through a [`KeyStore`]
//!
//! ## Example
//!
//! ```ignore
//! use pdf_seal::signatures::{FileKeyStore, KeyStore, PdfSigner, SignerIdentity};
//! use pdf_seal::{Capabilities, SignerConfig};
//!
//! let keys = FileKeyStore::new("keys").load(Some("password"))?;
//! let identity = SignerIdentity::from_certificate(keys).with_position("CFO");
//! let signer = PdfSigner::new(SignerConfig::default(), Capabilities::detect());
//! let signed = signer.sign(&std::fs::read("document.pdf")?, &identity)?;
//! assert!(pdf_seal::signatures::detect_signature(&signed).present);
//! ```
//!
//! ## PDF Specification Reference
//!
//! - ISO 32000-1:2008 Section 12.8 - Digital Signatures
//! - RFC 5652 - Cryptographic Message Syntax

mod backend;
mod byterange;
mod credentials;
mod embedder;
mod envelope;
mod integrity;
mod locator;
mod placeholder;
mod signer;
mod types;
mod verifier;

pub use backend::{BackendError, BackendOutcome, ExternalBackend, RawPkcs7Backend, SigningBackend};
pub use byterange::{digest_byte_ranges, ByteRangeSpec};
pub use credentials::{
    certificate_common_name, FileKeyStore, KeyMaterial, KeyStore, PemKeyStore, SignerIdentity,
    CERTIFICATE_FILE, PRIVATE_KEY_FILE,
};
pub use embedder::{bytes_to_hex, embed_signature, write_byte_range};
pub use envelope::SignedDataEnvelope;
pub use integrity::check_integrity;
pub use locator::{
    find_byte_range, find_contents, locate_placeholder, locate_placeholder_from, locate_placeholder_within,
    parse_byte_range_values, ContentsEncoding, ContentsSpan,
};
pub use placeholder::{
    insert_standalone, insert_structured, signature_dictionary, PreparedSignature, SigFlags, SignatureMetadata,
};
pub use signer::{complete_signature, PdfSigner};
pub use types::{
    DigestAlgorithm, IntegrityReport, SignatureDetectionResult, SignaturePlaceholder, SignatureStrength,
    SignatureSubFilter, SignatureVerdict,
};
pub use verifier::{
    classify, detect_signature, extract_signature_info, parse_pdf_date, ExtractedSignatureInfo,
    SignatureEvidence, SignatureRule, SIGNATURE_RULES,
};
