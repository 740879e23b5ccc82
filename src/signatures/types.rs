//! Core types for PDF signing and signature detection.

use chrono::{DateTime, Utc};
use der::oid::ObjectIdentifier;
use serde::Serialize;

/// Hash algorithms recognised in signature envelopes.
///
/// Signing always uses SHA-256; the others are accepted when checking the
/// integrity of signatures produced elsewhere.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum DigestAlgorithm {
    /// SHA-1 (legacy, accepted for verification only)
    Sha1,
    /// SHA-256
    #[default]
    Sha256,
    /// SHA-384
    Sha384,
    /// SHA-512
    Sha512,
}

impl DigestAlgorithm {
    /// Get the OID for this algorithm.
    pub fn oid(&self) -> ObjectIdentifier {
        match self {
            DigestAlgorithm::Sha1 => ObjectIdentifier::new_unwrap("1.3.14.3.2.26"),
            DigestAlgorithm::Sha256 => ObjectIdentifier::new_unwrap("2.16.840.1.101.3.4.2.1"),
            DigestAlgorithm::Sha384 => ObjectIdentifier::new_unwrap("2.16.840.1.101.3.4.2.2"),
            DigestAlgorithm::Sha512 => ObjectIdentifier::new_unwrap("2.16.840.1.101.3.4.2.3"),
        }
    }

    /// Look up an algorithm by OID.
    pub fn from_oid(oid: &ObjectIdentifier) -> Option<Self> {
        [Self::Sha1, Self::Sha256, Self::Sha384, Self::Sha512]
            .into_iter()
            .find(|alg| alg.oid() == *oid)
    }

    /// Get the algorithm name.
    pub fn name(&self) -> &'static str {
        match self {
            DigestAlgorithm::Sha1 => "SHA-1",
            DigestAlgorithm::Sha256 => "SHA-256",
            DigestAlgorithm::Sha384 => "SHA-384",
            DigestAlgorithm::Sha512 => "SHA-512",
        }
    }
}

/// Signature sub-filter written into the signature dictionary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SignatureSubFilter {
    /// adbe.pkcs7.detached - PKCS#7 detached signature
    #[default]
    Pkcs7Detached,
    /// ETSI.CAdES.detached - CAdES detached signature
    CadesDetached,
}

impl SignatureSubFilter {
    /// Get the PDF name for this sub-filter.
    pub fn as_pdf_name(&self) -> &'static str {
        match self {
            SignatureSubFilter::Pkcs7Detached => "adbe.pkcs7.detached",
            SignatureSubFilter::CadesDetached => "ETSI.CAdES.detached",
        }
    }

    /// Parse from a PDF name.
    pub fn from_pdf_name(name: &str) -> Option<Self> {
        match name {
            "adbe.pkcs7.detached" => Some(SignatureSubFilter::Pkcs7Detached),
            "ETSI.CAdES.detached" => Some(SignatureSubFilter::CadesDetached),
            _ => None,
        }
    }
}

/// Offsets of a signature placeholder inside one byte snapshot.
///
/// `contents_start..contents_end` covers the hex digits of `/Contents`,
/// excluding the angle brackets. `byte_range_start..byte_range_end` covers
/// the `/ByteRange` array from `[` to `]` inclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SignaturePlaceholder {
    /// First hex digit of `/Contents`
    pub contents_start: usize,
    /// Offset of the closing `>` of `/Contents`
    pub contents_end: usize,
    /// Offset of the `[` opening the `/ByteRange` array
    pub byte_range_start: usize,
    /// Offset just past the `]` closing the `/ByteRange` array
    pub byte_range_end: usize,
    /// Hex characters reserved for the signature
    pub capacity_hex_chars: usize,
}

/// How confidently a document appears to carry a signature.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SignatureStrength {
    /// No signature structure
    None,
    /// Isolated signature elements
    Weak,
    /// Signature dictionary with partial supporting structure
    Medium,
    /// Complete signature structure
    Strong,
}

/// Outcome of the structural rule table.
///
/// `PossiblyVisualOnly` is informational: form or content markers exist but
/// nothing that identifies a cryptographic signature.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SignatureVerdict {
    /// ByteRange, Contents and a signature marker together
    Strong,
    /// Signature marker with Contents and partial structure
    Medium,
    /// Signature elements without a complete structure
    Weak,
    /// Form fields or content only
    PossiblyVisualOnly,
    /// Nothing signature related
    NotFound,
}

impl SignatureVerdict {
    /// Strength reported for this verdict.
    pub fn strength(&self) -> SignatureStrength {
        match self {
            SignatureVerdict::Strong => SignatureStrength::Strong,
            SignatureVerdict::Medium => SignatureStrength::Medium,
            SignatureVerdict::Weak => SignatureStrength::Weak,
            SignatureVerdict::PossiblyVisualOnly | SignatureVerdict::NotFound => {
                SignatureStrength::None
            },
        }
    }

    /// Whether the verdict counts as a signature being present.
    ///
    /// `PossiblyVisualOnly` is a weak positive: present, with no strength.
    pub fn is_present(&self) -> bool {
        !matches!(self, SignatureVerdict::NotFound)
    }
}

/// Result of structural signature detection.
#[derive(Debug, Clone, Serialize)]
pub struct SignatureDetectionResult {
    /// Whether a signature is present
    pub present: bool,
    /// Detection strength
    pub strength: SignatureStrength,
    /// Rule table outcome
    pub verdict: SignatureVerdict,
    /// Headline for display
    pub message: String,
    /// Explanation of the verdict
    pub details: String,
    /// Signer name from `/Name`
    pub signed_by: String,
    /// Signing time from `/M`
    pub signing_time: DateTime<Utc>,
    /// Reason from `/Reason`
    pub signing_reason: String,
    /// Signature type from the filter names
    pub signature_type: String,
    /// Bytes reserved in `/Contents`
    pub contents_size: Option<usize>,
    /// Concrete `/ByteRange` values
    pub byte_range: Option<[u64; 4]>,
}

/// Result of checking the cryptographic integrity of an embedded signature.
///
/// This confirms the signature matches the document bytes. It does not
/// validate the certificate chain.
#[derive(Debug, Clone, Default, Serialize)]
pub struct IntegrityReport {
    /// A signature placeholder with concrete ByteRange values was found
    pub signature_found: bool,
    /// ByteRange matches the placeholder and the file length
    pub byte_range_valid: bool,
    /// The message-digest attribute matches the recomputed digest
    pub digest_matches: bool,
    /// The RSA signature over the signed attributes verifies
    pub signature_valid: bool,
    /// Digest algorithm named by the signer info
    pub digest_algorithm: Option<DigestAlgorithm>,
    /// Common name of the embedded signer certificate
    pub signer_common_name: Option<String>,
    /// What went wrong, in check order
    pub problems: Vec<String>,
}

impl IntegrityReport {
    /// Every check passed.
    pub fn is_intact(&self) -> bool {
        self.signature_found && self.byte_range_valid && self.digest_matches && self.signature_valid
    }
}
