//! Signing backends.
//!
//! A backend turns an unsigned document into a signed one. The signer tries
//! backends in order; each reports success, [`BackendError::Unavailable`]
//! (the document does not suit this backend, try the next one) or
//! [`BackendError::Fatal`] (stop, retrying cannot help).

use super::credentials::SignerIdentity;
use super::placeholder::{insert_standalone, insert_structured, PreparedSignature, SignatureMetadata};
use super::signer::complete_signature;
use crate::config::SignerConfig;
use crate::error::Error;
use crate::normalize::{normalize_pdf, Capabilities};
use chrono::Utc;

/// Why a backend did not produce a signed document.
#[derive(Debug, thiserror::Error)]
pub enum BackendError {
    /// The backend cannot handle this document; the next backend may
    #[error("backend unavailable: {0}")]
    Unavailable(Error),

    /// Signing failed in a way no other backend can fix
    #[error("{0}")]
    Fatal(Error),
}

impl BackendError {
    /// The underlying error.
    pub fn into_error(self) -> Error {
        match self {
            BackendError::Unavailable(e) | BackendError::Fatal(e) => e,
        }
    }
}

/// Outcome of one backend attempt.
pub type BackendOutcome = std::result::Result<Vec<u8>, BackendError>;

/// A strategy for producing a signed document.
pub trait SigningBackend {
    /// Backend name for logging and error reports.
    fn name(&self) -> &'static str;

    /// Sign `pdf` as `identity`. The input is never modified.
    fn sign(&self, pdf: &[u8], identity: &SignerIdentity) -> BackendOutcome;
}

/// Whether `err` means the document structure cannot take an incremental
/// update as it is.
fn is_structural(err: &Error) -> bool {
    matches!(
        err,
        Error::XrefStream { .. }
            | Error::InvalidXref
            | Error::ObjectNotFound(..)
            | Error::ParseError { .. }
            | Error::InvalidObjectType { .. }
            | Error::RecursionLimitExceeded(_)
    )
}

/// Signs through a structured incremental update with a signature field.
///
/// Documents whose structure cannot take the update are normalized once and
/// retried.
#[derive(Debug, Clone)]
pub struct ExternalBackend {
    config: SignerConfig,
    capabilities: Capabilities,
}

impl ExternalBackend {
    /// Create the backend.
    pub fn new(config: SignerConfig, capabilities: Capabilities) -> Self {
        Self { config, capabilities }
    }

    /// Insert the placeholder, normalizing first when needed.
    fn prepare(&self, pdf: &[u8], metadata: &SignatureMetadata) -> Result<PreparedSignature, BackendError> {
        let err = match insert_structured(pdf, &self.config, metadata) {
            Ok(prepared) => return Ok(prepared),
            Err(e) => e,
        };
        // Encrypted documents: the standalone fallback cannot sign them either.
        if matches!(err, Error::Unsupported(_)) {
            return Err(BackendError::Fatal(err));
        }
        if !is_structural(&err) || !self.config.normalize_on_failure {
            return Err(BackendError::Unavailable(err));
        }

        log::warn!("Document cannot take an incremental update ({}), normalizing", err);
        let normalized = normalize_pdf(pdf, &self.capabilities, self.config.prefer_qpdf).map_err(|e| {
            BackendError::Unavailable(Error::InvalidPdfFormat(format!("normalization failed: {}", e)))
        })?;

        insert_structured(&normalized, &self.config, metadata).map_err(|e| {
            BackendError::Unavailable(Error::InvalidPdfFormat(format!(
                "still unusable after normalization: {}",
                e
            )))
        })
    }
}

impl SigningBackend for ExternalBackend {
    fn name(&self) -> &'static str {
        "external"
    }

    fn sign(&self, pdf: &[u8], identity: &SignerIdentity) -> BackendOutcome {
        let signing_time = Utc::now();
        let metadata = SignatureMetadata::for_identity(identity, signing_time);
        let prepared = self.prepare(pdf, &metadata)?;
        complete_signature(prepared, identity, signing_time).map_err(BackendError::Fatal)
    }
}

/// Signs by appending a standalone signature dictionary at end of file.
///
/// The cross-reference data is not updated, so this only needs a valid
/// header and works on documents nothing else can parse.
#[derive(Debug, Clone)]
pub struct RawPkcs7Backend {
    config: SignerConfig,
}

impl RawPkcs7Backend {
    /// Create the backend.
    pub fn new(config: SignerConfig) -> Self {
        Self { config }
    }
}

impl SigningBackend for RawPkcs7Backend {
    fn name(&self) -> &'static str {
        "raw-pkcs7"
    }

    fn sign(&self, pdf: &[u8], identity: &SignerIdentity) -> BackendOutcome {
        let signing_time = Utc::now();
        let metadata = SignatureMetadata::for_identity(identity, signing_time);
        let prepared = insert_standalone(pdf, &self.config, &metadata).map_err(BackendError::Fatal)?;
        complete_signature(prepared, identity, signing_time).map_err(BackendError::Fatal)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signatures::credentials::KeyMaterial;
    use crate::signatures::locator::locate_placeholder_from;
    use crate::test_pdf::one_page_pdf;

    fn identity() -> SignerIdentity {
        let material = KeyMaterial::from_pem(
            include_str!("../../tests/fixtures/private_key.pem"),
            include_str!("../../tests/fixtures/certificate.pem"),
            None,
        )
        .unwrap();
        SignerIdentity::from_certificate(material)
    }

    #[test]
    fn test_external_backend_signs() {
        let pdf = one_page_pdf();
        let backend = ExternalBackend::new(SignerConfig::default(), Capabilities::none());
        let signed = backend.sign(&pdf, &identity()).unwrap();
        assert!(signed.starts_with(&pdf));
        assert!(locate_placeholder_from(&signed, pdf.len()).is_ok());
    }

    #[test]
    fn test_external_backend_normalizes_broken_xref() {
        let mut pdf = one_page_pdf();
        let pos = pdf.windows(9).rposition(|w| w == b"startxref").unwrap();
        pdf.truncate(pos);
        pdf.extend_from_slice(b"startxref\n3\n%%EOF\n");

        let backend = ExternalBackend::new(SignerConfig::default(), Capabilities::none());
        let signed = backend.sign(&pdf, &identity()).unwrap();
        assert!(!signed.starts_with(&pdf));
        assert!(crate::document::PdfStructure::load(&signed).is_ok());
    }

    #[test]
    fn test_external_backend_without_normalization() {
        let pdf = b"%PDF-1.4\n1 0 obj\n<< >>\nendobj\n%%EOF\n";
        let config = SignerConfig::default().with_normalization(false);
        let backend = ExternalBackend::new(config, Capabilities::none());
        assert!(matches!(
            backend.sign(pdf, &identity()),
            Err(BackendError::Unavailable(Error::InvalidXref))
        ));
    }

    #[test]
    fn test_raw_backend_signs_unparsable_document() {
        let pdf = b"%PDF-1.4\nthis is not a well formed body\n";
        let backend = RawPkcs7Backend::new(SignerConfig::default());
        let signed = backend.sign(pdf, &identity()).unwrap();
        assert!(signed.starts_with(pdf));
        assert!(locate_placeholder_from(&signed, pdf.len()).is_ok());
    }

    #[test]
    fn test_encrypted_document_is_fatal() {
        let mut pdf = one_page_pdf();
        let pos = pdf.windows(14).rposition(|w| w == b"/Root 1 0 R >>").unwrap();
        pdf.splice(pos + 12..pos + 12, b"/Encrypt 9 0 R ".iter().copied());

        let backend = ExternalBackend::new(SignerConfig::default(), Capabilities::none());
        assert!(matches!(
            backend.sign(&pdf, &identity()),
            Err(BackendError::Fatal(Error::Unsupported(_)))
        ));
    }

    #[test]
    fn test_too_small_capacity_is_fatal() {
        let pdf = one_page_pdf();
        let config = SignerConfig::default().with_signature_capacity(64);
        let backend = ExternalBackend::new(config, Capabilities::none());
        assert!(matches!(
            backend.sign(&pdf, &identity()),
            Err(BackendError::Fatal(Error::SignatureTooLarge { .. }))
        ));
    }
}
