//! PDF signing implementation.
//!
//! [`PdfSigner`] drives the signing backends in order. Whatever backend
//! prepared the placeholder, the remaining steps are the same and live in
//! [`complete_signature`]:
//!
//! 1. Locate the placeholder inside the signature object
//! 2. Write the final `/ByteRange`
//! 3. Digest both byte ranges with SHA-256
//! 4. Build the detached CMS envelope over the digest
//! 5. Embed the envelope into `/Contents`

use super::backend::{BackendError, ExternalBackend, RawPkcs7Backend, SigningBackend};
use super::byterange::{digest_byte_ranges, ByteRangeSpec};
use super::credentials::SignerIdentity;
use super::embedder::{embed_signature, write_byte_range};
use super::envelope::SignedDataEnvelope;
use super::locator::locate_placeholder_within;
use super::placeholder::PreparedSignature;
use super::types::DigestAlgorithm;
use crate::config::SignerConfig;
use crate::document::ensure_pdf_header;
use crate::error::{Error, Result};
use crate::normalize::Capabilities;
use chrono::{DateTime, Utc};

/// PDF signer that creates digital signatures.
#[derive(Debug, Clone)]
pub struct PdfSigner {
    config: SignerConfig,
    capabilities: Capabilities,
}

impl PdfSigner {
    /// Create a signer with the given configuration and detected tools.
    pub fn new(config: SignerConfig, capabilities: Capabilities) -> Self {
        Self { config, capabilities }
    }

    /// The signer configuration.
    pub fn config(&self) -> &SignerConfig {
        &self.config
    }

    /// Default backend order: structured update first, then the standalone
    /// signature dictionary.
    pub fn backends(&self) -> Vec<Box<dyn SigningBackend>> {
        vec![
            Box::new(ExternalBackend::new(self.config.clone(), self.capabilities.clone())),
            Box::new(RawPkcs7Backend::new(self.config.clone())),
        ]
    }

    /// Sign `pdf` as `identity` and return the signed document.
    ///
    /// The input is never modified.
    pub fn sign(&self, pdf: &[u8], identity: &SignerIdentity) -> Result<Vec<u8>> {
        self.sign_with_backends(pdf, identity, &self.backends())
    }

    /// Sign with an explicit backend order.
    ///
    /// A fatal backend error is returned at once. When every backend is
    /// unavailable, the last reason is reported as
    /// [`Error::SigningBackendUnavailable`].
    pub fn sign_with_backends(
        &self,
        pdf: &[u8],
        identity: &SignerIdentity,
        backends: &[Box<dyn SigningBackend>],
    ) -> Result<Vec<u8>> {
        ensure_pdf_header(pdf)?;

        let mut last_unavailable = None;
        for backend in backends {
            log::info!("Signing {} bytes with the {} backend", pdf.len(), backend.name());
            match backend.sign(pdf, identity) {
                Ok(signed) => {
                    log::info!("{} backend produced {} bytes", backend.name(), signed.len());
                    return Ok(signed);
                },
                Err(BackendError::Fatal(e)) => {
                    log::error!("{} backend failed: {}", backend.name(), e);
                    return Err(e);
                },
                Err(BackendError::Unavailable(e)) => {
                    log::warn!("{} backend unavailable, falling back: {}", backend.name(), e);
                    last_unavailable = Some((backend.name(), e));
                },
            }
        }

        Err(match last_unavailable {
            Some((backend, e)) => Error::SigningBackendUnavailable {
                backend,
                reason: e.to_string(),
            },
            None => Error::SigningBackendUnavailable {
                backend: "none",
                reason: "no signing backends configured".to_string(),
            },
        })
    }
}

/// Resolve, digest, sign and embed a prepared placeholder.
///
/// The placeholder is only searched for inside the signature object, so
/// `/Contents` strings elsewhere in the update (annotation text on a
/// rewritten page) or in earlier signatures are never picked up.
pub fn complete_signature(
    prepared: PreparedSignature,
    identity: &SignerIdentity,
    signing_time: DateTime<Utc>,
) -> Result<Vec<u8>> {
    let PreparedSignature {
        bytes: mut prepared,
        signature_object,
    } = prepared;
    let placeholder = locate_placeholder_within(&prepared, signature_object)?;
    let spec = ByteRangeSpec::for_placeholder(&placeholder, prepared.len())?;
    write_byte_range(&mut prepared, &placeholder, &spec)?;

    let digest = digest_byte_ranges(&prepared, &spec, DigestAlgorithm::Sha256)?;
    let envelope = SignedDataEnvelope::build(&digest, identity.key_material(), signing_time)?;
    embed_signature(&mut prepared, &placeholder, &envelope.der)?;

    log::debug!(
        "Signed: ByteRange {:?}, envelope {} of {} bytes reserved",
        spec.values(),
        envelope.len(),
        placeholder.capacity_hex_chars / 2
    );
    Ok(prepared)
}
