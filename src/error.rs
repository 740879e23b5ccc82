//! Error types for the signing engine.
//!
//! This module defines every error that can occur while preparing, signing or
//! embedding a PDF signature, together with [`FailureKind`], the coarse
//! classification callers use to decide how to react (re-enter a password,
//! re-upload a file, generate keys, ...).
//!
//! Verification never produces an [`Error`]: an unsigned or unreadable document is
//! a valid verification outcome, reported through
//! [`SignatureVerdict`](crate::signatures::SignatureVerdict).

use serde::Serialize;

/// Result type alias for signing engine operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error types that can occur while signing a PDF.
#[derive(Debug, thiserror::Error)]
#[allow(clippy::enum_variant_names)] // "Invalid"/"Key" prefixes are intentional for clarity
pub enum Error {
    /// Input is not a PDF, or its structure cannot be used even after normalization
    #[error("Invalid PDF format: {0}")]
    InvalidPdfFormat(String),

    /// The `/Contents` or `/ByteRange` marker of the signature placeholder is missing
    #[error("Signature placeholder not found: no {marker} at or after byte {searched_from}")]
    PlaceholderNotFound {
        /// Marker that could not be located
        marker: &'static str,
        /// Byte offset where the search started
        searched_from: usize,
    },

    /// Hex-encoded signature does not fit the reserved `/Contents` capacity
    #[error(
        "Signature too large: {required} hex characters required, {capacity} reserved; \
         re-run with a larger signature capacity"
    )]
    SignatureTooLarge {
        /// Hex characters needed for the encoded envelope
        required: usize,
        /// Hex characters reserved in the placeholder
        capacity: usize,
    },

    /// A final `/ByteRange` value is wider than its reserved field
    #[error("ByteRange value {value} does not fit in a {width}-character field at byte {offset}")]
    ByteRangeOverflow {
        /// Value that had to be written
        value: u64,
        /// Characters available in the field
        width: usize,
        /// Byte offset of the field
        offset: usize,
    },

    /// Certificate material could not be parsed
    #[error("Certificate parse error: {0}")]
    CertificateParseError(String),

    /// Private key material could not be parsed
    #[error("Private key parse error: {0}")]
    KeyParseError(String),

    /// Encrypted private key could not be decrypted (missing or wrong password)
    #[error("Private key decryption failed: {0}")]
    KeyDecryptionError(String),

    /// The key store holds no key material for this signer
    #[error("No signing keys configured: {0}")]
    KeysNotConfigured(String),

    /// A signing backend could not process the document
    #[error("Signing backend '{backend}' unavailable: {reason}")]
    SigningBackendUnavailable {
        /// Backend name
        backend: &'static str,
        /// Why the backend gave up
        reason: String,
    },

    /// CMS assembly or the RSA signature operation failed
    #[error("Signing failed: {0}")]
    SigningFailed(String),

    /// Parse error at specific byte offset
    #[error("Failed to parse object at byte {offset}: {reason}")]
    ParseError {
        /// Byte offset where error occurred
        offset: usize,
        /// Reason for parse failure
        reason: String,
    },

    /// Invalid cross-reference table
    #[error("Invalid cross-reference table")]
    InvalidXref,

    /// Cross-reference stream found where a classic table was required
    #[error("Cross-reference stream at byte {offset} (document needs normalization)")]
    XrefStream {
        /// Byte offset of the xref stream object
        offset: usize,
    },

    /// Referenced object not found in cross-reference table
    #[error("Object not found: {0} {1} R")]
    ObjectNotFound(u32, u16),

    /// Object has wrong type
    #[error("Invalid object type: expected {expected}, found {found}")]
    InvalidObjectType {
        /// Expected object type
        expected: String,
        /// Actual object type found
        found: String,
    },

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Unsupported feature
    #[error("Unsupported feature: {0}")]
    Unsupported(String),

    /// Stream decoding error
    #[error("Stream decoding error: {0}")]
    Decode(String),

    /// Unsupported stream filter
    #[error("Unsupported filter: {0}")]
    UnsupportedFilter(String),

    /// Recursion depth limit exceeded
    #[error("Recursion depth limit exceeded (max: {0})")]
    RecursionLimitExceeded(u32),
}

/// Coarse classification of a signing failure.
///
/// The distinctions matter to the caller: a wrong password is fixed by asking
/// again, a non-PDF upload by uploading a different file, missing keys by
/// generating keys first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// No key material configured for the signer
    NoKeys,
    /// Password missing or wrong for the encrypted key
    WrongPassword,
    /// Input is not a usable PDF
    NotAPdf,
    /// Key or certificate is malformed
    InvalidCredentials,
    /// Signature could not be produced or embedded
    EmbeddingFailed,
}

impl FailureKind {
    /// Message shown to the end user for this kind of failure.
    pub fn user_message(&self) -> &'static str {
        match self {
            FailureKind::NoKeys => "Keys not found. Please generate keys first.",
            FailureKind::WrongPassword => "Invalid password",
            FailureKind::NotAPdf => "Uploaded file is not a valid PDF document.",
            FailureKind::InvalidCredentials => "Signing key or certificate is invalid",
            FailureKind::EmbeddingFailed => "Digital signature failed",
        }
    }
}

impl Error {
    /// Classify this error for the caller.
    pub fn failure_kind(&self) -> FailureKind {
        match self {
            Error::KeysNotConfigured(_) => FailureKind::NoKeys,
            Error::KeyDecryptionError(_) => FailureKind::WrongPassword,
            Error::KeyParseError(_) | Error::CertificateParseError(_) => {
                FailureKind::InvalidCredentials
            },
            Error::InvalidPdfFormat(_)
            | Error::ParseError { .. }
            | Error::InvalidXref
            | Error::XrefStream { .. }
            | Error::ObjectNotFound(..)
            | Error::InvalidObjectType { .. }
            | Error::RecursionLimitExceeded(_) => FailureKind::NotAPdf,
            _ => FailureKind::EmbeddingFailed,
        }
    }
}

/// Structured error payload returned across the HTTP boundary.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorPayload {
    /// User-facing message
    pub error: &'static str,
    /// Failure classification
    pub kind: FailureKind,
    /// Technical details
    pub details: String,
}

impl From<&Error> for ErrorPayload {
    fn from(err: &Error) -> Self {
        let kind = err.failure_kind();
        Self {
            error: kind.user_message(),
            kind,
            details: err.to_string(),
        }
    }
}
