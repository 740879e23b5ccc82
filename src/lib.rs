// Allow some clippy lints that are too pedantic for this project
#![allow(clippy::too_many_arguments)]
#![allow(clippy::enum_variant_names)]
// Allow unused for tests
#![cfg_attr(test, allow(dead_code))]

//! # PDF Seal
//!
//! Incremental PDF signing in Rust: detached CMS signatures embedded into a
//! fixed-size placeholder, plus structural signature detection.
//!
//! ## Core Features
//!
//! ### Signing
//! - **Incremental Updates**: the original bytes are never rewritten; the
//!   signature dictionary, widget and AcroForm entries are appended
//! - **Stable Layout**: `/ByteRange` and `/Contents` are reserved at a fixed
//!   width so embedding never changes the file length
//! - **Detached CMS**: SHA-256 digest, RSA PKCS#1 v1.5, signer certificate
//!   embedded, signing-time attribute
//! - **Fallbacks**: documents whose cross-reference data cannot take an
//!   incremental update are normalized (qpdf or a built-in rewrite); documents
//!   nothing can parse get a standalone signature dictionary
//!
//! ### Verification
//! - **Structural Detection**: an ordered rule table over signature markers
//!   yields Strong, Medium, Weak, possibly visual-only or not found
//! - **Metadata**: signer name, reason, signing time and signature type of
//!   the most recent signature
//! - **Integrity**: recompute the byte-range digest and verify the embedded
//!   envelope against it
//!
//! ## Quick Start
//!
//! ```ignore
//! use pdf_seal::signatures::{detect_signature, KeyMaterial, PdfSigner, SignerIdentity};
//! use pdf_seal::{Capabilities, SignerConfig};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let keys = KeyMaterial::from_pem(
//!     &std::fs::read_to_string("private_key.pem")?,
//!     &std::fs::read_to_string("certificate.pem")?,
//!     None,
//! )?;
//! let identity = SignerIdentity::new(keys, "Jane Doe").with_organization("Acme");
//!
//! let signer = PdfSigner::new(SignerConfig::default(), Capabilities::detect());
//! let signed = signer.sign(&std::fs::read("contract.pdf")?, &identity)?;
//!
//! let result = detect_signature(&signed);
//! println!("{} ({})", result.message, result.signed_by);
//! # Ok(())
//! # }
//! ```
//!
//! ## License
//!
//! Licensed under either of:
//!
//! * Apache License, Version 2.0 ([LICENSE-APACHE](LICENSE-APACHE) or <http://www.apache.org/licenses/LICENSE-2.0>)
//! * MIT license ([LICENSE-MIT](LICENSE-MIT) or <http://opensource.org/licenses/MIT>)
//!
//! at your option.

#![warn(missing_docs)]
#![cfg_attr(docsrs, feature(doc_cfg))]

// Error handling
pub mod error;

// Configuration
pub mod config;

// Core PDF parsing
pub mod document;
pub mod lexer;
pub mod object;
pub mod objstm;
pub mod parser;
pub mod xref;

// Stream decoders
pub mod decoders;

// PDF writing
pub mod writer;

// Cross-reference normalization
pub mod normalize;

// Digital signatures
pub mod signatures;

#[cfg(test)]
pub(crate) mod test_pdf;

// Re-exports
pub use config::SignerConfig;
pub use document::PdfStructure;
pub use error::{Error, ErrorPayload, FailureKind, Result};
pub use normalize::Capabilities;
pub use signatures::{
    check_integrity, detect_signature, IntegrityReport, PdfSigner, SignatureDetectionResult,
    SignatureStrength, SignerIdentity,
};

// Version info
/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name
pub const NAME: &str = env!("CARGO_PKG_NAME");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(VERSION.starts_with("0."));
    }

    #[test]
    fn test_name() {
        assert_eq!(NAME, "pdf_seal");
    }

    #[test]
    fn test_error_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<Error>();
    }
}
