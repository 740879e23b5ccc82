//! Configuration for PDF signing.

use crate::signatures::SignatureSubFilter;

/// Default number of bytes reserved for the DER-encoded signature envelope.
///
/// Underestimating is unrecoverable for a given placeholder, so the default is
/// generous: an RSA-2048 envelope with one certificate is usually below 2 KB.
pub const DEFAULT_SIGNATURE_CAPACITY: usize = 8192;

/// Default character width of each `/ByteRange` field.
///
/// Ten digits cover files up to 9.3 GB.
pub const DEFAULT_BYTE_RANGE_FIELD_WIDTH: usize = 10;

/// PDF signing configuration.
#[derive(Debug, Clone)]
pub struct SignerConfig {
    /// Bytes reserved for the signature envelope (before hex encoding).
    pub signature_capacity: usize,

    /// Characters reserved for each `/ByteRange` number.
    pub byte_range_field_width: usize,

    /// Normalize the document and retry once when it cannot be appended to.
    pub normalize_on_failure: bool,

    /// Use qpdf for normalization when it is installed.
    pub prefer_qpdf: bool,

    /// `/SubFilter` written into the signature dictionary.
    pub sub_filter: SignatureSubFilter,

    /// Prefix of the generated signature field name (`/T`).
    pub field_name_prefix: String,
}

impl Default for SignerConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl SignerConfig {
    /// Create new configuration with defaults.
    pub fn new() -> Self {
        Self {
            signature_capacity: DEFAULT_SIGNATURE_CAPACITY,
            byte_range_field_width: DEFAULT_BYTE_RANGE_FIELD_WIDTH,
            normalize_on_failure: true,
            prefer_qpdf: true,
            sub_filter: SignatureSubFilter::default(),
            field_name_prefix: "Signature".to_string(),
        }
    }

    /// Set the reserved signature capacity in bytes.
    pub fn with_signature_capacity(mut self, bytes: usize) -> Self {
        self.signature_capacity = bytes;
        self
    }

    /// Set the character width of each `/ByteRange` field.
    pub fn with_byte_range_field_width(mut self, width: usize) -> Self {
        self.byte_range_field_width = width;
        self
    }

    /// Enable or disable normalization on structural failure.
    pub fn with_normalization(mut self, enable: bool) -> Self {
        self.normalize_on_failure = enable;
        self
    }

    /// Enable or disable qpdf as the preferred normalizer.
    pub fn with_qpdf(mut self, enable: bool) -> Self {
        self.prefer_qpdf = enable;
        self
    }

    /// Set the signature sub-filter.
    pub fn with_sub_filter(mut self, sub_filter: SignatureSubFilter) -> Self {
        self.sub_filter = sub_filter;
        self
    }

    /// Set the signature field name prefix.
    pub fn with_field_name_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.field_name_prefix = prefix.into();
        self
    }

    /// Number of hex characters reserved in `/Contents`.
    pub fn capacity_hex_chars(&self) -> usize {
        self.signature_capacity * 2
    }
}
