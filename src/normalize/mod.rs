//! Document normalization.
//!
//! Some documents cannot take an incremental update as they are: their
//! cross-reference data lives in compressed streams, their xref table is
//! damaged, or the objects the update must touch sit inside object streams.
//! Normalization rewrites such a document into a plain file with every
//! object uncompressed and a classic xref table, after which the update can
//! be retried.
//!
//! Two normalizers exist: [`QpdfNormalizer`] shells out to the `qpdf` tool
//! when [`Capabilities`] reports it installed, and [`RewriteNormalizer`] is a
//! built-in rewrite that is always available.

mod qpdf;
mod rewrite;

pub use qpdf::QpdfNormalizer;
pub use rewrite::RewriteNormalizer;

use crate::document::PdfStructure;
use crate::error::{Error, Result};
use std::process::Command;

/// Optional external tools available to this process.
///
/// Computed once with [`Capabilities::detect`] and passed to the signer.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Capabilities {
    /// `qpdf --version` output when qpdf is installed
    pub qpdf_version: Option<String>,
}

impl Capabilities {
    /// Probe the system for optional tools.
    pub fn detect() -> Self {
        let qpdf_version = Command::new("qpdf")
            .arg("--version")
            .output()
            .ok()
            .filter(|out| out.status.success())
            .and_then(|out| {
                String::from_utf8_lossy(&out.stdout)
                    .lines()
                    .next()
                    .map(|line| line.trim().to_string())
            });

        match &qpdf_version {
            Some(version) => log::info!("Detected {}", version),
            None => log::info!("qpdf not available, using built-in normalization only"),
        }
        Self { qpdf_version }
    }

    /// No optional tools.
    pub fn none() -> Self {
        Self::default()
    }

    /// Whether qpdf can be used.
    pub fn has_qpdf(&self) -> bool {
        self.qpdf_version.is_some()
    }
}

/// Rewrites a document into an appendable form.
pub trait Normalizer {
    /// Normalizer name for logging.
    fn name(&self) -> &'static str;

    /// Produce a normalized copy of `pdf`.
    fn normalize(&self, pdf: &[u8]) -> Result<Vec<u8>>;
}

/// Normalize `pdf` with the best available normalizer.
///
/// qpdf is tried first when it is installed and `prefer_qpdf` is set, then
/// the built-in rewrite. A result only counts when its cross-reference
/// table loads; otherwise the next normalizer runs. The last error is
/// returned when every normalizer fails.
pub fn normalize_pdf(pdf: &[u8], capabilities: &Capabilities, prefer_qpdf: bool) -> Result<Vec<u8>> {
    let mut chain: Vec<Box<dyn Normalizer>> = Vec::new();
    if prefer_qpdf && capabilities.has_qpdf() {
        chain.push(Box::new(QpdfNormalizer::new()));
    }
    chain.push(Box::new(RewriteNormalizer::new()));

    let mut last_error = Error::InvalidPdfFormat("no normalizer available".to_string());
    for normalizer in chain {
        log::info!("Normalizing document with {}", normalizer.name());
        let attempt = normalizer.normalize(pdf).and_then(|out| {
            PdfStructure::load(&out)?;
            Ok(out)
        });
        match attempt {
            Ok(out) => {
                log::info!("{} produced {} bytes", normalizer.name(), out.len());
                return Ok(out);
            },
            Err(e) => {
                log::warn!("{} normalization failed: {}", normalizer.name(), e);
                last_error = e;
            },
        }
    }
    Err(last_error)
}
