//! Normalization through the external `qpdf` tool.

use super::Normalizer;
use crate::error::{Error, Result};
use std::io::Write;
use std::process::Command;

/// Runs `qpdf --object-streams=disable` over scratch files.
///
/// Both scratch files are [`tempfile::NamedTempFile`]s: uniquely named and
/// removed when dropped, whether qpdf succeeds or not.
#[derive(Debug, Clone)]
pub struct QpdfNormalizer {
    program: String,
}

impl Default for QpdfNormalizer {
    fn default() -> Self {
        Self::new()
    }
}

impl QpdfNormalizer {
    /// Use `qpdf` from `PATH`.
    pub fn new() -> Self {
        Self {
            program: "qpdf".to_string(),
        }
    }

    /// Use a specific qpdf executable.
    pub fn with_program(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }
}

impl Normalizer for QpdfNormalizer {
    fn name(&self) -> &'static str {
        "qpdf"
    }

    fn normalize(&self, pdf: &[u8]) -> Result<Vec<u8>> {
        let mut input = tempfile::Builder::new().prefix("pdf_seal_in_").suffix(".pdf").tempfile()?;
        input.write_all(pdf)?;
        input.flush()?;
        let output = tempfile::Builder::new().prefix("pdf_seal_out_").suffix(".pdf").tempfile()?;

        let result = Command::new(&self.program)
            .arg("--object-streams=disable")
            .arg(input.path())
            .arg(output.path())
            .output()?;

        // Exit code 3 means success with warnings
        match result.status.code() {
            Some(0) | Some(3) => {},
            code => {
                let stderr = String::from_utf8_lossy(&result.stderr);
                return Err(Error::InvalidPdfFormat(format!(
                    "qpdf exited with {:?}: {}",
                    code,
                    stderr.trim()
                )));
            },
        }

        let normalized = std::fs::read(output.path())?;
        if normalized.is_empty() {
            return Err(Error::InvalidPdfFormat("qpdf produced an empty file".to_string()));
        }
        Ok(normalized)
    }
}
