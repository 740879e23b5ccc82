//! ByteRange calculation for PDF signatures.
//!
//! PDF digital signatures use a ByteRange array to specify which portions
//! of the document are covered by the signature. The signature itself is
//! stored in a placeholder that is excluded from the signed bytes.
//!
//! ## ByteRange Format
//!
//! The ByteRange is an array of four integers:
//! `[offset1, length1, offset2, length2]`
//!
//! Where:
//! - `offset1` = 0 (start of file)
//! - `length1` = byte offset of the first hex digit of `/Contents`
//! - `offset2` = byte offset of the `>` closing `/Contents`
//! - `length2` = remaining bytes to end of file
//!
//! Only the hex digits are excluded; the `<` and `>` delimiters are signed.

use super::types::{DigestAlgorithm, SignaturePlaceholder};
use crate::error::{Error, Result};
use sha1::Sha1;
use sha2::{Digest, Sha256, Sha384, Sha512};
use std::ops::Range;

/// The two digested spans of a signed file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ByteRangeSpec {
    /// Start of the first span (always 0 for spans computed here)
    pub offset1: u64,
    /// Length of the first span
    pub length1: u64,
    /// Start of the second span
    pub offset2: u64,
    /// Length of the second span
    pub length2: u64,
}

impl ByteRangeSpec {
    /// Spans covering everything in a file of `file_len` bytes except the
    /// placeholder's hex digits.
    pub fn for_placeholder(placeholder: &SignaturePlaceholder, file_len: usize) -> Result<Self> {
        if placeholder.contents_start > placeholder.contents_end || placeholder.contents_end > file_len {
            return Err(Error::InvalidPdfFormat(format!(
                "placeholder {}..{} lies outside a {}-byte file",
                placeholder.contents_start, placeholder.contents_end, file_len
            )));
        }
        Ok(Self {
            offset1: 0,
            length1: placeholder.contents_start as u64,
            offset2: placeholder.contents_end as u64,
            length2: (file_len - placeholder.contents_end) as u64,
        })
    }

    /// Build from a parsed `/ByteRange` array.
    pub fn from_values(values: [u64; 4]) -> Self {
        Self {
            offset1: values[0],
            length1: values[1],
            offset2: values[2],
            length2: values[3],
        }
    }

    /// The four array values in order.
    pub fn values(&self) -> [u64; 4] {
        [self.offset1, self.length1, self.offset2, self.length2]
    }

    /// Check that the spans cover a file of `file_len` bytes from start to
    /// end with a single gap.
    pub fn validate(&self, file_len: usize) -> Result<()> {
        // First range must start at 0
        if self.offset1 != 0 {
            return Err(Error::InvalidPdfFormat(format!(
                "ByteRange must start at 0, got {}",
                self.offset1
            )));
        }

        // Second range must end at file size
        let actual_end = self.offset2.checked_add(self.length2);
        if actual_end != Some(file_len as u64) {
            return Err(Error::InvalidPdfFormat(format!(
                "ByteRange must end at file size {}, got {}+{}",
                file_len, self.offset2, self.length2
            )));
        }

        // First range must end before second range starts
        if self.length1 > self.offset2 {
            return Err(Error::InvalidPdfFormat(format!(
                "ByteRange first range ({}) overlaps with second range start ({})",
                self.length1, self.offset2
            )));
        }

        Ok(())
    }

    /// Both spans as index ranges, bounds-checked against `file_len`.
    pub fn ranges(&self, file_len: usize) -> Result<[Range<usize>; 2]> {
        let first = to_range(self.offset1, self.length1, file_len, "first")?;
        let second = to_range(self.offset2, self.length2, file_len, "second")?;
        Ok([first, second])
    }

    /// Extract the bytes to be signed: the concatenation of both spans.
    pub fn signed_bytes(&self, pdf: &[u8]) -> Result<Vec<u8>> {
        let [first, second] = self.ranges(pdf.len())?;
        let mut signed = Vec::with_capacity(first.len() + second.len());
        signed.extend_from_slice(&pdf[first]);
        signed.extend_from_slice(&pdf[second]);
        Ok(signed)
    }

    /// Bytes between the two spans.
    pub fn excluded_len(&self) -> u64 {
        self.offset2.saturating_sub(self.offset1.saturating_add(self.length1))
    }
}

fn to_range(offset: u64, length: u64, file_len: usize, which: &str) -> Result<Range<usize>> {
    let end = offset.checked_add(length).filter(|&end| end <= file_len as u64);
    match end {
        Some(end) => Ok(offset as usize..end as usize),
        None => Err(Error::InvalidPdfFormat(format!(
            "ByteRange {} range exceeds file size: {} + {} > {}",
            which, offset, length, file_len
        ))),
    }
}

/// Digest both spans of `pdf` without copying them.
pub fn digest_byte_ranges(pdf: &[u8], spec: &ByteRangeSpec, algorithm: DigestAlgorithm) -> Result<Vec<u8>> {
    let ranges = spec.ranges(pdf.len())?;
    let digest = match algorithm {
        DigestAlgorithm::Sha1 => hash_ranges::<Sha1>(pdf, &ranges),
        DigestAlgorithm::Sha256 => hash_ranges::<Sha256>(pdf, &ranges),
        DigestAlgorithm::Sha384 => hash_ranges::<Sha384>(pdf, &ranges),
        DigestAlgorithm::Sha512 => hash_ranges::<Sha512>(pdf, &ranges),
    };
    log::debug!(
        "{} over ByteRange {:?}: {}",
        algorithm.name(),
        spec.values(),
        super::bytes_to_hex(&digest)
    );
    Ok(digest)
}

fn hash_ranges<D: Digest>(pdf: &[u8], ranges: &[Range<usize>]) -> Vec<u8> {
    let mut hasher = D::new();
    for range in ranges {
        hasher.update(&pdf[range.clone()]);
    }
    hasher.finalize().to_vec()
}
