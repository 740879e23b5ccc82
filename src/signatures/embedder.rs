//! Writing final values into a prepared placeholder.
//!
//! Both operations overwrite bytes in place and never change the buffer
//! length: the digest already covers every byte around the placeholder.

use super::byterange::ByteRangeSpec;
use super::locator::byte_range_slots;
use super::types::SignaturePlaceholder;
use crate::error::{Error, Result};

/// Encode bytes as uppercase hex.
pub fn bytes_to_hex(data: &[u8]) -> String {
    const DIGITS: &[u8; 16] = b"0123456789ABCDEF";
    let mut hex = String::with_capacity(data.len() * 2);
    for &b in data {
        hex.push(DIGITS[usize::from(b >> 4)] as char);
        hex.push(DIGITS[usize::from(b & 0x0F)] as char);
    }
    hex
}

/// Write concrete `/ByteRange` values over the placeholder's fields.
///
/// Each value is left-aligned in its slot and padded with spaces. A value
/// wider than its slot is [`Error::ByteRangeOverflow`]; nothing is written
/// in that case.
pub fn write_byte_range(pdf: &mut [u8], placeholder: &SignaturePlaceholder, spec: &ByteRangeSpec) -> Result<()> {
    let slots = byte_range_slots(pdf, placeholder)?;

    let mut rendered = Vec::with_capacity(4);
    for (slot, value) in slots.iter().zip(spec.values()) {
        let text = value.to_string();
        if text.len() > slot.len() {
            return Err(Error::ByteRangeOverflow {
                value,
                width: slot.len(),
                offset: slot.start,
            });
        }
        rendered.push(format!("{:<width$}", text, width = slot.len()));
    }

    for (slot, text) in slots.into_iter().zip(rendered) {
        pdf[slot].copy_from_slice(text.as_bytes());
    }
    Ok(())
}

/// Hex-encode `envelope` into the `/Contents` span, zero-filling the rest.
///
/// Fails with [`Error::SignatureTooLarge`] when the encoded envelope does not
/// fit; the buffer is left untouched in that case.
pub fn embed_signature(pdf: &mut [u8], placeholder: &SignaturePlaceholder, envelope: &[u8]) -> Result<()> {
    let hex = bytes_to_hex(envelope);
    let capacity = placeholder.contents_end - placeholder.contents_start;
    if hex.len() > capacity {
        return Err(Error::SignatureTooLarge {
            required: hex.len(),
            capacity,
        });
    }
    if placeholder.contents_end > pdf.len() {
        return Err(Error::InvalidPdfFormat(format!(
            "/Contents span ends at byte {} beyond a {}-byte file",
            placeholder.contents_end,
            pdf.len()
        )));
    }

    let span = &mut pdf[placeholder.contents_start..placeholder.contents_end];
    span[..hex.len()].copy_from_slice(hex.as_bytes());
    span[hex.len()..].fill(b'0');

    log::debug!(
        "Embedded {} of {} hex characters at byte {}",
        hex.len(),
        capacity,
        placeholder.contents_start
    );
    Ok(())
}
