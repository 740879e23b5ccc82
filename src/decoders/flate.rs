//! FlateDecode (zlib/deflate).

use crate::decoders::{StreamDecoder, MAX_DECODED_SIZE};
use crate::error::{Error, Result};
use flate2::read::{DeflateDecoder, ZlibDecoder};
use std::io::Read;

/// FlateDecode filter.
///
/// Tries a zlib stream first, then raw deflate, then raw deflate after a
/// damaged two-byte zlib header. Data decoded before a corruption point is
/// kept.
pub struct FlateDecoder;

fn inflate<R: Read>(reader: R) -> (Vec<u8>, Option<std::io::Error>) {
    let mut out = Vec::new();
    let result = reader.take(MAX_DECODED_SIZE as u64 + 1).read_to_end(&mut out);
    (out, result.err())
}

impl StreamDecoder for FlateDecoder {
    fn decode(&self, input: &[u8]) -> Result<Vec<u8>> {
        let (out, err) = inflate(ZlibDecoder::new(input));
        match err {
            None => return Ok(out),
            Some(e) if !out.is_empty() => {
                log::warn!("FlateDecode recovered {} bytes before corruption: {}", out.len(), e);
                return Ok(out);
            },
            Some(e) => log::debug!("Zlib decode failed ({}), trying raw deflate", e),
        }

        let candidates: [&[u8]; 2] = [input, input.get(2..).unwrap_or(&[])];
        for (attempt, data) in candidates.iter().enumerate() {
            let (out, err) = inflate(DeflateDecoder::new(*data));
            if !out.is_empty() {
                if err.is_some() {
                    log::warn!("Raw deflate (attempt {}) recovered {} bytes", attempt + 1, out.len());
                }
                return Ok(out);
            }
        }

        Err(Error::Decode("FlateDecode: no recoverable deflate data".to_string()))
    }

    fn name(&self) -> &'static str {
        "FlateDecode"
    }
}
