//! Stream filters needed to read object streams.
//!
//! Only `FlateDecode` is implemented: it is the filter every producer uses for
//! `/Type /ObjStm` streams, which are the only streams the normalizer has to
//! open. Other filters are reported as [`Error::UnsupportedFilter`].

use crate::error::{Error, Result};

mod flate;

pub use flate::FlateDecoder;

/// Upper bound on a single decoded stream.
pub const MAX_DECODED_SIZE: usize = 100 * 1024 * 1024;

/// A PDF stream filter.
pub trait StreamDecoder {
    /// Decode `input`.
    fn decode(&self, input: &[u8]) -> Result<Vec<u8>>;

    /// Filter name as written in `/Filter`.
    fn name(&self) -> &'static str;
}

fn decoder_for(filter: &str) -> Result<Box<dyn StreamDecoder>> {
    match filter {
        "FlateDecode" | "Fl" => Ok(Box::new(FlateDecoder)),
        other => Err(Error::UnsupportedFilter(other.to_string())),
    }
}

/// Apply `filters` to `data` in order.
pub fn decode_stream(data: &[u8], filters: &[String]) -> Result<Vec<u8>> {
    let mut current = data.to_vec();
    for filter in filters {
        let decoder = decoder_for(filter)?;
        current = decoder.decode(&current)?;
        if current.len() > MAX_DECODED_SIZE {
            return Err(Error::Decode(format!(
                "{} output exceeds {} bytes",
                decoder.name(),
                MAX_DECODED_SIZE
            )));
        }
    }
    Ok(current)
}
