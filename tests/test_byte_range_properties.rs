//! Property tests for the signed byte ranges.

mod common;

use common::{identity, one_page_pdf};
use pdf_seal::signatures::{
    detect_signature, digest_byte_ranges, locate_placeholder_from, ByteRangeSpec, DigestAlgorithm,
    SignaturePlaceholder,
};
use pdf_seal::{Capabilities, PdfSigner, SignerConfig};
use proptest::prelude::*;
use std::sync::OnceLock;

struct Signed {
    bytes: Vec<u8>,
    placeholder: SignaturePlaceholder,
    spec: ByteRangeSpec,
    digest: Vec<u8>,
}

/// One signing run shared by every case; RSA signing is too slow per case.
fn signed() -> &'static Signed {
    static SIGNED: OnceLock<Signed> = OnceLock::new();
    SIGNED.get_or_init(|| {
        let pdf = one_page_pdf();
        let config = SignerConfig::default().with_signature_capacity(4096);
        let bytes = PdfSigner::new(config, Capabilities::none())
            .sign(&pdf, &identity())
            .unwrap();
        let placeholder = locate_placeholder_from(&bytes, pdf.len()).unwrap();
        let spec = ByteRangeSpec::from_values(detect_signature(&bytes).byte_range.unwrap());
        let digest = digest_byte_ranges(&bytes, &spec, DigestAlgorithm::Sha256).unwrap();
        Signed {
            bytes,
            placeholder,
            spec,
            digest,
        }
    })
}

#[test]
fn test_length_identity() {
    let s = signed();
    let [_, length1, _, length2] = s.spec.values();
    assert_eq!(
        length1 as usize + s.placeholder.capacity_hex_chars + length2 as usize,
        s.bytes.len()
    );
    assert_eq!(s.spec.excluded_len() as usize, s.placeholder.capacity_hex_chars);
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(128))]

    /// Any byte changed outside the placeholder changes the digest.
    #[test]
    fn outside_edit_changes_digest(position in any::<prop::sample::Index>(), flip in 1u8..=255) {
        let s = signed();
        let outside = s.bytes.len() - s.placeholder.capacity_hex_chars;
        let mut index = position.index(outside);
        if index >= s.placeholder.contents_start {
            index += s.placeholder.capacity_hex_chars;
        }

        let mut tampered = s.bytes.clone();
        tampered[index] ^= flip;
        let digest = digest_byte_ranges(&tampered, &s.spec, DigestAlgorithm::Sha256).unwrap();
        prop_assert_ne!(digest, s.digest.clone());
    }

    /// Bytes inside the placeholder are never digested.
    #[test]
    fn inside_edit_keeps_digest(position in any::<prop::sample::Index>(), value in any::<u8>()) {
        let s = signed();
        let index = s.placeholder.contents_start + position.index(s.placeholder.capacity_hex_chars);

        let mut tampered = s.bytes.clone();
        tampered[index] = value;
        let digest = digest_byte_ranges(&tampered, &s.spec, DigestAlgorithm::Sha256).unwrap();
        prop_assert_eq!(digest, s.digest.clone());
    }
}
