//! Cryptographic integrity check of the most recent signature.
//!
//! Recomputes the byte-range digest, compares it with the `message-digest`
//! attribute of the embedded CMS envelope, and verifies the RSA signature
//! over the signed attributes with the embedded certificate. The certificate
//! itself is not validated against any trust anchor.

use super::byterange::{digest_byte_ranges, ByteRangeSpec};
use super::credentials::certificate_common_name;
use super::envelope::{ID_MESSAGE_DIGEST, ID_SIGNED_DATA};
use super::locator::{locate_placeholder_within, parse_byte_range_values};
use super::types::{DigestAlgorithm, IntegrityReport, SignaturePlaceholder};
use super::verifier::enclosing_object;
use crate::parser::decode_hex;
use cms::cert::x509::Certificate;
use cms::cert::CertificateChoices;
use cms::content_info::ContentInfo;
use cms::signed_data::{SignedData, SignerIdentifier, SignerInfo};
use der::oid::AssociatedOid;
use der::{Decode, Encode, SliceReader};
use pkcs8::DecodePublicKey;
use rsa::pkcs1v15::{Signature, VerifyingKey};
use rsa::RsaPublicKey;
use sha1::Sha1;
use sha2::{Digest, Sha256, Sha384, Sha512};
use signature::Verifier;

/// Check the last signature in `pdf`. Never fails; every problem found is
/// recorded in [`IntegrityReport::problems`].
pub fn check_integrity(pdf: &[u8]) -> IntegrityReport {
    let mut report = IntegrityReport::default();
    if let Err(problem) = run_checks(pdf, &mut report) {
        log::debug!("Integrity check stopped: {}", problem);
        report.problems.push(problem);
    }
    report
}

fn run_checks(pdf: &[u8], report: &mut IntegrityReport) -> Result<(), String> {
    let placeholder = last_placeholder(pdf).ok_or("no signature placeholder found")?;
    let values = parse_byte_range_values(pdf, &placeholder).ok_or("ByteRange holds no concrete values")?;
    report.signature_found = true;

    let declared = ByteRangeSpec::from_values(values);
    let expected = ByteRangeSpec::for_placeholder(&placeholder, pdf.len()).map_err(|e| e.to_string())?;
    report.byte_range_valid = declared == expected;
    if !report.byte_range_valid {
        report.problems.push(format!(
            "ByteRange {:?} does not cover the file; expected {:?}",
            declared.values(),
            expected.values()
        ));
    }
    declared.validate(pdf.len()).map_err(|e| e.to_string())?;

    let envelope = decode_hex(&pdf[placeholder.contents_start..placeholder.contents_end])
        .map_err(|e| format!("/Contents is not valid hex: {}", e))?;
    let signed_data = decode_signed_data(&envelope)?;
    let signer_info = signed_data
        .signer_infos
        .0
        .iter()
        .next()
        .ok_or("SignedData has no signer info")?;

    let algorithm = DigestAlgorithm::from_oid(&signer_info.digest_alg.oid)
        .ok_or_else(|| format!("unsupported digest algorithm {}", signer_info.digest_alg.oid))?;
    report.digest_algorithm = Some(algorithm);

    let digest = digest_byte_ranges(pdf, &declared, algorithm).map_err(|e| e.to_string())?;
    let signed_attrs = signer_info
        .signed_attrs
        .as_ref()
        .ok_or("signer info has no signed attributes")?;
    let message_digest = signed_attrs
        .iter()
        .find(|attr| attr.oid == ID_MESSAGE_DIGEST)
        .and_then(|attr| attr.values.iter().next())
        .ok_or("message-digest attribute missing")?;
    report.digest_matches = message_digest.value() == digest.as_slice();
    if !report.digest_matches {
        report
            .problems
            .push("document digest does not match the signed message digest".to_string());
    }

    let certificate = signer_certificate(&signed_data, signer_info).ok_or("signer certificate not embedded")?;
    let certificate_der = certificate.to_der().map_err(|e| e.to_string())?;
    report.signer_common_name = certificate_common_name(&certificate_der);

    let signed_attrs_der = signed_attrs.to_der().map_err(|e| e.to_string())?;
    let spki_der = certificate
        .tbs_certificate
        .subject_public_key_info
        .to_der()
        .map_err(|e| e.to_string())?;
    let public_key = RsaPublicKey::from_public_key_der(&spki_der).map_err(|e| format!("signer key: {}", e))?;
    let signature = signer_info.signature.as_bytes();

    report.signature_valid = match algorithm {
        DigestAlgorithm::Sha1 => verify_pkcs1v15::<Sha1>(public_key, &signed_attrs_der, signature),
        DigestAlgorithm::Sha256 => verify_pkcs1v15::<Sha256>(public_key, &signed_attrs_der, signature),
        DigestAlgorithm::Sha384 => verify_pkcs1v15::<Sha384>(public_key, &signed_attrs_der, signature),
        DigestAlgorithm::Sha512 => verify_pkcs1v15::<Sha512>(public_key, &signed_attrs_der, signature),
    };
    if !report.signature_valid {
        report
            .problems
            .push("RSA signature over the signed attributes does not verify".to_string());
    }
    Ok(())
}

/// The placeholder of the object holding the last `/ByteRange`; later
/// signatures cover earlier ones.
fn last_placeholder(pdf: &[u8]) -> Option<SignaturePlaceholder> {
    const MARKER: &[u8] = b"/ByteRange";
    let marker = pdf.windows(MARKER.len()).rposition(|w| w == MARKER)?;
    let object = enclosing_object(pdf, marker..marker + MARKER.len());
    locate_placeholder_within(pdf, object).ok()
}

/// Decode the envelope, ignoring the zero padding after the DER.
fn decode_signed_data(envelope: &[u8]) -> Result<SignedData, String> {
    let mut reader = SliceReader::new(envelope).map_err(|e| e.to_string())?;
    let content_info = ContentInfo::decode(&mut reader).map_err(|e| format!("CMS ContentInfo: {}", e))?;
    if content_info.content_type != ID_SIGNED_DATA {
        return Err(format!("unexpected CMS content type {}", content_info.content_type));
    }
    let content = content_info.content.to_der().map_err(|e| e.to_string())?;
    SignedData::from_der(&content).map_err(|e| format!("CMS SignedData: {}", e))
}

fn signer_certificate<'a>(signed_data: &'a SignedData, signer_info: &SignerInfo) -> Option<&'a Certificate> {
    let certificates: Vec<&Certificate> = signed_data
        .certificates
        .as_ref()?
        .0
        .iter()
        .filter_map(|choice| match choice {
            CertificateChoices::Certificate(cert) => Some(cert),
            _ => None,
        })
        .collect();

    let by_serial = match &signer_info.sid {
        SignerIdentifier::IssuerAndSerialNumber(id) => certificates.iter().find(|cert| {
            cert.tbs_certificate.serial_number == id.serial_number && cert.tbs_certificate.issuer == id.issuer
        }),
        SignerIdentifier::SubjectKeyIdentifier(_) => None,
    };
    by_serial.or(certificates.first()).copied()
}

fn verify_pkcs1v15<D>(public_key: RsaPublicKey, message: &[u8], signature: &[u8]) -> bool
where
    D: Digest + AssociatedOid,
{
    let Ok(signature) = Signature::try_from(signature) else {
        return false;
    };
    VerifyingKey::<D>::new(public_key).verify(message, &signature).is_ok()
}
