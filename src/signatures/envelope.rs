//! Detached CMS SignedData construction.
//!
//! The envelope signs an externally computed document digest: the
//! encapsulated content is `id-data` without content, and the RSA signature
//! covers the DER encoding of the signed attributes (content-type,
//! message-digest, signing-time), not the document digest itself.

use super::credentials::KeyMaterial;
use super::types::DigestAlgorithm;
use crate::error::{Error, Result};
use chrono::{DateTime, Datelike, Timelike, Utc};
use cms::builder::{SignedDataBuilder, SignerInfoBuilder};
use cms::cert::x509::attr::Attribute;
use cms::cert::x509::time::Time;
use cms::cert::{CertificateChoices, IssuerAndSerialNumber};
use cms::signed_data::{EncapsulatedContentInfo, SignerIdentifier};
use der::asn1::{SetOfVec, UtcTime};
use der::oid::ObjectIdentifier;
use der::{Any, Encode};
use rsa::pkcs1v15::SigningKey;
use sha2::Sha256;
use spki::AlgorithmIdentifierOwned;

/// id-data content type.
pub const ID_DATA: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.113549.1.7.1");
/// id-signedData content type.
pub const ID_SIGNED_DATA: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.113549.1.7.2");
/// id-messageDigest signed attribute.
pub const ID_MESSAGE_DIGEST: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.113549.1.9.4");
/// id-signingTime signed attribute.
pub const ID_SIGNING_TIME: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.113549.1.9.5");

/// A DER-encoded detached signature ready for embedding.
#[derive(Debug, Clone)]
pub struct SignedDataEnvelope {
    /// DER-encoded ContentInfo wrapping SignedData
    pub der: Vec<u8>,
    /// Digest algorithm of the message-digest attribute
    pub digest_algorithm: DigestAlgorithm,
    /// Document digest carried in the message-digest attribute
    pub message_digest: Vec<u8>,
    /// Value of the signing-time attribute
    pub signing_time: DateTime<Utc>,
}

impl SignedDataEnvelope {
    /// Sign a SHA-256 document digest with `key_material`.
    pub fn build(digest: &[u8], key_material: &KeyMaterial, signing_time: DateTime<Utc>) -> Result<Self> {
        let certificate = key_material.certificate().clone();
        let digest_algorithm = AlgorithmIdentifierOwned {
            oid: DigestAlgorithm::Sha256.oid(),
            parameters: None,
        };
        let content = EncapsulatedContentInfo {
            econtent_type: ID_DATA,
            econtent: None,
        };
        let sid = SignerIdentifier::IssuerAndSerialNumber(IssuerAndSerialNumber {
            issuer: certificate.tbs_certificate.issuer.clone(),
            serial_number: certificate.tbs_certificate.serial_number.clone(),
        });

        let signer = SigningKey::<Sha256>::new(key_material.private_key().clone());
        let mut signer_info = SignerInfoBuilder::new(
            &signer,
            sid,
            digest_algorithm.clone(),
            &content,
            Some(digest),
        )
        .map_err(signing_error)?;
        signer_info
            .add_signed_attribute(signing_time_attribute(signing_time)?)
            .map_err(signing_error)?;

        let mut builder = SignedDataBuilder::new(&content);
        let content_info = builder
            .add_digest_algorithm(digest_algorithm)
            .map_err(signing_error)?
            .add_certificate(CertificateChoices::Certificate(certificate))
            .map_err(signing_error)?
            .add_signer_info::<SigningKey<Sha256>, rsa::pkcs1v15::Signature>(signer_info)
            .map_err(signing_error)?
            .build()
            .map_err(signing_error)?;

        let der = content_info.to_der().map_err(signing_error)?;
        log::debug!("Built SignedData envelope: {} bytes", der.len());

        Ok(Self {
            der,
            digest_algorithm: DigestAlgorithm::Sha256,
            message_digest: digest.to_vec(),
            signing_time,
        })
    }

    /// Encoded length in bytes.
    pub fn len(&self) -> usize {
        self.der.len()
    }

    /// Whether the encoding is empty.
    pub fn is_empty(&self) -> bool {
        self.der.is_empty()
    }
}

fn signing_time_attribute(time: DateTime<Utc>) -> Result<Attribute> {
    let date_time = der::DateTime::new(
        u16::try_from(time.year()).map_err(|_| Error::SigningFailed(format!("year {} out of range", time.year())))?,
        time.month() as u8,
        time.day() as u8,
        time.hour() as u8,
        time.minute() as u8,
        time.second() as u8,
    )
    .map_err(signing_error)?;
    let utc = UtcTime::from_date_time(date_time).map_err(signing_error)?;
    let value = Any::encode_from(&Time::UtcTime(utc)).map_err(signing_error)?;

    let mut values = SetOfVec::new();
    values.insert(value).map_err(signing_error)?;
    Ok(Attribute {
        oid: ID_SIGNING_TIME,
        values,
    })
}

fn signing_error(e: impl std::fmt::Display) -> Error {
    Error::SigningFailed(e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use cms::content_info::ContentInfo;
    use cms::signed_data::SignedData;
    use der::Decode;
    use sha2::Digest;

    fn key_material() -> KeyMaterial {
        KeyMaterial::from_pem(
            include_str!("../../tests/fixtures/private_key.pem"),
            include_str!("../../tests/fixtures/certificate.pem"),
            None,
        )
        .unwrap()
    }

    #[test]
    fn test_envelope_structure() {
        let digest = Sha256::digest(b"document bytes").to_vec();
        let time = Utc.with_ymd_and_hms(2026, 3, 14, 15, 9, 26).unwrap();
        let envelope = SignedDataEnvelope::build(&digest, &key_material(), time).unwrap();
        assert!(!envelope.is_empty());
        assert!(envelope.len() < 4096);

        let content_info = ContentInfo::from_der(&envelope.der).unwrap();
        assert_eq!(content_info.content_type, ID_SIGNED_DATA);
        let signed_data = SignedData::from_der(&content_info.content.to_der().unwrap()).unwrap();
        assert_eq!(signed_data.encap_content_info.econtent_type, ID_DATA);
        assert!(signed_data.encap_content_info.econtent.is_none());
        assert_eq!(signed_data.certificates.as_ref().map(|c| c.0.len()), Some(1));

        let signer_info = signed_data.signer_infos.0.get(0).unwrap();
        let attrs = signer_info.signed_attrs.as_ref().unwrap();
        let digest_attr = attrs.iter().find(|a| a.oid == ID_MESSAGE_DIGEST).unwrap();
        assert_eq!(digest_attr.values.get(0).unwrap().value(), digest.as_slice());
        assert!(attrs.iter().any(|a| a.oid == ID_SIGNING_TIME));
    }

    #[test]
    fn test_signing_time_attribute() {
        let time = Utc.with_ymd_and_hms(2026, 1, 2, 3, 4, 5).unwrap();
        let attr = signing_time_attribute(time).unwrap();
        assert_eq!(attr.oid, ID_SIGNING_TIME);
        let encoded = attr.values.get(0).unwrap().to_der().unwrap();
        // UTCTime tag followed by "260102030405Z"
        assert_eq!(encoded[0], 0x17);
        assert_eq!(&encoded[2..], b"260102030405Z");
    }
}
