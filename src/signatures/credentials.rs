//! Signing credentials.
//!
//! Key material arrives as PEM text from a [`KeyStore`]: an RSA private key
//! (PKCS#8, encrypted PKCS#8 or PKCS#1) and an X.509 certificate. A PKCS#12
//! archive with its passphrase is accepted as well. Nothing here generates or
//! persists keys.

use crate::error::{Error, Result};
use cms::cert::x509::Certificate;
use der::Decode;
use pkcs1::DecodeRsaPrivateKey;
use pkcs8::DecodePrivateKey;
use rsa::RsaPrivateKey;
use std::path::{Path, PathBuf};
use x509_parser::pem::Pem;

const LABEL_CERTIFICATE: &str = "CERTIFICATE";
const LABEL_PKCS8: &str = "PRIVATE KEY";
const LABEL_PKCS8_ENCRYPTED: &str = "ENCRYPTED PRIVATE KEY";
const LABEL_PKCS1: &str = "RSA PRIVATE KEY";

/// File names read by [`FileKeyStore`].
pub const PRIVATE_KEY_FILE: &str = "private_key.pem";
/// Certificate file name read by [`FileKeyStore`].
pub const CERTIFICATE_FILE: &str = "certificate.pem";

/// Decoded private key and certificate.
#[derive(Clone)]
pub struct KeyMaterial {
    private_key: RsaPrivateKey,
    certificate: Certificate,
    certificate_der: Vec<u8>,
}

impl std::fmt::Debug for KeyMaterial {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyMaterial")
            .field("certificate", &format!("{} bytes", self.certificate_der.len()))
            .field("private_key", &"[REDACTED]")
            .finish()
    }
}

impl KeyMaterial {
    /// Decode a PEM private key and a PEM certificate.
    ///
    /// `password` is required for an encrypted PKCS#8 key and ignored
    /// otherwise.
    pub fn from_pem(private_key_pem: &str, certificate_pem: &str, password: Option<&str>) -> Result<Self> {
        let key_block = first_block(private_key_pem, |label| {
            matches!(label, LABEL_PKCS8 | LABEL_PKCS8_ENCRYPTED | LABEL_PKCS1)
        })
        .map_err(|e| Error::KeyParseError(e.to_string()))?
        .ok_or_else(|| Error::KeyParseError("no private key PEM block found".to_string()))?;

        let cert_block = first_block(certificate_pem, |label| label == LABEL_CERTIFICATE)
            .map_err(|e| Error::CertificateParseError(e.to_string()))?
            .ok_or_else(|| Error::CertificateParseError("no CERTIFICATE PEM block found".to_string()))?;

        Self::from_blocks(&key_block, &cert_block, password)
    }

    /// Decode a single PEM bundle holding both the private key and the
    /// certificate, in any order.
    pub fn from_pem_bundle(bundle: &str, password: Option<&str>) -> Result<Self> {
        Self::from_pem(bundle, bundle, password)
    }

    /// Decode a PKCS#12 (`.p12`/`.pfx`) archive holding the private key and
    /// its certificate chain, leaf first.
    ///
    /// A wrong passphrase is [`Error::KeyDecryptionError`].
    pub fn from_pkcs12(der: &[u8], passphrase: &str) -> Result<Self> {
        let store = p12_keystore::KeyStore::from_pkcs12(der, passphrase).map_err(pkcs12_error)?;
        let (alias, chain) = store
            .private_key_chain()
            .ok_or_else(|| Error::KeyParseError("PKCS#12 archive holds no private key".to_string()))?;
        log::debug!("PKCS#12 key '{}' with {} certificate(s)", alias, chain.chain().len());

        let private_key = RsaPrivateKey::from_pkcs8_der(chain.key())
            .map_err(|e| Error::KeyParseError(format!("PKCS#12 key: {}", e)))?;
        let leaf = chain.chain().first().ok_or_else(|| {
            Error::CertificateParseError("PKCS#12 archive holds no certificate for its key".to_string())
        })?;
        Self::from_parts(private_key, leaf.as_der().to_vec())
    }

    fn from_blocks(key: &Pem, cert: &Pem, password: Option<&str>) -> Result<Self> {
        let private_key = decode_private_key(key, password)?;
        Self::from_parts(private_key, cert.contents.clone())
    }

    fn from_parts(private_key: RsaPrivateKey, certificate_der: Vec<u8>) -> Result<Self> {
        let certificate =
            Certificate::from_der(&certificate_der).map_err(|e| Error::CertificateParseError(e.to_string()))?;
        Ok(Self {
            private_key,
            certificate,
            certificate_der,
        })
    }

    /// The RSA private key.
    pub fn private_key(&self) -> &RsaPrivateKey {
        &self.private_key
    }

    /// The signer certificate.
    pub fn certificate(&self) -> &Certificate {
        &self.certificate
    }

    /// The signer certificate, DER encoded.
    pub fn certificate_der(&self) -> &[u8] {
        &self.certificate_der
    }

    /// Subject common name of the certificate.
    pub fn common_name(&self) -> Option<String> {
        certificate_common_name(&self.certificate_der)
    }
}

fn first_block(pem: &str, wanted: impl Fn(&str) -> bool) -> std::result::Result<Option<Pem>, String> {
    for block in Pem::iter_from_buffer(pem.as_bytes()) {
        match block {
            Ok(block) if wanted(&block.label) => return Ok(Some(block)),
            Ok(_) => {},
            Err(e) => return Err(format!("malformed PEM: {:?}", e)),
        }
    }
    Ok(None)
}

fn decode_private_key(block: &Pem, password: Option<&str>) -> Result<RsaPrivateKey> {
    match block.label.as_str() {
        LABEL_PKCS8 => RsaPrivateKey::from_pkcs8_der(&block.contents)
            .map_err(|e| Error::KeyParseError(format!("PKCS#8: {}", e))),
        LABEL_PKCS1 => RsaPrivateKey::from_pkcs1_der(&block.contents)
            .map_err(|e| Error::KeyParseError(format!("PKCS#1: {}", e))),
        LABEL_PKCS8_ENCRYPTED => {
            let password = password.filter(|p| !p.is_empty()).ok_or_else(|| {
                Error::KeyDecryptionError("password required for encrypted private key".to_string())
            })?;
            RsaPrivateKey::from_pkcs8_encrypted_der(&block.contents, password)
                .map_err(|e| Error::KeyDecryptionError(e.to_string()))
        },
        other => Err(Error::KeyParseError(format!("unsupported PEM block '{}'", other))),
    }
}

fn pkcs12_error(err: p12_keystore::error::Error) -> Error {
    use p12_keystore::error::Error as Pkcs12Error;
    match err {
        Pkcs12Error::MacError(_) | Pkcs12Error::Pkcs5Error(_) | Pkcs12Error::UnpadError => {
            Error::KeyDecryptionError(format!("PKCS#12: {}", err))
        },
        other => Error::KeyParseError(format!("PKCS#12: {}", other)),
    }
}

/// Subject CN of a DER certificate.
pub fn certificate_common_name(der: &[u8]) -> Option<String> {
    let (_, cert) = x509_parser::parse_x509_certificate(der).ok()?;
    let cn = cert.subject().iter_common_name().next()?;
    cn.as_str().ok().map(str::to_string)
}

/// Source of key material for a signer.
pub trait KeyStore {
    /// Load and decode the key material, decrypting with `password` if needed.
    fn load(&self, password: Option<&str>) -> Result<KeyMaterial>;
}

/// Key store over PEM text held in memory.
#[derive(Clone)]
pub struct PemKeyStore {
    private_key_pem: String,
    certificate_pem: String,
}

impl std::fmt::Debug for PemKeyStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PemKeyStore")
            .field("private_key_pem", &"[REDACTED]")
            .field("certificate_pem", &format!("{} chars", self.certificate_pem.len()))
            .finish()
    }
}

impl PemKeyStore {
    /// Create a key store from PEM text.
    pub fn new(private_key_pem: impl Into<String>, certificate_pem: impl Into<String>) -> Self {
        Self {
            private_key_pem: private_key_pem.into(),
            certificate_pem: certificate_pem.into(),
        }
    }
}

impl KeyStore for PemKeyStore {
    fn load(&self, password: Option<&str>) -> Result<KeyMaterial> {
        if self.private_key_pem.trim().is_empty() {
            return Err(Error::KeysNotConfigured("private key is empty".to_string()));
        }
        if self.certificate_pem.trim().is_empty() {
            return Err(Error::KeysNotConfigured("certificate is empty".to_string()));
        }
        KeyMaterial::from_pem(&self.private_key_pem, &self.certificate_pem, password)
    }
}

/// Key store reading `private_key.pem` and `certificate.pem` from a directory.
#[derive(Debug, Clone)]
pub struct FileKeyStore {
    dir: PathBuf,
}

impl FileKeyStore {
    /// Use the key files in `dir`.
    pub fn new(dir: impl AsRef<Path>) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
        }
    }

    fn read(&self, name: &str) -> Result<String> {
        let path = self.dir.join(name);
        if !path.is_file() {
            return Err(Error::KeysNotConfigured(format!("{} not found", path.display())));
        }
        Ok(std::fs::read_to_string(path)?)
    }
}

impl KeyStore for FileKeyStore {
    fn load(&self, password: Option<&str>) -> Result<KeyMaterial> {
        let private_key_pem = self.read(PRIVATE_KEY_FILE)?;
        let certificate_pem = self.read(CERTIFICATE_FILE)?;
        log::debug!("Loaded key files from {}", self.dir.display());
        PemKeyStore::new(private_key_pem, certificate_pem).load(password)
    }
}

/// Who signs: key material plus the names written into the signature
/// dictionary.
#[derive(Clone)]
pub struct SignerIdentity {
    key_material: KeyMaterial,
    /// Display name for `/Name`
    pub display_name: String,
    /// Organization, shown in `/Name` and `/Location`
    pub organization: Option<String>,
    /// Position, shown in `/Reason`
    pub position: Option<String>,
}

impl std::fmt::Debug for SignerIdentity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SignerIdentity")
            .field("display_name", &self.display_name)
            .field("organization", &self.organization)
            .field("position", &self.position)
            .field("key_material", &self.key_material)
            .finish()
    }
}

impl SignerIdentity {
    /// Create an identity with a display name.
    pub fn new(key_material: KeyMaterial, display_name: impl Into<String>) -> Self {
        Self {
            key_material,
            display_name: display_name.into(),
            organization: None,
            position: None,
        }
    }

    /// Create an identity named after the certificate subject CN.
    pub fn from_certificate(key_material: KeyMaterial) -> Self {
        let name = key_material.common_name().unwrap_or_else(|| "Unknown".to_string());
        Self::new(key_material, name)
    }

    /// Set the organization.
    pub fn with_organization(mut self, organization: impl Into<String>) -> Self {
        self.organization = Some(organization.into());
        self
    }

    /// Set the position.
    pub fn with_position(mut self, position: impl Into<String>) -> Self {
        self.position = Some(position.into());
        self
    }

    /// The key material.
    pub fn key_material(&self) -> &KeyMaterial {
        &self.key_material
    }
}
