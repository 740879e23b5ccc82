//! Sign a PDF
//!
//! Signs a PDF with PEM key material and writes the signed copy.
//!
//! Usage:
//!   sign_pdf <input.pdf> <output.pdf> --keys <dir> [--password <pw>]
//!   sign_pdf <input.pdf> <output.pdf> --key <key.pem> --cert <cert.pem>
//!   sign_pdf <input.pdf> <output.pdf> --p12 <signer.p12> --password <passphrase>
//!
//! Options:
//!   --name, --organization, --position   signer identity for /Name and /Reason
//!   --capacity <bytes>                   bytes reserved for the signature
//!   --no-qpdf                            use only the built-in normalizer
//!
//! On failure the error payload is printed as JSON and the exit code is 1.

use pdf_seal::signatures::{FileKeyStore, KeyMaterial, KeyStore, PdfSigner, SignerIdentity};
use pdf_seal::{Capabilities, Error, ErrorPayload, SignerConfig};
use std::fs;
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Default)]
struct SignArgs {
    input: PathBuf,
    output: PathBuf,
    keys_dir: Option<PathBuf>,
    key_file: Option<PathBuf>,
    cert_file: Option<PathBuf>,
    p12_file: Option<PathBuf>,
    password: Option<String>,
    name: Option<String>,
    organization: Option<String>,
    position: Option<String>,
    capacity: Option<usize>,
    no_qpdf: bool,
}

impl SignArgs {
    fn from_args() -> Result<Self, String> {
        let args: Vec<String> = std::env::args().collect();
        let mut parsed = SignArgs::default();
        let mut positional = Vec::new();

        let mut i = 1;
        while i < args.len() {
            let flag = args[i].as_str();
            let mut value = || {
                i += 1;
                args.get(i).cloned().ok_or_else(|| format!("{} needs a value", flag))
            };
            match flag {
                "--keys" => parsed.keys_dir = Some(PathBuf::from(value()?)),
                "--key" => parsed.key_file = Some(PathBuf::from(value()?)),
                "--cert" => parsed.cert_file = Some(PathBuf::from(value()?)),
                "--p12" => parsed.p12_file = Some(PathBuf::from(value()?)),
                "--password" => parsed.password = Some(value()?),
                "--name" => parsed.name = Some(value()?),
                "--organization" => parsed.organization = Some(value()?),
                "--position" => parsed.position = Some(value()?),
                "--capacity" => {
                    let raw = value()?;
                    let bytes = raw.parse().map_err(|_| format!("invalid --capacity: {}", raw))?;
                    parsed.capacity = Some(bytes);
                },
                "--no-qpdf" => parsed.no_qpdf = true,
                other if other.starts_with("--") => return Err(format!("unknown option {}", other)),
                other => positional.push(PathBuf::from(other)),
            }
            i += 1;
        }

        let [input, output]: [PathBuf; 2] = positional
            .try_into()
            .map_err(|_| "expected <input.pdf> <output.pdf>".to_string())?;
        parsed.input = input;
        parsed.output = output;
        Ok(parsed)
    }

    fn load_keys(&self) -> pdf_seal::Result<KeyMaterial> {
        let password = self.password.as_deref();
        if let Some(p12) = &self.p12_file {
            return KeyMaterial::from_pkcs12(&fs::read(p12)?, password.unwrap_or_default());
        }
        match (&self.keys_dir, &self.key_file, &self.cert_file) {
            (Some(dir), _, _) => FileKeyStore::new(dir).load(password),
            (None, Some(key), Some(cert)) => {
                KeyMaterial::from_pem(&fs::read_to_string(key)?, &fs::read_to_string(cert)?, password)
            },
            (None, Some(bundle), None) => KeyMaterial::from_pem_bundle(&fs::read_to_string(bundle)?, password),
            _ => Err(Error::KeysNotConfigured("pass --keys <dir>, --key/--cert or --p12".to_string())),
        }
    }

    fn identity(&self, keys: KeyMaterial) -> SignerIdentity {
        let mut identity = match &self.name {
            Some(name) => SignerIdentity::new(keys, name.clone()),
            None => SignerIdentity::from_certificate(keys),
        };
        if let Some(organization) = &self.organization {
            identity = identity.with_organization(organization.clone());
        }
        if let Some(position) = &self.position {
            identity = identity.with_position(position.clone());
        }
        identity
    }

    fn config(&self) -> SignerConfig {
        let mut config = SignerConfig::default().with_qpdf(!self.no_qpdf);
        if let Some(capacity) = self.capacity {
            config = config.with_signature_capacity(capacity);
        }
        config
    }
}

fn run(args: &SignArgs) -> pdf_seal::Result<usize> {
    let identity = args.identity(args.load_keys()?);
    let pdf = fs::read(&args.input)?;

    let capabilities = if args.no_qpdf {
        Capabilities::none()
    } else {
        Capabilities::detect()
    };
    let signer = PdfSigner::new(args.config(), capabilities);
    let signed = signer.sign(&pdf, &identity)?;

    fs::write(&args.output, &signed)?;
    Ok(signed.len())
}

fn main() -> ExitCode {
    env_logger::init();

    let args = match SignArgs::from_args() {
        Ok(args) => args,
        Err(e) => {
            eprintln!("Error: {}", e);
            eprintln!("Usage: sign_pdf <input.pdf> <output.pdf> --keys <dir> | --key <key.pem> --cert <cert.pem> | --p12 <signer.p12>");
            return ExitCode::from(2);
        },
    };

    match run(&args) {
        Ok(len) => {
            println!("✓ Signed {} -> {} ({} bytes)", args.input.display(), args.output.display(), len);
            ExitCode::SUCCESS
        },
        Err(e) => {
            let payload = ErrorPayload::from(&e);
            match serde_json::to_string_pretty(&payload) {
                Ok(json) => println!("{}", json),
                Err(_) => eprintln!("Error: {}", e),
            }
            ExitCode::FAILURE
        },
    }
}
