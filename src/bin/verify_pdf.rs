//! Verify PDF Signatures
//!
//! Reports whether a PDF carries a digital signature, who signed it and when.
//!
//! Usage:
//!   verify_pdf <input.pdf>
//!   verify_pdf <input.pdf> --json
//!   verify_pdf <input.pdf> --integrity
//!
//! `--integrity` also recomputes the byte-range digest and verifies the
//! embedded envelope.

use pdf_seal::{check_integrity, detect_signature, IntegrityReport, SignatureDetectionResult};
use serde::Serialize;
use std::path::PathBuf;
use std::process::ExitCode;

struct VerifyArgs {
    input: PathBuf,
    json: bool,
    integrity: bool,
}

impl VerifyArgs {
    fn from_args() -> Option<Self> {
        let args: Vec<String> = std::env::args().collect();
        let mut input = None;
        let mut json = false;
        let mut integrity = false;

        for arg in args.iter().skip(1) {
            match arg.as_str() {
                "--json" => json = true,
                "--integrity" => integrity = true,
                other if other.starts_with("--") => {
                    eprintln!("Warning: ignoring unknown option {}", other);
                },
                other => input = Some(PathBuf::from(other)),
            }
        }

        Some(Self {
            input: input?,
            json,
            integrity,
        })
    }
}

#[derive(Serialize)]
struct VerifyReport {
    #[serde(flatten)]
    detection: SignatureDetectionResult,
    #[serde(skip_serializing_if = "Option::is_none")]
    integrity: Option<IntegrityReport>,
}

fn print_human(report: &VerifyReport) {
    let d = &report.detection;
    println!("{}", d.message);
    println!("  {}", d.details);
    if d.present {
        println!("  Signed by:      {}", d.signed_by);
        println!("  Signing time:   {}", d.signing_time.to_rfc3339());
        println!("  Reason:         {}", d.signing_reason);
        println!("  Signature type: {}", d.signature_type);
    }
    if let Some(size) = d.contents_size {
        println!("  Contents:       {} bytes reserved", size);
    }
    if let Some(range) = d.byte_range {
        println!("  ByteRange:      {:?}", range);
    }

    if let Some(integrity) = &report.integrity {
        println!();
        if integrity.is_intact() {
            println!("✓ Integrity check passed");
        } else {
            println!("✗ Integrity check failed");
        }
        if let Some(cn) = &integrity.signer_common_name {
            println!("  Certificate CN: {}", cn);
        }
        for problem in &integrity.problems {
            println!("  - {}", problem);
        }
    }
}

fn main() -> ExitCode {
    env_logger::init();

    let Some(args) = VerifyArgs::from_args() else {
        eprintln!("Usage: verify_pdf <input.pdf> [--json] [--integrity]");
        return ExitCode::from(2);
    };

    let pdf = match std::fs::read(&args.input) {
        Ok(pdf) => pdf,
        Err(e) => {
            eprintln!("Error reading {}: {}", args.input.display(), e);
            return ExitCode::FAILURE;
        },
    };

    let report = VerifyReport {
        detection: detect_signature(&pdf),
        integrity: args.integrity.then(|| check_integrity(&pdf)),
    };

    if args.json {
        match serde_json::to_string_pretty(&report) {
            Ok(json) => println!("{}", json),
            Err(e) => {
                eprintln!("Error: {}", e);
                return ExitCode::FAILURE;
            },
        }
    } else {
        print_human(&report);
    }
    ExitCode::SUCCESS
}
