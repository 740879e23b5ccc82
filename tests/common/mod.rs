//! Shared fixtures for integration tests.

#![allow(dead_code)]

use flate2::write::ZlibEncoder;
use flate2::Compression;
use pdf_seal::signatures::{KeyMaterial, SignerIdentity};
use std::io::Write;

pub const PRIVATE_KEY: &str = include_str!("../fixtures/private_key.pem");
pub const PRIVATE_KEY_PKCS1: &str = include_str!("../fixtures/private_key_pkcs1.pem");
pub const PRIVATE_KEY_ENCRYPTED: &str = include_str!("../fixtures/private_key_encrypted.pem");
pub const CERTIFICATE: &str = include_str!("../fixtures/certificate.pem");
pub const KEY_PASSWORD: &str = "correct horse";

pub fn key_material() -> KeyMaterial {
    KeyMaterial::from_pem(PRIVATE_KEY, CERTIFICATE, None).unwrap()
}

pub fn identity() -> SignerIdentity {
    SignerIdentity::from_certificate(key_material())
}

/// Classic-xref PDF from `(object number, body)` pairs; object 1 is the catalog.
pub fn build_pdf(objects: &[(u32, &str)]) -> Vec<u8> {
    let mut pdf = b"%PDF-1.4\n%\xE2\xE3\xCF\xD3\n".to_vec();
    let max = objects.iter().map(|(n, _)| *n).max().unwrap_or(0);
    let mut offsets = vec![None; max as usize + 1];

    for (num, body) in objects {
        offsets[*num as usize] = Some(pdf.len());
        pdf.extend_from_slice(format!("{} 0 obj\n{}\nendobj\n", num, body).as_bytes());
    }

    let xref_offset = pdf.len();
    pdf.extend_from_slice(format!("xref\n0 {}\n", max + 1).as_bytes());
    for (i, offset) in offsets.iter().enumerate() {
        match offset {
            Some(off) if i > 0 => pdf.extend_from_slice(format!("{:010} 00000 n \n", off).as_bytes()),
            _ => pdf.extend_from_slice(b"0000000000 65535 f \n"),
        }
    }
    pdf.extend_from_slice(
        format!("trailer\n<< /Size {} /Root 1 0 R >>\nstartxref\n{}\n%%EOF\n", max + 1, xref_offset).as_bytes(),
    );
    pdf
}

pub fn one_page_pdf() -> Vec<u8> {
    build_pdf(&[
        (1, "<< /Type /Catalog /Pages 2 0 R >>"),
        (2, "<< /Type /Pages /Kids [3 0 R] /Count 1 >>"),
        (3, "<< /Type /Page /Parent 2 0 R /MediaBox [0 0 612 792] >>"),
    ])
}

fn deflate(data: &[u8]) -> Vec<u8> {
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(data).unwrap();
    encoder.finish().unwrap()
}

/// PDF 1.5 file with catalog, pages and page compressed into object stream 4
/// and indexed by cross-reference stream 5.
pub fn compressed_pdf() -> Vec<u8> {
    let bodies = [
        "<< /Type /Catalog /Pages 2 0 R >>",
        "<< /Type /Pages /Kids [3 0 R] /Count 1 >>",
        "<< /Type /Page /Parent 2 0 R /MediaBox [0 0 612 792] >>",
    ];
    let mut header = String::new();
    let mut body = String::new();
    for (i, text) in bodies.iter().enumerate() {
        header.push_str(&format!("{} {} ", i + 1, body.len()));
        body.push_str(text);
        body.push('\n');
    }
    let objstm_data = deflate(format!("{}{}", header, body).as_bytes());

    let mut pdf = b"%PDF-1.5\n%\xE2\xE3\xCF\xD3\n".to_vec();
    let objstm_offset = pdf.len();
    pdf.extend_from_slice(
        format!(
            "4 0 obj\n<< /Type /ObjStm /N 3 /First {} /Filter /FlateDecode /Length {} >>\nstream\n",
            header.len(),
            objstm_data.len()
        )
        .as_bytes(),
    );
    pdf.extend_from_slice(&objstm_data);
    pdf.extend_from_slice(b"\nendstream\nendobj\n");

    let xref_offset = pdf.len();
    let mut entries = vec![0u8, 0, 0, 0xFF];
    for index in 0..3u8 {
        entries.extend_from_slice(&[2, 0, 4, index]);
    }
    entries.extend_from_slice(&[1, (objstm_offset >> 8) as u8, objstm_offset as u8, 0]);
    entries.extend_from_slice(&[1, (xref_offset >> 8) as u8, xref_offset as u8, 0]);
    let xref_data = deflate(&entries);

    pdf.extend_from_slice(
        format!(
            "5 0 obj\n<< /Type /XRef /Size 6 /W [1 2 1] /Root 1 0 R /Filter /FlateDecode /Length {} >>\nstream\n",
            xref_data.len()
        )
        .as_bytes(),
    );
    pdf.extend_from_slice(&xref_data);
    pdf.extend_from_slice(format!("\nendstream\nendobj\nstartxref\n{}\n%%EOF\n", xref_offset).as_bytes());
    pdf
}
