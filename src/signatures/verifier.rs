//! Structural signature detection.
//!
//! Classifies a document by which signature-related tokens appear in its raw
//! bytes. This is a heuristic: nothing is decrypted or validated, and any
//! byte sequence is accepted. See [`check_integrity`](super::check_integrity)
//! for the cryptographic check.
//!
//! Detection runs an ordered rule table over the [`SignatureEvidence`]
//! markers; the first matching rule decides the verdict. Metadata (signer
//! name, reason, signing time) is extracted independently and falls back to
//! defaults when absent.

use super::locator::{find_byte_range, find_contents, parse_byte_range_array, ContentsEncoding};
use super::types::{SignatureDetectionResult, SignatureVerdict};
use crate::lexer::{is_whitespace, literal_string_len};
use crate::parser::{decode_hex, decode_literal_string};
use chrono::{DateTime, FixedOffset, NaiveDate, TimeZone, Utc};
use lazy_static::lazy_static;
use regex::bytes::Regex;
use std::ops::Range;

lazy_static! {
    static ref RE_SIG_DICT: Regex = Regex::new(r"(?i-u)/Type\s*/Sig").unwrap();
    static ref RE_SIG_FLAGS: Regex = Regex::new(r"(?i-u)/SigFlags").unwrap();
    static ref RE_CONTENTS_HEX: Regex = Regex::new(r"(?i-u)/Contents\s*<[0-9A-F\s]+>").unwrap();
    static ref RE_CONTENTS_LITERAL: Regex = Regex::new(r"(?i-u)/Contents\s*\((?s:.)*?\)").unwrap();
    static ref RE_BYTE_RANGE: Regex = Regex::new(r"(?i-u)/ByteRange\s*\[[^\]]+\]").unwrap();
    static ref RE_WIDGET: Regex = Regex::new(r"(?i-u)/Subtype\s*/Widget").unwrap();
    static ref RE_ANNOTS_SIG: Regex = Regex::new(r"(?i-u)/Annots\s*\[(?s:.)*?/Sig\b").unwrap();
    static ref RE_FIELDS_SIG: Regex = Regex::new(r"(?i-u)/Fields\s*\[(?s:.)*?/Sig\b").unwrap();
    static ref RE_ACROFORM: Regex = Regex::new(r"(?i-u)/AcroForm").unwrap();
    static ref RE_FILTER_PPKLITE: Regex = Regex::new(r"(?i-u)/Filter\s*/Adobe\.PPKLite").unwrap();
    static ref RE_FILTER_PKCS7: Regex = Regex::new(r"(?i-u)/Filter\s*/adbe\.pkcs7\.detached").unwrap();
    static ref RE_SUBFILTER_PKCS7: Regex = Regex::new(r"(?i-u)/SubFilter\s*/adbe\.pkcs7\.detached").unwrap();
    static ref RE_SUBFILTER_CADES: Regex = Regex::new(r"(?i-u)/SubFilter\s*/ETSI\.CAdES\.detached").unwrap();
    static ref RE_OBJ_HEADER: Regex = Regex::new(r"(?-u)\d+\s+\d+\s+obj\b").unwrap();
    static ref RE_ENDOBJ: Regex = Regex::new(r"(?-u)\bendobj\b").unwrap();
    static ref RE_DATE: Regex = Regex::new(r"(?-u)/M\s*\(").unwrap();
    static ref RE_REASON: Regex = Regex::new(r"(?-u)/Reason\s*[(<]").unwrap();
    static ref RE_NAME: Regex = Regex::new(r"(?-u)/Name\s*[(<]").unwrap();
}

/// Default `/Reason` when the signature names none.
pub const DEFAULT_REASON: &str = "Document signed digitally";
/// Default signer name.
pub const UNKNOWN: &str = "Unknown";

/// Which signature markers occur in a document.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SignatureEvidence {
    /// `/Type /Sig`
    pub sig_dict: bool,
    /// `/SigFlags`
    pub sig_flags: bool,
    /// `/Contents` with a hex or literal string
    pub contents: bool,
    /// `/ByteRange [...]`
    pub byte_range: bool,
    /// `/Subtype /Widget`
    pub widget: bool,
    /// `/Annots [...]` reaching a `/Sig` token
    pub annots_sig: bool,
    /// `/Fields [...]` reaching a `/Sig` token
    pub fields_sig: bool,
    /// `/AcroForm`
    pub acroform: bool,
    /// `/Filter /Adobe.PPKLite` or `/Filter /adbe.pkcs7.detached`
    pub filter: bool,
}

impl SignatureEvidence {
    /// Scan `pdf` for every marker.
    pub fn collect(pdf: &[u8]) -> Self {
        Self {
            sig_dict: RE_SIG_DICT.is_match(pdf),
            sig_flags: RE_SIG_FLAGS.is_match(pdf),
            contents: RE_CONTENTS_HEX.is_match(pdf) || RE_CONTENTS_LITERAL.is_match(pdf),
            byte_range: RE_BYTE_RANGE.is_match(pdf),
            widget: RE_WIDGET.is_match(pdf),
            annots_sig: RE_ANNOTS_SIG.is_match(pdf),
            fields_sig: RE_FIELDS_SIG.is_match(pdf),
            acroform: RE_ACROFORM.is_match(pdf),
            filter: RE_FILTER_PPKLITE.is_match(pdf) || RE_FILTER_PKCS7.is_match(pdf),
        }
    }
}

/// One row of the detection table.
pub struct SignatureRule {
    /// Verdict when the rule matches
    pub verdict: SignatureVerdict,
    /// Headline
    pub message: &'static str,
    /// Explanation
    pub details: &'static str,
    /// Whether the rule applies
    pub matches: fn(&SignatureEvidence) -> bool,
}

impl std::fmt::Debug for SignatureRule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SignatureRule")
            .field("verdict", &self.verdict)
            .field("message", &self.message)
            .finish_non_exhaustive()
    }
}

fn strong_signature(e: &SignatureEvidence) -> bool {
    e.byte_range && e.contents && (e.sig_dict || e.filter)
}

fn detected_signature(e: &SignatureEvidence) -> bool {
    (e.sig_dict || e.filter) && (e.byte_range || e.fields_sig || e.annots_sig) && e.contents
}

fn signature_elements(e: &SignatureEvidence) -> bool {
    e.sig_dict
        || (e.fields_sig && e.sig_flags)
        || (e.annots_sig && e.sig_flags)
        || (e.sig_flags && e.contents && e.byte_range)
}

fn possibly_visual(e: &SignatureEvidence) -> bool {
    e.acroform || e.widget || e.contents
}

/// Detection rules, strongest first.
pub static SIGNATURE_RULES: [SignatureRule; 4] = [
    SignatureRule {
        verdict: SignatureVerdict::Strong,
        message: "✓ Valid Digital Signature Found",
        details: "ByteRange, Contents, and signature dictionary found. This PDF contains a proper \
                  PKCS#7 digital signature. The document is cryptographically signed and locked \
                  from editing.",
        matches: strong_signature,
    },
    SignatureRule {
        verdict: SignatureVerdict::Medium,
        message: "✓ Digital Signature Detected",
        details: "Signature structure found with ByteRange and Contents. This PDF contains a \
                  digital signature recognized by PDF readers.",
        matches: detected_signature,
    },
    SignatureRule {
        verdict: SignatureVerdict::Weak,
        message: "✓ Signature Elements Found",
        details: "PDF contains signature-related elements (signature dictionary, fields, or \
                  annotations with ByteRange).",
        matches: signature_elements,
    },
    SignatureRule {
        verdict: SignatureVerdict::PossiblyVisualOnly,
        message: "⚠ Signature Elements Found (Possibly Visual Only)",
        details: "PDF contains elements that may be related to signatures (AcroForm/Widget/Contents). \
                  This might be a visual signature or an incomplete signature placeholder. \
                  Open in Adobe Reader for proper verification.",
        matches: possibly_visual,
    },
];

/// Fallback when no rule matches.
pub static NO_SIGNATURE: SignatureRule = SignatureRule {
    verdict: SignatureVerdict::NotFound,
    message: "✗ No Signature Found",
    details: "This PDF does not contain any digital signature or signature elements.",
    matches: |_| true,
};

/// First rule matching `evidence`.
pub fn classify(evidence: &SignatureEvidence) -> &'static SignatureRule {
    SIGNATURE_RULES
        .iter()
        .find(|rule| (rule.matches)(evidence))
        .unwrap_or(&NO_SIGNATURE)
}

/// Signature metadata recovered from raw bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedSignatureInfo {
    /// `/Name`, or "Unknown"
    pub signed_by: String,
    /// `/M`, or the extraction time
    pub signing_time: DateTime<Utc>,
    /// `/Reason`, or the default reason
    pub signing_reason: String,
    /// Signature type derived from filter names
    pub signature_type: String,
    /// Bytes reserved in `/Contents`
    pub contents_size: Option<usize>,
    /// Concrete `/ByteRange`
    pub byte_range: Option<[u64; 4]>,
}

/// Extract metadata from the most recent signature dictionary.
///
/// The dictionary is the object around the last `/Type /Sig`; without one
/// the whole file is searched.
pub fn extract_signature_info(pdf: &[u8]) -> ExtractedSignatureInfo {
    let region = signature_region(pdf);

    let signing_time = find_string_value(region, &RE_DATE)
        .and_then(|raw| parse_pdf_date(&String::from_utf8_lossy(&raw)))
        .unwrap_or_else(Utc::now);
    let signing_reason = find_string_value(region, &RE_REASON)
        .map(|raw| decode_text(&raw))
        .unwrap_or_else(|| DEFAULT_REASON.to_string());
    let signed_by = find_string_value(region, &RE_NAME)
        .map(|raw| decode_text(&raw))
        .unwrap_or_else(|| UNKNOWN.to_string());

    let contents_size = find_contents(region, 0).map(|span| {
        let body = &region[span.start..span.end];
        match span.encoding {
            ContentsEncoding::Hex => body.iter().filter(|c| c.is_ascii_hexdigit()).count() / 2,
            ContentsEncoding::Literal => decode_literal_string(body).len(),
        }
    });
    let byte_range = find_byte_range(region, 0).and_then(|span| parse_byte_range_array(&region[span]));

    ExtractedSignatureInfo {
        signed_by,
        signing_time,
        signing_reason,
        signature_type: signature_type(region).to_string(),
        contents_size,
        byte_range,
    }
}

fn signature_region(pdf: &[u8]) -> &[u8] {
    match RE_SIG_DICT.find_iter(pdf).last() {
        Some(marker) => &pdf[enclosing_object(pdf, marker.range())],
        None => pdf,
    }
}

/// Span of the indirect object around `marker`, from its `N G obj` header
/// to just past `endobj`. Missing ends extend to the file bounds.
pub(crate) fn enclosing_object(pdf: &[u8], marker: Range<usize>) -> Range<usize> {
    let start = RE_OBJ_HEADER
        .find_iter(&pdf[..marker.start])
        .last()
        .map(|m| m.start())
        .unwrap_or(0);
    let end = RE_ENDOBJ
        .find_at(pdf, marker.end)
        .map(|m| m.end())
        .unwrap_or(pdf.len());
    start..end
}

fn signature_type(region: &[u8]) -> &'static str {
    if RE_FILTER_PKCS7.is_match(region) || RE_SUBFILTER_PKCS7.is_match(region) {
        "PKCS#7 Detached"
    } else if RE_SUBFILTER_CADES.is_match(region) {
        "CAdES Detached"
    } else if RE_FILTER_PPKLITE.is_match(region) {
        "PPKLite"
    } else {
        UNKNOWN
    }
}

/// Raw bytes of the first string value after `key`, literal or hex.
fn find_string_value(region: &[u8], key: &Regex) -> Option<Vec<u8>> {
    for m in key.find_iter(region) {
        let open = m.end() - 1;
        let body = &region[open + 1..];
        let value = match region[open] {
            b'(' => literal_string_len(body).map(|len| decode_literal_string(&body[..len])),
            _ => body
                .iter()
                .position(|&c| !(c.is_ascii_hexdigit() || is_whitespace(c)))
                .filter(|&len| body[len] == b'>')
                .and_then(|len| decode_hex(&body[..len]).ok()),
        };
        if value.is_some() {
            return value;
        }
    }
    None
}

/// Decode a PDF text string: UTF-16BE with a byte order mark, else UTF-8,
/// else one char per byte.
fn decode_text(raw: &[u8]) -> String {
    if let Some(utf16) = raw.strip_prefix(&[0xFE, 0xFF]) {
        let units = utf16.chunks_exact(2).map(|pair| u16::from_be_bytes([pair[0], pair[1]]));
        return char::decode_utf16(units)
            .map(|c| c.unwrap_or(char::REPLACEMENT_CHARACTER))
            .collect();
    }
    match std::str::from_utf8(raw) {
        Ok(text) => text.to_string(),
        Err(_) => raw.iter().map(|&b| b as char).collect(),
    }
}

/// Parse a PDF date `D:YYYYMMDDHHmmSS` with an optional `Z` or
/// `+HH'mm'`/`-HH'mm'` suffix.
///
/// ```
/// # use pdf_seal::signatures::parse_pdf_date;
/// let t = parse_pdf_date("D:20251208135951+02'00'").unwrap();
/// assert_eq!(t.to_rfc3339(), "2025-12-08T11:59:51+00:00");
/// assert!(parse_pdf_date("20251208").is_none());
/// ```
pub fn parse_pdf_date(text: &str) -> Option<DateTime<Utc>> {
    let s = text.trim().strip_prefix("D:")?;
    let digits = s.as_bytes().get(..14)?;
    if !digits.iter().all(u8::is_ascii_digit) {
        return None;
    }
    let num = |range: std::ops::Range<usize>| s[range].parse::<u32>().ok();

    let date = NaiveDate::from_ymd_opt(num(0..4)? as i32, num(4..6)?, num(6..8)?)?;
    let naive = date.and_hms_opt(num(8..10)?, num(10..12)?, num(12..14)?)?;

    let suffix = &s[14..];
    let offset_seconds = match suffix.as_bytes().first().copied() {
        Some(sign @ (b'+' | b'-')) => {
            let seconds = utc_offset_seconds(&suffix.as_bytes()[1..])?;
            if sign == b'-' {
                -seconds
            } else {
                seconds
            }
        },
        _ => 0,
    };

    FixedOffset::east_opt(offset_seconds)?
        .from_local_datetime(&naive)
        .single()
        .map(|t| t.with_timezone(&Utc))
}

/// Seconds in an `HH'mm'` (or `HHmm`, or `HH`) offset. Hours above 23 or
/// minutes above 59 are rejected.
fn utc_offset_seconds(tz: &[u8]) -> Option<i32> {
    let two_digits = |pair: &[u8]| match pair {
        [a, b] if a.is_ascii_digit() && b.is_ascii_digit() => Some(i32::from(a - b'0') * 10 + i32::from(b - b'0')),
        _ => None,
    };

    let hours = two_digits(tz.get(..2)?)?;
    let rest = &tz[2..];
    let rest = rest.strip_prefix(b"'").unwrap_or(rest);
    let minutes = match rest.first() {
        Some(c) if c.is_ascii_digit() => two_digits(rest.get(..2)?)?,
        _ => 0,
    };
    if hours > 23 || minutes > 59 {
        return None;
    }
    Some(hours * 3600 + minutes * 60)
}

/// Classify `pdf` and extract its signature metadata. Never fails.
pub fn detect_signature(pdf: &[u8]) -> SignatureDetectionResult {
    let evidence = SignatureEvidence::collect(pdf);
    let rule = classify(&evidence);
    let info = extract_signature_info(pdf);
    log::debug!("Signature evidence {:?} -> {:?}", evidence, rule.verdict);

    SignatureDetectionResult {
        present: rule.verdict.is_present(),
        strength: rule.verdict.strength(),
        verdict: rule.verdict,
        message: rule.message.to_string(),
        details: rule.details.to_string(),
        signed_by: info.signed_by,
        signing_time: info.signing_time,
        signing_reason: info.signing_reason,
        signature_type: info.signature_type,
        contents_size: info.contents_size,
        byte_range: info.byte_range,
    }
}
