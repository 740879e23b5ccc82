//! Minimal PDF fixtures for unit tests.

/// Build a classic-xref PDF from `(object number, body)` pairs.
///
/// Object 1 is expected to be the catalog. Object numbers missing from
/// `objects` get free entries.
pub(crate) fn build_pdf(objects: &[(u32, &str)]) -> Vec<u8> {
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
        format!(
            "trailer\n<< /Size {} /Root 1 0 R >>\nstartxref\n{}\n%%EOF\n",
            max + 1,
            xref_offset
        )
        .as_bytes(),
    );
    pdf
}

/// A one-page document: catalog 1, pages 2, page 3.
pub(crate) fn one_page_pdf() -> Vec<u8> {
    build_pdf(&[
        (1, "<< /Type /Catalog /Pages 2 0 R >>"),
        (2, "<< /Type /Pages /Kids [3 0 R] /Count 1 >>"),
        (3, "<< /Type /Page /Parent 2 0 R /MediaBox [0 0 612 792] >>"),
    ])
}
