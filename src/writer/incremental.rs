//! Incremental update writer.
//!
//! Appends new and replaced objects after the original bytes, followed by a
//! classic cross-reference section and a trailer linked to the previous one
//! through `/Prev`. The original bytes are copied unchanged.

use crate::document::PdfStructure;
use crate::error::{Error, Result};
use crate::object::{Object, ObjectRef};
use crate::writer::ObjectSerializer;
use std::collections::BTreeMap;
use std::ops::Range;

/// Pending incremental update over an existing document.
#[derive(Debug)]
pub struct IncrementalUpdate<'a> {
    structure: &'a PdfStructure<'a>,
    objects: BTreeMap<u32, (u16, Vec<u8>)>,
    next_number: u32,
}

impl<'a> IncrementalUpdate<'a> {
    /// Start an update over `structure`.
    pub fn new(structure: &'a PdfStructure<'a>) -> Self {
        Self {
            structure,
            objects: BTreeMap::new(),
            next_number: structure.next_object_number(),
        }
    }

    /// Reserve a fresh object number.
    pub fn allocate(&mut self) -> ObjectRef {
        let r = ObjectRef::new(self.next_number, 0);
        self.next_number += 1;
        r
    }

    /// Add or replace an object.
    pub fn set_object(&mut self, r: ObjectRef, obj: &Object) {
        let body = ObjectSerializer::new().serialize(obj);
        self.objects.insert(r.id, (r.gen, body));
    }

    /// Add an object whose body is already serialized.
    ///
    /// Used for objects whose exact byte layout matters, such as a signature
    /// dictionary with reserved spans.
    pub fn set_raw_object(&mut self, r: ObjectRef, body: Vec<u8>) {
        self.objects.insert(r.id, (r.gen, body));
    }

    /// Number of objects in the update.
    pub fn len(&self) -> usize {
        self.objects.len()
    }

    /// Whether the update is empty.
    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    /// Write the original bytes followed by the update.
    pub fn finish(self) -> Result<Vec<u8>> {
        self.finish_with_spans().map(|(bytes, _)| bytes)
    }

    /// Like [`finish`](Self::finish), also returning where each written
    /// object landed: from `N G obj` to just past `endobj`.
    pub fn finish_with_spans(self) -> Result<(Vec<u8>, BTreeMap<u32, Range<usize>>)> {
        if self.objects.is_empty() {
            return Err(Error::Unsupported("empty incremental update".to_string()));
        }

        let original = self.structure.bytes();
        let mut out = Vec::with_capacity(original.len() + 4096);
        out.extend_from_slice(original);
        if !matches!(original.last(), Some(b'\n') | Some(b'\r')) {
            out.push(b'\n');
        }

        let mut offsets = Vec::with_capacity(self.objects.len());
        let mut spans = BTreeMap::new();
        for (&id, (gen, body)) in &self.objects {
            let start = out.len();
            offsets.push((id, *gen, start));
            out.extend_from_slice(format!("{} {} obj\n", id, gen).as_bytes());
            out.extend_from_slice(body);
            out.extend_from_slice(b"\nendobj\n");
            spans.insert(id, start..out.len());
        }

        let xref_offset = out.len();
        out.extend_from_slice(&xref_section(&offsets));

        let max_written = offsets.last().map(|(id, _, _)| *id).unwrap_or(0);
        let size = self.next_number.max(max_written + 1);
        out.extend_from_slice(b"trailer\n");
        out.extend_from_slice(&trailer_for(self.structure, size)?);
        out.extend_from_slice(format!("\nstartxref\n{}\n%%EOF\n", xref_offset).as_bytes());

        log::debug!(
            "Incremental update: {} object(s), xref at {}, /Size {}",
            offsets.len(),
            xref_offset,
            size
        );
        Ok((out, spans))
    }
}

/// Classic xref section with one subsection per run of consecutive numbers.
///
/// `entries` must be sorted by object number.
pub fn xref_section(entries: &[(u32, u16, usize)]) -> Vec<u8> {
    let mut out = b"xref\n".to_vec();
    let mut i = 0;
    while i < entries.len() {
        let mut j = i + 1;
        while j < entries.len() && entries[j].0 == entries[j - 1].0 + 1 {
            j += 1;
        }
        out.extend_from_slice(format!("{} {}\n", entries[i].0, j - i).as_bytes());
        for (_, gen, offset) in &entries[i..j] {
            out.extend_from_slice(format!("{:010} {:05} n \n", offset, gen).as_bytes());
        }
        i = j;
    }
    out
}

/// `/ID` array whose first element is `first` (or fresh) and whose second
/// element is always fresh.
pub fn fresh_file_id(first: Option<&Object>) -> Object {
    let first = match first {
        Some(Object::String(s)) => s.clone(),
        _ => uuid::Uuid::new_v4().as_bytes().to_vec(),
    };
    let second = uuid::Uuid::new_v4().as_bytes().to_vec();
    Object::Array(vec![Object::String(first), Object::String(second)])
}

fn trailer_for(structure: &PdfStructure<'_>, size: u32) -> Result<Vec<u8>> {
    let old = structure.trailer();
    let mut trailer = crate::object::Dictionary::new();
    trailer.insert("Size".to_string(), Object::Integer(i64::from(size)));
    trailer.insert("Prev".to_string(), Object::Integer(structure.startxref() as i64));
    trailer.insert("Root".to_string(), Object::Reference(structure.root_ref()?));
    if let Some(info) = structure.info_ref() {
        trailer.insert("Info".to_string(), Object::Reference(info));
    }
    let first_id = old.get("ID").and_then(Object::as_array).and_then(|ids| ids.first());
    trailer.insert("ID".to_string(), fresh_file_id(first_id));
    Ok(ObjectSerializer::new().serialize(&Object::Dictionary(trailer)))
}
