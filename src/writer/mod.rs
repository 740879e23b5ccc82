//! PDF writing.
//!
//! - [`ObjectSerializer`] renders objects back to PDF syntax.
//! - [`IncrementalUpdate`] appends objects to an existing file without
//!   touching its original bytes.

mod incremental;
mod object_serializer;

pub use incremental::{fresh_file_id, xref_section, IncrementalUpdate};
pub use object_serializer::{escape_literal, text_string, ObjectSerializer};
