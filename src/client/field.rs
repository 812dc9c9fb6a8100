// Copyright 2016-2019 `multipart-upload` Crate Developers
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.
use std::fmt::Write;
use std::path::{Path, PathBuf};

use mime::Mime;

use crate::helpers::show_bytes;

/// One part of a `multipart/form-data` body.
///
/// Field names do not have to be unique; a name like `files[]` may be repeated and every
/// occurrence is sent as its own part.
#[derive(Clone, Debug, PartialEq)]
pub enum MultipartField {
    /// A part whose contents are streamed from a file when the body is sent.
    File {
        /// The form field name.
        name: String,
        /// The filename reported to the server.
        filename: String,
        /// The `Content-Type` of the part.
        content_type: Mime,
        /// The file to read the contents from.
        path: PathBuf,
    },
    /// A plain text part, sent as UTF-8.
    Text {
        /// The form field name.
        name: String,
        /// The field value.
        value: String,
    },
}

impl MultipartField {
    /// A text field.
    pub fn text<N: Into<String>, V: Into<String>>(name: N, value: V) -> Self {
        MultipartField::Text {
            name: name.into(),
            value: value.into(),
        }
    }

    /// A file field, with the filename taken from the last component of `path` and the
    /// content type guessed from its extension.
    ///
    /// If no content type is known for the extension, `application/octet-stream` is used
    /// so the server still treats the part as a file.
    pub fn file<N: Into<String>, P: AsRef<Path>>(name: N, path: P) -> Self {
        let path = path.as_ref();
        let filename = path
            .file_name()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        Self::file_as(name, path, filename)
    }

    /// A file field reported to the server under `filename`.
    pub fn file_as<N, P, F>(name: N, path: P, filename: F) -> Self
    where
        N: Into<String>,
        P: AsRef<Path>,
        F: Into<String>,
    {
        let filename = filename.into();
        let content_type = mime_guess::from_path(&filename).first_or_octet_stream();

        MultipartField::File {
            name: name.into(),
            filename,
            content_type,
            path: path.as_ref().to_path_buf(),
        }
    }

    /// The form field name.
    pub fn name(&self) -> &str {
        match self {
            MultipartField::File { name, .. } | MultipartField::Text { name, .. } => name,
        }
    }

    /// The filename, set only for file fields.
    pub fn filename(&self) -> Option<&str> {
        match self {
            MultipartField::File { filename, .. } => Some(filename),
            MultipartField::Text { .. } => None,
        }
    }

    pub(crate) fn header(&self, boundary: &str, quote_fields: bool) -> String {
        match self {
            MultipartField::File {
                name,
                filename,
                content_type,
                ..
            } => field_header(boundary, name, Some(filename), Some(content_type), quote_fields),
            MultipartField::Text { name, .. } => {
                field_header(boundary, name, None, None, quote_fields)
            }
        }
    }
}

/// Render the delimiter and header section which precede the contents of a part.
///
/// With `quote_fields` set, parameter values are percent-encoded. Otherwise they are
/// embedded as-is, escaping only what would end the quoted string.
pub(crate) fn field_header(
    boundary: &str,
    name: &str,
    filename: Option<&str>,
    content_type: Option<&Mime>,
    quote_fields: bool,
) -> String {
    let mut header = format!(
        "--{}\r\nContent-Disposition: form-data; name=\"{}\"",
        boundary,
        quote_param(name, quote_fields, b"")
    );

    if let Some(filename) = filename {
        // writing to a `String` can't fail
        let _ = write!(header, "; filename=\"{}\"", quote_param(filename, quote_fields, b"[]"));
    }

    if let Some(content_type) = content_type {
        let _ = write!(header, "\r\nContent-Type: {}", content_type);
    }

    header.push_str("\r\n\r\n");

    trace!("field header: {}", show_bytes(header.as_bytes()));

    header
}

/// `safe` lists the bytes left as-is besides the unreserved ones; filenames keep `[]`.
fn quote_param(val: &str, quote_fields: bool, safe: &[u8]) -> String {
    if quote_fields {
        percent_encode(val, safe)
    } else {
        val.replace('\\', "\\\\").replace('"', "\\\"")
    }
}

fn percent_encode(val: &str, safe: &[u8]) -> String {
    let mut out = String::with_capacity(val.len());

    for &b in val.as_bytes() {
        if b.is_ascii_alphanumeric() || b"-._~".contains(&b) || safe.contains(&b) {
            out.push(b as char);
        } else {
            let _ = write!(out, "%{:02X}", b);
        }
    }

    out
}
