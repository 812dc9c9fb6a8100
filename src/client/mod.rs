// Copyright 2016-2019 `multipart-upload` Crate Developers
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.
//! The client-side abstraction for multipart requests.
//!
//! Build a `Form`, add fields to it in the order they should be sent, then either turn it into
//! a streaming body with `.into_body()` or hand it to an [`Upload`](hyper/struct.Upload.html).
use std::path::Path;

use http::HeaderValue;
use tokio::io::AsyncWrite;

use crate::{Error, Result};

mod field;
mod streaming;
mod writer;

#[cfg(feature = "hyper")]
pub mod hyper;

pub use self::field::MultipartField;
pub use self::streaming::MultipartBody;
pub use self::writer::MultipartWriter;

const BOUNDARY_LEN: usize = 32;

/// An ordered list of fields for a `multipart/form-data` request.
///
/// Fields are sent in the order they were added. Nothing is read from disk until the body
/// is sent or written.
#[derive(Debug)]
pub struct Form {
    boundary: String,
    fields: Vec<MultipartField>,
    quote_fields: bool,
}

impl Default for Form {
    fn default() -> Self {
        Self::new()
    }
}

impl Form {
    /// An empty form with a random boundary and quoting enabled.
    pub fn new() -> Self {
        Self::with_boundary(gen_boundary())
    }

    /// An empty form using the given boundary.
    ///
    /// The boundary must not occur in any of the field contents.
    ///
    /// ## Panics
    /// If `boundary` is empty, longer than 70 characters, or contains characters outside of
    /// those allowed by [RFC 2046 section 5.1.1](https://tools.ietf.org/html/rfc2046#section-5.1.1).
    ///
    /// Use [`Form::try_with_boundary()`](#method.try_with_boundary) for a boundary which
    /// isn't known to be valid.
    pub fn with_boundary<B: Into<String>>(boundary: B) -> Self {
        match Self::try_with_boundary(boundary) {
            Ok(form) => form,
            Err(e) => panic!("{}", e),
        }
    }

    /// An empty form using the given boundary, or `Error::Config` if the boundary is empty,
    /// longer than 70 characters or contains characters outside of RFC 2046 `bchars`.
    pub fn try_with_boundary<B: Into<String>>(boundary: B) -> Result<Self> {
        let boundary = boundary.into();

        if !is_valid_boundary(&boundary) {
            return Err(Error::Config(format!(
                "invalid multipart boundary: {:?}",
                boundary
            )));
        }

        Ok(Form {
            boundary,
            fields: Vec::new(),
            quote_fields: true,
        })
    }

    /// Set whether field names and filenames are percent-encoded in part headers.
    ///
    /// Some servers expect the raw names (e.g. `Hi[One]`), for them pass `false`.
    pub fn quote_fields(&mut self, quote_fields: bool) -> &mut Self {
        self.quote_fields = quote_fields;
        self
    }

    /// Add a plain text field.
    pub fn add_text<N: Into<String>, V: Into<String>>(&mut self, name: N, value: V) -> &mut Self {
        self.add_field(MultipartField::text(name, value))
    }

    /// Add a file field, inferring the filename and content type from `path`.
    pub fn add_file<N: Into<String>, P: AsRef<Path>>(&mut self, name: N, path: P) -> &mut Self {
        self.add_field(MultipartField::file(name, path))
    }

    /// Add a file field reported to the server as `filename`.
    pub fn add_file_as<N, P, F>(&mut self, name: N, path: P, filename: F) -> &mut Self
    where
        N: Into<String>,
        P: AsRef<Path>,
        F: Into<String>,
    {
        self.add_field(MultipartField::file_as(name, path, filename))
    }

    /// Add any field.
    pub fn add_field(&mut self, field: MultipartField) -> &mut Self {
        self.fields.push(field);
        self
    }

    /// The fields in the order they will be sent.
    pub fn fields(&self) -> &[MultipartField] {
        &self.fields
    }

    /// The delimiter between parts, without the leading `--`.
    pub fn boundary(&self) -> &str {
        &self.boundary
    }

    /// `true` if field names and filenames will be percent-encoded.
    pub fn is_quoting_fields(&self) -> bool {
        self.quote_fields
    }

    /// The value for the `Content-Type` header of the request.
    pub fn content_type(&self) -> HeaderValue {
        content_type(&self.boundary)
    }

    /// Convert into a lazily produced request body.
    pub fn into_body(self) -> MultipartBody {
        MultipartBody::new(self.boundary, self.fields, self.quote_fields)
    }

    /// Write the whole encoded body to `out`, streaming file fields chunk by chunk.
    pub async fn write_to<W: AsyncWrite + Unpin>(self, out: W) -> Result<W> {
        let mut writer = MultipartWriter::new(out, self.boundary);
        writer.quote_fields(self.quote_fields);

        for field in &self.fields {
            match field {
                MultipartField::Text { name, value } => {
                    writer.write_text(name, value).await?;
                }
                MultipartField::File {
                    name,
                    filename,
                    content_type,
                    path,
                } => {
                    writer
                        .write_file_as(name, path, filename, content_type)
                        .await?;
                }
            }
        }

        writer.finish().await?;
        Ok(writer.into_inner())
    }
}

pub(crate) fn content_type(boundary: &str) -> HeaderValue {
    format!("multipart/form-data; boundary={}", boundary)
        .parse()
        .expect("boundary is checked in Form::with_boundary()")
}

fn is_valid_boundary(boundary: &str) -> bool {
    // `bchars` minus space, which would need the parameter to be quoted
    (1..=70).contains(&boundary.len())
        && boundary
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b"'()+_,-./:=?".contains(&b))
}

fn gen_boundary() -> String {
    let boundary = crate::random_alphanumeric(BOUNDARY_LEN);
    debug!("generated boundary: {}", boundary);
    boundary
}
