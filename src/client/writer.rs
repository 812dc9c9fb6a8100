// Copyright 2017-2019 `multipart-upload` Crate Developers
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.
use std::error::Error as StdError;
use std::path::Path;

use futures_core::TryStream;
use futures_util::TryStreamExt;
use mime::Mime;
use tokio::io::{self, AsyncRead, AsyncWrite, AsyncWriteExt};

use super::field::field_header;
use crate::file_stream::FileChunkStream;
use crate::{Error, Result};

/// Writes a `multipart/form-data` body to any `AsyncWrite`.
pub struct MultipartWriter<W> {
    inner: W,
    boundary: String,
    quote_fields: bool,
    data_written: bool,
}

impl<W> MultipartWriter<W> {
    /// Wrap `inner`, separating fields with `boundary`.
    ///
    /// Field names and filenames are percent-encoded unless `.quote_fields(false)` is called.
    pub fn new<B: Into<String>>(inner: W, boundary: B) -> Self {
        MultipartWriter {
            inner,
            boundary: boundary.into(),
            quote_fields: true,
            data_written: false,
        }
    }

    /// Set whether field names and filenames are percent-encoded in part headers.
    pub fn quote_fields(&mut self, quote_fields: bool) -> &mut Self {
        self.quote_fields = quote_fields;
        self
    }

    pub fn boundary(&self) -> &str {
        &self.boundary
    }

    pub fn get_ref(&self) -> &W {
        &self.inner
    }

    pub fn get_mut(&mut self) -> &mut W {
        &mut self.inner
    }

    pub fn into_inner(self) -> W {
        self.inner
    }
}

impl<W: AsyncWrite + Unpin> MultipartWriter<W> {
    async fn write_field_header(
        &mut self,
        name: &str,
        filename: Option<&str>,
        content_type: Option<&Mime>,
    ) -> io::Result<()> {
        let header = field_header(&self.boundary, name, filename, content_type, self.quote_fields);
        self.inner.write_all(header.as_bytes()).await?;
        self.data_written = true;
        Ok(())
    }

    /// Write a field of any type to the output. (Method for taking `AsyncRead`).
    ///
    /// If `content_type` is not set, the server assumes `Content-Type: text/plain`
    /// ([RFC 7578 Section 4.4][7578-4.4]).
    ///
    /// If you want the server to interpret a field as a file regardless of type or filename,
    /// pass a `content_type` of `mime::APPLICATION_OCTET_STREAM`.
    ///
    /// [7578-4.4]: https://tools.ietf.org/html/rfc7578#section-4.4
    pub async fn write_field<R: AsyncRead + Unpin>(
        &mut self,
        name: &str,
        filename: Option<&str>,
        content_type: Option<&Mime>,
        mut contents: R,
    ) -> Result<&mut Self> {
        self.write_field_header(name, filename, content_type).await?;
        io::copy(&mut contents, &mut self.inner).await?;
        self.inner.write_all(b"\r\n").await?;
        Ok(self)
    }

    /// Like [`.write_field()`](#method.write_field) but takes a `Stream` of chunks, which are
    /// written in order as they arrive.
    ///
    /// Errors from the stream will be wrapped as `io::ErrorKind::Other`.
    pub async fn write_stream<S>(
        &mut self,
        name: &str,
        filename: Option<&str>,
        content_type: Option<&Mime>,
        contents: S,
    ) -> Result<&mut Self>
    where
        S: TryStream + Unpin,
        S::Ok: AsRef<[u8]>,
        S::Error: Into<Box<dyn StdError + Send + Sync>>,
    {
        self.write_field_header(name, filename, content_type).await?;

        let mut contents = contents.map_err(|e| io::Error::new(io::ErrorKind::Other, e));

        while let Some(buf) = contents.try_next().await? {
            self.inner.write_all(buf.as_ref()).await?;
        }

        self.inner.write_all(b"\r\n").await?;
        Ok(self)
    }

    /// Open a file and copy it as a field to the output in `CHUNK_SIZE` chunks, inferring the
    /// filename and content-type from the path.
    ///
    /// If no content-type is known for the path extension or there is no extension,
    /// `application/octet-stream` is assumed to ensure the server interprets this field as a file.
    pub async fn write_file<P: AsRef<Path>>(&mut self, name: &str, path: P) -> Result<&mut Self> {
        let path = path.as_ref();
        let filename = path
            .file_name()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        let content_type = mime_guess::from_path(path).first_or_octet_stream();

        self.write_file_as(name, path, &filename, &content_type).await
    }

    /// Like [`.write_file()`](#method.write_file) with an explicit filename and content type.
    ///
    /// The file is opened before anything is written, so a missing file leaves the output
    /// untouched.
    pub async fn write_file_as<P: AsRef<Path>>(
        &mut self,
        name: &str,
        path: P,
        filename: &str,
        content_type: &Mime,
    ) -> Result<&mut Self> {
        let mut file = FileChunkStream::open(path).await?;

        self.write_field_header(name, Some(filename), Some(content_type))
            .await?;

        while let Some(chunk) = file.next_chunk().await? {
            self.inner.write_all(&chunk).await?;
        }

        self.inner.write_all(b"\r\n").await?;
        Ok(self)
    }

    /// Write a plain text field to the output.
    ///
    /// The server must assume `Content-Type: text/plain` ([RFC 7578 Section 4.4][7578-4.4]).
    ///
    /// [7578-4.4]: https://tools.ietf.org/html/rfc7578#section-4.4
    pub async fn write_text(&mut self, name: &str, text: &str) -> Result<&mut Self> {
        self.write_field(name, None, None, text.as_bytes()).await
    }

    /// Complete the `multipart/form-data` request.
    ///
    /// Writes the trailing boundary and flushes the output.
    pub async fn finish(&mut self) -> Result<()> {
        if self.data_written {
            self.inner.write_all(b"--").await?;
            self.inner.write_all(self.boundary.as_bytes()).await?;
            // trailing newline isn't required by RFC 2046 but some servers expect it
            // https://github.com/actix/actix-web/issues/598
            self.inner.write_all(b"--\r\n").await?;
        }

        self.inner.flush().await.map_err(Error::Io)
    }
}
