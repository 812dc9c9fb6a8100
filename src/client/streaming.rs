// Copyright 2017-2019 `multipart-upload` Crate Developers
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.
use std::collections::VecDeque;
use std::fmt;
use std::path::PathBuf;
use std::pin::Pin;
use std::task::{Context, Poll};

use bytes::{Bytes, BytesMut};
use futures_core::Stream;
use futures_util::future::{BoxFuture, FutureExt};
use futures_util::ready;
use http::HeaderValue;

use super::field::MultipartField;
use crate::file_stream::FileChunkStream;
use crate::Result;

/// A `multipart/form-data` body produced on demand.
///
/// Fields are drained in the order they were added. File fields are opened when the body
/// reaches them and each chunk read from the file is yielded as-is, so no more than one chunk
/// of a file is in memory at any time.
pub struct MultipartBody {
    boundary: String,
    quote_fields: bool,
    fields: VecDeque<MultipartField>,
    state: BodyState,
    data_written: bool,
}

enum BodyState {
    NextField,
    Opening {
        header: Bytes,
        open: BoxFuture<'static, Result<FileChunkStream>>,
    },
    Streaming(FileChunkStream),
    Done,
}

impl MultipartBody {
    pub(crate) fn new(boundary: String, fields: Vec<MultipartField>, quote_fields: bool) -> Self {
        MultipartBody {
            boundary,
            quote_fields,
            fields: fields.into(),
            state: BodyState::NextField,
            data_written: false,
        }
    }

    /// The boundary separating the parts of this body.
    pub fn boundary(&self) -> &str {
        &self.boundary
    }

    /// The value for the `Content-Type` header of the request carrying this body.
    pub fn content_type(&self) -> HeaderValue {
        super::content_type(&self.boundary)
    }

    /// The number of fields which have not been started yet.
    pub fn remaining_fields(&self) -> usize {
        self.fields.len()
    }

    fn next_field(&mut self) -> Option<Bytes> {
        let field = match self.fields.pop_front() {
            Some(field) => field,
            None => {
                self.state = BodyState::Done;

                return if self.data_written {
                    // trailing newline isn't required by RFC 2046 but some servers expect it
                    Some(format!("--{}--\r\n", self.boundary).into())
                } else {
                    None
                };
            }
        };

        let header = field.header(&self.boundary, self.quote_fields);

        match field {
            MultipartField::Text { value, .. } => {
                let mut part = BytesMut::with_capacity(header.len() + value.len() + 2);
                part.extend_from_slice(header.as_bytes());
                part.extend_from_slice(value.as_bytes());
                part.extend_from_slice(b"\r\n");

                self.data_written = true;
                Some(part.freeze())
            }
            MultipartField::File { path, .. } => {
                self.state = BodyState::Opening {
                    header: header.into(),
                    open: open_file(path),
                };
                None
            }
        }
    }
}

fn open_file(path: PathBuf) -> BoxFuture<'static, Result<FileChunkStream>> {
    async move { FileChunkStream::open(path).await }.boxed()
}

impl Stream for MultipartBody {
    type Item = Result<Bytes>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();

        loop {
            match &mut this.state {
                BodyState::NextField => {
                    if let Some(part) = this.next_field() {
                        return Poll::Ready(Some(Ok(part)));
                    }
                }
                BodyState::Opening { header, open } => {
                    let file = match ready!(open.poll_unpin(cx)) {
                        Ok(file) => file,
                        Err(e) => {
                            this.state = BodyState::Done;
                            return Poll::Ready(Some(Err(e)));
                        }
                    };

                    let header = std::mem::take(header);
                    this.state = BodyState::Streaming(file);
                    this.data_written = true;
                    return Poll::Ready(Some(Ok(header)));
                }
                BodyState::Streaming(file) => match ready!(file.poll_chunk(cx)) {
                    Ok(Some(chunk)) => return Poll::Ready(Some(Ok(chunk))),
                    Ok(None) => {
                        this.state = BodyState::NextField;
                        return Poll::Ready(Some(Ok(Bytes::from_static(b"\r\n"))));
                    }
                    Err(e) => {
                        this.state = BodyState::Done;
                        return Poll::Ready(Some(Err(e)));
                    }
                },
                BodyState::Done => return Poll::Ready(None),
            }
        }
    }
}

impl fmt::Debug for MultipartBody {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let state = match &self.state {
            BodyState::NextField => "NextField",
            BodyState::Opening { .. } => "Opening",
            BodyState::Streaming(_) => "Streaming",
            BodyState::Done => "Done",
        };

        f.debug_struct("MultipartBody")
            .field("boundary", &self.boundary)
            .field("quote_fields", &self.quote_fields)
            .field("remaining_fields", &self.fields.len())
            .field("state", &state)
            .finish()
    }
}

#[cfg(test)]
mod test {
    use futures_util::{StreamExt, TryStreamExt};

    use super::*;
    use crate::client::Form;
    use crate::file_stream::CHUNK_SIZE;
    use crate::test_util::{temp_file, BOUNDARY};

    fn scenario_form(source: &std::path::Path) -> Form {
        let mut form = Form::with_boundary(BOUNDARY);
        form.quote_fields(false)
            .add_file_as("files[]", source, "image1.png")
            .add_file_as("files[]", source, "image2.png")
            .add_file_as("files[]", source, "image3.png")
            .add_text("Hey", "hi")
            .add_text("Hi[One]", "1")
            .add_text("Hi[Two]", "2.0");
        form
    }

    fn find_all(haystack: &[u8], needle: &[u8]) -> Vec<usize> {
        haystack
            .windows(needle.len())
            .enumerate()
            .filter(|(_, w)| *w == needle)
            .map(|(i, _)| i)
            .collect()
    }

    #[tokio::test]
    async fn test_chunks_are_not_rebuffered() -> Result<()> {
        let (file, _) = temp_file(200_000);

        let mut form = Form::with_boundary(BOUNDARY);
        form.add_file_as("file", file.path(), "data.bin");

        let items: Vec<Bytes> = form.into_body().try_collect().await?;
        let lens: Vec<usize> = items.iter().map(Bytes::len).collect();

        // header, four chunks, CRLF, closing delimiter
        assert_eq!(lens.len(), 7);
        assert_eq!(&lens[1..5], [CHUNK_SIZE, CHUNK_SIZE, CHUNK_SIZE, 200_000 - 3 * CHUNK_SIZE]);
        assert_eq!(items[5], "\r\n");
        assert_eq!(items[6], format!("--{}--\r\n", BOUNDARY));
        Ok(())
    }

    #[tokio::test]
    async fn test_matches_writer_output() -> Result<()> {
        let (file, _) = temp_file(70_000);

        let streamed: Vec<Bytes> = scenario_form(file.path()).into_body().try_collect().await?;
        let written = scenario_form(file.path()).write_to(Vec::new()).await?;

        assert_eq!(streamed.concat(), written);
        Ok(())
    }

    #[tokio::test]
    async fn test_field_order_and_repeated_names() -> Result<()> {
        let (file, contents) = temp_file(1000);

        let body: Vec<Bytes> = scenario_form(file.path()).into_body().try_collect().await?;
        let body = body.concat();

        let dispositions: [&[u8]; 6] = [
            b"name=\"files[]\"; filename=\"image1.png\"",
            b"name=\"files[]\"; filename=\"image2.png\"",
            b"name=\"files[]\"; filename=\"image3.png\"",
            b"name=\"Hey\"\r\n",
            b"name=\"Hi[One]\"\r\n",
            b"name=\"Hi[Two]\"\r\n",
        ];

        let positions: Vec<usize> = dispositions
            .iter()
            .map(|d| {
                let found = find_all(&body, d);
                assert_eq!(found.len(), 1, "{:?}", String::from_utf8_lossy(d));
                found[0]
            })
            .collect();

        assert!(positions.windows(2).all(|w| w[0] < w[1]));
        assert_eq!(find_all(&body, &contents).len(), 3);
        assert_eq!(find_all(&body, format!("--{}\r\n", BOUNDARY).as_bytes()).len(), 6);
        assert!(body.ends_with(format!("\r\n--{}--\r\n", BOUNDARY).as_bytes()));
        Ok(())
    }

    #[tokio::test]
    async fn test_quoting_enabled() -> Result<()> {
        let mut form = Form::with_boundary(BOUNDARY);
        form.add_text("Hi[One]", "1");

        let body: Vec<Bytes> = form.into_body().try_collect().await?;
        let body = body.concat();

        assert_eq!(find_all(&body, b"name=\"Hi%5BOne%5D\"").len(), 1);
        assert!(find_all(&body, b"Hi[One]").is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn test_empty_form() {
        let mut body = Form::with_boundary(BOUNDARY).into_body();
        assert!(body.next().await.is_none());
        assert!(body.next().await.is_none());
    }

    #[tokio::test]
    async fn test_empty_file_field() -> Result<()> {
        let (file, _) = temp_file(0);

        let mut form = Form::with_boundary(BOUNDARY);
        form.quote_fields(false).add_file_as("f", file.path(), "empty.txt");

        let body: Vec<Bytes> = form.into_body().try_collect().await?;

        assert_eq!(
            body.concat(),
            format!(
                "--{0}\r\n\
                 Content-Disposition: form-data; name=\"f\"; filename=\"empty.txt\"\r\n\
                 Content-Type: text/plain\r\n\r\n\
                 \r\n\
                 --{0}--\r\n",
                BOUNDARY
            )
            .into_bytes()
        );
        Ok(())
    }

    #[tokio::test]
    async fn test_missing_file_ends_body() {
        let dir = tempfile::tempdir().unwrap();

        let mut form = Form::with_boundary(BOUNDARY);
        form.add_text("before", "1")
            .add_file("file", dir.path().join("missing.png"))
            .add_text("after", "2");

        let mut body = form.into_body();

        assert!(body.next().await.unwrap().is_ok());
        assert!(body.next().await.unwrap().unwrap_err().is_file_access());
        assert!(body.next().await.is_none());
        assert_eq!(body.remaining_fields(), 1);
    }
}
