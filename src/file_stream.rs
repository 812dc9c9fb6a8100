// Copyright 2017-2019 `multipart-upload` Crate Developers
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.
//! Reading a file as a lazy sequence of fixed-size chunks.
use std::fmt;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::task::{Context, Poll};

use bytes::Bytes;
use futures_core::Stream;
use futures_util::future::poll_fn;
use tokio::fs::File;
use tokio::io::{AsyncRead, ReadBuf};

use crate::{Error, Result};

/// The size of every chunk but the last one: 64 KiB.
pub const CHUNK_SIZE: usize = 64 * 1024;

/// A forward-only stream of the contents of a file, `CHUNK_SIZE` bytes at a time.
///
/// Every chunk is exactly `CHUNK_SIZE` bytes long except possibly the last, which is shorter
/// but never empty. At most one chunk is held in memory.
///
/// The file handle is closed as soon as the end of the file is reached, when a read fails,
/// or when the stream is dropped, whichever comes first.
pub struct FileChunkStream {
    path: PathBuf,
    file: Option<File>,
    buf: Box<[u8]>,
    filled: usize,
    bytes_read: u64,
}

impl FileChunkStream {
    /// Open the file at `path` for chunked reading.
    ///
    /// Fails with `Error::FileAccess` if the file does not exist or cannot be opened.
    pub async fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = File::open(&path)
            .await
            .map_err(|e| Error::file_access(&path, e))?;

        debug!("opened {} for chunked reading", path.display());

        Ok(FileChunkStream {
            path,
            file: Some(file),
            buf: vec![0; CHUNK_SIZE].into_boxed_slice(),
            filled: 0,
            bytes_read: 0,
        })
    }

    /// The path this stream reads from.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The number of bytes handed out so far.
    pub fn bytes_read(&self) -> u64 {
        self.bytes_read
    }

    /// `true` once the file handle has been released.
    pub fn is_finished(&self) -> bool {
        self.file.is_none()
    }

    /// Read the next chunk, or `None` at the end of the file.
    pub async fn next_chunk(&mut self) -> Result<Option<Bytes>> {
        poll_fn(|cx| self.poll_chunk(cx)).await
    }

    /// Poll for the next chunk. Partial reads are kept across `Pending`.
    pub fn poll_chunk(&mut self, cx: &mut Context) -> Poll<Result<Option<Bytes>>> {
        let file = match self.file.as_mut() {
            Some(file) => file,
            None => return Poll::Ready(Ok(None)),
        };

        let mut eof = false;

        while self.filled < self.buf.len() {
            let mut read_buf = ReadBuf::new(&mut self.buf[self.filled..]);

            match Pin::new(&mut *file).poll_read(cx, &mut read_buf) {
                Poll::Pending => return Poll::Pending,
                Poll::Ready(Ok(())) => {
                    let read = read_buf.filled().len();
                    if read == 0 {
                        eof = true;
                        break;
                    }
                    self.filled += read;
                }
                Poll::Ready(Err(e)) => {
                    self.file = None;
                    self.filled = 0;
                    return Poll::Ready(Err(Error::file_access(&self.path, e)));
                }
            }
        }

        if eof {
            self.close();
        }

        if self.filled == 0 {
            return Poll::Ready(Ok(None));
        }

        let chunk = Bytes::copy_from_slice(&self.buf[..self.filled]);
        self.filled = 0;

        trace!(
            "{}: chunk of {} bytes at offset {}",
            self.path.display(),
            chunk.len(),
            self.bytes_read
        );
        self.bytes_read += chunk.len() as u64;

        Poll::Ready(Ok(Some(chunk)))
    }

    fn close(&mut self) {
        if self.file.take().is_some() {
            debug!(
                "closed {} after {} bytes",
                self.path.display(),
                self.bytes_read + self.filled as u64
            );
        }
    }
}

impl Stream for FileChunkStream {
    type Item = Result<Bytes>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context) -> Poll<Option<Self::Item>> {
        self.get_mut().poll_chunk(cx).map(Result::transpose)
    }
}

impl fmt::Debug for FileChunkStream {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("FileChunkStream")
            .field("path", &self.path)
            .field("bytes_read", &self.bytes_read)
            .field("finished", &self.is_finished())
            .finish()
    }
}

#[cfg(test)]
mod test {
    use std::io;

    use super::*;

    use futures_util::TryStreamExt;

    use crate::test_util::temp_file;

    #[tokio::test]
    async fn test_chunks_cover_file() -> Result<()> {
        let (file, contents) = temp_file(200_000);
        let mut stream = FileChunkStream::open(file.path()).await?;

        let mut lens = Vec::new();
        let mut read = Vec::new();

        while let Some(chunk) = stream.next_chunk().await? {
            lens.push(chunk.len());
            read.extend_from_slice(&chunk);
        }

        assert_eq!(lens, [CHUNK_SIZE, CHUNK_SIZE, CHUNK_SIZE, 200_000 - 3 * CHUNK_SIZE]);
        assert_eq!(read, contents);
        assert_eq!(stream.bytes_read(), 200_000);
        assert!(stream.is_finished());

        // stays finished
        assert!(stream.next_chunk().await?.is_none());
        Ok(())
    }

    #[tokio::test]
    async fn test_exact_multiple_has_no_short_chunk() -> Result<()> {
        let (file, contents) = temp_file(2 * CHUNK_SIZE);
        let chunks: Vec<Bytes> = FileChunkStream::open(file.path()).await?.try_collect().await?;

        assert_eq!(chunks.len(), 2);
        assert!(chunks.iter().all(|c| c.len() == CHUNK_SIZE));
        assert_eq!(chunks.concat(), contents);
        Ok(())
    }

    #[tokio::test]
    async fn test_empty_file() -> Result<()> {
        let (file, _) = temp_file(0);
        let mut stream = FileChunkStream::open(file.path()).await?;

        assert!(stream.next_chunk().await?.is_none());
        assert!(stream.is_finished());
        assert_eq!(stream.bytes_read(), 0);
        Ok(())
    }

    #[tokio::test]
    async fn test_small_file_is_one_chunk() -> Result<()> {
        let (file, contents) = temp_file(10);
        let chunks: Vec<Bytes> = FileChunkStream::open(file.path()).await?.try_collect().await?;
        assert_eq!(chunks, [Bytes::from(contents)]);
        Ok(())
    }

    #[tokio::test]
    async fn test_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing.png");

        let err = FileChunkStream::open(&path).await.unwrap_err();

        match err {
            Error::FileAccess { path: err_path, source } => {
                assert_eq!(err_path, path);
                assert_eq!(source.kind(), io::ErrorKind::NotFound);
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_read_error_releases_handle() {
        // a directory opens fine on Linux but fails on the first read
        let dir = tempfile::tempdir().unwrap();
        let mut stream = FileChunkStream::open(dir.path()).await.unwrap();
        assert!(!stream.is_finished());

        let err = stream.next_chunk().await.unwrap_err();

        assert!(err.is_file_access(), "{:?}", err);
        assert!(stream.is_finished());
        assert!(stream.next_chunk().await.unwrap().is_none());
    }
}
