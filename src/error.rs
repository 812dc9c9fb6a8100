// Copyright 2017-2019 `multipart-upload` Crate Developers
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.
//! Errors which can occur while building, sending or validating an upload.
use std::io;
use std::path::PathBuf;

use http::StatusCode;

#[cfg(feature = "hyper")]
use crate::client::hyper::RequestState;

/// A type alias for `Result<T, multipart_upload::Error>`.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// The error type of this crate.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    /// A source file was missing, unreadable, or failed mid-read.
    #[error("failed to read {}: {source}", path.display())]
    FileAccess {
        /// The path of the file being streamed.
        path: PathBuf,
        /// The underlying I/O error.
        source: io::Error,
    },

    /// The target URL could not be used for an upload.
    #[error("invalid upload URL: {0}")]
    InvalidUrl(String),

    /// The TCP connection to the server could not be established.
    #[error("failed to connect: {0}")]
    Connect(#[source] io::Error),

    /// The HTTP/1 handshake with the server failed.
    #[cfg(feature = "hyper")]
    #[error("HTTP handshake failed: {0}")]
    Handshake(#[source] hyper::Error),

    /// The request could not be sent or its response could not be received.
    #[cfg(feature = "hyper")]
    #[error("failed to send upload: {0}")]
    Send(#[source] hyper::Error),

    /// The request could not be constructed.
    #[error("failed to build request: {0}")]
    Request(#[from] http::Error),

    /// The exchange did not complete within the configured timeout.
    #[error("upload timed out")]
    Timeout,

    /// The server answered with a status other than the expected one.
    #[error("expected status {expected}, got {actual}")]
    UnexpectedStatus {
        /// The status the caller asked for.
        expected: StatusCode,
        /// The status the server returned.
        actual: StatusCode,
        /// The response body, for diagnosis.
        body: String,
    },

    /// An operation was attempted in a state which does not allow it.
    #[cfg(feature = "hyper")]
    #[error("operation not allowed in state {0:?}")]
    InvalidState(RequestState),

    /// A configuration value was malformed.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// An I/O error from the output of a `MultipartWriter`.
    #[error(transparent)]
    Io(#[from] io::Error),
}

impl Error {
    pub(crate) fn file_access(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Error::FileAccess {
            path: path.into(),
            source,
        }
    }

    /// `true` if a source file could not be opened or read.
    pub fn is_file_access(&self) -> bool {
        matches!(self, Error::FileAccess { .. })
    }

    /// `true` if the failure happened while connecting, sending or receiving.
    pub fn is_transport(&self) -> bool {
        match self {
            Error::Connect(_) | Error::Timeout | Error::InvalidUrl(_) => true,
            #[cfg(feature = "hyper")]
            Error::Handshake(_) | Error::Send(_) => true,
            _ => false,
        }
    }

    /// `true` if the server replied but not with the expected status.
    pub fn is_assertion(&self) -> bool {
        matches!(self, Error::UnexpectedStatus { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classification() {
        let err = Error::file_access("test.png", io::ErrorKind::NotFound.into());
        assert!(err.is_file_access());
        assert!(!err.is_transport());
        assert_eq!(err.to_string(), "failed to read test.png: entity not found");

        let err = Error::UnexpectedStatus {
            expected: StatusCode::CREATED,
            actual: StatusCode::BAD_REQUEST,
            body: String::new(),
        };
        assert!(err.is_assertion());
        assert_eq!(err.to_string(), "expected status 201 Created, got 400 Bad Request");

        assert!(Error::Timeout.is_transport());
        assert!(Error::Connect(io::ErrorKind::ConnectionRefused.into()).is_transport());
    }
}
