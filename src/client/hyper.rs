// Copyright 2017-2019 `multipart-upload` Crate Developers
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.
//! Client-side integration with [Hyper](https://github.com/hyperium/hyper).
//! Enabled with the `hyper` feature (on by default).
//!
//! Every `Upload` opens its own HTTP/1 connection, streams the multipart body over it and
//! closes it once the response has been read.
use std::error::Error as StdError;
use std::io;
use std::time::Duration;

use bytes::Bytes;
use futures_util::stream::MapOk;
use futures_util::TryStreamExt;
use http::header::{CONTENT_TYPE, HOST};
use http::{HeaderMap, Method, Request, StatusCode, Uri};
use http_body_util::{BodyExt, StreamBody};
use hyper::body::Frame;
use hyper::client::conn::http1;
use hyper_util::rt::TokioIo;
use tokio::net::TcpStream;
use tokio::task::JoinHandle;

use super::{Form, MultipartBody};
use crate::{ClientConfig, Error, Result};

type UploadBody = StreamBody<MapOk<MultipartBody, fn(Bytes) -> Frame<Bytes>>>;

/// The progress of an `Upload`.
///
/// `Idle -> Connecting -> Sending -> AwaitingResponse -> Validating -> Done`, or one of the
/// `*Failed` states. `Done` and the failure states are terminal.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RequestState {
    /// Not sent yet.
    Idle,
    /// Opening the TCP connection and performing the HTTP handshake.
    Connecting,
    /// Streaming the request body, until the response head arrives.
    Sending,
    /// The response head has arrived; its body is read in full before `send()` returns.
    AwaitingResponse,
    /// Checking the response status.
    Validating,
    /// The server returned the expected status.
    Done,
    /// The connection or handshake failed, or timed out.
    ConnectFailed,
    /// Sending the request or receiving the response failed, or timed out.
    SendFailed,
    /// The server returned an unexpected status.
    ValidationFailed,
}

impl RequestState {
    /// `true` for `Done` and the failure states.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            RequestState::Done
                | RequestState::ConnectFailed
                | RequestState::SendFailed
                | RequestState::ValidationFailed
        )
    }
}

/// The response to an upload, with its body read in full.
#[derive(Clone, Debug)]
pub struct UploadResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    /// The response body, decoded as UTF-8 with invalid sequences replaced.
    pub body: String,
}

impl UploadResponse {
    /// Fail with `Error::UnexpectedStatus` unless the status is `expected`.
    pub fn validate(&self, expected: StatusCode) -> Result<()> {
        if self.status == expected {
            Ok(())
        } else {
            Err(Error::UnexpectedStatus {
                expected,
                actual: self.status,
                body: self.body.clone(),
            })
        }
    }
}

/// A single `multipart/form-data` POST request.
#[derive(Debug)]
pub struct Upload {
    uri: Uri,
    form: Option<Form>,
    timeout: Option<Duration>,
    expected_status: StatusCode,
    state: RequestState,
}

impl Upload {
    /// Prepare to send `form` to `config.url`.
    ///
    /// Only `http` URLs are supported.
    pub fn new(config: &ClientConfig, form: Form) -> Result<Self> {
        let uri: Uri = config
            .url
            .parse()
            .map_err(|e| Error::InvalidUrl(format!("{}: {}", config.url, e)))?;

        match uri.scheme_str() {
            Some("http") => (),
            Some(other) => {
                return Err(Error::InvalidUrl(format!(
                    "{}: unsupported scheme `{}`",
                    config.url, other
                )))
            }
            None => return Err(Error::InvalidUrl(format!("{}: missing scheme", config.url))),
        }

        if uri.host().is_none() {
            return Err(Error::InvalidUrl(format!("{}: missing host", config.url)));
        }

        Ok(Upload {
            uri,
            form: Some(form),
            timeout: config.timeout,
            expected_status: config.expected_status,
            state: RequestState::Idle,
        })
    }

    /// The parsed target URL.
    pub fn uri(&self) -> &Uri {
        &self.uri
    }

    /// Where the upload is in its lifecycle.
    pub fn state(&self) -> RequestState {
        self.state
    }

    /// Connect, stream the form and read the whole response.
    ///
    /// The response is returned whatever its status; pass it to
    /// [`.validate()`](#method.validate) to check it.
    ///
    /// Can be called once. A failure leaves the upload in `ConnectFailed` or `SendFailed`,
    /// with every file handle and the connection released.
    pub async fn send(&mut self) -> Result<UploadResponse> {
        let form = match self.form.take() {
            Some(form) if self.state == RequestState::Idle => form,
            _ => return Err(Error::InvalidState(self.state)),
        };

        let sending = exchange(&self.uri, form, &mut self.state);

        let result = match self.timeout {
            Some(timeout) => match tokio::time::timeout(timeout, sending).await {
                Ok(result) => result,
                Err(_) => {
                    debug!("upload to {} timed out after {:?}", self.uri, timeout);
                    Err(Error::Timeout)
                }
            },
            None => sending.await,
        };

        if result.is_err() {
            let failed = match self.state {
                RequestState::Connecting => RequestState::ConnectFailed,
                _ => RequestState::SendFailed,
            };
            transition(&mut self.state, failed);
        }

        result
    }

    /// Check `response` against the expected status from the `ClientConfig`.
    ///
    /// Moves the upload to `Done` or `ValidationFailed`.
    pub fn validate(&mut self, response: &UploadResponse) -> Result<()> {
        if self.state != RequestState::AwaitingResponse {
            return Err(Error::InvalidState(self.state));
        }

        transition(&mut self.state, RequestState::Validating);

        let result = response.validate(self.expected_status);

        let next = if result.is_ok() {
            RequestState::Done
        } else {
            RequestState::ValidationFailed
        };
        transition(&mut self.state, next);

        result
    }
}

/// Send `form` to `url` with the default configuration and return the response.
pub async fn post<U: Into<String>>(url: U, form: Form) -> Result<UploadResponse> {
    let config = ClientConfig::default().with_url(url);
    Upload::new(&config, form)?.send().await
}

fn transition(state: &mut RequestState, next: RequestState) {
    debug!("upload state: {:?} -> {:?}", state, next);
    *state = next;
}

async fn exchange(uri: &Uri, form: Form, state: &mut RequestState) -> Result<UploadResponse> {
    let request = build_request(uri, form)?;

    transition(state, RequestState::Connecting);

    let host = uri
        .host()
        .ok_or_else(|| Error::InvalidUrl(uri.to_string()))?
        .trim_start_matches('[')
        .trim_end_matches(']');
    let port = uri.port_u16().unwrap_or(80);

    let stream = TcpStream::connect((host, port))
        .await
        .map_err(Error::Connect)?;

    let (mut sender, conn) = http1::handshake::<_, UploadBody>(TokioIo::new(stream))
        .await
        .map_err(Error::Handshake)?;

    let _conn = AbortOnDrop(tokio::spawn(async move {
        if let Err(e) = conn.await {
            debug!("upload connection closed with error: {}", e);
        }
    }));

    sender.ready().await.map_err(Error::Handshake)?;

    transition(state, RequestState::Sending);

    let response = sender.send_request(request).await.map_err(send_error)?;

    transition(state, RequestState::AwaitingResponse);

    let (parts, body) = response.into_parts();
    let body = body.collect().await.map_err(Error::Send)?.to_bytes();

    debug!(
        "upload to {}: {} with {} byte body",
        uri,
        parts.status,
        body.len()
    );

    Ok(UploadResponse {
        status: parts.status,
        headers: parts.headers,
        body: String::from_utf8_lossy(&body).into_owned(),
    })
}

fn build_request(uri: &Uri, form: Form) -> Result<Request<UploadBody>> {
    let body = form.into_body();
    let content_type = body.content_type();
    let frames = body.map_ok(Frame::data as fn(Bytes) -> Frame<Bytes>);

    let path = uri.path_and_query().map_or("/", |p| p.as_str());
    let authority = uri.authority().map_or("", |a| a.as_str());

    let request = Request::builder()
        .method(Method::POST)
        .uri(path)
        .header(HOST, authority)
        .header(CONTENT_TYPE, content_type)
        .body(StreamBody::new(frames))?;

    Ok(request)
}

/// A failure of the body stream (e.g. a file which could not be read) is reported as itself
/// rather than as a generic send error.
fn send_error(err: hyper::Error) -> Error {
    let from_body = StdError::source(&err).and_then(|cause| cause.downcast_ref::<Error>());

    match from_body {
        Some(Error::FileAccess { path, source }) => Error::FileAccess {
            path: path.clone(),
            source: io::Error::new(source.kind(), source.to_string()),
        },
        Some(Error::Io(source)) => Error::Io(io::Error::new(source.kind(), source.to_string())),
        _ => Error::Send(err),
    }
}

/// Stops the connection task, closing the socket and dropping whatever is left of the body.
struct AbortOnDrop(JoinHandle<()>);

impl Drop for AbortOnDrop {
    fn drop(&mut self) {
        self.0.abort();
    }
}
