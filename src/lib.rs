// Copyright 2017-2019 `multipart-upload` Crate Developers
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.
//! Streaming `multipart/form-data` uploads over asynchronous I/O.
//!
//! Files are read in fixed 64 KiB chunks and sent as they are read, so uploading a large file
//! never holds more than one chunk of it in memory.
//!
//! Features:
//!
//! * `hyper` (default): Send uploads with the [Hyper](https://github.com/hyperium/hyper)
//! HTTP/1 client and validate the response status.
//!
//! * `bin` (default): Build the `upload-client` binary.
//!
//! ```no_run
//! # async fn upload() -> multipart_upload::Result<()> {
//! use multipart_upload::client::Form;
//! use multipart_upload::client::hyper::Upload;
//! use multipart_upload::ClientConfig;
//!
//! let mut form = Form::new();
//! form.quote_fields(false)
//!     .add_file_as("files[]", "test.png", "image1.png")
//!     .add_text("Hey", "hi");
//!
//! let mut upload = Upload::new(&ClientConfig::default(), form)?;
//! let response = upload.send().await?;
//! println!("{}", response.body);
//! upload.validate(&response)?;
//! # Ok(())
//! # }
//! ```
#[macro_use]
extern crate log;

pub extern crate mime;

use rand::distributions::{Alphanumeric, DistString};

pub mod client;
pub mod config;
pub mod file_stream;

mod error;
mod helpers;

#[cfg(test)]
mod test_util;

pub use crate::config::ClientConfig;
pub use crate::error::{Error, Result};
pub use crate::file_stream::{FileChunkStream, CHUNK_SIZE};

fn random_alphanumeric(len: usize) -> String {
    Alphanumeric.sample_string(&mut rand::thread_rng(), len)
}
