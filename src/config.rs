// Copyright 2017-2019 `multipart-upload` Crate Developers
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.
//! Settings for sending an upload.
use std::env;
use std::time::Duration;

use http::StatusCode;

use crate::{Error, Result};

/// Where to send an upload, how long to wait, and what status counts as success.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ClientConfig {
    /// The URL the form is POSTed to.
    pub url: String,
    /// Limit on the whole exchange: connecting, sending the body and reading the response.
    ///
    /// `None` waits indefinitely.
    pub timeout: Option<Duration>,
    /// The status `validate()` expects.
    pub expected_status: StatusCode,
}

impl Default for ClientConfig {
    fn default() -> Self {
        ClientConfig {
            url: "http://localhost:8080/upload".to_string(),
            timeout: None,
            expected_status: StatusCode::CREATED,
        }
    }
}

impl ClientConfig {
    /// The defaults, overridden by `UPLOAD_URL`, `UPLOAD_TIMEOUT_SECS` and
    /// `UPLOAD_EXPECTED_STATUS` where they are set.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup<F: Fn(&str) -> Option<String>>(lookup: F) -> Result<Self> {
        let mut config = ClientConfig::default();

        if let Some(url) = lookup("UPLOAD_URL") {
            config.url = url;
        }

        if let Some(secs) = lookup("UPLOAD_TIMEOUT_SECS") {
            let secs: u64 = secs
                .parse()
                .map_err(|e| Error::Config(format!("UPLOAD_TIMEOUT_SECS `{}`: {}", secs, e)))?;
            config.timeout = Some(Duration::from_secs(secs));
        }

        if let Some(status) = lookup("UPLOAD_EXPECTED_STATUS") {
            config.expected_status = status
                .parse()
                .map_err(|e| Error::Config(format!("UPLOAD_EXPECTED_STATUS `{}`: {}", status, e)))?;
        }

        debug!("{:?}", config);

        Ok(config)
    }

    /// Replace the target URL.
    pub fn with_url<U: Into<String>>(mut self, url: U) -> Self {
        self.url = url.into();
        self
    }

    /// Set a limit on the whole exchange.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Replace the status `validate()` expects.
    pub fn with_expected_status(mut self, status: StatusCode) -> Self {
        self.expected_status = status;
        self
    }
}

#[cfg(test)]
mod test {
    use std::collections::HashMap;

    use super::*;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|&(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| vars.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = ClientConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config, ClientConfig::default());
        assert_eq!(config.url, "http://localhost:8080/upload");
        assert_eq!(config.expected_status, StatusCode::CREATED);
        assert_eq!(config.timeout, None);
    }

    #[test]
    fn test_overrides() {
        let config = ClientConfig::from_lookup(lookup(&[
            ("UPLOAD_URL", "http://127.0.0.1:9000/files"),
            ("UPLOAD_TIMEOUT_SECS", "30"),
            ("UPLOAD_EXPECTED_STATUS", "200"),
        ]))
        .unwrap();

        assert_eq!(config.url, "http://127.0.0.1:9000/files");
        assert_eq!(config.timeout, Some(Duration::from_secs(30)));
        assert_eq!(config.expected_status, StatusCode::OK);
    }

    #[test]
    fn test_malformed_values() {
        let err = ClientConfig::from_lookup(lookup(&[("UPLOAD_TIMEOUT_SECS", "soon")])).unwrap_err();
        assert!(matches!(err, Error::Config(_)));

        let err = ClientConfig::from_lookup(lookup(&[("UPLOAD_EXPECTED_STATUS", "99")])).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }
}
