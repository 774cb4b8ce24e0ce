//! HTTP relay transport.
//!
//! Devices are reachable through a routing relay: each request is POSTed to
//! `{baseUrl}/{deviceId}` as `{"data": "<hex envelope>"}` and the relay
//! answers `{"status": 200, "message": "<hex envelope>"}`.
//!
//! # Note
//!
//! This module requires the `relay` feature to be enabled.

use core::fmt;
use std::time::Duration;

use reqwest::blocking::Client as HttpClient;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::ClientConfig;
use crate::error::{Error, Result};

use super::Transport;

/// Request body sent to the relay.
#[derive(Debug, Serialize)]
struct RelayRequest {
    data: String,
}

/// Reply returned by the relay.
#[derive(Debug, Deserialize)]
struct RelayReply {
    status: u16,
    #[serde(default)]
    message: String,
}

/// A blocking HTTP relay transport.
pub struct RelayTransport {
    /// HTTP client with the per-call timeout applied.
    http: HttpClient,

    /// Relay base URL without a trailing slash.
    base_url: String,
}

impl fmt::Debug for RelayTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RelayTransport")
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

impl RelayTransport {
    /// Creates a relay transport.
    ///
    /// # Arguments
    ///
    /// * `base_url` - The relay base URL
    /// * `timeout` - Per-call timeout; cancels the HTTP call only
    ///
    /// # Errors
    ///
    /// Returns [`Error::Transport`] if the HTTP client cannot be built.
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let http = HttpClient::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::Transport(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    /// Creates a relay transport from a client configuration.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Transport`] if the HTTP client cannot be built.
    pub fn from_config(config: &ClientConfig) -> Result<Self> {
        Self::new(&config.base_url, config.timeout())
    }

    /// Returns the relay base URL.
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

impl Transport for RelayTransport {
    fn transmit(&mut self, device_id: &str, request: &[u8]) -> Result<Vec<u8>> {
        let url = format!("{}/{device_id}", self.base_url);
        debug!(%url, request_len = request.len(), "posting envelope to relay");

        let body = RelayRequest {
            data: hex::encode(request),
        };
        let reply = self
            .http
            .post(&url)
            .json(&body)
            .send()
            .and_then(|resp| resp.text())
            .map_err(map_http_error)?;

        decode_reply(&reply)
    }

    /// Always `true`: every request is an independent HTTP call.
    fn is_connected(&self) -> bool {
        true
    }
}

fn map_http_error(err: reqwest::Error) -> Error {
    if err.is_timeout() {
        Error::Timeout
    } else {
        Error::Transport(err.to_string())
    }
}

/// Decodes a relay reply body into the response envelope bytes.
fn decode_reply(body: &str) -> Result<Vec<u8>> {
    let reply: RelayReply = serde_json::from_str(body)?;
    if reply.status != 200 {
        return Err(Error::Transport(format!(
            "relay returned status {}: {}",
            reply.status, reply.message
        )));
    }
    Ok(hex::decode(reply.message.trim_start_matches("0x"))?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decode_reply_success() {
        let bytes = decode_reply(r#"{"status":200,"message":"0102ff"}"#).unwrap();
        assert_eq!(bytes, vec![0x01, 0x02, 0xff]);
    }

    #[test]
    fn decode_reply_error_status() {
        let err = decode_reply(r#"{"status":500,"message":"device offline"}"#).unwrap_err();
        assert!(matches!(err, Error::Transport(msg) if msg.contains("device offline")));
    }

    #[test]
    fn decode_reply_bad_body() {
        assert!(matches!(decode_reply("nope"), Err(Error::JsonError(_))));
        assert!(matches!(
            decode_reply(r#"{"status":200,"message":"zz"}"#),
            Err(Error::HexDecodeFailed(_))
        ));
    }

    #[test]
    fn request_body_shape() {
        let body = serde_json::to_string(&RelayRequest {
            data: hex::encode([0xab, 0xcd]),
        })
        .unwrap();
        assert_eq!(body, r#"{"data":"abcd"}"#);
    }

    #[test]
    fn base_url_trimmed() {
        let t = RelayTransport::new("https://relay.example/", Duration::from_secs(1)).unwrap();
        assert_eq!(t.base_url(), "https://relay.example");
    }

    #[test]
    fn relay_is_always_usable() {
        let t = RelayTransport::new("http://127.0.0.1:9", Duration::from_millis(1)).unwrap();
        assert!(t.is_connected());
    }
}
