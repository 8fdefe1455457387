//! HTTP client utilities shared by the buffered and streaming paths.
//!
//! This module provides reqwest client construction and the header set
//! every request carries.

use reqwest::header::{HeaderMap, HeaderName, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use reqwest::Client;
use std::time::Duration;

use crate::client::ClientError;
use crate::options::ClientConfig;

/// Connect timeout used by the streaming client, which has no total timeout.
pub const STREAM_CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

/// Build the client used for buffered requests.
///
/// The configured timeout bounds each attempt separately.
pub fn build_http_client(config: &ClientConfig) -> Result<Client, ClientError> {
    Client::builder()
        .timeout(config.timeout)
        .default_headers(default_headers(config)?)
        .build()
        .map_err(ClientError::from)
}

/// Build the client used for streaming requests.
///
/// A stalled stream is bounded only by the caller's cancellation token.
pub fn build_stream_client(config: &ClientConfig) -> Result<Client, ClientError> {
    Client::builder()
        .connect_timeout(STREAM_CONNECT_TIMEOUT)
        .default_headers(default_headers(config)?)
        .build()
        .map_err(ClientError::from)
}

/// Headers sent on every request: bearer auth and JSON content type.
///
/// Without an API key no `Authorization` header is sent and the server
/// decides.
pub fn default_headers(config: &ClientConfig) -> Result<HeaderMap, ClientError> {
    let mut headers = HeaderMap::new();
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

    if let Some(api_key) = &config.api_key {
        let mut value = HeaderValue::from_str(&format!("Bearer {}", api_key.expose_secret()))
            .map_err(|_| ClientError::Config("Invalid API key".to_string()))?;
        value.set_sensitive(true);
        headers.insert(AUTHORIZATION, value);
    }

    for (key, value) in &config.extra_headers {
        let name = HeaderName::from_bytes(key.as_bytes())
            .map_err(|_| ClientError::Config(format!("Invalid header name: {key}")))?;
        let value = HeaderValue::from_str(value)
            .map_err(|_| ClientError::Config(format!("Invalid value for header {key}")))?;
        headers.insert(name, value);
    }

    Ok(headers)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::options::{ClientConfig, ClientOptions};

    #[test]
    fn test_build_http_client() {
        let config = ClientConfig::resolve(ClientOptions::new("test"));
        assert!(build_http_client(&config).is_ok());
        assert!(build_stream_client(&config).is_ok());
    }

    #[test]
    fn test_default_headers_with_key() {
        let config = ClientConfig::resolve(ClientOptions::new("sk-test").with_header("x-org", "acme"));
        let headers = default_headers(&config).unwrap();
        assert_eq!(headers[AUTHORIZATION], "Bearer sk-test");
        assert_eq!(headers[CONTENT_TYPE], "application/json");
        assert_eq!(headers["x-org"], "acme");
    }

    #[test]
    fn test_default_headers_without_key() {
        let headers = default_headers(&ClientConfig::default()).unwrap();
        assert!(headers.get(AUTHORIZATION).is_none());
    }

    #[test]
    fn test_invalid_header_name_rejected() {
        let config = ClientConfig::resolve(ClientOptions::default().with_header("bad header", "x"));
        assert!(matches!(default_headers(&config), Err(ClientError::Config(_))));
    }
}
