//! Client configuration: caller-supplied options and their resolved form.

use std::collections::HashMap;
use std::env;
use std::time::Duration;

use crate::client::ClientError;
use crate::providers::Provider;

/// Default per-attempt timeout for buffered requests.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Default number of retries after the first attempt.
pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// Default delay before the first retry. Later retries double it.
pub const DEFAULT_RETRY_BASE_DELAY: Duration = Duration::from_secs(1);

/// Environment variable holding the API key.
pub const API_KEY_ENV: &str = "OAI_COMPAT_API_KEY";

/// Fallback environment variable holding the API key.
pub const OPENAI_API_KEY_ENV: &str = "OPENAI_API_KEY";

/// Environment variable overriding the base URL.
pub const BASE_URL_ENV: &str = "OAI_COMPAT_BASE_URL";

/// Environment variable selecting the provider.
pub const PROVIDER_ENV: &str = "OAI_COMPAT_PROVIDER";

/// A secret string type for sensitive data like API keys.
/// Prevents accidental logging or display of secrets.
#[derive(Clone)]
pub struct SecretString(String);

impl SecretString {
    /// Create a new secret string.
    pub fn new(s: String) -> Self {
        Self(s)
    }

    /// Get the underlying secret value.
    pub fn expose_secret(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Debug for SecretString {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("SecretString([REDACTED])")
    }
}

impl From<String> for SecretString {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}

impl From<&str> for SecretString {
    fn from(s: &str) -> Self {
        Self::new(s.to_string())
    }
}

/// Web search defaults applied by the client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WebSearchOptions {
    /// Whether requests without an explicit `web_search` flag get one.
    pub enabled: bool,
    /// Maximum number of search results the server should use.
    pub max_results: u32,
    /// Whether page content should be included alongside results.
    pub include_content: bool,
}

impl Default for WebSearchOptions {
    fn default() -> Self {
        Self {
            enabled: false,
            max_results: 5,
            include_content: true,
        }
    }
}

impl WebSearchOptions {
    /// Web search switched on with default limits.
    pub fn enabled() -> Self {
        Self {
            enabled: true,
            ..Self::default()
        }
    }

    /// Set the maximum number of results.
    pub fn with_max_results(mut self, max_results: u32) -> Self {
        self.max_results = max_results;
        self
    }

    /// Set whether page content is included.
    pub fn with_include_content(mut self, include_content: bool) -> Self {
        self.include_content = include_content;
        self
    }
}

/// Caller-supplied, partial client options.
///
/// Every field is optional; [`ClientConfig::resolve`] fills the gaps.
///
/// # Example
/// ```rust
/// use oai_compat::options::{ClientConfig, ClientOptions};
/// use oai_compat::providers::Provider;
/// use std::time::Duration;
///
/// let config = ClientConfig::resolve(
///     ClientOptions::new("sk-...")
///         .with_provider(Provider::Custom)
///         .with_base_url("https://llm.internal/v1")
///         .with_timeout(Duration::from_secs(10)),
/// );
/// assert_eq!(config.base_url, "https://llm.internal/v1");
/// assert_eq!(config.max_retries, 3);
/// ```
#[derive(Debug, Clone, Default)]
pub struct ClientOptions {
    /// API key sent as a bearer token
    pub api_key: Option<SecretString>,

    /// Base URL for API endpoints
    pub base_url: Option<String>,

    /// Remote service identity
    pub provider: Option<Provider>,

    /// Per-attempt timeout for buffered requests
    pub timeout: Option<Duration>,

    /// Retries after the first failed attempt
    pub max_retries: Option<u32>,

    /// Delay before the first retry
    pub retry_base_delay: Option<Duration>,

    /// Web search defaults
    pub web_search: Option<WebSearchOptions>,

    /// Additional HTTP headers to include in requests
    pub extra_headers: Option<HashMap<String, String>>,

    /// Longest unterminated SSE line a stream may buffer, in bytes
    pub max_stream_buffer: Option<usize>,
}

impl ClientOptions {
    /// Create options with an API key.
    pub fn new(api_key: impl Into<SecretString>) -> Self {
        Self {
            api_key: Some(api_key.into()),
            ..Self::default()
        }
    }

    /// Read options from the environment.
    ///
    /// Unset variables leave the matching field empty. An unparsable
    /// provider name is a configuration error.
    pub fn from_env() -> Result<Self, ClientError> {
        let api_key = env::var(API_KEY_ENV)
            .or_else(|_| env::var(OPENAI_API_KEY_ENV))
            .ok()
            .map(SecretString::new);

        let provider = env::var(PROVIDER_ENV)
            .ok()
            .map(|p| p.parse::<Provider>().map_err(ClientError::Config))
            .transpose()?;

        Ok(Self {
            api_key,
            base_url: env::var(BASE_URL_ENV).ok(),
            provider,
            ..Self::default()
        })
    }

    /// Set the base URL.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    /// Set the provider.
    pub fn with_provider(mut self, provider: Provider) -> Self {
        self.provider = Some(provider);
        self
    }

    /// Set the per-attempt timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Set the retry budget.
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = Some(max_retries);
        self
    }

    /// Set the delay before the first retry.
    pub fn with_retry_base_delay(mut self, delay: Duration) -> Self {
        self.retry_base_delay = Some(delay);
        self
    }

    /// Set web search defaults.
    pub fn with_web_search(mut self, web_search: WebSearchOptions) -> Self {
        self.web_search = Some(web_search);
        self
    }

    /// Bound the bytes a stream buffers while waiting for a line end.
    pub fn with_max_stream_buffer(mut self, limit: usize) -> Self {
        self.max_stream_buffer = Some(limit);
        self
    }

    /// Add a single extra header.
    pub fn with_header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.extra_headers
            .get_or_insert_with(HashMap::new)
            .insert(key.into(), value.into());
        self
    }
}

/// Fully resolved client configuration.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// API key; requests go out unauthenticated when absent
    pub api_key: Option<SecretString>,

    /// Effective base URL, without trailing slash
    pub base_url: String,

    /// Remote service identity
    pub provider: Provider,

    /// Per-attempt timeout for buffered requests
    pub timeout: Duration,

    /// Retries after the first failed attempt
    pub max_retries: u32,

    /// Delay before the first retry
    pub retry_base_delay: Duration,

    /// Web search defaults; `enabled` seeds the client's toggle
    pub web_search: WebSearchOptions,

    /// Additional HTTP headers to include in requests
    pub extra_headers: HashMap<String, String>,

    /// Stream line buffer limit; unbounded when `None`
    pub max_stream_buffer: Option<usize>,
}

impl ClientConfig {
    /// Merge caller options over the defaults.
    ///
    /// The provider's base URL is applied last: OpenAI always gets its own
    /// endpoint, other providers keep an explicit override.
    pub fn resolve(options: ClientOptions) -> Self {
        let provider = options.provider.unwrap_or_default();
        let base_url = provider.resolve_base_url(options.base_url.as_deref());

        Self {
            api_key: options.api_key,
            base_url,
            provider,
            timeout: options.timeout.unwrap_or(DEFAULT_TIMEOUT),
            max_retries: options.max_retries.unwrap_or(DEFAULT_MAX_RETRIES),
            retry_base_delay: options.retry_base_delay.unwrap_or(DEFAULT_RETRY_BASE_DELAY),
            web_search: options.web_search.unwrap_or_default(),
            extra_headers: options.extra_headers.unwrap_or_default(),
            max_stream_buffer: options.max_stream_buffer,
        }
    }

    /// Join an endpoint path onto the base URL.
    pub fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self::resolve(ClientOptions::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::{DEFAULT_BASE_URL, OPENAI_BASE_URL};

    #[test]
    fn test_defaults() {
        let config = ClientConfig::default();
        assert_eq!(config.timeout, Duration::from_millis(30_000));
        assert_eq!(config.max_retries, 3);
        assert_eq!(config.retry_base_delay, Duration::from_secs(1));
        assert_eq!(config.base_url, DEFAULT_BASE_URL);
        assert_eq!(config.provider, Provider::Default);
        assert!(!config.web_search.enabled);
        assert_eq!(config.web_search.max_results, 5);
        assert!(config.web_search.include_content);
        assert!(config.api_key.is_none());
        assert_eq!(config.max_stream_buffer, None);
    }

    #[test]
    fn test_overrides_applied() {
        let config = ClientConfig::resolve(
            ClientOptions::new("key")
                .with_timeout(Duration::from_secs(5))
                .with_max_retries(0)
                .with_max_stream_buffer(4096)
                .with_web_search(WebSearchOptions::enabled().with_max_results(10)),
        );
        assert_eq!(config.max_stream_buffer, Some(4096));
        assert_eq!(config.timeout, Duration::from_secs(5));
        assert_eq!(config.max_retries, 0);
        assert!(config.web_search.enabled);
        assert_eq!(config.web_search.max_results, 10);
        assert_eq!(config.api_key.map(|k| k.expose_secret().to_string()), Some("key".into()));
    }

    #[test]
    fn test_openai_forces_base_url() {
        let config = ClientConfig::resolve(
            ClientOptions::new("key")
                .with_provider(Provider::OpenAi)
                .with_base_url("https://proxy.example.com/v1"),
        );
        assert_eq!(config.base_url, OPENAI_BASE_URL);
    }

    #[test]
    fn test_custom_base_url_preserved() {
        let config = ClientConfig::resolve(
            ClientOptions::new("key")
                .with_provider(Provider::Custom)
                .with_base_url("https://proxy.example.com/v1"),
        );
        assert_eq!(config.base_url, "https://proxy.example.com/v1");
        assert_eq!(
            config.endpoint("/chat/completions"),
            "https://proxy.example.com/v1/chat/completions"
        );
    }

    #[test]
    fn test_secret_string_debug_redacted() {
        let secret = SecretString::from("sk-very-secret");
        assert_eq!(format!("{secret:?}"), "SecretString([REDACTED])");
    }

    #[test]
    fn test_with_header_accumulates() {
        let options = ClientOptions::default()
            .with_header("x-a", "1")
            .with_header("x-b", "2");
        assert_eq!(options.extra_headers.map(|h| h.len()), Some(2));
    }
}
