//! Provider identities and their default endpoints.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Base URL of the default hosted provider.
pub const DEFAULT_BASE_URL: &str = "http://localhost:8000/v1";

/// Base URL of the OpenAI API.
pub const OPENAI_BASE_URL: &str = "https://api.openai.com/v1";

/// The remote service a client talks to.
///
/// The provider decides which base URL is used when the caller does not
/// override it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    /// The default hosted OpenAI-compatible service.
    #[default]
    Default,
    /// OpenAI itself. Always uses [`OPENAI_BASE_URL`].
    #[serde(rename = "openai")]
    OpenAi,
    /// Any other OpenAI-compatible endpoint.
    Custom,
}

impl Provider {
    /// The endpoint this provider implies when no base URL is supplied.
    pub fn default_base_url(self) -> &'static str {
        match self {
            Provider::Default | Provider::Custom => DEFAULT_BASE_URL,
            Provider::OpenAi => OPENAI_BASE_URL,
        }
    }

    /// Resolve the effective base URL given an optional caller override.
    ///
    /// OpenAI ignores the override; every other provider keeps it as given.
    pub fn resolve_base_url(self, base_url: Option<&str>) -> String {
        match (self, base_url) {
            (Provider::OpenAi, _) => OPENAI_BASE_URL.to_string(),
            (Provider::Default | Provider::Custom, Some(url)) => {
                url.trim_end_matches('/').to_string()
            }
            (Provider::Default | Provider::Custom, None) => self.default_base_url().to_string(),
        }
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Provider::Default => "default",
            Provider::OpenAi => "openai",
            Provider::Custom => "custom",
        };
        f.write_str(name)
    }
}

impl FromStr for Provider {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "default" => Ok(Provider::Default),
            "openai" => Ok(Provider::OpenAi),
            "custom" => Ok(Provider::Custom),
            other => Err(format!("unknown provider: {other}")),
        }
    }
}
