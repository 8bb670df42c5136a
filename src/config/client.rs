//! Client Configuration
//!
//! Defines the connection settings of a [`crate::MistralClient`].

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Production API root
pub const DEFAULT_BASE_URL: &str = "https://api.mistral.ai/v1";

/// Whole-request timeout; long completions can take minutes
pub const DEFAULT_TIMEOUT_SECS: u64 = 120;

pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 10;

/// Environment variable holding the API key
pub const API_KEY_ENV: &str = "MISTRAL_API_KEY";

/// Environment variable overriding the base URL
pub const BASE_URL_ENV: &str = "MISTRAL_BASE_URL";

/// Resolved client settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Bearer token sent with every request
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    #[serde(default = "default_base_url")]
    pub base_url: String,

    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
}

fn default_base_url() -> String {
    DEFAULT_BASE_URL.to_string()
}

fn default_timeout_secs() -> u64 {
    DEFAULT_TIMEOUT_SECS
}

fn default_connect_timeout_secs() -> u64 {
    DEFAULT_CONNECT_TIMEOUT_SECS
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: default_base_url(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            connect_timeout_secs: DEFAULT_CONNECT_TIMEOUT_SECS,
        }
    }
}

impl ClientConfig {
    /// Defaults with the given key
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: Some(api_key.into()),
            ..Self::default()
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_timeout(mut self, timeout_secs: u64) -> Self {
        self.timeout_secs = timeout_secs;
        self
    }

    pub fn with_connect_timeout(mut self, connect_timeout_secs: u64) -> Self {
        self.connect_timeout_secs = connect_timeout_secs;
        self
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    /// Absolute URL of an API path such as `/chat/completions`
    pub fn endpoint(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }

    /// Overwrite every field the overlay sets
    pub fn merge(&mut self, overlay: ConfigOverlay) {
        if let Some(api_key) = overlay.api_key {
            self.api_key = Some(api_key);
        }
        if let Some(base_url) = overlay.base_url {
            self.base_url = base_url;
        }
        if let Some(timeout_secs) = overlay.timeout_secs {
            self.timeout_secs = timeout_secs;
        }
        if let Some(connect_timeout_secs) = overlay.connect_timeout_secs {
            self.connect_timeout_secs = connect_timeout_secs;
        }
    }
}

/// Partial settings from one source (a file or the environment)
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigOverlay {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_secs: Option<u64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub connect_timeout_secs: Option<u64>,
}

impl ConfigOverlay {
    /// Read `MISTRAL_API_KEY` and `MISTRAL_BASE_URL`; blank values are ignored
    pub fn from_env() -> Self {
        let var = |name: &str| std::env::var(name).ok().filter(|v| !v.trim().is_empty());
        Self {
            api_key: var(API_KEY_ENV),
            base_url: var(BASE_URL_ENV),
            ..Self::default()
        }
    }
}
