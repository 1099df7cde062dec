//! Gateway connection settings.

use std::collections::BTreeMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Environment variable read for the auth token when none is configured.
pub const DEFAULT_AUTH_TOKEN_ENV: &str = "KERNELMIX_GATEWAY_AUTH_TOKEN";

/// Seconds to wait for a REST call. Generous because starting a kernel on a
/// cluster can take a while.
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 42;

/// Seconds to wait for a TCP (or WebSocket) connection.
pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 40;

/// How to reach a kernel gateway.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GatewayConfig {
    /// Base HTTP(S) URL, e.g. `https://gateway.example.com`.
    pub url: String,

    /// Base WebSocket URL. Derived from `url` when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ws_url: Option<String>,

    /// Auth token (takes precedence over `auth_token_env`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auth_token: Option<String>,

    /// Environment variable holding the auth token.
    #[serde(default = "default_auth_token_env")]
    pub auth_token_env: String,

    /// Extra headers sent on every request and WebSocket handshake.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub headers: BTreeMap<String, String>,

    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
}

fn default_auth_token_env() -> String {
    DEFAULT_AUTH_TOKEN_ENV.to_string()
}

fn default_request_timeout_secs() -> u64 {
    DEFAULT_REQUEST_TIMEOUT_SECS
}

fn default_connect_timeout_secs() -> u64 {
    DEFAULT_CONNECT_TIMEOUT_SECS
}

impl GatewayConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ws_url: None,
            auth_token: None,
            auth_token_env: default_auth_token_env(),
            headers: BTreeMap::new(),
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
            connect_timeout_secs: DEFAULT_CONNECT_TIMEOUT_SECS,
        }
    }

    /// Set the WebSocket base URL explicitly.
    pub fn with_ws_url(mut self, url: impl Into<String>) -> Self {
        self.ws_url = Some(url.into());
        self
    }

    /// Set the auth token directly.
    pub fn with_auth_token(mut self, token: impl Into<String>) -> Self {
        self.auth_token = Some(token.into());
        self
    }

    /// Read the auth token from a different environment variable.
    pub fn with_auth_token_env(mut self, env_var: impl Into<String>) -> Self {
        self.auth_token_env = env_var.into();
        self
    }

    /// Add a header sent with every request.
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout_secs = timeout.as_secs();
        self
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout_secs = timeout.as_secs();
        self
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    /// Resolve the auth token from config or environment.
    pub fn resolve_auth_token(&self) -> Option<String> {
        // Direct token takes precedence
        if let Some(token) = &self.auth_token {
            return Some(token.clone());
        }
        std::env::var(&self.auth_token_env)
            .ok()
            .filter(|token| !token.is_empty())
    }

    /// HTTP base URL without a trailing slash.
    pub fn http_base(&self) -> &str {
        self.url.trim_end_matches('/')
    }

    /// WebSocket base URL: the configured one, or `url` with its scheme
    /// swapped (`http` → `ws`, `https` → `wss`).
    pub fn ws_base(&self) -> String {
        if let Some(ws) = &self.ws_url {
            return ws.trim_end_matches('/').to_string();
        }
        let base = self.http_base();
        if let Some(rest) = base.strip_prefix("https://") {
            format!("wss://{}", rest)
        } else if let Some(rest) = base.strip_prefix("http://") {
            format!("ws://{}", rest)
        } else {
            base.to_string()
        }
    }
}
