//! HTTP client construction.
//!
//! The process builds one `reqwest::Client` with bounded timeouts and passes
//! it into the forecast adapter and the REST mirror tier; nothing in the
//! crate reaches for a global client.

use std::time::Duration;

use serde::{Deserialize, Serialize};

const USER_AGENT: &str = concat!("skyscout-rust/", env!("CARGO_PKG_VERSION"));

/// Client timeout settings, loadable from the TOML config.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpConfig {
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_sec: u64,
    #[serde(default = "default_request_timeout")]
    pub request_timeout_sec: u64,
}

fn default_connect_timeout() -> u64 {
    15
}

fn default_request_timeout() -> u64 {
    20
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            connect_timeout_sec: default_connect_timeout(),
            request_timeout_sec: default_request_timeout(),
        }
    }
}

/// Build the shared HTTP client.
pub fn build_client(config: &HttpConfig) -> Result<reqwest::Client, reqwest::Error> {
    reqwest::Client::builder()
        .user_agent(USER_AGENT)
        .connect_timeout(Duration::from_secs(config.connect_timeout_sec))
        .timeout(Duration::from_secs(config.request_timeout_sec))
        .build()
}
