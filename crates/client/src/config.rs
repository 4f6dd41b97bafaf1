// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::path::PathBuf;
use std::time::Duration;

/// Configuration for the authenticated API client.
#[derive(Debug, Clone, clap::Args)]
pub struct ClientConfig {
    /// Base URL every endpoint is resolved against.
    #[arg(long, default_value = "http://127.0.0.1:8080", env = "AUTHCLIENT_BASE_URL")]
    pub base_url: String,

    /// Path of the credential refresh endpoint.
    #[arg(long, default_value = "/auth/refresh", env = "AUTHCLIENT_REFRESH_PATH")]
    pub refresh_path: String,

    /// Locale tag sent with every request.
    #[arg(long, env = "AUTHCLIENT_LOCALE")]
    pub locale: Option<String>,

    /// Session file holding the credential pair. In-memory when unset.
    #[arg(long, env = "AUTHCLIENT_CREDENTIAL_FILE")]
    pub credential_file: Option<PathBuf>,

    /// Per-request timeout in milliseconds.
    #[arg(long, default_value_t = 30000, env = "AUTHCLIENT_REQUEST_TIMEOUT_MS")]
    pub request_timeout_ms: u64,

    /// Upper bound on a single refresh call in milliseconds.
    #[arg(long, default_value_t = 10000, env = "AUTHCLIENT_REFRESH_TIMEOUT_MS")]
    pub refresh_timeout_ms: u64,

    /// Extra time a waiter allows beyond the refresh timeout before giving up.
    #[arg(long, default_value_t = 2000, env = "AUTHCLIENT_REFRESH_WAIT_GRACE_MS")]
    pub refresh_wait_grace_ms: u64,

    /// Log filter (tracing `EnvFilter` syntax).
    #[arg(long, default_value = "info", env = "AUTHCLIENT_LOG_LEVEL")]
    pub log_level: String,

    /// Log format: `text` or `json`.
    #[arg(long, default_value = "text", env = "AUTHCLIENT_LOG_FORMAT")]
    pub log_format: String,
}

impl ClientConfig {
    pub fn validate(&self) -> anyhow::Result<()> {
        let url = reqwest::Url::parse(&self.base_url)
            .map_err(|e| anyhow::anyhow!("invalid --base-url {}: {e}", self.base_url))?;
        if !matches!(url.scheme(), "http" | "https") {
            anyhow::bail!("--base-url must be http or https, got {}", url.scheme());
        }
        if !self.refresh_path.starts_with('/') {
            anyhow::bail!("--refresh-path must start with '/'");
        }
        if self.request_timeout_ms == 0 || self.refresh_timeout_ms == 0 {
            anyhow::bail!("timeouts must be greater than zero");
        }
        if !matches!(self.log_format.as_str(), "text" | "json") {
            anyhow::bail!("invalid --log-format: {}", self.log_format);
        }
        Ok(())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn refresh_timeout(&self) -> Duration {
        Duration::from_millis(self.refresh_timeout_ms)
    }

    pub fn refresh_wait_grace(&self) -> Duration {
        Duration::from_millis(self.refresh_wait_grace_ms)
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:8080".to_owned(),
            refresh_path: "/auth/refresh".to_owned(),
            locale: None,
            credential_file: None,
            request_timeout_ms: 30000,
            refresh_timeout_ms: 10000,
            refresh_wait_grace_ms: 2000,
            log_level: "info".to_owned(),
            log_format: "text".to_owned(),
        }
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
