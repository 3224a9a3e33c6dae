//! Service configuration: defaults, optional config file, CLI/env overrides.
//!
//! [`AppConfig`] is the effective configuration. [`load`] layers an
//! optional YAML/JSON file over the built-in defaults, applies the
//! [`ConfigArgs`] overrides (flags or their environment variables) and
//! validates the result.

pub mod validation;

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::cli::ConfigArgs;
use crate::error::ServemuxError;

pub const DEFAULT_HTTP_ADDR: &str = "0.0.0.0:8090";

fn default_http_addr() -> String {
    DEFAULT_HTTP_ADDR.to_string()
}

const fn default_grace_period_ms() -> u64 {
    10_000
}

const fn default_request_timeout_ms() -> u64 {
    10_000
}

const fn default_max_body() -> usize {
    1_048_576
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct AppConfig {
    #[serde(default = "default_http_addr")]
    pub http_addr: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rpc_addr: Option<String>,

    #[serde(default = "default_grace_period_ms")]
    pub grace_period_ms: u64,

    #[serde(default = "default_request_timeout_ms")]
    pub http_request_timeout_ms: u64,

    #[serde(default = "default_max_body")]
    pub max_body: usize,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            http_addr: default_http_addr(),
            rpc_addr: None,
            grace_period_ms: default_grace_period_ms(),
            http_request_timeout_ms: default_request_timeout_ms(),
            max_body: default_max_body(),
        }
    }
}

impl AppConfig {
    #[must_use]
    pub const fn grace_period(&self) -> Duration {
        Duration::from_millis(self.grace_period_ms)
    }

    #[must_use]
    pub const fn http_request_timeout(&self) -> Duration {
        Duration::from_millis(self.http_request_timeout_ms)
    }

    /// Apply explicitly provided flags on top of this config.
    #[must_use]
    pub fn with_overrides(mut self, args: &ConfigArgs) -> Self {
        if let Some(ref addr) = args.http_addr {
            self.http_addr.clone_from(addr);
        }
        if let Some(ref addr) = args.rpc_addr {
            // An empty value disables the RPC target set by a config file.
            self.rpc_addr = Some(addr.clone()).filter(|a| !a.is_empty());
        }
        if let Some(ms) = args.grace_period_ms {
            self.grace_period_ms = ms;
        }
        if let Some(ms) = args.http_request_timeout_ms {
            self.http_request_timeout_ms = ms;
        }
        if let Some(bytes) = args.max_body {
            self.max_body = bytes;
        }
        self
    }
}

/// Parse a config string based on file extension.
pub fn parse_config_str(
    ext: &str,
    content: &str,
    path_display: &str,
) -> Result<AppConfig, ServemuxError> {
    match ext {
        #[cfg(feature = "yaml")]
        "yaml" | "yml" => serde_yml::from_str(content).map_err(|e| ServemuxError::ConfigParse {
            path: path_display.to_string(),
            source: Box::new(e),
        }),

        #[cfg(feature = "json")]
        "json" => serde_json::from_str(content).map_err(|e| ServemuxError::ConfigParse {
            path: path_display.to_string(),
            source: Box::new(e),
        }),

        other => Err(ServemuxError::UnsupportedFormat(other.to_string())),
    }
}

async fn read_file(path: &Path) -> Result<AppConfig, ServemuxError> {
    let content = tokio::fs::read_to_string(path).await.map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            ServemuxError::ConfigFileNotFound {
                path: path.to_path_buf(),
            }
        } else {
            ServemuxError::Io(e)
        }
    })?;
    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");
    parse_config_str(ext, &content, &path.display().to_string())
}

/// Resolve and validate the effective configuration.
pub async fn load(args: &ConfigArgs) -> Result<AppConfig, ServemuxError> {
    let base = match args.config {
        Some(ref path) => {
            tracing::debug!(path = %path.display(), "loading config file");
            read_file(path).await?
        }
        None => AppConfig::default(),
    };

    let config = base.with_overrides(args);
    validation::validate(&config).map_err(|errors| ServemuxError::ConfigValidation { errors })?;
    Ok(config)
}
