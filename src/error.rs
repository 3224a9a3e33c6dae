//! Unified error types for servemux.
//!
//! Defines [`TargetError`] (failures reported by a single serve target),
//! [`MuxError`] (the outcome of one mux run), [`ServemuxError`] (the
//! binary's top-level error) and [`ValidationError`] for config
//! validation failures. All use `thiserror` for `Display` and `Error`
//! derives.

use std::path::PathBuf;
use std::time::Duration;

pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[derive(Debug, Clone)]
pub struct ValidationError {
    pub field: String,
    pub message: String,
    pub suggestion: Option<String>,
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "  {}: {}", self.field, self.message)?;
        if let Some(ref suggestion) = self.suggestion {
            write!(f, " ({suggestion})")?;
        }
        Ok(())
    }
}

impl std::error::Error for ValidationError {}

fn format_errors(errors: &[ValidationError]) -> String {
    use std::fmt::Write;
    let mut buf = String::new();
    for (i, e) in errors.iter().enumerate() {
        if i > 0 {
            buf.push('\n');
        }
        // write! to String is infallible (only fails on OOM which is unrecoverable)
        let _ = write!(buf, "{e}");
    }
    buf
}

/// Failure reported by a single target's `serve` or `shutdown`.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum TargetError {
    #[error("server exited with error: {0}")]
    Serve(#[source] BoxError),

    /// The RPC engine did not finish its graceful stop before the deadline
    /// and was stopped forcefully.
    #[error("graceful stop failed")]
    GracefulStopFailed,

    /// In-flight HTTP requests were still draining when the deadline hit.
    #[error("graceful drain did not finish within {0:?}, connections dropped")]
    DrainTimeout(Duration),

    /// The target did not return from `shutdown` within the grace period
    /// plus the coordinator's force-stop overhead.
    #[error("shutdown did not complete within {0:?}, target was force-stopped")]
    ForcedStop(Duration),

    #[error("target has already been served")]
    AlreadyServed,

    #[error("serve task panicked: {0}")]
    Panicked(String),
}

impl TargetError {
    #[must_use]
    pub const fn is_forced_stop(&self) -> bool {
        matches!(
            self,
            Self::GracefulStopFailed | Self::DrainTimeout(_) | Self::ForcedStop(_)
        )
    }
}

/// Terminal outcome of a mux run.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum MuxError {
    #[error("mux serve: at least one serve target must be set")]
    NoTargets,

    #[error("mux option: {0}")]
    InvalidOption(String),

    #[error("serve: failed to listen on {address}: {source}")]
    Bind {
        address: String,
        #[source]
        source: std::io::Error,
    },

    #[error("serve {address}: {source}")]
    Serve {
        address: String,
        #[source]
        source: TargetError,
    },

    #[error("shutdown {address}: {source}")]
    Shutdown {
        address: String,
        #[source]
        source: TargetError,
    },
}

impl MuxError {
    /// Lower value wins when several failures are observed in one run.
    #[must_use]
    pub const fn priority(&self) -> u8 {
        match self {
            Self::NoTargets | Self::InvalidOption(_) => 0,
            Self::Bind { .. } => 1,
            Self::Serve { .. } => 2,
            Self::Shutdown { .. } => 3,
        }
    }

    #[must_use]
    pub const fn is_config_error(&self) -> bool {
        matches!(self, Self::NoTargets | Self::InvalidOption(_))
    }

    #[must_use]
    pub const fn is_forced_stop(&self) -> bool {
        match self {
            Self::Shutdown { source, .. } => source.is_forced_stop(),
            _ => false,
        }
    }

    /// Address of the target the error belongs to, if any.
    #[must_use]
    pub fn address(&self) -> Option<&str> {
        match self {
            Self::Bind { address, .. }
            | Self::Serve { address, .. }
            | Self::Shutdown { address, .. } => Some(address),
            Self::NoTargets | Self::InvalidOption(_) => None,
        }
    }
}

#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum ServemuxError {
    #[error("Config file not found: {}", path.display())]
    ConfigFileNotFound { path: PathBuf },

    #[error("Config parse error in {path}:\n  {source}")]
    ConfigParse {
        path: String,
        #[source]
        source: BoxError,
    },

    #[error("Config validation failed:\n{}", format_errors(.errors))]
    ConfigValidation { errors: Vec<ValidationError> },

    #[error("Unsupported config format: '{0}'")]
    UnsupportedFormat(String),

    #[error("Failed to encode config: {source}")]
    ConfigEncode {
        #[source]
        source: BoxError,
    },

    #[error("{0}")]
    Io(#[from] std::io::Error),

    #[error("server: {0}")]
    Mux(#[from] MuxError),
}

#[cfg(test)]
mod tests {
    use super::*;

    fn serve_err() -> MuxError {
        MuxError::Serve {
            address: "127.0.0.1:1".into(),
            source: TargetError::Serve("boom".into()),
        }
    }

    #[test]
    fn bind_outranks_serve_outranks_shutdown() {
        let bind = MuxError::Bind {
            address: "127.0.0.1:1".into(),
            source: std::io::Error::from(std::io::ErrorKind::AddrInUse),
        };
        let shutdown = MuxError::Shutdown {
            address: "127.0.0.1:1".into(),
            source: TargetError::GracefulStopFailed,
        };
        assert!(bind.priority() < serve_err().priority());
        assert!(serve_err().priority() < shutdown.priority());
    }

    #[test]
    fn forced_stop_only_reported_for_shutdown_failures() {
        let shutdown = MuxError::Shutdown {
            address: "127.0.0.1:1".into(),
            source: TargetError::ForcedStop(Duration::from_secs(1)),
        };
        assert!(shutdown.is_forced_stop());
        assert!(!serve_err().is_forced_stop());
        assert!(TargetError::DrainTimeout(Duration::from_secs(1)).is_forced_stop());
        assert!(!TargetError::AlreadyServed.is_forced_stop());
    }

    #[test]
    fn rpc_forced_stop_message_is_minimal() {
        assert_eq!(
            TargetError::GracefulStopFailed.to_string(),
            "graceful stop failed"
        );
    }

    #[test]
    fn validation_errors_are_listed_one_per_line() {
        let err = ServemuxError::ConfigValidation {
            errors: vec![
                ValidationError {
                    field: "http_addr".into(),
                    message: "missing port".into(),
                    suggestion: Some("did you mean 'localhost:8090'?".into()),
                },
                ValidationError {
                    field: "rpc_addr".into(),
                    message: "missing port".into(),
                    suggestion: None,
                },
            ],
        };
        let text = err.to_string();
        assert!(text.contains("http_addr: missing port (did you mean 'localhost:8090'?)"));
        assert!(text.ends_with("rpc_addr: missing port"));
    }
}
