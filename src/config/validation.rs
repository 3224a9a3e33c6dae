//! Configuration validation with detailed error reporting.
//!
//! The [`validate`] function checks an [`AppConfig`] for malformed
//! listen addresses, an RPC address colliding with the HTTP one and
//! unusable timeouts. Every problem is reported at once as a list of
//! [`ValidationError`] values with suggestions where one is obvious.

use super::AppConfig;
use crate::error::ValidationError;
use crate::mux::option::validate_address;

/// Validate a single `host:port` listen address. Returns `Ok(())` or a
/// human-readable error.
pub fn validate_listen_addr(address: &str) -> Result<(), String> {
    if address.is_empty() {
        return Err("address cannot be empty".into());
    }
    validate_address(address).map_err(|_| {
        if address.starts_with(':') {
            "address has no host".to_string()
        } else {
            format!("'{address}' is not a host:port address")
        }
    })
}

fn suggest_addr(address: &str) -> Option<String> {
    if address.starts_with(':') {
        Some(format!("did you mean '0.0.0.0{address}'?"))
    } else if !address.is_empty() && !address.contains(':') {
        Some(format!("did you mean '{address}:8090'?"))
    } else {
        None
    }
}

pub fn validate(config: &AppConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if let Err(message) = validate_listen_addr(&config.http_addr) {
        errors.push(ValidationError {
            field: "http_addr".into(),
            message,
            suggestion: suggest_addr(&config.http_addr),
        });
    }

    if let Some(ref rpc_addr) = config.rpc_addr {
        if let Err(message) = validate_listen_addr(rpc_addr) {
            errors.push(ValidationError {
                field: "rpc_addr".into(),
                message,
                suggestion: suggest_addr(rpc_addr),
            });
        } else if *rpc_addr == config.http_addr {
            errors.push(ValidationError {
                field: "rpc_addr".into(),
                message: format!("'{rpc_addr}' is already used by http_addr"),
                suggestion: Some("give each target its own port".into()),
            });
        }
    }

    if config.http_request_timeout_ms == 0 {
        errors.push(ValidationError {
            field: "http_request_timeout_ms".into(),
            message: "timeout must be greater than zero".into(),
            suggestion: None,
        });
    }

    if config.max_body == 0 {
        errors.push(ValidationError {
            field: "max_body".into(),
            message: "body limit must be greater than zero".into(),
            suggestion: None,
        });
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

/// One-line summary printed after a successful validation.
#[must_use]
pub fn format_summary(config: &AppConfig) -> String {
    let rpc = config.rpc_addr.as_deref().unwrap_or("disabled");
    format!(
        "http {} | rpc {} | grace period {}ms",
        config.http_addr, rpc, config.grace_period_ms
    )
}
