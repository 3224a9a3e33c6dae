//! Configuration options applied to a [`MuxServer`] before it starts.
//!
//! Each option either registers one target, overrides the grace period or
//! replaces the listener binder. Options run in the order given and the
//! first failure aborts setup before any socket is opened.

use std::sync::Arc;
use std::time::Duration;

use super::http::HttpTarget;
use super::rpc::RpcTarget;
use super::target::{Binder, Target};
use super::MuxServer;
use crate::error::MuxError;

type ApplyFn = Box<dyn FnOnce(&mut MuxServer) -> Result<(), MuxError> + Send>;

pub struct MuxOption(ApplyFn);

impl MuxOption {
    pub fn new<F>(apply: F) -> Self
    where
        F: FnOnce(&mut MuxServer) -> Result<(), MuxError> + Send + 'static,
    {
        Self(Box::new(apply))
    }

    pub fn apply(self, mux: &mut MuxServer) -> Result<(), MuxError> {
        (self.0)(mux)
    }
}

impl std::fmt::Debug for MuxOption {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("MuxOption")
    }
}

/// Register an HTTP target. Multiple HTTP targets may be added.
pub fn with_http_target(address: impl Into<String>, router: axum::Router) -> MuxOption {
    let address = address.into();
    MuxOption::new(move |mux| {
        validate_address(&address)?;
        mux.add_target(Arc::new(HttpTarget::new(address, router)));
        Ok(())
    })
}

/// Register an RPC target. Multiple RPC targets may be added.
pub fn with_rpc_target(
    address: impl Into<String>,
    router: tonic::transport::server::Router,
) -> MuxOption {
    let address = address.into();
    MuxOption::new(move |mux| {
        validate_address(&address)?;
        mux.add_target(Arc::new(RpcTarget::new(address, router)));
        Ok(())
    })
}

/// Register any other [`Target`] implementation.
pub fn with_target(target: Arc<dyn Target>) -> MuxOption {
    MuxOption::new(move |mux| {
        validate_address(target.address())?;
        mux.add_target(target);
        Ok(())
    })
}

/// Set the wait duration for graceful shutdown. Zero selects the default of
/// 10 seconds.
pub fn with_grace_period(grace_period: Duration) -> MuxOption {
    MuxOption::new(move |mux| {
        mux.set_grace_period(grace_period);
        Ok(())
    })
}

/// Replace how listeners are opened for each target address.
pub fn with_binder(binder: impl Binder + 'static) -> MuxOption {
    let binder: Arc<dyn Binder> = Arc::new(binder);
    MuxOption::new(move |mux| {
        mux.set_binder(binder);
        Ok(())
    })
}

/// Check that `address` has the `host:port` shape a listener can bind.
pub fn validate_address(address: &str) -> Result<(), MuxError> {
    let Some((host, port)) = address.rsplit_once(':') else {
        return Err(MuxError::InvalidOption(format!(
            "target address '{address}' is missing a port"
        )));
    };
    if host.is_empty() {
        return Err(MuxError::InvalidOption(format!(
            "target address '{address}' has no host (did you mean '0.0.0.0{address}'?)"
        )));
    }
    if port.parse::<u16>().is_err() {
        return Err(MuxError::InvalidOption(format!(
            "target address '{address}' has an invalid port '{port}'"
        )));
    }
    Ok(())
}
