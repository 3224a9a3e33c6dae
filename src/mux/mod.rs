//! Multi-protocol server multiplexer.
//!
//! [`serve`] binds one TCP listener per registered [`Target`], serves all of
//! them concurrently and shuts every one down when the caller's
//! [`CancellationToken`] is cancelled or any target stops on its own. The
//! shutdown is bounded by the configured grace period and the run reports a
//! single error: a bind failure first, then a serve failure, then a
//! shutdown failure.
//!
//! ```no_run
//! # async fn demo(router: axum::Router) -> Result<(), servemux::error::MuxError> {
//! use tokio_util::sync::CancellationToken;
//! use servemux::mux::{self, with_grace_period, with_http_target};
//!
//! let token = CancellationToken::new();
//! mux::serve(
//!     token,
//!     [
//!         with_http_target("127.0.0.1:8090", router),
//!         with_grace_period(std::time::Duration::from_secs(5)),
//!     ],
//! )
//! .await
//! # }
//! ```

pub mod conn;
pub mod control;
mod coordinator;
pub mod http;
pub mod option;
pub mod rpc;
pub mod target;

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::error::MuxError;

pub use http::HttpTarget;
pub use option::{
    with_binder, with_grace_period, with_http_target, with_rpc_target, with_target, MuxOption,
};
pub use rpc::RpcTarget;
pub use target::{Binder, TcpBinder, Target};

pub const DEFAULT_GRACE_PERIOD: Duration = Duration::from_secs(10);

/// Time the coordinator waits past the grace period for targets that ignore
/// their shutdown deadline before abandoning them.
pub const FORCE_STOP_OVERHEAD: Duration = Duration::from_secs(1);

/// Apply `options` and serve every registered target until `token` is
/// cancelled or a target stops. Blocks until all targets have stopped.
pub async fn serve<I>(token: CancellationToken, options: I) -> Result<(), MuxError>
where
    I: IntoIterator<Item = MuxOption>,
{
    let mut mux = MuxServer::new();
    for option in options {
        option.apply(&mut mux)?;
    }
    mux.serve(token).await
}

pub struct MuxServer {
    targets: Vec<Arc<dyn Target>>,
    grace_period: Duration,
    binder: Arc<dyn Binder>,
}

impl Default for MuxServer {
    fn default() -> Self {
        Self::new()
    }
}

impl MuxServer {
    #[must_use]
    pub fn new() -> Self {
        Self {
            targets: Vec::new(),
            grace_period: DEFAULT_GRACE_PERIOD,
            binder: Arc::new(TcpBinder),
        }
    }

    #[must_use]
    pub fn targets(&self) -> &[Arc<dyn Target>] {
        &self.targets
    }

    #[must_use]
    pub const fn grace_period(&self) -> Duration {
        self.grace_period
    }

    pub fn add_target(&mut self, target: Arc<dyn Target>) {
        self.targets.push(target);
    }

    pub fn set_grace_period(&mut self, grace_period: Duration) {
        self.grace_period = if grace_period.is_zero() {
            DEFAULT_GRACE_PERIOD
        } else {
            grace_period
        };
    }

    pub fn set_binder(&mut self, binder: Arc<dyn Binder>) {
        self.binder = binder;
    }

    /// Run every target to completion. Consumes the server: targets are
    /// never reused across runs.
    pub async fn serve(self, token: CancellationToken) -> Result<(), MuxError> {
        if self.targets.is_empty() {
            return Err(MuxError::NoTargets);
        }
        coordinator::run(self, token).await
    }
}
