//! Bidirectional RPC target backed by a tonic [`Router`].
//!
//! tonic consumes its router when serving, so the router is held until the
//! first [`Target::serve`] call takes it.

use async_trait::async_trait;
use tokio::net::TcpListener;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tokio_stream::wrappers::TcpListenerStream;
use tokio_stream::StreamExt;
use tonic::transport::server::Router;

use super::conn::Severable;
use super::control::{ServeControl, StopOutcome};
use super::target::Target;
use crate::error::TargetError;

pub struct RpcTarget {
    address: String,
    router: Mutex<Option<Router>>,
    control: ServeControl,
}

impl RpcTarget {
    #[must_use]
    pub fn new(address: impl Into<String>, router: Router) -> Self {
        Self {
            address: address.into(),
            router: Mutex::new(Some(router)),
            control: ServeControl::new(),
        }
    }
}

#[async_trait]
impl Target for RpcTarget {
    fn address(&self) -> &str {
        &self.address
    }

    fn protocol(&self) -> &'static str {
        "rpc"
    }

    async fn serve(&self, listener: TcpListener) -> Result<(), TargetError> {
        let router = self
            .router
            .lock()
            .await
            .take()
            .ok_or(TargetError::AlreadyServed)?;
        let kill = self.control.kill_switch().clone();
        let incoming = TcpListenerStream::new(listener)
            .map(move |accepted| accepted.map(|io| Severable::new(io, &kill)));
        let signal = self.control.shutdown_requested();

        self.control
            .run(router.serve_with_incoming_shutdown(incoming, signal))
            .await
    }

    /// Waits for active calls to finish; past `deadline` they are cut off
    /// and [`TargetError::GracefulStopFailed`] is returned.
    async fn shutdown(&self, deadline: Instant) -> Result<(), TargetError> {
        match self.control.stop(deadline).await {
            StopOutcome::Graceful => Ok(()),
            StopOutcome::Forced => Err(TargetError::GracefulStopFailed),
        }
    }
}
