//! The uniform serve-target contract and the listener binder seam.

use async_trait::async_trait;
use tokio::net::TcpListener;
use tokio::time::Instant;

use crate::error::TargetError;

// async_trait is required here because targets are held as Arc<dyn Target>
// and native async fn in traits does not support dyn dispatch.
#[async_trait]
pub trait Target: Send + Sync {
    /// Bind address of this target. Stable for the target's lifetime.
    fn address(&self) -> &str;

    /// Short protocol label used in logs and the health endpoint.
    fn protocol(&self) -> &'static str {
        "custom"
    }

    /// Accept and handle connections on `listener` until stopped.
    ///
    /// Returns `Ok(())` when the stop was requested through [`shutdown`](Self::shutdown)
    /// (graceful or forced) and an error for any other termination.
    async fn serve(&self, listener: TcpListener) -> Result<(), TargetError>;

    /// Stop serving, waiting for in-flight work until `deadline`.
    ///
    /// Past the deadline the target must terminate forcefully and report
    /// it. Calling this on a target that already stopped returns `Ok(())`.
    async fn shutdown(&self, deadline: Instant) -> Result<(), TargetError>;
}

/// Opens the listening socket for a target address.
#[async_trait]
pub trait Binder: Send + Sync {
    async fn bind(&self, address: &str) -> std::io::Result<TcpListener>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct TcpBinder;

#[async_trait]
impl Binder for TcpBinder {
    async fn bind(&self, address: &str) -> std::io::Result<TcpListener> {
        TcpListener::bind(address).await
    }
}
