//! Request/response target backed by an axum [`Router`].

use async_trait::async_trait;
use axum::Router;
use tokio::net::TcpListener;
use tokio::time::Instant;

use super::conn::SeverableListener;
use super::control::{ServeControl, StopOutcome};
use super::target::Target;
use crate::error::TargetError;

pub struct HttpTarget {
    address: String,
    router: Router,
    control: ServeControl,
}

impl HttpTarget {
    #[must_use]
    pub fn new(address: impl Into<String>, router: Router) -> Self {
        Self {
            address: address.into(),
            router,
            control: ServeControl::new(),
        }
    }
}

#[async_trait]
impl Target for HttpTarget {
    fn address(&self) -> &str {
        &self.address
    }

    fn protocol(&self) -> &'static str {
        "http"
    }

    async fn serve(&self, listener: TcpListener) -> Result<(), TargetError> {
        let listener = SeverableListener::new(listener, self.control.kill_switch().clone());
        let router = self.router.clone();
        let signal = self.control.shutdown_requested();

        // axum::serve only returns once the graceful shutdown signal fired
        // and every connection has closed.
        self.control
            .run(async move {
                axum::serve(listener, router)
                    .with_graceful_shutdown(signal)
                    .await
            })
            .await
    }

    async fn shutdown(&self, deadline: Instant) -> Result<(), TargetError> {
        let budget = deadline.saturating_duration_since(Instant::now());
        match self.control.stop(deadline).await {
            StopOutcome::Graceful => Ok(()),
            StopOutcome::Forced => Err(TargetError::DrainTimeout(budget)),
        }
    }
}
