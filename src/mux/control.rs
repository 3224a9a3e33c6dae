//! Serve/shutdown lifecycle shared by the concrete adapters.
//!
//! [`ServeControl`] runs an adapter's serve future on its own task so the
//! adapter can abort it when a graceful stop overruns its deadline, severs
//! the connections it accepted (see [`conn`](super::conn)), and tracks
//! whether serving has finished so repeated shutdowns are no-ops.

use std::future::Future;
use std::sync::{Mutex, MutexGuard, PoisonError};

use tokio::sync::watch;
use tokio::task::AbortHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::error::{BoxError, TargetError};

enum Phase {
    Idle,
    Running(AbortHandle),
    /// Shutdown arrived before serve was ever called.
    Closed,
    Finished,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopOutcome {
    Graceful,
    Forced,
}

pub struct ServeControl {
    phase: Mutex<Phase>,
    shutdown_tx: watch::Sender<bool>,
    done_tx: watch::Sender<bool>,
    kill: CancellationToken,
}

impl Default for ServeControl {
    fn default() -> Self {
        Self::new()
    }
}

impl ServeControl {
    #[must_use]
    pub fn new() -> Self {
        Self {
            phase: Mutex::new(Phase::Idle),
            shutdown_tx: watch::channel(false).0,
            done_tx: watch::channel(false).0,
            kill: CancellationToken::new(),
        }
    }

    fn phase(&self) -> MutexGuard<'_, Phase> {
        self.phase.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Resolves once a stop has been requested.
    pub fn shutdown_requested(&self) -> impl Future<Output = ()> + Send + 'static {
        let mut rx = self.shutdown_tx.subscribe();
        async move {
            let _ = rx.wait_for(|requested| *requested).await;
        }
    }

    /// Token cancelled on a forced stop; wrap accepted connections with it.
    #[must_use]
    pub fn kill_switch(&self) -> &CancellationToken {
        &self.kill
    }

    #[must_use]
    pub fn is_finished(&self) -> bool {
        *self.done_tx.borrow()
    }

    /// Drive `serve` to completion on a dedicated task.
    ///
    /// An aborted task counts as an intentional stop. Dropping the returned
    /// future aborts the task as well, so the listener it owns is released.
    pub async fn run<F, E>(&self, serve: F) -> Result<(), TargetError>
    where
        F: Future<Output = Result<(), E>> + Send + 'static,
        E: Into<BoxError> + Send + 'static,
    {
        let handle = {
            let mut phase = self.phase();
            match *phase {
                Phase::Running(_) | Phase::Finished => return Err(TargetError::AlreadyServed),
                Phase::Closed => return Ok(()),
                Phase::Idle => {}
            }
            let handle = tokio::spawn(serve);
            *phase = Phase::Running(handle.abort_handle());
            handle
        };

        let _guard = FinishGuard {
            control: self,
            task: handle.abort_handle(),
        };

        match handle.await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => Err(TargetError::Serve(e.into())),
            Err(e) if e.is_cancelled() => Ok(()),
            Err(e) => Err(TargetError::Panicked(e.to_string())),
        }
    }

    /// Request a stop and wait for serving to finish until `deadline`.
    ///
    /// On expiry the serve task is aborted, live connections are severed and
    /// [`StopOutcome::Forced`] is returned.
    pub async fn stop(&self, deadline: Instant) -> StopOutcome {
        self.shutdown_tx.send_replace(true);
        {
            let mut phase = self.phase();
            if matches!(*phase, Phase::Idle) {
                *phase = Phase::Closed;
                self.done_tx.send_replace(true);
            }
        }

        let mut done = self.done_tx.subscribe();
        let finished = tokio::time::timeout_at(deadline, done.wait_for(|done| *done))
            .await
            .is_ok();
        if finished {
            return StopOutcome::Graceful;
        }

        if let Phase::Running(ref task) = *self.phase() {
            task.abort();
        }
        self.kill.cancel();
        StopOutcome::Forced
    }
}

struct FinishGuard<'a> {
    control: &'a ServeControl,
    task: AbortHandle,
}

impl Drop for FinishGuard<'_> {
    fn drop(&mut self) {
        // No-op when the task already completed.
        self.task.abort();
        *self.control.phase() = Phase::Finished;
        self.control.done_tx.send_replace(true);
    }
}
