//! One mux run: bind, serve, shut down, report.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::task::{Id, JoinError, JoinSet};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use super::target::Target;
use super::{MuxServer, FORCE_STOP_OVERHEAD};
use crate::error::{MuxError, TargetError};

/// Keeps the highest-priority error seen during a run; the first one wins
/// among equals.
#[derive(Debug, Default)]
struct ErrorSlot(Option<MuxError>);

impl ErrorSlot {
    fn offer(&mut self, err: MuxError) {
        if let Some(kept) = self
            .0
            .as_ref()
            .filter(|kept| kept.priority() <= err.priority())
        {
            tracing::debug!(error = %err, kept = %kept, "discarding secondary error");
            return;
        }
        self.0 = Some(err);
    }

    const fn is_empty(&self) -> bool {
        self.0.is_none()
    }

    fn into_result(self) -> Result<(), MuxError> {
        self.0.map_or(Ok(()), Err)
    }
}

type TaskOutcome = Result<(Id, Result<(), TargetError>), JoinError>;

pub(super) async fn run(mux: MuxServer, token: CancellationToken) -> Result<(), MuxError> {
    let MuxServer {
        targets,
        grace_period,
        binder,
    } = mux;
    let mut errors = ErrorSlot::default();

    let mut listeners = Vec::with_capacity(targets.len());
    for target in &targets {
        match binder.bind(target.address()).await {
            Ok(listener) => {
                tracing::debug!(address = %target.address(), "listener bound");
                listeners.push(listener);
            }
            Err(source) => {
                tracing::error!(address = %target.address(), error = %source, "failed to bind listener");
                errors.offer(MuxError::Bind {
                    address: target.address().to_string(),
                    source,
                });
                break;
            }
        }
    }
    let bound = listeners.len();

    let mut serving = JoinSet::new();
    let mut serve_index = HashMap::with_capacity(bound);
    if errors.is_empty() {
        for (index, listener) in listeners.into_iter().enumerate() {
            let target = Arc::clone(&targets[index]);
            tracing::info!(
                address = %target.address(),
                protocol = target.protocol(),
                "serving target"
            );
            let task = serving.spawn(async move { target.serve(listener).await });
            serve_index.insert(task.id(), index);
        }

        // Serve completions are polled first so a fault that races with
        // cancellation is still reported.
        tokio::select! {
            biased;
            Some(joined) = serving.join_next_with_id() => {
                tracing::info!("target stopped, shutting down the rest");
                record_serve_exit(&targets, &serve_index, joined, &mut errors);
            }
            () = token.cancelled() => {
                tracing::info!("shutdown requested");
            }
        }
    } else {
        drop(listeners);
    }

    let deadline = Instant::now() + grace_period;
    let hard_deadline = deadline + FORCE_STOP_OVERHEAD;
    tracing::info!(
        targets = bound,
        grace_period_ms = u64::try_from(grace_period.as_millis()).unwrap_or(u64::MAX),
        "stopping targets"
    );

    let mut stopping = JoinSet::new();
    let mut stop_index = HashMap::with_capacity(bound);
    for (index, target) in targets.iter().take(bound).enumerate() {
        let target = Arc::clone(target);
        let task = stopping.spawn(async move { target.shutdown(deadline).await });
        stop_index.insert(task.id(), index);
    }

    loop {
        match tokio::time::timeout_at(hard_deadline, stopping.join_next_with_id()).await {
            Ok(None) => break,
            Ok(Some(joined)) => {
                let (id, result) = flatten(joined);
                let Some(index) = stop_index.remove(&id) else {
                    continue;
                };
                let address = targets[index].address();
                match result {
                    Ok(()) => tracing::debug!(address = %address, "target shut down"),
                    Err(source) => {
                        tracing::warn!(address = %address, error = %source, "target shutdown failed");
                        errors.offer(MuxError::Shutdown {
                            address: address.to_string(),
                            source,
                        });
                    }
                }
            }
            Err(_) => {
                let mut overdue: Vec<usize> = stop_index.values().copied().collect();
                overdue.sort_unstable();
                for index in overdue {
                    let address = targets[index].address();
                    tracing::warn!(address = %address, "target ignored its shutdown deadline, abandoning it");
                    errors.offer(MuxError::Shutdown {
                        address: address.to_string(),
                        source: TargetError::ForcedStop(grace_period),
                    });
                }
                stopping.abort_all();
                break;
            }
        }
    }

    loop {
        match tokio::time::timeout_at(hard_deadline, serving.join_next_with_id()).await {
            Ok(None) => break,
            Ok(Some(joined)) => record_serve_exit(&targets, &serve_index, joined, &mut errors),
            Err(_) => {
                tracing::warn!(remaining = serving.len(), "aborting serve tasks still running");
                serving.shutdown().await;
                break;
            }
        }
    }

    let result = errors.into_result();
    match result {
        Ok(()) => tracing::info!("all targets stopped"),
        Err(ref e) => tracing::error!(error = %e, "mux stopped with error"),
    }
    result
}

fn flatten(joined: TaskOutcome) -> (Id, Result<(), TargetError>) {
    match joined {
        Ok(done) => done,
        Err(e) if e.is_cancelled() => (e.id(), Ok(())),
        Err(e) => (e.id(), Err(TargetError::Panicked(e.to_string()))),
    }
}

fn record_serve_exit(
    targets: &[Arc<dyn Target>],
    serve_index: &HashMap<Id, usize>,
    joined: TaskOutcome,
    errors: &mut ErrorSlot,
) {
    let (id, result) = flatten(joined);
    let Some(&index) = serve_index.get(&id) else {
        return;
    };
    let address = targets[index].address();
    match result {
        Ok(()) => tracing::debug!(address = %address, "target stopped serving"),
        Err(source) => {
            tracing::error!(address = %address, error = %source, "target failed");
            errors.offer(MuxError::Serve {
                address: address.to_string(),
                source,
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn serve_err(address: &str) -> MuxError {
        MuxError::Serve {
            address: address.into(),
            source: TargetError::Serve("boom".into()),
        }
    }

    #[test]
    fn first_error_of_equal_priority_is_kept() {
        let mut slot = ErrorSlot::default();
        slot.offer(serve_err("127.0.0.1:1"));
        slot.offer(serve_err("127.0.0.1:2"));
        let err = slot.into_result().unwrap_err();
        assert_eq!(err.address(), Some("127.0.0.1:1"));
    }

    #[test]
    fn serve_failure_replaces_earlier_shutdown_failure() {
        let mut slot = ErrorSlot::default();
        slot.offer(MuxError::Shutdown {
            address: "127.0.0.1:1".into(),
            source: TargetError::GracefulStopFailed,
        });
        slot.offer(serve_err("127.0.0.1:2"));
        assert!(matches!(
            slot.into_result(),
            Err(MuxError::Serve { ref address, .. }) if address == "127.0.0.1:2"
        ));
    }

    #[test]
    fn empty_slot_is_success() {
        assert!(ErrorSlot::default().into_result().is_ok());
    }
}
