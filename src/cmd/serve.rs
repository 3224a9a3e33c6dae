//! `servemux serve` — run every configured target until a signal arrives.
//!
//! Loads configuration, builds the HTTP router and (optionally) the RPC
//! health service, and hands both to the mux. Ctrl+C / SIGTERM cancel the
//! run's token, which triggers the coordinated graceful shutdown.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::cli::ServeArgs;
use crate::config;
use crate::error::ServemuxError;
use crate::health::TargetHealth;
use crate::logging;
use crate::mux;
use crate::server::{self, AppState};

pub async fn execute(args: ServeArgs) -> Result<(), ServemuxError> {
    let log_format = logging::resolve_format(args.pretty, args.json);
    logging::init(&args.log_level, log_format);

    let config = config::load(&args.config).await?;

    let mut targets = vec![TargetHealth {
        protocol: "http".into(),
        address: config.http_addr.clone(),
    }];
    if let Some(ref rpc_addr) = config.rpc_addr {
        targets.push(TargetHealth {
            protocol: "rpc".into(),
            address: rpc_addr.clone(),
        });
    }

    let state = Arc::new(AppState::new(targets));
    let router = server::build_router(state, config.http_request_timeout(), config.max_body);

    let token = CancellationToken::new();
    let mut options = vec![
        mux::with_http_target(config.http_addr.clone(), router),
        mux::with_grace_period(config.grace_period()),
    ];
    if let Some(ref rpc_addr) = config.rpc_addr {
        let (reporter, rpc_router) = server::build_rpc_router().await;
        tokio::spawn(server::report_not_serving_on_cancel(reporter, token.clone()));
        options.push(mux::with_rpc_target(rpc_addr.clone(), rpc_router));
    }

    let signal_token = token.clone();
    let signal_task = tokio::spawn(async move {
        server::shutdown_signal().await;
        signal_token.cancel();
    });

    tracing::info!(
        http_addr = %config.http_addr,
        rpc_addr = config.rpc_addr.as_deref().unwrap_or("disabled"),
        grace_period_ms = config.grace_period_ms,
        "starting servemux"
    );

    let result = mux::serve(token.clone(), options).await;

    signal_task.abort();
    // Releases the health reporter task when the run ended on its own.
    token.cancel();

    result?;
    tracing::info!("servemux stopped");
    Ok(())
}
