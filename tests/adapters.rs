//! Integration tests for the HTTP (axum) and RPC (tonic) targets over loopback.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::routing::get;
use servemux::error::TargetError;
use servemux::health::{HealthResponse, TargetHealth};
use servemux::mux::{self, with_grace_period, with_http_target, with_rpc_target, with_target};
use servemux::mux::{HttpTarget, RpcTarget, Target};
use servemux::server::{self, AppState};
use tokio::net::TcpListener;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tonic::transport::{Channel, Endpoint};
use tonic_health::pb::health_check_response::ServingStatus;
use tonic_health::pb::health_client::HealthClient;
use tonic_health::pb::HealthCheckRequest;

fn free_addr() -> String {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    listener.local_addr().unwrap().to_string()
}

fn health_router(targets: Vec<TargetHealth>) -> axum::Router {
    let state = Arc::new(AppState::new(targets));
    server::build_router(state, Duration::from_secs(5), 1_048_576)
}

fn in_ms(ms: u64) -> Instant {
    Instant::now() + Duration::from_millis(ms)
}

async fn wait_until_listening(addr: &str) {
    for _ in 0..100 {
        if tokio::net::TcpStream::connect(addr).await.is_ok() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    panic!("{addr} never started listening");
}

async fn health_client(addr: impl std::fmt::Display) -> HealthClient<Channel> {
    let channel = Endpoint::from_shared(format!("http://{addr}"))
        .unwrap()
        .connect()
        .await
        .unwrap();
    HealthClient::new(channel)
}

/// Delegates to a real adapter and counts the calls the mux makes.
struct Counting {
    inner: Arc<dyn Target>,
    serves: AtomicUsize,
    shutdowns: AtomicUsize,
}

impl Counting {
    fn wrap(inner: impl Target + 'static) -> Arc<Self> {
        Arc::new(Self {
            inner: Arc::new(inner),
            serves: AtomicUsize::new(0),
            shutdowns: AtomicUsize::new(0),
        })
    }
}

#[async_trait]
impl Target for Counting {
    fn address(&self) -> &str {
        self.inner.address()
    }

    fn protocol(&self) -> &'static str {
        self.inner.protocol()
    }

    async fn serve(&self, listener: TcpListener) -> Result<(), TargetError> {
        self.serves.fetch_add(1, Ordering::SeqCst);
        self.inner.serve(listener).await
    }

    async fn shutdown(&self, deadline: Instant) -> Result<(), TargetError> {
        self.shutdowns.fetch_add(1, Ordering::SeqCst);
        self.inner.shutdown(deadline).await
    }
}

async fn spawn_target(
    target: Arc<dyn Target>,
) -> (SocketAddr, tokio::task::JoinHandle<Result<(), TargetError>>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let serving = tokio::spawn(async move { target.serve(listener).await });
    (addr, serving)
}

#[tokio::test]
async fn http_and_rpc_targets_stop_cleanly_on_cancel() {
    let http_addr = free_addr();
    let rpc_addr = free_addr();
    let (_reporter, rpc_router) = server::build_rpc_router().await;

    let token = CancellationToken::new();
    let cancel = token.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        cancel.cancel();
    });

    let http = Counting::wrap(HttpTarget::new(http_addr.clone(), health_router(Vec::new())));
    let rpc = Counting::wrap(RpcTarget::new(rpc_addr.clone(), rpc_router));

    let started = Instant::now();
    let result = mux::serve(
        token,
        [
            with_target(http.clone()),
            with_target(rpc.clone()),
            with_grace_period(Duration::from_secs(2)),
        ],
    )
    .await;

    assert!(result.is_ok(), "unexpected error: {result:?}");
    assert!(started.elapsed() < Duration::from_secs(2));
    for target in [&http, &rpc] {
        assert_eq!(target.serves.load(Ordering::SeqCst), 1);
        assert_eq!(target.shutdowns.load(Ordering::SeqCst), 1);
    }

    // Both listeners were closed, so the addresses can be bound again.
    assert!(TcpListener::bind(&http_addr).await.is_ok());
    assert!(TcpListener::bind(&rpc_addr).await.is_ok());
}

#[tokio::test]
async fn mux_serves_http_and_rpc_traffic() {
    let http_addr = free_addr();
    let rpc_addr = free_addr();
    let targets = vec![
        TargetHealth {
            protocol: "http".into(),
            address: http_addr.clone(),
        },
        TargetHealth {
            protocol: "rpc".into(),
            address: rpc_addr.clone(),
        },
    ];
    let (_reporter, rpc_router) = server::build_rpc_router().await;

    let token = CancellationToken::new();
    let run = tokio::spawn(mux::serve(
        token.clone(),
        [
            with_http_target(http_addr.clone(), health_router(targets.clone())),
            with_rpc_target(rpc_addr.clone(), rpc_router),
        ],
    ));

    wait_until_listening(&http_addr).await;
    wait_until_listening(&rpc_addr).await;

    let health: HealthResponse = reqwest::get(format!("http://{http_addr}/health"))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(health.status, "healthy");
    assert_eq!(health.targets, targets);

    let mut client = health_client(&rpc_addr).await;
    let status = client
        .check(HealthCheckRequest {
            service: String::new(),
        })
        .await
        .unwrap()
        .into_inner()
        .status;
    assert_eq!(status, ServingStatus::Serving as i32);
    drop(client);

    token.cancel();
    let result = run.await.unwrap();
    assert!(result.is_ok(), "unexpected error: {result:?}");
}

#[tokio::test]
async fn http_shutdown_is_idempotent() {
    let target = Arc::new(HttpTarget::new("127.0.0.1:0", health_router(Vec::new())));
    let (addr, serving) = spawn_target(target.clone()).await;
    wait_until_listening(&addr.to_string()).await;

    assert!(target.shutdown(in_ms(1_000)).await.is_ok());
    assert!(serving.await.unwrap().is_ok());
    assert!(target.shutdown(in_ms(1_000)).await.is_ok());
}

#[tokio::test]
async fn rpc_shutdown_is_idempotent() {
    let (_reporter, router) = server::build_rpc_router().await;
    let target = Arc::new(RpcTarget::new("127.0.0.1:0", router));
    let (addr, serving) = spawn_target(target.clone()).await;
    wait_until_listening(&addr.to_string()).await;

    assert!(target.shutdown(in_ms(1_000)).await.is_ok());
    assert!(serving.await.unwrap().is_ok());
    assert!(target.shutdown(in_ms(1_000)).await.is_ok());
}

#[tokio::test]
async fn shutdown_before_serve_is_a_no_op() {
    let target = Arc::new(HttpTarget::new("127.0.0.1:0", axum::Router::new()));
    assert!(target.shutdown(in_ms(100)).await.is_ok());

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    assert!(target.serve(listener).await.is_ok());
}

#[tokio::test]
async fn rpc_target_cannot_be_served_twice() {
    let (_reporter, router) = server::build_rpc_router().await;
    let target = Arc::new(RpcTarget::new("127.0.0.1:0", router));
    let (_addr, serving) = spawn_target(target.clone()).await;
    target.shutdown(in_ms(1_000)).await.unwrap();
    serving.await.unwrap().unwrap();

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let second = target.serve(listener).await;
    assert!(matches!(second, Err(TargetError::AlreadyServed)));
}

#[tokio::test]
async fn http_drain_past_deadline_drops_in_flight_requests() {
    let router = axum::Router::new().route(
        "/slow",
        get(|| async {
            tokio::time::sleep(Duration::from_secs(30)).await;
            "done"
        }),
    );
    let target = Arc::new(HttpTarget::new("127.0.0.1:0", router));
    let (addr, serving) = spawn_target(target.clone()).await;
    wait_until_listening(&addr.to_string()).await;

    let in_flight = tokio::spawn(reqwest::get(format!("http://{addr}/slow")));
    tokio::time::sleep(Duration::from_millis(100)).await;

    let started = Instant::now();
    let err = target.shutdown(in_ms(200)).await.unwrap_err();
    assert!(matches!(err, TargetError::DrainTimeout(_)), "got {err:?}");
    assert!(err.is_forced_stop());
    assert!(started.elapsed() < Duration::from_secs(2));

    // The forced stop counts as an intentional stop for serve.
    assert!(serving.await.unwrap().is_ok());
    assert!(in_flight.await.unwrap().is_err());
}

#[tokio::test]
async fn rpc_graceful_stop_failure_forces_active_calls_closed() {
    let (_reporter, router) = server::build_rpc_router().await;
    let target = Arc::new(RpcTarget::new("127.0.0.1:0", router));
    let (addr, serving) = spawn_target(target.clone()).await;
    wait_until_listening(&addr.to_string()).await;

    // A health watch stream stays open until the server goes away.
    let mut client = health_client(addr).await;
    let mut stream = client
        .watch(HealthCheckRequest {
            service: String::new(),
        })
        .await
        .unwrap()
        .into_inner();
    assert!(stream.message().await.unwrap().is_some());

    let started = Instant::now();
    let err = target.shutdown(in_ms(200)).await.unwrap_err();
    assert!(matches!(err, TargetError::GracefulStopFailed), "got {err:?}");
    assert_eq!(err.to_string(), "graceful stop failed");
    assert!(started.elapsed() < Duration::from_secs(2));

    assert!(serving.await.unwrap().is_ok());

    // Updates buffered before the stop may still arrive; the stream must
    // fail soon after.
    let severed = tokio::time::timeout(Duration::from_secs(2), async {
        loop {
            match stream.message().await {
                Ok(Some(_)) => continue,
                Ok(None) => return false,
                Err(_) => return true,
            }
        }
    })
    .await;
    assert!(matches!(severed, Ok(true)), "watch stream was not severed");
}
