//! servemux runs several network servers as one unit.
//!
//! An HTTP target (axum) and an RPC target (tonic) are bound, served
//! concurrently and shut down together when the process receives a
//! termination signal, with a bounded grace period and a single aggregated
//! error describing the first fault.
//!
//! # Architecture
//!
//! - [`mux`] -- The multiplexer: the [`Target`](mux::Target) contract, the
//!   HTTP and RPC adapters, configuration options, and the coordinator that
//!   drives bind, serve and graceful shutdown.
//! - [`cli`] -- Command-line argument parsing with clap derive macros.
//! - [`cmd`] -- Subcommand dispatch and execution (serve, configs, validate).
//! - [`config`] -- Defaults, config file and flag/env layering plus validation.
//! - [`error`] -- Unified error types using `thiserror`.
//! - [`health`] -- `GET /health` endpoint handler.
//! - [`logging`] -- Structured tracing setup with JSON and pretty-print output.
//! - [`server`] -- Router construction, shared state, and signal handling.
//!
//! # Feature Flags
//!
//! | Feature | Description |
//! |---------|-------------|
//! | `yaml` | YAML config file support _(enabled by default)_ |
//! | `json` | JSON config file support |

// Binary crate — public functions are internal, not consumed by external users.
#![allow(clippy::missing_errors_doc)]

pub mod cli;
pub mod cmd;
pub mod config;
pub mod error;
pub mod health;
pub mod logging;
pub mod mux;
pub mod server;
