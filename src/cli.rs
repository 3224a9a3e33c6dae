//! Command-line interface definitions using clap derive macros.
//!
//! Contains the top-level [`Cli`] parser, the [`Commands`] enum for
//! subcommands (serve, configs, validate), and their associated argument
//! structs. Every config flag has an environment variable equivalent for
//! container deployments.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};
use tracing_subscriber::filter::LevelFilter;

pub const LONG_VERSION: &str = concat!(
    env!("CARGO_PKG_VERSION"),
    "\ncommit: ",
    env!("SERVEMUX_GIT_SHORT"),
    "\nbuild date: ",
    env!("SERVEMUX_BUILD_TIME")
);

#[derive(Parser)]
#[command(
    name = "servemux",
    version,
    long_version = LONG_VERSION,
    about = "Serve HTTP and RPC targets side by side with coordinated graceful shutdown",
    propagate_version = true,
    after_help = "\x1b[1mQuick start:\x1b[0m\n  \
        servemux serve                              HTTP on 0.0.0.0:8090\n  \
        servemux serve --rpc-addr 0.0.0.0:9090      Add a gRPC health target\n  \
        servemux configs -f yaml                    Show the effective config"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start all configured targets
    #[command(visible_aliases = ["server", "start", "run"])]
    Serve(Box<ServeArgs>),

    /// Show the currently loaded configuration
    Configs(ConfigsArgs),

    /// Validate the configuration without starting
    Validate(ConfigArgs),
}

/// Configuration sources shared by every subcommand.
#[derive(Args, Debug, Clone, Default)]
pub struct ConfigArgs {
    /// Config file path (.yaml, .json)
    #[arg(short, long, env = "CONFIG_FILE")]
    pub config: Option<PathBuf>,

    /// HTTP target listen address
    #[arg(long, env = "HTTP_ADDR")]
    pub http_addr: Option<String>,

    /// RPC target listen address (empty disables the RPC target)
    #[arg(long, env = "RPC_ADDR")]
    pub rpc_addr: Option<String>,

    /// Graceful shutdown deadline in milliseconds (0 selects the default)
    #[arg(long, env = "GRACE_PERIOD_MS", help_heading = "Tuning")]
    pub grace_period_ms: Option<u64>,

    /// Per-request HTTP timeout in milliseconds
    #[arg(long, env = "HTTP_REQUEST_TIMEOUT_MS", help_heading = "Tuning")]
    pub http_request_timeout_ms: Option<u64>,

    /// Max request body size in bytes
    #[arg(long, env = "MAX_BODY", help_heading = "Tuning")]
    pub max_body: Option<usize>,
}

#[derive(Args)]
#[command(after_help = "\x1b[1mExamples:\x1b[0m\n  \
        servemux serve                                     Defaults\n  \
        servemux serve -c servemux.yaml                    Config file\n  \
        servemux serve --rpc-addr 127.0.0.1:9090 --pretty  Local dev mode")]
pub struct ServeArgs {
    #[command(flatten)]
    pub config: ConfigArgs,

    // -- Logging --
    /// Log level
    #[arg(short, long, env = "LOG_LEVEL", default_value = "info")]
    pub log_level: LogLevel,

    /// Force pretty (human-readable) log output
    #[arg(long)]
    pub pretty: bool,

    /// Force JSON log output (overrides TTY detection)
    #[arg(long, conflicts_with = "pretty")]
    pub json: bool,
}

#[derive(Args)]
pub struct ConfigsArgs {
    #[command(flatten)]
    pub config: ConfigArgs,

    /// Output format
    #[arg(short, long, default_value = "json")]
    pub format: ConfigFormat,
}

#[derive(Clone, Debug, ValueEnum)]
pub enum LogLevel {
    Off,
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl LogLevel {
    #[must_use]
    pub const fn to_level_filter(&self) -> LevelFilter {
        match self {
            Self::Off => LevelFilter::OFF,
            Self::Trace => LevelFilter::TRACE,
            Self::Debug => LevelFilter::DEBUG,
            Self::Info => LevelFilter::INFO,
            Self::Warn => LevelFilter::WARN,
            Self::Error => LevelFilter::ERROR,
        }
    }
}

#[derive(Clone, Debug, ValueEnum)]
pub enum ConfigFormat {
    Json,
    #[cfg(feature = "yaml")]
    Yaml,
    Env,
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn run_is_an_alias_for_serve() {
        let cli = Cli::try_parse_from(["servemux", "run", "--http-addr", "127.0.0.1:8000"]).unwrap();
        match cli.command {
            Some(Commands::Serve(args)) => {
                assert_eq!(args.config.http_addr.as_deref(), Some("127.0.0.1:8000"));
                assert!(args.config.rpc_addr.is_none());
            }
            _ => panic!("expected serve"),
        }
    }

    #[test]
    fn pretty_and_json_conflict() {
        assert!(Cli::try_parse_from(["servemux", "serve", "--pretty", "--json"]).is_err());
    }
}
