//! Subcommand dispatch and execution.
//!
//! The [`dispatch`] function routes the parsed CLI to the appropriate
//! subcommand handler: [`serve`], [`configs`], or [`validate`]. Each
//! handler lives in its own submodule.

pub mod configs;
pub mod serve;
pub mod validate;

use crate::cli::{Cli, Commands};
use crate::error::ServemuxError;

pub async fn dispatch(cli: Cli) -> Result<(), ServemuxError> {
    match cli.command {
        Some(Commands::Serve(args)) => serve::execute(*args).await,
        Some(Commands::Configs(ref args)) => configs::execute(args).await,
        Some(Commands::Validate(ref args)) => validate::execute(args).await,
        None => {
            print_welcome();
            Ok(())
        }
    }
}

fn print_welcome() {
    let version = env!("CARGO_PKG_VERSION");
    println!(
        "\n  servemux v{version} \u{2014} HTTP and RPC targets, one lifecycle\n\n  \
         No command provided. To get started:\n\n    \
         servemux serve                              Serve HTTP on 0.0.0.0:8090\n    \
         servemux serve --rpc-addr 0.0.0.0:9090      Add a gRPC health target\n    \
         servemux configs                            Print the effective config\n    \
         servemux --help                             See all commands and options\n"
    );
}
