//! `servemux validate` — check the configuration without starting.

use crate::cli::ConfigArgs;
use crate::config::{self, validation};
use crate::error::ServemuxError;

pub async fn execute(args: &ConfigArgs) -> Result<(), ServemuxError> {
    let config = config::load(args).await?;
    println!("\u{2713} {}", validation::format_summary(&config));
    Ok(())
}
