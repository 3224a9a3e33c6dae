//! `servemux configs` — print the effective configuration.
//!
//! Resolves defaults, config file and flag/env overrides exactly as
//! `serve` would and prints the result as JSON, YAML or `KEY="value"`
//! environment lines.

use crate::cli::{ConfigFormat, ConfigsArgs};
use crate::config::{self, AppConfig};
use crate::error::ServemuxError;

pub async fn execute(args: &ConfigsArgs) -> Result<(), ServemuxError> {
    let config = config::load(&args.config).await?;
    println!("{}", render(&config, &args.format)?);
    Ok(())
}

pub fn render(config: &AppConfig, format: &ConfigFormat) -> Result<String, ServemuxError> {
    match format {
        ConfigFormat::Json => serde_json::to_string_pretty(config)
            .map_err(|e| ServemuxError::ConfigEncode { source: Box::new(e) }),

        #[cfg(feature = "yaml")]
        ConfigFormat::Yaml => serde_yml::to_string(config)
            .map(|s| s.trim_end().to_string())
            .map_err(|e| ServemuxError::ConfigEncode { source: Box::new(e) }),

        ConfigFormat::Env => render_env(config),
    }
}

fn render_env(config: &AppConfig) -> Result<String, ServemuxError> {
    let value = serde_json::to_value(config)
        .map_err(|e| ServemuxError::ConfigEncode { source: Box::new(e) })?;

    let mut lines: Vec<String> = value
        .as_object()
        .into_iter()
        .flatten()
        .filter(|(_, v)| !v.is_null())
        .map(|(k, v)| {
            let v = v.as_str().map_or_else(|| v.to_string(), str::to_string);
            format!("{}=\"{v}\"", k.to_uppercase())
        })
        .collect();
    lines.sort();
    Ok(lines.join("\n"))
}
