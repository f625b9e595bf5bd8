use std::path::PathBuf;

use clap::Parser;

use crate::config::ClientConfig;
use crate::error::ResearchError;

#[derive(Parser, Debug)]
#[command(name = "research-chat")]
#[command(version)]
#[command(about = "Terminal client for a streaming research-assistant backend")]
pub struct Args {
    /// Ask a single question and exit. Omit for an interactive prompt.
    pub query: Option<String>,

    /// Backend base URL (overrides RESEARCH_BACKEND_URL and the config file)
    #[arg(long)]
    pub backend: Option<String>,

    /// TOML config file with base_url / connect_timeout_ms / request_timeout_ms
    #[arg(long, short)]
    pub config: Option<PathBuf>,

    /// Print reasoning steps as they arrive
    #[arg(long)]
    pub thinking: bool,

    /// Disable colored output
    #[arg(long)]
    pub no_color: bool,

    /// Debug-level logging for this crate
    #[arg(long, short)]
    pub verbose: bool,
}

/// Build the client config: flag, then env, then file, then defaults.
pub fn resolve_config(args: &Args) -> Result<ClientConfig, ResearchError> {
    let config = match &args.config {
        Some(path) => ClientConfig::from_toml_file(path)?,
        None => ClientConfig::default(),
    };
    let config = config.with_env_override();
    Ok(match &args.backend {
        Some(url) if !url.trim().is_empty() => config.with_base_url(url.clone()),
        _ => config,
    })
}

/// Default `EnvFilter` directive when `RUST_LOG` is unset.
pub fn default_log_filter(verbose: bool) -> &'static str {
    if verbose {
        "research_stream=debug"
    } else {
        "research_stream=info"
    }
}
