mod cli;
mod logging;
mod orchestrator;
mod seeds;

use anyhow::Result;
use clap::Parser;
use podcrawler_core::config::AppConfig;
use tracing::info;

#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

use crate::cli::Cli;
use crate::orchestrator::Orchestrator;

fn main() -> Result<()> {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;
    runtime.block_on(async_main())
}

async fn async_main() -> Result<()> {
    let cli = Cli::parse();

    let config_str = std::fs::read_to_string(&cli.config)?;
    let config: AppConfig = serde_yaml::from_str(&config_str)?;

    let _log_guard = logging::init(&config.log_dir)?;

    let config = apply_cli_overrides(config, &cli);
    let user_agent = config
        .user_agent(&cli.email)
        .map_err(|e| anyhow::anyhow!(e))?;

    let seed_urls = match &cli.seed_file {
        Some(path) => seeds::load_seed_file(path)?,
        None => Vec::new(),
    };
    info!(count = seed_urls.len(), "loaded seed URLs");

    let orchestrator = Orchestrator::new(config);
    orchestrator
        .run(seed_urls, cli.exclusions_file.as_deref(), user_agent)
        .await
}

fn apply_cli_overrides(mut config: AppConfig, cli: &Cli) -> AppConfig {
    if cli.max_pages.is_some() {
        config.max_pages = cli.max_pages;
    }
    if cli.max_duration.is_some() {
        config.max_duration = cli.max_duration;
    }
    if cli.resume {
        config.resume = true;
    }
    config
}
