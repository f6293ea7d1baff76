use std::path::PathBuf;

use clap::Parser;

/// Pod-sharded crawl engine, per spec.md §6.
#[derive(Debug, Parser)]
#[command(name = "podcrawler", version)]
pub struct Cli {
    /// Path to the YAML configuration file.
    #[arg(long, default_value = "config.yaml")]
    pub config: PathBuf,

    /// Path to a seed URL file (one URL per line, `#`-comments allowed).
    #[arg(long)]
    pub seed_file: Option<PathBuf>,

    /// Path to a manual exclusion list (one domain per line).
    #[arg(long)]
    pub exclusions_file: Option<PathBuf>,

    /// Contact email substituted into the `user_agent_template`'s `{email}`
    /// placeholder.
    #[arg(long)]
    pub email: String,

    /// Overrides `max_pages` from the config file.
    #[arg(long)]
    pub max_pages: Option<u64>,

    /// Overrides `max_duration` (seconds) from the config file.
    #[arg(long)]
    pub max_duration: Option<u64>,

    /// Resume from existing pod state instead of clearing it.
    #[arg(long)]
    pub resume: bool,
}
