//! community-curator: binary entrypoint.
//! Parses CLI options, loads configuration and runs one curation pass.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use community_curator::{pipeline, CuratorConfig, HttpFetcher, RunOptions};

#[derive(Debug, Parser)]
#[command(
    name = "community-curator",
    version,
    about = "Curate new community content from feeds and trending stories"
)]
struct Args {
    /// Directory that receives one record per item plus manifest.json.
    #[arg(long)]
    output_dir: PathBuf,

    #[arg(long, default_value = "state/history.json")]
    state_file: PathBuf,

    #[arg(long, default_value = "https://homedir.opensourcesantiago.io")]
    api_base: String,

    #[arg(long, default_value_t = 15)]
    limit: usize,

    #[arg(long, default_value_t = 12)]
    max_per_source: usize,

    #[arg(long, default_value_t = 2.0)]
    min_score: f64,

    /// Compute the selection without writing anything.
    #[arg(long)]
    dry_run: bool,

    /// TOML override for taxonomy and tables (also CURATOR_CONFIG_PATH).
    #[arg(long)]
    config: Option<PathBuf>,
}

impl Args {
    fn run_options(&self) -> RunOptions {
        RunOptions {
            output_dir: self.output_dir.clone(),
            state_file: self.state_file.clone(),
            api_base: self.api_base.clone(),
            limit: self.limit,
            max_per_source: self.max_per_source,
            min_score: self.min_score,
            dry_run: self.dry_run,
        }
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("community_curator=info,warn"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().compact())
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env in local/dev; no-op when absent.
    let _ = dotenvy::dotenv();
    init_tracing();

    let args = Args::parse();
    let cfg = match CuratorConfig::load(args.config.as_deref()) {
        Ok(cfg) => cfg,
        Err(e) => {
            tracing::warn!(error = %format!("{e:#}"), "config override unusable; using built-in tables");
            CuratorConfig::default_seed()
        }
    };

    let fetcher = HttpFetcher::new(&cfg.http).context("building http client")?;
    let report = pipeline::run(&args.run_options(), &cfg, Arc::new(fetcher))
        .await
        .context("curation run aborted")?;

    tracing::debug!(
        candidates = report.candidates,
        failed_sources = report.failed_sources,
        selected = report.manifest.selected.len(),
        "run report"
    );
    Ok(())
}
