//! # Curation run
//! One pass end to end: history + remote bias → ingest → score → select →
//! enrich → write. Only failing to create the output or state directory
//! aborts; everything else degrades with a warning.
//!
//! One deadline (`http.run_budget_secs`) bounds every network phase of the
//! run. Dry-run touches nothing on disk, directories included.

use std::path::Path;
use std::sync::Arc;

use chrono::{DateTime, SubsecRound, Utc};
use metrics::counter;
use tokio::fs;
use tokio::time::{timeout_at, Instant};

use crate::bias::{estimate_or_cold_start, CommunityContentApiV1, RemoteHistory};
use crate::config::{CuratorConfig, RunOptions};
use crate::enrich::Enricher;
use crate::error::{CurateError, Result};
use crate::fetch::Fetcher;
use crate::history;
use crate::ingest::{build_providers, collect_candidates, ensure_metrics_described, IngestLimits};
use crate::output::{item_file_name, write_item, write_manifest, Manifest, ManifestEntry};
use crate::score::Scorer;
use crate::select::{select, SelectionParams, SelectionStats};

const TOP_BIAS_LOGGED: usize = 8;

#[derive(Debug)]
pub struct RunReport {
    pub manifest: Manifest,
    pub remote_known: usize,
    pub history_known: usize,
    pub candidates: usize,
    pub failed_sources: usize,
    pub selection: SelectionStats,
}

async fn ensure_dir(dir: &Path) -> Result<()> {
    if dir.as_os_str().is_empty() {
        return Ok(());
    }
    fs::create_dir_all(dir).await.map_err(|source| CurateError::Setup {
        path: dir.to_path_buf(),
        source,
    })
}

/// Run with the current time (whole seconds) as the run timestamp.
pub async fn run(
    opts: &RunOptions,
    cfg: &CuratorConfig,
    fetcher: Arc<dyn Fetcher>,
) -> Result<RunReport> {
    run_at(opts, cfg, fetcher, Utc::now().trunc_subsecs(0)).await
}

pub async fn run_at(
    opts: &RunOptions,
    cfg: &CuratorConfig,
    fetcher: Arc<dyn Fetcher>,
    now: DateTime<Utc>,
) -> Result<RunReport> {
    ensure_metrics_described();
    let deadline = Instant::now() + cfg.http.run_budget();

    if !opts.dry_run {
        ensure_dir(&opts.output_dir).await?;
        if let Some(parent) = opts.state_file.parent() {
            ensure_dir(parent).await?;
        }
    }

    let mut state = history::load(&opts.state_file).await;
    let known_local = state.known_urls();

    let api = CommunityContentApiV1::new(&opts.api_base, fetcher.as_ref());
    let remote = match timeout_at(deadline, estimate_or_cold_start(&api, cfg)).await {
        Ok(remote) => remote,
        Err(_) => {
            tracing::warn!(
                budget_secs = cfg.http.run_budget().as_secs(),
                "existing remote content not read within the run budget; continuing in cold-start mode"
            );
            RemoteHistory::default()
        }
    };
    tracing::info!(
        remote_known = remote.existing_urls.len(),
        history_known = known_local.len(),
        pages = remote.pages_read,
        "existing content loaded"
    );
    if remote.tag_bias.is_empty() {
        tracing::info!("historical tag bias: none (cold start)");
    } else {
        let top = remote
            .top_bias(TOP_BIAS_LOGGED)
            .iter()
            .map(|(tag, b)| format!("{tag}={b:+.2}"))
            .collect::<Vec<_>>()
            .join(", ");
        tracing::info!(bias = %top, "historical tag bias");
    }

    let providers = build_providers(cfg, opts.max_per_source);
    let limits = IngestLimits {
        run_budget: deadline.saturating_duration_since(Instant::now()),
        ..IngestLimits::from(&cfg.http)
    };
    let ingest = collect_candidates(providers, fetcher.clone(), limits).await;
    let candidates = ingest.candidates.len();
    let failed_sources = ingest.failed_sources();
    tracing::info!(
        count = candidates,
        failed_sources,
        "ingest finished"
    );

    let scorer = Scorer::new(cfg, &remote.tag_bias, now);
    let scored = scorer.score_all(ingest.candidates);
    let params = SelectionParams {
        limit: opts.effective_limit(),
        min_score: opts.min_score,
    };
    let (selected, stats) = select(scored, &known_local, &remote.existing_urls, params, cfg);
    tracing::info!(
        selected = selected.len(),
        known = stats.known,
        below_min = stats.below_min,
        noise = stats.noise,
        duplicates = stats.duplicates,
        "selection done"
    );

    let enricher = Enricher::new(cfg, fetcher.as_ref(), now).with_deadline(deadline);
    let mut manifest = Manifest::new(opts, now);
    for sc in &selected {
        let item = enricher.enrich(sc).await;
        let file = item_file_name(&item, now);
        if !opts.dry_run {
            if let Err(e) = write_item(&opts.output_dir, &file, &item).await {
                tracing::warn!(error = %e, "item not written; skipping");
                continue;
            }
        }
        manifest.selected.push(ManifestEntry::new(&item, sc.score, file));
    }
    counter!("curator_selected_total").increment(manifest.selected.len() as u64);

    if !opts.dry_run {
        if let Err(e) = write_manifest(&opts.output_dir, &manifest).await {
            tracing::warn!(error = %e, "manifest not written");
        }
        state.merge(&manifest.selected, now, cfg.history_cap);
        if let Err(e) = history::save(&opts.state_file, &state).await {
            tracing::warn!(error = %e, "history not saved");
        }
    }

    for entry in &manifest.selected {
        tracing::info!(
            score = entry.score,
            source = %entry.source,
            media_type = entry.media_type.as_str(),
            "{}",
            entry.title
        );
    }
    if manifest.selected.is_empty() {
        tracing::info!("No new items passed filters; nothing generated.");
    } else {
        tracing::info!(
            count = manifest.selected.len(),
            output_dir = %opts.output_dir.display(),
            dry_run = opts.dry_run,
            "curation complete"
        );
    }

    Ok(RunReport {
        remote_known: remote.existing_urls.len(),
        history_known: known_local.len(),
        candidates,
        failed_sources,
        selection: stats,
        manifest,
    })
}
