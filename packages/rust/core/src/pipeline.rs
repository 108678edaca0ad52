//! End-to-end enrichment run: CSV records → filter → geocode → JSON sink.

use std::path::PathBuf;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::watch;
use tracing::{info, instrument};

use geofill_geocode::{GeocodeClient, RateLimiter};
use geofill_records::CsvRecordSource;
use geofill_shared::{EnrichmentConfig, GeofillError, Result, RunId};
use geofill_store::{CoordinateSink, JsonFileSink, ResultStore};

use crate::engine::{EngineOptions, Enricher, ProgressReporter, RunReport};

/// Configuration for one enrichment run.
#[derive(Debug, Clone)]
pub struct RunOptions {
    /// CSV file of license records to read.
    pub input: PathBuf,
    /// JSON results file to write, and to resume from.
    pub output: PathBuf,
    /// Seed the store from an existing output file before reading records.
    pub resume: bool,
    /// Provider API key, already resolved from the environment.
    pub api_key: String,
    /// Merged runtime configuration.
    pub config: EnrichmentConfig,
}

/// Result of one enrichment run.
#[derive(Debug)]
pub struct RunOutcome {
    /// Identifier for this run.
    pub run_id: RunId,
    /// Engine counters.
    pub report: RunReport,
    /// Path the results were written to.
    pub output: PathBuf,
    /// Entries seeded from a previous results file.
    pub resumed: usize,
    /// When the run started.
    pub started_at: DateTime<Utc>,
    /// When the run finished.
    pub finished_at: DateTime<Utc>,
}

/// Run the full enrichment pipeline.
///
/// 1. Build the geocode client and rate limiter (fails fast on bad config)
/// 2. Seed the store from the output file when resuming
/// 3. Stream records through the enrichment engine
///
/// The engine flushes the store incrementally and once more on the way out,
/// so the output file is durable even for interrupted or aborted runs.
#[instrument(skip_all, fields(input = %options.input.display(), output = %options.output.display()))]
pub async fn run(
    options: &RunOptions,
    progress: &dyn ProgressReporter,
    shutdown: watch::Receiver<bool>,
) -> Result<RunOutcome> {
    let started_at = Utc::now();
    let run_id = RunId::new();

    info!(%run_id, "starting enrichment run");

    // --- Phase 1: Provider client and limiter ---
    progress.phase("Preparing geocoding client");
    let client = GeocodeClient::new(
        &options.config.endpoint,
        options.api_key.clone(),
        Duration::from_secs(options.config.timeout_secs),
    )?;
    let limiter = RateLimiter::new(
        options.config.max_calls,
        Duration::from_millis(options.config.window_ms),
    )?;

    // --- Phase 2: Result store and sink ---
    if let Some(parent) = options.output.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent).map_err(|e| GeofillError::io(parent, e))?;
        }
    }
    let sink = JsonFileSink::new(&options.output);

    let (mut store, resumed) = if options.resume {
        progress.phase("Loading previous results");
        let prior = sink.load()?;
        let count = prior.len();
        (ResultStore::seeded(prior), count)
    } else {
        (ResultStore::new(), 0)
    };

    // --- Phase 3: Stream records through the engine ---
    progress.phase("Enriching records");
    let source = CsvRecordSource::open(&options.input)?;

    let engine_options = EngineOptions {
        progress_every: options.config.progress_every,
        flush_every: options.config.flush_every,
        on_network_error: options.config.on_network_error,
        retry_backoff: Duration::from_millis(options.config.backoff_ms),
    };
    let enricher = Enricher::new(client, limiter, engine_options);

    let report = enricher
        .run(source.into_records(), &mut store, &sink, progress, shutdown)
        .await?;

    let outcome = RunOutcome {
        run_id,
        report,
        output: options.output.clone(),
        resumed,
        started_at,
        finished_at: Utc::now(),
    };

    info!(
        run_id = %outcome.run_id,
        records = outcome.report.records_seen,
        found = outcome.report.found,
        resumed = outcome.resumed,
        interrupted = outcome.report.interrupted,
        elapsed_ms = outcome.report.elapsed.as_millis(),
        "enrichment run complete"
    );

    Ok(outcome)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
