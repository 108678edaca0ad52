//! Single-pass enrichment loop over a license record stream.
//!
//! Records flow through filter, dedup, rate limiter, and geocoder, and every
//! lookup outcome lands in the result store. A lookup is skipped when the
//! record already carries a location or when its key was resolved earlier in
//! the pass (including entries seeded from a previous run).

use std::time::{Duration, Instant};

use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use geofill_geocode::{Geocoder, RateLimit};
use geofill_records::{LicenseRecord, address_key, needs_enrichment};
use geofill_shared::{AddressKey, GeofillError, NetworkErrorPolicy, Resolution, Result};
use geofill_store::{CoordinateSink, ResultStore};

// ---------------------------------------------------------------------------
// Options and report
// ---------------------------------------------------------------------------

/// Tuning knobs for a single enrichment pass.
#[derive(Debug, Clone)]
pub struct EngineOptions {
    /// Emit a progress observation every this many records seen.
    pub progress_every: usize,
    /// Flush the store after this many newly recorded entries.
    pub flush_every: usize,
    /// What to do when a lookup fails at the transport level.
    pub on_network_error: NetworkErrorPolicy,
    /// Pause before the single retry under the retry policy.
    pub retry_backoff: Duration,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            progress_every: 100,
            flush_every: 50,
            on_network_error: NetworkErrorPolicy::Retry,
            retry_backoff: Duration::from_millis(500),
        }
    }
}

/// Counters for one enrichment pass.
#[derive(Debug, Clone, Default)]
pub struct RunReport {
    /// Rows read from the source, parseable or not.
    pub records_seen: usize,
    /// Rows the reader could not parse.
    pub malformed: usize,
    /// Records skipped because their location was already set.
    pub already_located: usize,
    /// Records skipped because their key was resolved earlier.
    pub duplicates: usize,
    /// Lookups dispatched to the provider (retries not counted).
    pub lookups: usize,
    /// Lookups that produced a coordinate.
    pub found: usize,
    /// Lookups the provider answered with zero results.
    pub no_match: usize,
    /// Lookups the provider refused or answered unusably.
    pub provider_errors: usize,
    /// Lookups recorded unresolved after transport failures.
    pub network_failures: usize,
    /// Retry attempts made under the retry policy.
    pub retries: usize,
    /// Wall-clock duration of the pass.
    pub elapsed: Duration,
    /// True when a shutdown signal stopped the pass early.
    pub interrupted: bool,
}

// ---------------------------------------------------------------------------
// Progress reporting
// ---------------------------------------------------------------------------

/// Progress callback for reporting run status.
pub trait ProgressReporter: Send + Sync {
    /// Called when entering a new phase.
    fn phase(&self, name: &str);
    /// Called at the progress interval and after each performed lookup.
    fn records_processed(&self, seen: usize, resolved: usize);
    /// Called when the pass completes.
    fn done(&self, report: &RunReport);
}

/// No-op progress reporter for headless/test usage.
pub struct SilentProgress;

impl ProgressReporter for SilentProgress {
    fn phase(&self, _name: &str) {}
    fn records_processed(&self, _seen: usize, _resolved: usize) {}
    fn done(&self, _report: &RunReport) {}
}

// ---------------------------------------------------------------------------
// Enricher
// ---------------------------------------------------------------------------

/// The enrichment loop, generic over geocoder and limiter so tests can
/// substitute scripted fakes.
pub struct Enricher<G, L> {
    geocoder: G,
    limiter: L,
    options: EngineOptions,
}

impl<G: Geocoder, L: RateLimit> Enricher<G, L> {
    pub fn new(geocoder: G, limiter: L, options: EngineOptions) -> Self {
        Self {
            geocoder,
            limiter,
            options,
        }
    }

    /// Stream records through the filter and geocoder, recording every
    /// outcome in the store.
    ///
    /// The store is flushed incrementally, once more before returning, and
    /// before surfacing an abort, so partial results always reach the sink.
    /// A shutdown signal stops dispatch at the next record boundary; the
    /// lookup in flight is allowed to finish.
    pub async fn run(
        &self,
        records: impl IntoIterator<Item = Result<LicenseRecord>>,
        store: &mut ResultStore,
        sink: &dyn CoordinateSink,
        progress: &dyn ProgressReporter,
        mut shutdown: watch::Receiver<bool>,
    ) -> Result<RunReport> {
        let start = Instant::now();
        let progress_every = self.options.progress_every.max(1);
        let flush_every = self.options.flush_every.max(1);
        let mut report = RunReport::default();

        for row in records {
            if *shutdown.borrow() {
                report.interrupted = true;
                break;
            }

            report.records_seen += 1;
            if report.records_seen % progress_every == 0 {
                progress.records_processed(report.records_seen, store.len());
            }

            let record = match row {
                Ok(record) => record,
                Err(e) => {
                    report.malformed += 1;
                    debug!(error = %e, "skipping unparseable row");
                    continue;
                }
            };

            if !needs_enrichment(&record) {
                report.already_located += 1;
                continue;
            }

            let key = address_key(&record);
            if store.contains(&key) {
                report.duplicates += 1;
                continue;
            }

            if !self.slot_or_shutdown(&mut shutdown).await {
                report.interrupted = true;
                break;
            }

            report.lookups += 1;
            let resolution = match self.resolve(&key, &mut report).await {
                Ok(resolution) => resolution,
                Err(e) => {
                    error!(key = %key, error = %e, "aborting pass, flushing partial results");
                    if let Err(flush_err) = store.flush(sink) {
                        warn!(error = %flush_err, "flush during abort failed");
                    }
                    return Err(e);
                }
            };
            store.put(key, resolution);
            progress.records_processed(report.records_seen, store.len());

            if store.pending_writes() >= flush_every {
                store.flush(sink)?;
            }
        }

        store.flush(sink)?;
        report.elapsed = start.elapsed();

        info!(
            records = report.records_seen,
            malformed = report.malformed,
            already_located = report.already_located,
            duplicates = report.duplicates,
            lookups = report.lookups,
            found = report.found,
            no_match = report.no_match,
            provider_errors = report.provider_errors,
            network_failures = report.network_failures,
            interrupted = report.interrupted,
            elapsed_ms = report.elapsed.as_millis(),
            "enrichment pass complete"
        );

        progress.done(&report);
        Ok(report)
    }

    /// Wait for a rate-limit slot unless shutdown is signaled first.
    /// Returns false when the pass should stop instead of dispatching.
    async fn slot_or_shutdown(&self, shutdown: &mut watch::Receiver<bool>) -> bool {
        loop {
            if *shutdown.borrow() {
                return false;
            }
            tokio::select! {
                _ = self.limiter.acquire() => return true,
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        // Sender gone, so no signal can ever arrive.
                        self.limiter.acquire().await;
                        return true;
                    }
                }
            }
        }
    }

    /// One lookup with the transport failure policy applied.
    ///
    /// Under the retry policy a transport error gets a single backed-off
    /// retry (through the limiter, since a retry is still a call), and a
    /// second failure records an unresolved entry so the pass continues.
    /// Under the abort policy the first transport error is surfaced.
    async fn resolve(&self, key: &AddressKey, report: &mut RunReport) -> Result<Resolution> {
        let resolution = match self.geocoder.lookup(key).await {
            Ok(resolution) => resolution,
            Err(GeofillError::Network(detail)) => {
                if self.options.on_network_error == NetworkErrorPolicy::Abort {
                    return Err(GeofillError::Network(detail));
                }

                report.retries += 1;
                warn!(
                    key = %key,
                    error = %detail,
                    backoff_ms = self.options.retry_backoff.as_millis(),
                    "transport failure, retrying once"
                );
                tokio::time::sleep(self.options.retry_backoff).await;
                self.limiter.acquire().await;

                match self.geocoder.lookup(key).await {
                    Ok(resolution) => resolution,
                    Err(GeofillError::Network(second)) => {
                        warn!(key = %key, error = %second, "retry failed, recording unresolved entry");
                        report.network_failures += 1;
                        return Ok(Resolution::Failed { detail: second });
                    }
                    Err(other) => return Err(other),
                }
            }
            Err(other) => return Err(other),
        };

        match &resolution {
            Resolution::Found(_) => report.found += 1,
            Resolution::NoMatch => report.no_match += 1,
            Resolution::Failed { .. } => report.provider_errors += 1,
        }
        Ok(resolution)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
