//! The poll → dedupe → persist loop.
//!
//! One tick: search once, then for each item (in the order the API returned
//! them) check the store by `external_id` and insert only unseen items. Then
//! sleep for a fixed interval. Ticks never overlap, so the period is the tick
//! duration plus the interval.
//!
//! Nothing that happens inside a tick can stop the loop; only the shutdown
//! future can, and it is raced against both the tick and the sleep.

use std::future::Future;
use std::time::{Duration, Instant};

use tracing::{Instrument, debug, error, info, info_span, warn};

use tidewatch_shared::{IngestConfig, MentionRecord, SearchItem, TidewatchError};

use crate::capability::{MentionSource, MentionStore};

// ---------------------------------------------------------------------------
// Reports
// ---------------------------------------------------------------------------

/// How a tick ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TickOutcome {
    /// The search succeeded; items (if any) were processed.
    Completed,
    /// The search failed; the store was not touched.
    SearchFailed(String),
}

/// Summary of one tick.
#[derive(Debug, Clone)]
pub struct TickReport {
    pub outcome: TickOutcome,
    /// Items returned by the search.
    pub fetched: usize,
    /// New records written.
    pub inserted: usize,
    /// Items whose key was already stored.
    pub skipped: usize,
    /// Items whose lookup or insert failed.
    pub failed: usize,
    pub elapsed: Duration,
}

impl TickReport {
    fn search_failed(error: &TidewatchError, elapsed: Duration) -> Self {
        Self {
            outcome: TickOutcome::SearchFailed(error.to_string()),
            fetched: 0,
            inserted: 0,
            skipped: 0,
            failed: 0,
            elapsed,
        }
    }
}

/// Totals across every tick of a [`Ingestor::run_until`] call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub ticks: u64,
    pub failed_ticks: u64,
    pub inserted: u64,
    pub skipped: u64,
    pub failed_items: u64,
}

impl RunSummary {
    fn absorb(&mut self, report: &TickReport) {
        self.ticks += 1;
        if matches!(report.outcome, TickOutcome::SearchFailed(_)) {
            self.failed_ticks += 1;
        }
        self.inserted += report.inserted as u64;
        self.skipped += report.skipped as u64;
        self.failed_items += report.failed as u64;
    }
}

/// Result of handling a single search item.
enum ItemOutcome {
    Inserted,
    Skipped,
    Failed,
}

// ---------------------------------------------------------------------------
// Ingestor
// ---------------------------------------------------------------------------

/// Owns the search capability, the store, and the schedule.
pub struct Ingestor<S, R> {
    source: S,
    store: R,
    config: IngestConfig,
}

impl<S: MentionSource, R: MentionStore> Ingestor<S, R> {
    /// Wire up an ingestor from already-constructed dependencies.
    pub fn new(source: S, store: R, config: IngestConfig) -> Self {
        Self {
            source,
            store,
            config,
        }
    }

    /// Run exactly one tick. Never fails: every error is logged and counted.
    pub async fn tick(&self) -> TickReport {
        let start = Instant::now();

        info!(query = %self.config.query, "searching for mentions");

        let items = match self
            .source
            .search(&self.config.query, self.config.max_results)
            .await
        {
            Ok(items) => items,
            Err(e) => {
                if e.is_transient() {
                    warn!(error = %e, "search failed, will retry next tick");
                } else {
                    error!(error = %e, "search failed, will retry next tick");
                }
                return TickReport::search_failed(&e, start.elapsed());
            }
        };

        let mut report = TickReport {
            outcome: TickOutcome::Completed,
            fetched: items.len(),
            inserted: 0,
            skipped: 0,
            failed: 0,
            elapsed: Duration::ZERO,
        };

        if items.is_empty() {
            info!("no new mentions matched the query");
        } else {
            info!(count = items.len(), "found mentions");
        }

        for item in &items {
            match self.ingest_item(item).await {
                ItemOutcome::Inserted => report.inserted += 1,
                ItemOutcome::Skipped => report.skipped += 1,
                ItemOutcome::Failed => report.failed += 1,
            }
        }

        report.elapsed = start.elapsed();
        info!(
            fetched = report.fetched,
            inserted = report.inserted,
            skipped = report.skipped,
            failed = report.failed,
            elapsed_ms = report.elapsed.as_millis() as u64,
            "tick complete"
        );
        report
    }

    async fn ingest_item(&self, item: &SearchItem) -> ItemOutcome {
        match self.store.find_by_key(&item.id).await {
            Ok(Some(_)) => {
                info!(external_id = %item.id, "mention already exists, skipping");
                return ItemOutcome::Skipped;
            }
            Ok(None) => {}
            Err(e) => {
                warn!(external_id = %item.id, error = %e, "lookup failed, skipping item");
                return ItemOutcome::Failed;
            }
        }

        let record = match MentionRecord::from_item(item, &self.config.source_tag) {
            Ok(record) => record,
            Err(e) => {
                warn!(external_id = %item.id, error = %e, "unusable search item");
                return ItemOutcome::Failed;
            }
        };

        match self.store.insert(&record).await {
            Ok(true) => {
                info!(external_id = %item.id, "saved new mention");
                ItemOutcome::Inserted
            }
            Ok(false) => {
                // Lost a race with another writer between lookup and insert.
                info!(external_id = %item.id, "mention stored concurrently, skipping");
                ItemOutcome::Skipped
            }
            Err(e) => {
                warn!(external_id = %item.id, error = %e, "insert failed");
                ItemOutcome::Failed
            }
        }
    }

    /// Run a single tick, then close the store.
    pub async fn run_once(self) -> TickReport {
        let report = self.tick().instrument(info_span!("tick", n = 1u64)).await;
        self.store.close();
        report
    }

    /// Tick, sleep, repeat until `shutdown` resolves; then close the store.
    ///
    /// Shutdown interrupts both an in-flight tick and the sleep. An
    /// interrupted tick is abandoned without rollback; every write it already
    /// made stands on its own.
    pub async fn run_until<F>(self, shutdown: F) -> RunSummary
    where
        F: Future<Output = ()>,
    {
        let mut summary = RunSummary::default();
        tokio::pin!(shutdown);

        info!(
            interval_secs = self.config.interval.as_secs_f64(),
            max_results = self.config.max_results,
            source = %self.config.source_tag,
            "ingestion loop started"
        );

        loop {
            let tick_no = summary.ticks + 1;
            tokio::select! {
                biased;
                _ = &mut shutdown => {
                    info!(tick = tick_no, "shutdown requested during tick");
                    break;
                }
                report = self.tick().instrument(info_span!("tick", n = tick_no)) => {
                    summary.absorb(&report);
                }
            }

            debug!(
                secs = self.config.interval.as_secs_f64(),
                "waiting before next search"
            );
            tokio::select! {
                biased;
                _ = &mut shutdown => {
                    info!("shutdown requested while waiting");
                    break;
                }
                _ = tokio::time::sleep(self.config.interval) => {}
            }
        }

        info!(
            ticks = summary.ticks,
            failed_ticks = summary.failed_ticks,
            inserted = summary.inserted,
            skipped = summary.skipped,
            "ingestion loop stopped"
        );
        self.store.close();
        summary
    }
}
