//! The daily tally generator — drives one incremental run.
//!
//! PHASES (fixed, in order):
//!   1. RESOLVE            — checkpoint (or as-of override) → DateRange
//!   2. FETCH-DEFINITIONS  — every stored indicator query, read once
//!   3. COMPUTE-AND-PERSIST — for each date, for each query: compute, upsert
//!
//! RULES:
//!   - Dates run in chronological order, queries in row-id order.
//!   - A failed (date, indicator) pair is logged and skipped.
//!   - A storage failure aborts the run; the checkpoint is left untouched.
//!   - The checkpoint moves to the last date of the range per CheckpointPolicy.
//!   - Not reentrant: callers serialize runs against the same store.

use crate::{
    clock::Clock,
    config::{CheckpointPolicy, GeneratorConfig},
    error::{TallyError, TallyResult},
    event_dates::{DateKey, DateRange, EventDateResolver},
    indicator::IndicatorQuery,
    repository::{GenerationRun, ReportRepository, RunStatus},
    tally::CompositeIndicatorTally,
    tally_computer::TallyComputer,
    types::{IndicatorCode, RunId},
};
use chrono::{DateTime, Utc};
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use uuid::Uuid;

/// A (date, indicator) pair that produced no tally this run.
#[derive(Debug, Clone, PartialEq)]
pub struct FailedPair {
    pub date:           String,
    pub indicator_code: IndicatorCode,
    pub reason:         String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RunSummary {
    pub run_id:       RunId,
    /// Every date in the resolved range, oldest first.
    pub dates:        Vec<String>,
    pub attempted:    u64,
    pub persisted:    u64,
    pub failures:     Vec<FailedPair>,
    pub cache_hits:   u64,
    pub cache_misses: u64,
    /// New checkpoint, if the run advanced it.
    pub checkpoint:   Option<String>,
    pub cancelled:    bool,
}

impl RunSummary {
    fn new(run_id: RunId, range: &DateRange) -> Self {
        Self {
            run_id,
            dates:        range.keys(),
            attempted:    0,
            persisted:    0,
            failures:     Vec::new(),
            cache_hits:   0,
            cache_misses: 0,
            checkpoint:   None,
            cancelled:    false,
        }
    }
}

pub struct TallyGenerator<'a, R: ReportRepository + ?Sized> {
    repo:   &'a R,
    clock:  &'a dyn Clock,
    config: GeneratorConfig,
    cancel: Option<Arc<AtomicBool>>,
}

impl<'a, R: ReportRepository + ?Sized> TallyGenerator<'a, R> {
    pub fn new(repo: &'a R, clock: &'a dyn Clock, config: GeneratorConfig) -> Self {
        Self {
            repo,
            clock,
            config,
            cancel: None,
        }
    }

    /// Stop between dates once `flag` is set. A cancelled run keeps the
    /// tallies it persisted but does not advance the checkpoint.
    pub fn with_cancellation(mut self, flag: Arc<AtomicBool>) -> Self {
        self.cancel = Some(flag);
        self
    }

    /// Run one generation. `as_of` replaces the stored checkpoint for this run.
    pub fn generate_daily_indicator_tallies(&self, as_of: Option<&str>) -> TallyResult<RunSummary> {
        let started = self.clock.now();
        let run_id = Uuid::new_v4().to_string();

        // Phase 1: RESOLVE
        let checkpoint = match as_of {
            Some(date) => Some(date.to_string()),
            None => self.repo.last_processed_date()?,
        };
        let range = EventDateResolver::new(self.repo).resolve(checkpoint.as_deref(), started)?;

        // Phase 2: FETCH-DEFINITIONS
        let queries = self.repo.all_indicator_queries()?;
        log::info!(
            "run={run_id}: {} date(s) {}..={}, {} indicator queries, checkpoint={}",
            range.len(),
            range.first().key(),
            range.last().key(),
            queries.len(),
            checkpoint.as_deref().unwrap_or("none")
        );

        // Phase 3: COMPUTE-AND-PERSIST
        let mut summary = RunSummary::new(run_id, &range);
        let mut computer = TallyComputer::new();
        for date in &range {
            if self.is_cancelled() {
                log::info!("run={}: cancelled before {}", summary.run_id, date.key());
                summary.cancelled = true;
                break;
            }
            computer.begin_date(date);
            for query in queries.values() {
                if let Err(e) = self.save_tallies(&mut computer, query, date, &mut summary) {
                    return Err(self.abort(e, &mut summary, &computer, started, &range));
                }
            }
            log::debug!(
                "run={}: {} done ({} persisted so far)",
                summary.run_id,
                date.key(),
                summary.persisted
            );
        }
        summary.cache_hits = computer.hits();
        summary.cache_misses = computer.misses();

        if self.should_advance(&summary) {
            let last = range.last().key();
            if let Err(e) = self
                .repo
                .save_last_processed_date(last)
                .map_err(TallyError::into_storage)
            {
                return Err(self.abort(e, &mut summary, &computer, started, &range));
            }
            summary.checkpoint = Some(last.to_string());
        } else if !summary.cancelled {
            log::warn!(
                "run={}: checkpoint held back, {} pair(s) failed",
                summary.run_id,
                summary.failures.len()
            );
        }

        let status = if summary.cancelled { RunStatus::Cancelled } else { RunStatus::Completed };
        self.record(&summary, status, started, &range);
        log::info!(
            "run={}: {} attempted, {} persisted, {} failed, checkpoint={}",
            summary.run_id,
            summary.attempted,
            summary.persisted,
            summary.failures.len(),
            summary.checkpoint.as_deref().unwrap_or("unchanged")
        );
        Ok(summary)
    }

    /// Compute one (date, indicator) pair and persist its tallies.
    /// Only storage failures are returned; everything else is recorded and skipped.
    fn save_tallies(
        &self,
        computer: &mut TallyComputer,
        query: &IndicatorQuery,
        date: &DateKey,
        summary: &mut RunSummary,
    ) -> TallyResult<()> {
        summary.attempted += 1;

        let computed = query
            .kind()
            .and_then(|kind| computer.compute(self.repo, &query.indicator_code, &kind, date));
        let values = match computed {
            Ok(values) => values,
            Err(e) => {
                log::warn!(
                    "date={} indicator={}: skipped: {e}",
                    date.key(),
                    query.indicator_code
                );
                summary.failures.push(FailedPair {
                    date:           date.key().to_string(),
                    indicator_code: query.indicator_code.clone(),
                    reason:         e.to_string(),
                });
                return Ok(());
            }
        };

        for value in values {
            let tally = CompositeIndicatorTally {
                indicator_code: query.indicator_code.clone(),
                date:           date.key().to_string(),
                sub_key:        value.sub_key,
                value:          value.value,
            };
            self.repo
                .add_tally(&tally)
                .map_err(TallyError::into_storage)?;
            summary.persisted += 1;
        }
        Ok(())
    }

    fn should_advance(&self, summary: &RunSummary) -> bool {
        if summary.cancelled {
            return false;
        }
        match self.config.checkpoint_policy {
            CheckpointPolicy::AdvanceAlways => true,
            CheckpointPolicy::AdvanceOnFullSuccess => summary.failures.is_empty(),
        }
    }

    fn is_cancelled(&self) -> bool {
        self.cancel
            .as_ref()
            .is_some_and(|flag| flag.load(Ordering::SeqCst))
    }

    fn abort(
        &self,
        error: TallyError,
        summary: &mut RunSummary,
        computer: &TallyComputer,
        started: DateTime<Utc>,
        range: &DateRange,
    ) -> TallyError {
        summary.cache_hits = computer.hits();
        summary.cache_misses = computer.misses();
        log::error!(
            "run={}: aborted after {} persisted tallies, checkpoint unchanged: {error}",
            summary.run_id,
            summary.persisted
        );
        self.record(summary, RunStatus::Failed, started, range);
        error
    }

    /// Write the run ledger row. Best effort: a failure here never fails the run.
    fn record(
        &self,
        summary: &RunSummary,
        status: RunStatus,
        started: DateTime<Utc>,
        range: &DateRange,
    ) {
        let run = GenerationRun {
            run_id:      summary.run_id.clone(),
            started_at:  started.to_rfc3339(),
            finished_at: self.clock.now().to_rfc3339(),
            first_date:  Some(range.first().key().to_string()),
            last_date:   Some(range.last().key().to_string()),
            status,
            attempted:   summary.attempted,
            failed:      summary.failures.len() as u64,
        };
        if let Err(e) = self.repo.record_generation_run(&run) {
            log::warn!("run={}: could not record run: {e}", summary.run_id);
        }
    }
}
