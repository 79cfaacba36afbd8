// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! One sync run, end to end.
//!
//! Flow:
//! 1. Load persisted state (integrity failures stop here)
//! 2. Reset guard: provider/account change discards everything
//! 3. Recent pass, then backfill pass from the persisted cursor
//! 4. Prune inside the covered ranges, re-resolve types
//! 5. Recompute aggregates and the dashboard, persist everything
//!
//! Nothing is written until the end, so an auth failure or aborted run
//! leaves the previous artifacts untouched.

use crate::config::{Config, ConfigError};
use crate::db::ArtifactStore;
use crate::error::{Result, SyncError};
use crate::models::{ActivityKey, BackfillCursor, History, Provider};
use crate::services::aggregate::Aggregator;
use crate::services::dashboard::build_dashboard;
use crate::services::fetcher::{
    ActivitySource, FetchOutcome, FetchWindow, Fetcher, PageRequest, StopReason,
};
use crate::services::merge::{merge_batch, prune_absent, CoveredRanges, MergeStats, PassCoverage};
use crate::services::normalize::Normalizer;
use crate::services::source_marker::{check_reset, fingerprint, next_marker, ResetReason};
use crate::time_utils::earliest_instant_of;
use chrono::{DateTime, Duration, NaiveDate, Utc};
use std::collections::BTreeSet;

/// Counts reported at the end of every run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncReport {
    /// Raw records received
    pub fetched: u32,
    /// Malformed records skipped
    pub skipped: u32,
    /// Records older than the configured lower bound
    pub below_lower_bound: u32,
    pub merge: MergeStats,
    pub pruned: u32,
    /// Stored activities whose type changed under the current rules
    pub retyped: u32,
    pub calls: u32,
    pub history_size: usize,
    pub days: usize,
    pub reset: Option<ResetReason>,
    pub stopped: Option<StopReason>,
    pub backfill_complete: bool,
}

impl SyncReport {
    /// Whether work remains for the next run.
    pub fn is_partial(&self) -> bool {
        self.stopped.is_some() || !self.backfill_complete
    }
}

/// Drives a sync run against one provider.
pub struct SyncService {
    config: Config,
    store: ArtifactStore,
    normalizer: Normalizer,
    aggregator: Aggregator,
}

impl SyncService {
    pub fn new(config: Config) -> Self {
        let store = ArtifactStore::new(&config.paths);
        let normalizer = Normalizer::new(&config.types);
        let aggregator = Aggregator::for_rules(&config.types);
        Self {
            config,
            store,
            normalizer,
            aggregator,
        }
    }

    /// Run one sync at the current time.
    pub async fn run_once<S: ActivitySource>(&self, source: &S) -> Result<SyncReport> {
        self.run(source, Utc::now()).await
    }

    /// Run one sync with `now` fixed for the whole run.
    pub async fn run<S: ActivitySource>(&self, source: &S, now: DateTime<Utc>) -> Result<SyncReport> {
        let provider = self.config.provider;
        if source.provider() != provider {
            return Err(SyncError::Internal(anyhow::anyhow!(
                "Source is {} but configured provider is {}",
                source.provider(),
                provider
            )));
        }

        let today = now.date_naive();
        let lower_bound = self.config.lower_bound(today)?;
        let recent_after = Duration::try_days(i64::from(self.config.sync.recent_days))
            .and_then(|days| now.checked_sub_signed(days))
            .ok_or_else(|| ConfigError::Invalid {
                setting: "SYNC_RECENT_DAYS",
                reason: format!(
                    "{} days before {} is out of range",
                    self.config.sync.recent_days, now
                ),
            })?;
        let state = self.store.load_state().await?;
        let mut history = state.history;
        let mut cursors = state.cursors;
        let mut report = SyncReport::default();

        let account_fingerprint = match source.account_id().await {
            Ok(id) => id.map(|id| fingerprint(provider, &id)),
            Err(e) if e.is_retryable() => {
                tracing::warn!(provider = %provider, error = %e, "Account lookup failed; skipping fingerprint check");
                None
            }
            Err(e) => return Err(e),
        };

        let has_foreign = history.iter().any(|a| a.provider != provider);
        if let Some(reason) = check_reset(
            state.marker.as_ref(),
            provider,
            account_fingerprint.as_deref(),
            has_foreign,
        ) {
            tracing::warn!(
                reason = %reason,
                discarded = history.len(),
                "Source changed; discarding history, cursors and aggregates"
            );
            history.clear();
            cursors.clear();
            report.reset = Some(reason);
        }

        if self.config.sync.full_backfill {
            let cleared = history.clear_provider(provider);
            cursors.remove(provider);
            tracing::info!(provider = %provider, cleared, "Full backfill requested");
        }

        let mut cursor = match cursors.get(provider).cloned() {
            Some(mut c) if c.complete && c.is_shallower_than(lower_bound) => {
                tracing::info!(
                    provider = %provider,
                    from = ?c.completed_bound,
                    to = ?lower_bound,
                    "Lower bound moved deeper; reopening backfill"
                );
                // Records below the old bound were dropped. Resume a day past
                // its first instant so no local date is missed.
                if let Some(bound) = c.completed_bound {
                    c.reopen(earliest_instant_of(bound) + Duration::days(2));
                }
                c
            }
            Some(c) if c.complete || self.config.sync.resume_backfill => c,
            Some(_) => {
                tracing::info!(provider = %provider, "Restarting backfill from the top");
                BackfillCursor::start(now)
            }
            None => BackfillCursor::start(now),
        };
        if !cursor.complete && cursor.window_before.is_none() {
            cursor.window_before = Some(now);
        }

        let mut run = RunState {
            provider,
            per_page: self.config.sync.per_page,
            lower_bound,
            bound_instant: lower_bound.map(earliest_instant_of),
            normalizer: &self.normalizer,
            fetcher: Fetcher::for_config(&self.config),
            history,
            seen: BTreeSet::new(),
            report,
        };
        let mut covered = CoveredRanges::default();

        // Recent pass
        let recent_window = FetchWindow {
            after: Some(match run.bound_instant {
                Some(bound) => recent_after.max(bound),
                None => recent_after,
            }),
            before: None,
        };
        let recent = run.run_pass(source, "recent", recent_window, None).await?;
        if let Some(range) = recent.coverage.covered() {
            covered.add(range);
        }

        // Backfill pass
        let budget_left = !matches!(
            recent.stopped,
            Some(StopReason::RateLimited | StopReason::RetriesExhausted)
        );
        let mut stopped = recent.stopped;
        if !cursor.complete && budget_left {
            let window = FetchWindow {
                after: run.bound_instant,
                before: cursor.next_before(),
            };
            let backfill = run
                .run_pass(source, "backfill", window, Some(&mut cursor))
                .await?;
            if backfill.coverage.reached_end() {
                cursor.mark_complete(lower_bound);
            }
            if let Some(range) = backfill.coverage.covered() {
                covered.add(range);
            }
            stopped = backfill.stopped.or(stopped);
        }
        run.report.stopped = stopped;
        cursor.last_run_timestamp = Some(now);
        cursors.set(provider, cursor.clone());

        let RunState {
            mut history,
            seen,
            fetcher,
            mut report,
            ..
        } = run;
        report.calls = fetcher.calls();
        report.backfill_complete = cursor.complete;

        if self.config.sync.prune_deleted {
            report.pruned = prune_absent(&mut history, provider, &covered, &seen);
        }

        for activity in history.iter_mut() {
            let renormalized = self.normalizer.renormalize(activity);
            if renormalized.canonical_type != activity.canonical_type {
                report.retyped += 1;
                *activity = renormalized;
            }
        }

        let aggregates = self.aggregator.aggregate(&history);
        let dashboard = build_dashboard(
            &aggregates,
            self.aggregator.observed_types(&history),
            provider,
            self.config.units,
            now,
        );
        report.history_size = history.len();
        report.days = aggregates.len();

        // History before cursors, so a cursor never points past unsaved data.
        self.store.save_history(&history).await?;
        self.store.save_cursors(&cursors).await?;
        let marker = next_marker(state.marker.as_ref(), provider, account_fingerprint, now);
        let marker_changed = state.marker.as_ref().map_or(true, |previous| {
            previous.active_provider != marker.active_provider
                || previous.fingerprint != marker.fingerprint
        });
        if marker_changed {
            self.store.save_marker(&marker).await?;
        }
        self.store.save_aggregates(&aggregates).await?;
        self.store.save_dashboard(&dashboard).await?;

        tracing::info!(
            provider = %provider,
            fetched = report.fetched,
            merged = report.merge.merged(),
            inserted = report.merge.inserted,
            updated = report.merge.updated,
            pruned = report.pruned,
            skipped = report.skipped,
            calls = report.calls,
            activities = report.history_size,
            "Sync run finished"
        );
        if report.is_partial() {
            tracing::warn!(
                provider = %provider,
                stopped = ?report.stopped,
                oldest_reached = ?cursor.oldest_reached_date,
                "Backfill incomplete; it will resume on the next run"
            );
        }

        Ok(report)
    }
}

/// How a single pass ended.
struct PassOutcome {
    coverage: PassCoverage,
    stopped: Option<StopReason>,
}

/// Mutable state threaded through both passes.
struct RunState<'a> {
    provider: Provider,
    per_page: u32,
    lower_bound: Option<NaiveDate>,
    bound_instant: Option<DateTime<Utc>>,
    normalizer: &'a Normalizer,
    fetcher: Fetcher,
    history: History,
    seen: BTreeSet<ActivityKey>,
    report: SyncReport,
}

impl RunState<'_> {
    /// Page through one window from its top, merging each page before
    /// committing it to the cursor.
    async fn run_pass<S: ActivitySource>(
        &mut self,
        source: &S,
        pass: &'static str,
        window: FetchWindow,
        mut cursor: Option<&mut BackfillCursor>,
    ) -> Result<PassOutcome> {
        let mut coverage = PassCoverage::new(window);
        let mut token = None;
        let mut pages = 0u32;

        let stopped = loop {
            let request = PageRequest {
                window,
                token: token.clone(),
                per_page: self.per_page,
            };
            let page = match self.fetcher.fetch(source, &request).await? {
                FetchOutcome::Page(page) => page,
                FetchOutcome::Stopped(reason) => break Some(reason),
            };
            self.report.fetched += page.records.len() as u32;

            if page.records.is_empty() {
                coverage.mark_reached_end();
                break None;
            }
            if page.next_token.is_some() && page.next_token == token {
                tracing::warn!(pass, token = ?token, "Provider repeated the continuation token");
                break Some(StopReason::NoProgress);
            }

            let normalized = self.normalizer.normalize_page(self.provider, &page.records);
            self.report.skipped += normalized.skipped;
            if normalized.activities.is_empty() {
                tracing::warn!(pass, records = page.records.len(), "Page had no usable records");
                break Some(StopReason::NoProgress);
            }
            coverage.observe_page(&normalized.activities);

            let ordered = coverage.is_newest_first();
            let page_oldest_start = normalized
                .activities
                .iter()
                .map(|a| a.start_timestamp_utc)
                .min();
            let crossed_window = ordered
                && window
                    .after
                    .zip(page_oldest_start)
                    .is_some_and(|(after, oldest)| oldest <= after);
            let lower_bound = self.lower_bound;
            let (kept, below): (Vec<_>, Vec<_>) = normalized
                .activities
                .into_iter()
                .partition(|a| lower_bound.map_or(true, |bound| a.local_date >= bound));
            self.report.below_lower_bound += below.len() as u32;

            let page_oldest = kept.iter().map(|a| a.local_date).min();
            self.seen.extend(kept.iter().map(|a| a.key()));
            let stats = merge_batch(&mut self.history, kept);
            self.report.merge.add(stats);
            pages += 1;

            // An out-of-order page says nothing about what lies below it.
            if let Some(cursor) = cursor.as_deref_mut().filter(|_| ordered) {
                cursor.advance(page_oldest, page_oldest_start);
            }

            tracing::debug!(
                pass,
                page = pages,
                inserted = stats.inserted,
                updated = stats.updated,
                oldest = ?page_oldest,
                "Processed page"
            );

            if crossed_window || page.next_token.is_none() {
                coverage.mark_reached_end();
                break None;
            }
            token = page.next_token;
        };

        tracing::info!(pass, pages, stopped = ?stopped, "Pass finished");
        Ok(PassOutcome { coverage, stopped })
    }
}
