//! Preloading policy
//!
//! Decides when to warm the schema cache ahead of demand. The manager never
//! discovers anything itself; it drives a [`DiscoveryOrchestrator`] for
//! batches and an [`OnDemandLoader`] for single fire-and-forget loads.

use futures::FutureExt;
use keyql_core::{DiscoveryContext, PreloadConfig, PreloadStrategy};
use parking_lot::{Mutex, RwLock};
use serde::Serialize;
use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

use super::pattern::{AccessEvent, AccessPatternRecorder};
use crate::orchestrator::{DiscoveryOrchestrator, OnDemandLoader};

/// Outcome of one batch preload run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PreloadReport {
    pub requested: usize,
    pub batches: usize,
    pub failed_batches: usize,
    pub discovered: usize,
}

/// Lifetime counters of a preload manager
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PreloadStats {
    pub batches_run: u64,
    pub batches_failed: u64,
    pub tables_discovered: u64,
    pub scheduled_ticks: u64,
    pub reactive_preloads: u64,
    pub accesses_recorded: u64,
}

#[derive(Default)]
struct PreloadCounters {
    batches_run: AtomicU64,
    batches_failed: AtomicU64,
    tables_discovered: AtomicU64,
    scheduled_ticks: AtomicU64,
    reactive_preloads: AtomicU64,
    accesses_recorded: AtomicU64,
}

impl PreloadCounters {
    fn snapshot(&self) -> PreloadStats {
        PreloadStats {
            batches_run: self.batches_run.load(Ordering::Relaxed),
            batches_failed: self.batches_failed.load(Ordering::Relaxed),
            tables_discovered: self.tables_discovered.load(Ordering::Relaxed),
            scheduled_ticks: self.scheduled_ticks.load(Ordering::Relaxed),
            reactive_preloads: self.reactive_preloads.load(Ordering::Relaxed),
            accesses_recorded: self.accesses_recorded.load(Ordering::Relaxed),
        }
    }
}

/// The part of the manager that runs inside background tasks
#[derive(Clone)]
struct BatchRunner {
    orchestrator: Arc<dyn DiscoveryOrchestrator>,
    loader: Arc<dyn OnDemandLoader>,
    max_batch_size: usize,
    counters: Arc<PreloadCounters>,
}

impl BatchRunner {
    /// Discover `tables` in fixed-size batches, one batch at a time
    async fn run(&self, tables: &[String], ctx: &DiscoveryContext) -> PreloadReport {
        let mut report = PreloadReport {
            requested: tables.len(),
            ..Default::default()
        };

        for (index, batch) in tables.chunks(self.max_batch_size).enumerate() {
            report.batches += 1;
            self.counters.batches_run.fetch_add(1, Ordering::Relaxed);

            let discovery = self.orchestrator.discover_tables(batch, ctx);
            match AssertUnwindSafe(discovery).catch_unwind().await {
                Ok(Ok(discovered)) => {
                    tracing::debug!(batch = index, size = batch.len(), discovered = discovered.len(), "preload batch complete");
                    report.discovered += discovered.len();
                    self.counters
                        .tables_discovered
                        .fetch_add(discovered.len() as u64, Ordering::Relaxed);
                }
                Ok(Err(error)) => {
                    tracing::warn!(batch = index, size = batch.len(), error = %error, "preload batch failed");
                    report.failed_batches += 1;
                    self.counters.batches_failed.fetch_add(1, Ordering::Relaxed);
                }
                Err(_) => {
                    tracing::error!(batch = index, size = batch.len(), "preload batch panicked");
                    report.failed_batches += 1;
                    self.counters.batches_failed.fetch_add(1, Ordering::Relaxed);
                }
            }
        }

        report
    }

    /// Refresh the tables of `tables` that already have a cache entry
    async fn scheduled_tick(&self, tables: &[String], ctx: &DiscoveryContext) -> PreloadReport {
        self.counters.scheduled_ticks.fetch_add(1, Ordering::Relaxed);
        let resident: Vec<String> = tables
            .iter()
            .filter(|t| self.loader.is_resident(t))
            .cloned()
            .collect();

        if resident.is_empty() {
            tracing::debug!("scheduled preload found no cached startup tables");
            return PreloadReport::default();
        }
        tracing::info!(count = resident.len(), "scheduled schema refresh");
        self.run(&resident, ctx).await
    }
}

/// Proactive schema cache warming
pub struct PreloadManager {
    config: PreloadConfig,
    runner: BatchRunner,
    relationships: RwLock<HashMap<String, Vec<String>>>,
    access_log: AccessPatternRecorder,
    timer: Mutex<Option<JoinHandle<()>>>,
}

impl PreloadManager {
    pub fn new(
        config: PreloadConfig,
        orchestrator: Arc<dyn DiscoveryOrchestrator>,
        loader: Arc<dyn OnDemandLoader>,
    ) -> Self {
        let runner = BatchRunner {
            orchestrator,
            loader,
            max_batch_size: config.max_batch_size.max(1),
            counters: Arc::new(PreloadCounters::default()),
        };
        Self {
            config,
            runner,
            relationships: RwLock::new(HashMap::new()),
            access_log: AccessPatternRecorder::default(),
            timer: Mutex::new(None),
        }
    }

    pub fn config(&self) -> &PreloadConfig {
        &self.config
    }

    pub fn strategy(&self) -> PreloadStrategy {
        self.config.strategy
    }

    pub fn is_enabled(&self) -> bool {
        self.config.is_enabled()
    }

    /// Apply the configured strategy at boot.
    ///
    /// STARTUP preloads the startup tables and returns the report. SCHEDULED
    /// starts the refresh timer. The other strategies only react to
    /// [`on_table_access`](Self::on_table_access).
    #[tracing::instrument(skip(self, ctx), fields(strategy = %self.config.strategy, correlation_id = %ctx.correlation_id))]
    pub async fn start(&self, ctx: &DiscoveryContext) -> Option<PreloadReport> {
        match self.config.strategy {
            PreloadStrategy::None => {
                tracing::debug!("schema preloading disabled");
                None
            }
            PreloadStrategy::Startup => {
                let tables = self.config.startup_tables.clone();
                tracing::info!(count = tables.len(), "preloading startup tables");
                Some(self.preload_tables(&tables, ctx).await)
            }
            PreloadStrategy::Scheduled => {
                self.schedule_refresh(ctx);
                None
            }
            PreloadStrategy::PatternBased => {
                tracing::info!(recording = self.config.pattern_recognition, "recording table access patterns");
                None
            }
            PreloadStrategy::Reactive => {
                tracing::info!(primaries = self.relationships.read().len(), "reactive preloading enabled");
                None
            }
        }
    }

    /// Preload `tables` in sequential batches of the configured size.
    ///
    /// Failed batches are logged and counted; later batches still run.
    pub async fn preload_tables(&self, tables: &[String], ctx: &DiscoveryContext) -> PreloadReport {
        if !self.is_enabled() {
            tracing::debug!("schema preloading disabled, ignoring preload request");
            return PreloadReport::default();
        }
        let tables: Vec<String> = tables
            .iter()
            .filter(|t| !t.trim().is_empty())
            .cloned()
            .collect();
        self.runner.run(&tables, ctx).await
    }

    /// Start the periodic refresh of cache-resident startup tables.
    ///
    /// Returns false if a timer is already running, or the interval is zero
    /// or too long to schedule.
    pub fn schedule_refresh(&self, ctx: &DiscoveryContext) -> bool {
        let period = self.config.scheduled_interval;
        if period.is_zero() {
            tracing::warn!("scheduled preload interval is zero, not scheduling");
            return false;
        }
        let Some(first_tick) = Instant::now().checked_add(period) else {
            tracing::warn!(interval_secs = period.as_secs(), "scheduled preload interval too long, not scheduling");
            return false;
        };

        let mut timer = self.timer.lock();
        if timer.as_ref().is_some_and(|handle| !handle.is_finished()) {
            tracing::debug!("scheduled preload already running");
            return false;
        }

        let runner = self.runner.clone();
        let tables = self.config.startup_tables.clone();
        let ctx = ctx.clone();

        *timer = Some(tokio::spawn(async move {
            let mut interval = tokio::time::interval_at(first_tick, period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                interval.tick().await;

                // A running tick survives an abort of the timer task
                let tick_runner = runner.clone();
                let tick_tables = tables.clone();
                let tick_ctx = ctx.child();
                let tick = tokio::spawn(async move {
                    tick_runner.scheduled_tick(&tick_tables, &tick_ctx).await
                });

                match tick.await {
                    Ok(report) if report.failed_batches > 0 => {
                        tracing::warn!(failed = report.failed_batches, "scheduled preload had failures");
                    }
                    Ok(_) => {}
                    Err(error) => {
                        tracing::error!(error = %error, "scheduled preload tick failed");
                    }
                }
            }
        }));

        tracing::info!(interval_secs = period.as_secs(), "scheduled schema preloading started");
        true
    }

    pub fn is_scheduled(&self) -> bool {
        self.timer
            .lock()
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }

    /// Note an access to `table`. Never blocks on discovery.
    pub fn on_table_access(&self, table: &str, ctx: &DiscoveryContext) {
        match self.config.strategy {
            PreloadStrategy::PatternBased if self.config.pattern_recognition => {
                self.access_log.record(table);
                self.runner
                    .counters
                    .accesses_recorded
                    .fetch_add(1, Ordering::Relaxed);
            }
            PreloadStrategy::Reactive => self.preload_related(table, ctx),
            _ => {}
        }
    }

    fn preload_related(&self, table: &str, ctx: &DiscoveryContext) {
        let related = match self.relationships.read().get(table) {
            Some(related) => related.clone(),
            None => return,
        };

        let loader = &self.runner.loader;
        let pending: Vec<&String> = related
            .iter()
            .filter(|t| !loader.is_cached(t))
            .take(self.runner.max_batch_size)
            .collect();

        if pending.is_empty() {
            return;
        }
        tracing::debug!(table = %table, count = pending.len(), "reactive preload of related tables");
        for related_table in pending {
            loader.preload(related_table, ctx);
        }
        self.runner
            .counters
            .reactive_preloads
            .fetch_add(1, Ordering::Relaxed);
    }

    /// Declare tables that are usually read together with `primary`
    pub fn register_relationship<I, S>(&self, primary: &str, related: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut relationships = self.relationships.write();
        let entry = relationships.entry(primary.to_string()).or_default();
        for table in related {
            let table = table.into();
            if table != primary && !entry.contains(&table) {
                entry.push(table);
            }
        }
    }

    pub fn related_tables(&self, primary: &str) -> Vec<String> {
        self.relationships
            .read()
            .get(primary)
            .cloned()
            .unwrap_or_default()
    }

    pub fn access_history(&self) -> Vec<AccessEvent> {
        self.access_log.events()
    }

    pub fn stats(&self) -> PreloadStats {
        self.runner.counters.snapshot()
    }

    /// Stop the timer and forget relationships and access history.
    ///
    /// A tick that is already running finishes on its own.
    pub fn shutdown(&self) {
        if let Some(handle) = self.timer.lock().take() {
            handle.abort();
            tracing::info!("scheduled schema preloading stopped");
        }
        self.relationships.write().clear();
        self.access_log.clear();
    }
}

impl Drop for PreloadManager {
    fn drop(&mut self) {
        if let Some(handle) = self.timer.get_mut().take() {
            handle.abort();
        }
    }
}
