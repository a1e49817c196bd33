use parking_lot::Mutex;
use std::ops::Deref;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use super::normalize::normalize_sql;
use super::recent::{QueryRecord, RecentQueries};
use super::report::PerformanceReport;
use super::stats::{StatView, StatementKind, StatsTable};
use crate::config::MonitorConfig;
use crate::observability::prom;
use crate::observability::sink::{
    FileSlowQuerySink, SlowQueryEvent, SlowQuerySink, TracingSlowQuerySink,
};
use crate::observability::slack::SlackSlowQuerySink;

/// Stats table and recent-query buffer share one lock so a clear never
/// leaves them out of step.
#[derive(Debug)]
struct MonitorState {
    stats: StatsTable,
    recent: RecentQueries,
}

/// Observes executed SQL statements and answers reporting queries.
///
/// One instance per logical resource (usually per connection pool). The host
/// owns it and hands out a [`MonitorHandle`] to its database layer.
pub struct QueryMonitor {
    config: MonitorConfig,
    enabled: AtomicBool,
    state: Mutex<MonitorState>,
    sinks: Vec<Arc<dyn SlowQuerySink>>,
    sink_failures: AtomicU64,
}

impl QueryMonitor {
    /// Build a monitor from `config`. Slow queries go to the tracing stream,
    /// plus the slow-query log file and Slack when those are configured.
    pub fn new(config: MonitorConfig) -> Self {
        let mut sinks: Vec<Arc<dyn SlowQuerySink>> = vec![Arc::new(TracingSlowQuerySink)];

        if let Some(path) = &config.slow_query_log {
            match FileSlowQuerySink::open(path) {
                Ok(sink) => sinks.push(Arc::new(sink)),
                Err(e) => tracing::warn!(
                    target: "querymon",
                    path = %path.display(),
                    error = %e,
                    "slow query log file unavailable, continuing without it"
                ),
            }
        }
        if let Some(hook) = &config.slack_webhook {
            sinks.push(Arc::new(SlackSlowQuerySink::new(hook.clone())));
        }

        if config.enabled {
            tracing::info!(
                target: "querymon",
                threshold_secs = config.slow_query_threshold_secs,
                capacity = config.recent_query_capacity,
                "query monitoring enabled"
            );
        } else {
            tracing::info!(target: "querymon", "query monitoring disabled");
        }

        Self {
            enabled: AtomicBool::new(config.enabled),
            state: Mutex::new(MonitorState {
                stats: StatsTable::new(),
                recent: RecentQueries::with_capacity(config.recent_query_capacity),
            }),
            sinks,
            sink_failures: AtomicU64::new(0),
            config,
        }
    }

    /// Add a slow-query sink.
    pub fn with_sink(mut self, sink: impl SlowQuerySink + 'static) -> Self {
        self.sinks.push(Arc::new(sink));
        self
    }

    /// Replace every slow-query sink, including the default tracing one.
    pub fn with_sinks(mut self, sinks: Vec<Arc<dyn SlowQuerySink>>) -> Self {
        self.sinks = sinks;
        self
    }

    pub fn into_handle(self) -> MonitorHandle { MonitorHandle(Arc::new(self)) }

    pub fn config(&self) -> &MonitorConfig { &self.config }

    pub fn threshold_secs(&self) -> f64 { self.config.slow_query_threshold_secs }

    pub fn is_enabled(&self) -> bool { self.enabled.load(Ordering::Relaxed) }

    /// Turn recording on or off. Reporting is unaffected.
    pub fn set_enabled(&self, on: bool) {
        self.enabled.store(on, Ordering::Relaxed);
        tracing::info!(target: "querymon", enabled = on, "query monitoring toggled");
    }

    /// Number of slow-query sink writes that failed and were dropped.
    pub fn sink_failures(&self) -> u64 { self.sink_failures.load(Ordering::Relaxed) }

    /// Record one completed statement. `elapsed` is measured by the caller.
    ///
    /// Never fails and never panics on odd input; a no-op while disabled.
    pub fn record(&self, statement: &str, parameters: Option<String>, elapsed: Duration) {
        if !self.is_enabled() {
            return;
        }

        let elapsed_secs = elapsed.as_secs_f64();
        let shape = normalize_sql(statement);
        let record = QueryRecord::new(statement, parameters, elapsed_secs);
        let slow = elapsed_secs > self.config.slow_query_threshold_secs;
        let slow_event = slow.then(|| SlowQueryEvent::new(record.timestamp, statement, &shape, elapsed_secs));

        {
            let mut state = self.state.lock();
            state.stats.update(&shape, elapsed_secs);
            state.recent.push(record);
        }

        prom::observe_query(StatementKind::from_sql(statement), elapsed_secs, slow);

        if self.config.log_each_query {
            tracing::debug!(target: "querymon::sql", shape = %shape, elapsed_secs, slow, "SQL recorded");
        }

        if let Some(event) = slow_event {
            self.emit_slow(&event);
        }
    }

    fn emit_slow(&self, event: &SlowQueryEvent) {
        for sink in &self.sinks {
            if let Err(e) = sink.emit(event) {
                self.sink_failures.fetch_add(1, Ordering::Relaxed);
                prom::inc_sink_failures();
                tracing::debug!(target: "querymon", sink = sink.name(), error = %e, "slow query sink failed");
            }
        }
    }

    /// Up to `limit` statement shapes, slowest average first.
    pub fn query_stats(&self, limit: usize) -> Vec<StatView> {
        let top = self.state.lock().stats.top(limit);
        top.iter().map(|e| e.view()).collect()
    }

    /// Up to `limit` retained records over the threshold, slowest first.
    pub fn slow_queries(&self, limit: usize) -> Vec<QueryRecord> {
        self.state.lock().recent.slow(self.config.slow_query_threshold_secs, limit)
    }

    /// Up to `limit` retained records, newest first.
    pub fn recent_queries(&self, limit: usize) -> Vec<QueryRecord> {
        self.state.lock().recent.recent(limit)
    }

    /// Empty the stats table and the recent-query buffer in one step.
    pub fn clear_stats(&self) {
        {
            let mut state = self.state.lock();
            state.stats.clear();
            state.recent.clear();
        }
        tracing::info!(target: "querymon", "query monitor statistics cleared");
    }

    pub fn performance_report(&self) -> PerformanceReport {
        let state = self.state.lock();
        PerformanceReport::build(
            &state.stats,
            &state.recent,
            self.config.slow_query_threshold_secs,
            self.is_enabled(),
            self.sink_failures(),
        )
    }
}

impl std::fmt::Debug for QueryMonitor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueryMonitor")
            .field("config", &self.config)
            .field("enabled", &self.is_enabled())
            .field("sinks", &self.sinks.iter().map(|s| s.name()).collect::<Vec<_>>())
            .field("sink_failures", &self.sink_failures())
            .finish_non_exhaustive()
    }
}

/// Shared handle to a [`QueryMonitor`].
#[derive(Clone, Debug)]
pub struct MonitorHandle(pub Arc<QueryMonitor>);

impl MonitorHandle {
    pub fn new(config: MonitorConfig) -> Self { QueryMonitor::new(config).into_handle() }
}

impl Deref for MonitorHandle {
    type Target = QueryMonitor;

    fn deref(&self) -> &QueryMonitor { &self.0 }
}
