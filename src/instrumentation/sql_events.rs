// src/instrumentation/sql_events.rs
#![cfg(feature = "sqlx")]

use crate::core::MonitorHandle;

use std::fmt;
use std::time::Duration;

use tracing::{Event, Subscriber};
use tracing_subscriber::{layer::Context, Layer};

/// Visitor that extracts the statement and timing from a `sqlx::query` event.
#[derive(Default)]
struct SqlVisitor {
    statement: Option<String>,
    summary: Option<String>,
    elapsed_secs: Option<f64>,
}

impl SqlVisitor {
    /// sqlx leaves `db.statement` empty when the summary already is the
    /// whole statement.
    fn sql(self) -> Option<String> {
        self.statement
            .filter(|s| !s.trim().is_empty())
            .or(self.summary)
    }
}

impl tracing::field::Visit for SqlVisitor {
    fn record_str(&mut self, field: &tracing::field::Field, value: &str) {
        match field.name() {
            "db.statement" | "statement" => self.statement = Some(value.to_string()),
            "summary" => self.summary = Some(value.to_string()),
            _ => {}
        }
    }

    fn record_f64(&mut self, field: &tracing::field::Field, value: f64) {
        if field.name() == "elapsed_secs" {
            self.elapsed_secs = Some(value);
        }
    }

    fn record_debug(&mut self, field: &tracing::field::Field, value: &dyn fmt::Debug) {
        match field.name() {
            "db.statement" if self.statement.is_none() => self.statement = Some(format!("{value:?}")),
            "summary" if self.summary.is_none() => self.summary = Some(format!("{value:?}")),
            _ => {}
        }
    }
}

/// Feeds completed SQLx queries into a [`QueryMonitor`](crate::core::QueryMonitor).
///
/// SQLx emits one `sqlx::query` event per finished statement; this layer turns
/// each into a `record` call. Bound parameters are not part of those events.
pub struct SqlxQueryLayer {
    monitor: MonitorHandle,
}

impl SqlxQueryLayer {
    pub fn new(monitor: MonitorHandle) -> Self {
        Self { monitor }
    }
}

impl<S> Layer<S> for SqlxQueryLayer
where
    S: Subscriber + for<'span> tracing_subscriber::registry::LookupSpan<'span>,
{
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        if !event.metadata().target().starts_with("sqlx::query") {
            return;
        }

        let mut vis = SqlVisitor::default();
        event.record(&mut vis);

        let Some(secs) = vis.elapsed_secs else {
            return;
        };
        let Ok(elapsed) = Duration::try_from_secs_f64(secs) else {
            return;
        };
        let Some(sql) = vis.sql() else {
            return;
        };

        self.monitor.record(sql.trim(), None, elapsed);
    }
}
