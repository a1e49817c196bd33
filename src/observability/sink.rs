use crate::core::normalize::truncate_chars;
use crate::error::SinkError;

use parking_lot::Mutex;
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::Path;
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;

/// Longest statement text carried into a slow-query log line.
pub const MAX_LOGGED_SQL_LEN: usize = 500;

/// Tracing target of the slow-query stream.
pub const SLOW_QUERY_TARGET: &str = "querymon::slow_queries";

/// A single threshold breach, ready to be written out.
#[derive(Debug, Clone)]
pub struct SlowQueryEvent {
    pub timestamp: OffsetDateTime,
    /// Literal statement, cut to [`MAX_LOGGED_SQL_LEN`] characters (`...` appended when cut).
    pub statement: String,
    pub shape: String,
    pub elapsed_secs: f64,
}

impl SlowQueryEvent {
    pub fn new(timestamp: OffsetDateTime, statement: &str, shape: &str, elapsed_secs: f64) -> Self {
        let cut = truncate_chars(statement, MAX_LOGGED_SQL_LEN);
        let statement = if cut.len() < statement.len() {
            format!("{cut}...")
        } else {
            statement.to_string()
        };
        Self { timestamp, statement, shape: shape.to_string(), elapsed_secs }
    }

    pub fn message(&self) -> String {
        format!(
            "slow query detected - elapsed: {:.3}s | SQL: {}",
            self.elapsed_secs, self.statement
        )
    }
}

/// Destination for slow-query events.
///
/// Called on the query path after the monitor lock is released. Implementations
/// must not block for long; errors are counted by the monitor and dropped.
pub trait SlowQuerySink: Send + Sync {
    fn name(&self) -> &str;

    fn emit(&self, event: &SlowQueryEvent) -> Result<(), SinkError>;
}

/// Writes slow queries as `warn` events on [`SLOW_QUERY_TARGET`].
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSlowQuerySink;

impl SlowQuerySink for TracingSlowQuerySink {
    fn name(&self) -> &str { "tracing" }

    fn emit(&self, event: &SlowQueryEvent) -> Result<(), SinkError> {
        tracing::warn!(
            target: SLOW_QUERY_TARGET,
            elapsed_secs = event.elapsed_secs,
            shape = %event.shape,
            "{}",
            event.message()
        );
        Ok(())
    }
}

/// Appends one line per slow query to a plain file:
/// `<rfc3339 timestamp> - WARNING - <message>`.
#[derive(Debug)]
pub struct FileSlowQuerySink {
    file: Mutex<File>,
}

impl FileSlowQuerySink {
    /// Opens `path` for appending, creating it and its parent directories.
    pub fn open(path: impl AsRef<Path>) -> std::io::Result<Self> {
        let path = path.as_ref();
        if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
            fs::create_dir_all(dir)?;
        }
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self { file: Mutex::new(file) })
    }
}

impl SlowQuerySink for FileSlowQuerySink {
    fn name(&self) -> &str { "file" }

    fn emit(&self, event: &SlowQueryEvent) -> Result<(), SinkError> {
        let ts = event
            .timestamp
            .format(&Rfc3339)
            .map_err(|e| SinkError::Rejected(e.to_string()))?;
        let line = format!("{ts} - WARNING - {}\n", event.message());
        let mut file = self.file.lock();
        file.write_all(line.as_bytes())?;
        file.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn message_has_three_decimals() {
        let ev = SlowQueryEvent::new(OffsetDateTime::now_utc(), "SELECT 1", "SELECT ?", 1.23456);
        assert_eq!(ev.message(), "slow query detected - elapsed: 1.235s | SQL: SELECT 1");
    }

    #[test]
    fn long_statements_are_cut() {
        let sql = "x".repeat(MAX_LOGGED_SQL_LEN + 20);
        let ev = SlowQueryEvent::new(OffsetDateTime::now_utc(), &sql, "", 2.0);
        assert_eq!(ev.statement.len(), MAX_LOGGED_SQL_LEN + 3);
        assert!(ev.statement.ends_with("..."));

        let exact = "y".repeat(MAX_LOGGED_SQL_LEN);
        let ev = SlowQueryEvent::new(OffsetDateTime::now_utc(), &exact, "", 2.0);
        assert_eq!(ev.statement, exact);
    }

    #[test]
    fn file_sink_appends_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("logs").join("slow_queries.log");
        let sink = FileSlowQuerySink::open(&path).unwrap();

        let now = OffsetDateTime::now_utc();
        sink.emit(&SlowQueryEvent::new(now, "SELECT pg_sleep(2)", "SELECT pg_sleep(?)", 2.0)).unwrap();
        sink.emit(&SlowQueryEvent::new(now, "SELECT pg_sleep(3)", "SELECT pg_sleep(?)", 3.0)).unwrap();

        let contents = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<_> = contents.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].ends_with("- WARNING - slow query detected - elapsed: 2.000s | SQL: SELECT pg_sleep(2)"));
        assert!(lines[1].contains("elapsed: 3.000s"));
    }
}
