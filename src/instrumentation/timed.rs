use std::future::Future;
use std::time::Instant;

use crate::core::QueryMonitor;

/// Run `exec` and record `sql` with the time it took.
///
/// Meant to wrap the host's statement execution; the result of `exec` is
/// returned untouched, errors included.
pub fn timed<T>(
    monitor: &QueryMonitor,
    sql: &str,
    parameters: Option<String>,
    exec: impl FnOnce() -> T,
) -> T {
    let started = Instant::now();
    let out = exec();
    monitor.record(sql, parameters, started.elapsed());
    out
}

/// Async flavour of [`timed`].
pub async fn timed_async<F: Future>(
    monitor: &QueryMonitor,
    sql: &str,
    parameters: Option<String>,
    exec: F,
) -> F::Output {
    let started = Instant::now();
    let out = exec.await;
    monitor.record(sql, parameters, started.elapsed());
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MonitorConfig;
    use std::time::Duration;

    fn monitor() -> QueryMonitor {
        QueryMonitor::new(MonitorConfig::new().enabled().with_slow_query_threshold(10.0))
    }

    #[test]
    fn passes_result_through_and_records() {
        let m = monitor();
        let out: Result<u64, String> = timed(&m, "DELETE FROM t WHERE id = 3", Some("(3,)".into()), || {
            Err("constraint violation".into())
        });
        assert_eq!(out, Err("constraint violation".to_string()));

        let recent = m.recent_queries(10);
        assert_eq!(recent.len(), 1);
        assert_eq!(recent[0].statement, "DELETE FROM t WHERE id = 3");
        assert_eq!(recent[0].parameters.as_deref(), Some("(3,)"));
    }

    #[tokio::test]
    async fn async_wrapper_measures_await_time() {
        let m = monitor();
        let rows = timed_async(&m, "SELECT * FROM t", None, async {
            std::thread::sleep(Duration::from_millis(20));
            7usize
        })
        .await;
        assert_eq!(rows, 7);

        let stats = m.query_stats(10);
        assert_eq!(stats[0].count, 1);
        assert!(stats[0].max_time_secs >= 0.02);
    }
}
