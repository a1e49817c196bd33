use serde::Serialize;

use super::recent::RecentQueries;
use super::stats::{round2, round3, StatsTable};

pub const DEFAULT_STATS_LIMIT: usize = 20;
pub const DEFAULT_SLOW_LIMIT: usize = 50;
pub const DEFAULT_RECENT_LIMIT: usize = 100;

/// Summary of the monitor's state.
///
/// `total_queries` and `total_execution_time_secs` come from the stats table and
/// cover the monitor's whole lifetime; `slow_query_count` only sees what the
/// recent-query buffer still holds.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PerformanceReport {
    pub total_queries: u64,
    pub total_execution_time_secs: f64,
    pub avg_execution_time_secs: f64,
    pub slow_query_count: u64,
    pub slow_query_percentage: f64,
    pub unique_shape_count: u64,
    pub monitoring_enabled: bool,
    pub threshold_secs: f64,
    pub sink_failures: u64,
}

impl PerformanceReport {
    pub(crate) fn build(
        stats: &StatsTable,
        recent: &RecentQueries,
        threshold_secs: f64,
        monitoring_enabled: bool,
        sink_failures: u64,
    ) -> Self {
        let (total_queries, total_time) = stats.totals();
        let slow_query_count = recent.slow_count(threshold_secs) as u64;
        let (avg, pct) = if total_queries > 0 {
            (
                round3(total_time / total_queries as f64),
                round2(slow_query_count as f64 / total_queries as f64 * 100.0),
            )
        } else {
            (0.0, 0.0)
        };
        Self {
            total_queries,
            total_execution_time_secs: round3(total_time),
            avg_execution_time_secs: avg,
            slow_query_count,
            slow_query_percentage: pct,
            unique_shape_count: stats.len() as u64,
            monitoring_enabled,
            threshold_secs,
            sink_failures,
        }
    }
}
