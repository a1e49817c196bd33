//! In-process SQL query observability.
//!
//! The host calls [`QueryMonitor::record`] once per executed statement (directly,
//! through [`instrumentation::timed`], or via the SQLx tracing layer) and polls
//! the reporting methods or the actix endpoints in [`services::http`].

pub mod config;
pub mod core;
pub mod error;
pub mod instrumentation;
pub mod observability;
pub mod services;

pub use crate::config::{init_tracing, MonitorConfig};
pub use crate::core::{
    normalize_sql, MonitorHandle, PerformanceReport, QueryMonitor, QueryRecord, StatView,
    StatementKind,
};
pub use error::SinkError;
pub use observability::prom::init_prometheus;
pub use observability::{SlowQueryEvent, SlowQuerySink};
