pub mod monitor;
pub mod normalize;
pub mod recent;
pub mod report;
pub mod stats;

pub use monitor::{MonitorHandle, QueryMonitor};
pub use normalize::normalize_sql;
pub use recent::QueryRecord;
pub use report::PerformanceReport;
pub use stats::{StatView, StatementKind};
