pub mod global;

pub use global::{init_tracing, MonitorConfig};
