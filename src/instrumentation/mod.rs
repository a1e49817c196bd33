pub mod timed;

#[cfg(feature = "sqlx")]
pub mod sql_events;

pub use timed::{timed, timed_async};

#[cfg(feature = "sqlx")]
pub use sql_events::SqlxQueryLayer;
