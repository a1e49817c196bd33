pub mod prom;
pub mod sink;
pub mod slack;

pub use sink::{FileSlowQuerySink, SlowQueryEvent, SlowQuerySink, TracingSlowQuerySink};
pub use slack::SlackSlowQuerySink;
