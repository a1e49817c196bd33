use actix_web::HttpResponse;
use once_cell::sync::OnceCell;
use prometheus::{
    Encoder, HistogramOpts, HistogramVec, IntCounter, IntCounterVec, Opts, Registry, TextEncoder,
};

use crate::core::stats::StatementKind;

static REGISTRY: OnceCell<Registry> = OnceCell::new();
static METRICS: OnceCell<Metrics> = OnceCell::new();

struct Metrics {
    queries: IntCounterVec,
    query_duration: HistogramVec,
    slow_queries: IntCounterVec,
    sink_failures: IntCounter,
}

fn default_buckets_seconds() -> Vec<f64> {
    // Prometheus-default-ish buckets for latency (seconds)
    vec![0.005,0.01,0.025,0.05,0.1,0.25,0.5,1.0,2.5,5.0,10.0]
}

impl Metrics {
    fn new() -> prometheus::Result<Self> {
        Ok(Self {
            queries: IntCounterVec::new(
                Opts::new("querymon_queries_total", "SQL statements recorded"),
                &["kind"],
            )?,
            query_duration: HistogramVec::new(
                HistogramOpts::new("querymon_query_duration_seconds", "SQL statement latency (s)")
                    .buckets(default_buckets_seconds()),
                &["kind"],
            )?,
            slow_queries: IntCounterVec::new(
                Opts::new("querymon_slow_queries_total", "SQL statements over the slow threshold"),
                &["kind"],
            )?,
            sink_failures: IntCounter::new(
                "querymon_sink_failures_total",
                "Slow-query sink writes that failed and were dropped",
            )?,
        })
    }

    fn register(&self, registry: &Registry) -> prometheus::Result<()> {
        registry.register(Box::new(self.queries.clone()))?;
        registry.register(Box::new(self.query_duration.clone()))?;
        registry.register(Box::new(self.slow_queries.clone()))?;
        registry.register(Box::new(self.sink_failures.clone()))?;
        Ok(())
    }
}

/// Create and register the process-wide metrics. Safe to call repeatedly.
pub fn init_prometheus() {
    let registry = REGISTRY.get_or_init(Registry::new);
    if METRICS.get().is_some() {
        return;
    }
    let metrics = match Metrics::new() {
        Ok(m) => m,
        Err(e) => {
            tracing::warn!(target: "querymon", "prometheus metrics unavailable: {}", e);
            return;
        }
    };
    // lost the race to another initializer
    if METRICS.set(metrics).is_err() {
        return;
    }
    if let Some(m) = METRICS.get() {
        if let Err(e) = m.register(registry) {
            tracing::warn!(target: "querymon", "prometheus registration failed: {}", e);
        }
    }
}

// Called by the monitor on every recorded statement
pub fn observe_query(kind: StatementKind, dur_seconds: f64, slow: bool) {
    if let Some(m) = METRICS.get() {
        let label = [kind.as_str()];
        m.queries.with_label_values(&label).inc();
        m.query_duration.with_label_values(&label).observe(dur_seconds);
        if slow {
            m.slow_queries.with_label_values(&label).inc();
        }
    }
}

pub fn inc_sink_failures() {
    if let Some(m) = METRICS.get() { m.sink_failures.inc(); }
}

pub async fn metrics_handler() -> HttpResponse {
    init_prometheus();
    match REGISTRY.get() {
        Some(registry) => encode(registry),
        None => HttpResponse::ServiceUnavailable().body("metrics registry not initialised"),
    }
}

fn encode(registry: &Registry) -> HttpResponse {
    let encoder = TextEncoder::new();
    let mf = registry.gather();
    let mut buf = Vec::new();
    if let Err(e) = encoder.encode(&mf, &mut buf) {
        return HttpResponse::InternalServerError().body(format!("encode error: {e}"));
    }
    HttpResponse::Ok()
        .content_type(encoder.format_type())
        .body(buf)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn observations_land_in_registry() {
        init_prometheus();
        init_prometheus();
        observe_query(StatementKind::Select, 0.02, false);
        observe_query(StatementKind::Select, 1.2, true);

        let registry = REGISTRY.get().unwrap();
        let mut buf = Vec::new();
        TextEncoder::new().encode(&registry.gather(), &mut buf).unwrap();
        let text = String::from_utf8(buf).unwrap();
        assert!(text.contains("querymon_queries_total{kind=\"select\"}"));
        assert!(text.contains("querymon_slow_queries_total{kind=\"select\"}"));
        assert!(text.contains("querymon_query_duration_seconds_bucket"));
    }
}
