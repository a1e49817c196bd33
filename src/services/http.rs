use crate::core::report::{DEFAULT_RECENT_LIMIT, DEFAULT_SLOW_LIMIT, DEFAULT_STATS_LIMIT};
use crate::core::MonitorHandle;
use crate::observability::prom;

use actix_web::{web, HttpResponse};
use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize)]
pub struct LimitQuery {
    pub limit: Option<i64>,
}

impl LimitQuery {
    /// Negative limits mean "nothing", not an error.
    fn resolve(&self, default: usize) -> usize {
        match self.limit {
            Some(n) => usize::try_from(n).unwrap_or(0),
            None => default,
        }
    }
}

#[derive(Serialize)]
struct Message<'a> {
    success: bool,
    message: &'a str,
}

#[derive(Serialize)]
struct Envelope<T: Serialize> {
    success: bool,
    data: T,
}

fn ok<T: Serialize>(data: T) -> HttpResponse {
    HttpResponse::Ok().json(Envelope { success: true, data })
}

/// Mount the reporting endpoints. Expects `web::Data<MonitorHandle>` in app data.
///
/// ```rust,ignore
/// App::new()
///     .app_data(web::Data::new(handle.clone()))
///     .service(web::scope("/query_monitor").configure(querymon::services::http::configure))
/// ```
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.route("/api/stats", web::get().to(stats))
        .route("/api/slow-queries", web::get().to(slow_queries))
        .route("/api/recent-queries", web::get().to(recent_queries))
        .route("/api/performance-report", web::get().to(performance_report))
        .route("/api/clear-stats", web::post().to(clear_stats))
        .route("/metrics", web::get().to(prom::metrics_handler));
}

async fn stats(monitor: web::Data<MonitorHandle>, q: web::Query<LimitQuery>) -> HttpResponse {
    ok(monitor.query_stats(q.resolve(DEFAULT_STATS_LIMIT)))
}

async fn slow_queries(monitor: web::Data<MonitorHandle>, q: web::Query<LimitQuery>) -> HttpResponse {
    ok(monitor.slow_queries(q.resolve(DEFAULT_SLOW_LIMIT)))
}

async fn recent_queries(monitor: web::Data<MonitorHandle>, q: web::Query<LimitQuery>) -> HttpResponse {
    ok(monitor.recent_queries(q.resolve(DEFAULT_RECENT_LIMIT)))
}

async fn performance_report(monitor: web::Data<MonitorHandle>) -> HttpResponse {
    ok(monitor.performance_report())
}

async fn clear_stats(monitor: web::Data<MonitorHandle>) -> HttpResponse {
    monitor.clear_stats();
    HttpResponse::Ok().json(Message { success: true, message: "statistics cleared" })
}
