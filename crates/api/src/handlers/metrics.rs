use actix_web::{http::header, web, HttpResponse};
use viewcount_domain::model::ResponseHeaders;

use crate::state::AppState;

const PROMETHEUS_CONTENT_TYPE: &str = "text/plain; version=0.0.4";

/// Prometheus text exposition of the process-wide recorder.
pub async fn metrics_handler(state: web::Data<AppState>) -> HttpResponse {
    HttpResponse::Ok()
        .content_type(PROMETHEUS_CONTENT_TYPE)
        .insert_header((header::CACHE_CONTROL, ResponseHeaders::CACHE_CONTROL))
        .body(state.telemetry().render_metrics())
}
