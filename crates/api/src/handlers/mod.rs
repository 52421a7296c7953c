pub mod metrics;
pub mod views;

pub use metrics::metrics_handler;
pub use views::views_handler;

use actix_web::{
    http::header, http::StatusCode, middleware::DefaultHeaders, HttpResponse, ResponseError,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use viewcount_domain::model::ResponseHeaders;
use viewcount_domain::services::counter::CounterError;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Counter(#[from] CounterError),
}

impl ResponseError for ApiError {
    fn status_code(&self) -> StatusCode {
        match self {
            ApiError::Counter(CounterError::StoreUnavailable(_)) => StatusCode::SERVICE_UNAVAILABLE,
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code())
            .insert_header((header::CACHE_CONTROL, ResponseHeaders::CACHE_CONTROL))
            .json(ErrorBody {
                error: self.to_string(),
            })
    }
}

/// Adds the configured CORS headers to every response that lacks them,
/// error responses included.
pub fn cors_defaults(headers: &ResponseHeaders) -> DefaultHeaders {
    headers
        .cors_pairs()
        .into_iter()
        .fold(DefaultHeaders::new(), |defaults, pair| defaults.add(pair))
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
}
