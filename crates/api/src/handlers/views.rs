use actix_web::{http::StatusCode, web, HttpResponse};
use metrics::counter;
use strum_macros::AsRefStr;
use viewcount_domain::model::InvocationResponse;

use crate::state::AppState;

use super::ApiError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, AsRefStr)]
#[strum(serialize_all = "snake_case")]
enum ViewRequestStatus {
    Success,
    StoreUnavailable,
}

fn record_request(status: ViewRequestStatus) {
    let status_tag = status.as_ref().to_owned();
    counter!("api_view_requests_total", "status" => status_tag).increment(1);
}

/// Counts one view and answers with `{"views": n}`. The request itself is
/// ignored beyond triggering the increment.
pub async fn views_handler(state: web::Data<AppState>) -> Result<HttpResponse, ApiError> {
    let views = state
        .counter()
        .increment_and_get()
        .await
        .inspect_err(|_| record_request(ViewRequestStatus::StoreUnavailable))?;
    record_request(ViewRequestStatus::Success);

    let invocation = InvocationResponse::views(views, state.response_headers());
    Ok(render_invocation(invocation))
}

pub fn render_invocation(invocation: InvocationResponse) -> HttpResponse {
    let status = StatusCode::from_u16(invocation.status_code)
        .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    let mut builder = HttpResponse::build(status);
    for (name, value) in invocation.headers {
        builder.insert_header((name, value));
    }
    builder.body(invocation.body)
}
