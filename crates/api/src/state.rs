use viewcount_domain::model::ResponseHeaders;
use viewcount_domain::services::{counter::CounterService, telemetry::TelemetryGuard};

#[derive(Clone)]
pub struct AppState {
    counter: CounterService,
    response_headers: ResponseHeaders,
    telemetry: TelemetryGuard,
}

impl AppState {
    pub fn new(
        counter: CounterService,
        response_headers: ResponseHeaders,
        telemetry: TelemetryGuard,
    ) -> Self {
        Self {
            counter,
            response_headers,
            telemetry,
        }
    }

    pub fn counter(&self) -> &CounterService {
        &self.counter
    }

    pub fn response_headers(&self) -> &ResponseHeaders {
        &self.response_headers
    }

    pub fn telemetry(&self) -> &TelemetryGuard {
        &self.telemetry
    }
}
