//! Route handlers.

use axum::{extract::State, http::StatusCode};
use chrono::Utc;

use crate::fields;
use crate::http::server::AppState;
use crate::math;

pub const HEALTHY_BODY: &str = "Healthy!";
pub const TEST_BODY: &str = "Hello, Loki!";

/// Always negative, so every `/test` call exercises the error path.
const DEMO_INPUT: f64 = -1.0;

/// `GET /`
pub async fn health() -> &'static str {
    HEALTHY_BODY
}

/// `GET /test`: logs a start record, trips the guarded square root and logs
/// the failure. The response does not depend on the outcome.
pub async fn test(State(state): State<AppState>) -> &'static str {
    state.logger.info(
        "FROM /test",
        fields! { "start" => format!("start handler /test {}", Utc::now().to_rfc3339()) },
    );

    if let Err(e) = math::sqrt(DEMO_INPUT) {
        state.logger.error("FROM /test", fields! { "error" => e.to_string() });
    }

    TEST_BODY
}

/// Fallback for unknown routes. The request log derives the error text from
/// the status.
pub async fn not_found() -> (StatusCode, &'static str) {
    (StatusCode::NOT_FOUND, "Not Found")
}
