use axum::{extract::State, http::StatusCode, response::Response, routing::get, Router};
use serde::Serialize;
use tracing::instrument;

use crate::{
    extractors::ReqId,
    response::{send_error, send_response},
    state::AppState,
};

#[derive(Debug, Serialize)]
pub struct HealthStatus {
    pub status: &'static str,
}

pub fn health_routes() -> Router<AppState> {
    Router::new().route("/healthcheck", get(healthcheck))
}

#[instrument(skip(state, request_id))]
pub async fn healthcheck(State(state): State<AppState>, ReqId(request_id): ReqId) -> Response {
    match state.health.check().await {
        Ok(status) => send_response(
            StatusCode::OK,
            Some(HealthStatus { status }),
            "Health check successful",
            request_id,
        ),
        Err(e) => send_error(
            StatusCode::INTERNAL_SERVER_ERROR,
            "Health check failed",
            Some(&e),
            request_id,
        ),
    }
}
