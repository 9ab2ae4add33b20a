use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;

use crate::ServiceState;

/// Ready once state exists: the key pair is generated before the listener
/// is bound, so reaching this handler means the server can answer requests.
#[tracing::instrument(skip(state))]
pub async fn handler(State(state): State<ServiceState>) -> Response {
    let identities = state.registry().snapshot().len();
    let msg = serde_json::json!({"status": "ok", "identities": identities});
    (StatusCode::OK, Json(msg)).into_response()
}
