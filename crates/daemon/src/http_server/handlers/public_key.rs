use axum::extract::State;
use axum::http::header;
use axum::response::{IntoResponse, Response};

use crate::ServiceState;

/// Serve the server's encryption public key as plain PEM text
pub async fn handler(State(state): State<ServiceState>) -> Response {
    (
        [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
        state.public_key_pem().to_string(),
    )
        .into_response()
}
