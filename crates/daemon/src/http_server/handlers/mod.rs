use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};

use common::protocol::ALLOWED_METHODS;

pub mod public_key;
pub mod secret;

pub async fn options_handler() -> Response {
    (StatusCode::OK, [(header::ALLOW, ALLOWED_METHODS)]).into_response()
}

pub async fn method_not_allowed_handler() -> Response {
    (
        StatusCode::METHOD_NOT_ALLOWED,
        [(header::ALLOW, ALLOWED_METHODS)],
        "method not allowed",
    )
        .into_response()
}

pub async fn not_found_handler() -> Response {
    (StatusCode::NOT_FOUND, "not found").into_response()
}
