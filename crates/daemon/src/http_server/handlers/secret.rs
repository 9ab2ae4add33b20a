use std::net::SocketAddr;

use axum::body::Bytes;
use axum::extract::rejection::BytesRejection;
use axum::extract::{ConnectInfo, Extension, Json, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

use common::prelude::{EncryptionPublicKey, SecretRequest, SecretResponse};

use crate::http_server::Config;
use crate::ServiceState;

/// Answer one secret request.
///
/// Each step either passes or ends the request:
///  1. read and parse the JSON body (400, oversized bodies included)
///  2. decrypt the secret name (400, same as a bad body)
///  3. check the caller's network (403)
///  4. authenticate the signature against the registry (403)
///  5. resolve the secret for the authenticated identity (404)
///  6. encrypt the value for the caller (500)
pub async fn handler(
    State(state): State<ServiceState>,
    Extension(config): Extension<Config>,
    connect_info: Option<ConnectInfo<SocketAddr>>,
    body: Result<Bytes, BytesRejection>,
) -> Result<Json<SecretResponse>, SecretRequestError> {
    let body = body.map_err(|e| {
        tracing::debug!("unreadable request body: {}", e);
        SecretRequestError::BadRequest
    })?;
    let request: SecretRequest =
        serde_json::from_slice(&body).map_err(|_| SecretRequestError::BadRequest)?;

    let name = state
        .encryption_key()
        .decrypt(&request.payload)
        .map_err(|_| SecretRequestError::BadRequest)?;

    let Some(ConnectInfo(peer)) = connect_info else {
        tracing::warn!("no connection info, refusing request");
        return Err(SecretRequestError::Forbidden);
    };
    if !config.allows(peer.ip()) {
        tracing::warn!(caller = %peer.ip(), "caller outside allowed network");
        return Err(SecretRequestError::Forbidden);
    }

    let registry = state.registry().snapshot();
    let identity = match registry.authenticate(&name, &request.signature) {
        Ok(Some(entry)) => entry.name.clone(),
        Ok(None) => {
            tracing::warn!(caller = %peer.ip(), "signature matches no registered identity");
            return Err(SecretRequestError::Forbidden);
        }
        Err(_) => return Err(SecretRequestError::BadRequest),
    };

    // A name that is not UTF-8 can never match a stored secret
    let name = String::from_utf8(name).map_err(|_| SecretRequestError::NotFound)?;
    let value = state.store().resolve(&identity, &name).ok_or_else(|| {
        tracing::info!(%identity, %name, "no such secret");
        SecretRequestError::NotFound
    })?;

    let payload = EncryptionPublicKey::from_pem(&request.client_pubkey)
        .and_then(|key| key.encrypt(value.as_bytes()))
        .map_err(|e| {
            tracing::error!(%identity, %name, "failed to encrypt response: {}", e);
            SecretRequestError::Internal
        })?;

    tracing::info!(%identity, %name, "secret released");
    Ok(Json(SecretResponse { payload }))
}

/// Request outcomes other than success
///
/// Bodies are fixed strings; nothing about which check failed, or why, is
/// sent back to the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum SecretRequestError {
    #[error("bad request")]
    BadRequest,
    #[error("forbidden")]
    Forbidden,
    #[error("not found")]
    NotFound,
    #[error("server error")]
    Internal,
}

impl SecretRequestError {
    pub fn status(&self) -> StatusCode {
        match self {
            SecretRequestError::BadRequest => StatusCode::BAD_REQUEST,
            SecretRequestError::Forbidden => StatusCode::FORBIDDEN,
            SecretRequestError::NotFound => StatusCode::NOT_FOUND,
            SecretRequestError::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for SecretRequestError {
    fn into_response(self) -> Response {
        (self.status(), self.to_string()).into_response()
    }
}

#[cfg(test)]
mod test {
    use axum::body::Body;
    use axum::http::{Method, StatusCode};
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine;

    use common::prelude::*;

    use crate::http_server::test_support::*;

    const INSIDE: &str = "10.0.0.5:40000";
    const OUTSIDE: &str = "192.168.1.5:40000";

    async fn decrypt_response(harness: &Harness, response: axum::http::Response<Body>) -> String {
        let body: SecretResponse = serde_json::from_str(&body_string(response).await).unwrap();
        let plain = harness.client_key.decrypt(&body.payload).unwrap();
        String::from_utf8(plain).unwrap()
    }

    #[tokio::test]
    async fn test_releases_secret() {
        let harness = Harness::new();
        let request = harness.request_body("DB_PASSWORD", &harness.svc_a);

        let response = harness.post(&request, INSIDE).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(decrypt_response(&harness, response).await, "s3cr3t");
        assert_eq!(harness.store.calls(), 1);
    }

    #[tokio::test]
    async fn test_ipv4_mapped_caller_is_inside() {
        let harness = Harness::new();
        let request = harness.request_body("DB_PASSWORD", &harness.svc_a);

        let response = harness.post(&request, "[::ffff:10.0.0.9]:40000").await;
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_outside_network_never_resolves() {
        let harness = Harness::new();
        let request = harness.request_body("DB_PASSWORD", &harness.svc_a);

        let response = harness.post(&request, OUTSIDE).await;
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        assert_eq!(body_string(response).await, "forbidden");
        assert_eq!(harness.store.calls(), 0);
    }

    #[tokio::test]
    async fn test_missing_connect_info_is_forbidden() {
        let harness = Harness::new();
        let request = harness.request_body("DB_PASSWORD", &harness.svc_a);
        let body = serde_json::to_vec(&request).unwrap();

        let response = harness
            .send(Method::POST, "/", Body::from(body), None)
            .await;
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        assert_eq!(harness.store.calls(), 0);
    }

    #[tokio::test]
    async fn test_unregistered_signer_never_resolves() {
        let harness = Harness::new();
        // API_KEY exists, but for svc-b, and this key is not registered at all
        let stranger = SigningPrivateKey::generate();
        let request = harness.request_body("API_KEY", &stranger);

        let response = harness.post(&request, INSIDE).await;
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        assert_eq!(harness.store.calls(), 0);
    }

    #[tokio::test]
    async fn test_identity_only_sees_its_own_secrets() {
        let harness = Harness::new();
        let request = harness.request_body("API_KEY", &harness.svc_a);

        let response = harness.post(&request, INSIDE).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(body_string(response).await, "not found");
    }

    #[tokio::test]
    async fn test_unknown_secret_not_found() {
        let harness = Harness::new();
        let request = harness.request_body("DOES_NOT_EXIST", &harness.svc_a);

        let response = harness.post(&request, INSIDE).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(harness.store.calls(), 1);
    }

    #[tokio::test]
    async fn test_signature_over_other_name_is_forbidden() {
        let harness = Harness::new();
        let mut request = harness.request_body("DB_PASSWORD", &harness.svc_a);
        request.signature = harness.svc_a.sign(b"SOMETHING_ELSE");

        let response = harness.post(&request, INSIDE).await;
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        assert_eq!(harness.store.calls(), 0);
    }

    #[tokio::test]
    async fn test_tampered_ciphertext_is_bad_request() {
        let harness = Harness::new();
        let mut request = harness.request_body("DB_PASSWORD", &harness.svc_a);
        let mut bytes = STANDARD.decode(&request.payload).unwrap();
        bytes[10] ^= 0x01;
        request.payload = STANDARD.encode(bytes);

        let response = harness.post(&request, INSIDE).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = body_string(response).await;
        assert_eq!(body, "bad request");
        assert!(!body.contains("DB_PASSWORD"));
        assert_eq!(harness.store.calls(), 0);
    }

    #[tokio::test]
    async fn test_malformed_json_matches_decrypt_failure() {
        let harness = Harness::new();
        for body in [
            "not json",
            "{}",
            r#"{"payload": "abc"}"#,
            r#"{"payload": 1, "signature": "", "client_pubkey": ""}"#,
        ] {
            let response = harness
                .send(Method::POST, "/", Body::from(body), Some(INSIDE))
                .await;
            assert_eq!(response.status(), StatusCode::BAD_REQUEST);
            assert_eq!(body_string(response).await, "bad request");
        }

        let mut request = harness.request_body("DB_PASSWORD", &harness.svc_a);
        request.payload = "!!not base64!!".to_string();
        let response = harness.post(&request, INSIDE).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_string(response).await, "bad request");
    }

    #[tokio::test]
    async fn test_oversized_body_is_bad_request() {
        let harness = Harness::new();
        let body = vec![b'a'; crate::http_server::MAX_REQUEST_SIZE_BYTES + 6 * 1024];

        let response = harness
            .send(Method::POST, "/", Body::from(body), Some(INSIDE))
            .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_string(response).await, "bad request");
        assert_eq!(harness.store.calls(), 0);
    }

    #[tokio::test]
    async fn test_malformed_signature_is_bad_request() {
        let harness = Harness::new();
        let mut request = harness.request_body("DB_PASSWORD", &harness.svc_a);
        request.signature = STANDARD.encode([0u8; 7]);

        let response = harness.post(&request, INSIDE).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(harness.store.calls(), 0);
    }

    #[tokio::test]
    async fn test_malformed_signature_outside_network_is_forbidden() {
        let harness = Harness::new();
        let mut request = harness.request_body("DB_PASSWORD", &harness.svc_a);
        request.signature = "garbage".to_string();

        let response = harness.post(&request, OUTSIDE).await;
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn test_unusable_client_key_is_server_error() {
        let harness = Harness::new();
        let mut request = harness.request_body("DB_PASSWORD", &harness.svc_a);
        request.client_pubkey = "not a key".to_string();

        let response = harness.post(&request, INSIDE).await;
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body_string(response).await, "server error");
    }

    #[tokio::test]
    async fn test_registry_swap_takes_effect() {
        let harness = Harness::new();
        let request = harness.request_body("DB_PASSWORD", &harness.svc_a);

        let mut rotated = Registry::new();
        rotated.provision("svc-a").unwrap();
        harness.state.registry().replace(rotated);

        let response = harness.post(&request, INSIDE).await;
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }
}
