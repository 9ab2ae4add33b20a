//! The vault source against an in-process mock of the Connect API

use std::net::SocketAddr;

use axum::extract::Path;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde_json::json;
use tokio::net::TcpListener;
use url::Url;

use strongbox_daemon::source::{SecretSource, SourceError, VaultSource};

const TOKEN: &str = "test-token";

fn authorized(headers: &HeaderMap) -> bool {
    headers
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        == Some(format!("Bearer {}", TOKEN).as_str())
}

async fn vaults(headers: HeaderMap) -> Response {
    if !authorized(&headers) {
        return StatusCode::UNAUTHORIZED.into_response();
    }
    Json(json!([
        {"id": "v-prod", "name": "production"},
        {"id": "v-empty", "name": "empty"},
    ]))
    .into_response()
}

async fn items(headers: HeaderMap, Path(vault): Path<String>) -> Response {
    if !authorized(&headers) {
        return StatusCode::UNAUTHORIZED.into_response();
    }
    match vault.as_str() {
        "v-prod" => Json(json!([
            {"id": "i-a", "title": "svc-a"},
            {"id": "i-b", "title": "svc-b"},
        ]))
        .into_response(),
        _ => Json(json!([])).into_response(),
    }
}

async fn item(headers: HeaderMap, Path((vault, item)): Path<(String, String)>) -> Response {
    if !authorized(&headers) || vault != "v-prod" {
        return StatusCode::UNAUTHORIZED.into_response();
    }
    match item.as_str() {
        "i-a" => Json(json!({
            "id": "i-a",
            "title": "svc-a",
            "fields": [
                {"id": "f1", "label": "DB_PASSWORD", "value": "s3cr3t"},
                {"id": "f2", "label": "notes"},
                {"id": "f3", "label": "", "value": "by-id"},
            ]
        }))
        .into_response(),
        "i-b" => Json(json!({
            "id": "i-b",
            "title": "svc-b",
            "fields": [{"id": "f1", "label": "API_KEY", "value": "bbb"}]
        }))
        .into_response(),
        _ => StatusCode::NOT_FOUND.into_response(),
    }
}

async fn start_mock() -> Url {
    start_mock_at("").await
}

/// Serves the mock API below `prefix`; the returned URL carries the prefix
/// without a trailing slash.
async fn start_mock_at(prefix: &str) -> Url {
    let api = Router::new()
        .route("/v1/vaults", get(vaults))
        .route("/v1/vaults/:vault/items", get(items))
        .route("/v1/vaults/:vault/items/:item", get(item));
    let router = if prefix.is_empty() {
        api
    } else {
        Router::new().nest(prefix, api)
    };

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr: SocketAddr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    Url::parse(&format!("http://{}{}", addr, prefix)).unwrap()
}

#[tokio::test]
async fn loads_items_as_services() {
    let url = start_mock().await;
    let source = VaultSource::new(url, "production".to_string(), TOKEN.to_string()).unwrap();

    let secrets = source.load().await.unwrap();
    assert_eq!(secrets.len(), 2);

    let svc_a = secrets.service("svc-a").unwrap();
    assert_eq!(svc_a["DB_PASSWORD"], "s3cr3t");
    // fields without a value are skipped, unlabelled ones fall back to the id
    assert!(!svc_a.contains_key("notes"));
    assert_eq!(svc_a["f3"], "by-id");

    assert_eq!(secrets.service("svc-b").unwrap()["API_KEY"], "bbb");
}

#[tokio::test]
async fn keeps_base_path() {
    let url = start_mock_at("/op").await;
    assert_eq!(url.path(), "/op");
    let source = VaultSource::new(url, "production".to_string(), TOKEN.to_string()).unwrap();

    let secrets = source.load().await.unwrap();
    assert_eq!(secrets.service("svc-a").unwrap()["DB_PASSWORD"], "s3cr3t");
}

#[tokio::test]
async fn unknown_vault() {
    let url = start_mock().await;
    let source = VaultSource::new(url, "missing".to_string(), TOKEN.to_string()).unwrap();
    assert!(matches!(
        source.load().await,
        Err(SourceError::VaultNotFound(name)) if name == "missing"
    ));
}

#[tokio::test]
async fn empty_vault() {
    let url = start_mock().await;
    let source = VaultSource::new(url, "empty".to_string(), TOKEN.to_string()).unwrap();
    assert!(matches!(source.load().await, Err(SourceError::EmptyVault(_))));
}

#[tokio::test]
async fn bad_token() {
    let url = start_mock().await;
    let source = VaultSource::new(url, "production".to_string(), "wrong".to_string()).unwrap();
    assert!(matches!(source.load().await, Err(SourceError::Http(_))));
}
