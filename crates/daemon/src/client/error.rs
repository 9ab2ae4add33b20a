use reqwest::StatusCode;

use common::prelude::CryptoError;

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("failed to initialize client: {0}")]
    Initialization(String),
    #[error("request failed: {0}")]
    Request(String),
    #[error("server rejected request: {0}")]
    ServerRejected(Rejection),
}

impl From<reqwest::Error> for ClientError {
    fn from(e: reqwest::Error) -> Self {
        ClientError::Request(e.to_string())
    }
}

impl From<CryptoError> for ClientError {
    fn from(e: CryptoError) -> Self {
        ClientError::Request(e.to_string())
    }
}

/// Why the server refused a request, from its status code
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum Rejection {
    #[error("malformed request")]
    BadRequest,
    #[error("forbidden")]
    Forbidden,
    #[error("not found")]
    NotFound,
    #[error("method not allowed")]
    MethodNotAllowed,
    #[error("unexpected status {0}")]
    Other(StatusCode),
}

impl From<StatusCode> for Rejection {
    fn from(status: StatusCode) -> Self {
        match status {
            StatusCode::BAD_REQUEST => Rejection::BadRequest,
            StatusCode::FORBIDDEN => Rejection::Forbidden,
            StatusCode::NOT_FOUND => Rejection::NotFound,
            StatusCode::METHOD_NOT_ALLOWED => Rejection::MethodNotAllowed,
            other => Rejection::Other(other),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_rejection_from_status() {
        assert_eq!(Rejection::from(StatusCode::BAD_REQUEST), Rejection::BadRequest);
        assert_eq!(Rejection::from(StatusCode::FORBIDDEN), Rejection::Forbidden);
        assert_eq!(Rejection::from(StatusCode::NOT_FOUND), Rejection::NotFound);
        assert_eq!(
            Rejection::from(StatusCode::METHOD_NOT_ALLOWED),
            Rejection::MethodNotAllowed
        );
        assert_eq!(
            Rejection::from(StatusCode::INTERNAL_SERVER_ERROR),
            Rejection::Other(StatusCode::INTERNAL_SERVER_ERROR)
        );
    }
}
