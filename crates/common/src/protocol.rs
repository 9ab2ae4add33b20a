//! Wire types exchanged between the client driver and the server
//!
//! `POST /` carries a [`SecretRequest`] and, on success, returns a
//! [`SecretResponse`]. `GET /` returns the server's encryption public key as
//! plain PEM text and needs no type.

use serde::{Deserialize, Serialize};

/// Value of the `Allow` header returned for `OPTIONS /`
pub const ALLOWED_METHODS: &str = "GET, POST";

/// A request for one named secret
///
/// - `payload`: the secret name, encrypted under the server's encryption key
/// - `signature`: the requester's signature over the *plaintext* secret name
/// - `client_pubkey`: the requester's encryption public key (PEM), used to
///   encrypt the response
///
/// Signing the plaintext rather than the ciphertext means the signature does
/// not bind a particular ciphertext. A captured request can be replayed for as
/// long as the server keeps the same encryption key pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecretRequest {
    pub payload: String,
    pub signature: String,
    pub client_pubkey: String,
}

/// The secret value, encrypted under the requester's encryption key
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecretResponse {
    pub payload: String,
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_request_field_names() {
        let request = SecretRequest {
            payload: "c2VjcmV0".to_string(),
            signature: "c2ln".to_string(),
            client_pubkey: "-----BEGIN PUBLIC KEY-----".to_string(),
        };
        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(value["payload"], "c2VjcmV0");
        assert_eq!(value["signature"], "c2ln");
        assert_eq!(value["client_pubkey"], "-----BEGIN PUBLIC KEY-----");
    }

    #[test]
    fn test_request_rejects_missing_fields() {
        let result = serde_json::from_str::<SecretRequest>(r#"{"payload": "abc"}"#);
        assert!(result.is_err());
    }
}
