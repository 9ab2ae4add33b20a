use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE};
use reqwest::Response;
use url::Url;

use common::crypto::DEFAULT_RSA_BITS;
use common::prelude::*;

use super::error::{ClientError, Rejection};

pub struct Client {
    remote: Url,
    http: reqwest::Client,
    encryption_key: EncryptionPrivateKey,
    encryption_public_pem: String,
    signing_key: SigningPrivateKey,
    server_key: Option<EncryptionPublicKey>,
}

impl std::fmt::Debug for Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("remote", &self.remote.as_str())
            .field("signing_key", &self.signing_key)
            .field("has_server_key", &self.server_key.is_some())
            .finish_non_exhaustive()
    }
}

impl Client {
    /// Build a client for the server at `remote` and fetch its public key.
    ///
    /// The signing keys are the PEM pair handed out when the identity was
    /// registered.
    pub async fn initialize(
        remote: Url,
        signing_public_pem: &str,
        signing_private_pem: &str,
    ) -> Result<Self, ClientError> {
        Self::initialize_with_bits(
            remote,
            signing_public_pem,
            signing_private_pem,
            DEFAULT_RSA_BITS,
        )
        .await
    }

    /// Like [`Client::initialize`] with a chosen encryption key size
    pub async fn initialize_with_bits(
        remote: Url,
        signing_public_pem: &str,
        signing_private_pem: &str,
        bits: usize,
    ) -> Result<Self, ClientError> {
        let init_err = |e: CryptoError| ClientError::Initialization(e.to_string());

        let signing_public = SigningPublicKey::from_pem(signing_public_pem).map_err(init_err)?;
        let signing_key = SigningPrivateKey::from_pem(signing_private_pem).map_err(init_err)?;
        if signing_key.public() != signing_public {
            return Err(ClientError::Initialization(
                "signing private key does not belong to the public key".to_string(),
            ));
        }

        let encryption_key = tokio::task::spawn_blocking(move || EncryptionPrivateKey::generate(bits))
            .await
            .map_err(|e| ClientError::Initialization(e.to_string()))?
            .map_err(init_err)?;
        let encryption_public_pem = encryption_key.public().to_pem().map_err(init_err)?;

        let mut default_headers = HeaderMap::new();
        default_headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        let http = reqwest::Client::builder()
            .default_headers(default_headers)
            .build()
            .map_err(|e| ClientError::Initialization(e.to_string()))?;

        let mut client = Self {
            remote,
            http,
            encryption_key,
            encryption_public_pem,
            signing_key,
            server_key: None,
        };
        client
            .retrieve_server_key()
            .await
            .map_err(|e| ClientError::Initialization(e.to_string()))?;

        tracing::debug!(remote = %client.remote, "client initialized");
        Ok(client)
    }

    pub fn remote(&self) -> &Url {
        &self.remote
    }

    /// Fetch and cache the server's current encryption public key.
    ///
    /// A restarted server has a new key pair, so this is repeated before
    /// every secret request.
    pub async fn retrieve_server_key(&mut self) -> Result<&EncryptionPublicKey, ClientError> {
        let response = check_status(self.http.get(self.remote.clone()).send().await?)?;
        let pem = response.text().await?;
        if pem.trim().is_empty() {
            return Err(ClientError::Request("server returned an empty key".to_string()));
        }

        let key = EncryptionPublicKey::from_pem(&pem)?;
        Ok(self.server_key.insert(key))
    }

    /// Request the secret `name` and return its plaintext value.
    ///
    /// Nothing is retried: a failed call is reported as is.
    pub async fn fetch_secret(&mut self, name: &str) -> Result<String, ClientError> {
        let server_key = self.retrieve_server_key().await?;
        let payload = server_key.encrypt(name.as_bytes())?;

        let request = SecretRequest {
            payload,
            signature: self.signing_key.sign(name.as_bytes()),
            client_pubkey: self.encryption_public_pem.clone(),
        };

        let response = self
            .http
            .post(self.remote.clone())
            .json(&request)
            .send()
            .await?;
        let body: SecretResponse = check_status(response)?.json().await?;

        let value = self.encryption_key.decrypt(&body.payload)?;
        String::from_utf8(value)
            .map_err(|_| ClientError::Request("secret value is not valid UTF-8".to_string()))
    }
}

fn check_status(response: Response) -> Result<Response, ClientError> {
    let status = response.status();
    if status.is_success() {
        Ok(response)
    } else {
        Err(ClientError::ServerRejected(Rejection::from(status)))
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn unreachable() -> Url {
        // port 9 (discard) on loopback; nothing listens there in test environments
        Url::parse("http://127.0.0.1:9/").unwrap()
    }

    #[tokio::test]
    async fn test_initialize_rejects_mismatched_keys() {
        let (public, _) = generate_keys();
        let (_, other_private) = generate_keys();

        let result =
            Client::initialize_with_bits(unreachable(), &public, &other_private, 1024).await;
        assert!(matches!(result, Err(ClientError::Initialization(_))));
    }

    #[tokio::test]
    async fn test_initialize_rejects_malformed_keys() {
        let (public, private) = generate_keys();

        let result = Client::initialize_with_bits(unreachable(), "nope", &private, 1024).await;
        assert!(matches!(result, Err(ClientError::Initialization(_))));

        let result = Client::initialize_with_bits(unreachable(), &public, "nope", 1024).await;
        assert!(matches!(result, Err(ClientError::Initialization(_))));
    }

    #[tokio::test]
    async fn test_initialize_fails_without_server() {
        let (public, private) = generate_keys();
        let result = Client::initialize_with_bits(unreachable(), &public, &private, 1024).await;
        assert!(matches!(result, Err(ClientError::Initialization(_))));
    }

    fn generate_keys() -> (String, String) {
        let private = SigningPrivateKey::generate();
        (private.public().to_pem(), private.to_pem())
    }
}
