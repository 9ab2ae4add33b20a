use std::path::{Path, PathBuf};
use std::sync::Arc;

use common::crypto::generate_encryption_keypair;
use common::prelude::*;

use crate::source::{SecretStore, SourceError};
use crate::ServiceConfig;

/// Everything a request handler needs, cheap to clone
#[derive(Clone)]
pub struct State {
    encryption_key: Arc<EncryptionPrivateKey>,
    public_key_pem: Arc<str>,
    registry: SharedRegistry,
    registry_path: Option<PathBuf>,
    store: Arc<dyn SecretStore>,
}

impl std::fmt::Debug for State {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("State")
            .field("registry_entries", &self.registry.snapshot().len())
            .field("registry_path", &self.registry_path)
            .finish_non_exhaustive()
    }
}

impl State {
    pub fn new(
        encryption_key: EncryptionPrivateKey,
        registry: SharedRegistry,
        store: Arc<dyn SecretStore>,
    ) -> Result<Self, StateSetupError> {
        let public_key_pem = encryption_key.public().to_pem()?;
        Ok(Self {
            encryption_key: Arc::new(encryption_key),
            public_key_pem: public_key_pem.into(),
            registry,
            registry_path: None,
            store,
        })
    }

    /// Remember where the registry came from so it can be reloaded
    pub fn with_registry_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.registry_path = Some(path.into());
        self
    }

    /// Load the registry and secrets, then generate this process's key pair.
    pub async fn from_config(config: &ServiceConfig) -> Result<Self, StateSetupError> {
        let registry = Registry::load(&config.registry_path)?;
        if registry.is_empty() {
            tracing::warn!(
                path = %config.registry_path.display(),
                "registry is empty, every secret request will be refused"
            );
        }

        let secrets = config.source.load().await?;

        let bits = config.rsa_bits;
        let (_, encryption_key) =
            tokio::task::spawn_blocking(move || generate_encryption_keypair(bits)).await??;
        tracing::info!(bits, identities = registry.len(), "server key pair generated");

        Ok(Self::new(
            encryption_key,
            SharedRegistry::new(registry),
            Arc::new(secrets),
        )?
        .with_registry_path(&config.registry_path))
    }

    pub fn encryption_key(&self) -> &EncryptionPrivateKey {
        &self.encryption_key
    }

    /// Server encryption public key as PEM, served on `GET /`
    pub fn public_key_pem(&self) -> &str {
        &self.public_key_pem
    }

    pub fn registry(&self) -> &SharedRegistry {
        &self.registry
    }

    pub fn registry_path(&self) -> Option<&Path> {
        self.registry_path.as_deref()
    }

    pub fn store(&self) -> &dyn SecretStore {
        self.store.as_ref()
    }

    /// Re-read the registry file and swap it in.
    ///
    /// On failure the current snapshot stays in place.
    pub fn reload_registry(&self) -> Result<usize, RegistryError> {
        let Some(path) = self.registry_path.as_deref() else {
            return Ok(self.registry.snapshot().len());
        };
        let registry = Registry::load(path)?;
        let count = registry.len();
        self.registry.replace(registry);
        Ok(count)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum StateSetupError {
    #[error("registry error: {0}")]
    Registry(#[from] RegistryError),
    #[error("secret source error: {0}")]
    Source(#[from] SourceError),
    #[error("key error: {0}")]
    Crypto(#[from] CryptoError),
    #[error("key generation task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}
