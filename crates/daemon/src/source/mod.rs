//! Secret sources and the store the server resolves requests against
//!
//! Every backend answers the same question: given its configuration, which
//! services exist and what are their secrets? The result is a [`Secrets`]
//! snapshot that the server holds read-only for its whole lifetime.

use std::collections::HashMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use url::Url;

pub mod dotenv;
mod env;
mod vault;

pub use dotenv::DotenvSource;
pub use env::EnvSource;
pub use vault::{VaultSource, DEFAULT_TOKEN_ENV};

/// Secret name -> secret value, for a single service
pub type ServiceSecrets = HashMap<String, String>;

/// Lookup used by the request handler once a caller is authenticated
pub trait SecretStore: Send + Sync {
    /// Resolve `name` for `identity`. `None` when either is unknown.
    fn resolve(&self, identity: &str, name: &str) -> Option<String>;
}

/// A loaded set of secrets, grouped by service name
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Secrets(HashMap<String, ServiceSecrets>);

impl Secrets {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add (or extend) the secrets for `service`
    pub fn insert(&mut self, service: impl Into<String>, secrets: ServiceSecrets) {
        self.0.entry(service.into()).or_default().extend(secrets);
    }

    pub fn service(&self, service: &str) -> Option<&ServiceSecrets> {
        self.0.get(service)
    }

    pub fn services(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    /// Number of services
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<HashMap<String, ServiceSecrets>> for Secrets {
    fn from(map: HashMap<String, ServiceSecrets>) -> Self {
        Self(map)
    }
}

impl SecretStore for Secrets {
    fn resolve(&self, identity: &str, name: &str) -> Option<String> {
        self.0.get(identity)?.get(name).cloned()
    }
}

/// A backend that can produce a [`Secrets`] snapshot
#[async_trait::async_trait]
pub trait SecretSource: Send + Sync {
    async fn load(&self) -> Result<Secrets, SourceError>;
}

#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    #[error("at least one service is required")]
    NoServices,

    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("invalid line {line} in {path}")]
    InvalidLine { path: PathBuf, line: usize },

    #[error("cannot derive a service name from {0}")]
    InvalidFileName(PathBuf),

    #[error("required environment variable {0:?} not set")]
    MissingToken(String),

    #[error("vault token contains characters not allowed in a header")]
    InvalidToken,

    #[error("vault request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("vault {0:?} not found")]
    VaultNotFound(String),

    #[error("no services found in vault {0:?}")]
    EmptyVault(String),

    #[error("invalid vault URL: {0}")]
    Url(#[from] url::ParseError),
}

/// Which backend the server loads its secrets from
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SourceConfig {
    /// Process environment, grouped by `<SERVICE>_` prefixes
    Env { services: Vec<String> },

    /// One `<service>.env` file per service
    Dotenv { paths: Vec<PathBuf> },

    /// Remote vault exposed through the 1Password Connect API
    Vault {
        url: Url,
        vault: String,
        /// Environment variable holding the access token
        #[serde(default = "default_token_env")]
        token_env: String,
    },
}

fn default_token_env() -> String {
    DEFAULT_TOKEN_ENV.to_string()
}

impl Default for SourceConfig {
    fn default() -> Self {
        SourceConfig::Dotenv { paths: Vec::new() }
    }
}

impl SourceConfig {
    /// Construct the configured backend
    pub fn build(&self) -> Result<Box<dyn SecretSource>, SourceError> {
        Ok(match self {
            SourceConfig::Env { services } => Box::new(EnvSource::new(services.clone())),
            SourceConfig::Dotenv { paths } => Box::new(DotenvSource::new(paths.clone())),
            SourceConfig::Vault {
                url,
                vault,
                token_env,
            } => {
                let token = std::env::var(token_env)
                    .map_err(|_| SourceError::MissingToken(token_env.clone()))?;
                Box::new(VaultSource::new(url.clone(), vault.clone(), token)?)
            }
        })
    }

    /// Build the configured backend and load it
    pub async fn load(&self) -> Result<Secrets, SourceError> {
        let source = self.build()?;
        let secrets = source.load().await?;
        tracing::info!(services = secrets.len(), "loaded secrets");
        Ok(secrets)
    }
}
