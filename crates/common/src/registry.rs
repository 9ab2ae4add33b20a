//! Trust registry of client identities and their verification keys
//!
//! Signing keys are created before either side is deployed:
//! - the public half of every identity's key is written to a YAML registry
//!   file that the server loads at startup
//! - the private half is handed to the client, which signs every request
//!
//! The registry is the only source of authorization. An identity without an
//! entry can never be authenticated.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::crypto::{decode_signature, CryptoError, SigningPrivateKey, SigningPublicKey};

/// One registered client identity
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistryEntry {
    pub name: String,
    #[serde(rename = "keypub")]
    pub key_pub: SigningPublicKey,
}

/// Ordered list of registered identities
///
/// At most one entry exists per identity name. Order is insertion order and
/// only matters for deterministic authentication when two identities share a
/// key, which should not happen in practice.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Registry {
    entries: Vec<RegistryEntry>,
}

#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("failed to read registry {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("malformed registry {path}: {source}")]
    Malformed {
        path: PathBuf,
        source: serde_yaml::Error,
    },
    #[error("malformed registry {path}: file is empty, write `[]` for an empty registry")]
    Empty { path: PathBuf },
    #[error("malformed registry {path}: duplicate entry for {name:?}")]
    Duplicate { path: PathBuf, name: String },
    #[error("failed to write registry {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to serialize registry: {0}")]
    Serialize(#[from] serde_yaml::Error),
    #[error("invalid identity: {0:?}")]
    InvalidIdentity(String),
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> &[RegistryEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, name: &str) -> Option<&RegistryEntry> {
        self.entries.iter().find(|entry| entry.name == name)
    }

    /// Insert or replace the entry for `name`.
    ///
    /// An existing entry keeps its position and has its key replaced. Returns
    /// the key that was replaced, if any.
    pub fn upsert(
        &mut self,
        name: &str,
        key_pub: SigningPublicKey,
    ) -> Result<Option<SigningPublicKey>, RegistryError> {
        let name = normalize_identity(name)?;
        match self.entries.iter_mut().find(|entry| entry.name == name) {
            Some(entry) => Ok(Some(std::mem::replace(&mut entry.key_pub, key_pub))),
            None => {
                self.entries.push(RegistryEntry { name, key_pub });
                Ok(None)
            }
        }
    }

    /// Remove the entry for `name`. Returns whether an entry existed.
    pub fn remove(&mut self, name: &str) -> bool {
        let before = self.entries.len();
        self.entries.retain(|entry| entry.name != name.trim());
        self.entries.len() != before
    }

    /// Generate a fresh signing key pair for `identity` and upsert its public
    /// half. Any earlier key for the identity stops authenticating.
    pub fn provision(
        &mut self,
        identity: &str,
    ) -> Result<(SigningPublicKey, SigningPrivateKey), RegistryError> {
        let private = SigningPrivateKey::generate();
        let public = private.public();
        let replaced = self.upsert(identity, public.clone())?;
        tracing::info!(
            identity = identity.trim(),
            rotated = replaced.is_some(),
            "provisioned signing key"
        );
        Ok((public, private))
    }

    /// Find the identity whose verification key accepts `signature` over
    /// `message`.
    ///
    /// Entries are tried in order and the first match wins. `Ok(None)` means
    /// no registered identity signed the message.
    ///
    /// # Errors
    ///
    /// Returns [`CryptoError::Verification`] if the signature cannot be
    /// decoded at all.
    pub fn authenticate(
        &self,
        message: &[u8],
        signature: &str,
    ) -> Result<Option<&RegistryEntry>, CryptoError> {
        let signature = decode_signature(signature)?;
        Ok(self
            .entries
            .iter()
            .find(|entry| entry.key_pub.verify_decoded(message, &signature)))
    }

    /// Parse a registry from YAML text
    pub fn from_yaml(text: &str) -> Result<Self, serde_yaml::Error> {
        serde_yaml::from_str(text)
    }

    pub fn to_yaml(&self) -> Result<String, RegistryError> {
        Ok(serde_yaml::to_string(self)?)
    }

    /// Load a registry file.
    ///
    /// A file containing an explicit empty list (`[]`) loads as an empty
    /// registry. A missing, unreadable or malformed file, or one with two
    /// entries for the same identity, is an error.
    pub fn load(path: &Path) -> Result<Self, RegistryError> {
        let text = fs::read_to_string(path).map_err(|source| RegistryError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        if text.trim().is_empty() {
            return Err(RegistryError::Empty {
                path: path.to_path_buf(),
            });
        }
        let registry = Self::from_yaml(&text).map_err(|source| RegistryError::Malformed {
            path: path.to_path_buf(),
            source,
        })?;

        for (i, entry) in registry.entries.iter().enumerate() {
            if registry.entries[..i].iter().any(|e| e.name == entry.name) {
                return Err(RegistryError::Duplicate {
                    path: path.to_path_buf(),
                    name: entry.name.clone(),
                });
            }
        }

        tracing::debug!(path = %path.display(), entries = registry.len(), "loaded registry");
        Ok(registry)
    }

    /// Write the registry to `path`, replacing the file atomically.
    pub fn persist(&self, path: &Path) -> Result<(), RegistryError> {
        let yaml = self.to_yaml()?;
        let write_err = |source: std::io::Error| RegistryError::Write {
            path: path.to_path_buf(),
            source,
        };

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(write_err)?;
        }
        let tmp = path.with_extension("tmp");
        fs::write(&tmp, yaml).map_err(write_err)?;
        fs::rename(&tmp, path).map_err(write_err)?;

        tracing::debug!(path = %path.display(), entries = self.len(), "persisted registry");
        Ok(())
    }

    /// Load the registry at `path`, or start an empty one if no file exists yet.
    fn load_or_new(path: &Path) -> Result<Self, RegistryError> {
        if path.exists() {
            Self::load(path)
        } else {
            tracing::info!(path = %path.display(), "registry file not found, starting a new one");
            Ok(Self::new())
        }
    }
}

/// Register `identity` in the registry file at `path`.
///
/// Generates a new signing key pair, upserts the public half, persists the
/// registry and returns `(public, private)`. The private key must reach the
/// client out of band; it is not stored anywhere by this call.
pub fn register(
    identity: &str,
    path: &Path,
) -> Result<(SigningPublicKey, SigningPrivateKey), RegistryError> {
    let mut registry = Registry::load_or_new(path)?;
    let keys = registry.provision(identity)?;
    registry.persist(path)?;
    Ok(keys)
}

/// Register every identity in `identities` with one load/persist cycle.
///
/// Returns each identity with its new private key, in input order.
pub fn bootstrap<I, S>(
    identities: I,
    path: &Path,
) -> Result<Vec<(String, SigningPrivateKey)>, RegistryError>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut registry = Registry::load_or_new(path)?;
    let mut provisioned = Vec::new();
    for identity in identities {
        let identity = identity.as_ref();
        let (_, private) = registry.provision(identity)?;
        provisioned.push((identity.trim().to_string(), private));
    }
    registry.persist(path)?;
    Ok(provisioned)
}

/// Remove `identity` from the registry file at `path`.
///
/// Returns whether an entry was removed. The file is only rewritten when
/// something changed.
pub fn revoke(identity: &str, path: &Path) -> Result<bool, RegistryError> {
    let mut registry = Registry::load(path)?;
    let removed = registry.remove(identity);
    if removed {
        registry.persist(path)?;
        tracing::info!(identity = identity.trim(), "revoked identity");
    }
    Ok(removed)
}

fn normalize_identity(name: &str) -> Result<String, RegistryError> {
    let name = name.trim();
    if name.is_empty() {
        return Err(RegistryError::InvalidIdentity(name.to_string()));
    }
    Ok(name.to_string())
}

/// Shared, swappable view of a registry
///
/// Readers take an `Arc` snapshot and never hold the lock while
/// authenticating. Updates replace the whole snapshot, so a reader sees
/// either the old list or the new one, never a partial write.
#[derive(Debug, Clone, Default)]
pub struct SharedRegistry(Arc<RwLock<Arc<Registry>>>);

impl SharedRegistry {
    pub fn new(registry: Registry) -> Self {
        Self(Arc::new(RwLock::new(Arc::new(registry))))
    }

    /// Current snapshot
    pub fn snapshot(&self) -> Arc<Registry> {
        self.0.read().clone()
    }

    /// Swap in a new registry, returning the previous snapshot
    pub fn replace(&self, registry: Registry) -> Arc<Registry> {
        std::mem::replace(&mut *self.0.write(), Arc::new(registry))
    }
}
