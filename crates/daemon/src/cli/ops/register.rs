use std::io::Write;
use std::path::{Path, PathBuf};

use clap::Args;

use common::prelude::{RegistryError, SigningPrivateKey};
use strongbox_daemon::client::{SIGNING_PRIVATE_ENV, SIGNING_PUBLIC_ENV};
use strongbox_daemon::source::dotenv;
use strongbox_daemon::state::{AppState, StateError};

#[derive(Args, Debug, Clone)]
pub struct Register {
    /// Identity to register; an existing identity gets a new key
    pub identity: String,

    /// Write the key pair as an env file instead of printing it
    #[arg(long)]
    pub env_out: Option<PathBuf>,
}

#[derive(Debug, thiserror::Error)]
pub enum RegisterError {
    #[error("state error: {0}")]
    State(#[from] StateError),

    #[error("registry error: {0}")]
    Registry(#[from] RegistryError),

    #[error("failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
}

#[async_trait::async_trait]
impl crate::cli::op::Op for Register {
    type Error = RegisterError;
    type Output = String;

    async fn execute(&self, ctx: &crate::cli::op::OpContext) -> Result<Self::Output, Self::Error> {
        let state = AppState::load(ctx.config_path.clone())?;
        let (_, private) = common::registry::register(&self.identity, &state.registry_path)?;
        let contents = signing_env(&private);

        match &self.env_out {
            Some(path) => {
                write_private_file(path, &contents)?;
                Ok(format!(
                    "Registered {} in {}\nKeys written to {}\nSend SIGHUP to a running server to pick up the change.",
                    self.identity.trim(),
                    state.registry_path.display(),
                    path.display()
                ))
            }
            None => Ok(format!(
                "Registered {} in {}\nDeliver these to the client:\n\n{}",
                self.identity.trim(),
                state.registry_path.display(),
                contents
            )),
        }
    }
}

/// Env file lines a client needs to authenticate as the key's identity
pub fn signing_env(private: &SigningPrivateKey) -> String {
    dotenv::format(&[
        (SIGNING_PUBLIC_ENV, private.public().to_pem()),
        (SIGNING_PRIVATE_ENV, private.to_pem()),
    ])
}

/// Create (or truncate) `path` readable by the owner only
pub fn write_private_file(path: &Path, contents: &str) -> Result<(), RegisterError> {
    use std::os::unix::fs::{OpenOptionsExt, PermissionsExt};

    let write_err = |source: std::io::Error| RegisterError::Write {
        path: path.to_path_buf(),
        source,
    };
    let mut file = std::fs::OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .mode(0o600)
        .open(path)
        .map_err(write_err)?;
    // mode only applies on creation; tighten a file that already existed
    file.set_permissions(std::fs::Permissions::from_mode(0o600))
        .map_err(write_err)?;
    file.write_all(contents.as_bytes()).map_err(write_err)
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_signing_env_parses_back() {
        let private = SigningPrivateKey::generate();
        let vars = dotenv::parse(&signing_env(&private)).unwrap();

        assert_eq!(vars[SIGNING_PUBLIC_ENV], private.public().to_pem());
        let recovered = SigningPrivateKey::from_pem(&vars[SIGNING_PRIVATE_ENV]).unwrap();
        assert_eq!(recovered.to_bytes(), private.to_bytes());
    }

    #[test]
    fn test_write_private_file_tightens_existing_file() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("svc.env");
        std::fs::write(&path, "old").unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o644)).unwrap();

        write_private_file(&path, "new").unwrap();

        assert_eq!(std::fs::read_to_string(&path).unwrap(), "new");
        let mode = std::fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }
}
