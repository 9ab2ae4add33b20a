use clap::Args;

use common::prelude::RegistryError;
use strongbox_daemon::state::{AppState, StateError};

#[derive(Args, Debug, Clone)]
pub struct Revoke {
    /// Identity whose key should stop authenticating
    pub identity: String,
}

#[derive(Debug, thiserror::Error)]
pub enum RevokeError {
    #[error("state error: {0}")]
    State(#[from] StateError),

    #[error("registry error: {0}")]
    Registry(#[from] RegistryError),

    #[error("identity {0:?} is not registered")]
    NotRegistered(String),
}

#[async_trait::async_trait]
impl crate::cli::op::Op for Revoke {
    type Error = RevokeError;
    type Output = String;

    async fn execute(&self, ctx: &crate::cli::op::OpContext) -> Result<Self::Output, Self::Error> {
        let state = AppState::load(ctx.config_path.clone())?;
        if !common::registry::revoke(&self.identity, &state.registry_path)? {
            return Err(RevokeError::NotRegistered(self.identity.clone()));
        }
        Ok(format!(
            "Revoked {}. Send SIGHUP to a running server to pick up the change.",
            self.identity.trim()
        ))
    }
}
