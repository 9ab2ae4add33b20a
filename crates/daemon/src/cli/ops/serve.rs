use std::path::PathBuf;

use clap::Args;

use strongbox_daemon::process::ServiceError;
use strongbox_daemon::state::{AppState, StateError};
use strongbox_daemon::spawn_service;

#[derive(Args, Debug, Clone)]
pub struct Serve {
    /// Override the listen port (default from config)
    #[arg(long)]
    pub listen_port: Option<u16>,

    /// Directory for log files (default from config, stdout only if unset)
    #[arg(long)]
    pub log_dir: Option<PathBuf>,

    /// Log level for stdout and file logs, overridden by RUST_LOG
    #[arg(long, default_value = "info")]
    pub log_level: tracing::Level,
}

#[derive(Debug, thiserror::Error)]
pub enum ServeError {
    #[error("state error: {0}")]
    State(#[from] StateError),

    #[error("{0}")]
    Service(#[from] ServiceError),
}

#[async_trait::async_trait]
impl crate::cli::op::Op for Serve {
    type Error = ServeError;
    type Output = String;

    async fn execute(&self, ctx: &crate::cli::op::OpContext) -> Result<Self::Output, Self::Error> {
        let state = AppState::load(ctx.config_path.clone())?;

        let mut config = state.service_config(self.listen_port);
        config.log_level = self.log_level;
        if let Some(log_dir) = &self.log_dir {
            config.log_dir = Some(log_dir.clone());
        }

        spawn_service(&config).await?;
        Ok("server stopped".to_string())
    }
}
