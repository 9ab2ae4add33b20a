use std::path::PathBuf;

use clap::Args;

use strongbox_daemon::state::AppState;

use super::register::{signing_env, write_private_file, RegisterError};

#[derive(Args, Debug, Clone)]
pub struct Bootstrap {
    /// Identities to register
    #[arg(required = true)]
    pub identities: Vec<String>,

    /// Write one `<identity>.env` key file per identity into this directory
    #[arg(long)]
    pub env_dir: Option<PathBuf>,
}

#[async_trait::async_trait]
impl crate::cli::op::Op for Bootstrap {
    type Error = RegisterError;
    type Output = String;

    async fn execute(&self, ctx: &crate::cli::op::OpContext) -> Result<Self::Output, Self::Error> {
        let state = AppState::load(ctx.config_path.clone())?;
        let provisioned = common::registry::bootstrap(&self.identities, &state.registry_path)?;

        let mut lines = vec![format!(
            "Registered {} identities in {}",
            provisioned.len(),
            state.registry_path.display()
        )];

        if let Some(dir) = &self.env_dir {
            std::fs::create_dir_all(dir).map_err(|source| RegisterError::Write {
                path: dir.clone(),
                source,
            })?;
        }

        for (identity, private) in &provisioned {
            let contents = signing_env(private);
            match &self.env_dir {
                Some(dir) => {
                    let path = dir.join(format!("{}.env", identity));
                    write_private_file(&path, &contents)?;
                    lines.push(format!("  {}: {}", identity, path.display()));
                }
                None => lines.push(format!("\n# {}\n{}", identity, contents)),
            }
        }

        Ok(lines.join("\n"))
    }
}
