use clap::Args;
use ipnet::IpNet;

use strongbox_daemon::state::{AppConfig, AppState, StateError};

#[derive(Args, Debug, Clone)]
pub struct Init {
    /// Port for the secrets server
    #[arg(long)]
    pub listen_port: Option<u16>,

    /// Network callers must connect from, e.g. 10.0.0.0/24
    #[arg(long)]
    pub allow_cidr: Option<IpNet>,

    /// Size of the server's RSA key pair
    #[arg(long)]
    pub rsa_bits: Option<usize>,
}

#[async_trait::async_trait]
impl crate::cli::op::Op for Init {
    type Error = StateError;
    type Output = String;

    async fn execute(&self, ctx: &crate::cli::op::OpContext) -> Result<Self::Output, Self::Error> {
        let mut config = AppConfig::default();
        if let Some(port) = self.listen_port {
            config.listen_port = port;
        }
        if let Some(cidr) = self.allow_cidr {
            config.allow_cidr = cidr;
        }
        if let Some(bits) = self.rsa_bits {
            config.rsa_bits = bits;
        }

        let state = AppState::init(ctx.config_path.clone(), Some(config))?;

        Ok(format!(
            "Initialized strongbox directory at {}\n  config:   {}\n  registry: {}\n\nConfigure the [source] section of config.toml before running 'strongbox serve'.",
            state.state_dir.display(),
            state.config_path.display(),
            state.registry_path.display(),
        ))
    }
}
