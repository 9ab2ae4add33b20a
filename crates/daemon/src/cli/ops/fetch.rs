use std::path::PathBuf;

use clap::Args;
use url::Url;

use strongbox_daemon::client::{Client, ClientError, SIGNING_PRIVATE_ENV, SIGNING_PUBLIC_ENV};
use strongbox_daemon::source::dotenv;

#[derive(Args, Debug, Clone)]
pub struct Fetch {
    /// Name of the secret to fetch
    pub name: String,

    /// Base URL of the secrets server
    #[arg(long, env = "STRONGBOX_SERVER")]
    pub server: Url,

    /// Env file holding the signing key pair, as written by `register --env-out`.
    /// Takes precedence over the key arguments.
    #[arg(long)]
    pub env_file: Option<PathBuf>,

    /// Signing public key (PEM)
    #[arg(long, env = "STRONGBOX_SIGNING_PUBLIC", hide_env_values = true)]
    pub signing_public: Option<String>,

    /// Signing private key (PEM)
    #[arg(long, env = "STRONGBOX_SIGNING_PRIVATE", hide_env_values = true)]
    pub signing_private: Option<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("invalid line {line} in {path}")]
    InvalidLine { path: PathBuf, line: usize },

    #[error("missing signing key: set {0} or pass --env-file")]
    MissingKey(&'static str),

    #[error(transparent)]
    Client(#[from] ClientError),
}

impl Fetch {
    fn signing_keys(&self) -> Result<(String, String), FetchError> {
        let (public, private) = match &self.env_file {
            Some(path) => {
                let text = std::fs::read_to_string(path).map_err(|source| FetchError::Read {
                    path: path.clone(),
                    source,
                })?;
                let mut vars = dotenv::parse(&text).map_err(|line| FetchError::InvalidLine {
                    path: path.clone(),
                    line,
                })?;
                (
                    vars.remove(SIGNING_PUBLIC_ENV),
                    vars.remove(SIGNING_PRIVATE_ENV),
                )
            }
            None => (self.signing_public.clone(), self.signing_private.clone()),
        };

        Ok((
            public.ok_or(FetchError::MissingKey(SIGNING_PUBLIC_ENV))?,
            private.ok_or(FetchError::MissingKey(SIGNING_PRIVATE_ENV))?,
        ))
    }
}

#[async_trait::async_trait]
impl crate::cli::op::Op for Fetch {
    type Error = FetchError;
    type Output = String;

    async fn execute(&self, _ctx: &crate::cli::op::OpContext) -> Result<Self::Output, Self::Error> {
        let (public, private) = self.signing_keys()?;
        let mut client = Client::initialize(self.server.clone(), &public, &private).await?;
        Ok(client.fetch_secret(&self.name).await?)
    }
}
