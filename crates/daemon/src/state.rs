use std::net::{Ipv4Addr, SocketAddr};
use std::{fs, path::PathBuf};

use ipnet::{IpNet, Ipv4Net};
use serde::{Deserialize, Serialize};

use common::crypto::DEFAULT_RSA_BITS;
use common::prelude::Registry;

use crate::source::SourceConfig;
use crate::ServiceConfig;

pub const APP_NAME: &str = "strongbox";
pub const CONFIG_FILE_NAME: &str = "config.toml";
pub const REGISTRY_FILE_NAME: &str = "registry.yml";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppConfig {
    /// Port for the secrets server
    #[serde(default = "default_listen_port")]
    pub listen_port: u16,
    /// Only callers inside this network may request secrets
    #[serde(default = "default_allow_cidr")]
    pub allow_cidr: IpNet,
    /// Size of the server's RSA key pair
    #[serde(default = "default_rsa_bits")]
    pub rsa_bits: usize,
    /// Trust registry file, relative paths resolve against the state directory
    #[serde(default = "default_registry_file")]
    pub registry_file: PathBuf,
    /// Directory for log files (optional, logs to stdout only if not set)
    #[serde(default)]
    pub log_dir: Option<PathBuf>,
    /// Where secrets are loaded from
    #[serde(default)]
    pub source: SourceConfig,
}

fn default_listen_port() -> u16 {
    8111
}

fn default_allow_cidr() -> IpNet {
    IpNet::V4(Ipv4Net::new_assert(Ipv4Addr::new(10, 0, 0, 0), 24))
}

fn default_rsa_bits() -> usize {
    DEFAULT_RSA_BITS
}

fn default_registry_file() -> PathBuf {
    PathBuf::from(REGISTRY_FILE_NAME)
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            listen_port: default_listen_port(),
            allow_cidr: default_allow_cidr(),
            rsa_bits: default_rsa_bits(),
            registry_file: default_registry_file(),
            log_dir: None,
            source: SourceConfig::default(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct AppState {
    /// Path to the state directory (~/.strongbox)
    pub state_dir: PathBuf,
    /// Path to the trust registry
    pub registry_path: PathBuf,
    /// Path to the config file
    pub config_path: PathBuf,
    /// Loaded configuration
    pub config: AppConfig,
}

impl AppState {
    /// Get the state directory path (custom or default ~/.strongbox)
    pub fn state_dir(custom_path: Option<PathBuf>) -> Result<PathBuf, StateError> {
        if let Some(path) = custom_path {
            return Ok(path);
        }

        let home = dirs::home_dir().ok_or(StateError::NoHomeDirectory)?;
        Ok(home.join(format!(".{}", APP_NAME)))
    }

    /// Initialize a new state directory with an explicitly empty registry
    pub fn init(
        custom_path: Option<PathBuf>,
        config: Option<AppConfig>,
    ) -> Result<Self, StateError> {
        let state_dir = Self::state_dir(custom_path)?;

        if state_dir.join(CONFIG_FILE_NAME).exists() {
            return Err(StateError::AlreadyInitialized);
        }

        fs::create_dir_all(&state_dir)?;

        // Create config (use provided or default)
        let config = config.unwrap_or_default();
        let config_path = state_dir.join(CONFIG_FILE_NAME);
        let config_toml = toml::to_string_pretty(&config)?;
        fs::write(&config_path, config_toml)?;

        let registry_path = state_dir.join(&config.registry_file);
        if !registry_path.exists() {
            Registry::new().persist(&registry_path)?;
        }

        Ok(Self {
            state_dir,
            registry_path,
            config_path,
            config,
        })
    }

    /// Load existing state from the state directory
    pub fn load(custom_path: Option<PathBuf>) -> Result<Self, StateError> {
        let state_dir = Self::state_dir(custom_path)?;

        if !state_dir.exists() {
            return Err(StateError::NotInitialized);
        }

        let config_path = state_dir.join(CONFIG_FILE_NAME);
        if !config_path.exists() {
            return Err(StateError::MissingFile(CONFIG_FILE_NAME.to_string()));
        }

        let config_toml = fs::read_to_string(&config_path)?;
        let config: AppConfig = toml::from_str(&config_toml)?;

        let registry_path = state_dir.join(&config.registry_file);
        if !registry_path.exists() {
            return Err(StateError::MissingFile(
                registry_path.display().to_string(),
            ));
        }

        Ok(Self {
            state_dir,
            registry_path,
            config_path,
            config,
        })
    }

    /// Service configuration for `serve`, with an optional port override
    pub fn service_config(&self, listen_port: Option<u16>) -> ServiceConfig {
        let port = listen_port.unwrap_or(self.config.listen_port);
        ServiceConfig {
            listen_addr: SocketAddr::from(([0, 0, 0, 0], port)),
            allow_cidr: self.config.allow_cidr,
            rsa_bits: self.config.rsa_bits,
            registry_path: self.registry_path.clone(),
            source: self.config.source.clone(),
            log_level: tracing::Level::INFO,
            log_dir: self.config.log_dir.clone(),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum StateError {
    #[error("strongbox directory not initialized. Run 'strongbox init' first")]
    NotInitialized,

    #[error("strongbox directory already initialized")]
    AlreadyInitialized,

    #[error("no home directory found")]
    NoHomeDirectory,

    #[error("missing required file: {0}")]
    MissingFile(String),

    #[error("registry error: {0}")]
    Registry(#[from] common::prelude::RegistryError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML serialization error: {0}")]
    TomlSer(#[from] toml::ser::Error),

    #[error("TOML deserialization error: {0}")]
    TomlDe(#[from] toml::de::Error),
}
