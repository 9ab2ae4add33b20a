use std::net::SocketAddr;
use std::path::PathBuf;

use ipnet::IpNet;

use crate::source::SourceConfig;

#[derive(Debug, Clone)]
pub struct Config {
    // http server configuration
    /// address for the secrets server to listen on
    pub listen_addr: SocketAddr,
    /// callers outside this network are refused with 403
    pub allow_cidr: IpNet,

    // key material
    /// size of the RSA key pair generated at startup
    pub rsa_bits: usize,
    /// path to the trust registry file, re-read on SIGHUP
    pub registry_path: PathBuf,

    // secrets
    pub source: SourceConfig,

    // logging
    pub log_level: tracing::Level,
    /// Directory for log files (optional, logs to stdout only if not set)
    pub log_dir: Option<PathBuf>,
}
