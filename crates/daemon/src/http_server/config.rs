use std::net::{IpAddr, SocketAddr};

use ipnet::IpNet;

#[derive(Debug, Clone)]
pub struct Config {
    // Listen address
    pub listen_addr: SocketAddr,
    // Callers must connect from inside this network
    pub allow_cidr: IpNet,
    // log level for http tracing
    pub log_level: tracing::Level,
}

impl Config {
    pub fn new(listen_addr: SocketAddr, allow_cidr: IpNet) -> Self {
        tracing::info!(
            "Creating HTTP server Config: listen_addr={}, allow_cidr={}",
            listen_addr,
            allow_cidr
        );
        Self {
            listen_addr,
            allow_cidr,
            log_level: tracing::Level::INFO,
        }
    }

    /// Whether a caller at `ip` may request secrets.
    ///
    /// IPv4-mapped IPv6 addresses (`::ffff:10.0.0.5`) are checked as IPv4.
    pub fn allows(&self, ip: IpAddr) -> bool {
        self.allow_cidr.contains(&ip.to_canonical())
    }
}
