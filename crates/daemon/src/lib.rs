// Server modules
pub mod http_server;
pub mod process;
pub mod service_config;
pub mod service_state;

// Secrets and the client side of the protocol
pub mod client;
pub mod source;

// App state (configuration, paths)
pub mod state;

pub use client::{Client, ClientError, Rejection};
pub use process::{spawn_service, start_service, ShutdownHandle};
pub use service_config::Config as ServiceConfig;
pub use service_state::State as ServiceState;
pub use state::{AppConfig, AppState, StateError};
