pub mod bootstrap;
pub mod fetch;
pub mod init;
pub mod register;
pub mod revoke;
pub mod serve;
pub mod version;

pub use bootstrap::Bootstrap;
pub use fetch::Fetch;
pub use init::Init;
pub use register::Register;
pub use revoke::Revoke;
pub use serve::Serve;
pub use version::Version;
