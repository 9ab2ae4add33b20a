pub mod args;
pub mod op;
pub mod ops;

pub use ops::{Bootstrap, Fetch, Init, Register, Revoke, Serve, Version};
