//! Backend-wide configuration and its loader

mod loader;
mod types;

pub use loader::ConfigLoader;
pub use types::{KvConfig, DEFAULT_MAX_VERSIONS};
