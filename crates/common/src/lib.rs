//! Cloud Avenue Common Library
//!
//! Configuration, error types, the authenticated REST client and the named
//! locks shared by the Terraform provider.

pub mod api;
pub mod client;
pub mod config;
pub mod error;
pub mod mutex;
pub mod types;

// Re-export commonly used types
pub use client::{Client, NetBackupClient};
pub use config::ProviderConfig;
pub use error::{is_not_found, Error, Result};
pub use mutex::{KvGuard, KvMutex, KV_MUTEX};
pub use types::*;

/// Provider version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
