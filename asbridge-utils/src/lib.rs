//! asbridge-utils: common utilities shared across asbridge crates
//!
//! This crate provides:
//! - Unified error types ([`AsbridgeError`], [`Result`])
//! - Logging infrastructure ([`init_logging`], [`LogConfig`])
//! - Runtime configuration ([`RuntimeConfig`], [`ConfigLoader`])

pub mod config;
pub mod error;
pub mod logging;

// Re-export main types at crate root for convenience
pub use config::{ConfigLoader, ProtocolConfig, QuenchConfig, RuntimeConfig};
pub use error::{AsbridgeError, Result};
pub use logging::{init_logging, init_logging_with_config, LogConfig};
