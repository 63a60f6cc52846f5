//! Error types for asbridge
//!
//! Provides a unified error type used across all asbridge crates.

use std::path::PathBuf;

/// Main error type for asbridge operations
#[derive(Debug, thiserror::Error)]
pub enum AsbridgeError {
    // === IO Errors ===
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // === Transport / tunnel errors ===
    #[error("transport failed: {0}")]
    Transport(String),

    #[error("connection timed out after {seconds}s")]
    ConnectionTimeout { seconds: u64 },

    // === Handshake errors ===
    #[error("server requires a protocol upgrade")]
    MustUpgrade,

    #[error("handshake rejected: {0}")]
    HandshakeRejected(String),

    #[error("server protocol too old: minor={server_minor}, need >= {required_minor}")]
    ServerTooOld {
        server_minor: u32,
        required_minor: u32,
    },

    // === Protocol invariant violations ===
    #[error("protocol violation: {0}")]
    ProtocolViolation(String),

    // === Configuration errors ===
    #[error("configuration error: {0}")]
    Config(String),

    #[error("invalid configuration at {path}: {message}")]
    ConfigInvalid { path: PathBuf, message: String },

    // === Broker contract violations (programmer error) ===
    #[error("broker contract violation: {0}")]
    BrokerContract(String),

    // === Internal ===
    #[error("internal error: {0}")]
    Internal(String),
}

impl AsbridgeError {
    /// Create a transport error
    pub fn transport(msg: impl Into<String>) -> Self {
        Self::Transport(msg.into())
    }

    /// Create a handshake-rejected error
    pub fn handshake_rejected(msg: impl Into<String>) -> Self {
        Self::HandshakeRejected(msg.into())
    }

    /// Create a protocol violation error
    pub fn protocol_violation(msg: impl Into<String>) -> Self {
        Self::ProtocolViolation(msg.into())
    }

    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create an internal error
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Whether this error is the kind surfaced to the WM as a
    /// `DisconnectionNotice` reason (all of them are, today, but this
    /// gives callers a single seam if that ever changes).
    pub fn as_disconnect_reason(&self) -> String {
        self.to_string()
    }
}

/// Result type alias using AsbridgeError
pub type Result<T> = std::result::Result<T, AsbridgeError>;
