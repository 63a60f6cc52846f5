//! Identity of one Application Server.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Immutable `(host, port)` identity of one Application Server.
///
/// Equality and ordering are lexicographic on `(host, port)`. Cheap to
/// clone and free to share across the WM and SCM tasks without any
/// synchronization — it carries no interior mutability.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ServerId {
    host: String,
    port: u16,
}

impl ServerId {
    /// Construct a new server identity.
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }
}

impl fmt::Display for ServerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}
