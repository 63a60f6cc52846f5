//! The role handshake: the exchange immediately after a tunnel reaches
//! the transport-connected state, in which the client selects its role
//! and the server confirms protocol compatibility.

use serde::{Deserialize, Serialize};

/// Role identifier naming the workspace role. The role-selection
/// message always carries `id = 0` and this single `u32` argument.
pub const ROLE_WORKSPACE: u32 = 1;

/// Bit in the wire header distinguishing an unsolicited event from a
/// reply to a request this side made.
const ROLE_REPLY_BIT: u8 = 0b1000_0000;

/// The message the client sends immediately after the tunnel is
/// ready, requesting a role.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleRequest {
    pub protocol_major: u32,
    pub protocol_minor: u32,
    /// Always 0 for a role-selection message.
    pub id: u32,
    pub role: u32,
}

impl RoleRequest {
    pub fn workspace(protocol_major: u32, protocol_minor: u32) -> Self {
        Self {
            protocol_major,
            protocol_minor,
            id: 0,
            role: ROLE_WORKSPACE,
        }
    }
}

/// The server's response code to a role request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RoleResponseCode {
    /// Role accepted.
    Ok,
    /// The client's protocol is too old; the server cannot speak to it
    /// at all.
    MustUpgrade,
    /// Any other rejection. The accompanying reason string in
    /// [`RoleReply::reason`] explains why.
    Rejected,
}

/// The server's reply to a [`RoleRequest`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleReply {
    pub code: RoleResponseCode,
    /// Negotiated protocol minor, meaningful only when `code == Ok`.
    pub minor: u32,
    /// Present when `code != Ok`; the server's stated reason. The
    /// original implementation this was distilled from indexes this
    /// positionally and has undefined behaviour if it is missing —
    /// here it is a proper `Option` and its absence is handled
    /// explicitly (see `asbridge_scm`'s handshake handling).
    pub reason: Option<String>,
}

impl RoleReply {
    pub fn ok(minor: u32) -> Self {
        Self {
            code: RoleResponseCode::Ok,
            minor,
            reason: None,
        }
    }

    pub fn must_upgrade() -> Self {
        Self {
            code: RoleResponseCode::MustUpgrade,
            minor: 0,
            reason: None,
        }
    }

    pub fn rejected(reason: impl Into<String>) -> Self {
        Self {
            code: RoleResponseCode::Rejected,
            minor: 0,
            reason: Some(reason.into()),
        }
    }
}

/// A one-byte header prefixed onto application payloads exchanged
/// after the handshake, carrying the reply/event role bit. This is
/// the only part of post-handshake payload framing the core
/// communication subsystem interprets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RoleHeader(u8);

impl RoleHeader {
    pub fn event() -> Self {
        Self(0)
    }

    pub fn reply() -> Self {
        Self(ROLE_REPLY_BIT)
    }

    pub fn is_reply(&self) -> bool {
        self.0 & ROLE_REPLY_BIT != 0
    }

    /// Peek at the header byte of a payload without consuming it.
    pub fn peek(payload: &[u8]) -> Option<Self> {
        payload.first().copied().map(Self)
    }

    pub fn as_byte(&self) -> u8 {
        self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_request_workspace() {
        let req = RoleRequest::workspace(1, 6);
        assert_eq!(req.id, 0);
        assert_eq!(req.role, ROLE_WORKSPACE);
    }

    #[test]
    fn test_role_reply_constructors() {
        assert_eq!(RoleReply::ok(5).code, RoleResponseCode::Ok);
        assert_eq!(RoleReply::must_upgrade().code, RoleResponseCode::MustUpgrade);
        let rejected = RoleReply::rejected("nope");
        assert_eq!(rejected.code, RoleResponseCode::Rejected);
        assert_eq!(rejected.reason.as_deref(), Some("nope"));
    }

    #[test]
    fn test_role_header_bit() {
        assert!(!RoleHeader::event().is_reply());
        assert!(RoleHeader::reply().is_reply());
    }

    #[test]
    fn test_role_header_peek_empty() {
        assert_eq!(RoleHeader::peek(&[]), None);
    }
}
