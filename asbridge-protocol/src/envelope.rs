//! Control and data envelopes exchanged across the Broker.

use crate::ServerId;

/// Control-plane messages exchanged between the WM and SCM.
///
/// Direction is implied by which Broker queue a value sits in:
/// `ConnectRequest` only ever travels WM→SCM, `ConnectionNotice` and
/// `DisconnectionNotice` only ever travel SCM→WM.
#[derive(Debug, Clone, PartialEq)]
pub enum ControlMsg {
    /// WM→SCM. `connect = true` asks the SCM to create and drive a
    /// record for `server_id`; `connect = false` asks it to tear one
    /// down.
    ConnectRequest { server_id: ServerId, connect: bool },

    /// SCM→WM. The server reached the `Connected` state; `minor` is
    /// the negotiated protocol minor version.
    ConnectionNotice { server_id: ServerId, minor: u32 },

    /// SCM→WM. Terminal departure of the record. `error` is `None`
    /// for a WM-requested disconnect and `Some(reason)` for a failure.
    DisconnectionNotice {
        server_id: ServerId,
        error: Option<String>,
    },
}

impl ControlMsg {
    /// The `ServerId` this control message concerns, for FIFO-purge
    /// and bookkeeping purposes.
    pub fn server_id(&self) -> &ServerId {
        match self {
            ControlMsg::ConnectRequest { server_id, .. } => server_id,
            ControlMsg::ConnectionNotice { server_id, .. } => server_id,
            ControlMsg::DisconnectionNotice { server_id, .. } => server_id,
        }
    }
}

/// An application payload addressed to (or originating from) one
/// `ServerId`. The Broker never interprets `payload` beyond the
/// role-bit classification in [`DataMsg::is_reply`].
#[derive(Debug, Clone, PartialEq)]
pub struct DataMsg {
    pub payload: Vec<u8>,
    pub server_id: ServerId,
}

impl DataMsg {
    pub fn new(server_id: ServerId, payload: Vec<u8>) -> Self {
        Self { payload, server_id }
    }

    /// Classifies the payload as a reply (to a request this side made)
    /// versus an unsolicited event, by inspecting the role bitfield in
    /// the wire header. The core communication subsystem does not
    /// otherwise interpret payload contents.
    pub fn is_reply(&self) -> bool {
        crate::handshake::RoleHeader::peek(&self.payload)
            .map(|h| h.is_reply())
            .unwrap_or(false)
    }
}
