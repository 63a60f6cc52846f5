//! Per-`ServerId` state held exclusively by the SCM (§3, §4.3-§4.6).

use std::collections::VecDeque;

use asbridge_protocol::ServerId;
use asbridge_tunnel::Tunnel;

/// A record's position in its own lifecycle.
///
/// `Disconnected` is terminal: a new connection for the same
/// `ServerId` is a new record, never a transition back out of this
/// state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordStatus {
    Scheduled,
    Connecting,
    RoleReply,
    Connected,
    Disconnected,
}

/// One incarnation of a connection to a `ServerId`.
///
/// Invariants (§3): `send_queue` is non-empty only while `status` is
/// one of `Scheduled, Connecting, RoleReply, Connected` — data queued
/// before `Connected` is held, not dropped. `tunnel` is live iff
/// `status` is `Connecting, RoleReply, Connected`, and must be closed
/// on any transition to `Disconnected`.
pub struct ServerRecord {
    pub id: ServerId,
    pub status: RecordStatus,
    pub tunnel: Box<dyn Tunnel>,
    pub send_queue: VecDeque<Vec<u8>>,
    pub last_error: Option<String>,
    /// Negotiated protocol minor, set once the role handshake
    /// completes successfully.
    pub minor: Option<u32>,
}

impl ServerRecord {
    pub fn new(id: ServerId, tunnel: Box<dyn Tunnel>) -> Self {
        Self {
            id,
            status: RecordStatus::Scheduled,
            tunnel,
            send_queue: VecDeque::new(),
            last_error: None,
            minor: None,
        }
    }

    /// Transition to `Disconnected`, closing the tunnel and recording
    /// `error` (`None` for a graceful WM-requested disconnect). Safe to
    /// call more than once; only the first call has any effect.
    pub fn fail(&mut self, error: Option<String>) {
        if self.status == RecordStatus::Disconnected {
            return;
        }
        self.tunnel.disconnect();
        self.last_error = error;
        self.status = RecordStatus::Disconnected;
        self.send_queue.clear();
    }
}
