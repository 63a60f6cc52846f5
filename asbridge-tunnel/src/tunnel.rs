//! The non-blocking tunnel collaborator interface (§6).
//!
//! The communication subsystem depends only on this trait; the
//! concrete transport (a TLS subprocess, a plain TCP socket, an
//! in-process fake) is a pluggable detail. The distilled spec's
//! per-method signatures are kept as closely as an async trait allows;
//! the one deliberate departure is that fallible steps return
//! `Result` instead of raising, per §9's re-architecture note that
//! exception-based signalling becomes an explicit `Result` whose `Err`
//! arm the SCM routes to its disconnection routine.

use async_trait::async_trait;
use asbridge_utils::Result;

/// What a single [`Tunnel::do_transfer`] call accomplished. Informational
/// only — the communication subsystem decides whether a full message
/// arrived via [`Tunnel::has_received`], not from this struct.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TransferProgress {
    pub sent: bool,
    pub received: bool,
}

/// Which directions [`Tunnel::ready`] found ready.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TunnelReady {
    pub readable: bool,
    pub writable: bool,
}

/// A non-blocking, framed message transport to one Application Server.
///
/// Implementors guarantee: `do_transfer` advances at most one send and
/// one receive per call; `has_received` is true exactly until
/// `take_received` consumes the pending message.
///
/// The distilled spec registers read and write readiness as two
/// separate selectable events; `&mut self` async trait methods can't
/// be awaited concurrently against the same receiver, so this
/// interface follows tokio's own combined-interest idiom
/// (`TcpStream::ready`) instead and exposes one `ready` call that
/// reports both directions at once. See DESIGN.md.
#[async_trait]
pub trait Tunnel: Send {
    /// Begin establishing the transport connection without blocking.
    fn begin_connect(&mut self);

    /// Poll whether the connection established by `begin_connect` is
    /// ready. Returns `Err` if establishment failed.
    fn check_connect(&mut self) -> Result<bool>;

    /// Resolves when the tunnel is readable, or (if `want_write`) when
    /// it is readable or writable, whichever comes first.
    async fn ready(&mut self, want_write: bool) -> Result<TunnelReady>;

    /// Whether a send is currently in flight.
    fn is_sending(&self) -> bool;

    /// Begin sending `payload`. Must not be called while
    /// [`Tunnel::is_sending`] is already true.
    fn start_send(&mut self, payload: Vec<u8>) -> Result<()>;

    /// Advance I/O on the tunnel by at most one send step and one
    /// receive step.
    fn do_transfer(&mut self) -> Result<TransferProgress>;

    /// Whether a fully-framed message is waiting to be taken.
    fn has_received(&self) -> bool;

    /// Consume the pending message, if any.
    fn take_received(&mut self) -> Option<Vec<u8>>;

    /// Tear down the transport connection. Idempotent.
    fn disconnect(&mut self);
}
