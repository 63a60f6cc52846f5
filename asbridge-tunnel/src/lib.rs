//! asbridge-tunnel: the non-blocking tunnel collaborator interface
//! (§6), plus a real TCP-backed implementation and a scriptable fake
//! for tests.

pub mod fake;
pub mod tcp;
pub mod tunnel;

pub use fake::{FakeTunnel, FakeTunnelHandle};
pub use tcp::TcpTunnel;
pub use tunnel::{Tunnel, TransferProgress, TunnelReady};
