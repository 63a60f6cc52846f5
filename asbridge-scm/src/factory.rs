//! Pluggable construction of a [`Tunnel`] for a freshly-`Scheduled`
//! record. Kept as its own seam so the SCM loop itself never names a
//! concrete transport (TCP, TLS-subprocess, fake) — `asbridge-runtime`
//! wires the real choice in, and tests wire in `FakeTunnel`.

use asbridge_protocol::ServerId;
use asbridge_tunnel::Tunnel;

pub trait TunnelFactory: Send + Sync {
    fn create(&self, server_id: &ServerId) -> Box<dyn Tunnel>;
}

impl<F> TunnelFactory for F
where
    F: Fn(&ServerId) -> Box<dyn Tunnel> + Send + Sync,
{
    fn create(&self, server_id: &ServerId) -> Box<dyn Tunnel> {
        (self)(server_id)
    }
}
