//! asbridge-runtime: wires the Broker, SCM, and WM into one running
//! communication subsystem.
//!
//! This crate owns no protocol logic of its own — it is the thinnest
//! possible glue between [`asbridge_broker::Broker`],
//! [`asbridge_scm::run`], and [`asbridge_wm::run_wm`], the way the
//! teacher's `ccmux-server` binary glues together a `SessionManager`
//! and a `PtyManager` without implementing either.

use std::sync::Arc;

use tokio::sync::oneshot;
use tokio::task::JoinHandle;

use asbridge_broker::Broker;
use asbridge_protocol::ServerId;
use asbridge_scm::TunnelFactory;
use asbridge_tunnel::{TcpTunnel, Tunnel};
use asbridge_utils::config::RuntimeConfig;
use asbridge_wm::WorkspaceManager;

/// Builds a [`TcpTunnel`] for every `ServerId`, the factory a
/// production deployment wires in. Tests use `FakeTunnel` via a
/// closure `TunnelFactory` instead (see `asbridge_scm::factory`).
pub struct TcpTunnelFactory;

impl TunnelFactory for TcpTunnelFactory {
    fn create(&self, server_id: &ServerId) -> Box<dyn Tunnel> {
        Box::new(TcpTunnel::new(server_id.host(), server_id.port()))
    }
}

/// A running communication subsystem: one SCM task and one WM task,
/// both talking through a shared [`Broker`].
///
/// Dropping the handles without calling [`Runtime::shutdown`] leaves
/// both tasks running detached; `shutdown` is the only clean way to
/// stop them.
pub struct Runtime {
    broker: Arc<Broker>,
    scm_task: JoinHandle<()>,
    wm_task: JoinHandle<()>,
    scm_shutdown: oneshot::Sender<()>,
    wm_shutdown: oneshot::Sender<()>,
}

impl Runtime {
    /// Spawn the SCM and WM tasks against `manager`, using `factory` to
    /// construct a `Tunnel` for each newly-scheduled record.
    pub fn spawn(
        config: RuntimeConfig,
        factory: Arc<dyn TunnelFactory>,
        manager: impl WorkspaceManager + 'static,
    ) -> Self {
        let broker = Arc::new(Broker::new(config.quench));

        let (scm_shutdown_tx, scm_shutdown_rx) = oneshot::channel();
        let (wm_shutdown_tx, wm_shutdown_rx) = oneshot::channel();

        let scm_broker = broker.clone();
        let scm_config = config.clone();
        let scm_task = tokio::spawn(async move {
            asbridge_scm::run(scm_broker, scm_config, factory, scm_shutdown_rx).await;
        });

        let wm_broker = broker.clone();
        let wm_task = tokio::spawn(async move {
            asbridge_wm::run_wm(wm_broker, manager, wm_shutdown_rx).await;
        });

        Self {
            broker,
            scm_task,
            wm_task,
            scm_shutdown: scm_shutdown_tx,
            wm_shutdown: wm_shutdown_tx,
        }
    }

    /// Spawn against the real `TcpTunnelFactory`, for production use.
    pub fn spawn_tcp(config: RuntimeConfig, manager: impl WorkspaceManager + 'static) -> Self {
        Self::spawn(config, Arc::new(TcpTunnelFactory), manager)
    }

    /// The shared Broker both tasks run against. Exposed so a test or
    /// an embedding caller that needs lower-level access (rather than
    /// going through a `WorkspaceManager`) can drive it directly.
    pub fn broker(&self) -> &Arc<Broker> {
        &self.broker
    }

    /// Signal both tasks to stop and wait for them to finish their
    /// current iteration. Idempotent failures to send (tasks already
    /// gone) are ignored.
    pub async fn shutdown(self) {
        let _ = self.scm_shutdown.send(());
        let _ = self.wm_shutdown.send(());
        let _ = self.scm_task.await;
        let _ = self.wm_task.await;
    }
}
