//! The `WorkspaceManager` contract (§4.7): application-level logic
//! plugs in here without the communication subsystem knowing anything
//! about workspaces, panes, or sessions. Mirrors the teacher's
//! `MessageHandler`/`CallbackHandler` split (`fugue-client`'s
//! `connection::handler` module) — a trait the driver loop calls into,
//! plus a callback-based convenience impl paired with a clonable
//! command sender for submitting outbound work.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use asbridge_protocol::ServerId;

/// Outbound work a `WorkspaceManager` wants the driver loop to submit
/// to the Broker on its behalf.
#[derive(Debug, Clone, PartialEq)]
pub enum WmCommand {
    Connect(ServerId),
    Disconnect(ServerId),
    Send(ServerId, Vec<u8>),
}

/// Trait for reacting to server lifecycle events and data.
///
/// Implementors must honour §4.7's contract: never submit
/// `WmCommand::Send` for a `ServerId` after observing its
/// `DisconnectionNotice` without an intervening `WmCommand::Connect`.
/// `run_wm` enforces this defensively (see its doc comment) but a
/// conforming implementation should not rely on that backstop.
pub trait WorkspaceManager: Send {
    /// A server reached the `Connected` state.
    fn on_connected(&mut self, _server_id: &ServerId, _minor: u32) {}

    /// A server's record departed, gracefully or by failure.
    fn on_disconnected(&mut self, _server_id: &ServerId, _error: Option<&str>) {}

    /// Application data arrived from a connected server.
    fn on_data(&mut self, server_id: &ServerId, payload: Vec<u8>);

    /// Outbound work queued since the last call. Called once per
    /// driver loop iteration; the default yields nothing.
    fn drain_outbound(&mut self) -> Vec<WmCommand> {
        Vec::new()
    }
}

/// Simple callback-based handler for `on_data`, paired with a
/// [`WmCommandSender`] the application keeps to originate connects,
/// disconnects, and outbound sends.
pub struct CallbackWorkspaceManager<F>
where
    F: FnMut(ServerId, Vec<u8>) + Send,
{
    callback: F,
    outbound: Arc<Mutex<VecDeque<WmCommand>>>,
}

impl<F> CallbackWorkspaceManager<F>
where
    F: FnMut(ServerId, Vec<u8>) + Send,
{
    pub fn new(callback: F) -> (Self, WmCommandSender) {
        let outbound = Arc::new(Mutex::new(VecDeque::new()));
        let sender = WmCommandSender {
            outbound: outbound.clone(),
        };
        (Self { callback, outbound }, sender)
    }
}

impl<F> WorkspaceManager for CallbackWorkspaceManager<F>
where
    F: FnMut(ServerId, Vec<u8>) + Send,
{
    fn on_data(&mut self, server_id: &ServerId, payload: Vec<u8>) {
        (self.callback)(server_id.clone(), payload);
    }

    fn drain_outbound(&mut self) -> Vec<WmCommand> {
        std::mem::take(&mut *self.outbound.lock().unwrap()).into()
    }
}

/// Clonable handle for submitting [`WmCommand`]s to a
/// [`CallbackWorkspaceManager`] from outside the driver loop.
#[derive(Clone)]
pub struct WmCommandSender {
    outbound: Arc<Mutex<VecDeque<WmCommand>>>,
}

impl WmCommandSender {
    pub fn connect(&self, server_id: ServerId) {
        self.outbound.lock().unwrap().push_back(WmCommand::Connect(server_id));
    }

    pub fn disconnect(&self, server_id: ServerId) {
        self.outbound
            .lock()
            .unwrap()
            .push_back(WmCommand::Disconnect(server_id));
    }

    pub fn send(&self, server_id: ServerId, payload: Vec<u8>) {
        self.outbound
            .lock()
            .unwrap()
            .push_back(WmCommand::Send(server_id, payload));
    }
}
