//! Reference WM driver loop (§4.7): polls a [`WorkspaceManager`] for
//! outbound work, submits it to the Broker, then drains and applies
//! inbound control/data before waiting for the next wake-up.

use std::collections::HashSet;
use std::sync::Arc;

use asbridge_broker::Broker;
use asbridge_protocol::{ControlMsg, DataMsg, ServerId};

use crate::handler::{WmCommand, WorkspaceManager};

/// Drive `manager` against `broker` until `shutdown` resolves.
///
/// Tracks which `ServerId`s are currently connected and silently drops
/// a `WmCommand::Send` for any other — the defensive backstop for
/// §4.7's contract that a conforming `WorkspaceManager` must already
/// uphold itself.
pub async fn run_wm(
    broker: Arc<Broker>,
    mut manager: impl WorkspaceManager,
    mut shutdown: tokio::sync::oneshot::Receiver<()>,
) {
    let mut connected: HashSet<ServerId> = HashSet::new();

    loop {
        if (&mut shutdown).try_recv().is_ok() {
            return;
        }

        for cmd in manager.drain_outbound() {
            match cmd {
                WmCommand::Connect(server_id) => broker.request_connect(server_id),
                WmCommand::Disconnect(server_id) => broker.request_disconnect(server_id),
                WmCommand::Send(server_id, payload) => {
                    if connected.contains(&server_id) {
                        broker.send_data_to_scm(DataMsg::new(server_id, payload));
                    } else {
                        tracing::warn!(
                            ?server_id,
                            "dropping send for a server with no active ConnectionNotice"
                        );
                    }
                }
            }
        }

        let (control, data) = broker.drain_for_wm();
        for msg in control {
            match msg {
                ControlMsg::ConnectionNotice { server_id, minor } => {
                    connected.insert(server_id.clone());
                    manager.on_connected(&server_id, minor);
                }
                ControlMsg::DisconnectionNotice { server_id, error } => {
                    connected.remove(&server_id);
                    manager.on_disconnected(&server_id, error.as_deref());
                }
                ControlMsg::ConnectRequest { .. } => {
                    debug_assert!(false, "ConnectRequest never travels SCM to WM");
                }
            }
        }
        for msg in data {
            manager.on_data(&msg.server_id, msg.payload);
        }

        tokio::select! {
            _ = broker.wm_wake() => {}
            _ = &mut shutdown => return,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use asbridge_utils::config::QuenchConfig;
    use crate::handler::CallbackWorkspaceManager;
    use std::sync::Mutex;
    use std::time::Duration;

    #[tokio::test]
    async fn test_run_wm_applies_connection_notice_and_forwards_data() {
        let broker = Arc::new(Broker::new(QuenchConfig::default()));
        let events = Arc::new(Mutex::new(Vec::new()));
        let events_clone = events.clone();
        let (manager, _sender) = CallbackWorkspaceManager::new(move |id, payload| {
            events_clone.lock().unwrap().push((id, payload));
        });

        let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel();
        let broker_for_task = broker.clone();
        let task = tokio::spawn(run_wm(broker_for_task, manager, shutdown_rx));

        let id = ServerId::new("host", 1);
        broker.deliver_to_wm(
            vec![ControlMsg::ConnectionNotice {
                server_id: id.clone(),
                minor: 4,
            }],
            vec![DataMsg::new(id.clone(), vec![1, 2, 3])],
        );

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(events.lock().unwrap().len(), 1);

        let _ = shutdown_tx.send(());
        task.await.unwrap();
    }

    #[tokio::test]
    async fn test_run_wm_drops_send_for_unconnected_server() {
        let broker = Arc::new(Broker::new(QuenchConfig::default()));
        let (manager, sender) = CallbackWorkspaceManager::new(|_, _| {});

        let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel();
        let broker_for_task = broker.clone();
        let task = tokio::spawn(run_wm(broker_for_task, manager, shutdown_rx));

        sender.send(ServerId::new("host", 1), vec![1]);
        tokio::time::sleep(Duration::from_millis(20)).await;

        let (_, data, _) = broker.drain_for_scm();
        assert!(data.is_empty());

        let _ = shutdown_tx.send(());
        task.await.unwrap();
    }

    #[tokio::test]
    async fn test_run_wm_forwards_connect_and_disconnect_requests() {
        let broker = Arc::new(Broker::new(QuenchConfig::default()));
        let (manager, sender) = CallbackWorkspaceManager::new(|_, _| {});

        let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel();
        let broker_for_task = broker.clone();
        let task = tokio::spawn(run_wm(broker_for_task, manager, shutdown_rx));

        let id = ServerId::new("host", 1);
        sender.connect(id.clone());
        tokio::time::sleep(Duration::from_millis(20)).await;

        let (control, _, _) = broker.drain_for_scm();
        assert!(matches!(
            control[0],
            ControlMsg::ConnectRequest { connect: true, .. }
        ));

        let _ = shutdown_tx.send(());
        task.await.unwrap();
    }
}
