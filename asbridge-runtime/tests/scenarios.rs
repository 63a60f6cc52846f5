//! End-to-end scenario tests (SPEC_FULL.md §8, S1-S6): a scripted
//! `FakeTunnel` per `ServerId` stands in for the network, the SCM runs
//! for real on its own task, and each test drives the Broker directly
//! exactly as a `WorkspaceManager` would.

use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use asbridge_broker::Broker;
use asbridge_protocol::{ControlMsg, DataMsg, RoleReply, ServerId};
use asbridge_scm::TunnelFactory;
use asbridge_tunnel::{FakeTunnel, FakeTunnelHandle, Tunnel};
use asbridge_utils::config::RuntimeConfig;

const POLL_TIMEOUT: Duration = Duration::from_secs(2);

/// Hands out a fresh `FakeTunnel` per `ServerId` the SCM asks for,
/// recording every handle created (in creation order) so a test can
/// script each successive incarnation of a `ServerId` independently.
#[derive(Clone, Default)]
struct ScriptedFactory {
    created: Arc<Mutex<Vec<(ServerId, FakeTunnelHandle)>>>,
}

impl ScriptedFactory {
    /// The handle for the `n`th (0-indexed) tunnel created for `id`.
    async fn nth_handle(&self, id: &ServerId, n: usize) -> FakeTunnelHandle {
        wait_for(POLL_TIMEOUT, || {
            self.created
                .lock()
                .unwrap()
                .iter()
                .filter(|(sid, _)| sid == id)
                .nth(n)
                .map(|(_, h)| h.clone())
        })
        .await
        .expect("tunnel factory never invoked enough times for this ServerId")
    }

    /// The handle for the first tunnel created for `id`.
    async fn handle(&self, id: &ServerId) -> FakeTunnelHandle {
        self.nth_handle(id, 0).await
    }
}

impl TunnelFactory for ScriptedFactory {
    fn create(&self, server_id: &ServerId) -> Box<dyn Tunnel> {
        let (tunnel, handle) = FakeTunnel::new();
        self.created.lock().unwrap().push((server_id.clone(), handle));
        Box::new(tunnel)
    }
}

/// Polls `f` until it returns `Some`, yielding to the runtime between
/// attempts so a task spawned on a single-threaded test executor (the
/// default `#[tokio::test]` flavor) gets a chance to make progress.
async fn wait_for<T>(timeout: Duration, mut f: impl FnMut() -> Option<T>) -> Option<T> {
    let deadline = Instant::now() + timeout;
    loop {
        if let Some(v) = f() {
            return Some(v);
        }
        if Instant::now() >= deadline {
            return None;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}

async fn wait_for_control(
    broker: &Broker,
    timeout: Duration,
    mut pred: impl FnMut(&ControlMsg) -> bool,
) -> ControlMsg {
    let deadline = Instant::now() + timeout;
    loop {
        let (control, _data) = broker.drain_for_wm();
        if let Some(msg) = control.into_iter().find(|m| pred(m)) {
            return msg;
        }
        if Instant::now() >= deadline {
            panic!("timed out waiting for expected control message");
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}

async fn wait_for_data_count(broker: &Broker, n: usize, timeout: Duration) -> Vec<DataMsg> {
    let deadline = Instant::now() + timeout;
    let mut collected = Vec::new();
    loop {
        let (_control, data) = broker.drain_for_wm();
        collected.extend(data);
        if collected.len() >= n {
            return collected;
        }
        if Instant::now() >= deadline {
            panic!(
                "timed out waiting for {} data messages, only got {}",
                n,
                collected.len()
            );
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}

struct Harness {
    broker: Arc<Broker>,
    factory: ScriptedFactory,
    shutdown: tokio::sync::oneshot::Sender<()>,
    task: tokio::task::JoinHandle<()>,
}

impl Harness {
    fn spawn(config: RuntimeConfig) -> Self {
        let broker = Arc::new(Broker::new(config.quench));
        let factory = ScriptedFactory::default();
        let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel();
        let scm_broker = broker.clone();
        let scm_factory: Arc<dyn TunnelFactory> = Arc::new(factory.clone());
        let task = tokio::spawn(async move {
            asbridge_scm::run(scm_broker, config, scm_factory, shutdown_rx).await;
        });
        Self {
            broker,
            factory,
            shutdown: shutdown_tx,
            task,
        }
    }

    async fn stop(self) {
        let _ = self.shutdown.send(());
        let _ = self.task.await;
    }
}

fn ok_reply(minor: u32) -> Vec<u8> {
    bincode::serialize(&RoleReply::ok(minor)).unwrap()
}

#[tokio::test]
async fn s1_happy_path() {
    let harness = Harness::spawn(RuntimeConfig::default());
    let a = ServerId::new("as-a.example.com", 9001);

    harness.broker.request_connect(a.clone());
    let handle = harness.factory.handle(&a).await;
    handle.set_connect_ready();
    handle.push_incoming(ok_reply(5));

    let notice = wait_for_control(&harness.broker, POLL_TIMEOUT, |m| {
        matches!(m, ControlMsg::ConnectionNotice { server_id, .. } if *server_id == a)
    })
    .await;
    assert!(matches!(notice, ControlMsg::ConnectionNotice { minor: 5, .. }));

    harness
        .broker
        .send_data_to_scm(DataMsg::new(a.clone(), b"x".to_vec()));
    wait_for(POLL_TIMEOUT, || (!handle.sent().is_empty()).then_some(()))
        .await
        .expect("\"x\" should have been sent over the tunnel");
    assert_eq!(handle.sent(), vec![b"x".to_vec()]);

    handle.push_incoming(b"e".to_vec());
    let data = wait_for_data_count(&harness.broker, 1, POLL_TIMEOUT).await;
    assert_eq!(data[0].server_id, a);
    assert_eq!(data[0].payload, b"e".to_vec());

    harness.broker.request_disconnect(a.clone());
    let notice = wait_for_control(&harness.broker, POLL_TIMEOUT, |m| {
        matches!(m, ControlMsg::DisconnectionNotice { server_id, .. } if *server_id == a)
    })
    .await;
    assert!(matches!(
        notice,
        ControlMsg::DisconnectionNotice { error: None, .. }
    ));

    // Further sends to a disconnected ServerId are no-ops: nothing new
    // reaches the tunnel, which the caller observed already closed.
    assert!(handle.is_closed());
    harness
        .broker
        .send_data_to_scm(DataMsg::new(a.clone(), b"late".to_vec()));
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(handle.sent(), vec![b"x".to_vec()]);

    harness.stop().await;
}

#[tokio::test]
async fn s2_version_too_low() {
    let mut config = RuntimeConfig::default();
    config.protocol.last_compatible_minor = 3;
    let harness = Harness::spawn(config);
    let b = ServerId::new("as-b.example.com", 9002);

    harness.broker.request_connect(b.clone());
    let handle = harness.factory.handle(&b).await;
    handle.set_connect_ready();
    handle.push_incoming(ok_reply(1));

    let notice = wait_for_control(&harness.broker, POLL_TIMEOUT, |m| {
        matches!(m, ControlMsg::DisconnectionNotice { server_id, .. } if *server_id == b)
    })
    .await;
    match notice {
        ControlMsg::DisconnectionNotice { error: Some(msg), .. } => {
            assert!(msg.contains("too old"), "unexpected error: {msg}");
        }
        other => panic!("expected a failing DisconnectionNotice, got {other:?}"),
    }

    let (control, _) = harness.broker.drain_for_wm();
    assert!(
        !control
            .iter()
            .any(|m| matches!(m, ControlMsg::ConnectionNotice { .. })),
        "no ConnectionNotice should have been delivered"
    );

    harness.stop().await;
}

#[tokio::test]
async fn s3_must_upgrade() {
    let harness = Harness::spawn(RuntimeConfig::default());
    let c = ServerId::new("as-c.example.com", 9003);

    harness.broker.request_connect(c.clone());
    let handle = harness.factory.handle(&c).await;
    handle.set_connect_ready();
    handle.push_incoming(bincode::serialize(&RoleReply::must_upgrade()).unwrap());

    let notice = wait_for_control(&harness.broker, POLL_TIMEOUT, |m| {
        matches!(m, ControlMsg::DisconnectionNotice { server_id, .. } if *server_id == c)
    })
    .await;
    match notice {
        ControlMsg::DisconnectionNotice { error: Some(msg), .. } => {
            assert!(msg.contains("upgrade"), "unexpected error: {msg}");
        }
        other => panic!("expected a failing DisconnectionNotice, got {other:?}"),
    }

    harness.stop().await;
}

#[tokio::test]
async fn s4_disconnect_races_data() {
    let harness = Harness::spawn(RuntimeConfig::default());
    let d = ServerId::new("as-d.example.com", 9004);

    harness.broker.request_connect(d.clone());
    let handle_v1 = harness.factory.handle(&d).await;
    handle_v1.set_connect_ready();
    handle_v1.push_incoming(ok_reply(5));
    wait_for_control(&harness.broker, POLL_TIMEOUT, |m| {
        matches!(m, ControlMsg::ConnectionNotice { server_id, .. } if *server_id == d)
    })
    .await;

    // Queue "y" and immediately request a disconnect before it can be
    // sent; the old tunnel handle must never observe it.
    harness
        .broker
        .send_data_to_scm(DataMsg::new(d.clone(), b"y".to_vec()));
    harness.broker.request_disconnect(d.clone());
    wait_for_control(&harness.broker, POLL_TIMEOUT, |m| {
        matches!(m, ControlMsg::DisconnectionNotice { server_id, .. } if *server_id == d)
    })
    .await;

    // Reconnect: requestConnect purges any stale to-SCM data for `d`,
    // so the new incarnation must never see "y".
    harness.broker.request_connect(d.clone());
    let handle_v2 = harness.factory.nth_handle(&d, 1).await;
    handle_v2.set_connect_ready();
    handle_v2.push_incoming(ok_reply(5));

    let notice = wait_for_control(&harness.broker, POLL_TIMEOUT, |m| {
        matches!(m, ControlMsg::ConnectionNotice { server_id, .. } if *server_id == d)
    })
    .await;
    assert!(matches!(notice, ControlMsg::ConnectionNotice { .. }));

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(
        !handle_v1.sent().contains(&b"y".to_vec()),
        "stale data must never reach the dying incarnation's tunnel"
    );
    assert!(
        !handle_v2.sent().contains(&b"y".to_vec()),
        "stale data must never reach the new incarnation's tunnel either"
    );

    harness.stop().await;
}

#[tokio::test]
async fn s5_quench_caps_wm_bound_depth() {
    let mut config = RuntimeConfig::default();
    config.quench.queue_max = 50;
    let harness = Harness::spawn(config);
    let e = ServerId::new("as-e.example.com", 9005);

    harness.broker.request_connect(e.clone());
    let handle = harness.factory.handle(&e).await;
    handle.set_connect_ready();
    handle.push_incoming(ok_reply(5));
    wait_for_control(&harness.broker, POLL_TIMEOUT, |m| {
        matches!(m, ControlMsg::ConnectionNotice { server_id, .. } if *server_id == e)
    })
    .await;

    for i in 0..200u32 {
        handle.push_incoming(i.to_be_bytes().to_vec());
    }

    // The WM never drains. Give the SCM plenty of time to try to read
    // everything it can; quench must have suspended it well short of
    // 200.
    tokio::time::sleep(Duration::from_millis(300)).await;
    let depth = harness.broker.wm_data_depth();
    assert!(
        depth <= 51,
        "WM-bound depth {depth} exceeds QUENCH_QUEUE_MAX + 1"
    );

    // Draining resumes reads; eventually every event arrives.
    let data = wait_for_data_count(&harness.broker, 200, Duration::from_secs(5)).await;
    assert_eq!(data.len(), 200);

    harness.stop().await;
}

#[tokio::test]
async fn s6_unknown_disconnect_is_a_no_op() {
    let harness = Harness::spawn(RuntimeConfig::default());
    let z = ServerId::new("as-z.example.com", 9006);

    harness.broker.request_disconnect(z);
    tokio::time::sleep(Duration::from_millis(100)).await;

    let (control, data) = harness.broker.drain_for_wm();
    assert!(control.is_empty());
    assert!(data.is_empty());

    harness.stop().await;
}
