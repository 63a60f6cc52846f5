//! The SCM main loop (§4.2-§4.6): drains the Broker, drives every
//! per-server record through its handshake and data-transfer states,
//! and reports connection lifecycle and data back through the Broker.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::{Duration, Instant};

use asbridge_broker::{Broker, Quench};
use asbridge_protocol::{
    ControlMsg, DataMsg, RoleReply, RoleRequest, RoleResponseCode, ServerId,
};
use asbridge_utils::config::RuntimeConfig;
use asbridge_utils::AsbridgeError;

use crate::factory::TunnelFactory;
use crate::record::{RecordStatus, ServerRecord};

/// Run the SCM loop until `shutdown` resolves. Intended to be spawned
/// as its own tokio task by `asbridge-runtime`.
pub async fn run(
    broker: Arc<Broker>,
    config: RuntimeConfig,
    factory: Arc<dyn TunnelFactory>,
    mut shutdown: tokio::sync::oneshot::Receiver<()>,
) {
    let mut records: HashMap<ServerId, ServerRecord> = HashMap::new();
    let mut pending_removal: Vec<ServerId> = Vec::new();
    let mut out_control: Vec<ControlMsg> = Vec::new();
    let mut out_data: Vec<DataMsg> = Vec::new();
    let mut quench = broker.peek_quench();
    let mut notify_flag = true;

    'main: loop {
        if (&mut shutdown).try_recv().is_ok() {
            return;
        }

        let now = Instant::now();
        if matches!(quench, Quench::At(deadline) if deadline <= now) {
            notify_flag = true;
        }

        if notify_flag {
            notify_flag = false;
            let (control, data, q) = broker.drain_for_scm();
            quench = q;
            for msg in control {
                apply_control(msg, &mut records, &mut pending_removal, &factory, &mut out_control);
            }
            for msg in data {
                if let Some(record) = records.get_mut(&msg.server_id) {
                    if record.status != RecordStatus::Disconnected {
                        record.send_queue.push_back(msg.payload);
                    }
                }
            }
            if let Some(q) = flush(&broker, &mut out_control, &mut out_data, &mut records, &mut pending_removal) {
                quench = q;
            }
        }

        let now = Instant::now();
        let mut timeout: Option<Duration> = match quench {
            Quench::Blocked => None,
            Quench::Unlimited => None,
            Quench::At(deadline) => Some(deadline.saturating_duration_since(now)),
        };

        let mut connection_watch = false;
        for record in records.values_mut() {
            prepare_record(record, &config, &mut out_control, &mut pending_removal);
            if record.status == RecordStatus::Connecting {
                connection_watch = true;
            }
        }

        if !out_control.is_empty() || !out_data.is_empty() {
            if let Some(q) = flush(&broker, &mut out_control, &mut out_data, &mut records, &mut pending_removal) {
                quench = q;
            }
            continue 'main;
        }

        if matches!(quench, Quench::Unlimited) && connection_watch {
            timeout = Some(Duration::from_millis(config.quench.connect_probe_interval_ms));
        }

        let event = wait_for_event(&broker, &mut records, quench, now, timeout).await;

        match event {
            // A broker wake-up or an expired select timeout both mean
            // "re-check the Broker": the next iteration's notify_flag
            // gate must fire so pending WM-submitted control/data (and
            // a freshly recomputed quench deadline) actually get
            // drained instead of sitting in the SCM-bound queues until
            // some unrelated tunnel becomes ready.
            Wake::Broker | Wake::Timeout => {
                notify_flag = true;
            }
            Wake::Ready(id) => {
                if !matches!(quench, Quench::Blocked) {
                    if let Some(record) = records.get_mut(&id) {
                        transfer(record, &config, &mut out_control, &mut out_data, &mut pending_removal);
                    }
                    if let Some(q) =
                        flush(&broker, &mut out_control, &mut out_data, &mut records, &mut pending_removal)
                    {
                        quench = q;
                    }
                }
            }
        }
    }
}

enum Wake {
    Broker,
    Timeout,
    Ready(ServerId),
}

async fn wait_for_event(
    broker: &Broker,
    records: &mut HashMap<ServerId, ServerRecord>,
    quench: Quench,
    now: Instant,
    timeout: Option<Duration>,
) -> Wake {
    let mut futs: Vec<Pin<Box<dyn Future<Output = Wake> + Send + '_>>> = Vec::new();
    futs.push(Box::pin(async move {
        broker.scm_wake().await;
        Wake::Broker
    }));
    if let Some(timeout) = timeout {
        futs.push(Box::pin(async move {
            tokio::time::sleep(timeout).await;
            Wake::Timeout
        }));
    }

    let blocking = quench.is_blocking(now);
    for (id, record) in records.iter_mut() {
        if !blocking && matches!(record.status, RecordStatus::RoleReply | RecordStatus::Connected) {
            let want_write = record.tunnel.is_sending();
            let id = id.clone();
            futs.push(Box::pin(async move {
                let _ = record.tunnel.ready(want_write).await;
                Wake::Ready(id)
            }));
        }
    }

    let (event, _idx, _rest) = futures::future::select_all(futs).await;
    event
}

/// §4.3 control-message application (connect/disconnect requests).
fn apply_control(
    msg: ControlMsg,
    records: &mut HashMap<ServerId, ServerRecord>,
    pending_removal: &mut Vec<ServerId>,
    factory: &Arc<dyn TunnelFactory>,
    out_control: &mut Vec<ControlMsg>,
) {
    match msg {
        ControlMsg::ConnectRequest { server_id, connect: true } => {
            if let Some(existing) = records.get_mut(&server_id) {
                if existing.status != RecordStatus::Disconnected {
                    existing.fail(None);
                    out_control.push(disconnection_notice(existing));
                }
            }
            // The old incarnation under this id (if any) is replaced by
            // the insert below; remove it now, and drop any
            // pending-removal entry still carrying this id, so the next
            // flush's deferred-removal pass can never delete the new
            // record out from under its own key.
            records.remove(&server_id);
            pending_removal.retain(|id| id != &server_id);
            let tunnel = factory.create(&server_id);
            records.insert(server_id.clone(), ServerRecord::new(server_id, tunnel));
        }
        ControlMsg::ConnectRequest { server_id, connect: false } => {
            if let Some(record) = records.get_mut(&server_id) {
                if record.status != RecordStatus::Disconnected {
                    fail_record(record, None, out_control, pending_removal);
                }
            }
        }
        // SCM never receives messages travelling in this direction.
        ControlMsg::ConnectionNotice { .. } | ControlMsg::DisconnectionNotice { .. } => {}
    }
}

/// Fail `record`, push its `DisconnectionNotice`, and mark it for
/// physical removal from the map on the next flush (§4.6).
fn fail_record(
    record: &mut ServerRecord,
    error: Option<String>,
    out_control: &mut Vec<ControlMsg>,
    pending_removal: &mut Vec<ServerId>,
) {
    record.fail(error);
    out_control.push(disconnection_notice(record));
    pending_removal.push(record.id.clone());
}

/// §4.3 per-record pre-select preparation: advance `Scheduled` and
/// `Connecting` records, and start a queued send for an idle
/// `Connected` tunnel. `RoleReply`/`Connected` read-readiness is
/// registered later, in `wait_for_event`.
fn prepare_record(
    record: &mut ServerRecord,
    config: &RuntimeConfig,
    out_control: &mut Vec<ControlMsg>,
    pending_removal: &mut Vec<ServerId>,
) {
    match record.status {
        RecordStatus::Scheduled => {
            record.tunnel.begin_connect();
            record.status = RecordStatus::Connecting;
        }
        RecordStatus::Connecting => match record.tunnel.check_connect() {
            Ok(true) => {
                let req = RoleRequest::workspace(config.protocol.major, config.protocol.minor);
                match bincode::serialize(&req) {
                    Ok(bytes) => match record.tunnel.start_send(bytes) {
                        Ok(()) => record.status = RecordStatus::RoleReply,
                        Err(e) => fail_record(record, Some(e.as_disconnect_reason()), out_control, pending_removal),
                    },
                    Err(e) => fail_record(record, Some(e.to_string()), out_control, pending_removal),
                }
            }
            Ok(false) => {}
            Err(e) => fail_record(record, Some(e.as_disconnect_reason()), out_control, pending_removal),
        },
        RecordStatus::RoleReply => {}
        RecordStatus::Connected => {
            if !record.tunnel.is_sending() {
                if let Some(payload) = record.send_queue.pop_front() {
                    if let Err(e) = record.tunnel.start_send(payload) {
                        fail_record(record, Some(e.as_disconnect_reason()), out_control, pending_removal);
                    }
                }
            }
        }
        RecordStatus::Disconnected => {}
    }
}

/// §4.4 post-select transfer micro-loop, bounded by
/// `config.quench.transfer_cap`.
fn transfer(
    record: &mut ServerRecord,
    config: &RuntimeConfig,
    out_control: &mut Vec<ControlMsg>,
    out_data: &mut Vec<DataMsg>,
    pending_removal: &mut Vec<ServerId>,
) {
    if !matches!(record.status, RecordStatus::RoleReply | RecordStatus::Connected) {
        return;
    }

    for _ in 0..config.quench.transfer_cap {
        if !record.tunnel.is_sending() {
            if let Some(payload) = record.send_queue.pop_front() {
                if let Err(e) = record.tunnel.start_send(payload) {
                    fail_record(record, Some(e.as_disconnect_reason()), out_control, pending_removal);
                    return;
                }
            }
        }
        let sending_before = record.tunnel.is_sending();

        if let Err(e) = record.tunnel.do_transfer() {
            fail_record(record, Some(e.as_disconnect_reason()), out_control, pending_removal);
            return;
        }

        let has_message = record.tunnel.has_received();
        let still_sending = record.tunnel.is_sending();
        let keep_going = has_message || (sending_before && !still_sending);

        if has_message {
            if let Some(payload) = record.tunnel.take_received() {
                handle_incoming(record, payload, config, out_control, out_data, pending_removal);
                if record.status == RecordStatus::Disconnected {
                    return;
                }
            }
        }

        if !keep_going {
            break;
        }
    }
}

/// §4.5 handling of one fully-framed incoming message: a role-handshake
/// reply while `RoleReply`, or application data while `Connected`.
fn handle_incoming(
    record: &mut ServerRecord,
    payload: Vec<u8>,
    config: &RuntimeConfig,
    out_control: &mut Vec<ControlMsg>,
    out_data: &mut Vec<DataMsg>,
    pending_removal: &mut Vec<ServerId>,
) {
    if record.status == RecordStatus::RoleReply {
        match bincode::deserialize::<RoleReply>(&payload) {
            Ok(reply) => match reply.code {
                RoleResponseCode::MustUpgrade => {
                    fail_record(
                        record,
                        Some(AsbridgeError::MustUpgrade.as_disconnect_reason()),
                        out_control,
                        pending_removal,
                    );
                }
                RoleResponseCode::Rejected => {
                    let reason = reply.reason.unwrap_or_else(|| "no reason given".into());
                    fail_record(
                        record,
                        Some(AsbridgeError::handshake_rejected(reason).as_disconnect_reason()),
                        out_control,
                        pending_removal,
                    );
                }
                RoleResponseCode::Ok => {
                    if reply.minor < config.protocol.last_compatible_minor {
                        fail_record(
                            record,
                            Some(
                                AsbridgeError::ServerTooOld {
                                    server_minor: reply.minor,
                                    required_minor: config.protocol.last_compatible_minor,
                                }
                                .as_disconnect_reason(),
                            ),
                            out_control,
                            pending_removal,
                        );
                    } else {
                        let negotiated = reply.minor.min(config.protocol.minor);
                        record.minor = Some(negotiated);
                        record.status = RecordStatus::Connected;
                        out_control.push(ControlMsg::ConnectionNotice {
                            server_id: record.id.clone(),
                            minor: negotiated,
                        });
                    }
                }
            },
            Err(_) => {
                fail_record(
                    record,
                    Some(AsbridgeError::protocol_violation("malformed role handshake reply").as_disconnect_reason()),
                    out_control,
                    pending_removal,
                );
            }
        }
    } else {
        debug_assert_eq!(record.status, RecordStatus::Connected);
        out_data.push(DataMsg::new(record.id.clone(), payload));
    }
}


fn disconnection_notice(record: &ServerRecord) -> ControlMsg {
    ControlMsg::DisconnectionNotice {
        server_id: record.id.clone(),
        error: record.last_error.clone(),
    }
}

/// §4.6: deliver any accumulated WM-bound output and physically drop
/// every record a `DisconnectionNotice` was just sent for.
fn flush(
    broker: &Broker,
    out_control: &mut Vec<ControlMsg>,
    out_data: &mut Vec<DataMsg>,
    records: &mut HashMap<ServerId, ServerRecord>,
    pending_removal: &mut Vec<ServerId>,
) -> Option<Quench> {
    if out_control.is_empty() && out_data.is_empty() {
        return None;
    }
    let quench = broker.deliver_to_wm(std::mem::take(out_control), std::mem::take(out_data));
    for id in pending_removal.drain(..) {
        records.remove(&id);
    }
    Some(quench)
}
