//! The Broker: the only shared mutable state between the WM and SCM.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Instant;

use tokio::sync::Notify;

use asbridge_protocol::{ControlMsg, DataMsg, ServerId};
use asbridge_utils::config::QuenchConfig;

use crate::quench::Quench;

/// State guarded by the Broker's single mutex. Everything here is a
/// plain `VecDeque` moved wholesale under the lock — §9's
/// re-architecture note ("queue of messages reassigned wholesale under
/// lock becomes `mem::take` on a `VecDeque`") applied literally.
struct Inner {
    to_wm_control: VecDeque<ControlMsg>,
    to_wm_data: VecDeque<DataMsg>,
    to_scm_control: VecDeque<ControlMsg>,
    to_scm_data: VecDeque<DataMsg>,
    batch_count: u32,
    batch_start: Instant,
}

impl Inner {
    fn new() -> Self {
        Self {
            to_wm_control: VecDeque::new(),
            to_wm_data: VecDeque::new(),
            to_scm_control: VecDeque::new(),
            to_scm_data: VecDeque::new(),
            batch_count: 0,
            batch_start: Instant::now(),
        }
    }

    /// Quench computation (§4.1), invoked under the mutex.
    fn compute_quench(&mut self, config: &QuenchConfig, now: Instant) -> Quench {
        if self.to_wm_data.len() >= config.queue_max {
            return Quench::Blocked;
        }
        if self.batch_count < config.batch_count {
            return Quench::Unlimited;
        }
        let elapsed_budget = self.batch_count as u64 * config.rate_ms_per_msg;
        let deadline = self.batch_start + std::time::Duration::from_millis(elapsed_budget);
        if deadline <= now {
            self.batch_count = 0;
            self.batch_start = now;
            Quench::Unlimited
        } else {
            Quench::At(deadline)
        }
    }
}

/// Thread-safe mailbox and flow controller between the WM and SCM
/// tasks (§4.1). The Broker never `.await`s and never performs I/O;
/// every operation is an `O(queue splice)` under `inner`, with a
/// single-slot [`tokio::sync::Notify`] per direction realizing the
/// "posted-once, idempotent" wake-up discipline called for by the
/// distilled spec (§9).
pub struct Broker {
    inner: Mutex<Inner>,
    config: QuenchConfig,
    wm_wake: Notify,
    scm_wake: Notify,
}

impl Broker {
    /// Construct a Broker using the given quench configuration.
    pub fn new(config: QuenchConfig) -> Self {
        Self {
            inner: Mutex::new(Inner::new()),
            config,
            wm_wake: Notify::new(),
            scm_wake: Notify::new(),
        }
    }

    /// The quench configuration this Broker was constructed with.
    pub fn config(&self) -> &QuenchConfig {
        &self.config
    }

    /// Await the SCM-side wake-up notification. Callers must re-check
    /// whatever condition they are waiting on after this resolves,
    /// since `Notify` coalesces concurrent posts into one wake-up.
    pub async fn scm_wake(&self) {
        self.scm_wake.notified().await;
    }

    /// Await the WM-side wake-up notification. See [`Broker::scm_wake`].
    pub async fn wm_wake(&self) {
        self.wm_wake.notified().await;
    }

    /// WM→SCM: request a connection be established for `server_id`.
    ///
    /// Ordering obligation (§4.1): before enqueuing the request, purge
    /// every data message already queued for `server_id` on
    /// `to_scm_data`. This is what prevents a disconnect-then-reconnect
    /// sequence from delivering stale data to the new incarnation.
    pub fn request_connect(&self, server_id: ServerId) {
        let mut inner = self.inner.lock().unwrap();
        inner.to_scm_data.retain(|msg| msg.server_id != server_id);
        inner.to_scm_control.push_back(ControlMsg::ConnectRequest {
            server_id,
            connect: true,
        });
        drop(inner);
        self.scm_wake.notify_one();
    }

    /// WM→SCM: request the record for `server_id` be torn down.
    pub fn request_disconnect(&self, server_id: ServerId) {
        let mut inner = self.inner.lock().unwrap();
        inner.to_scm_control.push_back(ControlMsg::ConnectRequest {
            server_id,
            connect: false,
        });
        drop(inner);
        self.scm_wake.notify_one();
    }

    /// WM→SCM: enqueue outbound application data.
    pub fn send_data_to_scm(&self, data_msg: DataMsg) {
        let mut inner = self.inner.lock().unwrap();
        inner.to_scm_data.push_back(data_msg);
        drop(inner);
        self.scm_wake.notify_one();
    }

    /// Atomically move both WM-bound queues out. If `to_wm_data`'s
    /// prior length was at or above the queue cap, the SCM is woken so
    /// it re-evaluates quench against the now-shorter queue.
    pub fn drain_for_wm(&self) -> (Vec<ControlMsg>, Vec<DataMsg>) {
        let mut inner = self.inner.lock().unwrap();
        let was_at_cap = inner.to_wm_data.len() >= self.config.queue_max;
        let control = std::mem::take(&mut inner.to_wm_control).into_iter().collect();
        let data = std::mem::take(&mut inner.to_wm_data).into_iter().collect();
        drop(inner);
        if was_at_cap {
            self.scm_wake.notify_one();
        }
        (control, data)
    }

    /// Atomically move both SCM-bound queues out, along with the
    /// freshly recomputed quench state.
    pub fn drain_for_scm(&self) -> (Vec<ControlMsg>, Vec<DataMsg>, Quench) {
        let mut inner = self.inner.lock().unwrap();
        let control = std::mem::take(&mut inner.to_scm_control).into_iter().collect();
        let data = std::mem::take(&mut inner.to_scm_data).into_iter().collect();
        let quench = inner.compute_quench(&self.config, Instant::now());
        (control, data, quench)
    }

    /// SCM→WM: append a batch of control/data messages, account the
    /// data messages against the rate envelope, and wake the WM.
    /// Returns the freshly recomputed quench state so the SCM can
    /// re-derive its own select timeout without a separate round trip.
    pub fn deliver_to_wm(&self, control: Vec<ControlMsg>, data: Vec<DataMsg>) -> Quench {
        let mut inner = self.inner.lock().unwrap();
        inner.batch_count += data.len() as u32;
        inner.to_wm_control.extend(control);
        inner.to_wm_data.extend(data);
        let quench = inner.compute_quench(&self.config, Instant::now());
        drop(inner);
        self.wm_wake.notify_one();
        quench
    }

    /// Current quench state without draining anything, used by the
    /// SCM to re-read a fresher deadline (§4.2 step 1) without
    /// performing a full drain.
    pub fn peek_quench(&self) -> Quench {
        let mut inner = self.inner.lock().unwrap();
        inner.compute_quench(&self.config, Instant::now())
    }

    /// Depth of the WM-bound data queue, for tests and diagnostics.
    pub fn wm_data_depth(&self) -> usize {
        self.inner.lock().unwrap().to_wm_data.len()
    }
}
