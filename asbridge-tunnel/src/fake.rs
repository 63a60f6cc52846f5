//! A scriptable in-process fake tunnel, used by the SCM's own test
//! suite and by `asbridge-runtime`'s end-to-end scenario tests (§8).
//!
//! [`FakeTunnel::new`] returns the tunnel (handed to the SCM, which
//! takes ownership behind a `Box<dyn Tunnel>`) paired with a
//! [`FakeTunnelHandle`] the test keeps, used to drive connect
//! readiness, inject incoming frames, and inspect what was sent.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::sync::Notify;

use asbridge_utils::{AsbridgeError, Result};

use crate::tunnel::{Tunnel, TransferProgress, TunnelReady};

struct Shared {
    connect_ready: bool,
    connect_error: Option<String>,
    incoming: VecDeque<Vec<u8>>,
    sent: Vec<Vec<u8>>,
    closed: bool,
}

/// Test-side handle to a [`FakeTunnel`] already handed off to the SCM.
#[derive(Clone)]
pub struct FakeTunnelHandle {
    shared: Arc<Mutex<Shared>>,
    notify: Arc<Notify>,
}

impl FakeTunnelHandle {
    /// Make the next `check_connect` report ready.
    pub fn set_connect_ready(&self) {
        self.shared.lock().unwrap().connect_ready = true;
        self.notify.notify_waiters();
    }

    /// Make the next `check_connect` fail with `reason`.
    pub fn fail_connect(&self, reason: impl Into<String>) {
        self.shared.lock().unwrap().connect_error = Some(reason.into());
        self.notify.notify_waiters();
    }

    /// Push a framed message the tunnel will yield from `do_transfer`
    /// on a later call, in FIFO order.
    pub fn push_incoming(&self, payload: Vec<u8>) {
        self.shared.lock().unwrap().incoming.push_back(payload);
        self.notify.notify_waiters();
    }

    /// Every payload sent over this tunnel so far, in send order.
    pub fn sent(&self) -> Vec<Vec<u8>> {
        self.shared.lock().unwrap().sent.clone()
    }

    /// Whether `disconnect` has been called on the paired tunnel.
    pub fn is_closed(&self) -> bool {
        self.shared.lock().unwrap().closed
    }
}

/// `Tunnel` implementation driven entirely by a paired
/// [`FakeTunnelHandle`]; never touches real I/O.
pub struct FakeTunnel {
    shared: Arc<Mutex<Shared>>,
    notify: Arc<Notify>,
    sending: Option<Vec<u8>>,
    received: Option<Vec<u8>>,
}

impl FakeTunnel {
    pub fn new() -> (Self, FakeTunnelHandle) {
        let shared = Arc::new(Mutex::new(Shared {
            connect_ready: false,
            connect_error: None,
            incoming: VecDeque::new(),
            sent: Vec::new(),
            closed: false,
        }));
        let notify = Arc::new(Notify::new());
        let tunnel = Self {
            shared: shared.clone(),
            notify: notify.clone(),
            sending: None,
            received: None,
        };
        (tunnel, FakeTunnelHandle { shared, notify })
    }
}

#[async_trait]
impl Tunnel for FakeTunnel {
    fn begin_connect(&mut self) {
        // Nothing to kick off; readiness is driven by the test via
        // FakeTunnelHandle::set_connect_ready.
    }

    fn check_connect(&mut self) -> Result<bool> {
        let mut shared = self.shared.lock().unwrap();
        if let Some(reason) = shared.connect_error.take() {
            return Err(AsbridgeError::transport(reason));
        }
        Ok(shared.connect_ready)
    }

    async fn ready(&mut self, want_write: bool) -> Result<TunnelReady> {
        if want_write {
            let readable = !self.shared.lock().unwrap().incoming.is_empty();
            return Ok(TunnelReady {
                readable,
                writable: true,
            });
        }
        loop {
            {
                let shared = self.shared.lock().unwrap();
                if shared.closed {
                    return Err(AsbridgeError::transport("fake tunnel closed"));
                }
                if !shared.incoming.is_empty() {
                    return Ok(TunnelReady {
                        readable: true,
                        writable: false,
                    });
                }
            }
            self.notify.notified().await;
        }
    }

    fn is_sending(&self) -> bool {
        self.sending.is_some()
    }

    fn start_send(&mut self, payload: Vec<u8>) -> Result<()> {
        if self.sending.is_some() {
            return Err(AsbridgeError::protocol_violation(
                "start_send called while a send is already in progress",
            ));
        }
        self.sending = Some(payload);
        Ok(())
    }

    fn do_transfer(&mut self) -> Result<TransferProgress> {
        let mut progress = TransferProgress::default();

        if let Some(payload) = self.sending.take() {
            self.shared.lock().unwrap().sent.push(payload);
            progress.sent = true;
        }

        if self.received.is_none() {
            let next = self.shared.lock().unwrap().incoming.pop_front();
            if let Some(payload) = next {
                self.received = Some(payload);
            }
        }
        progress.received = self.received.is_some();

        Ok(progress)
    }

    fn has_received(&self) -> bool {
        self.received.is_some()
    }

    fn take_received(&mut self) -> Option<Vec<u8>> {
        self.received.take()
    }

    fn disconnect(&mut self) {
        self.shared.lock().unwrap().closed = true;
    }
}
