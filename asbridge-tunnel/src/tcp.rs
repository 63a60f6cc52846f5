//! A plain TCP/bincode tunnel implementation.
//!
//! The retrieval pack's original source speaks through a TLS
//! subprocess; that transport is explicitly out of scope (§1) and only
//! its interface matters here, so this substitutes a direct
//! `tokio::net::TcpStream`, framed with [`asbridge_protocol::PayloadCodec`].
//! A real deployment would layer TLS underneath (or swap in a
//! subprocess-backed `Tunnel` impl) without touching the SCM.

use std::io;

use bytes::{Buf, BytesMut};
use tokio::io::Interest;
use tokio::net::TcpStream;
use tokio::sync::oneshot;
use tokio_util::codec::{Decoder, Encoder};

use asbridge_protocol::PayloadCodec;
use asbridge_utils::{AsbridgeError, Result};

use crate::tunnel::{Tunnel, TransferProgress, TunnelReady};
use async_trait::async_trait;

const READ_CHUNK: usize = 64 * 1024;

/// `Tunnel` implementation backed by a real, non-blocking
/// `tokio::net::TcpStream`.
pub struct TcpTunnel {
    host: String,
    port: u16,
    connecting: Option<oneshot::Receiver<io::Result<TcpStream>>>,
    stream: Option<TcpStream>,
    read_buf: BytesMut,
    write_buf: BytesMut,
    sending: bool,
    received: Option<Vec<u8>>,
}

impl TcpTunnel {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            connecting: None,
            stream: None,
            read_buf: BytesMut::with_capacity(READ_CHUNK),
            write_buf: BytesMut::new(),
            sending: false,
            received: None,
        }
    }
}

#[async_trait]
impl Tunnel for TcpTunnel {
    fn begin_connect(&mut self) {
        let (tx, rx) = oneshot::channel();
        let host = self.host.clone();
        let port = self.port;
        tokio::spawn(async move {
            let result = TcpStream::connect((host.as_str(), port)).await;
            let _ = tx.send(result);
        });
        self.connecting = Some(rx);
    }

    fn check_connect(&mut self) -> Result<bool> {
        let Some(rx) = self.connecting.as_mut() else {
            return Ok(self.stream.is_some());
        };
        match rx.try_recv() {
            Ok(Ok(stream)) => {
                let _ = stream.set_nodelay(true);
                self.stream = Some(stream);
                self.connecting = None;
                Ok(true)
            }
            Ok(Err(e)) => {
                self.connecting = None;
                Err(AsbridgeError::transport(e.to_string()))
            }
            Err(oneshot::error::TryRecvError::Empty) => Ok(false),
            Err(oneshot::error::TryRecvError::Closed) => {
                self.connecting = None;
                Err(AsbridgeError::transport("connect task dropped without a result"))
            }
        }
    }

    async fn ready(&mut self, want_write: bool) -> Result<TunnelReady> {
        let Some(stream) = self.stream.as_ref() else {
            return std::future::pending().await;
        };
        let interest = if want_write {
            Interest::READABLE | Interest::WRITABLE
        } else {
            Interest::READABLE
        };
        let ready = stream
            .ready(interest)
            .await
            .map_err(|e| AsbridgeError::transport(e.to_string()))?;
        Ok(TunnelReady {
            readable: ready.is_readable(),
            writable: ready.is_writable(),
        })
    }

    fn is_sending(&self) -> bool {
        self.sending
    }

    fn start_send(&mut self, payload: Vec<u8>) -> Result<()> {
        if self.sending {
            return Err(AsbridgeError::protocol_violation(
                "start_send called while a send is already in progress",
            ));
        }
        let mut codec = PayloadCodec;
        codec
            .encode(payload, &mut self.write_buf)
            .map_err(|e| AsbridgeError::transport(e.to_string()))?;
        self.sending = true;
        Ok(())
    }

    fn do_transfer(&mut self) -> Result<TransferProgress> {
        let mut progress = TransferProgress::default();
        let Some(stream) = self.stream.as_ref() else {
            return Ok(progress);
        };

        if self.sending && !self.write_buf.is_empty() {
            match stream.try_write(&self.write_buf) {
                Ok(0) => return Err(AsbridgeError::transport("connection closed while writing")),
                Ok(n) => {
                    self.write_buf.advance(n);
                    progress.sent = true;
                    if self.write_buf.is_empty() {
                        self.sending = false;
                    }
                }
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => {}
                Err(e) => return Err(AsbridgeError::transport(e.to_string())),
            }
        }

        if self.received.is_none() {
            let mut chunk = [0u8; READ_CHUNK];
            match stream.try_read(&mut chunk) {
                Ok(0) => return Err(AsbridgeError::transport("connection closed by peer")),
                Ok(n) => {
                    self.read_buf.extend_from_slice(&chunk[..n]);
                    let mut codec = PayloadCodec;
                    if let Some(payload) = codec
                        .decode(&mut self.read_buf)
                        .map_err(|e| AsbridgeError::transport(e.to_string()))?
                    {
                        self.received = Some(payload);
                    }
                }
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => {}
                Err(e) => return Err(AsbridgeError::transport(e.to_string())),
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
        self.stream = None;
        self.connecting = None;
        self.read_buf.clear();
        self.write_buf.clear();
        self.sending = false;
        self.received = None;
    }
}
