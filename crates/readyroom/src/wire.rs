//! Stamps and sends envelopes on one connection.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use readyroom_protocol::{Codec, Envelope, Payload, SystemMessage};
use readyroom_transport::{Connection, WebSocketConnection};

use crate::ReadyroomError;

/// The sending half of a connection, shared by the tasks that write to it.
///
/// Gives each envelope the next sequence number and a timestamp relative
/// to when the connection started.
pub(crate) struct Outbox<C: Codec> {
    conn: Arc<WebSocketConnection>,
    codec: C,
    seq: AtomicU64,
    start: Instant,
}

impl<C: Codec> Outbox<C> {
    pub(crate) fn new(conn: Arc<WebSocketConnection>, codec: C) -> Self {
        Self {
            conn,
            codec,
            seq: AtomicU64::new(0),
            start: Instant::now(),
        }
    }

    pub(crate) async fn send(&self, payload: Payload) -> Result<(), ReadyroomError> {
        let envelope = Envelope {
            seq: self.seq.fetch_add(1, Ordering::Relaxed),
            timestamp: self.start.elapsed().as_millis() as u64,
            payload,
        };
        let bytes = self.codec.encode(&envelope)?;
        self.conn.send(&bytes).await?;
        Ok(())
    }

    pub(crate) async fn send_system(&self, msg: SystemMessage) -> Result<(), ReadyroomError> {
        self.send(Payload::System(msg)).await
    }

    /// Sends a `SystemMessage::Error`.
    pub(crate) async fn send_error(&self, code: u16, message: impl Into<String>) -> Result<(), ReadyroomError> {
        self.send_system(SystemMessage::Error {
            code,
            message: message.into(),
        })
        .await
    }

    /// Sends a goodbye and closes the connection. Errors are ignored;
    /// the other side may already be gone.
    pub(crate) async fn close_with(&self, msg: SystemMessage) {
        let _ = self.send_system(msg).await;
        let _ = self.conn.close().await;
    }

    pub(crate) fn decode(&self, data: &[u8]) -> Result<Envelope, ReadyroomError> {
        Ok(self.codec.decode(data)?)
    }
}
