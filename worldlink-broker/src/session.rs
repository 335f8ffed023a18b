//! One live WebSocket connection to a world.
//!
//! A [`Session`] owns the outbound half of the socket behind a mutex so
//! concurrent dispatchers never interleave frames, and tracks the last time
//! any activity (inbound frame or pong) was observed so the lifecycle
//! controller's sweep can evict it.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

use axum::extract::ws::{Message, WebSocket};
use futures::stream::SplitSink;
use parking_lot::Mutex;
use tokio::sync::Mutex as AsyncMutex;
use worldlink_types::Envelope;

use crate::errors::Error;

/// One registered world connection.
pub struct Session {
    client_id: String,
    last_seen: Mutex<Instant>,
    closed: AtomicBool,
    sink: AsyncMutex<SplitSink<WebSocket, Message>>,
}

impl Session {
    /// Wraps the outbound half of a freshly upgraded websocket.
    pub fn new(client_id: String, sink: SplitSink<WebSocket, Message>) -> Self {
        Self {
            client_id,
            last_seen: Mutex::new(Instant::now()),
            closed: AtomicBool::new(false),
            sink: AsyncMutex::new(sink),
        }
    }

    /// The world identity this session was registered under.
    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    /// Whether `close` has already been called on this session.
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Timestamp of the last inbound frame or pong.
    pub fn last_seen(&self) -> Instant {
        *self.last_seen.lock()
    }

    /// Records activity, resetting the inactivity clock.
    pub fn touch(&self) {
        *self.last_seen.lock() = Instant::now();
    }

    /// Sends an envelope as a text frame. Marks the session closed on write failure.
    pub async fn send(&self, envelope: &Envelope) -> Result<(), Error> {
        use futures::SinkExt as _;

        if self.is_closed() {
            return Err(Error::ConnectionClosed);
        }
        let text = envelope.to_json()?;
        let mut sink = self.sink.lock().await;
        if let Err(err) = sink.send(Message::text(text)).await {
            self.closed.store(true, Ordering::Release);
            return Err(Error::Axum(err));
        }
        Ok(())
    }

    /// Sends a protocol-level ping with the `keepalive` payload.
    pub async fn ping(&self) -> Result<(), Error> {
        use futures::SinkExt as _;

        if self.is_closed() {
            return Err(Error::ConnectionClosed);
        }
        let mut sink = self.sink.lock().await;
        sink.send(Message::Ping("keepalive".into()))
            .await
            .map_err(|err| {
                self.closed.store(true, Ordering::Release);
                Error::Axum(err)
            })
    }

    /// Best-effort close: sends the close frame (if any) and marks the
    /// session terminal. Idempotent.
    pub async fn close(&self, close_frame: Option<axum::extract::ws::CloseFrame>) {
        use futures::SinkExt as _;

        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        let mut sink = self.sink.lock().await;
        let _ = sink.send(Message::Close(close_frame)).await;
    }
}
