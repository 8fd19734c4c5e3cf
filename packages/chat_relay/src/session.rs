//! Session Protocol
//!
//! Drives one client connection from registration to termination:
//!
//! ```text
//! Connecting -> AwaitingName -> Active -> Terminated
//! ```
//!
//! The first text frame becomes the display name (trimmed, never rejected).
//! Every later text frame is handed to the message hook and then broadcast
//! as `"{name}: {frame}"`. A close frame, end of stream, transport error, or
//! relay-side close terminates the session and removes it from the registry.
//!
//! The protocol is transport-agnostic: it reads from any stream of `Frame`s
//! and writes to any `Sink<String>`. Outbound frames go through the
//! connection's outbox and a dedicated writer task, so a slow client only
//! ever stalls its own writer.

use futures::{Sink, SinkExt, Stream, StreamExt};
use std::fmt;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::connection::ConnectionHandle;
use crate::hub::ChatHub;

/// How long a terminated session waits for its writer to flush queued frames.
const WRITER_DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

/// One inbound frame, already stripped of transport detail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    Text(String),
    Close,
    /// Binary, ping, pong and anything else without chat meaning
    Other,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionState {
    Connecting,
    AwaitingName,
    Active { name: String },
    Terminated,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EndReason {
    /// The client sent a close frame
    ClientClosed,
    /// The inbound stream ended without a close frame
    StreamEnded,
    /// Receiving failed
    TransportError(String),
    /// The relay closed the connection (failed delivery or failed write)
    Evicted,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionOutcome {
    /// Display name, if the client got far enough to register one
    pub name: Option<String>,
    pub reason: EndReason,
    /// Chat messages broadcast by this client
    pub messages: usize,
}

struct Session<'a> {
    hub: &'a ChatHub,
    conn: ConnectionHandle,
    state: SessionState,
    messages: usize,
}

impl Session<'_> {
    async fn on_text(&mut self, text: String) {
        match &self.state {
            SessionState::AwaitingName => {
                let name = text.trim().to_string();
                self.hub.registry().register_name(&self.conn, &name).await;
                self.hub.metrics().name_registered();
                self.state = SessionState::Active { name };
            }
            SessionState::Active { name } => {
                self.hub.hook().on_message_received(name, &text);
                self.hub.metrics().message_received();

                let formatted = format!("{}: {}", name, text);
                self.hub
                    .broadcaster()
                    .broadcast(&formatted, &self.conn)
                    .await;
                self.messages += 1;
            }
            SessionState::Connecting | SessionState::Terminated => {
                debug!(conn_id = %self.conn.id(), "Ignoring frame outside of the message loop");
            }
        }
    }

    fn terminate(&mut self, reason: EndReason) -> SessionOutcome {
        let name = match std::mem::replace(&mut self.state, SessionState::Terminated) {
            SessionState::Active { name } => Some(name),
            _ => None,
        };
        SessionOutcome {
            name,
            reason,
            messages: self.messages,
        }
    }
}

/// Run the session protocol for one upgraded connection until it ends.
///
/// Registers the connection on entry and always removes it on exit.
pub async fn run_session<I, E, O>(
    hub: &ChatHub,
    origin: &str,
    mut inbound: I,
    outbound: O,
) -> SessionOutcome
where
    I: Stream<Item = Result<Frame, E>> + Unpin,
    E: fmt::Display,
    O: Sink<String> + Unpin + Send + 'static,
    O::Error: fmt::Display + Send,
{
    let (conn, outbox) = hub.open_connection(origin);
    let mut writer = tokio::spawn(write_outbox(outbox, outbound, conn.clone()));

    let mut session = Session {
        hub,
        conn: conn.clone(),
        state: SessionState::Connecting,
        messages: 0,
    };

    hub.registry().connect(&conn).await;
    hub.metrics().connection_opened();
    session.state = SessionState::AwaitingName;

    let reason = loop {
        let frame = tokio::select! {
            biased;
            _ = conn.closed() => break EndReason::Evicted,
            frame = inbound.next() => frame,
        };

        match frame {
            Some(Ok(Frame::Text(text))) => session.on_text(text).await,
            Some(Ok(Frame::Other)) => {
                debug!(conn_id = %conn.id(), "Ignoring non-text frame");
            }
            Some(Ok(Frame::Close)) => break EndReason::ClientClosed,
            Some(Err(e)) => {
                hub.metrics().transport_error();
                break EndReason::TransportError(e.to_string());
            }
            None => break EndReason::StreamEnded,
        }
    };

    let removed = hub.registry().disconnect(&conn).await;
    hub.metrics().connection_closed();
    // A failed write closes the connection without going through the broadcaster
    if removed && reason == EndReason::Evicted {
        hub.metrics().connection_evicted();
    }
    conn.close();

    let outcome = session.terminate(reason);
    let duration = chrono::Utc::now() - conn.connected_at();
    info!(
        conn_id = %conn.id(),
        "Session for {} ended after {}s: {:?}",
        origin,
        duration.num_seconds(),
        outcome.reason
    );

    // The writer owns the transport; it must not outlive the session.
    if tokio::time::timeout(WRITER_DRAIN_TIMEOUT, &mut writer)
        .await
        .is_err()
    {
        warn!(conn_id = %conn.id(), "Writer did not drain in time, dropping transport");
        writer.abort();
        let _ = writer.await;
    }

    outcome
}

/// Drain the connection's outbox into the transport.
///
/// Once the connection is closed, frames already queued are still flushed
/// before the sink is closed. A failed write closes the connection.
async fn write_outbox<O>(
    mut outbox: mpsc::Receiver<String>,
    mut sink: O,
    conn: ConnectionHandle,
) where
    O: Sink<String> + Unpin,
    O::Error: fmt::Display,
{
    loop {
        tokio::select! {
            biased;
            frame = outbox.recv() => {
                let Some(frame) = frame else { break };
                if let Err(e) = sink.send(frame).await {
                    debug!(conn_id = %conn.id(), "Write to {} failed: {}", conn.origin(), e);
                    conn.close();
                    return;
                }
            }
            _ = conn.closed() => break,
        }
    }

    while let Ok(frame) = outbox.try_recv() {
        if sink.send(frame).await.is_err() {
            break;
        }
    }
    let _ = sink.close().await;
}
