//! WebSocket connection and event loop.
//!
//! This module implements [`Transport`] over the browser's WebSocket
//! debugging endpoint, including request/response correlation and event
//! forwarding.
//!
//! # Event Loop
//!
//! The connection spawns a tokio task that handles:
//!
//! - Incoming messages from the browser (responses, events)
//! - Outgoing commands from the Rust API
//! - Request/response correlation by numeric command ID
//! - Event forwarding to the registered sink

// ============================================================================
// Imports
// ============================================================================

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use futures_util::stream::SplitSink;
use futures_util::{SinkExt, StreamExt};
use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use serde_json::{Value, from_str, to_string};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, oneshot};
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tracing::{debug, error, trace, warn};

use crate::error::{Error, Result};
use crate::identifiers::{CommandId, SessionId};
use crate::protocol::{Command, CommandEnvelope, Event, ProtocolMessage};
use crate::transport::Transport;

// ============================================================================
// Constants
// ============================================================================

/// Default timeout for command execution.
const DEFAULT_COMMAND_TIMEOUT: Duration = Duration::from_secs(30);

/// Maximum pending commands before rejecting new ones.
const MAX_PENDING_COMMANDS: usize = 256;

// ============================================================================
// Types
// ============================================================================

/// Underlying WebSocket stream type.
type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Map of command IDs to response channels.
type CorrelationMap = FxHashMap<CommandId, oneshot::Sender<Result<Value>>>;

/// Event sink shared with the event loop.
type EventSink = Arc<Mutex<Option<mpsc::UnboundedSender<Event>>>>;

// ============================================================================
// ConnectionCommand
// ============================================================================

/// Internal commands for the event loop.
enum ConnectionCommand {
    /// Send an envelope and correlate the response.
    Send {
        envelope: CommandEnvelope,
        response_tx: oneshot::Sender<Result<Value>>,
    },
    /// Remove a timed-out correlation entry.
    RemoveCorrelation(CommandId),
    /// Shutdown the connection.
    Shutdown,
}

// ============================================================================
// WsConnection
// ============================================================================

/// WebSocket connection to a browser debugging endpoint.
///
/// Handles request/response correlation and event forwarding. The connection
/// spawns an internal event loop task.
///
/// # Thread Safety
///
/// `WsConnection` is `Send + Sync` and can be shared across tasks.
pub struct WsConnection {
    /// Channel for sending commands to the event loop.
    command_tx: mpsc::UnboundedSender<ConnectionCommand>,
    /// Correlation map (shared with event loop).
    correlation: Arc<Mutex<CorrelationMap>>,
    /// Event sink (shared with event loop).
    event_sink: EventSink,
    /// Command ID counter.
    next_id: AtomicU64,
}

impl WsConnection {
    /// Connects to a browser debugging WebSocket URL.
    ///
    /// # Errors
    ///
    /// Returns [`Error::WebSocket`] if the connection cannot be established.
    pub async fn connect(url: &str) -> Result<Arc<Self>> {
        let (ws_stream, _) = connect_async(url).await?;
        debug!(url, "Debugging endpoint connected");
        Ok(Self::from_stream(ws_stream))
    }

    /// Creates a connection from an established WebSocket stream.
    ///
    /// Spawns the event loop task internally.
    pub(crate) fn from_stream(ws_stream: WsStream) -> Arc<Self> {
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let correlation = Arc::new(Mutex::new(CorrelationMap::default()));
        let event_sink: EventSink = Arc::new(Mutex::new(None));

        tokio::spawn(Self::run_event_loop(
            ws_stream,
            command_rx,
            Arc::clone(&correlation),
            Arc::clone(&event_sink),
        ));

        Arc::new(Self {
            command_tx,
            correlation,
            event_sink,
            next_id: AtomicU64::new(1),
        })
    }

    /// Returns the number of pending commands.
    #[inline]
    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.correlation.lock().len()
    }

    /// Shuts down the connection gracefully.
    pub fn shutdown(&self) {
        let _ = self.command_tx.send(ConnectionCommand::Shutdown);
    }

    /// Sends a command and waits for the result with the default timeout.
    async fn send_internal(
        &self,
        session_id: Option<SessionId>,
        command: Command,
    ) -> Result<Value> {
        let command_id = CommandId::new(self.next_id.fetch_add(1, Ordering::SeqCst));

        // Check pending command limit
        {
            let correlation = self.correlation.lock();
            if correlation.len() >= MAX_PENDING_COMMANDS {
                warn!(
                    pending = correlation.len(),
                    max = MAX_PENDING_COMMANDS,
                    "Too many pending commands"
                );
                return Err(Error::protocol(format!(
                    "Too many pending commands: {}/{}",
                    correlation.len(),
                    MAX_PENDING_COMMANDS
                )));
            }
        }

        let envelope = CommandEnvelope::new(command_id, session_id, &command);
        let (response_tx, response_rx) = oneshot::channel();

        self.command_tx
            .send(ConnectionCommand::Send {
                envelope,
                response_tx,
            })
            .map_err(|_| Error::ConnectionClosed)?;

        match timeout(DEFAULT_COMMAND_TIMEOUT, response_rx).await {
            Ok(Ok(result)) => result,
            Ok(Err(_)) => Err(Error::ConnectionClosed),
            Err(_) => {
                // Timeout - clean up correlation entry
                let _ = self
                    .command_tx
                    .send(ConnectionCommand::RemoveCorrelation(command_id));

                Err(Error::request_timeout(
                    command_id,
                    DEFAULT_COMMAND_TIMEOUT.as_millis() as u64,
                ))
            }
        }
    }

    /// Event loop that handles WebSocket I/O.
    async fn run_event_loop(
        ws_stream: WsStream,
        mut command_rx: mpsc::UnboundedReceiver<ConnectionCommand>,
        correlation: Arc<Mutex<CorrelationMap>>,
        event_sink: EventSink,
    ) {
        let (mut ws_write, mut ws_read) = ws_stream.split();

        loop {
            tokio::select! {
                // Incoming messages from the browser
                message = ws_read.next() => {
                    match message {
                        Some(Ok(Message::Text(text))) => {
                            Self::handle_incoming_message(&text, &correlation, &event_sink);
                        }

                        Some(Ok(Message::Close(_))) => {
                            debug!("WebSocket closed by remote");
                            break;
                        }

                        Some(Err(e)) => {
                            error!(error = %e, "WebSocket error");
                            break;
                        }

                        None => {
                            debug!("WebSocket stream ended");
                            break;
                        }

                        // Ignore Binary, Ping, Pong
                        _ => {}
                    }
                }

                // Commands from the Rust API
                command = command_rx.recv() => {
                    match command {
                        Some(ConnectionCommand::Send { envelope, response_tx }) => {
                            Self::handle_send_command(
                                envelope,
                                response_tx,
                                &mut ws_write,
                                &correlation,
                            ).await;
                        }

                        Some(ConnectionCommand::RemoveCorrelation(command_id)) => {
                            correlation.lock().remove(&command_id);
                            debug!(%command_id, "Removed timed-out correlation");
                        }

                        Some(ConnectionCommand::Shutdown) => {
                            debug!("Shutdown command received");
                            let _ = ws_write.close().await;
                            break;
                        }

                        None => {
                            debug!("Command channel closed");
                            break;
                        }
                    }
                }
            }
        }

        // Fail all pending commands on shutdown
        Self::fail_pending_commands(&correlation);

        debug!("Event loop terminated");
    }

    /// Handles an incoming text message from the browser.
    fn handle_incoming_message(
        text: &str,
        correlation: &Arc<Mutex<CorrelationMap>>,
        event_sink: &EventSink,
    ) {
        match from_str::<ProtocolMessage>(text) {
            Ok(ProtocolMessage::Response(response)) => {
                let id = response.id;
                let tx = correlation.lock().remove(&id);

                if let Some(tx) = tx {
                    let _ = tx.send(response.into_result());
                } else {
                    warn!(command_id = %id, "Response for unknown command");
                }
            }

            Ok(ProtocolMessage::Event(event)) => {
                trace!(method = %event.method, session_id = ?event.session_id, "Event received");
                let sink = event_sink.lock();
                if let Some(ref sink) = *sink
                    && sink.send(event).is_err()
                {
                    debug!("Event sink dropped, event discarded");
                }
            }

            Ok(ProtocolMessage::Unknown(value)) => {
                debug!(message = %value, "Unknown message shape (ignored)");
            }

            Err(e) => {
                warn!(error = %e, text, "Failed to parse incoming message");
            }
        }
    }

    /// Handles a send command from the Rust API.
    async fn handle_send_command(
        envelope: CommandEnvelope,
        response_tx: oneshot::Sender<Result<Value>>,
        ws_write: &mut SplitSink<WsStream, Message>,
        correlation: &Arc<Mutex<CorrelationMap>>,
    ) {
        let command_id = envelope.id;

        // Serialize envelope
        let json = match to_string(&envelope) {
            Ok(j) => j,
            Err(e) => {
                let _ = response_tx.send(Err(Error::Json(e)));
                return;
            }
        };

        // Store correlation before sending
        correlation.lock().insert(command_id, response_tx);

        // Send over WebSocket
        if let Err(e) = ws_write.send(Message::Text(json.into())).await {
            // Remove correlation and notify caller
            if let Some(tx) = correlation.lock().remove(&command_id) {
                let _ = tx.send(Err(Error::connection(e.to_string())));
            }
        }

        trace!(%command_id, "Command sent");
    }

    /// Fails all pending commands with ConnectionClosed error.
    fn fail_pending_commands(correlation: &Arc<Mutex<CorrelationMap>>) {
        let pending: Vec<_> = correlation.lock().drain().collect();
        let count = pending.len();

        for (_, tx) in pending {
            let _ = tx.send(Err(Error::ConnectionClosed));
        }

        if count > 0 {
            debug!(count, "Failed pending commands on shutdown");
        }
    }
}

// ============================================================================
// Transport Implementation
// ============================================================================

#[async_trait]
impl Transport for WsConnection {
    async fn send(&self, session_id: Option<SessionId>, command: Command) -> Result<Value> {
        self.send_internal(session_id, command).await
    }

    fn set_event_sink(&self, sink: mpsc::UnboundedSender<Event>) {
        let mut guard = self.event_sink.lock();
        *guard = Some(sink);
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_constants() {
        assert_eq!(DEFAULT_COMMAND_TIMEOUT.as_secs(), 30);
        assert_eq!(MAX_PENDING_COMMANDS, 256);
    }

    #[test]
    fn test_incoming_response_correlation() {
        let correlation: Arc<Mutex<CorrelationMap>> = Arc::new(Mutex::new(Default::default()));
        let event_sink: EventSink = Arc::new(Mutex::new(None));

        let (tx, mut rx) = oneshot::channel();
        correlation.lock().insert(CommandId::new(7), tx);

        WsConnection::handle_incoming_message(
            r#"{ "id": 7, "result": { "ok": true } }"#,
            &correlation,
            &event_sink,
        );

        let result = rx.try_recv().expect("correlated").expect("success");
        assert_eq!(result["ok"], true);
        assert!(correlation.lock().is_empty());
    }

    #[test]
    fn test_incoming_event_forwarding() {
        let correlation: Arc<Mutex<CorrelationMap>> = Arc::new(Mutex::new(Default::default()));
        let (sink_tx, mut sink_rx) = mpsc::unbounded_channel();
        let event_sink: EventSink = Arc::new(Mutex::new(Some(sink_tx)));

        WsConnection::handle_incoming_message(
            r#"{ "sessionId": "S1", "method": "Page.frameDetached", "params": { "frameId": "F2" } }"#,
            &correlation,
            &event_sink,
        );

        let event = sink_rx.try_recv().expect("forwarded");
        assert_eq!(event.method, "Page.frameDetached");
        assert_eq!(event.session_id, Some(SessionId::new("S1")));
    }

    #[test]
    fn test_unparseable_message_is_ignored() {
        let correlation: Arc<Mutex<CorrelationMap>> = Arc::new(Mutex::new(Default::default()));
        let event_sink: EventSink = Arc::new(Mutex::new(None));

        // Must not panic
        WsConnection::handle_incoming_message("not json", &correlation, &event_sink);
    }
}
