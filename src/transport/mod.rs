//! Remote-debugging transport layer.
//!
//! The transport is an external collaborator: it delivers ordered, reliable,
//! session-scoped messages and nothing more. Everything above it (sessions,
//! discovery, frame tree, replication) is transport-agnostic and talks to the
//! [`Transport`] trait, so tests can drive the whole stack through a scripted
//! fake.
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `connection` | WebSocket client implementation |

// ============================================================================
// Imports
// ============================================================================

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::mpsc;

use crate::error::Result;
use crate::identifiers::SessionId;
use crate::protocol::{Command, Event};

// ============================================================================
// Submodules
// ============================================================================

/// WebSocket connection and event loop.
pub mod connection;

pub use connection::WsConnection;

// ============================================================================
// Transport
// ============================================================================

/// One remote-debugging connection with flat session routing.
///
/// Implementations must deliver events in protocol-arrival order and must
/// not reorder messages within a session. The request attributor and frame
/// tree synchronizer both rely on this.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Sends a command to one session (or the root scope) and awaits the
    /// result payload.
    ///
    /// # Errors
    ///
    /// Returns a protocol error if the browser rejects the command, or a
    /// connection error if the transport is gone.
    async fn send(&self, session_id: Option<SessionId>, command: Command) -> Result<Value>;

    /// Registers the single event sink all inbound events are forwarded to.
    ///
    /// Replaces any previously registered sink.
    fn set_event_sink(&self, sink: mpsc::UnboundedSender<Event>);
}
