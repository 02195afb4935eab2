//! Wire envelopes for command/response correlation.
//!
//! With flat session routing every outbound command and inbound message
//! carries an optional `sessionId`; the connection correlates responses to
//! commands by numeric `id`.

// ============================================================================
// Imports
// ============================================================================

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Error, Result};
use crate::identifiers::{CommandId, SessionId};
use crate::protocol::{Command, Event};

// ============================================================================
// CommandEnvelope
// ============================================================================

/// An outbound command addressed to one session.
///
/// # Format
///
/// ```json
/// {
///   "id": 12,
///   "sessionId": "S1",
///   "method": "Page.enable",
///   "params": { ... }
/// }
/// ```
#[derive(Debug, Clone, Serialize)]
pub struct CommandEnvelope {
    /// Unique identifier for request/response correlation.
    pub id: CommandId,

    /// Target session; `None` addresses the root connection scope.
    #[serde(rename = "sessionId", skip_serializing_if = "Option::is_none")]
    pub session_id: Option<SessionId>,

    /// Command method.
    pub method: String,

    /// Command parameters.
    #[serde(skip_serializing_if = "Value::is_null")]
    pub params: Value,
}

impl CommandEnvelope {
    /// Creates an envelope for a typed command.
    #[must_use]
    pub fn new(id: CommandId, session_id: Option<SessionId>, command: &Command) -> Self {
        Self {
            id,
            session_id,
            method: command.method().to_string(),
            params: command.params_value(),
        }
    }
}

// ============================================================================
// CommandResponse
// ============================================================================

/// Error payload inside a command response.
#[derive(Debug, Clone, Deserialize)]
pub struct ResponseError {
    /// Numeric protocol error code.
    #[serde(default)]
    pub code: i64,
    /// Error message.
    pub message: String,
}

/// An inbound response correlated to a command by `id`.
///
/// # Format
///
/// Success:
/// ```json
/// { "id": 12, "sessionId": "S1", "result": { ... } }
/// ```
///
/// Error:
/// ```json
/// { "id": 12, "error": { "code": -32000, "message": "..." } }
/// ```
#[derive(Debug, Clone, Deserialize)]
pub struct CommandResponse {
    /// Matches the command `id`.
    pub id: CommandId,

    /// Session the response came from.
    #[serde(rename = "sessionId")]
    pub session_id: Option<SessionId>,

    /// Result data (if success).
    #[serde(default)]
    pub result: Option<Value>,

    /// Error payload (if error).
    #[serde(default)]
    pub error: Option<ResponseError>,
}

impl CommandResponse {
    /// Returns `true` if this is a success response.
    #[inline]
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }

    /// Extracts the result value, returning an error response as [`Error::Protocol`].
    pub fn into_result(self) -> Result<Value> {
        match self.error {
            None => Ok(self.result.unwrap_or(Value::Null)),
            Some(err) => Err(Error::protocol(err.message)),
        }
    }
}

// ============================================================================
// ProtocolMessage
// ============================================================================

/// Discriminated union of inbound protocol messages.
///
/// Responses carry an `id`; events do not.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum ProtocolMessage {
    /// Response message (has `id` field).
    Response(CommandResponse),
    /// Event message (no `id` field).
    Event(Event),
    /// Unknown message type (forward-compatible catch-all).
    Unknown(Value),
}

// ============================================================================
// Tests
// ============================================================================
