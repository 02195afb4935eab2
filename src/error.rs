//! Error types for pagemux.
//!
//! This module defines all error types used throughout the crate.
//!
//! # Usage
//!
//! All fallible operations return [`Result<T>`] which uses [`Error`]:
//!
//! ```ignore
//! use pagemux::{Page, Result};
//!
//! async fn example(page: &Page) -> Result<()> {
//!     page.set_viewport_size(1280, 720).await?;
//!     Ok(())
//! }
//! ```
//!
//! # Error Categories
//!
//! | Category | Variants |
//! |----------|----------|
//! | Attachment | [`Error::AttachFailed`], [`Error::TargetClosed`] |
//! | Configuration | [`Error::ConfigurationPush`], [`Error::BindingExists`] |
//! | Discovery | [`Error::DiscoveryFailed`] |
//! | Protocol | [`Error::Protocol`], [`Error::InvalidArgument`] |
//! | Connection | [`Error::Connection`], [`Error::ConnectionClosed`], [`Error::RequestTimeout`] |
//! | External | [`Error::Io`], [`Error::Json`], [`Error::WebSocket`] |
//!
//! Attach failures are non-fatal by policy: one target's failed setup never
//! aborts discovery or other frames. Configuration push failures are fatal to
//! the call that triggered them, since partial replication would make frames
//! behave differently depending on which process renders them.

// ============================================================================
// Imports
// ============================================================================

use std::io::Error as IoError;
use std::result::Result as StdResult;

use thiserror::Error;
use tokio_tungstenite::tungstenite::Error as WsError;

use crate::identifiers::{CommandId, SessionId, TargetId};

// ============================================================================
// Result Alias
// ============================================================================

/// Result type alias using crate [`enum@Error`].
///
/// All fallible operations in this crate return this type.
pub type Result<T> = StdResult<T, Error>;

// ============================================================================
// Error Enum
// ============================================================================

/// Main error type for the crate.
///
/// Each variant includes relevant context for debugging.
#[derive(Error, Debug)]
pub enum Error {
    // ========================================================================
    // Attachment Errors
    // ========================================================================
    /// Attaching a session to a target failed.
    ///
    /// Non-fatal: the frame stays absent from the tree until the next
    /// navigation re-triggers discovery.
    #[error("Attach to target {target_id} failed: {message}")]
    AttachFailed {
        /// The target that could not be attached.
        target_id: TargetId,
        /// Description of the attach failure.
        message: String,
    },

    /// The target was torn down while an operation was in flight.
    #[error("Target {target_id} closed")]
    TargetClosed {
        /// The closed target.
        target_id: TargetId,
    },

    // ========================================================================
    // Configuration Errors
    // ========================================================================
    /// A session rejected a configuration install command.
    ///
    /// Fatal to the enclosing call: partial configuration would produce
    /// inconsistent behavior between in-process and out-of-process frames.
    #[error("Configuration push to session {session_id} failed ({method}): {message}")]
    ConfigurationPush {
        /// The session that rejected the command.
        session_id: SessionId,
        /// The command method that failed.
        method: String,
        /// Description of the failure.
        message: String,
    },

    /// A binding with this name is already exposed.
    #[error("Binding already exists: {name}")]
    BindingExists {
        /// The duplicate binding name.
        name: String,
    },

    // ========================================================================
    // Discovery Errors
    // ========================================================================
    /// Target discovery could not be enabled on the root session.
    ///
    /// Fatal to context creation: discovery is a precondition of all
    /// subsequent operation, not a best-effort signal.
    #[error("Target discovery failed: {message}")]
    DiscoveryFailed {
        /// Description of the discovery failure.
        message: String,
    },

    // ========================================================================
    // Protocol Errors
    // ========================================================================
    /// Protocol violation or unexpected response.
    #[error("Protocol error: {message}")]
    Protocol {
        /// Description of the protocol violation.
        message: String,
    },

    /// Invalid argument in a command or API call.
    #[error("Invalid argument: {message}")]
    InvalidArgument {
        /// Description of the invalid argument.
        message: String,
    },

    // ========================================================================
    // Connection Errors
    // ========================================================================
    /// Transport connection failed.
    #[error("Connection failed: {message}")]
    Connection {
        /// Description of the connection error.
        message: String,
    },

    /// Transport connection closed unexpectedly.
    #[error("Connection closed")]
    ConnectionClosed,

    /// Command request timeout.
    #[error("Command {command_id} timed out after {timeout_ms}ms")]
    RequestTimeout {
        /// The command ID that timed out.
        command_id: CommandId,
        /// Milliseconds waited before timeout.
        timeout_ms: u64,
    },

    // ========================================================================
    // External Errors
    // ========================================================================
    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] IoError),

    /// JSON serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// WebSocket error.
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] WsError),
}

// ============================================================================
// Error Constructors
// ============================================================================

impl Error {
    /// Creates an attach failure error.
    #[inline]
    pub fn attach_failed(target_id: TargetId, message: impl Into<String>) -> Self {
        Self::AttachFailed {
            target_id,
            message: message.into(),
        }
    }

    /// Creates a target closed error.
    #[inline]
    pub fn target_closed(target_id: TargetId) -> Self {
        Self::TargetClosed { target_id }
    }

    /// Creates a configuration push error.
    #[inline]
    pub fn configuration_push(
        session_id: SessionId,
        method: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::ConfigurationPush {
            session_id,
            method: method.into(),
            message: message.into(),
        }
    }

    /// Creates a duplicate binding error.
    #[inline]
    pub fn binding_exists(name: impl Into<String>) -> Self {
        Self::BindingExists { name: name.into() }
    }

    /// Creates a discovery failure error.
    #[inline]
    pub fn discovery_failed(message: impl Into<String>) -> Self {
        Self::DiscoveryFailed {
            message: message.into(),
        }
    }

    /// Creates a protocol error.
    #[inline]
    pub fn protocol(message: impl Into<String>) -> Self {
        Self::Protocol {
            message: message.into(),
        }
    }

    /// Creates an invalid argument error.
    #[inline]
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument {
            message: message.into(),
        }
    }

    /// Creates a connection error.
    #[inline]
    pub fn connection(message: impl Into<String>) -> Self {
        Self::Connection {
            message: message.into(),
        }
    }

    /// Creates a request timeout error.
    #[inline]
    pub fn request_timeout(command_id: CommandId, timeout_ms: u64) -> Self {
        Self::RequestTimeout {
            command_id,
            timeout_ms,
        }
    }
}

// ============================================================================
// Error Predicates
// ============================================================================

impl Error {
    /// Returns `true` if this error aborts only one target's setup.
    ///
    /// Per propagation policy, these never abort discovery or other frames.
    #[inline]
    #[must_use]
    pub fn is_attach_failure(&self) -> bool {
        matches!(self, Self::AttachFailed { .. } | Self::TargetClosed { .. })
    }

    /// Returns `true` if this is a configuration replication failure.
    #[inline]
    #[must_use]
    pub fn is_configuration_failure(&self) -> bool {
        matches!(
            self,
            Self::ConfigurationPush { .. } | Self::BindingExists { .. }
        )
    }

    /// Returns `true` if this is a connection-level error.
    #[inline]
    #[must_use]
    pub fn is_connection_error(&self) -> bool {
        matches!(
            self,
            Self::Connection { .. }
                | Self::ConnectionClosed
                | Self::RequestTimeout { .. }
                | Self::WebSocket(_)
        )
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use std::io::ErrorKind;

    #[test]
    fn test_error_display() {
        let err = Error::attach_failed(TargetId::new("T1"), "target vanished");
        assert_eq!(
            err.to_string(),
            "Attach to target T1 failed: target vanished"
        );
    }

    #[test]
    fn test_configuration_push_display() {
        let err = Error::configuration_push(
            SessionId::new("S1"),
            "Runtime.addBinding",
            "session detached",
        );
        assert_eq!(
            err.to_string(),
            "Configuration push to session S1 failed (Runtime.addBinding): session detached"
        );
    }

    #[test]
    fn test_is_attach_failure() {
        assert!(Error::attach_failed(TargetId::new("T1"), "x").is_attach_failure());
        assert!(Error::target_closed(TargetId::new("T1")).is_attach_failure());
        assert!(!Error::protocol("x").is_attach_failure());
    }

    #[test]
    fn test_is_configuration_failure() {
        let push = Error::configuration_push(SessionId::new("S1"), "m", "x");
        assert!(push.is_configuration_failure());
        assert!(Error::binding_exists("mul").is_configuration_failure());
        assert!(!Error::ConnectionClosed.is_configuration_failure());
    }

    #[test]
    fn test_is_connection_error() {
        assert!(Error::connection("refused").is_connection_error());
        assert!(Error::ConnectionClosed.is_connection_error());
        assert!(Error::request_timeout(CommandId::new(1), 1000).is_connection_error());
        assert!(!Error::discovery_failed("x").is_connection_error());
    }

    #[test]
    fn test_from_io_error() {
        let io_err = IoError::new(ErrorKind::NotFound, "file not found");
        let err: Error = io_err.into();
        assert!(matches!(err, Error::Io(_)));
    }

    #[test]
    fn test_from_json_error() {
        let json_err = serde_json::from_str::<String>("invalid").unwrap_err();
        let err: Error = json_err.into();
        assert!(matches!(err, Error::Json(_)));
    }
}
