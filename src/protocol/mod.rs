//! DevTools protocol message types.
//!
//! This module defines the message format for communication between the
//! client (Rust) and the browser engine's remote-debugging endpoint.
//!
//! # Protocol Overview
//!
//! | Message Type | Direction | Purpose |
//! |--------------|-----------|---------|
//! | `CommandEnvelope` | Client → Browser | Command request |
//! | `CommandResponse` | Browser → Client | Command response |
//! | `Event` | Browser → Client | Lifecycle/network notification |
//!
//! # Command Naming
//!
//! Commands follow `Domain.methodName` format:
//!
//! - `Target.attachToTarget`
//! - `Page.addScriptToEvaluateOnNewDocument`
//! - `Fetch.continueRequest`
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `command` | Command definitions by domain |
//! | `event` | Event types and parsing |
//! | `message` | Wire envelopes and correlation types |

// ============================================================================
// Submodules
// ============================================================================

/// Command definitions organized by domain.
pub mod command;

/// Event message types.
pub mod event;

/// Wire envelopes for command/response correlation.
pub mod message;

// ============================================================================
// Re-exports
// ============================================================================

pub use command::{
    Command, EmulationCommand, FetchCommand, HeaderEntry, MediaFeature, NetworkCommand,
    PageCommand, RequestPattern, RuntimeCommand, TargetCommand,
};
pub use event::{DetachReason, Event, ParsedEvent};
pub use message::{CommandEnvelope, CommandResponse, ProtocolMessage, ResponseError};
