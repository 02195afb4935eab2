//! Event message types.
//!
//! Events are notifications pushed by the browser engine over a session.
//! With flat session routing every event carries an optional `sessionId`;
//! events without one belong to the root connection scope.
//!
//! # Event Types
//!
//! | Domain | Events |
//! |--------|--------|
//! | `Target` | `targetCreated`, `targetDestroyed` |
//! | `Page` | `frameAttached`, `frameDetached`, `frameNavigated` |
//! | `Network` | `requestWillBeSent`, `responseReceived`, `loadingFinished` |
//! | `Runtime` | `bindingCalled` |
//! | `Fetch` | `requestPaused` |

// ============================================================================
// Imports
// ============================================================================

use std::collections::HashMap;

use serde::Deserialize;
use serde_json::Value;

use crate::identifiers::{FrameId, NetworkRequestId, SessionId, TargetId};

// ============================================================================
// Event
// ============================================================================

/// An event notification from the browser engine.
///
/// # Format
///
/// ```json
/// {
///   "sessionId": "S1",
///   "method": "Page.frameAttached",
///   "params": { ... }
/// }
/// ```
#[derive(Debug, Clone, Deserialize)]
pub struct Event {
    /// Session the event belongs to; `None` for root-scope events.
    #[serde(rename = "sessionId")]
    pub session_id: Option<SessionId>,

    /// Event name in `Domain.eventName` format.
    pub method: String,

    /// Event-specific data.
    #[serde(default)]
    pub params: Value,
}

impl Event {
    /// Creates an event for a session.
    #[must_use]
    pub fn new(session_id: SessionId, method: impl Into<String>, params: Value) -> Self {
        Self {
            session_id: Some(session_id),
            method: method.into(),
            params,
        }
    }

    /// Returns the domain name from the method.
    #[inline]
    #[must_use]
    pub fn domain(&self) -> &str {
        self.method.split('.').next().unwrap_or_default()
    }

    /// Parses the event into a typed variant.
    #[must_use]
    pub fn parse(&self) -> ParsedEvent {
        self.parse_internal()
    }
}

// ============================================================================
// DetachReason
// ============================================================================

/// Why a frame detached from its session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DetachReason {
    /// The frame element was removed from the document.
    Remove,
    /// The frame is moving to another process; a new owner session follows.
    Swap,
}

impl DetachReason {
    /// Parses the wire reason string; absent or unknown reasons mean removal.
    #[must_use]
    fn from_wire(reason: Option<&str>) -> Self {
        match reason {
            Some("swap") => Self::Swap,
            _ => Self::Remove,
        }
    }
}

// ============================================================================
// ParsedEvent
// ============================================================================

/// Parsed event types for type-safe handling.
#[derive(Debug, Clone)]
pub enum ParsedEvent {
    /// A target appeared.
    TargetCreated {
        /// Target ID.
        target_id: TargetId,
        /// Target type (`page`, `iframe`, ...).
        target_type: String,
        /// Parent target, when the engine reports one.
        parent_target_id: Option<TargetId>,
    },

    /// A target disappeared.
    TargetDestroyed {
        /// Target ID.
        target_id: TargetId,
    },

    /// A frame attached under a parent.
    FrameAttached {
        /// Frame ID.
        frame_id: FrameId,
        /// Parent frame ID; absent for a session's root frame.
        parent_frame_id: Option<FrameId>,
    },

    /// A frame detached from the emitting session.
    FrameDetached {
        /// Frame ID.
        frame_id: FrameId,
        /// Detach reason.
        reason: DetachReason,
    },

    /// A frame committed a navigation.
    FrameNavigated {
        /// Frame ID.
        frame_id: FrameId,
        /// Committed URL.
        url: String,
    },

    /// A network request is about to be sent.
    RequestWillBeSent {
        /// Request ID.
        request_id: NetworkRequestId,
        /// Issuing frame, when known.
        frame_id: Option<FrameId>,
        /// Request URL.
        url: String,
        /// HTTP method.
        method: String,
        /// Request headers.
        headers: HashMap<String, String>,
    },

    /// Response headers arrived for a request.
    ResponseReceived {
        /// Request ID.
        request_id: NetworkRequestId,
    },

    /// A network exchange finished.
    LoadingFinished {
        /// Request ID.
        request_id: NetworkRequestId,
    },

    /// Page script invoked an exposed binding.
    BindingCalled {
        /// Binding name.
        name: String,
        /// Raw payload string produced by the page-side wrapper.
        payload: String,
    },

    /// A request was paused by the interception layer.
    RequestPaused {
        /// Interception request ID (valid for fetch-domain replies).
        request_id: NetworkRequestId,
        /// Request URL.
        url: String,
        /// HTTP method.
        method: String,
    },

    /// Unknown event type.
    Unknown {
        /// Event method.
        method: String,
        /// Event params.
        params: Value,
    },
}

// ============================================================================
// Event Parsing Implementation
// ============================================================================

impl Event {
    /// Internal parsing implementation.
    fn parse_internal(&self) -> ParsedEvent {
        match self.method.as_str() {
            "Target.targetCreated" => {
                let info = self.params.get("targetInfo").cloned().unwrap_or(Value::Null);
                ParsedEvent::TargetCreated {
                    target_id: TargetId::new(str_field(&info, "targetId")),
                    target_type: str_field(&info, "type"),
                    parent_target_id: opt_str_field(&info, "parentTargetId").map(TargetId::from),
                }
            }

            "Target.targetDestroyed" => ParsedEvent::TargetDestroyed {
                target_id: TargetId::new(self.get_string("targetId")),
            },

            "Page.frameAttached" => ParsedEvent::FrameAttached {
                frame_id: FrameId::new(self.get_string("frameId")),
                parent_frame_id: self.get_optional_string("parentFrameId").map(FrameId::from),
            },

            "Page.frameDetached" => ParsedEvent::FrameDetached {
                frame_id: FrameId::new(self.get_string("frameId")),
                reason: DetachReason::from_wire(
                    self.params.get("reason").and_then(|v| v.as_str()),
                ),
            },

            "Page.frameNavigated" => {
                let frame = self.params.get("frame").cloned().unwrap_or(Value::Null);
                ParsedEvent::FrameNavigated {
                    frame_id: FrameId::new(str_field(&frame, "id")),
                    url: str_field(&frame, "url"),
                }
            }

            "Network.requestWillBeSent" => {
                let request = self.params.get("request").cloned().unwrap_or(Value::Null);
                ParsedEvent::RequestWillBeSent {
                    request_id: NetworkRequestId::new(self.get_string("requestId")),
                    frame_id: self.get_optional_string("frameId").map(FrameId::from),
                    url: str_field(&request, "url"),
                    method: str_field_or(&request, "method", "GET"),
                    headers: header_map(&request),
                }
            }

            "Network.responseReceived" => ParsedEvent::ResponseReceived {
                request_id: NetworkRequestId::new(self.get_string("requestId")),
            },

            "Network.loadingFinished" => ParsedEvent::LoadingFinished {
                request_id: NetworkRequestId::new(self.get_string("requestId")),
            },

            "Runtime.bindingCalled" => ParsedEvent::BindingCalled {
                name: self.get_string("name"),
                payload: self.get_string("payload"),
            },

            "Fetch.requestPaused" => {
                let request = self.params.get("request").cloned().unwrap_or(Value::Null);
                ParsedEvent::RequestPaused {
                    request_id: NetworkRequestId::new(self.get_string("requestId")),
                    url: str_field(&request, "url"),
                    method: str_field_or(&request, "method", "GET"),
                }
            }

            _ => ParsedEvent::Unknown {
                method: self.method.clone(),
                params: self.params.clone(),
            },
        }
    }

    /// Gets a string from params.
    #[inline]
    fn get_string(&self, key: &str) -> String {
        str_field(&self.params, key)
    }

    /// Gets an optional string from params.
    #[inline]
    fn get_optional_string(&self, key: &str) -> Option<String> {
        opt_str_field(&self.params, key)
    }
}

/// Gets a string field from a JSON object.
#[inline]
fn str_field(value: &Value, key: &str) -> String {
    value
        .get(key)
        .and_then(|v| v.as_str())
        .unwrap_or_default()
        .to_string()
}

/// Gets a string field with a default.
#[inline]
fn str_field_or(value: &Value, key: &str, default: &str) -> String {
    value
        .get(key)
        .and_then(|v| v.as_str())
        .unwrap_or(default)
        .to_string()
}

/// Gets an optional string field from a JSON object.
#[inline]
fn opt_str_field(value: &Value, key: &str) -> Option<String> {
    value
        .get(key)
        .and_then(|v| v.as_str())
        .map(|s| s.to_string())
}

/// Extracts the `headers` object of a request as a string map.
fn header_map(request: &Value) -> HashMap<String, String> {
    request
        .get("headers")
        .and_then(|v| v.as_object())
        .map(|obj| {
            obj.iter()
                .filter_map(|(k, v)| v.as_str().map(|s| (k.clone(), s.to_string())))
                .collect()
        })
        .unwrap_or_default()
}

// ============================================================================
// Tests
// ============================================================================
