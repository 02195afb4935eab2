//! Command definitions organized by protocol domain.
//!
//! Commands follow the DevTools `Domain.methodName` format.
//!
//! # Command Domains
//!
//! | Domain | Commands |
//! |--------|----------|
//! | `Target` | discovery, attach, detach |
//! | `Page` | enable, frame tree, init scripts |
//! | `Runtime` | enable, bindings, resume, evaluate |
//! | `Emulation` | viewport, media, locale, timezone, user agent |
//! | `Network` | enable, offline conditions |
//! | `Fetch` | request interception |

// ============================================================================
// Imports
// ============================================================================

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::identifiers::{NetworkRequestId, SessionId, TargetId};

// ============================================================================
// Command Wrapper
// ============================================================================

/// All protocol commands organized by domain.
///
/// This enum wraps domain-specific command enums for unified serialization.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Command {
    /// Target domain commands.
    Target(TargetCommand),
    /// Page domain commands.
    Page(PageCommand),
    /// Runtime domain commands.
    Runtime(RuntimeCommand),
    /// Emulation domain commands.
    Emulation(EmulationCommand),
    /// Network domain commands.
    Network(NetworkCommand),
    /// Fetch domain commands.
    Fetch(FetchCommand),
}

impl Command {
    /// Returns the wire method name of this command.
    #[must_use]
    pub fn method(&self) -> &'static str {
        match self {
            Self::Target(c) => c.method(),
            Self::Page(c) => c.method(),
            Self::Runtime(c) => c.method(),
            Self::Emulation(c) => c.method(),
            Self::Network(c) => c.method(),
            Self::Fetch(c) => c.method(),
        }
    }
}

// ============================================================================
// Target Commands
// ============================================================================

/// Target domain commands for discovery and session attachment.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "method", content = "params")]
pub enum TargetCommand {
    /// Enable target lifecycle event delivery.
    #[serde(rename = "Target.setDiscoverTargets")]
    SetDiscoverTargets {
        /// Whether discovery is on.
        discover: bool,
    },

    /// Attach a session to a target, holding the target paused at creation.
    #[serde(rename = "Target.attachToTarget")]
    AttachToTarget {
        /// Target to attach to.
        #[serde(rename = "targetId")]
        target_id: TargetId,
        /// Use flat session routing (session ID on each message).
        flatten: bool,
    },

    /// Detach a session from its target.
    #[serde(rename = "Target.detachFromTarget")]
    DetachFromTarget {
        /// Session to detach.
        #[serde(rename = "sessionId")]
        session_id: SessionId,
    },
}

impl TargetCommand {
    /// Returns the wire method name.
    #[must_use]
    pub fn method(&self) -> &'static str {
        match self {
            Self::SetDiscoverTargets { .. } => "Target.setDiscoverTargets",
            Self::AttachToTarget { .. } => "Target.attachToTarget",
            Self::DetachFromTarget { .. } => "Target.detachFromTarget",
        }
    }
}

// ============================================================================
// Page Commands
// ============================================================================

/// Page domain commands for frame lifecycle and init scripts.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "method", content = "params")]
pub enum PageCommand {
    /// Enable page lifecycle event delivery.
    #[serde(rename = "Page.enable")]
    Enable,

    /// Request the session's current frame tree snapshot.
    #[serde(rename = "Page.getFrameTree")]
    GetFrameTree,

    /// Install a script evaluated before any page script in new documents.
    #[serde(rename = "Page.addScriptToEvaluateOnNewDocument")]
    AddScriptToEvaluateOnNewDocument {
        /// Script source.
        source: String,
    },
}

impl PageCommand {
    /// Returns the wire method name.
    #[must_use]
    pub fn method(&self) -> &'static str {
        match self {
            Self::Enable => "Page.enable",
            Self::GetFrameTree => "Page.getFrameTree",
            Self::AddScriptToEvaluateOnNewDocument { .. } => {
                "Page.addScriptToEvaluateOnNewDocument"
            }
        }
    }
}

// ============================================================================
// Runtime Commands
// ============================================================================

/// Runtime domain commands for bindings and execution control.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "method", content = "params")]
pub enum RuntimeCommand {
    /// Enable runtime event delivery.
    #[serde(rename = "Runtime.enable")]
    Enable,

    /// Install a host-callable binding in every execution context.
    #[serde(rename = "Runtime.addBinding")]
    AddBinding {
        /// Binding name, visible on the page global.
        name: String,
    },

    /// Resume a target held paused at creation.
    #[serde(rename = "Runtime.runIfWaitingForDebugger")]
    RunIfWaitingForDebugger,

    /// Evaluate an expression in the session's default context.
    #[serde(rename = "Runtime.evaluate")]
    Evaluate {
        /// Expression source.
        expression: String,
    },
}

impl RuntimeCommand {
    /// Returns the wire method name.
    #[must_use]
    pub fn method(&self) -> &'static str {
        match self {
            Self::Enable => "Runtime.enable",
            Self::AddBinding { .. } => "Runtime.addBinding",
            Self::RunIfWaitingForDebugger => "Runtime.runIfWaitingForDebugger",
            Self::Evaluate { .. } => "Runtime.evaluate",
        }
    }
}

// ============================================================================
// Emulation Commands
// ============================================================================

/// A single emulated media feature, e.g. `prefers-color-scheme`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MediaFeature {
    /// Feature name.
    pub name: String,
    /// Feature value.
    pub value: String,
}

/// Emulation domain commands for viewport and environment overrides.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "method", content = "params")]
pub enum EmulationCommand {
    /// Override device metrics (viewport).
    #[serde(rename = "Emulation.setDeviceMetricsOverride")]
    SetDeviceMetricsOverride {
        /// Viewport width in CSS pixels.
        width: u32,
        /// Viewport height in CSS pixels.
        height: u32,
        /// Device scale factor (0 keeps the default).
        #[serde(rename = "deviceScaleFactor")]
        device_scale_factor: f64,
        /// Whether to emulate a mobile device.
        mobile: bool,
    },

    /// Override emulated CSS media features.
    #[serde(rename = "Emulation.setEmulatedMedia")]
    SetEmulatedMedia {
        /// Media features to override.
        features: Vec<MediaFeature>,
    },

    /// Override the browser locale.
    #[serde(rename = "Emulation.setLocaleOverride")]
    SetLocaleOverride {
        /// BCP-47 locale, e.g. `fr-CH`.
        locale: String,
    },

    /// Override the timezone.
    #[serde(rename = "Emulation.setTimezoneOverride")]
    SetTimezoneOverride {
        /// IANA timezone ID, e.g. `America/Jamaica`.
        #[serde(rename = "timezoneId")]
        timezone_id: String,
    },

    /// Override the user agent string.
    #[serde(rename = "Emulation.setUserAgentOverride")]
    SetUserAgentOverride {
        /// User agent string.
        #[serde(rename = "userAgent")]
        user_agent: String,
    },
}

impl EmulationCommand {
    /// Returns the wire method name.
    #[must_use]
    pub fn method(&self) -> &'static str {
        match self {
            Self::SetDeviceMetricsOverride { .. } => "Emulation.setDeviceMetricsOverride",
            Self::SetEmulatedMedia { .. } => "Emulation.setEmulatedMedia",
            Self::SetLocaleOverride { .. } => "Emulation.setLocaleOverride",
            Self::SetTimezoneOverride { .. } => "Emulation.setTimezoneOverride",
            Self::SetUserAgentOverride { .. } => "Emulation.setUserAgentOverride",
        }
    }
}

// ============================================================================
// Network Commands
// ============================================================================

/// Network domain commands for event delivery and offline emulation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "method", content = "params")]
pub enum NetworkCommand {
    /// Enable network event delivery.
    #[serde(rename = "Network.enable")]
    Enable,

    /// Emulate network conditions; only the offline flag is used here.
    #[serde(rename = "Network.emulateNetworkConditions")]
    EmulateNetworkConditions {
        /// Whether the session reports itself offline.
        offline: bool,
        /// Added latency in ms.
        latency: f64,
        /// Download throughput, -1 disables throttling.
        #[serde(rename = "downloadThroughput")]
        download_throughput: f64,
        /// Upload throughput, -1 disables throttling.
        #[serde(rename = "uploadThroughput")]
        upload_throughput: f64,
    },
}

impl NetworkCommand {
    /// Creates the offline-toggle variant with throttling disabled.
    #[inline]
    #[must_use]
    pub fn offline(offline: bool) -> Self {
        Self::EmulateNetworkConditions {
            offline,
            latency: 0.0,
            download_throughput: -1.0,
            upload_throughput: -1.0,
        }
    }

    /// Returns the wire method name.
    #[must_use]
    pub fn method(&self) -> &'static str {
        match self {
            Self::Enable => "Network.enable",
            Self::EmulateNetworkConditions { .. } => "Network.emulateNetworkConditions",
        }
    }
}

// ============================================================================
// Fetch Commands
// ============================================================================

/// A URL pattern to pause requests on.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequestPattern {
    /// Wildcard pattern matched against the request URL.
    #[serde(rename = "urlPattern")]
    pub url_pattern: String,
}

/// A response header entry for fulfilled requests.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HeaderEntry {
    /// Header name.
    pub name: String,
    /// Header value.
    pub value: String,
}

/// Fetch domain commands for request interception.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "method", content = "params")]
pub enum FetchCommand {
    /// Enable request pausing for the given patterns.
    #[serde(rename = "Fetch.enable")]
    Enable {
        /// Patterns to pause on.
        patterns: Vec<RequestPattern>,
    },

    /// Let a paused request proceed unmodified.
    #[serde(rename = "Fetch.continueRequest")]
    ContinueRequest {
        /// The paused request.
        #[serde(rename = "requestId")]
        request_id: NetworkRequestId,
    },

    /// Answer a paused request with a synthetic response.
    #[serde(rename = "Fetch.fulfillRequest")]
    FulfillRequest {
        /// The paused request.
        #[serde(rename = "requestId")]
        request_id: NetworkRequestId,
        /// HTTP status code.
        #[serde(rename = "responseCode")]
        response_code: u16,
        /// Response headers.
        #[serde(rename = "responseHeaders", skip_serializing_if = "Option::is_none")]
        response_headers: Option<Vec<HeaderEntry>>,
        /// Base64-encoded response body.
        #[serde(skip_serializing_if = "Option::is_none")]
        body: Option<String>,
    },

    /// Abort a paused request.
    #[serde(rename = "Fetch.failRequest")]
    FailRequest {
        /// The paused request.
        #[serde(rename = "requestId")]
        request_id: NetworkRequestId,
        /// Abort reason reported to the page.
        #[serde(rename = "errorReason")]
        error_reason: String,
    },
}

impl FetchCommand {
    /// Returns the wire method name.
    #[must_use]
    pub fn method(&self) -> &'static str {
        match self {
            Self::Enable { .. } => "Fetch.enable",
            Self::ContinueRequest { .. } => "Fetch.continueRequest",
            Self::FulfillRequest { .. } => "Fetch.fulfillRequest",
            Self::FailRequest { .. } => "Fetch.failRequest",
        }
    }
}

// ============================================================================
// Conversions
// ============================================================================

impl From<TargetCommand> for Command {
    fn from(c: TargetCommand) -> Self {
        Self::Target(c)
    }
}

impl From<PageCommand> for Command {
    fn from(c: PageCommand) -> Self {
        Self::Page(c)
    }
}

impl From<RuntimeCommand> for Command {
    fn from(c: RuntimeCommand) -> Self {
        Self::Runtime(c)
    }
}

impl From<EmulationCommand> for Command {
    fn from(c: EmulationCommand) -> Self {
        Self::Emulation(c)
    }
}

impl From<NetworkCommand> for Command {
    fn from(c: NetworkCommand) -> Self {
        Self::Network(c)
    }
}

impl From<FetchCommand> for Command {
    fn from(c: FetchCommand) -> Self {
        Self::Fetch(c)
    }
}

// ============================================================================
// Helpers
// ============================================================================

impl Command {
    /// Serializes the command `params` payload, `null` for unit variants.
    #[must_use]
    pub fn params_value(&self) -> Value {
        match serde_json::to_value(self) {
            Ok(Value::Object(map)) => map.get("params").cloned().unwrap_or(Value::Null),
            _ => Value::Null,
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_attach_serialization() {
        let command = Command::Target(TargetCommand::AttachToTarget {
            target_id: TargetId::new("T1"),
            flatten: true,
        });
        let json = serde_json::to_string(&command).expect("serialize");

        assert!(json.contains("Target.attachToTarget"));
        assert!(json.contains("targetId"));
        assert!(json.contains("flatten"));
    }

    #[test]
    fn test_unit_variant_serialization() {
        let command = Command::Page(PageCommand::Enable);
        let json = serde_json::to_string(&command).expect("serialize");
        assert!(json.contains("Page.enable"));
    }

    #[test]
    fn test_method_names() {
        let command = Command::Runtime(RuntimeCommand::RunIfWaitingForDebugger);
        assert_eq!(command.method(), "Runtime.runIfWaitingForDebugger");

        let command = Command::Emulation(EmulationCommand::SetTimezoneOverride {
            timezone_id: "America/Jamaica".into(),
        });
        assert_eq!(command.method(), "Emulation.setTimezoneOverride");
    }

    #[test]
    fn test_offline_constructor() {
        let command = NetworkCommand::offline(true);
        let json = serde_json::to_value(&command).expect("serialize");
        assert_eq!(json["params"]["offline"], true);
        assert_eq!(json["params"]["downloadThroughput"], -1.0);
    }

    #[test]
    fn test_params_value() {
        let command = Command::Emulation(EmulationCommand::SetLocaleOverride {
            locale: "fr-CH".into(),
        });
        let params = command.params_value();
        assert_eq!(params["locale"], "fr-CH");

        let unit = Command::Network(NetworkCommand::Enable);
        assert!(unit.params_value().is_null());
    }

    #[test]
    fn test_fetch_enable_patterns() {
        let command = FetchCommand::Enable {
            patterns: vec![RequestPattern {
                url_pattern: "*".into(),
            }],
        };
        let json = serde_json::to_value(&command).expect("serialize");
        assert_eq!(json["params"]["patterns"][0]["urlPattern"], "*");
    }
}
