//! Type-safe identifiers for protocol entities.
//!
//! The DevTools protocol addresses everything by opaque string identifiers
//! (targets, sessions, frames, network requests). Newtype wrappers prevent
//! mixing incompatible IDs at compile time and make log output unambiguous.
//!
//! # Identifier Types
//!
//! | Type | Wraps | Issued by |
//! |------|-------|-----------|
//! | [`TargetId`] | string | browser engine |
//! | [`SessionId`] | string | browser engine (on attach) |
//! | [`FrameId`] | string | browser engine (stable across process moves) |
//! | [`NetworkRequestId`] | string | browser engine |
//! | [`CommandId`] | u64 | this crate (per-connection counter) |

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

// ============================================================================
// String ID Macro
// ============================================================================

/// Declares a newtype around an interned protocol string identifier.
macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(Arc<str>);

        impl $name {
            /// Creates an identifier from a protocol string.
            #[inline]
            #[must_use]
            pub fn new(id: impl AsRef<str>) -> Self {
                Self(Arc::from(id.as_ref()))
            }

            /// Returns the identifier as a string slice.
            #[inline]
            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(id: &str) -> Self {
                Self::new(id)
            }
        }

        impl From<String> for $name {
            fn from(id: String) -> Self {
                Self(Arc::from(id))
            }
        }
    };
}

string_id! {
    /// Identifier for an addressable browser target (page, iframe, worker).
    TargetId
}

string_id! {
    /// Identifier for one protocol session scoped to a single target.
    SessionId
}

string_id! {
    /// Identifier for a frame within a page.
    ///
    /// Frame IDs are stable across process transitions: when a frame moves
    /// between processes the browser reuses the same ID under a new session.
    FrameId
}

string_id! {
    /// Identifier for one network exchange (request/response pair).
    NetworkRequestId
}

// ============================================================================
// CommandId
// ============================================================================

/// Sequential identifier for command/response correlation.
///
/// Assigned by the connection from an atomic counter; never reused within
/// one connection's lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CommandId(u64);

impl CommandId {
    /// Creates a command ID from a raw counter value.
    #[inline]
    #[must_use]
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    /// Returns the raw counter value.
    #[inline]
    #[must_use]
    pub fn value(self) -> u64 {
        self.0
    }
}

impl fmt::Display for CommandId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_string_ids_are_distinct_types() {
        fn takes_frame(_: FrameId) {}
        takes_frame(FrameId::new("F1"));
        // TargetId::new("F1") would not compile here.
    }

    #[test]
    fn test_display() {
        assert_eq!(TargetId::new("T1").to_string(), "T1");
        assert_eq!(CommandId::new(42).to_string(), "42");
    }

    #[test]
    fn test_serde_transparent() {
        let id = SessionId::new("S9");
        let json = serde_json::to_string(&id).expect("serialize");
        assert_eq!(json, r#""S9""#);

        let back: SessionId = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(back, id);
    }

    #[test]
    fn test_equality_and_hash() {
        use rustc_hash::FxHashMap;

        let mut map = FxHashMap::default();
        map.insert(FrameId::new("A"), 1);
        assert_eq!(map.get(&FrameId::new("A")), Some(&1));
        assert_eq!(map.get(&FrameId::new("B")), None);
    }

    #[test]
    fn test_command_id_value() {
        assert_eq!(CommandId::new(7).value(), 7);
    }
}
