//! Protocol sessions scoped to one target.
//!
//! A [`Session`] wraps one protocol connection scoped to either the root
//! browsing context or one out-of-process frame target. Its lifecycle is
//! independent of the frame tree: a session exists from attach until its
//! target is destroyed or explicitly detached, regardless of which frames
//! it currently serves.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::Arc;
use std::time::Instant;

use parking_lot::RwLock;
use rustc_hash::FxHashMap;
use serde_json::Value;
use tracing::debug;

use crate::error::{Error, Result};
use crate::identifiers::{SessionId, TargetId};
use crate::protocol::Command;
use crate::transport::Transport;

// ============================================================================
// Session
// ============================================================================

/// Internal shared state for a session.
struct SessionInner {
    /// Session ID assigned by the engine on attach.
    session_id: SessionId,
    /// The target this session is scoped to.
    target_id: TargetId,
    /// Transport handle shared with every other session.
    transport: Arc<dyn Transport>,
    /// When the session attached.
    attached_at: Instant,
    /// Whether this is the root browsing-context session.
    root: bool,
}

/// A handle to one protocol session.
///
/// Cloning is cheap; all clones address the same session.
#[derive(Clone)]
pub struct Session {
    inner: Arc<SessionInner>,
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("session_id", &self.inner.session_id)
            .field("target_id", &self.inner.target_id)
            .field("root", &self.inner.root)
            .finish_non_exhaustive()
    }
}

impl Session {
    /// Creates a new session handle.
    pub(crate) fn new(
        transport: Arc<dyn Transport>,
        session_id: SessionId,
        target_id: TargetId,
        root: bool,
    ) -> Self {
        debug!(session_id = %session_id, target_id = %target_id, root, "Session created");
        Self {
            inner: Arc::new(SessionInner {
                session_id,
                target_id,
                transport,
                attached_at: Instant::now(),
                root,
            }),
        }
    }
}

// ============================================================================
// Session - Accessors
// ============================================================================

impl Session {
    /// Returns the session ID.
    #[inline]
    #[must_use]
    pub fn session_id(&self) -> &SessionId {
        &self.inner.session_id
    }

    /// Returns the target this session is scoped to.
    #[inline]
    #[must_use]
    pub fn target_id(&self) -> &TargetId {
        &self.inner.target_id
    }

    /// Returns when the session attached.
    #[inline]
    #[must_use]
    pub fn attached_at(&self) -> Instant {
        self.inner.attached_at
    }

    /// Returns `true` if this is the root browsing-context session.
    #[inline]
    #[must_use]
    pub fn is_root(&self) -> bool {
        self.inner.root
    }
}

// ============================================================================
// Session - Commands
// ============================================================================

impl Session {
    /// Sends a command scoped to this session and awaits the result.
    pub(crate) async fn send(&self, command: impl Into<Command>) -> Result<Value> {
        self.inner
            .transport
            .send(Some(self.inner.session_id.clone()), command.into())
            .await
    }

    /// Sends a configuration install command, mapping any rejection to
    /// [`Error::ConfigurationPush`].
    pub(crate) async fn send_config(&self, command: impl Into<Command>) -> Result<Value> {
        let command = command.into();
        let method = command.method();
        self.send(command).await.map_err(|e| {
            Error::configuration_push(self.inner.session_id.clone(), method, e.to_string())
        })
    }
}

// ============================================================================
// SessionRegistry
// ============================================================================

/// All currently attached sessions of one page, keyed by session ID.
///
/// Scoped to one browsing-context lifetime: constructed at context creation,
/// drained at context close. There is deliberately no process-wide registry.
#[derive(Clone, Default)]
pub(crate) struct SessionRegistry {
    inner: Arc<RwLock<FxHashMap<SessionId, Session>>>,
}

impl SessionRegistry {
    /// Creates an empty registry.
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Adds a session.
    pub(crate) fn insert(&self, session: Session) {
        self.inner
            .write()
            .insert(session.session_id().clone(), session);
    }

    /// Removes a session by ID.
    pub(crate) fn remove(&self, session_id: &SessionId) -> Option<Session> {
        self.inner.write().remove(session_id)
    }

    /// Looks up a session by ID.
    pub(crate) fn get(&self, session_id: &SessionId) -> Option<Session> {
        self.inner.read().get(session_id).cloned()
    }

    /// Finds the session attached to a target, if any.
    pub(crate) fn find_by_target(&self, target_id: &TargetId) -> Option<Session> {
        self.inner
            .read()
            .values()
            .find(|s| s.target_id() == target_id)
            .cloned()
    }

    /// Returns a snapshot of all attached sessions.
    pub(crate) fn all(&self) -> Vec<Session> {
        self.inner.read().values().cloned().collect()
    }

    /// Removes and returns all sessions.
    pub(crate) fn drain(&self) -> Vec<Session> {
        self.inner.write().drain().map(|(_, s)| s).collect()
    }

    /// Returns the number of attached sessions.
    pub(crate) fn len(&self) -> usize {
        self.inner.read().len()
    }

    /// Returns the number of out-of-process frame sessions.
    pub(crate) fn oopif_count(&self) -> usize {
        self.inner.read().values().filter(|s| !s.is_root()).count()
    }
}

// ============================================================================
// Tests
// ============================================================================
