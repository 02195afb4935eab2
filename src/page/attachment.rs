//! Session attachment and target bootstrap.
//!
//! Every target, the root browsing context included, goes through the same
//! sequence: attach with flat routing, enable the event domains, adopt the
//! target's frame snapshot, replay the configuration snapshot, and only
//! then let the target run. Discovered out-of-process frame targets are
//! held paused by the engine until the resume, so no page script observes
//! a partially configured environment.

// ============================================================================
// Imports
// ============================================================================

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::identifiers::{FrameId, SessionId, TargetId};
use crate::page::frame::{FrameTree, SnapshotFrame};
use crate::page::replicator::Replicator;
use crate::page::session::{Session, SessionRegistry};
use crate::protocol::{NetworkCommand, PageCommand, RuntimeCommand, TargetCommand};
use crate::transport::Transport;

// ============================================================================
// AttachmentManager
// ============================================================================

/// Attaches sessions to targets and runs their bootstrap sequence.
pub(crate) struct AttachmentManager {
    transport: Arc<dyn Transport>,
    sessions: SessionRegistry,
    replicator: Arc<Replicator>,
    tree: Arc<Mutex<FrameTree>>,
    /// Set when the page is closing; aborts in-flight attaches.
    closed: Arc<AtomicBool>,
}

impl AttachmentManager {
    pub(crate) fn new(
        transport: Arc<dyn Transport>,
        sessions: SessionRegistry,
        replicator: Arc<Replicator>,
        tree: Arc<Mutex<FrameTree>>,
        closed: Arc<AtomicBool>,
    ) -> Self {
        Self {
            transport,
            sessions,
            replicator,
            tree,
            closed,
        }
    }

    /// Attaches a session to `target_id` and brings it fully up.
    ///
    /// On success the session is registered and its target resumed with the
    /// whole configuration snapshot in place. On failure nothing remains
    /// registered.
    pub(crate) async fn attach(&self, target_id: &TargetId, root: bool) -> Result<Session> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(Error::target_closed(target_id.clone()));
        }

        let result = self
            .transport
            .send(
                None,
                TargetCommand::AttachToTarget {
                    target_id: target_id.clone(),
                    flatten: true,
                }
                .into(),
            )
            .await
            .map_err(|e| Error::attach_failed(target_id.clone(), e.to_string()))?;
        let session_id = result
            .get("sessionId")
            .and_then(Value::as_str)
            .ok_or_else(|| {
                Error::attach_failed(target_id.clone(), "attach response missing sessionId")
            })?;

        let session = Session::new(
            self.transport.clone(),
            SessionId::new(session_id),
            target_id.clone(),
            root,
        );

        match self.bootstrap(&session).await {
            Ok(()) => {}
            Err(e) => {
                self.abandon(&session).await;
                return Err(e);
            }
        }

        if self.closed.load(Ordering::SeqCst) {
            // The page closed while we were configuring.
            self.abandon(&session).await;
            return Err(Error::target_closed(target_id.clone()));
        }

        // Release the target only now that the snapshot is in place.
        if let Err(e) = session.send(RuntimeCommand::RunIfWaitingForDebugger).await {
            // Targets that were already running reject the resume.
            debug!(session_id = %session.session_id(), error = %e, "Resume not applicable");
        }

        info!(
            target_id = %target_id,
            session_id = %session.session_id(),
            root,
            "Session attached and configured"
        );
        Ok(session)
    }

    /// Attach path for targets found by discovery. Attach failures are
    /// expected when a target dies between discovery and attach, and are
    /// not fatal to the page.
    pub(crate) async fn attach_discovered(&self, target_id: TargetId) {
        match self.attach(&target_id, false).await {
            Ok(_) => {}
            Err(e) if e.is_attach_failure() => {
                debug!(target_id = %target_id, error = %e, "Target gone before attach completed");
            }
            Err(e) => {
                warn!(target_id = %target_id, error = %e, "Failed to configure discovered target");
            }
        }
    }

    async fn bootstrap(&self, session: &Session) -> Result<()> {
        session.send(PageCommand::Enable).await?;
        session.send(RuntimeCommand::Enable).await?;
        session.send(NetworkCommand::Enable).await?;

        // Register first so configuration deltas issued from now on reach
        // this session as well; replays below are idempotent.
        self.sessions.insert(session.clone());

        let snapshot = self.fetch_frame_snapshot(session).await?;
        self.tree
            .lock()
            .adopt_snapshot(session.session_id(), &snapshot);

        self.replicator.apply_all(session).await
    }

    /// Rolls back a session whose bootstrap failed or was aborted.
    async fn abandon(&self, session: &Session) {
        self.sessions.remove(session.session_id());
        self.replicator.forget_session(session.session_id());
        let detach = TargetCommand::DetachFromTarget {
            session_id: session.session_id().clone(),
        };
        if let Err(e) = self.transport.send(None, detach.into()).await {
            debug!(session_id = %session.session_id(), error = %e, "Detach after failed attach");
        }
    }

    async fn fetch_frame_snapshot(&self, session: &Session) -> Result<Vec<SnapshotFrame>> {
        let result = session.send(PageCommand::GetFrameTree).await?;
        let mut frames = Vec::new();
        if let Some(root) = result.get("frameTree") {
            flatten_frame_tree(root, &mut frames);
        }
        if frames.is_empty() {
            return Err(Error::protocol("frame tree snapshot missing root frame"));
        }
        Ok(frames)
    }
}

/// Flattens the nested `getFrameTree` result, parents before children.
fn flatten_frame_tree(node: &Value, out: &mut Vec<SnapshotFrame>) {
    let Some(frame) = node.get("frame") else {
        return;
    };
    let Some(id) = frame.get("id").and_then(Value::as_str) else {
        return;
    };
    out.push(SnapshotFrame {
        frame_id: FrameId::new(id),
        parent_frame_id: frame
            .get("parentId")
            .and_then(Value::as_str)
            .map(FrameId::new),
        url: frame
            .get("url")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_owned(),
    });
    if let Some(children) = node.get("childFrames").and_then(Value::as_array) {
        for child in children {
            flatten_frame_tree(child, out);
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
