//! Target discovery.
//!
//! Discovery is the page's source of out-of-process frame targets: once
//! enabled on the root scope, the engine announces every target as it is
//! created and destroyed. Frame targets are attached as they appear;
//! other target kinds (workers, extensions) are ignored.

// ============================================================================
// Imports
// ============================================================================

use std::sync::Arc;

use tracing::debug;

use crate::error::{Error, Result};
use crate::identifiers::{SessionId, TargetId};
use crate::page::attachment::AttachmentManager;
use crate::page::replicator::Replicator;
use crate::page::session::SessionRegistry;
use crate::transport::Transport;

/// Target type announced for out-of-process frames.
const IFRAME_TARGET: &str = "iframe";

// ============================================================================
// TargetDiscovery
// ============================================================================

/// Watches target lifecycle announcements and drives session attachment.
pub(crate) struct TargetDiscovery {
    transport: Arc<dyn Transport>,
    attachment: Arc<AttachmentManager>,
    sessions: SessionRegistry,
    replicator: Arc<Replicator>,
}

impl TargetDiscovery {
    pub(crate) fn new(
        transport: Arc<dyn Transport>,
        attachment: Arc<AttachmentManager>,
        sessions: SessionRegistry,
        replicator: Arc<Replicator>,
    ) -> Self {
        Self {
            transport,
            attachment,
            sessions,
            replicator,
        }
    }

    /// Enables target lifecycle announcements on the root scope.
    ///
    /// Without discovery no out-of-process frame is ever observed, so a
    /// rejection here is fatal to page construction.
    pub(crate) async fn enable(&self) -> Result<()> {
        self.transport
            .send(
                None,
                crate::protocol::TargetCommand::SetDiscoverTargets { discover: true }.into(),
            )
            .await
            .map_err(|e| Error::discovery_failed(e.to_string()))?;
        Ok(())
    }

    /// Reacts to a target announcement. Frame targets are attached in the
    /// background; attachment failures are handled there.
    pub(crate) fn on_target_created(&self, target_id: TargetId, target_type: &str) {
        if target_type != IFRAME_TARGET {
            debug!(target_id = %target_id, target_type, "Ignoring non-frame target");
            return;
        }
        let attachment = self.attachment.clone();
        tokio::spawn(async move {
            attachment.attach_discovered(target_id).await;
        });
    }

    /// Reacts to a target going away. Returns the session that was attached
    /// to it, if any, so the caller can tear down its frames.
    pub(crate) fn on_target_destroyed(&self, target_id: &TargetId) -> Option<SessionId> {
        let session = self.sessions.find_by_target(target_id)?;
        let session_id = session.session_id().clone();
        self.sessions.remove(&session_id);
        self.replicator.forget_session(&session_id);
        debug!(target_id = %target_id, session_id = %session_id, "Target destroyed");
        Some(session_id)
    }
}

// ============================================================================
// Tests
// ============================================================================
