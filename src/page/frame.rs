//! Frame handles and the frame tree synchronizer.
//!
//! The engine reports frame lifecycle events per session, and under site
//! isolation a single frame's events arrive on different sessions over its
//! lifetime: when an iframe navigates cross-process, the new renderer's
//! session reports the frame attached while the old renderer's session
//! reports it detached, in either order. [`FrameTree`] reconciles those
//! per-session streams into one tree in which a frame that merely changed
//! renderer process keeps its identity.
//!
//! | Type | Role |
//! |------|------|
//! | [`Frame`] | Cheap cloneable handle; equal iff same underlying frame |
//! | [`FrameLifecycle`] | Pending, attached or detached |
//! | [`FrameTree`] | Owns all frames of one page; applies lifecycle events |

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use rustc_hash::{FxHashMap, FxHashSet};
use tracing::{debug, warn};

use crate::identifiers::{FrameId, SessionId};
use crate::page::events::PageEvent;
use crate::protocol::DetachReason;

// ============================================================================
// FrameLifecycle
// ============================================================================

/// Lifecycle state of a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameLifecycle {
    /// Known from a target's frame-tree snapshot, no lifecycle event yet.
    Pending,
    /// Parented in the tree with a known owning session.
    Attached,
    /// Removed from the tree. Terminal.
    Detached,
}

// ============================================================================
// Frame
// ============================================================================

/// Mutable per-frame state, guarded for cross-thread reads.
struct FrameState {
    url: String,
    /// Session currently reporting this frame's lifecycle.
    owner: Option<SessionId>,
    lifecycle: FrameLifecycle,
    parent: Option<Weak<FrameInner>>,
    /// Child frames in attach order.
    children: Vec<Frame>,
}

struct FrameInner {
    frame_id: FrameId,
    state: Mutex<FrameState>,
}

/// A handle to one frame of the page.
///
/// The handle survives cross-process navigation: when a frame moves between
/// renderer processes its engine-assigned frame ID is stable, and the tree
/// reuses the existing handle rather than minting a new one. Two handles
/// compare equal exactly when they refer to the same frame.
#[derive(Clone)]
pub struct Frame {
    inner: Arc<FrameInner>,
}

impl PartialEq for Frame {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl Eq for Frame {}

impl fmt::Debug for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.inner.state.lock();
        f.debug_struct("Frame")
            .field("frame_id", &self.inner.frame_id)
            .field("url", &state.url)
            .field("lifecycle", &state.lifecycle)
            .finish_non_exhaustive()
    }
}

impl Frame {
    fn new(
        frame_id: FrameId,
        url: String,
        owner: Option<SessionId>,
        lifecycle: FrameLifecycle,
    ) -> Self {
        Self {
            inner: Arc::new(FrameInner {
                frame_id,
                state: Mutex::new(FrameState {
                    url,
                    owner,
                    lifecycle,
                    parent: None,
                    children: Vec::new(),
                }),
            }),
        }
    }

    /// Returns the engine-assigned frame ID.
    #[inline]
    #[must_use]
    pub fn frame_id(&self) -> &FrameId {
        &self.inner.frame_id
    }

    /// Returns the frame's last observed URL.
    #[must_use]
    pub fn url(&self) -> String {
        self.inner.state.lock().url.clone()
    }

    /// Returns the current lifecycle state.
    #[must_use]
    pub fn lifecycle(&self) -> FrameLifecycle {
        self.inner.state.lock().lifecycle
    }

    /// Returns the parent frame, or `None` for a root.
    #[must_use]
    pub fn parent_frame(&self) -> Option<Frame> {
        let weak = self.inner.state.lock().parent.clone()?;
        weak.upgrade().map(|inner| Frame { inner })
    }

    /// Returns the child frames in attach order.
    #[must_use]
    pub fn child_frames(&self) -> Vec<Frame> {
        self.inner.state.lock().children.clone()
    }

    /// Returns the session currently reporting this frame's lifecycle.
    #[must_use]
    pub fn owner_session(&self) -> Option<SessionId> {
        self.inner.state.lock().owner.clone()
    }

    fn set_parent(&self, parent: Option<&Frame>) {
        self.inner.state.lock().parent = parent.map(|p| Arc::downgrade(&p.inner));
    }
}

// ============================================================================
// FrameTree
// ============================================================================

/// Buffered attach that arrived before the previous owner let go.
struct PendingAttach {
    session_id: SessionId,
    parent_frame_id: Option<FrameId>,
}

/// A frame known from a `getFrameTree` snapshot, prior to reconciliation.
#[derive(Debug, Clone)]
pub(crate) struct SnapshotFrame {
    pub frame_id: FrameId,
    pub parent_frame_id: Option<FrameId>,
    pub url: String,
}

/// The reconciled frame tree of one page.
///
/// All mutation goes through the lifecycle methods below, which the page
/// applies one event at a time so that events touching the same frame are
/// observed in protocol arrival order. Each method returns the events to
/// surface to subscribers.
#[derive(Default)]
pub(crate) struct FrameTree {
    /// Live frames by ID.
    frames: FxHashMap<FrameId, Frame>,
    /// Detached frames, retained for late request attribution.
    detached: FxHashMap<FrameId, Frame>,
    main_frame: Option<Frame>,
    /// Roots recovered from attaches naming an unknown parent.
    synthetic_roots: Vec<Frame>,
    /// Attaches from a new owner buffered until the old owner detaches.
    pending_attach: FxHashMap<FrameId, PendingAttach>,
    /// Frames whose owner detached with reason `swap`, awaiting a new owner.
    awaiting_owner: FxHashSet<FrameId>,
}

impl FrameTree {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Returns the main frame, if the root session has reported one.
    pub(crate) fn main_frame(&self) -> Option<Frame> {
        self.main_frame.clone()
    }

    /// Looks up a live frame.
    pub(crate) fn frame(&self, frame_id: &FrameId) -> Option<Frame> {
        self.frames.get(frame_id).cloned()
    }

    /// Looks up a frame for request attribution, falling back to the
    /// last-known handle when the frame has already detached.
    pub(crate) fn frame_for_attribution(&self, frame_id: &FrameId) -> Option<Frame> {
        self.frames
            .get(frame_id)
            .or_else(|| self.detached.get(frame_id))
            .cloned()
    }

    /// Returns all live frames in depth-first order, main frame first.
    pub(crate) fn all_frames(&self) -> Vec<Frame> {
        let mut out = Vec::with_capacity(self.frames.len());
        if let Some(main) = &self.main_frame {
            collect_subtree(main, &mut out);
        }
        for root in &self.synthetic_roots {
            collect_subtree(root, &mut out);
        }
        out
    }

    /// Returns the number of live frames.
    pub(crate) fn len(&self) -> usize {
        self.frames.len()
    }
}

fn collect_subtree(frame: &Frame, out: &mut Vec<Frame>) {
    out.push(frame.clone());
    for child in frame.child_frames() {
        collect_subtree(&child, out);
    }
}

// ============================================================================
// FrameTree - Lifecycle events
// ============================================================================

impl FrameTree {
    /// Applies a frame-attached event reported by `session_id`.
    pub(crate) fn on_frame_attached(
        &mut self,
        session_id: &SessionId,
        frame_id: &FrameId,
        parent_frame_id: Option<&FrameId>,
    ) -> Option<PageEvent> {
        if let Some(frame) = self.frames.get(frame_id).cloned() {
            if self.awaiting_owner.remove(frame_id) {
                // The old owner already let go with reason `swap`.
                self.complete_swap(&frame, session_id);
                return None;
            }
            let owner = frame.owner_session();
            if owner.as_ref() == Some(session_id) {
                debug!(frame_id = %frame_id, "Duplicate frame attach ignored");
                return None;
            }
            // New owner reported before the old one detached. Buffer until
            // the matching detach arrives so the handle keeps its identity.
            debug!(
                frame_id = %frame_id,
                session_id = %session_id,
                "Frame attach buffered pending ownership handoff"
            );
            self.pending_attach.insert(
                frame_id.clone(),
                PendingAttach {
                    session_id: session_id.clone(),
                    parent_frame_id: parent_frame_id.cloned(),
                },
            );
            return None;
        }

        let frame = self.create_frame(
            frame_id.clone(),
            parent_frame_id,
            String::new(),
            Some(session_id.clone()),
            FrameLifecycle::Attached,
        );
        Some(PageEvent::FrameAttached(frame))
    }

    /// Applies a frame-detached event reported by `session_id`.
    pub(crate) fn on_frame_detached(
        &mut self,
        session_id: &SessionId,
        frame_id: &FrameId,
        reason: DetachReason,
    ) -> Vec<PageEvent> {
        let Some(frame) = self.frames.get(frame_id).cloned() else {
            debug!(frame_id = %frame_id, "Detach for unknown frame ignored");
            return Vec::new();
        };
        if frame.owner_session().as_ref() != Some(session_id) {
            // Stale detach from a previous owner after the swap already
            // went through.
            debug!(
                frame_id = %frame_id,
                session_id = %session_id,
                "Detach from non-owning session ignored"
            );
            return Vec::new();
        }

        if let Some(pending) = self.pending_attach.remove(frame_id) {
            // New owner already attached; hand the frame over regardless of
            // the stated reason.
            self.reparent(&frame, pending.parent_frame_id.as_ref());
            self.complete_swap(&frame, &pending.session_id);
            return Vec::new();
        }

        match reason {
            DetachReason::Swap => {
                debug!(frame_id = %frame_id, "Frame awaiting new owner after process swap");
                self.awaiting_owner.insert(frame_id.clone());
                Vec::new()
            }
            DetachReason::Remove => self.detach_subtree(&frame),
        }
    }

    /// Applies a frame-navigated event.
    pub(crate) fn on_frame_navigated(
        &mut self,
        frame_id: &FrameId,
        url: &str,
    ) -> Option<PageEvent> {
        let frame = self.frames.get(frame_id).cloned()?;
        {
            let mut state = frame.inner.state.lock();
            state.url = url.to_owned();
            if state.lifecycle == FrameLifecycle::Pending {
                state.lifecycle = FrameLifecycle::Attached;
            }
        }
        Some(PageEvent::FrameNavigated(frame))
    }

    /// Reconciles a session's frame-tree snapshot taken at attach time.
    ///
    /// Frames already in the tree are handed over to the snapshotting
    /// session (the snapshot root of an out-of-process frame session is the
    /// adopted frame itself); unknown frames are created silently, in
    /// [`FrameLifecycle::Pending`] until their first lifecycle event.
    pub(crate) fn adopt_snapshot(&mut self, session_id: &SessionId, frames: &[SnapshotFrame]) {
        for snap in frames {
            if let Some(frame) = self.frames.get(&snap.frame_id).cloned() {
                self.awaiting_owner.remove(&snap.frame_id);
                self.pending_attach.remove(&snap.frame_id);
                self.complete_swap(&frame, session_id);
                if !snap.url.is_empty() {
                    frame.inner.state.lock().url = snap.url.clone();
                }
                continue;
            }
            self.create_frame(
                snap.frame_id.clone(),
                snap.parent_frame_id.as_ref(),
                snap.url.clone(),
                Some(session_id.clone()),
                FrameLifecycle::Pending,
            );
        }
    }

    /// Tears down or hands over every frame owned by a destroyed session.
    ///
    /// Frames with a buffered attach from a newer session swap to it; the
    /// rest are detached for real.
    pub(crate) fn detach_session(&mut self, session_id: &SessionId) -> Vec<PageEvent> {
        let owned: Vec<Frame> = self
            .frames
            .values()
            .filter(|f| f.owner_session().as_ref() == Some(session_id))
            .cloned()
            .collect();

        // Complete handoffs first so a parent's teardown cannot destroy a
        // frame that already has a new owner waiting.
        let mut remaining = Vec::new();
        for frame in owned {
            if let Some(pending) = self.pending_attach.remove(frame.frame_id()) {
                self.reparent(&frame, pending.parent_frame_id.as_ref());
                self.complete_swap(&frame, &pending.session_id);
            } else {
                remaining.push(frame);
            }
        }

        let mut events = Vec::new();
        for frame in remaining {
            let frame_id = frame.frame_id().clone();
            // A previous iteration may already have removed it as part of
            // an ancestor's subtree.
            if !self.frames.contains_key(&frame_id) {
                continue;
            }
            self.awaiting_owner.remove(&frame_id);
            events.extend(self.detach_subtree(&frame));
        }
        events
    }
}

// ============================================================================
// FrameTree - Internals
// ============================================================================

impl FrameTree {
    fn create_frame(
        &mut self,
        frame_id: FrameId,
        parent_frame_id: Option<&FrameId>,
        url: String,
        owner: Option<SessionId>,
        lifecycle: FrameLifecycle,
    ) -> Frame {
        let frame = Frame::new(frame_id.clone(), url, owner, lifecycle);

        match parent_frame_id {
            None => {
                if self.main_frame.is_none() {
                    self.main_frame = Some(frame.clone());
                } else {
                    // A second parentless frame cannot be the main frame;
                    // keep it reachable rather than dropping it.
                    warn!(frame_id = %frame_id, "Parentless frame attached as synthetic root");
                    self.synthetic_roots.push(frame.clone());
                }
            }
            Some(parent_id) => match self.frames.get(parent_id).cloned() {
                Some(parent) => {
                    frame.set_parent(Some(&parent));
                    parent.inner.state.lock().children.push(frame.clone());
                }
                None => {
                    warn!(
                        frame_id = %frame_id,
                        parent_frame_id = %parent_id,
                        "Frame attached under unknown parent; keeping as synthetic root"
                    );
                    self.synthetic_roots.push(frame.clone());
                }
            },
        }

        self.frames.insert(frame_id, frame.clone());
        frame
    }

    /// Moves ownership of an existing frame to `session_id`, preserving the
    /// handle and therefore its identity.
    fn complete_swap(&mut self, frame: &Frame, session_id: &SessionId) {
        let mut state = frame.inner.state.lock();
        let previous = state.owner.replace(session_id.clone());
        state.lifecycle = FrameLifecycle::Attached;
        drop(state);
        debug!(
            frame_id = %frame.frame_id(),
            previous = previous.as_ref().map(|s| s.as_str()).unwrap_or("-"),
            session_id = %session_id,
            "Frame ownership moved"
        );
    }

    /// Moves a frame under a new parent if the buffered attach named one.
    fn reparent(&mut self, frame: &Frame, parent_frame_id: Option<&FrameId>) {
        let Some(parent_id) = parent_frame_id else {
            return;
        };
        if frame
            .parent_frame()
            .is_some_and(|p| p.frame_id() == parent_id)
        {
            return;
        }
        let Some(new_parent) = self.frames.get(parent_id).cloned() else {
            return;
        };
        if let Some(old_parent) = frame.parent_frame() {
            old_parent.inner.state.lock().children.retain(|c| c != frame);
        }
        self.synthetic_roots.retain(|r| r != frame);
        frame.set_parent(Some(&new_parent));
        new_parent.inner.state.lock().children.push(frame.clone());
    }

    /// Detaches a frame and all its descendants, children before parents.
    fn detach_subtree(&mut self, frame: &Frame) -> Vec<PageEvent> {
        let mut events = Vec::new();
        for child in frame.child_frames() {
            events.extend(self.detach_subtree(&child));
        }

        let frame_id = frame.frame_id().clone();
        self.frames.remove(&frame_id);
        self.pending_attach.remove(&frame_id);
        self.awaiting_owner.remove(&frame_id);
        self.synthetic_roots.retain(|r| r != frame);
        if self.main_frame.as_ref() == Some(frame) {
            self.main_frame = None;
        }
        if let Some(parent) = frame.parent_frame() {
            parent.inner.state.lock().children.retain(|c| c != frame);
        }

        {
            let mut state = frame.inner.state.lock();
            state.lifecycle = FrameLifecycle::Detached;
            state.owner = None;
            state.children.clear();
        }
        self.detached.insert(frame_id, frame.clone());
        events.push(PageEvent::FrameDetached(frame.clone()));
        events
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn sid(s: &str) -> SessionId {
        SessionId::new(s)
    }

    fn fid(s: &str) -> FrameId {
        FrameId::new(s)
    }

    fn tree_with_main(session: &str) -> FrameTree {
        let mut tree = FrameTree::new();
        tree.adopt_snapshot(
            &sid(session),
            &[SnapshotFrame {
                frame_id: fid("main"),
                parent_frame_id: None,
                url: "https://example.com/".into(),
            }],
        );
        tree
    }

    #[test]
    fn test_attach_creates_child_frame() {
        let mut tree = tree_with_main("root");
        let event = tree.on_frame_attached(&sid("root"), &fid("child"), Some(&fid("main")));

        let frame = match event {
            Some(PageEvent::FrameAttached(f)) => f,
            other => panic!("unexpected event: {other:?}"),
        };
        assert_eq!(frame.frame_id(), &fid("child"));
        assert_eq!(
            frame.parent_frame().expect("has parent").frame_id(),
            &fid("main")
        );
        assert_eq!(tree.len(), 2);
        assert_eq!(tree.all_frames().len(), 2);
    }

    #[test]
    fn test_duplicate_attach_is_noop() {
        let mut tree = tree_with_main("root");
        tree.on_frame_attached(&sid("root"), &fid("child"), Some(&fid("main")));
        let event = tree.on_frame_attached(&sid("root"), &fid("child"), Some(&fid("main")));
        assert!(event.is_none());
        assert_eq!(tree.len(), 2);
    }

    #[test]
    fn test_detach_remove_emits_and_removes_subtree() {
        let mut tree = tree_with_main("root");
        tree.on_frame_attached(&sid("root"), &fid("child"), Some(&fid("main")));
        tree.on_frame_attached(&sid("root"), &fid("grand"), Some(&fid("child")));

        let child = tree.frame(&fid("child")).expect("live");
        let events = tree.on_frame_detached(&sid("root"), &fid("child"), DetachReason::Remove);

        // Children detach before parents.
        assert_eq!(events.len(), 2);
        let ids: Vec<_> = events
            .iter()
            .map(|e| match e {
                PageEvent::FrameDetached(f) => f.frame_id().clone(),
                other => panic!("unexpected event: {other:?}"),
            })
            .collect();
        assert_eq!(ids, vec![fid("grand"), fid("child")]);

        assert_eq!(tree.len(), 1);
        assert_eq!(child.lifecycle(), FrameLifecycle::Detached);
        // Detached handle retained for attribution.
        assert!(tree.frame_for_attribution(&fid("child")).is_some());
        assert!(tree.frame(&fid("child")).is_none());
    }

    #[test]
    fn test_detached_handle_identity() {
        let mut tree = tree_with_main("root");
        tree.on_frame_attached(&sid("root"), &fid("child"), Some(&fid("main")));
        let before = tree.frame(&fid("child")).expect("live");

        let events = tree.on_frame_detached(&sid("root"), &fid("child"), DetachReason::Remove);
        let detached = match &events[0] {
            PageEvent::FrameDetached(f) => f.clone(),
            other => panic!("unexpected event: {other:?}"),
        };
        assert_eq!(before, detached);
    }

    #[test]
    fn test_swap_detach_then_attach_preserves_identity() {
        let mut tree = tree_with_main("root");
        tree.on_frame_attached(&sid("root"), &fid("oopif"), Some(&fid("main")));
        let before = tree.frame(&fid("oopif")).expect("live");

        // Old owner lets go first, new owner attaches second.
        let events = tree.on_frame_detached(&sid("root"), &fid("oopif"), DetachReason::Swap);
        assert!(events.is_empty());
        let event = tree.on_frame_attached(&sid("remote"), &fid("oopif"), Some(&fid("main")));
        assert!(event.is_none());

        let after = tree.frame(&fid("oopif")).expect("live");
        assert_eq!(before, after);
        assert_eq!(after.owner_session(), Some(sid("remote")));
        assert_eq!(tree.len(), 2);
    }

    #[test]
    fn test_early_attach_buffered_until_detach() {
        let mut tree = tree_with_main("root");
        tree.on_frame_attached(&sid("root"), &fid("oopif"), Some(&fid("main")));
        let before = tree.frame(&fid("oopif")).expect("live");

        // New owner attaches before the old one detaches.
        let event = tree.on_frame_attached(&sid("remote"), &fid("oopif"), Some(&fid("main")));
        assert!(event.is_none());
        assert_eq!(before.owner_session(), Some(sid("root")));

        let events = tree.on_frame_detached(&sid("root"), &fid("oopif"), DetachReason::Swap);
        assert!(events.is_empty());

        let after = tree.frame(&fid("oopif")).expect("live");
        assert_eq!(before, after);
        assert_eq!(after.owner_session(), Some(sid("remote")));
    }

    #[test]
    fn test_buffered_attach_upgrades_remove_to_swap() {
        let mut tree = tree_with_main("root");
        tree.on_frame_attached(&sid("root"), &fid("oopif"), Some(&fid("main")));
        tree.on_frame_attached(&sid("remote"), &fid("oopif"), Some(&fid("main")));

        // Engine reported `remove`, but a new owner is already waiting.
        let events = tree.on_frame_detached(&sid("root"), &fid("oopif"), DetachReason::Remove);
        assert!(events.is_empty());
        let frame = tree.frame(&fid("oopif")).expect("still live");
        assert_eq!(frame.owner_session(), Some(sid("remote")));
    }

    #[test]
    fn test_stale_detach_from_previous_owner_ignored() {
        let mut tree = tree_with_main("root");
        tree.on_frame_attached(&sid("root"), &fid("oopif"), Some(&fid("main")));
        tree.on_frame_detached(&sid("root"), &fid("oopif"), DetachReason::Swap);
        tree.on_frame_attached(&sid("remote"), &fid("oopif"), Some(&fid("main")));

        // The old owner's stray detach must not tear the frame down.
        let events = tree.on_frame_detached(&sid("root"), &fid("oopif"), DetachReason::Remove);
        assert!(events.is_empty());
        assert!(tree.frame(&fid("oopif")).is_some());
    }

    #[test]
    fn test_remote_local_remote_transitions() {
        // Cross-process, then back in-process, then cross-process again.
        let mut tree = tree_with_main("root");
        tree.on_frame_attached(&sid("root"), &fid("oopif"), Some(&fid("main")));
        let original = tree.frame(&fid("oopif")).expect("live");

        tree.on_frame_detached(&sid("root"), &fid("oopif"), DetachReason::Swap);
        tree.on_frame_attached(&sid("remote-a"), &fid("oopif"), Some(&fid("main")));
        tree.on_frame_detached(&sid("remote-a"), &fid("oopif"), DetachReason::Swap);
        tree.on_frame_attached(&sid("root"), &fid("oopif"), Some(&fid("main")));
        tree.on_frame_detached(&sid("root"), &fid("oopif"), DetachReason::Swap);
        tree.on_frame_attached(&sid("remote-b"), &fid("oopif"), Some(&fid("main")));

        let finally = tree.frame(&fid("oopif")).expect("live");
        assert_eq!(original, finally);
        assert_eq!(finally.owner_session(), Some(sid("remote-b")));
        assert_eq!(tree.len(), 2);
    }

    #[test]
    fn test_unknown_parent_becomes_synthetic_root() {
        let mut tree = tree_with_main("root");
        let event = tree.on_frame_attached(&sid("root"), &fid("orphan"), Some(&fid("nope")));
        assert!(matches!(event, Some(PageEvent::FrameAttached(_))));

        let orphan = tree.frame(&fid("orphan")).expect("kept");
        assert!(orphan.parent_frame().is_none());
        // Still reachable from the flattened view.
        assert!(tree.all_frames().contains(&orphan));
    }

    #[test]
    fn test_session_teardown_completes_pending_swaps() {
        let mut tree = tree_with_main("root");
        tree.on_frame_attached(&sid("root"), &fid("oopif"), Some(&fid("main")));
        tree.on_frame_detached(&sid("root"), &fid("oopif"), DetachReason::Swap);
        tree.on_frame_attached(&sid("remote-a"), &fid("oopif"), Some(&fid("main")));
        // The next renderer attaches before the old target dies.
        tree.on_frame_attached(&sid("remote-b"), &fid("oopif"), Some(&fid("main")));

        // The old renderer's target dies without ever sending the detach.
        let events = tree.detach_session(&sid("remote-a"));
        assert!(events.is_empty());
        let frame = tree.frame(&fid("oopif")).expect("swapped, not destroyed");
        assert_eq!(frame.owner_session(), Some(sid("remote-b")));
    }

    #[test]
    fn test_session_teardown_detaches_owned_frames() {
        let mut tree = tree_with_main("root");
        tree.on_frame_attached(&sid("root"), &fid("oopif"), Some(&fid("main")));
        tree.on_frame_detached(&sid("root"), &fid("oopif"), DetachReason::Swap);
        tree.on_frame_attached(&sid("remote"), &fid("oopif"), Some(&fid("main")));

        let events = tree.detach_session(&sid("remote"));
        assert_eq!(events.len(), 1);
        assert!(tree.frame(&fid("oopif")).is_none());
        assert_eq!(tree.len(), 1);
    }

    #[test]
    fn test_snapshot_adoption_moves_ownership() {
        let mut tree = tree_with_main("root");
        tree.on_frame_attached(&sid("root"), &fid("oopif"), Some(&fid("main")));
        tree.on_frame_detached(&sid("root"), &fid("oopif"), DetachReason::Swap);

        // The new target's snapshot roots at the adopted frame.
        tree.adopt_snapshot(
            &sid("remote"),
            &[SnapshotFrame {
                frame_id: fid("oopif"),
                parent_frame_id: None,
                url: "https://other.example/".into(),
            }],
        );

        let frame = tree.frame(&fid("oopif")).expect("live");
        assert_eq!(frame.owner_session(), Some(sid("remote")));
        assert_eq!(frame.url(), "https://other.example/");
        // The adopted frame kept its original parent.
        assert_eq!(
            frame.parent_frame().expect("parent").frame_id(),
            &fid("main")
        );
    }

    #[test]
    fn test_navigation_updates_url_and_lifecycle() {
        let mut tree = tree_with_main("root");
        let main = tree.main_frame().expect("main");
        assert_eq!(main.lifecycle(), FrameLifecycle::Pending);

        let event = tree.on_frame_navigated(&fid("main"), "https://example.com/next");
        assert!(matches!(event, Some(PageEvent::FrameNavigated(_))));
        assert_eq!(main.url(), "https://example.com/next");
        assert_eq!(main.lifecycle(), FrameLifecycle::Attached);
    }

    #[test]
    fn test_navigation_for_unknown_frame_ignored() {
        let mut tree = tree_with_main("root");
        assert!(tree.on_frame_navigated(&fid("nope"), "https://x/").is_none());
    }
}
