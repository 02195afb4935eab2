//! The page handle and its event loop.
//!
//! A [`Page`] models one top-level browsing context and every frame inside
//! it, whichever renderer process serves each frame. All protocol events,
//! from every session, funnel through one consumer task; the task applies
//! them to the frame tree and request attributor one at a time, so
//! subscribers observe them in protocol arrival order.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use serde_json::Value;
use tokio::sync::mpsc;
use tracing::{debug, info, trace, warn};

use crate::error::Result;
use crate::identifiers::{FrameId, TargetId};
use crate::page::attachment::AttachmentManager;
use crate::page::discovery::TargetDiscovery;
use crate::page::events::{
    BindingCallback, InterceptedRequest, PageEvent, RouteAction, RouteHandler,
};
use crate::page::frame::{Frame, FrameTree};
use crate::page::network::RequestAttributor;
use crate::page::replicator::{EmulatedMedia, Replicator, Viewport};
use crate::page::session::SessionRegistry;
use crate::protocol::{Event, ParsedEvent, TargetCommand};
use crate::transport::Transport;

// ============================================================================
// Page
// ============================================================================

struct PageInner {
    transport: Arc<dyn Transport>,
    root_target_id: TargetId,
    sessions: SessionRegistry,
    replicator: Arc<Replicator>,
    attachment: Arc<AttachmentManager>,
    discovery: TargetDiscovery,
    tree: Arc<Mutex<FrameTree>>,
    attributor: Mutex<RequestAttributor>,
    subscribers: Mutex<Vec<mpsc::UnboundedSender<PageEvent>>>,
    closed: Arc<AtomicBool>,
}

/// A handle to one top-level browsing context.
///
/// Cloning is cheap; all clones address the same page.
#[derive(Clone)]
pub struct Page {
    inner: Arc<PageInner>,
}

impl fmt::Debug for Page {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Page")
            .field("root_target_id", &self.inner.root_target_id)
            .field("sessions", &self.inner.sessions.len())
            .field("frames", &self.inner.tree.lock().len())
            .finish_non_exhaustive()
    }
}

impl Page {
    /// Attaches to a page target and brings the page model up.
    ///
    /// Enables target discovery, attaches the root session, adopts its
    /// frame tree and starts the event loop. Discovery or root attach
    /// rejection is fatal; no partially constructed page is returned.
    pub async fn attach(transport: Arc<dyn Transport>, target_id: TargetId) -> Result<Self> {
        let sessions = SessionRegistry::new();
        let replicator = Arc::new(Replicator::new(sessions.clone()));
        let tree = Arc::new(Mutex::new(FrameTree::new()));
        let closed = Arc::new(AtomicBool::new(false));
        let attachment = Arc::new(AttachmentManager::new(
            transport.clone(),
            sessions.clone(),
            replicator.clone(),
            tree.clone(),
            closed.clone(),
        ));
        let discovery = TargetDiscovery::new(
            transport.clone(),
            attachment.clone(),
            sessions.clone(),
            replicator.clone(),
        );

        let inner = Arc::new(PageInner {
            transport: transport.clone(),
            root_target_id: target_id.clone(),
            sessions,
            replicator,
            attachment,
            discovery,
            tree,
            attributor: Mutex::new(RequestAttributor::new()),
            subscribers: Mutex::new(Vec::new()),
            closed,
        });

        let (event_tx, event_rx) = mpsc::unbounded_channel();
        transport.set_event_sink(event_tx);
        tokio::spawn(run_event_loop(inner.clone(), event_rx));

        // Discovery first, so frame targets created during the root attach
        // are already announced.
        inner.discovery.enable().await?;
        inner.attachment.attach(&target_id, true).await?;

        info!(target_id = %target_id, "Page attached");
        Ok(Self { inner })
    }
}

// ============================================================================
// Page - Frame tree
// ============================================================================

impl Page {
    /// Returns the main frame.
    #[must_use]
    pub fn main_frame(&self) -> Option<Frame> {
        self.inner.tree.lock().main_frame()
    }

    /// Returns every live frame, main frame first, depth first.
    #[must_use]
    pub fn frames(&self) -> Vec<Frame> {
        self.inner.tree.lock().all_frames()
    }

    /// Looks up a live frame by ID.
    #[must_use]
    pub fn frame(&self, frame_id: &FrameId) -> Option<Frame> {
        self.inner.tree.lock().frame(frame_id)
    }

    /// Returns the number of frames currently served by their own
    /// renderer process.
    #[must_use]
    pub fn oopif_count(&self) -> usize {
        self.inner.sessions.oopif_count()
    }

    /// Returns the number of attached sessions, the root one included.
    #[must_use]
    pub fn session_count(&self) -> usize {
        self.inner.sessions.len()
    }

    /// Subscribes to page events. Events arrive in protocol order.
    #[must_use]
    pub fn subscribe(&self) -> mpsc::UnboundedReceiver<PageEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.inner.subscribers.lock().push(tx);
        rx
    }
}

// ============================================================================
// Page - Configuration
// ============================================================================

impl Page {
    /// Sets the viewport size for every frame, current and future.
    pub async fn set_viewport_size(&self, width: u32, height: u32) -> Result<()> {
        self.inner
            .replicator
            .set_viewport(Viewport { width, height })
            .await
    }

    /// Overrides emulated CSS media features.
    pub async fn emulate_media(&self, media: EmulatedMedia) -> Result<()> {
        self.inner.replicator.emulate_media(media).await
    }

    /// Toggles offline network emulation.
    pub async fn set_offline(&self, offline: bool) -> Result<()> {
        self.inner.replicator.set_offline(offline).await
    }

    /// Overrides the locale.
    pub async fn set_locale(&self, locale: &str) -> Result<()> {
        self.inner.replicator.set_locale(locale).await
    }

    /// Overrides the timezone.
    pub async fn set_timezone(&self, timezone_id: &str) -> Result<()> {
        self.inner.replicator.set_timezone(timezone_id).await
    }

    /// Overrides the user agent string.
    pub async fn set_user_agent(&self, user_agent: &str) -> Result<()> {
        self.inner.replicator.set_user_agent(user_agent).await
    }

    /// Registers a script evaluated before any page script in every new
    /// document, in every frame.
    pub async fn add_init_script(&self, source: &str) -> Result<()> {
        self.inner.replicator.add_init_script(source).await
    }

    /// Exposes a host function as `window.<name>(...)` in every frame.
    ///
    /// The page-side call returns a promise resolved with the callback's
    /// result. Fails with [`crate::Error::BindingExists`] on a duplicate
    /// name.
    pub async fn expose_function<F>(&self, name: &str, callback: F) -> Result<()>
    where
        F: Fn(Vec<Value>) -> Value + Send + Sync + 'static,
    {
        self.expose_binding(name, Arc::new(callback)).await
    }

    /// [`Self::expose_function`] taking an already shared callback.
    pub async fn expose_binding(&self, name: &str, callback: BindingCallback) -> Result<()> {
        self.inner.replicator.expose_binding(name, callback).await
    }

    /// Routes requests matching a `*`/`?` wildcard pattern through a
    /// handler. Routes apply in every frame; the first matching route wins.
    pub async fn route<F>(&self, pattern: &str, handler: F) -> Result<()>
    where
        F: Fn(&InterceptedRequest) -> RouteAction + Send + Sync + 'static,
    {
        let handler: RouteHandler = Arc::new(handler);
        self.inner.replicator.add_route(pattern, handler).await
    }
}

// ============================================================================
// Page - Teardown
// ============================================================================

impl Page {
    /// Returns `true` once the page has been closed.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::SeqCst)
    }

    /// Closes the page: aborts in-flight attaches, detaches every session
    /// and stops emitting events. Idempotent.
    pub async fn close(&self) {
        if self.inner.closed.swap(true, Ordering::SeqCst) {
            return;
        }

        for session in self.inner.sessions.drain() {
            let detach = TargetCommand::DetachFromTarget {
                session_id: session.session_id().clone(),
            };
            if let Err(e) = self.inner.transport.send(None, detach.into()).await {
                debug!(session_id = %session.session_id(), error = %e, "Detach on close");
            }
        }

        self.inner.attributor.lock().clear();
        self.inner.subscribers.lock().clear();
        info!(target_id = %self.inner.root_target_id, "Page closed");
    }
}

// ============================================================================
// Event loop
// ============================================================================

/// Single consumer for all protocol events of the page.
async fn run_event_loop(inner: Arc<PageInner>, mut events: mpsc::UnboundedReceiver<Event>) {
    while let Some(event) = events.recv().await {
        if inner.closed.load(Ordering::SeqCst) {
            break;
        }
        handle_event(&inner, event);
    }
    debug!("Page event loop stopped");
}

fn handle_event(inner: &Arc<PageInner>, event: Event) {
    let session_id = event.session_id.clone();
    match event.parse() {
        ParsedEvent::TargetCreated {
            target_id,
            target_type,
            ..
        } => {
            inner.discovery.on_target_created(target_id, &target_type);
        }

        ParsedEvent::TargetDestroyed { target_id } => {
            if let Some(session_id) = inner.discovery.on_target_destroyed(&target_id) {
                let events = inner.tree.lock().detach_session(&session_id);
                publish_all(inner, events);
            }
        }

        ParsedEvent::FrameAttached {
            frame_id,
            parent_frame_id,
        } => {
            let Some(session_id) = session_id else { return };
            let event =
                inner
                    .tree
                    .lock()
                    .on_frame_attached(&session_id, &frame_id, parent_frame_id.as_ref());
            publish_opt(inner, event);
        }

        ParsedEvent::FrameDetached { frame_id, reason } => {
            let Some(session_id) = session_id else { return };
            let events = inner
                .tree
                .lock()
                .on_frame_detached(&session_id, &frame_id, reason);
            publish_all(inner, events);
        }

        ParsedEvent::FrameNavigated { frame_id, url } => {
            let event = inner.tree.lock().on_frame_navigated(&frame_id, &url);
            publish_opt(inner, event);
        }

        ParsedEvent::RequestWillBeSent {
            request_id,
            frame_id,
            url,
            method,
            headers,
        } => {
            let tree = inner.tree.lock();
            let event = inner.attributor.lock().on_request_will_be_sent(
                &tree,
                request_id,
                frame_id.as_ref(),
                url,
                method,
                headers,
            );
            drop(tree);
            publish_opt(inner, event);
        }

        ParsedEvent::ResponseReceived { request_id } => {
            inner.attributor.lock().on_response_received(&request_id);
        }

        ParsedEvent::LoadingFinished { request_id } => {
            let event = inner.attributor.lock().on_loading_finished(&request_id);
            publish_opt(inner, event);
        }

        ParsedEvent::BindingCalled { name, payload } => {
            let Some(session) = session_id.and_then(|id| inner.sessions.get(&id)) else {
                return;
            };
            let replicator = inner.replicator.clone();
            tokio::spawn(async move {
                if let Err(e) = replicator.dispatch_binding(&session, &name, &payload).await {
                    warn!(name, error = %e, "Binding dispatch failed");
                }
            });
        }

        ParsedEvent::RequestPaused {
            request_id,
            url,
            method,
        } => {
            let Some(session) = session_id.and_then(|id| inner.sessions.get(&id)) else {
                return;
            };
            let replicator = inner.replicator.clone();
            tokio::spawn(async move {
                if let Err(e) = replicator
                    .dispatch_paused_request(&session, request_id, &url, &method)
                    .await
                {
                    warn!(url, error = %e, "Paused request dispatch failed");
                }
            });
        }

        ParsedEvent::Unknown { method, .. } => {
            trace!(method, "Unhandled event");
        }
    }
}

fn publish_opt(inner: &PageInner, event: Option<PageEvent>) {
    if let Some(event) = event {
        publish_all(inner, vec![event]);
    }
}

fn publish_all(inner: &PageInner, events: Vec<PageEvent>) {
    if events.is_empty() {
        return;
    }
    let mut subscribers = inner.subscribers.lock();
    for event in events {
        subscribers.retain(|tx| tx.send(event.clone()).is_ok());
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use std::time::Duration;

    use async_trait::async_trait;
    use serde_json::json;

    use crate::identifiers::SessionId;
    use crate::protocol::Command;

    /// Answers bootstrap commands and lets tests inject events.
    struct FakePage {
        sent: Mutex<Vec<String>>,
        sink: Mutex<Option<mpsc::UnboundedSender<Event>>>,
        next_session: Mutex<u32>,
    }

    impl FakePage {
        fn new() -> Self {
            Self {
                sent: Mutex::new(Vec::new()),
                sink: Mutex::new(None),
                next_session: Mutex::new(0),
            }
        }

        fn emit(&self, event: Event) {
            let sink = self.sink.lock();
            sink.as_ref()
                .expect("sink installed")
                .send(event)
                .expect("loop alive");
        }

        fn methods(&self) -> Vec<String> {
            self.sent.lock().clone()
        }
    }

    #[async_trait]
    impl Transport for FakePage {
        async fn send(&self, _session_id: Option<SessionId>, command: Command) -> Result<Value> {
            let method = command.method().to_owned();
            self.sent.lock().push(method.clone());
            Ok(match method.as_str() {
                "Target.attachToTarget" => {
                    let mut next = self.next_session.lock();
                    *next += 1;
                    json!({ "sessionId": format!("S{next}") })
                }
                "Page.getFrameTree" => json!({
                    "frameTree": {
                        "frame": { "id": "main", "url": "about:blank" }
                    }
                }),
                _ => json!({}),
            })
        }

        fn set_event_sink(&self, sink: mpsc::UnboundedSender<Event>) {
            *self.sink.lock() = Some(sink);
        }
    }

    async fn recv_event(rx: &mut mpsc::UnboundedReceiver<PageEvent>) -> PageEvent {
        tokio::time::timeout(Duration::from_secs(1), rx.recv())
            .await
            .expect("event within deadline")
            .expect("channel open")
    }

    #[tokio::test]
    async fn test_attach_builds_root_model() {
        let transport = Arc::new(FakePage::new());
        let page = Page::attach(transport.clone(), TargetId::new("T1"))
            .await
            .expect("attach");

        assert_eq!(
            page.main_frame().expect("main").frame_id(),
            &FrameId::new("main")
        );
        assert_eq!(page.session_count(), 1);
        assert_eq!(page.oopif_count(), 0);
        assert_eq!(
            transport.methods().first().map(String::as_str),
            Some("Target.setDiscoverTargets")
        );
    }

    #[tokio::test]
    async fn test_frame_events_reach_subscribers_in_order() {
        let transport = Arc::new(FakePage::new());
        let page = Page::attach(transport.clone(), TargetId::new("T1"))
            .await
            .expect("attach");
        let mut rx = page.subscribe();

        transport.emit(Event::new(
            SessionId::new("S1"),
            "Page.frameAttached",
            json!({ "frameId": "child", "parentFrameId": "main" }),
        ));
        transport.emit(Event::new(
            SessionId::new("S1"),
            "Page.frameNavigated",
            json!({ "frame": { "id": "child", "url": "https://example.com/a" } }),
        ));

        match recv_event(&mut rx).await {
            PageEvent::FrameAttached(frame) => assert_eq!(frame.frame_id(), &FrameId::new("child")),
            other => panic!("unexpected event: {other:?}"),
        }
        match recv_event(&mut rx).await {
            PageEvent::FrameNavigated(frame) => {
                assert_eq!(frame.url(), "https://example.com/a");
            }
            other => panic!("unexpected event: {other:?}"),
        }
        assert_eq!(page.frames().len(), 2);
    }

    #[tokio::test]
    async fn test_configuration_broadcasts_to_sessions() {
        let transport = Arc::new(FakePage::new());
        let page = Page::attach(transport.clone(), TargetId::new("T1"))
            .await
            .expect("attach");

        page.set_viewport_size(1280, 720).await.expect("viewport");
        page.set_offline(true).await.expect("offline");

        let methods = transport.methods();
        assert!(methods.contains(&"Emulation.setDeviceMetricsOverride".to_owned()));
        assert!(methods.contains(&"Network.emulateNetworkConditions".to_owned()));
    }

    #[tokio::test]
    async fn test_close_detaches_and_stops() {
        let transport = Arc::new(FakePage::new());
        let page = Page::attach(transport.clone(), TargetId::new("T1"))
            .await
            .expect("attach");

        page.close().await;
        assert!(page.is_closed());
        assert_eq!(page.session_count(), 0);
        assert!(transport
            .methods()
            .contains(&"Target.detachFromTarget".to_owned()));

        // Idempotent.
        page.close().await;
    }
}
