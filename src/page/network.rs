//! Network request attribution.
//!
//! Raw network events arrive per session with a frame ID; the attributor
//! resolves each to a [`Frame`] handle and pairs start and completion
//! events by request ID. Events are attributed in protocol arrival order,
//! so a document request is observed before any subresource request the
//! document issues, including across sessions.

// ============================================================================
// Imports
// ============================================================================

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use rustc_hash::FxHashMap;
use tracing::debug;

use crate::identifiers::{FrameId, NetworkRequestId};
use crate::page::events::PageEvent;
use crate::page::frame::{Frame, FrameTree};

// ============================================================================
// Request
// ============================================================================

struct RequestInner {
    request_id: NetworkRequestId,
    url: String,
    method: String,
    headers: HashMap<String, String>,
    frame: Frame,
}

/// A network request attributed to its issuing frame.
///
/// Cloning is cheap; clones share the same request.
#[derive(Clone)]
pub struct Request {
    inner: Arc<RequestInner>,
}

impl fmt::Debug for Request {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Request")
            .field("request_id", &self.inner.request_id)
            .field("method", &self.inner.method)
            .field("url", &self.inner.url)
            .field("frame_id", self.inner.frame.frame_id())
            .finish_non_exhaustive()
    }
}

impl Request {
    /// Returns the engine-assigned request ID.
    #[inline]
    #[must_use]
    pub fn request_id(&self) -> &NetworkRequestId {
        &self.inner.request_id
    }

    /// Returns the request URL.
    #[inline]
    #[must_use]
    pub fn url(&self) -> &str {
        &self.inner.url
    }

    /// Returns the HTTP method.
    #[inline]
    #[must_use]
    pub fn method(&self) -> &str {
        &self.inner.method
    }

    /// Returns the request headers.
    #[inline]
    #[must_use]
    pub fn headers(&self) -> &HashMap<String, String> {
        &self.inner.headers
    }

    /// Returns the frame that issued the request.
    ///
    /// For a request observed after its frame detached, this is the
    /// last-known handle, so late events stay attributable.
    #[inline]
    #[must_use]
    pub fn frame(&self) -> Frame {
        self.inner.frame.clone()
    }
}

// ============================================================================
// RequestAttributor
// ============================================================================

/// Pairs request lifecycle events and resolves their issuing frames.
#[derive(Default)]
pub(crate) struct RequestAttributor {
    inflight: FxHashMap<NetworkRequestId, Request>,
}

impl RequestAttributor {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Records a request start and attributes it to a frame.
    ///
    /// A request without a frame ID, or naming a frame the tree has never
    /// seen, falls back to the main frame.
    pub(crate) fn on_request_will_be_sent(
        &mut self,
        tree: &FrameTree,
        request_id: NetworkRequestId,
        frame_id: Option<&FrameId>,
        url: String,
        method: String,
        headers: HashMap<String, String>,
    ) -> Option<PageEvent> {
        let frame = match frame_id {
            Some(id) => match tree.frame_for_attribution(id) {
                Some(frame) => frame,
                None => {
                    debug!(request_id = %request_id, frame_id = %id, "Request for unknown frame");
                    tree.main_frame()?
                }
            },
            None => tree.main_frame()?,
        };

        let request = Request {
            inner: Arc::new(RequestInner {
                request_id: request_id.clone(),
                url,
                method,
                headers,
                frame,
            }),
        };
        self.inflight.insert(request_id, request.clone());
        Some(PageEvent::Request(request))
    }

    /// Records a response arriving for an in-flight request.
    pub(crate) fn on_response_received(&mut self, request_id: &NetworkRequestId) {
        if !self.inflight.contains_key(request_id) {
            debug!(request_id = %request_id, "Response for unknown request");
        }
    }

    /// Completes an in-flight request.
    pub(crate) fn on_loading_finished(
        &mut self,
        request_id: &NetworkRequestId,
    ) -> Option<PageEvent> {
        let request = self.inflight.remove(request_id)?;
        Some(PageEvent::RequestFinished(request))
    }

    /// Drops all in-flight requests. Used at page teardown.
    pub(crate) fn clear(&mut self) {
        self.inflight.clear();
    }
}

// ============================================================================
// Tests
// ============================================================================
