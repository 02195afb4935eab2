//! Events surfaced to page subscribers, and route handler types.

// ============================================================================
// Imports
// ============================================================================

use std::collections::HashMap;
use std::sync::Arc;

use crate::identifiers::NetworkRequestId;
use crate::page::frame::Frame;
use crate::page::network::Request;

// ============================================================================
// PageEvent
// ============================================================================

/// An event emitted by a page to its subscribers.
///
/// Events are emitted one at a time in the order the underlying protocol
/// messages arrived, so causally related events (an attach before its
/// detach, a request before its completion) are never observed reordered.
#[derive(Debug, Clone)]
#[non_exhaustive]
pub enum PageEvent {
    /// A new frame joined the tree.
    FrameAttached(Frame),
    /// A frame left the tree for real. Not emitted for process swaps.
    FrameDetached(Frame),
    /// A frame committed a navigation.
    FrameNavigated(Frame),
    /// A network request started, attributed to its issuing frame.
    Request(Request),
    /// A network request finished loading.
    RequestFinished(Request),
}

// ============================================================================
// Routing
// ============================================================================

/// A request paused for a route handler's verdict.
#[derive(Debug, Clone)]
pub struct InterceptedRequest {
    request_id: NetworkRequestId,
    url: String,
    method: String,
}

impl InterceptedRequest {
    pub(crate) fn new(request_id: NetworkRequestId, url: String, method: String) -> Self {
        Self {
            request_id,
            url,
            method,
        }
    }

    /// Returns the interception request ID.
    #[inline]
    #[must_use]
    pub fn request_id(&self) -> &NetworkRequestId {
        &self.request_id
    }

    /// Returns the request URL.
    #[inline]
    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Returns the HTTP method.
    #[inline]
    #[must_use]
    pub fn method(&self) -> &str {
        &self.method
    }
}

/// What to do with an intercepted request.
#[derive(Debug, Clone)]
pub enum RouteAction {
    /// Let the request through unmodified.
    Continue,
    /// Answer the request without hitting the network.
    Fulfill {
        status: u16,
        headers: HashMap<String, String>,
        body: String,
    },
    /// Fail the request.
    Abort,
}

impl RouteAction {
    /// Fulfills with a 200 response and the given body.
    #[must_use]
    pub fn fulfill(content_type: &str, body: impl Into<String>) -> Self {
        let mut headers = HashMap::new();
        headers.insert("Content-Type".to_owned(), content_type.to_owned());
        Self::Fulfill {
            status: 200,
            headers,
            body: body.into(),
        }
    }
}

/// Decides the fate of an intercepted request. First matching route wins.
pub type RouteHandler = Arc<dyn Fn(&InterceptedRequest) -> RouteAction + Send + Sync>;

/// Host-side function behind an exposed page binding. Receives the call
/// arguments and returns the value resolved into the page's promise.
pub type BindingCallback =
    Arc<dyn Fn(Vec<serde_json::Value>) -> serde_json::Value + Send + Sync>;
