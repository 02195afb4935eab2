//! Site-isolation-aware page model over multiplexed DevTools sessions.
//!
//! Under site isolation a single web page is served by several renderer
//! processes: cross-origin iframes live in their own process, each reachable
//! only through its own protocol session. This library hides that split. It
//! attaches to a page target, discovers every out-of-process frame target as
//! it appears, and presents one coherent model:
//!
//! - One frame tree spanning all processes, in which a frame keeps its
//!   identity when it moves between renderers
//! - Page configuration (viewport, media, offline, locale, timezone, user
//!   agent, init scripts, exposed functions, routes) that holds in every
//!   frame, including frames whose process does not exist yet
//! - Network requests attributed to their issuing frame, in protocol order
//!
//! # Quick Start
//!
//! ```no_run
//! use pagemux::{Page, TargetId, WsConnection, Result};
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     // Connect to a running browser's DevTools endpoint.
//!     let connection = WsConnection::connect("ws://127.0.0.1:9222/devtools/browser").await?;
//!     let page = Page::attach(connection, TargetId::new("TARGET")).await?;
//!
//!     // Configuration holds in every frame, current and future.
//!     page.set_viewport_size(1280, 720).await?;
//!     page.add_init_script("window.injected = 42;").await?;
//!
//!     for frame in page.frames() {
//!         println!("{}: {}", frame.frame_id(), frame.url());
//!     }
//!     Ok(())
//! }
//! ```
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`page`] | The [`Page`] model: frames, sessions, configuration |
//! | [`error`] | Error types and [`Result`] alias |
//! | [`identifiers`] | Type-safe ID wrappers |
//! | [`protocol`] | DevTools message types |
//! | [`transport`] | The [`Transport`] seam and WebSocket implementation |
//!
//! # Ordering
//!
//! All protocol events, from every session, are applied by one consumer
//! task in arrival order. Subscribers therefore never observe causally
//! related events reordered: a frame attaches before it detaches, and a
//! document's request is observed before its subresources'.

// ============================================================================
// Modules
// ============================================================================

/// Error types and result aliases.
///
/// All fallible operations return [`Result<T>`] which uses [`Error`].
pub mod error;

/// Type-safe identifiers for protocol entities.
///
/// Newtype wrappers prevent mixing incompatible IDs at compile time.
pub mod identifiers;

/// The page model: frames, sessions and configuration replication.
pub mod page;

/// DevTools protocol message types.
///
/// Command, response and event structures with their wire encoding.
pub mod protocol;

/// Transport layer.
///
/// The [`Transport`] trait and the WebSocket connection behind it.
pub mod transport;

// ============================================================================
// Re-exports
// ============================================================================

// Page types
pub use page::{
    BindingCallback, ColorScheme, EmulatedMedia, Frame, FrameLifecycle, InterceptedRequest, Page,
    PageEvent, ReducedMotion, Request, RouteAction, RouteHandler, Session, Viewport,
};

// Error types
pub use error::{Error, Result};

// Identifier types
pub use identifiers::{CommandId, FrameId, NetworkRequestId, SessionId, TargetId};

// Transport types
pub use transport::{Transport, WsConnection};
