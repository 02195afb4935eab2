//! The page model: sessions, frames, configuration and request attribution.
//!
//! One [`Page`] spans every renderer process serving its frames. The
//! submodules split along the lifecycle of a frame target:
//!
//! | Module | Role |
//! |--------|------|
//! | [`discovery`] | Learns about frame targets as they appear |
//! | [`attachment`] | Attaches and bootstraps sessions |
//! | [`session`] | Per-target protocol sessions |
//! | [`replicator`] | Pushes page configuration to every session |
//! | [`frame`] | Reconciles per-session frame events into one tree |
//! | [`network`] | Attributes network requests to frames |
//! | [`events`] | Subscriber-facing event types |
//! | [`core`] | The [`Page`] handle and its event loop |

pub(crate) mod attachment;
pub mod core;
pub(crate) mod discovery;
pub mod events;
pub mod frame;
pub mod network;
pub(crate) mod replicator;
pub mod session;

pub use self::core::Page;
pub use events::{BindingCallback, InterceptedRequest, PageEvent, RouteAction, RouteHandler};
pub use frame::{Frame, FrameLifecycle};
pub use network::Request;
pub use replicator::{ColorScheme, EmulatedMedia, ReducedMotion, Viewport};
pub use session::Session;
