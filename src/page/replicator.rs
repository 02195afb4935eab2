//! Configuration replication across sessions.
//!
//! Page-level configuration is declared once against the page and must hold
//! in every frame, whichever renderer process serves it. The [`Replicator`]
//! keeps the desired state as a snapshot: every `set_` call updates the
//! snapshot and pushes the delta to all currently attached sessions before
//! returning, and every newly attached session receives the entire snapshot
//! before its target is allowed to run. Pushes are keyed per session so
//! that replaying the snapshot never installs a script, binding or route
//! twice.

// ============================================================================
// Imports
// ============================================================================

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use parking_lot::Mutex;
use regex::Regex;
use rustc_hash::{FxHashMap, FxHashSet};
use serde_json::Value;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::identifiers::{NetworkRequestId, SessionId};
use crate::page::events::{BindingCallback, InterceptedRequest, RouteAction, RouteHandler};
use crate::page::session::{Session, SessionRegistry};
use crate::protocol::{
    EmulationCommand, FetchCommand, HeaderEntry, MediaFeature, NetworkCommand, PageCommand,
    RequestPattern, RuntimeCommand,
};

// ============================================================================
// Configuration values
// ============================================================================

/// Viewport dimensions in CSS pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
}

/// `prefers-color-scheme` override.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColorScheme {
    Light,
    Dark,
    NoPreference,
}

impl ColorScheme {
    #[must_use]
    fn as_str(self) -> &'static str {
        match self {
            Self::Light => "light",
            Self::Dark => "dark",
            Self::NoPreference => "no-preference",
        }
    }
}

/// `prefers-reduced-motion` override.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReducedMotion {
    Reduce,
    NoPreference,
}

impl ReducedMotion {
    #[must_use]
    fn as_str(self) -> &'static str {
        match self {
            Self::Reduce => "reduce",
            Self::NoPreference => "no-preference",
        }
    }
}

/// Emulated CSS media features.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EmulatedMedia {
    pub color_scheme: Option<ColorScheme>,
    pub reduced_motion: Option<ReducedMotion>,
}

impl EmulatedMedia {
    fn is_empty(&self) -> bool {
        self.color_scheme.is_none() && self.reduced_motion.is_none()
    }

    fn features(&self) -> Vec<MediaFeature> {
        let mut features = Vec::new();
        if let Some(scheme) = self.color_scheme {
            features.push(MediaFeature {
                name: "prefers-color-scheme".to_owned(),
                value: scheme.as_str().to_owned(),
            });
        }
        if let Some(motion) = self.reduced_motion {
            features.push(MediaFeature {
                name: "prefers-reduced-motion".to_owned(),
                value: motion.as_str().to_owned(),
            });
        }
        features
    }
}

// ============================================================================
// Snapshot internals
// ============================================================================

#[derive(Clone)]
struct InitScript {
    id: Uuid,
    source: String,
}

#[derive(Clone)]
struct Binding {
    name: String,
    callback: BindingCallback,
}

#[derive(Clone)]
struct RouteEntry {
    pattern: String,
    regex: Regex,
    handler: RouteHandler,
}

/// The desired configuration of every session, past and future.
#[derive(Clone, Default)]
struct ConfigurationSnapshot {
    viewport: Option<Viewport>,
    media: EmulatedMedia,
    offline: bool,
    locale: Option<String>,
    timezone_id: Option<String>,
    user_agent: Option<String>,
    /// Init scripts in registration order.
    init_scripts: Vec<InitScript>,
    /// Bindings in registration order; names are unique.
    bindings: Vec<Binding>,
    /// Routes in registration order; first match wins.
    routes: Vec<RouteEntry>,
}

/// What has already been installed on one session.
#[derive(Default)]
struct AppliedState {
    scripts: FxHashSet<Uuid>,
    bindings: FxHashSet<String>,
    /// Number of routes covered by the session's last `Fetch.enable`.
    routes: usize,
}

// ============================================================================
// Replicator
// ============================================================================

/// Replicates page configuration to all current and future sessions.
pub(crate) struct Replicator {
    snapshot: Mutex<ConfigurationSnapshot>,
    sessions: SessionRegistry,
    applied: Mutex<FxHashMap<SessionId, AppliedState>>,
}

impl Replicator {
    pub(crate) fn new(sessions: SessionRegistry) -> Self {
        Self {
            snapshot: Mutex::new(ConfigurationSnapshot::default()),
            sessions,
            applied: Mutex::new(FxHashMap::default()),
        }
    }

    /// Forgets per-session install state after a detach.
    pub(crate) fn forget_session(&self, session_id: &SessionId) {
        self.applied.lock().remove(session_id);
    }
}

// ============================================================================
// Replicator - Configuration setters
// ============================================================================

impl Replicator {
    pub(crate) async fn set_viewport(&self, viewport: Viewport) -> Result<()> {
        self.snapshot.lock().viewport = Some(viewport);
        self.broadcast(viewport_command(viewport)).await
    }

    pub(crate) async fn emulate_media(&self, media: EmulatedMedia) -> Result<()> {
        self.snapshot.lock().media = media;
        self.broadcast(EmulationCommand::SetEmulatedMedia {
            features: media.features(),
        })
        .await
    }

    pub(crate) async fn set_offline(&self, offline: bool) -> Result<()> {
        self.snapshot.lock().offline = offline;
        self.broadcast(NetworkCommand::offline(offline)).await
    }

    pub(crate) async fn set_locale(&self, locale: &str) -> Result<()> {
        self.snapshot.lock().locale = Some(locale.to_owned());
        self.broadcast(EmulationCommand::SetLocaleOverride {
            locale: locale.to_owned(),
        })
        .await
    }

    pub(crate) async fn set_timezone(&self, timezone_id: &str) -> Result<()> {
        self.snapshot.lock().timezone_id = Some(timezone_id.to_owned());
        self.broadcast(EmulationCommand::SetTimezoneOverride {
            timezone_id: timezone_id.to_owned(),
        })
        .await
    }

    pub(crate) async fn set_user_agent(&self, user_agent: &str) -> Result<()> {
        self.snapshot.lock().user_agent = Some(user_agent.to_owned());
        self.broadcast(EmulationCommand::SetUserAgentOverride {
            user_agent: user_agent.to_owned(),
        })
        .await
    }

    /// Registers an init script and installs it on all attached sessions.
    pub(crate) async fn add_init_script(&self, source: &str) -> Result<()> {
        let script = InitScript {
            id: Uuid::new_v4(),
            source: source.to_owned(),
        };
        self.snapshot.lock().init_scripts.push(script.clone());

        for session in self.sessions.all() {
            self.install_script(&session, &script).await?;
        }
        Ok(())
    }

    /// Registers a binding and installs it on all attached sessions.
    ///
    /// The binding becomes callable as `window.<name>(...)`, returning a
    /// promise resolved with the host callback's result.
    pub(crate) async fn expose_binding(
        &self,
        name: &str,
        callback: BindingCallback,
    ) -> Result<()> {
        {
            let mut snapshot = self.snapshot.lock();
            if snapshot.bindings.iter().any(|b| b.name == name) {
                return Err(Error::binding_exists(name));
            }
            snapshot.bindings.push(Binding {
                name: name.to_owned(),
                callback,
            });
        }

        for session in self.sessions.all() {
            self.install_binding(&session, name, true).await?;
        }
        Ok(())
    }

    /// Registers a route and enables interception on all attached sessions.
    pub(crate) async fn add_route(&self, pattern: &str, handler: RouteHandler) -> Result<()> {
        let regex = glob_to_regex(pattern)?;
        let patterns = {
            let mut snapshot = self.snapshot.lock();
            snapshot.routes.push(RouteEntry {
                pattern: pattern.to_owned(),
                regex,
                handler,
            });
            route_patterns(&snapshot)
        };

        for session in self.sessions.all() {
            self.enable_interception(&session, &patterns).await?;
        }
        Ok(())
    }
}

// ============================================================================
// Replicator - Snapshot application
// ============================================================================

impl Replicator {
    /// Pushes the entire current snapshot to one session.
    ///
    /// Called while the session's target is still held paused, so no page
    /// script runs before the configuration is in place. Replays are safe:
    /// scripts, bindings and routes already installed on the session are
    /// skipped.
    pub(crate) async fn apply_all(&self, session: &Session) -> Result<()> {
        let snapshot = self.snapshot.lock().clone();

        if let Some(viewport) = snapshot.viewport {
            session.send_config(viewport_command(viewport)).await?;
        }
        if !snapshot.media.is_empty() {
            session
                .send_config(EmulationCommand::SetEmulatedMedia {
                    features: snapshot.media.features(),
                })
                .await?;
        }
        if let Some(locale) = &snapshot.locale {
            session
                .send_config(EmulationCommand::SetLocaleOverride {
                    locale: locale.clone(),
                })
                .await?;
        }
        if let Some(timezone_id) = &snapshot.timezone_id {
            session
                .send_config(EmulationCommand::SetTimezoneOverride {
                    timezone_id: timezone_id.clone(),
                })
                .await?;
        }
        if let Some(user_agent) = &snapshot.user_agent {
            session
                .send_config(EmulationCommand::SetUserAgentOverride {
                    user_agent: user_agent.clone(),
                })
                .await?;
        }
        if snapshot.offline {
            session.send_config(NetworkCommand::offline(true)).await?;
        }

        for script in &snapshot.init_scripts {
            self.install_script(session, script).await?;
        }
        for binding in &snapshot.bindings {
            // The target is paused; no context exists to evaluate into yet.
            self.install_binding(session, &binding.name, false).await?;
        }
        if !snapshot.routes.is_empty() {
            self.enable_interception(session, &route_patterns(&snapshot))
                .await?;
        }

        debug!(session_id = %session.session_id(), "Configuration snapshot applied");
        Ok(())
    }

    async fn install_script(&self, session: &Session, script: &InitScript) -> Result<()> {
        // Reserve the key before the send suspends. A delta push and a
        // snapshot replay for the same session may run on different tasks;
        // whichever reserves first does the install, the other skips it.
        let reserved = self
            .applied
            .lock()
            .entry(session.session_id().clone())
            .or_default()
            .scripts
            .insert(script.id);
        if !reserved {
            return Ok(());
        }

        let sent = session
            .send_config(PageCommand::AddScriptToEvaluateOnNewDocument {
                source: script.source.clone(),
            })
            .await;
        if let Err(e) = sent {
            if let Some(state) = self.applied.lock().get_mut(session.session_id()) {
                state.scripts.remove(&script.id);
            }
            return Err(e);
        }
        Ok(())
    }

    /// Installs one binding on one session. With `live` set, the wrapper is
    /// also evaluated in the session's current context so pages that already
    /// loaded can call it.
    async fn install_binding(&self, session: &Session, name: &str, live: bool) -> Result<()> {
        // Same reservation discipline as init scripts: concurrent pushes to
        // one session must not double-install the wrapper.
        let reserved = self
            .applied
            .lock()
            .entry(session.session_id().clone())
            .or_default()
            .bindings
            .insert(name.to_owned());
        if !reserved {
            return Ok(());
        }

        if let Err(e) = self.push_binding(session, name, live).await {
            if let Some(state) = self.applied.lock().get_mut(session.session_id()) {
                state.bindings.remove(name);
            }
            return Err(e);
        }
        Ok(())
    }

    async fn push_binding(&self, session: &Session, name: &str, live: bool) -> Result<()> {
        let wrapper = binding_wrapper(name);
        session
            .send_config(RuntimeCommand::AddBinding {
                name: name.to_owned(),
            })
            .await?;
        session
            .send_config(PageCommand::AddScriptToEvaluateOnNewDocument {
                source: wrapper.clone(),
            })
            .await?;
        if live {
            session
                .send_config(RuntimeCommand::Evaluate {
                    expression: wrapper,
                })
                .await?;
        }
        Ok(())
    }

    async fn enable_interception(&self, session: &Session, patterns: &[String]) -> Result<()> {
        let covered = {
            let mut applied = self.applied.lock();
            let state = applied.entry(session.session_id().clone()).or_default();
            let covered = state.routes;
            if covered < patterns.len() {
                state.routes = patterns.len();
            }
            covered
        };
        if covered >= patterns.len() {
            return Ok(());
        }

        let sent = session
            .send_config(FetchCommand::Enable {
                patterns: patterns
                    .iter()
                    .map(|p| RequestPattern {
                        url_pattern: p.clone(),
                    })
                    .collect(),
            })
            .await;
        if let Err(e) = sent {
            if let Some(state) = self.applied.lock().get_mut(session.session_id()) {
                state.routes = covered;
            }
            return Err(e);
        }
        Ok(())
    }

    /// Pushes one delta command to every attached session.
    async fn broadcast(&self, command: impl Into<crate::protocol::Command>) -> Result<()> {
        let command = command.into();
        for session in self.sessions.all() {
            session.send_config(command.clone()).await?;
        }
        Ok(())
    }
}

// ============================================================================
// Replicator - Event dispatch
// ============================================================================

impl Replicator {
    /// Dispatches a binding call from a page to its host callback, then
    /// delivers the result back into the calling session.
    pub(crate) async fn dispatch_binding(
        &self,
        session: &Session,
        name: &str,
        payload: &str,
    ) -> Result<()> {
        let callback = {
            let snapshot = self.snapshot.lock();
            match snapshot.bindings.iter().find(|b| b.name == name) {
                Some(binding) => binding.callback.clone(),
                None => {
                    debug!(name, "Binding call for unknown binding ignored");
                    return Ok(());
                }
            }
        };

        let parsed: Value = serde_json::from_str(payload)?;
        let seq = parsed
            .get("seq")
            .and_then(Value::as_u64)
            .ok_or_else(|| Error::protocol("binding payload missing seq"))?;
        let args = match parsed.get("args") {
            Some(Value::Array(args)) => args.clone(),
            _ => Vec::new(),
        };

        let result = callback(args);
        session
            .send(RuntimeCommand::Evaluate {
                expression: deliver_expression(name, seq, &result),
            })
            .await?;
        Ok(())
    }

    /// Decides the fate of a paused request. The first registered route
    /// whose pattern matches wins; an unmatched request continues.
    pub(crate) async fn dispatch_paused_request(
        &self,
        session: &Session,
        request_id: NetworkRequestId,
        url: &str,
        method: &str,
    ) -> Result<()> {
        let handler = {
            let snapshot = self.snapshot.lock();
            snapshot
                .routes
                .iter()
                .find(|route| route.regex.is_match(url))
                .map(|route| (route.pattern.clone(), route.handler.clone()))
        };

        let command = match handler {
            None => FetchCommand::ContinueRequest { request_id },
            Some((pattern, handler)) => {
                let intercepted =
                    InterceptedRequest::new(request_id.clone(), url.to_owned(), method.to_owned());
                let action = handler(&intercepted);
                debug!(url, pattern = %pattern, ?action, "Route matched");
                match action {
                    RouteAction::Continue => FetchCommand::ContinueRequest { request_id },
                    RouteAction::Fulfill {
                        status,
                        headers,
                        body,
                    } => FetchCommand::FulfillRequest {
                        request_id,
                        response_code: status,
                        response_headers: Some(
                            headers
                                .into_iter()
                                .map(|(name, value)| HeaderEntry { name, value })
                                .collect(),
                        ),
                        body: Some(BASE64.encode(body)),
                    },
                    RouteAction::Abort => FetchCommand::FailRequest {
                        request_id,
                        error_reason: "Failed".to_owned(),
                    },
                }
            }
        };

        if let Err(e) = session.send(command).await {
            // The request may be gone by the time the verdict lands.
            warn!(error = %e, "Failed to resolve paused request");
        }
        Ok(())
    }
}

// ============================================================================
// Helpers
// ============================================================================

fn viewport_command(viewport: Viewport) -> EmulationCommand {
    EmulationCommand::SetDeviceMetricsOverride {
        width: viewport.width,
        height: viewport.height,
        device_scale_factor: 0.0,
        mobile: false,
    }
}

fn route_patterns(snapshot: &ConfigurationSnapshot) -> Vec<String> {
    snapshot.routes.iter().map(|r| r.pattern.clone()).collect()
}

/// Compiles a `*`/`?` wildcard pattern into an anchored regex.
fn glob_to_regex(pattern: &str) -> Result<Regex> {
    let mut out = String::with_capacity(pattern.len() + 8);
    out.push('^');
    for c in pattern.chars() {
        match c {
            '*' => out.push_str(".*"),
            '?' => out.push('.'),
            c => out.push_str(&regex::escape(&c.to_string())),
        }
    }
    out.push('$');
    Regex::new(&out).map_err(|e| Error::invalid_argument(format!("bad route pattern: {e}")))
}

/// Page-side wrapper turning the raw dispatch binding into a promise API.
fn binding_wrapper(name: &str) -> String {
    format!(
        r#"(() => {{
  const name = {name:?};
  const dispatch = globalThis[name];
  if (!dispatch || dispatch.__wrapped) return;
  const callbacks = new Map();
  let lastSeq = 0;
  const wrapper = (...args) => new Promise((resolve, reject) => {{
    const seq = ++lastSeq;
    callbacks.set(seq, {{ resolve, reject }});
    dispatch(JSON.stringify({{ seq, args }}));
  }});
  wrapper.__wrapped = true;
  wrapper.__deliver = (seq, result) => {{
    const cb = callbacks.get(seq);
    if (!cb) return;
    callbacks.delete(seq);
    cb.resolve(result);
  }};
  globalThis[name] = wrapper;
}})();"#
    )
}

/// Expression resolving a pending binding call in the page.
fn deliver_expression(name: &str, seq: u64, result: &Value) -> String {
    format!("globalThis[{name:?}].__deliver({seq}, {result})")
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::Arc;

    use async_trait::async_trait;
    use tokio::sync::mpsc;

    use crate::identifiers::TargetId;
    use crate::protocol::{Command, Event};
    use crate::transport::Transport;

    struct RecordingTransport {
        methods: Mutex<Vec<&'static str>>,
        fail_once: Mutex<Option<&'static str>>,
    }

    impl RecordingTransport {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                methods: Mutex::new(Vec::new()),
                fail_once: Mutex::new(None),
            })
        }

        fn count(&self, method: &str) -> usize {
            self.methods.lock().iter().filter(|m| ***m == *method).count()
        }
    }

    #[async_trait]
    impl Transport for RecordingTransport {
        async fn send(&self, _session_id: Option<SessionId>, command: Command) -> Result<Value> {
            // Suspend between a caller's idempotence check and its install so
            // interleaved pushes to the same session actually overlap.
            tokio::task::yield_now().await;
            let method = command.method();
            {
                let mut fail_once = self.fail_once.lock();
                if *fail_once == Some(method) {
                    *fail_once = None;
                    return Err(Error::connection("injected failure"));
                }
            }
            self.methods.lock().push(method);
            Ok(Value::Null)
        }

        fn set_event_sink(&self, _sink: mpsc::UnboundedSender<Event>) {}
    }

    fn replicator_with_session(
        transport: Arc<RecordingTransport>,
    ) -> (Replicator, Session) {
        let sessions = SessionRegistry::new();
        let session = Session::new(
            transport,
            SessionId::new("S1"),
            TargetId::new("T1"),
            false,
        );
        sessions.insert(session.clone());
        (Replicator::new(sessions), session)
    }

    #[tokio::test]
    async fn test_concurrent_replays_install_each_script_once() {
        let transport = RecordingTransport::new();
        let replicator = Replicator::new(SessionRegistry::new());
        replicator
            .add_init_script("window.__flag = 1;")
            .await
            .expect("registration succeeds with no sessions attached");

        let session = Session::new(
            transport.clone(),
            SessionId::new("S1"),
            TargetId::new("T1"),
            false,
        );
        let (a, b) = tokio::join!(
            replicator.apply_all(&session),
            replicator.apply_all(&session)
        );
        a.expect("first replay succeeds");
        b.expect("second replay succeeds");

        assert_eq!(
            transport.count("Page.addScriptToEvaluateOnNewDocument"),
            1,
            "overlapping replays must install the script once"
        );
    }

    #[tokio::test]
    async fn test_concurrent_delta_and_replay_install_binding_once() {
        let transport = RecordingTransport::new();
        let (replicator, session) = replicator_with_session(transport.clone());

        let (delta, replay) = tokio::join!(
            replicator.expose_binding("mul", Arc::new(|_| Value::Null)),
            replicator.apply_all(&session)
        );
        delta.expect("delta push succeeds");
        replay.expect("replay succeeds");

        assert_eq!(
            transport.count("Runtime.addBinding"),
            1,
            "binding installed exactly once per session"
        );
    }

    #[tokio::test]
    async fn test_failed_script_install_is_retried_on_replay() {
        let transport = RecordingTransport::new();
        let (replicator, session) = replicator_with_session(transport.clone());
        *transport.fail_once.lock() = Some("Page.addScriptToEvaluateOnNewDocument");

        let err = replicator
            .add_init_script("window.__flag = 1;")
            .await
            .expect_err("injected failure surfaces");
        assert!(err.is_configuration_failure());

        replicator.apply_all(&session).await.expect("replay succeeds");
        assert_eq!(transport.count("Page.addScriptToEvaluateOnNewDocument"), 1);
    }

    #[test]
    fn test_glob_to_regex() {
        let re = glob_to_regex("**/*.css").expect("compiles");
        assert!(re.is_match("https://example.com/one-style.css"));
        assert!(!re.is_match("https://example.com/one-style.html"));

        let re = glob_to_regex("https://example.com/?").expect("compiles");
        assert!(re.is_match("https://example.com/a"));
        assert!(!re.is_match("https://example.com/ab"));
    }

    #[test]
    fn test_glob_escapes_regex_metacharacters() {
        let re = glob_to_regex("https://example.com/a+b").expect("compiles");
        assert!(re.is_match("https://example.com/a+b"));
        assert!(!re.is_match("https://example.com/aab"));
    }

    #[test]
    fn test_media_features() {
        let media = EmulatedMedia {
            color_scheme: Some(ColorScheme::Dark),
            reduced_motion: None,
        };
        let features = media.features();
        assert_eq!(features.len(), 1);
        assert_eq!(features[0].name, "prefers-color-scheme");
        assert_eq!(features[0].value, "dark");
        assert!(!media.is_empty());
        assert!(EmulatedMedia::default().is_empty());
    }

    #[test]
    fn test_binding_wrapper_mentions_name() {
        let wrapper = binding_wrapper("mul");
        assert!(wrapper.contains("\"mul\""));
        assert!(wrapper.contains("__deliver"));
    }

    #[test]
    fn test_deliver_expression() {
        let expr = deliver_expression("mul", 3, &Value::from(36));
        assert_eq!(expr, "globalThis[\"mul\"].__deliver(3, 36)");
    }
}
