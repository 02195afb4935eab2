//! A scripted in-memory browser engine for integration tests.
//!
//! [`FakeBrowser`] stands in for the DevTools endpoint: it records every
//! command, answers attach and frame-tree requests from a configurable
//! script, and lets tests inject events as if the engine had emitted them.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::{json, Value};
use tokio::sync::mpsc;

use pagemux::protocol::{Command, Event};
use pagemux::{Result, SessionId, Transport};

/// One command observed by the fake engine.
#[derive(Debug, Clone)]
pub struct SentCommand {
    pub session_id: Option<String>,
    pub method: String,
    pub params: Value,
}

#[derive(Default)]
struct State {
    sent: Vec<SentCommand>,
    next_session: u32,
    /// Frame tree answered per target ID.
    frame_trees: HashMap<String, Value>,
    /// Which target each issued session is attached to.
    session_targets: HashMap<String, String>,
}

/// The scripted engine behind a [`Transport`].
#[derive(Default)]
pub struct FakeBrowser {
    state: Mutex<State>,
    sink: Mutex<Option<mpsc::UnboundedSender<Event>>>,
}

impl FakeBrowser {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Scripts the frame-tree snapshot answered for a target. Targets
    /// without a script answer a single main frame with ID `main`.
    pub fn set_frame_tree(&self, target_id: &str, tree: Value) {
        self.state
            .lock()
            .frame_trees
            .insert(target_id.to_owned(), tree);
    }

    /// Injects an event as if the engine had emitted it.
    pub fn emit(&self, session_id: Option<&str>, method: &str, params: Value) {
        let event = Event {
            session_id: session_id.map(SessionId::new),
            method: method.to_owned(),
            params,
        };
        self.sink
            .lock()
            .as_ref()
            .expect("page attached")
            .send(event)
            .expect("event loop alive");
    }

    /// Returns every command observed so far.
    pub fn commands(&self) -> Vec<SentCommand> {
        self.state.lock().sent.clone()
    }

    /// Returns the methods sent on one session, in order.
    pub fn methods_for(&self, session_id: &str) -> Vec<String> {
        self.state
            .lock()
            .sent
            .iter()
            .filter(|c| c.session_id.as_deref() == Some(session_id))
            .map(|c| c.method.clone())
            .collect()
    }

    /// Returns the session the engine issued for a target, if attached.
    pub fn session_for_target(&self, target_id: &str) -> Option<String> {
        let state = self.state.lock();
        state
            .session_targets
            .iter()
            .find(|(_, t)| t.as_str() == target_id)
            .map(|(s, _)| s.clone())
    }

    fn answer(&self, session_id: Option<&str>, method: &str, params: &Value) -> Value {
        match method {
            "Target.attachToTarget" => {
                let target = params["targetId"].as_str().unwrap_or_default().to_owned();
                let mut state = self.state.lock();
                state.next_session += 1;
                let session = format!("S{}", state.next_session);
                state.session_targets.insert(session.clone(), target);
                json!({ "sessionId": session })
            }
            "Page.getFrameTree" => {
                let state = self.state.lock();
                let target = session_id.and_then(|s| state.session_targets.get(s));
                target
                    .and_then(|t| state.frame_trees.get(t))
                    .cloned()
                    .unwrap_or_else(|| {
                        json!({
                            "frameTree": {
                                "frame": { "id": "main", "url": "about:blank" }
                            }
                        })
                    })
            }
            _ => json!({}),
        }
    }
}

#[async_trait]
impl Transport for FakeBrowser {
    async fn send(&self, session_id: Option<SessionId>, command: Command) -> Result<Value> {
        let session_id = session_id.map(|s| s.as_str().to_owned());
        let method = command.method().to_owned();
        let params = command.params_value();
        let response = self.answer(session_id.as_deref(), &method, &params);
        self.state.lock().sent.push(SentCommand {
            session_id,
            method,
            params,
        });
        Ok(response)
    }

    fn set_event_sink(&self, sink: mpsc::UnboundedSender<Event>) {
        *self.sink.lock() = Some(sink);
    }
}

/// Installs the test log subscriber; honors `RUST_LOG`.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Polls a condition until it holds or the deadline passes.
pub async fn wait_until(what: &str, condition: impl Fn() -> bool) {
    let deadline = Instant::now() + Duration::from_secs(2);
    while !condition() {
        assert!(Instant::now() < deadline, "timed out waiting for {what}");
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}

/// Frame-tree snapshot for a single-frame target.
pub fn single_frame_tree(frame_id: &str, parent_id: Option<&str>, url: &str) -> Value {
    let mut frame = json!({ "id": frame_id, "url": url });
    if let Some(parent) = parent_id {
        frame["parentId"] = json!(parent);
    }
    json!({ "frameTree": { "frame": frame } })
}
