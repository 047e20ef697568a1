//! Testing utilities for the Cadence workspace
//!
//! Shared scenario fixtures and scripted [`ActionHandler`]s for integration
//! tests.

use async_trait::async_trait;
use cadence_engine::{
    ActionHandler, DispatchOutcome, DispatchRequest, Dispatcher, EngineConfig, SessionManager,
};
use cadence_registry::CapabilityRegistry;
use cadence_scenario::{load, Format, Scenario};
use parking_lot::Mutex;
use serde_json::{Map, Value};
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;

/// Lookup, reply, ask for confirmation, then finish or escalate
pub const SUPPORT_FLOW: &str = r#"
id: support
name: Support triage
initial_context:
  channel: chat
steps:
  - id: start
    kind: start
    next: lookup
  - id: lookup
    kind: query_store
    params:
      query: "orders for {customer}"
    output: orders
    next: reply
  - id: reply
    kind: send_message
    params:
      text: "Hi {customer}, we found your orders"
      orders: "{orders}"
    next: confirm
  - id: confirm
    kind: input
    variable: answer
    prompt: "Did that help?"
    next: check
  - id: check
    kind: branch
    conditions:
      - condition: '{answer} == "yes"'
        next: done
    default: $escalate
  - id: done
    kind: end
"#;

/// Three-way branch on `x`
pub const BRANCH_FLOW: &str = r#"
id: branching
steps:
  - {id: start, kind: start, next: route}
  - id: route
    kind: branch
    conditions:
      - {condition: "{x} > 5", next: big}
      - {condition: "{x} < 2", next: small}
    default: middle
  - {id: big, kind: echo, params: {size: big}, output: size, next: $end}
  - {id: small, kind: echo, params: {size: small}, output: size, next: $end}
  - {id: middle, kind: echo, params: {size: middle}, output: size, next: $end}
"#;

/// Single model call
pub const MODEL_FLOW: &str = r#"
id: model
steps:
  - {id: start, kind: start, next: ask_model}
  - id: ask_model
    kind: call_model
    params: {prompt: "Summarise {topic}"}
    output: {summary: text}
    next: $end
"#;

/// Every fixture with its id
pub const FIXTURES: [(&str, &str); 3] = [
    ("support", SUPPORT_FLOW),
    ("branching", BRANCH_FLOW),
    ("model", MODEL_FLOW),
];

/// Load a YAML fixture against the default registry
///
/// # Panics
/// If the fixture does not load; fixtures are expected to be valid.
#[must_use]
pub fn load_fixture(yaml: &str) -> Scenario {
    let registry = CapabilityRegistry::with_defaults();
    match load(yaml, Format::Yaml, &registry) {
        Ok(loaded) => loaded.scenario,
        Err(e) => panic!("fixture failed to load: {e}"),
    }
}

/// Manager with every fixture registered
///
/// # Panics
/// If the manager cannot be built or a fixture fails to load.
#[must_use]
pub fn fixture_manager(config: EngineConfig, dispatcher: Dispatcher) -> SessionManager {
    let manager = match SessionManager::new(config, dispatcher) {
        Ok(manager) => manager,
        Err(e) => panic!("manager failed to build: {e}"),
    };
    for (_, yaml) in FIXTURES {
        manager.register_scenario(load_fixture(yaml));
    }
    manager
}

/// Config with short delays for fast tests
#[must_use]
pub fn fast_config() -> EngineConfig {
    EngineConfig::new()
        .with_retry_delay_ms(1)
        .with_step_timeout_ms(1_000)
}

/// Build an object from a `json!` value, empty for non-objects
#[must_use]
pub fn object(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        _ => Map::new(),
    }
}

/// Replays queued outcomes per capability
///
/// When a capability's queue is empty the parameters are echoed back.
#[derive(Debug, Default)]
pub struct ScriptedHandler {
    scripts: Mutex<HashMap<String, VecDeque<DispatchOutcome>>>,
    calls: Mutex<Vec<DispatchRequest>>,
}

impl ScriptedHandler {
    /// Create handler with no scripts
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue an outcome for a capability
    #[must_use]
    pub fn then(self, capability: &str, outcome: DispatchOutcome) -> Self {
        self.scripts
            .lock()
            .entry(capability.to_string())
            .or_default()
            .push_back(outcome);
        self
    }

    /// Queue the same outcome `times` times
    #[must_use]
    pub fn repeat(self, capability: &str, outcome: &DispatchOutcome, times: usize) -> Self {
        (0..times).fold(self, |h, _| h.then(capability, outcome.clone()))
    }

    /// Requests received so far
    #[must_use]
    pub fn calls(&self) -> Vec<DispatchRequest> {
        self.calls.lock().clone()
    }

    /// Number of requests received for a capability
    #[must_use]
    pub fn call_count(&self, capability: &str) -> usize {
        self.calls
            .lock()
            .iter()
            .filter(|r| r.capability.as_str() == capability)
            .count()
    }
}

#[async_trait]
impl ActionHandler for ScriptedHandler {
    async fn dispatch(&self, request: DispatchRequest) -> DispatchOutcome {
        self.calls.lock().push(request.clone());
        let scripted = self
            .scripts
            .lock()
            .get_mut(request.capability.as_str())
            .and_then(VecDeque::pop_front);
        scripted.unwrap_or_else(|| DispatchOutcome::ok(request.params))
    }
}

/// Sleeps before echoing, for timeout tests
#[derive(Debug, Clone, Copy)]
pub struct SlowHandler {
    delay: Duration,
}

impl SlowHandler {
    /// Create handler with a fixed delay
    #[must_use]
    pub fn new(delay: Duration) -> Self {
        Self { delay }
    }
}

#[async_trait]
impl ActionHandler for SlowHandler {
    async fn dispatch(&self, request: DispatchRequest) -> DispatchOutcome {
        tokio::time::sleep(self.delay).await;
        DispatchOutcome::ok(request.params)
    }
}

/// Wrap a handler for use as a dispatcher fallback
#[must_use]
pub fn dispatcher_for<H: ActionHandler + 'static>(handler: &Arc<H>) -> Dispatcher {
    Dispatcher::single(Arc::clone(handler) as Arc<dyn ActionHandler>)
}
