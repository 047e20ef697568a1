//! Execution state machine
//!
//! ```text
//! running ──action ok / start / branch──▶ running
//! running ──input step──────────────────▶ waiting-for-input ──resume──▶ running
//! running ──end step / $end─────────────▶ completed
//! running ──fatal dispatch, retries exhausted, loop, $escalate,
//!           timeout, step budget, unknown step──▶ escalated
//! ```
//!
//! Steps within one session run strictly sequentially. Dispatch is the only
//! suspension point and each attempt is bounded by a timeout.

use crate::compare::evaluate;
use crate::config::EngineConfig;
use crate::context::lookup;
use crate::dispatch::{DispatchOutcome, DispatchRequest, Dispatcher};
use crate::error::EngineError;
use crate::session::{Escalation, EscalationReason, Session, SessionState};
use crate::substitute::substitute_params;
use cadence_registry::CapabilityId;
use cadence_resolver::{Resolver, StepContext};
use cadence_scenario::{ActionSpec, OutputBinding, Step, StepId, StepKind, Target};
use chrono::Utc;
use serde_json::{Map, Value};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Drives sessions through their scenario graph
#[derive(Debug, Clone)]
pub struct Interpreter {
    config: Arc<EngineConfig>,
    resolver: Resolver,
    dispatcher: Arc<Dispatcher>,
}

impl Interpreter {
    /// Create interpreter
    #[must_use]
    pub fn new(config: Arc<EngineConfig>, resolver: Resolver, dispatcher: Arc<Dispatcher>) -> Self {
        Self {
            config,
            resolver,
            dispatcher,
        }
    }

    /// Active configuration
    #[inline]
    #[must_use]
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Drive a running session until it pauses or terminates
    ///
    /// Enforces the session busy-time budget and the per-run step budget.
    pub async fn run(&self, session: &mut Session) -> SessionState {
        let budget = self.config.session_timeout();
        let mut executed = 0usize;

        while session.state == SessionState::Running {
            if executed >= self.config.max_steps_per_run {
                let limit = self.config.max_steps_per_run;
                self.escalate(session, EscalationReason::StepBudgetExceeded { limit });
                break;
            }
            let Some(remaining) = budget.checked_sub(session.busy).filter(|d| !d.is_zero()) else {
                self.escalate(session, self.timeout_reason());
                break;
            };

            let started = Instant::now();
            let finished = tokio::time::timeout(remaining, self.step(session)).await;
            session.busy += started.elapsed();
            executed += 1;

            if finished.is_err() {
                self.escalate(session, self.timeout_reason());
            }
        }
        session.state
    }

    /// Supply the awaited value and continue driving
    ///
    /// # Errors
    /// `EngineError::NotAwaitingInput` when the session is not paused at an
    /// input step.
    pub async fn resume(&self, session: &mut Session, value: Value) -> Result<SessionState, EngineError> {
        let (variable, next) = match (session.state, session.current_step().map(|s| &s.kind)) {
            (SessionState::WaitingForInput, Some(StepKind::Input { variable, next, .. })) => {
                (variable.clone(), next.clone())
            }
            (state, _) => {
                return Err(EngineError::NotAwaitingInput {
                    session: session.id,
                    state,
                });
            }
        };

        tracing::info!(session = %session.id, variable = %variable, "input received");
        session.context.insert(variable, value);
        session.since_input = session.history.len();
        session.state = SessionState::Running;
        self.goto(session, &next);
        Ok(self.run(session).await)
    }

    /// Execute the current step once
    pub async fn step(&self, session: &mut Session) -> SessionState {
        if session.state != SessionState::Running {
            return session.state;
        }
        let scenario = Arc::clone(&session.scenario);
        let Some(step_id) = session.current.clone() else {
            self.escalate(
                session,
                EscalationReason::UnknownStep {
                    step: StepId::new(""),
                },
            );
            return session.state;
        };
        let Some(step) = scenario.step(&step_id) else {
            self.escalate(session, EscalationReason::UnknownStep { step: step_id });
            return session.state;
        };

        if self.revisits(session, &step_id) {
            let window = self.config.loop_window;
            self.escalate(session, EscalationReason::LoopDetected { step: step_id, window });
            return session.state;
        }
        session.history.push(step_id.clone());
        session.touch();
        tracing::debug!(session = %session.id, step = %step_id, kind = step.kind.label(), "enter step");

        match &step.kind {
            StepKind::Start { next } => self.goto(session, next),
            StepKind::End => self.complete(session),
            StepKind::Input { variable, .. } => {
                session.state = SessionState::WaitingForInput;
                tracing::info!(session = %session.id, step = %step_id, variable = %variable, "waiting for input");
            }
            StepKind::Branch {
                conditions,
                default,
            } => {
                let target = conditions
                    .iter()
                    .find(|c| evaluate(&c.condition, &session.context))
                    .map_or(default, |c| &c.target);
                tracing::debug!(session = %session.id, step = %step_id, target = %target, "branch taken");
                self.goto(session, target);
            }
            StepKind::Action(spec) => self.act(session, step, spec).await,
        }
        session.state
    }

    /// Entering `step` would repeat one of the last `loop_window` steps since
    /// the most recent input
    fn revisits(&self, session: &Session, step: &StepId) -> bool {
        let recent = &session.history[session.since_input.min(session.history.len())..];
        let window = self.config.loop_window.min(recent.len());
        recent[recent.len() - window..].contains(step)
    }

    fn capability_for(&self, step: &Step, spec: &ActionSpec) -> CapabilityId {
        if let Some(capability) = &spec.capability {
            return capability.clone();
        }
        let context = StepContext::new(&step.params).with_description(step.description.as_deref());
        self.resolver.resolve(&spec.reference, &context).capability
    }

    async fn act(&self, session: &mut Session, step: &Step, spec: &ActionSpec) {
        let capability = self.capability_for(step, spec);
        let Some(handler) = self.dispatcher.handler_for(&capability).cloned() else {
            self.escalate(session, EscalationReason::MissingHandler { capability });
            return;
        };

        let params = substitute_params(&step.params, &session.context);
        let retries = step.max_retries.unwrap_or(self.config.max_retries);
        let timeout = step
            .timeout_ms
            .map_or_else(|| self.config.step_timeout(), Duration::from_millis);

        let mut last_error = String::new();
        for attempt in 1..=retries.saturating_add(1) {
            let request = DispatchRequest {
                session_id: session.id,
                step_id: step.id.clone(),
                capability: capability.clone(),
                params: params.clone(),
                context: session.context.clone(),
                attempt,
            };
            let outcome = match tokio::time::timeout(timeout, handler.dispatch(request)).await {
                Ok(outcome) => outcome,
                Err(_) => DispatchOutcome::retryable(format!(
                    "timed out after {}ms",
                    timeout.as_millis()
                )),
            };

            if outcome.success {
                tracing::debug!(
                    session = %session.id,
                    step = %step.id,
                    capability = %capability,
                    attempt,
                    outputs = outcome.outputs.len(),
                    "dispatch succeeded"
                );
                bind_outputs(&mut session.context, &step.output, outcome.outputs);
                self.goto(session, &spec.next);
                return;
            }

            last_error = outcome.error_message();
            if !outcome.retryable {
                self.escalate(
                    session,
                    EscalationReason::DispatchFailed {
                        capability,
                        error: last_error,
                    },
                );
                return;
            }
            if attempt <= retries {
                tracing::warn!(
                    session = %session.id,
                    step = %step.id,
                    capability = %capability,
                    attempt,
                    error = %last_error,
                    "retryable dispatch failure"
                );
                tokio::time::sleep(self.config.retry_delay()).await;
            }
        }

        self.escalate(
            session,
            EscalationReason::RetriesExhausted {
                capability,
                attempts: retries.saturating_add(1),
                error: last_error,
            },
        );
    }

    fn goto(&self, session: &mut Session, target: &Target) {
        match target {
            Target::Step(id) => session.current = Some(id.clone()),
            Target::End => self.complete(session),
            Target::Escalate => self.escalate(session, EscalationReason::Requested),
        }
    }

    fn complete(&self, session: &mut Session) {
        session.state = SessionState::Completed;
        session.touch();
        tracing::info!(
            session = %session.id,
            scenario = session.scenario.id(),
            steps = session.history.len(),
            "session completed"
        );
    }

    fn escalate(&self, session: &mut Session, reason: EscalationReason) {
        tracing::warn!(
            session = %session.id,
            scenario = session.scenario.id(),
            step = ?session.current.as_ref().map(StepId::as_str),
            reason = %reason,
            "session escalated"
        );
        session.escalation = Some(Escalation {
            reason,
            step: session.current.clone(),
            at: Utc::now(),
        });
        session.state = SessionState::Escalated;
        session.touch();
    }

    fn timeout_reason(&self) -> EscalationReason {
        EscalationReason::SessionTimeout {
            budget_secs: self.config.session_timeout_secs,
        }
    }
}

/// Merge handler outputs into the context according to the step binding
pub fn bind_outputs(context: &mut Map<String, Value>, binding: &OutputBinding, outputs: Map<String, Value>) {
    match binding {
        OutputBinding::Merge => context.extend(outputs),
        OutputBinding::Single(variable) => {
            context.insert(variable.clone(), Value::Object(outputs));
        }
        OutputBinding::Map(pairs) => {
            for (variable, key) in pairs {
                match lookup(&outputs, key) {
                    Some(value) => {
                        context.insert(variable.clone(), value.clone());
                    }
                    None => tracing::debug!(variable = %variable, key = %key, "output key missing"),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatch::{ActionHandler, EchoHandler, FnHandler};
    use async_trait::async_trait;
    use cadence_registry::CapabilityRegistry;
    use cadence_scenario::{load, Format, Scenario};
    use mockall::mock;
    use mockall::predicate::always;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    mock! {
        Handler {}

        #[async_trait]
        impl ActionHandler for Handler {
            async fn dispatch(&self, request: DispatchRequest) -> DispatchOutcome;
        }
    }

    fn scenario(yaml: &str) -> Arc<Scenario> {
        Arc::new(
            load(yaml, Format::Yaml, &CapabilityRegistry::with_defaults())
                .unwrap()
                .scenario,
        )
    }

    fn interpreter(config: EngineConfig, dispatcher: Dispatcher) -> Interpreter {
        Interpreter::new(
            Arc::new(config),
            Resolver::new(Arc::new(CapabilityRegistry::with_defaults())),
            Arc::new(dispatcher),
        )
    }

    fn fast() -> EngineConfig {
        EngineConfig::new().with_retry_delay_ms(1)
    }

    fn history(session: &Session) -> Vec<&str> {
        session.history.iter().map(StepId::as_str).collect()
    }

    const BRANCHY: &str = r#"
id: branchy
steps:
  - id: start
    kind: start
    next: check
  - id: check
    kind: branch
    conditions:
      - condition: "{x} > 5"
        next: A
      - condition: "{x} < 2"
        next: B
    default: C
  - id: A
    kind: end
  - id: B
    kind: end
  - id: C
    kind: end
"#;

    #[tokio::test]
    async fn branch_default_when_no_condition_holds() {
        let engine = interpreter(fast(), Dispatcher::new());
        for (x, expected) in [(json!(5), "C"), (json!(9), "A"), (json!("1"), "B"), (json!("n/a"), "C")] {
            let mut initial = Map::new();
            initial.insert("x".into(), x);
            let mut session = Session::new(scenario(BRANCHY), initial);
            assert_eq!(engine.run(&mut session).await, SessionState::Completed);
            assert_eq!(history(&session), vec!["start", "check", expected]);
        }
    }

    #[tokio::test]
    async fn params_are_substituted_and_outputs_bound() {
        let yaml = r#"
id: bind
initial_context:
  name: Ada
steps:
  - id: greet
    kind: send_message
    params:
      text: "Hi {name}"
    output:
      receipt: message_id
    next: lookup
  - id: lookup
    kind: query_store
    params:
      collection: users
      limit: "{limit}"
    output: found
    next: $end
"#;
        let mut mock = MockHandler::new();
        let mut seq = mockall::Sequence::new();
        mock.expect_dispatch()
            .withf(|r| {
                r.capability.as_str() == "send_message" && r.params.get("text") == Some(&json!("Hi Ada"))
            })
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| {
                let mut out = Map::new();
                out.insert("message_id".into(), json!("m-1"));
                DispatchOutcome::ok(out)
            });
        mock.expect_dispatch()
            .withf(|r| {
                r.params.get("limit") == Some(&json!(10))
                    && r.context.get("receipt") == Some(&json!("m-1"))
            })
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| {
                let mut out = Map::new();
                out.insert("count".into(), json!(2));
                DispatchOutcome::ok(out)
            });

        let engine = interpreter(fast(), Dispatcher::single(Arc::new(mock)));
        let mut initial = Map::new();
        initial.insert("limit".into(), json!(10));
        let mut session = Session::new(scenario(yaml), initial);

        assert_eq!(engine.run(&mut session).await, SessionState::Completed);
        assert_eq!(session.context["receipt"], json!("m-1"));
        assert_eq!(session.context["found"], json!({"count": 2}));
    }

    #[tokio::test]
    async fn retryable_failures_exhaust_budget() {
        let yaml = r#"
id: flaky
steps:
  - id: call
    kind: http_request
    params: {url: "https://example.invalid"}
    max_retries: 3
    next: $end
"#;
        let mut mock = MockHandler::new();
        mock.expect_dispatch()
            .with(always())
            .times(4)
            .returning(|_| DispatchOutcome::retryable("503"));

        let engine = interpreter(fast(), Dispatcher::single(Arc::new(mock)));
        let mut session = Session::new(scenario(yaml), Map::new());
        assert_eq!(engine.run(&mut session).await, SessionState::Escalated);
        assert_eq!(
            session.escalation.unwrap().reason,
            EscalationReason::RetriesExhausted {
                capability: CapabilityId::new("http_request"),
                attempts: 4,
                error: "503".into()
            }
        );
    }

    #[tokio::test]
    async fn fatal_failure_escalates_without_retry() {
        let yaml = "id: f\nsteps:\n  - {id: go, kind: echo, params: {a: 1}, next: $end}\n";
        let mut mock = MockHandler::new();
        mock.expect_dispatch()
            .times(1)
            .returning(|_| DispatchOutcome::fatal("malformed"));
        let engine = interpreter(fast(), Dispatcher::single(Arc::new(mock)));
        let mut session = Session::new(scenario(yaml), Map::new());
        engine.run(&mut session).await;
        let escalation = session.escalation.unwrap();
        assert!(matches!(escalation.reason, EscalationReason::DispatchFailed { .. }));
        assert_eq!(escalation.step, Some(StepId::new("go")));
    }

    #[tokio::test]
    async fn attempt_timeout_is_retryable() {
        struct Slow;
        #[async_trait]
        impl ActionHandler for Slow {
            async fn dispatch(&self, _request: DispatchRequest) -> DispatchOutcome {
                tokio::time::sleep(Duration::from_millis(500)).await;
                DispatchOutcome::ok(Map::new())
            }
        }
        let yaml = "id: t\nsteps:\n  - {id: go, kind: echo, params: {a: 1}, timeout_ms: 10, max_retries: 1, next: $end}\n";
        let engine = interpreter(fast(), Dispatcher::single(Arc::new(Slow)));
        let mut session = Session::new(scenario(yaml), Map::new());
        assert_eq!(engine.run(&mut session).await, SessionState::Escalated);
        assert!(matches!(
            session.escalation.unwrap().reason,
            EscalationReason::RetriesExhausted { attempts: 2, .. }
        ));
    }

    #[tokio::test]
    async fn missing_handler_is_fatal() {
        let yaml = "id: m\nsteps:\n  - {id: go, kind: echo, params: {a: 1}, next: $end}\n";
        let dispatcher = Dispatcher::new().route("send_message", Arc::new(EchoHandler));
        let engine = interpreter(fast(), dispatcher);
        let mut session = Session::new(scenario(yaml), Map::new());
        engine.run(&mut session).await;
        assert_eq!(
            session.escalation.unwrap().reason,
            EscalationReason::MissingHandler {
                capability: CapabilityId::new("echo")
            }
        );
    }

    #[tokio::test]
    async fn loop_without_input_is_detected() {
        let yaml = r#"
id: spin
steps:
  - {id: a, kind: echo, params: {n: 1}, next: b}
  - {id: b, kind: echo, params: {n: 2}, next: a}
"#;
        let engine = interpreter(fast(), Dispatcher::single(Arc::new(EchoHandler)));
        let mut session = Session::new(scenario(yaml), Map::new());
        assert_eq!(engine.run(&mut session).await, SessionState::Escalated);
        assert_eq!(history(&session), vec!["a", "b"]);
        assert_eq!(
            session.escalation.unwrap().reason,
            EscalationReason::LoopDetected {
                step: StepId::new("a"),
                window: 16
            }
        );
    }

    #[tokio::test]
    async fn step_budget_caps_long_loops() {
        let yaml = r#"
id: spin
steps:
  - {id: a, kind: echo, params: {n: 1}, next: b}
  - {id: b, kind: echo, params: {n: 2}, next: a}
"#;
        let config = fast().with_loop_window(0).with_max_steps_per_run(25);
        let engine = interpreter(config, Dispatcher::single(Arc::new(EchoHandler)));
        let mut session = Session::new(scenario(yaml), Map::new());
        engine.run(&mut session).await;
        assert_eq!(session.history.len(), 25);
        assert_eq!(
            session.escalation.unwrap().reason,
            EscalationReason::StepBudgetExceeded { limit: 25 }
        );
    }

    #[tokio::test]
    async fn input_pauses_and_resume_continues() {
        let yaml = r#"
id: ask
steps:
  - {id: s, kind: start, next: ask}
  - {id: ask, kind: input, variable: answer, next: check}
  - id: check
    kind: branch
    conditions:
      - {condition: "{answer} == yes", next: $end}
    default: ask
"#;
        let engine = interpreter(fast(), Dispatcher::new());
        let mut session = Session::new(scenario(yaml), Map::new());
        assert_eq!(engine.run(&mut session).await, SessionState::WaitingForInput);

        assert_eq!(
            engine.resume(&mut session, json!("no")).await.unwrap(),
            SessionState::WaitingForInput
        );
        assert_eq!(
            engine.resume(&mut session, json!("yes")).await.unwrap(),
            SessionState::Completed
        );
        assert_eq!(history(&session), vec!["s", "ask", "check", "ask", "check"]);

        let err = engine.resume(&mut session, json!("again")).await.unwrap_err();
        assert!(matches!(
            err,
            EngineError::NotAwaitingInput {
                state: SessionState::Completed,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn explicit_escalate_target() {
        let yaml = "id: e\nsteps:\n  - {id: s, kind: start, next: $escalate}\n";
        let engine = interpreter(fast(), Dispatcher::new());
        let mut session = Session::new(scenario(yaml), Map::new());
        engine.run(&mut session).await;
        assert_eq!(session.escalation.unwrap().reason, EscalationReason::Requested);
    }

    #[tokio::test]
    async fn heuristic_reference_resolved_at_dispatch() {
        let yaml = r#"
id: h
steps:
  - {id: go, kind: action, action: "Live Server", params: {port: 8080}, next: $end}
"#;
        let seen = Arc::new(std::sync::Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let handler = FnHandler::new(move |req: DispatchRequest| {
            sink.lock().unwrap().push(req.capability.to_string());
            DispatchOutcome::ok(Map::new())
        });
        let engine = interpreter(fast(), Dispatcher::single(Arc::new(handler)));
        let mut session = Session::new(scenario(yaml), Map::new());
        assert_eq!(engine.run(&mut session).await, SessionState::Completed);
        assert_eq!(*seen.lock().unwrap(), vec!["echo".to_string()]);
    }

    #[tokio::test]
    async fn session_timeout_counts_busy_time() {
        struct Slow;
        #[async_trait]
        impl ActionHandler for Slow {
            async fn dispatch(&self, _request: DispatchRequest) -> DispatchOutcome {
                tokio::time::sleep(Duration::from_millis(200)).await;
                DispatchOutcome::ok(Map::new())
            }
        }
        let yaml = "id: t\nsteps:\n  - {id: go, kind: echo, params: {a: 1}, next: $end}\n";
        let engine = interpreter(fast(), Dispatcher::single(Arc::new(Slow)));
        let mut session = Session::new(scenario(yaml), Map::new());
        session.busy = Duration::from_secs(300) - Duration::from_millis(20);
        assert_eq!(engine.run(&mut session).await, SessionState::Escalated);
        assert_eq!(
            session.escalation.unwrap().reason,
            EscalationReason::SessionTimeout { budget_secs: 300 }
        );
    }

    #[test]
    fn output_binding_map_uses_paths() {
        let mut context = Map::new();
        let mut outputs = Map::new();
        outputs.insert("user".into(), json!({"id": 7}));
        bind_outputs(
            &mut context,
            &OutputBinding::Map(vec![("uid".into(), "user.id".into()), ("x".into(), "nope".into())]),
            outputs,
        );
        assert_eq!(Value::Object(context), json!({"uid": 7}));
    }
}
