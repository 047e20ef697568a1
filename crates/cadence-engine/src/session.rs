//! Sessions: one live execution of a scenario
//!
//! A [`Session`] is owned by whoever drives it (the interpreter, under the
//! manager's per-session lock). [`SessionRecord`] is its serializable form
//! for persistence; [`SessionStatus`] is the view handed to external
//! callers.

use crate::context;
use cadence_registry::CapabilityId;
use cadence_scenario::{Scenario, StepId, StepKind};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use ulid::Ulid;

/// Unique session identifier (ULID, sortable by creation time)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(Ulid);

impl SessionId {
    /// Generate a new id
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self(Ulid::new())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for SessionId {
    type Err = ulid::DecodeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ulid::from_string(s).map(Self)
    }
}

/// Lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SessionState {
    /// Executing steps
    Running,
    /// Paused at an `input` step
    WaitingForInput,
    /// Reached an `end` step or `$end`
    Completed,
    /// Stopped; needs external intervention
    Escalated,
}

impl SessionState {
    /// Check if no further transition is possible
    #[inline]
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, SessionState::Completed | SessionState::Escalated)
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            SessionState::Running => "running",
            SessionState::WaitingForInput => "waiting-for-input",
            SessionState::Completed => "completed",
            SessionState::Escalated => "escalated",
        })
    }
}

/// Why a session escalated
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EscalationReason {
    /// Handler reported a non-retryable failure
    #[error("dispatch of '{capability}' failed: {error}")]
    DispatchFailed {
        /// Capability dispatched
        capability: CapabilityId,
        /// Handler error
        error: String,
    },

    /// Every attempt failed with a retryable error
    #[error("dispatch of '{capability}' failed after {attempts} attempt(s): {error}")]
    RetriesExhausted {
        /// Capability dispatched
        capability: CapabilityId,
        /// Attempts made
        attempts: u32,
        /// Last error
        error: String,
    },

    /// No handler routed for the capability
    #[error("no handler for capability '{capability}'")]
    MissingHandler {
        /// Capability without a route
        capability: CapabilityId,
    },

    /// Step re-entered within the loop window without an intervening input
    #[error("loop detected: step '{step}' revisited within the last {window} steps")]
    LoopDetected {
        /// Step entered twice
        step: StepId,
        /// Window inspected
        window: usize,
    },

    /// Explicit `$escalate` target
    #[error("escalation requested by the scenario")]
    Requested,

    /// Session busy-time budget exhausted
    #[error("session timed out after {budget_secs}s of execution")]
    SessionTimeout {
        /// Budget in seconds
        budget_secs: u64,
    },

    /// Per-run step budget exhausted
    #[error("run exceeded {limit} steps")]
    StepBudgetExceeded {
        /// Budget
        limit: usize,
    },

    /// Current step is not part of the scenario
    #[error("unknown step '{step}'")]
    UnknownStep {
        /// Missing step id
        step: StepId,
    },
}

/// Terminal escalation details
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Escalation {
    /// Cause
    pub reason: EscalationReason,
    /// Step being executed when it happened
    pub step: Option<StepId>,
    /// When it happened
    pub at: DateTime<Utc>,
}

/// A live scenario execution
#[derive(Debug, Clone)]
pub struct Session {
    /// Identifier
    pub id: SessionId,
    /// Scenario being executed (shared, immutable)
    pub scenario: Arc<Scenario>,
    /// Lifecycle state
    pub state: SessionState,
    /// Step to execute next, paused at, or last executed when terminal
    pub current: Option<StepId>,
    /// Accumulated variables
    pub context: Map<String, Value>,
    /// Every step entered, in order
    pub history: Vec<StepId>,
    /// History index just past the most recent input step
    pub since_input: usize,
    /// Set once escalated
    pub escalation: Option<Escalation>,
    /// Time spent being driven
    pub busy: Duration,
    /// Creation time
    pub created_at: DateTime<Utc>,
    /// Last state change
    pub updated_at: DateTime<Utc>,
}

impl Session {
    /// New running session at the scenario entry
    ///
    /// `initial` overrides the scenario's own initial context key by key.
    #[must_use]
    pub fn new(scenario: Arc<Scenario>, initial: Map<String, Value>) -> Self {
        let mut context = scenario.initial_context().clone();
        context.extend(initial);
        let now = Utc::now();
        Self {
            id: SessionId::new(),
            current: Some(scenario.entry().clone()),
            scenario,
            state: SessionState::Running,
            context,
            history: Vec::new(),
            since_input: 0,
            escalation: None,
            busy: Duration::ZERO,
            created_at: now,
            updated_at: now,
        }
    }

    /// Rebuild from a record; the caller checks the fingerprint
    #[must_use]
    pub fn from_record(record: SessionRecord, scenario: Arc<Scenario>) -> Self {
        Self {
            id: record.id,
            scenario,
            state: record.state,
            current: record.current,
            context: record.context,
            history: record.history,
            since_input: record.since_input,
            escalation: record.escalation,
            busy: Duration::from_millis(record.busy_ms),
            created_at: record.created_at,
            updated_at: record.updated_at,
        }
    }

    /// Serializable snapshot
    #[must_use]
    pub fn to_record(&self) -> SessionRecord {
        SessionRecord {
            id: self.id,
            scenario_id: self.scenario.id().to_string(),
            fingerprint: self.scenario.fingerprint(),
            state: self.state,
            current: self.current.clone(),
            context: self.context.clone(),
            history: self.history.clone(),
            since_input: self.since_input,
            escalation: self.escalation.clone(),
            busy_ms: u64::try_from(self.busy.as_millis()).unwrap_or(u64::MAX),
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }

    /// External view with the given context keys masked
    #[must_use]
    pub fn status(&self, redact_keys: &[String]) -> SessionStatus {
        let (awaiting, prompt) = match (&self.state, self.current_step().map(|s| &s.kind)) {
            (
                SessionState::WaitingForInput,
                Some(StepKind::Input {
                    variable, prompt, ..
                }),
            ) => (Some(variable.clone()), prompt.clone()),
            _ => (None, None),
        };
        SessionStatus {
            session_id: self.id,
            scenario_id: self.scenario.id().to_string(),
            state: self.state,
            current_step: self.current.clone(),
            awaiting,
            prompt,
            context: context::redact(&self.context, redact_keys),
            history: self.history.clone(),
            escalation: self.escalation.clone(),
        }
    }

    /// The step `current` points at
    #[must_use]
    pub fn current_step(&self) -> Option<&cadence_scenario::Step> {
        self.current.as_ref().and_then(|id| self.scenario.step(id))
    }

    pub(crate) fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

/// Persistable session state
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionRecord {
    /// Session id
    pub id: SessionId,
    /// Scenario id
    pub scenario_id: String,
    /// Fingerprint of the scenario the session ran against
    pub fingerprint: String,
    /// Lifecycle state
    pub state: SessionState,
    /// Current step
    pub current: Option<StepId>,
    /// Full, unredacted context
    pub context: Map<String, Value>,
    /// Step history
    pub history: Vec<StepId>,
    /// Loop-detection cursor
    pub since_input: usize,
    /// Escalation details
    pub escalation: Option<Escalation>,
    /// Busy time consumed
    pub busy_ms: u64,
    /// Creation time
    pub created_at: DateTime<Utc>,
    /// Last state change
    pub updated_at: DateTime<Utc>,
}

/// Session view for external callers
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionStatus {
    /// Session id
    pub session_id: SessionId,
    /// Scenario id
    pub scenario_id: String,
    /// Lifecycle state
    pub state: SessionState,
    /// Current step
    pub current_step: Option<StepId>,
    /// Variable an input step is waiting for
    pub awaiting: Option<String>,
    /// Prompt of that input step
    pub prompt: Option<String>,
    /// Context, possibly redacted
    pub context: Map<String, Value>,
    /// Step history
    pub history: Vec<StepId>,
    /// Escalation details
    pub escalation: Option<Escalation>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use cadence_registry::CapabilityRegistry;
    use cadence_scenario::{load, Format};
    use serde_json::json;

    fn scenario() -> Arc<Scenario> {
        let doc = r#"{"id": "s", "initial_context": {"lang": "en", "tier": "free"}, "steps": [
            {"id": "ask", "kind": "input", "variable": "name", "prompt": "Name?", "next": "$end"}
        ]}"#;
        Arc::new(
            load(doc, Format::Json, &CapabilityRegistry::with_defaults())
                .unwrap()
                .scenario,
        )
    }

    #[test]
    fn session_id_parses_back() {
        let id = SessionId::new();
        assert_eq!(id.to_string().parse::<SessionId>().unwrap(), id);
        assert!("not-a-ulid".parse::<SessionId>().is_err());
    }

    #[test]
    fn initial_context_is_overridden_key_by_key() {
        let mut initial = Map::new();
        initial.insert("tier".into(), json!("gold"));
        let session = Session::new(scenario(), initial);
        assert_eq!(session.context.get("lang"), Some(&json!("en")));
        assert_eq!(session.context.get("tier"), Some(&json!("gold")));
        assert_eq!(session.current.as_ref().map(StepId::as_str), Some("ask"));
        assert_eq!(session.state, SessionState::Running);
    }

    #[test]
    fn status_reports_awaited_variable() {
        let mut session = Session::new(scenario(), Map::new());
        session.state = SessionState::WaitingForInput;
        let status = session.status(&[]);
        assert_eq!(status.awaiting.as_deref(), Some("name"));
        assert_eq!(status.prompt.as_deref(), Some("Name?"));
    }

    #[test]
    fn record_round_trip() {
        let mut session = Session::new(scenario(), Map::new());
        session.history.push(StepId::new("ask"));
        session.busy = Duration::from_millis(42);
        let record = session.to_record();
        let json = serde_json::to_string(&record).unwrap();
        let back: SessionRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(back, record);

        let restored = Session::from_record(back, scenario());
        assert_eq!(restored.id, session.id);
        assert_eq!(restored.history, session.history);
        assert_eq!(restored.busy, Duration::from_millis(42));
    }

    #[test]
    fn states_serialize_kebab_case() {
        assert_eq!(
            serde_json::to_value(SessionState::WaitingForInput).unwrap(),
            json!("waiting-for-input")
        );
        assert!(SessionState::Escalated.is_terminal());
        assert!(!SessionState::WaitingForInput.is_terminal());
    }
}
