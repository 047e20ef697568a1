//! Validated scenario model
//!
//! Produced only by the loader. Kind-specific fields live inside the
//! [`StepKind`] variants, so a branch without conditions or an input step
//! without a variable cannot be represented.

use crate::condition::Condition;
use cadence_registry::CapabilityId;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::fmt;

/// Marker target that completes the session
pub const END_MARKER: &str = "$end";

/// Marker target that escalates the session
pub const ESCALATE_MARKER: &str = "$escalate";

/// Step identifier, unique within a scenario
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StepId(String);

impl StepId {
    /// Create from string
    #[inline]
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Borrow as string slice
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for StepId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for StepId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

/// Where control goes after a step
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Target {
    /// Another step
    Step(StepId),
    /// Complete the session (`$end`)
    End,
    /// Escalate the session (`$escalate`)
    Escalate,
}

impl Target {
    /// Parse a target string
    #[must_use]
    pub fn parse(text: &str) -> Self {
        match text {
            END_MARKER => Target::End,
            ESCALATE_MARKER => Target::Escalate,
            other => Target::Step(StepId::new(other)),
        }
    }

    /// Step id, if this target is a step
    #[must_use]
    pub fn step(&self) -> Option<&StepId> {
        match self {
            Target::Step(id) => Some(id),
            Target::End | Target::Escalate => None,
        }
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Target::Step(id) => f.write_str(id.as_str()),
            Target::End => f.write_str(END_MARKER),
            Target::Escalate => f.write_str(ESCALATE_MARKER),
        }
    }
}

/// How an action step named its capability
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ActionForm {
    /// `kind: action` with an `action:` field
    Field,
    /// `kind:` is the capability itself (`kind: send_message`)
    Kind,
}

/// Action step payload
#[derive(Debug, Clone, PartialEq)]
pub struct ActionSpec {
    /// Reference exactly as declared
    pub reference: String,
    /// Canonical capability when the reference matched strictly
    ///
    /// `None` means the reference must be resolved heuristically at dispatch.
    pub capability: Option<CapabilityId>,
    /// Declaration form (kept for serialization)
    pub form: ActionForm,
    /// Next step
    pub next: Target,
}

/// One `(condition, target)` pair of a branch
#[derive(Debug, Clone, PartialEq)]
pub struct ConditionalTarget {
    /// Condition evaluated against the session context
    pub condition: Condition,
    /// Target taken when the condition holds
    pub target: Target,
}

/// Kind-specific step data
#[derive(Debug, Clone, PartialEq)]
pub enum StepKind {
    /// Entry marker
    Start {
        /// Next step
        next: Target,
    },
    /// Terminal step
    End,
    /// Dispatch a capability
    Action(ActionSpec),
    /// Pause for an external value
    Input {
        /// Context variable receiving the value
        variable: String,
        /// Prompt shown to whoever supplies the value
        prompt: Option<String>,
        /// Next step
        next: Target,
    },
    /// Conditional jump
    Branch {
        /// Ordered conditions; first true wins (never empty)
        conditions: Vec<ConditionalTarget>,
        /// Taken when no condition holds
        default: Target,
    },
}

impl StepKind {
    /// Kind label as written in documents
    #[must_use]
    pub fn label(&self) -> &str {
        match self {
            StepKind::Start { .. } => "start",
            StepKind::End => "end",
            StepKind::Action(spec) => match spec.form {
                ActionForm::Field => "action",
                ActionForm::Kind => spec.reference.as_str(),
            },
            StepKind::Input { .. } => "input",
            StepKind::Branch { .. } => "branch",
        }
    }

    /// Every outgoing target, in declaration order
    #[must_use]
    pub fn targets(&self) -> Vec<&Target> {
        match self {
            StepKind::Start { next } | StepKind::Input { next, .. } => vec![next],
            StepKind::Action(spec) => vec![&spec.next],
            StepKind::End => Vec::new(),
            StepKind::Branch {
                conditions,
                default,
            } => conditions
                .iter()
                .map(|c| &c.target)
                .chain(std::iter::once(default))
                .collect(),
        }
    }

    /// Check if this is an `input` step
    #[inline]
    #[must_use]
    pub fn is_input(&self) -> bool {
        matches!(self, StepKind::Input { .. })
    }
}

/// Where a step's handler outputs go in the session context
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum OutputBinding {
    /// Merge every output key into the context as-is
    #[default]
    Merge,
    /// Store the whole output mapping under one variable
    Single(String),
    /// `context variable → output key`
    Map(Vec<(String, String)>),
}

/// A validated step
#[derive(Debug, Clone, PartialEq)]
pub struct Step {
    /// Identifier
    pub id: StepId,
    /// Kind and kind-specific fields
    pub kind: StepKind,
    /// Parameter bag (may contain placeholders)
    pub params: Map<String, Value>,
    /// Output binding
    pub output: OutputBinding,
    /// Free-text description (also used by semantic resolution)
    pub description: Option<String>,
    /// Per-step retry budget override
    pub max_retries: Option<u32>,
    /// Per-step dispatch timeout override
    pub timeout_ms: Option<u64>,
    /// Unknown keys, preserved for round-tripping
    pub extra: Map<String, Value>,
}

/// Immutable, validated scenario
#[derive(Debug, Clone, PartialEq)]
pub struct Scenario {
    pub(crate) id: String,
    pub(crate) name: Option<String>,
    pub(crate) description: Option<String>,
    pub(crate) entry: StepId,
    pub(crate) initial_context: Map<String, Value>,
    pub(crate) steps: Vec<Step>,
    pub(crate) index: HashMap<StepId, usize>,
    pub(crate) extra: Map<String, Value>,
}

impl Scenario {
    /// Scenario identifier
    #[inline]
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Optional display name
    #[inline]
    #[must_use]
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Optional description
    #[inline]
    #[must_use]
    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    /// Designated entry step
    #[inline]
    #[must_use]
    pub fn entry(&self) -> &StepId {
        &self.entry
    }

    /// Seed values for every session
    #[inline]
    #[must_use]
    pub fn initial_context(&self) -> &Map<String, Value> {
        &self.initial_context
    }

    /// Look up a step
    #[inline]
    #[must_use]
    pub fn step(&self, id: &StepId) -> Option<&Step> {
        self.index.get(id).map(|&i| &self.steps[i])
    }

    /// Steps in declaration order
    #[inline]
    #[must_use]
    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    /// Number of steps
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    /// Never true for a validated scenario
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Preserved unknown top-level keys
    #[inline]
    #[must_use]
    pub fn extra(&self) -> &Map<String, Value> {
        &self.extra
    }

    /// SHA-256 over the canonical JSON document, hex-encoded
    ///
    /// Stable across formats and key ordering; used to tie persisted
    /// sessions to the scenario version they were started with.
    #[must_use]
    pub fn fingerprint(&self) -> String {
        let canonical = crate::serialize::to_document(self).to_string();
        hex::encode(Sha256::digest(canonical.as_bytes()))
    }

    pub(crate) fn assemble(
        id: String,
        name: Option<String>,
        description: Option<String>,
        entry: StepId,
        initial_context: Map<String, Value>,
        steps: Vec<Step>,
        extra: Map<String, Value>,
    ) -> Self {
        let index = steps
            .iter()
            .enumerate()
            .map(|(i, s)| (s.id.clone(), i))
            .collect();
        Self {
            id,
            name,
            description,
            entry,
            initial_context,
            steps,
            index,
            extra,
        }
    }
}
