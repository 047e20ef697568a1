//! Definition errors and validation reports
//!
//! Validation never stops at the first problem: every violation found in a
//! pass is collected into a [`ValidationReport`] so a scenario author gets
//! the complete list at once.

use std::fmt;
use std::path::PathBuf;

/// A structural problem that prevents a scenario from loading
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Violation {
    /// Document root is not a mapping
    #[error("scenario document must be a mapping")]
    NotAMapping,

    /// Top-level `id` missing or empty
    #[error("scenario is missing a non-empty 'id'")]
    MissingId,

    /// Top-level `steps` missing
    #[error("scenario is missing 'steps'")]
    MissingSteps,

    /// `steps` present but not a sequence
    #[error("'steps' must be a sequence")]
    StepsNotASequence,

    /// `steps` is an empty sequence
    #[error("'steps' must not be empty")]
    EmptySteps,

    /// A field has the wrong shape
    #[error("{location}: field '{field}' must be {expected}")]
    InvalidField {
        /// `scenario` or step label
        location: String,
        /// Field name
        field: String,
        /// Expected shape
        expected: String,
    },

    /// A step entry is not a mapping
    #[error("step #{index} must be a mapping")]
    StepNotAMapping {
        /// Position in `steps`
        index: usize,
    },

    /// Step without `id`
    #[error("step #{index} is missing a non-empty 'id'")]
    MissingStepId {
        /// Position in `steps`
        index: usize,
    },

    /// Step id uses the reserved `$` prefix
    #[error("step id '{id}' is reserved ('$' prefix is used by terminal markers)")]
    ReservedStepId {
        /// Offending id
        id: String,
    },

    /// Step without `kind`
    #[error("step '{step}' is missing 'kind'")]
    MissingKind {
        /// Step label
        step: String,
    },

    /// `kind` is neither built-in nor a known capability
    #[error("step '{step}' has unknown kind '{kind}'")]
    UnknownKind {
        /// Step label
        step: String,
        /// Declared kind
        kind: String,
    },

    /// Kind-specific required field missing
    #[error("step '{step}' ({kind}) is missing required field '{field}'")]
    MissingField {
        /// Step label
        step: String,
        /// Step kind
        kind: String,
        /// Field name
        field: String,
    },

    /// Branch with no conditioned targets
    #[error("branch step '{step}' needs at least one conditioned target")]
    BranchWithoutConditions {
        /// Step label
        step: String,
    },

    /// Condition text could not be parsed
    #[error("step '{step}' condition #{index}: {reason}")]
    InvalidCondition {
        /// Step label
        step: String,
        /// Position in `conditions`
        index: usize,
        /// Parser message
        reason: String,
    },

    /// Same id used by several steps
    #[error("step id '{id}' is used {count} times")]
    DuplicateStepId {
        /// Duplicated id
        id: String,
        /// Number of occurrences
        count: usize,
    },

    /// `next`/branch target does not exist
    #[error("step '{step}' references unknown target '{target}'")]
    UnknownTarget {
        /// Step label
        step: String,
        /// Missing target
        target: String,
    },

    /// Top-level `entry` does not exist
    #[error("entry '{entry}' does not name a step")]
    UnknownEntry {
        /// Declared entry
        entry: String,
    },

    /// Several `start` steps and no explicit `entry`
    #[error("multiple start steps ({}) and no 'entry' to choose between them", .steps.join(", "))]
    MultipleStartSteps {
        /// Start step ids
        steps: Vec<String>,
    },
}

/// A non-fatal observation about a valid scenario
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Warning {
    /// Non-start/end step with no parameters
    #[error("step '{step}' has no parameters")]
    EmptyParams {
        /// Step id
        step: String,
    },

    /// Action reference matched no capability strictly
    #[error("step '{step}' action '{reference}' will be resolved heuristically at dispatch")]
    HeuristicAction {
        /// Step id
        step: String,
        /// Declared reference
        reference: String,
    },

    /// Step cannot be reached from the entry
    #[error("step '{step}' is unreachable from the entry step")]
    Unreachable {
        /// Step id
        step: String,
    },

    /// Cycle with no `input` step; a session entering it will escalate
    #[error("cycle without an input step: {}", .steps.join(" -> "))]
    CycleWithoutInput {
        /// Step ids in the cycle (sorted)
        steps: Vec<String>,
    },
}

/// Every violation and warning found in one validation pass
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationReport {
    /// Fatal problems
    pub violations: Vec<Violation>,
    /// Non-fatal observations
    pub warnings: Vec<Warning>,
}

impl ValidationReport {
    /// Check if the report contains no violations
    #[inline]
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.violations.is_empty()
    }
}

impl fmt::Display for ValidationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} violation(s)", self.violations.len())?;
        for v in &self.violations {
            write!(f, "\n  - {v}")?;
        }
        if !self.warnings.is_empty() {
            write!(f, "\n{} warning(s)", self.warnings.len())?;
            for w in &self.warnings {
                write!(f, "\n  - {w}")?;
            }
        }
        Ok(())
    }
}

/// Scenario could not be loaded; never partially accepted
#[derive(Debug, thiserror::Error)]
pub enum DefinitionError {
    /// Text is not valid JSON/YAML
    #[error("{format} syntax error: {message}")]
    Syntax {
        /// Format that was being parsed
        format: String,
        /// Parser message
        message: String,
    },

    /// Document parsed but failed validation
    #[error("scenario '{}' is invalid: {report}", .scenario.as_deref().unwrap_or("<unknown>"))]
    Invalid {
        /// Scenario id, when one could be read
        scenario: Option<String>,
        /// Full report
        report: ValidationReport,
    },

    /// Scenario could not be rendered
    #[error("failed to serialize scenario as {format}: {message}")]
    Serialize {
        /// Target format
        format: String,
        /// Serializer message
        message: String,
    },

    /// File extension not recognised
    #[error("cannot infer scenario format from {0}")]
    UnknownFormat(PathBuf),

    /// IO error reading a scenario file
    #[error("io error reading {path}: {source}")]
    Io {
        /// File path
        path: PathBuf,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },
}

impl DefinitionError {
    /// Violations, if this is a validation failure
    #[must_use]
    pub fn violations(&self) -> &[Violation] {
        match self {
            DefinitionError::Invalid { report, .. } => &report.violations,
            _ => &[],
        }
    }
}
