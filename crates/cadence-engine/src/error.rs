//! Engine error types
//!
//! Runtime failures inside a session (dispatch failures, loops, timeouts)
//! never surface here: they become an [`EscalationReason`] on the session.
//! [`EngineError`] covers misuse of the host API and configuration problems.
//!
//! [`EscalationReason`]: crate::session::EscalationReason

use crate::session::{SessionId, SessionState};
use cadence_registry::RegistryError;
use cadence_scenario::DefinitionError;
use std::path::PathBuf;

/// Host-facing engine error
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// No scenario registered under this id
    #[error("unknown scenario '{0}'")]
    UnknownScenario(String),

    /// No session with this id
    #[error("unknown session {0}")]
    UnknownSession(SessionId),

    /// `resume` called on a session that is not paused at an input step
    #[error("session {session} is not awaiting input (state: {state})")]
    NotAwaitingInput {
        /// Session
        session: SessionId,
        /// Actual state
        state: SessionState,
    },

    /// Restored record was produced by a different scenario version
    #[error("scenario '{scenario}' has changed since the session was recorded")]
    FingerprintMismatch {
        /// Scenario id
        scenario: String,
        /// Fingerprint of the registered scenario
        expected: String,
        /// Fingerprint stored in the record
        found: String,
    },

    /// Scenario failed to load
    #[error(transparent)]
    Definition(#[from] DefinitionError),

    /// Capability registry could not be built (bad alias configuration)
    #[error("registry error: {0}")]
    Registry(#[from] RegistryError),

    /// Configuration text is invalid
    #[error("configuration error: {0}")]
    Config(String),

    /// Configuration file could not be read
    #[error("io error reading {path}: {source}")]
    Io {
        /// File path
        path: PathBuf,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },
}

impl EngineError {
    /// Check if the error was caused by the caller rather than the engine
    #[inline]
    #[must_use]
    pub fn is_caller_error(&self) -> bool {
        matches!(
            self,
            EngineError::UnknownScenario(_)
                | EngineError::UnknownSession(_)
                | EngineError::NotAwaitingInput { .. }
                | EngineError::FingerprintMismatch { .. }
        )
    }
}
