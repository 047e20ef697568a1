//! Session manager
//!
//! Host-facing API: registers scenarios, starts and resumes sessions, and
//! exposes status views. Sessions live in a `DashMap`; each sits behind its
//! own `tokio::sync::Mutex`, so concurrent calls on one session are
//! serialized while different sessions proceed independently.

use crate::config::EngineConfig;
use crate::dispatch::Dispatcher;
use crate::error::EngineError;
use crate::machine::Interpreter;
use crate::session::{Session, SessionId, SessionRecord, SessionState, SessionStatus};
use cadence_registry::CapabilityRegistry;
use cadence_resolver::Resolver;
use cadence_scenario::{load, load_dir, Format, Scenario, Warning};
use dashmap::DashMap;
use serde_json::{Map, Value};
use std::path::Path;
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;

type SessionCell = Arc<Mutex<Session>>;

/// Owns scenarios and live sessions
#[derive(Debug)]
pub struct SessionManager {
    config: Arc<EngineConfig>,
    registry: Arc<CapabilityRegistry>,
    interpreter: Arc<Interpreter>,
    scenarios: DashMap<String, Arc<Scenario>>,
    sessions: DashMap<SessionId, SessionCell>,
}

impl SessionManager {
    /// Create manager; the registry is the built-in set plus configured aliases
    ///
    /// # Errors
    /// `EngineError::Registry` for invalid alias configuration.
    pub fn new(config: EngineConfig, dispatcher: Dispatcher) -> Result<Self, EngineError> {
        let registry = Arc::new(config.build_registry()?);
        Ok(Self::with_registry(config, registry, dispatcher))
    }

    /// Create manager over an existing registry
    #[must_use]
    pub fn with_registry(
        config: EngineConfig,
        registry: Arc<CapabilityRegistry>,
        dispatcher: Dispatcher,
    ) -> Self {
        let config = Arc::new(config);
        let interpreter = Interpreter::new(
            Arc::clone(&config),
            Resolver::new(Arc::clone(&registry)),
            Arc::new(dispatcher),
        );
        Self {
            config,
            registry,
            interpreter: Arc::new(interpreter),
            scenarios: DashMap::new(),
            sessions: DashMap::new(),
        }
    }

    /// Shared capability registry
    #[inline]
    #[must_use]
    pub fn registry(&self) -> &Arc<CapabilityRegistry> {
        &self.registry
    }

    /// Active configuration
    #[inline]
    #[must_use]
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Register a validated scenario, replacing any with the same id
    pub fn register_scenario(&self, scenario: Scenario) -> Arc<Scenario> {
        let scenario = Arc::new(scenario);
        let id = scenario.id().to_string();
        if self
            .scenarios
            .insert(id.clone(), Arc::clone(&scenario))
            .is_some()
        {
            tracing::info!(scenario = %id, "scenario replaced");
        } else {
            tracing::info!(scenario = %id, steps = scenario.len(), "scenario registered");
        }
        scenario
    }

    /// Load, validate and register scenario text
    ///
    /// # Errors
    /// `EngineError::Definition` with the full violation report.
    pub fn load_scenario(&self, raw: &str, format: Format) -> Result<Vec<Warning>, EngineError> {
        let loaded = load(raw, format, &self.registry)?;
        log_warnings(loaded.scenario.id(), &loaded.warnings);
        self.register_scenario(loaded.scenario);
        Ok(loaded.warnings)
    }

    /// Load and register every scenario file in a directory
    ///
    /// Nothing is registered if any file fails.
    ///
    /// # Errors
    /// IO or definition failure of the first bad file.
    pub fn load_scenarios_from_dir(&self, dir: &Path) -> Result<Vec<String>, EngineError> {
        let loaded = load_dir(dir, &self.registry)?;
        Ok(loaded
            .into_iter()
            .map(|l| {
                log_warnings(l.scenario.id(), &l.warnings);
                self.register_scenario(l.scenario).id().to_string()
            })
            .collect())
    }

    /// Registered scenario by id
    #[must_use]
    pub fn scenario(&self, id: &str) -> Option<Arc<Scenario>> {
        self.scenarios.get(id).map(|s| Arc::clone(s.value()))
    }

    /// Registered scenario ids (sorted)
    #[must_use]
    pub fn scenario_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.scenarios.iter().map(|e| e.key().clone()).collect();
        ids.sort();
        ids
    }

    fn create(&self, scenario_id: &str, initial: Map<String, Value>) -> Result<Session, EngineError> {
        let scenario = self
            .scenario(scenario_id)
            .ok_or_else(|| EngineError::UnknownScenario(scenario_id.to_string()))?;
        let session = Session::new(scenario, initial);
        tracing::info!(session = %session.id, scenario = scenario_id, "session started");
        Ok(session)
    }

    fn cell(&self, id: SessionId) -> Result<SessionCell, EngineError> {
        self.sessions
            .get(&id)
            .map(|c| Arc::clone(c.value()))
            .ok_or(EngineError::UnknownSession(id))
    }

    /// Start a session and drive it until it pauses or terminates
    ///
    /// # Errors
    /// `EngineError::UnknownScenario`.
    pub async fn start(&self, scenario_id: &str, initial: Map<String, Value>) -> Result<SessionId, EngineError> {
        let session = self.create(scenario_id, initial)?;
        let id = session.id;
        let cell = Arc::new(Mutex::new(session));
        let mut guard = Arc::clone(&cell).lock_owned().await;
        self.sessions.insert(id, cell);
        self.interpreter.run(&mut guard).await;
        Ok(id)
    }

    /// Start a session on its own task
    ///
    /// The session is registered (and locked by the task) before this
    /// returns, so `status` calls wait for the first run to finish.
    ///
    /// # Errors
    /// `EngineError::UnknownScenario`.
    pub async fn spawn(
        &self,
        scenario_id: &str,
        initial: Map<String, Value>,
    ) -> Result<(SessionId, JoinHandle<SessionStatus>), EngineError> {
        let session = self.create(scenario_id, initial)?;
        let id = session.id;
        let cell = Arc::new(Mutex::new(session));
        let mut guard = Arc::clone(&cell).lock_owned().await;
        self.sessions.insert(id, cell);

        let interpreter = Arc::clone(&self.interpreter);
        let redact = self.config.redact_keys.clone();
        let handle = tokio::spawn(async move {
            interpreter.run(&mut guard).await;
            guard.status(&redact)
        });
        Ok((id, handle))
    }

    /// Supply the value an input step is waiting for
    ///
    /// # Errors
    /// - `EngineError::UnknownSession`
    /// - `EngineError::NotAwaitingInput` if the session is not paused (also
    ///   what the losing caller of two concurrent resumes observes)
    pub async fn resume(&self, id: SessionId, value: Value) -> Result<SessionStatus, EngineError> {
        let cell = self.cell(id)?;
        let mut session = cell.lock().await;
        self.interpreter.resume(&mut session, value).await?;
        Ok(session.status(&self.config.redact_keys))
    }

    /// Status with sensitive context keys redacted
    ///
    /// # Errors
    /// `EngineError::UnknownSession`.
    pub async fn status(&self, id: SessionId) -> Result<SessionStatus, EngineError> {
        let cell = self.cell(id)?;
        let session = cell.lock().await;
        Ok(session.status(&self.config.redact_keys))
    }

    /// Full, unredacted record for persistence
    ///
    /// # Errors
    /// `EngineError::UnknownSession`.
    pub async fn snapshot(&self, id: SessionId) -> Result<SessionRecord, EngineError> {
        let cell = self.cell(id)?;
        let session = cell.lock().await;
        Ok(session.to_record())
    }

    /// Re-create a session from a record
    ///
    /// An existing session with the same id is replaced.
    ///
    /// # Errors
    /// - `EngineError::UnknownScenario` if the scenario is not registered
    /// - `EngineError::FingerprintMismatch` if it changed since the record
    pub fn restore(&self, record: SessionRecord) -> Result<SessionId, EngineError> {
        let scenario = self
            .scenario(&record.scenario_id)
            .ok_or_else(|| EngineError::UnknownScenario(record.scenario_id.clone()))?;
        let expected = scenario.fingerprint();
        if expected != record.fingerprint {
            return Err(EngineError::FingerprintMismatch {
                scenario: record.scenario_id,
                expected,
                found: record.fingerprint,
            });
        }
        let session = Session::from_record(record, scenario);
        let id = session.id;
        tracing::info!(session = %id, state = %session.state, "session restored");
        self.sessions.insert(id, Arc::new(Mutex::new(session)));
        Ok(id)
    }

    /// Drop a session; returns whether it existed
    pub fn remove(&self, id: SessionId) -> bool {
        self.sessions.remove(&id).is_some()
    }

    /// Drop every completed or escalated session not currently locked
    ///
    /// Returns the number removed.
    pub fn prune_finished(&self) -> usize {
        let before = self.sessions.len();
        self.sessions
            .retain(|_, cell| !cell.try_lock().is_ok_and(|session| session.state.is_terminal()));
        let removed = before.saturating_sub(self.sessions.len());
        if removed > 0 {
            tracing::debug!(removed, "pruned finished sessions");
        }
        removed
    }

    /// Number of tracked sessions
    #[inline]
    #[must_use]
    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }

    /// Ids of sessions in `state` (sessions busy being driven are skipped)
    #[must_use]
    pub fn sessions_in(&self, state: SessionState) -> Vec<SessionId> {
        let mut ids: Vec<SessionId> = self
            .sessions
            .iter()
            .filter(|e| e.value().try_lock().is_ok_and(|s| s.state == state))
            .map(|e| *e.key())
            .collect();
        ids.sort();
        ids
    }
}

fn log_warnings(scenario: &str, warnings: &[Warning]) {
    for warning in warnings {
        tracing::warn!(scenario, %warning, "scenario warning");
    }
}
