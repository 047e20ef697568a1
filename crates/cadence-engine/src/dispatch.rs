//! Action dispatch contract
//!
//! The interpreter never performs I/O itself. Every action step is handed to
//! an [`ActionHandler`] routed by canonical capability id; the handler owns
//! model calls, store access and outbound messaging.

use crate::session::SessionId;
use async_trait::async_trait;
use cadence_registry::CapabilityId;
use cadence_scenario::StepId;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// One dispatch attempt
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DispatchRequest {
    /// Session issuing the request
    pub session_id: SessionId,
    /// Step being executed
    pub step_id: StepId,
    /// Resolved capability
    pub capability: CapabilityId,
    /// Parameters after placeholder substitution
    pub params: Map<String, Value>,
    /// Snapshot of the session context
    pub context: Map<String, Value>,
    /// Attempt number, starting at 1
    pub attempt: u32,
}

/// Handler result
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DispatchOutcome {
    /// Whether the action succeeded
    pub success: bool,
    /// Values to bind into the session context
    #[serde(default)]
    pub outputs: Map<String, Value>,
    /// Failure detail
    #[serde(default)]
    pub error: Option<String>,
    /// Whether a failure may succeed if retried unchanged
    #[serde(default)]
    pub retryable: bool,
}

impl DispatchOutcome {
    /// Successful outcome
    #[inline]
    #[must_use]
    pub fn ok(outputs: Map<String, Value>) -> Self {
        Self {
            success: true,
            outputs,
            error: None,
            retryable: false,
        }
    }

    /// Failure that may be retried
    #[must_use]
    pub fn retryable(error: impl Into<String>) -> Self {
        Self {
            success: false,
            outputs: Map::new(),
            error: Some(error.into()),
            retryable: true,
        }
    }

    /// Failure that must not be retried
    #[must_use]
    pub fn fatal(error: impl Into<String>) -> Self {
        Self {
            success: false,
            outputs: Map::new(),
            error: Some(error.into()),
            retryable: false,
        }
    }

    /// Error text, or a generic message for failures without one
    #[must_use]
    pub fn error_message(&self) -> String {
        self.error
            .clone()
            .unwrap_or_else(|| "handler reported failure without detail".to_string())
    }
}

/// External collaborator that performs capability invocations
#[async_trait]
pub trait ActionHandler: Send + Sync {
    /// Perform one attempt; failures are reported in the outcome
    async fn dispatch(&self, request: DispatchRequest) -> DispatchOutcome;
}

/// Adapter turning a synchronous closure into a handler
pub struct FnHandler<F>(F);

impl<F> FnHandler<F>
where
    F: Fn(DispatchRequest) -> DispatchOutcome + Send + Sync,
{
    /// Wrap a closure
    #[inline]
    #[must_use]
    pub fn new(f: F) -> Self {
        Self(f)
    }
}

#[async_trait]
impl<F> ActionHandler for FnHandler<F>
where
    F: Fn(DispatchRequest) -> DispatchOutcome + Send + Sync,
{
    async fn dispatch(&self, request: DispatchRequest) -> DispatchOutcome {
        (self.0)(request)
    }
}

impl<F> fmt::Debug for FnHandler<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("FnHandler")
    }
}

/// Returns its resolved parameters as outputs
#[derive(Debug, Clone, Copy, Default)]
pub struct EchoHandler;

#[async_trait]
impl ActionHandler for EchoHandler {
    async fn dispatch(&self, request: DispatchRequest) -> DispatchOutcome {
        tracing::debug!(
            session = %request.session_id,
            step = %request.step_id,
            capability = %request.capability,
            "echo dispatch"
        );
        DispatchOutcome::ok(request.params)
    }
}

/// Routes capabilities to handlers
#[derive(Clone, Default)]
pub struct Dispatcher {
    routes: HashMap<CapabilityId, Arc<dyn ActionHandler>>,
    fallback: Option<Arc<dyn ActionHandler>>,
}

impl Dispatcher {
    /// Create dispatcher with no routes
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Dispatcher sending everything to one handler
    #[must_use]
    pub fn single(handler: Arc<dyn ActionHandler>) -> Self {
        Self::new().with_fallback(handler)
    }

    /// Route one capability
    #[must_use]
    pub fn route(mut self, capability: impl Into<CapabilityId>, handler: Arc<dyn ActionHandler>) -> Self {
        self.routes.insert(capability.into(), handler);
        self
    }

    /// Handler for capabilities without a route
    #[must_use]
    pub fn with_fallback(mut self, handler: Arc<dyn ActionHandler>) -> Self {
        self.fallback = Some(handler);
        self
    }

    /// Handler for a capability, if any
    #[must_use]
    pub fn handler_for(&self, capability: &CapabilityId) -> Option<&Arc<dyn ActionHandler>> {
        self.routes.get(capability).or(self.fallback.as_ref())
    }

    /// Number of explicit routes
    #[inline]
    #[must_use]
    pub fn route_count(&self) -> usize {
        self.routes.len()
    }
}

impl fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut routes: Vec<&str> = self.routes.keys().map(CapabilityId::as_str).collect();
        routes.sort_unstable();
        f.debug_struct("Dispatcher")
            .field("routes", &routes)
            .field("fallback", &self.fallback.is_some())
            .finish()
    }
}
