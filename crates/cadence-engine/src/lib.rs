//! Cadence Engine - Execution State Machine
//!
//! Drives sessions through validated scenarios:
//! - Advances step by step, pausing at input steps until resumed
//! - Evaluates branch conditions with a total comparator
//! - Substitutes `{name}` placeholders before each dispatch
//! - Dispatches actions to host handlers with timeouts and bounded retries
//! - Escalates on failures, loops and exhausted budgets instead of panicking
//!
//! # Example
//!
//! ```rust,no_run
//! use cadence_engine::{Dispatcher, EchoHandler, EngineConfig, SessionManager};
//! use cadence_scenario::Format;
//! use serde_json::Map;
//! use std::sync::Arc;
//!
//! # async fn example() -> Result<(), cadence_engine::EngineError> {
//! let manager = SessionManager::new(
//!     EngineConfig::new(),
//!     Dispatcher::single(Arc::new(EchoHandler)),
//! )?;
//! manager.load_scenario(
//!     r#"{"id": "hello", "steps": [
//!         {"id": "start", "kind": "start", "next": "greet"},
//!         {"id": "greet", "kind": "send_message", "params": {"text": "hi"}, "next": "$end"}
//!     ]}"#,
//!     Format::Json,
//! )?;
//!
//! let id = manager.start("hello", Map::new()).await?;
//! println!("{}", manager.status(id).await?.state);
//! # Ok(())
//! # }
//! ```

#![warn(unreachable_pub)]

pub mod compare;
pub mod config;
pub mod context;
pub mod dispatch;
pub mod error;
pub mod machine;
pub mod manager;
pub mod session;
pub mod substitute;

pub use compare::{compare, evaluate};
pub use config::EngineConfig;
pub use dispatch::{ActionHandler, DispatchOutcome, DispatchRequest, Dispatcher, EchoHandler, FnHandler};
pub use error::EngineError;
pub use machine::{bind_outputs, Interpreter};
pub use manager::SessionManager;
pub use session::{
    Escalation, EscalationReason, Session, SessionId, SessionRecord, SessionState, SessionStatus,
};
pub use substitute::{render_template, substitute, substitute_params};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
