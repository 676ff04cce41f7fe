//! raildesk: agent routing and guardrail orchestration for a railway
//! customer-service desk.
//!
//! The crate is organized around a small set of contracts:
//!
//! - [`Handler`]: a named conversational participant with instructions,
//!   an action allow-list, and input guardrails.
//! - [`HandoffGraph`]: the legal transfers between handlers, with optional
//!   transition hooks that prepare the shared context.
//! - [`Guardrail`] and [`GuardrailPipeline`]: concurrent input screening
//!   that runs before any model invocation.
//! - [`Action`] and [`ActionRegistry`]: the invocation contract between the
//!   model and domain operations over the [`SessionContext`].
//! - [`Orchestrator`]: drives one turn at a time per [`Session`] through
//!   guardrails, model invocations, actions, and handoffs.
//!
//! Model access is abstracted behind [`ModelClient`] and [`Classifier`];
//! [`OpenAIModel`] and [`OpenAIClassifier`] are the production
//! implementations, while [`ScriptedModel`] and [`ScriptedClassifier`] back
//! the tests. The [`railway`] module wires the concrete five-handler desk.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use raildesk::{
//!     railway::railway_orchestrator, OpenAIClassifier, OpenAIModel, RandomIdSource,
//! };
//!
//! # async fn run() -> raildesk::Result<()> {
//! let orchestrator = railway_orchestrator(
//!     Arc::new(OpenAIModel::new("gpt-4o-mini")),
//!     Arc::new(OpenAIClassifier::new("gpt-4o-mini")),
//!     Box::new(RandomIdSource::new()),
//! );
//!
//! let mut session = orchestrator.create_session()?;
//! let report = orchestrator
//!     .submit_message(&mut session, "What seat am I in?")
//!     .await?;
//! println!("{:?}", report.result);
//! # Ok(())
//! # }
//! ```

pub mod action;
pub mod actions;
pub mod context;
pub mod error;
pub mod guardrail;
pub mod handler;
pub mod handoff;
pub mod ids;
pub mod items;
pub mod model;
pub mod openai;
pub mod orchestrator;
pub mod railway;

pub use action::{Action, ActionParameter, ActionRegistry, ActionSpec};
pub use actions::DISPLAY_SEAT_MAP_SENTINEL;
pub use context::SessionContext;
pub use error::{OrchestrationError, Result};
pub use guardrail::{
    Guardrail, GuardrailPipeline, GuardrailVerdict, JailbreakGuardrail, PipelineResult,
    RelevanceGuardrail,
};
pub use handler::{Handler, Instructions};
pub use handoff::{HandoffGraph, HandoffSpec, TransitionHook};
pub use ids::{IdSource, RandomIdSource};
pub use items::{ActionCall, Message, Role, TurnEvent};
pub use model::{
    Classification, Classifier, ModelClient, ModelOutcome, ModelRequest, ScriptedClassifier,
    ScriptedModel,
};
pub use openai::{OpenAIClassifier, OpenAIModel};
pub use orchestrator::{Orchestrator, Session, TurnReport, TurnResult, DEFAULT_ITERATION_LIMIT};
