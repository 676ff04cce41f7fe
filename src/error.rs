//! Error types for the orchestration engine.
//!
//! A guardrail *veto* is deliberately not represented here: it is a normal,
//! user-visible outcome carried by [`PipelineResult`](crate::guardrail::PipelineResult).
//! The variants below are either system-level faults or orchestration-protocol
//! errors (the model requested something the configuration does not allow),
//! which should be rare in steady-state operation.

use thiserror::Error;

/// Result type alias for the orchestration engine.
pub type Result<T> = std::result::Result<T, OrchestrationError>;

/// Main error type for the orchestration engine.
#[derive(Debug, Error)]
pub enum OrchestrationError {
    /// A guardrail's own evaluation failed (e.g. a transient classification
    /// error). Distinct from a veto: surfaced as a system error, not a refusal.
    #[error("guardrail evaluation failed: {message}")]
    GuardrailEvaluation { message: String },

    /// The active handler requested a transfer with no edge in the handoff graph.
    #[error("illegal handoff from '{from}' to '{to}'")]
    IllegalHandoff { from: String, to: String },

    /// The model invoked an action that is unknown or not allowed for the
    /// active handler.
    #[error("unknown action '{name}'")]
    UnknownAction { name: String },

    /// A required action parameter was not supplied.
    #[error("missing required parameter '{parameter}' for action '{action}'")]
    MissingParameter { action: String, parameter: String },

    /// A domain precondition of an action did not hold (e.g. updating a seat
    /// with no train number in context).
    #[error("precondition failed: {message}")]
    PreconditionFailed { message: String },

    /// The turn looped through more model invocations than the configured cap.
    /// Indicates a likely handoff or action loop.
    #[error("orchestration limit exceeded after {max_iterations} model invocations")]
    LimitExceeded { max_iterations: usize },

    /// The model call returned an outcome shape the protocol does not recognize.
    #[error("model behavior error: {message}")]
    ModelBehavior { message: String },

    /// The active or target handler name is not registered. Configuration bug.
    #[error("unknown handler '{name}'")]
    UnknownHandler { name: String },

    /// Error from the OpenAI API.
    #[error("OpenAI API error: {0}")]
    OpenAI(#[from] async_openai::error::OpenAIError),

    /// Serialization/deserialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Other errors.
    #[error("{0}")]
    Other(String),
}
