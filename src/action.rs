//! Action registry and invocation contract.
//!
//! Actions are the named, side-effecting operations a handler may invoke
//! mid-turn. Each declares its parameters; the registry validates the
//! allow-list and required parameters before any executor runs, so executors
//! only deal with domain preconditions. All parameters in this domain are
//! strings.

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;
use std::fmt::Debug;
use std::sync::Arc;

use crate::context::SessionContext;
use crate::error::{OrchestrationError, Result};

/// A single declared parameter of an action.
#[derive(Debug, Clone)]
pub struct ActionParameter {
    pub name: &'static str,
    pub description: &'static str,
    pub required: bool,
}

impl ActionParameter {
    pub fn required(name: &'static str, description: &'static str) -> Self {
        Self {
            name,
            description,
            required: true,
        }
    }

    pub fn optional(name: &'static str, description: &'static str) -> Self {
        Self {
            name,
            description,
            required: false,
        }
    }
}

/// What the model sees about an action: name, when to use it, and the
/// JSON schema of its parameters.
#[derive(Debug, Clone, Serialize)]
pub struct ActionSpec {
    pub name: String,
    pub description: String,
    pub parameters: Value,
}

/// A callable, possibly side-effecting operation a handler may invoke.
///
/// Executors may mutate the session context and may fail with
/// `PreconditionFailed` when a required contextual fact is absent. A
/// successful execution returns the result string appended to the
/// conversation history.
#[async_trait]
pub trait Action: Send + Sync + Debug {
    fn name(&self) -> &str;

    /// Used by the model call to decide when to invoke the action.
    fn description(&self) -> &str;

    fn parameters(&self) -> Vec<ActionParameter>;

    /// Runs the action against the shared context.
    ///
    /// Cancellation contract: perform all awaits before the first context
    /// mutation. A caller may drop the turn future while an executor is
    /// suspended, tearing it down; an executor that mutates only after its
    /// last await either has not touched the context yet or has already
    /// finished every mutation, so the context is never left partially
    /// updated.
    async fn execute(&self, context: &mut SessionContext, arguments: &Value) -> Result<String>;

    /// The advertised spec, built from the declared parameters.
    fn spec(&self) -> ActionSpec {
        let params = self.parameters();
        let mut properties = serde_json::Map::new();
        let mut required = Vec::new();
        for p in &params {
            properties.insert(
                p.name.to_string(),
                serde_json::json!({"type": "string", "description": p.description}),
            );
            if p.required {
                required.push(Value::String(p.name.to_string()));
            }
        }
        ActionSpec {
            name: self.name().to_string(),
            description: self.description().to_string(),
            parameters: serde_json::json!({
                "type": "object",
                "properties": properties,
                "required": required,
            }),
        }
    }
}

/// Reads a string argument, distinguishing absent from present.
pub(crate) fn string_argument(arguments: &Value, name: &str) -> Option<String> {
    arguments
        .get(name)
        .and_then(|v| v.as_str())
        .map(|s| s.to_string())
}

/// Named lookup table of every action known to the orchestrator.
///
/// Shared, read-only configuration: built once at startup, consulted on every
/// invocation.
#[derive(Debug, Default)]
pub struct ActionRegistry {
    actions: HashMap<String, Arc<dyn Action>>,
}

impl ActionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, action: Arc<dyn Action>) {
        self.actions.insert(action.name().to_string(), action);
    }

    /// Specs for the actions in `allowed`, preserving the handler's order.
    pub fn specs_for(&self, allowed: &[String]) -> Vec<ActionSpec> {
        allowed
            .iter()
            .filter_map(|name| self.actions.get(name))
            .map(|action| action.spec())
            .collect()
    }

    /// Validates and executes one action invocation.
    ///
    /// Fails with `UnknownAction` when the action is unregistered or not in
    /// the active handler's allow-list, and with `MissingParameter` when a
    /// required parameter is absent. Executor failures propagate as-is;
    /// whatever the executor mutated before failing stays mutated.
    pub async fn invoke(
        &self,
        name: &str,
        allowed: &[String],
        context: &mut SessionContext,
        arguments: &Value,
    ) -> Result<String> {
        if !allowed.iter().any(|a| a == name) {
            return Err(OrchestrationError::UnknownAction {
                name: name.to_string(),
            });
        }
        let action = self
            .actions
            .get(name)
            .ok_or_else(|| OrchestrationError::UnknownAction {
                name: name.to_string(),
            })?;

        for param in action.parameters() {
            if param.required && string_argument(arguments, param.name).is_none() {
                return Err(OrchestrationError::MissingParameter {
                    action: name.to_string(),
                    parameter: param.name.to_string(),
                });
            }
        }

        action.execute(context, arguments).await
    }
}
