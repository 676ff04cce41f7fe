//! Handlers: the named participants a conversation is routed between.
//!
//! A handler is static configuration: a name, instructions (possibly templated
//! from the live session context), the ordered allow-list of actions it may
//! invoke, a description shown to other handlers deciding whether to transfer
//! to it, and the guardrails filtering its input. The legal outbound transfers
//! live in the [`HandoffGraph`](crate::handoff::HandoffGraph), not on the
//! handler itself.

use std::sync::Arc;

use crate::context::SessionContext;
use crate::guardrail::Guardrail;

/// Instruction source for a handler.
///
/// Dynamic instructions are a pure function of the context and are re-rendered
/// before every model invocation, since an action or transition hook earlier
/// in the same turn may have changed the context. Caching the rendered string
/// would reintroduce the stale-instruction bug this design avoids.
#[derive(Clone)]
pub enum Instructions {
    Static(String),
    Dynamic(Arc<dyn Fn(&SessionContext) -> String + Send + Sync>),
}

impl Instructions {
    pub fn render(&self, context: &SessionContext) -> String {
        match self {
            Instructions::Static(text) => text.clone(),
            Instructions::Dynamic(template) => template(context),
        }
    }
}

impl std::fmt::Debug for Instructions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Instructions::Static(text) => f.debug_tuple("Static").field(text).finish(),
            Instructions::Dynamic(_) => f.debug_tuple("Dynamic").field(&"<fn>").finish(),
        }
    }
}

/// A named conversational participant.
#[derive(Clone)]
pub struct Handler {
    name: String,
    /// Shown to other handlers when this handler is a transfer target.
    public_description: String,
    instructions: Instructions,
    actions: Vec<String>,
    guardrails: Vec<Arc<dyn Guardrail>>,
}

impl Handler {
    pub fn new(
        name: impl Into<String>,
        public_description: impl Into<String>,
        instructions: Instructions,
    ) -> Self {
        Self {
            name: name.into(),
            public_description: public_description.into(),
            instructions,
            actions: Vec::new(),
            guardrails: Vec::new(),
        }
    }

    /// Convenience constructor for fixed-instruction handlers.
    pub fn with_static_instructions(
        name: impl Into<String>,
        public_description: impl Into<String>,
        instructions: impl Into<String>,
    ) -> Self {
        Self::new(
            name,
            public_description,
            Instructions::Static(instructions.into()),
        )
    }

    /// Allows an action, appended in order.
    pub fn with_action(mut self, name: impl Into<String>) -> Self {
        self.actions.push(name.into());
        self
    }

    /// Adds an input guardrail.
    pub fn with_guardrail(mut self, guardrail: Arc<dyn Guardrail>) -> Self {
        self.guardrails.push(guardrail);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn public_description(&self) -> &str {
        &self.public_description
    }

    /// Renders this handler's instructions against the current context.
    pub fn instructions(&self, context: &SessionContext) -> String {
        self.instructions.render(context)
    }

    /// Names of the actions this handler may invoke, in order.
    pub fn allowed_actions(&self) -> &[String] {
        &self.actions
    }

    pub fn guardrails(&self) -> &[Arc<dyn Guardrail>] {
        &self.guardrails
    }
}

impl std::fmt::Debug for Handler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Handler")
            .field("name", &self.name)
            .field("actions", &self.actions)
            .field("guardrails", &self.guardrails.len())
            .finish()
    }
}
