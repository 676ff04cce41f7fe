//! Handoff graph and transition hooks.
//!
//! Handlers form a directed graph of legal conversation transfers. The graph
//! is name-indexed adjacency built once at startup; handlers never hold
//! references to each other, so cyclic (here: complete) graphs cost nothing.
//! An edge may carry a transition hook that runs exactly once when the
//! handoff is accepted, before the target handler's instructions are
//! rendered. Hooks only fill context fields that are still absent, so
//! re-running one against an already-populated context is harmless.

use std::collections::HashMap;
use std::sync::Arc;

use crate::context::SessionContext;
use crate::error::{OrchestrationError, Result};
use crate::ids::IdSource;

/// Mutates the context at the moment a handoff is accepted.
pub type TransitionHook = Arc<dyn Fn(&mut SessionContext, &mut dyn IdSource) + Send + Sync>;

/// What the model sees about a legal transfer target.
#[derive(Debug, Clone)]
pub struct HandoffSpec {
    pub target: String,
    pub description: String,
}

struct HandoffEdge {
    target: String,
    hook: Option<TransitionHook>,
}

/// Directed graph of legal handoffs, keyed by handler name.
#[derive(Default)]
pub struct HandoffGraph {
    edges: HashMap<String, Vec<HandoffEdge>>,
}

impl HandoffGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declares `source -> target` as a legal transfer.
    pub fn add_edge(&mut self, source: &str, target: &str) {
        self.edges
            .entry(source.to_string())
            .or_default()
            .push(HandoffEdge {
                target: target.to_string(),
                hook: None,
            });
    }

    /// Declares `source -> target` with a transition hook run on acceptance.
    pub fn add_edge_with_hook(&mut self, source: &str, target: &str, hook: TransitionHook) {
        self.edges
            .entry(source.to_string())
            .or_default()
            .push(HandoffEdge {
                target: target.to_string(),
                hook: Some(hook),
            });
    }

    pub fn can_handoff(&self, source: &str, target: &str) -> bool {
        self.edge(source, target).is_some()
    }

    /// Legal target names out of `source`, in declaration order.
    pub fn targets(&self, source: &str) -> Vec<&str> {
        self.edges
            .get(source)
            .map(|edges| edges.iter().map(|e| e.target.as_str()).collect())
            .unwrap_or_default()
    }

    /// Accepts a requested transfer, running the edge's transition hook.
    ///
    /// Fails with `IllegalHandoff` when no `source -> target` edge exists;
    /// the caller must not switch the active handler in that case.
    pub fn accept(
        &self,
        source: &str,
        target: &str,
        context: &mut SessionContext,
        ids: &mut dyn IdSource,
    ) -> Result<()> {
        let edge = self
            .edge(source, target)
            .ok_or_else(|| OrchestrationError::IllegalHandoff {
                from: source.to_string(),
                to: target.to_string(),
            })?;
        if let Some(hook) = &edge.hook {
            hook(context, ids);
        }
        Ok(())
    }

    fn edge(&self, source: &str, target: &str) -> Option<&HandoffEdge> {
        self.edges
            .get(source)?
            .iter()
            .find(|e| e.target == target)
    }
}
