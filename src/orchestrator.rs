//! The orchestrator: one conversational turn, end to end.
//!
//! A turn moves through a small state machine: guardrail check, then a loop of
//! model invocations whose discriminated outcome either finishes the turn
//! (final answer), executes an action and feeds its result back, or accepts a
//! handoff and continues with the new handler. The loop is capped; exceeding
//! the cap is a fatal turn error since it almost always means the model is
//! stuck in an action or handoff cycle.
//!
//! Concurrency model: a session is processed by at most one turn at a time,
//! enforced by `submit_message` taking `&mut Session`; the context is
//! exclusively owned by the running turn, so no locking is needed inside a
//! session. Handlers, the handoff graph, and the action registry are
//! read-only configuration shared freely across sessions. If the caller
//! cancels a turn by dropping its future, no further iterations are
//! scheduled and a suspended action executor is torn down; executors mutate
//! the context only after their last await (see [`Action`]), so a dropped
//! turn leaves the context either untouched by the in-flight invocation or
//! fully updated, never in between. Fatal errors leave the context in
//! whatever state the turn reached; completed action mutations are not
//! rolled back.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use serde::Serialize;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::action::{Action, ActionRegistry};
use crate::context::SessionContext;
use crate::error::{OrchestrationError, Result};
use crate::guardrail::{GuardrailPipeline, PipelineResult};
use crate::handler::Handler;
use crate::handoff::{HandoffGraph, HandoffSpec};
use crate::ids::IdSource;
use crate::items::{events_to_messages, TurnEvent};
use crate::model::{ModelClient, ModelOutcome, ModelRequest};

/// Default cap on model invocations within a single turn.
pub const DEFAULT_ITERATION_LIMIT: usize = 10;

const REFUSAL_MESSAGE: &str = "Sorry, I can only help with railway travel questions.";

/// One customer conversation: context, history, and the handler that
/// currently owns it.
#[derive(Debug)]
pub struct Session {
    pub id: Uuid,
    context: SessionContext,
    active_handler: String,
    history: Vec<TurnEvent>,
}

impl Session {
    /// Read-only view of the shared context. Mutation happens only through
    /// action executors and handoff transition hooks.
    pub fn context(&self) -> &SessionContext {
        &self.context
    }

    /// The handler currently owning the conversation. Changes only through
    /// accepted handoffs.
    pub fn active_handler(&self) -> &str {
        &self.active_handler
    }

    /// The append-only conversation history.
    pub fn history(&self) -> &[TurnEvent] {
        &self.history
    }
}

/// The user-visible outcome of a completed turn.
#[derive(Debug, Clone, Serialize)]
pub enum TurnResult {
    Answered { text: String },
    Refused { rationale: String },
}

/// What `submit_message` hands back to the caller: the outcome plus the
/// active handler and a context snapshot for UI display.
#[derive(Debug, Clone, Serialize)]
pub struct TurnReport {
    pub result: TurnResult,
    pub active_handler: String,
    pub context: SessionContext,
}

/// Drives conversational turns over a fixed set of handlers.
///
/// Built once at startup; everything it holds is read-only configuration
/// except the injected [`IdSource`], which sits behind a mutex so session
/// creation and transition hooks can draw fresh identifiers.
pub struct Orchestrator {
    handlers: HashMap<String, Handler>,
    entry_handler: Option<String>,
    graph: HandoffGraph,
    registry: ActionRegistry,
    model: Arc<dyn ModelClient>,
    ids: Mutex<Box<dyn IdSource>>,
    max_iterations: usize,
}

impl Orchestrator {
    pub fn new(model: Arc<dyn ModelClient>, ids: Box<dyn IdSource>) -> Self {
        Self {
            handlers: HashMap::new(),
            entry_handler: None,
            graph: HandoffGraph::new(),
            registry: ActionRegistry::new(),
            model,
            ids: Mutex::new(ids),
            max_iterations: DEFAULT_ITERATION_LIMIT,
        }
    }

    /// Registers a handler. The first one registered receives new sessions.
    pub fn with_handler(mut self, handler: Handler) -> Self {
        if self.entry_handler.is_none() {
            self.entry_handler = Some(handler.name().to_string());
        }
        self.handlers.insert(handler.name().to_string(), handler);
        self
    }

    /// Installs the handoff graph.
    pub fn with_graph(mut self, graph: HandoffGraph) -> Self {
        self.graph = graph;
        self
    }

    /// Registers an action in the shared registry.
    pub fn with_action(mut self, action: Arc<dyn Action>) -> Self {
        self.registry.register(action);
        self
    }

    /// Overrides the per-turn model-invocation cap.
    pub fn with_iteration_limit(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations.max(1);
        self
    }

    /// Opens a new session owned by the entry handler, with the account
    /// number populated immediately.
    pub fn create_session(&self) -> Result<Session> {
        let entry = self
            .entry_handler
            .clone()
            .ok_or_else(|| OrchestrationError::Other("no handlers registered".to_string()))?;
        let context = {
            let mut ids = self.ids.lock().unwrap();
            SessionContext::new(ids.as_mut())
        };
        let session = Session {
            id: Uuid::new_v4(),
            context,
            active_handler: entry,
            history: Vec::new(),
        };
        info!(session = %session.id, handler = %session.active_handler, "session created");
        Ok(session)
    }

    /// Processes one caller-submitted message to completion.
    ///
    /// Runs the active handler's guardrails, then loops through model
    /// invocations, executing actions and accepting handoffs, until a final
    /// answer, a refusal, or a fatal turn error. A vetoed turn never reaches
    /// the model.
    pub async fn submit_message(
        &self,
        session: &mut Session,
        user_text: impl Into<String>,
    ) -> Result<TurnReport> {
        let user_text = user_text.into();
        let mut handler = self.handler(&session.active_handler)?;
        info!(session = %session.id, handler = %handler.name(), "starting turn");

        session.history.push(TurnEvent::user_message(&user_text));

        match GuardrailPipeline::evaluate(handler.guardrails(), &user_text).await? {
            PipelineResult::Vetoed {
                guardrail,
                rationale,
            } => {
                warn!(session = %session.id, %guardrail, "turn vetoed");
                session
                    .history
                    .push(TurnEvent::assistant_message(REFUSAL_MESSAGE));
                return Ok(self.report(session, TurnResult::Refused { rationale }));
            }
            PipelineResult::Pass => {}
        }

        for iteration in 0..self.max_iterations {
            // Re-rendered every invocation: an action or hook earlier in this
            // turn may have changed the context.
            let request = ModelRequest {
                instructions: handler.instructions(&session.context),
                history: events_to_messages(&session.history),
                actions: self.registry.specs_for(handler.allowed_actions()),
                handoffs: self.handoff_specs(handler.name()),
            };
            debug!(
                session = %session.id,
                handler = %handler.name(),
                iteration,
                "invoking model"
            );

            match self.model.respond(request).await? {
                ModelOutcome::FinalAnswer { text } => {
                    session.history.push(TurnEvent::assistant_message(&text));
                    return Ok(self.report(session, TurnResult::Answered { text }));
                }
                ModelOutcome::ActionCall(call) => {
                    debug!(session = %session.id, action = %call.name, "action requested");
                    session
                        .history
                        .push(TurnEvent::assistant_action_calls("", vec![call.clone()]));
                    let output = self
                        .registry
                        .invoke(
                            &call.name,
                            handler.allowed_actions(),
                            &mut session.context,
                            &call.arguments,
                        )
                        .await?;
                    session
                        .history
                        .push(TurnEvent::action_result(&call.id, &output));
                }
                ModelOutcome::HandoffRequest { target } => {
                    {
                        let mut ids = self.ids.lock().unwrap();
                        self.graph.accept(
                            handler.name(),
                            &target,
                            &mut session.context,
                            ids.as_mut(),
                        )?;
                    }
                    let next = self.handler(&target)?;
                    info!(session = %session.id, from = %handler.name(), to = %target, "handoff accepted");
                    session
                        .history
                        .push(TurnEvent::handoff(handler.name(), &target));
                    session.active_handler = target;
                    handler = next;
                }
            }
        }

        warn!(session = %session.id, "iteration cap hit, likely a handler loop");
        Err(OrchestrationError::LimitExceeded {
            max_iterations: self.max_iterations,
        })
    }

    fn handler(&self, name: &str) -> Result<&Handler> {
        self.handlers
            .get(name)
            .ok_or_else(|| OrchestrationError::UnknownHandler {
                name: name.to_string(),
            })
    }

    fn handoff_specs(&self, source: &str) -> Vec<HandoffSpec> {
        self.graph
            .targets(source)
            .into_iter()
            .filter_map(|target| {
                self.handlers.get(target).map(|h| HandoffSpec {
                    target: target.to_string(),
                    description: h.public_description().to_string(),
                })
            })
            .collect()
    }

    fn report(&self, session: &Session, result: TurnResult) -> TurnReport {
        TurnReport {
            result,
            active_handler: session.active_handler.clone(),
            context: session.context.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::guardrail::{Guardrail, GuardrailVerdict};
    use crate::handler::Handler;
    use crate::ids::RandomIdSource;
    use crate::model::ScriptedModel;
    use async_trait::async_trait;
    use pretty_assertions::assert_eq;

    struct AlwaysVeto;

    #[async_trait]
    impl Guardrail for AlwaysVeto {
        fn name(&self) -> &str {
            "Always Veto"
        }

        async fn check(&self, _latest: &str) -> crate::error::Result<GuardrailVerdict> {
            Ok(GuardrailVerdict::veto("blocked for testing"))
        }
    }

    fn triage() -> Handler {
        Handler::with_static_instructions(
            "Triage Agent",
            "Delegates requests to the right specialist.",
            "You are a helpful triaging agent.",
        )
    }

    #[tokio::test]
    async fn test_answered_turn_appends_history() {
        let model = Arc::new(ScriptedModel::new().with_answer("Welcome aboard!"));
        let orchestrator = Orchestrator::new(model, Box::new(RandomIdSource::seeded(1)))
            .with_handler(triage());

        let mut session = orchestrator.create_session().unwrap();
        let report = orchestrator
            .submit_message(&mut session, "Hello")
            .await
            .unwrap();

        assert!(
            matches!(report.result, TurnResult::Answered { ref text } if text == "Welcome aboard!")
        );
        assert_eq!(report.active_handler, "Triage Agent");
        // User message + assistant answer.
        assert_eq!(session.history().len(), 2);
    }

    #[tokio::test]
    async fn test_vetoed_turn_never_reaches_the_model() {
        let model = Arc::new(ScriptedModel::new().with_answer("should not be seen"));
        let orchestrator =
            Orchestrator::new(model.clone(), Box::new(RandomIdSource::seeded(1)))
                .with_handler(triage().with_guardrail(Arc::new(AlwaysVeto)));

        let mut session = orchestrator.create_session().unwrap();
        let report = orchestrator
            .submit_message(&mut session, "anything")
            .await
            .unwrap();

        assert!(
            matches!(report.result, TurnResult::Refused { ref rationale } if rationale == "blocked for testing")
        );
        assert_eq!(model.invocation_count(), 0);
    }

    #[tokio::test]
    async fn test_handoff_ping_pong_hits_iteration_cap() {
        let mut model = ScriptedModel::new();
        for _ in 0..3 {
            model = model.with_handoff("FAQ Agent").with_handoff("Triage Agent");
        }
        let mut graph = HandoffGraph::new();
        graph.add_edge("Triage Agent", "FAQ Agent");
        graph.add_edge("FAQ Agent", "Triage Agent");

        let orchestrator = Orchestrator::new(
            Arc::new(model),
            Box::new(RandomIdSource::seeded(1)),
        )
        .with_handler(triage())
        .with_handler(Handler::with_static_instructions(
            "FAQ Agent",
            "Answers questions about the railway company.",
            "You are an FAQ agent.",
        ))
        .with_graph(graph)
        .with_iteration_limit(4);

        let mut session = orchestrator.create_session().unwrap();
        let err = orchestrator
            .submit_message(&mut session, "Hi")
            .await
            .unwrap_err();
        assert!(
            matches!(err, OrchestrationError::LimitExceeded { max_iterations } if max_iterations == 4)
        );
    }

    #[tokio::test]
    async fn test_session_starts_with_entry_handler_and_account_number() {
        let orchestrator = Orchestrator::new(
            Arc::new(ScriptedModel::new()),
            Box::new(RandomIdSource::seeded(9)),
        )
        .with_handler(triage());

        let session = orchestrator.create_session().unwrap();
        assert_eq!(session.active_handler(), "Triage Agent");
        assert!(session.context().account_number().is_some());
        assert!(session.history().is_empty());
    }
}
