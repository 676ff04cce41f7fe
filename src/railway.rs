//! The railway customer-service desk: concrete handlers, graph, and hooks.
//!
//! Five handlers (triage plus four specialists) wired into a complete
//! handoff graph: every handler can transfer to every other. Edges into the
//! seat-booking and cancellation handlers carry a transition hook that fills
//! in missing booking details, so those handlers' instruction routines are
//! never rendered against absent fields the hook is responsible for.

use std::sync::Arc;

use crate::actions::{
    CancelTrain, DisplaySeatMap, FaqLookup, LuggagePolicy, TrainStatus, UpdateSeat,
};
use crate::context::SessionContext;
use crate::guardrail::{Guardrail, JailbreakGuardrail, RelevanceGuardrail};
use crate::handler::{Handler, Instructions};
use crate::handoff::{HandoffGraph, TransitionHook};
use crate::ids::IdSource;
use crate::model::{Classifier, ModelClient};
use crate::orchestrator::Orchestrator;

pub const TRIAGE: &str = "Triage Agent";
pub const FAQ: &str = "FAQ Agent";
pub const SEAT_BOOKING: &str = "Seat Booking Agent";
pub const TRAIN_STATUS: &str = "Train Status Agent";
pub const CANCELLATION: &str = "Cancellation Agent";

/// Shared preamble for every handler's instructions.
pub const HANDOFF_PROMPT_PREFIX: &str = "# System context\n\
You are one of several specialized customer service agents for a railway company. \
A conversation may be transferred between agents; transfers happen seamlessly behind \
the scenes, so never mention them or draw attention to them in your replies.\n";

/// Fills booking details that are still absent. Used on every edge into the
/// seat-booking and cancellation handlers; safe to run repeatedly.
fn fill_booking_details() -> TransitionHook {
    Arc::new(|ctx: &mut SessionContext, ids: &mut dyn IdSource| {
        if ctx.confirmation_number.is_none() {
            ctx.confirmation_number = Some(ids.confirmation_number());
        }
        if ctx.train_number.is_none() {
            ctx.train_number = Some(ids.train_number());
        }
    })
}

fn triage_handler(guardrails: &[Arc<dyn Guardrail>]) -> Handler {
    let mut handler = Handler::with_static_instructions(
        TRIAGE,
        "A triage agent that can delegate a customer's request to the appropriate agent.",
        format!(
            "{HANDOFF_PROMPT_PREFIX}\
             You are a helpful triaging agent. Delegate the customer's question to the \
             appropriate specialist agent."
        ),
    );
    for g in guardrails {
        handler = handler.with_guardrail(g.clone());
    }
    handler
}

fn faq_handler(guardrails: &[Arc<dyn Guardrail>]) -> Handler {
    let mut handler = Handler::with_static_instructions(
        FAQ,
        "A helpful agent that can answer questions about the railway company.",
        format!(
            "{HANDOFF_PROMPT_PREFIX}\
             You are an FAQ agent. If you are speaking to a customer, you were probably \
             transferred from the triage agent. Use the following routine:\n\
             1. Identify the last question asked by the customer.\n\
             2. Use the faq_lookup_tool to get the answer. Do not rely on your own knowledge.\n\
             3. Respond to the customer with the answer."
        ),
    )
    .with_action("faq_lookup_tool")
    .with_action("luggage_tool");
    for g in guardrails {
        handler = handler.with_guardrail(g.clone());
    }
    handler
}

fn seat_booking_handler(guardrails: &[Arc<dyn Guardrail>]) -> Handler {
    let mut handler = Handler::new(
        SEAT_BOOKING,
        "A helpful agent that can update a seat on a train.",
        Instructions::Dynamic(Arc::new(|ctx: &SessionContext| {
            let confirmation = ctx.confirmation_number.as_deref().unwrap_or("[unknown]");
            format!(
                "{HANDOFF_PROMPT_PREFIX}\
                 You are a seat booking agent. If you are speaking to a customer, you were \
                 probably transferred from the triage agent. Use the following routine:\n\
                 1. The customer's confirmation number is {confirmation}. If this is not \
                 available, ask the customer for their confirmation number. If you have it, \
                 confirm that is the confirmation number they are referencing.\n\
                 2. Ask the customer what their desired seat number is. You can also use the \
                 display_seat_map tool to show them an interactive seat map where they can \
                 click to select their preferred seat.\n\
                 3. Use the update_seat tool to update the seat on the train."
            )
        })),
    )
    .with_action("update_seat")
    .with_action("display_seat_map");
    for g in guardrails {
        handler = handler.with_guardrail(g.clone());
    }
    handler
}

fn train_status_handler(guardrails: &[Arc<dyn Guardrail>]) -> Handler {
    let mut handler = Handler::new(
        TRAIN_STATUS,
        "An agent to provide train status information.",
        Instructions::Dynamic(Arc::new(|ctx: &SessionContext| {
            let confirmation = ctx.confirmation_number.as_deref().unwrap_or("[unknown]");
            let train = ctx.train_number.as_deref().unwrap_or("[unknown]");
            format!(
                "{HANDOFF_PROMPT_PREFIX}\
                 You are a train status agent. Use the following routine:\n\
                 1. The customer's confirmation number is {confirmation} and train number is \
                 {train}. If either is not available, ask the customer for the missing \
                 information. If you have both, confirm with the customer that these are \
                 correct.\n\
                 2. Use the train_status_tool to report the status of the train."
            )
        })),
    )
    .with_action("train_status_tool");
    for g in guardrails {
        handler = handler.with_guardrail(g.clone());
    }
    handler
}

fn cancellation_handler(guardrails: &[Arc<dyn Guardrail>]) -> Handler {
    let mut handler = Handler::new(
        CANCELLATION,
        "An agent to cancel train bookings.",
        Instructions::Dynamic(Arc::new(|ctx: &SessionContext| {
            let confirmation = ctx.confirmation_number.as_deref().unwrap_or("[unknown]");
            let train = ctx.train_number.as_deref().unwrap_or("[unknown]");
            format!(
                "{HANDOFF_PROMPT_PREFIX}\
                 You are a cancellation agent. Use the following routine:\n\
                 1. The customer's confirmation number is {confirmation} and train number is \
                 {train}. If either is not available, ask the customer for the missing \
                 information. If you have both, confirm with the customer that these are \
                 correct.\n\
                 2. If the customer confirms, use the cancel_train tool to cancel their \
                 train booking."
            )
        })),
    )
    .with_action("cancel_train");
    for g in guardrails {
        handler = handler.with_guardrail(g.clone());
    }
    handler
}

/// The complete handoff graph: every handler reaches every other. Edges into
/// seat booking and cancellation fabricate missing booking details on accept.
pub fn railway_graph() -> HandoffGraph {
    let handlers = [TRIAGE, FAQ, SEAT_BOOKING, TRAIN_STATUS, CANCELLATION];
    let mut graph = HandoffGraph::new();
    for source in handlers {
        for target in handlers {
            if source == target {
                continue;
            }
            if target == SEAT_BOOKING || target == CANCELLATION {
                graph.add_edge_with_hook(source, target, fill_booking_details());
            } else {
                graph.add_edge(source, target);
            }
        }
    }
    graph
}

/// Assembles the full desk: handlers, graph, actions, and both guardrails on
/// every handler. Triage receives new sessions.
pub fn railway_orchestrator(
    model: Arc<dyn ModelClient>,
    classifier: Arc<dyn Classifier>,
    ids: Box<dyn IdSource>,
) -> Orchestrator {
    let guardrails: Vec<Arc<dyn Guardrail>> = vec![
        Arc::new(RelevanceGuardrail::new(classifier.clone())),
        Arc::new(JailbreakGuardrail::new(classifier)),
    ];

    Orchestrator::new(model, ids)
        .with_handler(triage_handler(&guardrails))
        .with_handler(faq_handler(&guardrails))
        .with_handler(seat_booking_handler(&guardrails))
        .with_handler(train_status_handler(&guardrails))
        .with_handler(cancellation_handler(&guardrails))
        .with_graph(railway_graph())
        .with_action(Arc::new(FaqLookup))
        .with_action(Arc::new(LuggagePolicy))
        .with_action(Arc::new(UpdateSeat))
        .with_action(Arc::new(DisplaySeatMap))
        .with_action(Arc::new(TrainStatus))
        .with_action(Arc::new(CancelTrain))
}
