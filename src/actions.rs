//! Concrete railway customer-service actions.
//!
//! These are deliberately thin lookups over static fact tables; the
//! interesting machinery lives in the registry and the orchestrator. The
//! `update_seat` and `cancel_train` executors check their train-number
//! precondition before touching the context, so a failed invocation leaves
//! the context exactly as it was.

use async_trait::async_trait;
use serde_json::Value;

use crate::action::{string_argument, Action, ActionParameter};
use crate::context::SessionContext;
use crate::error::{OrchestrationError, Result};

/// Sentinel returned by [`DisplaySeatMap`].
///
/// Rendering surfaces treat this exact string as "open the interactive seat
/// selector"; it must be passed through uninterpreted.
pub const DISPLAY_SEAT_MAP_SENTINEL: &str = "DISPLAY_SEAT_MAP";

/// Answers frequently asked questions from a static fact table.
#[derive(Debug)]
pub struct FaqLookup;

#[async_trait]
impl Action for FaqLookup {
    fn name(&self) -> &str {
        "faq_lookup_tool"
    }

    fn description(&self) -> &str {
        "Lookup frequently asked questions."
    }

    fn parameters(&self) -> Vec<ActionParameter> {
        vec![ActionParameter::required(
            "question",
            "The customer's question",
        )]
    }

    async fn execute(&self, _context: &mut SessionContext, arguments: &Value) -> Result<String> {
        let question = string_argument(arguments, "question").unwrap_or_default();
        let q = question.to_lowercase();
        let answer = if q.contains("bag") || q.contains("baggage") || q.contains("luggage") {
            "You are allowed to bring two pieces of luggage on the train. \
             Each must be under 50 pounds and 28 inches x 22 inches x 14 inches."
        } else if q.contains("seats") || q.contains("train") || q.contains("coach") || q.contains("car") {
            "There are 120 seats in this train car. \
             There are 22 first class seats and 98 standard seats. \
             Accessible seating areas are in cars 4 and 16. \
             Rows 5-8 are Standard Plus, with extra legroom."
        } else if q.contains("wifi") {
            "We have free wifi on the train, join Railway-Wifi"
        } else {
            "I'm sorry, I don't know the answer to that question."
        };
        Ok(answer.to_string())
    }
}

/// Updates the booked seat for a confirmation number.
///
/// Requires a train number already present in the context; the seat-booking
/// handoff hook is responsible for filling it.
#[derive(Debug)]
pub struct UpdateSeat;

#[async_trait]
impl Action for UpdateSeat {
    fn name(&self) -> &str {
        "update_seat"
    }

    fn description(&self) -> &str {
        "Update the seat for a given confirmation number."
    }

    fn parameters(&self) -> Vec<ActionParameter> {
        vec![
            ActionParameter::required("confirmation_number", "The booking confirmation number"),
            ActionParameter::required("new_seat", "The seat to move the customer to"),
        ]
    }

    async fn execute(&self, context: &mut SessionContext, arguments: &Value) -> Result<String> {
        if context.train_number.is_none() {
            return Err(OrchestrationError::PreconditionFailed {
                message: "cannot update a seat without a train number in context".to_string(),
            });
        }
        let confirmation = string_argument(arguments, "confirmation_number").unwrap_or_default();
        let new_seat = string_argument(arguments, "new_seat").unwrap_or_default();
        context.confirmation_number = Some(confirmation.clone());
        context.seat_number = Some(new_seat.clone());
        Ok(format!(
            "Updated seat to {new_seat} for confirmation number {confirmation}"
        ))
    }
}

/// Reports the status of a train.
#[derive(Debug)]
pub struct TrainStatus;

#[async_trait]
impl Action for TrainStatus {
    fn name(&self) -> &str {
        "train_status_tool"
    }

    fn description(&self) -> &str {
        "Lookup status for a train."
    }

    fn parameters(&self) -> Vec<ActionParameter> {
        vec![ActionParameter::required(
            "train_number",
            "The train to look up",
        )]
    }

    async fn execute(&self, _context: &mut SessionContext, arguments: &Value) -> Result<String> {
        let train = string_argument(arguments, "train_number").unwrap_or_default();
        Ok(format!(
            "Train {train} is on time and scheduled to depart from platform 3."
        ))
    }
}

/// Answers luggage allowance and fee questions.
#[derive(Debug)]
pub struct LuggagePolicy;

#[async_trait]
impl Action for LuggagePolicy {
    fn name(&self) -> &str {
        "luggage_tool"
    }

    fn description(&self) -> &str {
        "Lookup luggage allowance and fees."
    }

    fn parameters(&self) -> Vec<ActionParameter> {
        vec![ActionParameter::required(
            "query",
            "The customer's luggage question",
        )]
    }

    async fn execute(&self, _context: &mut SessionContext, arguments: &Value) -> Result<String> {
        let q = string_argument(arguments, "query")
            .unwrap_or_default()
            .to_lowercase();
        let answer = if q.contains("fee") {
            "Overweight luggage fee is $50."
        } else if q.contains("allowance") {
            "Two carry-on bags and two checked bags (up to 50 lbs each) are included."
        } else {
            "Please provide details about your luggage inquiry."
        };
        Ok(answer.to_string())
    }
}

/// Cancels the booking recorded in the context.
#[derive(Debug)]
pub struct CancelTrain;

#[async_trait]
impl Action for CancelTrain {
    fn name(&self) -> &str {
        "cancel_train"
    }

    fn description(&self) -> &str {
        "Cancel a train booking."
    }

    fn parameters(&self) -> Vec<ActionParameter> {
        vec![]
    }

    async fn execute(&self, context: &mut SessionContext, _arguments: &Value) -> Result<String> {
        let train = context.train_number.as_deref().ok_or_else(|| {
            OrchestrationError::PreconditionFailed {
                message: "cannot cancel a booking without a train number in context".to_string(),
            }
        })?;
        Ok(format!("Train {train} successfully cancelled"))
    }
}

/// Pure UI-signal action: tells the surface to open its seat selector.
///
/// No context mutation; the sentinel string is the whole contract.
#[derive(Debug)]
pub struct DisplaySeatMap;

#[async_trait]
impl Action for DisplaySeatMap {
    fn name(&self) -> &str {
        "display_seat_map"
    }

    fn description(&self) -> &str {
        "Display an interactive seat map to the customer so they can choose a new seat."
    }

    fn parameters(&self) -> Vec<ActionParameter> {
        vec![]
    }

    async fn execute(&self, _context: &mut SessionContext, _arguments: &Value) -> Result<String> {
        Ok(DISPLAY_SEAT_MAP_SENTINEL.to_string())
    }
}
