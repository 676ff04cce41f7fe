//! Conversation history data model.
//!
//! A session's history is an append-only sequence of [`TurnEvent`]s: user and
//! assistant messages (assistant messages carry any requested action calls),
//! action results, and handoffs. Events
//! carry ids and timestamps so external surfaces can render a full transcript;
//! the orchestrator flattens them into [`Message`]s for each model invocation.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// Role of a message in the conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
    /// The result of an action invocation, fed back to the model.
    Action,
}

/// An action invocation requested by the model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionCall {
    /// Correlates the call with its result message.
    pub id: String,
    pub name: String,
    pub arguments: Value,
}

/// A message in the conversation, as seen by the model collaborator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
    /// For `Role::Action` messages: the id of the call this result answers.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub call_id: Option<String>,
    /// For assistant messages that requested actions.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub action_calls: Option<Vec<ActionCall>>,
}

impl Message {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
            call_id: None,
            action_calls: None,
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
            call_id: None,
            action_calls: None,
        }
    }

    pub fn assistant_with_action_calls(
        content: impl Into<String>,
        action_calls: Vec<ActionCall>,
    ) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
            call_id: None,
            action_calls: Some(action_calls),
        }
    }

    pub fn action_result(content: impl Into<String>, call_id: impl Into<String>) -> Self {
        Self {
            role: Role::Action,
            content: content.into(),
            call_id: Some(call_id.into()),
            action_calls: None,
        }
    }
}

/// One entry in a session's append-only history.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum TurnEvent {
    Message(MessageEvent),
    ActionResult(ActionResultEvent),
    Handoff(HandoffEvent),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageEvent {
    pub id: String,
    pub role: Role,
    pub content: String,
    /// Action calls attached to an assistant message, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub action_calls: Option<Vec<ActionCall>>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionResultEvent {
    pub id: String,
    pub call_id: String,
    pub output: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HandoffEvent {
    pub id: String,
    pub from_handler: String,
    pub to_handler: String,
    pub created_at: DateTime<Utc>,
}

impl TurnEvent {
    pub fn user_message(content: impl Into<String>) -> Self {
        Self::message(Role::User, content, None)
    }

    pub fn assistant_message(content: impl Into<String>) -> Self {
        Self::message(Role::Assistant, content, None)
    }

    pub fn assistant_action_calls(content: impl Into<String>, calls: Vec<ActionCall>) -> Self {
        Self::message(Role::Assistant, content, Some(calls))
    }

    fn message(role: Role, content: impl Into<String>, calls: Option<Vec<ActionCall>>) -> Self {
        TurnEvent::Message(MessageEvent {
            id: Uuid::new_v4().to_string(),
            role,
            content: content.into(),
            action_calls: calls,
            created_at: Utc::now(),
        })
    }

    pub fn action_result(call_id: impl Into<String>, output: impl Into<String>) -> Self {
        TurnEvent::ActionResult(ActionResultEvent {
            id: Uuid::new_v4().to_string(),
            call_id: call_id.into(),
            output: output.into(),
            created_at: Utc::now(),
        })
    }

    pub fn handoff(from: impl Into<String>, to: impl Into<String>) -> Self {
        TurnEvent::Handoff(HandoffEvent {
            id: Uuid::new_v4().to_string(),
            from_handler: from.into(),
            to_handler: to.into(),
            created_at: Utc::now(),
        })
    }
}

/// Flattens history events into the message sequence sent to the model.
///
/// Handoff events are orchestration bookkeeping and do not become messages.
pub fn events_to_messages(events: &[TurnEvent]) -> Vec<Message> {
    let mut messages = Vec::new();
    for event in events {
        match event {
            TurnEvent::Message(msg) => messages.push(Message {
                role: msg.role,
                content: msg.content.clone(),
                call_id: None,
                action_calls: msg.action_calls.clone(),
            }),
            TurnEvent::ActionResult(result) => {
                messages.push(Message::action_result(&result.output, &result.call_id));
            }
            TurnEvent::Handoff(_) => {}
        }
    }
    messages
}
