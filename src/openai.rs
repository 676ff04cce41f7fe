//! OpenAI-backed implementations of the collaborator contracts.
//!
//! Wraps the async-openai crate. Actions are advertised as chat tools;
//! handoff targets are advertised as `transfer_to_*` pseudo-tools, and a
//! tool call against one of those names is mapped back to a
//! [`ModelOutcome::HandoffRequest`]. The classifier asks for a compact JSON
//! verdict and parses it.

use async_openai::{
    config::OpenAIConfig,
    types::{
        ChatCompletionMessageToolCall, ChatCompletionRequestAssistantMessageArgs,
        ChatCompletionRequestMessage, ChatCompletionRequestSystemMessageArgs,
        ChatCompletionRequestToolMessageArgs, ChatCompletionRequestUserMessageArgs,
        ChatCompletionTool, ChatCompletionToolArgs, ChatCompletionToolType,
        CreateChatCompletionRequestArgs, FunctionCall, FunctionObjectArgs,
    },
    Client,
};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use std::collections::HashMap;

use crate::action::ActionSpec;
use crate::error::{OrchestrationError, Result};
use crate::handoff::HandoffSpec;
use crate::items::{ActionCall, Message, Role};
use crate::model::{Classification, Classifier, ModelClient, ModelOutcome, ModelRequest};

const TRANSFER_PREFIX: &str = "transfer_to_";

fn transfer_tool_name(target: &str) -> String {
    let slug: String = target
        .to_lowercase()
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect();
    format!("{TRANSFER_PREFIX}{slug}")
}

/// [`ModelClient`] backed by the OpenAI chat completions API.
pub struct OpenAIModel {
    client: Client<OpenAIConfig>,
    model: String,
}

impl OpenAIModel {
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            model: model.into(),
        }
    }

    pub fn with_client(client: Client<OpenAIConfig>, model: impl Into<String>) -> Self {
        Self {
            client,
            model: model.into(),
        }
    }

    fn convert_message(&self, msg: &Message) -> Result<ChatCompletionRequestMessage> {
        let converted = match msg.role {
            Role::System => ChatCompletionRequestSystemMessageArgs::default()
                .content(msg.content.clone())
                .build()?
                .into(),
            Role::User => ChatCompletionRequestUserMessageArgs::default()
                .content(msg.content.clone())
                .build()?
                .into(),
            Role::Assistant => {
                let mut builder = ChatCompletionRequestAssistantMessageArgs::default();
                builder.content(msg.content.clone());
                if let Some(calls) = &msg.action_calls {
                    let tool_calls: Vec<ChatCompletionMessageToolCall> = calls
                        .iter()
                        .map(|call| ChatCompletionMessageToolCall {
                            id: call.id.clone(),
                            r#type: ChatCompletionToolType::Function,
                            function: FunctionCall {
                                name: call.name.clone(),
                                arguments: call.arguments.to_string(),
                            },
                        })
                        .collect();
                    builder.tool_calls(tool_calls);
                }
                builder.build()?.into()
            }
            Role::Action => ChatCompletionRequestToolMessageArgs::default()
                .content(msg.content.clone())
                .tool_call_id(msg.call_id.clone().unwrap_or_default())
                .build()?
                .into(),
        };
        Ok(converted)
    }

    fn convert_actions(&self, actions: &[ActionSpec]) -> Result<Vec<ChatCompletionTool>> {
        actions
            .iter()
            .map(|spec| {
                Ok(ChatCompletionToolArgs::default()
                    .r#type(ChatCompletionToolType::Function)
                    .function(
                        FunctionObjectArgs::default()
                            .name(spec.name.clone())
                            .description(spec.description.clone())
                            .parameters(spec.parameters.clone())
                            .build()?,
                    )
                    .build()?)
            })
            .collect()
    }

    fn convert_handoffs(
        &self,
        handoffs: &[HandoffSpec],
    ) -> Result<(Vec<ChatCompletionTool>, HashMap<String, String>)> {
        let mut tools = Vec::new();
        let mut targets = HashMap::new();
        for spec in handoffs {
            let tool_name = transfer_tool_name(&spec.target);
            tools.push(
                ChatCompletionToolArgs::default()
                    .r#type(ChatCompletionToolType::Function)
                    .function(
                        FunctionObjectArgs::default()
                            .name(tool_name.clone())
                            .description(format!(
                                "Transfer the conversation to: {}",
                                spec.description
                            ))
                            .parameters(serde_json::json!({
                                "type": "object",
                                "properties": {}
                            }))
                            .build()?,
                    )
                    .build()?,
            );
            targets.insert(tool_name, spec.target.clone());
        }
        Ok((tools, targets))
    }
}

#[async_trait]
impl ModelClient for OpenAIModel {
    async fn respond(&self, request: ModelRequest) -> Result<ModelOutcome> {
        let mut messages: Vec<ChatCompletionRequestMessage> =
            vec![ChatCompletionRequestSystemMessageArgs::default()
                .content(request.instructions.clone())
                .build()?
                .into()];
        for msg in &request.history {
            messages.push(self.convert_message(msg)?);
        }

        let mut tools = self.convert_actions(&request.actions)?;
        let (handoff_tools, handoff_targets) = self.convert_handoffs(&request.handoffs)?;
        tools.extend(handoff_tools);

        let mut req = CreateChatCompletionRequestArgs::default();
        req.model(&self.model).messages(messages);
        if !tools.is_empty() {
            req.tools(tools);
        }

        let response = self.client.chat().create(req.build()?).await?;
        let choice = response
            .choices
            .first()
            .ok_or_else(|| OrchestrationError::ModelBehavior {
                message: "no choices in response".to_string(),
            })?;

        if let Some(tool_calls) = &choice.message.tool_calls {
            if let Some(call) = tool_calls.first() {
                if let Some(target) = handoff_targets.get(&call.function.name) {
                    return Ok(ModelOutcome::HandoffRequest {
                        target: target.clone(),
                    });
                }
                let arguments: Value =
                    serde_json::from_str(&call.function.arguments).unwrap_or(Value::Null);
                return Ok(ModelOutcome::ActionCall(ActionCall {
                    id: call.id.clone(),
                    name: call.function.name.clone(),
                    arguments,
                }));
            }
        }

        match &choice.message.content {
            Some(content) if !content.is_empty() => Ok(ModelOutcome::FinalAnswer {
                text: content.clone(),
            }),
            _ => Err(OrchestrationError::ModelBehavior {
                message: "response carried neither content nor tool calls".to_string(),
            }),
        }
    }
}

#[derive(Debug, Deserialize)]
struct ClassifierReply {
    verdict: bool,
    rationale: String,
}

/// [`Classifier`] backed by the OpenAI chat completions API.
pub struct OpenAIClassifier {
    client: Client<OpenAIConfig>,
    model: String,
}

impl OpenAIClassifier {
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            model: model.into(),
        }
    }

    pub fn with_client(client: Client<OpenAIConfig>, model: impl Into<String>) -> Self {
        Self {
            client,
            model: model.into(),
        }
    }
}

#[async_trait]
impl Classifier for OpenAIClassifier {
    async fn classify(&self, instructions: &str, latest_message: &str) -> Result<Classification> {
        let system = format!(
            "{instructions}\n\nRespond with a single JSON object: \
             {{\"verdict\": <bool>, \"rationale\": <string>}}. No other text."
        );
        let messages: Vec<ChatCompletionRequestMessage> = vec![
            ChatCompletionRequestSystemMessageArgs::default()
                .content(system)
                .build()?
                .into(),
            ChatCompletionRequestUserMessageArgs::default()
                .content(latest_message.to_string())
                .build()?
                .into(),
        ];

        let req = CreateChatCompletionRequestArgs::default()
            .model(&self.model)
            .messages(messages)
            .build()?;
        let response = self.client.chat().create(req).await?;
        let content = response
            .choices
            .first()
            .and_then(|c| c.message.content.clone())
            .ok_or_else(|| OrchestrationError::ModelBehavior {
                message: "classifier returned no content".to_string(),
            })?;

        let reply: ClassifierReply =
            serde_json::from_str(content.trim()).map_err(|e| OrchestrationError::ModelBehavior {
                message: format!("classifier returned malformed verdict: {e}"),
            })?;
        Ok(Classification {
            verdict: reply.verdict,
            rationale: reply.rationale,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_transfer_tool_name_slug() {
        assert_eq!(
            transfer_tool_name("Seat Booking Agent"),
            "transfer_to_seat_booking_agent"
        );
        assert_eq!(transfer_tool_name("FAQ Agent"), "transfer_to_faq_agent");
    }

    #[test]
    fn test_message_conversion_shapes() {
        let model = OpenAIModel::new("gpt-4o-mini");

        let user = model.convert_message(&Message::user("Hello")).unwrap();
        assert!(matches!(user, ChatCompletionRequestMessage::User(_)));

        let call = ActionCall {
            id: "call_1".to_string(),
            name: "update_seat".to_string(),
            arguments: serde_json::json!({"new_seat": "2A"}),
        };
        let assistant = model
            .convert_message(&Message::assistant_with_action_calls("", vec![call]))
            .unwrap();
        assert!(matches!(
            assistant,
            ChatCompletionRequestMessage::Assistant(_)
        ));

        let result = model
            .convert_message(&Message::action_result("done", "call_1"))
            .unwrap();
        assert!(matches!(result, ChatCompletionRequestMessage::Tool(_)));
    }

    #[test]
    fn test_handoff_tools_map_back_to_targets() {
        let model = OpenAIModel::new("gpt-4o-mini");
        let specs = vec![HandoffSpec {
            target: "Cancellation Agent".to_string(),
            description: "An agent to cancel train bookings.".to_string(),
        }];
        let (tools, targets) = model.convert_handoffs(&specs).unwrap();
        assert_eq!(tools.len(), 1);
        assert_eq!(
            targets.get("transfer_to_cancellation_agent").map(String::as_str),
            Some("Cancellation Agent")
        );
    }

    #[test]
    fn test_classifier_reply_parsing() {
        let reply: ClassifierReply =
            serde_json::from_str(r#"{"verdict": false, "rationale": "off topic"}"#).unwrap();
        assert!(!reply.verdict);
        assert_eq!(reply.rationale, "off topic");
    }
}
