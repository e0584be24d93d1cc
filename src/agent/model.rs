//! Language model seam for the conversation loop.

use super::message::{ContentPart, Message, MessageContent, Role, ToolInvocation};
use crate::config::LlmSettings;
use crate::error::{MoodlistError, Result};
use crate::openai::create_client;
use async_openai::types::{
    ChatCompletionMessageToolCall, ChatCompletionRequestAssistantMessageArgs,
    ChatCompletionRequestMessage, ChatCompletionRequestMessageContentPartImageArgs,
    ChatCompletionRequestMessageContentPartTextArgs, ChatCompletionRequestSystemMessageArgs,
    ChatCompletionRequestToolMessageArgs, ChatCompletionRequestUserMessageArgs,
    ChatCompletionRequestUserMessageContentPart, ChatCompletionTool, ChatCompletionToolType,
    CreateChatCompletionRequestArgs, FunctionCall, FunctionObject, ImageUrlArgs,
};
use async_trait::async_trait;
use serde::Serialize;
use tracing::{debug, instrument};

/// Declaration of a tool the model may call.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ToolSpec {
    pub name: String,
    pub description: String,
    /// JSON schema of the tool arguments.
    pub parameters: serde_json::Value,
}

/// A chat model that answers a message history with one assistant message.
#[async_trait]
pub trait ChatModel: Send + Sync {
    /// Submit the history, with the given tools bound, and return the reply.
    async fn complete(&self, messages: &[Message], tools: &[ToolSpec]) -> Result<Message>;
}

/// OpenAI chat completions backed model.
pub struct OpenAIChatModel {
    client: async_openai::Client<async_openai::config::OpenAIConfig>,
    model: String,
    temperature: f32,
}

impl OpenAIChatModel {
    /// Create the model used by the conversation loop.
    pub fn new(settings: &LlmSettings) -> Result<Self> {
        Self::with_model(settings, &settings.model)
    }

    /// Create the multimodal model used for image descriptions.
    pub fn vision(settings: &LlmSettings) -> Result<Self> {
        Self::with_model(settings, &settings.vision_model)
    }

    fn with_model(settings: &LlmSettings, model: &str) -> Result<Self> {
        Ok(Self {
            client: create_client(settings)?,
            model: model.to_string(),
            temperature: settings.temperature,
        })
    }
}

#[async_trait]
impl ChatModel for OpenAIChatModel {
    #[instrument(skip(self, messages, tools), fields(model = %self.model, messages = messages.len()))]
    async fn complete(&self, messages: &[Message], tools: &[ToolSpec]) -> Result<Message> {
        let request_messages = messages
            .iter()
            .map(to_request_message)
            .collect::<Result<Vec<_>>>()?;

        let mut builder = CreateChatCompletionRequestArgs::default();
        builder
            .model(&self.model)
            .messages(request_messages)
            .temperature(self.temperature);
        if !tools.is_empty() {
            builder.tools(tools.iter().map(to_openai_tool).collect::<Vec<_>>());
        }
        let request = builder.build().map_err(|e| MoodlistError::Agent(e.to_string()))?;

        let response = self
            .client
            .chat()
            .create(request)
            .await
            .map_err(|e| MoodlistError::OpenAI(format!("Chat completion failed: {}", e)))?;

        let choice = response
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| MoodlistError::Agent("No response from model".to_string()))?;

        let tool_calls = choice
            .message
            .tool_calls
            .unwrap_or_default()
            .into_iter()
            .map(|call| ToolInvocation {
                id: call.id,
                name: call.function.name,
                arguments: call.function.arguments,
            })
            .collect::<Vec<_>>();

        debug!("Model replied with {} tool call(s)", tool_calls.len());

        Ok(Message::assistant_with_tools(
            choice.message.content.unwrap_or_default(),
            tool_calls,
        ))
    }
}

fn to_openai_tool(spec: &ToolSpec) -> ChatCompletionTool {
    ChatCompletionTool {
        r#type: ChatCompletionToolType::Function,
        function: FunctionObject {
            name: spec.name.clone(),
            description: Some(spec.description.clone()),
            parameters: Some(spec.parameters.clone()),
            strict: None,
        },
    }
}

fn to_request_message(message: &Message) -> Result<ChatCompletionRequestMessage> {
    let agent_err = |e: async_openai::error::OpenAIError| MoodlistError::Agent(e.to_string());

    let request = match message.role {
        Role::System => ChatCompletionRequestSystemMessageArgs::default()
            .content(message.text())
            .build()
            .map_err(agent_err)?
            .into(),

        Role::User => match &message.content {
            MessageContent::Text(text) => ChatCompletionRequestUserMessageArgs::default()
                .content(text.clone())
                .build()
                .map_err(agent_err)?
                .into(),
            MessageContent::Parts(parts) => {
                let parts = parts
                    .iter()
                    .map(to_user_part)
                    .collect::<Result<Vec<_>>>()?;
                ChatCompletionRequestUserMessageArgs::default()
                    .content(parts)
                    .build()
                    .map_err(agent_err)?
                    .into()
            }
        },

        Role::Assistant => {
            let mut builder = ChatCompletionRequestAssistantMessageArgs::default();
            let text = message.text();
            if !text.is_empty() {
                builder.content(text);
            }
            if message.has_tool_calls() {
                builder.tool_calls(
                    message
                        .tool_calls
                        .iter()
                        .map(|call| ChatCompletionMessageToolCall {
                            id: call.id.clone(),
                            r#type: ChatCompletionToolType::Function,
                            function: FunctionCall {
                                name: call.name.clone(),
                                arguments: call.arguments.clone(),
                            },
                        })
                        .collect::<Vec<_>>(),
                );
            }
            builder.build().map_err(agent_err)?.into()
        }

        Role::Tool => {
            let call_id = message.tool_call_id.clone().ok_or_else(|| {
                MoodlistError::Agent("Tool message without a tool call id".to_string())
            })?;
            ChatCompletionRequestToolMessageArgs::default()
                .tool_call_id(call_id)
                .content(message.text())
                .build()
                .map_err(agent_err)?
                .into()
        }
    };

    Ok(request)
}

fn to_user_part(part: &ContentPart) -> Result<ChatCompletionRequestUserMessageContentPart> {
    let agent_err = |e: async_openai::error::OpenAIError| MoodlistError::Agent(e.to_string());

    Ok(match part {
        ContentPart::Text { text } => ChatCompletionRequestMessageContentPartTextArgs::default()
            .text(text.clone())
            .build()
            .map_err(agent_err)?
            .into(),
        ContentPart::ImageUrl { url } => ChatCompletionRequestMessageContentPartImageArgs::default()
            .image_url(ImageUrlArgs::default().url(url.clone()).build().map_err(agent_err)?)
            .build()
            .map_err(agent_err)?
            .into(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tool_spec_conversion() {
        let spec = ToolSpec {
            name: "describe_image".to_string(),
            description: "Describe an image".to_string(),
            parameters: serde_json::json!({"type": "object", "properties": {}}),
        };
        let tool = to_openai_tool(&spec);
        assert_eq!(tool.function.name, "describe_image");
        assert_eq!(tool.function.description.as_deref(), Some("Describe an image"));
    }

    #[test]
    fn test_tool_message_requires_call_id() {
        let mut msg = Message::tool(&crate::agent::ToolResult::success("call_1", "ok".to_string()));
        assert!(to_request_message(&msg).is_ok());

        msg.tool_call_id = None;
        assert!(to_request_message(&msg).is_err());
    }

    #[test]
    fn test_converts_every_role() {
        let call = ToolInvocation {
            id: "call_1".to_string(),
            name: "get_recent_audio_features".to_string(),
            arguments: "{}".to_string(),
        };
        let history = vec![
            Message::system("sys"),
            Message::user("hi"),
            Message::user_parts(vec![
                ContentPart::Text { text: "look".to_string() },
                ContentPart::ImageUrl { url: "data:image/png;base64,AAAA".to_string() },
            ]),
            Message::assistant_with_tools("", vec![call]),
        ];
        for msg in &history {
            assert!(to_request_message(msg).is_ok());
        }
    }
}
