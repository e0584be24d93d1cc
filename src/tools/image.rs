//! Image description through a multimodal chat model.

use crate::agent::{ChatModel, ContentPart, Message};
use crate::error::{MoodlistError, Result};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::instrument;

/// Describes the content and mood of an image.
#[async_trait]
pub trait ImageDescriber: Send + Sync {
    /// Describe a data-URL encoded image.
    async fn describe(&self, image: &str) -> Result<String>;
}

/// Image describer that asks a multimodal model. Every call hits the model.
pub struct ModelImageDescriber {
    model: Arc<dyn ChatModel>,
    instruction: String,
}

impl ModelImageDescriber {
    pub fn new(model: Arc<dyn ChatModel>, instruction: &str) -> Self {
        Self {
            model,
            instruction: instruction.to_string(),
        }
    }
}

#[async_trait]
impl ImageDescriber for ModelImageDescriber {
    #[instrument(skip(self, image), fields(image_len = image.len()))]
    async fn describe(&self, image: &str) -> Result<String> {
        let message = Message::user_parts(vec![
            ContentPart::Text {
                text: self.instruction.clone(),
            },
            ContentPart::ImageUrl {
                url: image.to_string(),
            },
        ]);

        let reply = self.model.complete(&[message], &[]).await?;
        let description = reply.text().trim().to_string();

        if description.is_empty() {
            return Err(MoodlistError::Tool(
                "Image model returned an empty description".to_string(),
            ));
        }
        Ok(description)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::{MessageContent, ToolSpec};
    use std::sync::Mutex;

    struct RecordingModel {
        reply: String,
        seen: Mutex<Vec<Message>>,
    }

    #[async_trait]
    impl ChatModel for RecordingModel {
        async fn complete(&self, messages: &[Message], tools: &[ToolSpec]) -> Result<Message> {
            assert!(tools.is_empty());
            self.seen.lock().unwrap().extend_from_slice(messages);
            Ok(Message::assistant(self.reply.clone()))
        }
    }

    #[tokio::test]
    async fn test_describe_sends_instruction_and_image() {
        let model = Arc::new(RecordingModel {
            reply: "  A neon-lit street in the rain. ".to_string(),
            seen: Mutex::new(Vec::new()),
        });
        let describer = ModelImageDescriber::new(model.clone(), "Describe the mood:");

        let description = describer.describe("data:image/png;base64,AAAA").await.unwrap();
        assert_eq!(description, "A neon-lit street in the rain.");

        let seen = model.seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        match &seen[0].content {
            MessageContent::Parts(parts) => {
                assert_eq!(parts[0], ContentPart::Text { text: "Describe the mood:".to_string() });
                assert_eq!(
                    parts[1],
                    ContentPart::ImageUrl { url: "data:image/png;base64,AAAA".to_string() }
                );
            }
            other => panic!("Expected content parts, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_empty_description_is_an_error() {
        let model = Arc::new(RecordingModel {
            reply: String::new(),
            seen: Mutex::new(Vec::new()),
        });
        let describer = ModelImageDescriber::new(model, "Describe:");
        assert!(describer.describe("data:image/png;base64,AAAA").await.is_err());
    }
}
