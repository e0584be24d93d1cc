//! Pipeline coordination for playlist curation.
//!
//! A [`Curator`] holds the shared, read-only pieces (settings, prompts and
//! model clients). Each request gets its own agent bound to the requesting
//! user's Spotify library and its own request id.

use crate::agent::{Agent, ChatModel, OpenAIChatModel, ToolCallRecord};
use crate::config::{Prompts, Settings};
use crate::curation::CurationOutcome;
use crate::error::Result;
use crate::input::PlaylistRequest;
use crate::spotify::{AudioFeatureSource, SpotifyClient};
use crate::tools::{ImageDescriber, ModelImageDescriber, ToolContext};
use serde::Serialize;
use std::sync::Arc;
use tracing::{info, instrument, Instrument};
use uuid::Uuid;

/// Outcome of one curation request.
#[derive(Debug, Serialize)]
pub struct CurationReport {
    pub request_id: Uuid,
    /// The parsed curation, or `{error, raw_content}` when the answer was not JSON.
    pub result: CurationOutcome,
    pub iterations: usize,
    pub tool_calls: Vec<ToolCallRecord>,
}

/// Builds and runs a playlist agent per request.
pub struct Curator {
    settings: Settings,
    prompts: Prompts,
    model: Arc<dyn ChatModel>,
    images: Arc<dyn ImageDescriber>,
}

impl Curator {
    /// Create a curator backed by the configured OpenAI models.
    pub fn new(settings: Settings) -> Result<Self> {
        let prompts = Prompts::from_settings(&settings)?;
        let model: Arc<dyn ChatModel> = Arc::new(OpenAIChatModel::new(&settings.llm)?);
        let vision: Arc<dyn ChatModel> = Arc::new(OpenAIChatModel::vision(&settings.llm)?);
        let images = Arc::new(ModelImageDescriber::new(vision, &prompts.image_instruction()));

        Ok(Self::with_components(settings, prompts, model, images))
    }

    /// Create a curator from explicit components.
    pub fn with_components(
        settings: Settings,
        prompts: Prompts,
        model: Arc<dyn ChatModel>,
        images: Arc<dyn ImageDescriber>,
    ) -> Self {
        Self {
            settings,
            prompts,
            model,
            images,
        }
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Build an agent whose tools read from the given library.
    pub fn agent_for(&self, library: Arc<dyn AudioFeatureSource>) -> Agent {
        let tools = ToolContext::new(library, self.images.clone());
        Agent::from_settings(self.model.clone(), tools, &self.settings.agent, &self.prompts)
    }

    /// Curate a playlist for the owner of a Spotify access token.
    ///
    /// Fails before any model call when the token is missing.
    pub async fn curate_with_token(
        &self,
        request: &PlaylistRequest,
        access_token: &str,
    ) -> Result<CurationReport> {
        let library = Arc::new(SpotifyClient::new(access_token, &self.settings.spotify)?);
        self.curate(request, library).await
    }

    /// Curate a playlist from the given library.
    pub async fn curate(
        &self,
        request: &PlaylistRequest,
        library: Arc<dyn AudioFeatureSource>,
    ) -> Result<CurationReport> {
        let request_id = Uuid::new_v4();
        let span = tracing::info_span!("curate", request_id = %request_id);
        self.curate_inner(request_id, request, library)
            .instrument(span)
            .await
    }

    #[instrument(skip_all, fields(songs = request.song_count))]
    async fn curate_inner(
        &self,
        request_id: Uuid,
        request: &PlaylistRequest,
        library: Arc<dyn AudioFeatureSource>,
    ) -> Result<CurationReport> {
        let question = request.normalize(self.images.as_ref()).await?;
        info!("Curating: {}", question);

        let response = self.agent_for(library).run(&question).await?;
        let result = response.result();
        if !result.is_parsed() {
            info!("Final answer was not valid JSON");
        }

        Ok(CurationReport {
            request_id,
            result,
            iterations: response.iterations,
            tool_calls: response.tool_calls,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::{ContentPart, Message, MessageContent, ToolInvocation, ToolSpec};
    use crate::error::MoodlistError;
    use crate::input::RequestInput;
    use crate::spotify::TrackFeature;
    use crate::tools::{AUDIO_FEATURES_TOOL, FORMAT_CURATION_TOOL};
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    struct ScriptedModel {
        replies: Mutex<VecDeque<Message>>,
        first_user_message: Mutex<Option<String>>,
    }

    #[async_trait]
    impl ChatModel for ScriptedModel {
        async fn complete(&self, messages: &[Message], _tools: &[ToolSpec]) -> Result<Message> {
            self.first_user_message
                .lock()
                .unwrap()
                .get_or_insert_with(|| messages[1].text());
            self.replies
                .lock()
                .unwrap()
                .pop_front()
                .ok_or_else(|| MoodlistError::Agent("script exhausted".to_string()))
        }
    }

    /// Answers image prompts by checking the message carries the image part.
    struct VisionModel;

    #[async_trait]
    impl ChatModel for VisionModel {
        async fn complete(&self, messages: &[Message], _tools: &[ToolSpec]) -> Result<Message> {
            match &messages[0].content {
                MessageContent::Parts(parts) if matches!(parts[1], ContentPart::ImageUrl { .. }) => {
                    Ok(Message::assistant("A calm lake at sunset."))
                }
                _ => Err(MoodlistError::Tool("expected an image".to_string())),
            }
        }
    }

    struct OneTrackLibrary;

    #[async_trait]
    impl AudioFeatureSource for OneTrackLibrary {
        async fn recent_track_features(&self) -> Result<Vec<TrackFeature>> {
            Ok(vec![TrackFeature {
                id: "t1".to_string(),
                song_name: "Weightless".to_string(),
                artists: "Marconi Union".to_string(),
                acousticness: 0.9,
                danceability: 0.2,
                duration_ms: 480000,
                energy: 0.1,
                instrumentalness: 0.9,
                key: 4,
                liveness: 0.1,
                loudness: -20.0,
                mode: 0,
                speechiness: 0.03,
                tempo: 60.0,
                time_signature: 4,
                valence: 0.1,
            }])
        }
    }

    fn call(id: &str, name: &str, arguments: &str) -> Message {
        Message::assistant_with_tools(
            "",
            vec![ToolInvocation {
                id: id.to_string(),
                name: name.to_string(),
                arguments: arguments.to_string(),
            }],
        )
    }

    fn curator(replies: Vec<Message>) -> (Curator, Arc<ScriptedModel>) {
        let model = Arc::new(ScriptedModel {
            replies: Mutex::new(replies.into()),
            first_user_message: Mutex::new(None),
        });
        let prompts = Prompts::default();
        let images = Arc::new(ModelImageDescriber::new(
            Arc::new(VisionModel),
            &prompts.image_instruction(),
        ));
        let curator =
            Curator::with_components(Settings::default(), prompts, model.clone(), images);
        (curator, model)
    }

    #[tokio::test]
    async fn test_curate_from_image() {
        let args = r#"{"playlist_name": "Still Water", "playlist_description": "Calm", "tracks": [{"song_name": "Weightless", "artists": "Marconi Union", "id": "t1", "tempo": 60.0}], "summary": "Slow and quiet"}"#;
        let (curator, model) = curator(vec![
            call("c1", AUDIO_FEATURES_TOOL, "{}"),
            call("c2", FORMAT_CURATION_TOOL, args),
            Message::assistant(
                "```json\n{\"playlist_name\": \"Still Water\", \"playlist_description\": \"Calm\", \"tracks\": [{\"song_name\": \"Weightless\", \"artists\": \"Marconi Union\", \"id\": \"t1\", \"features\": {\"tempo\": 60.0}}], \"summary\": \"Slow and quiet\"}\n```",
            ),
        ]);

        let request = PlaylistRequest::new(
            RequestInput::Image("data:image/png;base64,AAAA".to_string()),
            5,
        )
        .unwrap();
        let report = curator.curate(&request, Arc::new(OneTrackLibrary)).await.unwrap();

        let first = model.first_user_message.lock().unwrap().clone().unwrap();
        assert!(first.starts_with("Based on this image description: A calm lake at sunset."));

        assert_eq!(report.iterations, 3);
        assert_eq!(report.tool_calls.len(), 2);
        let curation = report.result.curation().unwrap();
        assert_eq!(curation.playlist_name, "Still Water");
        assert_eq!(curation.tracks[0].id, serde_json::json!("t1"));
    }

    #[tokio::test]
    async fn test_non_json_answer_is_reported_not_raised() {
        let (curator, _) = curator(vec![Message::assistant("Here is your playlist!")]);
        let request =
            PlaylistRequest::new(RequestInput::Text("rainy morning".to_string()), 10).unwrap();

        let report = curator.curate(&request, Arc::new(OneTrackLibrary)).await.unwrap();
        let value = serde_json::to_value(&report.result).unwrap();
        assert_eq!(value["raw_content"], "Here is your playlist!");
        assert!(value.get("error").is_some());
    }

    #[tokio::test]
    async fn test_missing_token_fails_before_the_model_is_called() {
        let (curator, model) = curator(Vec::new());
        let request =
            PlaylistRequest::new(RequestInput::Text("rainy morning".to_string()), 10).unwrap();

        let err = curator.curate_with_token(&request, "").await.unwrap_err();
        assert!(matches!(err, MoodlistError::MissingCredential(_)));
        assert!(model.first_user_message.lock().unwrap().is_none());
    }
}
