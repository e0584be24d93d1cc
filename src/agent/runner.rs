//! Agent runner: the assistant/tools conversation loop.

use super::dispatcher::{RetryPolicy, ToolCallRecord, ToolDispatcher};
use super::message::Message;
use super::model::{ChatModel, ToolSpec};
use crate::config::{AgentSettings, Prompts};
use crate::curation::{extract_result, CurationOutcome};
use crate::error::{MoodlistError, Result};
use crate::tools::{tool_definitions, ToolContext};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Agent that loops between the model and the tools until it gets a final answer.
pub struct Agent {
    model: Arc<dyn ChatModel>,
    dispatcher: ToolDispatcher,
    tools: Vec<ToolSpec>,
    system_prompt: String,
    corrective_prompt: String,
    max_iterations: usize,
    max_empty_responses: usize,
}

impl Agent {
    /// Create a new agent with default prompts and limits.
    pub fn new(model: Arc<dyn ChatModel>, tools: ToolContext) -> Self {
        let prompts = Prompts::default();
        Self {
            model,
            dispatcher: ToolDispatcher::new(tools).with_remediation(&prompts.tool_error_prompt()),
            tools: tool_definitions(),
            system_prompt: prompts.system_prompt(),
            corrective_prompt: prompts.corrective_prompt(),
            max_iterations: 15,
            max_empty_responses: 5,
        }
    }

    /// Create an agent configured from settings and prompt templates.
    pub fn from_settings(
        model: Arc<dyn ChatModel>,
        tools: ToolContext,
        settings: &AgentSettings,
        prompts: &Prompts,
    ) -> Self {
        let dispatcher = ToolDispatcher::new(tools)
            .with_policy(RetryPolicy::from_settings(settings))
            .with_remediation(&prompts.tool_error_prompt());

        Self {
            model,
            dispatcher,
            tools: tool_definitions(),
            system_prompt: prompts.system_prompt(),
            corrective_prompt: prompts.corrective_prompt(),
            max_iterations: settings.max_iterations,
            max_empty_responses: settings.max_empty_responses,
        }
    }

    /// Set maximum assistant turns for the agent loop.
    pub fn with_max_iterations(mut self, max: usize) -> Self {
        self.max_iterations = max;
        self
    }

    /// Set how many consecutive empty replies are tolerated.
    pub fn with_max_empty_responses(mut self, max: usize) -> Self {
        self.max_empty_responses = max;
        self
    }

    /// Run the agent on a user request.
    pub async fn run(&self, request: &str) -> Result<AgentResponse> {
        let history = vec![
            Message::system(self.system_prompt.clone()),
            Message::user(request),
        ];
        self.run_history(history).await
    }

    /// Run the agent from an existing history. The history only ever grows.
    pub async fn run_history(&self, mut messages: Vec<Message>) -> Result<AgentResponse> {
        let mut iterations = 0;
        let mut tool_calls_made = Vec::new();

        loop {
            iterations += 1;
            if iterations > self.max_iterations {
                return Err(MoodlistError::Agent(format!(
                    "Agent exceeded maximum iterations ({})",
                    self.max_iterations
                )));
            }

            debug!("Agent iteration {}", iterations);

            let reply = self.assistant_turn(&mut messages).await?;
            let pending = reply.tool_calls.clone();
            messages.push(reply);

            if pending.is_empty() {
                let content = messages.last().map(Message::text).unwrap_or_default();
                info!("Agent finished after {} iteration(s)", iterations);
                return Ok(AgentResponse {
                    content,
                    messages,
                    tool_calls: tool_calls_made,
                    iterations,
                });
            }

            let outcome = self.dispatcher.dispatch(&pending).await;
            messages.extend(outcome.results.iter().map(Message::tool));
            tool_calls_made.extend(outcome.records);
        }
    }

    /// Ask the model until it produces a tool call or non-empty text.
    async fn assistant_turn(&self, messages: &mut Vec<Message>) -> Result<Message> {
        let mut empty_responses = 0;

        loop {
            let reply = self.model.complete(messages, &self.tools).await?;
            if reply.is_usable() {
                return Ok(reply);
            }

            empty_responses += 1;
            if empty_responses >= self.max_empty_responses {
                return Err(MoodlistError::Agent(format!(
                    "Model returned no usable output after {} attempts",
                    empty_responses
                )));
            }

            warn!("Model returned an empty response, asking again");
            messages.push(Message::user(self.corrective_prompt.clone()));
        }
    }
}

/// Response from an agent run.
#[derive(Debug)]
pub struct AgentResponse {
    /// The final response content from the agent.
    pub content: String,
    /// The full conversation history, including the final answer.
    pub messages: Vec<Message>,
    /// Record of all tool calls made during execution.
    pub tool_calls: Vec<ToolCallRecord>,
    /// Number of assistant turns used.
    pub iterations: usize,
}

impl AgentResponse {
    /// Parse the final answer as the curation payload.
    pub fn result(&self) -> CurationOutcome {
        extract_result(&self.content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::message::{Role, ToolInvocation};
    use crate::spotify::{AudioFeatureSource, TrackFeature};
    use crate::tools::{ImageDescriber, AUDIO_FEATURES_TOOL, FORMAT_CURATION_TOOL};
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    /// Replays canned replies and records every history it was sent.
    struct ScriptedModel {
        replies: Mutex<VecDeque<Message>>,
        calls: Mutex<Vec<Vec<Message>>>,
    }

    impl ScriptedModel {
        fn new(replies: Vec<Message>) -> Arc<Self> {
            Arc::new(Self {
                replies: Mutex::new(replies.into()),
                calls: Mutex::new(Vec::new()),
            })
        }

        fn histories(&self) -> Vec<Vec<Message>> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl ChatModel for ScriptedModel {
        async fn complete(&self, messages: &[Message], tools: &[ToolSpec]) -> Result<Message> {
            assert_eq!(tools.len(), 3);
            self.calls.lock().unwrap().push(messages.to_vec());
            Ok(self
                .replies
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Message::assistant("")))
        }
    }

    struct EmptyLibrary;

    #[async_trait]
    impl AudioFeatureSource for EmptyLibrary {
        async fn recent_track_features(&self) -> Result<Vec<TrackFeature>> {
            Ok(Vec::new())
        }
    }

    struct BrokenLibrary;

    #[async_trait]
    impl AudioFeatureSource for BrokenLibrary {
        async fn recent_track_features(&self) -> Result<Vec<TrackFeature>> {
            Err(MoodlistError::Spotify("502 Bad Gateway".to_string()))
        }
    }

    struct NoImages;

    #[async_trait]
    impl ImageDescriber for NoImages {
        async fn describe(&self, _image: &str) -> Result<String> {
            Err(MoodlistError::Tool("no images in this test".to_string()))
        }
    }

    fn agent(model: Arc<ScriptedModel>, library: Arc<dyn AudioFeatureSource>) -> Agent {
        Agent::new(model, ToolContext::new(library, Arc::new(NoImages)))
    }

    fn tool_call(id: &str, name: &str, arguments: &str) -> Message {
        Message::assistant_with_tools(
            "",
            vec![ToolInvocation {
                id: id.to_string(),
                name: name.to_string(),
                arguments: arguments.to_string(),
            }],
        )
    }

    #[tokio::test]
    async fn test_plain_answer_finishes_immediately() {
        let model = ScriptedModel::new(vec![Message::assistant("{\"ok\": true}")]);
        let response = agent(model.clone(), Arc::new(EmptyLibrary))
            .run("Create a playlist")
            .await
            .unwrap();

        assert_eq!(response.iterations, 1);
        assert_eq!(response.content, "{\"ok\": true}");
        assert!(response.tool_calls.is_empty());
        assert_eq!(response.messages.len(), 3);
        assert_eq!(response.messages[0].role, Role::System);
        assert_eq!(model.histories().len(), 1);
    }

    #[tokio::test]
    async fn test_empty_reply_appends_one_corrective_message() {
        let model = ScriptedModel::new(vec![Message::assistant("  "), Message::assistant("done")]);
        let response = agent(model.clone(), Arc::new(EmptyLibrary))
            .run("Create a playlist")
            .await
            .unwrap();

        let histories = model.histories();
        assert_eq!(histories.len(), 2);
        assert_eq!(histories[0].len(), 2);
        assert_eq!(histories[1].len(), 3);
        assert_eq!(histories[1][..2], histories[0][..]);
        assert_eq!(histories[1][2], Message::user("Respond with a real output."));

        assert_eq!(response.content, "done");
        assert_eq!(response.iterations, 1);
    }

    #[tokio::test]
    async fn test_corrective_prompt_renders_variables() {
        let mut prompts = Prompts::default();
        prompts.agent.corrective = "Answer {{who}} properly.".to_string();
        prompts.variables.insert("who".to_string(), "the listener".to_string());

        let model = ScriptedModel::new(vec![Message::assistant(""), Message::assistant("done")]);
        let tools = ToolContext::new(Arc::new(EmptyLibrary), Arc::new(NoImages));
        Agent::from_settings(model.clone(), tools, &AgentSettings::default(), &prompts)
            .run("Create a playlist")
            .await
            .unwrap();

        let histories = model.histories();
        assert_eq!(histories[1][2], Message::user("Answer the listener properly."));
    }

    #[tokio::test]
    async fn test_persistent_empty_replies_give_up() {
        let model = ScriptedModel::new(Vec::new());
        let err = agent(model.clone(), Arc::new(EmptyLibrary))
            .with_max_empty_responses(3)
            .run("Create a playlist")
            .await
            .unwrap_err();

        assert!(matches!(err, MoodlistError::Agent(_)));
        let histories = model.histories();
        assert_eq!(histories.len(), 3);
        // Two correctives: one after each of the first two empty replies
        assert_eq!(histories[2].len(), 4);
    }

    #[tokio::test]
    async fn test_tool_round_trip() {
        let formatted_args = r#"{"playlist_name": "P", "playlist_description": "D", "tracks": [{"song_name": "A", "artists": "X", "id": "1", "tempo": 120}], "summary": "S"}"#;
        let model = ScriptedModel::new(vec![
            tool_call("c1", AUDIO_FEATURES_TOOL, "{}"),
            tool_call("c2", FORMAT_CURATION_TOOL, formatted_args),
            Message::assistant(
                "```json\n{\"playlist_name\": \"P\", \"playlist_description\": \"D\", \"tracks\": [], \"summary\": \"S\"}\n```",
            ),
        ]);

        let response = agent(model.clone(), Arc::new(EmptyLibrary))
            .run("Create a playlist")
            .await
            .unwrap();

        assert_eq!(response.iterations, 3);
        assert_eq!(response.tool_calls.len(), 2);
        assert_eq!(response.tool_calls[0].result, "[]");

        // Each tool result follows its assistant turn, keyed by call id
        let histories = model.histories();
        let second = &histories[1];
        assert_eq!(second.last().unwrap().role, Role::Tool);
        assert_eq!(second.last().unwrap().tool_call_id.as_deref(), Some("c1"));

        let curation = response.result().curation().unwrap();
        assert_eq!(curation.playlist_name, "P");
    }

    #[tokio::test]
    async fn test_tool_failure_is_fed_back_and_recovered() {
        let model = ScriptedModel::new(vec![
            tool_call("c1", AUDIO_FEATURES_TOOL, "{}"),
            Message::assistant("{\"error\": \"no data\"}"),
        ]);

        let response = agent(model.clone(), Arc::new(BrokenLibrary))
            .run("Create a playlist")
            .await
            .unwrap();

        let histories = model.histories();
        let tool_msg = histories[1].last().unwrap();
        assert_eq!(tool_msg.role, Role::Tool);
        assert!(tool_msg.text().contains("502 Bad Gateway"));
        assert!(tool_msg.text().contains("please fix your mistakes."));
        assert!(response.tool_calls[0].is_error);
    }

    #[tokio::test]
    async fn test_iteration_cap() {
        let replies = (0..5)
            .map(|i| tool_call(&format!("c{}", i), AUDIO_FEATURES_TOOL, "{}"))
            .collect();
        let model = ScriptedModel::new(replies);

        let err = agent(model, Arc::new(EmptyLibrary))
            .with_max_iterations(2)
            .run("Create a playlist")
            .await
            .unwrap_err();

        assert!(err.to_string().contains("maximum iterations (2)"));
    }

    #[tokio::test]
    async fn test_history_is_append_only() {
        let model = ScriptedModel::new(vec![
            Message::assistant(""),
            tool_call("c1", AUDIO_FEATURES_TOOL, "{}"),
            Message::assistant("final"),
        ]);
        agent(model.clone(), Arc::new(EmptyLibrary))
            .run("Create a playlist")
            .await
            .unwrap();

        let histories = model.histories();
        for pair in histories.windows(2) {
            assert!(pair[1].len() > pair[0].len());
            assert_eq!(pair[1][..pair[0].len()], pair[0][..]);
        }
    }
}
