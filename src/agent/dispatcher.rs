//! Executes the tool calls of an assistant turn.

use super::message::{ToolInvocation, ToolResult};
use crate::config::AgentSettings;
use crate::error::MoodlistError;
use crate::tools::{parse_tool_call, ToolContext};
use serde::Serialize;
use std::time::Duration;
use tracing::{info, warn};

/// How often a failing tool is retried before the error goes back to the model.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Total attempts per tool call, at least one.
    pub max_attempts: u32,
    /// Pause between attempts.
    pub backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 1,
            backoff: Duration::from_millis(500),
        }
    }
}

impl RetryPolicy {
    pub fn from_settings(settings: &AgentSettings) -> Self {
        Self {
            max_attempts: settings.tool_max_attempts.max(1),
            backoff: Duration::from_millis(settings.tool_backoff_ms),
        }
    }
}

/// Record of a tool call made by the agent.
#[derive(Debug, Clone, Serialize)]
pub struct ToolCallRecord {
    /// Name of the tool called.
    pub name: String,
    /// JSON arguments passed to the tool.
    pub arguments: String,
    /// Result returned by the tool, or the error handed back to the model.
    pub result: String,
    pub is_error: bool,
}

impl std::fmt::Display for ToolCallRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}({})", self.name, self.arguments)
    }
}

/// Results for one batch of tool calls, in request order.
#[derive(Debug, Default)]
pub struct DispatchOutcome {
    pub results: Vec<ToolResult>,
    pub records: Vec<ToolCallRecord>,
}

/// Runs tool calls against the tool context.
pub struct ToolDispatcher {
    tools: ToolContext,
    policy: RetryPolicy,
    remediation: String,
}

impl ToolDispatcher {
    pub fn new(tools: ToolContext) -> Self {
        Self {
            tools,
            policy: RetryPolicy::default(),
            remediation: "please fix your mistakes.".to_string(),
        }
    }

    pub fn with_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Instruction appended to every tool error.
    pub fn with_remediation(mut self, remediation: &str) -> Self {
        self.remediation = remediation.to_string();
        self
    }

    /// Execute every pending call. Never fails: if any call errors, every
    /// pending call gets an error result carrying the remediation prompt.
    pub async fn dispatch(&self, calls: &[ToolInvocation]) -> DispatchOutcome {
        let mut outputs = Vec::with_capacity(calls.len());

        for call in calls {
            info!("Agent calling tool: {} with args: {}", call.name, call.arguments);
            match self.run_with_retry(call).await {
                Ok(output) => outputs.push(output),
                Err(e) => {
                    warn!("Tool {} failed: {}", call.name, e);
                    return self.error_outcome(calls, &e);
                }
            }
        }

        let mut outcome = DispatchOutcome::default();
        for (call, output) in calls.iter().zip(outputs) {
            outcome.records.push(ToolCallRecord {
                name: call.name.clone(),
                arguments: call.arguments.clone(),
                result: output.clone(),
                is_error: false,
            });
            outcome.results.push(ToolResult::success(&call.id, output));
        }
        outcome
    }

    async fn run_with_retry(&self, call: &ToolInvocation) -> crate::error::Result<String> {
        let tool = parse_tool_call(&call.name, &call.arguments)?;

        let mut attempt = 1;
        loop {
            match self.tools.execute(&tool).await {
                Ok(output) => return Ok(output),
                Err(e) if attempt < self.policy.max_attempts => {
                    warn!(
                        "Tool {} attempt {}/{} failed: {}",
                        call.name, attempt, self.policy.max_attempts, e
                    );
                    attempt += 1;
                    tokio::time::sleep(self.policy.backoff).await;
                }
                Err(e) => return Err(e),
            }
        }
    }

    fn error_outcome(&self, calls: &[ToolInvocation], error: &MoodlistError) -> DispatchOutcome {
        let message = format!("Error: {}\n {}", error, self.remediation);

        let mut outcome = DispatchOutcome::default();
        for call in calls {
            outcome.records.push(ToolCallRecord {
                name: call.name.clone(),
                arguments: call.arguments.clone(),
                result: message.clone(),
                is_error: true,
            });
            outcome.results.push(ToolResult::error(&call.id, message.clone()));
        }
        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Result;
    use crate::spotify::{AudioFeatureSource, TrackFeature};
    use crate::tools::{ImageDescriber, AUDIO_FEATURES_TOOL, DESCRIBE_IMAGE_TOOL, FORMAT_CURATION_TOOL};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    /// Fails the first `failures` calls, then returns no tracks.
    struct FlakyLibrary {
        failures: u32,
        calls: AtomicU32,
    }

    #[async_trait]
    impl AudioFeatureSource for FlakyLibrary {
        async fn recent_track_features(&self) -> Result<Vec<TrackFeature>> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            if n < self.failures {
                Err(MoodlistError::Spotify("503 Service Unavailable".to_string()))
            } else {
                Ok(Vec::new())
            }
        }
    }

    struct FixedDescriber;

    #[async_trait]
    impl ImageDescriber for FixedDescriber {
        async fn describe(&self, _image: &str) -> Result<String> {
            Ok("sunny beach".to_string())
        }
    }

    fn dispatcher(failures: u32) -> (ToolDispatcher, Arc<FlakyLibrary>) {
        let library = Arc::new(FlakyLibrary {
            failures,
            calls: AtomicU32::new(0),
        });
        let tools = ToolContext::new(library.clone(), Arc::new(FixedDescriber));
        (ToolDispatcher::new(tools), library)
    }

    fn call(id: &str, name: &str, arguments: &str) -> ToolInvocation {
        ToolInvocation {
            id: id.to_string(),
            name: name.to_string(),
            arguments: arguments.to_string(),
        }
    }

    #[tokio::test]
    async fn test_successful_calls_map_one_to_one() {
        let (dispatcher, _) = dispatcher(0);
        let calls = vec![
            call("c1", AUDIO_FEATURES_TOOL, "{}"),
            call("c2", DESCRIBE_IMAGE_TOOL, r#"{"image_string": "data:image/png;base64,AA"}"#),
        ];

        let outcome = dispatcher.dispatch(&calls).await;

        assert_eq!(outcome.results.len(), 2);
        assert_eq!(outcome.results[0], ToolResult::success("c1", "[]".to_string()));
        assert_eq!(outcome.results[1], ToolResult::success("c2", "sunny beach".to_string()));
        assert!(outcome.records.iter().all(|r| !r.is_error));
    }

    #[tokio::test]
    async fn test_failure_yields_error_for_every_pending_call() {
        let (dispatcher, _) = dispatcher(0);
        let calls = vec![
            call("c1", AUDIO_FEATURES_TOOL, "{}"),
            call("c2", FORMAT_CURATION_TOOL, r#"{"playlist_name": "P"}"#),
            call("c3", DESCRIBE_IMAGE_TOOL, r#"{"image_string": "x"}"#),
        ];

        let outcome = dispatcher.dispatch(&calls).await;

        assert_eq!(outcome.results.len(), 3);
        let ids: Vec<_> = outcome.results.iter().map(|r| r.call_id.as_str()).collect();
        assert_eq!(ids, vec!["c1", "c2", "c3"]);
        for result in &outcome.results {
            assert!(result.is_error);
            assert!(result.content.starts_with("Error: "));
            assert!(result.content.contains("summary") || result.content.contains("playlist_description"));
            assert!(result.content.ends_with("please fix your mistakes."));
        }
    }

    #[tokio::test]
    async fn test_unknown_tool_is_reported_to_the_model() {
        let (dispatcher, _) = dispatcher(0);
        let outcome = dispatcher
            .with_remediation("try again with a listed tool.")
            .dispatch(&[call("c1", "create_playlist", "{}")])
            .await;

        assert_eq!(outcome.results.len(), 1);
        assert!(outcome.results[0].content.contains("Unknown tool: create_playlist"));
        assert!(outcome.results[0].content.ends_with("try again with a listed tool."));
    }

    #[tokio::test]
    async fn test_single_attempt_by_default() {
        let (dispatcher, library) = dispatcher(1);
        let outcome = dispatcher.dispatch(&[call("c1", AUDIO_FEATURES_TOOL, "")]).await;

        assert!(outcome.results[0].is_error);
        assert!(outcome.results[0].content.contains("503 Service Unavailable"));
        assert_eq!(library.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_retry_policy_recovers_transient_failures() {
        let (dispatcher, library) = dispatcher(2);
        let dispatcher = dispatcher.with_policy(RetryPolicy {
            max_attempts: 3,
            backoff: Duration::from_millis(1),
        });

        let outcome = dispatcher.dispatch(&[call("c1", AUDIO_FEATURES_TOOL, "{}")]).await;

        assert_eq!(outcome.results, vec![ToolResult::success("c1", "[]".to_string())]);
        assert_eq!(library.calls.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn test_retry_policy_from_settings_has_at_least_one_attempt() {
        let settings = AgentSettings {
            tool_max_attempts: 0,
            ..AgentSettings::default()
        };
        assert_eq!(RetryPolicy::from_settings(&settings).max_attempts, 1);
    }

    #[test]
    fn test_tool_call_record_display() {
        let record = ToolCallRecord {
            name: "describe_image".to_string(),
            arguments: r#"{"image_string": "data:"}"#.to_string(),
            result: "A beach".to_string(),
            is_error: false,
        };
        assert_eq!(format!("{}", record), r#"describe_image({"image_string": "data:"})"#);
    }
}
