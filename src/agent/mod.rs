//! Agent system for playlist curation with tool calling.
//!
//! Provides an LLM agent that loops between the model and its tools
//! (listening history, image description, curation formatting) until the
//! model produces a final answer.

mod dispatcher;
mod message;
mod model;
mod runner;

pub use dispatcher::{DispatchOutcome, RetryPolicy, ToolCallRecord, ToolDispatcher};
pub use message::{ContentPart, Message, MessageContent, Role, ToolInvocation, ToolResult};
pub use model::{ChatModel, OpenAIChatModel, ToolSpec};
pub use runner::{Agent, AgentResponse};
