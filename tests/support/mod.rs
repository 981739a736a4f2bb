//! In-process `ModelClient` test doubles shared across the integration tests.
//!
//! None of these hit a network; every scenario below is deterministic and self-contained,
//! mirroring the scripted-model pattern used by the crate's own unit tests.

use async_trait::async_trait;
use futures::stream::StreamExt;
use react_agent_runtime::{
    AgentOptions, ChatResponse, ContentBlock, ContentStream, GenerateOptions, Message, ModelClient,
    Result, Tool,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// Replays a fixed sequence of responses, one per call to `stream`. Once exhausted, further
/// calls yield an empty stream.
pub struct ScriptedModel {
    responses: Mutex<Vec<Vec<ContentBlock>>>,
    pub calls: AtomicUsize,
}

impl ScriptedModel {
    pub fn new(responses: Vec<Vec<ContentBlock>>) -> Self {
        Self { responses: Mutex::new(responses), calls: AtomicUsize::new(0) }
    }
}

#[async_trait]
impl ModelClient for ScriptedModel {
    async fn stream(
        &self,
        _messages: &[Message],
        _tools: &[Arc<Tool>],
        _options: &GenerateOptions,
    ) -> Result<ContentStream> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let mut responses = self.responses.lock().unwrap();
        let blocks = if responses.is_empty() { Vec::new() } else { responses.remove(0) };
        Ok(Box::pin(futures::stream::iter(blocks.into_iter().map(Ok))))
    }

    async fn generate(
        &self,
        messages: &[Message],
        tools: &[Arc<Tool>],
        options: &GenerateOptions,
    ) -> Result<ChatResponse> {
        let mut stream = self.stream(messages, tools, options).await?;
        let mut blocks = Vec::new();
        while let Some(block) = stream.next().await {
            blocks.push(block?);
        }
        Ok(ChatResponse { blocks, usage: None })
    }
}

/// Minimal valid options for an agent under test: no real network access is ever attempted
/// since tests wire a `ScriptedModel` in through `Agent::with_model`.
pub fn base_options() -> AgentOptions {
    AgentOptions::builder()
        .model("test-model")
        .base_url("http://localhost:0")
        .api_key("unused")
        .max_iterations(5)
        .build()
        .unwrap()
}
