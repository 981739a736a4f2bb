//! Model transport: turns conversation state into a request against an OpenAI-compatible
//! chat-completions endpoint and turns the streamed response back into content blocks.
//!
//! [`ModelClient`] is the seam the reasoning and acting phases call through. Tests substitute a
//! fake implementation instead of driving a real HTTP server; [`OpenAiCompatibleModel`] is the
//! only production implementation, built from the same request-building and SSE-parsing pattern
//! as the rest of this crate's streaming pipeline.

use crate::tools::Tool;
use crate::types::{
    ContentBlock, GenerateOptions, Message, MessageRole, OpenAIChunk, OpenAIContent,
    OpenAIContentPart, OpenAIFunction, OpenAIImageUrl, OpenAIMessage, OpenAIRequest, OpenAIToolCall,
    OpenAIUsage, ToolChoice, ToolResultBlock,
};
use crate::utils::{ToolCallAggregator, parse_sse_stream};
use crate::{Error, Result};
use async_trait::async_trait;
use futures::stream::{Stream, StreamExt};
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

/// A stream of content blocks as they are assembled from the provider's response.
///
/// Matches the granularity `ToolCallAggregator` emits at: empty until a `finish_reason` arrives,
/// then one item per completed block (thinking, text, each tool use) in that order.
pub type ContentStream = Pin<Box<dyn Stream<Item = Result<ContentBlock>> + Send>>;

/// A fully assembled model response: every content block the provider produced for one turn,
/// plus token usage if the provider reported it.
#[derive(Debug, Clone, Default)]
pub struct ChatResponse {
    /// Content blocks produced this turn, in emission order.
    pub blocks: Vec<ContentBlock>,
    /// Token usage for this turn, if the provider's terminal chunk included it.
    pub usage: Option<OpenAIUsage>,
}

impl ChatResponse {
    /// Returns the tool-use blocks in this response, in order.
    pub fn tool_use_blocks(&self) -> Vec<&crate::types::ToolUseBlock> {
        self.blocks.iter().filter_map(ContentBlock::as_tool_use).collect()
    }

    /// Returns whether this response requested any tool calls.
    pub fn has_tool_calls(&self) -> bool {
        self.blocks.iter().any(|b| matches!(b, ContentBlock::ToolUse(_)))
    }
}

/// Abstraction over "send this conversation to a model, get content blocks back".
///
/// The ReAct loop and structured-output controller depend on this trait, not on
/// [`OpenAiCompatibleModel`] directly, so they can be exercised against an in-process fake.
#[async_trait]
pub trait ModelClient: Send + Sync {
    /// Sends `messages` (including any system message) with `tools` available, applying
    /// `options` as generation parameters, and returns the raw content-block stream.
    async fn stream(
        &self,
        messages: &[Message],
        tools: &[Arc<Tool>],
        options: &GenerateOptions,
    ) -> Result<ContentStream>;

    /// Convenience wrapper around [`ModelClient::stream`] that drains the stream into a single
    /// [`ChatResponse`]. The default implementation has no way to recover usage, since usage
    /// travels out-of-band of the content-block stream; [`OpenAiCompatibleModel`] overrides this
    /// to capture it directly from the terminal chunk.
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

/// Production [`ModelClient`] speaking the OpenAI-compatible chat-completions wire format over
/// HTTP, the same endpoint shape local servers like LM Studio, Ollama, llama.cpp, and vLLM
/// expose.
pub struct OpenAiCompatibleModel {
    http_client: reqwest::Client,
    model: String,
    base_url: String,
    api_key: String,
}

impl OpenAiCompatibleModel {
    /// Builds a model transport from connection settings.
    pub fn new(
        model: impl Into<String>,
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        timeout_secs: u64,
    ) -> Result<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(Error::Http)?;

        Ok(Self {
            http_client,
            model: model.into(),
            base_url: base_url.into(),
            api_key: api_key.into(),
        })
    }

    /// Builds a model transport directly from an agent's configuration.
    pub fn from_options(options: &crate::types::AgentOptions) -> Result<Self> {
        Self::new(
            options.model(),
            options.base_url(),
            options.api_key(),
            options.timeout(),
        )
    }

    fn build_request(
        &self,
        messages: &[Message],
        tools: &[Arc<Tool>],
        options: &GenerateOptions,
    ) -> OpenAIRequest {
        let openai_messages = messages.iter().flat_map(to_openai_messages).collect();

        let tools = if tools.is_empty() {
            None
        } else {
            Some(tools.iter().map(|t| t.to_openai_format()).collect())
        };

        OpenAIRequest {
            model: self.model.clone(),
            messages: openai_messages,
            stream: true,
            max_tokens: options.max_tokens,
            temperature: options.temperature,
            top_p: options.top_p,
            frequency_penalty: options.frequency_penalty,
            presence_penalty: options.presence_penalty,
            seed: options.seed,
            tools,
            tool_choice: options.tool_choice.as_ref().map(tool_choice_to_wire),
            extra: options.additional_body_params.clone(),
        }
    }

    async fn send(&self, request: &OpenAIRequest) -> Result<reqwest::Response> {
        let url = format!("{}/chat/completions", self.base_url);
        let response = self
            .http_client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(request)
            .send()
            .await
            .map_err(Error::Http)?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "unknown error".to_string());
            return Err(Error::api(format!("API error {status}: {body}")));
        }

        Ok(response)
    }
}

#[async_trait]
impl ModelClient for OpenAiCompatibleModel {
    async fn stream(
        &self,
        messages: &[Message],
        tools: &[Arc<Tool>],
        options: &GenerateOptions,
    ) -> Result<ContentStream> {
        let request = self.build_request(messages, tools, options);
        let response = self.send(&request).await?;
        let sse_stream = parse_sse_stream(response);

        let stream = sse_stream.scan(ToolCallAggregator::new(), |aggregator, chunk_result| {
            let result = match chunk_result {
                Ok(chunk) => match aggregator.process_chunk(chunk) {
                    Ok(blocks) if blocks.is_empty() => Some(None),
                    Ok(blocks) => Some(Some(Ok(blocks))),
                    Err(e) => Some(Some(Err(e))),
                },
                Err(e) => Some(Some(Err(e))),
            };
            futures::future::ready(result)
        });

        let flattened = stream.filter_map(|item| async move { item }).flat_map(|result| {
            futures::stream::iter(match result {
                Ok(blocks) => blocks.into_iter().map(Ok).collect(),
                Err(e) => vec![Err(e)],
            })
        });

        Ok(Box::pin(flattened))
    }

    async fn generate(
        &self,
        messages: &[Message],
        tools: &[Arc<Tool>],
        options: &GenerateOptions,
    ) -> Result<ChatResponse> {
        let request = self.build_request(messages, tools, options);
        let response = self.send(&request).await?;
        let mut sse_stream = parse_sse_stream(response);

        let mut aggregator = ToolCallAggregator::new();
        let mut blocks = Vec::new();
        let mut usage = None;

        while let Some(chunk_result) = sse_stream.next().await {
            let chunk: OpenAIChunk = chunk_result?;
            if let Some(u) = chunk.usage {
                usage = Some(u);
            }
            blocks.extend(aggregator.process_chunk(chunk)?);
        }

        Ok(ChatResponse { blocks, usage })
    }
}

fn tool_choice_to_wire(choice: &ToolChoice) -> serde_json::Value {
    match choice {
        ToolChoice::Auto => serde_json::Value::String("auto".to_string()),
        ToolChoice::None => serde_json::Value::String("none".to_string()),
        ToolChoice::Required => serde_json::Value::String("required".to_string()),
        ToolChoice::Specific { name } => serde_json::json!({
            "type": "function",
            "function": { "name": name },
        }),
    }
}

/// Converts one conversation [`Message`] into zero or more wire-format [`OpenAIMessage`]s.
///
/// Most messages map one-to-one. An assistant message mixes visible text with tool-use blocks
/// into a single message carrying both `content` and `tool_calls`, per the OpenAI wire shape. A
/// tool-role message may carry multiple [`ToolResultBlock`]s (e.g. from a multi-tool-call acting
/// step); each becomes its own `tool`-role message, since the wire format ties one tool result to
/// one `tool_call_id`.
fn to_openai_messages(message: &Message) -> Vec<OpenAIMessage> {
    if matches!(message.role, MessageRole::Tool) {
        return message
            .tool_result_blocks()
            .into_iter()
            .map(|result| OpenAIMessage {
                role: "tool".to_string(),
                content: Some(OpenAIContent::Text(tool_result_text(result))),
                tool_calls: None,
                tool_call_id: Some(result.tool_use_id.clone()),
            })
            .collect();
    }

    let role = match message.role {
        MessageRole::System => "system",
        MessageRole::User => "user",
        MessageRole::Assistant => "assistant",
        MessageRole::Tool => unreachable!("handled above"),
    };

    let text_and_media: Vec<OpenAIContentPart> = message
        .content
        .iter()
        .filter_map(|block| match block {
            ContentBlock::Text(t) => Some(OpenAIContentPart::text(t.text.clone())),
            ContentBlock::Image(image) => Some(OpenAIContentPart::ImageUrl {
                image_url: OpenAIImageUrl {
                    url: image.url(),
                    detail: Some(image.detail.to_string()),
                },
            }),
            _ => None,
        })
        .collect();

    let content = if text_and_media.is_empty() {
        None
    } else if text_and_media.len() == 1 {
        match &text_and_media[0] {
            OpenAIContentPart::Text { text } => Some(OpenAIContent::Text(text.clone())),
            part => Some(OpenAIContent::Parts(vec![part.clone()])),
        }
    } else {
        Some(OpenAIContent::Parts(text_and_media))
    };

    let tool_calls: Vec<OpenAIToolCall> = message
        .tool_use_blocks()
        .into_iter()
        .map(|tool_use| OpenAIToolCall {
            id: tool_use.id.clone(),
            call_type: "function".to_string(),
            function: OpenAIFunction {
                name: tool_use.name.clone(),
                arguments: tool_use
                    .raw_arguments
                    .clone()
                    .unwrap_or_else(|| tool_use.input.to_string()),
            },
        })
        .collect();

    vec![OpenAIMessage {
        role: role.to_string(),
        content,
        tool_calls: if tool_calls.is_empty() { None } else { Some(tool_calls) },
        tool_call_id: None,
    }]
}

fn tool_result_text(result: &ToolResultBlock) -> String {
    let text = result.text_content();
    if text.is_empty() {
        "(no output)".to_string()
    } else {
        text
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::Tool;
    use crate::types::{ImageDetail, ToolUseBlock};

    #[test]
    fn test_system_message_becomes_plain_text() {
        let msg = Message::system("be helpful");
        let wire = to_openai_messages(&msg);
        assert_eq!(wire.len(), 1);
        assert_eq!(wire[0].role, "system");
        match &wire[0].content {
            Some(OpenAIContent::Text(t)) => assert_eq!(t, "be helpful"),
            _ => panic!("expected text content"),
        }
    }

    #[test]
    fn test_user_message_with_image_becomes_parts() {
        let msg = Message::user_with_image_detail("what is this", "https://x/y.png", ImageDetail::High);
        let wire = to_openai_messages(&msg);
        match &wire[0].content {
            Some(OpenAIContent::Parts(parts)) => assert_eq!(parts.len(), 2),
            _ => panic!("expected parts content"),
        }
    }

    #[test]
    fn test_assistant_message_with_tool_use_carries_both_content_and_tool_calls() {
        let msg = Message::assistant(vec![
            ContentBlock::Text(crate::types::TextBlock::new("let me check")),
            ContentBlock::ToolUse(ToolUseBlock::new("call_1", "search", serde_json::json!({"q": "rust"}))),
        ]);
        let wire = to_openai_messages(&msg);
        assert_eq!(wire.len(), 1);
        assert!(wire[0].content.is_some());
        let tool_calls = wire[0].tool_calls.as_ref().unwrap();
        assert_eq!(tool_calls.len(), 1);
        assert_eq!(tool_calls[0].id, "call_1");
        assert_eq!(tool_calls[0].function.name, "search");
    }

    #[test]
    fn test_tool_message_with_multiple_results_splits_into_separate_wire_messages() {
        let msg = Message::new(
            MessageRole::Tool,
            vec![
                ContentBlock::ToolResult(ToolResultBlock::text("call_1", "search", "result a")),
                ContentBlock::ToolResult(ToolResultBlock::text("call_2", "search", "result b")),
            ],
        );
        let wire = to_openai_messages(&msg);
        assert_eq!(wire.len(), 2);
        assert_eq!(wire[0].tool_call_id.as_deref(), Some("call_1"));
        assert_eq!(wire[1].tool_call_id.as_deref(), Some("call_2"));
    }

    #[test]
    fn test_tool_choice_to_wire_specific() {
        let wire = tool_choice_to_wire(&ToolChoice::specific("generate_response"));
        assert_eq!(wire["type"], "function");
        assert_eq!(wire["function"]["name"], "generate_response");
    }

    #[tokio::test]
    async fn test_build_request_includes_registered_tools() {
        let model = OpenAiCompatibleModel::new("test-model", "http://localhost:1234/v1", "key", 30).unwrap();
        let echo = Arc::new(Tool::new(
            "echo",
            "echoes input",
            serde_json::json!({"type": "object"}),
            |args| async move { Ok(args) },
        ));
        let request = model.build_request(
            &[Message::user("hi")],
            &[echo],
            &GenerateOptions::default(),
        );
        assert_eq!(request.tools.unwrap().len(), 1);
        assert!(request.stream);
    }
}
