//! Core type definitions for the agent runtime.
//!
//! The type system is organized into a few areas:
//!
//! - **Agent configuration**: [`AgentOptions`] / [`AgentOptionsBuilder`], plus [`GenerateOptions`]
//!   for the per-call generation parameters hooks are allowed to override.
//! - **Message system**: [`Message`], [`MessageRole`], and the [`ContentBlock`] variants
//!   (text, thinking, tool-use, tool-result, image, audio, video).
//! - **OpenAI wire format**: the `OpenAI*` types used to serialize/deserialize against an
//!   OpenAI-compatible chat-completions endpoint.
//!
//! # Example
//!
//! ```no_run
//! use react_agent_runtime::{AgentOptions, Message};
//!
//! let options = AgentOptions::builder()
//!     .model("qwen2.5-32b-instruct")
//!     .base_url("http://localhost:1234/v1")
//!     .system_prompt("You are a helpful assistant")
//!     .max_iterations(10)
//!     .build()
//!     .expect("valid configuration");
//!
//! let msg = Message::user("Hello, how are you?");
//! ```

use crate::Error;
use crate::hooks::HookRegistry;
use crate::tools::Tool;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

// ============================================================================
// NEWTYPE WRAPPERS FOR COMPILE-TIME TYPE SAFETY
// ============================================================================

/// Validated model name with compile-time type safety.
///
/// # Validation Rules
///
/// - Must not be empty
/// - Must not be only whitespace
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ModelName(String);

impl ModelName {
    /// Creates a new `ModelName` after validation.
    pub fn new(name: impl Into<String>) -> crate::Result<Self> {
        let name = name.into();
        let trimmed = name.trim();

        if trimmed.is_empty() {
            return Err(Error::invalid_input(
                "Model name cannot be empty or whitespace",
            ));
        }

        Ok(ModelName(name))
    }

    /// Returns the model name as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Consumes the `ModelName` and returns the inner `String`.
    pub fn into_inner(self) -> String {
        self.0
    }
}

impl std::fmt::Display for ModelName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Validated base URL with compile-time type safety.
///
/// # Validation Rules
///
/// - Must not be empty
/// - Must start with `http://` or `https://`
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BaseUrl(String);

impl BaseUrl {
    /// Creates a new `BaseUrl` after validation.
    pub fn new(url: impl Into<String>) -> crate::Result<Self> {
        let url = url.into();
        let trimmed = url.trim();

        if trimmed.is_empty() {
            return Err(Error::invalid_input("base_url cannot be empty"));
        }

        if !trimmed.starts_with("http://") && !trimmed.starts_with("https://") {
            return Err(Error::invalid_input(
                "base_url must start with http:// or https://",
            ));
        }

        Ok(BaseUrl(url))
    }

    /// Returns the base URL as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Consumes the `BaseUrl` and returns the inner `String`.
    pub fn into_inner(self) -> String {
        self.0
    }
}

impl std::fmt::Display for BaseUrl {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Validated sampling temperature with compile-time type safety.
///
/// # Validation Rules
///
/// - Must be between 0.0 and 2.0 (inclusive)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Temperature(f32);

impl Temperature {
    /// Creates a new `Temperature` after validation.
    pub fn new(temp: f32) -> crate::Result<Self> {
        if !(0.0..=2.0).contains(&temp) {
            return Err(Error::invalid_input(
                "temperature must be between 0.0 and 2.0",
            ));
        }

        Ok(Temperature(temp))
    }

    /// Returns the temperature value.
    pub fn value(&self) -> f32 {
        self.0
    }
}

impl std::fmt::Display for Temperature {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ============================================================================
// GENERATE OPTIONS (per-call generation parameters, hook-overridable)
// ============================================================================

/// How the model should be constrained to pick (or not pick) a tool on a given turn.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum ToolChoice {
    /// The model decides freely whether to call a tool.
    Auto,
    /// The model must not call any tool.
    None,
    /// The model must call some tool, but may pick which one.
    Required,
    /// The model must call the named tool.
    Specific {
        /// Name of the tool the model must call.
        name: String,
    },
}

impl ToolChoice {
    /// Convenience constructor for [`ToolChoice::Specific`].
    pub fn specific(name: impl Into<String>) -> Self {
        ToolChoice::Specific { name: name.into() }
    }
}

/// Generation parameters recognised by the model transport, overridable per call via
/// `PreReasoning`/`PreSummary` hooks.
///
/// Every field is optional: `None` means "let the provider default apply" or, after a merge,
/// "inherit from the base options".
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GenerateOptions {
    /// Sampling temperature.
    pub temperature: Option<f32>,
    /// Maximum tokens to generate.
    pub max_tokens: Option<u32>,
    /// Nucleus sampling threshold.
    pub top_p: Option<f32>,
    /// Penalty for repeating tokens already present in the generated text.
    pub frequency_penalty: Option<f32>,
    /// Penalty for repeating topics already present in the generated text.
    pub presence_penalty: Option<f32>,
    /// Seed for (best-effort) deterministic sampling.
    pub seed: Option<i64>,
    /// Whether/which tool the model must call this turn.
    pub tool_choice: Option<ToolChoice>,
    /// Provider-specific reasoning-effort hint (e.g. "low"/"medium"/"high").
    pub reasoning_effort: Option<String>,
    /// Opaque extra fields merged into the provider request body verbatim.
    pub additional_body_params: Option<Metadata>,
}

/// Returns a new [`GenerateOptions`] with fields from `override_opts` taking precedence over
/// `base` wherever the override is `Some`.
pub fn merge_options(override_opts: &GenerateOptions, base: &GenerateOptions) -> GenerateOptions {
    GenerateOptions {
        temperature: override_opts.temperature.or(base.temperature),
        max_tokens: override_opts.max_tokens.or(base.max_tokens),
        top_p: override_opts.top_p.or(base.top_p),
        frequency_penalty: override_opts.frequency_penalty.or(base.frequency_penalty),
        presence_penalty: override_opts.presence_penalty.or(base.presence_penalty),
        seed: override_opts.seed.or(base.seed),
        tool_choice: override_opts
            .tool_choice
            .clone()
            .or_else(|| base.tool_choice.clone()),
        reasoning_effort: override_opts
            .reasoning_effort
            .clone()
            .or_else(|| base.reasoning_effort.clone()),
        additional_body_params: override_opts
            .additional_body_params
            .clone()
            .or_else(|| base.additional_body_params.clone()),
    }
}

// ============================================================================
// AGENT CONFIGURATION
// ============================================================================

/// Configuration options for an agent instance.
///
/// Should be constructed via [`AgentOptions::builder()`] rather than direct instantiation, so
/// required fields are validated.
#[derive(Clone)]
pub struct AgentOptions {
    /// System prompt sent at the start of the conversation.
    system_prompt: String,

    /// Model identifier (e.g. "qwen2.5-32b-instruct", "gpt-4").
    model: String,

    /// OpenAI-compatible API endpoint URL.
    base_url: String,

    /// API authentication key; many local servers accept "not-needed".
    api_key: String,

    /// HTTP request timeout, in seconds, per model call.
    timeout: u64,

    /// Baseline generation parameters; per-call hooks may override via `merge_options`.
    generate_options: GenerateOptions,

    /// Maximum ReAct loop iterations (`N` in the reasoning/acting bound) before the loop falls
    /// through to the summary phase.
    max_iterations: u32,

    /// Instruction synthesized for the model when the iteration bound is reached.
    summary_instruction: String,

    /// Tools available to the agent's toolkit at construction time.
    tools: Vec<Arc<Tool>>,

    /// Durable hooks registered for the agent's full lifetime.
    hooks: HookRegistry,

    /// Whether to reject a second concurrent call on this agent instance.
    check_running: bool,
}

/// Custom Debug implementation: omits the API key and shows tool/hook counts.
impl std::fmt::Debug for AgentOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AgentOptions")
            .field("system_prompt", &self.system_prompt)
            .field("model", &self.model)
            .field("base_url", &self.base_url)
            .field("api_key", &"***")
            .field("timeout", &self.timeout)
            .field("generate_options", &self.generate_options)
            .field("max_iterations", &self.max_iterations)
            .field("tools", &format!("{} tools", self.tools.len()))
            .field("check_running", &self.check_running)
            .finish()
    }
}

impl Default for AgentOptions {
    fn default() -> Self {
        Self {
            system_prompt: String::new(),
            model: String::new(),
            base_url: String::new(),
            api_key: "not-needed".to_string(),
            timeout: 60,
            generate_options: GenerateOptions {
                temperature: Some(0.7),
                max_tokens: Some(4096),
                ..Default::default()
            },
            max_iterations: 5,
            summary_instruction: default_summary_instruction(),
            tools: Vec::new(),
            hooks: HookRegistry::new(),
            check_running: true,
        }
    }
}

fn default_summary_instruction() -> String {
    "You have reached the maximum number of reasoning/acting iterations. Provide your best \
     final answer now, using only the information already gathered; do not request any more \
     tool calls."
        .to_string()
}

impl AgentOptions {
    /// Creates a new builder for constructing [`AgentOptions`].
    pub fn builder() -> AgentOptionsBuilder {
        AgentOptionsBuilder::default()
    }

    /// Returns the system prompt.
    pub fn system_prompt(&self) -> &str {
        &self.system_prompt
    }

    /// Returns the model identifier.
    pub fn model(&self) -> &str {
        &self.model
    }

    /// Returns the base URL.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Returns the API key.
    pub fn api_key(&self) -> &str {
        &self.api_key
    }

    /// Returns the HTTP timeout in seconds.
    pub fn timeout(&self) -> u64 {
        self.timeout
    }

    /// Returns the baseline generation options.
    pub fn generate_options(&self) -> &GenerateOptions {
        &self.generate_options
    }

    /// Returns the maximum ReAct loop iteration bound `N`.
    pub fn max_iterations(&self) -> u32 {
        self.max_iterations
    }

    /// Returns the instruction used to synthesize the summary-phase prompt.
    pub fn summary_instruction(&self) -> &str {
        &self.summary_instruction
    }

    /// Returns the tools seeded into the agent's toolkit.
    pub fn tools(&self) -> &[Arc<Tool>] {
        &self.tools
    }

    /// Returns the durable hook registry.
    pub fn hooks(&self) -> &HookRegistry {
        &self.hooks
    }

    /// Returns whether a second concurrent call on the same agent is rejected.
    pub fn check_running(&self) -> bool {
        self.check_running
    }
}

/// Builder for constructing [`AgentOptions`] with validation.
///
/// Required fields: `model`, `base_url`. Everything else has a sensible default.
#[derive(Default)]
pub struct AgentOptionsBuilder {
    system_prompt: Option<String>,
    model: Option<String>,
    base_url: Option<String>,
    api_key: Option<String>,
    timeout: Option<u64>,
    generate_options: GenerateOptions,
    max_iterations: Option<u32>,
    summary_instruction: Option<String>,
    tools: Vec<Arc<Tool>>,
    hooks: HookRegistry,
    check_running: Option<bool>,
}

impl std::fmt::Debug for AgentOptionsBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AgentOptionsBuilder")
            .field("system_prompt", &self.system_prompt)
            .field("model", &self.model)
            .field("base_url", &self.base_url)
            .field("tools", &format!("{} tools", self.tools.len()))
            .finish()
    }
}

impl AgentOptionsBuilder {
    /// Sets the system prompt.
    pub fn system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = Some(prompt.into());
        self
    }

    /// Sets the model identifier (required).
    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    /// Sets the API endpoint URL (required).
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    /// Sets the API key.
    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    /// Sets the HTTP request timeout in seconds.
    pub fn timeout(mut self, timeout: u64) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Sets the sampling temperature.
    pub fn temperature(mut self, temp: f32) -> Self {
        self.generate_options.temperature = Some(temp);
        self
    }

    /// Sets the maximum tokens to generate per response.
    pub fn max_tokens(mut self, tokens: u32) -> Self {
        self.generate_options.max_tokens = Some(tokens);
        self
    }

    /// Sets the nucleus-sampling threshold.
    pub fn top_p(mut self, top_p: f32) -> Self {
        self.generate_options.top_p = Some(top_p);
        self
    }

    /// Sets the frequency penalty.
    pub fn frequency_penalty(mut self, penalty: f32) -> Self {
        self.generate_options.frequency_penalty = Some(penalty);
        self
    }

    /// Sets the presence penalty.
    pub fn presence_penalty(mut self, penalty: f32) -> Self {
        self.generate_options.presence_penalty = Some(penalty);
        self
    }

    /// Sets the sampling seed.
    pub fn seed(mut self, seed: i64) -> Self {
        self.generate_options.seed = Some(seed);
        self
    }

    /// Sets the provider-specific reasoning-effort hint.
    pub fn reasoning_effort(mut self, effort: impl Into<String>) -> Self {
        self.generate_options.reasoning_effort = Some(effort.into());
        self
    }

    /// Sets the maximum ReAct loop iteration bound `N` (must be `>= 1`).
    pub fn max_iterations(mut self, iterations: u32) -> Self {
        self.max_iterations = Some(iterations);
        self
    }

    /// Overrides the instruction used to synthesize the summary-phase prompt.
    pub fn summary_instruction(mut self, instruction: impl Into<String>) -> Self {
        self.summary_instruction = Some(instruction.into());
        self
    }

    /// Adds a single tool to the agent's initial toolkit.
    pub fn tool(mut self, tool: Tool) -> Self {
        self.tools.push(Arc::new(tool));
        self
    }

    /// Adds multiple tools at once.
    pub fn tools(mut self, tools: Vec<Tool>) -> Self {
        self.tools.extend(tools.into_iter().map(Arc::new));
        self
    }

    /// Sets the durable hook registry.
    pub fn hooks(mut self, hooks: HookRegistry) -> Self {
        self.hooks = hooks;
        self
    }

    /// Sets whether a second concurrent call on this agent is rejected (default `true`).
    pub fn check_running(mut self, check: bool) -> Self {
        self.check_running = Some(check);
        self
    }

    /// Validates configuration and builds the final [`AgentOptions`].
    pub fn build(self) -> crate::Result<AgentOptions> {
        let model = self
            .model
            .ok_or_else(|| crate::Error::config("model is required"))?;

        let base_url = self
            .base_url
            .ok_or_else(|| crate::Error::config("base_url is required"))?;

        if model.trim().is_empty() {
            return Err(crate::Error::invalid_input(
                "model cannot be empty or whitespace",
            ));
        }

        if base_url.trim().is_empty() {
            return Err(crate::Error::invalid_input("base_url cannot be empty"));
        }
        if !base_url.starts_with("http://") && !base_url.starts_with("https://") {
            return Err(crate::Error::invalid_input(
                "base_url must start with http:// or https://",
            ));
        }

        let temperature = self.generate_options.temperature.unwrap_or(0.7);
        if !(0.0..=2.0).contains(&temperature) {
            return Err(crate::Error::invalid_input(
                "temperature must be between 0.0 and 2.0",
            ));
        }

        if let Some(tokens) = self.generate_options.max_tokens {
            if tokens == 0 {
                return Err(crate::Error::invalid_input(
                    "max_tokens must be greater than 0",
                ));
            }
        }

        let max_iterations = self.max_iterations.unwrap_or(5);
        if max_iterations == 0 {
            return Err(crate::Error::invalid_input(
                "max_iterations must be at least 1",
            ));
        }

        Ok(AgentOptions {
            system_prompt: self.system_prompt.unwrap_or_default(),
            model,
            base_url,
            api_key: self.api_key.unwrap_or_else(|| "not-needed".to_string()),
            timeout: self.timeout.unwrap_or(60),
            generate_options: GenerateOptions {
                temperature: Some(temperature),
                max_tokens: self.generate_options.max_tokens.or(Some(4096)),
                ..self.generate_options
            },
            max_iterations,
            summary_instruction: self
                .summary_instruction
                .unwrap_or_else(default_summary_instruction),
            tools: self.tools,
            hooks: self.hooks,
            check_running: self.check_running.unwrap_or(true),
        })
    }
}

// ============================================================================
// MESSAGE & CONTENT MODEL
// ============================================================================

/// An opaque string-keyed metadata mapping carried by messages and content blocks.
pub type Metadata = serde_json::Map<String, serde_json::Value>;

/// Reserved metadata keys the runtime itself reads or writes.
pub mod metadata_keys {
    /// The final structured-output payload, attached to the message `Agent::call` returns.
    pub const STRUCTURED_OUTPUT: &str = "structured_output";
    /// Marks a message as a structured-output reminder injected by the controller.
    pub const STRUCTURED_OUTPUT_REMINDER: &str = "structured_output_reminder";
    /// Which reminder mode (`tool_choice` or `prompt`) produced the marked message.
    pub const STRUCTURED_OUTPUT_REMINDER_TYPE: &str = "structured_output_reminder_type";
    /// On a successful `generate_response` tool-result, the validated response value the
    /// structured-output controller embeds for memory compression to pick up.
    pub const RESPONSE_MSG: &str = "response_msg";
    /// Aggregated token usage, attached during structured-output memory compression.
    pub const CHAT_USAGE: &str = "chat_usage";
    /// Marks a message that should be excluded from multi-agent history merges.
    pub const BYPASS_MULTIAGENT_HISTORY_MERGE: &str = "bypass_multiagent_history_merge";
}

/// Identifies the sender/role of a message in the conversation.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    /// Establishes agent behavior and context; normally the first message.
    System,
    /// Input from the human or calling application.
    User,
    /// Response from the model; may carry tool-use blocks.
    Assistant,
    /// Result of a tool execution, fed back to the model.
    Tool,
}

/// The kind of a [`ContentBlock`], used to filter a message's blocks by variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentBlockKind {
    /// See [`ContentBlock::Text`].
    Text,
    /// See [`ContentBlock::Thinking`].
    Thinking,
    /// See [`ContentBlock::ToolUse`].
    ToolUse,
    /// See [`ContentBlock::ToolResult`].
    ToolResult,
    /// See [`ContentBlock::Image`].
    Image,
    /// See [`ContentBlock::Audio`].
    Audio,
    /// See [`ContentBlock::Video`].
    Video,
}

/// Multi-modal content blocks that can appear in a message.
///
/// Serializes as an externally tagged enum with a `"type"` field, e.g.
/// `{"type": "text", "text": "Hello"}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentBlock {
    /// Plain text content.
    Text(TextBlock),
    /// Model-internal reasoning, exposed for transparency, not meant to be acted on directly.
    Thinking(ThinkingBlock),
    /// A request from the model to execute a named tool.
    ToolUse(ToolUseBlock),
    /// The result of executing a tool-use block.
    ToolResult(ToolResultBlock),
    /// Image content (URL or base64).
    Image(ImageBlock),
    /// Audio content (URL or base64).
    Audio(AudioBlock),
    /// Video content (URL or base64).
    Video(VideoBlock),
}

impl ContentBlock {
    /// Returns this block's [`ContentBlockKind`].
    pub fn kind(&self) -> ContentBlockKind {
        match self {
            ContentBlock::Text(_) => ContentBlockKind::Text,
            ContentBlock::Thinking(_) => ContentBlockKind::Thinking,
            ContentBlock::ToolUse(_) => ContentBlockKind::ToolUse,
            ContentBlock::ToolResult(_) => ContentBlockKind::ToolResult,
            ContentBlock::Image(_) => ContentBlockKind::Image,
            ContentBlock::Audio(_) => ContentBlockKind::Audio,
            ContentBlock::Video(_) => ContentBlockKind::Video,
        }
    }

    /// Returns this block's text, if it is a [`ContentBlock::Text`] block.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            ContentBlock::Text(t) => Some(&t.text),
            _ => None,
        }
    }

    /// Returns this block's tool-use payload, if it is a [`ContentBlock::ToolUse`] block.
    pub fn as_tool_use(&self) -> Option<&ToolUseBlock> {
        match self {
            ContentBlock::ToolUse(b) => Some(b),
            _ => None,
        }
    }

    /// Returns this block's tool-result payload, if it is a [`ContentBlock::ToolResult`] block.
    pub fn as_tool_result(&self) -> Option<&ToolResultBlock> {
        match self {
            ContentBlock::ToolResult(b) => Some(b),
            _ => None,
        }
    }
}

/// Simple text content in a message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TextBlock {
    /// The text content.
    pub text: String,
}

impl TextBlock {
    /// Creates a new text block.
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }
}

/// Model-internal reasoning content, surfaced for transparency.
///
/// `reasoning_details` is an opaque, provider-specific payload (e.g. an encrypted or signed
/// reasoning blob some providers return alongside visible chain-of-thought text); the runtime
/// passes it through unexamined.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThinkingBlock {
    /// Human-readable reasoning text, if the provider exposes it.
    pub text: String,
    /// Opaque provider-specific reasoning payload.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reasoning_details: Option<serde_json::Value>,
}

impl ThinkingBlock {
    /// Creates a new thinking block with no extra reasoning-details payload.
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            reasoning_details: None,
        }
    }

    /// Attaches an opaque reasoning-details payload.
    pub fn with_reasoning_details(mut self, details: serde_json::Value) -> Self {
        self.reasoning_details = Some(details);
        self
    }
}

/// A request from the model to execute a tool.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolUseBlock {
    /// Unique identifier for this tool call (unique within the owning message).
    pub id: String,

    /// Name of the tool to execute; must match a registered tool.
    pub name: String,

    /// Parsed JSON parameters to pass to the tool.
    pub input: serde_json::Value,

    /// The raw, unparsed arguments string the provider streamed, if retained.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub raw_arguments: Option<String>,

    /// Opaque metadata (e.g. a provider thought-signature tying this call to its reasoning).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Metadata>,
}

impl ToolUseBlock {
    /// Creates a new tool-use block with no raw-arguments string or metadata.
    pub fn new(id: impl Into<String>, name: impl Into<String>, input: serde_json::Value) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            input,
            raw_arguments: None,
            metadata: None,
        }
    }

    /// Attaches the raw, unparsed arguments string.
    pub fn with_raw_arguments(mut self, raw: impl Into<String>) -> Self {
        self.raw_arguments = Some(raw.into());
        self
    }

    /// Attaches opaque metadata.
    pub fn with_metadata(mut self, metadata: Metadata) -> Self {
        self.metadata = Some(metadata);
        self
    }
}

/// The result of executing a [`ToolUseBlock`], sent back to the model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolResultBlock {
    /// ID of the tool-use block this result resolves.
    pub tool_use_id: String,

    /// Name of the tool that produced this result.
    pub tool_name: String,

    /// Ordered child content blocks carrying the result (typically text, possibly image).
    pub content: Vec<ContentBlock>,

    /// Opaque metadata; the structured-output controller uses this to carry a `success` flag
    /// and an embedded `response_msg` payload.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Metadata>,
}

impl ToolResultBlock {
    /// Creates a tool-result block from arbitrary child content blocks.
    pub fn new(
        tool_use_id: impl Into<String>,
        tool_name: impl Into<String>,
        content: Vec<ContentBlock>,
    ) -> Self {
        Self {
            tool_use_id: tool_use_id.into(),
            tool_name: tool_name.into(),
            content,
            metadata: None,
        }
    }

    /// Creates a tool-result block carrying a single text child block.
    pub fn text(
        tool_use_id: impl Into<String>,
        tool_name: impl Into<String>,
        text: impl Into<String>,
    ) -> Self {
        Self::new(
            tool_use_id,
            tool_name,
            vec![ContentBlock::Text(TextBlock::new(text))],
        )
    }

    /// Creates a tool-result block from a plain JSON value, rendered as text.
    pub fn from_json(
        tool_use_id: impl Into<String>,
        tool_name: impl Into<String>,
        value: &serde_json::Value,
    ) -> Self {
        Self::text(tool_use_id, tool_name, value.to_string())
    }

    /// Attaches opaque metadata.
    pub fn with_metadata(mut self, metadata: Metadata) -> Self {
        self.metadata = Some(metadata);
        self
    }

    /// Marks this result with a `success: bool` flag in its metadata.
    pub fn with_success(mut self, success: bool) -> Self {
        let metadata = self.metadata.get_or_insert_with(Metadata::new);
        metadata.insert("success".to_string(), serde_json::Value::Bool(success));
        self
    }

    /// Reads the `success` metadata flag; a result with no metadata is treated as successful.
    pub fn is_success(&self) -> bool {
        self.metadata
            .as_ref()
            .and_then(|m| m.get("success"))
            .and_then(|v| v.as_bool())
            .unwrap_or(true)
    }

    /// Concatenates this result's text child blocks.
    pub fn text_content(&self) -> String {
        self.content
            .iter()
            .filter_map(ContentBlock::as_text)
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// Where a piece of media content comes from.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MediaSource {
    /// An HTTP(S) URL or already-encoded data URI.
    Url(String),
    /// Base64-encoded bytes plus their media (MIME) type.
    Base64 {
        /// Base64-encoded payload.
        data: String,
        /// MIME type of the decoded payload (e.g. "image/png", "audio/wav").
        media_type: String,
    },
}

impl MediaSource {
    /// Renders this source as a URL/data-URI string suitable for an OpenAI-style content part.
    pub fn to_uri(&self) -> String {
        match self {
            MediaSource::Url(url) => url.clone(),
            MediaSource::Base64 { data, media_type } => {
                format!("data:{};base64,{}", media_type, data)
            }
        }
    }
}

/// Image detail level for vision-capable models.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ImageDetail {
    /// Low resolution, fixed token cost.
    Low,
    /// High resolution, token cost scales with image dimensions.
    High,
    /// Provider decides (default).
    #[default]
    Auto,
}

impl std::fmt::Display for ImageDetail {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ImageDetail::Low => write!(f, "low"),
            ImageDetail::High => write!(f, "high"),
            ImageDetail::Auto => write!(f, "auto"),
        }
    }
}

/// Image content block for vision-capable models.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageBlock {
    /// Where the image data comes from.
    pub source: MediaSource,
    /// Requested detail/resolution level.
    #[serde(default)]
    pub detail: ImageDetail,
}

impl ImageBlock {
    /// Creates an image block from a URL or data URI.
    pub fn from_url(url: impl Into<String>) -> Self {
        Self {
            source: MediaSource::Url(url.into()),
            detail: ImageDetail::default(),
        }
    }

    /// Creates an image block from base64-encoded data and its MIME type.
    pub fn from_base64(data: impl Into<String>, media_type: impl Into<String>) -> Self {
        Self {
            source: MediaSource::Base64 {
                data: data.into(),
                media_type: media_type.into(),
            },
            detail: ImageDetail::default(),
        }
    }

    /// Sets the image detail level.
    pub fn with_detail(mut self, detail: ImageDetail) -> Self {
        self.detail = detail;
        self
    }

    /// Renders this image as a URL/data-URI string.
    pub fn url(&self) -> String {
        self.source.to_uri()
    }
}

/// Audio content block.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AudioBlock {
    /// Where the audio data comes from.
    pub source: MediaSource,
}

impl AudioBlock {
    /// Creates an audio block from a URL.
    pub fn from_url(url: impl Into<String>) -> Self {
        Self {
            source: MediaSource::Url(url.into()),
        }
    }

    /// Creates an audio block from base64-encoded data and its MIME type.
    pub fn from_base64(data: impl Into<String>, media_type: impl Into<String>) -> Self {
        Self {
            source: MediaSource::Base64 {
                data: data.into(),
                media_type: media_type.into(),
            },
        }
    }
}

/// Video content block.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VideoBlock {
    /// Where the video data comes from.
    pub source: MediaSource,
}

impl VideoBlock {
    /// Creates a video block from a URL.
    pub fn from_url(url: impl Into<String>) -> Self {
        Self {
            source: MediaSource::Url(url.into()),
        }
    }

    /// Creates a video block from base64-encoded data and its MIME type.
    pub fn from_base64(data: impl Into<String>, media_type: impl Into<String>) -> Self {
        Self {
            source: MediaSource::Base64 {
                data: data.into(),
                media_type: media_type.into(),
            },
        }
    }
}

/// An immutable conversation message.
///
/// Mutation is by reconstruction: a hook that wants to change a message's content builds a new
/// `Message` carrying the same `id` (see [`Message::with_id`]) rather than mutating in place.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    /// Stable identifier, preserved across hook-driven reconstruction.
    pub id: String,

    /// Human-readable sender name (e.g. an agent's name), if known.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sender: Option<String>,

    /// Who sent this message.
    pub role: MessageRole,

    /// Ordered content blocks making up this message.
    pub content: Vec<ContentBlock>,

    /// Opaque metadata (reserved keys in [`metadata_keys`]).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Metadata>,

    /// Wall-clock creation time.
    pub timestamp: chrono::DateTime<chrono::Utc>,
}

impl Message {
    /// Creates a new message with a freshly generated id and the current timestamp.
    pub fn new(role: MessageRole, content: Vec<ContentBlock>) -> Self {
        Self {
            id: new_message_id(),
            sender: None,
            role,
            content,
            metadata: None,
            timestamp: chrono::Utc::now(),
        }
    }

    /// Reconstructs this message carrying a specific id, preserving identity across a
    /// hook-driven rewrite.
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    /// Attaches a sender name.
    pub fn with_sender(mut self, sender: impl Into<String>) -> Self {
        self.sender = Some(sender.into());
        self
    }

    /// Attaches opaque metadata, replacing any previously set.
    pub fn with_metadata(mut self, metadata: Metadata) -> Self {
        self.metadata = Some(metadata);
        self
    }

    /// Inserts a single metadata key/value, creating the metadata map if absent.
    pub fn set_metadata(&mut self, key: impl Into<String>, value: serde_json::Value) {
        self.metadata
            .get_or_insert_with(Metadata::new)
            .insert(key.into(), value);
    }

    /// Reads a single metadata value by key.
    pub fn get_metadata(&self, key: &str) -> Option<&serde_json::Value> {
        self.metadata.as_ref().and_then(|m| m.get(key))
    }

    /// Creates a user message with simple text content.
    pub fn user(text: impl Into<String>) -> Self {
        Self::new(MessageRole::User, vec![ContentBlock::Text(TextBlock::new(text))])
    }

    /// Creates an assistant message from content blocks.
    pub fn assistant(content: Vec<ContentBlock>) -> Self {
        Self::new(MessageRole::Assistant, content)
    }

    /// Creates a system message with simple text content.
    pub fn system(text: impl Into<String>) -> Self {
        Self::new(MessageRole::System, vec![ContentBlock::Text(TextBlock::new(text))])
    }

    /// Creates a user message with custom content blocks.
    pub fn user_with_blocks(content: Vec<ContentBlock>) -> Self {
        Self::new(MessageRole::User, content)
    }

    /// Creates a user message with text and an image from a URL.
    pub fn user_with_image(text: impl Into<String>, image_url: impl Into<String>) -> Self {
        Self::new(
            MessageRole::User,
            vec![
                ContentBlock::Text(TextBlock::new(text)),
                ContentBlock::Image(ImageBlock::from_url(image_url)),
            ],
        )
    }

    /// Creates a user message with text and an image at a specific detail level.
    pub fn user_with_image_detail(
        text: impl Into<String>,
        image_url: impl Into<String>,
        detail: ImageDetail,
    ) -> Self {
        Self::new(
            MessageRole::User,
            vec![
                ContentBlock::Text(TextBlock::new(text)),
                ContentBlock::Image(ImageBlock::from_url(image_url).with_detail(detail)),
            ],
        )
    }

    /// Creates a user message with text and a base64-encoded image.
    pub fn user_with_base64_image(
        text: impl Into<String>,
        base64_data: impl Into<String>,
        mime_type: impl Into<String>,
    ) -> Self {
        Self::new(
            MessageRole::User,
            vec![
                ContentBlock::Text(TextBlock::new(text)),
                ContentBlock::Image(ImageBlock::from_base64(base64_data, mime_type)),
            ],
        )
    }

    /// Wraps a single tool-result block in a `TOOL`-role message.
    pub fn tool_result(block: ToolResultBlock) -> Self {
        Self::new(MessageRole::Tool, vec![ContentBlock::ToolResult(block)])
    }

    /// Returns all content blocks of the given kind, preserving order.
    pub fn content_blocks(&self, kind: ContentBlockKind) -> Vec<&ContentBlock> {
        self.content.iter().filter(|b| b.kind() == kind).collect()
    }

    /// Returns whether this message has any content block of the given kind.
    pub fn has_content_blocks(&self, kind: ContentBlockKind) -> bool {
        self.content.iter().any(|b| b.kind() == kind)
    }

    /// Returns all tool-use blocks in this message, in order.
    pub fn tool_use_blocks(&self) -> Vec<&ToolUseBlock> {
        self.content.iter().filter_map(ContentBlock::as_tool_use).collect()
    }

    /// Returns all tool-result blocks in this message, in order.
    pub fn tool_result_blocks(&self) -> Vec<&ToolResultBlock> {
        self.content
            .iter()
            .filter_map(ContentBlock::as_tool_result)
            .collect()
    }

    /// Concatenates the text of every [`ContentBlock::Text`] block in this message.
    pub fn text_content(&self) -> String {
        self.content
            .iter()
            .filter_map(ContentBlock::as_text)
            .collect::<Vec<_>>()
            .join("")
    }
}

fn new_message_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

// ============================================================================
// OPENAI API WIRE FORMAT
// ============================================================================

/// OpenAI content format supporting both string and array (text + images) forms.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OpenAIContent {
    /// Simple text string.
    Text(String),
    /// Array of content parts (text and/or images).
    Parts(Vec<OpenAIContentPart>),
}

/// A single content part in an OpenAI message.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OpenAIContentPart {
    /// Text content part.
    Text {
        /// The text content.
        text: String,
    },
    /// Image URL content part.
    #[serde(rename = "image_url")]
    ImageUrl {
        /// The image URL details.
        image_url: OpenAIImageUrl,
    },
}

impl OpenAIContentPart {
    /// Creates a text content part.
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text { text: text.into() }
    }

    /// Creates an image URL content part.
    pub fn image_url(url: impl Into<String>, detail: ImageDetail) -> Self {
        Self::ImageUrl {
            image_url: OpenAIImageUrl {
                url: url.into(),
                detail: Some(detail.to_string()),
            },
        }
    }
}

/// OpenAI image URL structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenAIImageUrl {
    /// Image URL or data URI.
    pub url: String,
    /// Detail level: "low", "high", or "auto".
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

/// OpenAI API message format for serialization.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenAIMessage {
    /// Message role as a string ("system", "user", "assistant", "tool").
    pub role: String,

    /// Message content (string for text-only, array for text+images).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<OpenAIContent>,

    /// Tool calls requested by the assistant (assistant messages only).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<OpenAIToolCall>>,

    /// ID of the tool call this message responds to (tool messages only).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
}

/// OpenAI tool call representation in API messages.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenAIToolCall {
    /// Unique identifier for this tool call.
    pub id: String,

    /// Type of the call (always "function" in the current API).
    #[serde(rename = "type")]
    pub call_type: String,

    /// Function/tool details.
    pub function: OpenAIFunction,
}

/// OpenAI function call details.
///
/// `arguments` is a JSON string, not a parsed object — an OpenAI API quirk.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenAIFunction {
    /// Name of the function/tool to call.
    pub name: String,

    /// Function arguments as a JSON string.
    pub arguments: String,
}

/// Complete request payload for an OpenAI-compatible chat completions endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct OpenAIRequest {
    /// Model identifier.
    pub model: String,

    /// Conversation history.
    pub messages: Vec<OpenAIMessage>,

    /// Always `true`; the runtime only speaks the streaming SSE form.
    pub stream: bool,

    /// Maximum tokens to generate.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,

    /// Sampling temperature.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,

    /// Nucleus sampling threshold.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f32>,

    /// Frequency penalty.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub frequency_penalty: Option<f32>,

    /// Presence penalty.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub presence_penalty: Option<f32>,

    /// Sampling seed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seed: Option<i64>,

    /// Tools/functions available to the model, each a JSON-schema function descriptor.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tools: Option<Vec<serde_json::Value>>,

    /// Tool-choice constraint, in OpenAI's wire shape (`"auto"`, `"none"`, `"required"`, or
    /// `{"type": "function", "function": {"name": ...}}`).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_choice: Option<serde_json::Value>,

    /// Extra provider-specific fields merged into the request body verbatim.
    #[serde(flatten, skip_serializing_if = "Option::is_none")]
    pub extra: Option<serde_json::Map<String, serde_json::Value>>,
}

/// A single chunk from an OpenAI-compatible streaming response.
#[derive(Debug, Clone, Deserialize)]
pub struct OpenAIChunk {
    /// Identifier shared by every chunk in one streaming response.
    #[allow(dead_code)]
    pub id: String,

    /// Object type (always "chat.completion.chunk" for streaming).
    #[allow(dead_code)]
    pub object: String,

    /// Unix timestamp this chunk was created.
    #[allow(dead_code)]
    pub created: i64,

    /// Model that generated this chunk.
    #[allow(dead_code)]
    pub model: String,

    /// Completion choices (usually exactly one).
    pub choices: Vec<OpenAIChoice>,

    /// Usage totals, present only on the terminal chunk for providers that report it.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub usage: Option<OpenAIUsage>,
}

/// Token usage totals reported by the provider.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct OpenAIUsage {
    /// Tokens consumed by the prompt.
    pub prompt_tokens: u32,
    /// Tokens generated in the completion.
    pub completion_tokens: u32,
    /// Sum of prompt and completion tokens.
    pub total_tokens: u32,
}

/// A single choice/completion option in a streaming chunk.
#[derive(Debug, Clone, Deserialize)]
pub struct OpenAIChoice {
    /// Index of this choice.
    #[allow(dead_code)]
    pub index: u32,

    /// Incremental update for this chunk.
    pub delta: OpenAIDelta,

    /// Reason generation finished, present only on the terminal chunk.
    pub finish_reason: Option<String>,
}

/// Incremental update in a streaming chunk.
#[derive(Debug, Clone, Deserialize)]
pub struct OpenAIDelta {
    /// Role of the message (only in the first chunk).
    #[allow(dead_code)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,

    /// Incremental text content added in this chunk.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,

    /// Incremental reasoning/thinking text added in this chunk, if the provider streams it.
    #[serde(skip_serializing_if = "Option::is_none", alias = "reasoning")]
    pub reasoning_content: Option<String>,

    /// Incremental tool call updates added in this chunk.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<OpenAIToolCallDelta>>,
}

/// Incremental update for a tool call in a streaming response.
#[derive(Debug, Clone, Deserialize)]
pub struct OpenAIToolCallDelta {
    /// Index identifying which tool call this delta updates.
    pub index: u32,

    /// Tool call ID (only in the first delta for this call).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    /// Type of call (always "function" when present).
    #[allow(dead_code)]
    #[serde(skip_serializing_if = "Option::is_none", rename = "type")]
    pub call_type: Option<String>,

    /// Incremental function details.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub function: Option<OpenAIFunctionDelta>,
}

/// Incremental update for function details in a streaming tool call.
#[derive(Debug, Clone, Deserialize)]
pub struct OpenAIFunctionDelta {
    /// Function/tool name (only in the first delta for this function).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Incremental fragment of the arguments JSON string.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub arguments: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_agent_options_builder() {
        let options = AgentOptions::builder()
            .system_prompt("Test prompt")
            .model("test-model")
            .base_url("http://localhost:1234/v1")
            .api_key("test-key")
            .max_iterations(5)
            .max_tokens(1000)
            .temperature(0.5)
            .timeout(30)
            .build()
            .unwrap();

        assert_eq!(options.system_prompt(), "Test prompt");
        assert_eq!(options.model(), "test-model");
        assert_eq!(options.base_url(), "http://localhost:1234/v1");
        assert_eq!(options.api_key(), "test-key");
        assert_eq!(options.max_iterations(), 5);
        assert_eq!(options.generate_options().max_tokens, Some(1000));
        assert_eq!(options.generate_options().temperature, Some(0.5));
        assert_eq!(options.timeout(), 30);
    }

    #[test]
    fn test_agent_options_builder_defaults() {
        let options = AgentOptions::builder()
            .model("test-model")
            .base_url("http://localhost:1234/v1")
            .build()
            .unwrap();

        assert_eq!(options.system_prompt(), "");
        assert_eq!(options.api_key(), "not-needed");
        assert_eq!(options.max_iterations(), 5);
        assert_eq!(options.generate_options().max_tokens, Some(4096));
        assert_eq!(options.generate_options().temperature, Some(0.7));
        assert_eq!(options.timeout(), 60);
        assert!(options.check_running());
    }

    #[test]
    fn test_agent_options_builder_missing_required() {
        let result = AgentOptions::builder()
            .base_url("http://localhost:1234/v1")
            .build();
        assert!(result.is_err());

        let result = AgentOptions::builder().model("test-model").build();
        assert!(result.is_err());
    }

    #[test]
    fn test_agent_options_builder_rejects_zero_max_iterations() {
        let result = AgentOptions::builder()
            .model("test-model")
            .base_url("http://localhost:1234/v1")
            .max_iterations(0)
            .build();
        assert!(result.is_err());
    }

    #[test]
    fn test_message_user() {
        let msg = Message::user("Hello");
        assert!(matches!(msg.role, MessageRole::User));
        assert_eq!(msg.content.len(), 1);
        assert_eq!(msg.text_content(), "Hello");
        assert!(!msg.id.is_empty());
    }

    #[test]
    fn test_message_with_id_preserves_identity_across_reconstruction() {
        let original = Message::assistant(vec![ContentBlock::Text(TextBlock::new("draft"))]);
        let id = original.id.clone();
        let rewritten =
            Message::assistant(vec![ContentBlock::Text(TextBlock::new("final"))]).with_id(id.clone());
        assert_eq!(rewritten.id, id);
        assert_eq!(rewritten.text_content(), "final");
    }

    #[test]
    fn test_message_tool_result_wraps_single_block() {
        let block = ToolResultBlock::text("call_1", "add", "5");
        let msg = Message::tool_result(block);
        assert!(matches!(msg.role, MessageRole::Tool));
        assert_eq!(msg.tool_result_blocks().len(), 1);
        assert_eq!(msg.tool_result_blocks()[0].tool_use_id, "call_1");
    }

    #[test]
    fn test_content_blocks_filter_by_kind() {
        let msg = Message::assistant(vec![
            ContentBlock::Text(TextBlock::new("thinking out loud")),
            ContentBlock::ToolUse(ToolUseBlock::new("call_1", "add", serde_json::json!({"a": 1}))),
        ]);
        assert!(msg.has_content_blocks(ContentBlockKind::ToolUse));
        assert!(!msg.has_content_blocks(ContentBlockKind::Image));
        assert_eq!(msg.tool_use_blocks().len(), 1);
        assert_eq!(msg.tool_use_blocks()[0].name, "add");
    }

    #[test]
    fn test_tool_result_success_defaults_true_and_overridable() {
        let ok = ToolResultBlock::text("call_1", "add", "5");
        assert!(ok.is_success());

        let failed = ToolResultBlock::text("call_1", "add", "boom").with_success(false);
        assert!(!failed.is_success());
    }

    #[test]
    fn test_media_source_to_uri() {
        let url_source = MediaSource::Url("https://example.com/cat.jpg".to_string());
        assert_eq!(url_source.to_uri(), "https://example.com/cat.jpg");

        let b64_source = MediaSource::Base64 {
            data: "AAAA".to_string(),
            media_type: "image/png".to_string(),
        };
        assert_eq!(b64_source.to_uri(), "data:image/png;base64,AAAA");
    }

    #[test]
    fn test_merge_options_prefers_override() {
        let base = GenerateOptions {
            temperature: Some(0.7),
            max_tokens: Some(100),
            ..Default::default()
        };
        let override_opts = GenerateOptions {
            temperature: Some(0.1),
            tool_choice: Some(ToolChoice::specific("generate_response")),
            ..Default::default()
        };

        let merged = merge_options(&override_opts, &base);
        assert_eq!(merged.temperature, Some(0.1));
        assert_eq!(merged.max_tokens, Some(100));
        assert_eq!(merged.tool_choice, Some(ToolChoice::specific("generate_response")));
    }

    #[test]
    fn test_message_round_trips_through_json() {
        let msg = Message::user_with_image("Describe this", "https://example.com/x.jpg");
        let json = serde_json::to_string(&msg).unwrap();
        let parsed: Message = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.id, msg.id);
        assert_eq!(parsed.content.len(), 2);
    }
}
