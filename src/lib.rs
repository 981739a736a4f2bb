//! # React Agent Runtime
//!
//! A production-ready, streaming-first Rust runtime for building ReAct-style
//! (reason + act) agents against local OpenAI-compatible servers.
//!
//! ## Overview
//!
//! This crate provides a control loop that alternates between reasoning turns
//! (asking the model what to do next) and acting turns (invoking tools and
//! feeding results back), plus the scaffolding around it: lifecycle hooks,
//! streaming projection, structured-output enforcement, cooperative
//! interruption, and a publish/subscribe bus for multi-agent coordination.
//! It targets local LLM servers such as:
//! - LM Studio
//! - Ollama
//! - llama.cpp
//! - vLLM
//!
//! ## Key Features
//!
//! - **Reason + Act loop**: bounded iteration between model reasoning and tool
//!   execution, with an optional summary phase when the iteration budget runs out
//! - **Streaming Responses**: real-time token-by-token and tool-call projection
//! - **Tool Calling**: define and execute tools with automatic schema generation
//! - **Structured Output**: enforce a JSON schema on the final answer
//! - **Lifecycle Hooks**: intercept and control execution at every loop stage
//! - **Interrupts**: gracefully cancel long-running calls mid-reasoning or mid-acting
//! - **Multi-Agent Bus**: subscribe observers to an agent's completed turns
//! - **Context Management**: manual token estimation and history truncation
//! - **Retry Logic**: exponential backoff with jitter for transient failures
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use react_agent_runtime::{Agent, AgentOptions, Message};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let options = AgentOptions::builder()
//!         .system_prompt("You are a helpful assistant")
//!         .model("qwen2.5-32b-instruct")
//!         .base_url("http://localhost:1234/v1")
//!         .build()?;
//!
//!     let agent = Agent::new("assistant", "a helpful assistant", options)?;
//!
//!     let reply = agent.call(vec![Message::user("What's the capital of France?")]).await?;
//!     println!("{}", reply.text_content());
//!
//!     Ok(())
//! }
//! ```
//!
//! ### Streaming
//!
//! Wrap the agent in an `Arc` to stream incremental reasoning, tool-call, and
//! tool-result events as they happen:
//!
//! ```rust,no_run
//! use react_agent_runtime::{Agent, AgentOptions, Message, StreamOptions};
//! use futures::StreamExt;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let options = AgentOptions::builder()
//!         .model("qwen2.5-32b-instruct")
//!         .base_url("http://localhost:1234/v1")
//!         .build()?;
//!
//!     let agent = Arc::new(Agent::new("assistant", "a helpful assistant", options)?);
//!
//!     let mut events = agent.stream(vec![Message::user("What's 2+2?")], StreamOptions::default());
//!     while let Some(event) = events.next().await {
//!         println!("{:?}", event.event_type);
//!     }
//!
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! The crate is organized into modules, each with a specific responsibility:
//!
//! - **agent**: `Agent`, the public entry point wrapping the loop, hooks, memory, and bus
//! - **react**: the reason/act control loop itself
//! - **model**: the `ModelClient` seam and the OpenAI-compatible implementation
//! - **structured**: schema-constrained final-answer enforcement
//! - **stream**: projection of hook events onto a public `StreamEvent` sequence
//! - **hooks**: lifecycle event system for intercepting execution
//! - **interrupt**: cooperative cancellation signaling
//! - **bus**: publish/subscribe fan-out of completed turns to other agents
//! - **memory**: conversation history storage
//! - **toolkit**: tool registration and invocation
//! - **types**: data structures for messages, content blocks, and configuration
//! - **tools**: tool definition system with automatic JSON schema generation
//! - **config**: provider-specific configuration helpers
//! - **error**: comprehensive error types and conversions
//! - **context**: token estimation and message truncation utilities
//! - **retry**: exponential backoff retry logic with jitter
//! - **utils**: internal utilities for SSE parsing and tool-call aggregation

// ============================================================================
// MODULE DECLARATIONS
// ============================================================================
// These modules are private (internal implementation details) unless explicitly
// re-exported through `pub use` statements below.

/// The public agent type: composes the control loop, hooks, memory, interrupts,
/// and bus subscriptions behind `call`/`stream`.
mod agent;

/// Publish/subscribe fan-out of completed turns, for wiring one agent's
/// output into another agent's input.
mod bus;

/// Provider configuration helpers for LM Studio, Ollama, llama.cpp, and vLLM.
/// Simplifies endpoint and model name resolution with environment variable support.
mod config;

/// Context window management utilities for token estimation and history truncation.
/// Provides manual control over conversation memory to prevent context overflow.
mod context;

/// Error types and conversions for comprehensive error handling throughout the crate.
/// Defines the `Error` enum and `Result<T>` type alias used across all public APIs.
mod error;

/// Lifecycle hooks system for intercepting and controlling execution at key points.
/// Enables security gates, audit logging, input/output modification, and compliance checks.
mod hooks;

/// Cooperative interruption signaling checked between reasoning and acting steps.
mod interrupt;

/// Conversation history storage behind the `Memory` trait, with an in-memory default.
mod memory;

/// The reason/act control loop: alternates model reasoning with tool execution
/// until a final answer, the iteration budget, or an interrupt ends the call.
mod react;

/// Model client seam and the OpenAI-compatible HTTP implementation.
mod model;

/// Projects hook events onto a public, consumer-facing streaming event sequence.
mod stream;

/// Schema-constrained structured output: forces and validates a final JSON answer.
mod structured;

/// Tool registration and dispatch used by the control loop during acting steps.
mod toolkit;

/// Tool definition and execution system with automatic JSON schema generation.
/// Allows LLMs to call Rust functions with type-safe parameter handling.
mod tools;

/// Core type definitions for messages, content blocks, and agent configuration.
/// Includes builder patterns for ergonomic configuration and OpenAI API serialization.
mod types;

/// Internal utilities for Server-Sent Events (SSE) parsing and tool call aggregation.
/// Handles the low-level details of streaming response parsing.
mod utils;

// ============================================================================
// PUBLIC EXPORTS
// ============================================================================
// These items form the public API of the crate. Everything else is internal.

/// Retry utilities with exponential backoff and jitter.
/// Made public as a module so users can access retry configuration and functions
/// for their own operations that need retry logic.
pub mod retry;

// --- Agent ---

pub use agent::Agent;

// --- Multi-Agent Bus ---

pub use bus::{Observer, SharedObserver, SubscriberMap};

// --- Provider Configuration ---

pub use config::{Provider, get_base_url, get_model};

// --- Context Management ---

pub use context::{estimate_tokens, is_approaching_limit, truncate_messages};

// --- Error Handling ---

pub use error::{Error, Result};

// --- Lifecycle Hooks ---

pub use hooks::{HookEvent, HookRegistry};

// --- Interrupts ---

pub use interrupt::{InterruptContext, InterruptFlag};

// --- Memory ---

pub use memory::{InMemoryHistory, Memory};

// --- Model Client ---

pub use model::{ChatResponse, ContentStream, ModelClient, OpenAiCompatibleModel};

// --- Streaming ---

pub use stream::{EventStream, StreamEvent, StreamEventType, StreamOptions};

// --- Structured Output ---

pub use structured::{ReminderMode, StructuredOutputConfig};

// --- Toolkit ---

pub use toolkit::Toolkit;

// --- Tool System ---

pub use tools::{Tool, ToolBuilder, tool};

// --- Core Types ---

pub use types::{
    AgentOptions, AgentOptionsBuilder, AudioBlock, ContentBlock, ContentBlockKind,
    GenerateOptions, ImageBlock, ImageDetail, MediaSource, Message, MessageRole, TextBlock,
    ThinkingBlock, ToolChoice, ToolResultBlock, ToolUseBlock, VideoBlock, metadata_keys,
};

// ============================================================================
// CONVENIENCE PRELUDE
// ============================================================================

/// Convenience module containing the most commonly used types and functions.
/// Import with `use react_agent_runtime::prelude::*;` to get everything you need
/// for typical usage.
///
/// This includes:
/// - Configuration: `AgentOptions`, `AgentOptionsBuilder`
/// - Agent: `Agent`
/// - Content: `ContentBlock`, `TextBlock`, `ToolUseBlock`, `ToolResultBlock`
/// - Tools: `Tool`, `tool()`
/// - Hooks: `HookEvent`, `HookRegistry`
/// - Streaming: `StreamEvent`, `StreamOptions`
/// - Errors: `Error`, `Result`
pub mod prelude {
    pub use crate::{
        Agent, AgentOptions, AgentOptionsBuilder, ContentBlock, Error, HookEvent, HookRegistry,
        Message, Result, StreamEvent, StreamOptions, TextBlock, Tool, ToolResultBlock,
        ToolUseBlock, tool,
    };
}
