//! Lifecycle hook pipeline for intercepting and controlling agent execution.
//!
//! A hook is `{priority, onEvent}`: lower priority runs earlier, and hooks registered at the
//! same priority run in registration order. Each lifecycle point threads a tagged [`HookEvent`]
//! value sequentially through the sorted hook list — `event₀ → hook₁ → event₁ → hook₂ → …` — and
//! every hook returns a (possibly mutated) event rather than mutating shared state. `stopAgent`
//! and `gotoReasoning` are bits carried in the event payload itself, settable only on the events
//! that legally support them.
//!
//! # Examples
//!
//! ```rust,no_run
//! use react_agent_runtime::hooks::{HookRegistry, HookEvent};
//!
//! let mut hooks = HookRegistry::new();
//! hooks.register(10, |event| async move {
//!     if let HookEvent::PreActing { mut tool_use, .. } = event {
//!         if tool_use.name == "delete_file" {
//!             tool_use.name = "noop".to_string();
//!         }
//!         HookEvent::PreActing { tool_use, agent: String::new(), timestamp: chrono::Utc::now() }
//!     } else {
//!         event
//!     }
//! });
//! ```

use crate::types::{GenerateOptions, Message, ToolResultBlock, ToolUseBlock};
use chrono::{DateTime, Utc};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

/// One lifecycle point in the reasoning/acting loop, carrying event-specific payload.
///
/// Every variant carries the emitting agent's name and a wall-clock timestamp. Fields are
/// public; a hook that wants to change something reconstructs the variant with new field
/// values and returns it — there is no shared mutable state to reach into.
#[derive(Debug, Clone)]
pub enum HookEvent {
    /// Fired before a `call`/`stream` entrypoint begins processing input messages.
    PreCall {
        /// Messages supplied by the caller for this entrypoint invocation.
        input: Vec<Message>,
        /// Name of the agent firing this event.
        agent: String,
        /// When this event was fired.
        timestamp: DateTime<Utc>,
    },
    /// Fired after the loop has produced its final message for this call.
    PostCall {
        /// The final message the call will return.
        message: Message,
        /// Name of the agent firing this event.
        agent: String,
        /// When this event was fired.
        timestamp: DateTime<Utc>,
    },
    /// Fired when a model, tool, or hook error is observed during a call.
    Error {
        /// Human-readable description of the error.
        message: String,
        /// Name of the agent firing this event.
        agent: String,
        /// When this event was fired.
        timestamp: DateTime<Utc>,
    },
    /// Fired before a reasoning (model) step begins.
    PreReasoning {
        /// Messages that will be sent as the model's input for this step.
        input: Vec<Message>,
        /// Generation parameters to merge over the agent's baseline options.
        generate_options_override: Option<GenerateOptions>,
        /// Name of the agent firing this event.
        agent: String,
        /// When this event was fired.
        timestamp: DateTime<Utc>,
    },
    /// Fired after a reasoning step completes and the reasoning message has been appended to
    /// memory.
    PostReasoning {
        /// The completed reasoning (assistant) message.
        reasoning_message: Message,
        /// Whether a hook has requested the loop terminate after this pipeline completes.
        stop_agent: bool,
        /// A message to append to memory and resume reasoning with, bypassing acting.
        goto_reasoning: Option<Message>,
        /// Name of the agent firing this event.
        agent: String,
        /// When this event was fired.
        timestamp: DateTime<Utc>,
    },
    /// Fired once per streamed reasoning chunk; read-only.
    ReasoningChunk {
        /// New content blocks introduced by this chunk only.
        incremental: Message,
        /// The reasoning message accumulated so far (same id throughout the stream).
        accumulated: Message,
        /// Name of the agent firing this event.
        agent: String,
        /// When this event was fired.
        timestamp: DateTime<Utc>,
    },
    /// Fired before a tool-use block is executed.
    PreActing {
        /// The tool-use block about to be invoked; a hook may rewrite it.
        tool_use: ToolUseBlock,
        /// Name of the agent firing this event.
        agent: String,
        /// When this event was fired.
        timestamp: DateTime<Utc>,
    },
    /// Fired after a tool-use block's result has been appended to memory.
    PostActing {
        /// The tool's result.
        tool_result: ToolResultBlock,
        /// Whether a hook has requested the loop terminate immediately after this tool.
        stop_agent: bool,
        /// Name of the agent firing this event.
        agent: String,
        /// When this event was fired.
        timestamp: DateTime<Utc>,
    },
    /// Fired once per streamed partial tool result; read-only.
    ActingChunk {
        /// Partial content produced by the tool so far.
        partial_result: ToolResultBlock,
        /// Name of the agent firing this event.
        agent: String,
        /// When this event was fired.
        timestamp: DateTime<Utc>,
    },
    /// Fired before the summary phase's model call, after the iteration bound is reached.
    PreSummary {
        /// Messages that will be sent as the model's input for the summary step.
        input: Vec<Message>,
        /// Generation parameters to merge over the agent's baseline options.
        generate_options_override: Option<GenerateOptions>,
        /// The iteration count reached (equal to `max_iterations`).
        iterations_run: u32,
        /// The configured iteration bound.
        max_iterations: u32,
        /// Name of the agent firing this event.
        agent: String,
        /// When this event was fired.
        timestamp: DateTime<Utc>,
    },
    /// Fired once per streamed summary chunk; read-only.
    SummaryChunk {
        /// New content blocks introduced by this chunk only.
        incremental: Message,
        /// The summary message accumulated so far.
        accumulated: Message,
        /// Name of the agent firing this event.
        agent: String,
        /// When this event was fired.
        timestamp: DateTime<Utc>,
    },
    /// Fired after the summary message has been constructed.
    PostSummary {
        /// The completed summary message.
        summary_message: Message,
        /// Whether a hook has requested the loop terminate (summary always terminates the
        /// loop; this exists for symmetry with the other `stopAgent`-bearing events).
        stop_agent: bool,
        /// Name of the agent firing this event.
        agent: String,
        /// When this event was fired.
        timestamp: DateTime<Utc>,
    },
}

impl HookEvent {
    /// Returns the name of the agent that fired this event.
    pub fn agent(&self) -> &str {
        match self {
            HookEvent::PreCall { agent, .. }
            | HookEvent::PostCall { agent, .. }
            | HookEvent::Error { agent, .. }
            | HookEvent::PreReasoning { agent, .. }
            | HookEvent::PostReasoning { agent, .. }
            | HookEvent::ReasoningChunk { agent, .. }
            | HookEvent::PreActing { agent, .. }
            | HookEvent::PostActing { agent, .. }
            | HookEvent::ActingChunk { agent, .. }
            | HookEvent::PreSummary { agent, .. }
            | HookEvent::SummaryChunk { agent, .. }
            | HookEvent::PostSummary { agent, .. } => agent,
        }
    }

    /// Returns this event's discriminant name, e.g. `"PreReasoning"`.
    pub fn kind(&self) -> &'static str {
        match self {
            HookEvent::PreCall { .. } => "PreCall",
            HookEvent::PostCall { .. } => "PostCall",
            HookEvent::Error { .. } => "Error",
            HookEvent::PreReasoning { .. } => "PreReasoning",
            HookEvent::PostReasoning { .. } => "PostReasoning",
            HookEvent::ReasoningChunk { .. } => "ReasoningChunk",
            HookEvent::PreActing { .. } => "PreActing",
            HookEvent::PostActing { .. } => "PostActing",
            HookEvent::ActingChunk { .. } => "ActingChunk",
            HookEvent::PreSummary { .. } => "PreSummary",
            HookEvent::SummaryChunk { .. } => "SummaryChunk",
            HookEvent::PostSummary { .. } => "PostSummary",
        }
    }
}

/// Type alias for a hook handler: an async function from event to (possibly mutated) event.
pub type HookHandler =
    Arc<dyn Fn(HookEvent) -> Pin<Box<dyn Future<Output = HookEvent> + Send>> + Send + Sync>;

#[derive(Clone)]
struct RegisteredHook {
    priority: i32,
    order: usize,
    handler: HookHandler,
}

/// An ordered collection of hooks, sorted by priority (ascending) with registration order as
/// the tie-break, applied to every [`HookEvent`] fired during a call.
#[derive(Clone, Default)]
pub struct HookRegistry {
    hooks: Vec<RegisteredHook>,
    next_order: usize,
}

impl HookRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a hook at the given priority. Lower priority values run earlier; hooks sharing
    /// a priority run in the order they were registered.
    pub fn register<F, Fut>(&mut self, priority: i32, handler: F)
    where
        F: Fn(HookEvent) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HookEvent> + Send + 'static,
    {
        let order = self.next_order;
        self.next_order += 1;
        self.hooks.push(RegisteredHook {
            priority,
            order,
            handler: Arc::new(move |event| Box::pin(handler(event))),
        });
        self.hooks.sort_by_key(|h| (h.priority, h.order));
    }

    /// Returns the number of registered hooks.
    pub fn len(&self) -> usize {
        self.hooks.len()
    }

    /// Returns whether no hooks are registered.
    pub fn is_empty(&self) -> bool {
        self.hooks.is_empty()
    }

    /// Appends every hook in `other` to this registry, re-sorting by priority. Used to splice a
    /// call's transient hooks (e.g. the streaming projection, structured-output controller) onto
    /// a clone of the durable registry without disturbing the durable registry itself.
    pub fn extend(&mut self, other: &HookRegistry) {
        for hook in &other.hooks {
            let order = self.next_order;
            self.next_order += 1;
            self.hooks.push(RegisteredHook {
                priority: hook.priority,
                order,
                handler: hook.handler.clone(),
            });
        }
        self.hooks.sort_by_key(|h| (h.priority, h.order));
    }

    /// Threads `event` through every registered hook in priority order, returning the final
    /// (possibly mutated) event.
    pub async fn run(&self, mut event: HookEvent) -> HookEvent {
        for hook in &self.hooks {
            event = (hook.handler)(event).await;
        }
        event
    }
}

impl std::fmt::Debug for HookRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HookRegistry")
            .field("hooks", &format!("{} handlers", self.hooks.len()))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ContentBlock, TextBlock};

    fn now_event(agent: &str, input: Vec<Message>) -> HookEvent {
        HookEvent::PreCall {
            input,
            agent: agent.to_string(),
            timestamp: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_hooks_run_in_priority_order() {
        let mut registry = HookRegistry::new();
        let trace = Arc::new(tokio::sync::Mutex::new(Vec::new()));

        let trace_a = trace.clone();
        registry.register(10, move |event| {
            let trace_a = trace_a.clone();
            async move {
                trace_a.lock().await.push("second");
                event
            }
        });

        let trace_b = trace.clone();
        registry.register(0, move |event| {
            let trace_b = trace_b.clone();
            async move {
                trace_b.lock().await.push("first");
                event
            }
        });

        registry.run(now_event("agent", vec![])).await;
        let observed = trace.lock().await.clone();
        assert_eq!(observed, vec!["first", "second"]);
    }

    #[tokio::test]
    async fn test_same_priority_preserves_registration_order() {
        let mut registry = HookRegistry::new();
        let trace = Arc::new(tokio::sync::Mutex::new(Vec::new()));

        for label in ["a", "b", "c"] {
            let trace = trace.clone();
            registry.register(5, move |event| {
                let trace = trace.clone();
                async move {
                    trace.lock().await.push(label);
                    event
                }
            });
        }

        registry.run(now_event("agent", vec![])).await;
        assert_eq!(*trace.lock().await, vec!["a", "b", "c"]);
    }

    #[tokio::test]
    async fn test_hook_can_rewrite_event() {
        let mut registry = HookRegistry::new();
        registry.register(0, |event| async move {
            match event {
                HookEvent::PreCall {
                    mut input,
                    agent,
                    timestamp,
                } => {
                    input.push(Message::user("injected"));
                    HookEvent::PreCall {
                        input,
                        agent,
                        timestamp,
                    }
                }
                other => other,
            }
        });

        let result = registry.run(now_event("agent", vec![])).await;
        match result {
            HookEvent::PreCall { input, .. } => {
                assert_eq!(input.len(), 1);
                assert_eq!(input[0].text_content(), "injected");
            }
            _ => panic!("expected PreCall"),
        }
    }

    #[tokio::test]
    async fn test_post_reasoning_stop_agent_bit() {
        let mut registry = HookRegistry::new();
        registry.register(0, |event| async move {
            match event {
                HookEvent::PostReasoning {
                    reasoning_message,
                    goto_reasoning,
                    agent,
                    timestamp,
                    ..
                } => HookEvent::PostReasoning {
                    reasoning_message,
                    stop_agent: true,
                    goto_reasoning,
                    agent,
                    timestamp,
                },
                other => other,
            }
        });

        let event = HookEvent::PostReasoning {
            reasoning_message: Message::assistant(vec![ContentBlock::Text(TextBlock::new("hi"))]),
            stop_agent: false,
            goto_reasoning: None,
            agent: "agent".to_string(),
            timestamp: Utc::now(),
        };

        let result = registry.run(event).await;
        match result {
            HookEvent::PostReasoning { stop_agent, .. } => assert!(stop_agent),
            _ => panic!("expected PostReasoning"),
        }
    }

    #[tokio::test]
    async fn test_extend_appends_other_registrys_hooks() {
        let mut durable = HookRegistry::new();
        let trace = Arc::new(tokio::sync::Mutex::new(Vec::new()));

        let trace_a = trace.clone();
        durable.register(0, move |event| {
            let trace_a = trace_a.clone();
            async move {
                trace_a.lock().await.push("durable");
                event
            }
        });

        let mut transient = HookRegistry::new();
        let trace_b = trace.clone();
        transient.register(0, move |event| {
            let trace_b = trace_b.clone();
            async move {
                trace_b.lock().await.push("transient");
                event
            }
        });

        let mut per_call = durable.clone();
        per_call.extend(&transient);
        assert_eq!(per_call.len(), 2);

        per_call.run(now_event("agent", vec![])).await;
        assert_eq!(*trace.lock().await, vec!["durable", "transient"]);
    }

    #[test]
    fn test_event_kind_and_agent() {
        let event = HookEvent::Error {
            message: "boom".to_string(),
            agent: "worker".to_string(),
            timestamp: Utc::now(),
        };
        assert_eq!(event.kind(), "Error");
        assert_eq!(event.agent(), "worker");
    }
}
