//! The reasoning/acting control loop.
//!
//! [`run`] drives one call's worth of iterations: a reasoning step against the model, then an
//! acting step per tool-use block the model requested, until the model answers directly, a hook
//! stops the loop early, or `max_iterations` is reached and the loop falls through to a summary
//! step. Every suspension point (model chunk, tool invocation, hook pipeline) is a cooperative
//! interrupt checkpoint.

use crate::hooks::{HookEvent, HookRegistry};
use crate::interrupt::InterruptFlag;
use crate::memory::Memory;
use crate::model::ModelClient;
use crate::toolkit::Toolkit;
use crate::types::{
    merge_options, metadata_keys, ContentBlock, GenerateOptions, Message, Metadata, ToolResultBlock,
    ToolUseBlock,
};
use crate::{Error, Result};
use chrono::Utc;
use futures::stream::StreamExt;

/// Top-level keys a tool's JSON result may carry that are promoted into the wrapping
/// `ToolResultBlock`'s metadata instead of its visible text content — e.g. the structured-output
/// controller's synthetic tool embeds `response_msg` this way (see `structured.rs`).
const RESERVED_RESULT_METADATA_KEYS: [&str; 2] = ["success", metadata_keys::RESPONSE_MSG];

/// Wraps a tool's successful JSON result as a [`ToolResultBlock`], lifting any
/// [`RESERVED_RESULT_METADATA_KEYS`] present at the top level out of the visible content and
/// into the block's metadata.
fn tool_result_from_value(tool_use_id: &str, tool_name: &str, mut value: serde_json::Value) -> ToolResultBlock {
    let mut metadata: Option<Metadata> = None;
    if let Some(object) = value.as_object_mut() {
        for key in RESERVED_RESULT_METADATA_KEYS {
            if let Some(extracted) = object.remove(key) {
                metadata.get_or_insert_with(Metadata::new).insert(key.to_string(), extracted);
            }
        }
    }
    let block = ToolResultBlock::from_json(tool_use_id, tool_name, &value);
    match metadata {
        Some(metadata) => block.with_metadata(metadata),
        None => block,
    }
}

/// Everything one reasoning/acting loop invocation needs, borrowed for the duration of the call.
pub struct ReactConfig<'a> {
    /// Name of the agent firing hook events.
    pub agent_name: &'a str,
    /// Model transport used for every reasoning and summary step.
    pub model: &'a dyn ModelClient,
    /// Per-call toolkit (may include a structured-output synthetic tool).
    pub toolkit: &'a Toolkit,
    /// Per-call hook registry (durable hooks plus any transient ones for this call).
    pub hooks: &'a HookRegistry,
    /// Cooperative interrupt flag shared with the call's caller.
    pub interrupt: &'a InterruptFlag,
    /// Baseline generation parameters; `PreReasoning`/`PreSummary` hooks may override per step.
    pub generate_options: &'a GenerateOptions,
    /// Maximum number of reasoning/acting iterations before the summary phase.
    pub max_iterations: u32,
    /// Instruction appended when synthesizing the summary phase's model input.
    pub summary_instruction: &'a str,
}

/// Runs the loop to completion, returning the message `Agent::call`/`Agent::stream` should
/// return: a direct answer, a tool result that a hook stopped the loop on, or a summary.
///
/// `input` is the (possibly `PreCall`-hook-rewritten) caller input for this invocation. It is
/// validated against any tool-use blocks still pending from a previous call before being appended
/// to `memory`.
pub async fn run(memory: &mut dyn Memory, input: Vec<Message>, config: &ReactConfig<'_>) -> Result<Message> {
    check_pending_tool_calls(&memory.get_messages(), &input)?;
    for message in input {
        memory.add_message(message);
    }

    // A previous call may have been stopped mid-acting (via `stopAgent` or interruption) with
    // tool-use blocks still unresolved. `check_pending_tool_calls` already required this call's
    // input to either be empty or to resolve some/all of them; whatever remains pending now
    // resumes the acting phase before a fresh reasoning step runs.
    let resume_tool_uses = pending_tool_uses(&memory.get_messages());
    if !resume_tool_uses.is_empty() {
        if let Some(final_message) = run_acting_phase(memory, config, resume_tool_uses).await? {
            return Ok(final_message);
        }
    }

    for iteration in 1..=config.max_iterations {
        config.interrupt.check()?;

        let (reasoning_message, stop_agent, goto_reasoning) = run_reasoning_step(
            memory,
            config,
            HookEvent::PreReasoning {
                input: memory.get_messages(),
                generate_options_override: None,
                agent: config.agent_name.to_string(),
                timestamp: Utc::now(),
            },
        )
        .await?;

        if stop_agent {
            return Ok(reasoning_message);
        }
        if let Some(goto) = goto_reasoning {
            memory.add_message(goto);
            continue;
        }

        let tool_uses: Vec<_> = reasoning_message.tool_use_blocks().into_iter().cloned().collect();
        let has_text = !reasoning_message.text_content().trim().is_empty();

        if tool_uses.is_empty() {
            if iteration == 1 && has_text {
                return Ok(reasoning_message);
            }
            if iteration == config.max_iterations {
                break;
            }
            continue;
        }

        if let Some(final_message) = run_acting_phase(memory, config, tool_uses).await? {
            return Ok(final_message);
        }
    }

    run_summary_phase(memory, config).await
}

/// Runs the acting phase for `tool_uses` in order: `PreActing`, invocation, memory append,
/// `PostActing`. Returns `Some(message)` if a `PostActing` hook requested the loop stop, in which
/// case the caller should return that message as final immediately; `None` once every tool-use
/// block has been resolved.
async fn run_acting_phase(
    memory: &mut dyn Memory,
    config: &ReactConfig<'_>,
    tool_uses: Vec<ToolUseBlock>,
) -> Result<Option<Message>> {
    for tool_use in tool_uses {
        config.interrupt.check()?;

        let pre_acting = config
            .hooks
            .run(HookEvent::PreActing {
                tool_use: tool_use.clone(),
                agent: config.agent_name.to_string(),
                timestamp: Utc::now(),
            })
            .await;
        let tool_use = match pre_acting {
            HookEvent::PreActing { tool_use, .. } => tool_use,
            _ => unreachable!("hook pipeline preserved PreActing's variant"),
        };

        let tool_result = match config.toolkit.invoke(&tool_use.name, tool_use.input.clone()).await {
            Ok(value) => tool_result_from_value(&tool_use.id, &tool_use.name, value),
            Err(err) => {
                ToolResultBlock::text(&tool_use.id, &tool_use.name, format!("Error: {err}"))
                    .with_success(false)
            }
        };

        memory.add_message(Message::tool_result(tool_result.clone()));

        // `ActingChunk` is only fired by tool invocations that actually stream partial results;
        // the toolkit's `invoke` resolves a single tool call to one final value, so there is
        // nothing partial to project here (see `src/stream.rs`'s projection table).

        let post_acting = config
            .hooks
            .run(HookEvent::PostActing {
                tool_result,
                stop_agent: false,
                agent: config.agent_name.to_string(),
                timestamp: Utc::now(),
            })
            .await;
        let (tool_result, stop_agent) = match post_acting {
            HookEvent::PostActing { tool_result, stop_agent, .. } => (tool_result, stop_agent),
            _ => unreachable!("hook pipeline preserved PostActing's variant"),
        };

        if stop_agent {
            return Ok(Some(Message::tool_result(tool_result)));
        }
    }

    Ok(None)
}

/// Runs one reasoning step: fires `PreReasoning`, streams the model's response (firing
/// `ReasoningChunk` per content block), appends the reasoning message to memory, and fires
/// `PostReasoning`. Returns the (possibly hook-rewritten) reasoning message plus the
/// `stop_agent`/`goto_reasoning` bits `PostReasoning` settled on.
async fn run_reasoning_step(
    memory: &mut dyn Memory,
    config: &ReactConfig<'_>,
    pre_reasoning: HookEvent,
) -> Result<(Message, bool, Option<Message>)> {
    let pre = config.hooks.run(pre_reasoning).await;
    let (reasoning_input, options_override) = match pre {
        HookEvent::PreReasoning { input, generate_options_override, .. } => {
            (input, generate_options_override)
        }
        _ => unreachable!("hook pipeline preserved PreReasoning's variant"),
    };

    let effective_options = match &options_override {
        Some(over) => merge_options(over, config.generate_options),
        None => config.generate_options.clone(),
    };

    config.interrupt.check()?;

    let tools = config.toolkit.list();
    let mut stream = config.model.stream(&reasoning_input, &tools, &effective_options).await?;

    let message_id = uuid::Uuid::new_v4().to_string();
    let mut blocks: Vec<ContentBlock> = Vec::new();
    while let Some(block) = stream.next().await {
        config.interrupt.check()?;
        let block = block?;
        blocks.push(block.clone());

        let incremental = Message::assistant(vec![block]).with_id(message_id.clone());
        let accumulated = Message::assistant(blocks.clone()).with_id(message_id.clone());
        config
            .hooks
            .run(HookEvent::ReasoningChunk {
                incremental,
                accumulated,
                agent: config.agent_name.to_string(),
                timestamp: Utc::now(),
            })
            .await;
    }

    // An empty model stream (no content blocks at all) is treated as an empty assistant message
    // rather than an error, so the loop can still apply its no-tools/no-progress handling to it.
    let reasoning_message = Message::assistant(blocks).with_id(message_id);
    memory.add_message(reasoning_message.clone());

    let post = config
        .hooks
        .run(HookEvent::PostReasoning {
            reasoning_message,
            stop_agent: false,
            goto_reasoning: None,
            agent: config.agent_name.to_string(),
            timestamp: Utc::now(),
        })
        .await;

    match post {
        HookEvent::PostReasoning { reasoning_message, stop_agent, goto_reasoning, .. } => {
            Ok((reasoning_message, stop_agent, goto_reasoning))
        }
        _ => unreachable!("hook pipeline preserved PostReasoning's variant"),
    }
}

async fn run_summary_phase(memory: &mut dyn Memory, config: &ReactConfig<'_>) -> Result<Message> {
    let mut input = memory.get_messages();
    input.push(Message::user(config.summary_instruction));

    let pre = config
        .hooks
        .run(HookEvent::PreSummary {
            input,
            generate_options_override: None,
            iterations_run: config.max_iterations,
            max_iterations: config.max_iterations,
            agent: config.agent_name.to_string(),
            timestamp: Utc::now(),
        })
        .await;
    let (summary_input, options_override) = match pre {
        HookEvent::PreSummary { input, generate_options_override, .. } => {
            (input, generate_options_override)
        }
        _ => unreachable!("hook pipeline preserved PreSummary's variant"),
    };

    let effective_options = match &options_override {
        Some(over) => merge_options(over, config.generate_options),
        None => config.generate_options.clone(),
    };

    let tools = config.toolkit.list();
    let mut stream = config.model.stream(&summary_input, &tools, &effective_options).await?;

    let message_id = uuid::Uuid::new_v4().to_string();
    let mut blocks: Vec<ContentBlock> = Vec::new();
    while let Some(block) = stream.next().await {
        let block = block?;
        blocks.push(block.clone());

        let incremental = Message::assistant(vec![block]).with_id(message_id.clone());
        let accumulated = Message::assistant(blocks.clone()).with_id(message_id.clone());
        config
            .hooks
            .run(HookEvent::SummaryChunk {
                incremental,
                accumulated,
                agent: config.agent_name.to_string(),
                timestamp: Utc::now(),
            })
            .await;
    }

    let summary_message = Message::assistant(blocks).with_id(message_id);
    memory.add_message(summary_message.clone());

    let post = config
        .hooks
        .run(HookEvent::PostSummary {
            summary_message,
            stop_agent: true,
            agent: config.agent_name.to_string(),
            timestamp: Utc::now(),
        })
        .await;

    match post {
        HookEvent::PostSummary { summary_message, .. } => Ok(summary_message),
        _ => unreachable!("hook pipeline preserved PostSummary's variant"),
    }
}

/// Checks the precondition the ReAct loop's entry imposes when the previous call left tool-use
/// blocks in the last assistant message unresolved: new `input` may only be empty, a sequence of
/// tool-result messages that resolve some or all of them, or (if every pending id gets resolved
/// along the way) followed by further input. A plain user/assistant message arriving before every
/// pending id is resolved is rejected with [`Error::PendingToolCalls`].
fn check_pending_tool_calls(history: &[Message], input: &[Message]) -> Result<()> {
    let mut pending = pending_tool_use_ids(history);
    if pending.is_empty() {
        return Ok(());
    }

    for message in input {
        match message.role {
            crate::types::MessageRole::Tool => {
                for result in message.tool_result_blocks() {
                    pending.retain(|id| id != &result.tool_use_id);
                }
            }
            _ if pending.is_empty() => {}
            _ => return Err(Error::pending_tool_calls(pending.len())),
        }
    }
    Ok(())
}

fn pending_tool_use_ids(history: &[Message]) -> Vec<String> {
    pending_tool_uses(history).into_iter().map(|t| t.id).collect()
}

/// Tool-use blocks from the most recent assistant message that carried any, minus whichever of
/// them a later tool-result message in `history` already resolved, in their original order.
fn pending_tool_uses(history: &[Message]) -> Vec<ToolUseBlock> {
    let Some((assistant_index, assistant_message)) = history
        .iter()
        .enumerate()
        .rev()
        .find(|(_, m)| matches!(m.role, crate::types::MessageRole::Assistant) && !m.tool_use_blocks().is_empty())
    else {
        return Vec::new();
    };

    let mut pending: Vec<ToolUseBlock> = assistant_message.tool_use_blocks().into_iter().cloned().collect();
    for message in &history[assistant_index + 1..] {
        for result in message.tool_result_blocks() {
            pending.retain(|t| t.id != result.tool_use_id);
        }
    }
    pending
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::InMemoryHistory;
    use crate::model::ChatResponse;
    use crate::types::{AgentOptions, TextBlock, ToolUseBlock};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct ScriptedModel {
        responses: std::sync::Mutex<Vec<Vec<ContentBlock>>>,
        calls: AtomicUsize,
    }

    impl ScriptedModel {
        fn new(responses: Vec<Vec<ContentBlock>>) -> Self {
            Self { responses: std::sync::Mutex::new(responses), calls: AtomicUsize::new(0) }
        }
    }

    #[async_trait]
    impl ModelClient for ScriptedModel {
        async fn stream(
            &self,
            _messages: &[Message],
            _tools: &[Arc<crate::tools::Tool>],
            _options: &GenerateOptions,
        ) -> Result<crate::model::ContentStream> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let mut responses = self.responses.lock().unwrap();
            let blocks = if responses.is_empty() { Vec::new() } else { responses.remove(0) };
            Ok(Box::pin(futures::stream::iter(blocks.into_iter().map(Ok))))
        }

        async fn generate(
            &self,
            messages: &[Message],
            tools: &[Arc<crate::tools::Tool>],
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

    fn text_blocks(text: &str) -> Vec<ContentBlock> {
        vec![ContentBlock::Text(TextBlock::new(text))]
    }

    fn base_options() -> AgentOptions {
        AgentOptions::builder().model("test").base_url("http://x").api_key("k").build().unwrap()
    }

    #[tokio::test]
    async fn test_direct_answer_on_first_iteration_with_no_tools() {
        let model = ScriptedModel::new(vec![text_blocks("hello there")]);
        let toolkit = Toolkit::new();
        let hooks = HookRegistry::new();
        let interrupt = InterruptFlag::new();
        let options = base_options();

        let config = ReactConfig {
            agent_name: "agent",
            model: &model,
            toolkit: &toolkit,
            hooks: &hooks,
            interrupt: &interrupt,
            generate_options: options.generate_options(),
            max_iterations: 5,
            summary_instruction: "summarize",
        };

        let mut memory = InMemoryHistory::new();
        let result = run(&mut memory, vec![Message::user("hi")], &config).await.unwrap();
        assert_eq!(result.text_content(), "hello there");
        assert_eq!(model.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_tool_call_then_direct_answer() {
        let model = ScriptedModel::new(vec![
            vec![ContentBlock::ToolUse(ToolUseBlock::new("call_1", "echo", serde_json::json!({"v": 1})))],
            text_blocks("done"),
        ]);
        let mut toolkit = Toolkit::new();
        toolkit.register(Arc::new(crate::tools::Tool::new(
            "echo",
            "echoes",
            serde_json::json!({}),
            |args| async move { Ok(args) },
        )));
        let hooks = HookRegistry::new();
        let interrupt = InterruptFlag::new();
        let options = base_options();

        let config = ReactConfig {
            agent_name: "agent",
            model: &model,
            toolkit: &toolkit,
            hooks: &hooks,
            interrupt: &interrupt,
            generate_options: options.generate_options(),
            max_iterations: 5,
            summary_instruction: "summarize",
        };

        let mut memory = InMemoryHistory::new();
        let result = run(&mut memory, vec![Message::user("use the tool")], &config).await.unwrap();
        assert_eq!(result.text_content(), "done");
    }

    #[tokio::test]
    async fn test_iteration_bound_falls_through_to_summary() {
        let tool_use = vec![ContentBlock::ToolUse(ToolUseBlock::new("call_1", "echo", serde_json::json!({})))];
        let model = ScriptedModel::new(vec![tool_use.clone(), tool_use.clone(), text_blocks("final summary")]);
        let mut toolkit = Toolkit::new();
        toolkit.register(Arc::new(crate::tools::Tool::new(
            "echo",
            "echoes",
            serde_json::json!({}),
            |args| async move { Ok(args) },
        )));
        let hooks = HookRegistry::new();
        let interrupt = InterruptFlag::new();
        let options = base_options();

        let config = ReactConfig {
            agent_name: "agent",
            model: &model,
            toolkit: &toolkit,
            hooks: &hooks,
            interrupt: &interrupt,
            generate_options: options.generate_options(),
            max_iterations: 2,
            summary_instruction: "summarize",
        };

        let mut memory = InMemoryHistory::new();
        let result = run(&mut memory, vec![Message::user("go")], &config).await.unwrap();
        assert_eq!(result.text_content(), "final summary");
    }

    #[tokio::test]
    async fn test_resume_with_no_input_executes_pending_tool_use_without_a_fresh_reasoning_call() {
        // Simulates a prior call stopped by `stopAgent` on `PostActing` before t1 ran: memory
        // already holds the assistant message with the pending tool-use block. A resume call
        // with no input must execute it directly rather than asking the model to reason again.
        let model = ScriptedModel::new(vec![text_blocks("after resume")]);
        let mut toolkit = Toolkit::new();
        toolkit.register(Arc::new(crate::tools::Tool::new(
            "echo",
            "echoes",
            serde_json::json!({}),
            |args| async move { Ok(args) },
        )));
        let hooks = HookRegistry::new();
        let interrupt = InterruptFlag::new();
        let options = base_options();

        let config = ReactConfig {
            agent_name: "agent",
            model: &model,
            toolkit: &toolkit,
            hooks: &hooks,
            interrupt: &interrupt,
            generate_options: options.generate_options(),
            max_iterations: 5,
            summary_instruction: "summarize",
        };

        let mut memory = InMemoryHistory::new();
        memory.add_message(Message::user("use the tool"));
        memory.add_message(Message::assistant(vec![ContentBlock::ToolUse(ToolUseBlock::new(
            "call_1", "echo", serde_json::json!({"v": 1}),
        ))]));

        let result = run(&mut memory, vec![], &config).await.unwrap();

        assert_eq!(result.text_content(), "after resume");
        assert_eq!(model.calls.load(Ordering::SeqCst), 1);
        let tool_results = memory.get_messages().iter().flat_map(|m| m.tool_result_blocks()).count();
        assert_eq!(tool_results, 1);
    }

    #[tokio::test]
    async fn test_interrupt_checked_before_reasoning() {
        let model = ScriptedModel::new(vec![text_blocks("should not run")]);
        let toolkit = Toolkit::new();
        let hooks = HookRegistry::new();
        let interrupt = InterruptFlag::new();
        interrupt.request(crate::interrupt::InterruptContext::user());
        let options = base_options();

        let config = ReactConfig {
            agent_name: "agent",
            model: &model,
            toolkit: &toolkit,
            hooks: &hooks,
            interrupt: &interrupt,
            generate_options: options.generate_options(),
            max_iterations: 3,
            summary_instruction: "summarize",
        };

        let mut memory = InMemoryHistory::new();
        let result = run(&mut memory, vec![Message::user("hi")], &config).await;
        assert!(matches!(result, Err(Error::Interrupted)));
        assert_eq!(model.calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_pending_tool_calls_rejects_plain_user_message() {
        let assistant = Message::assistant(vec![ContentBlock::ToolUse(ToolUseBlock::new(
            "call_1", "echo", serde_json::json!({}),
        ))]);
        let history = vec![Message::user("go"), assistant];
        let input = vec![Message::user("interrupting with something else")];
        assert!(matches!(
            check_pending_tool_calls(&history, &input),
            Err(Error::PendingToolCalls(1))
        ));
    }

    #[test]
    fn test_pending_tool_calls_accepts_matching_tool_result() {
        let assistant = Message::assistant(vec![ContentBlock::ToolUse(ToolUseBlock::new(
            "call_1", "echo", serde_json::json!({}),
        ))]);
        let history = vec![Message::user("go"), assistant];
        let input = vec![Message::tool_result(ToolResultBlock::text("call_1", "echo", "ok"))];
        assert!(check_pending_tool_calls(&history, &input).is_ok());
    }

    #[test]
    fn test_pending_tool_calls_accepts_empty_input_to_resume() {
        let assistant = Message::assistant(vec![ContentBlock::ToolUse(ToolUseBlock::new(
            "call_1", "echo", serde_json::json!({}),
        ))]);
        let history = vec![Message::user("go"), assistant];
        assert!(check_pending_tool_calls(&history, &[]).is_ok());
    }

    #[test]
    fn test_no_pending_tool_calls_when_already_resolved() {
        let assistant = Message::assistant(vec![ContentBlock::ToolUse(ToolUseBlock::new(
            "call_1", "echo", serde_json::json!({}),
        ))]);
        let history = vec![
            Message::user("go"),
            assistant,
            Message::tool_result(ToolResultBlock::text("call_1", "echo", "ok")),
        ];
        let input = vec![Message::user("anything now")];
        assert!(check_pending_tool_calls(&history, &input).is_ok());
    }
}
