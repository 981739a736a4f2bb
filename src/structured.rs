//! Structured-output enforcement.
//!
//! A structured-output call registers a synthetic `generate_response` tool (schema supplied by
//! the caller) into the call's toolkit and a controller hook into the call's hook registry. The
//! model is nudged — by forcing `tool_choice` or by injecting a reminder message, depending on
//! [`ReminderMode`] — to call that tool with a final answer matching the schema. Once it does,
//! the loop stops and the conversation history is compressed back down to what the caller would
//! have seen without structured output, plus the validated response.
//!
//! Both the toolkit and the hook registry the controller is installed into are per-call clones
//! (see `react.rs`): the synthetic tool and the controller hook are simply dropped with them at
//! the end of the call, with no explicit removal step needed.

use crate::hooks::{HookEvent, HookRegistry};
use crate::memory::Memory;
use crate::tools::Tool;
use crate::toolkit::Toolkit;
use crate::types::{metadata_keys, ContentBlock, Message, Metadata, TextBlock, ToolChoice};
use crate::{Error, Result};
use serde_json::{json, Value};
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

/// Name of the synthetic tool registered for a structured-output call, unless overridden.
pub const DEFAULT_TOOL_NAME: &str = "generate_response";

/// Upper bound on validation-failure retries before the controller gives up nudging the model
/// and lets the loop fall through to its ordinary no-tools / summary handling.
pub const MAX_RETRIES: u32 = 3;

/// How the controller nudges the model to call the synthetic tool after an iteration that
/// didn't.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReminderMode {
    /// Force `tool_choice` to the synthetic tool on the next reasoning step.
    ToolChoice,
    /// Inject a plain-text reminder message instead of constraining `tool_choice`.
    Prompt,
}

/// Schema and naming configuration for one structured-output call.
#[derive(Debug, Clone)]
pub struct StructuredOutputConfig {
    schema: Value,
    tool_name: String,
    reminder_mode: ReminderMode,
}

impl StructuredOutputConfig {
    /// Builds a configuration from a caller-supplied JSON-schema document.
    pub fn from_schema(schema: Value) -> Self {
        Self {
            schema,
            tool_name: DEFAULT_TOOL_NAME.to_string(),
            reminder_mode: ReminderMode::ToolChoice,
        }
    }

    /// Builds a configuration from a Rust type's derived schema.
    pub fn from_type<T>() -> Self
    where
        T: schemars::JsonSchema + serde::de::DeserializeOwned,
    {
        let schema = schemars::schema_for!(T);
        Self::from_schema(serde_json::to_value(schema).expect("schemars output is valid JSON"))
    }

    /// Validates that exactly one of a class-style schema or a JSON-schema document was
    /// supplied, returning the resolved configuration.
    ///
    /// Mirrors the two ways a caller can ask for structured output at the `Agent` entrypoint;
    /// supplying both or neither is a configuration error rather than an ambiguity to guess at.
    pub fn new(class_schema: Option<Value>, json_schema: Option<Value>) -> Result<Self> {
        match (class_schema, json_schema) {
            (Some(_), Some(_)) => Err(Error::invalid_structured_output_config(
                "both a class schema and a JSON-schema document were supplied; pass only one",
            )),
            (None, None) => Err(Error::invalid_structured_output_config(
                "structured output requires a class schema or a JSON-schema document",
            )),
            (Some(schema), None) | (None, Some(schema)) => Ok(Self::from_schema(schema)),
        }
    }

    /// Overrides the default reminder mode.
    pub fn with_reminder_mode(mut self, mode: ReminderMode) -> Self {
        self.reminder_mode = mode;
        self
    }

    /// Overrides the default synthetic tool name.
    pub fn with_tool_name(mut self, name: impl Into<String>) -> Self {
        self.tool_name = name.into();
        self
    }

    /// The reminder mode this configuration will install the controller hook with.
    pub fn reminder_mode(&self) -> ReminderMode {
        self.reminder_mode
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Status {
    AwaitingCall,
    Completed,
    Failed,
}

#[derive(Debug)]
struct ControllerState {
    status: Mutex<Status>,
    retries: AtomicU32,
    saw_no_tool_iteration: AtomicBool,
}

impl ControllerState {
    fn new() -> Self {
        Self {
            status: Mutex::new(Status::AwaitingCall),
            retries: AtomicU32::new(0),
            saw_no_tool_iteration: AtomicBool::new(false),
        }
    }

    fn status(&self) -> Status {
        *self.status.lock().expect("structured-output status mutex poisoned")
    }

    fn set_status(&self, status: Status) {
        *self.status.lock().expect("structured-output status mutex poisoned") = status;
    }
}

/// Drives one structured-output call: installs the synthetic tool and controller hook, and
/// compresses memory once the model has produced a valid response.
pub struct Controller {
    state: Arc<ControllerState>,
    tool_name: String,
}

impl Controller {
    /// Builds a controller from `config`, registering its synthetic tool into `toolkit`.
    ///
    /// `toolkit` and the registry later passed to [`Controller::install_hooks`] are expected to
    /// be per-call clones; nothing here is ever explicitly unregistered.
    pub fn new(config: StructuredOutputConfig, toolkit: &mut Toolkit) -> Result<Self> {
        let validator = jsonschema::validator_for(&config.schema)
            .map_err(|e| Error::invalid_structured_output_config(e.to_string()))?;
        let validator = Arc::new(validator);
        let state = Arc::new(ControllerState::new());
        let tool_name = config.tool_name.clone();

        // §4.8: the synthetic tool takes a single `response` parameter wrapping the caller's
        // schema, not the caller's schema as the entire parameter object — the model calls
        // `generate_response({"response": <answer>})`.
        let wrapped_schema = json!({
            "type": "object",
            "properties": {"response": config.schema.clone()},
            "required": ["response"],
        });

        let handler_state = state.clone();
        let handler_tool_name = tool_name.clone();
        let tool = Tool::new(
            tool_name.clone(),
            "Call this exactly once with your final answer, matching the required schema.",
            wrapped_schema,
            move |arguments: Value| {
                let state = handler_state.clone();
                let validator = validator.clone();
                let tool_name = handler_tool_name.clone();
                async move {
                    let Some(response) = arguments.get("response").cloned() else {
                        let retries = state.retries.fetch_add(1, Ordering::SeqCst) + 1;
                        if retries >= MAX_RETRIES {
                            state.set_status(Status::Failed);
                        }
                        return Err(Error::schema_validation(format!(
                            "'{tool_name}' requires a 'response' argument. Fix the arguments and call '{tool_name}' again."
                        )));
                    };

                    if let Err(err) = validator.validate(&response) {
                        let detail = err.to_string();
                        let retries = state.retries.fetch_add(1, Ordering::SeqCst) + 1;
                        if retries >= MAX_RETRIES {
                            state.set_status(Status::Failed);
                        }
                        return Err(Error::schema_validation(format!(
                            "'{tool_name}' argument failed validation: {detail}. Fix the arguments and call '{tool_name}' again."
                        )));
                    }

                    state.set_status(Status::Completed);
                    Ok(json!({"success": true, metadata_keys::RESPONSE_MSG: response}))
                }
            },
        );
        toolkit.register(tool);

        Ok(Self { state, tool_name })
    }

    /// Returns whether the model has produced a valid response this call.
    pub fn is_completed(&self) -> bool {
        self.state.status() == Status::Completed
    }

    /// Installs the controller's hook, carrying `reminder_mode`, into `hooks`.
    pub fn install_hooks(&self, hooks: &mut HookRegistry, reminder_mode: ReminderMode) {
        let state = self.state.clone();
        let tool_name = self.tool_name.clone();

        // Runs well before ordinary user hooks so a hook observing PreReasoning/PostReasoning
        // sees the controller's already-applied nudge, not a race with it.
        hooks.register(-500_000, move |event| {
            let state = state.clone();
            let tool_name = tool_name.clone();
            async move { on_event(event, &state, &tool_name, reminder_mode) }
        });
    }

    /// If the call completed with a valid response, compresses `memory` down to the messages
    /// that would exist without structured output plus the final response, and returns that
    /// response message. Returns `None` if the call never completed (retries exhausted or the
    /// iteration bound was reached first) — the caller keeps whatever message the loop otherwise
    /// produced, typically a summary.
    pub fn finalize(&self, memory: &mut dyn Memory) -> Option<Message> {
        if !self.is_completed() {
            return None;
        }

        let snapshot = memory.get_messages();

        // Idempotent: a prior `finalize()` already compressed memory down to the terminal
        // structured-output message. Running it again must reproduce that same message rather
        // than reinsert it as an ordinary message and append a fresh duplicate.
        if let Some(last) = snapshot.last() {
            if last.get_metadata(metadata_keys::STRUCTURED_OUTPUT).is_some() {
                return Some(last.clone());
            }
        }

        // §4.8 step 3: the validated response travels from the synthetic tool's invocation to
        // here via the `response_msg` metadata key on its tool-result block, not a side channel.
        let response = snapshot.iter().find_map(|message| {
            message.tool_result_blocks().into_iter().find_map(|result| {
                if result.tool_name != self.tool_name {
                    return None;
                }
                result.metadata.as_ref()?.get(metadata_keys::RESPONSE_MSG).cloned()
            })
        })?;

        memory.clear();

        let mut usage = UsageTotals::default();
        for message in snapshot {
            let is_synthetic_tool_use = message
                .tool_use_blocks()
                .iter()
                .any(|t| t.name == self.tool_name);
            let is_synthetic_tool_result = message
                .tool_result_blocks()
                .iter()
                .any(|r| r.tool_name == self.tool_name);
            let is_reminder = message
                .get_metadata(metadata_keys::STRUCTURED_OUTPUT_REMINDER)
                .is_some();

            if is_synthetic_tool_use || is_synthetic_tool_result || is_reminder {
                if is_synthetic_tool_use {
                    if let Some(recorded) = message.get_metadata(metadata_keys::CHAT_USAGE) {
                        usage.accumulate(recorded);
                    }
                }
                continue;
            }
            memory.add_message(message);
        }

        let mut response_message =
            Message::assistant(vec![ContentBlock::Text(TextBlock::new(response.to_string()))]);
        response_message.set_metadata(metadata_keys::STRUCTURED_OUTPUT, response);
        response_message.set_metadata(metadata_keys::CHAT_USAGE, usage.into_value());
        memory.add_message(response_message.clone());
        Some(response_message)
    }
}

#[derive(Default)]
struct UsageTotals {
    prompt_tokens: u64,
    completion_tokens: u64,
    total_tokens: u64,
}

impl UsageTotals {
    fn accumulate(&mut self, recorded: &Value) {
        self.prompt_tokens += recorded.get("prompt_tokens").and_then(Value::as_u64).unwrap_or(0);
        self.completion_tokens +=
            recorded.get("completion_tokens").and_then(Value::as_u64).unwrap_or(0);
        self.total_tokens += recorded.get("total_tokens").and_then(Value::as_u64).unwrap_or(0);
    }

    fn into_value(self) -> Value {
        json!({
            "prompt_tokens": self.prompt_tokens,
            "completion_tokens": self.completion_tokens,
            "total_tokens": self.total_tokens,
        })
    }
}

fn on_event(event: HookEvent, state: &ControllerState, tool_name: &str, mode: ReminderMode) -> HookEvent {
    match event {
        HookEvent::PreReasoning {
            input,
            generate_options_override,
            agent,
            timestamp,
        } => {
            let should_force = state.status() == Status::AwaitingCall
                && mode == ReminderMode::ToolChoice
                && state.saw_no_tool_iteration.load(Ordering::SeqCst);
            if should_force {
                let mut options = generate_options_override.unwrap_or_default();
                options.tool_choice = Some(ToolChoice::specific(tool_name));
                HookEvent::PreReasoning {
                    input,
                    generate_options_override: Some(options),
                    agent,
                    timestamp,
                }
            } else {
                HookEvent::PreReasoning {
                    input,
                    generate_options_override,
                    agent,
                    timestamp,
                }
            }
        }
        HookEvent::PostReasoning {
            reasoning_message,
            stop_agent,
            goto_reasoning,
            agent,
            timestamp,
        } => {
            if state.status() == Status::AwaitingCall && reasoning_message.tool_use_blocks().is_empty() {
                state.saw_no_tool_iteration.store(true, Ordering::SeqCst);
                let text = match mode {
                    ReminderMode::Prompt => format!(
                        "You must call the '{tool_name}' tool with your final answer matching the required schema. Do not respond with plain text."
                    ),
                    ReminderMode::ToolChoice => format!("Call '{tool_name}' now."),
                };
                let mut reminder = Message::user(text);
                reminder.set_metadata(metadata_keys::STRUCTURED_OUTPUT_REMINDER, Value::Bool(true));
                reminder.set_metadata(
                    metadata_keys::STRUCTURED_OUTPUT_REMINDER_TYPE,
                    Value::String(
                        match mode {
                            ReminderMode::Prompt => "prompt",
                            ReminderMode::ToolChoice => "tool_choice",
                        }
                        .to_string(),
                    ),
                );
                HookEvent::PostReasoning {
                    reasoning_message,
                    stop_agent,
                    goto_reasoning: Some(reminder),
                    agent,
                    timestamp,
                }
            } else {
                HookEvent::PostReasoning {
                    reasoning_message,
                    stop_agent,
                    goto_reasoning,
                    agent,
                    timestamp,
                }
            }
        }
        HookEvent::PostActing {
            tool_result,
            stop_agent,
            agent,
            timestamp,
        } => {
            let completes = tool_result.tool_name == tool_name
                && tool_result.is_success()
                && state.status() == Status::Completed;
            HookEvent::PostActing {
                tool_result,
                stop_agent: stop_agent || completes,
                agent,
                timestamp,
            }
        }
        other => other,
    }
}
