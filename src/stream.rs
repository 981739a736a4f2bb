//! Streaming event projection.
//!
//! `Agent::stream` registers a transient hook for the duration of one call that watches the
//! same internal lifecycle events `call` does, and projects a subset of them onto an external
//! [`StreamEvent`] sequence delivered over a channel. The transient hook is appended to a
//! per-call clone of the durable registry and is never visible to any other call — see
//! `react.rs`'s per-call registry construction.

use crate::hooks::{HookEvent, HookRegistry};
use crate::types::Message;
use futures::stream::Stream;
use std::collections::HashSet;
use std::pin::Pin;
use tokio::sync::mpsc;
use tokio_stream::wrappers::UnboundedReceiverStream;

/// The kind of externally visible event a streamed call can emit, doubling as the set element
/// type for [`StreamOptions::event_types`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StreamEventType {
    /// A reasoning chunk or the completed reasoning message.
    Reasoning,
    /// A tool-acting chunk or the completed tool result.
    ToolResult,
    /// A hint event; no internal event currently projects onto this type, but it is a
    /// recognised member of the event-type dimension a caller can request or exclude.
    Hint,
    /// A summary chunk or the completed summary message.
    Summary,
    /// The call's final returned message. Never included by `ALL` — must be named explicitly in
    /// [`StreamOptions::event_types`].
    AgentResult,
    /// Shorthand set member equivalent to every type except [`StreamEventType::AgentResult`].
    /// Only meaningful inside [`StreamOptions::event_types`]; never the `event_type` of an
    /// actual [`StreamEvent`].
    All,
}

/// One event delivered to a `stream()` caller.
#[derive(Debug, Clone)]
pub struct StreamEvent {
    /// Which external category this event belongs to.
    pub event_type: StreamEventType,
    /// The message payload: an incremental/accumulated chunk or a completed message, depending
    /// on `is_last` and the originating internal event.
    pub message: Message,
    /// Whether this is the terminal event for its `event_type` within this call (a `PostX`
    /// event rather than a chunk).
    pub is_last: bool,
}

/// Filters and shaping options for a `stream()` call.
///
/// Two independent gates control what is projected: `event_types` (which external categories are
/// wanted at all) and the `include*` flags (which internal occasions within a wanted category
/// produce an event). [`StreamOptions::all`] sets `event_types = {ALL}`, which §4.7 defines as
/// every type *except* `AGENT_RESULT` — a caller must add [`StreamEventType::AgentResult`]
/// explicitly to receive it.
#[derive(Debug, Clone)]
pub struct StreamOptions {
    /// Which external event categories are wanted. `ALL` stands for every type except
    /// `AgentResult`; `AgentResult` itself is only included when named explicitly.
    pub event_types: HashSet<StreamEventType>,
    /// Emit `ReasoningChunk` projections.
    pub include_reasoning_chunk: bool,
    /// Emit the completed reasoning message.
    pub include_reasoning_result: bool,
    /// Emit `ActingChunk` projections.
    pub include_acting_chunk: bool,
    /// Emit `SummaryChunk` projections.
    pub include_summary_chunk: bool,
    /// Emit the completed summary message.
    pub include_summary_result: bool,
    /// Whether chunk payloads carry only new content (`true`, default) or the full
    /// accumulated-so-far content (`false`).
    pub incremental: bool,
}

impl Default for StreamOptions {
    fn default() -> Self {
        Self::all()
    }
}

impl StreamOptions {
    /// Every type except `AgentResult`, incremental chunk payloads. Equivalent to
    /// [`Default::default`].
    pub fn all() -> Self {
        Self {
            event_types: HashSet::from([StreamEventType::All]),
            include_reasoning_chunk: true,
            include_reasoning_result: true,
            include_acting_chunk: true,
            include_summary_chunk: true,
            include_summary_result: true,
            incremental: true,
        }
    }

    /// No event kinds included; callers opt individual types into `event_types` and the
    /// corresponding `include*` fields back in.
    pub fn none() -> Self {
        Self {
            event_types: HashSet::new(),
            include_reasoning_chunk: false,
            include_reasoning_result: false,
            include_acting_chunk: false,
            include_summary_chunk: false,
            include_summary_result: false,
            incremental: true,
        }
    }

    /// Non-incremental: chunk payloads carry full accumulated content.
    pub fn cumulative(mut self) -> Self {
        self.incremental = false;
        self
    }

    /// Whether `event_type` is included per `event_types`: `AgentResult` only via explicit
    /// membership, every other type also via the `ALL` shorthand.
    fn wants(&self, event_type: StreamEventType) -> bool {
        if event_type == StreamEventType::AgentResult {
            self.event_types.contains(&StreamEventType::AgentResult)
        } else {
            self.event_types.contains(&StreamEventType::All) || self.event_types.contains(&event_type)
        }
    }
}

/// A `Stream` of [`StreamEvent`]s produced by one `Agent::stream` call.
pub type EventStream = Pin<Box<dyn Stream<Item = StreamEvent> + Send>>;

/// Registers a transient projection hook on `hooks` that forwards a subset of internal lifecycle
/// events to `sender` as [`StreamEvent`]s, per `options`. Returns the receiver side wrapped as a
/// `Stream`; the hook itself is dropped (and thus stops sending) once the per-call registry this
/// was appended to goes out of scope at the end of the call.
pub fn install_projection(hooks: &mut HookRegistry, options: StreamOptions) -> EventStream {
    let (tx, rx) = mpsc::unbounded_channel::<StreamEvent>();

    hooks.register(i32::MIN, move |event| {
        let tx = tx.clone();
        let options = options.clone();
        async move {
            if let Some(projected) = project(&event, &options) {
                // The receiver may already be dropped if the caller stopped polling the
                // stream early; sending is then a no-op rather than an error worth surfacing.
                let _ = tx.send(projected);
            }
            event
        }
    });

    Box::pin(UnboundedReceiverStream::new(rx))
}

fn project(event: &HookEvent, options: &StreamOptions) -> Option<StreamEvent> {
    match event {
        HookEvent::ReasoningChunk {
            incremental,
            accumulated,
            ..
        } if options.include_reasoning_chunk && options.wants(StreamEventType::Reasoning) => {
            Some(StreamEvent {
                event_type: StreamEventType::Reasoning,
                message: pick(options, incremental, accumulated),
                is_last: false,
            })
        }
        HookEvent::PostReasoning {
            reasoning_message, ..
        } if options.include_reasoning_result && options.wants(StreamEventType::Reasoning) => {
            Some(StreamEvent {
                event_type: StreamEventType::Reasoning,
                message: reasoning_message.clone(),
                is_last: true,
            })
        }
        HookEvent::ActingChunk { partial_result, .. }
            if options.include_acting_chunk && options.wants(StreamEventType::ToolResult) =>
        {
            Some(StreamEvent {
                event_type: StreamEventType::ToolResult,
                message: Message::tool_result(partial_result.clone()),
                is_last: false,
            })
        }
        HookEvent::PostActing { tool_result, .. } if options.wants(StreamEventType::ToolResult) => {
            Some(StreamEvent {
                event_type: StreamEventType::ToolResult,
                message: Message::tool_result(tool_result.clone()),
                is_last: true,
            })
        }
        HookEvent::SummaryChunk {
            incremental,
            accumulated,
            ..
        } if options.include_summary_chunk && options.wants(StreamEventType::Summary) => {
            Some(StreamEvent {
                event_type: StreamEventType::Summary,
                message: pick(options, incremental, accumulated),
                is_last: false,
            })
        }
        HookEvent::PostSummary { summary_message, .. }
            if options.include_summary_result && options.wants(StreamEventType::Summary) =>
        {
            Some(StreamEvent {
                event_type: StreamEventType::Summary,
                message: summary_message.clone(),
                is_last: true,
            })
        }
        HookEvent::PostCall { message, .. } if options.wants(StreamEventType::AgentResult) => {
            Some(StreamEvent {
                event_type: StreamEventType::AgentResult,
                message: message.clone(),
                is_last: true,
            })
        }
        _ => None,
    }
}

fn pick(options: &StreamOptions, incremental: &Message, accumulated: &Message) -> Message {
    if options.incremental {
        incremental.clone()
    } else {
        accumulated.clone()
    }
}
