//! Confirms the streamed event sequence for a full tool-call turn, driven through a real
//! `Agent` rather than a hook registry in isolation.

mod support;

use futures::stream::StreamExt;
use react_agent_runtime::{
    Agent, AgentOptions, ContentBlock, Message, StreamEventType, StreamOptions, TextBlock,
    Tool, ToolUseBlock,
};
use serde_json::json;
use std::sync::Arc;
use support::ScriptedModel;

#[tokio::test]
async fn tool_call_turn_streams_reasoning_then_tool_result_then_reasoning_then_agent_result() {
    let model = Arc::new(ScriptedModel::new(vec![
        vec![ContentBlock::ToolUse(ToolUseBlock::new("call_1", "echo", json!({"v": 1})))],
        vec![ContentBlock::Text(TextBlock::new("all done"))],
    ]));

    let echo = Tool::new("echo", "echoes its input", json!({}), |args| async move { Ok(args) });
    let options = AgentOptions::builder()
        .model("test-model")
        .base_url("http://localhost:0")
        .api_key("unused")
        .tool(echo)
        .build()
        .unwrap();

    let mut stream_options = StreamOptions::all();
    stream_options.event_types.insert(StreamEventType::AgentResult);

    let agent = Arc::new(Agent::with_model("assistant", "uses a tool then answers", options, model));
    let mut events = agent.stream(vec![Message::user("use the tool")], stream_options);

    let mut sequence = Vec::new();
    while let Some(event) = events.next().await {
        sequence.push(event.event_type);
    }

    let reasoning_position = sequence.iter().position(|t| *t == StreamEventType::Reasoning).unwrap();
    let tool_result_position = sequence.iter().position(|t| *t == StreamEventType::ToolResult).unwrap();
    let agent_result_position = sequence.iter().position(|t| *t == StreamEventType::AgentResult).unwrap();

    assert!(reasoning_position < tool_result_position);
    assert!(tool_result_position < agent_result_position);
    assert_eq!(sequence.last(), Some(&StreamEventType::AgentResult));
}
