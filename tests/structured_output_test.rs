//! End-to-end coverage of `Agent::call_with_schema`: the synthetic tool is registered, the model
//! is nudged to call it, and a valid call compresses memory down to just the final JSON answer.

mod support;

use react_agent_runtime::{
    Agent, ContentBlock, Message, ReminderMode, StructuredOutputConfig, TextBlock, ToolUseBlock,
    metadata_keys,
};
use serde_json::json;
use std::sync::Arc;
use support::{base_options, ScriptedModel};

fn answer_schema() -> serde_json::Value {
    json!({
        "type": "object",
        "properties": {"answer": {"type": "string"}},
        "required": ["answer"],
        "additionalProperties": false,
    })
}

#[tokio::test]
async fn model_calling_the_synthetic_tool_on_the_first_try_produces_a_structured_response() {
    let model = Arc::new(ScriptedModel::new(vec![vec![ContentBlock::ToolUse(ToolUseBlock::new(
        "call_1",
        "generate_response",
        json!({"answer": "42"}),
    ))]]));

    let agent = Agent::with_model("oracle", "answers in JSON", base_options(), model);
    let config = StructuredOutputConfig::from_schema(answer_schema());

    let result = agent.call_with_schema(vec![Message::user("what is the answer?")], config).await.unwrap();

    let structured = result.get_metadata(metadata_keys::STRUCTURED_OUTPUT).expect("structured_output metadata");
    assert_eq!(structured["answer"], "42");
}

#[tokio::test]
async fn a_no_tool_iteration_is_nudged_with_a_reminder_before_succeeding() {
    let model = Arc::new(ScriptedModel::new(vec![
        vec![ContentBlock::Text(TextBlock::new("let me think about that"))],
        vec![ContentBlock::ToolUse(ToolUseBlock::new(
            "call_1",
            "generate_response",
            json!({"answer": "done thinking"}),
        ))],
    ]));

    let agent = Agent::with_model("oracle", "answers in JSON after a nudge", base_options(), model.clone());
    let config = StructuredOutputConfig::from_schema(answer_schema()).with_reminder_mode(ReminderMode::Prompt);

    let result = agent.call_with_schema(vec![Message::user("what is the answer?")], config).await.unwrap();

    let structured = result.get_metadata(metadata_keys::STRUCTURED_OUTPUT).expect("structured_output metadata");
    assert_eq!(structured["answer"], "done thinking");
    assert_eq!(model.calls.load(std::sync::atomic::Ordering::SeqCst), 2);
}
