//! Coverage of the lifecycle hook pipeline as exercised through a full `Agent`: durable hooks
//! from `AgentOptions`, transient hooks registered per-call, and rewriting input/output messages.

mod support;

use chrono::Utc;
use react_agent_runtime::{Agent, ContentBlock, HookEvent, HookRegistry, Message, TextBlock};
use support::{base_options, ScriptedModel};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

#[tokio::test]
async fn pre_call_hook_rewrites_input_before_the_loop_sees_it() {
    let model = Arc::new(ScriptedModel::new(vec![vec![ContentBlock::Text(TextBlock::new("ack"))]]));

    let mut hooks = HookRegistry::new();
    hooks.register(0, |event| async move {
        match event {
            HookEvent::PreCall { agent, timestamp, .. } => HookEvent::PreCall {
                input: vec![Message::user("rewritten by a hook")],
                agent,
                timestamp,
            },
            other => other,
        }
    });

    let options = react_agent_runtime::AgentOptions::builder()
        .model("test-model")
        .base_url("http://localhost:0")
        .api_key("unused")
        .hooks(hooks)
        .build()
        .unwrap();

    let agent = Agent::with_model("assistant", "rewrites its input", options, model);
    agent.call(vec![Message::user("original")]).await.unwrap();
}

#[tokio::test]
async fn post_call_hook_observes_the_final_message() {
    let model = Arc::new(ScriptedModel::new(vec![vec![ContentBlock::Text(TextBlock::new("done"))]]));
    let saw_post_call = Arc::new(AtomicBool::new(false));
    let saw_post_call_clone = saw_post_call.clone();

    let mut hooks = HookRegistry::new();
    hooks.register(0, move |event| {
        let saw_post_call = saw_post_call_clone.clone();
        async move {
            if let HookEvent::PostCall { ref message, .. } = event {
                assert_eq!(message.text_content(), "done");
                saw_post_call.store(true, Ordering::SeqCst);
            }
            event
        }
    });

    let options = react_agent_runtime::AgentOptions::builder()
        .model("test-model")
        .base_url("http://localhost:0")
        .api_key("unused")
        .hooks(hooks)
        .build()
        .unwrap();

    let agent = Agent::with_model("assistant", "observes completion", options, model);
    agent.call(vec![Message::user("hi")]).await.unwrap();

    assert!(saw_post_call.load(Ordering::SeqCst));
}

#[tokio::test]
async fn transient_hook_fires_until_explicitly_cleared() {
    let model = Arc::new(ScriptedModel::new(vec![
        vec![ContentBlock::Text(TextBlock::new("first"))],
        vec![ContentBlock::Text(TextBlock::new("second"))],
        vec![ContentBlock::Text(TextBlock::new("third"))],
    ]));
    let agent = Agent::with_model("assistant", "test agent", base_options(), model);

    let seen = Arc::new(std::sync::Mutex::new(Vec::new()));
    let seen_clone = seen.clone();
    agent.add_transient_hook(0, move |event| {
        let seen = seen_clone.clone();
        async move {
            if let HookEvent::PreCall { .. } = &event {
                seen.lock().unwrap().push(Utc::now());
            }
            event
        }
    });

    agent.call(vec![Message::user("one")]).await.unwrap();
    assert_eq!(seen.lock().unwrap().len(), 1);

    // A transient hook stays registered across calls until explicitly cleared.
    agent.call(vec![Message::user("two")]).await.unwrap();
    assert_eq!(seen.lock().unwrap().len(), 2);

    agent.clear_transient_hooks();
    agent.call(vec![Message::user("three")]).await.unwrap();
    assert_eq!(seen.lock().unwrap().len(), 2);
}
