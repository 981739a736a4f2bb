//! Multi-agent bus coverage: one agent's completed call broadcasts to every agent subscribed to
//! the same hub.

mod support;

use react_agent_runtime::{Agent, ContentBlock, Message, TextBlock};
use std::sync::Arc;
use support::{base_options, ScriptedModel};
use tokio::sync::Mutex;

#[tokio::test]
async fn subscriber_observes_publisher_broadcasts() {
    let received = Arc::new(Mutex::new(Vec::new()));
    let received_clone = received.clone();

    let subscriber_model = Arc::new(ScriptedModel::new(vec![]));
    let subscriber = Arc::new(
        Agent::with_model("listener", "observes the hub", base_options(), subscriber_model)
            .with_observer(move |message: &Message| {
                let received = received_clone.clone();
                let text = message.text_content();
                async move {
                    received.lock().await.push(text);
                    Ok(())
                }
            }),
    );

    let publisher_model = Arc::new(ScriptedModel::new(vec![vec![ContentBlock::Text(TextBlock::new("broadcast me"))]]));
    let publisher = Agent::with_model("publisher", "broadcasts its result", base_options(), publisher_model);

    publisher.subscribe("room", subscriber.clone()).await;
    publisher.call(vec![Message::user("go")]).await.unwrap();

    assert_eq!(received.lock().await.as_slice(), ["broadcast me".to_string()]);
}

#[tokio::test]
async fn two_subscribers_on_the_same_hub_both_receive_the_broadcast() {
    let first_log = Arc::new(Mutex::new(Vec::new()));
    let second_log = Arc::new(Mutex::new(Vec::new()));

    let first = Arc::new(make_listener("first", first_log.clone()));
    let second = Arc::new(make_listener("second", second_log.clone()));

    let publisher_model = Arc::new(ScriptedModel::new(vec![vec![ContentBlock::Text(TextBlock::new("fan-out"))]]));
    let publisher = Agent::with_model("publisher", "broadcasts to everyone", base_options(), publisher_model);

    publisher.subscribe("room", first.clone()).await;
    publisher.subscribe("room", second.clone()).await;
    publisher.call(vec![Message::user("go")]).await.unwrap();

    assert_eq!(first_log.lock().await.as_slice(), ["fan-out".to_string()]);
    assert_eq!(second_log.lock().await.as_slice(), ["fan-out".to_string()]);
}

fn make_listener(name: &str, log: Arc<Mutex<Vec<String>>>) -> Agent {
    let model = Arc::new(ScriptedModel::new(vec![]));
    Agent::with_model(name, "observes the hub", base_options(), model).with_observer(move |message: &Message| {
        let log = log.clone();
        let text = message.text_content();
        async move {
            log.lock().await.push(text);
            Ok(())
        }
    })
}
