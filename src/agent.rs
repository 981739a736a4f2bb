//! The agent entrypoint: identity, single-run guard, the `call`/`stream` protocol, and
//! multi-agent bus wiring.
//!
//! `Agent` composes every other module: it builds a per-call [`Toolkit`] and [`HookRegistry`]
//! (durable configuration plus this call's transient hooks), hands them to [`react::run`] along
//! with the shared [`InterruptFlag`], and — for structured-output calls — installs a
//! [`structured::Controller`] before the loop runs and compresses memory through it afterward.

use crate::bus::{Observer, SharedObserver, SubscriberMap};
use crate::hooks::{HookEvent, HookRegistry};
use crate::interrupt::{InterruptContext, InterruptFlag};
use crate::memory::{InMemoryHistory, Memory};
use crate::model::{ModelClient, OpenAiCompatibleModel};
use crate::react::{self, ReactConfig};
use crate::stream::{self, EventStream, StreamOptions};
use crate::structured::{self, StructuredOutputConfig};
use crate::toolkit::Toolkit;
use crate::types::{AgentOptions, ContentBlock, Message, TextBlock};
use crate::{Error, Result};
use chrono::Utc;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex as AsyncMutex;

type ObserveHandler = Arc<dyn Fn(&Message) -> Pin<Box<dyn Future<Output = Result<()>> + Send>> + Send + Sync>;

/// One reasoning/acting agent: stable identity, a model, memory, tools, hooks, and hub
/// subscriptions, wired together by the `call`/`stream` entrypoints.
pub struct Agent {
    id: String,
    name: String,
    description: String,
    options: AgentOptions,
    model: Arc<dyn ModelClient>,
    memory: AsyncMutex<Box<dyn Memory>>,
    running: AtomicBool,
    interrupt: InterruptFlag,
    transient_hooks: std::sync::Mutex<HookRegistry>,
    subscribers: SubscriberMap,
    on_observe: Option<ObserveHandler>,
}

impl Agent {
    /// Builds an agent using the production [`OpenAiCompatibleModel`] transport derived from
    /// `options`.
    pub fn new(name: impl Into<String>, description: impl Into<String>, options: AgentOptions) -> Result<Self> {
        let model = Arc::new(OpenAiCompatibleModel::from_options(&options)?);
        Ok(Self::with_model(name, description, options, model))
    }

    /// Builds an agent against an arbitrary [`ModelClient`], primarily for tests.
    pub fn with_model(
        name: impl Into<String>,
        description: impl Into<String>,
        options: AgentOptions,
        model: Arc<dyn ModelClient>,
    ) -> Self {
        let mut memory = InMemoryHistory::new();
        if !options.system_prompt().is_empty() {
            memory.add_message(Message::system(options.system_prompt()));
        }

        Self {
            id: uuid::Uuid::new_v4().to_string(),
            name: name.into(),
            description: description.into(),
            options,
            model,
            memory: AsyncMutex::new(Box::new(memory)),
            running: AtomicBool::new(false),
            interrupt: InterruptFlag::new(),
            transient_hooks: std::sync::Mutex::new(HookRegistry::new()),
            subscribers: SubscriberMap::new(),
            on_observe: None,
        }
    }

    /// Attaches a handler invoked whenever this agent receives a broadcast from a hub it
    /// subscribes to. Without one, `observe` is a no-op.
    pub fn with_observer<F, Fut>(mut self, handler: F) -> Self
    where
        F: Fn(&Message) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<()>> + Send + 'static,
    {
        self.on_observe = Some(Arc::new(move |message| Box::pin(handler(message))));
        self
    }

    /// Stable identifier, generated once at construction.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Human-readable name, used in hook events, errors, and bus delivery logging.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Human-readable description.
    pub fn description(&self) -> &str {
        &self.description
    }

    /// Registers a hook active only for the next `call`/`stream` invocation; cleared
    /// automatically once consumed by [`Agent::build_hooks`].
    pub fn add_transient_hook<F, Fut>(&self, priority: i32, handler: F)
    where
        F: Fn(HookEvent) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HookEvent> + Send + 'static,
    {
        self.transient_hooks
            .lock()
            .expect("transient hook registry mutex poisoned")
            .register(priority, handler);
    }

    /// Drops every pending transient hook without consuming them in a call.
    pub fn clear_transient_hooks(&self) {
        *self.transient_hooks.lock().expect("transient hook registry mutex poisoned") = HookRegistry::new();
    }

    /// Requests cooperative interruption of the in-flight call, if any.
    pub fn interrupt(&self) {
        self.interrupt.request(InterruptContext::user());
    }

    /// Requests interruption, stashing `message` to be appended to memory once the call's
    /// recovery handling runs.
    pub fn interrupt_with_message(&self, message: Message) {
        self.interrupt.request(InterruptContext::user().with_message(message));
    }

    /// Subscribes `observer` to broadcasts this agent sends on `hub_id` after every completed
    /// call.
    pub async fn subscribe(&self, hub_id: impl Into<String>, observer: SharedObserver) {
        self.subscribers.add_subscriber(hub_id, observer).await;
    }

    /// Runs one call to completion and returns its final message.
    pub async fn call(&self, input: Vec<Message>) -> Result<Message> {
        let _guard = self.acquire_running()?;
        self.interrupt.reset();
        self.perform(input, None, None).await
    }

    /// Runs one call constrained to produce a structured response matching `config`'s schema.
    pub async fn call_with_schema(&self, input: Vec<Message>, config: StructuredOutputConfig) -> Result<Message> {
        let _guard = self.acquire_running()?;
        self.interrupt.reset();
        self.perform(input, Some(&config), None).await
    }

    /// Runs one call, projecting its internal lifecycle events onto a [`Stream`](futures::Stream)
    /// of [`stream::StreamEvent`]s per `options`. The call itself runs as a background task; the
    /// returned stream starts yielding events before the call completes.
    pub fn stream(self: &Arc<Self>, input: Vec<Message>, options: StreamOptions) -> EventStream {
        self.stream_inner(input, None, options)
    }

    /// Like [`Agent::stream`], constrained to a structured-output schema.
    pub fn stream_with_schema(
        self: &Arc<Self>,
        input: Vec<Message>,
        config: StructuredOutputConfig,
        options: StreamOptions,
    ) -> EventStream {
        self.stream_inner(input, Some(config), options)
    }

    fn stream_inner(
        self: &Arc<Self>,
        input: Vec<Message>,
        structured: Option<StructuredOutputConfig>,
        options: StreamOptions,
    ) -> EventStream {
        let agent = self.clone();
        let mut projection_hooks = HookRegistry::new();
        let event_stream = stream::install_projection(&mut projection_hooks, options);

        tokio::spawn(async move {
            let guard = match agent.acquire_running() {
                Ok(guard) => guard,
                Err(err) => {
                    log::warn!("agent '{}' could not start a streamed call: {err}", agent.name);
                    return;
                }
            };
            agent.interrupt.reset();
            if let Err(err) = agent.perform(input, structured.as_ref(), Some(&projection_hooks)).await {
                log::warn!("agent '{}' streamed call failed: {err}", agent.name);
            }
            drop(guard);
        });

        event_stream
    }

    async fn perform(
        &self,
        input: Vec<Message>,
        structured: Option<&StructuredOutputConfig>,
        extra_hooks: Option<&HookRegistry>,
    ) -> Result<Message> {
        let mut toolkit = Toolkit::with_tools(self.options.tools().to_vec());
        let mut hooks = self.build_hooks(extra_hooks);

        let controller = match structured {
            Some(config) => {
                let controller = structured::Controller::new(config.clone(), &mut toolkit)?;
                controller.install_hooks(&mut hooks, config.reminder_mode());
                Some(controller)
            }
            None => None,
        };

        let pre_call = hooks
            .run(HookEvent::PreCall {
                input,
                agent: self.name.clone(),
                timestamp: Utc::now(),
            })
            .await;
        let input = match pre_call {
            HookEvent::PreCall { input, .. } => input,
            _ => unreachable!("hook pipeline preserved PreCall's variant"),
        };

        let mut memory = self.memory.lock().await;

        let config = ReactConfig {
            agent_name: &self.name,
            model: self.model.as_ref(),
            toolkit: &toolkit,
            hooks: &hooks,
            interrupt: &self.interrupt,
            generate_options: self.options.generate_options(),
            max_iterations: self.options.max_iterations(),
            summary_instruction: self.options.summary_instruction(),
        };

        let message = match react::run(&mut **memory, input, &config).await {
            Ok(message) => message,
            Err(Error::Interrupted) => self.handle_interrupt(&mut **memory),
            Err(err) => {
                hooks
                    .run(HookEvent::Error {
                        message: err.to_string(),
                        agent: self.name.clone(),
                        timestamp: Utc::now(),
                    })
                    .await;
                return Err(err);
            }
        };

        let message = controller
            .as_ref()
            .and_then(|controller| controller.finalize(&mut **memory))
            .unwrap_or(message);

        drop(memory);

        let post_call = hooks
            .run(HookEvent::PostCall {
                message,
                agent: self.name.clone(),
                timestamp: Utc::now(),
            })
            .await;
        let message = match post_call {
            HookEvent::PostCall { message, .. } => message,
            _ => unreachable!("hook pipeline preserved PostCall's variant"),
        };

        self.subscribers.broadcast(&message).await;
        Ok(message)
    }

    fn build_hooks(&self, extra_hooks: Option<&HookRegistry>) -> HookRegistry {
        let mut hooks = self.options.hooks().clone();
        hooks.extend(&self.transient_hooks.lock().expect("transient hook registry mutex poisoned"));
        if let Some(extra) = extra_hooks {
            hooks.extend(extra);
        }
        hooks
    }

    fn handle_interrupt(&self, memory: &mut dyn Memory) -> Message {
        let context = self.interrupt.take_context().unwrap_or_else(InterruptContext::user);
        if let Some(stashed) = context.user_message {
            memory.add_message(stashed);
        }
        Message::assistant(vec![ContentBlock::Text(TextBlock::new(
            "Call interrupted before completion.",
        ))])
    }

    fn acquire_running(&self) -> Result<RunningGuard<'_>> {
        if self.options.check_running() {
            self.running
                .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
                .map_err(|_| Error::AgentAlreadyRunning(self.name.clone()))?;
        } else {
            self.running.store(true, Ordering::SeqCst);
        }
        Ok(RunningGuard { flag: &self.running })
    }
}

/// Releases the running flag on drop, guaranteeing it clears on every `perform` exit path
/// (normal return, early `?`, or panic unwind) without duplicating the release call at each one.
struct RunningGuard<'a> {
    flag: &'a AtomicBool,
}

impl Drop for RunningGuard<'_> {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::SeqCst);
    }
}

impl Observer for Agent {
    fn observer_name(&self) -> String {
        self.name.clone()
    }

    fn observe<'a>(&'a self, message: &'a Message) -> Pin<Box<dyn Future<Output = Result<()>> + Send + 'a>> {
        Box::pin(async move {
            match &self.on_observe {
                Some(handler) => handler(message).await,
                None => Ok(()),
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ChatResponse;
    use crate::types::{GenerateOptions, TextBlock};
    use async_trait::async_trait;
    use futures::stream::StreamExt;
    use std::sync::atomic::AtomicUsize;

    struct EchoModel {
        calls: AtomicUsize,
    }

    impl EchoModel {
        fn new() -> Self {
            Self { calls: AtomicUsize::new(0) }
        }
    }

    #[async_trait]
    impl ModelClient for EchoModel {
        async fn stream(
            &self,
            messages: &[Message],
            _tools: &[Arc<crate::tools::Tool>],
            _options: &GenerateOptions,
        ) -> Result<crate::model::ContentStream> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let reply = messages
                .last()
                .map(|m| format!("echo: {}", m.text_content()))
                .unwrap_or_default();
            Ok(Box::pin(futures::stream::iter(vec![Ok(ContentBlock::Text(TextBlock::new(reply)))])))
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

    fn options() -> AgentOptions {
        AgentOptions::builder()
            .model("test")
            .base_url("http://localhost")
            .api_key("key")
            .max_iterations(3)
            .build()
            .unwrap()
    }

    #[tokio::test]
    async fn test_call_returns_model_response() {
        let agent = Agent::with_model("assistant", "test agent", options(), Arc::new(EchoModel::new()));
        let result = agent.call(vec![Message::user("hi")]).await.unwrap();
        assert_eq!(result.text_content(), "echo: hi");
    }

    struct BlockingModel {
        release: tokio::sync::Notify,
        entered: tokio::sync::Notify,
    }

    impl BlockingModel {
        fn new() -> Self {
            Self { release: tokio::sync::Notify::new(), entered: tokio::sync::Notify::new() }
        }
    }

    #[async_trait]
    impl ModelClient for BlockingModel {
        async fn stream(
            &self,
            _messages: &[Message],
            _tools: &[Arc<crate::tools::Tool>],
            _options: &GenerateOptions,
        ) -> Result<crate::model::ContentStream> {
            self.entered.notify_one();
            self.release.notified().await;
            Ok(Box::pin(futures::stream::iter(vec![Ok(ContentBlock::Text(TextBlock::new("done")))])))
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

    #[tokio::test]
    async fn test_concurrent_call_rejected_when_check_running_enabled() {
        let model = Arc::new(BlockingModel::new());
        let agent = Arc::new(Agent::with_model("assistant", "test agent", options(), model.clone()));

        let first = agent.clone();
        let handle = tokio::spawn(async move { first.call(vec![Message::user("hi")]).await });

        model.entered.notified().await;
        let second = agent.call(vec![Message::user("hi")]).await;
        assert!(matches!(second, Err(Error::AgentAlreadyRunning(_))));

        model.release.notify_one();
        let first_result = handle.await.unwrap().unwrap();
        assert_eq!(first_result.text_content(), "done");
        assert!(!agent.running.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_interrupt_before_call_produces_recovery_message() {
        let agent = Agent::with_model("assistant", "test agent", options(), Arc::new(EchoModel::new()));
        agent.interrupt();
        let result = agent.call(vec![Message::user("hi")]).await.unwrap();
        assert_eq!(result.text_content(), "Call interrupted before completion.");
    }

    #[tokio::test]
    async fn test_subscriber_receives_broadcast_after_call() {
        let received = Arc::new(AsyncMutex::new(Vec::new()));
        let received_clone = received.clone();
        let subscriber = Agent::with_model(
            "subscriber",
            "listens",
            options(),
            Arc::new(EchoModel::new()),
        )
        .with_observer(move |message: &Message| {
            let received = received_clone.clone();
            let text = message.text_content();
            async move {
                received.lock().await.push(text);
                Ok(())
            }
        });
        let subscriber = Arc::new(subscriber);

        let publisher = Agent::with_model("publisher", "broadcasts", options(), Arc::new(EchoModel::new()));
        publisher.subscribe("hub", subscriber.clone()).await;

        publisher.call(vec![Message::user("hi")]).await.unwrap();
        assert_eq!(received.lock().await.as_slice(), ["echo: hi".to_string()]);
    }

    #[tokio::test]
    async fn test_stream_omits_agent_result_event_under_all() {
        use crate::stream::StreamEventType;

        let agent = Arc::new(Agent::with_model("assistant", "test agent", options(), Arc::new(EchoModel::new())));
        let mut events = agent.stream(vec![Message::user("hi")], StreamOptions::all());

        while let Some(event) = events.next().await {
            assert_ne!(event.event_type, StreamEventType::AgentResult);
        }
    }

    #[tokio::test]
    async fn test_stream_yields_agent_result_event_when_requested() {
        use crate::stream::StreamEventType;

        let mut stream_options = StreamOptions::all();
        stream_options.event_types.insert(StreamEventType::AgentResult);

        let agent = Arc::new(Agent::with_model("assistant", "test agent", options(), Arc::new(EchoModel::new())));
        let mut events = agent.stream(vec![Message::user("hi")], stream_options);

        let mut saw_agent_result = false;
        while let Some(event) = events.next().await {
            if event.event_type == StreamEventType::AgentResult {
                saw_agent_result = true;
                assert_eq!(event.message.text_content(), "echo: hi");
            }
        }
        assert!(saw_agent_result);
    }
}
