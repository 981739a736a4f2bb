//! Cooperative interruption.
//!
//! An agent's in-flight call is never forcibly cancelled. Instead the ReAct loop checks a flag
//! at well-defined points (iteration start, before reasoning, before each tool-use execution,
//! during chunk processing) and, once it observes the flag set, raises [`Error::Interrupted`] at
//! the next checkpoint. That error is always caught at the agent's call boundary and turned into
//! a recovery message via `handleInterrupt` — it never escapes `Agent::call`/`Agent::stream`.

use crate::{Error, Result};
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

/// A caller-supplied message to be spliced into recovery handling alongside an interrupt, e.g.
/// a new instruction the user typed while a tool call was still running.
#[derive(Debug, Clone, Default)]
pub struct InterruptContext {
    /// Where the interrupt came from; currently always `"user"`, kept as a string so other
    /// sources can be added without a breaking enum change.
    pub source: String,
    /// An optional message stashed alongside the interrupt request.
    pub user_message: Option<crate::types::Message>,
}

impl InterruptContext {
    /// Creates a user-sourced interrupt context with no stashed message.
    pub fn user() -> Self {
        Self {
            source: "user".to_string(),
            user_message: None,
        }
    }

    /// Attaches a stashed message to this context.
    pub fn with_message(mut self, message: crate::types::Message) -> Self {
        self.user_message = Some(message);
        self
    }
}

/// A cooperative cancellation flag shared between the caller and an in-flight agent call.
#[derive(Debug, Default)]
pub struct InterruptFlag {
    flag: AtomicBool,
    context: Mutex<Option<InterruptContext>>,
}

impl InterruptFlag {
    /// Creates a flag in the not-interrupted state.
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests interruption, optionally stashing context (e.g. a new user message) for
    /// `handleInterrupt` to consume.
    pub fn request(&self, context: InterruptContext) {
        *self.context.lock().expect("interrupt context mutex poisoned") = Some(context);
        self.flag.store(true, Ordering::SeqCst);
    }

    /// Resets the flag to not-interrupted and clears any stashed context. Called at the start of
    /// every `call`/`stream` entrypoint invocation.
    pub fn reset(&self) {
        self.flag.store(false, Ordering::SeqCst);
        *self.context.lock().expect("interrupt context mutex poisoned") = None;
    }

    /// Returns whether interruption has been requested without clearing the flag.
    pub fn is_set(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }

    /// Checks the flag at a cooperative checkpoint. Returns `Err(Error::Interrupted)` if set;
    /// the caller is expected to propagate this with `?` up to the call boundary.
    pub fn check(&self) -> Result<()> {
        if self.is_set() {
            Err(Error::Interrupted)
        } else {
            Ok(())
        }
    }

    /// Takes the stashed interrupt context, if any, leaving `None` behind.
    pub fn take_context(&self) -> Option<InterruptContext> {
        self.context
            .lock()
            .expect("interrupt context mutex poisoned")
            .take()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_initial_state_not_interrupted() {
        let flag = InterruptFlag::new();
        assert!(!flag.is_set());
        assert!(flag.check().is_ok());
    }

    #[test]
    fn test_request_sets_flag_and_check_errors() {
        let flag = InterruptFlag::new();
        flag.request(InterruptContext::user());
        assert!(flag.is_set());
        assert!(matches!(flag.check(), Err(Error::Interrupted)));
    }

    #[test]
    fn test_reset_clears_flag_and_context() {
        let flag = InterruptFlag::new();
        flag.request(InterruptContext::user());
        flag.reset();
        assert!(!flag.is_set());
        assert!(flag.take_context().is_none());
    }

    #[test]
    fn test_request_idempotent() {
        let flag = InterruptFlag::new();
        flag.request(InterruptContext::user());
        flag.request(InterruptContext::user());
        assert!(flag.is_set());
    }

    #[test]
    fn test_take_context_consumes_stashed_message() {
        let flag = InterruptFlag::new();
        let context = InterruptContext::user().with_message(crate::types::Message::user("stop"));
        flag.request(context);

        let taken = flag.take_context().expect("context was stashed");
        assert_eq!(
            taken.user_message.unwrap().text_content(),
            "stop"
        );
        assert!(flag.take_context().is_none());
    }
}
