//! Error types for the agent runtime.
//!
//! The enum below covers both the transport-level failures the model client can raise and the
//! engine-level failures the ReAct loop, hook pipeline, and structured-output controller can
//! raise. They share one type so a caller only ever matches on a single `Error`.

use thiserror::Error;

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the runtime
#[derive(Error, Debug)]
pub enum Error {
    /// HTTP request error
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// API error from the model server
    #[error("API error: {0}")]
    Api(String),

    /// Streaming error
    #[error("Streaming error: {0}")]
    Stream(String),

    /// Tool execution error
    #[error("Tool execution error: {0}")]
    Tool(String),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Timeout error
    #[error("Request timeout")]
    Timeout,

    /// A second call was attempted on an agent that already has one in flight and was
    /// constructed with `check_running(true)`.
    #[error("agent '{0}' already has a call in progress")]
    AgentAlreadyRunning(String),

    /// A plain user/assistant message arrived while the last assistant message in memory still
    /// has unresolved tool-use blocks. The caller must either send matching tool-result messages
    /// or call with no input to resume acting.
    #[error("cannot accept new input: {0} pending tool call(s) must be resolved or resumed first")]
    PendingToolCalls(usize),

    /// The cooperative interrupt flag was observed at a checkpoint inside the ReAct loop.
    /// Always caught at the agent's call boundary and converted to a recovery message.
    #[error("agent call was interrupted")]
    Interrupted,

    /// Both a class-style schema and a JSON-schema document were supplied for structured
    /// output, or neither was.
    #[error("invalid structured-output configuration: {0}")]
    InvalidStructuredOutputConfig(String),

    /// The `generate_response` tool's argument failed schema validation.
    #[error("structured-output response failed schema validation: {0}")]
    SchemaValidationError(String),

    /// Structured-output retries were exhausted without a valid `generate_response` call.
    /// Never returned from `Agent::call`/`Agent::stream` (the loop degrades to its summary
    /// phase instead, see DESIGN.md); kept as a variant so hooks observing the `Error` event can
    /// recognize the condition.
    #[error("structured-output retries exhausted without a valid response")]
    StructuredOutputExhausted,

    /// A hook returned no message where the pipeline required one.
    #[error("hook pipeline produced no final message")]
    NullFinalMessage,

    /// Other errors
    #[error("Error: {0}")]
    Other(String),
}

impl Error {
    /// Create a new config error
    pub fn config(msg: impl Into<String>) -> Self {
        Error::Config(msg.into())
    }

    /// Create a new API error
    pub fn api(msg: impl Into<String>) -> Self {
        Error::Api(msg.into())
    }

    /// Create a new stream error
    pub fn stream(msg: impl Into<String>) -> Self {
        Error::Stream(msg.into())
    }

    /// Create a new tool error
    pub fn tool(msg: impl Into<String>) -> Self {
        Error::Tool(msg.into())
    }

    /// Create a new invalid input error
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Error::InvalidInput(msg.into())
    }

    /// Create a new other error
    pub fn other(msg: impl Into<String>) -> Self {
        Error::Other(msg.into())
    }

    /// Create a timeout error
    pub fn timeout() -> Self {
        Error::Timeout
    }

    /// Create a pending-tool-calls error carrying the count of unresolved calls.
    pub fn pending_tool_calls(count: usize) -> Self {
        Error::PendingToolCalls(count)
    }

    /// Create an invalid structured-output configuration error.
    pub fn invalid_structured_output_config(msg: impl Into<String>) -> Self {
        Error::InvalidStructuredOutputConfig(msg.into())
    }

    /// Create a schema validation error.
    pub fn schema_validation(msg: impl Into<String>) -> Self {
        Error::SchemaValidationError(msg.into())
    }

    /// Returns `true` for errors considered transient at the model-transport layer.
    pub fn is_retryable(&self) -> bool {
        crate::retry::is_retryable_error(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_config() {
        let err = Error::config("Invalid model");
        assert!(matches!(err, Error::Config(_)));
        assert_eq!(err.to_string(), "Invalid configuration: Invalid model");
    }

    #[test]
    fn test_error_api() {
        let err = Error::api("500 Internal Server Error");
        assert!(matches!(err, Error::Api(_)));
        assert_eq!(err.to_string(), "API error: 500 Internal Server Error");
    }

    #[test]
    fn test_error_stream() {
        let err = Error::stream("Connection lost");
        assert!(matches!(err, Error::Stream(_)));
        assert_eq!(err.to_string(), "Streaming error: Connection lost");
    }

    #[test]
    fn test_error_tool() {
        let err = Error::tool("Tool not found");
        assert!(matches!(err, Error::Tool(_)));
        assert_eq!(err.to_string(), "Tool execution error: Tool not found");
    }

    #[test]
    fn test_error_invalid_input() {
        let err = Error::invalid_input("Missing parameter");
        assert!(matches!(err, Error::InvalidInput(_)));
        assert_eq!(err.to_string(), "Invalid input: Missing parameter");
    }

    #[test]
    fn test_error_timeout() {
        let err = Error::timeout();
        assert!(matches!(err, Error::Timeout));
        assert_eq!(err.to_string(), "Request timeout");
    }

    #[test]
    fn test_error_other() {
        let err = Error::other("Something went wrong");
        assert!(matches!(err, Error::Other(_)));
        assert_eq!(err.to_string(), "Error: Something went wrong");
    }

    #[test]
    fn test_error_pending_tool_calls() {
        let err = Error::pending_tool_calls(2);
        assert!(matches!(err, Error::PendingToolCalls(2)));
        assert!(err.to_string().contains("2 pending"));
    }

    #[test]
    fn test_error_already_running() {
        let err = Error::AgentAlreadyRunning("researcher".to_string());
        assert!(err.to_string().contains("researcher"));
    }

    #[test]
    fn test_error_from_reqwest() {
        // Test that reqwest::Error can be converted
        fn _test_conversion(_e: reqwest::Error) -> Error {
            Error::Http(_e)
        }
    }

    #[test]
    fn test_error_from_serde_json() {
        let json_err = serde_json::from_str::<serde_json::Value>("invalid json").unwrap_err();
        let err: Error = json_err.into();
        assert!(matches!(err, Error::Json(_)));
    }

    #[test]
    fn test_result_type_alias() {
        fn _returns_result() -> Result<i32> {
            Ok(42)
        }

        fn _returns_error() -> Result<i32> {
            Err(Error::timeout())
        }
    }
}
