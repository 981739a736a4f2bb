//! Dynamic tool registry.
//!
//! A [`Toolkit`] holds the tools an agent can invoke during the acting phase. Registration is
//! by name; registering a second tool under a name already in use replaces the first
//! (last-registration-wins), which the structured-output controller relies on to register and
//! later remove its synthetic `generate_response` tool without disturbing caller-registered
//! tools of other names.

use crate::tools::Tool;
use crate::{Error, Result};
use std::collections::HashMap;
use std::sync::Arc;

/// A named collection of tools available for the acting phase to invoke.
#[derive(Clone, Default)]
pub struct Toolkit {
    tools: HashMap<String, Arc<Tool>>,
    /// Preserves registration order for `list()`, independent of the backing map's iteration
    /// order.
    order: Vec<String>,
}

impl Toolkit {
    /// Creates an empty toolkit.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a toolkit seeded with the given tools, in order.
    pub fn with_tools(tools: Vec<Arc<Tool>>) -> Self {
        let mut toolkit = Self::new();
        for tool in tools {
            toolkit.register(tool);
        }
        toolkit
    }

    /// Registers a tool. If a tool with the same name is already registered, it is replaced,
    /// keeping its position in `list()`'s output.
    pub fn register(&mut self, tool: impl Into<Arc<Tool>>) {
        let tool = tool.into();
        let name = tool.name().to_string();
        if !self.tools.contains_key(&name) {
            self.order.push(name.clone());
        }
        self.tools.insert(name, tool);
    }

    /// Removes a tool by name. Idempotent: removing an unregistered name is a no-op.
    pub fn remove_tool(&mut self, name: &str) {
        if self.tools.remove(name).is_some() {
            self.order.retain(|n| n != name);
        }
    }

    /// Returns all registered tools, in registration order.
    pub fn list(&self) -> Vec<Arc<Tool>> {
        self.order
            .iter()
            .filter_map(|name| self.tools.get(name).cloned())
            .collect()
    }

    /// Returns whether a tool with the given name is registered.
    pub fn contains(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    /// Returns the number of registered tools.
    pub fn len(&self) -> usize {
        self.tools.len()
    }

    /// Returns whether no tools are registered.
    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Invokes the named tool with the given arguments.
    pub async fn invoke(&self, name: &str, arguments: serde_json::Value) -> Result<serde_json::Value> {
        let tool = self
            .tools
            .get(name)
            .ok_or_else(|| Error::tool(format!("tool '{name}' is not registered")))?;
        tool.execute(arguments).await
    }

    /// Returns the OpenAI-format tool descriptors for every registered tool, in order, suitable
    /// for inclusion in a model request's `tools` array.
    pub fn to_openai_format(&self) -> Vec<serde_json::Value> {
        self.list().iter().map(|t| t.to_openai_format()).collect()
    }
}

impl std::fmt::Debug for Toolkit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Toolkit")
            .field("tools", &self.order)
            .finish()
    }
}
