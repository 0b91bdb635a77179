//! Tool registry for the bridge
//!
//! The ToolRegistry is the central component for:
//! - Storing tools and their prompt-relevance metadata
//! - Scoring which tools are relevant to a prompt
//! - Describing the calling convention to the model
//! - Validating arguments and executing tool calls
//!
//! Registrations usually happen at startup; afterwards the registry is read
//! by any number of bridges at once.

use std::collections::HashSet;
use std::sync::Arc;

use parking_lot::RwLock;
use serde_json::Value;

use crate::error::{OperationError, OperationResult};
use crate::logging::{NoOpLogger, SharedLogger};
use crate::types::{FunctionSpec, ToolCallRequest, ToolMetadata};
use super::handler::ToolHandler;
use super::instructions;

/// Score added per matched keyword or category
const MATCH_WEIGHT: i64 = 10;
/// Cap on the priority bonus so priority never outweighs a keyword match
const MAX_PRIORITY_BONUS: i64 = MATCH_WEIGHT - 1;

/// A named set of callable functions
#[derive(Clone)]
pub struct Tool {
    pub name: String,
    pub description: String,
    pub functions: Vec<FunctionSpec>,
    handler: Arc<dyn ToolHandler>,
}

impl Tool {
    pub fn new(name: impl Into<String>, description: impl Into<String>, handler: Arc<dyn ToolHandler>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            functions: Vec::new(),
            handler,
        }
    }

    pub fn with_function(mut self, function: FunctionSpec) -> Self {
        self.functions.push(function);
        self
    }

    pub fn function(&self, name: &str) -> Option<&FunctionSpec> {
        self.functions.iter().find(|f| f.name == name)
    }

    pub fn handler(&self) -> &Arc<dyn ToolHandler> {
        &self.handler
    }
}

impl std::fmt::Debug for Tool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Tool")
            .field("name", &self.name)
            .field("functions", &self.functions.iter().map(|f| &f.name).collect::<Vec<_>>())
            .finish()
    }
}

struct Entry {
    tool: Tool,
    metadata: ToolMetadata,
}

/// Registry of tools available to bridges
pub struct ToolRegistry {
    /// Registration order is kept; it breaks score ties
    entries: RwLock<Vec<Entry>>,
    logger: SharedLogger,
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new(Arc::new(NoOpLogger))
    }
}

impl ToolRegistry {
    pub fn new(logger: SharedLogger) -> Self {
        Self {
            entries: RwLock::new(Vec::new()),
            logger,
        }
    }

    /// Register a tool; a tool with the same name is replaced in place
    pub fn register_tool(&self, tool: Tool, metadata: Option<ToolMetadata>) {
        let metadata = metadata.unwrap_or_default().normalized();
        let mut entries = self.entries.write();
        if let Some(existing) = entries.iter_mut().find(|e| e.tool.name == tool.name) {
            self.logger.info(&format!("[ToolRegistry] Replacing tool: {}", tool.name));
            *existing = Entry { tool, metadata };
        } else {
            self.logger.info(&format!(
                "[ToolRegistry] Registered tool: {} ({} functions)",
                tool.name,
                tool.functions.len()
            ));
            entries.push(Entry { tool, metadata });
        }
    }

    /// Remove a tool and its metadata; no-op if absent
    pub fn unregister_tool(&self, name: &str) {
        let mut entries = self.entries.write();
        let before = entries.len();
        entries.retain(|e| e.tool.name != name);
        if entries.len() < before {
            self.logger.info(&format!("[ToolRegistry] Unregistered tool: {}", name));
        }
    }

    pub fn get_tool(&self, name: &str) -> Option<Tool> {
        self.entries
            .read()
            .iter()
            .find(|e| e.tool.name == name)
            .map(|e| e.tool.clone())
    }

    pub fn get_metadata(&self, name: &str) -> Option<ToolMetadata> {
        self.entries
            .read()
            .iter()
            .find(|e| e.tool.name == name)
            .map(|e| e.metadata.clone())
    }

    /// All tools in registration order
    pub fn get_all_tools(&self) -> Vec<Tool> {
        self.entries.read().iter().map(|e| e.tool.clone()).collect()
    }

    pub fn tool_count(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    /// Names of tools relevant to `prompt`, best first.
    ///
    /// Each keyword found anywhere in the lowercased prompt (substring match,
    /// so multi-word keywords work) and each category appearing as a whole
    /// word adds one match. Tools with matches get a small bonus for
    /// priority. Tools without matches are left out, so the result may be
    /// empty. Ties keep registration order.
    pub fn detect_tools_for_prompt(&self, prompt: &str) -> Vec<String> {
        let lowered = prompt.to_lowercase();
        let words: HashSet<&str> = lowered
            .split(|c: char| !c.is_alphanumeric() && c != '_' && c != '-')
            .filter(|w| !w.is_empty())
            .collect();

        let mut scored: Vec<(i64, String)> = self
            .entries
            .read()
            .iter()
            .filter_map(|entry| {
                let meta = &entry.metadata;
                let keyword_hits = meta.keywords.iter().filter(|k| lowered.contains(k.as_str())).count();
                let category_hits = meta.categories.iter().filter(|c| words.contains(c.as_str())).count();
                let matches = (keyword_hits + category_hits) as i64;
                if matches == 0 {
                    return None;
                }
                let bonus = i64::from(meta.priority).clamp(0, MAX_PRIORITY_BONUS);
                Some((matches * MATCH_WEIGHT + bonus, entry.tool.name.clone()))
            })
            .collect();

        // Stable sort keeps registration order among equal scores.
        scored.sort_by(|a, b| b.0.cmp(&a.0));

        self.logger.debug(&format!(
            "[ToolRegistry] Relevance for prompt ({} chars): {:?}",
            prompt.len(),
            scored
        ));
        scored.into_iter().map(|(_, name)| name).collect()
    }

    /// Highest-scored tool for `prompt`, if any
    pub fn detect_tool_from_prompt(&self, prompt: &str) -> Option<String> {
        self.detect_tools_for_prompt(prompt).into_iter().next()
    }

    /// Calling-convention text for the system prompt; `None` when empty
    pub fn get_tool_instructions(&self) -> Option<String> {
        let snapshot: Vec<(Tool, ToolMetadata)> = self
            .entries
            .read()
            .iter()
            .map(|e| (e.tool.clone(), e.metadata.clone()))
            .collect();
        instructions::render(&snapshot)
    }

    /// Representative arguments for one function, by declared type
    pub fn generate_example_args(&self, tool_name: &str, function_name: &str) -> Option<Value> {
        let entries = self.entries.read();
        let tool = &entries.iter().find(|e| e.tool.name == tool_name)?.tool;
        tool.function(function_name).map(instructions::example_args)
    }

    /// Resolve, validate and run a tool call.
    ///
    /// Unknown tools and functions are `NotFound`, bad arguments are
    /// `Validation`, handler failures are classified by their cause.
    pub async fn execute(&self, call: &ToolCallRequest) -> OperationResult<Value> {
        let tool = self.get_tool(&call.tool_name).ok_or_else(|| {
            OperationError::not_found(format!("no tool named {:?} is registered", call.tool_name))
                .with_suggestion(format!("Check the tool name; available tools: {}", self.tool_names().join(", ")))
        })?;
        let function = tool.function(&call.function_name).ok_or_else(|| {
            OperationError::not_found(format!(
                "tool {:?} has no function {:?}",
                call.tool_name, call.function_name
            ))
            .with_suggestion(format!(
                "Check the function name; {} offers: {}",
                tool.name,
                tool.functions.iter().map(|f| f.name.as_str()).collect::<Vec<_>>().join(", ")
            ))
        })?;
        let arguments = function.validate(&call.parameters)?;

        self.logger.info(&format!("[ToolRegistry] Executing {}", call.qualified_name()));
        tool.handler()
            .execute(&call.function_name, arguments)
            .await
            .map_err(|e| OperationError::classify(e).context(format!("tool {} failed", call.qualified_name())))
    }

    fn tool_names(&self) -> Vec<String> {
        self.entries.read().iter().map(|e| e.tool.name.clone()).collect()
    }
}
