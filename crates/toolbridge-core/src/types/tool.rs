//! Tool schema and tool-call types

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Declared type of a function parameter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParamType {
    String,
    Number,
    Integer,
    Boolean,
    Array,
    Object,
}

impl ParamType {
    pub fn as_str(self) -> &'static str {
        match self {
            ParamType::String => "string",
            ParamType::Number => "number",
            ParamType::Integer => "integer",
            ParamType::Boolean => "boolean",
            ParamType::Array => "array",
            ParamType::Object => "object",
        }
    }

    /// Whether a JSON value has this type.
    ///
    /// Integers are numbers; integral floats such as `2.0` count as integers.
    pub fn matches(self, value: &Value) -> bool {
        match self {
            ParamType::String => value.is_string(),
            ParamType::Number => value.is_number(),
            ParamType::Integer => {
                value.is_i64()
                    || value.is_u64()
                    || value.as_f64().map(|f| f.fract() == 0.0 && f.is_finite()).unwrap_or(false)
            }
            ParamType::Boolean => value.is_boolean(),
            ParamType::Array => value.is_array(),
            ParamType::Object => value.is_object(),
        }
    }
}

impl std::fmt::Display for ParamType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One declared parameter of a tool function
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParameterSpec {
    pub name: String,
    #[serde(rename = "type")]
    pub param_type: ParamType,
    #[serde(default)]
    pub required: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_value: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Element type for arrays
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub items: Option<ParamType>,
}

impl ParameterSpec {
    pub fn required(name: impl Into<String>, param_type: ParamType) -> Self {
        Self {
            name: name.into(),
            param_type,
            required: true,
            default_value: None,
            description: None,
            items: None,
        }
    }

    pub fn optional(name: impl Into<String>, param_type: ParamType) -> Self {
        Self {
            required: false,
            ..Self::required(name, param_type)
        }
    }

    pub fn with_default(mut self, value: Value) -> Self {
        self.default_value = Some(value);
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_items(mut self, items: ParamType) -> Self {
        self.items = Some(items);
        self
    }

    /// Type as shown in tool instructions, e.g. `array<string>`
    pub fn type_label(&self) -> String {
        match (self.param_type, self.items) {
            (ParamType::Array, Some(items)) => format!("array<{}>", items),
            (ty, _) => ty.to_string(),
        }
    }
}

/// A callable function exposed by a tool
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FunctionSpec {
    pub name: String,
    pub description: String,
    #[serde(default)]
    pub parameters: Vec<ParameterSpec>,
    pub return_type: ParamType,
}

impl FunctionSpec {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            parameters: Vec::new(),
            return_type: ParamType::Object,
        }
    }

    /// Append a parameter (declaration order is kept)
    pub fn param(mut self, parameter: ParameterSpec) -> Self {
        self.parameters.push(parameter);
        self
    }

    pub fn returns(mut self, return_type: ParamType) -> Self {
        self.return_type = return_type;
        self
    }

    pub fn parameter(&self, name: &str) -> Option<&ParameterSpec> {
        self.parameters.iter().find(|p| p.name == name)
    }
}

/// Prompt-relevance metadata attached to a tool at registration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolMetadata {
    #[serde(default)]
    pub keywords: BTreeSet<String>,
    #[serde(default)]
    pub categories: BTreeSet<String>,
    #[serde(default)]
    pub priority: i32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format_instructions: Option<String>,
}

impl ToolMetadata {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_keywords<I, S>(mut self, keywords: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.keywords.extend(keywords.into_iter().map(Into::into));
        self
    }

    pub fn with_categories<I, S>(mut self, categories: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.categories.extend(categories.into_iter().map(Into::into));
        self
    }

    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_format_instructions(mut self, instructions: impl Into<String>) -> Self {
        self.format_instructions = Some(instructions.into());
        self
    }

    /// Lowercased, trimmed copy used for matching
    pub(crate) fn normalized(mut self) -> Self {
        self.keywords = normalize_set(self.keywords);
        self.categories = normalize_set(self.categories);
        self
    }
}

fn normalize_set(set: BTreeSet<String>) -> BTreeSet<String> {
    set.into_iter()
        .map(|s| s.trim().to_lowercase())
        .filter(|s| !s.is_empty())
        .collect()
}

/// A model-emitted request to run one tool function
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolCallRequest {
    pub tool_name: String,
    pub function_name: String,
    pub parameters: Value,
}

impl ToolCallRequest {
    pub fn new(tool_name: impl Into<String>, function_name: impl Into<String>, parameters: Value) -> Self {
        Self {
            tool_name: tool_name.into(),
            function_name: function_name.into(),
            parameters,
        }
    }

    /// Build from a wire name `tool.function`.
    ///
    /// A name without a dot names both the tool and its function.
    pub fn from_qualified(name: &str, parameters: Value) -> Self {
        match name.split_once('.') {
            Some((tool, function)) => Self::new(tool, function, parameters),
            None => Self::new(name, name, parameters),
        }
    }

    /// Wire name `tool.function`
    pub fn qualified_name(&self) -> String {
        if self.tool_name == self.function_name {
            self.tool_name.clone()
        } else {
            format!("{}.{}", self.tool_name, self.function_name)
        }
    }

    /// Get a parameter by key
    pub fn get_arg(&self, key: &str) -> Option<&Value> {
        self.parameters.get(key)
    }
}
