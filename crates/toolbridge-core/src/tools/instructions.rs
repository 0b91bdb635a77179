//! Tool instructions injected into the model's system prompt
//!
//! The canonical call format written here is the same one the bridge's
//! fallback parser accepts, so a model following the instructions produces
//! calls the bridge can recognize.

use serde_json::Value;

use crate::types::{FunctionSpec, ToolCallRequest, ToolMetadata};
use super::registry::Tool;
use super::schema::example_value;

const PREAMBLE: &str = "You can call the tools listed below. To call a tool, reply with one fenced \
JSON block of exactly this shape:\n\n\
```json\n\
{\"tool\": \"<tool name>\", \"function\": \"<function name>\", \"parameters\": {<arguments>}}\n\
```\n\n\
Call one tool at a time. The result comes back as a tool message; use it to answer the user. \
When no tool is needed, answer in plain text without a JSON block.";

/// Example arguments for every parameter of `function`
pub(crate) fn example_args(function: &FunctionSpec) -> Value {
    Value::Object(
        function
            .parameters
            .iter()
            .map(|p| (p.name.clone(), example_value(p)))
            .collect(),
    )
}

/// Canonical invocation text, keys in `tool`, `function`, `parameters` order
pub fn format_invocation(call: &ToolCallRequest) -> String {
    format!(
        "{{\"tool\": {}, \"function\": {}, \"parameters\": {}}}",
        Value::String(call.tool_name.clone()),
        Value::String(call.function_name.clone()),
        call.parameters
    )
}

pub(crate) fn render(tools: &[(Tool, ToolMetadata)]) -> Option<String> {
    if tools.is_empty() {
        return None;
    }
    let mut out = String::from(PREAMBLE);
    for (tool, metadata) in tools {
        out.push_str("\n\n");
        render_tool(&mut out, tool, metadata);
    }
    Some(out)
}

fn render_tool(out: &mut String, tool: &Tool, metadata: &ToolMetadata) {
    out.push_str(&format!("### Tool: {}\n", tool.name));
    if !tool.description.is_empty() {
        out.push_str(&tool.description);
        out.push('\n');
    }
    out.push_str("Functions:\n");
    for function in &tool.functions {
        render_function(out, function);
    }
    if let Some(function) = tool.functions.first() {
        let call = ToolCallRequest::new(&tool.name, &function.name, example_args(function));
        out.push_str("Example:\n```json\n");
        out.push_str(&format_invocation(&call));
        out.push_str("\n```\n");
    }
    if let Some(notes) = metadata.format_instructions.as_deref().filter(|n| !n.trim().is_empty()) {
        out.push_str("Notes: ");
        out.push_str(notes.trim());
        out.push('\n');
    }
}

fn render_function(out: &mut String, function: &FunctionSpec) {
    let params = function
        .parameters
        .iter()
        .map(|p| {
            let mut sig = format!("{}{}: {}", p.name, if p.required { "" } else { "?" }, p.type_label());
            if let Some(default) = &p.default_value {
                sig.push_str(&format!(" = {}", default));
            }
            sig
        })
        .collect::<Vec<_>>()
        .join(", ");
    out.push_str(&format!("- {}({}) -> {}\n", function.name, params, function.return_type));
    if !function.description.is_empty() {
        out.push_str(&format!("  {}\n", function.description));
    }
    for param in &function.parameters {
        if let Some(description) = &param.description {
            out.push_str(&format!("  - {}: {}\n", param.name, description));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::BoxError;
    use crate::tools::handler_fn;
    use crate::types::{ParamType, ParameterSpec};
    use serde_json::json;

    fn weather() -> Tool {
        Tool::new("weather", "Weather lookups", handler_fn(|_, _| async { Ok::<_, BoxError>(json!({})) })).with_function(
            FunctionSpec::new("forecast", "Forecast for a city")
                .param(ParameterSpec::required("city", ParamType::String).with_description("City name"))
                .param(ParameterSpec::optional("days", ParamType::Integer).with_default(json!(3))),
        )
    }

    #[test]
    fn test_no_tools_no_instructions() {
        assert!(render(&[]).is_none());
    }

    #[test]
    fn test_renders_signature_and_example() {
        let meta = ToolMetadata::new().with_format_instructions("Cities in English.");
        let text = render(&[(weather(), meta)]).unwrap();
        assert!(text.contains("### Tool: weather"));
        assert!(text.contains("- forecast(city: string, days?: integer = 3) -> object"));
        assert!(text.contains("  - city: City name"));
        assert!(text.contains(
            "{\"tool\": \"weather\", \"function\": \"forecast\", \"parameters\": {\"city\":\"example\",\"days\":42}}"
        ));
        assert!(text.contains("Notes: Cities in English."));
    }

    #[test]
    fn test_invocation_escapes_names() {
        let call = ToolCallRequest::new("a\"b", "f", json!({}));
        let text = format_invocation(&call);
        let parsed: Value = serde_json::from_str(&text).unwrap();
        assert_eq!(parsed["tool"], "a\"b");
    }
}
