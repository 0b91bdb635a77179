//! Tool calls written into plain model text
//!
//! Used only when a response carries no structured tool call. A block counts
//! as a call when it is fenced (no language, `json` or `tool_call`) and holds
//! a JSON object with exactly the keys `tool`, `function` and `parameters`,
//! naming a registered tool and one of its functions. Anything else,
//! including malformed or ambiguous blocks, is plain content.

use serde_json::Value;

use crate::tools::ToolRegistry;
use crate::types::ToolCallRequest;

const FENCE: &str = "```";
const ACCEPTED_LANGUAGES: [&str; 3] = ["", "json", "tool_call"];

/// First valid tool call written in `text`, if any
pub fn parse_fallback_tool_call(text: &str, registry: &ToolRegistry) -> Option<ToolCallRequest> {
    fenced_blocks(text)
        .into_iter()
        .filter(|(language, _)| ACCEPTED_LANGUAGES.contains(&language.to_ascii_lowercase().as_str()))
        .find_map(|(_, body)| parse_block(body, registry))
}

fn parse_block(body: &str, registry: &ToolRegistry) -> Option<ToolCallRequest> {
    let value: Value = serde_json::from_str(body.trim()).ok()?;
    let object = value.as_object()?;
    if object.len() != 3 {
        return None;
    }
    let tool = object.get("tool")?.as_str()?;
    let function = object.get("function")?.as_str()?;
    let parameters = object.get("parameters").filter(|p| p.is_object())?;

    registry.get_tool(tool)?.function(function)?;
    Some(ToolCallRequest::new(tool, function, parameters.clone()))
}

/// `(language, body)` of every closed fenced block, in order
fn fenced_blocks(text: &str) -> Vec<(&str, &str)> {
    let mut blocks = Vec::new();
    let mut rest = text;
    while let Some(open) = rest.find(FENCE) {
        let after = &rest[open + FENCE.len()..];
        let Some(line_end) = after.find('\n') else { break };
        let language = after[..line_end].trim();
        let body = &after[line_end + 1..];
        let Some(close) = body.find(FENCE) else { break };
        blocks.push((language, &body[..close]));
        rest = &body[close + FENCE.len()..];
    }
    blocks
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::BoxError;
    use crate::tools::{handler_fn, Tool};
    use crate::types::{FunctionSpec, ParamType, ParameterSpec};
    use serde_json::json;

    fn registry() -> ToolRegistry {
        let registry = ToolRegistry::default();
        registry.register_tool(
            Tool::new("weather", "Weather", handler_fn(|_, _| async { Ok::<_, BoxError>(json!({})) })).with_function(
                FunctionSpec::new("forecast", "Forecast").param(ParameterSpec::required("city", ParamType::String)),
            ),
            None,
        );
        registry
    }

    #[test]
    fn test_parses_fenced_call() {
        let text = "Let me check.\n```json\n{\"tool\": \"weather\", \"function\": \"forecast\", \"parameters\": {\"city\": \"Oslo\"}}\n```\n";
        let call = parse_fallback_tool_call(text, &registry()).unwrap();
        assert_eq!(call, ToolCallRequest::new("weather", "forecast", json!({"city": "Oslo"})));
    }

    #[test]
    fn test_accepts_bare_and_tool_call_fences() {
        let reg = registry();
        let bare = "```\n{\"tool\":\"weather\",\"function\":\"forecast\",\"parameters\":{}}\n```";
        assert!(parse_fallback_tool_call(bare, &reg).is_some());
        let tagged = "```TOOL_CALL\n{\"tool\":\"weather\",\"function\":\"forecast\",\"parameters\":{}}\n```";
        assert!(parse_fallback_tool_call(tagged, &reg).is_some());
    }

    #[test]
    fn test_prose_is_not_a_call() {
        let reg = registry();
        let unfenced = "I would call {\"tool\": \"weather\", \"function\": \"forecast\", \"parameters\": {}} here.";
        assert!(parse_fallback_tool_call(unfenced, &reg).is_none());
        let other_language = "```python\n{\"tool\":\"weather\",\"function\":\"forecast\",\"parameters\":{}}\n```";
        assert!(parse_fallback_tool_call(other_language, &reg).is_none());
        let unclosed = "```json\n{\"tool\":\"weather\",\"function\":\"forecast\",\"parameters\":{}}";
        assert!(parse_fallback_tool_call(unclosed, &reg).is_none());
    }

    #[test]
    fn test_ambiguous_blocks_are_content() {
        let reg = registry();
        for body in [
            "{\"tool\":\"weather\",\"function\":\"forecast\"}",
            "{\"tool\":\"weather\",\"function\":\"forecast\",\"parameters\":{},\"extra\":1}",
            "{\"tool\":\"weather\",\"function\":\"forecast\",\"parameters\":\"city=Oslo\"}",
            "{\"tool\":\"radio\",\"function\":\"forecast\",\"parameters\":{}}",
            "{\"tool\":\"weather\",\"function\":\"history\",\"parameters\":{}}",
            "{\"tool\":\"weather\",\"function\":\"forecast\",\"parameters\":{",
        ] {
            let text = format!("```json\n{}\n```", body);
            assert!(parse_fallback_tool_call(&text, &reg).is_none(), "{}", body);
        }
    }

    #[test]
    fn test_first_valid_block_wins() {
        let text = "```json\n{\"not\": \"a call\"}\n```\n\
                    ```json\n{\"tool\":\"weather\",\"function\":\"forecast\",\"parameters\":{\"city\":\"Bergen\"}}\n```\n\
                    ```json\n{\"tool\":\"weather\",\"function\":\"forecast\",\"parameters\":{\"city\":\"Oslo\"}}\n```";
        let call = parse_fallback_tool_call(text, &registry()).unwrap();
        assert_eq!(call.parameters["city"], "Bergen");
    }
}
