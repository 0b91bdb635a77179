//! Buffers streamed tool-call fragments until they are complete

use std::collections::BTreeMap;

use crate::error::{OperationError, OperationResult};
use crate::types::ToolCallRequest;
use super::wire::parse_arguments;

#[derive(Debug, Default)]
struct Pending {
    name: Option<String>,
    arguments: String,
}

/// Accumulates [`StreamChunk::ToolCallDelta`](crate::types::StreamChunk)
/// fragments per call index.
#[derive(Debug, Default)]
pub struct ToolCallAccumulator {
    pending: BTreeMap<usize, Pending>,
}

impl ToolCallAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, index: usize, name: Option<&str>, arguments: Option<&str>) {
        let entry = self.pending.entry(index).or_default();
        if let Some(name) = name.filter(|n| !n.is_empty()) {
            entry.name = Some(name.to_string());
        }
        if let Some(fragment) = arguments {
            entry.arguments.push_str(fragment);
        }
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Complete every buffered call, in index order
    pub fn finish(&mut self) -> OperationResult<Vec<ToolCallRequest>> {
        std::mem::take(&mut self.pending)
            .into_iter()
            .map(|(index, pending)| {
                let name = pending.name.ok_or_else(|| {
                    OperationError::server_fault(format!("streamed tool call {} never received a name", index))
                })?;
                let arguments = parse_arguments(&pending.arguments)?;
                Ok(ToolCallRequest::from_qualified(&name, arguments))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use serde_json::json;

    #[test]
    fn test_fragments_are_joined_per_index() {
        let mut acc = ToolCallAccumulator::new();
        acc.push(1, Some("clock.now"), Some(""));
        acc.push(0, Some("notes.search"), Some("{\"query\":"));
        acc.push(0, None, Some(" \"rust\"}"));
        assert!(!acc.is_empty());

        let calls = acc.finish().unwrap();
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0].qualified_name(), "notes.search");
        assert_eq!(calls[0].parameters, json!({"query": "rust"}));
        assert_eq!(calls[1].parameters, json!({}));
        assert!(acc.is_empty());
    }

    #[test]
    fn test_incomplete_json_is_a_server_fault() {
        let mut acc = ToolCallAccumulator::new();
        acc.push(0, Some("notes.search"), Some("{\"query\": \"ru"));
        assert_eq!(acc.finish().unwrap_err().kind(), ErrorKind::ServerFault);
    }

    #[test]
    fn test_nameless_call_is_a_server_fault() {
        let mut acc = ToolCallAccumulator::new();
        acc.push(0, None, Some("{}"));
        assert_eq!(acc.finish().unwrap_err().kind(), ErrorKind::ServerFault);
    }
}
