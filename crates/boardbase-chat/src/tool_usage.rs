use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Stable, UI-consumable shape of the backend's tool-invocation metadata.
/// Derived per response, never persisted.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct ToolUsage {
    pub has_tools: bool,
    pub tool_calls: Vec<ToolCallView>,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct ToolCallView {
    pub name: String,
    pub arguments: Value,
    pub result_content: String,
}

impl ToolUsage {
    pub fn none() -> Self {
        Self {
            has_tools: false,
            tool_calls: Vec::new(),
        }
    }
}

/// Reshapes whatever the backend attached under `tool_usage` into
/// [`ToolUsage`]. The backend shape is `{has_tools, tool_calls:
/// [{function: {name, arguments}, content}]}`, but flat `{name, arguments}`
/// entries are accepted too. Anything unrecognizable degrades to an empty
/// payload with a warn log; normalization must never fail the chat turn.
pub fn normalize(raw: Option<&Value>) -> ToolUsage {
    let Some(raw) = raw else {
        return ToolUsage::none();
    };
    if raw.is_null() {
        return ToolUsage::none();
    }

    let Some(entries) = raw.get("tool_calls").and_then(Value::as_array) else {
        if !raw.is_object() {
            tracing::warn!("tool usage payload is not an object, dropping");
        }
        return ToolUsage::none();
    };

    let mut tool_calls = Vec::new();
    for entry in entries {
        match normalize_call(entry) {
            Some(call) => tool_calls.push(call),
            None => {
                tracing::warn!("unrecognized tool call entry, dropping");
            }
        }
    }

    ToolUsage {
        has_tools: !tool_calls.is_empty(),
        tool_calls,
    }
}

fn normalize_call(entry: &Value) -> Option<ToolCallView> {
    let function = entry.get("function").unwrap_or(entry);
    let name = function.get("name")?.as_str()?.to_string();
    if name.is_empty() {
        return None;
    }
    let arguments = function.get("arguments").cloned().unwrap_or(Value::Null);
    let result_content = flatten_content(entry.get("content"));
    Some(ToolCallView {
        name,
        arguments,
        result_content,
    })
}

/// Tool results arrive either as a plain string or as segments like
/// `[{"type": "text", "text": "..."}]`.
fn flatten_content(content: Option<&Value>) -> String {
    match content {
        Some(Value::String(text)) => text.clone(),
        Some(Value::Array(segments)) => {
            let mut out = String::new();
            for segment in segments {
                if let Some(text) = segment.get("text").and_then(Value::as_str) {
                    out.push_str(text);
                }
            }
            if out.is_empty() {
                "No result".to_string()
            } else {
                out
            }
        }
        _ => "No result".to_string(),
    }
}
