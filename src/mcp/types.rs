use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// A tool as advertised by `tools/list`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct McpTool {
    pub name: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(rename = "inputSchema", default = "empty_object_schema")]
    pub input_schema: serde_json::Value,
}

fn empty_object_schema() -> serde_json::Value {
    serde_json::json!({ "type": "object", "properties": {} })
}

impl McpTool {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            title: None,
            description: Some(description.into()),
            input_schema: empty_object_schema(),
        }
    }

    /// Name the model sees for this tool.
    pub fn exposed_name(&self) -> String {
        sanitize_tool_name(&self.name)
    }

    /// Responses API function-tool definition, advertised under `exposed`.
    pub fn to_function_tool(&self, exposed: &str) -> serde_json::Value {
        serde_json::json!({
            "type": "function",
            "name": exposed,
            "description": self.description.as_deref().unwrap_or(""),
            "parameters": self.input_schema,
            "strict": false
        })
    }
}

/// Text handed back to the model after a `tools/call`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolOutput {
    pub text: String,
    pub is_error: bool,
}

impl ToolOutput {
    /// Render a `tools/call` result (as JSON) into model-facing text.
    ///
    /// Text parts are joined with newlines; any other content kind is kept
    /// as its JSON encoding. Falls back to `structuredContent` when the
    /// server returned no content parts.
    pub fn from_call_result(result: &serde_json::Value) -> Self {
        let is_error = result
            .get("isError")
            .and_then(serde_json::Value::as_bool)
            .unwrap_or(false);

        let parts: Vec<String> = result
            .get("content")
            .and_then(serde_json::Value::as_array)
            .map(|items| {
                items
                    .iter()
                    .map(|item| match item.get("type").and_then(|t| t.as_str()) {
                        Some("text") => item
                            .get("text")
                            .and_then(|t| t.as_str())
                            .unwrap_or_default()
                            .to_string(),
                        _ => item.to_string(),
                    })
                    .collect()
            })
            .unwrap_or_default();

        let text = if parts.is_empty() {
            result
                .get("structuredContent")
                .filter(|v| !v.is_null())
                .map(ToString::to_string)
                .unwrap_or_default()
        } else {
            parts.join("\n")
        };

        Self { text, is_error }
    }
}

/// Names the model sees for `tools`, in order, with no duplicates.
///
/// Tools whose sanitized names collide (`a.b` and `a_b`) get a numeric
/// suffix in listing order: `a_b`, `a_b_2`.
pub fn unique_exposed_names(tools: &[McpTool]) -> Vec<String> {
    let mut used = HashSet::new();
    tools
        .iter()
        .map(|tool| {
            let base = tool.exposed_name();
            let mut candidate = base.clone();
            let mut n = 2;
            while used.contains(&candidate) {
                candidate = format!("{base}_{n}");
                n += 1;
            }
            used.insert(candidate.clone());
            candidate
        })
        .collect()
}

/// Sanitize tool names for `OpenAI` API compatibility (`^[a-zA-Z0-9_-]+$`).
pub fn sanitize_tool_name(name: &str) -> String {
    name.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '_' || c == '-' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_tool_deserializes_from_list_result() {
        let tool: McpTool = serde_json::from_value(json!({
            "name": "gmail.search",
            "description": "Search mail",
            "inputSchema": { "type": "object", "properties": { "q": { "type": "string" } } }
        }))
        .unwrap();

        assert_eq!(tool.exposed_name(), "gmail_search");
        let def = tool.to_function_tool(&tool.exposed_name());
        assert_eq!(def["type"], "function");
        assert_eq!(def["name"], "gmail_search");
        assert_eq!(def["parameters"]["properties"]["q"]["type"], "string");
    }

    #[test]
    fn test_missing_schema_defaults_to_object() {
        let tool: McpTool = serde_json::from_value(json!({ "name": "ping" })).unwrap();
        assert_eq!(tool.input_schema["type"], "object");
        assert_eq!(tool.to_function_tool("ping")["description"], "");
    }

    #[test]
    fn test_colliding_names_get_suffixes() {
        let tools = vec![
            McpTool::new("a.b", ""),
            McpTool::new("a_b", ""),
            McpTool::new("a_b_2", ""),
            McpTool::new("c", ""),
        ];
        assert_eq!(unique_exposed_names(&tools), vec!["a_b", "a_b_2", "a_b_2_2", "c"]);
        assert!(unique_exposed_names(&[]).is_empty());
    }

    #[test]
    fn test_output_joins_text_parts() {
        let out = ToolOutput::from_call_result(&json!({
            "content": [
                { "type": "text", "text": "first" },
                { "type": "image", "data": "AAAA", "mimeType": "image/png" },
                { "type": "text", "text": "last" }
            ]
        }));
        assert!(!out.is_error);
        assert!(out.text.starts_with("first\n"));
        assert!(out.text.contains("image/png"));
        assert!(out.text.ends_with("\nlast"));
    }

    #[test]
    fn test_output_error_and_structured_fallback() {
        let out = ToolOutput::from_call_result(&json!({
            "content": [],
            "structuredContent": { "count": 2 },
            "isError": true
        }));
        assert!(out.is_error);
        assert_eq!(out.text, r#"{"count":2}"#);
    }
}
