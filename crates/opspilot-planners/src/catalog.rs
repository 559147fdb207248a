//! Tool catalog rendering for LLM prompts.

use std::fmt::Write;

use serde_json::Value;

use opspilot_core::schema;
use opspilot_core::tool::ToolMeta;
use opspilot_core::truncate_for_log;

/// Append one entry per tool: name, description and argument hints.
pub fn render_tool_catalog(buf: &mut String, catalog: &[ToolMeta]) {
    for tool in catalog {
        let _ = writeln!(buf, "- name: {}", tool.name);
        let _ = writeln!(buf, "  description: {}", tool.description);
        append_schema_fields(buf, "arguments", &tool.input_schema);
        append_schema_fields(buf, "output_fields", &tool.output_schema);
    }
}

fn append_schema_fields(buf: &mut String, label: &str, schema_value: &Value) {
    let Some(properties) = schema::properties(schema_value) else {
        let _ = writeln!(buf, "  {}: []", label);
        return;
    };

    let required = schema::required_fields(schema_value);
    let mut keys: Vec<&str> = properties.keys().map(String::as_str).collect();
    keys.sort_unstable();

    let _ = writeln!(buf, "  {}:", label);
    for key in keys {
        let Some(field_schema) = properties.get(key) else {
            continue;
        };
        let required_label = if required.contains(&key) {
            "required"
        } else {
            "optional"
        };
        let mut extras = Vec::new();
        if let Some(desc) = field_schema.get("description").and_then(Value::as_str) {
            extras.push(format!("desc={}", desc));
        }
        if let Some(default) = field_schema.get("default") {
            extras.push(format!(
                "default={}",
                truncate_for_log(&default.to_string(), 120)
            ));
        }
        let type_hint = schema::type_hint(field_schema);
        if extras.is_empty() {
            let _ = writeln!(buf, "    - {} ({}, {})", key, type_hint, required_label);
        } else {
            let _ = writeln!(
                buf,
                "    - {} ({}, {}): {}",
                key,
                type_hint,
                required_label,
                extras.join("; ")
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_render_lists_required_and_optional_arguments() {
        let catalog = vec![ToolMeta::new("github_search", "Search GitHub repositories by keyword.")
            .with_input_schema(json!({
                "type": "object",
                "required": ["query"],
                "properties": {
                    "query": {"type": "string", "description": "search query"},
                    "top_n": {"type": "integer", "default": 5}
                }
            }))];
        let mut buf = String::new();
        render_tool_catalog(&mut buf, &catalog);

        assert!(buf.contains("- name: github_search"));
        assert!(buf.contains("    - query (string, required): desc=search query"));
        assert!(buf.contains("    - top_n (integer, optional): default=5"));
        assert!(buf.contains("  output_fields: []"));
    }
}
