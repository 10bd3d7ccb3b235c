//! Common types for LLM interactions
//!
//! Everything here is backend-neutral. Each translator converts these into
//! its own wire shapes and back; none of those shapes leave the translator.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// LLM request
#[derive(Debug, Clone)]
pub struct LlmRequest {
    pub system: Vec<SystemContent>,
    pub messages: Vec<LlmMessage>,
    pub tools: Vec<ToolDefinition>,
    pub max_tokens: Option<u32>,
}

/// System prompt content
#[derive(Debug, Clone)]
pub struct SystemContent {
    pub text: String,
}

impl SystemContent {
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }
}

/// Joins all system blocks for backends that take a single instruction string
pub fn joined_system_text(system: &[SystemContent]) -> Option<String> {
    if system.is_empty() {
        return None;
    }
    Some(
        system
            .iter()
            .map(|s| s.text.as_str())
            .collect::<Vec<_>>()
            .join("\n\n"),
    )
}

/// Message in conversation
#[derive(Debug, Clone, PartialEq)]
pub struct LlmMessage {
    pub role: MessageRole,
    pub content: Vec<ContentBlock>,
}

impl LlmMessage {
    pub fn user_text(text: impl Into<String>) -> Self {
        Self {
            role: MessageRole::User,
            content: vec![ContentBlock::text(text)],
        }
    }
}

/// Message role
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    User,
    Assistant,
}

/// Content block in a message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentBlock {
    Text {
        text: String,
    },
    ToolUse {
        id: String,
        name: String,
        input: serde_json::Value,
    },
    ToolResult {
        tool_use_id: String,
        /// Gemini correlates results by function name rather than id
        tool_name: String,
        content: String,
    },
}

impl ContentBlock {
    pub fn text(s: impl Into<String>) -> Self {
        ContentBlock::Text { text: s.into() }
    }

    #[cfg(test)]
    pub fn tool_use(
        id: impl Into<String>,
        name: impl Into<String>,
        input: serde_json::Value,
    ) -> Self {
        ContentBlock::ToolUse {
            id: id.into(),
            name: name.into(),
            input,
        }
    }

    pub fn tool_result(
        tool_use_id: impl Into<String>,
        tool_name: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        ContentBlock::ToolResult {
            tool_use_id: tool_use_id.into(),
            tool_name: tool_name.into(),
            content: content.into(),
        }
    }
}

/// JSON type of a single tool parameter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParamType {
    String,
    Number,
    Integer,
    Boolean,
    Object,
    Array,
}

impl ParamType {
    /// Upper-case spelling used by Gemini's OpenAPI subset
    pub fn openapi_name(self) -> &'static str {
        match self {
            ParamType::String => "STRING",
            ParamType::Number => "NUMBER",
            ParamType::Integer => "INTEGER",
            ParamType::Boolean => "BOOLEAN",
            ParamType::Object => "OBJECT",
            ParamType::Array => "ARRAY",
        }
    }
}

/// Schema for one named tool parameter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParamSpec {
    #[serde(rename = "type")]
    pub kind: ParamType,
    pub description: String,
    #[serde(rename = "enum", default, skip_serializing_if = "Option::is_none")]
    pub allowed: Option<Vec<String>>,
}

impl ParamSpec {
    pub fn string(description: impl Into<String>) -> Self {
        Self {
            kind: ParamType::String,
            description: description.into(),
            allowed: None,
        }
    }

    pub fn number(description: impl Into<String>) -> Self {
        Self {
            kind: ParamType::Number,
            description: description.into(),
            allowed: None,
        }
    }

    pub fn one_of(description: impl Into<String>, values: &[&str]) -> Self {
        Self {
            kind: ParamType::String,
            description: description.into(),
            allowed: Some(values.iter().map(|v| (*v).to_string()).collect()),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ObjectType {
    #[default]
    #[serde(rename = "object")]
    Object,
}

/// Parameter block of a tool: always a JSON object schema
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ToolParameters {
    #[serde(rename = "type")]
    pub schema_type: ObjectType,
    pub properties: BTreeMap<String, ParamSpec>,
    pub required: Vec<String>,
}

impl ToolParameters {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn required(mut self, name: &str, spec: ParamSpec) -> Self {
        self.properties.insert(name.to_string(), spec);
        self.required.push(name.to_string());
        self
    }

    #[must_use]
    pub fn optional(mut self, name: &str, spec: ParamSpec) -> Self {
        self.properties.insert(name.to_string(), spec);
        self
    }
}

/// Tool definition advertised to the model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    pub parameters: ToolParameters,
}

impl ToolDefinition {
    /// Standard JSON-schema rendering (Anthropic and `OpenAI` take this verbatim)
    pub fn json_schema(&self) -> serde_json::Value {
        serde_json::to_value(&self.parameters).unwrap_or_else(|_| {
            serde_json::json!({ "type": "object", "properties": {}, "required": [] })
        })
    }
}

/// LLM response
#[derive(Debug, Clone)]
pub struct LlmResponse {
    pub content: Vec<ContentBlock>,
    /// Whether the model expects another call once this turn's tools are
    /// resolved. Each translator computes this once from its stop signal.
    pub wants_continue: bool,
    pub usage: Usage,
}

impl LlmResponse {
    /// Extract all tool use requests from the response
    pub fn tool_uses(&self) -> Vec<(&str, &str, &serde_json::Value)> {
        self.content
            .iter()
            .filter_map(|block| match block {
                ContentBlock::ToolUse { id, name, input } => {
                    Some((id.as_str(), name.as_str(), input))
                }
                _ => None,
            })
            .collect()
    }

    /// Get text content from the response
    #[cfg(test)]
    pub fn text(&self) -> String {
        self.content
            .iter()
            .filter_map(|block| match block {
                ContentBlock::Text { text } => Some(text.as_str()),
                _ => None,
            })
            .collect::<Vec<_>>()
            .join("")
    }
}

/// Usage statistics
#[derive(Debug, Clone, Default)]
pub struct Usage {
    pub input_tokens: u64,
    pub output_tokens: u64,
}
