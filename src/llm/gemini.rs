//! Google Gemini protocol translator
//!
//! Tool calls arrive as `functionCall` parts without ids; results go back
//! as `functionResponse` parts keyed by function name.

use super::types::{
    joined_system_text, ContentBlock, LlmRequest, LlmResponse, MessageRole, ToolDefinition, Usage,
};
use super::{LlmError, LlmService};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::time::Duration;

/// Gemini service implementation
pub struct GeminiService {
    client: Client,
    api_key: String,
    model: String,
    base_url: String,
}

impl GeminiService {
    pub fn new(api_key: String, model: &str, gateway: Option<&str>) -> Result<Self, LlmError> {
        let base_url = match gateway {
            Some(gw) => format!(
                "{}/gemini/v1beta/models/{model}:generateContent",
                gw.trim_end_matches('/')
            ),
            None => format!(
                "https://generativelanguage.googleapis.com/v1beta/models/{model}:generateContent"
            ),
        };

        let client = Client::builder()
            .timeout(Duration::from_secs(300))
            .build()
            .map_err(|e| LlmError::unknown(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            api_key,
            model: model.to_string(),
            base_url,
        })
    }
}

pub(crate) fn translate_request(request: &LlmRequest) -> GeminiRequest {
    let system_instruction = joined_system_text(&request.system).map(|text| GeminiContent {
        role: None,
        parts: vec![GeminiPart::Text { text }],
    });

    let mut contents = Vec::new();
    for msg in &request.messages {
        let role = match msg.role {
            MessageRole::User => "user",
            MessageRole::Assistant => "model",
        };

        let parts: Vec<GeminiPart> = msg
            .content
            .iter()
            .map(|block| match block {
                ContentBlock::Text { text } => GeminiPart::Text { text: text.clone() },
                ContentBlock::ToolUse { name, input, .. } => GeminiPart::FunctionCall {
                    function_call: GeminiFunctionCall {
                        name: name.clone(),
                        args: input.clone(),
                    },
                },
                ContentBlock::ToolResult {
                    tool_name, content, ..
                } => GeminiPart::FunctionResponse {
                    function_response: GeminiFunctionResponse {
                        name: tool_name.clone(),
                        response: function_response_payload(content),
                    },
                },
            })
            .collect();

        if !parts.is_empty() {
            contents.push(GeminiContent {
                role: Some(role.to_string()),
                parts,
            });
        }
    }

    let tools = if request.tools.is_empty() {
        None
    } else {
        Some(vec![GeminiTool {
            function_declarations: request.tools.iter().map(translate_tool).collect(),
        }])
    };

    GeminiRequest {
        contents,
        system_instruction,
        tools,
        generation_config: request.max_tokens.map(|max| GeminiGenerationConfig {
            max_output_tokens: max,
        }),
    }
}

/// Gemini wants a JSON object back; structured tool output is passed through,
/// anything else is wrapped as `{"result": ...}`.
fn function_response_payload(content: &str) -> Value {
    match serde_json::from_str::<Value>(content) {
        Ok(value @ Value::Object(_)) => value,
        Ok(other) => json!({ "result": other }),
        Err(_) => json!({ "result": content }),
    }
}

/// Render a tool schema in Gemini's upper-case `OpenAPI` dialect
pub(crate) fn translate_tool(tool: &ToolDefinition) -> GeminiFunctionDeclaration {
    let properties: Map<String, Value> = tool
        .parameters
        .properties
        .iter()
        .map(|(name, spec)| {
            let mut schema = json!({
                "type": spec.kind.openapi_name(),
                "description": spec.description,
            });
            if let Some(allowed) = &spec.allowed {
                schema["enum"] = json!(allowed);
            }
            (name.clone(), schema)
        })
        .collect();

    let mut parameters = json!({
        "type": "OBJECT",
        "properties": properties,
    });
    if !tool.parameters.required.is_empty() {
        parameters["required"] = json!(tool.parameters.required);
    }

    GeminiFunctionDeclaration {
        name: tool.name.clone(),
        description: tool.description.clone(),
        parameters,
    }
}

pub(crate) fn normalize_response(resp: GeminiResponse) -> Result<LlmResponse, LlmError> {
    let candidate = resp
        .candidates
        .into_iter()
        .next()
        .ok_or_else(|| LlmError::unknown("No candidates in response"))?;

    let mut content = Vec::new();
    for part in candidate.content.map(|c| c.parts).unwrap_or_default() {
        match part {
            GeminiPart::Text { text } => {
                if !text.is_empty() {
                    content.push(ContentBlock::Text { text });
                }
            }
            GeminiPart::FunctionCall { function_call } => {
                let args = match function_call.args {
                    Value::Null => json!({}),
                    other => other,
                };
                content.push(ContentBlock::ToolUse {
                    // Gemini has no call ids; mint one so results can be correlated
                    id: format!("gemini-{}", uuid::Uuid::new_v4()),
                    name: function_call.name,
                    input: args,
                });
            }
            GeminiPart::FunctionResponse { .. } | GeminiPart::Other(_) => {}
        }
    }

    let usage = resp.usage_metadata.unwrap_or_default();
    Ok(LlmResponse {
        content,
        // finishReason is STOP even when function calls are pending, so it
        // carries no end-of-turn signal; only an empty tool list ends the loop.
        wants_continue: true,
        usage: Usage {
            input_tokens: u64::from(usage.prompt_token_count),
            output_tokens: u64::from(usage.candidates_token_count),
        },
    })
}

#[async_trait]
impl LlmService for GeminiService {
    async fn complete(&self, request: &LlmRequest) -> Result<LlmResponse, LlmError> {
        let gemini_request = translate_request(request);

        let response = self
            .client
            .post(&self.base_url)
            .header("x-goog-api-key", &self.api_key)
            .header("content-type", "application/json")
            .json(&gemini_request)
            .send()
            .await
            .map_err(|e| LlmError::from_transport(&e))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| LlmError::network(format!("Failed to read response: {e}")))?;

        if !status.is_success() {
            let message = serde_json::from_str::<GeminiErrorResponse>(&body)
                .map_or(body, |e| e.error.message);
            return Err(LlmError::from_status(status, &message));
        }

        let gemini_response: GeminiResponse = serde_json::from_str(&body).map_err(|e| {
            LlmError::unknown(format!("Failed to parse response: {e} - body: {body}"))
        })?;

        normalize_response(gemini_response)
    }

    fn model_id(&self) -> &str {
        &self.model
    }
}

// Gemini API types

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct GeminiRequest {
    pub(crate) contents: Vec<GeminiContent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<GeminiContent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tools: Option<Vec<GeminiTool>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    generation_config: Option<GeminiGenerationConfig>,
}

#[derive(Debug, Serialize, Deserialize)]
pub(crate) struct GeminiContent {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub(crate) role: Option<String>,
    #[serde(default)]
    pub(crate) parts: Vec<GeminiPart>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(untagged)]
pub(crate) enum GeminiPart {
    Text {
        text: String,
    },
    FunctionCall {
        #[serde(rename = "functionCall")]
        function_call: GeminiFunctionCall,
    },
    FunctionResponse {
        #[serde(rename = "functionResponse")]
        function_response: GeminiFunctionResponse,
    },
    Other(Value),
}

#[derive(Debug, Serialize, Deserialize)]
pub(crate) struct GeminiFunctionCall {
    pub(crate) name: String,
    #[serde(default)]
    pub(crate) args: Value,
}

#[derive(Debug, Serialize, Deserialize)]
pub(crate) struct GeminiFunctionResponse {
    pub(crate) name: String,
    pub(crate) response: Value,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiTool {
    function_declarations: Vec<GeminiFunctionDeclaration>,
}

#[derive(Debug, Serialize)]
pub(crate) struct GeminiFunctionDeclaration {
    pub(crate) name: String,
    pub(crate) description: String,
    pub(crate) parameters: Value,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiGenerationConfig {
    max_output_tokens: u32,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct GeminiResponse {
    #[serde(default)]
    pub(crate) candidates: Vec<GeminiCandidate>,
    #[serde(default)]
    pub(crate) usage_metadata: Option<GeminiUsageMetadata>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct GeminiCandidate {
    #[serde(default)]
    pub(crate) content: Option<GeminiContent>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct GeminiUsageMetadata {
    #[serde(default)]
    pub(crate) prompt_token_count: u32,
    #[serde(default)]
    pub(crate) candidates_token_count: u32,
}

#[derive(Debug, Deserialize)]
struct GeminiErrorResponse {
    error: GeminiError,
}

#[derive(Debug, Deserialize)]
struct GeminiError {
    message: String,
}
