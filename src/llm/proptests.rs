//! Property-based tests for the provider translation layers
//!
//! These check that translating neutral types to each wire format and
//! normalizing responses back preserve:
//! - content text and tool call identity
//! - the per-provider continuation signal
//! - the "arguments are always an object" rule

#![allow(clippy::redundant_closure_for_method_calls)]

use super::anthropic::{self, AnthropicContentBlock, AnthropicResponse, AnthropicUsage};
use super::gemini::{
    self, GeminiCandidate, GeminiContent, GeminiFunctionCall, GeminiPart, GeminiResponse,
};
use super::openai::{
    self, OpenAIChoice, OpenAIFunctionCall, OpenAIMessage, OpenAIResponse, OpenAIToolCall,
};
use super::types::{ContentBlock, LlmMessage, LlmRequest, MessageRole};
use proptest::prelude::*;

// ============================================================================
// Strategies
// ============================================================================

fn arb_text_block() -> impl Strategy<Value = ContentBlock> {
    "[a-zA-Z0-9 _.!?,]{1,100}".prop_map(|text| ContentBlock::Text { text })
}

/// Object arguments, the shape every backend must hand back
fn arb_json_object() -> impl Strategy<Value = serde_json::Value> {
    proptest::collection::hash_map("[a-z_]{1,10}", "[a-zA-Z0-9 ]{0,30}", 0..5).prop_map(|m| {
        serde_json::Value::Object(
            m.into_iter()
                .map(|(k, v)| (k, serde_json::Value::String(v)))
                .collect(),
        )
    })
}

fn arb_tool_use_block() -> impl Strategy<Value = ContentBlock> {
    ("[a-z0-9_]{5,20}", "[a-z_]{3,20}", arb_json_object())
        .prop_map(|(id, name, input)| ContentBlock::ToolUse { id, name, input })
}

fn arb_tool_result_block() -> impl Strategy<Value = ContentBlock> {
    ("[a-z0-9_]{5,20}", "[a-z_]{3,20}", "[a-zA-Z0-9 _.!?,]{0,100}").prop_map(
        |(tool_use_id, tool_name, content)| ContentBlock::ToolResult {
            tool_use_id,
            tool_name,
            content,
        },
    )
}

fn arb_user_message() -> impl Strategy<Value = LlmMessage> {
    proptest::collection::vec(
        prop_oneof![
            3 => arb_text_block(),
            2 => arb_tool_result_block(),
        ],
        1..6,
    )
    .prop_map(|content| LlmMessage {
        role: MessageRole::User,
        content,
    })
}

fn arb_assistant_message() -> impl Strategy<Value = LlmMessage> {
    proptest::collection::vec(
        prop_oneof![
            3 => arb_text_block(),
            3 => arb_tool_use_block(),
        ],
        1..6,
    )
    .prop_map(|content| LlmMessage {
        role: MessageRole::Assistant,
        content,
    })
}

fn arb_message() -> impl Strategy<Value = LlmMessage> {
    prop_oneof![arb_user_message(), arb_assistant_message()]
}

fn request_of(messages: Vec<LlmMessage>) -> LlmRequest {
    LlmRequest {
        system: vec![],
        messages,
        tools: vec![],
        max_tokens: None,
    }
}

fn make_openai_response(
    content: Option<String>,
    tool_calls: Option<Vec<OpenAIToolCall>>,
    finish_reason: Option<String>,
) -> OpenAIResponse {
    OpenAIResponse {
        choices: vec![OpenAIChoice {
            message: OpenAIMessage {
                role: "assistant".to_string(),
                content,
                tool_calls,
                tool_call_id: None,
            },
            finish_reason,
        }],
        usage: None,
    }
}

fn make_openai_tool_call(id: &str, name: &str, arguments: &str) -> OpenAIToolCall {
    OpenAIToolCall {
        id: id.to_string(),
        r#type: "function".to_string(),
        function: OpenAIFunctionCall {
            name: name.to_string(),
            arguments: arguments.to_string(),
        },
    }
}

fn make_anthropic_response(
    content: Vec<AnthropicContentBlock>,
    stop_reason: Option<String>,
) -> AnthropicResponse {
    AnthropicResponse {
        content,
        stop_reason,
        usage: AnthropicUsage {
            input_tokens: 10,
            output_tokens: 5,
        },
    }
}

fn make_gemini_response(parts: Vec<GeminiPart>) -> GeminiResponse {
    GeminiResponse {
        candidates: vec![GeminiCandidate {
            content: Some(GeminiContent {
                role: Some("model".to_string()),
                parts,
            }),
        }],
        usage_metadata: None,
    }
}

// ============================================================================
// Continuation signal
// ============================================================================

proptest! {
    /// Anthropic continues unless the stop reason is exactly end_turn
    #[test]
    fn prop_anthropic_continue_tracks_stop_reason(
        stop_reason in proptest::option::of(prop_oneof![
            Just("end_turn".to_string()),
            Just("tool_use".to_string()),
            Just("max_tokens".to_string()),
            "[a-z_]{3,12}",
        ])
    ) {
        let expected = stop_reason.as_deref() != Some("end_turn");
        let resp = make_anthropic_response(
            vec![AnthropicContentBlock::Text { text: "hi".to_string() }],
            stop_reason,
        );
        prop_assert_eq!(anthropic::normalize_response(resp).wants_continue, expected);
    }

    /// OpenAI continues unless finish_reason is exactly stop
    #[test]
    fn prop_openai_continue_tracks_finish_reason(
        finish_reason in proptest::option::of(prop_oneof![
            Just("stop".to_string()),
            Just("tool_calls".to_string()),
            Just("length".to_string()),
        ])
    ) {
        let expected = finish_reason.as_deref() != Some("stop");
        let resp = make_openai_response(Some("ok".to_string()), None, finish_reason);
        let normalized = openai::normalize_response(resp).unwrap();
        prop_assert_eq!(normalized.wants_continue, expected);
    }

    /// Gemini always asks to continue; an empty tool list is what ends the loop
    #[test]
    fn prop_gemini_always_continues(text in "[a-zA-Z ]{0,40}") {
        let resp = make_gemini_response(vec![GeminiPart::Text { text }]);
        prop_assert!(gemini::normalize_response(resp).unwrap().wants_continue);
    }
}

// ============================================================================
// Tool call normalization
// ============================================================================

proptest! {
    /// Valid object arguments survive OpenAI normalization unchanged
    #[test]
    fn prop_openai_object_arguments_preserved(
        id in "[a-z0-9]{4,12}",
        name in "[a-z_]{3,20}",
        args in arb_json_object(),
    ) {
        let call = make_openai_tool_call(&id, &name, &args.to_string());
        let resp = make_openai_response(None, Some(vec![call]), Some("tool_calls".to_string()));
        let normalized = openai::normalize_response(resp).unwrap();
        let uses = normalized.tool_uses();
        prop_assert_eq!(uses.len(), 1);
        prop_assert_eq!(uses[0].0, id.as_str());
        prop_assert_eq!(uses[0].1, name.as_str());
        prop_assert_eq!(uses[0].2, &args);
    }

    /// Scalar arguments come back wrapped in an object
    #[test]
    fn prop_openai_scalar_arguments_wrapped(n in -1000i64..1000) {
        let call = make_openai_tool_call("c1", "get_application", &n.to_string());
        let resp = make_openai_response(None, Some(vec![call]), None);
        let normalized = openai::normalize_response(resp).unwrap();
        prop_assert!(normalized.tool_uses()[0].2.is_object());
    }

    /// Malformed argument JSON is an error, never a silent empty object
    #[test]
    fn prop_openai_invalid_arguments_rejected(garbage in "\\{[a-z]{1,10}") {
        let call = make_openai_tool_call("c1", "sync_application", &garbage);
        let resp = make_openai_response(None, Some(vec![call]), None);
        prop_assert!(openai::normalize_response(resp).is_err());
    }

    /// Every Gemini function call gets a distinct synthetic id
    #[test]
    fn prop_gemini_calls_get_unique_ids(names in proptest::collection::vec("[a-z_]{3,12}", 1..6)) {
        let parts = names
            .iter()
            .map(|name| GeminiPart::FunctionCall {
                function_call: GeminiFunctionCall {
                    name: name.clone(),
                    args: serde_json::Value::Null,
                },
            })
            .collect();
        let normalized = gemini::normalize_response(make_gemini_response(parts)).unwrap();
        let uses = normalized.tool_uses();
        prop_assert_eq!(uses.len(), names.len());

        let mut ids: Vec<&str> = uses.iter().map(|(id, _, _)| *id).collect();
        ids.sort_unstable();
        ids.dedup();
        prop_assert_eq!(ids.len(), names.len());
        for (_, _, input) in uses {
            prop_assert!(input.is_object());
        }
    }
}

// ============================================================================
// Request translation
// ============================================================================

proptest! {
    /// Anthropic keeps a one-to-one message mapping with all blocks
    #[test]
    fn prop_anthropic_preserves_block_count(messages in proptest::collection::vec(arb_message(), 1..8)) {
        let translated = anthropic::translate_request("m", &request_of(messages.clone()));
        prop_assert_eq!(translated.messages.len(), messages.len());
        for (wire, neutral) in translated.messages.iter().zip(&messages) {
            prop_assert_eq!(wire.content.len(), neutral.content.len());
        }
    }

    /// OpenAI emits one "tool" message per tool result, correlated by id
    #[test]
    fn prop_openai_tool_results_fan_out(msg in arb_user_message()) {
        let translated = openai::translate_message(&msg);
        prop_assert!(!translated.is_empty());

        let result_ids: Vec<&str> = msg
            .content
            .iter()
            .filter_map(|b| match b {
                ContentBlock::ToolResult { tool_use_id, .. } => Some(tool_use_id.as_str()),
                _ => None,
            })
            .collect();
        let tool_ids: Vec<&str> = translated
            .iter()
            .filter(|m| m.role == "tool")
            .filter_map(|m| m.tool_call_id.as_deref())
            .collect();
        prop_assert_eq!(tool_ids, result_ids);
    }

    /// Gemini maps assistant turns to the "model" role and keeps every part
    #[test]
    fn prop_gemini_roles_and_parts(messages in proptest::collection::vec(arb_message(), 1..8)) {
        let translated = gemini::translate_request(&request_of(messages.clone()));
        prop_assert_eq!(translated.contents.len(), messages.len());
        for (wire, neutral) in translated.contents.iter().zip(&messages) {
            let expected_role = match neutral.role {
                MessageRole::User => "user",
                MessageRole::Assistant => "model",
            };
            prop_assert_eq!(wire.role.as_deref(), Some(expected_role));
            prop_assert_eq!(wire.parts.len(), neutral.content.len());
        }
    }
}
