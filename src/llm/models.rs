//! Provider identifiers, the model catalog, and the provider factory

use super::{AnthropicService, GeminiService, LlmError, LlmService, OpenAIService};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

/// LLM provider enumeration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Provider {
    Claude,
    OpenAI,
    Gemini,
}

impl Provider {
    /// Identifier used by callers to select a provider
    pub fn id(self) -> &'static str {
        match self {
            Provider::Claude => "claude",
            Provider::OpenAI => "openai",
            Provider::Gemini => "gemini",
        }
    }

    /// Get the display name for this provider
    pub fn display_name(self) -> &'static str {
        match self {
            Provider::Claude => "Claude (Anthropic)",
            Provider::OpenAI => "OpenAI",
            Provider::Gemini => "Gemini (Google)",
        }
    }

    /// Get the environment variable name for this provider's API key
    pub fn api_key_env_var(self) -> &'static str {
        match self {
            Provider::Claude => "ANTHROPIC_API_KEY",
            Provider::OpenAI => "OPENAI_API_KEY",
            Provider::Gemini => "GEMINI_API_KEY",
        }
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

impl FromStr for Provider {
    type Err = LlmError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "claude" | "anthropic" => Ok(Provider::Claude),
            "openai" => Ok(Provider::OpenAI),
            "gemini" | "google" => Ok(Provider::Gemini),
            other => Err(LlmError::invalid_request(format!(
                "Unknown provider type: {other}"
            ))),
        }
    }
}

/// Model definition with metadata
#[derive(Debug, Clone)]
pub struct ModelDef {
    /// Model ID as sent to the provider
    pub id: &'static str,
    pub provider: Provider,
    /// Human-readable label
    pub label: &'static str,
}

/// Get all known model definitions
pub fn all_models() -> &'static [ModelDef] {
    &[
        ModelDef {
            id: "claude-sonnet-4-20250514",
            provider: Provider::Claude,
            label: "Claude Sonnet 4",
        },
        ModelDef {
            id: "claude-haiku-4-5-20251001",
            provider: Provider::Claude,
            label: "Claude Haiku 4.5",
        },
        ModelDef {
            id: "claude-opus-4-20250514",
            provider: Provider::Claude,
            label: "Claude Opus 4",
        },
        ModelDef {
            id: "gpt-4o",
            provider: Provider::OpenAI,
            label: "GPT-4o",
        },
        ModelDef {
            id: "gpt-4o-mini",
            provider: Provider::OpenAI,
            label: "GPT-4o Mini",
        },
        ModelDef {
            id: "gpt-4.1",
            provider: Provider::OpenAI,
            label: "GPT-4.1",
        },
        ModelDef {
            id: "gpt-4.1-mini",
            provider: Provider::OpenAI,
            label: "GPT-4.1 Mini",
        },
        ModelDef {
            id: "gemini-2.5-pro",
            provider: Provider::Gemini,
            label: "Gemini 2.5 Pro",
        },
        ModelDef {
            id: "gemini-2.5-flash",
            provider: Provider::Gemini,
            label: "Gemini 2.5 Flash",
        },
        ModelDef {
            id: "gemini-2.0-flash",
            provider: Provider::Gemini,
            label: "Gemini 2.0 Flash",
        },
    ]
}

/// Build the service for a provider. The only place that knows which
/// translator backs which provider identifier.
pub fn create_service(
    provider: Provider,
    api_key: &str,
    model: &str,
    gateway: Option<&str>,
) -> Result<Arc<dyn LlmService>, LlmError> {
    if api_key.is_empty() {
        return Err(LlmError::auth(format!(
            "{model} requires {} or a gateway",
            provider.api_key_env_var()
        )));
    }
    let api_key = api_key.to_string();
    Ok(match provider {
        Provider::Claude => Arc::new(AnthropicService::new(api_key, model, gateway)?),
        Provider::OpenAI => Arc::new(OpenAIService::new(api_key, model, gateway)?),
        Provider::Gemini => Arc::new(GeminiService::new(api_key, model, gateway)?),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_ids_round_trip() {
        for provider in [Provider::Claude, Provider::OpenAI, Provider::Gemini] {
            assert_eq!(provider.id().parse::<Provider>().unwrap(), provider);
        }
        assert!("bedrock".parse::<Provider>().is_err());
    }

    #[test]
    fn test_every_provider_has_models() {
        for provider in [Provider::Claude, Provider::OpenAI, Provider::Gemini] {
            assert!(all_models().iter().any(|m| m.provider == provider));
        }
    }

    #[test]
    fn test_factory_selects_by_provider() {
        let svc = create_service(Provider::Gemini, "key", "gemini-2.5-flash", None).unwrap();
        assert_eq!(svc.model_id(), "gemini-2.5-flash");
        assert!(create_service(Provider::Claude, "", "claude-opus-4-20250514", None).is_err());
    }
}
