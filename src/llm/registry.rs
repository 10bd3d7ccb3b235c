//! Model registry for managing available LLM providers

use super::{all_models, create_service, LlmService, ModelDef, Provider, TracedProvider};
use std::collections::HashMap;
use std::sync::Arc;

/// Configuration for LLM providers
#[derive(Debug, Clone, Default)]
pub struct LlmConfig {
    pub anthropic_api_key: Option<String>,
    pub openai_api_key: Option<String>,
    pub gemini_api_key: Option<String>,
    /// Gateway URL that fronts every provider
    pub gateway: Option<String>,
    /// Default model ID
    pub default_model: Option<String>,
}

impl LlmConfig {
    pub fn from_env() -> Self {
        Self {
            anthropic_api_key: std::env::var("ANTHROPIC_API_KEY").ok(),
            openai_api_key: std::env::var("OPENAI_API_KEY").ok(),
            gemini_api_key: std::env::var("GEMINI_API_KEY").ok(),
            gateway: std::env::var("LLM_GATEWAY").ok(),
            default_model: std::env::var("DEFAULT_MODEL").ok(),
        }
    }

    fn api_key(&self, provider: Provider) -> Option<&String> {
        match provider {
            Provider::Claude => self.anthropic_api_key.as_ref(),
            Provider::OpenAI => self.openai_api_key.as_ref(),
            Provider::Gemini => self.gemini_api_key.as_ref(),
        }
    }
}

/// Registry of available LLM models
pub struct ModelRegistry {
    services: HashMap<String, Arc<dyn LlmService>>,
    default_model: String,
}

impl ModelRegistry {
    /// Create an empty registry
    #[cfg(test)]
    pub fn new_empty() -> Self {
        Self {
            services: HashMap::new(),
            default_model: "test-model".to_string(),
        }
    }

    pub fn new(config: &LlmConfig) -> Self {
        let mut services: HashMap<String, Arc<dyn LlmService>> = HashMap::new();

        for model_def in all_models() {
            if let Some(service) = Self::try_create_model(model_def, config) {
                services.insert(model_def.id.to_string(), service);
            }
        }

        // Configured default, else the first catalog model that is available
        let default_model = config
            .default_model
            .clone()
            .filter(|id| services.contains_key(id))
            .or_else(|| {
                all_models()
                    .iter()
                    .find(|m| services.contains_key(m.id))
                    .map(|m| m.id.to_string())
            })
            .unwrap_or_else(|| "claude-sonnet-4-20250514".to_string());

        Self {
            services,
            default_model,
        }
    }

    fn try_create_model(model_def: &ModelDef, config: &LlmConfig) -> Option<Arc<dyn LlmService>> {
        // Behind a gateway the gateway authenticates; the key is a placeholder
        let api_key = if config.gateway.is_some() {
            "implicit".to_string()
        } else {
            config.api_key(model_def.provider)?.clone()
        };

        match create_service(
            model_def.provider,
            &api_key,
            model_def.id,
            config.gateway.as_deref(),
        ) {
            Ok(service) => Some(Arc::new(TracedProvider::new(service, model_def.provider))),
            Err(e) => {
                tracing::debug!(model = model_def.id, error = %e, "Model unavailable");
                None
            }
        }
    }

    /// Register a service directly (used by tests and custom wiring)
    #[cfg(test)]
    pub fn insert(&mut self, model_id: &str, service: Arc<dyn LlmService>) {
        self.services.insert(model_id.to_string(), service);
    }

    /// Get a model by ID
    pub fn get(&self, model_id: &str) -> Option<Arc<dyn LlmService>> {
        self.services.get(model_id).cloned()
    }

    /// Get the default model ID
    pub fn default_model_id(&self) -> &str {
        &self.default_model
    }

    /// Check if any models are available
    pub fn has_models(&self) -> bool {
        !self.services.is_empty()
    }

    /// List all available model IDs
    pub fn available_models(&self) -> Vec<String> {
        let mut models: Vec<_> = self.services.keys().cloned().collect();
        models.sort();
        models
    }

    /// Get detailed information about available models
    pub fn available_model_info(&self) -> Vec<crate::api::ModelInfo> {
        all_models()
            .iter()
            .filter(|m| self.services.contains_key(m.id))
            .map(|m| crate::api::ModelInfo {
                id: m.id.to_string(),
                provider: m.provider.id().to_string(),
                provider_label: m.provider.display_name().to_string(),
                label: m.label.to_string(),
            })
            .collect()
    }
}
