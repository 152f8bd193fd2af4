//! Unified OpenAI-compatible chat provider.
//!
//! A single struct handles chat completions for every OpenAI-compatible API.
//! Providers are distinguished only by endpoint URL and API key. Failures
//! surface as retryable synthesis errors; a timeout fails the whole call
//! rather than degrading to an unsourced shortcut.

use async_trait::async_trait;
use caremind_core::config::LlmConfig;
use caremind_core::error::{CaremindError, Result};
use caremind_core::traits::Provider;
use caremind_core::types::{ChatResponse, GenerateParams, Message};
use serde_json::{Value, json};

/// Known provider name → (base URL, API key env var).
fn registry_entry(name: &str) -> Option<(&'static str, &'static str)> {
    match name {
        "openai" => Some(("https://api.openai.com/v1", "OPENAI_API_KEY")),
        "groq" => Some(("https://api.groq.com/openai/v1", "GROQ_API_KEY")),
        "deepseek" => Some(("https://api.deepseek.com/v1", "DEEPSEEK_API_KEY")),
        "openrouter" => Some(("https://openrouter.ai/api/v1", "OPENROUTER_API_KEY")),
        "ollama" => Some(("http://localhost:11434/v1", "OLLAMA_API_KEY")),
        "llamacpp" => Some(("http://localhost:8080/v1", "LLAMACPP_API_KEY")),
        _ => None,
    }
}

/// A provider that works with any OpenAI-compatible chat completions API.
pub struct OpenAiCompatibleProvider {
    name: String,
    api_key: String,
    base_url: String,
    client: reqwest::Client,
}

impl OpenAiCompatibleProvider {
    /// Resolution order: config endpoint/key first, then the registry default
    /// and its env var. Unknown providers require an explicit endpoint.
    pub fn new(config: &LlmConfig) -> Result<Self> {
        let registry = registry_entry(&config.provider);

        let base_url = if !config.endpoint.is_empty() {
            config.endpoint.trim_end_matches('/').to_string()
        } else if let Some((url, _)) = registry {
            url.to_string()
        } else {
            return Err(CaremindError::Config(format!(
                "Unknown LLM provider '{}' and no llm.endpoint configured",
                config.provider
            )));
        };

        let api_key = if !config.api_key.is_empty() {
            config.api_key.clone()
        } else if let Some((_, env_key)) = registry {
            std::env::var(env_key).unwrap_or_default()
        } else {
            String::new()
        };

        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| CaremindError::Http(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self {
            name: config.provider.clone(),
            api_key,
            base_url,
            client,
        })
    }

    fn apply_auth(&self, req: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        if self.api_key.is_empty() {
            req
        } else {
            req.header("Authorization", format!("Bearer {}", self.api_key))
        }
    }
}

#[async_trait]
impl Provider for OpenAiCompatibleProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn chat(&self, messages: &[Message], params: &GenerateParams) -> Result<ChatResponse> {
        let body = json!({
            "model": params.model,
            "temperature": params.temperature,
            "max_tokens": params.max_tokens,
            "messages": messages,
        });

        let url = format!("{}/chat/completions", self.base_url);
        let req = self
            .client
            .post(&url)
            .header("Content-Type", "application/json")
            .json(&body);
        let req = self.apply_auth(req);

        let resp = req.send().await.map_err(|e| {
            CaremindError::Synthesis(format!("{} connection failed ({url}): {e}", self.name))
        })?;

        if !resp.status().is_success() {
            let status = resp.status();
            let text = resp.text().await.unwrap_or_default();
            return Err(CaremindError::Synthesis(format!(
                "{} API error {status}: {text}",
                self.name
            )));
        }

        let json: Value = resp
            .json()
            .await
            .map_err(|e| CaremindError::Synthesis(format!("{} malformed response: {e}", self.name)))?;

        let choice = json["choices"]
            .get(0)
            .ok_or_else(|| CaremindError::Synthesis("No choices in response".into()))?;

        let content = choice["message"]["content"]
            .as_str()
            .map(str::to_string)
            .filter(|c| !c.trim().is_empty())
            .ok_or_else(|| CaremindError::Synthesis("Empty completion content".into()))?;

        tracing::debug!("💬 {} completion: {} chars", self.name, content.len());

        Ok(ChatResponse {
            content,
            finish_reason: choice["finish_reason"].as_str().map(str::to_string),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config_for(provider: &str) -> LlmConfig {
        LlmConfig {
            provider: provider.into(),
            api_key: "test-key".into(),
            ..LlmConfig::default()
        }
    }

    #[test]
    fn test_registry_resolution() {
        let provider = OpenAiCompatibleProvider::new(&config_for("openai")).unwrap();
        assert_eq!(provider.base_url, "https://api.openai.com/v1");
        assert_eq!(provider.name(), "openai");

        let provider = OpenAiCompatibleProvider::new(&config_for("ollama")).unwrap();
        assert_eq!(provider.base_url, "http://localhost:11434/v1");
    }

    #[test]
    fn test_unknown_provider_needs_endpoint() {
        assert!(OpenAiCompatibleProvider::new(&config_for("mystery")).is_err());

        let mut config = config_for("mystery");
        config.endpoint = "https://my-server.example/v1/".into();
        let provider = OpenAiCompatibleProvider::new(&config).unwrap();
        // Trailing slash trimmed so path joins stay clean
        assert_eq!(provider.base_url, "https://my-server.example/v1");
    }
}
