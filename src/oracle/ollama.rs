//! Ollama chat oracle
//!
//! Sends each prompt as a single user message to `/api/chat` with the
//! expected JSON schema as the structured-output `format`.

use async_trait::async_trait;
use serde_json::Value;

use crate::config::OracleConfig;

use super::{Oracle, OracleError};

/// Oracle backed by an Ollama server
pub struct OllamaOracle {
    client: reqwest::Client,
    base_url: String,
    model: String,
    temperature: f32,
}

impl OllamaOracle {
    pub fn new(config: &OracleConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            temperature: config.temperature,
        }
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Names of the models the server has pulled
    pub async fn list_models(&self) -> Result<Vec<String>, OracleError> {
        let url = format!("{}/api/tags", self.base_url);
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| OracleError::Http(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(OracleError::Status { status, body });
        }

        let tags: Value = response
            .json()
            .await
            .map_err(|e| OracleError::MalformedResponse(e.to_string()))?;

        Ok(tags["models"]
            .as_array()
            .map(|models| {
                models
                    .iter()
                    .filter_map(|m| m["model"].as_str().or_else(|| m["name"].as_str()))
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default())
    }
}

/// Whether `available` names `wanted`, treating an untagged name as `:latest`
fn model_matches(available: &str, wanted: &str) -> bool {
    available == wanted || (!wanted.contains(':') && available == format!("{}:latest", wanted))
}

#[async_trait]
impl Oracle for OllamaOracle {
    async fn complete(&self, prompt: &str, schema: &Value) -> Result<String, OracleError> {
        let url = format!("{}/api/chat", self.base_url);

        let request = serde_json::json!({
            "model": self.model,
            "messages": [{ "role": "user", "content": prompt }],
            "format": schema,
            "stream": false,
            "options": { "temperature": self.temperature }
        });

        tracing::trace!(model = %self.model, prompt_len = prompt.len(), "Sending oracle request");

        let response = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| OracleError::Http(format!("Failed to call Ollama: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(OracleError::Status { status, body });
        }

        let result: Value = response
            .json()
            .await
            .map_err(|e| OracleError::MalformedResponse(format!("Failed to parse response: {}", e)))?;

        let content = result["message"]["content"]
            .as_str()
            .ok_or_else(|| OracleError::MalformedResponse("missing message.content".to_string()))?;

        tracing::trace!(response_len = content.len(), "Oracle responded");
        Ok(content.to_string())
    }

    async fn is_available(&self) -> bool {
        match self.list_models().await {
            Ok(models) => models.iter().any(|m| model_matches(m, &self.model)),
            Err(e) => {
                tracing::warn!("Ollama not reachable at {}: {}", self.base_url, e);
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_model_matches_latest_tag() {
        assert!(model_matches("llama3.1:latest", "llama3.1"));
        assert!(model_matches("llama3.1:8b", "llama3.1:8b"));
        assert!(!model_matches("llama3.1:8b", "llama3.1"));
        assert!(!model_matches("mistral:latest", "llama3.1"));
    }

    #[test]
    fn test_base_url_trailing_slash_is_trimmed() {
        let oracle = OllamaOracle::new(&OracleConfig {
            base_url: "http://ollama:11434/".to_string(),
            ..OracleConfig::default()
        });
        assert_eq!(oracle.base_url, "http://ollama:11434");
        assert_eq!(oracle.model(), "llama3.1");
    }
}
