use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{error, info, warn};

use crate::catalog::{self, ModelDescriptor};
use crate::error::InferenceError;
use crate::inference::{GenerationOptions, InferenceBackend};

/// Connection settings for an Ollama runtime.
#[derive(Debug, Clone, PartialEq)]
pub struct OllamaSettings {
    pub base_url: String,
    pub default_model: String,
    pub request_timeout: Duration,
    pub connect_timeout: Duration,
    pub inventory_timeout: Duration,
}

impl Default for OllamaSettings {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:11434".to_string(),
            default_model: "llama3.1:8b".to_string(),
            request_timeout: Duration::from_secs(300),
            connect_timeout: Duration::from_secs(30),
            inventory_timeout: Duration::from_secs(10),
        }
    }
}

/// Ollama HTTP client.
#[derive(Clone)]
pub struct OllamaClient {
    base_url: String,
    default_model: String,
    request_timeout: Duration,
    inventory_timeout: Duration,
    client: reqwest::Client,
}

#[derive(Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
    options: &'a GenerationOptions,
}

#[derive(Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    response: String,
}

#[derive(Deserialize)]
struct TagsResponse {
    #[serde(default)]
    models: Vec<TagEntry>,
}

#[derive(Deserialize)]
struct TagEntry {
    #[serde(default)]
    name: String,
}

impl OllamaClient {
    pub fn new(settings: OllamaSettings) -> Result<Self, InferenceError> {
        let client = reqwest::Client::builder()
            .connect_timeout(settings.connect_timeout)
            .build()
            .map_err(|e| InferenceError::Http(e.to_string()))?;

        info!(
            base_url = %settings.base_url,
            default_model = %settings.default_model,
            "Ollama client configured"
        );

        Ok(Self {
            base_url: settings.base_url.trim_end_matches('/').to_string(),
            default_model: settings.default_model,
            request_timeout: settings.request_timeout,
            inventory_timeout: settings.inventory_timeout,
            client,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn map_send_error(&self, e: reqwest::Error, timeout: Duration) -> InferenceError {
        if e.is_timeout() {
            InferenceError::Timeout(timeout.as_secs())
        } else if e.is_connect() {
            InferenceError::Connection(self.base_url.clone())
        } else {
            InferenceError::Http(e.to_string())
        }
    }

    /// Names of every model installed in the runtime.
    async fn installed_models(&self) -> Result<Vec<String>, InferenceError> {
        let url = format!("{}/api/tags", self.base_url);

        let response = self
            .client
            .get(&url)
            .timeout(self.inventory_timeout)
            .send()
            .await
            .map_err(|e| self.map_send_error(e, self.inventory_timeout))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(InferenceError::Service {
                status: status.as_u16(),
                body,
            });
        }

        let tags: TagsResponse = response
            .json()
            .await
            .map_err(|e| InferenceError::MalformedResponse(e.to_string()))?;

        Ok(tags.models.into_iter().map(|m| m.name).collect())
    }
}

#[async_trait]
impl InferenceBackend for OllamaClient {
    fn default_model(&self) -> &str {
        &self.default_model
    }

    async fn generate(
        &self,
        prompt: &str,
        model: Option<&str>,
        options: &GenerationOptions,
    ) -> Result<String, InferenceError> {
        let model = model.unwrap_or(self.default_model.as_str());
        let url = format!("{}/api/generate", self.base_url);
        let body = GenerateRequest {
            model,
            prompt,
            stream: false,
            options,
        };

        info!(model = %model, url = %url, "Sending generate request to Ollama");

        let response = self
            .client
            .post(&url)
            .timeout(self.request_timeout)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                let err = self.map_send_error(e, self.request_timeout);
                error!(model = %model, error = %err, "Ollama request failed");
                err
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            error!(model = %model, status = status.as_u16(), body = %body, "Ollama API error");
            return Err(InferenceError::Service {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: GenerateResponse = response.json().await.map_err(|e| {
            if e.is_timeout() {
                InferenceError::Timeout(self.request_timeout.as_secs())
            } else {
                InferenceError::MalformedResponse(e.to_string())
            }
        })?;

        if parsed.response.trim().is_empty() {
            warn!(model = %model, "Ollama returned an empty response");
            return Err(InferenceError::EmptyResponse);
        }

        info!(
            model = %model,
            chars = parsed.response.chars().count(),
            "Generated content"
        );
        Ok(parsed.response)
    }

    async fn list_models(&self) -> Vec<ModelDescriptor> {
        match self.installed_models().await {
            Ok(installed) => {
                let models = catalog::filter_installed(&installed);
                info!(installed = ?installed, listed = models.len(), "Resolved model list");
                models
            }
            Err(e) => {
                warn!(error = %e, "Cannot read Ollama inventory, returning static catalog");
                catalog::supported_models()
            }
        }
    }

    async fn health_check(&self) -> bool {
        match self.installed_models().await {
            Ok(_) => true,
            Err(e) => {
                error!(error = %e, "Ollama health check failed");
                false
            }
        }
    }

    async fn is_model_available(&self, name: &str) -> bool {
        match self.installed_models().await {
            Ok(installed) => {
                let available = installed.iter().any(|m| m == name);
                info!(model = %name, available, "Checked model availability");
                available
            }
            Err(e) => {
                warn!(model = %name, error = %e, "Model availability check failed");
                false
            }
        }
    }
}
