use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::catalog::ModelDescriptor;
use crate::error::InferenceError;

/// Sampling options forwarded to the inference runtime.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationOptions {
    pub temperature: f32,
    pub top_p: f32,
    pub top_k: u32,
    pub repeat_penalty: f32,
    #[serde(rename = "num_predict")]
    pub max_tokens: u32,
    pub stop: Vec<String>,
}

impl Default for GenerationOptions {
    fn default() -> Self {
        Self {
            temperature: 0.7,
            top_p: 0.9,
            top_k: 40,
            repeat_penalty: 1.1,
            max_tokens: 2000,
            stop: vec!["<|eot_id|>".to_string(), "<|end_of_text|>".to_string()],
        }
    }
}

/// Contract of the external text-generation service.
#[async_trait]
pub trait InferenceBackend: Send + Sync {
    /// Model used when the caller does not name one.
    fn default_model(&self) -> &str;

    /// Generate a completion. `None` selects [`InferenceBackend::default_model`].
    async fn generate(
        &self,
        prompt: &str,
        model: Option<&str>,
        options: &GenerationOptions,
    ) -> Result<String, InferenceError>;

    /// Installed models, or the static catalog when the inventory is unavailable.
    async fn list_models(&self) -> Vec<ModelDescriptor>;

    async fn health_check(&self) -> bool;

    async fn is_model_available(&self, name: &str) -> bool;
}
