//! EducationOrchestrator – runs one generation request end to end: resolve the model, build the
//! prompt, generate with a single fallback to the default model, classify risk, persist.
//!
//! The orchestrator holds no per-request state. It is built once at startup with the
//! inference backend and the store it should use, and cloned into every request handler:
//! ```rust,ignore
//! let orchestrator = EducationOrchestrator::new(backend, store);
//! let record = orchestrator.run(&request).await?;
//! ```
//!
//! Failure policy:
//! * a requested model that is not installed is replaced by the default before generating;
//! * a generation failure on a non-default model is retried exactly once on the default;
//! * a failure on the default model is terminal;
//! * nothing is written to the store unless generation succeeded.

use std::sync::Arc;
use tracing::{info, warn};

use crate::error::GenerationError;
use crate::inference::{GenerationOptions, InferenceBackend};
use crate::models::{EducationRecord, GenerationRequest, NewEducationRecord};
use crate::prompt::build_prompt;
use crate::risk::classify;
use crate::storage::EducationStore;

#[derive(Clone)]
pub struct EducationOrchestrator {
    backend: Arc<dyn InferenceBackend>,
    store: Arc<dyn EducationStore>,
    options: GenerationOptions,
}

impl EducationOrchestrator {
    pub fn new(backend: Arc<dyn InferenceBackend>, store: Arc<dyn EducationStore>) -> Self {
        Self {
            backend,
            store,
            options: GenerationOptions::default(),
        }
    }

    pub fn with_options(mut self, options: GenerationOptions) -> Self {
        self.options = options;
        self
    }

    pub fn default_model(&self) -> &str {
        self.backend.default_model()
    }

    /// Execute one generation request and persist its outcome.
    pub async fn run(
        &self,
        request: &GenerationRequest,
    ) -> Result<EducationRecord, GenerationError> {
        info!(
            patient = %request.patient.patient_name,
            cac_score = request.patient.cac_score,
            content_type = %request.content_type,
            requested_model = ?request.model,
            "Starting education generation"
        );

        // 1. Resolve the model that will actually be asked first
        let model = self.resolve_model(request.model.as_deref()).await;

        // 2. Build prompt
        let prompt = build_prompt(&request.patient, request.content_type, &request.language);

        // 3. Generate, falling back to the default model once
        let (generated_content, model_used) = self.generate_with_fallback(&prompt, model).await?;

        // 4. Classify and persist
        let risk_level = classify(request.patient.cac_score);
        let record = NewEducationRecord {
            patient_name: request.patient.patient_name.clone(),
            patient_age: request.patient.patient_age,
            cac_score: request.patient.cac_score,
            risk_level,
            generated_content,
            prompt_used: prompt,
            model_used,
        };

        let stored = self.store.insert_record(record).await?;
        info!(
            record_id = stored.id,
            risk_level = %stored.risk_level,
            model_used = %stored.model_used,
            "Education record saved"
        );
        Ok(stored)
    }

    /// The requested model when it is installed, otherwise the default.
    pub async fn resolve_model(&self, requested: Option<&str>) -> String {
        let default_model = self.backend.default_model();
        let Some(requested) = requested.map(str::trim).filter(|m| !m.is_empty()) else {
            return default_model.to_string();
        };

        if self.backend.is_model_available(requested).await {
            requested.to_string()
        } else {
            warn!(
                requested = %requested,
                default_model = %default_model,
                "Requested model is not available, using default model"
            );
            default_model.to_string()
        }
    }

    async fn generate_with_fallback(
        &self,
        prompt: &str,
        model: String,
    ) -> Result<(String, String), GenerationError> {
        let first = match self
            .backend
            .generate(prompt, Some(&model), &self.options)
            .await
        {
            Ok(content) => return Ok((content, model)),
            Err(e) => e,
        };

        let default_model = self.backend.default_model().to_string();
        if model == default_model {
            return Err(GenerationError::Inference {
                model,
                source: first,
            });
        }

        warn!(
            model = %model,
            error = %first,
            fallback = %default_model,
            "Generation failed, retrying with default model"
        );

        match self
            .backend
            .generate(prompt, Some(&default_model), &self.options)
            .await
        {
            Ok(content) => {
                info!(model = %default_model, "Fallback generation succeeded");
                Ok((content, default_model))
            }
            Err(source) => Err(GenerationError::FallbackFailed {
                requested: model,
                first,
                fallback: default_model,
                source,
            }),
        }
    }
}
