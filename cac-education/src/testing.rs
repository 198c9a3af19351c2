//! Scripted inference backend and storage doubles for tests.

use async_trait::async_trait;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::catalog::{self, ModelDescriptor};
use crate::error::{InferenceError, StoreError, StoreResult};
use crate::inference::{GenerationOptions, InferenceBackend};
use crate::models::{
    EducationRecord, NewEducationRecord, NewPromptTemplate, PatientProfile, PromptTemplate,
    Statistics,
};
use crate::storage::{EducationStore, InMemoryEducationStore};

/// Inference backend with a fixed inventory and a configurable set of failing models.
/// Records every model it was asked to generate with.
pub struct ScriptedBackend {
    default_model: String,
    installed: Vec<String>,
    failing: Vec<String>,
    response: String,
    reachable: bool,
    generate_calls: Mutex<Vec<String>>,
    availability_checks: AtomicUsize,
}

impl ScriptedBackend {
    /// Only `default_model` is installed and every generation succeeds.
    pub fn new(default_model: &str) -> Self {
        Self {
            default_model: default_model.to_string(),
            installed: vec![default_model.to_string()],
            failing: Vec::new(),
            response: "Generated education content".to_string(),
            reachable: true,
            generate_calls: Mutex::new(Vec::new()),
            availability_checks: AtomicUsize::new(0),
        }
    }

    pub fn with_installed(mut self, models: &[&str]) -> Self {
        self.installed = models.iter().map(|m| m.to_string()).collect();
        self
    }

    pub fn failing_on(mut self, model: &str) -> Self {
        self.failing.push(model.to_string());
        self
    }

    pub fn with_response(mut self, response: &str) -> Self {
        self.response = response.to_string();
        self
    }

    /// Behave like a runtime that cannot be reached.
    pub fn unreachable(mut self) -> Self {
        self.reachable = false;
        self
    }

    pub fn generate_calls(&self) -> Vec<String> {
        self.generate_calls
            .lock()
            .map(|calls| calls.clone())
            .unwrap_or_default()
    }

    pub fn availability_checks(&self) -> usize {
        self.availability_checks.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl InferenceBackend for ScriptedBackend {
    fn default_model(&self) -> &str {
        &self.default_model
    }

    async fn generate(
        &self,
        _prompt: &str,
        model: Option<&str>,
        _options: &GenerationOptions,
    ) -> Result<String, InferenceError> {
        let model = model.unwrap_or(self.default_model.as_str()).to_string();
        if let Ok(mut calls) = self.generate_calls.lock() {
            calls.push(model.clone());
        }

        if !self.reachable {
            return Err(InferenceError::Connection("scripted".to_string()));
        }
        if self.failing.contains(&model) {
            return Err(InferenceError::Service {
                status: 500,
                body: format!("model '{model}' crashed"),
            });
        }
        Ok(self.response.clone())
    }

    async fn list_models(&self) -> Vec<ModelDescriptor> {
        if self.reachable {
            catalog::filter_installed(&self.installed)
        } else {
            catalog::supported_models()
        }
    }

    async fn health_check(&self) -> bool {
        self.reachable
    }

    async fn is_model_available(&self, name: &str) -> bool {
        self.availability_checks.fetch_add(1, Ordering::SeqCst);
        self.reachable && self.installed.iter().any(|m| m == name)
    }
}

/// Store whose writes and health probe fail as if the database connection was lost.
/// Reads are served from an in-memory store so callers can confirm nothing was written.
#[derive(Default)]
pub struct FailingStore {
    inner: InMemoryEducationStore,
    insert_attempts: AtomicUsize,
}

impl FailingStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_attempts(&self) -> usize {
        self.insert_attempts.load(Ordering::SeqCst)
    }

    fn lost_connection() -> StoreError {
        StoreError::Database(sqlx::Error::PoolTimedOut)
    }
}

#[async_trait]
impl EducationStore for FailingStore {
    async fn insert_record(&self, _record: NewEducationRecord) -> StoreResult<EducationRecord> {
        self.insert_attempts.fetch_add(1, Ordering::SeqCst);
        Err(Self::lost_connection())
    }

    async fn list_records(&self, skip: u32, limit: u32) -> StoreResult<Vec<EducationRecord>> {
        self.inner.list_records(skip, limit).await
    }

    async fn get_record(&self, id: i64) -> StoreResult<Option<EducationRecord>> {
        self.inner.get_record(id).await
    }

    async fn delete_record(&self, _id: i64) -> StoreResult<bool> {
        Err(Self::lost_connection())
    }

    async fn list_patients(&self) -> StoreResult<Vec<PatientProfile>> {
        self.inner.list_patients().await
    }

    async fn get_patient(&self, id: &str) -> StoreResult<Option<PatientProfile>> {
        self.inner.get_patient(id).await
    }

    async fn upsert_patient(&self, _patient: PatientProfile) -> StoreResult<()> {
        Err(Self::lost_connection())
    }

    async fn create_template(&self, _template: NewPromptTemplate) -> StoreResult<PromptTemplate> {
        Err(Self::lost_connection())
    }

    async fn list_templates(&self, category: Option<&str>) -> StoreResult<Vec<PromptTemplate>> {
        self.inner.list_templates(category).await
    }

    async fn statistics(&self) -> StoreResult<Statistics> {
        self.inner.statistics().await
    }

    fn backend_name(&self) -> &'static str {
        "postgresql"
    }

    async fn ping(&self) -> StoreResult<()> {
        Err(Self::lost_connection())
    }
}
