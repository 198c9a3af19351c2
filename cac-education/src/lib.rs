pub mod catalog;
pub mod error;
pub mod inference;
pub mod models;
pub mod ollama;
pub mod orchestrator;
pub mod prompt;
pub mod risk;
pub mod storage;
pub mod storage_postgres;

#[cfg(any(test, feature = "test-util"))]
pub mod testing;

// Re-export commonly used types
pub use catalog::ModelDescriptor;
pub use error::{GenerationError, InferenceError, StoreError, StoreResult, ValidationError};
pub use inference::{GenerationOptions, InferenceBackend};
pub use models::{
    ContentType, EducationRecord, GenerationRequest, NewEducationRecord, NewPromptTemplate,
    PatientInfo, PatientProfile, PromptTemplate, Statistics,
};
pub use ollama::{OllamaClient, OllamaSettings};
pub use orchestrator::EducationOrchestrator;
pub use prompt::build_prompt;
pub use risk::{RiskLevel, classify};
pub use storage::{EducationStore, InMemoryEducationStore};
pub use storage_postgres::PostgresEducationStore;
