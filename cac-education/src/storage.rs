use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicI64, Ordering};

use crate::error::StoreResult;
use crate::models::{
    EducationRecord, NewEducationRecord, NewPromptTemplate, PatientProfile, PromptTemplate,
    Statistics,
};

/// Persistence gateway for education records, patient profiles and prompt templates.
#[async_trait]
pub trait EducationStore: Send + Sync {
    /// Writes one record atomically and returns it with its assigned id.
    async fn insert_record(&self, record: NewEducationRecord) -> StoreResult<EducationRecord>;
    /// Newest first.
    async fn list_records(&self, skip: u32, limit: u32) -> StoreResult<Vec<EducationRecord>>;
    async fn get_record(&self, id: i64) -> StoreResult<Option<EducationRecord>>;
    /// Returns `false` when no record had that id.
    async fn delete_record(&self, id: i64) -> StoreResult<bool>;

    async fn list_patients(&self) -> StoreResult<Vec<PatientProfile>>;
    async fn get_patient(&self, id: &str) -> StoreResult<Option<PatientProfile>>;
    async fn upsert_patient(&self, patient: PatientProfile) -> StoreResult<()>;

    async fn create_template(&self, template: NewPromptTemplate) -> StoreResult<PromptTemplate>;
    async fn list_templates(&self, category: Option<&str>) -> StoreResult<Vec<PromptTemplate>>;

    async fn statistics(&self) -> StoreResult<Statistics>;

    /// Short name of the backing engine, reported by health checks.
    fn backend_name(&self) -> &'static str;
    /// Round trip to the backing engine.
    async fn ping(&self) -> StoreResult<()>;
}

/// In-memory implementation of EducationStore
pub struct InMemoryEducationStore {
    records: Arc<DashMap<i64, EducationRecord>>,
    patients: Arc<DashMap<String, PatientProfile>>,
    templates: Arc<DashMap<i64, PromptTemplate>>,
    next_record_id: AtomicI64,
    next_template_id: AtomicI64,
}

impl InMemoryEducationStore {
    pub fn new() -> Self {
        Self {
            records: Arc::new(DashMap::new()),
            patients: Arc::new(DashMap::new()),
            templates: Arc::new(DashMap::new()),
            next_record_id: AtomicI64::new(1),
            next_template_id: AtomicI64::new(1),
        }
    }
}

impl Default for InMemoryEducationStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl EducationStore for InMemoryEducationStore {
    async fn insert_record(&self, record: NewEducationRecord) -> StoreResult<EducationRecord> {
        let id = self.next_record_id.fetch_add(1, Ordering::SeqCst);
        let stored = EducationRecord::from_new(id, record, Utc::now());
        self.records.insert(id, stored.clone());
        Ok(stored)
    }

    async fn list_records(&self, skip: u32, limit: u32) -> StoreResult<Vec<EducationRecord>> {
        let mut records: Vec<EducationRecord> =
            self.records.iter().map(|entry| entry.value().clone()).collect();
        records.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(records
            .into_iter()
            .skip(skip as usize)
            .take(limit as usize)
            .collect())
    }

    async fn get_record(&self, id: i64) -> StoreResult<Option<EducationRecord>> {
        Ok(self.records.get(&id).map(|entry| entry.clone()))
    }

    async fn delete_record(&self, id: i64) -> StoreResult<bool> {
        Ok(self.records.remove(&id).is_some())
    }

    async fn list_patients(&self) -> StoreResult<Vec<PatientProfile>> {
        let mut patients: Vec<PatientProfile> =
            self.patients.iter().map(|entry| entry.value().clone()).collect();
        patients.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(patients)
    }

    async fn get_patient(&self, id: &str) -> StoreResult<Option<PatientProfile>> {
        Ok(self.patients.get(id).map(|entry| entry.clone()))
    }

    async fn upsert_patient(&self, patient: PatientProfile) -> StoreResult<()> {
        self.patients.insert(patient.id.clone(), patient);
        Ok(())
    }

    async fn create_template(&self, template: NewPromptTemplate) -> StoreResult<PromptTemplate> {
        let id = self.next_template_id.fetch_add(1, Ordering::SeqCst);
        let stored = PromptTemplate {
            id,
            template_name: template.template_name,
            template_content: template.template_content,
            category: template.category,
            created_at: Utc::now(),
        };
        self.templates.insert(id, stored.clone());
        Ok(stored)
    }

    async fn list_templates(&self, category: Option<&str>) -> StoreResult<Vec<PromptTemplate>> {
        let mut templates: Vec<PromptTemplate> = self
            .templates
            .iter()
            .filter(|entry| category.is_none_or(|c| entry.category.as_str() == c))
            .map(|entry| entry.value().clone())
            .collect();
        templates.sort_by_key(|t| t.id);
        Ok(templates)
    }

    async fn statistics(&self) -> StoreResult<Statistics> {
        let mut stats = Statistics {
            total_records: self.records.len() as i64,
            total_templates: self.templates.len() as i64,
            ..Statistics::default()
        };

        for entry in self.records.iter() {
            *stats
                .risk_level_distribution
                .entry(entry.risk_level.to_string())
                .or_insert(0) += 1;
            *stats
                .model_usage
                .entry(entry.model_used.clone())
                .or_insert(0) += 1;
        }

        Ok(stats)
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }

    async fn ping(&self) -> StoreResult<()> {
        Ok(())
    }
}
