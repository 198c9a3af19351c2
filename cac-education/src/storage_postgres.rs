use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgPoolOptions;
use sqlx::types::Json;
use sqlx::{FromRow, PgPool};
use tracing::{error, info};

use crate::error::{StoreError, StoreResult};
use crate::models::{
    ContentType, EducationRecord, NewEducationRecord, NewPromptTemplate, PatientProfile,
    PromptTemplate, Statistics,
};
use crate::risk::RiskLevel;
use crate::storage::EducationStore;

const SCHEMA: &[&str] = &[
    r#"CREATE TABLE IF NOT EXISTS health_education_records (
        id BIGSERIAL PRIMARY KEY,
        patient_name VARCHAR(100) NOT NULL,
        patient_age INTEGER NOT NULL,
        cac_score DOUBLE PRECISION NOT NULL,
        risk_level VARCHAR(20) NOT NULL,
        generated_content TEXT NOT NULL,
        prompt_used TEXT NOT NULL,
        model_used VARCHAR(100) NOT NULL,
        created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
    )"#,
    r#"CREATE TABLE IF NOT EXISTS patients (
        id VARCHAR(10) PRIMARY KEY,
        name VARCHAR(100) NOT NULL,
        age INTEGER NOT NULL,
        gender VARCHAR(10),
        cac_score DOUBLE PRECISION NOT NULL,
        medical_history TEXT,
        lifestyle_factors TEXT,
        patient_data JSONB NOT NULL DEFAULT '{}'::jsonb,
        created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
        updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
    )"#,
    r#"CREATE TABLE IF NOT EXISTS prompt_templates (
        id BIGSERIAL PRIMARY KEY,
        template_name VARCHAR(100) NOT NULL,
        template_content TEXT NOT NULL,
        category VARCHAR(50) NOT NULL,
        created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
    )"#,
];

const RECORD_COLUMNS: &str = "id, patient_name, patient_age, cac_score, risk_level, \
     generated_content, prompt_used, model_used, created_at";
const PATIENT_COLUMNS: &str = "id, name, age, gender, cac_score, medical_history, \
     lifestyle_factors, patient_data, created_at, updated_at";
const TEMPLATE_COLUMNS: &str = "id, template_name, template_content, category, created_at";

#[derive(FromRow)]
struct RecordRow {
    id: i64,
    patient_name: String,
    patient_age: i32,
    cac_score: f64,
    risk_level: String,
    generated_content: String,
    prompt_used: String,
    model_used: String,
    created_at: DateTime<Utc>,
}

impl TryFrom<RecordRow> for EducationRecord {
    type Error = StoreError;

    fn try_from(row: RecordRow) -> Result<Self, Self::Error> {
        let risk_level: RiskLevel = row.risk_level.parse().map_err(StoreError::CorruptRow)?;
        Ok(EducationRecord {
            id: row.id,
            patient_name: row.patient_name,
            patient_age: i64::from(row.patient_age),
            cac_score: row.cac_score,
            risk_level,
            generated_content: row.generated_content,
            prompt_used: row.prompt_used,
            model_used: row.model_used,
            created_at: row.created_at,
        })
    }
}

#[derive(FromRow)]
struct PatientRow {
    id: String,
    name: String,
    age: i32,
    gender: Option<String>,
    cac_score: f64,
    medical_history: Option<String>,
    lifestyle_factors: Option<String>,
    patient_data: Json<serde_json::Value>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<PatientRow> for PatientProfile {
    fn from(row: PatientRow) -> Self {
        PatientProfile {
            id: row.id,
            name: row.name,
            age: i64::from(row.age),
            gender: row.gender,
            cac_score: row.cac_score,
            medical_history: row.medical_history,
            lifestyle_factors: row.lifestyle_factors,
            patient_data: row.patient_data.0,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(FromRow)]
struct TemplateRow {
    id: i64,
    template_name: String,
    template_content: String,
    category: String,
    created_at: DateTime<Utc>,
}

impl TryFrom<TemplateRow> for PromptTemplate {
    type Error = StoreError;

    fn try_from(row: TemplateRow) -> Result<Self, Self::Error> {
        let category: ContentType = row
            .category
            .parse()
            .map_err(|e: crate::error::ValidationError| StoreError::CorruptRow(e.to_string()))?;
        Ok(PromptTemplate {
            id: row.id,
            template_name: row.template_name,
            template_content: row.template_content,
            category,
            created_at: row.created_at,
        })
    }
}

fn to_i32(value: i64, field: &str) -> StoreResult<i32> {
    i32::try_from(value)
        .map_err(|_| StoreError::CorruptRow(format!("{field} out of range: {value}")))
}

/// PostgreSQL-backed EducationStore.
pub struct PostgresEducationStore {
    pool: PgPool,
}

impl PostgresEducationStore {
    /// Connects and creates the tables if they do not exist yet.
    pub async fn connect(database_url: &str) -> StoreResult<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(5)
            .connect(database_url)
            .await?;

        let store = Self { pool };
        store.init_schema().await?;
        info!("PostgreSQL education store ready");
        Ok(store)
    }

    pub async fn init_schema(&self) -> StoreResult<()> {
        for statement in SCHEMA {
            sqlx::query(*statement).execute(&self.pool).await?;
        }
        Ok(())
    }

    async fn count(&self, table: &str) -> StoreResult<i64> {
        let sql = format!("SELECT COUNT(*) FROM {table}");
        let (count,): (i64,) = sqlx::query_as(&sql).fetch_one(&self.pool).await?;
        Ok(count)
    }

    async fn grouped_counts(&self, column: &str) -> StoreResult<Vec<(String, i64)>> {
        let sql = format!(
            "SELECT {column}, COUNT(*) FROM health_education_records GROUP BY {column}"
        );
        Ok(sqlx::query_as(&sql).fetch_all(&self.pool).await?)
    }
}

#[async_trait]
impl EducationStore for PostgresEducationStore {
    async fn insert_record(&self, record: NewEducationRecord) -> StoreResult<EducationRecord> {
        let mut tx = self.pool.begin().await?;

        let sql = format!(
            "INSERT INTO health_education_records \
             (patient_name, patient_age, cac_score, risk_level, generated_content, prompt_used, model_used) \
             VALUES ($1, $2, $3, $4, $5, $6, $7) RETURNING {RECORD_COLUMNS}"
        );
        let inserted = sqlx::query_as::<_, RecordRow>(&sql)
            .bind(&record.patient_name)
            .bind(to_i32(record.patient_age, "patient_age")?)
            .bind(record.cac_score)
            .bind(record.risk_level.as_str())
            .bind(&record.generated_content)
            .bind(&record.prompt_used)
            .bind(&record.model_used)
            .fetch_one(&mut *tx)
            .await;

        let row = match inserted {
            Ok(row) => row,
            Err(e) => {
                // Dropping the transaction rolls it back.
                error!(error = %e, "Insert of education record failed, rolled back");
                return Err(e.into());
            }
        };

        tx.commit().await?;
        row.try_into()
    }

    async fn list_records(&self, skip: u32, limit: u32) -> StoreResult<Vec<EducationRecord>> {
        let sql = format!(
            "SELECT {RECORD_COLUMNS} FROM health_education_records \
             ORDER BY created_at DESC, id DESC OFFSET $1 LIMIT $2"
        );
        let rows = sqlx::query_as::<_, RecordRow>(&sql)
            .bind(i64::from(skip))
            .bind(i64::from(limit))
            .fetch_all(&self.pool)
            .await?;
        rows.into_iter().map(EducationRecord::try_from).collect()
    }

    async fn get_record(&self, id: i64) -> StoreResult<Option<EducationRecord>> {
        let sql = format!("SELECT {RECORD_COLUMNS} FROM health_education_records WHERE id = $1");
        let row = sqlx::query_as::<_, RecordRow>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.map(EducationRecord::try_from).transpose()
    }

    async fn delete_record(&self, id: i64) -> StoreResult<bool> {
        let result = sqlx::query("DELETE FROM health_education_records WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn list_patients(&self) -> StoreResult<Vec<PatientProfile>> {
        let sql = format!("SELECT {PATIENT_COLUMNS} FROM patients ORDER BY id");
        let rows = sqlx::query_as::<_, PatientRow>(&sql)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.into_iter().map(PatientProfile::from).collect())
    }

    async fn get_patient(&self, id: &str) -> StoreResult<Option<PatientProfile>> {
        let sql = format!("SELECT {PATIENT_COLUMNS} FROM patients WHERE id = $1");
        let row = sqlx::query_as::<_, PatientRow>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(PatientProfile::from))
    }

    async fn upsert_patient(&self, patient: PatientProfile) -> StoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO patients
                (id, name, age, gender, cac_score, medical_history, lifestyle_factors, patient_data, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            ON CONFLICT (id) DO UPDATE SET
                name = EXCLUDED.name,
                age = EXCLUDED.age,
                gender = EXCLUDED.gender,
                cac_score = EXCLUDED.cac_score,
                medical_history = EXCLUDED.medical_history,
                lifestyle_factors = EXCLUDED.lifestyle_factors,
                patient_data = EXCLUDED.patient_data,
                updated_at = EXCLUDED.updated_at
            "#,
        )
        .bind(&patient.id)
        .bind(&patient.name)
        .bind(to_i32(patient.age, "age")?)
        .bind(&patient.gender)
        .bind(patient.cac_score)
        .bind(&patient.medical_history)
        .bind(&patient.lifestyle_factors)
        .bind(Json(&patient.patient_data))
        .bind(patient.created_at)
        .bind(patient.updated_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn create_template(&self, template: NewPromptTemplate) -> StoreResult<PromptTemplate> {
        let sql = format!(
            "INSERT INTO prompt_templates (template_name, template_content, category) \
             VALUES ($1, $2, $3) RETURNING {TEMPLATE_COLUMNS}"
        );
        let row = sqlx::query_as::<_, TemplateRow>(&sql)
            .bind(&template.template_name)
            .bind(&template.template_content)
            .bind(template.category.as_str())
            .fetch_one(&self.pool)
            .await?;
        row.try_into()
    }

    async fn list_templates(&self, category: Option<&str>) -> StoreResult<Vec<PromptTemplate>> {
        let rows = match category {
            Some(category) => {
                let sql = format!(
                    "SELECT {TEMPLATE_COLUMNS} FROM prompt_templates WHERE category = $1 ORDER BY id"
                );
                sqlx::query_as::<_, TemplateRow>(&sql)
                    .bind(category)
                    .fetch_all(&self.pool)
                    .await?
            }
            None => {
                let sql = format!("SELECT {TEMPLATE_COLUMNS} FROM prompt_templates ORDER BY id");
                sqlx::query_as::<_, TemplateRow>(&sql)
                    .fetch_all(&self.pool)
                    .await?
            }
        };
        rows.into_iter().map(PromptTemplate::try_from).collect()
    }

    async fn statistics(&self) -> StoreResult<Statistics> {
        Ok(Statistics {
            total_records: self.count("health_education_records").await?,
            total_templates: self.count("prompt_templates").await?,
            risk_level_distribution: self.grouped_counts("risk_level").await?.into_iter().collect(),
            model_usage: self.grouped_counts("model_used").await?.into_iter().collect(),
        })
    }

    fn backend_name(&self) -> &'static str {
        "postgresql"
    }

    async fn ping(&self) -> StoreResult<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}
