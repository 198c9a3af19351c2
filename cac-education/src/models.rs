use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::error::ValidationError;
use crate::risk::RiskLevel;

pub const DEFAULT_LANGUAGE: &str = "zh-TW";
const MAX_NAME_CHARS: usize = 100;
const MAX_AGE: i64 = 120;

/// Category of educational material the caller asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentType {
    RiskAssessment,
    Lifestyle,
    Medication,
}

impl ContentType {
    pub const ALL: [ContentType; 3] = [
        ContentType::RiskAssessment,
        ContentType::Lifestyle,
        ContentType::Medication,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ContentType::RiskAssessment => "risk_assessment",
            ContentType::Lifestyle => "lifestyle",
            ContentType::Medication => "medication",
        }
    }
}

impl fmt::Display for ContentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ContentType {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ContentType::ALL
            .into_iter()
            .find(|ct| ct.as_str() == s)
            .ok_or_else(|| ValidationError::UnknownContentType(s.to_string()))
    }
}

/// Patient attributes used to personalise a prompt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatientInfo {
    pub patient_name: String,
    pub patient_age: i64,
    pub cac_score: f64,
    #[serde(default)]
    pub gender: Option<String>,
    #[serde(default)]
    pub medical_history: Option<String>,
    #[serde(default)]
    pub lifestyle_factors: Option<String>,
}

impl PatientInfo {
    pub fn validate(&self) -> Result<(), ValidationError> {
        let name_len = self.patient_name.trim().chars().count();
        if name_len == 0 || self.patient_name.chars().count() > MAX_NAME_CHARS {
            return Err(ValidationError::InvalidName);
        }
        if !(0..=MAX_AGE).contains(&self.patient_age) {
            return Err(ValidationError::AgeOutOfRange(self.patient_age));
        }
        if !self.cac_score.is_finite() || self.cac_score < 0.0 {
            return Err(ValidationError::InvalidScore(self.cac_score));
        }
        Ok(())
    }
}

/// A validated request to generate one piece of education content.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationRequest {
    pub patient: PatientInfo,
    pub content_type: ContentType,
    pub model: Option<String>,
    pub language: String,
}

impl GenerationRequest {
    /// Validates raw caller input. A blank model is treated as no override and a missing
    /// language falls back to [`DEFAULT_LANGUAGE`].
    pub fn new(
        patient: PatientInfo,
        content_type: &str,
        model: Option<String>,
        language: Option<String>,
    ) -> Result<Self, ValidationError> {
        patient.validate()?;
        let content_type = content_type.parse()?;

        let model = model
            .map(|m| m.trim().to_string())
            .filter(|m| !m.is_empty());
        let language = language
            .map(|l| l.trim().to_string())
            .filter(|l| !l.is_empty())
            .unwrap_or_else(|| DEFAULT_LANGUAGE.to_string());

        Ok(Self {
            patient,
            content_type,
            model,
            language,
        })
    }
}

/// Outcome of a successful generation, ready to be written to the store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewEducationRecord {
    pub patient_name: String,
    pub patient_age: i64,
    pub cac_score: f64,
    pub risk_level: RiskLevel,
    pub generated_content: String,
    pub prompt_used: String,
    pub model_used: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EducationRecord {
    pub id: i64,
    pub patient_name: String,
    pub patient_age: i64,
    pub cac_score: f64,
    pub risk_level: RiskLevel,
    pub generated_content: String,
    pub prompt_used: String,
    pub model_used: String,
    pub created_at: DateTime<Utc>,
}

impl EducationRecord {
    pub fn from_new(id: i64, record: NewEducationRecord, created_at: DateTime<Utc>) -> Self {
        Self {
            id,
            patient_name: record.patient_name,
            patient_age: record.patient_age,
            cac_score: record.cac_score,
            risk_level: record.risk_level,
            generated_content: record.generated_content,
            prompt_used: record.prompt_used,
            model_used: record.model_used,
            created_at,
        }
    }
}

/// Stored patient. `patient_data` is carried as an opaque document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatientProfile {
    pub id: String,
    pub name: String,
    pub age: i64,
    pub gender: Option<String>,
    pub cac_score: f64,
    pub medical_history: Option<String>,
    pub lifestyle_factors: Option<String>,
    pub patient_data: serde_json::Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl PatientProfile {
    pub fn patient_info(&self) -> PatientInfo {
        PatientInfo {
            patient_name: self.name.clone(),
            patient_age: self.age,
            cac_score: self.cac_score,
            gender: self.gender.clone(),
            medical_history: self.medical_history.clone(),
            lifestyle_factors: self.lifestyle_factors.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewPromptTemplate {
    pub template_name: String,
    pub template_content: String,
    pub category: ContentType,
}

impl NewPromptTemplate {
    pub fn new(name: String, content: String, category: &str) -> Result<Self, ValidationError> {
        let name_len = name.trim().chars().count();
        if name_len == 0 || name.chars().count() > MAX_NAME_CHARS {
            return Err(ValidationError::InvalidTemplateName);
        }
        if content.trim().is_empty() {
            return Err(ValidationError::EmptyTemplateContent);
        }
        Ok(Self {
            template_name: name,
            template_content: content,
            category: category.parse()?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PromptTemplate {
    pub id: i64,
    pub template_name: String,
    pub template_content: String,
    pub category: ContentType,
    pub created_at: DateTime<Utc>,
}

/// Aggregate counts over the education records and templates.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Statistics {
    pub total_records: i64,
    pub total_templates: i64,
    pub risk_level_distribution: BTreeMap<String, i64>,
    pub model_usage: BTreeMap<String, i64>,
}
