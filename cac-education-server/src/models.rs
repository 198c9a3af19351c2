use cac_education::{
    GenerationRequest, ModelDescriptor, NewPromptTemplate, PatientInfo, PatientProfile,
    ValidationError,
};
use serde::{Deserialize, Serialize};

const DEFAULT_PAGE_LIMIT: u32 = 100;

#[derive(Debug, Serialize, Deserialize)]
pub struct EducationRequestBody {
    pub patient_info: PatientInfo,
    pub content_type: String,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub language: Option<String>,
}

impl EducationRequestBody {
    pub fn into_generation_request(self) -> Result<GenerationRequest, ValidationError> {
        GenerationRequest::new(self.patient_info, &self.content_type, self.model, self.language)
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct PatientEducationBody {
    #[serde(default)]
    pub patient_id: Option<String>,
    pub content_type: String,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub language: Option<String>,
}

impl PatientEducationBody {
    pub fn into_generation_request(
        self,
        patient: &PatientProfile,
    ) -> Result<GenerationRequest, ValidationError> {
        GenerationRequest::new(
            patient.patient_info(),
            &self.content_type,
            self.model,
            self.language,
        )
    }
}

#[derive(Debug, Deserialize)]
pub struct RecordsQuery {
    #[serde(default)]
    pub skip: u32,
    #[serde(default = "default_limit")]
    pub limit: u32,
}

fn default_limit() -> u32 {
    DEFAULT_PAGE_LIMIT
}

#[derive(Debug, Deserialize)]
pub struct TemplatesQuery {
    pub category: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CreateTemplateBody {
    pub template_name: String,
    pub template_content: String,
    pub category: String,
}

impl CreateTemplateBody {
    pub fn into_new_template(self) -> Result<NewPromptTemplate, ValidationError> {
        NewPromptTemplate::new(self.template_name, self.template_content, &self.category)
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ModelsResponse {
    pub models: Vec<ModelDescriptor>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct TestModelResponse {
    pub model: String,
    pub available: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub test_response: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}
