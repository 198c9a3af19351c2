use axum::{
    Router,
    extract::{
        Path, Query, State,
        rejection::{JsonRejection, PathRejection, QueryRejection},
    },
    http::{HeaderValue, StatusCode},
    middleware::from_fn,
    response::Json,
    routing::{get, post},
};
use cac_education::{
    EducationOrchestrator, EducationRecord, EducationStore, GenerationError, GenerationOptions,
    GenerationRequest, InMemoryEducationStore, InferenceBackend, InferenceError, OllamaClient,
    PatientProfile, PostgresEducationStore, PromptTemplate, Statistics,
};
use serde_json::{Value, json};
use std::sync::Arc;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::{error, info, warn};

use crate::{
    config::AppConfig,
    models::{
        CreateTemplateBody, EducationRequestBody, ModelsResponse, PatientEducationBody,
        RecordsQuery, TemplatesQuery, TestModelResponse,
    },
    telemetry::correlation_id_middleware,
};

const TEST_MODEL_PROMPT: &str =
    "Answer briefly in one or two sentences: what is artificial intelligence?";
const TEST_RESPONSE_PREVIEW_CHARS: usize = 200;

type ApiResult<T> = Result<Json<T>, (StatusCode, Json<Value>)>;
type ApiError = (StatusCode, Json<Value>);

fn bad_request_error(message: &str) -> ApiError {
    (StatusCode::BAD_REQUEST, Json(json!({ "error": message })))
}

/// Extractor rejections, reported in the same JSON shape as every other error.
fn rejection_error(details: String) -> ApiError {
    (
        StatusCode::BAD_REQUEST,
        Json(json!({
            "error": "Invalid request",
            "details": details
        })),
    )
}

fn not_found_error(message: &str, id: &str) -> ApiError {
    (
        StatusCode::NOT_FOUND,
        Json(json!({
            "error": message,
            "id": id
        })),
    )
}

fn internal_error(message: &str, details: &str) -> ApiError {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({
            "error": message,
            "details": details
        })),
    )
}

fn unavailable_error(message: &str) -> ApiError {
    (
        StatusCode::SERVICE_UNAVAILABLE,
        Json(json!({ "error": message })),
    )
}

fn store_error(action: &str, e: impl std::fmt::Display) -> ApiError {
    error!("Failed to {}: {}", action, e);
    internal_error(&format!("Failed to {action}"), &e.to_string())
}

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn EducationStore>,
    pub inference: Arc<dyn InferenceBackend>,
    pub orchestrator: EducationOrchestrator,
}

impl AppState {
    pub fn new(inference: Arc<dyn InferenceBackend>, store: Arc<dyn EducationStore>) -> Self {
        let orchestrator = EducationOrchestrator::new(inference.clone(), store.clone());
        Self {
            store,
            inference,
            orchestrator,
        }
    }
}

pub async fn create_app(config: &AppConfig) -> Result<Router, InferenceError> {
    let app_state = create_app_state(config).await?;
    Ok(build_router(app_state, &config.allowed_origins))
}

async fn create_app_state(config: &AppConfig) -> Result<AppState, InferenceError> {
    let inference: Arc<dyn InferenceBackend> = Arc::new(OllamaClient::new(config.ollama.clone())?);
    let store = create_store(&config.database_url).await;
    Ok(AppState::new(inference, store))
}

async fn create_store(database_url: &str) -> Arc<dyn EducationStore> {
    match PostgresEducationStore::connect(database_url).await {
        Ok(store) => {
            info!("Using PostgreSQL education store");
            Arc::new(store)
        }
        Err(e) => {
            error!(
                "Failed to connect to PostgreSQL: {}. Falling back to in-memory storage.",
                e
            );
            Arc::new(InMemoryEducationStore::new())
        }
    }
}

pub fn build_router(app_state: AppState, allowed_origins: &[String]) -> Router {
    let origins: Vec<HeaderValue> = allowed_origins
        .iter()
        .filter_map(|origin| HeaderValue::from_str(origin).ok())
        .collect();
    let cors = CorsLayer::new()
        .allow_origin(origins)
        .allow_methods(Any)
        .allow_headers(Any);

    let api = Router::new()
        .route("/patients", get(list_patients))
        .route("/patients/{patient_id}", get(get_patient))
        .route(
            "/patients/{patient_id}/education",
            post(generate_patient_education),
        )
        .route("/generate-education", post(generate_education))
        .route("/education-records", get(list_records))
        .route(
            "/education-records/{record_id}",
            get(get_record).delete(delete_record),
        )
        .route(
            "/prompt-templates",
            get(list_templates).post(create_template),
        )
        .route("/statistics", get(statistics))
        .route("/models", get(list_models))
        .route("/health-check/ollama", post(ollama_health))
        .route("/test-model/{model_name}", post(test_model));

    Router::new()
        .route("/", get(root))
        .route("/health", get(health_check))
        .nest("/api/v1", api)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .layer(from_fn(correlation_id_middleware))
        .with_state(app_state)
}

async fn root() -> Json<Value> {
    Json(json!({
        "service": "CAC Patient Education Generator",
        "version": "1.0.0",
        "description": "Coronary artery calcium patient education generated by a local Ollama model",
        "endpoints": {
            "POST /api/v1/generate-education": "Generate education content",
            "POST /api/v1/patients/{id}/education": "Generate education content for a stored patient",
            "GET /api/v1/patients": "List patients",
            "GET /api/v1/education-records": "List generated records",
            "GET /api/v1/statistics": "Record statistics",
            "GET /api/v1/models": "Available models",
            "POST /api/v1/health-check/ollama": "Inference runtime health",
            "GET /health": "Health check"
        }
    }))
}

async fn health_check(State(state): State<AppState>) -> Json<Value> {
    let database_ok = match state.store.ping().await {
        Ok(()) => true,
        Err(e) => {
            warn!(storage = state.store.backend_name(), "Store health check failed: {}", e);
            false
        }
    };

    Json(json!({
        "status": if database_ok { "healthy" } else { "degraded" },
        "service": "CAC Patient Education Generator",
        "version": "1.0.0",
        "database": if database_ok { "connected" } else { "disconnected" },
        "storage": state.store.backend_name(),
        "timestamp": chrono::Utc::now().to_rfc3339()
    }))
}

async fn list_patients(State(state): State<AppState>) -> ApiResult<Vec<PatientProfile>> {
    state
        .store
        .list_patients()
        .await
        .map(Json)
        .map_err(|e| store_error("load patients", e))
}

async fn get_patient(
    State(state): State<AppState>,
    Path(patient_id): Path<String>,
) -> ApiResult<PatientProfile> {
    load_patient(&state, &patient_id).await.map(Json)
}

async fn load_patient(state: &AppState, patient_id: &str) -> Result<PatientProfile, ApiError> {
    match state.store.get_patient(patient_id).await {
        Ok(Some(patient)) => Ok(patient),
        Ok(None) => Err(not_found_error("Patient not found", patient_id)),
        Err(e) => Err(store_error("load patient", e)),
    }
}

async fn generate_patient_education(
    State(state): State<AppState>,
    Path(patient_id): Path<String>,
    payload: Result<Json<PatientEducationBody>, JsonRejection>,
) -> ApiResult<EducationRecord> {
    let Json(body) = payload.map_err(|e| rejection_error(e.body_text()))?;
    info!("Generating education for stored patient: {}", patient_id);

    if let Some(body_id) = body.patient_id.as_deref() {
        if body_id != patient_id {
            return Err(bad_request_error(
                "patient_id in body does not match the patient in the path",
            ));
        }
    }

    let patient = load_patient(&state, &patient_id).await?;
    let request = body
        .into_generation_request(&patient)
        .map_err(|e| bad_request_error(&e.to_string()))?;

    run_generation(&state, request).await
}

async fn generate_education(
    State(state): State<AppState>,
    payload: Result<Json<EducationRequestBody>, JsonRejection>,
) -> ApiResult<EducationRecord> {
    let Json(body) = payload.map_err(|e| rejection_error(e.body_text()))?;
    let request = body
        .into_generation_request()
        .map_err(|e| bad_request_error(&e.to_string()))?;

    run_generation(&state, request).await
}

async fn run_generation(
    state: &AppState,
    request: GenerationRequest,
) -> ApiResult<EducationRecord> {
    match state.orchestrator.run(&request).await {
        Ok(record) => Ok(Json(record)),
        Err(GenerationError::Storage(e)) => Err(store_error("save education record", e)),
        Err(e) => {
            error!("Education generation failed: {}", e);
            Err(internal_error("Content generation failed", &e.to_string()))
        }
    }
}

async fn list_records(
    State(state): State<AppState>,
    query: Result<Query<RecordsQuery>, QueryRejection>,
) -> ApiResult<Vec<EducationRecord>> {
    let Query(query) = query.map_err(|e| rejection_error(e.body_text()))?;
    state
        .store
        .list_records(query.skip, query.limit)
        .await
        .map(Json)
        .map_err(|e| store_error("load education records", e))
}

async fn get_record(
    State(state): State<AppState>,
    record_id: Result<Path<i64>, PathRejection>,
) -> ApiResult<EducationRecord> {
    let Path(record_id) = record_id.map_err(|e| rejection_error(e.body_text()))?;
    match state.store.get_record(record_id).await {
        Ok(Some(record)) => Ok(Json(record)),
        Ok(None) => Err(not_found_error("Record not found", &record_id.to_string())),
        Err(e) => Err(store_error("load education record", e)),
    }
}

async fn delete_record(
    State(state): State<AppState>,
    record_id: Result<Path<i64>, PathRejection>,
) -> ApiResult<Value> {
    let Path(record_id) = record_id.map_err(|e| rejection_error(e.body_text()))?;
    match state.store.delete_record(record_id).await {
        Ok(true) => {
            info!("Deleted education record {}", record_id);
            Ok(Json(json!({
                "message": format!("Record {} deleted", record_id)
            })))
        }
        Ok(false) => Err(not_found_error("Record not found", &record_id.to_string())),
        Err(e) => Err(store_error("delete education record", e)),
    }
}

async fn create_template(
    State(state): State<AppState>,
    payload: Result<Json<CreateTemplateBody>, JsonRejection>,
) -> ApiResult<PromptTemplate> {
    let Json(body) = payload.map_err(|e| rejection_error(e.body_text()))?;
    let template = body
        .into_new_template()
        .map_err(|e| bad_request_error(&e.to_string()))?;

    state
        .store
        .create_template(template)
        .await
        .map(Json)
        .map_err(|e| store_error("create prompt template", e))
}

async fn list_templates(
    State(state): State<AppState>,
    query: Result<Query<TemplatesQuery>, QueryRejection>,
) -> ApiResult<Vec<PromptTemplate>> {
    let Query(query) = query.map_err(|e| rejection_error(e.body_text()))?;
    let category = query.category.as_deref().filter(|c| !c.is_empty());
    state
        .store
        .list_templates(category)
        .await
        .map(Json)
        .map_err(|e| store_error("load prompt templates", e))
}

async fn statistics(State(state): State<AppState>) -> ApiResult<Statistics> {
    state
        .store
        .statistics()
        .await
        .map(Json)
        .map_err(|e| store_error("compute statistics", e))
}

async fn list_models(State(state): State<AppState>) -> Json<ModelsResponse> {
    let models = state.inference.list_models().await;
    info!("Listing {} models", models.len());
    Json(ModelsResponse { models })
}

async fn ollama_health(State(state): State<AppState>) -> ApiResult<Value> {
    if state.inference.health_check().await {
        Ok(Json(json!({
            "status": "healthy",
            "message": "Ollama service is running"
        })))
    } else {
        Err(unavailable_error("Ollama service is unreachable"))
    }
}

async fn test_model(
    State(state): State<AppState>,
    Path(model_name): Path<String>,
) -> Json<TestModelResponse> {
    info!("Testing model: {}", model_name);

    if !state.inference.is_model_available(&model_name).await {
        return Json(TestModelResponse {
            message: format!("Model {} is not available or not installed", model_name),
            model: model_name,
            available: false,
            test_response: None,
            error: None,
        });
    }

    match state
        .inference
        .generate(
            TEST_MODEL_PROMPT,
            Some(&model_name),
            &GenerationOptions::default(),
        )
        .await
    {
        Ok(response) => Json(TestModelResponse {
            message: format!("Model {} test succeeded", model_name),
            model: model_name,
            available: true,
            test_response: Some(preview(&response)),
            error: None,
        }),
        Err(e) => {
            warn!("Model test failed for {}: {}", model_name, e);
            Json(TestModelResponse {
                message: format!("Model {} test failed", model_name),
                model: model_name,
                available: false,
                test_response: None,
                error: Some(e.to_string()),
            })
        }
    }
}

fn preview(text: &str) -> String {
    if text.chars().count() > TEST_RESPONSE_PREVIEW_CHARS {
        let head: String = text.chars().take(TEST_RESPONSE_PREVIEW_CHARS).collect();
        format!("{head}...")
    } else {
        text.to_string()
    }
}
