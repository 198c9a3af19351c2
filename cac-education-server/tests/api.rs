use axum::{
    Router,
    body::{Body, to_bytes},
    http::{Request, StatusCode, header},
};
use cac_education::{
    EducationStore, InMemoryEducationStore, PatientProfile,
    testing::{FailingStore, ScriptedBackend},
};
use cac_education_server::{AppState, build_router, telemetry::CORRELATION_ID_HEADER};
use chrono::Utc;
use serde_json::{Value, json};
use std::sync::Arc;
use tower::ServiceExt;

const DEFAULT_MODEL: &str = "llama3.1:8b";

struct Harness {
    router: Router,
    backend: Arc<ScriptedBackend>,
    store: Arc<InMemoryEducationStore>,
}

fn router_over(backend: Arc<ScriptedBackend>, store: Arc<dyn EducationStore>) -> Router {
    let state = AppState::new(backend, store);
    build_router(state, &["http://localhost:3000".to_string()])
}

fn harness(backend: ScriptedBackend) -> Harness {
    let backend = Arc::new(backend);
    let store = Arc::new(InMemoryEducationStore::new());
    Harness {
        router: router_over(backend.clone(), store.clone()),
        backend,
        store,
    }
}

async fn send(
    router: &Router,
    method: &str,
    uri: &str,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let builder = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, value)
}

fn education_body(score: f64, content_type: &str, model: Option<&str>) -> Value {
    let mut body = json!({
        "patient_info": {
            "patient_name": "Chen Wei",
            "patient_age": 62,
            "cac_score": score,
            "gender": "male",
            "medical_history": "Hypertension"
        },
        "content_type": content_type
    });
    if let Some(model) = model {
        body["model"] = json!(model);
    }
    body
}

fn stored_patient(id: &str, score: f64) -> PatientProfile {
    PatientProfile {
        id: id.to_string(),
        name: "Lin Hui".to_string(),
        age: 58,
        gender: Some("female".to_string()),
        cac_score: score,
        medical_history: Some("Type 2 diabetes".to_string()),
        lifestyle_factors: Some("Former smoker".to_string()),
        patient_data: json!({ "ldl": 145 }),
        created_at: Utc::now(),
        updated_at: Utc::now(),
    }
}

#[tokio::test]
async fn generates_low_risk_record_with_default_model() {
    let h = harness(ScriptedBackend::new(DEFAULT_MODEL).with_response("Keep moving."));

    let (status, body) = send(
        &h.router,
        "POST",
        "/api/v1/generate-education",
        Some(education_body(45.0, "risk_assessment", None)),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["risk_level"], "Low");
    assert_eq!(body["model_used"], DEFAULT_MODEL);
    assert_eq!(body["generated_content"], "Keep moving.");
    assert!(body["prompt_used"].as_str().unwrap().contains("Chen Wei"));
    assert!(body["id"].as_i64().is_some());
    assert_eq!(h.backend.generate_calls(), vec![DEFAULT_MODEL]);
}

#[tokio::test]
async fn classifies_high_scores_as_high_risk() {
    let h = harness(ScriptedBackend::new(DEFAULT_MODEL));

    let (status, body) = send(
        &h.router,
        "POST",
        "/api/v1/generate-education",
        Some(education_body(350.0, "lifestyle", None)),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["risk_level"], "High");
}

#[tokio::test]
async fn unknown_content_type_is_rejected_before_inference() {
    let h = harness(ScriptedBackend::new(DEFAULT_MODEL));

    let (status, body) = send(
        &h.router,
        "POST",
        "/api/v1/generate-education",
        Some(education_body(45.0, "diet_plan", None)),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("diet_plan"));
    assert!(h.backend.generate_calls().is_empty());
    assert_eq!(h.backend.availability_checks(), 0);
    assert!(h.store.list_records(0, 100).await.unwrap().is_empty());
}

#[tokio::test]
async fn invalid_patient_fields_are_bad_requests() {
    let h = harness(ScriptedBackend::new(DEFAULT_MODEL));

    let mut body = education_body(45.0, "risk_assessment", None);
    body["patient_info"]["patient_age"] = json!(130);
    let (status, _) = send(&h.router, "POST", "/api/v1/generate-education", Some(body)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send(
        &h.router,
        "POST",
        "/api/v1/generate-education",
        Some(education_body(-1.0, "risk_assessment", None)),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send(
        &h.router,
        "POST",
        "/api/v1/generate-education",
        Some(json!({ "content_type": "lifestyle" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(h.backend.generate_calls().is_empty());
}

#[tokio::test]
async fn missing_model_falls_back_to_default() {
    let h = harness(ScriptedBackend::new(DEFAULT_MODEL));

    let (status, body) = send(
        &h.router,
        "POST",
        "/api/v1/generate-education",
        Some(education_body(120.0, "medication", Some("nonexistent:1b"))),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["model_used"], DEFAULT_MODEL);
    assert_eq!(h.backend.generate_calls(), vec![DEFAULT_MODEL]);
}

#[tokio::test]
async fn generation_failure_returns_500_and_persists_nothing() {
    let h = harness(ScriptedBackend::new(DEFAULT_MODEL).unreachable());

    let (status, body) = send(
        &h.router,
        "POST",
        "/api/v1/generate-education",
        Some(education_body(45.0, "risk_assessment", None)),
    )
    .await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(body["error"].is_string());
    assert!(body["details"].is_string());
    assert!(h.store.list_records(0, 100).await.unwrap().is_empty());
}

#[tokio::test]
async fn records_can_be_listed_fetched_and_deleted() {
    let h = harness(ScriptedBackend::new(DEFAULT_MODEL));

    for score in [10.0, 200.0] {
        let (status, _) = send(
            &h.router,
            "POST",
            "/api/v1/generate-education",
            Some(education_body(score, "risk_assessment", None)),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
    }

    let (status, records) = send(&h.router, "GET", "/api/v1/education-records", None).await;
    assert_eq!(status, StatusCode::OK);
    let records = records.as_array().unwrap().clone();
    assert_eq!(records.len(), 2);
    assert_eq!(records[0]["risk_level"], "High");

    let (_, page) = send(
        &h.router,
        "GET",
        "/api/v1/education-records?skip=1&limit=1",
        None,
    )
    .await;
    assert_eq!(page.as_array().unwrap().len(), 1);
    assert_eq!(page[0]["risk_level"], "Low");

    let id = records[0]["id"].as_i64().unwrap();
    let (status, record) = send(
        &h.router,
        "GET",
        &format!("/api/v1/education-records/{id}"),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(record["id"], id);

    let (status, _) = send(
        &h.router,
        "DELETE",
        &format!("/api/v1/education-records/{id}"),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = send(
        &h.router,
        "GET",
        &format!("/api/v1/education-records/{id}"),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn deleting_missing_record_is_404_and_leaves_table_unchanged() {
    let h = harness(ScriptedBackend::new(DEFAULT_MODEL));
    send(
        &h.router,
        "POST",
        "/api/v1/generate-education",
        Some(education_body(45.0, "lifestyle", None)),
    )
    .await;

    let (status, body) = send(&h.router, "DELETE", "/api/v1/education-records/999", None).await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "Record not found");
    assert_eq!(h.store.list_records(0, 100).await.unwrap().len(), 1);
}

#[tokio::test]
async fn stored_patient_drives_generation() {
    let h = harness(ScriptedBackend::new(DEFAULT_MODEL));
    h.store
        .upsert_patient(stored_patient("P001", 180.0))
        .await
        .unwrap();

    let (status, patients) = send(&h.router, "GET", "/api/v1/patients", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(patients.as_array().unwrap().len(), 1);

    let (status, patient) = send(&h.router, "GET", "/api/v1/patients/P001", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(patient["patient_data"]["ldl"], 145);

    let (status, record) = send(
        &h.router,
        "POST",
        "/api/v1/patients/P001/education",
        Some(json!({ "content_type": "lifestyle", "language": "en" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(record["patient_name"], "Lin Hui");
    assert_eq!(record["risk_level"], "High");
    assert!(record["prompt_used"].as_str().unwrap().contains("English"));
}

#[tokio::test]
async fn unknown_patient_is_404() {
    let h = harness(ScriptedBackend::new(DEFAULT_MODEL));

    let (status, body) = send(&h.router, "GET", "/api/v1/patients/P404", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["id"], "P404");

    let (status, _) = send(
        &h.router,
        "POST",
        "/api/v1/patients/P404/education",
        Some(json!({ "content_type": "lifestyle" })),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(h.backend.generate_calls().is_empty());
}

#[tokio::test]
async fn mismatched_patient_id_in_body_is_rejected() {
    let h = harness(ScriptedBackend::new(DEFAULT_MODEL));
    h.store
        .upsert_patient(stored_patient("P001", 20.0))
        .await
        .unwrap();

    let (status, _) = send(
        &h.router,
        "POST",
        "/api/v1/patients/P001/education",
        Some(json!({ "patient_id": "P002", "content_type": "lifestyle" })),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(h.backend.generate_calls().is_empty());
}

#[tokio::test]
async fn templates_are_created_and_filtered() {
    let h = harness(ScriptedBackend::new(DEFAULT_MODEL));

    for (name, category) in [("walk", "lifestyle"), ("statins", "medication")] {
        let (status, body) = send(
            &h.router,
            "POST",
            "/api/v1/prompt-templates",
            Some(json!({
                "template_name": name,
                "template_content": "Explain {topic}",
                "category": category
            })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["template_name"], name);
    }

    let (_, all) = send(&h.router, "GET", "/api/v1/prompt-templates", None).await;
    assert_eq!(all.as_array().unwrap().len(), 2);

    let (_, filtered) = send(
        &h.router,
        "GET",
        "/api/v1/prompt-templates?category=medication",
        None,
    )
    .await;
    let filtered = filtered.as_array().unwrap();
    assert_eq!(filtered.len(), 1);
    assert_eq!(filtered[0]["template_name"], "statins");

    let (status, _) = send(
        &h.router,
        "POST",
        "/api/v1/prompt-templates",
        Some(json!({
            "template_name": "odd",
            "template_content": "x",
            "category": "astrology"
        })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn statistics_reflect_generated_records() {
    let h = harness(ScriptedBackend::new(DEFAULT_MODEL));

    let (status, empty) = send(&h.router, "GET", "/api/v1/statistics", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(empty["total_records"], 0);
    assert_eq!(empty["total_templates"], 0);
    assert_eq!(empty["risk_level_distribution"], json!({}));
    assert_eq!(empty["model_usage"], json!({}));

    for score in [5.0, 150.0, 400.0] {
        send(
            &h.router,
            "POST",
            "/api/v1/generate-education",
            Some(education_body(score, "risk_assessment", None)),
        )
        .await;
    }

    let (_, stats) = send(&h.router, "GET", "/api/v1/statistics", None).await;
    assert_eq!(stats["total_records"], 3);
    assert_eq!(stats["risk_level_distribution"]["Low"], 1);
    assert_eq!(stats["risk_level_distribution"]["High"], 2);
    assert_eq!(stats["model_usage"][DEFAULT_MODEL], 3);
}

#[tokio::test]
async fn models_endpoint_lists_installed_catalog_entries() {
    let h = harness(
        ScriptedBackend::new(DEFAULT_MODEL).with_installed(&[DEFAULT_MODEL, "mistral:7b"]),
    );

    let (status, body) = send(&h.router, "GET", "/api/v1/models", None).await;

    assert_eq!(status, StatusCode::OK);
    let names: Vec<&str> = body["models"]
        .as_array()
        .unwrap()
        .iter()
        .map(|m| m["name"].as_str().unwrap())
        .collect();
    assert_eq!(names, vec![DEFAULT_MODEL, "mistral:7b"]);
}

#[tokio::test]
async fn ollama_health_reports_runtime_state() {
    let healthy = harness(ScriptedBackend::new(DEFAULT_MODEL));
    let (status, body) = send(&healthy.router, "POST", "/api/v1/health-check/ollama", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");

    let down = harness(ScriptedBackend::new(DEFAULT_MODEL).unreachable());
    let (status, body) = send(&down.router, "POST", "/api/v1/health-check/ollama", None).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert!(body["error"].is_string());
}

#[tokio::test]
async fn test_model_reports_availability_and_preview() {
    let long_answer = "AI ".repeat(100);
    let h = harness(ScriptedBackend::new(DEFAULT_MODEL).with_response(&long_answer));

    let (status, body) = send(
        &h.router,
        "POST",
        &format!("/api/v1/test-model/{DEFAULT_MODEL}"),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["available"], true);
    let preview = body["test_response"].as_str().unwrap();
    assert_eq!(preview.chars().count(), 203);
    assert!(preview.ends_with("..."));

    let (status, body) = send(&h.router, "POST", "/api/v1/test-model/phi3:mini", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["available"], false);
    assert!(body.get("test_response").is_none());
    assert_eq!(h.backend.generate_calls(), vec![DEFAULT_MODEL]);
}

#[tokio::test]
async fn test_model_reports_generation_failure() {
    let h = harness(ScriptedBackend::new(DEFAULT_MODEL).failing_on(DEFAULT_MODEL));

    let (status, body) = send(
        &h.router,
        "POST",
        &format!("/api/v1/test-model/{DEFAULT_MODEL}"),
        None,
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["available"], false);
    assert!(body["error"].as_str().unwrap().contains("500"));
}

#[tokio::test]
async fn root_and_health_respond() {
    let h = harness(ScriptedBackend::new(DEFAULT_MODEL));

    let (status, body) = send(&h.router, "GET", "/", None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["endpoints"].is_object());

    let (status, body) = send(&h.router, "GET", "/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["database"], "connected");
    assert_eq!(body["storage"], "memory");
}

#[tokio::test]
async fn health_reports_degraded_when_store_is_unreachable() {
    let backend = Arc::new(ScriptedBackend::new(DEFAULT_MODEL));
    let router = router_over(backend, Arc::new(FailingStore::new()));

    let (status, body) = send(&router, "GET", "/health", None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "degraded");
    assert_eq!(body["database"], "disconnected");
}

#[tokio::test]
async fn failed_insert_returns_500_after_a_single_generation() {
    let backend = Arc::new(ScriptedBackend::new(DEFAULT_MODEL));
    let store = Arc::new(FailingStore::new());
    let router = router_over(backend.clone(), store.clone());

    let (status, body) = send(
        &router,
        "POST",
        "/api/v1/generate-education",
        Some(education_body(45.0, "risk_assessment", None)),
    )
    .await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["error"], "Failed to save education record");
    assert!(body["details"].is_string());
    assert_eq!(backend.generate_calls(), vec![DEFAULT_MODEL]);
    assert_eq!(store.insert_attempts(), 1);
    assert!(store.list_records(0, 100).await.unwrap().is_empty());
}

#[tokio::test]
async fn malformed_record_id_is_a_json_bad_request() {
    let h = harness(ScriptedBackend::new(DEFAULT_MODEL));

    for method in ["GET", "DELETE"] {
        let (status, body) = send(&h.router, method, "/api/v1/education-records/abc", None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Invalid request");
        assert!(body["details"].as_str().unwrap().contains("abc"));
    }
}

#[tokio::test]
async fn negative_paging_is_a_json_bad_request() {
    let h = harness(ScriptedBackend::new(DEFAULT_MODEL));

    let (status, body) = send(
        &h.router,
        "GET",
        "/api/v1/education-records?skip=-1",
        None,
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Invalid request");
    assert!(body["details"].is_string());
}

#[tokio::test]
async fn correlation_id_is_echoed_or_generated() {
    let h = harness(ScriptedBackend::new(DEFAULT_MODEL));

    let request = Request::builder()
        .uri("/health")
        .header(CORRELATION_ID_HEADER, "req-42")
        .body(Body::empty())
        .unwrap();
    let response = h.router.clone().oneshot(request).await.unwrap();
    assert_eq!(response.headers()[CORRELATION_ID_HEADER], "req-42");

    let request = Request::builder().uri("/health").body(Body::empty()).unwrap();
    let response = h.router.clone().oneshot(request).await.unwrap();
    let generated = response.headers()[CORRELATION_ID_HEADER].to_str().unwrap();
    assert_eq!(generated.len(), 36);
}
