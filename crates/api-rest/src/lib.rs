//! REST surface of the predictive insights service.
//!
//! Exposes the CDS Hooks contract (`/cds-services`) consumed by the EHR and
//! the internal `/api/*` routes consumed by the dashboard frontend. Handlers
//! stay thin: card logic lives in `insights-core`, transport in
//! `insights-client`.

use axum::{
    extract::{Path as AxumPath, Query, State},
    http::{HeaderMap, StatusCode},
    response::Json,
    routing::{get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use utoipa::{OpenApi, ToSchema};
use utoipa_swagger_ui::SwaggerUi;

use fhir::{Bundle, DocumentReference, Patient};
use insights_core::cards::{build_cards, discovery_document, CardCache};
use insights_core::prompt::document_prompt;
use insights_core::{AnalysisRequest, AnalysisSettings, CoreConfig};
use insights_client::document::document_content;
use insights_client::{AiRequestClient, FhirGateway, HttpGateway, LastAnalysisStore};

/// Application state for the REST API server
///
/// Contains shared state that needs to be accessible to all request
/// handlers: the resolved configuration, the FHIR gateway and the AI
/// request client.
#[derive(Clone)]
pub struct AppState {
    pub cfg: Arc<CoreConfig>,
    pub gateway: Arc<HttpGateway>,
    pub ai: Arc<AiRequestClient>,
}

impl AppState {
    pub fn new(cfg: CoreConfig) -> anyhow::Result<Self> {
        let gateway = HttpGateway::new()?;
        let ai = AiRequestClient::new(
            cfg.ai_backend_url().to_string(),
            cfg.ai_backend_token().map(str::to_string),
        )?;
        Ok(Self {
            cfg: Arc::new(cfg),
            gateway: Arc::new(gateway),
            ai: Arc::new(ai),
        })
    }
}

/// Resolve [`CoreConfig`] from the environment. Called once at startup by
/// the binaries.
///
/// # Environment Variables
/// - `FHIR_BASE_URL`: FHIR API base (default: "https://app.meldrx.com/api/fhir")
/// - `FHIR_APP_ID`: tenant/app id scoping every FHIR call (required)
/// - `AI_BACKEND_URL`: analysis backend endpoint (required)
/// - `AI_BACKEND_TOKEN`: bearer token for the analysis backend (optional)
/// - `LAUNCH_URL`: SMART launch URL advertised on CDS cards
pub fn load_config() -> anyhow::Result<CoreConfig> {
    let fhir_base_url = std::env::var("FHIR_BASE_URL")
        .unwrap_or_else(|_| "https://app.meldrx.com/api/fhir".into());
    let app_id =
        std::env::var("FHIR_APP_ID").map_err(|_| anyhow::anyhow!("FHIR_APP_ID must be set"))?;
    let ai_backend_url = std::env::var("AI_BACKEND_URL")
        .map_err(|_| anyhow::anyhow!("AI_BACKEND_URL must be set"))?;
    let ai_backend_token = std::env::var("AI_BACKEND_TOKEN").ok();
    let launch_url = std::env::var("LAUNCH_URL")
        .unwrap_or_else(|_| "https://insights.example/launch".into());

    Ok(CoreConfig::new(
        fhir_base_url,
        app_id,
        ai_backend_url,
        ai_backend_token,
        launch_url,
    )?)
}

#[derive(OpenApi)]
#[openapi(
    paths(
        health,
        list_cds_services,
        invoke_cds_service,
        get_patient,
        update_last_analyzed,
        analyze_document,
    ),
    components(schemas(HealthRes, UpdateLastAnalyzedRes))
)]
pub struct ApiDoc;

/// Build the REST router with all routes and layers applied.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/cds-services", get(list_cds_services))
        .route("/cds-services/:id", post(invoke_cds_service))
        .route("/api/patient/:id", get(get_patient))
        .route("/api/updateLastAnalyzed", post(update_last_analyzed))
        .route("/api/analyzeDocument", post(analyze_document))
        .merge(
            SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()),
        )
        .layer(CorsLayer::permissive())
        .with_state(state)
}

#[derive(Serialize, Deserialize, ToSchema)]
pub struct HealthRes {
    pub ok: bool,
    pub message: String,
}

#[derive(Serialize, Deserialize, ToSchema)]
pub struct UpdateLastAnalyzedRes {
    pub message: String,
}

/// CDS Hooks request body, reduced to the prefetch entries this service
/// reads.
#[derive(Debug, Default, Deserialize)]
struct CdsHookRequest {
    #[serde(default)]
    prefetch: CdsPrefetch,
}

#[derive(Debug, Default, Deserialize)]
struct CdsPrefetch {
    patient: Option<Patient>,
    observations: Option<Bundle>,
}

#[derive(Debug, Deserialize)]
struct UpdateLastAnalyzedParams {
    #[serde(rename = "patientId")]
    patient_id: String,
    date: String,
}

#[derive(Debug, Default, Deserialize)]
struct UpdateLastAnalyzedReq {
    #[serde(rename = "analysisData", default)]
    analysis_data: Value,
}

#[derive(Debug, Deserialize)]
struct AnalyzeDocumentReq {
    document: DocumentReference,
}

#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "Health check response", body = HealthRes)
    )
)]
/// Health check endpoint for the REST API
#[axum::debug_handler]
async fn health(State(_state): State<AppState>) -> Json<HealthRes> {
    Json(HealthRes {
        ok: true,
        message: "Predictive insights REST API is alive".into(),
    })
}

#[utoipa::path(
    get,
    path = "/cds-services",
    responses(
        (status = 200, description = "CDS Hooks service discovery document")
    )
)]
/// CDS Hooks discovery endpoint
///
/// Lists the single `patient-view` service (id `0001`) with its prefetch
/// template.
#[axum::debug_handler]
async fn list_cds_services(State(_state): State<AppState>) -> Json<Value> {
    Json(discovery_document())
}

#[utoipa::path(
    post,
    path = "/cds-services/{id}",
    responses(
        (status = 200, description = "Cards for the patient-view hook"),
        (status = 404, description = "Unknown service id"),
    )
)]
/// Invoke the patient-view CDS service
///
/// Reads `prefetch.patient` and `prefetch.observations` from the hook
/// request and returns summary and risk cards.
#[axum::debug_handler]
async fn invoke_cds_service(
    State(state): State<AppState>,
    AxumPath(id): AxumPath<String>,
    Json(req): Json<CdsHookRequest>,
) -> Result<Json<Value>, (StatusCode, &'static str)> {
    if id != "0001" {
        return Err((StatusCode::NOT_FOUND, "Service not found"));
    }

    let patient = req.prefetch.patient.unwrap_or_default();
    let mut cache = CardCache::new();
    let cards = build_cards(
        &patient,
        req.prefetch.observations.as_ref(),
        state.cfg.launch_url(),
        &mut cache,
    );

    Ok(Json(serde_json::json!({ "cards": cards })))
}

#[utoipa::path(
    get,
    path = "/api/patient/{id}",
    responses(
        (status = 200, description = "Patient resource"),
        (status = 401, description = "Missing bearer token"),
        (status = 502, description = "Upstream FHIR error"),
    )
)]
/// Proxy a FHIR Patient read, passing the caller's bearer token through.
#[axum::debug_handler]
async fn get_patient(
    State(state): State<AppState>,
    AxumPath(id): AxumPath<String>,
    headers: HeaderMap,
) -> Result<Json<Value>, (StatusCode, &'static str)> {
    let Some(token) = bearer_token(&headers) else {
        return Err((StatusCode::UNAUTHORIZED, "Missing token"));
    };

    let url = format!("{}/Patient/{id}", state.cfg.fhir_root());
    match state.gateway.get_json(&url, &token).await {
        Ok(patient) => Ok(Json(patient)),
        Err(e) => {
            tracing::error!("Patient proxy error: {:?}", e);
            Err((StatusCode::BAD_GATEWAY, "FHIR error"))
        }
    }
}

#[utoipa::path(
    post,
    path = "/api/updateLastAnalyzed",
    params(
        ("patientId" = String, Query, description = "Patient id"),
        ("date" = String, Query, description = "Analysis date (YYYY-MM-DD)"),
    ),
    responses(
        (status = 200, description = "Observation written", body = UpdateLastAnalyzedRes),
        (status = 400, description = "Invalid request parameters"),
        (status = 500, description = "FHIR write failed"),
    )
)]
/// Persist the last-analysis Observation for a patient.
#[axum::debug_handler]
async fn update_last_analyzed(
    State(state): State<AppState>,
    Query(params): Query<UpdateLastAnalyzedParams>,
    headers: HeaderMap,
    Json(req): Json<UpdateLastAnalyzedReq>,
) -> Result<Json<UpdateLastAnalyzedRes>, (StatusCode, &'static str)> {
    let Some(token) = bearer_token(&headers) else {
        return Err((StatusCode::BAD_REQUEST, "Invalid request parameters"));
    };
    if chrono::NaiveDate::parse_from_str(&params.date, "%Y-%m-%d").is_err() {
        return Err((StatusCode::BAD_REQUEST, "Invalid request parameters"));
    }

    let payload = match req.analysis_data {
        Value::String(text) => text,
        other => other.to_string(),
    };

    let store = LastAnalysisStore::new(state.gateway.as_ref(), state.cfg.fhir_root());
    match store
        .persist(&params.patient_id, &token, &params.date, &payload)
        .await
    {
        Ok(()) => Ok(Json(UpdateLastAnalyzedRes {
            message: "Observation written".into(),
        })),
        Err(e) => {
            tracing::error!("Update last analyzed error: {:?}", e);
            Err((StatusCode::INTERNAL_SERVER_ERROR, "Failed to write observation"))
        }
    }
}

#[utoipa::path(
    post,
    path = "/api/analyzeDocument",
    responses(
        (status = 200, description = "AI analysis of the document"),
        (status = 400, description = "Invalid document structure"),
        (status = 500, description = "Analysis failed"),
    )
)]
/// Forward a DocumentReference attachment to the AI backend for analysis.
#[axum::debug_handler]
async fn analyze_document(
    State(state): State<AppState>,
    Json(req): Json<AnalyzeDocumentReq>,
) -> Result<Json<Value>, (StatusCode, &'static str)> {
    let (content_type, content) =
        match document_content(state.gateway.as_ref(), &req.document).await {
            Ok(resolved) => resolved,
            Err(e) => {
                tracing::error!("Document content error: {:?}", e);
                return Err((StatusCode::BAD_REQUEST, "Invalid document structure"));
            }
        };

    let request = AnalysisRequest {
        prompt: document_prompt(&content_type, &content),
        model: AnalysisSettings::default().model,
        patient_id: None,
        context: serde_json::to_value(&req.document).ok(),
    };

    match state.ai.send(&request).await {
        Ok(result) => Ok(Json(serde_json::json!({ "result": result }))),
        Err(e) => {
            tracing::error!("Analyze document error: {:?}", e);
            Err((StatusCode::INTERNAL_SERVER_ERROR, "Failed to analyze document"))
        }
    }
}

fn bearer_token(headers: &HeaderMap) -> Option<String> {
    headers
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .map(|value| value.trim_start_matches("Bearer ").to_string())
        .filter(|token| !token.is_empty())
}
