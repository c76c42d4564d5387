/// Extraction API - HTTP endpoint that enriches records with one shared pipeline
///
/// The pipeline is built once at startup from PIPELINE_CONFIG and shared by every
/// request. When NATS_URL is set, enriched records are also published to JetStream.

use axum::{
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::CorsLayer;

use ingest_extract::{
    config, Document, EnrichmentResponse, EnrichmentStatus, ExtractError, ExtractPipeline,
    NatsClient, NatsConfig, RecordEnvelope, StageRegistry,
};

struct AppState {
    pipeline: ExtractPipeline,
    nats: Option<NatsClient>,
}

#[tokio::main]
async fn main() {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    // Load environment variables
    dotenv::dotenv().ok();

    let config_path = std::env::var("PIPELINE_CONFIG")
        .unwrap_or_else(|_| "pipeline.yaml".to_string());

    let pipeline = match build_pipeline(&config_path) {
        Ok(pipeline) => pipeline,
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    };
    tracing::info!("Loaded pipeline {:?} from {}", pipeline, config_path);

    // Publishing is optional
    let nats = if std::env::var("NATS_URL").is_ok() {
        match NatsClient::connect(NatsConfig::default()).await {
            Ok(client) => Some(client),
            Err(e) => {
                eprintln!("Error: failed to connect to NATS: {}", e);
                std::process::exit(1);
            }
        }
    } else {
        None
    };

    let state = Arc::new(AppState { pipeline, nats });

    // Build router
    let app = Router::new()
        .route("/enrich", post(enrich_record))
        .route("/enrich/batch", post(enrich_batch))
        .route("/health", get(health_check))
        .route("/ready", get(readiness_check))
        .layer(CorsLayer::permissive())
        .with_state(state.clone());

    let port: u16 = match std::env::var("PORT").unwrap_or_else(|_| "8080".to_string()).parse() {
        Ok(port) => port,
        Err(e) => {
            eprintln!("Error: invalid PORT: {}", e);
            std::process::exit(1);
        }
    };

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    tracing::info!("Extraction API listening on {}", addr);
    if let Some(nats) = &state.nats {
        tracing::info!("Publishing to NATS stream: {}", nats.stream_name());
    }

    let listener = match tokio::net::TcpListener::bind(&addr).await {
        Ok(listener) => listener,
        Err(e) => {
            eprintln!("Error: failed to bind {}: {}", addr, e);
            std::process::exit(1);
        }
    };
    if let Err(e) = axum::serve(listener, app).await {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn build_pipeline(config_path: &str) -> Result<ExtractPipeline, ExtractError> {
    let registry = StageRegistry::builtin();
    let config = config::load_config_file(config_path)?;
    ExtractPipeline::from_config(&config, &registry)
}

/// Enrich a single record, publishing it when NATS is configured
async fn enrich_record(
    State(state): State<Arc<AppState>>,
    body: String,
) -> Result<(StatusCode, Json<EnrichmentResponse>), AppError> {
    let value: serde_json::Value = serde_json::from_str(&body)
        .map_err(|e| AppError::ValidationError(format!("Invalid JSON: {}", e)))?;
    let mut document = Document::from_value(value)
        .map_err(|e| AppError::ValidationError(e.to_string()))?;

    let extracted_count = state.pipeline.execute(&mut document)?;
    let envelope = RecordEnvelope::new(state.pipeline.tag(), document, extracted_count);

    let status = publish(&state, &envelope).await?;
    tracing::info!("Record {} enriched with {} value(s)", envelope.message_id, extracted_count);

    let mut response = EnrichmentResponse::from(envelope);
    response.status = status;
    Ok((StatusCode::OK, Json(response)))
}

/// Enrich a batch of NDJSON records
///
/// Failed lines are reported and skipped; the rest of the batch still runs.
async fn enrich_batch(
    State(state): State<Arc<AppState>>,
    body: String,
) -> Result<(StatusCode, Json<BatchResponse>), AppError> {
    let start = std::time::Instant::now();

    let mut processed = 0;
    let mut enriched = 0;
    let mut failed = 0;
    let mut errors = Vec::new();
    let mut records = Vec::new();

    for (line_num, line) in body.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        processed += 1;

        let document = serde_json::from_str::<serde_json::Value>(line)
            .map_err(ExtractError::from)
            .and_then(Document::from_value);
        let mut document = match document {
            Ok(document) => document,
            Err(e) => {
                failed += 1;
                errors.push(format!("Line {}: {}", line_num + 1, e));
                continue;
            }
        };

        let extracted_count = match state.pipeline.execute(&mut document) {
            Ok(count) => count,
            Err(e) => {
                failed += 1;
                errors.push(format!("Line {}: {}", line_num + 1, e));
                continue;
            }
        };

        let envelope = RecordEnvelope::new(state.pipeline.tag(), document, extracted_count);
        match publish(&state, &envelope).await {
            Ok(_) => {
                enriched += 1;
                records.push(envelope.record);
            }
            Err(e) => {
                failed += 1;
                errors.push(format!("Line {}: {}", line_num + 1, e));
            }
        }
    }

    Ok((
        StatusCode::OK,
        Json(BatchResponse {
            status: if failed == 0 { "success" } else { "partial" }.to_string(),
            processed,
            enriched,
            failed,
            errors,
            records,
            duration_ms: start.elapsed().as_millis() as u64,
        })
    ))
}

async fn publish(state: &AppState, envelope: &RecordEnvelope) -> Result<EnrichmentStatus, AppError> {
    match &state.nats {
        Some(nats) => {
            nats.publish_record(envelope).await
                .map_err(|e| AppError::InternalError(format!("NATS publish failed: {}", e)))?;
            Ok(EnrichmentStatus::Published)
        }
        None => Ok(EnrichmentStatus::Enriched),
    }
}

/// Health check endpoint (liveness)
async fn health_check() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "healthy",
        "service": "extract-api",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

/// Readiness check endpoint - pipeline is built, NATS connected if configured
async fn readiness_check(
    State(state): State<Arc<AppState>>,
) -> Result<Json<serde_json::Value>, StatusCode> {
    let nats = match &state.nats {
        Some(nats) if nats.is_connected() => "connected",
        Some(_) => return Err(StatusCode::SERVICE_UNAVAILABLE),
        None => "disabled",
    };

    Ok(Json(serde_json::json!({
        "status": "ready",
        "service": "extract-api",
        "pipeline": state.pipeline.tag(),
        "stages": state.pipeline.stage_names(),
        "nats": nats
    })))
}

// Error handling

#[derive(Debug)]
enum AppError {
    ValidationError(String),
    ExtractionFailed(String),
    InternalError(String),
}

impl std::fmt::Display for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AppError::ValidationError(msg)
            | AppError::ExtractionFailed(msg)
            | AppError::InternalError(msg) => write!(f, "{}", msg),
        }
    }
}

impl From<ExtractError> for AppError {
    fn from(err: ExtractError) -> Self {
        match err {
            ExtractError::StageExecution { .. } | ExtractError::FieldWrite { .. } => {
                AppError::ExtractionFailed(err.to_string())
            }
            other => AppError::InternalError(other.to_string()),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        let (status, message) = match self {
            AppError::ValidationError(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::ExtractionFailed(msg) => (StatusCode::UNPROCESSABLE_ENTITY, msg),
            AppError::InternalError(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
        };

        (status, Json(serde_json::json!({
            "status": EnrichmentStatus::Failed,
            "error": message
        }))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_app_error_display_and_status() {
        let err = AppError::InternalError("NATS publish failed: timeout".to_string());
        assert_eq!(format!("Line {}: {}", 3, err), "Line 3: NATS publish failed: timeout");
        assert_eq!(err.into_response().status(), StatusCode::INTERNAL_SERVER_ERROR);

        let err = AppError::from(ExtractError::StageExecution {
            stage: "EmailExtractor".to_string(),
            reason: "item error".to_string(),
        });
        assert!(err.to_string().contains("EmailExtractor"));
        assert_eq!(err.into_response().status(), StatusCode::UNPROCESSABLE_ENTITY);
    }
}

// Response types

#[derive(Debug, serde::Serialize)]
struct BatchResponse {
    status: String,
    processed: usize,
    enriched: usize,
    failed: usize,
    errors: Vec<String>,
    records: Vec<Document>,
    duration_ms: u64,
}
