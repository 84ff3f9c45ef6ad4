use axum::{
    extract::State,
    http::StatusCode,
    response::Json,
    routing::{get, post},
    Router,
};
use chrono::{DateTime, Utc};
use seqcast_core::{
    extract_symbols, parse_sequence, PredictResponse, PredictorError, PredictorSnapshot, Session,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::RwLock;
use tower_http::cors::{Any, CorsLayer};
use tracing::{error, info, warn};

use crate::config::ApiConfig;

pub struct AppState {
    session: Session,
    started_at: DateTime<Utc>,
}

impl AppState {
    pub fn new(session: Session) -> Self {
        Self {
            session,
            started_at: Utc::now(),
        }
    }
}

pub type SharedState = Arc<RwLock<AppState>>;

type ApiError = (StatusCode, Json<ErrorResponse>);

// Request / response types
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    status: String,
    version: String,
    trained: bool,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    error: String,
}

#[derive(Debug, Deserialize)]
pub struct TrainRequest {
    sequence: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct TrainResponse {
    message: String,
    length: usize,
    patterns: usize,
    classifier_fitted: bool,
}

#[derive(Debug, Deserialize)]
pub struct PredictRequest {
    last_char: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ExtractRequest {
    text: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ExtractResponse {
    text: String,
}

#[derive(Debug, Serialize)]
pub struct StatsResponse {
    trained: bool,
    started_at: DateTime<Utc>,
    predictor: Option<PredictorSnapshot>,
}

fn reject(status: StatusCode, message: impl Into<String>) -> ApiError {
    (
        status,
        Json(ErrorResponse {
            error: message.into(),
        }),
    )
}

fn predictor_error(e: PredictorError) -> ApiError {
    match e {
        PredictorError::NotTrained => reject(
            StatusCode::BAD_REQUEST,
            "Model has not been trained. Call /api/train first.",
        ),
        PredictorError::Config(e) => {
            error!(error = %e, "predictor misconfigured");
            reject(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
        }
        e => reject(StatusCode::BAD_REQUEST, e.to_string()),
    }
}

// Handlers
async fn health(State(state): State<SharedState>) -> Json<HealthResponse> {
    let state = state.read().await;
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        trained: state.session.is_trained(),
    })
}

async fn train(
    State(state): State<SharedState>,
    Json(payload): Json<TrainRequest>,
) -> Result<Json<TrainResponse>, ApiError> {
    let sequence = payload
        .sequence
        .filter(|s| !s.is_empty())
        .ok_or_else(|| reject(StatusCode::BAD_REQUEST, "Sequence is required"))?;

    let symbols = parse_sequence(&sequence).map_err(|e| {
        warn!(error = %e, "training rejected");
        predictor_error(e)
    })?;

    // Fit off the async workers and without holding the state lock.
    let builder = state.read().await.session.predictor_builder();
    let predictor = tokio::task::spawn_blocking(move || builder.build(&symbols))
        .await
        .map_err(|e| {
            error!(error = %e, "training task failed");
            reject(StatusCode::INTERNAL_SERVER_ERROR, "Training failed")
        })?
        .map_err(|e| {
            warn!(error = %e, "training rejected");
            predictor_error(e)
        })?;

    let summary = state.write().await.session.install(predictor);
    info!(length = summary.length, "model trained");

    Ok(Json(TrainResponse {
        message: "Model trained successfully".to_string(),
        length: summary.length,
        patterns: summary.patterns,
        classifier_fitted: summary.classifier_fitted,
    }))
}

async fn predict(
    State(state): State<SharedState>,
    Json(payload): Json<PredictRequest>,
) -> Result<Json<PredictResponse>, ApiError> {
    let mut state = state.write().await;
    if !state.session.is_trained() {
        return Err(predictor_error(PredictorError::NotTrained));
    }

    let last_char = payload.last_char.unwrap_or_default();
    let response = state.session.predict(&last_char).map_err(|e| {
        warn!(error = %e, last_char = %last_char, "invalid predict input");
        reject(
            StatusCode::BAD_REQUEST,
            "Invalid input. Please provide 'A' or 'B'.",
        )
    })?;
    Ok(Json(response))
}

async fn extract_text(Json(payload): Json<ExtractRequest>) -> Json<ExtractResponse> {
    Json(ExtractResponse {
        text: extract_symbols(&payload.text),
    })
}

async fn get_stats(State(state): State<SharedState>) -> Json<StatsResponse> {
    let state = state.read().await;
    Json(StatsResponse {
        trained: state.session.is_trained(),
        started_at: state.started_at,
        predictor: state.session.snapshot(),
    })
}

pub fn router(state: SharedState, cors: bool) -> Router {
    let app = Router::new()
        .route("/health", get(health))
        .route("/api/train", post(train))
        .route("/api/predict", post(predict))
        .route("/api/extract_text", post(extract_text))
        .route("/api/stats", get(get_stats))
        .with_state(state);

    if cors {
        app.layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
    } else {
        app
    }
}

pub async fn run_api_server(config: &ApiConfig, session: Session) -> anyhow::Result<()> {
    let state = Arc::new(RwLock::new(AppState::new(session)));
    let app = router(state, config.cors);

    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!(addr = %addr, cors = config.cors, "API server listening");

    axum::serve(listener, app).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use seqcast_core::{DeferredSpawner, DisplayColor, DisplayHint};

    fn state() -> SharedState {
        let session = Session::default()
            .with_spawner(Arc::new(DeferredSpawner::new()))
            .with_fixed_hour(20);
        Arc::new(RwLock::new(AppState::new(session)))
    }

    async fn train_with(state: &SharedState, sequence: Option<&str>) -> Result<Json<TrainResponse>, ApiError> {
        train(
            State(state.clone()),
            Json(TrainRequest {
                sequence: sequence.map(str::to_string),
            }),
        )
        .await
    }

    async fn predict_with(state: &SharedState, last_char: &str) -> Result<Json<PredictResponse>, ApiError> {
        predict(
            State(state.clone()),
            Json(PredictRequest {
                last_char: Some(last_char.to_string()),
            }),
        )
        .await
    }

    #[tokio::test]
    async fn test_predict_before_train_is_rejected() {
        let state = state();
        let (status, Json(body)) = predict_with(&state, "A").await.unwrap_err();
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body.error.contains("/api/train"));
    }

    #[tokio::test]
    async fn test_train_requires_sequence() {
        let state = state();
        let (status, Json(body)) = train_with(&state, None).await.unwrap_err();
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body.error, "Sequence is required");

        let (status, _) = train_with(&state, Some("ABZ")).await.unwrap_err();
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(!state.read().await.session.is_trained());
    }

    #[tokio::test]
    async fn test_train_then_predict() {
        let state = state();
        let Json(trained) = train_with(&state, Some("AABAB")).await.unwrap();
        assert_eq!(trained.message, "Model trained successfully");
        assert_eq!(trained.length, 5);

        let Json(response) = predict_with(&state, "A").await.unwrap();
        assert!((0.0..=1.0).contains(&response.confidence));
        if response.hint == DisplayHint::Wait {
            assert_eq!(response.color, DisplayColor::Red);
        }

        let (status, Json(body)) = predict_with(&state, "AB").await.unwrap_err();
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body.error, "Invalid input. Please provide 'A' or 'B'.");
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_health_answers_while_training() {
        let state = state();
        let long = "AABABBBABAABBBAB".repeat(100);
        let training = {
            let state = state.clone();
            tokio::spawn(async move { train_with(&state, Some(long.as_str())).await })
        };

        // The state lock is free while the fit runs on the blocking pool.
        let Json(health) = tokio::time::timeout(
            std::time::Duration::from_secs(5),
            health(State(state.clone())),
        )
        .await
        .unwrap();
        assert_eq!(health.status, "ok");

        let Json(trained) = training.await.unwrap().unwrap();
        assert_eq!(trained.length, 1600);
        assert!(state.read().await.session.is_trained());
    }

    #[tokio::test]
    async fn test_stats_reflect_session() {
        let state = state();
        let Json(stats) = get_stats(State(state.clone())).await;
        assert!(!stats.trained);
        assert!(stats.predictor.is_none());

        train_with(&state, Some("ABABAB")).await.unwrap();
        predict_with(&state, "A").await.unwrap();
        let Json(stats) = get_stats(State(state.clone())).await;
        let snapshot = stats.predictor.unwrap();
        assert_eq!(snapshot.sequence_len, 7);
        assert_eq!(snapshot.predictions, 1);
    }

    #[tokio::test]
    async fn test_extract_text_keeps_symbols_reversed() {
        let Json(body) = extract_text(Json(ExtractRequest {
            text: "Round 1: A, round 2: B, round 3: B".to_string(),
        }))
        .await;
        assert_eq!(body.text, "BBA");
    }

    #[tokio::test]
    async fn test_health_reports_training() {
        let state = state();
        let Json(health) = health(State(state.clone())).await;
        assert_eq!(health.status, "ok");
        assert!(!health.trained);
    }
}
