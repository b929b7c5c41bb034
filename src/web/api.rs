use axum::{
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{error, info, warn};

use crate::engine::is_not_ready;
use crate::error::PredictorError;
use crate::types::{Outcome, Prediction};
use super::AppState;

#[derive(Debug, Deserialize)]
pub struct SubmitRequest {
    pub result: String,
}

#[derive(Debug, Serialize)]
pub struct ProbabilityBreakdown {
    pub banker: f64,
    pub player: f64,
    pub tie: f64,
}

impl From<&Prediction> for ProbabilityBreakdown {
    fn from(prediction: &Prediction) -> Self {
        Self {
            banker: prediction.probability_of(Outcome::Banker),
            player: prediction.probability_of(Outcome::Player),
            tie: prediction.probability_of(Outcome::Tie),
        }
    }
}

pub fn prediction_body(result: &Result<Prediction, PredictorError>) -> serde_json::Value {
    match result {
        Ok(prediction) => json!({
            "status": "ready",
            "outcome": prediction.outcome,
            "probabilities": ProbabilityBreakdown::from(prediction),
        }),
        Err(PredictorError::InsufficientHistory { have, need }) => json!({
            "status": "insufficient_history",
            "have": have,
            "need": need,
        }),
        Err(e) => json!({
            "status": "not_ready",
            "reason": e.to_string(),
        }),
    }
}

// === Engine Endpoints ===

pub async fn health_check(
    State(state): State<AppState>,
) -> impl IntoResponse {
    Json(json!({
        "status": "healthy",
        "uptime_seconds": state.uptime_seconds(),
    }))
}

pub async fn get_prediction(
    State(state): State<AppState>,
) -> impl IntoResponse {
    let result = state.engine.query().await;
    if let Err(e) = &result {
        if !is_not_ready(e) {
            error!("Prediction failed: {}", e);
            return (StatusCode::INTERNAL_SERVER_ERROR, Json(json!({"error": e.to_string()}))).into_response();
        }
    }
    Json(prediction_body(&result)).into_response()
}

pub async fn get_history(
    State(state): State<AppState>,
) -> impl IntoResponse {
    let snapshot = state.engine.snapshot().await;
    Json(json!({
        "history": snapshot.history,
        "length": snapshot.history.len(),
        "predictor_state": snapshot.predictor_state,
        "trained_samples": snapshot.trained_samples,
    }))
}

pub async fn post_outcome(
    State(state): State<AppState>,
    Json(request): Json<SubmitRequest>,
) -> impl IntoResponse {
    match state.engine.submit_label(&request.result).await {
        Ok(submission) => {
            info!("Recorded {} via API (history {})", submission.outcome, submission.history_len);
            let prediction = state.engine.query().await;
            (StatusCode::OK, Json(json!({
                "status": "ok",
                "submission": submission,
                "prediction": prediction_body(&prediction),
            }))).into_response()
        }
        Err(e) => {
            warn!("Rejected submission: {}", e);
            (StatusCode::BAD_REQUEST, Json(json!({"error": e.to_string()}))).into_response()
        }
    }
}

pub async fn delete_history(
    State(state): State<AppState>,
) -> impl IntoResponse {
    state.engine.clear().await;
    Json(json!({"status": "ok", "engine": state.engine.status().await}))
}
