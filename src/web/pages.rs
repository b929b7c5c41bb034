use askama::Template;
use axum::{
    extract::State,
    http::StatusCode,
    response::{Html, IntoResponse, Redirect, Response},
    Form,
};
use serde::Deserialize;
use tracing::{error, info, warn};

use crate::error::PredictorError;
use crate::types::Outcome;
use super::AppState;

#[derive(Debug, Deserialize)]
pub struct SubmitForm {
    pub result: Option<String>,
}

pub struct ProbabilityRow {
    pub label: &'static str,
    pub percent: String,
}

#[derive(Template)]
#[template(path = "index.html")]
pub struct IndexTemplate {
    pub prediction: String,
    pub notice: Option<String>,
    pub probabilities: Vec<ProbabilityRow>,
    pub history: Vec<&'static str>,
    pub trained_samples: Option<usize>,
}

impl IndexTemplate {
    fn probability_rows(percentages: [f64; 3]) -> Vec<ProbabilityRow> {
        Outcome::ALL
            .iter()
            .zip(percentages)
            .map(|(outcome, pct)| ProbabilityRow {
                label: outcome.as_str(),
                percent: format!("{:.2}", pct),
            })
            .collect()
    }
}

pub async fn index(
    State(state): State<AppState>,
) -> impl IntoResponse {
    let snapshot = state.engine.snapshot().await;

    let (prediction, notice, percentages) = match &snapshot.prediction {
        Ok(p) => (p.outcome.to_string(), None, p.percentages()),
        Err(PredictorError::InsufficientHistory { have, need }) => (
            "N/A".to_string(),
            Some(format!("At least {} results are needed to predict ({} so far).", need, have)),
            [0.0; 3],
        ),
        Err(e) => ("N/A".to_string(), Some(e.to_string()), [0.0; 3]),
    };

    let page = IndexTemplate {
        prediction,
        notice,
        probabilities: IndexTemplate::probability_rows(percentages),
        history: snapshot.history.iter().map(Outcome::as_str).collect(),
        trained_samples: snapshot.trained_samples,
    };

    match page.render() {
        Ok(html) => Html(html).into_response(),
        Err(e) => {
            error!("Failed to render index page: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, "Failed to render page").into_response()
        }
    }
}

fn invalid_input() -> Response {
    (
        StatusCode::BAD_REQUEST,
        "Invalid input. Please enter Banker, Player, or Tie.",
    )
        .into_response()
}

pub async fn submit_result(
    State(state): State<AppState>,
    Form(form): Form<SubmitForm>,
) -> impl IntoResponse {
    let Some(raw) = form.result else {
        warn!("Rejected submission: no result field");
        return invalid_input();
    };

    match state.engine.submit_label(&raw).await {
        Ok(submission) => {
            info!("Recorded {} (history {})", submission.outcome, submission.history_len);
            Redirect::to("/").into_response()
        }
        Err(e) => {
            warn!("Rejected submission: {}", e);
            invalid_input()
        }
    }
}

pub async fn clear_history(
    State(state): State<AppState>,
) -> impl IntoResponse {
    state.engine.clear().await;
    Redirect::to("/")
}

