use axum::{
    routing::{get, post},
    Router,
};
use std::net::SocketAddr;
use tower_http::cors::{Any, CorsLayer};
use tracing::info;

use super::{api, pages, AppState};

pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        // HTML page and form actions
        .route("/", get(pages::index))
        .route("/submit", post(pages::submit_result))
        .route("/clear_history", post(pages::clear_history))
        // API endpoints
        .route("/api/health", get(api::health_check))
        .route("/api/prediction", get(api::get_prediction))
        .route("/api/history", get(api::get_history).delete(api::delete_history))
        .route("/api/outcomes", post(api::post_outcome))
        .layer(cors)
        .with_state(state)
}

pub async fn start_server(state: AppState, host: &str, port: u16) -> anyhow::Result<()> {
    let app = build_router(state);

    let addr: SocketAddr = format!("{}:{}", host, port).parse()?;
    info!("Predictor server starting on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Predictor server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{EngineHandle, PredictionEngine};
    use axum::body::{to_bytes, Body};
    use axum::http::{header, Request, StatusCode};
    use serde_json::Value;
    use tower::ServiceExt;

    fn test_state() -> AppState {
        AppState::new(EngineHandle::new(PredictionEngine::default()))
    }

    async fn send(app: &Router, request: Request<Body>) -> (StatusCode, String) {
        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, String::from_utf8(body.to_vec()).unwrap())
    }

    fn form_submit(result: &str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/submit")
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(Body::from(format!("result={}", result)))
            .unwrap()
    }

    fn get_request(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    #[tokio::test]
    async fn test_form_submit_redirects_and_rejects() {
        let state = test_state();
        let app = build_router(state.clone());

        let (status, _) = send(&app, form_submit("banker")).await;
        assert_eq!(status, StatusCode::SEE_OTHER);

        let (status, body) = send(&app, form_submit("Dealer")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body.contains("Banker, Player, or Tie"));

        assert_eq!(state.engine.status().await.history_len, 1);
    }

    #[tokio::test]
    async fn test_form_without_result_field_is_rejected() {
        let state = test_state();
        let app = build_router(state.clone());

        for body in ["", "outcome=Banker"] {
            let request = Request::builder()
                .method("POST")
                .uri("/submit")
                .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
                .body(Body::from(body))
                .unwrap();
            let (status, text) = send(&app, request).await;
            assert_eq!(status, StatusCode::BAD_REQUEST);
            assert!(text.contains("Banker, Player, or Tie"));
        }
        assert_eq!(state.engine.status().await.history_len, 0);
    }

    #[tokio::test]
    async fn test_index_shows_placeholder_then_prediction() {
        let app = build_router(test_state());

        let (status, body) = send(&app, get_request("/")).await;
        assert_eq!(status, StatusCode::OK);
        assert!(body.contains("N/A"));
        assert!(body.contains("At least 6 results"));

        for label in ["Banker", "Player", "Banker", "Tie", "Player", "Banker"] {
            send(&app, form_submit(label)).await;
        }
        let (_, body) = send(&app, get_request("/")).await;
        assert!(!body.contains("At least 6 results"));
        assert!(body.contains("History (6)"));
    }

    #[tokio::test]
    async fn test_prediction_api() {
        let app = build_router(test_state());

        let (_, body) = send(&app, get_request("/api/prediction")).await;
        let json: Value = serde_json::from_str(&body).unwrap();
        assert_eq!(json["status"], "insufficient_history");
        assert_eq!(json["have"], 0);
        assert_eq!(json["need"], 6);

        for label in ["Banker", "Player", "Banker", "Tie", "Player", "Banker"] {
            let request = Request::builder()
                .method("POST")
                .uri("/api/outcomes")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(format!("{{\"result\":\"{}\"}}", label)))
                .unwrap();
            let (status, _) = send(&app, request).await;
            assert_eq!(status, StatusCode::OK);
        }

        let (_, body) = send(&app, get_request("/api/prediction")).await;
        let json: Value = serde_json::from_str(&body).unwrap();
        assert_eq!(json["status"], "ready");
        let probs = &json["probabilities"];
        let sum = probs["banker"].as_f64().unwrap() + probs["player"].as_f64().unwrap() + probs["tie"].as_f64().unwrap();
        assert!((sum - 1.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_api_rejects_invalid_label() {
        let app = build_router(test_state());
        let request = Request::builder()
            .method("POST")
            .uri("/api/outcomes")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(r#"{"result":"Dealer"}"#))
            .unwrap();
        let (status, body) = send(&app, request).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body.contains("Dealer"));
    }

    #[tokio::test]
    async fn test_clear_history_endpoints() {
        let state = test_state();
        let app = build_router(state.clone());
        for label in ["Tie", "Tie", "Player"] {
            send(&app, form_submit(label)).await;
        }

        let request = Request::builder().method("POST").uri("/clear_history").body(Body::empty()).unwrap();
        let (status, _) = send(&app, request).await;
        assert_eq!(status, StatusCode::SEE_OTHER);
        assert_eq!(state.engine.status().await.history_len, 0);

        send(&app, form_submit("Banker")).await;
        let request = Request::builder().method("DELETE").uri("/api/history").body(Body::empty()).unwrap();
        let (status, _) = send(&app, request).await;
        assert_eq!(status, StatusCode::OK);

        let (_, body) = send(&app, get_request("/api/history")).await;
        let json: Value = serde_json::from_str(&body).unwrap();
        assert_eq!(json["length"], 0);
        assert_eq!(json["predictor_state"], "Untrained");
    }
}
