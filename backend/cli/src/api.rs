use std::path::PathBuf;
use std::sync::Arc;

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::Json,
    routing::get,
    Router,
};
use serde::Deserialize;
use serde_json::{json, Value};

use meterline_store::SqliteReadingStore;

/// Upper bound for `/api/readings?limit=`.
const MAX_READINGS: usize = 500;

/// Shared application state for API handlers.
pub struct AppState {
    pub store: Arc<SqliteReadingStore>,
}

/// Build the Axum router with all API routes, the channel webhooks, and the
/// stored-media server under `/media`.
pub fn build_router(state: Arc<AppState>, channel_routers: Vec<Router>, media_dir: PathBuf) -> Router {
    let mut app = Router::new()
        .route("/api/health", get(health))
        .route("/api/readings", get(get_readings))
        .with_state(state)
        .nest("/media", media::media_router(media_dir));

    for router in channel_routers {
        app = app.merge(router);
    }

    app
}

/// Health check endpoint. `readings` is null when the store is unreadable.
async fn health(State(state): State<Arc<AppState>>) -> Json<Value> {
    let readings = match state.store.count().await {
        Ok(n) => Some(n),
        Err(e) => {
            tracing::warn!(error = %e, "Failed to count readings");
            None
        }
    };
    Json(json!({
        "status": "ok",
        "service": "meterline",
        "version": env!("CARGO_PKG_VERSION"),
        "readings": readings,
    }))
}

#[derive(Debug, Deserialize)]
struct ReadingsQuery {
    limit: Option<usize>,
}

/// Most recent readings first.
async fn get_readings(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ReadingsQuery>,
) -> Result<Json<Value>, StatusCode> {
    let limit = query.limit.unwrap_or(50).min(MAX_READINGS);
    match state.store.recent(limit).await {
        Ok(readings) => Ok(Json(json!({ "readings": readings }))),
        Err(e) => {
            tracing::error!(error = %e, "Failed to fetch readings");
            Err(StatusCode::INTERNAL_SERVER_ERROR)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use meterline_core::{ReadingRecord, ReadingRepository, ReadingStatus, ResponseIntent};
    use tower::ServiceExt;

    fn record(sid: &str) -> ReadingRecord {
        ReadingRecord {
            id: uuid::Uuid::new_v4(),
            message_sid: sid.into(),
            sender: "+15550001111".into(),
            message: String::new(),
            meter_type: "electricity".into(),
            meter_number: None,
            media_urls: vec![],
            reading: Some(4821.0),
            confidence: 85.0,
            ocr_results: vec![],
            intent: ResponseIntent::HighConfidenceAccepted,
            status: ReadingStatus::Accepted,
            timestamp: chrono::Utc::now(),
        }
    }

    async fn body_json(resp: axum::response::Response) -> Value {
        let bytes = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    fn app(store: Arc<SqliteReadingStore>, media_dir: PathBuf) -> Router {
        build_router(Arc::new(AppState { store }), vec![], media_dir)
    }

    #[tokio::test]
    async fn health_reports_ok() {
        let store = Arc::new(SqliteReadingStore::in_memory().unwrap());
        let resp = app(store, PathBuf::from("media"))
            .oneshot(Request::get("/api/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let body = body_json(resp).await;
        assert_eq!(body["status"], "ok");
        assert_eq!(body["readings"], 0);
    }

    #[tokio::test]
    async fn readings_respect_limit() {
        let store = Arc::new(SqliteReadingStore::in_memory().unwrap());
        for sid in ["SM1", "SM2", "SM3"] {
            store.save(&record(sid)).await.unwrap();
        }
        let resp = app(store, PathBuf::from("media"))
            .oneshot(Request::get("/api/readings?limit=2").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let json = body_json(resp).await;
        assert_eq!(json["readings"].as_array().unwrap().len(), 2);
        assert_eq!(json["readings"][0]["reading"], 4821.0);
    }

    #[tokio::test]
    async fn stored_media_is_served() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("meters")).unwrap();
        std::fs::write(dir.path().join("meters/SM1_0.jpeg"), b"jpeg").unwrap();
        let store = Arc::new(SqliteReadingStore::in_memory().unwrap());
        let resp = app(store, dir.path().to_path_buf())
            .oneshot(Request::get("/media/meters/SM1_0.jpeg").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
    }
}
