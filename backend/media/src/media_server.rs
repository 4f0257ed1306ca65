//! Local media server: serves stored meter photos over HTTP.
//!
//! Lets the public URLs handed out by [`FsMediaStore`](crate::FsMediaStore)
//! resolve when no CDN sits in front of the media directory.

use axum::{
    extract::{Path, State},
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use std::{path::PathBuf, sync::Arc};
use tokio::fs;
use tracing::{debug, warn};

use crate::fs_store::is_safe_key;
use crate::mime_detect::{detect_mime_type, is_inline_safe};

/// State shared by media server routes.
#[derive(Clone)]
pub struct MediaServerState {
    pub media_dir: Arc<PathBuf>,
}

/// Build the media server Axum router.
///
/// Mount with `nest("/media", ..)`:
///   GET /media/*key  serve a stored object
pub fn media_router(media_dir: PathBuf) -> Router {
    let state = MediaServerState {
        media_dir: Arc::new(media_dir),
    };
    Router::new()
        .route("/*key", get(serve_media))
        .with_state(state)
}

async fn serve_media(Path(key): Path<String>, State(state): State<MediaServerState>) -> Response {
    if !is_safe_key(&key) {
        warn!(key = %key, "Rejected suspicious media path");
        return (StatusCode::BAD_REQUEST, "Invalid media key").into_response();
    }

    let path = state.media_dir.join(&key);
    debug!(path = %path.display(), "Serving media file");

    match fs::read(&path).await {
        Ok(bytes) => {
            let mime = detect_mime_type(&path);
            let disposition = if is_inline_safe(mime) { "inline" } else { "attachment" };
            (
                StatusCode::OK,
                [
                    (header::CONTENT_TYPE, HeaderValue::from_static(mime)),
                    (header::CONTENT_DISPOSITION, HeaderValue::from_static(disposition)),
                    (header::CACHE_CONTROL, HeaderValue::from_static("public, max-age=86400")),
                ],
                bytes,
            )
                .into_response()
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            (StatusCode::NOT_FOUND, "Media file not found").into_response()
        }
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Failed to read media file");
            (StatusCode::INTERNAL_SERVER_ERROR, "Failed to read media").into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use tower::ServiceExt;

    #[tokio::test]
    async fn serves_nested_key() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("meters/2026/03")).unwrap();
        std::fs::write(dir.path().join("meters/2026/03/SM1_0.jpeg"), b"img").unwrap();

        let app = Router::new().nest("/media", media_router(dir.path().to_path_buf()));
        let resp = app
            .oneshot(
                Request::get("/media/meters/2026/03/SM1_0.jpeg")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(resp.headers()[header::CONTENT_TYPE], "image/jpeg");
    }

    #[tokio::test]
    async fn missing_file_is_404() {
        let dir = tempfile::tempdir().unwrap();
        let app = Router::new().nest("/media", media_router(dir.path().to_path_buf()));
        let resp = app
            .oneshot(Request::get("/media/nope.png").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }
}
