use axum::Router;
use axum::routing::get;
use tower_http::cors::CorsLayer;
use tower_http::services::{ServeDir, ServeFile};

use crate::config::ServerConfig;

pub const NOT_PRODUCTION_MESSAGE: &str = "Please set to production";

/// Build the router.
///
/// In production every file under `static_dir` is served and any other path
/// gets `index.html`, so client-side routes resolve. Otherwise only `GET /`
/// answers, with a diagnostic message.
pub fn router(config: &ServerConfig) -> Router {
    let app = if config.is_production() {
        let index = ServeFile::new(config.static_dir.join("index.html"));
        Router::new().fallback_service(ServeDir::new(&config.static_dir).fallback(index))
    } else {
        Router::new().route("/", get(not_production))
    };
    app.layer(CorsLayer::permissive())
}

async fn not_production() -> &'static str {
    NOT_PRODUCTION_MESSAGE
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PRODUCTION;
    use axum::body::{Body, to_bytes};
    use axum::http::{Request, StatusCode, header};
    use std::path::PathBuf;
    use tower::ServiceExt;

    fn site() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("index.html"), "<html>viewer</html>").unwrap();
        std::fs::create_dir_all(dir.path().join("uploads")).unwrap();
        std::fs::write(dir.path().join("uploads/doorPDraco.gltf"), "{}").unwrap();
        dir
    }

    fn config(mode: &str, static_dir: PathBuf) -> ServerConfig {
        ServerConfig {
            port: 5000,
            mode: mode.to_string(),
            static_dir,
        }
    }

    async fn get(app: Router, uri: &str) -> (StatusCode, String) {
        let response = app
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, String::from_utf8(body.to_vec()).unwrap())
    }

    #[tokio::test]
    async fn production_serves_static_files() {
        let dir = site();
        let app = router(&config(PRODUCTION, dir.path().to_path_buf()));
        let (status, body) = get(app, "/uploads/doorPDraco.gltf").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, "{}");
    }

    #[tokio::test]
    async fn production_falls_back_to_index() {
        let dir = site();
        let app = router(&config(PRODUCTION, dir.path().to_path_buf()));
        let (status, body) = get(app.clone(), "/").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, "<html>viewer</html>");

        let (status, body) = get(app, "/some/client/route").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, "<html>viewer</html>");
    }

    #[tokio::test]
    async fn development_answers_root_only() {
        let dir = site();
        let app = router(&config("development", dir.path().to_path_buf()));
        let (status, body) = get(app.clone(), "/").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, NOT_PRODUCTION_MESSAGE);

        let (status, _) = get(app, "/uploads/doorPDraco.gltf").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn cors_allows_any_origin() {
        let dir = site();
        let app = router(&config("development", dir.path().to_path_buf()));
        let response = app
            .oneshot(
                Request::builder()
                    .uri("/")
                    .header(header::ORIGIN, "http://example.com")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(
            response.headers().get(header::ACCESS_CONTROL_ALLOW_ORIGIN).unwrap(),
            "*"
        );
    }
}
