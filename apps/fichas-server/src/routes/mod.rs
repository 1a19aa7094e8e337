//! Route modules for Fichas Server

pub mod fichas;
pub mod workspace;

use axum::{extract::State, routing::get, Json, Router};
use serde::Serialize;

use crate::error::AppError;
use crate::notify::Notification;
use crate::ocr::OcrProvider;
use crate::progress::Operation;
use crate::state::AppState;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
    ocr_providers: Vec<OcrProvider>,
}

async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
        ocr_providers: state.ocr().available_providers().await,
    })
}

/// Refusal for a request that collides with a running batch
pub(crate) fn busy(running: Operation) -> AppError {
    AppError::Busy(running.to_string())
}

/// Drain the notification feed
async fn drain_notifications(State(state): State<AppState>) -> Json<Vec<Notification>> {
    Json(state.notifier().drain())
}

/// Everything under `/api/v1`
pub fn api_router() -> Router<AppState> {
    Router::new()
        .route("/health", get(health_check))
        .route("/notifications", get(drain_notifications))
        .nest("/workspace", workspace::router())
        .nest("/fichas", fichas::router())
}

/// Full application router, without transport layers
pub fn app(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .nest("/api/v1", api_router())
        .with_state(state)
}

#[cfg(test)]
pub(crate) mod test_support {
    use std::sync::Arc;

    use axum::{
        body::{to_bytes, Body},
        http::{Request, StatusCode},
        Router,
    };
    use serde_json::Value;
    use tower::ServiceExt;

    use crate::config::Config;
    use crate::ocr::{MockProvider, OcrProviderTrait, OcrService};
    use crate::records::MockSink;
    use crate::state::AppState;
    use crate::storage::MockStore;

    pub const BOUNDARY: &str = "fichas-test-boundary";

    pub struct TestApp {
        pub state: AppState,
        pub store: Arc<MockStore>,
        pub sink: Arc<MockSink>,
        pub router: Router,
    }

    pub fn test_app(ocr_text: &str) -> TestApp {
        test_app_with(MockProvider::returning(ocr_text), MockStore::default())
    }

    /// App around a specific provider and store, e.g. slow ones
    pub fn test_app_with(provider: MockProvider, store: MockStore) -> TestApp {
        let store = Arc::new(store);
        let sink = Arc::new(MockSink::default());
        let ocr = OcrService::with_providers(
            vec![Arc::new(provider) as Arc<dyn OcrProviderTrait>],
            "por",
        );
        let state = AppState::with_services(Config::default(), ocr, store.clone(), sink.clone());
        TestApp {
            router: super::app(state.clone()),
            state,
            store,
            sink,
        }
    }

    /// multipart/form-data body with one `file` part per entry
    pub fn multipart_body(files: &[(&str, &str, Vec<u8>)]) -> Vec<u8> {
        let mut body = Vec::new();
        for (name, content_type, data) in files {
            body.extend_from_slice(
                format!(
                    "--{}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"{}\"\r\nContent-Type: {}\r\n\r\n",
                    BOUNDARY, name, content_type
                )
                .as_bytes(),
            );
            body.extend_from_slice(data);
            body.extend_from_slice(b"\r\n");
        }
        body.extend_from_slice(format!("--{}--\r\n", BOUNDARY).as_bytes());
        body
    }

    pub async fn send(router: &Router, request: Request<Body>) -> (StatusCode, Value) {
        let response = router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, json)
    }

    pub fn get_request(uri: &str) -> Request<Body> {
        Request::get(uri).body(Body::empty()).unwrap()
    }

    pub fn post_json(uri: &str, method: &str, json: Value) -> Request<Body> {
        Request::builder()
            .method(method)
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(json.to_string()))
            .unwrap()
    }

    /// Poll until `check` holds, for background tasks
    pub async fn wait_until(mut check: impl FnMut() -> bool) {
        for _ in 0..500 {
            if check() {
                return;
            }
            tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        }
        panic!("condition never became true");
    }

    pub fn upload(files: &[(&str, &str, Vec<u8>)]) -> Request<Body> {
        Request::post("/api/v1/workspace/images")
            .header(
                "content-type",
                format!("multipart/form-data; boundary={}", BOUNDARY),
            )
            .body(Body::from(multipart_body(files)))
            .unwrap()
    }
}

#[cfg(test)]
mod tests {
    use super::test_support::*;
    use axum::http::StatusCode;

    #[tokio::test]
    async fn test_health() {
        let app = test_app("");
        let (status, body) = send(&app.router, get_request("/api/v1/health")).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "healthy");
        assert_eq!(body["ocrProviders"][0], "tesseract");
    }

    #[tokio::test]
    async fn test_notifications_are_drained() {
        let app = test_app("");
        app.state.notifier().info("hello");

        let (_, first) = send(&app.router, get_request("/api/v1/notifications")).await;
        let (_, second) = send(&app.router, get_request("/api/v1/notifications")).await;

        assert_eq!(first[0]["message"], "hello");
        assert_eq!(second.as_array().unwrap().len(), 0);
    }
}
