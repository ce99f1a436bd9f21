//! HTTP front end: process one document per request.
//!
//! ```text
//! GET /                         → {"status": "success"}
//! GET /process?file_path=<path> → {"Seller Name": "...", ...}
//!                               | {"error": "..."}
//! ```
//!
//! Every response is `200 OK`; failures are reported in the body. The
//! route extracts and returns the record but does not touch the CSV store.

use crate::process::Pipeline;
use axum::extract::{Query, State};
use axum::routing::get;
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::{json, Value};
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::{error, info};

/// Shared state for the web server.
#[derive(Clone)]
pub struct AppState {
    pub pipeline: Arc<Pipeline>,
}

impl AppState {
    pub fn new(pipeline: Pipeline) -> Self {
        Self {
            pipeline: Arc::new(pipeline),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct ProcessParams {
    pub file_path: Option<String>,
}

/// Create the router with all routes.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(health))
        .route("/process", get(process_file))
        .with_state(state)
}

/// Bind `addr` and serve until the process exits.
pub async fn serve(addr: SocketAddr, state: AppState) -> std::io::Result<()> {
    let app = create_router(state);
    info!("Starting server at http://{}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await
}

async fn health() -> Json<Value> {
    Json(json!({ "status": "success" }))
}

async fn process_file(
    State(state): State<AppState>,
    Query(params): Query<ProcessParams>,
) -> Json<Value> {
    let Some(file_path) = params.file_path.filter(|p| !p.trim().is_empty()) else {
        return Json(json!({ "error": "missing query parameter: file_path" }));
    };

    match state.pipeline.process_document(&file_path).await {
        Ok(processed) => match serde_json::to_value(&processed.record) {
            Ok(value) => Json(value),
            Err(e) => Json(json!({ "error": e.to_string() })),
        },
        Err(e) => {
            error!("{}", e);
            Json(json!({ "error": e.to_string() }))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PipelineError;
    use crate::pipeline::llm::{ModelRequest, TextModel};
    use crate::pipeline::ocr::{OcrPage, OcrProvider};
    use crate::{DocumentSchema, PipelineConfig};
    use async_trait::async_trait;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use tower::ServiceExt;

    struct OnePageOcr;

    #[async_trait]
    impl OcrProvider for OnePageOcr {
        fn name(&self) -> &str {
            "fake-ocr"
        }

        async fn analyze(&self, _bytes: &[u8]) -> Result<Vec<OcrPage>, PipelineError> {
            Ok(vec![OcrPage::new(1, ["Jane Roe, Buyer"])])
        }
    }

    struct JsonModel;

    #[async_trait]
    impl TextModel for JsonModel {
        fn name(&self) -> &str {
            "fake-model"
        }

        async fn complete(&self, request: &ModelRequest) -> Result<String, PipelineError> {
            if request.prompt.contains("<fields_to_extract>") {
                Ok(r#"{"Buyer Name": "Jane Roe"}"#.into())
            } else {
                Ok("Jane Roe, Buyer".into())
            }
        }
    }

    fn app() -> Router {
        let schema = DocumentSchema::new("DEED", ["Buyer Name", "Seller Name"]).unwrap();
        let pipeline = Pipeline::new(
            Arc::new(OnePageOcr),
            Arc::new(JsonModel),
            schema,
            PipelineConfig::default(),
        );
        create_router(AppState::new(pipeline))
    }

    async fn get_json(app: Router, uri: &str) -> (StatusCode, Value) {
        let response = app
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn health_reports_success() {
        let (status, body) = get_json(app(), "/").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({ "status": "success" }));
    }

    #[tokio::test]
    async fn process_returns_record() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("deed.pdf");
        std::fs::write(&file, b"%PDF-1.4").unwrap();

        let uri = format!("/process?file_path={}", file.display());
        let (status, body) = get_json(app(), &uri).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["Buyer Name"], "Jane Roe");
        assert_eq!(body["Seller Name"], "Not provided");
    }

    #[tokio::test]
    async fn process_missing_file_reports_error_with_200() {
        let (status, body) = get_json(app(), "/process?file_path=/no/such/deed.pdf").await;
        assert_eq!(status, StatusCode::OK);
        assert!(body["error"].as_str().unwrap().contains("deed.pdf"));
    }

    #[tokio::test]
    async fn process_without_path_reports_error() {
        let (_, body) = get_json(app(), "/process").await;
        assert!(body["error"].as_str().unwrap().contains("file_path"));
    }
}
