//! HTTP analysis service.
//!
//! `POST /analyze` takes a multipart form with a `file` field holding the APK and returns its
//! JSON report. `GET /health` tells whether the classifier model is loaded. Every response body
//! is JSON, errors included.

use crate::{
    analyze_package, classifier::Classifier, config::Config, error::ErrorKind,
    has_apk_extension, results::AnalysisOutcome, sanitize_file_name, UPLOAD_SOURCE,
};
use anyhow::{Context, Result};
use axum::{
    extract::{
        multipart::{MultipartError, MultipartRejection},
        DefaultBodyLimit, Multipart, State,
    },
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use log::{debug, info, warn};
use serde::Serialize;
use std::{
    path::{Path, PathBuf},
    sync::Arc,
};
use tempfile::TempDir;
use tokio::{fs::File, io::AsyncWriteExt, net::TcpListener};
use tower_http::cors::CorsLayer;

/// Name of the form field carrying the package.
const FILE_FIELD: &str = "file";
/// Name given to uploads whose file name cannot be used.
const FALLBACK_FILE_NAME: &str = "upload.apk";

/// State shared by all the requests.
#[derive(Clone)]
pub struct ServerState {
    classifier: Option<Arc<dyn Classifier>>,
    upload_dir: Option<PathBuf>,
}

impl ServerState {
    /// Creates the state of the service.
    ///
    /// Uploads are stored in `upload_dir`, or in the system temporary directory if `None`.
    pub fn new(classifier: Option<Arc<dyn Classifier>>, upload_dir: Option<PathBuf>) -> Self {
        Self {
            classifier,
            upload_dir,
        }
    }

    fn create_upload_dir(&self) -> std::io::Result<TempDir> {
        let mut builder = tempfile::Builder::new();
        let _ = builder.prefix("apk-checker-");
        match &self.upload_dir {
            Some(dir) => builder.tempdir_in(dir),
            None => builder.tempdir(),
        }
    }
}

/// Error response of the service.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn internal<E: std::fmt::Display>(cause: E) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: format!("Analysis failed: {}", cause),
        }
    }

    fn from_multipart(error: MultipartError) -> Self {
        if error.status() == StatusCode::PAYLOAD_TOO_LARGE {
            Self {
                status: StatusCode::PAYLOAD_TOO_LARGE,
                message: "File too large".to_owned(),
            }
        } else {
            Self {
                status: StatusCode::BAD_REQUEST,
                message: format!("Invalid upload: {}", error.body_text()),
            }
        }
    }
}

impl From<ErrorKind> for ApiError {
    fn from(error: ErrorKind) -> Self {
        match error {
            ErrorKind::UploadValidation { message } => Self {
                status: StatusCode::BAD_REQUEST,
                message,
            },
            other => Self::internal(other),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        debug!("Request failed with {}: {}", self.status, self.message);
        (self.status, Json(AnalysisOutcome::error(self.message))).into_response()
    }
}

#[derive(Debug, Serialize)]
struct Health {
    status: &'static str,
    model_loaded: bool,
}

/// Builds the router of the service.
pub fn router(state: ServerState, max_upload_size: usize) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/analyze", post(analyze))
        .layer(DefaultBodyLimit::max(max_upload_size))
        .layer(CorsLayer::permissive())
        .with_state(Arc::new(state))
}

async fn health(State(state): State<Arc<ServerState>>) -> Json<Health> {
    Json(Health {
        status: "healthy",
        model_loaded: state.classifier.is_some(),
    })
}

async fn analyze(
    State(state): State<Arc<ServerState>>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<AnalysisOutcome>, ApiError> {
    let mut multipart =
        multipart.map_err(|_| ErrorKind::upload_validation("No file uploaded"))?;

    let mut upload = None;
    while let Some(mut field) = multipart
        .next_field()
        .await
        .map_err(ApiError::from_multipart)?
    {
        if field.name() != Some(FILE_FIELD) {
            continue;
        }

        let file_name = field.file_name().unwrap_or_default().to_owned();
        if file_name.is_empty() {
            return Err(ErrorKind::upload_validation("No file selected").into());
        }
        if !has_apk_extension(&file_name) {
            return Err(ErrorKind::upload_validation("File must be an APK").into());
        }
        let file_name =
            sanitize_file_name(&file_name).unwrap_or_else(|| FALLBACK_FILE_NAME.to_owned());

        let dir = state.create_upload_dir().map_err(ApiError::internal)?;
        let path = dir.path().join(&file_name);
        let mut file = File::create(&path).await.map_err(ApiError::internal)?;
        while let Some(chunk) = field.chunk().await.map_err(ApiError::from_multipart)? {
            file.write_all(&chunk).await.map_err(ApiError::internal)?;
        }
        file.flush().await.map_err(ApiError::internal)?;

        info!("Received {}", file_name);
        upload = Some((dir, path));
        break;
    }

    let (dir, path) = upload.ok_or_else(|| ErrorKind::upload_validation("No file uploaded"))?;
    let classifier = state.classifier.clone();
    let outcome = tokio::task::spawn_blocking(move || {
        let outcome = analyze_package(&path, UPLOAD_SOURCE, classifier.as_deref());
        drop(dir);
        outcome
    })
    .await
    .map_err(ApiError::internal)?;

    Ok(Json(outcome))
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Could not listen for the shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutting down");
}

/// Runs the service until it receives the interrupt signal.
pub async fn run(config: &Config, classifier: Option<Arc<dyn Classifier>>) -> Result<()> {
    let state = ServerState::new(classifier, config.upload_dir().map(Path::to_path_buf));
    let app = router(state, config.max_upload_size());

    let listener = TcpListener::bind(config.bind_address())
        .await
        .with_context(|| format!("could not listen on {}", config.bind_address()))?;
    info!("Listening on http://{}", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("the HTTP server failed")?;
    Ok(())
}

/// Runs the service on a new multi-threaded runtime, blocking the current thread.
pub fn serve(config: &Config, classifier: Option<Arc<dyn Classifier>>) -> Result<()> {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("could not start the async runtime")?;
    runtime.block_on(run(config, classifier))
}
