mod common;

use apk_checker_core::{
    classifier::Classifier,
    server::{router, ServerState},
    static_analysis::features::FeatureVector,
};
use axum::{
    body::{to_bytes, Body},
    http::{Request, StatusCode},
};
use common::{certificate, ApkBuilder, V2_BLOCK_ID};
use serde_json::Value;
use std::sync::Arc;
use tower::ServiceExt;

const BOUNDARY: &str = "integration-boundary";

struct AlwaysSafe;

impl Classifier for AlwaysSafe {
    fn predict_proba(&self, _: &FeatureVector) -> anyhow::Result<[f64; 2]> {
        Ok([0.91234, 0.08766])
    }
}

fn upload(file_name: &str, content: &[u8]) -> Request<Body> {
    let mut body = format!(
        "--{b}\r\nContent-Disposition: form-data; name=\"comment\"\r\n\r\nignored\r\n\
         --{b}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"{f}\"\r\n\
         Content-Type: application/octet-stream\r\n\r\n",
        b = BOUNDARY,
        f = file_name
    )
    .into_bytes();
    body.extend_from_slice(content);
    body.extend_from_slice(format!("\r\n--{}--\r\n", BOUNDARY).as_bytes());

    Request::builder()
        .method("POST")
        .uri("/analyze")
        .header(
            "content-type",
            format!("multipart/form-data; boundary={}", BOUNDARY),
        )
        .body(Body::from(body))
        .unwrap()
}

#[tokio::test]
async fn it_analyzes_uploads() {
    let apk = ApkBuilder::new("com.example.bank")
        .permission("android.permission.SEND_SMS")
        .scheme_certificates(V2_BLOCK_ID, vec![certificate("Example Bank")])
        .build();
    let upload_dir = tempfile::tempdir().unwrap();
    let classifier: Arc<dyn Classifier> = Arc::new(AlwaysSafe);
    let app = router(
        ServerState::new(Some(classifier), Some(upload_dir.path().to_path_buf())),
        1024 * 1024,
    );

    let response = app.oneshot(upload("MyBank.apk", &apk)).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let json: Value = serde_json::from_slice(&body).unwrap();

    assert_eq!(json["source"], "upload");
    assert_eq!(json["apk_name"], "MyBank.apk");
    assert_eq!(json["package_name"], "com.example.bank");
    assert_eq!(json["size_bytes"], apk.len() as u64);
    assert_eq!(json["dangerous_permissions"][0], "android.permission.SEND_SMS");
    assert_eq!(json["certificates"][0]["subject"], "C=ES,CN=Example Bank");
    assert_eq!(json["verdict"], "Safe Banking APK");
    assert_eq!(json["confidence"]["safe"], 0.9123);
    assert_eq!(json["confidence"]["fake"], 0.0877);
    assert_eq!(json["risk_score"], 0.9123);

    // Uploads are removed once analyzed.
    assert_eq!(std::fs::read_dir(upload_dir.path()).unwrap().count(), 0);
}

#[tokio::test]
async fn it_strips_upload_directories() {
    let apk = ApkBuilder::new("com.example.bank").build();
    let app = router(ServerState::new(None, None), 1024 * 1024);

    let response = app
        .oneshot(upload("../../outside/bank.apk", &apk))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let json: Value = serde_json::from_slice(&body).unwrap();

    assert_eq!(json["apk_name"], "bank.apk");
    assert_eq!(json["verdict"], "Model not loaded");
}
