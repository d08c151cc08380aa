//! Integration tests for the viewer pages and the JSON/SVG API.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use attnscope_core::AppConfig;
use attnscope_ml::attention::AttentionTensor;
use attnscope_ml::{AttentionModel, Result};
use attnscope_ui::{AppState, router};
use axum::body::Body;
use axum::http::{Request, StatusCode};
use candle_core::{Device, Tensor};
use pretty_assertions::assert_eq;
use tower::ServiceExt;

/// Whitespace tokenizer with uniform attention and a call counter.
struct FakeModel {
    forward_calls: AtomicUsize,
}

impl AttentionModel for FakeModel {
    fn name(&self) -> &str {
        "fake-bert"
    }

    fn num_layers(&self) -> usize {
        12
    }

    fn num_heads(&self) -> usize {
        12
    }

    fn tokenize(&self, text: &str) -> Result<Vec<u32>> {
        Ok((0..text.split_whitespace().count() as u32 + 2).collect())
    }

    fn ids_to_tokens(&self, ids: &[u32]) -> Result<Vec<String>> {
        let last = ids.len() - 1;
        Ok(ids
            .iter()
            .map(|&id| match id as usize {
                0 => "[CLS]".to_string(),
                i if i == last => "[SEP]".to_string(),
                i => format!("w{i}"),
            })
            .collect())
    }

    fn forward(&self, ids: &[u32]) -> Result<AttentionTensor> {
        self.forward_calls.fetch_add(1, Ordering::SeqCst);
        let n = ids.len();
        let scores = Tensor::ones((12, 12, n, n), candle_core::DType::F32, &Device::Cpu)?;
        AttentionTensor::new((scores / n as f64)?)
    }
}

fn make_app() -> (axum::Router, Arc<FakeModel>) {
    let model = Arc::new(FakeModel {
        forward_calls: AtomicUsize::new(0),
    });
    let state = AppState::new(model.clone(), AppConfig::default()).unwrap();
    (router(state), model)
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

fn post_json(uri: &str, body: serde_json::Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(serde_json::to_string(&body).unwrap()))
        .unwrap()
}

async fn send(app: axum::Router, request: Request<Body>) -> (StatusCode, String, String) {
    let resp = ServiceExt::<Request<Body>>::oneshot(app, request)
        .await
        .unwrap();
    let status = resp.status();
    let content_type = resp
        .headers()
        .get("content-type")
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string();
    let body = axum::body::to_bytes(resp.into_body(), 10_000_000)
        .await
        .unwrap();
    (status, content_type, String::from_utf8(body.to_vec()).unwrap())
}

/// Number of SVG text nodes whose content is exactly `text`.
fn text_nodes(svg: &str, text: &str) -> usize {
    svg.lines().filter(|line| line.trim() == text).count()
}

// --- /health ---

#[tokio::test]
async fn health_reports_model_shape() {
    let (app, _) = make_app();
    let (status, _, body) = send(app, get("/health")).await;
    assert_eq!(status, StatusCode::OK);
    let json: serde_json::Value = serde_json::from_str(&body).unwrap();
    assert_eq!(json["status"], "ok");
    assert_eq!(json["model"], "fake-bert");
    assert_eq!(json["layers"], 12);
    assert_eq!(json["heads"], 12);
}

// --- / ---

#[tokio::test]
async fn viewer_without_trigger_only_shows_form() {
    let (app, model) = make_app();
    let (status, content_type, body) = send(app, get("/")).await;
    assert_eq!(status, StatusCode::OK);
    assert!(content_type.starts_with("text/html"));
    assert!(body.contains("The quick brown fox jumps over the lazy dog."));
    assert!(body.contains(r#"value="6""#));
    assert!(!body.contains("<svg"));
    assert_eq!(model.forward_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn viewer_with_trigger_renders_heatmap() {
    let (app, model) = make_app();
    let (status, _, body) = send(app, get("/?text=Apples%20are%20sweet.&layer=3&head=5&run=1")).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body.contains("<svg"));
    assert!(body.contains("Attention heatmap (layer 3, head 5)"));
    assert!(body.contains("Strongest targets"));
    assert_eq!(model.forward_calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn viewer_blank_text_warns_without_inference() {
    let (app, model) = make_app();
    let (status, _, body) = send(app, get("/?text=%20%20&layer=0&head=0&run=1")).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body.contains("Please enter a sentence to analyze."));
    assert!(!body.contains("<svg"));
    assert_eq!(model.forward_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn viewer_out_of_range_shows_error_box() {
    let (app, _) = make_app();
    let (status, _, body) = send(app, get("/?text=hello&layer=12&head=0&run=1")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body.contains("box error"));
    assert!(body.contains("Selection out of range"));
}

// --- /guide ---

#[tokio::test]
async fn guide_lists_examples() {
    let (app, _) = make_app();
    let (status, _, body) = send(app, get("/guide")).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body.contains("Pronoun resolution"));
    assert!(body.contains("Long-distance dependencies"));
    assert!(body.contains("The robot picked up the ball because it was heavy."));
}

// --- /api/attention ---

#[tokio::test]
async fn api_attention_returns_square_matrix() {
    let (app, _) = make_app();
    let request = post_json(
        "/api/attention",
        serde_json::json!({ "text": "Apples are sweet.", "layer": 6, "head": 0 }),
    );
    let (status, _, body) = send(app, request).await;
    assert_eq!(status, StatusCode::OK);
    let json: serde_json::Value = serde_json::from_str(&body).unwrap();
    let tokens = json["tokens"].as_array().unwrap();
    let matrix = json["matrix"].as_array().unwrap();
    assert_eq!(tokens.len(), 5);
    assert_eq!(matrix.len(), tokens.len());
    assert!(matrix.iter().all(|row| row.as_array().unwrap().len() == tokens.len()));
    assert_eq!(json["model"], "fake-bert");
    assert_eq!(json["strongest"].as_array().unwrap().len(), 5);
}

#[tokio::test]
async fn api_attention_blank_text_is_422_warning() {
    let (app, model) = make_app();
    let request = post_json(
        "/api/attention",
        serde_json::json!({ "text": "", "layer": 6, "head": 0 }),
    );
    let (status, _, body) = send(app, request).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    let json: serde_json::Value = serde_json::from_str(&body).unwrap();
    assert_eq!(json["warning"], "Please enter a sentence to analyze.");
    assert_eq!(model.forward_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn api_attention_bad_selection_is_400() {
    let (app, _) = make_app();
    let request = post_json(
        "/api/attention",
        serde_json::json!({ "text": "hello", "layer": 0, "head": 99 }),
    );
    let (status, _, body) = send(app, request).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body.contains("error"));
}

// --- /api/heatmap.svg ---

#[tokio::test]
async fn api_heatmap_serves_svg() {
    let (app, _) = make_app();
    let (status, content_type, body) =
        send(app, get("/api/heatmap.svg?text=one%20two&layer=1&head=1")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(content_type, "image/svg+xml");
    assert!(body.contains("<svg"));
    for label in ["[CLS]", "w1", "w2", "[SEP]"] {
        assert_eq!(text_nodes(&body, label), 2, "{label}");
    }
}

#[tokio::test]
async fn api_heatmap_blank_text_is_422() {
    let (app, _) = make_app();
    let (status, _, _) = send(app, get("/api/heatmap.svg?text=")).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
}

// --- /api/heads ---

#[tokio::test]
async fn api_heads_covers_every_head() {
    let (app, _) = make_app();
    let (status, _, body) = send(app, get("/api/heads?text=a%20b%20c")).await;
    assert_eq!(status, StatusCode::OK);
    let json: serde_json::Value = serde_json::from_str(&body).unwrap();
    let heads = json.as_array().unwrap();
    assert_eq!(heads.len(), 144);
    // uniform attention everywhere
    assert!(heads.iter().all(|h| h["pattern"] == "broad"));
}
