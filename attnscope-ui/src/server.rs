//! HTTP server built on axum.

use std::sync::Arc;

use attnscope_core::AppConfig;
use attnscope_ml::heatmap::HeatmapStyle;
use attnscope_ml::{
    AttentionModel, AttentionView, HeadSummary, ViewOutcome, ViewRequest, compute_head_summaries,
    compute_view,
};
use axum::extract::{Query, State};
use axum::http::{Request, StatusCode, header};
use axum::response::{Html, IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use tower_http::trace::TraceLayer;
use uuid::Uuid;

use crate::error::UiError;
use crate::pages::{Pages, ViewerPage};

/// Shared, read-only state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub model: Arc<dyn AttentionModel>,
    pub config: Arc<AppConfig>,
    pub pages: Arc<Pages>,
}

impl AppState {
    pub fn new(model: Arc<dyn AttentionModel>, config: AppConfig) -> Result<Self, UiError> {
        Ok(Self {
            model,
            config: Arc::new(config),
            pages: Arc::new(Pages::new()?),
        })
    }

    fn style(&self) -> HeatmapStyle {
        HeatmapStyle::from(&self.config.view)
    }

    fn max_layer(&self) -> usize {
        self.model.num_layers().saturating_sub(1)
    }

    fn max_head(&self) -> usize {
        self.model.num_heads().saturating_sub(1)
    }
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("model", &self.model.name())
            .field("config", &self.config)
            .finish()
    }
}

/// Build the router: pages, API and health check.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(viewer_handler))
        .route("/guide", get(guide_handler))
        .route("/api/attention", post(attention_handler))
        .route("/api/heatmap.svg", get(heatmap_handler))
        .route("/api/heads", get(heads_handler))
        .route("/health", get(health_handler))
        .layer(
            TraceLayer::new_for_http().make_span_with(|request: &Request<_>| {
                tracing::info_span!(
                    "request",
                    id = %Uuid::new_v4(),
                    method = %request.method(),
                    uri = %request.uri(),
                )
            }),
        )
        .with_state(state)
}

/// Bind `addr` and serve until ctrl-c.
pub async fn run(state: AppState, addr: &str) -> Result<(), UiError> {
    let app = router(state);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(addr = %listener.local_addr()?, "Serving attention viewer");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutting down");
}

/// Run the view pipeline off the async runtime.
async fn run_view(state: &AppState, request: ViewRequest) -> Result<ViewOutcome, UiError> {
    let model = Arc::clone(&state.model);
    let outcome = tokio::task::spawn_blocking(move || compute_view(model.as_ref(), &request)).await??;
    Ok(outcome)
}

async fn run_view_with_svg(
    state: &AppState,
    request: ViewRequest,
) -> Result<Option<(AttentionView, String)>, UiError> {
    match run_view(state, request).await? {
        ViewOutcome::Warning(_) => Ok(None),
        ViewOutcome::Ready(view) => {
            let style = state.style();
            let (view, svg) = tokio::task::spawn_blocking(move || {
                let svg = view.heatmap_svg(&style);
                (view, svg)
            })
            .await?;
            Ok(Some((view, svg?)))
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct ViewerQuery {
    text: Option<String>,
    layer: Option<usize>,
    head: Option<usize>,
    /// Set by the submit button; without it only the form is shown.
    run: Option<String>,
}

async fn viewer_handler(
    State(state): State<AppState>,
    Query(query): Query<ViewerQuery>,
) -> Result<Response, UiError> {
    let view_config = &state.config.view;
    let text = query
        .text
        .unwrap_or_else(|| view_config.default_text.clone());
    let layer = query.layer.unwrap_or(view_config.default_layer);
    let head = query.head.unwrap_or(view_config.default_head);

    let mut page = ViewerPage {
        model: state.model.name(),
        text: &text,
        layer,
        head,
        max_layer: state.max_layer(),
        max_head: state.max_head(),
        ..ViewerPage::default()
    };

    let mut status = StatusCode::OK;
    let result = if query.run.is_some() {
        Some(run_view_with_svg(&state, ViewRequest::new(text.as_str(), layer, head)).await)
    } else {
        None
    };
    match &result {
        None => {}
        Some(Ok(None)) => page.warning = Some(attnscope_ml::EMPTY_INPUT_WARNING),
        Some(Ok(Some((view, svg)))) => {
            page.view = Some(view);
            page.svg = Some(svg.clone());
        }
        Some(Err(e)) => {
            status = e.status_code();
            if status.is_server_error() {
                tracing::error!(error = %e, "Attention view failed");
            }
            page.error = Some(e.to_string());
        }
    }

    let html = state.pages.viewer(&page)?;
    Ok((status, Html(html)).into_response())
}

async fn guide_handler(State(state): State<AppState>) -> Result<Html<String>, UiError> {
    let html = state
        .pages
        .guide(state.model.name(), attnscope_core::examples())?;
    Ok(Html(html))
}

async fn attention_handler(
    State(state): State<AppState>,
    Json(request): Json<ViewRequest>,
) -> Result<Json<AttentionView>, UiError> {
    let view = run_view(&state, request).await?.into_view()?;
    Ok(Json(view))
}

#[derive(Debug, Deserialize)]
struct HeatmapQuery {
    text: String,
    layer: Option<usize>,
    head: Option<usize>,
}

async fn heatmap_handler(
    State(state): State<AppState>,
    Query(query): Query<HeatmapQuery>,
) -> Result<Response, UiError> {
    let request = ViewRequest::new(
        query.text,
        query.layer.unwrap_or(state.config.view.default_layer),
        query.head.unwrap_or(state.config.view.default_head),
    );
    match run_view_with_svg(&state, request).await? {
        Some((_, svg)) => Ok(([(header::CONTENT_TYPE, "image/svg+xml")], svg).into_response()),
        None => Err(UiError::Ml(attnscope_ml::MlError::EmptyInput)),
    }
}

#[derive(Debug, Deserialize)]
struct HeadsQuery {
    text: String,
}

async fn heads_handler(
    State(state): State<AppState>,
    Query(query): Query<HeadsQuery>,
) -> Result<Json<Vec<HeadSummary>>, UiError> {
    let model = Arc::clone(&state.model);
    let summaries =
        tokio::task::spawn_blocking(move || compute_head_summaries(model.as_ref(), &query.text))
            .await??;
    Ok(Json(summaries))
}

async fn health_handler(State(state): State<AppState>) -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "model": state.model.name(),
        "layers": state.model.num_layers(),
        "heads": state.model.num_heads(),
    }))
}
