//! HTTP handlers: module submission, page serving, health.

use axum::{
    extract::{Path, State},
    http::{header, StatusCode},
    response::{Html, IntoResponse, Response},
    routing::{get, post},
    Form, Router,
};
use serde::Deserialize;
use std::sync::Arc;

use super::AppState;
use crate::adapters::script_host::render::render_page;
use crate::domain::ports::ModuleStore;
use crate::utils::error::RunnerError;

pub fn create_router<S: ModuleStore + 'static>(state: Arc<AppState<S>>) -> Router {
    Router::new()
        .route("/exec", post(exec_handler::<S>))
        .route("/health", get(health_handler))
        .route("/", get(index_handler::<S>))
        .route("/*path", get(page_handler::<S>))
        .with_state(state)
}

#[derive(Debug, Deserialize)]
pub struct ExecForm {
    pub code: Option<String>,
}

/// Turns submitted code into a live page and answers with its path.
async fn exec_handler<S: ModuleStore + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Form(form): Form<ExecForm>,
) -> Result<Response, ApiError> {
    let code = form.code.ok_or_else(|| {
        ApiError::BadRequest(
            RunnerError::MissingParameterError {
                field: "code".to_string(),
            }
            .to_string(),
        )
    })?;

    let mut service = state.service.lock().await;
    match service.submit(&code).await {
        Ok(route) => Ok((StatusCode::OK, route).into_response()),
        Err(failure) => {
            tracing::debug!(
                "Responding 500 for module {} ({} phase)",
                failure.module,
                failure.phase
            );
            Ok((StatusCode::INTERNAL_SERVER_ERROR, failure.trace).into_response())
        }
    }
}

async fn index_handler<S: ModuleStore + 'static>(
    State(state): State<Arc<AppState<S>>>,
) -> Result<Response, ApiError> {
    serve_page(&state, "/")
}

async fn page_handler<S: ModuleStore + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(path): Path<String>,
) -> Result<Response, ApiError> {
    serve_page(&state, &format!("/{}", path))
}

fn serve_page<S: ModuleStore>(state: &AppState<S>, path: &str) -> Result<Response, ApiError> {
    let page = state
        .host
        .page(path)
        .ok_or_else(|| ApiError::NotFound(format!("No page registered at {}", path)))?;

    Ok((
        [(header::CONTENT_SECURITY_POLICY, page.policy.frame_ancestors())],
        Html(render_page(&page)),
    )
        .into_response())
}

async fn health_handler() -> &'static str {
    "OK"
}

#[derive(Debug)]
pub enum ApiError {
    NotFound(String),
    BadRequest(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
        };

        tracing::debug!("API error: {} - {}", status, message);
        (status, message).into_response()
    }
}
