use std::{collections::HashMap, sync::Arc, time::Duration};

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    routing::get,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::engine::{
    error::EngineError,
    lifecycle::SubmissionService,
    metrics::MetricsRegistry,
    models::{CreateSubmissionRequest, Submission},
};

const DEFAULT_WAIT: Duration = Duration::from_secs(10);
const MAX_WAIT: Duration = Duration::from_secs(30);

#[derive(Clone)]
pub struct AppState {
    api_keys: Arc<HashMap<String, String>>,
    service: SubmissionService,
    metrics: Arc<MetricsRegistry>,
}

pub fn routes(
    api_keys: HashMap<String, String>,
    service: SubmissionService,
    metrics_registry: Arc<MetricsRegistry>,
) -> Router {
    let state = AppState {
        api_keys: Arc::new(api_keys),
        service,
        metrics: metrics_registry,
    };
    Router::new()
        .route("/healthz", get(health))
        .route("/metrics", get(metrics))
        .route(
            "/v1/submissions",
            get(list_submissions).post(create_submission),
        )
        .route("/v1/submissions/{id}", get(get_submission))
        .route("/v1/submissions/{id}/wait", get(wait_submission))
        .with_state(state)
}

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "ok": true }))
}

async fn metrics(State(state): State<AppState>) -> (StatusCode, String) {
    (StatusCode::OK, state.metrics.render_prometheus())
}

async fn create_submission(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<CreateSubmissionRequest>,
) -> Result<(StatusCode, Json<Submission>), EngineError> {
    let user_id = authenticate(&state, &headers)?;
    let submission = state.service.create(request, &user_id).await?;
    Ok((StatusCode::ACCEPTED, Json(submission)))
}

async fn list_submissions(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<Vec<Submission>>, EngineError> {
    let user_id = authenticate(&state, &headers)?;
    Ok(Json(state.service.list_by_user(&user_id).await))
}

async fn get_submission(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
) -> Result<Json<Submission>, EngineError> {
    let user_id = authenticate(&state, &headers)?;
    Ok(Json(load_for_user(&state, id, &user_id).await?))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WaitQuery {
    timeout_ms: Option<u64>,
}

/// Long-poll variant of `get_submission`: answers as soon as the verdict is
/// in, or with the current record once the timeout elapses.
async fn wait_submission(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
    Query(query): Query<WaitQuery>,
) -> Result<Json<Submission>, EngineError> {
    let user_id = authenticate(&state, &headers)?;
    let record = load_for_user(&state, id, &user_id).await?;
    if record.status.is_terminal() {
        return Ok(Json(record));
    }

    let limit = query
        .timeout_ms
        .map(Duration::from_millis)
        .unwrap_or(DEFAULT_WAIT)
        .min(MAX_WAIT);
    if let Some(mut rx) = state.service.store().watch(&id) {
        let terminal = async move {
            loop {
                if rx.borrow_and_update().is_terminal() {
                    break;
                }
                if rx.changed().await.is_err() {
                    break;
                }
            }
        };
        let _ = tokio::time::timeout(limit, terminal).await;
    }

    Ok(Json(state.service.get(&id).await?))
}

fn authenticate(state: &AppState, headers: &HeaderMap) -> Result<String, EngineError> {
    let key = headers
        .get("x-api-key")
        .and_then(|v| v.to_str().ok())
        .ok_or(EngineError::Unauthorized)?;
    for (candidate_key, user_id) in state.api_keys.iter() {
        if constant_time_eq(key.as_bytes(), candidate_key.as_bytes()) {
            return Ok(user_id.clone());
        }
    }
    Err(EngineError::Unauthorized)
}

async fn load_for_user(
    state: &AppState,
    id: Uuid,
    user_id: &str,
) -> Result<Submission, EngineError> {
    let record = state.service.get(&id).await?;
    if record.user_id != user_id {
        return Err(EngineError::Forbidden);
    }
    Ok(record)
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut out = 0u8;
    for (l, r) in a.iter().zip(b.iter()) {
        out |= l ^ r;
    }
    out == 0
}
