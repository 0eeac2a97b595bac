//! API handlers.
//!
//! Thin mapping from HTTP requests onto [`RulesService`](crate::service::RulesService).

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::{header, StatusCode},
    response::IntoResponse,
    Json,
};
use serde::Serialize;

use crate::http::response::ApiError;
use crate::http::server::AppState;
use crate::rules::{Rule, RulePayload};
use crate::service::{SyncReport, ValidationReport};

type ApiResult<T> = Result<T, ApiError>;

pub async fn list_rules(State(state): State<AppState>) -> ApiResult<Json<Vec<Rule>>> {
    Ok(Json(state.rules.list().await?))
}

pub async fn get_rule(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<Rule>> {
    Ok(Json(state.rules.get(&id).await?))
}

pub async fn get_rule_yaml(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<impl IntoResponse> {
    let yaml = state.rules.get_yaml(&id).await?;
    Ok(([(header::CONTENT_TYPE, "text/yaml; charset=utf-8")], yaml))
}

pub async fn create_rule(
    State(state): State<AppState>,
    payload: Result<Json<RulePayload>, JsonRejection>,
) -> ApiResult<impl IntoResponse> {
    let Json(payload) = payload?;
    let rule = state.rules.create(payload).await?;
    Ok((StatusCode::CREATED, Json(rule)))
}

pub async fn update_rule(
    State(state): State<AppState>,
    Path(id): Path<String>,
    payload: Result<Json<RulePayload>, JsonRejection>,
) -> ApiResult<Json<Rule>> {
    let Json(payload) = payload?;
    Ok(Json(state.rules.update(&id, payload).await?))
}

pub async fn delete_rule(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<StatusCode> {
    state.rules.delete(&id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn validate_rule(
    State(state): State<AppState>,
    payload: Result<Json<RulePayload>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<ValidationReport>)> {
    let Json(payload) = payload?;
    let report = state.rules.validate(payload);
    let status = if report.valid {
        StatusCode::OK
    } else {
        StatusCode::BAD_REQUEST
    };
    Ok((status, Json(report)))
}

pub async fn list_middlewares(State(state): State<AppState>) -> ApiResult<Json<Vec<String>>> {
    Ok(Json(state.rules.middlewares().await?))
}

pub async fn resync(State(state): State<AppState>) -> ApiResult<Json<SyncReport>> {
    Ok(Json(state.rules.sync_from_disk().await?))
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthStatus {
    pub status: &'static str,
    pub dynamic_path: String,
}

pub async fn health(State(state): State<AppState>) -> (StatusCode, Json<HealthStatus>) {
    let dynamic_path = state.rules.dynamic_dir().display().to_string();
    if state.rules.dynamic_dir_accessible().await {
        (
            StatusCode::OK,
            Json(HealthStatus {
                status: "ok",
                dynamic_path,
            }),
        )
    } else {
        tracing::warn!(path = %dynamic_path, "Dynamic directory not accessible");
        (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(HealthStatus {
                status: "unavailable",
                dynamic_path,
            }),
        )
    }
}

#[derive(Serialize)]
pub struct ReadyStatus {
    pub ready: bool,
}

pub async fn ready(State(state): State<AppState>) -> (StatusCode, Json<ReadyStatus>) {
    let ready = state.readiness.is_ready();
    let status = if ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (status, Json(ReadyStatus { ready }))
}
