use super::AppState;
use super::caller::{optional_caller, require_caller};
use super::error::ApiError;
use crate::application::orchestrator::ContributionRequest;
use crate::domain::contribution::ContributionId;
use crate::domain::gateway::WebhookDelivery;
use crate::domain::pool::{NewPool, PoolId};
use crate::error::KotizError;
use axum::Json;
use axum::body::Bytes;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use serde::{Deserialize, Serialize};
use serde_json::json;

pub const SIGNATURE_HEADER: &str = "x-webhook-signature";

type ApiResult = std::result::Result<Response, ApiError>;

fn body<T>(payload: std::result::Result<Json<T>, JsonRejection>) -> Result<T, ApiError> {
    payload
        .map(|Json(value)| value)
        .map_err(|rejection| KotizError::Validation(rejection.body_text()).into())
}

fn ok<T: Serialize>(value: T) -> ApiResult {
    Ok(Json(value).into_response())
}

fn created<T: Serialize>(value: T) -> ApiResult {
    Ok((StatusCode::CREATED, Json(value)).into_response())
}

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
}

/// `GET /health`
pub async fn health() -> impl IntoResponse {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

#[derive(Debug, Deserialize)]
pub struct MethodsQuery {
    pub country: Option<String>,
}

/// `GET /payments/methods?country=SN`
pub async fn payment_methods(
    State(state): State<AppState>,
    Query(query): Query<MethodsQuery>,
) -> ApiResult {
    ok(state
        .orchestrator
        .payment_methods(query.country.as_deref())
        .await?)
}

/// `POST /pools`
pub async fn create_pool(
    State(state): State<AppState>,
    headers: HeaderMap,
    payload: std::result::Result<Json<NewPool>, JsonRejection>,
) -> ApiResult {
    let caller = require_caller(&headers)?;
    created(state.pools.create_pool(&caller, body(payload)?).await?)
}

/// `GET /pools/:id`
pub async fn get_pool(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<PoolId>,
) -> ApiResult {
    let caller = optional_caller(&headers)?;
    ok(state.pools.get_pool(id, caller.as_ref()).await?)
}

/// `POST /pools/:id/approve`
pub async fn approve_pool(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<PoolId>,
) -> ApiResult {
    let caller = require_caller(&headers)?;
    ok(state.pools.approve_pool(&caller, id).await?)
}

/// `POST /pools/:id/close`
pub async fn close_pool(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<PoolId>,
) -> ApiResult {
    let caller = require_caller(&headers)?;
    ok(state.pools.close_pool(&caller, id).await?)
}

/// `GET /pools/:id/contributions`
pub async fn pool_contributions(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<PoolId>,
) -> ApiResult {
    let caller = optional_caller(&headers)?;
    let contributions = state
        .pools
        .public_contributions(id, caller.as_ref())
        .await?;
    ok(json!({ "count": contributions.len(), "contributions": contributions }))
}

/// `GET /pools/:id/audit`
pub async fn audit_pool(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<PoolId>,
) -> ApiResult {
    let caller = require_caller(&headers)?;
    let audit = state.pools.audit_pool(&caller, id).await?;
    let consistent = audit.is_consistent();
    ok(json!({ "audit": audit, "consistent": consistent }))
}

/// `POST /contributions`
///
/// Guests may contribute; an identified caller is recorded as contributor.
pub async fn create_contribution(
    State(state): State<AppState>,
    headers: HeaderMap,
    payload: std::result::Result<Json<ContributionRequest>, JsonRejection>,
) -> ApiResult {
    let caller = optional_caller(&headers)?;
    let receipt = state
        .orchestrator
        .create_contribution(body(payload)?, caller.as_ref())
        .await?;
    created(receipt)
}

/// `GET /contributions/mine`
pub async fn my_contributions(State(state): State<AppState>, headers: HeaderMap) -> ApiResult {
    let caller = require_caller(&headers)?;
    let contributions = state.pools.my_contributions(&caller).await?;
    ok(json!({ "count": contributions.len(), "contributions": contributions }))
}

/// `GET /contributions/:id/status`
pub async fn contribution_status(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<ContributionId>,
) -> ApiResult {
    let caller = require_caller(&headers)?;
    ok(state.orchestrator.check_contribution_status(id, &caller).await?)
}

/// `POST /webhooks/payment`
///
/// Unknown references are acknowledged with `accepted: false` so the provider
/// stops retrying; authentication failures get a 400 and are retried.
pub async fn payment_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    raw: Bytes,
) -> ApiResult {
    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    let delivery = WebhookDelivery::new(raw.to_vec(), signature);

    match state.reconciler.handle_webhook(&delivery).await {
        Ok(ack) => ok(ack),
        Err(KotizError::NotFound(_)) => ok(json!({ "accepted": false })),
        Err(e) => Err(e.into()),
    }
}
