#![deny(unsafe_code)]

use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use presale_core::{
    AccessGate, AccountId, AllowAllGate, BasisPoints, Capability, PresaleConfig, PresaleEngine,
    PresaleError, PresaleEvent, PresaleStats, PurchaseOutcome, Receipt, ReferralInfo, StageId,
    StageInfo, StaticAccessGate, TokenAmount, UsdAmount, UserStats,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;
use uuid::Uuid;

/// Header naming the capability-checked caller of a mutating request.
pub const ACTOR_HEADER: &str = "x-actor";

#[derive(Debug, Clone, Default)]
pub struct ServiceConfig {
    pub recorder_actors: Vec<String>,
    pub stage_manager_actors: Vec<String>,
    pub finalizer_actors: Vec<String>,
    pub admin_actors: Vec<String>,
    /// Skip capability checks entirely. Meant for local development.
    pub allow_all: bool,
    pub limits: PresaleConfig,
}

#[derive(Clone)]
pub struct ServiceState {
    pub engine: Arc<PresaleEngine>,
}

impl ServiceState {
    pub fn bootstrap(config: ServiceConfig) -> Self {
        let gate: Arc<dyn AccessGate> = if config.allow_all {
            Arc::new(AllowAllGate)
        } else {
            let mut gate = StaticAccessGate::new();
            for actor in &config.recorder_actors {
                gate = gate.grant(actor.clone(), Capability::Recorder);
            }
            for actor in &config.stage_manager_actors {
                gate = gate.grant(actor.clone(), Capability::StageManager);
            }
            for actor in &config.finalizer_actors {
                gate = gate.grant(actor.clone(), Capability::Finalizer);
            }
            for actor in &config.admin_actors {
                gate = gate.grant(actor.clone(), Capability::Admin);
            }
            Arc::new(gate)
        };

        Self {
            engine: Arc::new(PresaleEngine::new(config.limits, gate)),
        }
    }
}

pub fn build_router(state: ServiceState) -> Router {
    Router::new()
        .route("/v1/health", get(health))
        .route("/v1/purchases", post(record_purchase))
        .route("/v1/stages", post(configure_stage))
        .route("/v1/stages/current", get(get_current_stage))
        .route("/v1/stages/:stage_id", get(get_stage))
        .route("/v1/stages/:stage_id/activate", post(activate_stage))
        .route("/v1/stats", get(get_stats))
        .route("/v1/users/:account/stats", get(get_account_stats))
        .route("/v1/users/:account/receipts", get(list_account_receipts))
        .route("/v1/users/:account/referral", get(get_account_referral))
        .route("/v1/lifecycle/pause", post(pause_presale))
        .route("/v1/lifecycle/unpause", post(unpause_presale))
        .route("/v1/lifecycle/finalize", post(finalize_presale))
        .route("/v1/promo/max-bps", post(set_max_promo_bps))
        .with_state(state)
}

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{message}")]
    Http { status: StatusCode, message: String },
    #[error(transparent)]
    Core(#[from] PresaleError),
}

impl ApiError {
    fn not_found(message: impl Into<String>) -> Self {
        Self::Http {
            status: StatusCode::NOT_FOUND,
            message: message.into(),
        }
    }

    fn bad_request(message: impl Into<String>) -> Self {
        Self::Http {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
        }
    }
}

/// Input and referral mistakes are the caller's (400), capacity and
/// lifecycle refusals describe ledger state (409), capability refusals
/// are 403, arithmetic and lock faults are the service's own (500).
fn core_status(error: &PresaleError) -> StatusCode {
    match error {
        PresaleError::InvalidAddress
        | PresaleError::InvalidAmount
        | PresaleError::InvalidPromoBps { .. }
        | PresaleError::InvalidPrice
        | PresaleError::InvalidUsdTarget
        | PresaleError::PriceMismatch { .. }
        | PresaleError::InvalidReferrer
        | PresaleError::SelfReferral
        | PresaleError::InvalidStage(_) => StatusCode::BAD_REQUEST,
        PresaleError::ExceedsMaxPurchase { .. }
        | PresaleError::ExceedsTotalLimit { .. }
        | PresaleError::InsufficientStageTokens { .. }
        | PresaleError::PresaleTokenCapExceeded { .. }
        | PresaleError::StageUsdOverTarget { .. }
        | PresaleError::StageNotActive
        | PresaleError::StageAlreadyActive(_)
        | PresaleError::StageAlreadyUsed(_)
        | PresaleError::PresaleFinalised
        | PresaleError::PresalePaused => StatusCode::CONFLICT,
        PresaleError::Unauthorized(_) => StatusCode::FORBIDDEN,
        PresaleError::Overflow(_) | PresaleError::Internal(_) => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::Http { status, message } => {
                (status, Json(serde_json::json!({ "error": message }))).into_response()
            }
            ApiError::Core(err) => (
                core_status(&err),
                Json(serde_json::json!({ "error": err.to_string() })),
            )
                .into_response(),
        }
    }
}

fn require_actor(headers: &HeaderMap) -> Result<AccountId, ApiError> {
    let actor = headers
        .get(ACTOR_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .ok_or_else(|| ApiError::bad_request(format!("{} header is required", ACTOR_HEADER)))?;
    Ok(AccountId::new(actor))
}

#[derive(Debug, Clone, Serialize)]
struct HealthResponse {
    status: &'static str,
    service: &'static str,
    current_stage: Option<StageId>,
}

async fn health(State(state): State<ServiceState>) -> Result<Json<HealthResponse>, ApiError> {
    Ok(Json(HealthResponse {
        status: "ok",
        service: "presale-service",
        current_stage: state.engine.presale_stats()?.current_stage,
    }))
}

#[derive(Debug, Clone, Deserialize)]
struct PurchaseBody {
    buyer: String,
    usd: UsdAmount,
    tokens: TokenAmount,
    referrer: Option<String>,
    promo_bps: Option<BasisPoints>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct PurchaseResponse {
    trace_id: String,
    outcome: PurchaseOutcome,
}

async fn record_purchase(
    State(state): State<ServiceState>,
    headers: HeaderMap,
    Json(body): Json<PurchaseBody>,
) -> Result<Json<PurchaseResponse>, ApiError> {
    let actor = require_actor(&headers)?;
    let buyer = AccountId::new(body.buyer);
    let referrer = body.referrer.map(AccountId::new);

    let outcome = match (body.promo_bps, referrer) {
        (None, None) => state
            .engine
            .record_purchase(&actor, buyer, body.usd, body.tokens)?,
        (Some(bps), None) => {
            state
                .engine
                .record_purchase_with_promo(&actor, buyer, body.usd, body.tokens, bps)?
        }
        (None, Some(referrer)) => {
            state
                .engine
                .record_purchase_with_referral(&actor, buyer, body.usd, body.tokens, referrer)?
        }
        (Some(bps), Some(referrer)) => state.engine.record_purchase_with_promo_and_referral(
            &actor,
            buyer,
            body.usd,
            body.tokens,
            bps,
            referrer,
        )?,
    };

    Ok(Json(PurchaseResponse {
        trace_id: Uuid::new_v4().to_string(),
        outcome,
    }))
}

#[derive(Debug, Clone, Deserialize)]
struct ConfigureStageBody {
    stage_id: StageId,
    price_per_token: UsdAmount,
    tokens_allocated: TokenAmount,
    usd_target: UsdAmount,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct AdminResponse {
    trace_id: String,
    events: Vec<PresaleEvent>,
}

impl AdminResponse {
    fn new(events: Vec<PresaleEvent>) -> Self {
        Self {
            trace_id: Uuid::new_v4().to_string(),
            events,
        }
    }
}

async fn configure_stage(
    State(state): State<ServiceState>,
    headers: HeaderMap,
    Json(body): Json<ConfigureStageBody>,
) -> Result<Json<AdminResponse>, ApiError> {
    let actor = require_actor(&headers)?;
    let events = state.engine.configure_stage(
        &actor,
        body.stage_id,
        body.price_per_token,
        body.tokens_allocated,
        body.usd_target,
    )?;
    Ok(Json(AdminResponse::new(events)))
}

async fn activate_stage(
    Path(stage_id): Path<StageId>,
    State(state): State<ServiceState>,
    headers: HeaderMap,
) -> Result<Json<AdminResponse>, ApiError> {
    let actor = require_actor(&headers)?;
    let events = state.engine.activate_stage(&actor, stage_id)?;
    Ok(Json(AdminResponse::new(events)))
}

async fn get_current_stage(
    State(state): State<ServiceState>,
) -> Result<Json<StageInfo>, ApiError> {
    state
        .engine
        .current_stage_info()?
        .map(Json)
        .ok_or_else(|| ApiError::not_found("no stage is currently active"))
}

async fn get_stage(
    Path(stage_id): Path<StageId>,
    State(state): State<ServiceState>,
) -> Result<Json<StageInfo>, ApiError> {
    state
        .engine
        .stage_info(stage_id)?
        .map(Json)
        .ok_or_else(|| ApiError::not_found(format!("stage {} is not configured", stage_id)))
}

async fn get_stats(State(state): State<ServiceState>) -> Result<Json<PresaleStats>, ApiError> {
    Ok(Json(state.engine.presale_stats()?))
}

async fn get_account_stats(
    Path(account): Path<String>,
    State(state): State<ServiceState>,
) -> Result<Json<UserStats>, ApiError> {
    Ok(Json(state.engine.user_stats(&AccountId::new(account))?))
}

#[derive(Debug, Clone, Deserialize)]
struct ReceiptsQuery {
    offset: Option<usize>,
    limit: Option<usize>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct ReceiptsResponse {
    account: String,
    total: usize,
    returned: usize,
    items: Vec<Receipt>,
}

async fn list_account_receipts(
    Path(account): Path<String>,
    State(state): State<ServiceState>,
    Query(query): Query<ReceiptsQuery>,
) -> Result<Json<ReceiptsResponse>, ApiError> {
    let account = AccountId::new(account);
    let total = state.engine.receipt_count(&account)?;
    let offset = query.offset.unwrap_or(0);
    let limit = query.limit.unwrap_or(100).min(1000);
    let items = state.engine.receipts_paginated(&account, offset, limit)?;
    let returned = items.len();

    Ok(Json(ReceiptsResponse {
        account: account.0,
        total,
        returned,
        items,
    }))
}

async fn get_account_referral(
    Path(account): Path<String>,
    State(state): State<ServiceState>,
) -> Result<Json<ReferralInfo>, ApiError> {
    Ok(Json(state.engine.referral_info(&AccountId::new(account))?))
}

async fn pause_presale(
    State(state): State<ServiceState>,
    headers: HeaderMap,
) -> Result<Json<AdminResponse>, ApiError> {
    let actor = require_actor(&headers)?;
    Ok(Json(AdminResponse::new(state.engine.pause(&actor)?)))
}

async fn unpause_presale(
    State(state): State<ServiceState>,
    headers: HeaderMap,
) -> Result<Json<AdminResponse>, ApiError> {
    let actor = require_actor(&headers)?;
    Ok(Json(AdminResponse::new(state.engine.unpause(&actor)?)))
}

async fn finalize_presale(
    State(state): State<ServiceState>,
    headers: HeaderMap,
) -> Result<Json<AdminResponse>, ApiError> {
    let actor = require_actor(&headers)?;
    Ok(Json(AdminResponse::new(state.engine.finalize(&actor)?)))
}

#[derive(Debug, Clone, Deserialize)]
struct MaxPromoBody {
    max_promo_bps: BasisPoints,
}

async fn set_max_promo_bps(
    State(state): State<ServiceState>,
    headers: HeaderMap,
    Json(body): Json<MaxPromoBody>,
) -> Result<Json<AdminResponse>, ApiError> {
    let actor = require_actor(&headers)?;
    Ok(Json(AdminResponse::new(
        state.engine.set_max_promo_bps(&actor, body.max_promo_bps)?,
    )))
}
