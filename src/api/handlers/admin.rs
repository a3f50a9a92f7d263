//! Operator/admin-only endpoints (market pause/resume, signer enable/
//! disable): JWT-gated via `auth::auth_middleware` at the router layer,
//! RBAC-checked here against the claim's [`UserRole`].

use crate::api::state::AppState;
use crate::auth::models::{Claims, UserRole};
use crate::error::{EngineError, ValidationError};
use crate::market::MarketStatus;
use axum::extract::{Path, State};
use axum::{Extension, Json};
use serde::{Deserialize, Serialize};

fn require_role(claims: &Claims, allowed: &[UserRole]) -> Result<(), EngineError> {
    if allowed.contains(&claims.role) {
        Ok(())
    } else {
        Err(ValidationError::MethodNotAllowed(format!("role {} cannot perform this action", claims.role.as_str())).into())
    }
}

#[derive(Debug, Serialize)]
pub struct MarketStatusResponse {
    pub market_id: String,
    pub status: MarketStatus,
}

pub async fn pause_market(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(symbol): Path<String>,
) -> Result<Json<MarketStatusResponse>, EngineError> {
    require_role(&claims, &[UserRole::Admin, UserRole::Operator])?;
    let market = state
        .registry
        .get_by_symbol(&symbol)
        .ok_or_else(|| ValidationError::MarketNotAllowed(symbol.clone()))?;
    state.registry.transition(&market.market_id, MarketStatus::Paused)?;
    Ok(Json(MarketStatusResponse { market_id: market.market_id.clone(), status: MarketStatus::Paused }))
}

pub async fn resume_market(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(symbol): Path<String>,
) -> Result<Json<MarketStatusResponse>, EngineError> {
    require_role(&claims, &[UserRole::Admin, UserRole::Operator])?;
    let market = state
        .registry
        .get_by_symbol(&symbol)
        .ok_or_else(|| ValidationError::MarketNotAllowed(symbol.clone()))?;
    state.registry.transition(&market.market_id, MarketStatus::Active)?;
    Ok(Json(MarketStatusResponse { market_id: market.market_id.clone(), status: MarketStatus::Active }))
}

#[derive(Debug, Deserialize)]
pub struct SignerEnabledRequest {
    pub address: String,
    pub chain_id: u64,
    pub enabled: bool,
}

#[derive(Debug, Serialize)]
pub struct SignerEnabledResponse {
    pub updated: bool,
}

pub async fn set_signer_enabled(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<SignerEnabledRequest>,
) -> Result<Json<SignerEnabledResponse>, EngineError> {
    require_role(&claims, &[UserRole::Admin])?;
    let mut pool = state.signer_pool.lock().await;
    let updated = pool.set_enabled(&req.address, req.chain_id, req.enabled);
    Ok(Json(SignerEnabledResponse { updated }))
}

#[derive(Debug, Serialize)]
pub struct KillSwitchResponse {
    pub submission_allowed: bool,
}

pub async fn set_kill_switch(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(enabled): Json<bool>,
) -> Result<Json<KillSwitchResponse>, EngineError> {
    require_role(&claims, &[UserRole::Admin])?;
    if enabled {
        state.kill_switch.enable_submission();
    } else {
        state.kill_switch.disable_submission();
    }
    Ok(Json(KillSwitchResponse { submission_allowed: state.kill_switch.submission_allowed() }))
}
