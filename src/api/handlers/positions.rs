//! `GET /positions/{trader}`.

use crate::api::state::AppState;
use crate::error::EngineError;
use crate::vault::{Position, VaultAccount};
use axum::extract::{Path, State};
use axum::Json;
use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct PositionsResponse {
    pub account: VaultAccount,
    pub positions: Vec<Position>,
}

/// A trader with no open actor (never deposited, never traded) has an empty
/// position set rather than a 404 — the trader namespace is not pre-registered.
pub async fn get_positions(
    State(state): State<AppState>,
    Path(trader): Path<String>,
) -> Result<Json<PositionsResponse>, EngineError> {
    match state.trader_handle(&trader).await {
        Some(handle) => match handle.snapshot().await {
            Some((account, positions)) => Ok(Json(PositionsResponse { account, positions })),
            None => Ok(Json(PositionsResponse { account: VaultAccount::new(trader), positions: Vec::new() })),
        },
        None => Ok(Json(PositionsResponse { account: VaultAccount::new(trader), positions: Vec::new() })),
    }
}
