//! `POST /session/init` and `POST /session/revoke`.

use crate::api::state::AppState;
use crate::error::{ConflictError, EngineError, ValidationError};
use crate::fixed::Fixed18;
use crate::gateway::eip712::{parse_address, recover_and_verify, SessionPermitTypedMessage, SessionRevokeTypedMessage};
use crate::gateway::session::Session;
use axum::extract::State;
use axum::Json;
use ethers_core::types::{H256, U256};
use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize)]
pub struct SessionPermitPayload {
    pub trader: String,
    pub relayer_set_root: String,
    pub expiry: i64,
    pub max_notional_per_trade: Fixed18,
    pub max_notional_per_session: Fixed18,
    pub methods_bitmap: u64,
    pub salt: String,
    pub nonce: u64,
}

#[derive(Debug, Deserialize)]
pub struct SessionInitRequest {
    pub permit: SessionPermitPayload,
    pub signature: String,
}

#[derive(Debug, Serialize)]
pub struct SessionInitResponse {
    pub session_id: String,
    pub expiry: i64,
}

fn parse_h256(s: &str) -> Option<H256> {
    let bytes = hex::decode(s.trim_start_matches("0x")).ok()?;
    if bytes.len() != 32 {
        return None;
    }
    Some(H256::from_slice(&bytes))
}

/// Verifies a `SessionPermit` signature, checks the relayer set root against
/// the operator-configured allowlist, and opens a session with a fresh
/// notional budget.
pub async fn init_session(
    State(state): State<AppState>,
    Json(req): Json<SessionInitRequest>,
) -> Result<Json<SessionInitResponse>, EngineError> {
    let permit = &req.permit;
    let trader_addr = parse_address(&permit.trader).ok_or(ValidationError::InvalidSignature)?;
    let relayer_set_root =
        parse_h256(&permit.relayer_set_root).ok_or(ValidationError::InvalidSignature)?;
    let salt = parse_h256(&permit.salt).ok_or(ValidationError::InvalidSignature)?;

    if !state.relayer_set_roots.iter().any(|r| r == &permit.relayer_set_root) {
        return Err(ValidationError::MethodNotAllowed("unknown relayer set root".into()).into());
    }

    let typed = SessionPermitTypedMessage {
        trader: trader_addr,
        relayer_set_root,
        expiry: U256::from(permit.expiry.max(0) as u64),
        max_notional_per_trade: U256::from(permit.max_notional_per_trade.raw().max(0) as u128),
        max_notional_per_session: U256::from(permit.max_notional_per_session.raw().max(0) as u128),
        methods_bitmap: U256::from(permit.methods_bitmap),
        salt,
        nonce: U256::from(permit.nonce),
    };
    let digest = typed.digest(&state.eip712_domain);
    recover_and_verify(digest, &req.signature, trader_addr).map_err(|_| ValidationError::InvalidSignature)?;

    let session_id = format!("{:#x}", typed.session_id());
    let session = Session {
        session_id: session_id.clone(),
        trader: permit.trader.clone(),
        relayer_set_root: permit.relayer_set_root.clone(),
        expiry: permit.expiry,
        max_notional_per_trade: permit.max_notional_per_trade,
        max_notional_per_session: permit.max_notional_per_session,
        notional_used: Fixed18::ZERO,
        methods_bitmap: permit.methods_bitmap,
        revoked: false,
    };

    let mut sessions = state.sessions.lock().await;
    if sessions.contains_key(&session_id) {
        return Err(ConflictError::SessionRevoked(session_id).into());
    }
    sessions.insert(session_id.clone(), session);

    Ok(Json(SessionInitResponse { session_id, expiry: permit.expiry }))
}

#[derive(Debug, Deserialize)]
pub struct SessionRevokeRequest {
    pub session_id: String,
    pub trader: String,
    pub signature: String,
    pub deadline: i64,
    pub nonce: u64,
}

#[derive(Debug, Serialize)]
pub struct SessionRevokeResponse {
    pub session_id: String,
    pub revoked: bool,
}

/// Revokes a session by the trader's own EIP-712 signature over its id.
/// Idempotent: revoking an already-revoked session succeeds.
pub async fn revoke_session(
    State(state): State<AppState>,
    Json(req): Json<SessionRevokeRequest>,
) -> Result<Json<SessionRevokeResponse>, EngineError> {
    let trader_addr = parse_address(&req.trader).ok_or(ValidationError::InvalidSignature)?;
    let session_id_hash = parse_h256(&req.session_id).ok_or(ValidationError::InvalidSignature)?;
    let typed = SessionRevokeTypedMessage {
        trader: trader_addr,
        session_id: session_id_hash,
        deadline: U256::from(req.deadline.max(0) as u64),
        nonce: U256::from(req.nonce),
    };
    let digest = typed.digest(&state.eip712_domain);
    recover_and_verify(digest, &req.signature, trader_addr).map_err(|_| ValidationError::InvalidSignature)?;

    let mut sessions = state.sessions.lock().await;
    match sessions.get_mut(&req.session_id) {
        Some(session) => {
            session.revoke();
            Ok(Json(SessionRevokeResponse { session_id: req.session_id.clone(), revoked: true }))
        }
        None => Ok(Json(SessionRevokeResponse { session_id: req.session_id.clone(), revoked: true })),
    }
}
