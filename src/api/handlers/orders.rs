//! `POST /orders` and `POST /orders/cancel`: a body extractor, a chain of
//! `?`-propagated domain checks, and a `Json` response built from the
//! handle's result.

use crate::api::state::AppState;
use crate::book::types::{Order, OrderStatus, OrderType, Side, TimeInForce};
use crate::error::{ConflictError, EngineError, FatalError, ValidationError};
use crate::fixed::Fixed18;
use crate::gateway::eip712::{parse_address, recover_and_verify, CancelTypedMessage, ModifyTypedMessage, OrderTypedMessage};
use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use ethers_core::types::{H256, U256};
use ethers_core::utils::keccak256;
use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize)]
pub struct OrderPayload {
    pub trader: String,
    pub market_id: String,
    pub side: Side,
    pub order_type: OrderType,
    pub qty: Fixed18,
    pub price: Option<Fixed18>,
    pub stop_price: Option<Fixed18>,
    pub display_qty: Option<Fixed18>,
    pub tif: TimeInForce,
    pub post_only: bool,
    pub min_price: Option<Fixed18>,
    pub max_price: Option<Fixed18>,
    pub deadline: i64,
    pub nonce: u64,
}

#[derive(Debug, Deserialize)]
pub struct OrderSubmitRequest {
    pub order: OrderPayload,
    pub signature: String,
}

#[derive(Debug, Serialize)]
pub struct OrderSubmitResponse {
    pub order_id: u128,
}

fn market_struct_hash(market_id: &str) -> H256 {
    H256(keccak256(market_id.as_bytes()))
}

/// Verifies the order's EIP-712 signature against the claimed trader.
fn verify_order_signature(
    state: &AppState,
    payload: &OrderPayload,
    signature: &str,
) -> Result<ethers_core::types::Address, EngineError> {
    let trader_addr = parse_address(&payload.trader)
        .ok_or(EngineError::Validation(ValidationError::InvalidSignature))?;

    let typed = OrderTypedMessage {
        trader: trader_addr,
        market: market_struct_hash(&payload.market_id),
        side: match payload.side {
            Side::Buy => 0,
            Side::Sell => 1,
        },
        qty: U256::from(payload.qty.raw().max(0) as u128),
        price: U256::from(payload.price.map(|p| p.raw().max(0) as u128).unwrap_or(0)),
        deadline: U256::from(payload.deadline.max(0) as u64),
        nonce: U256::from(payload.nonce),
    };
    let digest = typed.digest(&state.eip712_domain);
    recover_and_verify(digest, signature, trader_addr)
        .map_err(|_| ValidationError::InvalidSignature)?;
    Ok(trader_addr)
}

/// Accepts a signed order: verifies the signature, enforces the trader's
/// strictly-monotonic nonce, checks gateway policy (market allowlist,
/// notional cap, tick/lot alignment), then routes the order to its market's
/// book actor. Returns 202 with the assigned order id on acceptance.
pub async fn submit_order(
    State(state): State<AppState>,
    Json(req): Json<OrderSubmitRequest>,
) -> Result<(StatusCode, Json<OrderSubmitResponse>), EngineError> {
    let payload = &req.order;
    verify_order_signature(&state, payload, &req.signature)?;

    if let crate::gateway::policy::RateLimitResult::Exceeded { .. } =
        state.rate_limiter.check_trader(&payload.trader)
    {
        return Err(ValidationError::MethodNotAllowed("rate limited".into()).into());
    }

    {
        let mut nonces = state.nonces.lock().await;
        nonces.check_and_increment(&payload.trader, payload.nonce)?;
    }

    if !state.policy.allows_market(&payload.market_id) {
        return Err(ValidationError::MarketNotAllowed(payload.market_id.clone()).into());
    }

    let market = state
        .registry
        .get(&payload.market_id)
        .ok_or_else(|| ValidationError::MarketNotAllowed(payload.market_id.clone()))?;
    if !market.is_tradeable() {
        return Err(ValidationError::MarketNotAllowed(payload.market_id.clone()).into());
    }
    if let Some(price) = payload.price {
        if !market.is_tick_aligned(price) {
            return Err(ValidationError::InvalidPrice("not tick-aligned".into()).into());
        }
    }
    if !market.is_lot_aligned(payload.qty) {
        return Err(ValidationError::InvalidQty("not lot-aligned".into()).into());
    }

    let notional = payload.price.unwrap_or(market.mark_price).checked_mul(payload.qty).unwrap_or(Fixed18::ZERO);
    if !state.policy.allows_notional(notional) {
        return Err(ValidationError::InvalidQty("exceeds max order notional".into()).into());
    }

    let book = state
        .get_or_spawn_book(&payload.market_id)
        .await
        .ok_or_else(|| FatalError::BookInvariantBroken(format!("no book actor for {}", payload.market_id)))?;
    state.get_or_spawn_trader(&payload.trader).await;

    let now = chrono::Utc::now().timestamp();
    let order_id = state.next_order_id();
    let order = Order {
        order_id,
        trader: payload.trader.clone(),
        market_id: payload.market_id.clone(),
        side: payload.side,
        order_type: payload.order_type,
        qty: payload.qty,
        filled_qty: Fixed18::ZERO,
        price: payload.price,
        stop_price: payload.stop_price,
        display_qty: payload.display_qty,
        tif: payload.tif,
        post_only: payload.post_only,
        min_price: payload.min_price,
        max_price: payload.max_price,
        status: OrderStatus::Pending,
        created_ts: now,
        updated_ts: now,
    };

    let outcome = book.insert(order, now).await?;
    crate::execution::settle_fills(&state.registry, &state.traders, &state.config.toml.treasury_address, &outcome.fills)
        .await?;
    Ok((StatusCode::ACCEPTED, Json(OrderSubmitResponse { order_id })))
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum OrderCancelRequest {
    Direct {
        order_id: u128,
        trader: String,
        signature: String,
        deadline: i64,
        nonce: u64,
    },
    Session {
        session_id: String,
        order_id: u128,
        relayer: String,
        proof: Vec<String>,
    },
}

#[derive(Debug, Serialize)]
pub struct OrderCancelResponse {
    pub order_id: u128,
    pub status: OrderStatus,
}

/// Cancels a resting order either by the trader's own signature or by a
/// relayer proven to be in the session's `relayer_set_root`. The gateway
/// does not keep an order-id-to-market index (orders are addressed by id
/// alone per the external contract), so cancellation probes every live book
/// in turn; with a modest number of markets this is cheap relative to the
/// network round trip that produced the request.
pub async fn cancel_order(
    State(state): State<AppState>,
    Json(req): Json<OrderCancelRequest>,
) -> Result<Json<OrderCancelResponse>, EngineError> {
    let order_id = match &req {
        OrderCancelRequest::Direct {
            order_id,
            trader,
            signature,
            deadline,
            nonce,
        } => {
            let trader_addr = parse_address(trader).ok_or(ValidationError::InvalidSignature)?;
            let typed = CancelTypedMessage {
                trader: trader_addr,
                order_id: U256::from(*order_id),
                deadline: U256::from((*deadline).max(0) as u64),
                nonce: U256::from(*nonce),
            };
            let digest = typed.digest(&state.eip712_domain);
            recover_and_verify(digest, signature, trader_addr).map_err(|_| ValidationError::InvalidSignature)?;
            *order_id
        }
        OrderCancelRequest::Session {
            session_id,
            order_id,
            relayer,
            proof,
        } => {
            let sessions = state.sessions.lock().await;
            let session = sessions
                .get(session_id)
                .ok_or_else(|| ConflictError::SessionRevoked(session_id.clone()))?;
            let now = chrono::Utc::now().timestamp();
            if session.status(now) != crate::gateway::SessionStatus::Active {
                return Err(ConflictError::SessionRevoked(session_id.clone()).into());
            }
            let root = H256::from_slice(&hex::decode(session.relayer_set_root.trim_start_matches("0x")).unwrap_or_default());
            let leaf = crate::gateway::session::leaf_hash(relayer);
            let proof_hashes: Vec<H256> = proof
                .iter()
                .filter_map(|p| hex::decode(p.trim_start_matches("0x")).ok())
                .map(|bytes| H256::from_slice(&bytes))
                .collect();
            if !crate::gateway::session::verify_merkle_proof(leaf, &proof_hashes, root) {
                return Err(ValidationError::InvalidSignature.into());
            }
            *order_id
        }
    };

    let now = chrono::Utc::now().timestamp();
    let books: Vec<_> = { state.books.lock().await.values().cloned().collect() };
    for book in books {
        if let Ok(order) = book.cancel(order_id, now).await {
            return Ok(Json(OrderCancelResponse { order_id, status: order.status }));
        }
    }
    Err(ConflictError::OrderAlreadyTerminal(order_id as u64).into())
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum OrderModifyRequest {
    Direct {
        order_id: u128,
        trader: String,
        new_price: Fixed18,
        new_qty: Fixed18,
        signature: String,
        deadline: i64,
        nonce: u64,
    },
    Session {
        session_id: String,
        order_id: u128,
        new_price: Fixed18,
        new_qty: Fixed18,
        relayer: String,
        proof: Vec<String>,
    },
}

#[derive(Debug, Serialize)]
pub struct OrderModifyResponse {
    pub order_id: u128,
    pub status: OrderStatus,
    pub fills: usize,
}

/// Changes a resting order's price/qty in place, either by the trader's own
/// signature or by a relayer proven to be in the session's
/// `relayer_set_root`. Probes every live book the same way `cancel_order`
/// does, since the gateway keeps no order-id-to-market index.
pub async fn modify_order(
    State(state): State<AppState>,
    Json(req): Json<OrderModifyRequest>,
) -> Result<Json<OrderModifyResponse>, EngineError> {
    let (order_id, new_price, new_qty) = match &req {
        OrderModifyRequest::Direct {
            order_id,
            trader,
            new_price,
            new_qty,
            signature,
            deadline,
            nonce,
        } => {
            let trader_addr = parse_address(trader).ok_or(ValidationError::InvalidSignature)?;
            let typed = ModifyTypedMessage {
                trader: trader_addr,
                order_id: U256::from(*order_id),
                new_price: U256::from(new_price.raw().max(0) as u128),
                new_qty: U256::from(new_qty.raw().max(0) as u128),
                deadline: U256::from((*deadline).max(0) as u64),
                nonce: U256::from(*nonce),
            };
            let digest = typed.digest(&state.eip712_domain);
            recover_and_verify(digest, signature, trader_addr).map_err(|_| ValidationError::InvalidSignature)?;
            (*order_id, *new_price, *new_qty)
        }
        OrderModifyRequest::Session {
            session_id,
            order_id,
            new_price,
            new_qty,
            relayer,
            proof,
        } => {
            let sessions = state.sessions.lock().await;
            let session = sessions
                .get(session_id)
                .ok_or_else(|| ConflictError::SessionRevoked(session_id.clone()))?;
            let now = chrono::Utc::now().timestamp();
            if session.status(now) != crate::gateway::SessionStatus::Active {
                return Err(ConflictError::SessionRevoked(session_id.clone()).into());
            }
            let root = H256::from_slice(&hex::decode(session.relayer_set_root.trim_start_matches("0x")).unwrap_or_default());
            let leaf = crate::gateway::session::leaf_hash(relayer);
            let proof_hashes: Vec<H256> = proof
                .iter()
                .filter_map(|p| hex::decode(p.trim_start_matches("0x")).ok())
                .map(|bytes| H256::from_slice(&bytes))
                .collect();
            if !crate::gateway::session::verify_merkle_proof(leaf, &proof_hashes, root) {
                return Err(ValidationError::InvalidSignature.into());
            }
            (*order_id, *new_price, *new_qty)
        }
    };

    let now = chrono::Utc::now().timestamp();
    let books: Vec<_> = { state.books.lock().await.values().cloned().collect() };
    for book in books {
        match book.modify(order_id, new_price, new_qty, now).await {
            Ok(outcome) => {
                crate::execution::settle_fills(
                    &state.registry,
                    &state.traders,
                    &state.config.toml.treasury_address,
                    &outcome.fills,
                )
                .await?;
                let status = outcome.order.map(|o| o.status).unwrap_or(OrderStatus::Cancelled);
                return Ok(Json(OrderModifyResponse { order_id, status, fills: outcome.fills.len() }));
            }
            Err(EngineError::Conflict(ConflictError::OrderAlreadyTerminal(_))) => continue,
            Err(e) => return Err(e),
        }
    }
    Err(ConflictError::OrderAlreadyTerminal(order_id as u64).into())
}
