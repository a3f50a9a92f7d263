//! Fill settlement glue: turns a book actor's [`MatchOutcome`] into vault
//! mutations. Neither the book actor (C2) nor the trader actor (C3/C4) knows
//! about the other — margin and position mutation only need to be atomic
//! *per fill within one trader's actor*, not for the book itself to call
//! into the vault — so this module is the seam that applies a fill to both
//! of its participants after the book has already committed it.

use crate::book::types::{Fill, Side};
use crate::error::{EngineError, FatalError};
use crate::fixed::{bps_of, Fixed18};
use crate::market::MarketRegistry;
use crate::vault::{SettleFillRequest, TraderHandle};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Applies every fill in a match outcome to the maker's and taker's vault
/// actors. Trading fee is split evenly between both sides of the trade and
/// further split creator/protocol per [`crate::vault::account::split_fee`]
/// inside each actor's own `settle_fill`.
pub async fn settle_fills(
    registry: &MarketRegistry,
    traders: &Mutex<HashMap<String, TraderHandle>>,
    treasury: &str,
    fills: &[Fill],
) -> Result<(), EngineError> {
    for fill in fills {
        let market = registry
            .get(&fill.market_id)
            .ok_or_else(|| FatalError::BookInvariantBroken(format!("fill against unknown market {}", fill.market_id)))?;

        let notional = fill.price.checked_mul(fill.qty).unwrap_or(Fixed18::ZERO);
        let fee_total = bps_of(notional, market.trading_fee_bps).unwrap_or(Fixed18::ZERO);
        let fee_each = fee_total.checked_div_int(2).unwrap_or(Fixed18::ZERO);

        let (maker_signed_qty, taker_signed_qty) = match fill.taker_side {
            Side::Buy => (fill.qty.checked_neg().unwrap_or(Fixed18::ZERO), fill.qty),
            Side::Sell => (fill.qty, fill.qty.checked_neg().unwrap_or(Fixed18::ZERO)),
        };

        let (maker, taker) = {
            let table = traders.lock().await;
            let maker = table.get(&fill.maker_trader).cloned();
            let taker = table.get(&fill.taker_trader).cloned();
            (maker, taker)
        };
        let maker = maker.ok_or_else(|| {
            FatalError::VaultInvariantBroken(format!("no vault actor for maker {}", fill.maker_trader))
        })?;
        let taker = taker.ok_or_else(|| {
            FatalError::VaultInvariantBroken(format!("no vault actor for taker {}", fill.taker_trader))
        })?;

        let maker_result = maker
            .settle_fill(SettleFillRequest {
                market_id: fill.market_id.clone(),
                fill_price: fill.price,
                signed_qty: maker_signed_qty,
                fee: fee_each,
                leverage: market.max_leverage,
                creator: market.creator.clone(),
                treasury: treasury.to_string(),
                ts: fill.ts,
            })
            .await?;
        credit_fee_cuts(traders, &market.creator, treasury, &maker_result).await;

        let taker_result = taker
            .settle_fill(SettleFillRequest {
                market_id: fill.market_id.clone(),
                fill_price: fill.price,
                signed_qty: taker_signed_qty,
                fee: fee_each,
                leverage: market.max_leverage,
                creator: market.creator.clone(),
                treasury: treasury.to_string(),
                ts: fill.ts,
            })
            .await?;
        credit_fee_cuts(traders, &market.creator, treasury, &taker_result).await;
    }
    Ok(())
}

/// Credits the market creator's and the protocol treasury's vault accounts
/// with their cuts of a settled fill's fee, spawning either actor on first
/// contact the same way the gateway spawns a trader's on first order. Shared
/// with the liquidation close path, which settles fills the same way.
pub(crate) async fn credit_fee_cuts(
    traders: &Mutex<HashMap<String, TraderHandle>>,
    creator: &str,
    treasury: &str,
    result: &crate::vault::SettleFillResult,
) {
    if !result.creator_fee_cut.is_zero() {
        get_or_spawn_trader(traders, creator).await.deposit(result.creator_fee_cut).await;
    }
    if !result.protocol_fee_cut.is_zero() {
        get_or_spawn_trader(traders, treasury).await.deposit(result.protocol_fee_cut).await;
    }
}

pub(crate) async fn get_or_spawn_trader(traders: &Mutex<HashMap<String, TraderHandle>>, address: &str) -> TraderHandle {
    let mut table = traders.lock().await;
    if let Some(handle) = table.get(address) {
        return handle.clone();
    }
    let (handle, _join) = crate::vault::spawn_trader_actor(address);
    table.insert(address.to_string(), handle.clone());
    handle
}
