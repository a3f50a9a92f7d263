//! Concrete [`LiquidationContext`] wiring the worker's retry/backoff shell to
//! the real system: the market registry for mark/MMR lookups, the book
//! actors for the forced close itself, and the vault actors for settlement.
//! Grounded on the same fill-settlement pattern `crate::execution` uses for
//! ordinary trades, specialized for a single-trader forced close.

use crate::book::BookHandle;
use crate::book::types::{Order, OrderStatus, OrderType, Side, TimeInForce};
use crate::error::{EngineError, FatalError};
use crate::fixed::Fixed18;
use crate::liquidation::worker::{CloseOutcome, LiquidationContext};
use crate::market::MarketRegistry;
use crate::vault::{Position, SettleFillRequest, TraderHandle};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;

pub struct EngineLiquidationContext {
    registry: Arc<MarketRegistry>,
    books: Arc<Mutex<HashMap<String, BookHandle>>>,
    traders: Arc<Mutex<HashMap<String, TraderHandle>>>,
    order_id_seq: Arc<AtomicU64>,
    treasury: String,
}

impl EngineLiquidationContext {
    pub fn new(
        registry: Arc<MarketRegistry>,
        books: Arc<Mutex<HashMap<String, BookHandle>>>,
        traders: Arc<Mutex<HashMap<String, TraderHandle>>>,
        order_id_seq: Arc<AtomicU64>,
        treasury: impl Into<String>,
    ) -> Self {
        Self { registry, books, traders, order_id_seq, treasury: treasury.into() }
    }

    fn next_order_id(&self) -> u128 {
        self.order_id_seq.fetch_add(1, Ordering::Relaxed) as u128
    }
}

#[async_trait]
impl LiquidationContext for EngineLiquidationContext {
    async fn mark_price(&self, market_id: &str) -> Option<Fixed18> {
        self.registry.get(market_id).map(|m| m.mark_price)
    }

    async fn maintenance_margin_bps(&self, market_id: &str) -> Option<u32> {
        self.registry.get(market_id).map(|m| m.maintenance_margin_bps)
    }

    async fn position(&self, trader: &str, market_id: &str) -> Option<Position> {
        let handle = self.traders.lock().await.get(trader).cloned()?;
        let (_, positions) = handle.snapshot().await?;
        positions.into_iter().find(|p| p.market_id == market_id)
    }

    /// Submits a reduce-only market order through the market's book actor,
    /// sized to the full position and bounded by `slippage_cap` either side
    /// of the current mark, then settles every resulting fill: the
    /// liquidated trader's leg pays the market's liquidation fee, the
    /// counterparty's leg pays the ordinary trading fee.
    async fn close_at_market(
        &self,
        trader: &str,
        market_id: &str,
        slippage_cap: Fixed18,
    ) -> Result<Option<CloseOutcome>, EngineError> {
        let market = self
            .registry
            .get(market_id)
            .ok_or_else(|| FatalError::BookInvariantBroken(format!("unknown market {market_id}")))?;

        let trader_handle = self
            .traders
            .lock()
            .await
            .get(trader)
            .cloned()
            .ok_or_else(|| FatalError::VaultInvariantBroken(format!("no vault actor for {trader}")))?;

        let position = match trader_handle.snapshot().await {
            Some((_, positions)) => positions.into_iter().find(|p| p.market_id == market_id),
            None => None,
        };
        let position = match position {
            Some(p) if !p.is_flat() => p,
            _ => return Ok(None),
        };

        let book = self
            .books
            .lock()
            .await
            .get(market_id)
            .cloned()
            .ok_or_else(|| FatalError::BookInvariantBroken(format!("no book actor for {market_id}")))?;

        let closing_side = if position.size.is_negative() { Side::Buy } else { Side::Sell };
        let qty = position.size.abs();
        let slippage = market.mark_price.checked_mul(slippage_cap).unwrap_or(Fixed18::ZERO);
        let (min_price, max_price) = match closing_side {
            Side::Sell => (Some(market.mark_price.checked_sub(slippage).unwrap_or(Fixed18::ZERO)), None),
            Side::Buy => (None, Some(market.mark_price.checked_add(slippage).unwrap_or(market.mark_price))),
        };

        let now = chrono::Utc::now().timestamp();
        let order = Order {
            order_id: self.next_order_id(),
            trader: trader.to_string(),
            market_id: market_id.to_string(),
            side: closing_side,
            order_type: OrderType::Market,
            qty,
            filled_qty: Fixed18::ZERO,
            price: None,
            stop_price: None,
            display_qty: None,
            tif: TimeInForce::Ioc,
            post_only: false,
            min_price,
            max_price,
            status: OrderStatus::Pending,
            created_ts: now,
            updated_ts: now,
        };

        let outcome = book.insert(order, now).await?;
        let remainder = outcome.order.as_ref().map(|o| o.remaining_qty()).unwrap_or(Fixed18::ZERO);

        let mut closed_size = Fixed18::ZERO;
        let mut realized_pnl = Fixed18::ZERO;
        let mut fee_taken = Fixed18::ZERO;

        for fill in &outcome.fills {
            let notional = fill.price.checked_mul(fill.qty).unwrap_or(Fixed18::ZERO);
            let liquidation_fee = crate::fixed::bps_of(notional, market.liquidation_fee_bps).unwrap_or(Fixed18::ZERO);
            let trading_fee = crate::fixed::bps_of(notional, market.trading_fee_bps).unwrap_or(Fixed18::ZERO);

            let (maker_signed_qty, taker_signed_qty) = match fill.taker_side {
                Side::Buy => (fill.qty.checked_neg().unwrap_or(Fixed18::ZERO), fill.qty),
                Side::Sell => (fill.qty, fill.qty.checked_neg().unwrap_or(Fixed18::ZERO)),
            };

            let (maker, taker) = {
                let table = self.traders.lock().await;
                (table.get(&fill.maker_trader).cloned(), table.get(&fill.taker_trader).cloned())
            };
            let maker = maker
                .ok_or_else(|| FatalError::VaultInvariantBroken(format!("no vault actor for maker {}", fill.maker_trader)))?;
            let taker = taker
                .ok_or_else(|| FatalError::VaultInvariantBroken(format!("no vault actor for taker {}", fill.taker_trader)))?;

            let maker_fee = if fill.maker_trader == trader { liquidation_fee } else { trading_fee };
            let taker_fee = if fill.taker_trader == trader { liquidation_fee } else { trading_fee };

            let maker_result = maker
                .settle_fill(SettleFillRequest {
                    market_id: market_id.to_string(),
                    fill_price: fill.price,
                    signed_qty: maker_signed_qty,
                    fee: maker_fee,
                    leverage: market.max_leverage,
                    creator: market.creator.clone(),
                    treasury: self.treasury.clone(),
                    ts: fill.ts,
                })
                .await?;
            crate::execution::credit_fee_cuts(&self.traders, &market.creator, &self.treasury, &maker_result).await;

            let taker_result = taker
                .settle_fill(SettleFillRequest {
                    market_id: market_id.to_string(),
                    fill_price: fill.price,
                    signed_qty: taker_signed_qty,
                    fee: taker_fee,
                    leverage: market.max_leverage,
                    creator: market.creator.clone(),
                    treasury: self.treasury.clone(),
                    ts: fill.ts,
                })
                .await?;
            crate::execution::credit_fee_cuts(&self.traders, &market.creator, &self.treasury, &taker_result).await;

            closed_size = closed_size.checked_add(fill.qty).unwrap_or(closed_size);
            if fill.maker_trader == trader {
                realized_pnl = realized_pnl.checked_add(maker_result.realized_pnl_delta).unwrap_or(realized_pnl);
                fee_taken = fee_taken.checked_add(maker_fee).unwrap_or(fee_taken);
            } else if fill.taker_trader == trader {
                realized_pnl = realized_pnl.checked_add(taker_result.realized_pnl_delta).unwrap_or(realized_pnl);
                fee_taken = fee_taken.checked_add(taker_fee).unwrap_or(fee_taken);
            }
        }

        let shortfall = match trader_handle.snapshot().await {
            Some((account, _)) if account.available().is_negative() => {
                account.available().checked_neg().unwrap_or(Fixed18::ZERO)
            }
            _ => Fixed18::ZERO,
        };

        // The insurance fund absorbs a negative residual equity by paying
        // the shortfall into the liquidated trader's own account. If the
        // fund itself cannot cover it, the liquidation still stands; an
        // operator tops the fund up out of band (`operatorctl insurance-topup`).
        let insurance_fund_draw = if shortfall.is_zero() {
            Fixed18::ZERO
        } else {
            let fund = self.traders.lock().await.get(crate::vault::INSURANCE_FUND_TRADER).cloned();
            match fund {
                Some(fund) if fund.withdraw(shortfall).await.is_ok() => {
                    trader_handle.deposit(shortfall).await;
                    shortfall
                }
                _ => {
                    tracing::warn!(trader, market_id, %shortfall, "insurance fund could not cover liquidation shortfall");
                    Fixed18::ZERO
                }
            }
        };

        Ok(Some(CloseOutcome { closed_size, remainder, realized_pnl, fee_taken, insurance_fund_draw }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::book::{spawn_book_actor, OrderBook};
    use crate::market::{Market, MarketStatus};
    use crate::vault::spawn_trader_actor;

    fn sample_market() -> Market {
        Market {
            market_id: "GOLD/USD".into(),
            symbol: "GOLD/USD".into(),
            collateral_token: "0xusdc".into(),
            collateral_decimals: 6,
            tick_size: "0.01".parse().unwrap(),
            lot_size: "0.0001".parse().unwrap(),
            max_leverage: 10,
            trading_fee_bps: 30,
            maintenance_margin_bps: 500,
            liquidation_fee_bps: 100,
            status: MarketStatus::Active,
            starting_price: "100.00".parse().unwrap(),
            mark_price: "94.00".parse().unwrap(),
            index_price: "94.00".parse().unwrap(),
            creator: "0xcreator".into(),
            created_at: 0,
            updated_at: 0,
        }
    }

    #[tokio::test]
    async fn closes_liquidatable_long_against_resting_bid() {
        let registry = Arc::new(MarketRegistry::new());
        registry.insert(sample_market()).unwrap();

        let book = OrderBook::new("GOLD/USD", "0.01".parse().unwrap(), "0.0001".parse().unwrap());
        let (book_handle, _bjoin) = spawn_book_actor(book);
        let books = Arc::new(Mutex::new(HashMap::from([("GOLD/USD".to_string(), book_handle)])));

        let (liquidatee, _j1) = spawn_trader_actor("liquidatee");
        let (counterparty, _j2) = spawn_trader_actor("counterparty");
        liquidatee.deposit(Fixed18::from_i64(1000)).await;
        counterparty.deposit(Fixed18::from_i64(10_000)).await;

        liquidatee
            .settle_fill(SettleFillRequest {
                market_id: "GOLD/USD".into(),
                fill_price: "100.00".parse().unwrap(),
                signed_qty: "10.0".parse().unwrap(),
                fee: Fixed18::ZERO,
                leverage: 10,
                creator: "0xcreator".into(),
                treasury: "0xtreasury".into(),
                ts: 0,
            })
            .await
            .unwrap();

        let traders = Arc::new(Mutex::new(HashMap::from([
            ("liquidatee".to_string(), liquidatee.clone()),
            ("counterparty".to_string(), counterparty.clone()),
        ])));
        let traders_handle = traders.clone();

        // Resting bid for the counterparty to take the liquidation's forced sell against.
        let books_inner = books.lock().await.get("GOLD/USD").cloned().unwrap();
        books_inner
            .insert(
                Order {
                    order_id: 1,
                    trader: "counterparty".into(),
                    market_id: "GOLD/USD".into(),
                    side: Side::Buy,
                    order_type: OrderType::Limit,
                    qty: "10.0".parse().unwrap(),
                    filled_qty: Fixed18::ZERO,
                    price: Some("94.00".parse().unwrap()),
                    stop_price: None,
                    display_qty: None,
                    tif: TimeInForce::Gtc,
                    post_only: false,
                    min_price: None,
                    max_price: None,
                    status: OrderStatus::Pending,
                    created_ts: 0,
                    updated_ts: 0,
                },
                0,
            )
            .await
            .unwrap();
        drop(books_inner);

        let ctx = EngineLiquidationContext::new(
            registry,
            books,
            traders,
            Arc::new(AtomicU64::new(2)),
            "0xtreasury",
        );

        let outcome = ctx
            .close_at_market("liquidatee", "GOLD/USD", "0.05".parse().unwrap())
            .await
            .unwrap()
            .expect("liquidatable position should close");

        assert_eq!(outcome.closed_size, "10.0".parse().unwrap());
        assert!(outcome.remainder.is_zero());
        assert_eq!(outcome.realized_pnl, "-60.00".parse().unwrap());

        let (account, positions) = liquidatee.snapshot().await.unwrap();
        assert!(positions[0].is_flat());
        assert!(account.sum_reserved.is_zero());

        // liquidation fee (liquidatee's leg) and trading fee (counterparty's
        // leg) both landed on the creator/treasury accounts, not just on the
        // liquidated trader's own ledger.
        let creator_handle = crate::execution::get_or_spawn_trader(&traders_handle, "0xcreator").await;
        let treasury_handle = crate::execution::get_or_spawn_trader(&traders_handle, "0xtreasury").await;
        let (creator_account, _) = creator_handle.snapshot().await.unwrap();
        let (treasury_account, _) = treasury_handle.snapshot().await.unwrap();
        assert!(creator_account.collateral > Fixed18::ZERO);
        assert!(treasury_account.collateral > Fixed18::ZERO);
    }

    #[tokio::test]
    async fn flat_position_yields_no_close() {
        let registry = Arc::new(MarketRegistry::new());
        registry.insert(sample_market()).unwrap();
        let book = OrderBook::new("GOLD/USD", "0.01".parse().unwrap(), "0.0001".parse().unwrap());
        let (book_handle, _bjoin) = spawn_book_actor(book);
        let books = Arc::new(Mutex::new(HashMap::from([("GOLD/USD".to_string(), book_handle)])));
        let (trader, _j) = spawn_trader_actor("flat-trader");
        let traders = Arc::new(Mutex::new(HashMap::from([("flat-trader".to_string(), trader)])));

        let ctx = EngineLiquidationContext::new(registry, books, traders, Arc::new(AtomicU64::new(1)), "0xtreasury");
        let outcome = ctx.close_at_market("flat-trader", "GOLD/USD", "0.05".parse().unwrap()).await.unwrap();
        assert!(outcome.is_none());
    }

    #[tokio::test]
    async fn insurance_fund_covers_negative_residual_equity() {
        let registry = Arc::new(MarketRegistry::new());
        registry.insert(sample_market()).unwrap();

        let book = OrderBook::new("GOLD/USD", "0.01".parse().unwrap(), "0.0001".parse().unwrap());
        let (book_handle, _bjoin) = spawn_book_actor(book);
        let books = Arc::new(Mutex::new(HashMap::from([("GOLD/USD".to_string(), book_handle)])));

        let (liquidatee, _j1) = spawn_trader_actor("thin-liquidatee");
        let (counterparty, _j2) = spawn_trader_actor("counterparty");
        let (fund, _j3) = spawn_trader_actor(crate::vault::INSURANCE_FUND_TRADER);
        // Barely enough to open the position; the 60.00 loss realized on
        // close drives `available()` negative before the fund steps in.
        liquidatee.deposit("100.00".parse().unwrap()).await;
        counterparty.deposit(Fixed18::from_i64(10_000)).await;
        fund.deposit(Fixed18::from_i64(1_000)).await;

        liquidatee
            .settle_fill(SettleFillRequest {
                market_id: "GOLD/USD".into(),
                fill_price: "100.00".parse().unwrap(),
                signed_qty: "10.0".parse().unwrap(),
                fee: Fixed18::ZERO,
                leverage: 10,
                creator: "0xcreator".into(),
                treasury: "0xtreasury".into(),
                ts: 0,
            })
            .await
            .unwrap();

        let traders = Arc::new(Mutex::new(HashMap::from([
            ("thin-liquidatee".to_string(), liquidatee.clone()),
            ("counterparty".to_string(), counterparty.clone()),
            (crate::vault::INSURANCE_FUND_TRADER.to_string(), fund.clone()),
        ])));

        let books_inner = books.lock().await.get("GOLD/USD").cloned().unwrap();
        books_inner
            .insert(
                Order {
                    order_id: 1,
                    trader: "counterparty".into(),
                    market_id: "GOLD/USD".into(),
                    side: Side::Buy,
                    order_type: OrderType::Limit,
                    qty: "10.0".parse().unwrap(),
                    filled_qty: Fixed18::ZERO,
                    price: Some("94.00".parse().unwrap()),
                    stop_price: None,
                    display_qty: None,
                    tif: TimeInForce::Gtc,
                    post_only: false,
                    min_price: None,
                    max_price: None,
                    status: OrderStatus::Pending,
                    created_ts: 0,
                    updated_ts: 0,
                },
                0,
            )
            .await
            .unwrap();
        drop(books_inner);

        let ctx =
            EngineLiquidationContext::new(registry, books, traders, Arc::new(AtomicU64::new(2)), "0xtreasury");

        let outcome = ctx
            .close_at_market("thin-liquidatee", "GOLD/USD", "0.05".parse().unwrap())
            .await
            .unwrap()
            .expect("liquidatable position should close");

        assert!(!outcome.insurance_fund_draw.is_zero());

        let (account, _) = liquidatee.snapshot().await.unwrap();
        assert!(!account.available().is_negative());

        let (fund_account, _) = fund.snapshot().await.unwrap();
        assert_eq!(fund_account.collateral, Fixed18::from_i64(1_000).checked_sub(outcome.insurance_fund_draw).unwrap());
    }
}
