//! Funding rate accountant (C5). Every `funding_interval`, samples
//! `mark_price`/`index_price` for a market, computes a capped funding rate,
//! and applies the signed payment to every open position. Funding is
//! realized PnL, not a position-size adjustment.

use crate::fixed::Fixed18;
use crate::market::MarketRegistry;
use crate::vault::TraderHandle;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tokio::sync::Mutex;

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct FundingConfig {
    pub interval_secs: i64,
    /// Symmetric cap on the funding rate, e.g. 0.0075 for 75bps.
    pub cap: Fixed18,
}

/// `funding_rate = clamp((mark - index) / index, -cap, +cap)`.
pub fn compute_funding_rate(mark_price: Fixed18, index_price: Fixed18, cap: Fixed18) -> Option<Fixed18> {
    if index_price.is_zero() {
        return None;
    }
    let diff = mark_price.checked_sub(index_price)?;
    let raw_rate = diff.checked_div(index_price)?;
    Some(raw_rate.clamp(cap.checked_neg()?, cap))
}

/// `funding_payment = funding_rate * notional * direction`. Longs pay
/// shorts when the rate is positive (mark above index); `position_size` is
/// signed so the sign falls out of the multiplication directly.
pub fn funding_payment(funding_rate: Fixed18, mark_price: Fixed18, position_size: Fixed18) -> Option<Fixed18> {
    let notional = position_size.checked_mul(mark_price)?;
    let payment = notional.checked_mul(funding_rate)?;
    // Longs (positive size) are debited when the rate is positive; the debit
    // is applied as realized PnL by the caller, so this returns the credit
    // to the position holder, which is negative for longs under positive
    // funding.
    payment.checked_neg()
}

/// Tracks `last_applied_ts` per market so a missed interval (outage) is
/// accounted once, time-weighted over `[last_applied, now)`, and never
/// double-applied: advancing the watermark is the only way a window is
/// consumed.
#[derive(Debug, Clone, Copy)]
pub struct FundingWindow {
    pub last_applied_ts: i64,
}

impl FundingWindow {
    pub fn new(start_ts: i64) -> Self {
        Self { last_applied_ts: start_ts }
    }

    /// Returns the number of whole intervals elapsed since the last applied
    /// timestamp, or `None` if less than one interval has passed. Advancing
    /// by whole intervals keeps the per-application payment comparable in
    /// magnitude to a normal on-time application, rather than compounding a
    /// single giant rate over an arbitrarily long outage window.
    pub fn due_intervals(&self, now: i64, interval_secs: i64) -> Option<u32> {
        if interval_secs <= 0 {
            return None;
        }
        let elapsed = now - self.last_applied_ts;
        let count = elapsed / interval_secs;
        if count <= 0 {
            None
        } else {
            Some(count as u32)
        }
    }

    pub fn advance(&mut self, intervals: u32, interval_secs: i64) {
        self.last_applied_ts += intervals as i64 * interval_secs;
    }
}

/// Owns the per-market funding clock and drives application against every
/// live trader actor. Iterating all trader handles per tick is the same
/// probe-every-actor tradeoff the gateway's order cancellation makes: cheap
/// relative to the tick interval, and avoids keeping a second
/// market-to-trader index in sync with the actor maps.
pub struct FundingAccountant {
    config: FundingConfig,
    windows: HashMap<String, FundingWindow>,
}

impl FundingAccountant {
    pub fn new(config: FundingConfig) -> Self {
        Self { config, windows: HashMap::new() }
    }

    /// Applies funding to every tradeable market with a due window. Markets
    /// seen for the first time start their window at `now`, so a
    /// newly-deployed market never owes a catch-up payment for time before
    /// it existed.
    pub async fn apply_due(
        &mut self,
        registry: &MarketRegistry,
        traders: &Mutex<HashMap<String, TraderHandle>>,
        now: i64,
    ) {
        for market in registry.list() {
            if !market.is_tradeable() {
                continue;
            }
            let due = {
                let window = self.windows.entry(market.market_id.clone()).or_insert_with(|| FundingWindow::new(now));
                window.due_intervals(now, self.config.interval_secs)
            };
            let due = match due {
                Some(d) => d,
                None => continue,
            };

            if let Some(rate) = compute_funding_rate(market.mark_price, market.index_price, self.config.cap) {
                let weighted_rate = rate.checked_mul_int(due as i128).unwrap_or(rate);
                let handles: Vec<TraderHandle> = { traders.lock().await.values().cloned().collect() };
                for handle in handles {
                    if let Some((_, positions)) = handle.snapshot().await {
                        if let Some(position) = positions.iter().find(|p| p.market_id == market.market_id) {
                            if !position.is_flat() {
                                if let Some(payment) = funding_payment(weighted_rate, market.mark_price, position.size) {
                                    handle.apply_funding(market.market_id.clone(), payment).await;
                                }
                            }
                        }
                    }
                }
            }

            if let Some(window) = self.windows.get_mut(&market.market_id) {
                window.advance(due, self.config.interval_secs);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn funding_rate_clamped() {
        let mark: Fixed18 = "101.00".parse().unwrap();
        let index: Fixed18 = "100.00".parse().unwrap();
        let cap: Fixed18 = "0.0050".parse().unwrap();
        let rate = compute_funding_rate(mark, index, cap).unwrap();
        assert_eq!(rate, cap);
    }

    #[test]
    fn funding_rate_unclamped_when_within_cap() {
        let mark: Fixed18 = "100.10".parse().unwrap();
        let index: Fixed18 = "100.00".parse().unwrap();
        let cap: Fixed18 = "0.0050".parse().unwrap();
        let rate = compute_funding_rate(mark, index, cap).unwrap();
        assert_eq!(rate, "0.0010".parse().unwrap());
    }

    #[test]
    fn longs_pay_shorts_under_positive_funding() {
        let rate: Fixed18 = "0.0010".parse().unwrap();
        let mark: Fixed18 = "100.00".parse().unwrap();
        let long = funding_payment(rate, mark, Fixed18::from_i64(10)).unwrap();
        let short = funding_payment(rate, mark, Fixed18::from_i64(-10)).unwrap();
        assert!(long.is_negative());
        assert!(!short.is_negative());
        assert_eq!(long.checked_add(short).unwrap(), Fixed18::ZERO);
    }

    #[test]
    fn missed_intervals_applied_once_and_monotonically() {
        let mut window = FundingWindow::new(0);
        assert!(window.due_intervals(1800, 3600).is_none());
        let due = window.due_intervals(3 * 3600 + 100, 3600).unwrap();
        assert_eq!(due, 3);
        window.advance(due, 3600);
        assert_eq!(window.last_applied_ts, 3 * 3600);
        assert!(window.due_intervals(3 * 3600 + 100, 3600).is_none());
    }

    #[tokio::test]
    async fn accountant_applies_funding_to_open_position_only() {
        use crate::market::{Market, MarketStatus};
        use crate::vault::spawn_trader_actor;

        let registry = MarketRegistry::new();
        registry
            .insert(Market {
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
                mark_price: "101.00".parse().unwrap(),
                index_price: "100.00".parse().unwrap(),
                creator: "0xcreator".into(),
                created_at: 0,
                updated_at: 0,
            })
            .unwrap();

        let (long, _j1) = spawn_trader_actor("long");
        let (flat, _j2) = spawn_trader_actor("flat");
        long.deposit(Fixed18::from_i64(1000)).await;
        long.settle_fill(crate::vault::SettleFillRequest {
            market_id: "GOLD/USD".into(),
            fill_price: "100.00".parse().unwrap(),
            signed_qty: Fixed18::from_i64(10),
            fee: Fixed18::ZERO,
            leverage: 10,
            creator: "0xcreator".into(),
            treasury: "0xtreasury".into(),
            ts: 0,
        })
        .await
        .unwrap();

        let traders = Mutex::new(HashMap::from([
            ("long".to_string(), long.clone()),
            ("flat".to_string(), flat.clone()),
        ]));

        let mut accountant = FundingAccountant::new(FundingConfig { interval_secs: 3600, cap: "0.0075".parse().unwrap() });
        accountant.apply_due(&registry, &traders, 0).await;
        let (account, _) = long.snapshot().await.unwrap();
        assert!(account.realized_pnl_cum.is_zero());

        accountant.apply_due(&registry, &traders, 3600).await;
        let (account, _) = long.snapshot().await.unwrap();
        assert!(account.realized_pnl_cum.is_negative());

        let (flat_account, _) = flat.snapshot().await.unwrap();
        assert!(flat_account.realized_pnl_cum.is_zero());
    }
}
