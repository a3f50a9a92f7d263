//! Market entity and lifecycle state machine.

use crate::fixed::Fixed18;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum MarketStatus {
    Draft,
    Deployed,
    Active,
    Paused,
    Settled,
}

impl MarketStatus {
    /// Legal transitions: `DRAFT -> DEPLOYED -> ACTIVE -> {PAUSED <-> ACTIVE} -> SETTLED`.
    pub fn can_transition_to(self, next: MarketStatus) -> bool {
        use MarketStatus::*;
        matches!(
            (self, next),
            (Draft, Deployed)
                | (Deployed, Active)
                | (Active, Paused)
                | (Paused, Active)
                | (Active, Settled)
                | (Paused, Settled)
        )
    }
}

/// Canonical market record. `market_id` is a content-derived identifier
/// (symbol + creator + creation timestamp hashed), never reused.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Market {
    pub market_id: String,
    pub symbol: String,
    pub collateral_token: String,
    pub collateral_decimals: u8,
    pub tick_size: Fixed18,
    pub lot_size: Fixed18,
    pub max_leverage: u32,
    pub trading_fee_bps: u32,
    pub maintenance_margin_bps: u32,
    pub liquidation_fee_bps: u32,
    pub status: MarketStatus,
    pub starting_price: Fixed18,
    pub mark_price: Fixed18,
    pub index_price: Fixed18,
    pub creator: String,
    pub created_at: i64,
    pub updated_at: i64,
}

impl Market {
    /// Rounds a price down to the nearest multiple of `tick_size`. Used by
    /// the gateway and book to validate inbound order prices.
    pub fn is_tick_aligned(&self, price: Fixed18) -> bool {
        is_integer_multiple(price, self.tick_size)
    }

    pub fn is_lot_aligned(&self, qty: Fixed18) -> bool {
        if self.lot_size.is_zero() {
            return true;
        }
        is_integer_multiple(qty, self.lot_size)
    }

    pub fn is_tradeable(&self) -> bool {
        matches!(self.status, MarketStatus::Active)
    }
}

/// `value` is an exact non-negative integer multiple of `step`, computed in
/// the raw fixed-point domain to avoid float error.
fn is_integer_multiple(value: Fixed18, step: Fixed18) -> bool {
    if step.raw() <= 0 {
        return true;
    }
    value.raw() % step.raw() == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_market() -> Market {
        Market {
            market_id: "m1".into(),
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
            mark_price: "100.00".parse().unwrap(),
            index_price: "100.00".parse().unwrap(),
            creator: "0xcreator".into(),
            created_at: 0,
            updated_at: 0,
        }
    }

    #[test]
    fn tick_alignment() {
        let m = sample_market();
        assert!(m.is_tick_aligned("100.01".parse().unwrap()));
        assert!(!m.is_tick_aligned("100.001".parse().unwrap()));
    }

    #[test]
    fn lifecycle_transitions() {
        assert!(MarketStatus::Draft.can_transition_to(MarketStatus::Deployed));
        assert!(MarketStatus::Active.can_transition_to(MarketStatus::Paused));
        assert!(MarketStatus::Paused.can_transition_to(MarketStatus::Active));
        assert!(!MarketStatus::Draft.can_transition_to(MarketStatus::Active));
        assert!(!MarketStatus::Settled.can_transition_to(MarketStatus::Active));
    }
}
