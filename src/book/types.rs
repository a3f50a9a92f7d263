//! Order, fill, and book-level vocabulary. Prices and sizes are
//! [`Fixed18`], never `f64`; order types include stop and iceberg variants
//! alongside plain limit/market.

use crate::fixed::Fixed18;
use serde::{Deserialize, Serialize};

pub type OrderId = u128;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Side {
    Buy,
    Sell,
}

impl Side {
    pub fn opposite(self) -> Side {
        match self {
            Side::Buy => Side::Sell,
            Side::Sell => Side::Buy,
        }
    }

    /// +1 for buy, -1 for sell. Used to sign PnL and notional deltas.
    pub fn sign(self) -> i64 {
        match self {
            Side::Buy => 1,
            Side::Sell => -1,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderType {
    Market,
    Limit,
    StopLimit,
    StopMarket,
    Iceberg,
}

impl OrderType {
    pub fn is_stop(self) -> bool {
        matches!(self, OrderType::StopLimit | OrderType::StopMarket)
    }

    pub fn requires_price(self) -> bool {
        matches!(self, OrderType::Limit | OrderType::StopLimit | OrderType::Iceberg)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE", tag = "kind")]
pub enum TimeInForce {
    Gtc,
    Ioc,
    Fok,
    Gtd { deadline: i64 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum OrderStatus {
    Pending,
    Partial,
    Filled,
    Cancelled,
    Expired,
    Rejected,
}

impl OrderStatus {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            OrderStatus::Filled | OrderStatus::Cancelled | OrderStatus::Expired | OrderStatus::Rejected
        )
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    pub order_id: OrderId,
    pub trader: String,
    pub market_id: String,
    pub side: Side,
    pub order_type: OrderType,
    pub qty: Fixed18,
    pub filled_qty: Fixed18,
    /// Required for LIMIT/STOP_LIMIT/ICEBERG; must be tick-aligned.
    pub price: Option<Fixed18>,
    /// Trigger price for STOP_*.
    pub stop_price: Option<Fixed18>,
    /// Visible size for ICEBERG; `None` for all other order types.
    pub display_qty: Option<Fixed18>,
    pub tif: TimeInForce,
    pub post_only: bool,
    /// Slippage bounds for MARKET orders.
    pub min_price: Option<Fixed18>,
    pub max_price: Option<Fixed18>,
    pub status: OrderStatus,
    pub created_ts: i64,
    pub updated_ts: i64,
}

impl Order {
    pub fn remaining_qty(&self) -> Fixed18 {
        self.qty.checked_sub(self.filled_qty).unwrap_or(Fixed18::ZERO)
    }

    /// Currently-visible quantity at the book level: the full remaining
    /// size for ordinary orders, or the smaller of `display_qty` and the
    /// remaining size for ICEBERG orders.
    pub fn visible_qty(&self) -> Fixed18 {
        match (self.order_type, self.display_qty) {
            (OrderType::Iceberg, Some(display)) => display.min(self.remaining_qty()),
            _ => self.remaining_qty(),
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    pub fn deadline(&self) -> Option<i64> {
        match self.tif {
            TimeInForce::Gtd { deadline } => Some(deadline),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Fill {
    pub maker_order_id: OrderId,
    pub taker_order_id: OrderId,
    pub maker_trader: String,
    pub taker_trader: String,
    pub market_id: String,
    pub price: Fixed18,
    pub qty: Fixed18,
    /// Side of the taker order; the maker traded the opposite side.
    pub taker_side: Side,
    pub ts: i64,
}

/// Result of `insert`/`modify`: the fills generated plus the resting residual,
/// if any (e.g. a GTC limit order that only partially filled).
#[derive(Debug, Clone, Default)]
pub struct MatchOutcome {
    pub fills: Vec<Fill>,
    pub order: Option<Order>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct BookLevelView {
    pub price: Fixed18,
    pub qty: Fixed18,
    pub order_count: usize,
}
