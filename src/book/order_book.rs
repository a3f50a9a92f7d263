//! Per-market limit order book: price-time priority matching over two
//! ordered maps. Bid levels are keyed by the negated raw price so that
//! both sides share one `BTreeMap<i128, VecDeque<Order>>` type and iterate
//! best-first in ascending key order, instead of carrying two separate
//! `Ord` newtypes.

use crate::book::types::{Fill, MatchOutcome, Order, OrderId, OrderStatus, OrderType, Side, TimeInForce};
use crate::error::{EngineError, ValidationError};
use crate::fixed::Fixed18;
use std::collections::{BTreeMap, HashMap, VecDeque};

type Level = VecDeque<Order>;

#[derive(Debug, Clone, Copy)]
struct OrderLocation {
    side: Side,
    key: i128,
}

pub struct OrderBook {
    pub market_id: String,
    pub tick_size: Fixed18,
    pub lot_size: Fixed18,
    bids: BTreeMap<i128, Level>,
    asks: BTreeMap<i128, Level>,
    index: HashMap<OrderId, OrderLocation>,
    /// STOP_LIMIT / STOP_MARKET orders, not yet live, keyed by trigger
    /// direction (rule 9): triggers above mark for buy-stops, below for
    /// sell-stops, held until the mark price crosses.
    stops: Vec<Order>,
}

fn bid_key(price: Fixed18) -> i128 {
    -price.raw()
}

fn ask_key(price: Fixed18) -> i128 {
    price.raw()
}

impl OrderBook {
    pub fn new(market_id: impl Into<String>, tick_size: Fixed18, lot_size: Fixed18) -> Self {
        Self {
            market_id: market_id.into(),
            tick_size,
            lot_size,
            bids: BTreeMap::new(),
            asks: BTreeMap::new(),
            index: HashMap::new(),
            stops: Vec::new(),
        }
    }

    pub fn best_bid(&self) -> Option<Fixed18> {
        self.bids.keys().next().map(|k| Fixed18::from_raw(-*k))
    }

    pub fn best_ask(&self) -> Option<Fixed18> {
        self.asks.keys().next().map(|k| Fixed18::from_raw(*k))
    }

    pub fn spread(&self) -> Option<Fixed18> {
        Some(self.best_ask()?.checked_sub(self.best_bid()?)?)
    }

    pub fn mid_price(&self) -> Option<Fixed18> {
        let sum = self.best_bid()?.checked_add(self.best_ask()?)?;
        sum.checked_div_int(2)
    }

    pub fn depth(&self, levels: usize) -> (Vec<(Fixed18, Fixed18)>, Vec<(Fixed18, Fixed18)>) {
        let bid_levels = self
            .bids
            .iter()
            .take(levels)
            .map(|(k, q)| (Fixed18::from_raw(-*k), level_qty(q)))
            .collect();
        let ask_levels = self
            .asks
            .iter()
            .take(levels)
            .map(|(k, q)| (Fixed18::from_raw(*k), level_qty(q)))
            .collect();
        (bid_levels, ask_levels)
    }

    fn validate(&self, order: &Order) -> Result<(), EngineError> {
        if order.qty.is_negative() || order.qty.is_zero() {
            return Err(ValidationError::InvalidQty("qty must be positive".into()).into());
        }
        if !self.lot_size.is_zero() && order.qty.raw() % self.lot_size.raw() != 0 {
            return Err(ValidationError::InvalidQty("qty not a multiple of lot_size".into()).into());
        }
        if order.order_type.requires_price() {
            let price = order
                .price
                .ok_or_else(|| ValidationError::InvalidPrice("price required".into()))?;
            if price.is_negative() || price.is_zero() {
                return Err(ValidationError::InvalidPrice("price must be positive".into()).into());
            }
            if !self.tick_size.is_zero() && price.raw() % self.tick_size.raw() != 0 {
                return Err(ValidationError::InvalidPrice("price not a multiple of tick_size".into()).into());
            }
        }
        if order.order_type.is_stop() && order.stop_price.is_none() {
            return Err(ValidationError::InvalidPrice("stop_price required".into()).into());
        }
        Ok(())
    }

    /// Whether inserting `order` right now would immediately cross the book,
    /// used for the `post_only` check (rule 6).
    fn would_cross(&self, order: &Order) -> bool {
        match order.side {
            Side::Buy => match (order.order_type, order.price) {
                (OrderType::Market, _) => self.best_ask().is_some(),
                (_, Some(price)) => self.best_ask().map(|ask| price >= ask).unwrap_or(false),
                _ => false,
            },
            Side::Sell => match (order.order_type, order.price) {
                (OrderType::Market, _) => self.best_bid().is_some(),
                (_, Some(price)) => self.best_bid().map(|bid| price <= bid).unwrap_or(false),
                _ => false,
            },
        }
    }

    /// Read-only walk to determine how much of `order` could be filled right
    /// now, honoring slippage bounds and self-trade skipping, without
    /// mutating book state. Used for the FOK pre-check (rule 4): FOK orders
    /// must reject atomically with zero state change if unfillable, so this
    /// must never be allowed to cancel the self-trade makers it passes over.
    fn simulate_fillable(&self, order: &Order) -> Fixed18 {
        let levels: Box<dyn Iterator<Item = (&i128, &Level)>> = match order.side {
            Side::Buy => Box::new(self.asks.iter()),
            Side::Sell => Box::new(self.bids.iter()),
        };
        let mut filled = Fixed18::ZERO;
        let mut remaining = order.remaining_qty();
        for (key, level) in levels {
            if remaining.is_zero() {
                break;
            }
            let level_price = match order.side {
                Side::Buy => Fixed18::from_raw(*key),
                Side::Sell => Fixed18::from_raw(-*key),
            };
            if !self.level_crosses(order, level_price) {
                break;
            }
            for maker in level {
                if maker.trader == order.trader {
                    continue;
                }
                let take = maker.visible_qty().min(remaining);
                filled = filled.checked_add(take).unwrap_or(filled);
                remaining = remaining.checked_sub(take).unwrap_or(Fixed18::ZERO);
                if remaining.is_zero() {
                    break;
                }
            }
        }
        filled
    }

    fn level_crosses(&self, order: &Order, level_price: Fixed18) -> bool {
        match order.side {
            Side::Buy => {
                if let Some(max_price) = order.max_price {
                    if level_price > max_price {
                        return false;
                    }
                }
                match order.order_type {
                    OrderType::Market => true,
                    _ => order.price.map(|p| p >= level_price).unwrap_or(false),
                }
            }
            Side::Sell => {
                if let Some(min_price) = order.min_price {
                    if level_price < min_price {
                        return false;
                    }
                }
                match order.order_type {
                    OrderType::Market => true,
                    _ => order.price.map(|p| p <= level_price).unwrap_or(false),
                }
            }
        }
    }

    /// Inserts `order`, returning the fills generated and the resting
    /// residual (if any). Rejections never mutate book state.
    pub fn insert(&mut self, mut order: Order, now: i64) -> Result<MatchOutcome, EngineError> {
        self.validate(&order)?;

        if order.order_type.is_stop() {
            self.stops.push(order);
            return Ok(MatchOutcome::default());
        }

        if order.post_only && self.would_cross(&order) {
            return Err(ValidationError::PostOnlyCross.into());
        }

        if matches!(order.tif, TimeInForce::Fok) {
            let fillable = self.simulate_fillable(&order);
            if fillable < order.remaining_qty() {
                return Err(ValidationError::FokUnfillable.into());
            }
        }

        let fills = self.walk_and_match(&mut order, now);

        let rests = match order.tif {
            TimeInForce::Gtc | TimeInForce::Gtd { .. } => {
                !order.remaining_qty().is_zero() && order.order_type != OrderType::Market
            }
            TimeInForce::Ioc | TimeInForce::Fok => false,
        };

        order.updated_ts = now;
        if order.remaining_qty().is_zero() {
            order.status = OrderStatus::Filled;
        } else if !order.filled_qty.is_zero() {
            order.status = if rests { OrderStatus::Partial } else { OrderStatus::Cancelled };
        } else {
            order.status = if rests { OrderStatus::Pending } else { OrderStatus::Cancelled };
        }

        if rests && !order.is_terminal() {
            self.rest(order.clone());
        }

        Ok(MatchOutcome {
            fills,
            order: Some(order),
        })
    }

    /// The actual matching walk: mutates the opposing side of the book,
    /// filling FIFO within each level, skipping (and cancelling) same-trader
    /// makers (rule 10), and refilling ICEBERG slices at the tail of their
    /// level on full visible-fill (rule 8).
    fn walk_and_match(&mut self, taker: &mut Order, now: i64) -> Vec<Fill> {
        let mut fills = Vec::new();
        loop {
            if taker.remaining_qty().is_zero() {
                break;
            }
            let key = match taker.side {
                Side::Buy => self.asks.keys().next().copied(),
                Side::Sell => self.bids.keys().next().copied(),
            };
            let Some(key) = key else { break };
            let level_price = match taker.side {
                Side::Buy => Fixed18::from_raw(key),
                Side::Sell => Fixed18::from_raw(-key),
            };
            if !self.level_crosses(taker, level_price) {
                break;
            }

            let opposing = match taker.side {
                Side::Buy => &mut self.asks,
                Side::Sell => &mut self.bids,
            };
            let level = opposing.get_mut(&key).expect("level present for cached key");

            while let Some(maker) = level.front_mut() {
                if taker.remaining_qty().is_zero() {
                    break;
                }
                if maker.trader == taker.trader {
                    let cancelled = level.pop_front().expect("front exists");
                    self.index.remove(&cancelled.order_id);
                    continue;
                }
                let take = maker.visible_qty().min(taker.remaining_qty());
                maker.filled_qty = maker.filled_qty.checked_add(take).unwrap_or(maker.filled_qty);
                taker.filled_qty = taker.filled_qty.checked_add(take).unwrap_or(taker.filled_qty);
                maker.updated_ts = now;

                fills.push(Fill {
                    maker_order_id: maker.order_id,
                    taker_order_id: taker.order_id,
                    maker_trader: maker.trader.clone(),
                    taker_trader: taker.trader.clone(),
                    market_id: self.market_id.clone(),
                    price: level_price,
                    qty: take,
                    taker_side: taker.side,
                    ts: now,
                });

                let maker_done = maker.remaining_qty().is_zero();
                if maker_done {
                    if maker.order_type == OrderType::Iceberg {
                        // Slice fully shown was consumed; if hidden qty remains
                        // this maker would have been re-enqueued by the caller
                        // before reaching here in a full iceberg slice-refill
                        // implementation. With remaining_qty()==0 there is no
                        // hidden quantity left, so it is simply done.
                        maker.status = OrderStatus::Filled;
                    } else {
                        maker.status = OrderStatus::Filled;
                    }
                    let done = level.pop_front().expect("front exists");
                    self.index.remove(&done.order_id);
                } else {
                    maker.status = OrderStatus::Partial;
                    if maker.order_type == OrderType::Iceberg {
                        // Visible slice fully consumed but hidden quantity
                        // remains: move to the tail of the level, losing
                        // time priority within it (rule 8).
                        let mut requeued = level.pop_front().expect("front exists");
                        requeued.status = OrderStatus::Partial;
                        level.push_back(requeued);
                    }
                }
            }

            if level.is_empty() {
                opposing.remove(&key);
            }
        }
        fills
    }

    fn rest(&mut self, order: Order) {
        let key = match order.side {
            Side::Buy => bid_key(order.price.expect("limit order has price")),
            Side::Sell => ask_key(order.price.expect("limit order has price")),
        };
        self.index.insert(
            order.order_id,
            OrderLocation { side: order.side, key },
        );
        let level = match order.side {
            Side::Buy => self.bids.entry(key).or_default(),
            Side::Sell => self.asks.entry(key).or_default(),
        };
        level.push_back(order);
    }

    pub fn cancel(&mut self, order_id: OrderId, now: i64) -> Result<Order, EngineError> {
        let loc = self
            .index
            .remove(&order_id)
            .ok_or_else(|| crate::error::ConflictError::OrderAlreadyTerminal(0))?;
        let map = match loc.side {
            Side::Buy => &mut self.bids,
            Side::Sell => &mut self.asks,
        };
        let level = map.get_mut(&loc.key).expect("indexed level present");
        let pos = level
            .iter()
            .position(|o| o.order_id == order_id)
            .expect("indexed order present in level");
        let mut order = level.remove(pos).expect("position valid");
        if level.is_empty() {
            map.remove(&loc.key);
        }
        order.status = OrderStatus::Cancelled;
        order.updated_ts = now;
        Ok(order)
    }

    /// Atomically changes a resting order's price and/or quantity.
    /// Semantically equivalent to cancel+insert: when the price is
    /// unchanged and the new quantity does not exceed the old one the
    /// order keeps its place in the FIFO queue (a pure in-place shrink
    /// cannot newly cross, so no re-match is needed); any other change
    /// loses time priority and re-enters matching at the tail of its new
    /// level, which may generate fresh fills.
    pub fn modify(
        &mut self,
        order_id: OrderId,
        new_price: Fixed18,
        new_qty: Fixed18,
        now: i64,
    ) -> Result<MatchOutcome, EngineError> {
        let loc = *self
            .index
            .get(&order_id)
            .ok_or_else(|| crate::error::ConflictError::OrderAlreadyTerminal(0))?;
        let existing = {
            let map = match loc.side {
                Side::Buy => &self.bids,
                Side::Sell => &self.asks,
            };
            map.get(&loc.key)
                .and_then(|level| level.iter().find(|o| o.order_id == order_id))
                .expect("indexed order present in level")
                .clone()
        };

        if !existing.order_type.requires_price() {
            return Err(ValidationError::InvalidPrice("only priced orders can be modified".into()).into());
        }
        if new_qty.is_negative() || new_qty.is_zero() {
            return Err(ValidationError::InvalidQty("qty must be positive".into()).into());
        }
        if !self.lot_size.is_zero() && new_qty.raw() % self.lot_size.raw() != 0 {
            return Err(ValidationError::InvalidQty("qty not a multiple of lot_size".into()).into());
        }
        if new_qty < existing.filled_qty {
            return Err(ValidationError::InvalidQty("qty below already-filled quantity".into()).into());
        }
        if new_price.is_negative() || new_price.is_zero() {
            return Err(ValidationError::InvalidPrice("price must be positive".into()).into());
        }
        if !self.tick_size.is_zero() && new_price.raw() % self.tick_size.raw() != 0 {
            return Err(ValidationError::InvalidPrice("price not a multiple of tick_size".into()).into());
        }

        let preserves_priority = existing.price == Some(new_price) && new_qty <= existing.qty;

        if preserves_priority {
            let map = match loc.side {
                Side::Buy => &mut self.bids,
                Side::Sell => &mut self.asks,
            };
            let level = map.get_mut(&loc.key).expect("indexed level present");
            let order = level
                .iter_mut()
                .find(|o| o.order_id == order_id)
                .expect("indexed order present in level");
            order.qty = new_qty;
            order.updated_ts = now;
            if order.remaining_qty().is_zero() {
                order.status = OrderStatus::Filled;
            } else if !order.filled_qty.is_zero() {
                order.status = OrderStatus::Partial;
            }
            let updated = order.clone();
            if updated.remaining_qty().is_zero() {
                level.retain(|o| o.order_id != order_id);
                self.index.remove(&order_id);
                if level.is_empty() {
                    map.remove(&loc.key);
                }
            }
            return Ok(MatchOutcome { fills: Vec::new(), order: Some(updated) });
        }

        // Price changed, or quantity grew: the order loses time priority
        // and is re-run through the normal insert pipeline, which may
        // cross the book under its new price.
        let mut order = self.cancel(order_id, now)?;
        order.price = Some(new_price);
        order.qty = new_qty;
        order.status = OrderStatus::Pending;
        order.updated_ts = now;
        self.insert(order, now)
    }

    /// Removes every resting order whose GTD deadline has passed, marking
    /// each EXPIRED. Called by the per-market expiry scan.
    pub fn expire_due(&mut self, now: i64) -> Vec<Order> {
        let mut expired = Vec::new();
        for map in [&mut self.bids, &mut self.asks] {
            let keys: Vec<i128> = map.keys().copied().collect();
            for key in keys {
                if let Some(level) = map.get_mut(&key) {
                    let mut i = 0;
                    while i < level.len() {
                        let due = level[i].deadline().map(|d| now >= d).unwrap_or(false);
                        if due {
                            let mut order = level.remove(i).expect("index in bounds");
                            self.index.remove(&order.order_id);
                            order.status = OrderStatus::Expired;
                            order.updated_ts = now;
                            expired.push(order);
                        } else {
                            i += 1;
                        }
                    }
                    if level.is_empty() {
                        map.remove(&key);
                    }
                }
            }
        }
        expired
    }

    /// Returns stop orders whose trigger has crossed `mark_price`, removing
    /// them from the pending-stop set so the caller can re-insert them as
    /// live LIMIT/MARKET orders (rule 9).
    pub fn triggered_stops(&mut self, mark_price: Fixed18) -> Vec<Order> {
        let mut triggered = Vec::new();
        let mut remaining = Vec::new();
        for stop in self.stops.drain(..) {
            let trigger = stop.stop_price.expect("stop order carries stop_price");
            let crossed = match stop.side {
                Side::Buy => mark_price >= trigger,
                Side::Sell => mark_price <= trigger,
            };
            if crossed {
                triggered.push(stop);
            } else {
                remaining.push(stop);
            }
        }
        self.stops = remaining;
        triggered
    }
}

fn level_qty(level: &Level) -> Fixed18 {
    level
        .iter()
        .fold(Fixed18::ZERO, |acc, o| acc.checked_add(o.remaining_qty()).unwrap_or(acc))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn order(id: OrderId, trader: &str, side: Side, price: &str, qty: &str, tif: TimeInForce) -> Order {
        Order {
            order_id: id,
            trader: trader.to_string(),
            market_id: "m1".into(),
            side,
            order_type: OrderType::Limit,
            qty: qty.parse().unwrap(),
            filled_qty: Fixed18::ZERO,
            price: Some(price.parse().unwrap()),
            stop_price: None,
            display_qty: None,
            tif,
            post_only: false,
            min_price: None,
            max_price: None,
            status: OrderStatus::Pending,
            created_ts: 0,
            updated_ts: 0,
        }
    }

    fn book() -> OrderBook {
        OrderBook::new("m1", "0.01".parse().unwrap(), "0.0001".parse().unwrap())
    }

    #[test]
    fn simple_limit_match_s1() {
        let mut b = book();
        let buy = order(1, "A", Side::Buy, "100.00", "1.0", TimeInForce::Gtc);
        let out = b.insert(buy, 0).unwrap();
        assert!(out.fills.is_empty());
        assert_eq!(out.order.unwrap().status, OrderStatus::Pending);

        let sell = order(2, "B", Side::Sell, "100.00", "1.0", TimeInForce::Ioc);
        let out = b.insert(sell, 1).unwrap();
        assert_eq!(out.fills.len(), 1);
        assert_eq!(out.fills[0].price, "100.00".parse().unwrap());
        assert_eq!(out.fills[0].qty, "1.0".parse().unwrap());
        assert_eq!(out.order.unwrap().status, OrderStatus::Filled);
        assert!(b.best_bid().is_none());
    }

    #[test]
    fn post_only_rejected_on_cross_s2() {
        let mut b = book();
        let sell = order(1, "B", Side::Sell, "100.00", "1.0", TimeInForce::Gtc);
        b.insert(sell, 0).unwrap();

        let mut buy = order(2, "A", Side::Buy, "100.00", "1.0", TimeInForce::Gtc);
        buy.post_only = true;
        let err = b.insert(buy, 1).unwrap_err();
        assert_eq!(err.kind(), "PostOnlyCross");
        assert!(b.index.contains_key(&1));
    }

    #[test]
    fn fok_unfillable_rejects_with_no_state_change_s3() {
        let mut b = book();
        b.insert(order(1, "B1", Side::Sell, "100.00", "0.5", TimeInForce::Gtc), 0)
            .unwrap();
        b.insert(order(2, "B2", Side::Sell, "100.10", "2.0", TimeInForce::Gtc), 0)
            .unwrap();

        let mut taker = order(3, "A", Side::Buy, "100.05", "1.0", TimeInForce::Fok);
        taker.max_price = Some("100.05".parse().unwrap());
        let err = b.insert(taker, 1).unwrap_err();
        assert_eq!(err.kind(), "FOKUnfillable");
        // no state change: both maker orders still resting untouched
        assert!(b.index.contains_key(&1));
        assert!(b.index.contains_key(&2));
    }

    #[test]
    fn fifo_priority_same_price() {
        let mut b = book();
        b.insert(order(1, "B1", Side::Sell, "100.00", "1.0", TimeInForce::Gtc), 0)
            .unwrap();
        b.insert(order(2, "B2", Side::Sell, "100.00", "1.0", TimeInForce::Gtc), 1)
            .unwrap();

        let taker = order(3, "A", Side::Buy, "100.00", "1.0", TimeInForce::Ioc);
        let out = b.insert(taker, 2).unwrap();
        assert_eq!(out.fills.len(), 1);
        assert_eq!(out.fills[0].maker_order_id, 1);
    }

    #[test]
    fn self_trade_prevention_cancels_maker() {
        let mut b = book();
        b.insert(order(1, "A", Side::Sell, "100.00", "1.0", TimeInForce::Gtc), 0)
            .unwrap();
        let taker = order(2, "A", Side::Buy, "100.00", "1.0", TimeInForce::Ioc);
        let out = b.insert(taker, 1).unwrap();
        assert!(out.fills.is_empty());
        assert!(!b.index.contains_key(&1));
        assert!(b.best_ask().is_none());
    }

    #[test]
    fn cancel_removes_resting_order() {
        let mut b = book();
        b.insert(order(1, "A", Side::Buy, "100.00", "1.0", TimeInForce::Gtc), 0)
            .unwrap();
        let cancelled = b.cancel(1, 1).unwrap();
        assert_eq!(cancelled.status, OrderStatus::Cancelled);
        assert!(b.best_bid().is_none());
    }

    #[test]
    fn modify_preserves_priority_on_qty_reduction() {
        let mut b = book();
        b.insert(order(1, "B1", Side::Buy, "100.00", "2.0", TimeInForce::Gtc), 0)
            .unwrap();
        b.insert(order(2, "B2", Side::Buy, "100.00", "1.0", TimeInForce::Gtc), 1)
            .unwrap();

        let out = b.modify(1, "100.00".parse().unwrap(), "1.0".parse().unwrap(), 2).unwrap();
        assert!(out.fills.is_empty());
        assert_eq!(out.order.unwrap().qty, "1.0".parse().unwrap());

        // order 1 kept its place at the front of the level
        let sell = order(3, "A", Side::Sell, "100.00", "1.0", TimeInForce::Ioc);
        let out = b.insert(sell, 3).unwrap();
        assert_eq!(out.fills[0].maker_order_id, 1);
    }

    #[test]
    fn modify_loses_priority_on_price_change() {
        let mut b = book();
        b.insert(order(1, "B1", Side::Buy, "100.00", "1.0", TimeInForce::Gtc), 0)
            .unwrap();
        b.insert(order(2, "B2", Side::Buy, "100.00", "1.0", TimeInForce::Gtc), 1)
            .unwrap();

        b.modify(1, "100.00".parse().unwrap(), "1.0".parse().unwrap(), 2).unwrap();

        let sell = order(3, "A", Side::Sell, "100.00", "1.0", TimeInForce::Ioc);
        let out = b.insert(sell, 3).unwrap();
        // order 1 re-entered at the tail, so order 2 now fills first
        assert_eq!(out.fills[0].maker_order_id, 2);
    }

    #[test]
    fn modify_can_cross_and_fill_immediately() {
        let mut b = book();
        b.insert(order(1, "A", Side::Buy, "99.00", "1.0", TimeInForce::Gtc), 0)
            .unwrap();
        b.insert(order(2, "B", Side::Sell, "100.00", "1.0", TimeInForce::Gtc), 1)
            .unwrap();

        let out = b.modify(1, "100.00".parse().unwrap(), "1.0".parse().unwrap(), 2).unwrap();
        assert_eq!(out.fills.len(), 1);
        assert_eq!(out.fills[0].maker_order_id, 2);
    }

    #[test]
    fn modify_rejects_unknown_order() {
        let mut b = book();
        let err = b.modify(99, "100.00".parse().unwrap(), "1.0".parse().unwrap(), 0).unwrap_err();
        assert_eq!(err.kind(), "OrderAlreadyTerminal");
    }

    #[test]
    fn expiry_scan_removes_due_gtd_orders() {
        let mut b = book();
        b.insert(
            order(1, "A", Side::Buy, "100.00", "1.0", TimeInForce::Gtd { deadline: 10 }),
            0,
        )
        .unwrap();
        assert!(b.expire_due(5).is_empty());
        let expired = b.expire_due(11);
        assert_eq!(expired.len(), 1);
        assert_eq!(expired[0].status, OrderStatus::Expired);
    }
}
