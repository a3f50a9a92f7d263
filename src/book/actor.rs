//! Per-market actor: a single task owns the `OrderBook` exclusively and
//! serializes every mutation through an `mpsc` channel, per the concurrency
//! model's requirement that all book mutations for a given market are
//! totally ordered. Readers that only need best bid/ask or depth can bypass
//! the channel and read a lock-free `ArcSwap` snapshot instead, published
//! after every mutating command.

use crate::book::order_book::OrderBook;
use crate::book::types::{BookLevelView, MatchOutcome, Order, OrderId};
use crate::error::EngineError;
use crate::fixed::Fixed18;
use arc_swap::ArcSwap;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};

#[derive(Debug, Clone, Default)]
pub struct BookSnapshot {
    pub best_bid: Option<Fixed18>,
    pub best_ask: Option<Fixed18>,
    pub bids: Vec<BookLevelView>,
    pub asks: Vec<BookLevelView>,
}

enum Command {
    Insert {
        order: Order,
        now: i64,
        reply: oneshot::Sender<Result<MatchOutcome, EngineError>>,
    },
    Cancel {
        order_id: OrderId,
        now: i64,
        reply: oneshot::Sender<Result<Order, EngineError>>,
    },
    Modify {
        order_id: OrderId,
        new_price: Fixed18,
        new_qty: Fixed18,
        now: i64,
        reply: oneshot::Sender<Result<MatchOutcome, EngineError>>,
    },
    ExpireDue {
        now: i64,
        reply: oneshot::Sender<Vec<Order>>,
    },
    TriggerStops {
        mark_price: Fixed18,
        reply: oneshot::Sender<Vec<Order>>,
    },
}

/// Handle held by callers (the gateway, the expiry scanner, the liquidation
/// worker). Cloning is cheap; the underlying channel and snapshot are shared.
#[derive(Clone)]
pub struct BookHandle {
    tx: mpsc::Sender<Command>,
    snapshot: Arc<ArcSwap<BookSnapshot>>,
}

impl BookHandle {
    pub async fn insert(&self, order: Order, now: i64) -> Result<MatchOutcome, EngineError> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(Command::Insert { order, now, reply })
            .await
            .map_err(|_| crate::error::TransientError::DbBusy)?;
        rx.await.map_err(|_| crate::error::TransientError::DbBusy)?
    }

    pub async fn cancel(&self, order_id: OrderId, now: i64) -> Result<Order, EngineError> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(Command::Cancel { order_id, now, reply })
            .await
            .map_err(|_| crate::error::TransientError::DbBusy)?;
        rx.await.map_err(|_| crate::error::TransientError::DbBusy)?
    }

    pub async fn modify(
        &self,
        order_id: OrderId,
        new_price: Fixed18,
        new_qty: Fixed18,
        now: i64,
    ) -> Result<MatchOutcome, EngineError> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(Command::Modify { order_id, new_price, new_qty, now, reply })
            .await
            .map_err(|_| crate::error::TransientError::DbBusy)?;
        rx.await.map_err(|_| crate::error::TransientError::DbBusy)?
    }

    pub async fn expire_due(&self, now: i64) -> Vec<Order> {
        let (reply, rx) = oneshot::channel();
        if self.tx.send(Command::ExpireDue { now, reply }).await.is_err() {
            return Vec::new();
        }
        rx.await.unwrap_or_default()
    }

    pub async fn trigger_stops(&self, mark_price: Fixed18) -> Vec<Order> {
        let (reply, rx) = oneshot::channel();
        if self
            .tx
            .send(Command::TriggerStops { mark_price, reply })
            .await
            .is_err()
        {
            return Vec::new();
        }
        rx.await.unwrap_or_default()
    }

    /// Lock-free read of the most recently published snapshot; never
    /// contends with the actor's mutation loop.
    pub fn snapshot(&self) -> Arc<BookSnapshot> {
        self.snapshot.load_full()
    }
}

pub fn spawn_book_actor(mut book: OrderBook) -> (BookHandle, tokio::task::JoinHandle<()>) {
    let (tx, mut rx) = mpsc::channel::<Command>(1024);
    let snapshot = Arc::new(ArcSwap::from_pointee(BookSnapshot::default()));
    let snapshot_for_task = snapshot.clone();

    let join = tokio::spawn(async move {
        while let Some(cmd) = rx.recv().await {
            match cmd {
                Command::Insert { order, now, reply } => {
                    let result = book.insert(order, now);
                    publish_snapshot(&book, &snapshot_for_task);
                    let _ = reply.send(result);
                }
                Command::Cancel { order_id, now, reply } => {
                    let result = book.cancel(order_id, now);
                    publish_snapshot(&book, &snapshot_for_task);
                    let _ = reply.send(result);
                }
                Command::Modify { order_id, new_price, new_qty, now, reply } => {
                    let result = book.modify(order_id, new_price, new_qty, now);
                    publish_snapshot(&book, &snapshot_for_task);
                    let _ = reply.send(result);
                }
                Command::ExpireDue { now, reply } => {
                    let expired = book.expire_due(now);
                    publish_snapshot(&book, &snapshot_for_task);
                    let _ = reply.send(expired);
                }
                Command::TriggerStops { mark_price, reply } => {
                    let triggered = book.triggered_stops(mark_price);
                    let _ = reply.send(triggered);
                }
            }
        }
    });

    (BookHandle { tx, snapshot }, join)
}

fn publish_snapshot(book: &OrderBook, slot: &ArcSwap<BookSnapshot>) {
    let (bids, asks) = book.depth(50);
    slot.store(Arc::new(BookSnapshot {
        best_bid: book.best_bid(),
        best_ask: book.best_ask(),
        bids: bids
            .into_iter()
            .map(|(price, qty)| BookLevelView { price, qty, order_count: 0 })
            .collect(),
        asks: asks
            .into_iter()
            .map(|(price, qty)| BookLevelView { price, qty, order_count: 0 })
            .collect(),
    }));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::book::types::{OrderStatus, OrderType, Side, TimeInForce};

    fn sample_order(id: OrderId, trader: &str, side: Side, price: &str, qty: &str) -> Order {
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
            tif: TimeInForce::Gtc,
            post_only: false,
            min_price: None,
            max_price: None,
            status: OrderStatus::Pending,
            created_ts: 0,
            updated_ts: 0,
        }
    }

    #[tokio::test]
    async fn actor_serializes_inserts_and_publishes_snapshot() {
        let book = OrderBook::new("m1", "0.01".parse().unwrap(), "0.0001".parse().unwrap());
        let (handle, _join) = spawn_book_actor(book);

        handle
            .insert(sample_order(1, "A", Side::Buy, "100.00", "1.0"), 0)
            .await
            .unwrap();
        let snap = handle.snapshot();
        assert_eq!(snap.best_bid, Some("100.00".parse().unwrap()));

        let out = handle
            .insert(sample_order(2, "B", Side::Sell, "100.00", "1.0"), 1)
            .await
            .unwrap();
        assert_eq!(out.fills.len(), 1);
    }

    #[tokio::test]
    async fn actor_modify_updates_resting_order() {
        let book = OrderBook::new("m1", "0.01".parse().unwrap(), "0.0001".parse().unwrap());
        let (handle, _join) = spawn_book_actor(book);

        handle
            .insert(sample_order(1, "A", Side::Buy, "100.00", "2.0"), 0)
            .await
            .unwrap();
        let out = handle
            .modify(1, "100.00".parse().unwrap(), "1.0".parse().unwrap(), 1)
            .await
            .unwrap();
        assert_eq!(out.order.unwrap().qty, "1.0".parse().unwrap());
        assert_eq!(handle.snapshot().bids[0].qty, "1.0".parse().unwrap());
    }
}
