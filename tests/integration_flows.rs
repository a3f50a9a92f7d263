//! Cross-module end-to-end flows, driven entirely through the public
//! `perpcore` API: a real book actor matching against a real pair of vault
//! actors, and the liquidation queue/worker/context chain run together
//! rather than against the worker's unit-test fake.

use perpcore::book::types::{Order, OrderStatus, OrderType, Side, TimeInForce};
use perpcore::book::{spawn_book_actor, OrderBook};
use perpcore::execution::settle_fills;
use perpcore::fixed::Fixed18;
use perpcore::liquidation::{EngineLiquidationContext, LiquidationParams, LiquidationQueue, LiquidationWorker, ProcessResult};
use perpcore::market::{Market, MarketRegistry, MarketStatus};
use perpcore::vault::spawn_trader_actor;
use std::collections::HashMap;
use std::sync::atomic::AtomicU64;
use std::sync::Arc;
use tokio::sync::Mutex;

fn gold_market(mark_price: &str) -> Market {
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
        mark_price: mark_price.parse().unwrap(),
        index_price: mark_price.parse().unwrap(),
        creator: "0xcreator".into(),
        created_at: 0,
        updated_at: 0,
    }
}

fn limit_order(id: u128, trader: &str, side: Side, price: &str, qty: &str) -> Order {
    Order {
        order_id: id,
        trader: trader.to_string(),
        market_id: "GOLD/USD".into(),
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

/// A resting limit buy and an incoming limit sell match on a real book
/// actor; the resulting fill is settled against two real vault actors and
/// the trading fee lands on both sides, split creator/protocol.
#[tokio::test]
async fn s1_resting_order_matches_and_settles_with_fee_split() {
    let registry = MarketRegistry::new();
    registry.insert(gold_market("100.00")).unwrap();

    let book = OrderBook::new("GOLD/USD", "0.01".parse().unwrap(), "0.0001".parse().unwrap());
    let (book_handle, _join) = spawn_book_actor(book);

    let (maker, _j1) = spawn_trader_actor("maker");
    let (taker, _j2) = spawn_trader_actor("taker");
    maker.deposit(Fixed18::from_i64(1000)).await;
    taker.deposit(Fixed18::from_i64(1000)).await;
    let traders = Mutex::new(HashMap::from([
        ("maker".to_string(), maker.clone()),
        ("taker".to_string(), taker.clone()),
    ]));

    book_handle.insert(limit_order(1, "maker", Side::Buy, "100.00", "2.0"), 0).await.unwrap();
    let outcome = book_handle.insert(limit_order(2, "taker", Side::Sell, "100.00", "2.0"), 1).await.unwrap();
    assert_eq!(outcome.fills.len(), 1);

    settle_fills(&registry, &traders, "0xtreasury", &outcome.fills).await.unwrap();

    let (maker_account, maker_positions) = maker.snapshot().await.unwrap();
    let (taker_account, taker_positions) = taker.snapshot().await.unwrap();

    assert_eq!(maker_positions[0].size, "2.0".parse().unwrap());
    assert_eq!(taker_positions[0].size, "-2.0".parse().unwrap());

    // notional 200.00 * 30bps = 0.60 total fee, 0.30 per side, debited
    // straight out of each trader's collateral.
    let expected_collateral = "999.70".parse::<Fixed18>().unwrap();
    assert_eq!(maker_account.collateral, expected_collateral);
    assert_eq!(taker_account.collateral, expected_collateral);
}

/// The full liquidation chain run together: a real `EngineLiquidationContext`
/// backed by live book and vault actors, scanned into a real
/// `LiquidationQueue` and drained by a real `LiquidationWorker`, rather than
/// calling `close_at_market` directly or driving the worker against its
/// unit-test fake context.
#[tokio::test]
async fn s4_queue_and_worker_liquidate_an_undercollateralized_long() {
    let registry = Arc::new(MarketRegistry::new());
    registry.insert(gold_market("94.00")).unwrap();

    let book = OrderBook::new("GOLD/USD", "0.01".parse().unwrap(), "0.0001".parse().unwrap());
    let (book_handle, _bjoin) = spawn_book_actor(book);
    let books = Arc::new(Mutex::new(HashMap::from([("GOLD/USD".to_string(), book_handle.clone())])));

    let (liquidatee, _j1) = spawn_trader_actor("liquidatee");
    let (counterparty, _j2) = spawn_trader_actor("counterparty");
    liquidatee.deposit(Fixed18::from_i64(1000)).await;
    counterparty.deposit(Fixed18::from_i64(10_000)).await;

    // Open a 10-unit long at 100.00 with only enough margin that a drop to
    // 94.00 breaches the 5% maintenance margin requirement.
    book_handle.insert(limit_order(1, "counterparty", Side::Sell, "100.00", "10.0"), 0).await.unwrap();
    let open = book_handle.insert(limit_order(2, "liquidatee", Side::Buy, "100.00", "10.0"), 0).await.unwrap();
    let traders = Arc::new(Mutex::new(HashMap::from([
        ("liquidatee".to_string(), liquidatee.clone()),
        ("counterparty".to_string(), counterparty.clone()),
    ])));
    settle_fills(&registry, &traders, "0xtreasury", &open.fills).await.unwrap();

    // Resting bid for the worker's forced close to take.
    book_handle.insert(limit_order(3, "counterparty", Side::Buy, "94.00", "10.0"), 1).await.unwrap();

    let (_, positions_before) = liquidatee.snapshot().await.unwrap();
    let position = positions_before.into_iter().find(|p| p.market_id == "GOLD/USD").unwrap();
    assert!(position.is_liquidatable("94.00".parse().unwrap(), 500));

    let ctx = Arc::new(EngineLiquidationContext::new(
        registry.clone(),
        books,
        traders,
        Arc::new(AtomicU64::new(10)),
        "0xtreasury",
    ));
    let worker = LiquidationWorker::new(
        ctx,
        LiquidationParams { slippage_cap: "0.05".parse().unwrap(), base_backoff_secs: 1, jitter_secs: 0 },
    );
    let queue = Mutex::new(LiquidationQueue::new(100));

    worker.scan_market(&queue, "GOLD/USD", &[position], "94.00".parse().unwrap(), 500, 0).await;
    assert_eq!(queue.lock().await.len(), 1);

    let result = worker.process_one(&queue, 0).await;
    assert_eq!(result, Some(ProcessResult::Closed));
    assert!(queue.lock().await.is_empty());

    let (_, positions_after) = liquidatee.snapshot().await.unwrap();
    assert!(positions_after.into_iter().find(|p| p.market_id == "GOLD/USD").unwrap().is_flat());
}
