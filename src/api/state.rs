//! Shared application state handed to every axum handler: a small `Clone`
//! struct of `Arc`s and lock-wrapped maps, not a god object.

use crate::auth::JwtHandler;
use crate::book::BookHandle;
use crate::config::Config;
use crate::dispatch::{KillSwitch, NonceAllocator, SignerPool};
use crate::gateway::{Eip712Domain, GatewayRateLimiter, NonceStore, PolicyConfig, Session};
use crate::liquidation::LiquidationQueue;
use crate::market::MarketRegistry;
use crate::vault::TraderHandle;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub registry: Arc<MarketRegistry>,
    pub books: Arc<Mutex<HashMap<String, BookHandle>>>,
    pub traders: Arc<Mutex<HashMap<String, TraderHandle>>>,
    pub sessions: Arc<Mutex<HashMap<String, Session>>>,
    pub nonces: Arc<Mutex<NonceStore>>,
    pub rate_limiter: Arc<GatewayRateLimiter>,
    pub policy: Arc<PolicyConfig>,
    pub eip712_domain: Arc<Eip712Domain>,
    pub relayer_set_roots: Arc<Vec<String>>,
    pub liquidation_queue: Arc<Mutex<LiquidationQueue>>,
    pub nonce_allocator: Arc<NonceAllocator>,
    pub signer_pool: Arc<Mutex<SignerPool>>,
    pub kill_switch: Arc<KillSwitch>,
    pub order_id_seq: Arc<AtomicU64>,
    /// Validates the operator/admin JWT bearer token; distinct from trader
    /// auth, which is verified per-request by EIP-712 signature.
    pub jwt_handler: Arc<JwtHandler>,
}

impl AppState {
    pub async fn book_for(&self, market_id: &str) -> Option<BookHandle> {
        self.books.lock().await.get(market_id).cloned()
    }

    pub async fn trader_handle(&self, trader: &str) -> Option<TraderHandle> {
        self.traders.lock().await.get(trader).cloned()
    }

    /// Returns the trader's actor, spawning one on first contact. Traders
    /// are not pre-registered: the first order, deposit credit, or position
    /// event for an address brings its vault actor into existence.
    pub async fn get_or_spawn_trader(&self, trader: &str) -> TraderHandle {
        let mut table = self.traders.lock().await;
        if let Some(handle) = table.get(trader) {
            return handle.clone();
        }
        let (handle, _join) = crate::vault::spawn_trader_actor(trader);
        table.insert(trader.to_string(), handle.clone());
        handle
    }

    /// Returns the book actor for `market_id`, spawning one from the
    /// registry's tick/lot sizes on first contact.
    pub async fn get_or_spawn_book(&self, market_id: &str) -> Option<BookHandle> {
        let mut table = self.books.lock().await;
        if let Some(handle) = table.get(market_id) {
            return Some(handle.clone());
        }
        let market = self.registry.get(market_id)?;
        let book = crate::book::OrderBook::new(market_id.to_string(), market.tick_size, market.lot_size);
        let (handle, _join) = crate::book::spawn_book_actor(book);
        table.insert(market_id.to_string(), handle.clone());
        Some(handle)
    }

    /// Allocates a process-local, strictly increasing order id. Uniqueness
    /// across restarts is the persisted `orders` table's `order_id` primary
    /// key, not this counter; this only orders ids within one process's
    /// lifetime.
    pub fn next_order_id(&self) -> u128 {
        self.order_id_seq.fetch_add(1, Ordering::Relaxed) as u128
    }
}
