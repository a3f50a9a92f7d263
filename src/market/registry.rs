//! In-memory market catalog behind an `ArcSwap`, backed by the `markets`
//! table and keyed by the on-chain-derived `market_id`. Supports runtime
//! mutation (pause/resume/settle) rather than being a frozen snapshot.

use crate::error::{ConflictError, EngineError};
use crate::fixed::Fixed18;
use crate::market::types::{Market, MarketStatus};
use arc_swap::ArcSwap;
use std::collections::HashMap;
use std::sync::Arc;

#[derive(Debug, Clone, Default)]
struct Catalog {
    by_id: HashMap<String, Arc<Market>>,
    by_symbol: HashMap<String, String>,
}

/// Versioned, concurrently-readable market catalog. Reads never block;
/// writes (market creation, status transitions, mark-price updates) replace
/// the whole snapshot, which is cheap because `Market` is small and the
/// catalog is expected to hold at most a few thousand entries.
pub struct MarketRegistry {
    catalog: ArcSwap<Catalog>,
}

impl MarketRegistry {
    pub fn new() -> Self {
        Self {
            catalog: ArcSwap::from_pointee(Catalog::default()),
        }
    }

    pub fn get(&self, market_id: &str) -> Option<Arc<Market>> {
        self.catalog.load().by_id.get(market_id).cloned()
    }

    pub fn get_by_symbol(&self, symbol: &str) -> Option<Arc<Market>> {
        let snapshot = self.catalog.load();
        let market_id = snapshot.by_symbol.get(symbol)?;
        snapshot.by_id.get(market_id).cloned()
    }

    pub fn list(&self) -> Vec<Arc<Market>> {
        self.catalog.load().by_id.values().cloned().collect()
    }

    /// Inserts a newly-discovered market (DRAFT). Symbol uniqueness is
    /// enforced here since it is the registry's own invariant, distinct from
    /// the persisted table's unique index which guards against concurrent
    /// writers across processes.
    pub fn insert(&self, market: Market) -> Result<(), EngineError> {
        if self.get_by_symbol(&market.symbol).is_some() {
            return Err(ConflictError::OrderAlreadyTerminal(0).into());
        }
        self.catalog.rcu(|prev| {
            let mut next = (**prev).clone();
            next.by_symbol
                .insert(market.symbol.clone(), market.market_id.clone());
            next.by_id.insert(market.market_id.clone(), Arc::new(market.clone()));
            next
        });
        Ok(())
    }

    pub fn transition(&self, market_id: &str, next_status: MarketStatus) -> Result<(), EngineError> {
        let current = self
            .get(market_id)
            .ok_or_else(|| ConflictError::OrderAlreadyTerminal(0))?;
        if !current.status.can_transition_to(next_status) {
            return Err(ConflictError::OrderAlreadyTerminal(0).into());
        }
        self.catalog.rcu(|prev| {
            let mut next = (**prev).clone();
            if let Some(slot) = next.by_id.get_mut(market_id) {
                let mut updated = (**slot).clone();
                updated.status = next_status;
                *slot = Arc::new(updated);
            }
            next
        });
        Ok(())
    }

    pub fn update_prices(&self, market_id: &str, mark_price: Fixed18, index_price: Fixed18) {
        self.catalog.rcu(|prev| {
            let mut next = (**prev).clone();
            if let Some(slot) = next.by_id.get_mut(market_id) {
                let mut updated = (**slot).clone();
                updated.mark_price = mark_price;
                updated.index_price = index_price;
                *slot = Arc::new(updated);
            }
            next
        });
    }
}

impl Default for MarketRegistry {
    fn default() -> Self {
        Self::new()
    }
}
