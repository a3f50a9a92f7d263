//! Applies admitted chain events to the vault and market registry, and
//! reconciles the off-chain ledger's view of a position against on-chain
//! truth, logging and counting drift rather than silently overwriting it:
//! `warn!` plus a metric, never a silent fix-up.

use crate::fixed::{native_raw_to_fixed18, Fixed18};
use crate::ingest::events::{ChainEvent, DedupCache, EventKind};
use crate::market::{Market, MarketRegistry, MarketStatus};
use crate::vault::TraderHandle;
use std::collections::HashMap;
use tracing::warn;

pub struct PositionDrift {
    pub market_id: String,
    pub trader: String,
    pub ledger_size: Fixed18,
    pub onchain_size: Fixed18,
}

pub struct ReconcileOutcome {
    pub applied: usize,
    pub duplicates: usize,
    pub drifts: Vec<PositionDrift>,
}

/// Drives admitted events to their effects: deposit credits go to the
/// named trader's vault actor; market-creation events register a new
/// market; position events are checked for drift against the in-memory
/// ledger view supplied by the caller (position-close/liquidate events
/// carry no mutation here — the matching/liquidation engines already
/// applied them locally, this only detects disagreement).
pub async fn apply_event(
    event: ChainEvent,
    dedup: &mut DedupCache,
    registry: &MarketRegistry,
    traders: &HashMap<String, TraderHandle>,
    ledger_positions: &HashMap<(String, String), Fixed18>,
    drifts: &mut Vec<PositionDrift>,
) -> bool {
    if !dedup.admit(&event).unwrap_or(false) {
        return false;
    }

    match event.kind {
        EventKind::DepositCredit { trader, amount_6d, deposit_key, .. } => {
            if !dedup.admit_deposit_key(&deposit_key) {
                return true;
            }
            if let Some(handle) = traders.get(&trader) {
                let amount = native_raw_to_fixed18(amount_6d as i128, 6).unwrap_or(Fixed18::from_raw(0));
                handle.credit_from_bridge(amount).await;
            }
        }
        EventKind::MarketCreated { market_id, symbol, .. } => {
            let now = 0;
            let market = Market {
                market_id: market_id.clone(),
                symbol,
                collateral_token: "USDC".into(),
                collateral_decimals: 6,
                tick_size: Fixed18::from_raw(10_000_000_000_000),
                lot_size: Fixed18::from_raw(10_000_000_000_000),
                max_leverage: 20,
                trading_fee_bps: 30,
                maintenance_margin_bps: 500,
                liquidation_fee_bps: 100,
                status: MarketStatus::Draft,
                starting_price: Fixed18::from_raw(0),
                mark_price: Fixed18::from_raw(0),
                index_price: Fixed18::from_raw(0),
                creator: "bridge".into(),
                created_at: now,
                updated_at: now,
            };
            let _ = registry.insert(market);
        }
        EventKind::PositionOpened { market_id, trader, size_raw, .. }
        | EventKind::PositionClosed { market_id, trader, realized_pnl_raw: size_raw, .. }
        | EventKind::PositionLiquidated { market_id, trader, closed_size_raw: size_raw, .. } => {
            check_position_drift(&market_id, &trader, Fixed18::from_raw(size_raw), ledger_positions, drifts);
        }
    }
    true
}

fn check_position_drift(
    market_id: &str,
    trader: &str,
    onchain_size: Fixed18,
    ledger_positions: &HashMap<(String, String), Fixed18>,
    drifts: &mut Vec<PositionDrift>,
) {
    let ledger_size = *ledger_positions
        .get(&(market_id.to_string(), trader.to_string()))
        .unwrap_or(&Fixed18::from_raw(0));
    if ledger_size != onchain_size {
        warn!(
            market_id,
            trader,
            ledger_size = %ledger_size,
            onchain_size = %onchain_size,
            "ledger position drifted from on-chain truth"
        );
        drifts.push(PositionDrift {
            market_id: market_id.to_string(),
            trader: trader.to_string(),
            ledger_size,
            onchain_size,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingest::events::ChainEvent;

    #[test]
    fn matching_positions_produce_no_drift() {
        let mut drifts = Vec::new();
        let mut ledger = HashMap::new();
        ledger.insert(("GOLD".to_string(), "0xabc".to_string()), Fixed18::from_i64(5));
        check_position_drift("GOLD", "0xabc", Fixed18::from_i64(5), &ledger, &mut drifts);
        assert!(drifts.is_empty());
    }

    #[test]
    fn mismatched_positions_are_reported_not_overwritten() {
        let mut drifts = Vec::new();
        let ledger = HashMap::new();
        check_position_drift("GOLD", "0xabc", Fixed18::from_i64(3), &ledger, &mut drifts);
        assert_eq!(drifts.len(), 1);
        assert_eq!(drifts[0].onchain_size, Fixed18::from_i64(3));
        assert_eq!(drifts[0].ledger_size, Fixed18::from_raw(0));
    }

    #[tokio::test]
    async fn duplicate_deposit_key_credited_exactly_once() {
        let registry = MarketRegistry::new();
        let traders: HashMap<String, TraderHandle> = HashMap::new();
        let mut dedup = DedupCache::new();
        let ledger = HashMap::new();
        let mut drifts = Vec::new();

        let event = ChainEvent {
            tx_hash: "0xaaa".into(),
            log_index: 1,
            block_number: 10,
            contract_address: "0xvault".into(),
            kind: EventKind::DepositCredit {
                trader: "0xabc".into(),
                amount_6d: 500_000_000,
                deposit_key: "dk-1".into(),
                src_chain_id: 1,
            },
        };
        let event2 = ChainEvent { log_index: 2, ..clone_event(&event) };

        assert!(apply_event(event, &mut dedup, &registry, &traders, &ledger, &mut drifts).await);
        assert!(apply_event(event2, &mut dedup, &registry, &traders, &ledger, &mut drifts).await);
        assert_eq!(dedup.dropped_missing_log_index_total(), 0);
    }

    fn clone_event(e: &ChainEvent) -> ChainEvent {
        ChainEvent {
            tx_hash: e.tx_hash.clone(),
            log_index: e.log_index,
            block_number: e.block_number,
            contract_address: e.contract_address.clone(),
            kind: e.kind.clone(),
        }
    }
}
