//! Event ingestion & reconciliation (C9).

pub mod checkpoint;
pub mod events;
pub mod reconciler;

pub use checkpoint::{CheckpointStore, PullSource, PushSource};
pub use events::{ChainEvent, DedupCache, EventKind};
pub use reconciler::{apply_event, PositionDrift, ReconcileOutcome};

use crate::fixed::Fixed18;
use crate::market::MarketRegistry;
use crate::vault::TraderHandle;
use std::collections::HashMap;

/// Ties a push source, a pull source, the dedup cache and the checkpoint
/// store together into one ingestion sweep. `poll_once` is meant to be
/// called on a fixed interval by the binary's ingestion task; it never
/// blocks on the pull source beyond one bounded range scan.
pub struct EventIngestor<P: PushSource, L: PullSource> {
    pub push: P,
    pub pull: L,
    pub dedup: DedupCache,
    pub checkpoints: CheckpointStore,
}

impl<P: PushSource, L: PullSource> EventIngestor<P, L> {
    pub fn new(push: P, pull: L, confirmations: u64) -> Self {
        Self { push, pull, dedup: DedupCache::new(), checkpoints: CheckpointStore::new(confirmations) }
    }

    /// Drains the push source and, for every monitored contract, pulls the
    /// range between its checkpoint and the chain's safe head. Applies
    /// every admitted event and returns a summary of what happened.
    pub async fn poll_once(
        &mut self,
        registry: &MarketRegistry,
        traders: &HashMap<String, TraderHandle>,
        ledger_positions: &HashMap<(String, String), Fixed18>,
    ) -> ReconcileOutcome {
        let mut applied = 0;
        let mut duplicates = 0;
        let mut drifts = Vec::new();

        for event in self.push.drain().await {
            if apply_event(event, &mut self.dedup, registry, traders, ledger_positions, &mut drifts).await {
                applied += 1;
            } else {
                duplicates += 1;
            }
        }

        let head = self.pull.head_block().await;
        let safe_head = self.checkpoints.safe_head(head);
        for contract in self.checkpoints.monitored_contracts() {
            let from_block = self.checkpoints.last_scanned(&contract);
            if safe_head <= from_block {
                continue;
            }
            let events = self.pull.scan_range(&contract, from_block, safe_head).await;
            for event in events {
                if apply_event(event, &mut self.dedup, registry, traders, ledger_positions, &mut drifts).await {
                    applied += 1;
                } else {
                    duplicates += 1;
                }
            }
            self.checkpoints.advance(&contract, safe_head);
        }

        ReconcileOutcome { applied, duplicates, drifts }
    }
}
