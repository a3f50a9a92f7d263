//! Chain event model and the `(tx_hash, log_index)` dedup gate.
//!
//! The log-index-defaults-to-zero bug (spec history, now a permanent
//! regression test here) came from a transport that renamed its field from
//! `logIndex` to `index` across a version bump; code that unwrapped-or-0
//! silently merged unrelated events under the same key. `extract_log_index`
//! below never does that — a missing/unparseable index is dropped, not
//! defaulted.

use crate::error::{ConflictError, EngineError};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashSet;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event_kind", rename_all = "snake_case")]
pub enum EventKind {
    DepositCredit {
        trader: String,
        amount_6d: u64,
        deposit_key: String,
        src_chain_id: u64,
    },
    PositionOpened {
        market_id: String,
        trader: String,
        size_raw: i128,
        entry_price_raw: i128,
    },
    PositionClosed {
        market_id: String,
        trader: String,
        realized_pnl_raw: i128,
    },
    PositionLiquidated {
        market_id: String,
        trader: String,
        closed_size_raw: i128,
    },
    MarketCreated {
        market_id: String,
        symbol: String,
        book_address: String,
        vault_address: String,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChainEvent {
    pub tx_hash: String,
    pub log_index: u64,
    pub block_number: u64,
    pub contract_address: String,
    pub kind: EventKind,
}

impl ChainEvent {
    pub fn key(&self) -> (String, u64) {
        (self.tx_hash.clone(), self.log_index)
    }
}

/// Reads a log index from a raw transport payload under either field name
/// the observed transports have used (`logIndex` or `index`). Returns
/// `None` — never `Some(0)` as a fallback — when neither field decodes to
/// a non-negative integer.
pub fn extract_log_index(raw: &Value) -> Option<u64> {
    raw.get("logIndex")
        .or_else(|| raw.get("index"))
        .and_then(|v| v.as_u64())
}

/// In-process dedup cache layered in front of the DB unique index on
/// `(tx_hash, log_index)`; the DB constraint is the source of truth, this
/// cache just avoids a round trip for the common case of a source
/// re-delivering its last few events after a reconnect.
pub struct DedupCache {
    seen: HashSet<(String, u64)>,
    deposit_keys_processed: HashSet<String>,
    dropped_missing_log_index_total: u64,
}

impl DedupCache {
    pub fn new() -> Self {
        Self { seen: HashSet::new(), deposit_keys_processed: HashSet::new(), dropped_missing_log_index_total: 0 }
    }

    /// `deposit_key` has its own idempotency track independent of
    /// `(tx_hash, log_index)`: a bridge credit must be applied exactly once
    /// per `deposit_key` even if it somehow arrives under two different
    /// transport-level event keys.
    pub fn admit_deposit_key(&mut self, deposit_key: &str) -> bool {
        self.deposit_keys_processed.insert(deposit_key.to_string())
    }

    /// Admits `event` if its key hasn't been seen. Duplicate insertion is a
    /// silent no-op success per spec, surfaced here as `Ok(false)` so the
    /// caller can skip reprocessing without treating it as an error.
    pub fn admit(&mut self, event: &ChainEvent) -> Result<bool, EngineError> {
        let key = event.key();
        if self.seen.contains(&key) {
            return Ok(false);
        }
        self.seen.insert(key);
        Ok(true)
    }

    /// Called when a raw payload's log index couldn't be extracted. Drops
    /// the event and increments the error-class counter; never defaults to
    /// an index and never panics.
    pub fn record_dropped_missing_log_index(&mut self) {
        self.dropped_missing_log_index_total += 1;
    }

    pub fn dropped_missing_log_index_total(&self) -> u64 {
        self.dropped_missing_log_index_total
    }
}

impl Default for DedupCache {
    fn default() -> Self {
        Self::new()
    }
}

/// Returned when a DB-level uniqueness check (the authoritative gate behind
/// the in-process cache) finds a pre-existing `(tx_hash, log_index)` row.
pub fn duplicate_event_error(event: &ChainEvent) -> EngineError {
    ConflictError::DuplicateEvent { tx_hash: event.tx_hash.clone(), log_index: event.log_index }.into()
}
