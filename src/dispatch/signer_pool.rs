//! Pool of `K` signer identities per chain with load-aware routing.
//! Sticky routing is deliberately not used for correctness — the nonce
//! allocator's uniqueness invariant carries that — only for load balancing.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignerRecord {
    pub address: String,
    pub chain_id: u64,
    pub enabled: bool,
    pub pending_count: u32,
    pub recent_failure_count: u32,
    pub last_heartbeat_ts: i64,
    pub balance_native: u128,
    pub min_balance_threshold: u128,
}

impl SignerRecord {
    pub fn is_healthy(&self, now: i64, heartbeat_staleness_secs: i64) -> bool {
        self.enabled
            && self.balance_native >= self.min_balance_threshold
            && self.recent_failure_count < 5
            && now - self.last_heartbeat_ts <= heartbeat_staleness_secs
    }
}

pub struct SignerPool {
    signers: HashMap<(String, u64), SignerRecord>,
    round_robin_cursor: usize,
}

impl SignerPool {
    pub fn new() -> Self {
        Self { signers: HashMap::new(), round_robin_cursor: 0 }
    }

    pub fn register(&mut self, signer: SignerRecord) {
        self.signers.insert((signer.address.clone(), signer.chain_id), signer);
    }

    pub fn set_enabled(&mut self, address: &str, chain_id: u64, enabled: bool) -> bool {
        if let Some(s) = self.signers.get_mut(&(address.to_string(), chain_id)) {
            s.enabled = enabled;
            true
        } else {
            false
        }
    }

    pub fn record_failure(&mut self, address: &str, chain_id: u64, now: i64) {
        if let Some(s) = self.signers.get_mut(&(address.to_string(), chain_id)) {
            s.recent_failure_count += 1;
            s.last_heartbeat_ts = now;
        }
    }

    /// Selects the healthiest signer for `chain_id` with the smallest
    /// `pending_count`; ties are broken round-robin over the tied set.
    pub fn select(&mut self, chain_id: u64, now: i64, heartbeat_staleness_secs: i64) -> Option<String> {
        let mut candidates: Vec<&SignerRecord> = self
            .signers
            .values()
            .filter(|s| s.chain_id == chain_id && s.is_healthy(now, heartbeat_staleness_secs))
            .collect();
        if candidates.is_empty() {
            return None;
        }
        candidates.sort_by_key(|s| s.pending_count);
        let min_pending = candidates[0].pending_count;
        let tied: Vec<&&SignerRecord> = candidates.iter().filter(|s| s.pending_count == min_pending).collect();
        let chosen = tied[self.round_robin_cursor % tied.len()];
        self.round_robin_cursor = self.round_robin_cursor.wrapping_add(1);
        Some(chosen.address.clone())
    }

    pub fn list(&self) -> Vec<SignerRecord> {
        self.signers.values().cloned().collect()
    }
}

impl Default for SignerPool {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn healthy(addr: &str, pending: u32) -> SignerRecord {
        SignerRecord {
            address: addr.into(),
            chain_id: 1,
            enabled: true,
            pending_count: pending,
            recent_failure_count: 0,
            last_heartbeat_ts: 0,
            balance_native: 100,
            min_balance_threshold: 10,
        }
    }

    #[test]
    fn selects_least_loaded_signer() {
        let mut pool = SignerPool::new();
        pool.register(healthy("a", 3));
        pool.register(healthy("b", 1));
        assert_eq!(pool.select(1, 0, 3600), Some("b".to_string()));
    }

    #[test]
    fn disabled_signer_not_selected() {
        let mut pool = SignerPool::new();
        let mut a = healthy("a", 0);
        a.enabled = false;
        pool.register(a);
        assert_eq!(pool.select(1, 0, 3600), None);
    }

    #[test]
    fn stale_heartbeat_excludes_signer() {
        let mut pool = SignerPool::new();
        pool.register(healthy("a", 0));
        assert_eq!(pool.select(1, 10_000, 3600), None);
    }
}
