//! Submission log: one row per `(relayer_address, chain_id, nonce)`,
//! uniqueness enforced at insertion — the persisted counterpart of the
//! nonce allocator's in-memory set.

use crate::error::{ConflictError, EngineError};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SubmissionStatus {
    Allocated,
    Broadcast,
    Mined,
    Reverted,
    Dropped,
    Replaced,
    Failed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelayerSubmission {
    pub relayer_address: String,
    pub chain_id: u64,
    pub nonce: u64,
    pub tx_hash: Option<String>,
    pub status: SubmissionStatus,
    pub method: String,
    pub correlation_id: String,
    pub created_at: i64,
    pub updated_at: i64,
}

pub struct SubmissionLog {
    rows: HashMap<(String, u64, u64), RelayerSubmission>,
}

impl SubmissionLog {
    pub fn new() -> Self {
        Self { rows: HashMap::new() }
    }

    pub fn insert_allocated(&mut self, submission: RelayerSubmission) -> Result<(), EngineError> {
        let key = (submission.relayer_address.clone(), submission.chain_id, submission.nonce);
        if self.rows.contains_key(&key) {
            return Err(ConflictError::OrderAlreadyTerminal(0).into());
        }
        self.rows.insert(key, submission);
        Ok(())
    }

    pub fn mark_broadcast(&mut self, relayer: &str, chain_id: u64, nonce: u64, tx_hash: String, now: i64) {
        if let Some(row) = self.rows.get_mut(&(relayer.to_string(), chain_id, nonce)) {
            row.tx_hash = Some(tx_hash);
            row.status = SubmissionStatus::Broadcast;
            row.updated_at = now;
        }
    }

    pub fn mark_status(&mut self, relayer: &str, chain_id: u64, nonce: u64, status: SubmissionStatus, now: i64) {
        if let Some(row) = self.rows.get_mut(&(relayer.to_string(), chain_id, nonce)) {
            row.status = status;
            row.updated_at = now;
        }
    }

    pub fn get(&self, relayer: &str, chain_id: u64, nonce: u64) -> Option<&RelayerSubmission> {
        self.rows.get(&(relayer.to_string(), chain_id, nonce))
    }

    /// Submissions broadcast before `cutoff` with no terminal status —
    /// candidates for replace-by-fee after `T_stuck`.
    pub fn stuck_since(&self, cutoff: i64) -> Vec<&RelayerSubmission> {
        self.rows
            .values()
            .filter(|r| r.status == SubmissionStatus::Broadcast && r.updated_at < cutoff)
            .collect()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

impl Default for SubmissionLog {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(relayer: &str, nonce: u64) -> RelayerSubmission {
        RelayerSubmission {
            relayer_address: relayer.into(),
            chain_id: 1,
            nonce,
            tx_hash: None,
            status: SubmissionStatus::Allocated,
            method: "submit_order".into(),
            correlation_id: "corr-1".into(),
            created_at: 0,
            updated_at: 0,
        }
    }

    #[test]
    fn duplicate_nonce_insertion_rejected() {
        let mut log = SubmissionLog::new();
        log.insert_allocated(row("s", 7)).unwrap();
        let err = log.insert_allocated(row("s", 7)).unwrap_err();
        assert_eq!(err.kind(), "OrderAlreadyTerminal");
    }

    #[test]
    fn nonce_race_scenario_s6() {
        let mut log = SubmissionLog::new();
        log.insert_allocated(row("s", 7)).unwrap();
        log.insert_allocated(row("s", 8)).unwrap();
        log.mark_broadcast("s", 1, 7, "0xaaa".into(), 1);
        log.mark_status("s", 1, 7, SubmissionStatus::Mined, 2);
        log.mark_broadcast("s", 1, 8, "0xbbb".into(), 1);
        log.mark_status("s", 1, 8, SubmissionStatus::Mined, 2);
        assert_eq!(log.len(), 2);
        assert_eq!(log.get("s", 1, 7).unwrap().status, SubmissionStatus::Mined);
        assert_eq!(log.get("s", 1, 8).unwrap().status, SubmissionStatus::Mined);
    }
}
