//! Receipt tracking: advances a broadcast submission to a terminal state.
//! Nonce errors resync and retry, reverts are never retried, transient RPC
//! errors are retried with backoff but never duplicate a submission
//! without first confirming the prior one dead.

use crate::dispatch::submission::{SubmissionLog, SubmissionStatus};
use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReceiptState {
    Pending,
    Mined,
    Reverted,
    MinedElsewhere,
}

#[async_trait]
pub trait ReceiptRpc: Send + Sync {
    async fn get_receipt(&self, tx_hash: &str) -> Result<ReceiptState, ReceiptRpcError>;
    async fn resubmit(&self, relayer: &str, chain_id: u64, nonce: u64) -> Result<String, ReceiptRpcError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReceiptRpcError {
    NonceTooLow,
    Reverted,
    Transient,
}

/// Global flag disabling all submission. Checked by the dispatcher before
/// broadcasting or replacing a transaction; does not affect receipt
/// polling of already-broadcast transactions.
pub struct KillSwitch(AtomicBool);

impl KillSwitch {
    pub fn new() -> Self {
        Self(AtomicBool::new(false))
    }

    pub fn disable_submission(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn enable_submission(&self) {
        self.0.store(false, Ordering::SeqCst);
    }

    pub fn submission_allowed(&self) -> bool {
        !self.0.load(Ordering::SeqCst)
    }
}

impl Default for KillSwitch {
    fn default() -> Self {
        Self::new()
    }
}

pub struct ReceiptTracker<'a> {
    pub log: &'a mut SubmissionLog,
    pub stuck_after_secs: i64,
}

impl<'a> ReceiptTracker<'a> {
    pub fn new(log: &'a mut SubmissionLog, stuck_after_secs: i64) -> Self {
        Self { log, stuck_after_secs }
    }

    /// Polls one broadcast submission and advances its status. Returns
    /// `true` if the submission reached a terminal state.
    pub async fn poll_one(
        &mut self,
        relayer: &str,
        chain_id: u64,
        nonce: u64,
        rpc: &dyn ReceiptRpc,
        now: i64,
    ) -> Result<bool, ReceiptRpcError> {
        let tx_hash = match self.log.get(relayer, chain_id, nonce).and_then(|r| r.tx_hash.clone()) {
            Some(h) => h,
            None => return Ok(false),
        };

        match rpc.get_receipt(&tx_hash).await {
            Ok(ReceiptState::Mined) => {
                self.log.mark_status(relayer, chain_id, nonce, SubmissionStatus::Mined, now);
                Ok(true)
            }
            Ok(ReceiptState::Reverted) => {
                self.log.mark_status(relayer, chain_id, nonce, SubmissionStatus::Reverted, now);
                Ok(true)
            }
            Ok(ReceiptState::MinedElsewhere) => {
                self.log.mark_status(relayer, chain_id, nonce, SubmissionStatus::Dropped, now);
                Ok(true)
            }
            Ok(ReceiptState::Pending) => Ok(false),
            Err(ReceiptRpcError::NonceTooLow) => {
                // the nonce already landed under a different tx — resync by
                // treating this submission as dropped, never retried blindly.
                self.log.mark_status(relayer, chain_id, nonce, SubmissionStatus::Dropped, now);
                Err(ReceiptRpcError::NonceTooLow)
            }
            Err(ReceiptRpcError::Reverted) => {
                self.log.mark_status(relayer, chain_id, nonce, SubmissionStatus::Reverted, now);
                Err(ReceiptRpcError::Reverted)
            }
            Err(ReceiptRpcError::Transient) => Err(ReceiptRpcError::Transient),
        }
    }

    /// Replaces submissions stuck in BROADCAST past `stuck_after_secs` with
    /// a fresh broadcast at the same nonce. Never touches a submission whose
    /// prior broadcast hasn't been confirmed dead (still `Broadcast`, not
    /// `Dropped`/`Reverted`) without going through this explicit path.
    pub async fn replace_stuck(&mut self, now: i64, rpc: &dyn ReceiptRpc, kill_switch: &KillSwitch) -> usize {
        if !kill_switch.submission_allowed() {
            return 0;
        }
        let cutoff = now - self.stuck_after_secs;
        let stuck: Vec<(String, u64, u64)> = self
            .log
            .stuck_since(cutoff)
            .into_iter()
            .map(|r| (r.relayer_address.clone(), r.chain_id, r.nonce))
            .collect();

        let mut replaced = 0;
        for (relayer, chain_id, nonce) in stuck {
            if let Ok(new_hash) = rpc.resubmit(&relayer, chain_id, nonce).await {
                self.log.mark_status(&relayer, chain_id, nonce, SubmissionStatus::Replaced, now);
                self.log.mark_broadcast(&relayer, chain_id, nonce, new_hash, now);
                replaced += 1;
            }
        }
        replaced
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatch::submission::RelayerSubmission;
    use std::sync::Mutex as StdMutex;

    struct FakeRpc {
        receipt: StdMutex<ReceiptState>,
        resubmit_hash: String,
    }

    #[async_trait]
    impl ReceiptRpc for FakeRpc {
        async fn get_receipt(&self, _tx_hash: &str) -> Result<ReceiptState, ReceiptRpcError> {
            Ok(*self.receipt.lock().unwrap())
        }
        async fn resubmit(&self, _relayer: &str, _chain_id: u64, _nonce: u64) -> Result<String, ReceiptRpcError> {
            Ok(self.resubmit_hash.clone())
        }
    }

    fn seeded_log() -> SubmissionLog {
        let mut log = SubmissionLog::new();
        log.insert_allocated(RelayerSubmission {
            relayer_address: "s".into(),
            chain_id: 1,
            nonce: 7,
            tx_hash: None,
            status: SubmissionStatus::Allocated,
            method: "submit_order".into(),
            correlation_id: "corr".into(),
            created_at: 0,
            updated_at: 0,
        })
        .unwrap();
        log.mark_broadcast("s", 1, 7, "0xaaa".into(), 0);
        log
    }

    #[tokio::test]
    async fn mined_receipt_marks_terminal() {
        let mut log = seeded_log();
        let rpc = FakeRpc { receipt: StdMutex::new(ReceiptState::Mined), resubmit_hash: "0xbbb".into() };
        let mut tracker = ReceiptTracker::new(&mut log, 60);
        let terminal = tracker.poll_one("s", 1, 7, &rpc, 10).await.unwrap();
        assert!(terminal);
        assert_eq!(tracker.log.get("s", 1, 7).unwrap().status, SubmissionStatus::Mined);
    }

    #[tokio::test]
    async fn reverted_receipt_never_retried() {
        let mut log = seeded_log();
        let rpc = FakeRpc { receipt: StdMutex::new(ReceiptState::Reverted), resubmit_hash: "0xbbb".into() };
        let mut tracker = ReceiptTracker::new(&mut log, 60);
        tracker.poll_one("s", 1, 7, &rpc, 10).await.unwrap();
        assert_eq!(tracker.log.get("s", 1, 7).unwrap().status, SubmissionStatus::Reverted);

        let kill_switch = KillSwitch::new();
        let replaced = tracker.replace_stuck(1000, &rpc, &kill_switch).await;
        assert_eq!(replaced, 0, "reverted submissions are terminal, not stuck-broadcast candidates");
    }

    #[tokio::test]
    async fn stuck_broadcast_replaced_after_timeout() {
        let mut log = seeded_log();
        let rpc = FakeRpc { receipt: StdMutex::new(ReceiptState::Pending), resubmit_hash: "0xccc".into() };
        let mut tracker = ReceiptTracker::new(&mut log, 60);
        let kill_switch = KillSwitch::new();

        let replaced = tracker.replace_stuck(50, &rpc, &kill_switch).await;
        assert_eq!(replaced, 0, "not yet past stuck_after_secs");

        let replaced = tracker.replace_stuck(100, &rpc, &kill_switch).await;
        assert_eq!(replaced, 1);
        let row = tracker.log.get("s", 1, 7).unwrap();
        assert_eq!(row.tx_hash.as_deref(), Some("0xccc"));
    }

    #[tokio::test]
    async fn kill_switch_blocks_replacement() {
        let mut log = seeded_log();
        let rpc = FakeRpc { receipt: StdMutex::new(ReceiptState::Pending), resubmit_hash: "0xccc".into() };
        let mut tracker = ReceiptTracker::new(&mut log, 60);
        let kill_switch = KillSwitch::new();
        kill_switch.disable_submission();

        let replaced = tracker.replace_stuck(1000, &rpc, &kill_switch).await;
        assert_eq!(replaced, 0);
    }
}
