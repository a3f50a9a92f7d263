//! Session permits: a trader signs once, subsequent trades are submitted
//! by any relayer proven to be in `relayer_set_root` via a Merkle proof,
//! subject to per-trade/cumulative notional caps.

use crate::error::{ConflictError, EngineError, ValidationError};
use crate::fixed::Fixed18;
use ethers_core::types::H256;
use ethers_core::utils::keccak256;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionStatus {
    Active,
    Expired,
    Revoked,
    Exhausted,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub session_id: String,
    pub trader: String,
    pub relayer_set_root: String,
    pub expiry: i64,
    pub max_notional_per_trade: Fixed18,
    pub max_notional_per_session: Fixed18,
    pub notional_used: Fixed18,
    pub methods_bitmap: u64,
    pub revoked: bool,
}

impl Session {
    pub fn status(&self, now: i64) -> SessionStatus {
        if self.revoked {
            SessionStatus::Revoked
        } else if now > self.expiry {
            SessionStatus::Expired
        } else if self.notional_used >= self.max_notional_per_session {
            SessionStatus::Exhausted
        } else {
            SessionStatus::Active
        }
    }

    pub fn allows_method(&self, method_bit: u64) -> bool {
        self.methods_bitmap & method_bit != 0
    }

    /// Checks and (on success) consumes `notional` against both the
    /// per-trade and per-session caps. Never partially consumes the budget
    /// on rejection: the check happens before any mutation.
    pub fn consume(&mut self, notional: Fixed18, now: i64) -> Result<(), EngineError> {
        if self.status(now) != SessionStatus::Active {
            return Err(match self.status(now) {
                SessionStatus::Revoked => ConflictError::SessionRevoked(self.session_id.clone()).into(),
                _ => ConflictError::SessionBudgetExhausted(self.session_id.clone()).into(),
            });
        }
        if notional > self.max_notional_per_trade {
            return Err(ValidationError::InvalidQty("exceeds max_notional_per_trade".into()).into());
        }
        let projected = self
            .notional_used
            .checked_add(notional)
            .ok_or_else(|| ValidationError::InvalidQty("notional overflow".into()))?;
        if projected > self.max_notional_per_session {
            return Err(ConflictError::SessionBudgetExhausted(self.session_id.clone()).into());
        }
        self.notional_used = projected;
        Ok(())
    }

    pub fn revoke(&mut self) {
        self.revoked = true;
    }
}

/// Strictly monotonic per-trader nonce counter; zero gap tolerance.
#[derive(Default)]
pub struct NonceStore {
    next: HashMap<String, u64>,
}

impl NonceStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn check_and_increment(&mut self, trader: &str, nonce: u64) -> Result<(), EngineError> {
        let expected = *self.next.get(trader).unwrap_or(&0);
        if nonce != expected {
            return Err(ValidationError::BadNonce { expected, got: nonce }.into());
        }
        self.next.insert(trader.to_string(), expected + 1);
        Ok(())
    }

    pub fn peek(&self, trader: &str) -> u64 {
        *self.next.get(trader).unwrap_or(&0)
    }
}

/// Verifies `leaf` is included in the tree rooted at `root` via a standard
/// sorted-pair Merkle proof (sibling hashes in order from leaf to root).
pub fn verify_merkle_proof(leaf: H256, proof: &[H256], root: H256) -> bool {
    let mut computed = leaf;
    for sibling in proof {
        let (a, b) = if computed.as_bytes() <= sibling.as_bytes() {
            (computed, *sibling)
        } else {
            (*sibling, computed)
        };
        let mut buf = Vec::with_capacity(64);
        buf.extend_from_slice(a.as_bytes());
        buf.extend_from_slice(b.as_bytes());
        computed = H256(keccak256(buf));
    }
    computed == root
}

pub fn leaf_hash(address: &str) -> H256 {
    H256(keccak256(address.to_lowercase().as_bytes()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_session() -> Session {
        Session {
            session_id: "s1".into(),
            trader: "0xabc".into(),
            relayer_set_root: "root".into(),
            expiry: 1000,
            max_notional_per_trade: Fixed18::from_i64(100),
            max_notional_per_session: Fixed18::from_i64(300),
            notional_used: Fixed18::ZERO,
            methods_bitmap: 0b1,
            revoked: false,
        }
    }

    #[test]
    fn budget_enforced_p9() {
        let mut s = sample_session();
        s.consume(Fixed18::from_i64(100), 0).unwrap();
        s.consume(Fixed18::from_i64(100), 0).unwrap();
        s.consume(Fixed18::from_i64(100), 0).unwrap();
        assert_eq!(s.notional_used, Fixed18::from_i64(300));
        let err = s.consume(Fixed18::from_i64(1), 0).unwrap_err();
        assert_eq!(err.kind(), "SessionBudgetExhausted");
        // rejection must not partially consume
        assert_eq!(s.notional_used, Fixed18::from_i64(300));
    }

    #[test]
    fn revoked_session_rejects_everything() {
        let mut s = sample_session();
        s.revoke();
        let err = s.consume(Fixed18::from_i64(1), 0).unwrap_err();
        assert_eq!(err.kind(), "SessionRevoked");
    }

    #[test]
    fn nonce_store_rejects_gaps() {
        let mut store = NonceStore::new();
        store.check_and_increment("A", 0).unwrap();
        let err = store.check_and_increment("A", 2).unwrap_err();
        assert_eq!(err.kind(), "BadNonce");
        store.check_and_increment("A", 1).unwrap();
    }

    #[test]
    fn merkle_proof_round_trip() {
        let leaves: Vec<H256> = ["0xaaa", "0xbbb", "0xccc", "0xddd"].iter().map(|a| leaf_hash(a)).collect();
        // build a tiny 4-leaf tree manually
        let h01 = {
            let (a, b) = if leaves[0].as_bytes() <= leaves[1].as_bytes() {
                (leaves[0], leaves[1])
            } else {
                (leaves[1], leaves[0])
            };
            let mut buf = a.as_bytes().to_vec();
            buf.extend_from_slice(b.as_bytes());
            H256(keccak256(buf))
        };
        let h23 = {
            let (a, b) = if leaves[2].as_bytes() <= leaves[3].as_bytes() {
                (leaves[2], leaves[3])
            } else {
                (leaves[3], leaves[2])
            };
            let mut buf = a.as_bytes().to_vec();
            buf.extend_from_slice(b.as_bytes());
            H256(keccak256(buf))
        };
        let root = {
            let (a, b) = if h01.as_bytes() <= h23.as_bytes() { (h01, h23) } else { (h23, h01) };
            let mut buf = a.as_bytes().to_vec();
            buf.extend_from_slice(b.as_bytes());
            H256(keccak256(buf))
        };
        assert!(verify_merkle_proof(leaves[0], &[leaves[1], h23], root));
        assert!(!verify_merkle_proof(leaves[0], &[leaves[2], h23], root));
    }
}
