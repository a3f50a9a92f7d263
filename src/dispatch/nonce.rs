//! Nonce allocation (C8): the `(signer, chain, nonce)` uniqueness
//! invariant is the system's primary defense against double-submission
//! races, carried entirely by a per-`(signer, chain)` lock rather than by
//! sticky routing.

use crate::error::{EngineError, FatalError};
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::Mutex as AsyncMutex;

/// Abstraction over the chain RPC's pending-nonce query, so the allocator's
/// locking and uniqueness logic can be unit-tested without a live node.
#[async_trait]
pub trait ChainRpc: Send + Sync {
    async fn get_pending_tx_count(&self, signer: &str, chain_id: u64) -> Result<u64, EngineError>;
}

type SignerChainKey = (String, u64);

pub struct NonceAllocator {
    locks: AsyncMutex<HashMap<SignerChainKey, Arc<AsyncMutex<()>>>>,
    db_next: AsyncMutex<HashMap<SignerChainKey, u64>>,
    allocated: AsyncMutex<HashSet<(String, u64, u64)>>,
}

impl NonceAllocator {
    pub fn new() -> Self {
        Self {
            locks: AsyncMutex::new(HashMap::new()),
            db_next: AsyncMutex::new(HashMap::new()),
            allocated: AsyncMutex::new(HashSet::new()),
        }
    }

    async fn lock_for(&self, signer: &str, chain_id: u64) -> Arc<AsyncMutex<()>> {
        let mut locks = self.locks.lock().await;
        locks
            .entry((signer.to_string(), chain_id))
            .or_insert_with(|| Arc::new(AsyncMutex::new(())))
            .clone()
    }

    /// Allocates the next nonce for `(signer, chain_id)`: acquires the
    /// per-pair lock, reads `max(chain_pending, db_next)`, persists
    /// `next_nonce = use_nonce + 1`, and records the allocation under the
    /// `(signer, chain, nonce)` uniqueness set. A uniqueness collision while
    /// holding the lock is a hard inconsistency — the lock makes it
    /// impossible in the steady state, so it surfaces as `Fatal`.
    pub async fn allocate(&self, signer: &str, chain_id: u64, rpc: &dyn ChainRpc) -> Result<u64, EngineError> {
        let pair_lock = self.lock_for(signer, chain_id).await;
        let _guard = pair_lock.lock().await;

        let chain_pending = rpc.get_pending_tx_count(signer, chain_id).await?;
        let db_next = {
            let table = self.db_next.lock().await;
            *table.get(&(signer.to_string(), chain_id)).unwrap_or(&0)
        };
        let use_nonce = chain_pending.max(db_next);

        {
            let mut allocated = self.allocated.lock().await;
            let key = (signer.to_string(), chain_id, use_nonce);
            if !allocated.insert(key) {
                return Err(FatalError::DbConstraintViolation(format!(
                    "nonce {use_nonce} already allocated for {signer}@{chain_id}"
                ))
                .into());
            }
        }

        let mut table = self.db_next.lock().await;
        table.insert((signer.to_string(), chain_id), use_nonce + 1);
        Ok(use_nonce)
    }
}

impl Default for NonceAllocator {
    fn default() -> Self {
        Self::new()
    }
}
