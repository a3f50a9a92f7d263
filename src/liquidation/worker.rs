//! Liquidation worker pool (C6): pulls ready jobs off the queue, re-verifies
//! liquidatability under the current mark (stale jobs are skipped as
//! successful, P8), and issues a bounded-slippage market close.

use crate::error::{EngineError, LiquidationOutcome};
use crate::fixed::Fixed18;
use crate::liquidation::queue::{priority_from_equity, LiquidationJob, LiquidationQueue};
use crate::vault::Position;
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::Mutex;

#[derive(Debug, Clone, Copy)]
pub struct LiquidationParams {
    pub slippage_cap: Fixed18,
    pub base_backoff_secs: i64,
    pub jitter_secs: i64,
}

#[derive(Debug, Clone)]
pub struct CloseOutcome {
    pub closed_size: Fixed18,
    pub remainder: Fixed18,
    pub realized_pnl: Fixed18,
    pub fee_taken: Fixed18,
    pub insurance_fund_draw: Fixed18,
}

/// Seam between the worker's retry/backoff policy and the rest of the
/// system (book, vault, market registry). Kept as a trait so the retry and
/// priority logic can be unit-tested against a fake without wiring the full
/// actor system.
#[async_trait]
pub trait LiquidationContext: Send + Sync {
    async fn mark_price(&self, market_id: &str) -> Option<Fixed18>;
    async fn maintenance_margin_bps(&self, market_id: &str) -> Option<u32>;
    async fn position(&self, trader: &str, market_id: &str) -> Option<Position>;
    /// Attempts to close the position at market, bounded by `slippage_cap`.
    /// Returns `Ok(None)` if the position was already flat (state drift).
    async fn close_at_market(
        &self,
        trader: &str,
        market_id: &str,
        slippage_cap: Fixed18,
    ) -> Result<Option<CloseOutcome>, EngineError>;
}

pub struct LiquidationWorker<C: LiquidationContext> {
    ctx: Arc<C>,
    params: LiquidationParams,
}

impl<C: LiquidationContext> LiquidationWorker<C> {
    pub fn new(ctx: Arc<C>, params: LiquidationParams) -> Self {
        Self { ctx, params }
    }

    /// Scans every open position in `market_id` at the given mark and
    /// enqueues the liquidatable ones. Called on every mark-price update.
    pub async fn scan_market(
        &self,
        queue: &Mutex<LiquidationQueue>,
        market_id: &str,
        positions: &[Position],
        mark_price: Fixed18,
        maintenance_margin_bps: u32,
        now: i64,
    ) {
        let mut q = queue.lock().await;
        for position in positions {
            if position.is_flat() {
                continue;
            }
            if !position.is_liquidatable(mark_price, maintenance_margin_bps) {
                continue;
            }
            let mmr = position.maintenance_margin(mark_price, maintenance_margin_bps);
            let equity = position.equity(mark_price);
            let priority = priority_from_equity(equity, mmr);
            q.enqueue(LiquidationJob::new(position.trader.clone(), market_id.to_string(), priority, now));
        }
    }

    /// Pulls and processes one ready job, if any. Returns the classification
    /// of what happened so the caller (the worker loop) can log/metric it.
    pub async fn process_one(&self, queue: &Mutex<LiquidationQueue>, now: i64) -> Option<ProcessResult> {
        let mut job = {
            let mut q = queue.lock().await;
            q.pop_ready(now)?
        };

        match self.attempt(&job, now).await {
            Ok(true) => Some(ProcessResult::Closed),
            Ok(false) => Some(ProcessResult::AlreadySettled),
            Err(outcome) => {
                match outcome {
                    LiquidationOutcome::Transient if !job.exhausted() => {
                        job.backoff(now, self.params.base_backoff_secs, self.params.jitter_secs, "transient");
                        queue.lock().await.enqueue(job);
                        Some(ProcessResult::Retried)
                    }
                    LiquidationOutcome::StateDrift => Some(ProcessResult::AlreadySettled),
                    _ => {
                        // Fatal, or transient exhausted its retry budget:
                        // surface for operator review rather than looping forever.
                        Some(ProcessResult::Failed)
                    }
                }
            }
        }
    }

    /// Returns `Ok(true)` on an actual close, `Ok(false)` when the job
    /// turned out to need no action (already flat or no longer liquidatable).
    async fn attempt(&self, job: &LiquidationJob, _now: i64) -> Result<bool, LiquidationOutcome> {
        let mark = self
            .ctx
            .mark_price(&job.market_id)
            .await
            .ok_or(LiquidationOutcome::Transient)?;
        let mmr_bps = self
            .ctx
            .maintenance_margin_bps(&job.market_id)
            .await
            .ok_or(LiquidationOutcome::Fatal)?;

        let position = self.ctx.position(&job.trader, &job.market_id).await;
        let position = match position {
            Some(p) if !p.is_flat() => p,
            _ => return Ok(false), // already flat: state drift, treated as success
        };

        if !position.is_liquidatable(mark, mmr_bps) {
            // Stale job: mark moved back above the threshold since enqueue.
            return Ok(false);
        }

        match self.ctx.close_at_market(&job.trader, &job.market_id, self.params.slippage_cap).await {
            Ok(_) => Ok(true),
            Err(e) => Err(e.as_liquidation_outcome()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessResult {
    Closed,
    AlreadySettled,
    Retried,
    Failed,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct FakeCtx {
        mark: Fixed18,
        mmr_bps: u32,
        position: Option<Position>,
        close_calls: AtomicUsize,
        fail_transient_times: usize,
    }

    #[async_trait]
    impl LiquidationContext for FakeCtx {
        async fn mark_price(&self, _market_id: &str) -> Option<Fixed18> {
            Some(self.mark)
        }
        async fn maintenance_margin_bps(&self, _market_id: &str) -> Option<u32> {
            Some(self.mmr_bps)
        }
        async fn position(&self, _trader: &str, _market_id: &str) -> Option<Position> {
            self.position.clone()
        }
        async fn close_at_market(
            &self,
            _trader: &str,
            _market_id: &str,
            _slippage_cap: Fixed18,
        ) -> Result<Option<CloseOutcome>, EngineError> {
            let n = self.close_calls.fetch_add(1, Ordering::SeqCst);
            if n < self.fail_transient_times {
                return Err(crate::error::TransientError::RpcTimeout("down".into()).into());
            }
            Ok(Some(CloseOutcome {
                closed_size: Fixed18::from_i64(10),
                remainder: Fixed18::ZERO,
                realized_pnl: "-60.00".parse().unwrap(),
                fee_taken: Fixed18::ZERO,
                insurance_fund_draw: Fixed18::ZERO,
            }))
        }
    }

    fn liquidatable_position() -> Position {
        let mut p = Position::flat("A", "GOLD/USD");
        p.size = "10.0".parse().unwrap();
        p.entry_price = "100.00".parse().unwrap();
        p.reserved_margin = "100.00".parse().unwrap();
        p
    }

    #[tokio::test]
    async fn liquidation_closes_position_s4() {
        let ctx = Arc::new(FakeCtx {
            mark: "94.00".parse().unwrap(),
            mmr_bps: 500,
            position: Some(liquidatable_position()),
            close_calls: AtomicUsize::new(0),
            fail_transient_times: 0,
        });
        let worker = LiquidationWorker::new(
            ctx.clone(),
            LiquidationParams { slippage_cap: "0.05".parse().unwrap(), base_backoff_secs: 1, jitter_secs: 0 },
        );
        let queue = Mutex::new(LiquidationQueue::new(100));
        worker
            .scan_market(&queue, "GOLD/USD", &[liquidatable_position()], "94.00".parse().unwrap(), 500, 0)
            .await;
        assert_eq!(queue.lock().await.len(), 1);

        worker.process_one(&queue, 0).await;
        assert_eq!(ctx.close_calls.load(Ordering::SeqCst), 1);
        assert!(queue.lock().await.is_empty());
    }

    #[tokio::test]
    async fn state_drift_when_already_flat() {
        let ctx = Arc::new(FakeCtx {
            mark: "94.00".parse().unwrap(),
            mmr_bps: 500,
            position: Some(Position::flat("A", "GOLD/USD")),
            close_calls: AtomicUsize::new(0),
            fail_transient_times: 0,
        });
        let worker = LiquidationWorker::new(
            ctx.clone(),
            LiquidationParams { slippage_cap: "0.05".parse().unwrap(), base_backoff_secs: 1, jitter_secs: 0 },
        );
        let queue = Mutex::new(LiquidationQueue::new(100));
        queue.lock().await.enqueue(LiquidationJob::new("A", "GOLD/USD", 1, 0));
        worker.process_one(&queue, 0).await;
        assert_eq!(ctx.close_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn transient_failure_is_requeued_with_backoff() {
        let ctx = Arc::new(FakeCtx {
            mark: "94.00".parse().unwrap(),
            mmr_bps: 500,
            position: Some(liquidatable_position()),
            close_calls: AtomicUsize::new(0),
            fail_transient_times: 1,
        });
        let worker = LiquidationWorker::new(
            ctx.clone(),
            LiquidationParams { slippage_cap: "0.05".parse().unwrap(), base_backoff_secs: 2, jitter_secs: 0 },
        );
        let queue = Mutex::new(LiquidationQueue::new(100));
        queue.lock().await.enqueue(LiquidationJob::new("A", "GOLD/USD", 1, 0));

        worker.process_one(&queue, 0).await;
        assert_eq!(queue.lock().await.len(), 1);
        assert!(queue.lock().await.pop_ready(0).is_none());
        assert!(queue.lock().await.pop_ready(10).is_some());
    }
}
