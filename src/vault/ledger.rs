//! Double-entry ledger primitives: `Amount = i128`, fixed-scale conversions
//! to and from [`Fixed18`], and the debits-equal-credits invariant, with
//! account kinds specific to this domain's buckets (collateral, margin,
//! fees, insurance fund).

use crate::fixed::Fixed18;
use serde::{Deserialize, Serialize};

/// The ledger buckets that together make up a trader's (or the protocol's)
/// equity. `Collateral` and `BridgedCredit` are funded from outside the
/// system; `ReservedMargin`, `RealizedPnl`, and `FeesPaid` only move between
/// accounts as a result of trading activity; `InsuranceFund` is the
/// protocol-owned backstop the liquidation engine draws on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccountKind {
    Collateral,
    BridgedCredit,
    ReservedMargin,
    RealizedPnl,
    FeesPaid,
    InsuranceFund,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerLine {
    pub owner: String,
    pub kind: AccountKind,
    /// Signed delta applied to this bucket; a debit is negative, a credit
    /// positive, matching the sign conventions used throughout `Fixed18`.
    pub delta: Fixed18,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerTransaction {
    pub reason: String,
    pub ts: i64,
    pub lines: Vec<LedgerLine>,
}

#[derive(Debug, thiserror::Error)]
#[error("ledger transaction does not balance: sum of deltas = {0}")]
pub struct UnbalancedTransaction(pub String);

impl LedgerTransaction {
    pub fn new(reason: impl Into<String>, ts: i64) -> Self {
        Self { reason: reason.into(), ts, lines: Vec::new() }
    }

    pub fn line(mut self, owner: impl Into<String>, kind: AccountKind, delta: Fixed18) -> Self {
        self.lines.push(LedgerLine { owner: owner.into(), kind, delta });
        self
    }

    /// Every committed transaction must sum to zero across all lines: money
    /// moves between buckets, it is never created or destroyed silently.
    pub fn checked_sum(&self) -> Result<(), UnbalancedTransaction> {
        let mut total = Fixed18::ZERO;
        for line in &self.lines {
            total = total
                .checked_add(line.delta)
                .ok_or_else(|| UnbalancedTransaction("overflow".to_string()))?;
        }
        if total.is_zero() {
            Ok(())
        } else {
            Err(UnbalancedTransaction(total.to_string()))
        }
    }
}
