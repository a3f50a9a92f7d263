//! Domain error taxonomy.
//!
//! Every fallible operation in the matching, margin, gateway, dispatch and
//! ingestion modules returns `Result<T, EngineError>`. The five top-level
//! variant groups below are a deliberate classification, not just an error
//! list: they drive propagation policy (surface vs. retry vs. halt) at the
//! API layer and in the liquidation worker's retry loop. `main.rs` and other
//! binary-edge glue still return `anyhow::Result` the way wiring code always
//! has; `EngineError` only lives at domain boundaries.

use thiserror::Error;

/// Stable, machine-readable error code returned to API callers and used in
/// the operator CLI's exit-class contract. Never renamed once shipped.
pub type ErrorKind = &'static str;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("validation: {0}")]
    Validation(#[from] ValidationError),

    #[error("insufficiency: {0}")]
    Insufficiency(#[from] InsufficiencyError),

    #[error("conflict: {0}")]
    Conflict(#[from] ConflictError),

    #[error("transient: {0}")]
    Transient(#[from] TransientError),

    #[error("fatal: {0}")]
    Fatal(#[from] FatalError),
}

impl EngineError {
    /// The stable string code consumed by the API layer's error response
    /// and by the CLI's exit-class mapping. One code per leaf variant.
    pub fn kind(&self) -> ErrorKind {
        match self {
            EngineError::Validation(e) => e.kind(),
            EngineError::Insufficiency(e) => e.kind(),
            EngineError::Conflict(e) => e.kind(),
            EngineError::Transient(e) => e.kind(),
            EngineError::Fatal(e) => e.kind(),
        }
    }

    /// Whether the caller that produced this error may retry it unchanged.
    /// Only `Transient` errors are retryable; everything else either leaves
    /// state unchanged and needs a different input (`Validation`,
    /// `Insufficiency`), is resolved by idempotent absorption (`Conflict`),
    /// or needs operator intervention (`Fatal`).
    pub fn is_retryable(&self) -> bool {
        matches!(self, EngineError::Transient(_))
    }

    /// Whether this error halts the affected market or trader scope rather
    /// than just failing the one operation.
    pub fn is_fatal(&self) -> bool {
        matches!(self, EngineError::Fatal(_))
    }
}

/// Returned synchronously to the caller; never retried; never mutates state.
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("invalid signature")]
    InvalidSignature,
    #[error("invalid price: {0}")]
    InvalidPrice(String),
    #[error("invalid quantity: {0}")]
    InvalidQty(String),
    #[error("bad nonce: expected {expected}, got {got}")]
    BadNonce { expected: u64, got: u64 },
    #[error("expired at {expiry}")]
    Expired { expiry: i64 },
    #[error("method not allowed: {0}")]
    MethodNotAllowed(String),
    #[error("market not allowed: {0}")]
    MarketNotAllowed(String),
    #[error("post-only order would cross the book")]
    PostOnlyCross,
    #[error("fill-or-kill order cannot be fully filled")]
    FokUnfillable,
    #[error("order would trade against the same trader's resting order")]
    SelfTrade,
}

impl ValidationError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ValidationError::InvalidSignature => "InvalidSignature",
            ValidationError::InvalidPrice(_) => "InvalidPrice",
            ValidationError::InvalidQty(_) => "InvalidQty",
            ValidationError::BadNonce { .. } => "BadNonce",
            ValidationError::Expired { .. } => "Expired",
            ValidationError::MethodNotAllowed(_) => "MethodNotAllowed",
            ValidationError::MarketNotAllowed(_) => "MarketNotAllowed",
            ValidationError::PostOnlyCross => "PostOnlyCross",
            ValidationError::FokUnfillable => "FOKUnfillable",
            ValidationError::SelfTrade => "SelfTrade",
        }
    }
}

/// Reject the operation; no state change; caller may retry after funding.
#[derive(Debug, Error)]
pub enum InsufficiencyError {
    #[error("insufficient margin: available {available}, required {required}")]
    InsufficientMargin { available: String, required: String },
    #[error("insufficient liquidity in book for requested fill")]
    InsufficientLiquidity,
    #[error("bridged credit is not withdrawable until confirmed")]
    BridgedCreditNonWithdrawable,
}

impl InsufficiencyError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            InsufficiencyError::InsufficientMargin { .. } => "InsufficientMargin",
            InsufficiencyError::InsufficientLiquidity => "InsufficientLiquidity",
            InsufficiencyError::BridgedCreditNonWithdrawable => "BridgedCreditNonWithdrawable",
        }
    }
}

/// Idempotent absorption where safe (duplicate event/deposit = success);
/// otherwise surfaced to the caller.
#[derive(Debug, Error)]
pub enum ConflictError {
    #[error("order {0} is already in a terminal state")]
    OrderAlreadyTerminal(u64),
    #[error("session {0} has been revoked")]
    SessionRevoked(String),
    #[error("session {0} notional budget is exhausted")]
    SessionBudgetExhausted(String),
    #[error("duplicate event (tx_hash={tx_hash}, log_index={log_index})")]
    DuplicateEvent { tx_hash: String, log_index: u64 },
    #[error("duplicate deposit (deposit_key={0})")]
    DuplicateDeposit(String),
}

impl ConflictError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ConflictError::OrderAlreadyTerminal(_) => "OrderAlreadyTerminal",
            ConflictError::SessionRevoked(_) => "SessionRevoked",
            ConflictError::SessionBudgetExhausted(_) => "SessionBudgetExhausted",
            ConflictError::DuplicateEvent { .. } => "DuplicateEvent",
            ConflictError::DuplicateDeposit(_) => "DuplicateDeposit",
        }
    }

    /// Conflicts that represent "already applied" rather than a real
    /// disagreement: safe to swallow and report success to the caller.
    pub fn is_idempotent_absorption(&self) -> bool {
        matches!(
            self,
            ConflictError::DuplicateEvent { .. } | ConflictError::DuplicateDeposit(_)
        )
    }
}

/// Retried internally with back-off; bounded attempts; never surfaced raw.
#[derive(Debug, Error)]
pub enum TransientError {
    #[error("rpc timeout: {0}")]
    RpcTimeout(String),
    #[error("database busy")]
    DbBusy,
    #[error("nonce drift detected for signer {signer} on chain {chain}")]
    NonceDrift { signer: String, chain: u64 },
    #[error("transaction underpriced")]
    TxUnderpriced,
}

impl TransientError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            TransientError::RpcTimeout(_) => "RpcTimeout",
            TransientError::DbBusy => "DbBusy",
            TransientError::NonceDrift { .. } => "NonceDrift",
            TransientError::TxUnderpriced => "TxUnderpriced",
        }
    }
}

/// Pauses the affected scope (market or trader), alerts the operator, halts
/// further mutations. Never silently logged and swallowed.
#[derive(Debug, Error)]
pub enum FatalError {
    #[error("book invariant broken: {0}")]
    BookInvariantBroken(String),
    #[error("vault invariant broken: {0}")]
    VaultInvariantBroken(String),
    #[error("signer key missing: {0}")]
    KeyMissing(String),
    #[error("database constraint violation on primary key: {0}")]
    DbConstraintViolation(String),
}

impl FatalError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            FatalError::BookInvariantBroken(_) => "BookInvariantBroken",
            FatalError::VaultInvariantBroken(_) => "VaultInvariantBroken",
            FatalError::KeyMissing(_) => "KeyMissing",
            FatalError::DbConstraintViolation(_) => "DbConstraintViolation",
        }
    }
}

/// Three-way classification used by the liquidation worker's retry loop,
/// distinct from (but derived from) `EngineError`'s five-way taxonomy:
/// a failed liquidation attempt is either worth retrying, a sign the local
/// view of the position has drifted from the ledger and needs reconciling,
/// or unrecoverable and needs operator attention.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LiquidationOutcome {
    Transient,
    StateDrift,
    Fatal,
}

impl EngineError {
    /// Maps a general engine error onto the liquidation worker's three-way
    /// classification.
    pub fn as_liquidation_outcome(&self) -> LiquidationOutcome {
        match self {
            EngineError::Transient(_) => LiquidationOutcome::Transient,
            EngineError::Conflict(ConflictError::OrderAlreadyTerminal(_)) => {
                LiquidationOutcome::StateDrift
            }
            EngineError::Fatal(_) => LiquidationOutcome::Fatal,
            _ => LiquidationOutcome::StateDrift,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_codes_are_stable() {
        let e: EngineError = ValidationError::PostOnlyCross.into();
        assert_eq!(e.kind(), "PostOnlyCross");
        assert!(!e.is_retryable());
    }

    #[test]
    fn transient_is_retryable_others_are_not() {
        let t: EngineError = TransientError::DbBusy.into();
        assert!(t.is_retryable());
        let f: EngineError = FatalError::KeyMissing("signer-1".into()).into();
        assert!(f.is_fatal());
        assert!(!f.is_retryable());
    }

    #[test]
    fn duplicate_conflicts_are_idempotent_absorption() {
        let dup = ConflictError::DuplicateDeposit("abc".into());
        assert!(dup.is_idempotent_absorption());
        let revoked = ConflictError::SessionRevoked("sess-1".into());
        assert!(!revoked.is_idempotent_absorption());
    }

    #[test]
    fn liquidation_outcome_classification() {
        let transient: EngineError = TransientError::RpcTimeout("node down".into()).into();
        assert_eq!(
            transient.as_liquidation_outcome(),
            LiquidationOutcome::Transient
        );
        let fatal: EngineError = FatalError::VaultInvariantBroken("drift".into()).into();
        assert_eq!(fatal.as_liquidation_outcome(), LiquidationOutcome::Fatal);
    }
}
