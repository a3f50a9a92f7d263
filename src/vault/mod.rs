pub mod account;
pub mod actor;
pub mod ledger;
pub mod position;

pub use account::{split_fee, VaultAccount};
pub use actor::{spawn_trader_actor, SettleFillRequest, SettleFillResult, TraderHandle};
pub use ledger::{AccountKind, LedgerTransaction};
pub use position::Position;

/// Sentinel trader address for the insurance fund: a vault account like
/// any other, holding `balance >= 0`, spawned once at startup and topped
/// up only via `operatorctl insurance-topup`.
pub const INSURANCE_FUND_TRADER: &str = "0x0000000000000000000000000000000000000000";
