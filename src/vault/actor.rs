//! Per-trader actor (C4 position engine + C3 vault, combined per trader):
//! `deposit | withdraw | reserve | release | settle_fill` for one trader are
//! totally ordered by routing them through a single task, the same pattern
//! the book actor uses per market. Positions are kept in the same task since
//! margin mutation and position mutation must be atomic per fill.

use crate::error::EngineError;
use crate::fixed::Fixed18;
use crate::vault::account::{fee_split_transaction, split_fee, VaultAccount};
use crate::vault::position::{apply_fill, Position};
use std::collections::HashMap;
use tokio::sync::{mpsc, oneshot};

pub struct SettleFillRequest {
    pub market_id: String,
    pub fill_price: Fixed18,
    /// Positive for a BUY fill, negative for a SELL fill, from this trader's
    /// perspective.
    pub signed_qty: Fixed18,
    pub fee: Fixed18,
    pub leverage: u32,
    pub creator: String,
    pub treasury: String,
    pub ts: i64,
}

#[derive(Debug, Clone)]
pub struct SettleFillResult {
    pub position: Position,
    pub realized_pnl_delta: Fixed18,
    pub creator_fee_cut: Fixed18,
    pub protocol_fee_cut: Fixed18,
}

enum Command {
    Deposit { amount: Fixed18, reply: oneshot::Sender<()> },
    CreditFromBridge { amount: Fixed18, reply: oneshot::Sender<()> },
    Withdraw { amount: Fixed18, reply: oneshot::Sender<Result<(), EngineError>> },
    ReserveMargin { market_id: String, amount: Fixed18, reply: oneshot::Sender<Result<(), EngineError>> },
    ReleaseMargin { market_id: String, amount: Fixed18, reply: oneshot::Sender<()> },
    SettleFill { req: SettleFillRequest, reply: oneshot::Sender<Result<SettleFillResult, EngineError>> },
    ApplyFunding { market_id: String, payment: Fixed18, reply: oneshot::Sender<()> },
    Snapshot { reply: oneshot::Sender<(VaultAccount, Vec<Position>)> },
}

#[derive(Clone)]
pub struct TraderHandle {
    tx: mpsc::Sender<Command>,
}

impl TraderHandle {
    pub async fn deposit(&self, amount: Fixed18) {
        let (reply, rx) = oneshot::channel();
        if self.tx.send(Command::Deposit { amount, reply }).await.is_ok() {
            let _ = rx.await;
        }
    }

    pub async fn credit_from_bridge(&self, amount: Fixed18) {
        let (reply, rx) = oneshot::channel();
        if self.tx.send(Command::CreditFromBridge { amount, reply }).await.is_ok() {
            let _ = rx.await;
        }
    }

    pub async fn withdraw(&self, amount: Fixed18) -> Result<(), EngineError> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(Command::Withdraw { amount, reply })
            .await
            .map_err(|_| crate::error::TransientError::DbBusy)?;
        rx.await.map_err(|_| crate::error::TransientError::DbBusy)?
    }

    pub async fn reserve_margin(&self, market_id: impl Into<String>, amount: Fixed18) -> Result<(), EngineError> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(Command::ReserveMargin { market_id: market_id.into(), amount, reply })
            .await
            .map_err(|_| crate::error::TransientError::DbBusy)?;
        rx.await.map_err(|_| crate::error::TransientError::DbBusy)?
    }

    pub async fn release_margin(&self, market_id: impl Into<String>, amount: Fixed18) {
        let (reply, rx) = oneshot::channel();
        if self
            .tx
            .send(Command::ReleaseMargin { market_id: market_id.into(), amount, reply })
            .await
            .is_ok()
        {
            let _ = rx.await;
        }
    }

    pub async fn settle_fill(&self, req: SettleFillRequest) -> Result<SettleFillResult, EngineError> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(Command::SettleFill { req, reply })
            .await
            .map_err(|_| crate::error::TransientError::DbBusy)?;
        rx.await.map_err(|_| crate::error::TransientError::DbBusy)?
    }

    /// Posts a funding payment against the position's realized PnL. `payment`
    /// is signed from the trader's perspective (already `funding_rate *
    /// notional`, oriented by the accountant per [`crate::funding`]); no
    /// position size or entry price changes. A no-op if the trader holds no
    /// position in `market_id` (funding has nothing to apply against).
    pub async fn apply_funding(&self, market_id: impl Into<String>, payment: Fixed18) {
        let (reply, rx) = oneshot::channel();
        if self
            .tx
            .send(Command::ApplyFunding { market_id: market_id.into(), payment, reply })
            .await
            .is_ok()
        {
            let _ = rx.await;
        }
    }

    pub async fn snapshot(&self) -> Option<(VaultAccount, Vec<Position>)> {
        let (reply, rx) = oneshot::channel();
        self.tx.send(Command::Snapshot { reply }).await.ok()?;
        rx.await.ok()
    }
}

struct TraderState {
    account: VaultAccount,
    positions: HashMap<String, Position>,
}

impl TraderState {
    fn position_mut(&mut self, market_id: &str, trader: &str) -> &mut Position {
        self.positions
            .entry(market_id.to_string())
            .or_insert_with(|| Position::flat(trader, market_id))
    }
}

pub fn spawn_trader_actor(trader: impl Into<String>) -> (TraderHandle, tokio::task::JoinHandle<()>) {
    let trader = trader.into();
    let (tx, mut rx) = mpsc::channel::<Command>(256);
    let mut state = TraderState {
        account: VaultAccount::new(trader.clone()),
        positions: HashMap::new(),
    };

    let join = tokio::spawn(async move {
        while let Some(cmd) = rx.recv().await {
            match cmd {
                Command::Deposit { amount, reply } => {
                    state.account.deposit(amount);
                    let _ = reply.send(());
                }
                Command::CreditFromBridge { amount, reply } => {
                    state.account.credit_from_bridge(amount);
                    let _ = reply.send(());
                }
                Command::Withdraw { amount, reply } => {
                    let result = state.account.withdraw(amount);
                    let _ = reply.send(result);
                }
                Command::ReserveMargin { market_id: _, amount, reply } => {
                    let result = state.account.reserve_margin(amount);
                    let _ = reply.send(result);
                }
                Command::ReleaseMargin { market_id: _, amount, reply } => {
                    state.account.release_margin(amount);
                    let _ = reply.send(());
                }
                Command::SettleFill { req, reply } => {
                    let result = handle_settle_fill(&mut state, &trader, req);
                    let _ = reply.send(result);
                }
                Command::ApplyFunding { market_id, payment, reply } => {
                    if state.positions.contains_key(&market_id) {
                        state.account.apply_realized_pnl(payment);
                        if let Some(position) = state.positions.get_mut(&market_id) {
                            position.realized_pnl_cum = position.realized_pnl_cum.checked_add(payment).unwrap_or(position.realized_pnl_cum);
                        }
                    }
                    let _ = reply.send(());
                }
                Command::Snapshot { reply } => {
                    let positions = state.positions.values().cloned().collect();
                    let _ = reply.send((state.account.clone(), positions));
                }
            }
        }
    });

    (TraderHandle { tx }, join)
}

fn handle_settle_fill(
    state: &mut TraderState,
    trader: &str,
    req: SettleFillRequest,
) -> Result<SettleFillResult, EngineError> {
    let position = state.position_mut(&req.market_id, trader).clone();
    let outcome = apply_fill(&position, req.fill_price, req.signed_qty, req.leverage)
        .ok_or_else(|| crate::error::FatalError::VaultInvariantBroken("fixed-point overflow in apply_fill".into()))?;

    let old_reserved = position.reserved_margin;
    let new_reserved = outcome.required_margin;
    let delta = new_reserved.checked_sub(old_reserved).unwrap_or(Fixed18::ZERO);

    if delta > Fixed18::ZERO {
        state.account.reserve_margin(delta)?;
    } else if delta < Fixed18::ZERO {
        state
            .account
            .release_margin(delta.checked_neg().unwrap_or(Fixed18::ZERO));
    }

    state.account.apply_realized_pnl(outcome.realized_pnl_delta);
    state.account.debit_fee(req.fee);
    let (creator_cut, protocol_cut) = split_fee(req.fee);

    // The fee-split transaction is not itself how the split is applied
    // (each leg's account is credited directly by the caller); this just
    // checks the three-way split it records still balances to zero.
    let ledger_tx = fee_split_transaction(trader, &req.creator, &req.treasury, req.fee, req.ts);
    if let Err(err) = ledger_tx.checked_sum() {
        tracing::error!(trader, fee = %req.fee, %err, "fee-split ledger transaction failed to balance");
    }

    state.positions.insert(req.market_id.clone(), outcome.position.clone());

    Ok(SettleFillResult {
        position: outcome.position,
        realized_pnl_delta: outcome.realized_pnl_delta,
        creator_fee_cut: creator_cut,
        protocol_fee_cut: protocol_cut,
    })
}
