//! Typed operator CLI: one `clap` subcommand per operation, reading/
//! writing the same SQLite file the node persists to rather than a
//! separate admin protocol. Exits 0 on success; on failure, logs a stable
//! error class as the last line and exits 1.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use perpcore::fixed::Fixed18;
use rusqlite::{params, Connection, OpenFlags};
use tracing::error;

#[derive(Parser, Debug)]
#[command(name = "operatorctl")]
#[command(about = "Operator CLI for the perpcore exchange core")]
struct Cli {
    /// Path to the node's SQLite database.
    #[arg(long, env = "DATABASE_PATH", default_value = "./perpcore.db")]
    db: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List every registered market and its current status.
    MarketsList,
    /// Pause a market by symbol, rejecting new orders until resumed.
    MarketsPause { symbol: String },
    /// List every relayer signer and its enabled/health state.
    SignersStatus,
    /// Enable a relayer signer for a chain.
    SignersEnable { address: String, chain_id: u64 },
    /// Disable a relayer signer for a chain.
    SignersDisable { address: String, chain_id: u64 },
    /// List the liquidation queue ordered by priority.
    LiqQueue,
    /// Replay ingested events from `from_block` onward, reporting drift.
    ReconcileEvents {
        #[arg(long)]
        from_block: u64,
        /// Report what would be found without writing anything.
        #[arg(long, default_value_t = false)]
        dry_run: bool,
    },
    /// Credit the insurance fund's collateral balance.
    InsuranceTopup { amount: String },
}

fn main() {
    tracing_subscriber::fmt().with_target(false).init();

    let cli = Cli::parse();
    if let Err(err) = run(&cli) {
        error!(error_class = "OperatorCtlFailed", "{err:#}");
        std::process::exit(1);
    }
}

fn run(cli: &Cli) -> Result<()> {
    match &cli.command {
        Command::MarketsList => markets_list(&cli.db),
        Command::MarketsPause { symbol } => markets_pause(&cli.db, symbol),
        Command::SignersStatus => signers_status(&cli.db),
        Command::SignersEnable { address, chain_id } => signers_set_enabled(&cli.db, address, *chain_id, true),
        Command::SignersDisable { address, chain_id } => signers_set_enabled(&cli.db, address, *chain_id, false),
        Command::LiqQueue => liq_queue(&cli.db),
        Command::ReconcileEvents { from_block, dry_run } => reconcile_events(&cli.db, *from_block, *dry_run),
        Command::InsuranceTopup { amount } => insurance_topup(&cli.db, amount),
    }
}

fn open_readonly(path: &str) -> Result<Connection> {
    Connection::open_with_flags(path, OpenFlags::SQLITE_OPEN_READ_ONLY).with_context(|| format!("opening {path} read-only"))
}

fn open_readwrite(path: &str) -> Result<Connection> {
    Connection::open(path).with_context(|| format!("opening {path}"))
}

fn markets_list(db_path: &str) -> Result<()> {
    let conn = open_readonly(db_path)?;
    let mut stmt = conn.prepare(
        "SELECT market_id, symbol, status, mark_price, index_price FROM markets ORDER BY symbol",
    )?;
    let rows = stmt.query_map([], |row| {
        Ok((
            row.get::<_, String>(0)?,
            row.get::<_, String>(1)?,
            row.get::<_, String>(2)?,
            row.get::<_, String>(3)?,
            row.get::<_, String>(4)?,
        ))
    })?;

    println!("{:<24} {:<12} {:<10} {:>14} {:>14}", "market_id", "symbol", "status", "mark_price", "index_price");
    for row in rows {
        let (market_id, symbol, status, mark_price, index_price) = row?;
        println!("{market_id:<24} {symbol:<12} {status:<10} {mark_price:>14} {index_price:>14}");
    }
    Ok(())
}

fn markets_pause(db_path: &str, symbol: &str) -> Result<()> {
    let conn = open_readwrite(db_path)?;
    let market_id: String = conn
        .query_row("SELECT market_id FROM markets WHERE symbol = ?1", params![symbol], |row| row.get(0))
        .with_context(|| format!("no such market: {symbol}"))?;
    let now = now_ts();
    let updated = conn.execute(
        "UPDATE markets SET status = 'PAUSED', updated_at = ?1 WHERE market_id = ?2",
        params![now, market_id],
    )?;
    if updated == 0 {
        anyhow::bail!("market {symbol} was not updated");
    }
    println!("paused {symbol} ({market_id})");
    Ok(())
}

fn signers_status(db_path: &str) -> Result<()> {
    let conn = open_readonly(db_path)?;
    let mut stmt = conn.prepare(
        "SELECT address, chain_id, enabled, min_balance_threshold, updated_at FROM relayer_keys ORDER BY chain_id, address",
    )?;
    let rows = stmt.query_map([], |row| {
        Ok((
            row.get::<_, String>(0)?,
            row.get::<_, i64>(1)?,
            row.get::<_, i64>(2)?,
            row.get::<_, String>(3)?,
            row.get::<_, i64>(4)?,
        ))
    })?;

    println!("{:<44} {:>8} {:<8} {:>20} {:>12}", "address", "chain_id", "enabled", "min_balance_threshold", "updated_at");
    for row in rows {
        let (address, chain_id, enabled, min_balance, updated_at) = row?;
        println!("{address:<44} {chain_id:>8} {:<8} {min_balance:>20} {updated_at:>12}", enabled != 0);
    }
    Ok(())
}

fn signers_set_enabled(db_path: &str, address: &str, chain_id: u64, enabled: bool) -> Result<()> {
    let conn = open_readwrite(db_path)?;
    let now = now_ts();
    let updated = conn.execute(
        "UPDATE relayer_keys SET enabled = ?1, updated_at = ?2 WHERE address = ?3 AND chain_id = ?4",
        params![enabled as i64, now, address, chain_id as i64],
    )?;
    if updated == 0 {
        anyhow::bail!("no signer registered for {address} on chain {chain_id}");
    }
    println!("{address} on chain {chain_id}: enabled={enabled}");
    Ok(())
}

fn liq_queue(db_path: &str) -> Result<()> {
    let conn = open_readonly(db_path)?;
    let mut stmt = conn.prepare(
        "SELECT trader, market_id, priority, earliest_run_at, attempts, last_error
         FROM liq_queue ORDER BY priority ASC",
    )?;
    let rows = stmt.query_map([], |row| {
        Ok((
            row.get::<_, String>(0)?,
            row.get::<_, String>(1)?,
            row.get::<_, i64>(2)?,
            row.get::<_, i64>(3)?,
            row.get::<_, i64>(4)?,
            row.get::<_, Option<String>>(5)?,
        ))
    })?;

    println!("{:<44} {:<16} {:>10} {:>14} {:>8} last_error", "trader", "market_id", "priority", "earliest_run_at", "attempts");
    let mut any = false;
    for row in rows {
        any = true;
        let (trader, market_id, priority, earliest_run_at, attempts, last_error) = row?;
        println!(
            "{trader:<44} {market_id:<16} {priority:>10} {earliest_run_at:>14} {attempts:>8} {}",
            last_error.unwrap_or_default()
        );
    }
    if !any {
        println!("(empty)");
    }
    Ok(())
}

/// Replays persisted `event_records` from `from_block` onward against the
/// ledger's own `positions` table. This only re-checks agreement between
/// what was already ingested and the ledger's current view; it cannot
/// detect drift the node never ingested in the first place, since no chain
/// RPC client is wired into this binary.
fn reconcile_events(db_path: &str, from_block: u64, dry_run: bool) -> Result<()> {
    let conn = open_readonly(db_path)?;
    let mut stmt = conn.prepare(
        "SELECT event_kind, payload, block_number FROM event_records WHERE block_number >= ?1 ORDER BY block_number",
    )?;
    let rows = stmt.query_map(params![from_block as i64], |row| {
        Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?, row.get::<_, i64>(2)?))
    })?;

    let mut checked = 0usize;
    let mut drifted = 0usize;
    for row in rows {
        let (event_kind, payload, block_number) = row?;
        if !matches!(event_kind.as_str(), "position_opened" | "position_closed" | "position_liquidated") {
            continue;
        }
        let parsed: serde_json::Value = serde_json::from_str(&payload).unwrap_or(serde_json::Value::Null);
        let market_id = parsed.get("market_id").and_then(|v| v.as_str()).unwrap_or("?").to_string();
        let trader = parsed.get("trader").and_then(|v| v.as_str()).unwrap_or("?").to_string();
        checked += 1;

        let ledger_size: Option<String> = conn
            .query_row(
                "SELECT size FROM positions WHERE trader = ?1 AND market_id = ?2",
                params![trader, market_id],
                |row| row.get(0),
            )
            .ok();

        if ledger_size.is_none() {
            drifted += 1;
            println!("block {block_number}: no ledger position for {trader} in {market_id} ({event_kind})");
        }
    }

    println!("checked {checked} position events from block {from_block}, {drifted} without a matching ledger position");
    if dry_run {
        println!("(dry run: no state mutated)");
    }
    Ok(())
}

fn insurance_topup(db_path: &str, amount: &str) -> Result<()> {
    let amount: Fixed18 = amount.parse().map_err(|_| anyhow::anyhow!("invalid amount: {amount}"))?;
    if amount.is_negative() || amount.is_zero() {
        anyhow::bail!("top-up amount must be positive");
    }

    let conn = open_readwrite(db_path)?;
    let now = now_ts();
    let existing: Option<String> = conn
        .query_row(
            "SELECT collateral FROM vault_accounts WHERE trader = ?1",
            params![perpcore::vault::INSURANCE_FUND_TRADER],
            |row| row.get(0),
        )
        .ok();

    let current: Fixed18 = existing.as_deref().unwrap_or("0").parse().unwrap_or(Fixed18::ZERO);
    let updated = current.checked_add(amount).context("overflow computing insurance fund balance")?;

    conn.execute(
        "INSERT INTO vault_accounts (trader, collateral, bridged_credit, sum_reserved, realized_pnl_cum, pending_fees, created_at, updated_at)
         VALUES (?1, ?2, '0', '0', '0', '0', ?3, ?3)
         ON CONFLICT(trader) DO UPDATE SET collateral = ?2, updated_at = ?3",
        params![perpcore::vault::INSURANCE_FUND_TRADER, updated.to_string(), now],
    )?;

    println!("insurance fund collateral: {current} -> {updated}");
    println!("note: the running node must be restarted (or re-read this row) to pick up the new balance in its in-memory actor");
    Ok(())
}

fn now_ts() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}
