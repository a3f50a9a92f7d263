//! SQLite-backed persistence: a single `Connection` behind a
//! `tokio::sync::Mutex`, schema applied eagerly at construction, async
//! wrapper methods that hold the lock only for the duration of one
//! statement.

use crate::persistence::schema::ALL_SCHEMA_STATEMENTS;
use anyhow::{Context, Result};
use rusqlite::{params, Connection, OptionalExtension};
use std::sync::Arc;
use tokio::sync::Mutex;

#[derive(Clone)]
pub struct Db {
    conn: Arc<Mutex<Connection>>,
}

impl Db {
    pub fn open(path: &str) -> Result<Self> {
        let conn = Connection::open(path).context("open db")?;
        conn.pragma_update(None, "journal_mode", "WAL").ok();
        conn.pragma_update(None, "synchronous", "NORMAL").ok();
        conn.pragma_update(None, "foreign_keys", "ON").ok();
        for stmt in ALL_SCHEMA_STATEMENTS {
            conn.execute(stmt, []).with_context(|| format!("applying schema: {stmt}"))?;
        }
        Ok(Self { conn: Arc::new(Mutex::new(conn)) })
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().context("open in-memory db")?;
        for stmt in ALL_SCHEMA_STATEMENTS {
            conn.execute(stmt, []).with_context(|| format!("applying schema: {stmt}"))?;
        }
        Ok(Self { conn: Arc::new(Mutex::new(conn)) })
    }

    /// Inserts an event row. Returns `Ok(false)` on a `(tx_hash, log_index)`
    /// uniqueness violation instead of an error — duplicate insertion is a
    /// silent no-op per the ingestion contract, not a failure.
    pub async fn insert_event_record(
        &self,
        tx_hash: &str,
        log_index: u64,
        block_number: u64,
        contract_address: &str,
        event_kind: &str,
        payload: &str,
        now: i64,
    ) -> Result<bool> {
        let conn = self.conn.lock().await;
        let result = conn.execute(
            "INSERT INTO event_records
                (tx_hash, log_index, block_number, contract_address, event_kind, payload, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?7)",
            params![tx_hash, log_index as i64, block_number as i64, contract_address, event_kind, payload, now],
        );
        match result {
            Ok(_) => Ok(true),
            Err(rusqlite::Error::SqliteFailure(e, _)) if e.code == rusqlite::ErrorCode::ConstraintViolation => {
                Ok(false)
            }
            Err(e) => Err(e).context("insert event_records"),
        }
    }

    /// Inserts a deposit record keyed by `deposit_key`. Returns `Ok(false)`
    /// on a duplicate key — the vault's `credit_from_bridge` path treats
    /// that as a successful no-op.
    pub async fn insert_deposit_record(
        &self,
        deposit_key: &str,
        trader: &str,
        amount_6d: u64,
        src_chain_id: u64,
        src_tx_hash: &str,
        now: i64,
    ) -> Result<bool> {
        let conn = self.conn.lock().await;
        let result = conn.execute(
            "INSERT INTO deposit_records
                (deposit_key, trader, amount_6d, src_chain_id, src_tx_hash, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?6)",
            params![deposit_key, trader, amount_6d as i64, src_chain_id as i64, src_tx_hash, now],
        );
        match result {
            Ok(_) => Ok(true),
            Err(rusqlite::Error::SqliteFailure(e, _)) if e.code == rusqlite::ErrorCode::ConstraintViolation => {
                Ok(false)
            }
            Err(e) => Err(e).context("insert deposit_records"),
        }
    }

    pub async fn upsert_vault_account(
        &self,
        trader: &str,
        collateral: &str,
        bridged_credit: &str,
        sum_reserved: &str,
        realized_pnl_cum: &str,
        pending_fees: &str,
        now: i64,
    ) -> Result<()> {
        let conn = self.conn.lock().await;
        conn.execute(
            "INSERT INTO vault_accounts
                (trader, collateral, bridged_credit, sum_reserved, realized_pnl_cum, pending_fees, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?7)
             ON CONFLICT(trader) DO UPDATE SET
                collateral = excluded.collateral,
                bridged_credit = excluded.bridged_credit,
                sum_reserved = excluded.sum_reserved,
                realized_pnl_cum = excluded.realized_pnl_cum,
                pending_fees = excluded.pending_fees,
                updated_at = excluded.updated_at",
            params![trader, collateral, bridged_credit, sum_reserved, realized_pnl_cum, pending_fees, now],
        )?;
        Ok(())
    }

    pub async fn load_vault_account_raw(
        &self,
        trader: &str,
    ) -> Result<Option<(String, String, String, String, String)>> {
        let conn = self.conn.lock().await;
        conn.query_row(
            "SELECT collateral, bridged_credit, sum_reserved, realized_pnl_cum, pending_fees
             FROM vault_accounts WHERE trader = ?1",
            params![trader],
            |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?, row.get(4)?)),
        )
        .optional()
        .context("load vault_accounts")
    }

    pub async fn upsert_market_status(&self, market_id: &str, status: &str, now: i64) -> Result<()> {
        let conn = self.conn.lock().await;
        conn.execute(
            "UPDATE markets SET status = ?1, updated_at = ?2 WHERE market_id = ?3",
            params![status, now, market_id],
        )?;
        Ok(())
    }

    pub async fn checkpoint_block(&self, contract: &str) -> Result<Option<u64>> {
        let conn = self.conn.lock().await;
        conn.query_row(
            "SELECT block_number FROM event_records WHERE contract_address = ?1 ORDER BY block_number DESC LIMIT 1",
            params![contract],
            |row| row.get::<_, i64>(0),
        )
        .optional()
        .map(|opt| opt.map(|n| n as u64))
        .context("load checkpoint")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn duplicate_event_insert_is_false_not_error() {
        let db = Db::open_in_memory().unwrap();
        let first = db
            .insert_event_record("0xaaa", 0, 100, "0xbook", "position_opened", "{}", 1)
            .await
            .unwrap();
        let second = db
            .insert_event_record("0xaaa", 0, 100, "0xbook", "position_opened", "{}", 1)
            .await
            .unwrap();
        assert!(first);
        assert!(!second);
    }

    #[tokio::test]
    async fn duplicate_deposit_key_is_false_not_error() {
        let db = Db::open_in_memory().unwrap();
        let first = db.insert_deposit_record("dk-1", "0xabc", 500_000_000, 1, "0xaaa", 1).await.unwrap();
        let second = db.insert_deposit_record("dk-1", "0xabc", 500_000_000, 1, "0xaaa", 1).await.unwrap();
        assert!(first);
        assert!(!second);
    }

    #[tokio::test]
    async fn vault_account_round_trips() {
        let db = Db::open_in_memory().unwrap();
        db.upsert_vault_account("0xabc", "100.00", "0", "10.00", "0", "0", 1).await.unwrap();
        let row = db.load_vault_account_raw("0xabc").await.unwrap().unwrap();
        assert_eq!(row.0, "100.00");
        db.upsert_vault_account("0xabc", "150.00", "0", "10.00", "0", "0", 2).await.unwrap();
        let row = db.load_vault_account_raw("0xabc").await.unwrap().unwrap();
        assert_eq!(row.0, "150.00");
    }
}
