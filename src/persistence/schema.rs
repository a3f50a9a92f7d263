//! Embedded `CREATE TABLE IF NOT EXISTS` schema for every persisted entity:
//! plain SQL strings executed at startup, not a migration framework.

pub const CREATE_MARKETS: &str = "
CREATE TABLE IF NOT EXISTS markets (
    market_id TEXT PRIMARY KEY,
    symbol TEXT NOT NULL UNIQUE,
    collateral_token TEXT NOT NULL,
    collateral_decimals INTEGER NOT NULL,
    tick_size TEXT NOT NULL,
    lot_size TEXT NOT NULL,
    max_leverage INTEGER NOT NULL,
    trading_fee_bps INTEGER NOT NULL,
    maintenance_margin_bps INTEGER NOT NULL,
    liquidation_fee_bps INTEGER NOT NULL,
    status TEXT NOT NULL,
    starting_price TEXT NOT NULL,
    mark_price TEXT NOT NULL,
    index_price TEXT NOT NULL,
    creator TEXT NOT NULL,
    created_at INTEGER NOT NULL,
    updated_at INTEGER NOT NULL
)";

pub const CREATE_ORDERS: &str = "
CREATE TABLE IF NOT EXISTS orders (
    order_id TEXT PRIMARY KEY,
    market_id TEXT NOT NULL,
    trader TEXT NOT NULL,
    side TEXT NOT NULL,
    order_type TEXT NOT NULL,
    qty TEXT NOT NULL,
    filled_qty TEXT NOT NULL,
    price TEXT,
    stop_price TEXT,
    tif TEXT NOT NULL,
    post_only INTEGER NOT NULL,
    status TEXT NOT NULL,
    created_at INTEGER NOT NULL,
    updated_at INTEGER NOT NULL
)";

pub const CREATE_ORDERS_MARKET_IDX: &str =
    "CREATE INDEX IF NOT EXISTS idx_orders_market_status ON orders(market_id, status)";

pub const CREATE_POSITIONS: &str = "
CREATE TABLE IF NOT EXISTS positions (
    trader TEXT NOT NULL,
    market_id TEXT NOT NULL,
    size TEXT NOT NULL,
    entry_price TEXT NOT NULL,
    reserved_margin TEXT NOT NULL,
    realized_pnl_cum TEXT NOT NULL,
    created_at INTEGER NOT NULL,
    updated_at INTEGER NOT NULL,
    PRIMARY KEY (trader, market_id)
)";

pub const CREATE_VAULT_ACCOUNTS: &str = "
CREATE TABLE IF NOT EXISTS vault_accounts (
    trader TEXT PRIMARY KEY,
    collateral TEXT NOT NULL,
    bridged_credit TEXT NOT NULL,
    sum_reserved TEXT NOT NULL,
    realized_pnl_cum TEXT NOT NULL,
    pending_fees TEXT NOT NULL,
    created_at INTEGER NOT NULL,
    updated_at INTEGER NOT NULL
)";

pub const CREATE_DEPOSIT_RECORDS: &str = "
CREATE TABLE IF NOT EXISTS deposit_records (
    deposit_key TEXT PRIMARY KEY,
    trader TEXT NOT NULL,
    amount_6d INTEGER NOT NULL,
    src_chain_id INTEGER NOT NULL,
    src_tx_hash TEXT NOT NULL,
    created_at INTEGER NOT NULL,
    updated_at INTEGER NOT NULL
)";

pub const CREATE_EVENT_RECORDS: &str = "
CREATE TABLE IF NOT EXISTS event_records (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    tx_hash TEXT NOT NULL,
    log_index INTEGER NOT NULL,
    block_number INTEGER NOT NULL,
    contract_address TEXT NOT NULL,
    event_kind TEXT NOT NULL,
    payload TEXT NOT NULL,
    created_at INTEGER NOT NULL,
    updated_at INTEGER NOT NULL,
    UNIQUE (tx_hash, log_index)
)";

pub const CREATE_RELAYER_KEYS: &str = "
CREATE TABLE IF NOT EXISTS relayer_keys (
    address TEXT NOT NULL,
    chain_id INTEGER NOT NULL,
    enabled INTEGER NOT NULL,
    min_balance_threshold TEXT NOT NULL,
    created_at INTEGER NOT NULL,
    updated_at INTEGER NOT NULL,
    PRIMARY KEY (address, chain_id)
)";

pub const CREATE_RELAYER_SUBMISSIONS: &str = "
CREATE TABLE IF NOT EXISTS relayer_submissions (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    relayer_address TEXT NOT NULL,
    chain_id INTEGER NOT NULL,
    nonce INTEGER NOT NULL,
    tx_hash TEXT,
    status TEXT NOT NULL,
    method TEXT NOT NULL,
    correlation_id TEXT NOT NULL,
    created_at INTEGER NOT NULL,
    updated_at INTEGER NOT NULL,
    UNIQUE (relayer_address, chain_id, nonce)
)";

pub const CREATE_LIQ_QUEUE: &str = "
CREATE TABLE IF NOT EXISTS liq_queue (
    trader TEXT NOT NULL,
    market_id TEXT NOT NULL,
    priority INTEGER NOT NULL,
    earliest_run_at INTEGER NOT NULL,
    attempts INTEGER NOT NULL,
    last_error TEXT,
    created_at INTEGER NOT NULL,
    updated_at INTEGER NOT NULL,
    PRIMARY KEY (trader, market_id)
)";

pub const CREATE_SESSIONS: &str = "
CREATE TABLE IF NOT EXISTS sessions (
    session_id TEXT PRIMARY KEY,
    trader TEXT NOT NULL,
    relayer_set_root TEXT NOT NULL,
    expiry INTEGER NOT NULL,
    max_notional_per_trade TEXT NOT NULL,
    max_notional_per_session TEXT NOT NULL,
    notional_used TEXT NOT NULL,
    methods_bitmap INTEGER NOT NULL,
    revoked INTEGER NOT NULL,
    created_at INTEGER NOT NULL,
    updated_at INTEGER NOT NULL
)";

pub const ALL_SCHEMA_STATEMENTS: &[&str] = &[
    CREATE_MARKETS,
    CREATE_ORDERS,
    CREATE_ORDERS_MARKET_IDX,
    CREATE_POSITIONS,
    CREATE_VAULT_ACCOUNTS,
    CREATE_DEPOSIT_RECORDS,
    CREATE_EVENT_RECORDS,
    CREATE_RELAYER_KEYS,
    CREATE_RELAYER_SUBMISSIONS,
    CREATE_LIQ_QUEUE,
    CREATE_SESSIONS,
];
