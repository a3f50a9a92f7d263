//! Application configuration: environment variables for deployment-specific
//! scalars plus a structured TOML file for the larger nested sections (RPC
//! endpoints, signer pools, EIP-712 domain, fee splits, liquidation
//! parameters, rate limits) that don't fit comfortably as flat env vars.

use serde::Deserialize;
use std::collections::HashMap;
use std::fmt;

#[derive(Debug, Clone)]
pub struct Config {
    pub database_path: String,
    pub port: u16,
    pub rpc_confirmations: u64,
    pub ingest_poll_interval_secs: u64,
    pub expiry_scan_interval_secs: u64,
    pub liquidation_base_backoff_secs: i64,
    pub liquidation_jitter_secs: i64,
    pub dispatch_stuck_after_secs: i64,
    pub heartbeat_staleness_secs: i64,
    pub toml: TomlConfig,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenv::dotenv().ok();

        let database_path =
            std::env::var("DATABASE_PATH").unwrap_or_else(|_| "./perpcore.db".to_string());

        let port = std::env::var("PORT")
            .unwrap_or_else(|_| "8080".to_string())
            .parse()
            .unwrap_or(8080);

        let rpc_confirmations = std::env::var("RPC_CONFIRMATIONS")
            .unwrap_or_else(|_| "12".to_string())
            .parse()
            .unwrap_or(12);

        let ingest_poll_interval_secs = std::env::var("INGEST_POLL_INTERVAL_SECS")
            .unwrap_or_else(|_| "5".to_string())
            .parse()
            .unwrap_or(5);

        let expiry_scan_interval_secs = std::env::var("EXPIRY_SCAN_INTERVAL_SECS")
            .unwrap_or_else(|_| "1".to_string())
            .parse()
            .unwrap_or(1);

        let liquidation_base_backoff_secs = std::env::var("LIQUIDATION_BASE_BACKOFF_SECS")
            .unwrap_or_else(|_| "2".to_string())
            .parse()
            .unwrap_or(2);

        let liquidation_jitter_secs = std::env::var("LIQUIDATION_JITTER_SECS")
            .unwrap_or_else(|_| "1".to_string())
            .parse()
            .unwrap_or(1);

        let dispatch_stuck_after_secs = std::env::var("DISPATCH_STUCK_AFTER_SECS")
            .unwrap_or_else(|_| "90".to_string())
            .parse()
            .unwrap_or(90);

        let heartbeat_staleness_secs = std::env::var("HEARTBEAT_STALENESS_SECS")
            .unwrap_or_else(|_| "60".to_string())
            .parse()
            .unwrap_or(60);

        let toml_path =
            std::env::var("CONFIG_TOML_PATH").unwrap_or_else(|_| "./perpcore.toml".to_string());
        let toml = TomlConfig::load(&toml_path).unwrap_or_default();

        Ok(Self {
            database_path,
            port,
            rpc_confirmations,
            ingest_poll_interval_secs,
            expiry_scan_interval_secs,
            liquidation_base_backoff_secs,
            liquidation_jitter_secs,
            dispatch_stuck_after_secs,
            heartbeat_staleness_secs,
            toml,
        })
    }
}

/// Nested TOML sections too structured to flatten into env vars: RPC
/// endpoints per chain, signer pools by responsibility, relayer set roots,
/// EIP-712 domain, fee splits, liquidation parameters, rate limits.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct TomlConfig {
    #[serde(default)]
    pub rpc_endpoints: HashMap<u64, String>,
    #[serde(default)]
    pub signer_pools: SignerPoolsConfig,
    #[serde(default)]
    pub relayer_set_roots: Vec<String>,
    #[serde(default)]
    pub eip712_domain: Eip712DomainConfig,
    #[serde(default)]
    pub fee_split: FeeSplitConfig,
    #[serde(default)]
    pub liquidation: LiquidationConfigToml,
    #[serde(default)]
    pub rate_limits: RateLimitsConfig,
    #[serde(default)]
    pub policy: PolicyConfigToml,
    #[serde(default)]
    pub funding: FundingConfigToml,
    #[serde(default = "default_treasury_address")]
    pub treasury_address: String,
}

fn default_treasury_address() -> String {
    "0x0000000000000000000000000000000000000000".to_string()
}

impl TomlConfig {
    pub fn load(path: &str) -> anyhow::Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        let parsed: TomlConfig = toml::from_str(&raw)?;
        Ok(parsed)
    }
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct SignerPoolsConfig {
    #[serde(default)]
    pub trade: Vec<String>,
    #[serde(default)]
    pub inbox: Vec<String>,
    #[serde(default)]
    pub outbox: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Eip712DomainConfig {
    pub name: String,
    pub version: String,
    pub chain_id: u64,
    pub verifying_contract: String,
}

impl Default for Eip712DomainConfig {
    fn default() -> Self {
        Self {
            name: "PerpCore".into(),
            version: "1".into(),
            chain_id: 1,
            verifying_contract: "0x0000000000000000000000000000000000000000".into(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct FeeSplitConfig {
    pub creator_bps: u32,
}

impl Default for FeeSplitConfig {
    fn default() -> Self {
        Self { creator_bps: 8000 }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LiquidationConfigToml {
    pub slippage_cap_bps: u32,
    pub base_backoff_secs: i64,
    pub jitter_secs: i64,
}

impl Default for LiquidationConfigToml {
    fn default() -> Self {
        Self { slippage_cap_bps: 100, base_backoff_secs: 2, jitter_secs: 1 }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct RateLimitsConfig {
    pub per_trader_max_requests: u32,
    pub per_trader_window_secs: u64,
    pub global_max_requests: u32,
    pub global_window_secs: u64,
}

impl Default for RateLimitsConfig {
    fn default() -> Self {
        Self {
            per_trader_max_requests: 100,
            per_trader_window_secs: 60,
            global_max_requests: 5000,
            global_window_secs: 60,
        }
    }
}

/// Gateway policy: the order-notional cap and market allowlist applied
/// before an order reaches a book actor. `allowed_markets` empty means "all
/// registered markets", matching `PolicyConfig::allows_market`.
#[derive(Debug, Clone, Deserialize)]
pub struct PolicyConfigToml {
    pub max_order_notional: String,
    #[serde(default)]
    pub allowed_markets: Vec<String>,
}

impl Default for PolicyConfigToml {
    fn default() -> Self {
        Self { max_order_notional: "1000000".to_string(), allowed_markets: Vec::new() }
    }
}

/// Decided parameters for the funding accountant (DESIGN.md Open Question):
/// a 1-hour interval and a 75bps-per-interval cap, both operator-overridable.
#[derive(Debug, Clone, Deserialize)]
pub struct FundingConfigToml {
    pub interval_secs: i64,
    pub cap: String,
}

impl Default for FundingConfigToml {
    fn default() -> Self {
        Self { interval_secs: 3600, cap: "0.0075".to_string() }
    }
}

/// Loads signer private keys from the environment, never from the DB, and
/// never renders key material through `Debug`/`Display`. Only the derived
/// address (computed by the caller from the key, not stored here) is ever
/// logged.
pub struct SecretLoader;

pub struct Secret(String);

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Secret(<redacted>)")
    }
}

impl SecretLoader {
    /// Reads a hex-encoded private key from the named environment variable.
    /// Returns `None` rather than an empty string if unset — callers must
    /// treat a missing signer key as "this signer is unavailable", not
    /// silently proceed with an empty key.
    pub fn load_private_key(env_var: &str) -> Option<Secret> {
        std::env::var(env_var).ok().filter(|s| !s.is_empty()).map(Secret)
    }

    pub fn expose(secret: &Secret) -> &str {
        &secret.0
    }
}
