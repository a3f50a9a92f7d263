//! Process entry point: loads configuration, constructs the shared actor
//! tables and gateway state, mounts the HTTP API, and spawns the background
//! loops (book expiry, funding, liquidation). Event ingestion and dispatch
//! submission remain trait-only per scope (no chain RPC client ships here);
//! only the parts of the system with a concrete in-process implementation
//! are started.

use anyhow::Context;
use perpcore::api::{build_router, AppState};
use perpcore::auth::JwtHandler;
use perpcore::book::BookHandle;
use perpcore::config::Config;
use perpcore::dispatch::{KillSwitch, NonceAllocator, SignerPool};
use perpcore::fixed::Fixed18;
use perpcore::funding::{FundingAccountant, FundingConfig};
use perpcore::gateway::{Eip712Domain, GatewayRateLimiter, NonceStore, PolicyConfig, RateLimitConfig};
use perpcore::liquidation::{EngineLiquidationContext, LiquidationParams, LiquidationQueue, LiquidationWorker};
use perpcore::market::MarketRegistry;
use perpcore::vault::TraderHandle;
use std::collections::{HashMap, HashSet};
use std::str::FromStr;
use std::sync::atomic::AtomicU64;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::Mutex;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    info!("perpcore starting up");

    let config = Config::from_env().context("loading configuration")?;
    let prometheus_handle = perpcore::metrics::install();

    let registry = Arc::new(MarketRegistry::new());
    let books: Arc<Mutex<HashMap<String, BookHandle>>> = Arc::new(Mutex::new(HashMap::new()));
    let traders: Arc<Mutex<HashMap<String, TraderHandle>>> = Arc::new(Mutex::new(HashMap::new()));
    let order_id_seq = Arc::new(AtomicU64::new(1));

    {
        let (fund_handle, _join) = perpcore::vault::spawn_trader_actor(perpcore::vault::INSURANCE_FUND_TRADER);
        traders.lock().await.insert(perpcore::vault::INSURANCE_FUND_TRADER.to_string(), fund_handle);
    }

    let jwt_secret = std::env::var("JWT_SECRET")
        .unwrap_or_else(|_| "dev-secret-change-in-production-minimum-32-characters".to_string());
    let jwt_handler = Arc::new(JwtHandler::new(jwt_secret));

    let eip712_toml = &config.toml.eip712_domain;
    let eip712_domain = Arc::new(Eip712Domain {
        name: eip712_toml.name.clone(),
        version: eip712_toml.version.clone(),
        chain_id: eip712_toml.chain_id,
        verifying_contract: ethers_core::types::Address::from_str(&eip712_toml.verifying_contract)
            .context("parsing eip712_domain.verifying_contract")?,
    });

    let policy_toml = &config.toml.policy;
    let policy = Arc::new(PolicyConfig {
        max_order_notional: policy_toml
            .max_order_notional
            .parse::<Fixed18>()
            .context("parsing policy.max_order_notional")?,
        allowed_markets: policy_toml.allowed_markets.iter().cloned().collect::<HashSet<_>>(),
    });

    let rate_limits = &config.toml.rate_limits;
    let rate_limiter = Arc::new(GatewayRateLimiter::new(
        RateLimitConfig {
            max_requests: rate_limits.per_trader_max_requests,
            window: Duration::from_secs(rate_limits.per_trader_window_secs),
            burst: 0,
        },
        RateLimitConfig {
            max_requests: rate_limits.global_max_requests,
            window: Duration::from_secs(rate_limits.global_window_secs),
            burst: 0,
        },
    ));

    let relayer_set_roots = Arc::new(config.toml.relayer_set_roots.clone());

    let state = AppState {
        config: Arc::new(config.clone()),
        registry: registry.clone(),
        books: books.clone(),
        traders: traders.clone(),
        sessions: Arc::new(Mutex::new(HashMap::new())),
        nonces: Arc::new(Mutex::new(NonceStore::new())),
        rate_limiter,
        policy,
        eip712_domain,
        relayer_set_roots,
        liquidation_queue: Arc::new(Mutex::new(LiquidationQueue::new(10_000))),
        nonce_allocator: Arc::new(NonceAllocator::new()),
        signer_pool: Arc::new(Mutex::new(SignerPool::new())),
        kill_switch: Arc::new(KillSwitch::new()),
        order_id_seq: order_id_seq.clone(),
        jwt_handler,
    };

    info!(port = config.port, "gateway state constructed");

    let expiry_tick = Duration::from_secs(config.expiry_scan_interval_secs.max(1));
    {
        let books = books.clone();
        tokio::spawn(async move {
            loop {
                tokio::time::sleep(expiry_tick).await;
                let handles: Vec<BookHandle> = books.lock().await.values().cloned().collect();
                let now = chrono::Utc::now().timestamp();
                for handle in handles {
                    let expired = handle.expire_due(now).await;
                    if !expired.is_empty() {
                        info!(count = expired.len(), "expired GTD orders swept");
                    }
                }
            }
        });
    }

    {
        let registry = registry.clone();
        let traders = traders.clone();
        let funding_toml = config.toml.funding.clone();
        let cap = funding_toml
            .cap
            .parse::<Fixed18>()
            .unwrap_or_else(|_| "0.0075".parse().expect("fallback funding cap parses"));
        let interval_secs = funding_toml.interval_secs;
        tokio::spawn(async move {
            let mut accountant = FundingAccountant::new(FundingConfig { interval_secs, cap });
            let tick = Duration::from_secs(interval_secs.max(1) as u64 / 4).max(Duration::from_secs(1));
            loop {
                tokio::time::sleep(tick).await;
                let now = chrono::Utc::now().timestamp();
                accountant.apply_due(&registry, &traders, now).await;
            }
        });
    }

    {
        let ctx = Arc::new(EngineLiquidationContext::new(
            registry.clone(),
            books.clone(),
            traders.clone(),
            order_id_seq.clone(),
            config.toml.treasury_address.clone(),
        ));
        let worker = Arc::new(LiquidationWorker::new(
            ctx,
            LiquidationParams {
                slippage_cap: perpcore::fixed::bps_of(Fixed18::from_i64(1), config.toml.liquidation.slippage_cap_bps)
                    .unwrap_or(Fixed18::ZERO),
                base_backoff_secs: config.liquidation_base_backoff_secs,
                jitter_secs: config.liquidation_jitter_secs,
            },
        ));
        let queue = state.liquidation_queue.clone();
        let registry = registry.clone();
        let traders = traders.clone();
        tokio::spawn(async move {
            let scan_tick = Duration::from_secs(2);
            loop {
                tokio::time::sleep(scan_tick).await;
                let now = chrono::Utc::now().timestamp();

                for market in registry.list() {
                    if !market.is_tradeable() {
                        continue;
                    }
                    let handles: Vec<TraderHandle> = traders.lock().await.values().cloned().collect();
                    let mut positions = Vec::new();
                    for handle in handles {
                        if let Some((_, trader_positions)) = handle.snapshot().await {
                            positions.extend(
                                trader_positions.into_iter().filter(|p| p.market_id == market.market_id),
                            );
                        }
                    }
                    worker
                        .scan_market(&queue, &market.market_id, &positions, market.mark_price, market.maintenance_margin_bps, now)
                        .await;
                }

                while let Some(result) = worker.process_one(&queue, now).await {
                    if matches!(result, perpcore::liquidation::ProcessResult::Failed) {
                        warn!("liquidation job failed and is no longer retried automatically");
                    }
                }
            }
        });
    }

    let app = build_router(state, prometheus_handle);
    let addr = format!("0.0.0.0:{}", config.port);
    let listener = TcpListener::bind(&addr).await.context("binding HTTP listener")?;
    info!(%addr, "perpcore listening");

    axum::serve(listener, app).await.context("server error")?;

    Ok(())
}

fn init_tracing() {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "perpcore=info,tower_http=info".into()))
        .with(tracing_subscriber::fmt::layer())
        .init();
}
