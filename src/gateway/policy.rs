//! Gateway policy layer: size caps, market allowlists, and rate limiting.
//! The limiter is a dual-bucket sliding-window scheme — one window per
//! trader plus one global window — the gateway's backpressure requirement
//! is per trader and globally, not per client IP.

use crate::fixed::Fixed18;
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::time::{Duration, Instant};

#[derive(Clone)]
pub struct RateLimitConfig {
    pub max_requests: u32,
    pub window: Duration,
    pub burst: u32,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self { max_requests: 100, window: Duration::from_secs(60), burst: 20 }
    }
}

struct Window {
    count: u32,
    window_start: Instant,
}

pub enum RateLimitResult {
    Allowed { remaining: u32 },
    Exceeded { retry_after: Duration },
}

fn check(config: &RateLimitConfig, window: &mut Window, now: Instant) -> RateLimitResult {
    if now.duration_since(window.window_start) >= config.window {
        window.count = 0;
        window.window_start = now;
    }
    window.count += 1;
    let limit = config.max_requests + config.burst;
    let remaining = limit.saturating_sub(window.count);
    if window.count > limit {
        RateLimitResult::Exceeded { retry_after: (window.window_start + config.window).duration_since(now) }
    } else {
        RateLimitResult::Allowed { remaining }
    }
}

/// Token-bucket-style limiter applied twice per request: once against the
/// submitting trader's own window, once against the shared global window.
/// Either bucket tripping rejects the request.
pub struct GatewayRateLimiter {
    per_trader_config: RateLimitConfig,
    global_config: RateLimitConfig,
    per_trader: Mutex<HashMap<String, Window>>,
    global: Mutex<Window>,
}

impl GatewayRateLimiter {
    pub fn new(per_trader_config: RateLimitConfig, global_config: RateLimitConfig) -> Self {
        Self {
            per_trader_config,
            global_config,
            per_trader: Mutex::new(HashMap::new()),
            global: Mutex::new(Window { count: 0, window_start: Instant::now() }),
        }
    }

    pub fn check_trader(&self, trader: &str) -> RateLimitResult {
        let now = Instant::now();
        {
            let mut global = self.global.lock();
            if let RateLimitResult::Exceeded { retry_after } = check(&self.global_config, &mut global, now) {
                return RateLimitResult::Exceeded { retry_after };
            }
        }
        let mut table = self.per_trader.lock();
        let window = table
            .entry(trader.to_string())
            .or_insert_with(|| Window { count: 0, window_start: now });
        check(&self.per_trader_config, window, now)
    }

    pub fn cleanup(&self) {
        let mut table = self.per_trader.lock();
        let now = Instant::now();
        let window = self.per_trader_config.window;
        table.retain(|_, w| now.duration_since(w.window_start) < window * 2);
    }
}

/// Static policy configuration applied before an order or session trade
/// reaches the matching engine.
#[derive(Debug, Clone)]
pub struct PolicyConfig {
    pub max_order_notional: Fixed18,
    pub allowed_markets: HashSet<String>,
}

impl PolicyConfig {
    pub fn allows_market(&self, market_id: &str) -> bool {
        self.allowed_markets.is_empty() || self.allowed_markets.contains(market_id)
    }

    pub fn allows_notional(&self, notional: Fixed18) -> bool {
        notional <= self.max_order_notional
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn per_trader_bucket_independent_of_other_traders() {
        let limiter = GatewayRateLimiter::new(
            RateLimitConfig { max_requests: 1, window: Duration::from_secs(60), burst: 0 },
            RateLimitConfig { max_requests: 1000, window: Duration::from_secs(60), burst: 0 },
        );
        assert!(matches!(limiter.check_trader("A"), RateLimitResult::Allowed { .. }));
        assert!(matches!(limiter.check_trader("A"), RateLimitResult::Exceeded { .. }));
        assert!(matches!(limiter.check_trader("B"), RateLimitResult::Allowed { .. }));
    }

    #[test]
    fn global_bucket_caps_all_traders_combined() {
        let limiter = GatewayRateLimiter::new(
            RateLimitConfig { max_requests: 1000, window: Duration::from_secs(60), burst: 0 },
            RateLimitConfig { max_requests: 1, window: Duration::from_secs(60), burst: 0 },
        );
        assert!(matches!(limiter.check_trader("A"), RateLimitResult::Allowed { .. }));
        assert!(matches!(limiter.check_trader("B"), RateLimitResult::Exceeded { .. }));
    }

    #[test]
    fn market_allowlist() {
        let policy = PolicyConfig {
            max_order_notional: Fixed18::from_i64(1_000_000),
            allowed_markets: ["GOLD/USD".to_string()].into_iter().collect(),
        };
        assert!(policy.allows_market("GOLD/USD"));
        assert!(!policy.allows_market("SILVER/USD"));
    }
}
