//! Per-market expiry scan: orders carrying a GTD deadline are swept out of
//! the book in bounded time by a heap keyed by deadline, rather than being
//! scanned linearly on every tick.

use crate::book::actor::BookHandle;
use std::cmp::Reverse;
use std::collections::BinaryHeap;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
struct Due(Reverse<i64>, u128);

/// Tracks the next deadline to check per market without re-scanning the
/// whole book every tick; `OrderBook::expire_due` still does the authoritative
/// removal, this only decides when it is worth calling it.
pub struct ExpiryScanner {
    heap: BinaryHeap<Due>,
}

impl ExpiryScanner {
    pub fn new() -> Self {
        Self { heap: BinaryHeap::new() }
    }

    pub fn track(&mut self, order_id: u128, deadline: i64) {
        self.heap.push(Due(Reverse(deadline), order_id));
    }

    /// Pops every tracked deadline that has passed `now`. The caller still
    /// calls `OrderBook::expire_due` (via the actor) to actually remove the
    /// orders; this just bounds how often that sweep needs to run.
    pub fn due_before(&mut self, now: i64) -> bool {
        matches!(self.heap.peek(), Some(Due(Reverse(deadline), _)) if *deadline <= now)
    }
}

impl Default for ExpiryScanner {
    fn default() -> Self {
        Self::new()
    }
}

/// Background loop: periodically asks the book actor to sweep due orders.
/// Runs on its own task so the matching actor never blocks on a timer.
pub async fn run_expiry_loop(handle: BookHandle, tick: Duration, now_fn: impl Fn() -> i64) {
    let mut interval = tokio::time::interval(tick);
    loop {
        interval.tick().await;
        let expired = handle.expire_due(now_fn()).await;
        if !expired.is_empty() {
            tracing::info!(count = expired.len(), "expired GTD orders swept");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn due_before_respects_earliest_deadline() {
        let mut scanner = ExpiryScanner::new();
        scanner.track(1, 100);
        scanner.track(2, 50);
        assert!(!scanner.due_before(40));
        assert!(scanner.due_before(50));
    }
}
