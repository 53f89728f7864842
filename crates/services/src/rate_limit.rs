//! Per-client admission control.
//!
//! One token bucket per client key (source IP). Buckets refill continuously at
//! `rps` tokens per second up to `burst`, so fractional tokens accumulate
//! between calls. Admission never blocks: it either spends a token or says no.

use std::net::IpAddr;
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use tokio::task::JoinHandle;
use tokio::time::Instant;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RateLimiterConfig {
    /// Sustained requests per second.
    pub rps: f64,
    /// Bucket capacity.
    pub burst: u32,
    /// When false every call admits.
    pub enabled: bool,
    /// Buckets untouched for longer than this are evicted by [`RateLimiter::sweep`].
    pub idle_eviction: Duration,
}

impl Default for RateLimiterConfig {
    fn default() -> Self {
        Self {
            rps: 2.0,
            burst: 4,
            enabled: true,
            idle_eviction: Duration::from_secs(180),
        }
    }
}

#[derive(Debug, Clone)]
struct TokenBucket {
    tokens: f64,
    last_refill: Instant,
}

impl TokenBucket {
    fn full(burst: u32, now: Instant) -> Self {
        Self {
            tokens: f64::from(burst),
            last_refill: now,
        }
    }

    fn refill(&mut self, now: Instant, rps: f64, burst: u32) {
        let elapsed = now.saturating_duration_since(self.last_refill).as_secs_f64();
        self.tokens = (self.tokens + elapsed * rps).min(f64::from(burst));
        self.last_refill = now;
    }
}

/// Token-bucket table keyed by client IP.
///
/// `admit` holds the bucket's shard lock for the whole refill-check-decrement,
/// so two concurrent requests from one client can never spend the same token.
#[derive(Debug)]
pub struct RateLimiter {
    config: RateLimiterConfig,
    buckets: DashMap<IpAddr, TokenBucket>,
}

impl RateLimiter {
    pub fn new(config: RateLimiterConfig) -> Self {
        Self {
            config,
            buckets: DashMap::new(),
        }
    }

    pub fn config(&self) -> &RateLimiterConfig {
        &self.config
    }

    /// Spends one token for `client` if one is available.
    pub fn admit(&self, client: IpAddr) -> bool {
        if !self.config.enabled {
            return true;
        }

        let now = Instant::now();
        let mut bucket = self
            .buckets
            .entry(client)
            .or_insert_with(|| TokenBucket::full(self.config.burst, now));

        bucket.refill(now, self.config.rps, self.config.burst);

        if bucket.tokens >= 1.0 {
            bucket.tokens -= 1.0;
            true
        } else {
            false
        }
    }

    /// Evicts idle buckets and returns how many were removed.
    ///
    /// `DashMap::retain` locks one shard at a time, so admissions for keys in
    /// other shards proceed while the sweep runs.
    pub fn sweep(&self) -> usize {
        let now = Instant::now();
        let idle = self.config.idle_eviction;
        let before = self.buckets.len();
        self.buckets
            .retain(|_, bucket| now.saturating_duration_since(bucket.last_refill) <= idle);
        before.saturating_sub(self.buckets.len())
    }

    /// Number of clients currently tracked.
    pub fn tracked_clients(&self) -> usize {
        self.buckets.len()
    }

    /// Forgets every client.
    pub fn reset(&self) {
        self.buckets.clear();
    }

    /// Runs [`sweep`](Self::sweep) every `every` until the handle is aborted.
    pub fn spawn_sweeper(self: &Arc<Self>, every: Duration) -> JoinHandle<()> {
        let limiter = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(every);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let removed = limiter.sweep();
                if removed > 0 {
                    tracing::debug!(removed, "evicted idle rate limiter buckets");
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn limiter(rps: f64, burst: u32) -> RateLimiter {
        RateLimiter::new(RateLimiterConfig {
            rps,
            burst,
            enabled: true,
            idle_eviction: Duration::from_secs(180),
        })
    }

    fn ip(last: u8) -> IpAddr {
        IpAddr::from([10, 0, 0, last])
    }

    #[tokio::test(start_paused = true)]
    async fn burst_then_refill() {
        let limiter = limiter(2.0, 4);

        for _ in 0..4 {
            assert!(limiter.admit(ip(1)));
        }
        assert!(!limiter.admit(ip(1)));

        tokio::time::advance(Duration::from_millis(500)).await;
        assert!(limiter.admit(ip(1)));
        assert!(!limiter.admit(ip(1)));
    }

    #[tokio::test(start_paused = true)]
    async fn fractional_tokens_accumulate() {
        let limiter = limiter(2.0, 1);
        assert!(limiter.admit(ip(1)));

        tokio::time::advance(Duration::from_millis(250)).await;
        assert!(!limiter.admit(ip(1)));
        tokio::time::advance(Duration::from_millis(250)).await;
        assert!(limiter.admit(ip(1)));
    }

    #[tokio::test(start_paused = true)]
    async fn clients_are_independent() {
        let limiter = limiter(1.0, 1);
        assert!(limiter.admit(ip(1)));
        assert!(!limiter.admit(ip(1)));
        assert!(limiter.admit(ip(2)));
    }

    #[tokio::test(start_paused = true)]
    async fn disabled_limiter_admits_everything() {
        let limiter = RateLimiter::new(RateLimiterConfig {
            enabled: false,
            burst: 1,
            ..RateLimiterConfig::default()
        });
        for _ in 0..100 {
            assert!(limiter.admit(ip(1)));
        }
        assert_eq!(limiter.tracked_clients(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn sweep_evicts_only_idle_buckets() {
        let limiter = limiter(2.0, 4);
        limiter.admit(ip(1));
        tokio::time::advance(Duration::from_secs(120)).await;
        limiter.admit(ip(2));
        tokio::time::advance(Duration::from_secs(61)).await;

        assert_eq!(limiter.sweep(), 1);
        assert_eq!(limiter.tracked_clients(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn concurrent_admissions_never_overspend() {
        let limiter = Arc::new(limiter(0.0001, 10));
        let mut handles = Vec::new();
        for _ in 0..50 {
            let limiter = Arc::clone(&limiter);
            handles.push(tokio::spawn(async move { limiter.admit(ip(9)) }));
        }
        let mut admitted = 0;
        for handle in handles {
            if handle.await.unwrap() {
                admitted += 1;
            }
        }
        assert_eq!(admitted, 10);
    }

    #[tokio::test(start_paused = true)]
    async fn reset_forgets_clients() {
        let limiter = limiter(1.0, 1);
        assert!(limiter.admit(ip(1)));
        limiter.reset();
        assert!(limiter.admit(ip(1)));
    }
}
