use dashmap::DashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, trace};

use crate::clock::{Clock, SystemClock};
use crate::error::ConfigError;
use crate::metrics::{REGISTRY_SIZE, SWEPT_ENTRIES};

// Ceiling and window length for one call site.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitConfig {
    max_requests: u32,
    window: Duration,
}

impl RateLimitConfig {
    pub fn new(max_requests: u32, window: Duration) -> Result<Self, ConfigError> {
        if max_requests == 0 {
            return Err(ConfigError::ZeroMaxRequests);
        }
        if window.is_zero() {
            return Err(ConfigError::ZeroWindow);
        }
        Ok(Self {
            max_requests,
            window,
        })
    }

    pub fn from_millis(max_requests: u32, window_ms: u64) -> Result<Self, ConfigError> {
        Self::new(max_requests, Duration::from_millis(window_ms))
    }

    // Only for the built-in table, whose values are known to be positive
    pub(crate) const fn preset(max_requests: u32, window_ms: u64) -> Self {
        Self {
            max_requests,
            window: Duration::from_millis(window_ms),
        }
    }

    pub fn max_requests(&self) -> u32 {
        self.max_requests
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    pub fn window_ms(&self) -> u64 {
        u64::try_from(self.window.as_millis()).unwrap_or(u64::MAX)
    }
}

// Outcome of a single `check_and_consume` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Decision {
    pub success: bool,
    // Requests still allowed in the current window after this call
    pub remaining: u32,
    // Time until the current window ends
    pub reset_in: Duration,
}

impl Decision {
    pub fn reset_in_ms(&self) -> u64 {
        u64::try_from(self.reset_in.as_millis()).unwrap_or(u64::MAX)
    }
}

// Per-key counter
struct RateLimitEntry {
    count: u32,
    window_reset_at: Instant,
}

// When expired entries get swept as a side effect of `check_and_consume`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CleanupPolicy {
    // Sweep after a call with the given probability
    Probabilistic { probability: f64 },
    // Never sweep inline; rely on `sweep_expired` or the background sweeper
    Disabled,
}

impl CleanupPolicy {
    pub fn probabilistic(probability: f64) -> Result<Self, ConfigError> {
        if !(0.0..=1.0).contains(&probability) {
            return Err(ConfigError::InvalidProbability(probability));
        }
        Ok(CleanupPolicy::Probabilistic { probability })
    }

    fn should_run(&self) -> bool {
        match *self {
            CleanupPolicy::Probabilistic { probability } => rand::random::<f64>() < probability,
            CleanupPolicy::Disabled => false,
        }
    }
}

impl Default for CleanupPolicy {
    fn default() -> Self {
        CleanupPolicy::Probabilistic { probability: 0.01 }
    }
}

// In-memory registry of per-key windows.
// One instance is shared by every request task. The map shards lock per
// key, so the read-modify-write of a single decision is atomic.
pub struct RateLimiter {
    entries: DashMap<String, RateLimitEntry>,
    clock: Arc<dyn Clock>,
    cleanup: CleanupPolicy,
}

impl RateLimiter {
    pub fn new(cleanup: CleanupPolicy) -> Self {
        Self::with_clock(Arc::new(SystemClock), cleanup)
    }

    pub fn with_clock(clock: Arc<dyn Clock>, cleanup: CleanupPolicy) -> Self {
        Self {
            entries: DashMap::new(),
            clock,
            cleanup,
        }
    }

    // Decide whether a request for `key` may proceed and record it if so.
    pub fn check_and_consume(&self, key: &str, config: &RateLimitConfig) -> Decision {
        let now = self.clock.now();

        let decision = {
            // A fresh entry starts already expired so it takes the reset path
            let mut entry = self
                .entries
                .entry(key.to_string())
                .or_insert_with(|| RateLimitEntry {
                    count: 0,
                    window_reset_at: now,
                });

            if now >= entry.window_reset_at {
                entry.count = 1;
                entry.window_reset_at = now + config.window;
                Decision {
                    success: true,
                    remaining: config.max_requests - 1,
                    reset_in: config.window,
                }
            } else if entry.count < config.max_requests {
                entry.count += 1;
                Decision {
                    success: true,
                    remaining: config.max_requests - entry.count,
                    reset_in: entry.window_reset_at.saturating_duration_since(now),
                }
            } else {
                Decision {
                    success: false,
                    remaining: 0,
                    reset_in: entry.window_reset_at.saturating_duration_since(now),
                }
            }
        };

        trace!(
            key,
            success = decision.success,
            remaining = decision.remaining,
            "rate limit decision"
        );

        // retain() locks every shard, so the entry guard above must be gone
        if self.cleanup.should_run() {
            self.sweep_at(now);
        }

        decision
    }

    // Remove every entry whose window has ended. Returns how many went.
    pub fn sweep_expired(&self) -> usize {
        self.sweep_at(self.clock.now())
    }

    fn sweep_at(&self, now: Instant) -> usize {
        let mut removed = 0usize;
        self.entries.retain(|_, entry| {
            let active = entry.window_reset_at > now;
            if !active {
                removed += 1;
            }
            active
        });

        if removed > 0 {
            SWEPT_ENTRIES.inc_by(removed as u64);
            debug!(removed, remaining = self.entries.len(), "swept expired rate limit entries");
        }
        REGISTRY_SIZE.set(self.entries.len() as i64);
        removed
    }

    // Forget a key, e.g. after a successful login.
    pub fn reset(&self, key: &str) -> bool {
        self.entries.remove(key).is_some()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new(CleanupPolicy::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn manual() -> (Arc<ManualClock>, RateLimiter) {
        let clock = Arc::new(ManualClock::new());
        let limiter = RateLimiter::with_clock(clock.clone(), CleanupPolicy::Disabled);
        (clock, limiter)
    }

    fn config(max: u32, window_ms: u64) -> RateLimitConfig {
        RateLimitConfig::from_millis(max, window_ms).unwrap()
    }

    #[test]
    fn allows_exactly_max_requests_with_decreasing_remaining() {
        let (_, limiter) = manual();
        let cfg = config(5, 60_000);

        for i in 0..5 {
            let d = limiter.check_and_consume("user", &cfg);
            assert!(d.success);
            assert_eq!(d.remaining, 5 - (i + 1));
        }
    }

    #[test]
    fn blocks_once_window_is_exhausted() {
        let (clock, limiter) = manual();
        let cfg = config(3, 60_000);

        let remaining: Vec<u32> = (0..3)
            .map(|_| limiter.check_and_consume("ip:10.0.0.1", &cfg).remaining)
            .collect();
        assert_eq!(remaining, vec![2, 1, 0]);

        clock.advance(Duration::from_millis(1_000));
        let blocked = limiter.check_and_consume("ip:10.0.0.1", &cfg);
        assert!(!blocked.success);
        assert_eq!(blocked.remaining, 0);
        assert_eq!(blocked.reset_in, Duration::from_millis(59_000));
    }

    #[test]
    fn denied_calls_do_not_extend_or_count() {
        let (clock, limiter) = manual();
        let cfg = config(1, 1_000);

        assert!(limiter.check_and_consume("k", &cfg).success);
        for _ in 0..10 {
            assert!(!limiter.check_and_consume("k", &cfg).success);
        }

        clock.advance(Duration::from_millis(1_000));
        let d = limiter.check_and_consume("k", &cfg);
        assert!(d.success);
        assert_eq!(d.remaining, 0);
    }

    #[test]
    fn window_resets_after_it_elapses() {
        let (clock, limiter) = manual();
        let cfg = config(2, 100);

        assert!(limiter.check_and_consume("k", &cfg).success);
        assert!(limiter.check_and_consume("k", &cfg).success);
        assert!(!limiter.check_and_consume("k", &cfg).success);

        clock.advance(Duration::from_millis(150));
        let after = limiter.check_and_consume("k", &cfg);
        assert!(after.success);
        assert_eq!(after.remaining, 1);
        assert_eq!(after.reset_in, Duration::from_millis(100));
    }

    #[test]
    fn window_resets_exactly_at_boundary() {
        let (clock, limiter) = manual();
        let cfg = config(1, 500);

        assert!(limiter.check_and_consume("k", &cfg).success);
        clock.advance(Duration::from_millis(499));
        assert!(!limiter.check_and_consume("k", &cfg).success);
        clock.advance(Duration::from_millis(1));
        assert!(limiter.check_and_consume("k", &cfg).success);
    }

    #[test]
    fn keys_are_independent() {
        let (_, limiter) = manual();
        let cfg = config(2, 60_000);

        limiter.check_and_consume("a", &cfg);
        limiter.check_and_consume("a", &cfg);
        assert!(!limiter.check_and_consume("a", &cfg).success);

        let b = limiter.check_and_consume("b", &cfg);
        assert!(b.success);
        assert_eq!(b.remaining, 1);
    }

    #[test]
    fn reset_in_starts_at_window_and_decreases() {
        let (clock, limiter) = manual();
        let cfg = config(10, 10_000);

        let first = limiter.check_and_consume("k", &cfg);
        assert_eq!(first.reset_in, Duration::from_millis(10_000));

        clock.advance(Duration::from_millis(2_500));
        let second = limiter.check_and_consume("k", &cfg);
        assert_eq!(second.reset_in_ms(), 7_500);

        clock.advance(Duration::from_millis(2_500));
        let third = limiter.check_and_consume("k", &cfg);
        assert!(third.reset_in < second.reset_in);

        clock.advance(Duration::from_millis(5_000));
        let rolled = limiter.check_and_consume("k", &cfg);
        assert_eq!(rolled.reset_in_ms(), 10_000);
        assert_eq!(rolled.remaining, 9);
    }

    #[test]
    fn typical_spaced_usage_with_system_clock() {
        let limiter = RateLimiter::new(CleanupPolicy::Disabled);
        let cfg = config(2, 100);

        let first = limiter.check_and_consume("k", &cfg);
        assert!(first.reset_in_ms() > 0 && first.reset_in_ms() <= 100);
        assert!(limiter.check_and_consume("k", &cfg).success);
        assert!(!limiter.check_and_consume("k", &cfg).success);

        std::thread::sleep(Duration::from_millis(150));

        let after = limiter.check_and_consume("k", &cfg);
        assert!(after.success);
        assert_eq!(after.remaining, 1);
    }

    #[test]
    fn concurrent_callers_never_exceed_max() {
        let limiter = RateLimiter::new(CleanupPolicy::Disabled);
        let cfg = config(5, 60_000);
        let allowed = AtomicU32::new(0);

        std::thread::scope(|s| {
            for _ in 0..16 {
                s.spawn(|| {
                    for _ in 0..4 {
                        if limiter.check_and_consume("shared", &cfg).success {
                            allowed.fetch_add(1, Ordering::SeqCst);
                        }
                    }
                });
            }
        });

        assert_eq!(allowed.load(Ordering::SeqCst), 5);
    }

    #[test]
    fn sweep_removes_only_expired_entries() {
        let (clock, limiter) = manual();
        let short = config(1, 50);
        let long = config(5, 60_000);

        limiter.check_and_consume("active", &long);
        for i in 0..20 {
            limiter.check_and_consume(&format!("old-{i}"), &short);
        }
        assert_eq!(limiter.len(), 21);

        clock.advance(Duration::from_millis(100));
        assert_eq!(limiter.sweep_expired(), 20);
        assert_eq!(limiter.len(), 1);

        let d = limiter.check_and_consume("active", &long);
        assert!(d.success);
        assert_eq!(d.remaining, 3);
    }

    #[test]
    fn inline_cleanup_bounds_registry_growth() {
        let clock = Arc::new(ManualClock::new());
        let limiter = RateLimiter::with_clock(
            clock.clone(),
            CleanupPolicy::probabilistic(1.0).unwrap(),
        );
        let cfg = config(1, 50);

        for i in 0..200 {
            limiter.check_and_consume(&format!("burst-{i}"), &cfg);
        }
        // every call swept, but all entries were still active
        assert_eq!(limiter.len(), 200);

        clock.advance(Duration::from_millis(100));
        let d = limiter.check_and_consume("trigger", &cfg);
        assert!(d.success);
        assert_eq!(limiter.len(), 1);
    }

    #[test]
    fn inline_cleanup_keeps_the_active_key_intact() {
        let clock = Arc::new(ManualClock::new());
        let limiter = RateLimiter::with_clock(
            clock.clone(),
            CleanupPolicy::probabilistic(1.0).unwrap(),
        );
        let long = config(5, 60_000);

        limiter.check_and_consume("user", &long);
        for i in 0..100 {
            limiter.check_and_consume(&format!("expired-{i}"), &config(1, 1));
        }
        clock.advance(Duration::from_millis(10));
        for i in 0..200 {
            limiter.check_and_consume(&format!("trigger-{i}"), &long);
        }

        let d = limiter.check_and_consume("user", &long);
        assert!(d.success);
        assert_eq!(d.remaining, 3);
    }

    #[test]
    fn reset_forgets_a_key() {
        let (_, limiter) = manual();
        let cfg = config(1, 60_000);

        assert!(limiter.check_and_consume("magiclink:x", &cfg).success);
        assert!(!limiter.check_and_consume("magiclink:x", &cfg).success);
        assert!(limiter.reset("magiclink:x"));
        assert!(!limiter.reset("magiclink:x"));
        assert!(limiter.check_and_consume("magiclink:x", &cfg).success);
    }

    #[test]
    fn rejects_non_positive_config() {
        assert_eq!(
            RateLimitConfig::new(0, Duration::from_secs(1)),
            Err(ConfigError::ZeroMaxRequests)
        );
        assert_eq!(
            RateLimitConfig::new(1, Duration::ZERO),
            Err(ConfigError::ZeroWindow)
        );
    }

    #[test]
    fn rejects_probability_out_of_range() {
        assert!(CleanupPolicy::probabilistic(-0.1).is_err());
        assert!(CleanupPolicy::probabilistic(1.5).is_err());
        assert!(CleanupPolicy::probabilistic(0.0).is_ok());
    }
}
