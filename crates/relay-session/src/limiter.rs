//! Token bucket rate limiter — per-session admission control.
//!
//! Pure data + time logic, no I/O and no internal locking: access is
//! already serialized by the session that owns the bucket. Refill is
//! computed lazily on each admission check from the elapsed time since
//! the previous one.

use tokio::time::Instant;

/// A refillable quota of permitted actions.
#[derive(Debug)]
pub struct TokenBucket {
    capacity: f64,
    tokens: f64,
    refill_per_sec: f64,
    last_refill: Instant,
}

impl TokenBucket {
    /// Create a bucket, initially full.
    #[must_use]
    pub fn new(capacity: f64, refill_per_sec: f64) -> Self {
        Self {
            capacity,
            tokens: capacity,
            refill_per_sec,
            last_refill: Instant::now(),
        }
    }

    /// Try to admit an action costing `cost` tokens.
    ///
    /// Refills `elapsed × rate` tokens (capped at capacity) first, then
    /// either subtracts the cost and admits, or denies leaving the level
    /// untouched. O(1), never blocks.
    pub fn admit(&mut self, cost: f64) -> bool {
        self.admit_at(Instant::now(), cost)
    }

    fn admit_at(&mut self, now: Instant, cost: f64) -> bool {
        let elapsed = now.saturating_duration_since(self.last_refill).as_secs_f64();
        self.tokens = (self.tokens + elapsed * self.refill_per_sec).min(self.capacity);
        self.last_refill = now;

        if self.tokens >= cost {
            self.tokens -= cost;
            true
        } else {
            false
        }
    }

    /// Current token level (without refilling).
    #[must_use]
    pub fn level(&self) -> f64 {
        self.tokens
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
