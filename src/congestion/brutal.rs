//! Fixed-rate "brutal" sender.
//!
//! Sends at the reference rate regardless of loss. Pacing uses a byte-based
//! token bucket with a bounded burst.

use std::time::{Duration, Instant};

use crate::congestion::{CongestionControl, CongestionFactory};

/// Smallest burst the bucket allows, in bytes.
pub const MIN_BURST_BYTES: u64 = 16 * 1024;

/// Fraction of one second's worth of bytes allowed as burst.
const BURST_DIVISOR: u64 = 10;

/// Builds one [`BrutalSender`] per connection.
#[derive(Debug, Clone, Copy, Default)]
pub struct BrutalFactory;

impl CongestionFactory for BrutalFactory {
    fn build(&self, reference_bps: u64) -> Box<dyn CongestionControl> {
        Box::new(BrutalSender::new(reference_bps))
    }
}

/// Paces a single connection at a fixed rate.
#[derive(Debug)]
pub struct BrutalSender {
    rate_bps: u64,
    burst: f64,
    tokens: f64,
    last_update: Option<Instant>,
}

impl BrutalSender {
    pub fn new(rate_bps: u64) -> Self {
        let burst = (rate_bps / BURST_DIVISOR).max(MIN_BURST_BYTES) as f64;
        Self {
            rate_bps,
            burst,
            tokens: burst,
            last_update: None,
        }
    }

    fn refill(&mut self, now: Instant) {
        if let Some(last) = self.last_update {
            let elapsed = now.saturating_duration_since(last).as_secs_f64();
            self.tokens = (self.tokens + elapsed * self.rate_bps as f64).min(self.burst);
        }
        self.last_update = Some(now);
    }
}

impl CongestionControl for BrutalSender {
    fn pacing_rate(&self) -> u64 {
        self.rate_bps
    }

    fn on_sent(&mut self, now: Instant, bytes: u64) -> Duration {
        if self.rate_bps == 0 {
            return Duration::ZERO;
        }
        self.refill(now);
        self.tokens -= bytes as f64;
        if self.tokens >= 0.0 {
            Duration::ZERO
        } else {
            Duration::from_secs_f64(-self.tokens / self.rate_bps as f64)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn factory_binds_reference_rate() {
        let factory = BrutalFactory;
        assert_eq!(factory.build(1_000_000).pacing_rate(), 1_000_000);
        assert_eq!(factory.build(42).pacing_rate(), 42);
    }

    #[test]
    fn controllers_are_independent() {
        let factory = BrutalFactory;
        let now = Instant::now();
        let mut a = factory.build(100_000);
        let mut b = factory.build(100_000);

        // Drain a's bucket; b is unaffected.
        assert!(a.on_sent(now, 1_000_000) > Duration::ZERO);
        assert_eq!(b.on_sent(now, 1_000), Duration::ZERO);
    }

    #[test]
    fn burst_is_free_then_paced() {
        let now = Instant::now();
        let mut sender = BrutalSender::new(1_000_000);
        // Burst is 100 KB at 1 MB/s.
        assert_eq!(sender.on_sent(now, 100_000), Duration::ZERO);

        let delay = sender.on_sent(now, 500_000);
        assert!((delay.as_secs_f64() - 0.5).abs() < 1e-6, "{:?}", delay);
    }

    #[test]
    fn tokens_refill_over_time() {
        let start = Instant::now();
        let mut sender = BrutalSender::new(1_000_000);
        sender.on_sent(start, 100_000);
        let later = start + Duration::from_millis(60);
        assert_eq!(sender.on_sent(later, 50_000), Duration::ZERO);
    }

    #[test]
    fn zero_rate_is_unpaced() {
        let mut sender = BrutalSender::new(0);
        assert_eq!(sender.on_sent(Instant::now(), u64::MAX / 2), Duration::ZERO);
    }
}
