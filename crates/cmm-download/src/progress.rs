//! Progress rate-limiting.

use std::time::{Duration, Instant};

/// Rate-limiter for model-file progress reports.
///
/// The streaming download reports on every percent step, which for a
/// fast transfer is far more often than any subscriber wants. Reports
/// carry byte deltas that feed bandwidth accounting, so suppressing one
/// outright would lose bytes; instead the throttle accumulates the
/// deltas of suppressed reports and releases the carried total with the
/// next report that goes out.
#[derive(Debug)]
pub struct ProgressThrottle {
    last_emit: Option<Instant>,
    min_interval: Duration,
    carried_bytes: u64,
}

impl ProgressThrottle {
    /// Create a throttle with the specified minimum interval.
    #[must_use]
    pub const fn new(min_interval: Duration) -> Self {
        Self {
            last_emit: None,
            min_interval,
            carried_bytes: 0,
        }
    }

    /// Offer a progress observation carrying `delta_bytes`.
    ///
    /// Returns `Some(total)` when a report is due, where `total` is this
    /// delta plus everything suppressed since the last emission; the
    /// caller reports exactly that many bytes. Returns `None` when the
    /// report should be dropped (its bytes stay carried). `force` makes
    /// the report due regardless of timing; terminal 100% reports use it.
    pub fn offer(&mut self, delta_bytes: u64, force: bool) -> Option<u64> {
        self.carried_bytes += delta_bytes;

        let now = Instant::now();
        let due = force
            || match self.last_emit {
                Some(last) => now.duration_since(last) >= self.min_interval,
                None => true,
            };
        if !due {
            return None;
        }

        self.last_emit = Some(now);
        Some(std::mem::take(&mut self.carried_bytes))
    }

    /// Forget the timer and any carried bytes.
    pub const fn reset(&mut self) {
        self.last_emit = None;
        self.carried_bytes = 0;
    }
}

impl Default for ProgressThrottle {
    fn default() -> Self {
        Self::new(Duration::from_millis(100))
    }
}
