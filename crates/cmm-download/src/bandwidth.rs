//! Sliding-window bandwidth monitor.
//!
//! Workers push per-chunk byte deltas; a polling UI reads an aggregated
//! per-second history. Everything sits behind one mutex with short
//! critical sections; samples older than the window are evicted lazily on
//! both read and write.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::{Duration, Instant};

/// One aggregated history bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BandwidthSample {
    /// Whole seconds before "now" this bucket covers (0 = current second).
    pub seconds_ago: u64,
    /// Bytes transferred in that second.
    pub bytes: u64,
}

#[derive(Debug)]
struct Inner {
    samples: VecDeque<(Instant, u64)>,
    total_bytes: u64,
    started_at: Instant,
}

/// Shared throughput tracker.
#[derive(Debug)]
pub struct BandwidthMonitor {
    inner: Mutex<Inner>,
    window: Duration,
    max_samples: usize,
}

impl BandwidthMonitor {
    /// Create a monitor keeping `window_seconds` of history.
    ///
    /// `sample_rate` is a samples-per-second capacity hint bounding the
    /// raw sample buffer.
    #[must_use]
    pub fn new(window_seconds: u64, sample_rate: u64) -> Self {
        Self {
            inner: Mutex::new(Inner {
                samples: VecDeque::new(),
                total_bytes: 0,
                started_at: Instant::now(),
            }),
            window: Duration::from_secs(window_seconds),
            max_samples: usize::try_from(window_seconds.saturating_mul(sample_rate.max(1)))
                .unwrap_or(usize::MAX)
                .max(1),
        }
    }

    /// Record a byte delta at the current instant.
    pub fn add_data_point(&self, bytes: u64) {
        let now = Instant::now();
        let mut inner = self.inner.lock().unwrap();
        inner.total_bytes += bytes;
        inner.samples.push_back((now, bytes));
        Self::evict(&mut inner, now, self.window, self.max_samples);
    }

    /// Per-second aggregated history inside the window, oldest first.
    #[must_use]
    pub fn history(&self) -> Vec<BandwidthSample> {
        let now = Instant::now();
        let mut inner = self.inner.lock().unwrap();
        Self::evict(&mut inner, now, self.window, self.max_samples);

        let mut buckets: Vec<(u64, u64)> = Vec::new();
        for &(at, bytes) in &inner.samples {
            let seconds_ago = now.duration_since(at).as_secs();
            match buckets.iter_mut().find(|(s, _)| *s == seconds_ago) {
                Some((_, sum)) => *sum += bytes,
                None => buckets.push((seconds_ago, bytes)),
            }
        }

        buckets.sort_by(|a, b| b.0.cmp(&a.0));
        buckets
            .into_iter()
            .map(|(seconds_ago, bytes)| BandwidthSample { seconds_ago, bytes })
            .collect()
    }

    /// Throughput over the live window, in bytes per second.
    #[must_use]
    pub fn current_bandwidth(&self) -> f64 {
        let now = Instant::now();
        let mut inner = self.inner.lock().unwrap();
        Self::evict(&mut inner, now, self.window, self.max_samples);

        let (Some(&(first, _)), Some(&(last, _))) =
            (inner.samples.front(), inner.samples.back())
        else {
            return 0.0;
        };
        let span = last.duration_since(first).as_secs_f64();
        if span <= 0.0 {
            return 0.0;
        }

        let sum: u64 = inner.samples.iter().map(|&(_, b)| b).sum();
        #[allow(clippy::cast_precision_loss)]
        {
            sum as f64 / span
        }
    }

    /// Average throughput since construction or the last reset.
    #[must_use]
    pub fn average_bandwidth(&self) -> f64 {
        let inner = self.inner.lock().unwrap();
        let elapsed = inner.started_at.elapsed().as_secs_f64();
        if elapsed <= 0.0 {
            return 0.0;
        }
        #[allow(clippy::cast_precision_loss)]
        {
            inner.total_bytes as f64 / elapsed
        }
    }

    /// Drop all history and restart the averaging clock.
    pub fn reset(&self) {
        let mut inner = self.inner.lock().unwrap();
        inner.samples.clear();
        inner.total_bytes = 0;
        inner.started_at = Instant::now();
    }

    fn evict(inner: &mut Inner, now: Instant, window: Duration, max_samples: usize) {
        while let Some(&(at, _)) = inner.samples.front() {
            if now.duration_since(at) > window {
                inner.samples.pop_front();
            } else {
                break;
            }
        }
        while inner.samples.len() > max_samples {
            inner.samples.pop_front();
        }
    }
}

impl Default for BandwidthMonitor {
    fn default() -> Self {
        Self::new(60, 1)
    }
}
