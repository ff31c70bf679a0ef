//! Sliding-window statistics accumulator
//!
//! Tracks a value over a fixed time window in the caller's clock domain
//! (milliseconds throughout the pipeline). Used for bitrate, frame-rate,
//! packet-rate and wait-time accounting. The windowed min/max track the
//! extremes of the in-window sum between calls to
//! [`Accumulator::reset_min_max`], which callers invoke on their stats
//! reporting period.

use std::collections::VecDeque;

/// Fixed-window statistic over (timestamp, value) events.
#[derive(Debug, Clone)]
pub struct Accumulator {
    window_ms: u64,
    values: VecDeque<(u64, u64)>,
    instant: u64,
    total: u64,
    count: u64,
    min: u64,
    max: u64,
}

impl Accumulator {
    /// Create an accumulator over a window of `window_ms` milliseconds.
    pub fn new(window_ms: u64) -> Self {
        Self {
            window_ms: window_ms.max(1),
            values: VecDeque::new(),
            instant: 0,
            total: 0,
            count: 0,
            min: u64::MAX,
            max: 0,
        }
    }

    /// Record `value` at time `now` and return the in-window sum.
    pub fn update(&mut self, now: u64, value: u64) -> u64 {
        self.values.push_back((now, value));
        self.instant += value;
        self.total += value;
        self.count += 1;
        self.expire(now);
        self.min = self.min.min(self.instant);
        self.max = self.max.max(self.instant);
        self.instant
    }

    fn expire(&mut self, now: u64) {
        while let Some(&(ts, value)) = self.values.front() {
            if ts + self.window_ms > now {
                break;
            }
            self.instant -= value;
            self.values.pop_front();
        }
    }

    /// Sum of values inside the current window.
    pub fn instant(&self) -> u64 {
        self.instant
    }

    /// In-window sum scaled to a per-second rate.
    pub fn instant_avg(&self) -> f64 {
        self.instant as f64 * 1000.0 / self.window_ms as f64
    }

    /// Smallest in-window sum observed since the last reset.
    pub fn min(&self) -> u64 {
        if self.min == u64::MAX {
            0
        } else {
            self.min
        }
    }

    /// Largest in-window sum observed since the last reset.
    pub fn max(&self) -> u64 {
        self.max
    }

    /// Restart windowed min/max tracking from the current sum.
    pub fn reset_min_max(&mut self) {
        self.min = self.instant;
        self.max = self.instant;
    }

    /// Total of all values ever recorded.
    pub fn total(&self) -> u64 {
        self.total
    }

    /// Number of events ever recorded.
    pub fn count(&self) -> u64 {
        self.count
    }

    /// Window length in milliseconds.
    pub fn window_ms(&self) -> u64 {
        self.window_ms
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_window_expiry() {
        let mut acc = Accumulator::new(1000);
        assert_eq!(acc.update(0, 100), 100);
        assert_eq!(acc.update(500, 100), 200);
        // The first event leaves the window at t=1000.
        assert_eq!(acc.update(1000, 100), 200);
        assert_eq!(acc.update(2500, 100), 100);
        assert_eq!(acc.total(), 400);
        assert_eq!(acc.count(), 4);
    }

    #[test]
    fn test_instant_avg_per_second() {
        let mut acc = Accumulator::new(500);
        acc.update(0, 50);
        acc.update(100, 50);
        // 100 units over a 500ms window is 200 units/second.
        assert!((acc.instant_avg() - 200.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_min_max_reset() {
        let mut acc = Accumulator::new(1000);
        acc.update(0, 10);
        acc.update(10, 30);
        assert_eq!(acc.min(), 10);
        assert_eq!(acc.max(), 40);
        acc.reset_min_max();
        assert_eq!(acc.min(), 40);
        assert_eq!(acc.max(), 40);
        acc.update(2000, 5);
        assert_eq!(acc.min(), 5);
    }
}
