//! Incremental mean and variance over item sizes.
//!
//! Welford's update, extended with the inverse step so an item can leave the
//! sample when it is checked out of a pool.

use serde::Serialize;

/// Running count, mean, variance, and total of a multiset of sizes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct RunningStats {
    count: u64,
    mean: f64,
    m2: f64,
    total: u64,
}

impl RunningStats {
    /// Empty sample.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            count: 0,
            mean: 0.0,
            m2: 0.0,
            total: 0,
        }
    }

    /// Add one size to the sample.
    #[allow(clippy::cast_precision_loss)]
    pub fn add(&mut self, value: usize) {
        let x = value as f64;
        self.count += 1;
        self.total = self.total.saturating_add(value as u64);
        let delta = x - self.mean;
        self.mean += delta / self.count as f64;
        self.m2 += delta * (x - self.mean);
    }

    /// Remove one size previously added. Removing from an empty sample is a
    /// no-op.
    #[allow(clippy::cast_precision_loss)]
    pub fn remove(&mut self, value: usize) {
        match self.count {
            0 => {}
            1 => *self = Self::new(),
            n => {
                let x = value as f64;
                let remaining = (n - 1) as f64;
                let old_mean = self.mean;
                self.mean = (old_mean * n as f64 - x) / remaining;
                self.m2 = (self.m2 - (x - old_mean) * (x - self.mean)).max(0.0);
                self.count = n - 1;
                self.total = self.total.saturating_sub(value as u64);
            }
        }
    }

    /// Number of sizes in the sample.
    #[inline]
    pub fn count(&self) -> u64 {
        self.count
    }

    /// Mean size (0 for an empty sample).
    #[inline]
    pub fn mean(&self) -> f64 {
        self.mean
    }

    /// Sum of all sizes.
    #[inline]
    pub fn total(&self) -> u64 {
        self.total
    }

    /// Population variance (0 for fewer than two sizes).
    #[allow(clippy::cast_precision_loss)]
    pub fn variance(&self) -> f64 {
        if self.count < 2 {
            0.0
        } else {
            self.m2 / self.count as f64
        }
    }

    /// Variance divided by the squared mean: a scale-free heterogeneity
    /// measure (squared coefficient of variation).
    pub fn relative_variance(&self) -> f64 {
        if self.mean <= f64::EPSILON {
            0.0
        } else {
            self.variance() / (self.mean * self.mean)
        }
    }

    /// Forget everything.
    pub fn clear(&mut self) {
        *self = Self::new();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn mean_and_variance() {
        let mut stats = RunningStats::new();
        for v in [2, 4, 4, 4, 5, 5, 7, 9] {
            stats.add(v);
        }
        assert_eq!(stats.count(), 8);
        assert_eq!(stats.total(), 40);
        assert!(close(stats.mean(), 5.0));
        assert!(close(stats.variance(), 4.0));
        assert!(close(stats.relative_variance(), 4.0 / 25.0));
    }

    #[test]
    fn identical_sizes_have_no_variance() {
        let mut stats = RunningStats::new();
        for _ in 0..5 {
            stats.add(10);
        }
        assert!(close(stats.variance(), 0.0));
    }

    #[test]
    fn remove_inverts_add() {
        let mut stats = RunningStats::new();
        for v in [3, 8, 13, 100] {
            stats.add(v);
        }
        stats.remove(100);

        let mut expected = RunningStats::new();
        for v in [3, 8, 13] {
            expected.add(v);
        }
        assert_eq!(stats.count(), expected.count());
        assert_eq!(stats.total(), expected.total());
        assert!(close(stats.mean(), expected.mean()));
        assert!(close(stats.variance(), expected.variance()));
    }

    #[test]
    fn remove_to_empty_resets() {
        let mut stats = RunningStats::new();
        stats.add(7);
        stats.remove(7);
        assert_eq!(stats, RunningStats::new());
        stats.remove(7);
        assert_eq!(stats.count(), 0);
    }
}
