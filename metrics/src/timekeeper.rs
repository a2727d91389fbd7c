//! Bounded latency sampler with percentile statistics

use std::fmt::Write as _;
use std::time::Instant;

/// Records wall-clock durations between `start`/`end` pairs and derives
/// percentile statistics over the collected samples.
///
/// Samples beyond `max_samples` are silently dropped so a long-running
/// measurement loop never reallocates.
pub struct Timekeeper {
    max_samples: usize,
    samples: Vec<u64>,
    started: Option<Instant>,
}

impl Timekeeper {
    /// Create a sampler that keeps at most `max_samples` durations
    #[must_use]
    pub fn new(max_samples: usize) -> Self {
        Self {
            max_samples,
            samples: Vec::with_capacity(max_samples),
            started: None,
        }
    }

    /// Begin a measurement
    #[inline]
    pub fn start(&mut self) {
        self.started = Some(Instant::now());
    }

    /// Finish a measurement, record it (up to the sample cap) and return the
    /// elapsed nanoseconds. Returns 0 if `start` was never called.
    #[inline]
    #[allow(clippy::cast_possible_truncation)]
    pub fn end(&mut self) -> u64 {
        let Some(started) = self.started.take() else {
            return 0;
        };
        let elapsed = started.elapsed().as_nanos() as u64;
        if self.samples.len() < self.max_samples {
            self.samples.push(elapsed);
        }
        elapsed
    }

    /// Number of recorded samples
    #[must_use]
    pub fn count(&self) -> usize {
        self.samples.len()
    }

    /// Smallest recorded sample, or 0 when empty
    #[must_use]
    pub fn min(&self) -> u64 {
        self.samples.iter().copied().min().unwrap_or(0)
    }

    /// Largest recorded sample, or 0 when empty
    #[must_use]
    pub fn max(&self) -> u64 {
        self.samples.iter().copied().max().unwrap_or(0)
    }

    /// Arithmetic mean of the samples, or 0.0 when empty
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn mean(&self) -> f64 {
        if self.samples.is_empty() {
            return 0.0;
        }
        let sum: u128 = self.samples.iter().map(|&s| u128::from(s)).sum();
        sum as f64 / self.samples.len() as f64
    }

    /// Median sample; the midpoint average for an even count
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn median(&self) -> f64 {
        if self.samples.is_empty() {
            return 0.0;
        }
        let sorted = self.sorted();
        let mid = sorted.len() / 2;
        if sorted.len() % 2 == 0 {
            (sorted[mid - 1] + sorted[mid]) as f64 / 2.0
        } else {
            sorted[mid] as f64
        }
    }

    /// Percentile by rank `ceil(p * n) - 1`, clamped to the sample range,
    /// computed on a sorted copy
    #[must_use]
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss, clippy::cast_precision_loss)]
    pub fn percentile(&self, p: f64) -> u64 {
        if self.samples.is_empty() {
            return 0;
        }
        let sorted = self.sorted();
        let rank = (p * sorted.len() as f64).ceil() as usize;
        let idx = rank.saturating_sub(1).min(sorted.len() - 1);
        sorted[idx]
    }

    /// Histogram of the samples as `(bin_lower_bound, count)` pairs.
    /// A single pair is returned when all samples are equal.
    #[must_use]
    pub fn histogram(&self, bins: usize) -> Vec<(u64, u64)> {
        if self.samples.is_empty() || bins == 0 {
            return Vec::new();
        }

        let min = self.min();
        let max = self.max();
        if min == max {
            return vec![(min, self.samples.len() as u64)];
        }

        let width = (max - min) / bins as u64 + 1;
        let mut result: Vec<(u64, u64)> = (0..bins)
            .map(|i| (min + i as u64 * width, 0))
            .collect();

        for &sample in &self.samples {
            let bin = (((sample - min) / width) as usize).min(bins - 1);
            result[bin].1 += 1;
        }

        result
    }

    /// Multi-line text summary of the distribution
    #[must_use]
    pub fn summary(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "samples: {}", self.count());
        if !self.samples.is_empty() {
            let _ = writeln!(out, "min: {} ns", self.min());
            let _ = writeln!(out, "max: {} ns", self.max());
            let _ = writeln!(out, "mean: {:.1} ns", self.mean());
            let _ = writeln!(out, "p50: {} ns", self.percentile(0.5));
            let _ = writeln!(out, "p90: {} ns", self.percentile(0.9));
            let _ = writeln!(out, "p99: {} ns", self.percentile(0.99));
            let _ = writeln!(out, "p99.9: {} ns", self.percentile(0.999));
        }
        out
    }

    /// Recorded samples in arrival order
    #[must_use]
    pub fn samples(&self) -> &[u64] {
        &self.samples
    }

    /// Discard all recorded samples
    pub fn clear(&mut self) {
        self.samples.clear();
    }

    fn sorted(&self) -> Vec<u64> {
        let mut copy = self.samples.clone();
        copy.sort_unstable();
        copy
    }
}
