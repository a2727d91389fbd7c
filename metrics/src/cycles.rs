//! CPU cycle counter with a calibrated cycles-to-nanoseconds conversion

use std::sync::OnceLock;
use std::time::{Duration, Instant};

/// Thin wrapper over the architecture cycle counter. On x86_64 this reads the
/// TSC; elsewhere it falls back to the monotonic clock, so values are always
/// non-decreasing.
pub struct CycleCounter;

impl CycleCounter {
    /// Counter value at the start of a measured section
    #[inline]
    #[must_use]
    pub fn start() -> u64 {
        Self::cycles()
    }

    /// Counter value at the end of a measured section
    #[inline]
    #[must_use]
    pub fn end() -> u64 {
        Self::cycles()
    }

    #[cfg(target_arch = "x86_64")]
    #[inline]
    fn cycles() -> u64 {
        // SAFETY: RDTSC has no preconditions; it only reads the timestamp counter.
        unsafe { core::arch::x86_64::_rdtsc() }
    }

    #[cfg(not(target_arch = "x86_64"))]
    #[inline]
    #[allow(clippy::cast_possible_truncation)]
    fn cycles() -> u64 {
        static EPOCH: OnceLock<Instant> = OnceLock::new();
        let epoch = EPOCH.get_or_init(Instant::now);
        epoch.elapsed().as_nanos() as u64
    }

    /// Measured counter frequency in GHz (counts per nanosecond). Calibrated
    /// once against the monotonic clock on first use.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn cpu_frequency_ghz() -> f64 {
        static FREQ: OnceLock<f64> = OnceLock::new();
        *FREQ.get_or_init(|| {
            let wall_start = Instant::now();
            let cycle_start = Self::cycles();
            std::thread::sleep(Duration::from_millis(10));
            let cycle_end = Self::cycles();
            let wall_ns = wall_start.elapsed().as_nanos() as f64;
            let cycles = cycle_end.saturating_sub(cycle_start) as f64;
            if wall_ns > 0.0 && cycles > 0.0 {
                cycles / wall_ns
            } else {
                1.0
            }
        })
    }

    /// Convert a cycle delta into nanoseconds
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn cycles_to_ns(cycles: u64) -> f64 {
        cycles as f64 / Self::cpu_frequency_ghz()
    }

    /// Convert nanoseconds into a cycle count
    #[must_use]
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn ns_to_cycles(ns: f64) -> u64 {
        (ns * Self::cpu_frequency_ghz()) as u64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counter_non_decreasing() {
        let mut prev = CycleCounter::start();
        for _ in 0..1000 {
            let next = CycleCounter::end();
            assert!(next >= prev);
            prev = next;
        }
    }

    #[test]
    fn test_frequency_positive() {
        let freq = CycleCounter::cpu_frequency_ghz();
        assert!(freq > 0.0);
        // Calibration is one-shot
        assert!((CycleCounter::cpu_frequency_ghz() - freq).abs() < f64::EPSILON);
    }

    #[test]
    fn test_round_trip_conversion() {
        let ns = CycleCounter::cycles_to_ns(1_000_000);
        let cycles = CycleCounter::ns_to_cycles(ns);
        let delta = cycles.abs_diff(1_000_000);
        assert!(delta <= 1, "round trip drifted by {delta} cycles");
    }
}
