//! Statistical-arbitrage pair strategy over mid-price ratios

use crate::Strategy;
use common::{Qty, Side, Signal, Ts};
use lob::OrderBook;
use rustc_hash::FxHashMap;
use std::collections::VecDeque;

/// Default order size attached to emitted signals
const DEFAULT_SIGNAL_QTY: u32 = 100;

/// Tracks a window of mid prices per symbol and emits a signal whenever the
/// price ratio of a tracked pair deviates from its windowed mean by more
/// than the configured number of standard deviations.
pub struct StatArbStrategy {
    symbols: Vec<String>,
    z_score_threshold: f64,
    window_size: usize,
    price_history: FxHashMap<String, VecDeque<f64>>,
}

impl StatArbStrategy {
    /// Create a strategy tracking `symbols` with threshold `z_score_threshold`
    /// (must be positive) over `window_size` mid-price samples
    #[must_use]
    pub fn new(symbols: Vec<String>, z_score_threshold: f64, window_size: usize) -> Self {
        debug_assert!(z_score_threshold > 0.0);
        Self {
            symbols,
            z_score_threshold,
            window_size: window_size.max(1),
            price_history: FxHashMap::default(),
        }
    }

    /// Z-score of the current price ratio of `symbol` over `other` against
    /// the ratio's windowed mean. Returns 0 with fewer than two aligned
    /// samples or a degenerate (constant-ratio) window.
    fn pair_z_score(&self, symbol: &str, other: &str) -> f64 {
        let (Some(a), Some(b)) = (self.price_history.get(symbol), self.price_history.get(other))
        else {
            return 0.0;
        };

        let n = a.len().min(b.len());
        if n < 2 {
            return 0.0;
        }

        // Ratio series over the aligned tails of both histories
        let ratios: Vec<f64> = (0..n)
            .map(|i| a[a.len() - n + i] / b[b.len() - n + i])
            .collect();

        #[allow(clippy::cast_precision_loss)]
        let count = n as f64;
        let mean = ratios.iter().sum::<f64>() / count;
        let variance = ratios.iter().map(|r| (r - mean) * (r - mean)).sum::<f64>() / count;
        let std_dev = variance.sqrt();
        if std_dev == 0.0 {
            return 0.0;
        }

        let current = ratios[n - 1];
        (current - mean) / std_dev
    }
}

impl Strategy for StatArbStrategy {
    fn initialize(&mut self) {
        self.price_history = self
            .symbols
            .iter()
            .map(|s| (s.clone(), VecDeque::with_capacity(self.window_size)))
            .collect();
    }

    fn process_update(&mut self, book: &OrderBook) -> Vec<Signal> {
        let symbol = book.symbol();
        if !self.price_history.contains_key(symbol) {
            return Vec::new();
        }
        let Some(mid) = book.mid_price() else {
            return Vec::new();
        };

        #[allow(clippy::cast_precision_loss)]
        let mid_value = mid.as_i64() as f64;
        let Some(history) = self.price_history.get_mut(symbol) else {
            return Vec::new();
        };
        history.push_back(mid_value);
        if history.len() > self.window_size {
            history.pop_front();
        }
        if history.len() < self.window_size {
            return Vec::new();
        }

        let mut signals = Vec::new();
        for other in &self.symbols {
            if other == symbol {
                continue;
            }
            let z = self.pair_z_score(symbol, other);
            if z.abs() > self.z_score_threshold {
                let side = if z > 0.0 { Side::Sell } else { Side::Buy };
                let confidence = (z.abs() / (2.0 * self.z_score_threshold)).min(1.0);
                signals.push(Signal::new(
                    side,
                    symbol,
                    mid,
                    Qty::new(DEFAULT_SIGNAL_QTY),
                    confidence,
                    Ts::now(),
                ));
            }
        }
        signals
    }

    fn name(&self) -> &str {
        "StatisticalArbitrage"
    }
}
