//! Synthetic market-data generator
//!
//! Emits a plausible mix of adds, modifies, cancels, executions and trade
//! prints. Each symbol's price center follows a small random walk so pair
//! ratios drift enough to exercise the stat-arb strategy.

use common::{OrderId, Px, Qty, Side, Ts};
use feeds::{encode_into, MessageBody};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Spread between generated bid and ask bands, in price hundredths
const BAND_GAP: i64 = 50;

/// One live synthetic order
struct LiveOrder {
    id: u64,
    symbol_index: usize,
}

/// Deterministic (seeded) feed generator
pub struct FeedGenerator {
    symbols: Vec<String>,
    centers: Vec<i64>,
    rng: StdRng,
    next_order_id: u64,
    clock_ns: u64,
    live: Vec<LiveOrder>,
}

impl FeedGenerator {
    /// Create a generator for `symbols`, seeded for reproducible runs
    pub fn new(symbols: Vec<String>, seed: u64) -> Self {
        let centers = vec![10_000; symbols.len()];
        Self {
            symbols,
            centers,
            rng: StdRng::seed_from_u64(seed),
            next_order_id: 1,
            clock_ns: 1,
            live: Vec::new(),
        }
    }

    /// Encode `count` messages into a fresh buffer
    pub fn batch(&mut self, count: usize) -> Vec<u8> {
        let mut buf = Vec::with_capacity(count * 40);
        for _ in 0..count {
            self.push_message(&mut buf);
        }
        buf
    }

    fn push_message(&mut self, buf: &mut Vec<u8>) {
        self.clock_ns += self.rng.gen_range(1_000..50_000);
        let timestamp = Ts::from_nanos(self.clock_ns);

        let roll = self.rng.gen_range(0..100);
        let (body, symbol_index) = if roll < 55 || self.live.is_empty() {
            self.next_add()
        } else if roll < 70 {
            self.next_modify()
        } else if roll < 80 {
            self.next_cancel()
        } else if roll < 90 {
            self.next_execute()
        } else {
            self.next_trade()
        };

        let symbol = self.symbols[symbol_index].clone();
        encode_into(buf, timestamp, &body, &symbol);
    }

    fn next_add(&mut self) -> (MessageBody, usize) {
        let symbol_index = self.rng.gen_range(0..self.symbols.len());

        // Drift the symbol's center and quote around it without crossing
        let center = &mut self.centers[symbol_index];
        *center += self.rng.gen_range(-25..=25);
        let side = if self.rng.gen_bool(0.5) {
            Side::Buy
        } else {
            Side::Sell
        };
        let price = match side {
            Side::Buy => *center - BAND_GAP - self.rng.gen_range(0..200),
            Side::Sell => *center + BAND_GAP + self.rng.gen_range(0..200),
        };

        let id = self.next_order_id;
        self.next_order_id += 1;
        self.live.push(LiveOrder { id, symbol_index });

        (
            MessageBody::AddOrder {
                order_id: OrderId::new(id),
                price: Px::from_i64(price),
                quantity: Qty::new(self.rng.gen_range(1..=100)),
                side,
            },
            symbol_index,
        )
    }

    fn next_modify(&mut self) -> (MessageBody, usize) {
        let index = self.rng.gen_range(0..self.live.len());
        let order = &self.live[index];
        (
            MessageBody::ModifyOrder {
                order_id: OrderId::new(order.id),
                quantity: Qty::new(self.rng.gen_range(1..=100)),
            },
            order.symbol_index,
        )
    }

    fn next_cancel(&mut self) -> (MessageBody, usize) {
        let index = self.rng.gen_range(0..self.live.len());
        let order = self.live.swap_remove(index);
        (
            MessageBody::CancelOrder {
                order_id: OrderId::new(order.id),
            },
            order.symbol_index,
        )
    }

    fn next_execute(&mut self) -> (MessageBody, usize) {
        let index = self.rng.gen_range(0..self.live.len());
        let order = &self.live[index];
        (
            MessageBody::ExecuteOrder {
                order_id: OrderId::new(order.id),
                exec_quantity: Qty::new(self.rng.gen_range(1..=20)),
                exec_price: Px::from_i64(self.centers[order.symbol_index]),
            },
            order.symbol_index,
        )
    }

    fn next_trade(&mut self) -> (MessageBody, usize) {
        let symbol_index = self.rng.gen_range(0..self.symbols.len());
        (
            MessageBody::Trade {
                price: Px::from_i64(self.centers[symbol_index]),
                quantity: Qty::new(self.rng.gen_range(1..=100)),
                aggressor: if self.rng.gen_bool(0.5) {
                    Side::Buy
                } else {
                    Side::Sell
                },
            },
            symbol_index,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use feeds::MessageIter;

    #[test]
    fn test_batches_parse_completely() {
        let mut generator = FeedGenerator::new(vec!["AAPL".into(), "MSFT".into()], 7);
        let batch = generator.batch(500);

        let mut iter = MessageIter::new(&batch);
        assert_eq!(iter.by_ref().count(), 500);
        assert_eq!(iter.consumed(), batch.len());
    }

    #[test]
    fn test_same_seed_same_bytes() {
        let symbols = vec!["AAPL".to_string()];
        let a = FeedGenerator::new(symbols.clone(), 42).batch(100);
        let b = FeedGenerator::new(symbols, 42).batch(100);
        assert_eq!(a, b);
    }

    #[test]
    fn test_timestamps_monotonic() {
        let mut generator = FeedGenerator::new(vec!["AAPL".into()], 1);
        let batch = generator.batch(200);

        let mut last = 0;
        for message in MessageIter::new(&batch) {
            assert!(message.timestamp.as_nanos() > last);
            last = message.timestamp.as_nanos();
        }
    }
}
