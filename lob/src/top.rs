//! Shared top-of-book handles for cross-thread readers

use common::Px;
use parking_lot::RwLock;
use rustc_hash::FxHashMap;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

/// Sentinel for "no price on this side"
const PRICE_ABSENT: i64 = i64::MIN;

/// Best bid and ask of one book, published as atomics.
///
/// The owning book stores after every mutation; readers on other threads
/// load without coordination. Torn-free 64-bit access is the only
/// requirement, so relaxed ordering is sufficient.
pub struct TopOfBook {
    bid: AtomicI64,
    ask: AtomicI64,
}

impl TopOfBook {
    /// Create an empty top (both sides absent)
    #[must_use]
    pub fn new() -> Self {
        Self {
            bid: AtomicI64::new(PRICE_ABSENT),
            ask: AtomicI64::new(PRICE_ABSENT),
        }
    }

    /// Publish the current best prices
    #[inline]
    pub fn publish(&self, bid: Option<Px>, ask: Option<Px>) {
        self.bid
            .store(bid.map_or(PRICE_ABSENT, |p| p.as_i64()), Ordering::Relaxed);
        self.ask
            .store(ask.map_or(PRICE_ABSENT, |p| p.as_i64()), Ordering::Relaxed);
    }

    /// Best bid, if any side has resting quantity
    #[inline]
    #[must_use]
    pub fn best_bid(&self) -> Option<Px> {
        decode(self.bid.load(Ordering::Relaxed))
    }

    /// Best ask, if any side has resting quantity
    #[inline]
    #[must_use]
    pub fn best_ask(&self) -> Option<Px> {
        decode(self.ask.load(Ordering::Relaxed))
    }
}

impl Default for TopOfBook {
    fn default() -> Self {
        Self::new()
    }
}

fn decode(raw: i64) -> Option<Px> {
    (raw != PRICE_ABSENT).then(|| Px::from_i64(raw))
}

/// Symbol-indexed registry of [`TopOfBook`] handles.
///
/// Written only when a book is created; the execution worker takes the read
/// lock briefly per lookup and then works against the atomics alone.
pub struct TopRegistry {
    tops: RwLock<FxHashMap<String, Arc<TopOfBook>>>,
}

impl TopRegistry {
    /// Create an empty registry
    #[must_use]
    pub fn new() -> Self {
        Self {
            tops: RwLock::new(FxHashMap::default()),
        }
    }

    /// Get the handle for `symbol`, creating it if absent
    #[must_use]
    pub fn register(&self, symbol: &str) -> Arc<TopOfBook> {
        if let Some(top) = self.tops.read().get(symbol) {
            return Arc::clone(top);
        }
        Arc::clone(
            self.tops
                .write()
                .entry(symbol.to_string())
                .or_insert_with(|| Arc::new(TopOfBook::new())),
        )
    }

    /// Look up the handle for `symbol`
    #[must_use]
    pub fn get(&self, symbol: &str) -> Option<Arc<TopOfBook>> {
        self.tops.read().get(symbol).map(Arc::clone)
    }
}

impl Default for TopRegistry {
    fn default() -> Self {
        Self::new()
    }
}
