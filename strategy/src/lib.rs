//! Strategy engine: registry, dispatch and signal delivery
//!
//! Strategies run on the ingest thread as a continuation of each book
//! update and emit [`Signal`]s through a caller-provided callback.

#![deny(warnings)]
#![deny(clippy::all)]
#![deny(missing_docs)]
#![forbid(unsafe_code)]

pub mod stat_arb;

pub use stat_arb::StatArbStrategy;

use common::Signal;
use lob::OrderBook;
use tracing::info;

/// Capability interface every trading strategy implements
pub trait Strategy: Send {
    /// Reset internal state before the engine starts
    fn initialize(&mut self);

    /// React to a book update; returned signals are delivered in order
    fn process_update(&mut self, book: &OrderBook) -> Vec<Signal>;

    /// Human-readable strategy name
    fn name(&self) -> &str;
}

/// Callback receiving each emitted signal on the ingest thread
pub type SignalCallback = Box<dyn FnMut(&Signal) + Send>;

/// Runs registered strategies against book updates.
pub struct StrategyEngine {
    strategies: Vec<Box<dyn Strategy>>,
    signal_callback: Option<SignalCallback>,
    running: bool,
}

impl StrategyEngine {
    /// Create an engine with no strategies registered
    #[must_use]
    pub fn new() -> Self {
        Self {
            strategies: Vec::new(),
            signal_callback: None,
            running: false,
        }
    }

    /// Register a strategy; dispatch follows registration order
    pub fn register_strategy(&mut self, strategy: Box<dyn Strategy>) {
        info!(name = strategy.name(), "strategy registered");
        self.strategies.push(strategy);
    }

    /// Set the signal callback
    pub fn set_signal_callback(&mut self, callback: SignalCallback) {
        self.signal_callback = Some(callback);
    }

    /// Initialize every strategy and begin processing updates
    pub fn start(&mut self) {
        if self.running {
            return;
        }
        for strategy in &mut self.strategies {
            strategy.initialize();
        }
        self.running = true;
    }

    /// Stop processing; subsequent updates are ignored
    pub fn stop(&mut self) {
        self.running = false;
    }

    /// Whether the engine is accepting updates
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Feed one book update through every strategy, delivering emitted
    /// signals in emission order. No-op unless running.
    pub fn process_order_book(&mut self, book: &OrderBook) {
        if !self.running {
            return;
        }

        for strategy in &mut self.strategies {
            let signals = strategy.process_update(book);
            if let Some(callback) = &mut self.signal_callback {
                for signal in &signals {
                    callback(signal);
                }
            }
        }
    }
}

impl Default for StrategyEngine {
    fn default() -> Self {
        Self::new()
    }
}
