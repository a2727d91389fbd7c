//! Symbol subscription and order-book maintenance

use crate::ring::RingBuffer;
use crate::wire::{Message, MessageBody, MessageIter};
use lob::{Order, OrderBook, TopRegistry};
use rustc_hash::FxHashMap;
use std::collections::hash_map::Entry;
use std::sync::Arc;
use tracing::{debug, info};

/// Per-symbol market-data callback, run on the ingest thread
pub type MarketDataCallback = Box<dyn FnMut(&Message<'_>) + Send>;

/// Hook invoked after each book mutation, run on the ingest thread
pub type BookUpdateHook = Box<dyn FnMut(&OrderBook) + Send>;

/// Parses feed bytes and maintains the order books.
///
/// The handler is the single owner of every book; consumers on other
/// threads read best prices through the shared [`TopRegistry`].
pub struct MarketDataHandler {
    buffer: RingBuffer,
    carry: Vec<u8>,
    callbacks: FxHashMap<String, Vec<MarketDataCallback>>,
    books: FxHashMap<String, OrderBook>,
    tops: Arc<TopRegistry>,
    update_hook: Option<BookUpdateHook>,
}

impl MarketDataHandler {
    /// Create a handler with a feed ring of `buffer_size` bytes
    #[must_use]
    pub fn new(buffer_size: usize) -> Self {
        Self {
            buffer: RingBuffer::new(buffer_size),
            carry: Vec::new(),
            callbacks: FxHashMap::default(),
            books: FxHashMap::default(),
            tops: Arc::new(TopRegistry::new()),
            update_hook: None,
        }
    }

    /// Subscribe to a symbol, creating its order book on first subscription
    pub fn subscribe(&mut self, symbol: &str, callback: MarketDataCallback) {
        self.callbacks
            .entry(symbol.to_string())
            .or_default()
            .push(callback);
        self.ensure_book(symbol);
    }

    /// Drop all callbacks for a symbol; the book stays alive
    pub fn unsubscribe(&mut self, symbol: &str) {
        self.callbacks.remove(symbol);
    }

    /// Create the book for a symbol without registering a callback
    pub fn ensure_book(&mut self, symbol: &str) {
        if let Entry::Vacant(slot) = self.books.entry(symbol.to_string()) {
            slot.insert(OrderBook::new(symbol, self.tops.register(symbol)));
            info!(symbol, "order book created");
        }
    }

    /// Set the post-update hook (strategy continuation)
    pub fn set_update_hook(&mut self, hook: BookUpdateHook) {
        self.update_hook = Some(hook);
    }

    /// Parse a linear byte window and apply every complete message in feed
    /// order. Returns the byte count actually consumed; the caller keeps the
    /// truncated tail for the next round.
    pub fn process_buffer(&mut self, data: &[u8]) -> usize {
        let mut iter = MessageIter::new(data);
        while let Some(message) = iter.next() {
            self.dispatch(&message);
        }
        iter.consumed()
    }

    /// Move feed bytes into the ingest ring. Returns the bytes accepted;
    /// the rest is the caller's to retry (back-pressure).
    pub fn enqueue_bytes(&mut self, data: &[u8]) -> usize {
        self.buffer.write(data)
    }

    /// Drain the ingest ring and process every complete message in it.
    /// A partial message at the tail is preserved for the next drain.
    /// Returns the byte count consumed by complete messages.
    pub fn drain(&mut self) -> usize {
        let pending = self.buffer.read_available();
        if pending > 0 {
            let start = self.carry.len();
            self.carry.resize(start + pending, 0);
            let copied = self.buffer.read(&mut self.carry[start..]);
            self.carry.truncate(start + copied);
        }

        let carry = std::mem::take(&mut self.carry);
        let consumed = self.process_buffer(&carry);
        self.carry = carry;
        self.carry.drain(..consumed);
        consumed
    }

    /// Borrow the book for a symbol
    #[must_use]
    pub fn order_book(&self, symbol: &str) -> Option<&OrderBook> {
        self.books.get(symbol)
    }

    /// Shared registry of top-of-book handles for cross-thread readers
    #[must_use]
    pub fn top_registry(&self) -> Arc<TopRegistry> {
        Arc::clone(&self.tops)
    }

    fn dispatch(&mut self, message: &Message<'_>) {
        if let Some(callbacks) = self.callbacks.get_mut(message.symbol) {
            for callback in callbacks {
                callback(message);
            }
        }
        self.update_book(message);
    }

    fn update_book(&mut self, message: &Message<'_>) {
        let Some(book) = self.books.get_mut(message.symbol) else {
            return;
        };

        let result = match message.body {
            MessageBody::AddOrder {
                order_id,
                price,
                quantity,
                side,
            } => book.add_order(Order::new(
                order_id,
                price,
                quantity,
                side,
                message.timestamp,
                message.symbol,
            )),
            MessageBody::ModifyOrder { order_id, quantity } => {
                book.modify_order(order_id, quantity)
            }
            MessageBody::CancelOrder { order_id } => book.cancel_order(order_id),
            MessageBody::ExecuteOrder {
                order_id,
                exec_quantity,
                ..
            } => book.execute_order(order_id, exec_quantity),
            MessageBody::Trade { .. }
            | MessageBody::Snapshot
            | MessageBody::Heartbeat
            | MessageBody::Unknown(_) => return,
        };

        if let Err(err) = result {
            // Feed inconsistencies are local: the book is untouched.
            debug!(symbol = message.symbol, %err, "book update rejected");
        }

        if let (Some(hook), Some(book)) = (self.update_hook.as_mut(), self.books.get(message.symbol))
        {
            hook(book);
        }
    }
}
