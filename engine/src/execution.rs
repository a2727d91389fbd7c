//! Signal-to-order pipeline with simulated matching

use crate::memory::ObjectPool;
use common::{OrderId, Px, Qty, Side, Signal, Ts};
use lob::TopRegistry;
use parking_lot::{Condvar, Mutex, RwLock};
use rand::Rng;
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Simulated fill latency. Seasoning only; nothing may depend on it.
const FILL_LATENCY: Duration = Duration::from_micros(100);

/// Lifecycle states of an internal order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderStatus {
    /// Accepted, waiting in the queue
    New,
    /// At the head of the queue, being processed
    Pending,
    /// Some quantity executed, remainder still working
    PartiallyFilled,
    /// Fully executed (terminal)
    Filled,
    /// Removed before completion (terminal)
    Canceled,
    /// Refused, e.g. no book for the symbol (terminal)
    Rejected,
}

/// An internal order working its way through the simulator
#[derive(Debug, Clone)]
pub struct ExecutionOrder {
    /// Engine-assigned id
    pub order_id: OrderId,
    /// Limit price from the signal
    pub price: Px,
    /// Remaining quantity
    pub quantity: Qty,
    /// Direction
    pub side: Side,
    /// Symbol to execute against
    pub symbol: String,
    /// Submission timestamp
    pub timestamp: Ts,
}

/// One lifecycle report for an internal order
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionReport {
    /// Order this report belongs to
    pub order_id: OrderId,
    /// Lifecycle state after this event
    pub status: OrderStatus,
    /// Price of the event (fill price for executions)
    pub price: Px,
    /// Quantity executed by this event
    pub exec_quantity: Qty,
    /// Quantity still open after this event
    pub leaves_quantity: Qty,
    /// Symbol of the order
    pub symbol: String,
    /// Report timestamp
    pub timestamp: Ts,
}

/// Callback receiving every execution report; runs on the worker thread for
/// fills and rejects, on the submitting/cancelling thread for New/Canceled.
/// Must be thread-safe and non-blocking.
pub type ReportCallback = Arc<dyn Fn(&ExecutionReport) + Send + Sync>;

struct PendingState {
    orders: FxHashMap<OrderId, ExecutionOrder>,
    queue: VecDeque<OrderId>,
}

struct Shared {
    pending: Mutex<PendingState>,
    work_ready: Condvar,
    running: AtomicBool,
    tops: Arc<TopRegistry>,
    callback: RwLock<Option<ReportCallback>>,
    report_pool: ObjectPool<ExecutionReport>,
}

impl Shared {
    /// Route one report through the pool to the callback
    fn emit(&self, report: ExecutionReport) {
        let callback = self.callback.read().clone();
        if let Some(callback) = callback {
            let pooled = self.report_pool.create(report);
            callback(&pooled);
        }
    }

    fn remove_order(&self, order_id: OrderId) {
        self.pending.lock().orders.remove(&order_id);
    }
}

/// Serializes signals into a single-consumer order pipeline and simulates
/// their execution against the current tops of book.
pub struct ExecutionEngine {
    shared: Arc<Shared>,
    next_order_id: AtomicU64,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl ExecutionEngine {
    /// Create an engine resolving symbols through `tops`
    #[must_use]
    pub fn new(tops: Arc<TopRegistry>) -> Self {
        Self {
            shared: Arc::new(Shared {
                pending: Mutex::new(PendingState {
                    orders: FxHashMap::default(),
                    queue: VecDeque::new(),
                }),
                work_ready: Condvar::new(),
                running: AtomicBool::new(false),
                tops,
                callback: RwLock::new(None),
                report_pool: ObjectPool::new(),
            }),
            next_order_id: AtomicU64::new(1),
            worker: Mutex::new(None),
        }
    }

    /// Set the report callback; replaces any previous one
    pub fn set_execution_callback(&self, callback: ReportCallback) {
        *self.shared.callback.write() = Some(callback);
    }

    /// Start the worker thread. Idempotent.
    pub fn start(&self) {
        let mut worker = self.worker.lock();
        if worker.is_some() {
            return;
        }
        self.shared.running.store(true, Ordering::Release);
        let shared = Arc::clone(&self.shared);
        *worker = Some(std::thread::spawn(move || process_orders(&shared)));
        info!("execution engine started");
    }

    /// Stop the worker and join it. In-flight fills complete; queued orders
    /// are abandoned without terminal reports.
    pub fn stop(&self) {
        let Some(worker) = self.worker.lock().take() else {
            return;
        };
        self.shared.running.store(false, Ordering::Release);
        self.shared.work_ready.notify_all();
        if worker.join().is_err() {
            warn!("execution worker exited abnormally");
        }
        info!("execution engine stopped");
    }

    /// Convert a signal into an internal order. Emits the New report on the
    /// calling thread and wakes the worker. Returned ids are strictly
    /// increasing.
    pub fn submit_order(&self, signal: &Signal) -> OrderId {
        let order_id = OrderId::new(self.next_order_id.fetch_add(1, Ordering::Relaxed));
        let order = ExecutionOrder {
            order_id,
            price: signal.price,
            quantity: signal.quantity,
            side: signal.side,
            symbol: signal.symbol.clone(),
            timestamp: signal.timestamp,
        };

        // New goes out before the order is visible to the worker, so the
        // per-order report sequence always starts with it.
        self.shared.emit(ExecutionReport {
            order_id,
            status: OrderStatus::New,
            price: signal.price,
            exec_quantity: Qty::ZERO,
            leaves_quantity: signal.quantity,
            symbol: signal.symbol.clone(),
            timestamp: Ts::now(),
        });

        {
            let mut state = self.shared.pending.lock();
            state.orders.insert(order_id, order);
            state.queue.push_back(order_id);
        }

        self.shared.work_ready.notify_one();
        order_id
    }

    /// Cancel a working order. Returns false for unknown ids and for orders
    /// already past the queue (filled or mid-processing). The Canceled
    /// report races an in-flight partial fill on the same id; consumers must
    /// tolerate either arrival order.
    pub fn cancel_order(&self, order_id: OrderId) -> bool {
        let removed = {
            let mut state = self.shared.pending.lock();
            if !state.orders.contains_key(&order_id) {
                return false;
            }
            if !state.queue.contains(&order_id) {
                // Off-queue means filled or currently executing
                return false;
            }
            state.orders.remove(&order_id)
        };

        let Some(order) = removed else { return false };
        self.shared.emit(ExecutionReport {
            order_id,
            status: OrderStatus::Canceled,
            price: order.price,
            exec_quantity: Qty::ZERO,
            leaves_quantity: order.quantity,
            symbol: order.symbol,
            timestamp: Ts::now(),
        });
        true
    }

    /// Coarse order state derived from queue position. Cheap observability
    /// hook, deliberately decoupled from per-report statuses.
    #[must_use]
    pub fn get_order_status(&self, order_id: OrderId) -> OrderStatus {
        let state = self.shared.pending.lock();
        if !state.orders.contains_key(&order_id) {
            return OrderStatus::Rejected;
        }
        match state.queue.iter().position(|&id| id == order_id) {
            None => OrderStatus::Filled,
            Some(0) => OrderStatus::Pending,
            Some(_) => OrderStatus::New,
        }
    }
}

impl Drop for ExecutionEngine {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Worker loop: waits for queued order ids and simulates each in turn
fn process_orders(shared: &Shared) {
    loop {
        let order = {
            let mut state = shared.pending.lock();
            loop {
                if !shared.running.load(Ordering::Acquire) {
                    return;
                }
                if let Some(order_id) = state.queue.pop_front() {
                    // Vanished ids (cancel race) are skipped
                    break state.orders.get(&order_id).cloned();
                }
                shared.work_ready.wait(&mut state);
            }
        };

        if let Some(order) = order {
            simulate_execution(shared, &order);
        }
    }
}

/// Match one order against the current top of its book
fn simulate_execution(shared: &Shared, order: &ExecutionOrder) {
    let Some(top) = shared.tops.get(&order.symbol) else {
        debug!(symbol = %order.symbol, id = %order.order_id, "no book, rejecting");
        shared.emit(ExecutionReport {
            order_id: order.order_id,
            status: OrderStatus::Rejected,
            price: order.price,
            exec_quantity: Qty::ZERO,
            leaves_quantity: order.quantity,
            symbol: order.symbol.clone(),
            timestamp: Ts::now(),
        });
        shared.remove_order(order.order_id);
        return;
    };

    if order.quantity.is_zero() {
        // A previous partial consumed everything; close the order out
        shared.emit(ExecutionReport {
            order_id: order.order_id,
            status: OrderStatus::Filled,
            price: order.price,
            exec_quantity: Qty::ZERO,
            leaves_quantity: Qty::ZERO,
            symbol: order.symbol.clone(),
            timestamp: Ts::now(),
        });
        shared.remove_order(order.order_id);
        return;
    }

    let fill_price = match order.side {
        Side::Buy => top.best_ask().filter(|&ask| order.price >= ask),
        Side::Sell => top.best_bid().filter(|&bid| order.price <= bid),
    };

    std::thread::sleep(FILL_LATENCY);

    if let Some(fill_price) = fill_price {
        shared.emit(ExecutionReport {
            order_id: order.order_id,
            status: OrderStatus::Filled,
            price: fill_price,
            exec_quantity: order.quantity,
            leaves_quantity: Qty::ZERO,
            symbol: order.symbol.clone(),
            timestamp: Ts::now(),
        });
        shared.remove_order(order.order_id);
    } else {
        let exec_quantity = Qty::new(rand::thread_rng().gen_range(1..=order.quantity.as_u32()));
        shared.emit(ExecutionReport {
            order_id: order.order_id,
            status: OrderStatus::PartiallyFilled,
            price: order.price,
            exec_quantity,
            leaves_quantity: order.quantity.saturating_sub(exec_quantity),
            symbol: order.symbol.clone(),
            timestamp: Ts::now(),
        });

        let mut state = shared.pending.lock();
        if let Some(working) = state.orders.get_mut(&order.order_id) {
            working.quantity = working.quantity.saturating_sub(exec_quantity);
        }
        state.queue.push_back(order.order_id);
        drop(state);
        shared.work_ready.notify_one();
    }
}
