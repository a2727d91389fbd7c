//! Simulated execution path
//!
//! Signals become internal orders, matched against the live top of book
//! on a dedicated worker thread; every lifecycle transition is reported
//! through a caller-provided callback.

#![deny(warnings)]
#![deny(clippy::all)]
#![deny(missing_docs)]

pub mod execution;
pub mod memory;

pub use execution::{ExecutionEngine, ExecutionOrder, ExecutionReport, OrderStatus, ReportCallback};
pub use memory::{ObjectPool, PoolBox};
