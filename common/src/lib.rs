//! Core types for the trading simulator

#![deny(warnings)]
#![deny(clippy::all)]
#![deny(missing_docs)]
#![forbid(unsafe_code)]

pub mod market;
pub mod types;

pub use market::{Side, Signal};
pub use types::{OrderId, Px, Qty, Ts};
