//! Latency measurement utilities for the hot path

#![deny(warnings)]
#![deny(clippy::all)]
#![deny(missing_docs)]

pub mod cycles;
pub mod timekeeper;

pub use cycles::CycleCounter;
pub use timekeeper::Timekeeper;
