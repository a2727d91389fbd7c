//! Lock-free queues for ultra-low-latency message passing

#![deny(warnings)]
#![deny(clippy::all)]
#![deny(missing_docs)]

pub mod spsc;

pub use spsc::{channel, Consumer, Producer};
