//! Market-data ingest path
//!
//! Raw feed bytes land in a circular [`RingBuffer`], are decoded by the
//! zero-copy [`wire`] parser and applied to per-symbol order books by the
//! [`MarketDataHandler`].

#![deny(warnings)]
#![deny(clippy::all)]
#![deny(missing_docs)]
#![forbid(unsafe_code)]

pub mod handler;
pub mod ring;
pub mod wire;

pub use handler::{MarketDataCallback, MarketDataHandler};
pub use ring::RingBuffer;
pub use wire::{encode_into, Message, MessageBody, MessageIter, MessageType, HEADER_LEN};
