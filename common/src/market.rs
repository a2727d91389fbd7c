//! Market-facing types shared by the strategy and execution layers

use crate::{Px, Qty, Ts};
use serde::{Deserialize, Serialize};

/// Trading side
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Side {
    /// Buy side (bid)
    Buy,
    /// Sell side (ask/offer)
    Sell,
}

impl Side {
    /// Returns the opposite side
    #[must_use]
    pub const fn opposite(&self) -> Self {
        match self {
            Self::Buy => Self::Sell,
            Self::Sell => Self::Buy,
        }
    }

    /// Wire encoding (0 = Buy, 1 = Sell)
    #[must_use]
    pub const fn to_wire(self) -> u8 {
        match self {
            Self::Buy => 0,
            Self::Sell => 1,
        }
    }

    /// Decode from the wire byte; anything non-zero is Sell
    #[must_use]
    pub const fn from_wire(byte: u8) -> Self {
        match byte {
            0 => Self::Buy,
            _ => Self::Sell,
        }
    }
}

/// Directional trading signal emitted by a strategy
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Signal {
    /// Direction to trade
    pub side: Side,
    /// Symbol to trade
    pub symbol: String,
    /// Limit price for the resulting order
    pub price: Px,
    /// Quantity to trade
    pub quantity: Qty,
    /// Strategy confidence in [0, 1]
    pub confidence: f64,
    /// Emission timestamp
    pub timestamp: Ts,
}

impl Signal {
    /// Create a new signal, clamping confidence into [0, 1]
    #[must_use]
    pub fn new(
        side: Side,
        symbol: impl Into<String>,
        price: Px,
        quantity: Qty,
        confidence: f64,
        timestamp: Ts,
    ) -> Self {
        Self {
            side,
            symbol: symbol.into(),
            price,
            quantity,
            confidence: confidence.clamp(0.0, 1.0),
            timestamp,
        }
    }
}
