//! Packed wire format for market-data messages
//!
//! Every message starts with a fixed 10-byte header (timestamp, type,
//! symbol length) followed by a type-dependent payload and the symbol
//! bytes. Scalars are little-endian on the wire and decoded with
//! `from_le_bytes` at this boundary; the symbol is borrowed, not copied.

use common::{OrderId, Px, Qty, Side, Ts};

/// Fixed header size: timestamp (8) + type (1) + symbol length (1)
pub const HEADER_LEN: usize = 10;

/// Wire message types
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum MessageType {
    /// New resting order
    AddOrder = 1,
    /// Quantity replacement for a resting order
    ModifyOrder = 2,
    /// Removal of a resting order
    CancelOrder = 3,
    /// Execution against a resting order
    ExecuteOrder = 4,
    /// Off-book trade print
    Trade = 5,
    /// Snapshot boundary marker
    Snapshot = 6,
    /// Liveness marker
    Heartbeat = 7,
}

impl MessageType {
    /// Decode the wire type byte
    #[must_use]
    pub const fn from_wire(byte: u8) -> Option<Self> {
        match byte {
            1 => Some(Self::AddOrder),
            2 => Some(Self::ModifyOrder),
            3 => Some(Self::CancelOrder),
            4 => Some(Self::ExecuteOrder),
            5 => Some(Self::Trade),
            6 => Some(Self::Snapshot),
            7 => Some(Self::Heartbeat),
            _ => None,
        }
    }

    /// Payload size in bytes for this type
    #[must_use]
    pub const fn payload_len(self) -> usize {
        match self {
            Self::AddOrder => 21,
            Self::ModifyOrder => 12,
            Self::CancelOrder => 8,
            Self::ExecuteOrder => 20,
            Self::Trade => 13,
            Self::Snapshot | Self::Heartbeat => 0,
        }
    }
}

/// Decoded payload of one message
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageBody {
    /// New resting order
    AddOrder {
        /// Feed-assigned order id
        order_id: OrderId,
        /// Limit price
        price: Px,
        /// Order quantity
        quantity: Qty,
        /// Book side
        side: Side,
    },
    /// Quantity replacement for a resting order
    ModifyOrder {
        /// Targeted order
        order_id: OrderId,
        /// New remaining quantity
        quantity: Qty,
    },
    /// Removal of a resting order
    CancelOrder {
        /// Targeted order
        order_id: OrderId,
    },
    /// Execution against a resting order
    ExecuteOrder {
        /// Targeted order
        order_id: OrderId,
        /// Executed quantity
        exec_quantity: Qty,
        /// Execution price
        exec_price: Px,
    },
    /// Off-book trade print
    Trade {
        /// Trade price
        price: Px,
        /// Trade quantity
        quantity: Qty,
        /// Side that removed liquidity
        aggressor: Side,
    },
    /// Snapshot boundary marker
    Snapshot,
    /// Liveness marker
    Heartbeat,
    /// Unrecognized type byte; carries no payload by convention
    Unknown(u8),
}

/// One parsed message; the symbol borrows the feed buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Message<'a> {
    /// Feed timestamp
    pub timestamp: Ts,
    /// Decoded payload
    pub body: MessageBody,
    /// Symbol the message applies to
    pub symbol: &'a str,
}

/// Iterator over the complete messages in a byte window.
///
/// Stops at the first partial message; [`MessageIter::consumed`] reports the
/// bytes actually decoded so the caller can preserve the truncated tail for
/// the next round.
pub struct MessageIter<'a> {
    data: &'a [u8],
    offset: usize,
}

impl<'a> MessageIter<'a> {
    /// Parse messages from `data`
    #[must_use]
    pub const fn new(data: &'a [u8]) -> Self {
        Self { data, offset: 0 }
    }

    /// Bytes consumed by fully decoded messages so far
    #[must_use]
    pub const fn consumed(&self) -> usize {
        self.offset
    }
}

impl<'a> Iterator for MessageIter<'a> {
    type Item = Message<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let rest = &self.data[self.offset..];
            if rest.len() < HEADER_LEN {
                return None;
            }

            let timestamp = Ts::from_nanos(read_u64(rest));
            let type_byte = rest[8];
            let symbol_len = rest[9] as usize;
            let payload_len = MessageType::from_wire(type_byte).map_or(0, MessageType::payload_len);
            let total = HEADER_LEN + payload_len + symbol_len;
            if rest.len() < total {
                return None;
            }

            let payload = &rest[HEADER_LEN..HEADER_LEN + payload_len];
            let symbol_bytes = &rest[HEADER_LEN + payload_len..total];
            self.offset += total;

            let Ok(symbol) = std::str::from_utf8(symbol_bytes) else {
                tracing::warn!(type_byte, "skipping message with non-UTF-8 symbol");
                continue;
            };

            let body = decode_body(type_byte, payload);
            return Some(Message {
                timestamp,
                body,
                symbol,
            });
        }
    }
}

fn decode_body(type_byte: u8, payload: &[u8]) -> MessageBody {
    match MessageType::from_wire(type_byte) {
        Some(MessageType::AddOrder) => MessageBody::AddOrder {
            order_id: OrderId::new(read_u64(payload)),
            price: Px::from_i64(read_i64(&payload[8..])),
            quantity: Qty::new(read_u32(&payload[16..])),
            side: Side::from_wire(payload[20]),
        },
        Some(MessageType::ModifyOrder) => MessageBody::ModifyOrder {
            order_id: OrderId::new(read_u64(payload)),
            quantity: Qty::new(read_u32(&payload[8..])),
        },
        Some(MessageType::CancelOrder) => MessageBody::CancelOrder {
            order_id: OrderId::new(read_u64(payload)),
        },
        Some(MessageType::ExecuteOrder) => MessageBody::ExecuteOrder {
            order_id: OrderId::new(read_u64(payload)),
            exec_quantity: Qty::new(read_u32(&payload[8..])),
            exec_price: Px::from_i64(read_i64(&payload[12..])),
        },
        Some(MessageType::Trade) => MessageBody::Trade {
            price: Px::from_i64(read_i64(payload)),
            quantity: Qty::new(read_u32(&payload[8..])),
            aggressor: Side::from_wire(payload[12]),
        },
        Some(MessageType::Snapshot) => MessageBody::Snapshot,
        Some(MessageType::Heartbeat) => MessageBody::Heartbeat,
        None => MessageBody::Unknown(type_byte),
    }
}

fn read_u64(bytes: &[u8]) -> u64 {
    let mut buf = [0u8; 8];
    buf.copy_from_slice(&bytes[..8]);
    u64::from_le_bytes(buf)
}

fn read_i64(bytes: &[u8]) -> i64 {
    let mut buf = [0u8; 8];
    buf.copy_from_slice(&bytes[..8]);
    i64::from_le_bytes(buf)
}

fn read_u32(bytes: &[u8]) -> u32 {
    let mut buf = [0u8; 4];
    buf.copy_from_slice(&bytes[..4]);
    u32::from_le_bytes(buf)
}

/// Append one encoded message to `buf`. Symbols longer than 255 bytes are
/// truncated to fit the one-byte length field.
#[allow(clippy::cast_possible_truncation)]
pub fn encode_into(buf: &mut Vec<u8>, timestamp: Ts, body: &MessageBody, symbol: &str) {
    let symbol_bytes = &symbol.as_bytes()[..symbol.len().min(255)];

    buf.extend_from_slice(&timestamp.as_nanos().to_le_bytes());
    buf.push(type_byte(body));
    buf.push(symbol_bytes.len() as u8);

    match *body {
        MessageBody::AddOrder {
            order_id,
            price,
            quantity,
            side,
        } => {
            buf.extend_from_slice(&order_id.as_u64().to_le_bytes());
            buf.extend_from_slice(&price.as_i64().to_le_bytes());
            buf.extend_from_slice(&quantity.as_u32().to_le_bytes());
            buf.push(side.to_wire());
        }
        MessageBody::ModifyOrder { order_id, quantity } => {
            buf.extend_from_slice(&order_id.as_u64().to_le_bytes());
            buf.extend_from_slice(&quantity.as_u32().to_le_bytes());
        }
        MessageBody::CancelOrder { order_id } => {
            buf.extend_from_slice(&order_id.as_u64().to_le_bytes());
        }
        MessageBody::ExecuteOrder {
            order_id,
            exec_quantity,
            exec_price,
        } => {
            buf.extend_from_slice(&order_id.as_u64().to_le_bytes());
            buf.extend_from_slice(&exec_quantity.as_u32().to_le_bytes());
            buf.extend_from_slice(&exec_price.as_i64().to_le_bytes());
        }
        MessageBody::Trade {
            price,
            quantity,
            aggressor,
        } => {
            buf.extend_from_slice(&price.as_i64().to_le_bytes());
            buf.extend_from_slice(&quantity.as_u32().to_le_bytes());
            buf.push(aggressor.to_wire());
        }
        MessageBody::Snapshot | MessageBody::Heartbeat | MessageBody::Unknown(_) => {}
    }

    buf.extend_from_slice(symbol_bytes);
}

const fn type_byte(body: &MessageBody) -> u8 {
    match *body {
        MessageBody::AddOrder { .. } => MessageType::AddOrder as u8,
        MessageBody::ModifyOrder { .. } => MessageType::ModifyOrder as u8,
        MessageBody::CancelOrder { .. } => MessageType::CancelOrder as u8,
        MessageBody::ExecuteOrder { .. } => MessageType::ExecuteOrder as u8,
        MessageBody::Trade { .. } => MessageType::Trade as u8,
        MessageBody::Snapshot => MessageType::Snapshot as u8,
        MessageBody::Heartbeat => MessageType::Heartbeat as u8,
        MessageBody::Unknown(byte) => byte,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn add_order(id: u64) -> MessageBody {
        MessageBody::AddOrder {
            order_id: OrderId::new(id),
            price: Px::from_i64(10_050),
            quantity: Qty::new(10),
            side: Side::Buy,
        }
    }

    #[rstest]
    #[case(add_order(1), 21)]
    #[case(MessageBody::ModifyOrder { order_id: OrderId::new(1), quantity: Qty::new(5) }, 12)]
    #[case(MessageBody::CancelOrder { order_id: OrderId::new(1) }, 8)]
    #[case(MessageBody::ExecuteOrder {
        order_id: OrderId::new(1),
        exec_quantity: Qty::new(5),
        exec_price: Px::from_i64(10_000),
    }, 20)]
    #[case(MessageBody::Trade {
        price: Px::from_i64(10_000),
        quantity: Qty::new(5),
        aggressor: Side::Sell,
    }, 13)]
    #[case(MessageBody::Heartbeat, 0)]
    fn test_encoded_sizes(#[case] body: MessageBody, #[case] payload: usize) {
        let mut buf = Vec::new();
        encode_into(&mut buf, Ts::from_nanos(7), &body, "AAPL");
        assert_eq!(buf.len(), HEADER_LEN + payload + 4);
    }

    #[rstest]
    #[case(add_order(42))]
    #[case(MessageBody::ModifyOrder { order_id: OrderId::new(42), quantity: Qty::new(9) })]
    #[case(MessageBody::CancelOrder { order_id: OrderId::new(42) })]
    #[case(MessageBody::ExecuteOrder {
        order_id: OrderId::new(42),
        exec_quantity: Qty::new(3),
        exec_price: Px::from_i64(9_975),
    })]
    #[case(MessageBody::Trade {
        price: Px::from_i64(10_025),
        quantity: Qty::new(7),
        aggressor: Side::Sell,
    })]
    #[case(MessageBody::Snapshot)]
    #[case(MessageBody::Heartbeat)]
    fn test_round_trip(#[case] body: MessageBody) {
        let mut buf = Vec::new();
        encode_into(&mut buf, Ts::from_nanos(123_456), &body, "MSFT");

        let mut iter = MessageIter::new(&buf);
        let msg = iter.next().unwrap();
        assert_eq!(msg.timestamp, Ts::from_nanos(123_456));
        assert_eq!(msg.body, body);
        assert_eq!(msg.symbol, "MSFT");
        assert_eq!(iter.consumed(), buf.len());
        assert!(iter.next().is_none());
    }

    #[test]
    fn test_multiple_messages_in_sequence() {
        let mut buf = Vec::new();
        for id in 1..=5 {
            encode_into(&mut buf, Ts::from_nanos(id), &add_order(id), "AAPL");
        }

        let mut iter = MessageIter::new(&buf);
        let ids: Vec<u64> = iter
            .by_ref()
            .map(|m| match m.body {
                MessageBody::AddOrder { order_id, .. } => order_id.as_u64(),
                _ => unreachable!(),
            })
            .collect();
        assert_eq!(ids, vec![1, 2, 3, 4, 5]);
        assert_eq!(iter.consumed(), buf.len());
    }

    #[test]
    fn test_truncation_stops_at_last_complete_message() {
        let mut buf = Vec::new();
        encode_into(&mut buf, Ts::from_nanos(1), &add_order(1), "AAPL");
        let first_len = buf.len();
        encode_into(&mut buf, Ts::from_nanos(2), &add_order(2), "AAPL");

        for cut in first_len..buf.len() {
            let mut iter = MessageIter::new(&buf[..cut]);
            assert_eq!(iter.by_ref().count(), 1, "cut at {cut}");
            assert_eq!(iter.consumed(), first_len, "cut at {cut}");
        }
    }

    #[test]
    fn test_short_header_consumes_nothing() {
        let buf = [0u8; HEADER_LEN - 1];
        let mut iter = MessageIter::new(&buf);
        assert!(iter.next().is_none());
        assert_eq!(iter.consumed(), 0);
    }

    #[test]
    fn test_unknown_type_has_empty_payload() {
        let mut buf = Vec::new();
        encode_into(&mut buf, Ts::from_nanos(9), &MessageBody::Unknown(200), "XYZ");
        encode_into(&mut buf, Ts::from_nanos(10), &MessageBody::Heartbeat, "XYZ");

        let mut iter = MessageIter::new(&buf);
        assert_eq!(iter.next().unwrap().body, MessageBody::Unknown(200));
        assert_eq!(iter.next().unwrap().body, MessageBody::Heartbeat);
        assert_eq!(iter.consumed(), buf.len());
    }
}
