//! Core order book implementation

use crate::top::TopOfBook;
use common::{OrderId, Px, Qty, Side, Ts};
use rustc_hash::FxHashMap;
use std::collections::BTreeMap;
use std::sync::Arc;
use thiserror::Error;

/// A resting order in the book
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Order {
    /// Order id, unique within the book
    pub id: OrderId,
    /// Limit price
    pub price: Px,
    /// Remaining quantity
    pub quantity: Qty,
    /// Quantity at entry
    pub original_quantity: Qty,
    /// Book side
    pub side: Side,
    /// Feed timestamp of the add
    pub timestamp: Ts,
    /// Symbol the order rests on
    pub symbol: String,
}

impl Order {
    /// Create a new resting order; `original_quantity` starts at `quantity`
    #[must_use]
    pub fn new(
        id: OrderId,
        price: Px,
        quantity: Qty,
        side: Side,
        timestamp: Ts,
        symbol: impl Into<String>,
    ) -> Self {
        Self {
            id,
            price,
            quantity,
            original_quantity: quantity,
            side,
            timestamp,
            symbol: symbol.into(),
        }
    }
}

/// Aggregate quantity at one price
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Level {
    /// Level price
    pub price: Px,
    /// Sum of resting quantities at this price; u64 so many orders cannot
    /// overflow the per-order quantity type
    pub total_quantity: u64,
}

/// Error types for order book operations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum BookError {
    /// An order with this id already rests in the book
    #[error("duplicate order id {0}")]
    DuplicateOrder(OrderId),

    /// No resting order with this id
    #[error("unknown order id {0}")]
    UnknownOrder(OrderId),

    /// Execution quantity exceeds the order's remaining quantity
    #[error("order {id}: tried to execute {requested} of {remaining} remaining")]
    InsufficientQuantity {
        /// Targeted order
        id: OrderId,
        /// Quantity still resting
        remaining: Qty,
        /// Quantity requested
        requested: Qty,
    },

    /// Adding the order would cross the opposite side's best price
    #[error("order {id} at {price} would cross the book")]
    WouldCross {
        /// Offending order
        id: OrderId,
        /// Its limit price
        price: Px,
    },

    /// Orders with zero quantity never rest in the book
    #[error("order {0} has zero quantity")]
    ZeroQuantity(OrderId),
}

/// Per-symbol order book.
///
/// Each side is a sparse ordered map from price to aggregate quantity, so
/// best-price queries are map extrema and distant prices never alias. The
/// order index maps ids to their resting state. All mutations are
/// transactional: a rejected call leaves the book untouched.
pub struct OrderBook {
    symbol: String,
    bids: BTreeMap<Px, u64>,
    asks: BTreeMap<Px, u64>,
    orders: FxHashMap<OrderId, Order>,
    top: Arc<TopOfBook>,
}

impl OrderBook {
    /// Create an empty book for `symbol`, publishing its top through `top`
    #[must_use]
    pub fn new(symbol: impl Into<String>, top: Arc<TopOfBook>) -> Self {
        Self {
            symbol: symbol.into(),
            bids: BTreeMap::new(),
            asks: BTreeMap::new(),
            orders: FxHashMap::default(),
            top,
        }
    }

    /// Symbol this book represents
    #[must_use]
    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    /// Insert a new resting order.
    ///
    /// # Errors
    /// [`BookError::DuplicateOrder`] if the id already rests,
    /// [`BookError::ZeroQuantity`] for an empty order,
    /// [`BookError::WouldCross`] if the price crosses the opposite best.
    pub fn add_order(&mut self, order: Order) -> Result<(), BookError> {
        if self.orders.contains_key(&order.id) {
            return Err(BookError::DuplicateOrder(order.id));
        }
        if order.quantity.is_zero() {
            return Err(BookError::ZeroQuantity(order.id));
        }
        let crosses = match order.side {
            Side::Buy => self.best_ask().is_some_and(|ask| order.price >= ask),
            Side::Sell => self.best_bid().is_some_and(|bid| order.price <= bid),
        };
        if crosses {
            return Err(BookError::WouldCross {
                id: order.id,
                price: order.price,
            });
        }

        self.add_to_level(order.side, order.price, order.quantity);
        self.orders.insert(order.id, order);
        self.publish_top();
        Ok(())
    }

    /// Replace the remaining quantity of a resting order. A new quantity of
    /// zero removes the order, like a cancel.
    ///
    /// # Errors
    /// [`BookError::UnknownOrder`] if the id is not resting.
    pub fn modify_order(&mut self, id: OrderId, new_quantity: Qty) -> Result<(), BookError> {
        let order = self.orders.get_mut(&id).ok_or(BookError::UnknownOrder(id))?;
        let (side, price, old_quantity) = (order.side, order.price, order.quantity);

        if new_quantity.is_zero() {
            self.orders.remove(&id);
            self.sub_from_level(side, price, old_quantity);
        } else {
            order.quantity = new_quantity;
            // A modify above the entry size re-baselines the original, so
            // quantity <= original_quantity always holds.
            if new_quantity > order.original_quantity {
                order.original_quantity = new_quantity;
            }
            self.sub_from_level(side, price, old_quantity);
            self.add_to_level(side, price, new_quantity);
        }
        self.publish_top();
        Ok(())
    }

    /// Remove a resting order.
    ///
    /// # Errors
    /// [`BookError::UnknownOrder`] if the id is not resting.
    pub fn cancel_order(&mut self, id: OrderId) -> Result<(), BookError> {
        let order = self.orders.remove(&id).ok_or(BookError::UnknownOrder(id))?;
        self.sub_from_level(order.side, order.price, order.quantity);
        self.publish_top();
        Ok(())
    }

    /// Execute `exec_quantity` against a resting order, removing it when
    /// fully consumed.
    ///
    /// # Errors
    /// [`BookError::UnknownOrder`] if the id is not resting,
    /// [`BookError::InsufficientQuantity`] if the order has less than
    /// `exec_quantity` remaining (no state change).
    pub fn execute_order(&mut self, id: OrderId, exec_quantity: Qty) -> Result<(), BookError> {
        let order = self.orders.get_mut(&id).ok_or(BookError::UnknownOrder(id))?;
        if order.quantity < exec_quantity {
            return Err(BookError::InsufficientQuantity {
                id,
                remaining: order.quantity,
                requested: exec_quantity,
            });
        }

        let (side, price) = (order.side, order.price);
        order.quantity = order.quantity.saturating_sub(exec_quantity);
        let emptied = order.quantity.is_zero();
        if emptied {
            self.orders.remove(&id);
        }
        self.sub_from_level(side, price, exec_quantity);
        self.publish_top();
        Ok(())
    }

    /// Highest bid price with resting quantity
    #[must_use]
    pub fn best_bid(&self) -> Option<Px> {
        self.bids.keys().next_back().copied()
    }

    /// Lowest ask price with resting quantity
    #[must_use]
    pub fn best_ask(&self) -> Option<Px> {
        self.asks.keys().next().copied()
    }

    /// Count of non-empty price levels per side, `(bids, asks)`
    #[must_use]
    pub fn depth(&self) -> (usize, usize) {
        (self.bids.len(), self.asks.len())
    }

    /// Best ask minus best bid when both sides are present
    #[must_use]
    pub fn spread(&self) -> Option<Px> {
        match (self.best_bid(), self.best_ask()) {
            (Some(bid), Some(ask)) => Some(Px::from_i64(ask.as_i64() - bid.as_i64())),
            _ => None,
        }
    }

    /// Integer average of best bid and best ask when both sides are present.
    /// The division truncates toward zero.
    #[must_use]
    pub fn mid_price(&self) -> Option<Px> {
        match (self.best_bid(), self.best_ask()) {
            (Some(bid), Some(ask)) => Some(Px::from_i64((bid.as_i64() + ask.as_i64()) / 2)),
            _ => None,
        }
    }

    /// Snapshot up to `n` levels of one side, best price first
    #[must_use]
    pub fn get_levels(&self, side: Side, n: usize) -> Vec<Level> {
        let to_level = |(&price, &total_quantity): (&Px, &u64)| Level {
            price,
            total_quantity,
        };
        match side {
            Side::Buy => self.bids.iter().rev().take(n).map(to_level).collect(),
            Side::Sell => self.asks.iter().take(n).map(to_level).collect(),
        }
    }

    /// Look up a resting order by id
    #[must_use]
    pub fn get_order(&self, id: OrderId) -> Option<&Order> {
        self.orders.get(&id)
    }

    /// Number of resting orders
    #[must_use]
    pub fn order_count(&self) -> usize {
        self.orders.len()
    }

    fn side_levels(&mut self, side: Side) -> &mut BTreeMap<Px, u64> {
        match side {
            Side::Buy => &mut self.bids,
            Side::Sell => &mut self.asks,
        }
    }

    fn add_to_level(&mut self, side: Side, price: Px, quantity: Qty) {
        *self.side_levels(side).entry(price).or_insert(0) += u64::from(quantity.as_u32());
    }

    fn sub_from_level(&mut self, side: Side, price: Px, quantity: Qty) {
        let levels = self.side_levels(side);
        if let Some(aggregate) = levels.get_mut(&price) {
            *aggregate = aggregate.saturating_sub(u64::from(quantity.as_u32()));
            if *aggregate == 0 {
                levels.remove(&price);
            }
        }
    }

    fn publish_top(&self) {
        self.top.publish(self.best_bid(), self.best_ask());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn book() -> OrderBook {
        OrderBook::new("AAPL", Arc::new(TopOfBook::new()))
    }

    fn add(book: &mut OrderBook, id: u64, side: Side, price: i64, qty: u32) {
        book.add_order(Order::new(
            OrderId::new(id),
            Px::from_i64(price),
            Qty::new(qty),
            side,
            Ts::from_nanos(id),
            "AAPL",
        ))
        .unwrap();
    }

    /// Sum resting orders per (side, price) and compare with the aggregates.
    fn assert_level_integrity(book: &OrderBook) {
        let mut expected_bids: BTreeMap<Px, u64> = BTreeMap::new();
        let mut expected_asks: BTreeMap<Px, u64> = BTreeMap::new();
        for order in book.orders.values() {
            let target = match order.side {
                Side::Buy => &mut expected_bids,
                Side::Sell => &mut expected_asks,
            };
            *target.entry(order.price).or_insert(0) += u64::from(order.quantity.as_u32());
        }
        assert_eq!(book.bids, expected_bids);
        assert_eq!(book.asks, expected_asks);
    }

    #[test]
    fn test_add_and_cancel_round_trip() {
        let mut b = book();
        add(&mut b, 1, Side::Buy, 10_050, 10);
        assert_eq!(b.best_bid(), Some(Px::from_i64(10_050)));
        assert_eq!(b.depth(), (1, 0));
        assert_level_integrity(&b);

        b.cancel_order(OrderId::new(1)).unwrap();
        assert_eq!(b.best_bid(), None);
        assert_eq!(b.depth(), (0, 0));
        assert_level_integrity(&b);
    }

    #[test]
    fn test_duplicate_add_rejected_without_mutation() {
        let mut b = book();
        add(&mut b, 1, Side::Buy, 10_000, 10);
        let result = b.add_order(Order::new(
            OrderId::new(1),
            Px::from_i64(9_900),
            Qty::new(5),
            Side::Buy,
            Ts::from_nanos(2),
            "AAPL",
        ));
        assert_eq!(result, Err(BookError::DuplicateOrder(OrderId::new(1))));
        assert_eq!(b.depth(), (1, 0));
        assert_eq!(b.get_levels(Side::Buy, 8)[0].total_quantity, 10);
        assert_level_integrity(&b);
    }

    #[test]
    fn test_crossing_add_rejected() {
        let mut b = book();
        add(&mut b, 1, Side::Sell, 10_050, 5);
        let result = b.add_order(Order::new(
            OrderId::new(2),
            Px::from_i64(10_050),
            Qty::new(5),
            Side::Buy,
            Ts::from_nanos(2),
            "AAPL",
        ));
        assert!(matches!(result, Err(BookError::WouldCross { .. })));
        // Books with both sides never cross
        assert_eq!(b.depth(), (0, 1));
    }

    #[test]
    fn test_modify_updates_aggregate() {
        let mut b = book();
        add(&mut b, 1, Side::Buy, 10_000, 10);
        add(&mut b, 2, Side::Buy, 10_000, 20);

        b.modify_order(OrderId::new(1), Qty::new(4)).unwrap();
        assert_eq!(b.get_levels(Side::Buy, 1)[0].total_quantity, 24);
        assert_level_integrity(&b);

        // Raising above the entry size re-baselines original_quantity
        b.modify_order(OrderId::new(1), Qty::new(50)).unwrap();
        let order = b.get_order(OrderId::new(1)).unwrap();
        assert_eq!(order.original_quantity, Qty::new(50));
        assert_level_integrity(&b);
    }

    #[test]
    fn test_modify_to_zero_removes_order() {
        let mut b = book();
        add(&mut b, 1, Side::Sell, 10_100, 10);
        b.modify_order(OrderId::new(1), Qty::ZERO).unwrap();
        assert_eq!(b.order_count(), 0);
        assert_eq!(b.best_ask(), None);
        assert_level_integrity(&b);
    }

    #[rstest]
    #[case::modify(|b: &mut OrderBook| b.modify_order(OrderId::new(42), Qty::new(1)))]
    #[case::cancel(|b: &mut OrderBook| b.cancel_order(OrderId::new(42)))]
    #[case::execute(|b: &mut OrderBook| b.execute_order(OrderId::new(42), Qty::new(1)))]
    fn test_unknown_id_rejected(#[case] op: fn(&mut OrderBook) -> Result<(), BookError>) {
        let mut b = book();
        add(&mut b, 1, Side::Buy, 10_000, 10);
        assert_eq!(op(&mut b), Err(BookError::UnknownOrder(OrderId::new(42))));
        assert_level_integrity(&b);
    }

    #[test]
    fn test_execute_partial_then_full() {
        let mut b = book();
        add(&mut b, 1, Side::Sell, 10_050, 10);

        b.execute_order(OrderId::new(1), Qty::new(4)).unwrap();
        assert_eq!(b.get_order(OrderId::new(1)).unwrap().quantity, Qty::new(6));
        assert_eq!(b.get_levels(Side::Sell, 1)[0].total_quantity, 6);
        assert_level_integrity(&b);

        b.execute_order(OrderId::new(1), Qty::new(6)).unwrap();
        assert_eq!(b.order_count(), 0);
        assert_eq!(b.best_ask(), None);
        assert_level_integrity(&b);
    }

    #[test]
    fn test_execute_exceeding_remaining_is_transactional() {
        let mut b = book();
        add(&mut b, 1, Side::Buy, 10_000, 5);
        let result = b.execute_order(OrderId::new(1), Qty::new(6));
        assert_eq!(
            result,
            Err(BookError::InsufficientQuantity {
                id: OrderId::new(1),
                remaining: Qty::new(5),
                requested: Qty::new(6),
            })
        );
        assert_eq!(b.get_order(OrderId::new(1)).unwrap().quantity, Qty::new(5));
        assert_eq!(b.get_levels(Side::Buy, 1)[0].total_quantity, 5);
        assert_level_integrity(&b);
    }

    #[test]
    fn test_best_prices_across_levels() {
        let mut b = book();
        add(&mut b, 1, Side::Buy, 10_000, 10);
        add(&mut b, 2, Side::Buy, 10_020, 10);
        add(&mut b, 3, Side::Buy, 9_980, 10);
        add(&mut b, 4, Side::Sell, 10_100, 10);
        add(&mut b, 5, Side::Sell, 10_080, 10);

        assert_eq!(b.best_bid(), Some(Px::from_i64(10_020)));
        assert_eq!(b.best_ask(), Some(Px::from_i64(10_080)));
        assert_eq!(b.spread(), Some(Px::from_i64(60)));
        assert_eq!(b.mid_price(), Some(Px::from_i64(10_050)));

        // Best bid falls back to the next level once the top is cancelled
        b.cancel_order(OrderId::new(2)).unwrap();
        assert_eq!(b.best_bid(), Some(Px::from_i64(10_000)));
        assert_level_integrity(&b);
    }

    #[test]
    fn test_get_levels_sorted_and_truncated() {
        let mut b = book();
        for (id, price) in [(1, 10_000), (2, 10_020), (3, 9_980), (4, 10_040)] {
            add(&mut b, id, Side::Buy, price, 10);
        }
        let levels = b.get_levels(Side::Buy, 3);
        let prices: Vec<i64> = levels.iter().map(|l| l.price.as_i64()).collect();
        assert_eq!(prices, vec![10_040, 10_020, 10_000]);

        for (id, price) in [(10, 10_100), (11, 10_060), (12, 10_080)] {
            add(&mut b, id, Side::Sell, price, 10);
        }
        let levels = b.get_levels(Side::Sell, 2);
        let prices: Vec<i64> = levels.iter().map(|l| l.price.as_i64()).collect();
        assert_eq!(prices, vec![10_060, 10_080]);
    }

    #[test]
    fn test_top_of_book_published() {
        let top = Arc::new(TopOfBook::new());
        let mut b = OrderBook::new("AAPL", Arc::clone(&top));
        b.add_order(Order::new(
            OrderId::new(1),
            Px::from_i64(10_050),
            Qty::new(10),
            Side::Buy,
            Ts::from_nanos(1),
            "AAPL",
        ))
        .unwrap();
        assert_eq!(top.best_bid(), Some(Px::from_i64(10_050)));

        b.cancel_order(OrderId::new(1)).unwrap();
        assert_eq!(top.best_bid(), None);
    }

    #[test]
    fn test_zero_quantity_add_rejected() {
        let mut b = book();
        let result = b.add_order(Order::new(
            OrderId::new(1),
            Px::from_i64(10_000),
            Qty::ZERO,
            Side::Buy,
            Ts::from_nanos(1),
            "AAPL",
        ));
        assert_eq!(result, Err(BookError::ZeroQuantity(OrderId::new(1))));
        assert_eq!(b.depth(), (0, 0));
    }
}
