//! Lifecycle tests for the execution engine

use common::{OrderId, Px, Qty, Side, Signal, Ts};
use engine::{ExecutionEngine, ExecutionReport, OrderStatus};
use lob::TopRegistry;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

type Reports = Arc<Mutex<Vec<ExecutionReport>>>;

fn engine_with_sink(tops: Arc<TopRegistry>) -> (ExecutionEngine, Reports) {
    let engine = ExecutionEngine::new(tops);
    let reports: Reports = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&reports);
    engine.set_execution_callback(Arc::new(move |report| {
        sink.lock().unwrap().push(report.clone());
    }));
    (engine, reports)
}

fn buy_signal(symbol: &str, price: i64, qty: u32) -> Signal {
    Signal::new(
        Side::Buy,
        symbol,
        Px::from_i64(price),
        Qty::new(qty),
        1.0,
        Ts::now(),
    )
}

/// Wait until `predicate` holds over the report stream, panicking after two
/// seconds. Tests never rely on the simulated fill latency itself.
fn wait_for(reports: &Reports, predicate: impl Fn(&[ExecutionReport]) -> bool) {
    let deadline = Instant::now() + Duration::from_secs(2);
    loop {
        if predicate(&reports.lock().unwrap()) {
            return;
        }
        assert!(Instant::now() < deadline, "timed out waiting for reports");
        std::thread::sleep(Duration::from_millis(1));
    }
}

fn terminal(status: OrderStatus) -> bool {
    matches!(
        status,
        OrderStatus::Filled | OrderStatus::Canceled | OrderStatus::Rejected
    )
}

#[test]
fn test_crossing_buy_fills_at_ask() {
    let tops = Arc::new(TopRegistry::new());
    tops.register("AAPL")
        .publish(None, Some(Px::from_i64(10_050)));

    let (engine, reports) = engine_with_sink(Arc::clone(&tops));
    engine.start();

    let id = engine.submit_order(&buy_signal("AAPL", 10_100, 5));
    wait_for(&reports, |r| r.iter().any(|x| terminal(x.status)));
    engine.stop();

    let reports = reports.lock().unwrap();
    assert_eq!(reports.len(), 2);

    assert_eq!(reports[0].order_id, id);
    assert_eq!(reports[0].status, OrderStatus::New);
    assert_eq!(reports[0].exec_quantity, Qty::ZERO);
    assert_eq!(reports[0].leaves_quantity, Qty::new(5));

    assert_eq!(reports[1].status, OrderStatus::Filled);
    assert_eq!(reports[1].price, Px::from_i64(10_050));
    assert_eq!(reports[1].exec_quantity, Qty::new(5));
    assert_eq!(reports[1].leaves_quantity, Qty::ZERO);
}

#[test]
fn test_crossing_sell_fills_at_bid() {
    let tops = Arc::new(TopRegistry::new());
    tops.register("MSFT")
        .publish(Some(Px::from_i64(10_000)), None);

    let (engine, reports) = engine_with_sink(Arc::clone(&tops));
    engine.start();

    engine.submit_order(&Signal::new(
        Side::Sell,
        "MSFT",
        Px::from_i64(9_900),
        Qty::new(3),
        1.0,
        Ts::now(),
    ));
    wait_for(&reports, |r| r.iter().any(|x| terminal(x.status)));
    engine.stop();

    let reports = reports.lock().unwrap();
    let fill = reports.last().unwrap();
    assert_eq!(fill.status, OrderStatus::Filled);
    assert_eq!(fill.price, Px::from_i64(10_000));
}

#[test]
fn test_unfillable_order_partially_fills_then_completes() {
    let tops = Arc::new(TopRegistry::new());
    let top = tops.register("AAPL");
    // No ask: a buy cannot fill and keeps working in random partials

    let (engine, reports) = engine_with_sink(Arc::clone(&tops));
    engine.start();

    let id = engine.submit_order(&buy_signal("AAPL", 10_100, 10));
    wait_for(&reports, |r| {
        r.iter().any(|x| x.status == OrderStatus::PartiallyFilled)
    });

    // Once the ask moves inside the limit the next cycle fills the remainder
    top.publish(None, Some(Px::from_i64(10_050)));
    wait_for(&reports, |r| r.iter().any(|x| terminal(x.status)));
    engine.stop();

    let reports = reports.lock().unwrap();

    // Execution conservation: all fills plus the terminal leaves account for
    // the original quantity, and exactly one terminal report exists.
    let executed: u32 = reports
        .iter()
        .filter(|r| r.order_id == id)
        .map(|r| r.exec_quantity.as_u32())
        .sum();
    let last = reports.last().unwrap();
    assert_eq!(executed + last.leaves_quantity.as_u32(), 10);
    assert_eq!(last.status, OrderStatus::Filled);
    assert_eq!(last.leaves_quantity, Qty::ZERO);
    assert_eq!(
        reports.iter().filter(|r| terminal(r.status)).count(),
        1
    );

    for report in reports.iter().filter(|r| r.status == OrderStatus::PartiallyFilled) {
        assert!(report.exec_quantity.as_u32() >= 1);
        assert!(report.exec_quantity.as_u32() <= 10);
    }
}

#[test]
fn test_unknown_symbol_is_rejected() {
    let tops = Arc::new(TopRegistry::new());
    let (engine, reports) = engine_with_sink(tops);
    engine.start();

    let id = engine.submit_order(&buy_signal("NOBOOK", 10_000, 5));
    wait_for(&reports, |r| r.iter().any(|x| terminal(x.status)));
    engine.stop();

    let reports = reports.lock().unwrap();
    let last = reports.last().unwrap();
    assert_eq!(last.order_id, id);
    assert_eq!(last.status, OrderStatus::Rejected);
    assert_eq!(last.leaves_quantity, Qty::new(5));

    assert_eq!(engine.get_order_status(id), OrderStatus::Rejected);
}

#[test]
fn test_cancel_unknown_id_returns_false_without_report() {
    let tops = Arc::new(TopRegistry::new());
    let (engine, reports) = engine_with_sink(tops);

    assert!(!engine.cancel_order(OrderId::new(42)));
    assert!(reports.lock().unwrap().is_empty());
}

#[test]
fn test_cancel_queued_order_reports_leaves() {
    let tops = Arc::new(TopRegistry::new());
    tops.register("AAPL");

    // Worker not started: the order stays queued deterministically
    let (engine, reports) = engine_with_sink(tops);
    let id = engine.submit_order(&buy_signal("AAPL", 10_000, 7));

    assert!(engine.cancel_order(id));
    assert!(!engine.cancel_order(id));

    let reports = reports.lock().unwrap();
    assert_eq!(reports.len(), 2);
    assert_eq!(reports[1].status, OrderStatus::Canceled);
    assert_eq!(reports[1].exec_quantity, Qty::ZERO);
    assert_eq!(reports[1].leaves_quantity, Qty::new(7));
}

#[test]
fn test_order_ids_strictly_increase() {
    let tops = Arc::new(TopRegistry::new());
    tops.register("AAPL");
    let (engine, _reports) = engine_with_sink(tops);

    let mut previous = OrderId::new(0);
    for _ in 0..100 {
        let id = engine.submit_order(&buy_signal("AAPL", 10_000, 1));
        assert!(id > previous);
        previous = id;
    }
}

#[test]
fn test_coarse_status_from_queue_position() {
    let tops = Arc::new(TopRegistry::new());
    tops.register("AAPL");

    // Worker not started: queue positions are stable
    let (engine, _reports) = engine_with_sink(tops);
    let first = engine.submit_order(&buy_signal("AAPL", 10_000, 1));
    let second = engine.submit_order(&buy_signal("AAPL", 10_000, 1));

    assert_eq!(engine.get_order_status(first), OrderStatus::Pending);
    assert_eq!(engine.get_order_status(second), OrderStatus::New);
    assert_eq!(
        engine.get_order_status(OrderId::new(9_999)),
        OrderStatus::Rejected
    );
}
