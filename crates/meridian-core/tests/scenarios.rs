//! End-to-end matching scenarios through the public engine API.

use meridian_core::{
    Command, EngineConfig, Error, EventKind, FillKind, MatchingEngine, OrderId, OwnerId, Price,
    Quantity, Side,
};

fn engine() -> MatchingEngine {
    MatchingEngine::new(EngineConfig::default().with_capacity(256))
}

#[test]
fn time_priority_never_skips_ahead() {
    let mut engine = engine();
    // A, B and C at the same price, in that order
    engine.submit_order(Side::Sell, Price(100), Quantity(1), OwnerId(1)).unwrap();
    engine.submit_order(Side::Sell, Price(100), Quantity(2), OwnerId(2)).unwrap();
    engine.submit_order(Side::Sell, Price(100), Quantity(1), OwnerId(3)).unwrap();

    let report = engine.submit_order(Side::Buy, Price(100), Quantity(2), OwnerId(4)).unwrap();

    let makers: Vec<_> = report.trades.iter().map(|t| (t.maker_order_id, t.quantity)).collect();
    assert_eq!(makers, vec![(OrderId(1), Quantity(1)), (OrderId(2), Quantity(1))]);
    assert!(!engine.book().contains(OrderId(1)));
    assert_eq!(engine.book().order(OrderId(2)).unwrap().remaining(), Quantity(1));
    assert_eq!(engine.book().order(OrderId(3)).unwrap().filled_qty(), Quantity::ZERO);

    let untouched = engine.sink().iter().all(|e| match e.kind {
        EventKind::OrderFilled { order_id, .. } => order_id != OrderId(3),
        _ => true,
    });
    assert!(untouched);
}

#[test]
fn price_priority_regardless_of_arrival() {
    let mut engine = engine();
    engine.execute(Command::buy(100, 5, 1)).unwrap();
    engine.execute(Command::buy(101, 5, 2)).unwrap();

    let report = engine.submit_order(Side::Sell, Price(99), Quantity(7), OwnerId(3)).unwrap();

    let fills: Vec<_> = report.trades.iter().map(|t| (t.buy_order_id.0, t.price.0, t.quantity.0)).collect();
    assert_eq!(fills, vec![(2, 101, 5), (1, 100, 2)]);
    assert_eq!(engine.best_bid(), Some(Price(100)));
    assert_eq!(engine.best_ask(), None);
}

#[test]
fn partial_remainder_rests_at_its_own_price() {
    let mut engine = engine();
    engine.execute(Command::sell(100, 3, 1)).unwrap();

    let report = engine.submit_order(Side::Buy, Price(102), Quantity(8), OwnerId(2)).unwrap();
    assert_eq!(report.trades.len(), 1);
    assert_eq!(report.trades[0].price, Price(100));
    assert_eq!(report.resting_order_id, Some(OrderId(2)));
    assert_eq!(report.remaining, Quantity(5));
    assert_eq!(engine.best_bid(), Some(Price(102)));

    let rested = engine.sink().last().unwrap().kind;
    assert_eq!(rested, EventKind::OrderRested {
        order_id: OrderId(2),
        side: Side::Buy,
        price: Price(102),
        remaining: Quantity(5),
    });
}

#[test]
fn fully_filled_order_is_never_matched_again() {
    let mut engine = engine();
    engine.execute(Command::sell(100, 4, 1)).unwrap();
    engine.execute(Command::buy(100, 4, 2)).unwrap();

    let report = engine.submit_order(Side::Buy, Price(100), Quantity(4), OwnerId(3)).unwrap();
    assert!(report.trades.is_empty());
    assert_eq!(report.resting_order_id, Some(OrderId(3)));
    assert_eq!(engine.cancel_order(OrderId(1)), Err(Error::NotFound(OrderId(1))));

    let full_fills = engine
        .sink()
        .iter()
        .filter(|e| matches!(e.kind, EventKind::OrderFilled { order_id: OrderId(1), kind: FillKind::Full, .. }))
        .count();
    assert_eq!(full_fills, 1);
}

#[test]
fn cancel_mid_queue_keeps_neighbours_in_order() {
    let mut engine = engine();
    for owner in 1..=4 {
        engine.execute(Command::buy(50, 1, owner)).unwrap();
    }
    engine.cancel_order(OrderId(2)).unwrap();
    engine.cancel_order(OrderId(4)).unwrap();
    engine.execute(Command::buy(50, 1, 5)).unwrap();

    let queue: Vec<u64> = engine
        .book()
        .orders_at(Side::Buy, Price(50))
        .iter()
        .map(|o| o.id.0)
        .collect();
    assert_eq!(queue, vec![1, 3, 5]);

    let depth = engine.depth_snapshot(1);
    assert_eq!(depth.bids[0].quantity, Quantity(3));
    assert_eq!(depth.bids[0].order_count, 3);
}
