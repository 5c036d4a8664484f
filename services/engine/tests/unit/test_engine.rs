//! Unit tests for the engine submission pipeline
//!
//! Covers:
//! - Acceptance, matching, and journaling of scripted sessions
//! - The full validation taxonomy and its reject reasons
//! - HMAC signature verification at the boundary
//! - Arrival and trade sequencing rules
//! - Cancel routing across instruments
//! - Replay determinism

use arena_common::{AccountId, OrderId, Px, Qty, Symbol, MAX_PRICE, MAX_QUANTITY};
use arena_engine::auth::AllowAllVerifier;
use arena_engine::error::{EngineError, RejectReason};
use arena_engine::events::EngineEvent;
use arena_engine::order::{OrderStatus, Side};
use arena_engine::registry::{AccountRef, InMemoryRegistry, InstrumentSpec};
use arena_engine::{EngineConfig, MatchingEngine};
use pretty_assertions::assert_eq;
use rstest::*;
use std::sync::Arc;

use crate::assertions::{assert_book_sane, assert_journal_dense};
use crate::utils::{
    event_fingerprint, limit, market, signed_engine, test_engine, test_registry, ALICE, BOB, BTC,
    ETH,
};

#[test]
fn test_partial_fill_leaves_maker_in_place() {
    let engine = test_engine();
    engine
        .submit(limit(1, ALICE, BTC, Side::Sell, 100, 10))
        .expect("maker rests");
    let receipt = engine
        .submit(limit(2, BOB, BTC, Side::Buy, 100, 4))
        .expect("taker fills");

    assert_eq!(receipt.status, OrderStatus::Filled);
    assert_eq!(receipt.trades.len(), 1);
    assert_eq!(receipt.trades[0].price, Px::from_units(100));
    assert_eq!(receipt.trades[0].quantity, Qty::from_units(4));
    assert_eq!(receipt.trades[0].maker_order_id, OrderId::new(1));
    assert_eq!(receipt.trades[0].taker_order_id, OrderId::new(2));

    let depth = engine.depth(BTC).expect("listed");
    assert_eq!(depth.asks[0].quantity, Qty::from_units(6));
    assert_book_sane(&engine, BTC);

    // accepted + book update, then accepted + trade + taker filled + book update
    let kinds: Vec<String> = engine
        .journal()
        .events_from(1)
        .iter()
        .map(event_fingerprint)
        .collect();
    assert_eq!(kinds.len(), 6);
    assert!(kinds[2].contains("accepted"));
    assert!(kinds[3].contains("trade"));
    assert!(kinds[4].contains("filled:SYM_1:O-2"));
    assert!(kinds[5].contains("book"));
}

#[test]
fn test_order_rests_on_empty_book() {
    let engine = test_engine();
    let receipt = engine
        .submit(limit(1, ALICE, BTC, Side::Buy, 101, 5))
        .expect("rests");
    assert_eq!(receipt.status, OrderStatus::Accepted);
    assert!(receipt.trades.is_empty());
    assert_eq!(engine.best_bid(BTC), Some(Px::from_units(101)));
    assert_eq!(engine.best_ask(BTC), None);
}

#[test]
fn test_cancel_after_full_fill_misses() {
    let engine = test_engine();
    engine
        .submit(limit(1, ALICE, BTC, Side::Sell, 100, 5))
        .expect("maker rests");
    engine
        .submit(limit(2, BOB, BTC, Side::Buy, 100, 5))
        .expect("taker fills");

    let journal_len = engine.journal().len();
    assert!(!engine.cancel(OrderId::new(1)).expect("engine healthy"));
    assert_eq!(engine.journal().len(), journal_len, "a miss journals nothing");
}

#[test]
fn test_cancel_releases_remaining_quantity() {
    let engine = test_engine();
    engine
        .submit(limit(1, ALICE, BTC, Side::Sell, 100, 10))
        .expect("maker rests");
    engine
        .submit(limit(2, BOB, BTC, Side::Buy, 100, 4))
        .expect("partial fill");

    let before = engine.journal().latest_seq();
    assert!(engine.cancel(OrderId::new(1)).expect("engine healthy"));

    let tail = engine.journal().events_from(before + 1);
    assert_eq!(tail.len(), 2, "cancel journals the removal and the depth");
    match &tail[0] {
        EngineEvent::OrderCancelled { order_id, remaining, .. } => {
            assert_eq!(*order_id, OrderId::new(1));
            assert_eq!(*remaining, Qty::from_units(6));
        }
        other => panic!("expected a cancellation event, got {other:?}"),
    }
    assert_eq!(engine.best_ask(BTC), None);
}

#[rstest]
#[case::unknown_instrument(
    limit(1, ALICE, Symbol::new(99), Side::Buy, 100, 5),
    RejectReason::UnknownInstrument
)]
#[case::unknown_account(
    limit(1, AccountId::new(99), BTC, Side::Buy, 100, 5),
    RejectReason::UnknownAccount
)]
#[case::zero_quantity(limit(1, ALICE, BTC, Side::Buy, 100, 0), RejectReason::NonPositiveQuantity)]
#[case::negative_quantity(
    limit(1, ALICE, BTC, Side::Buy, 100, -3),
    RejectReason::NonPositiveQuantity
)]
#[case::oversized_quantity(
    {
        let mut request = limit(1, ALICE, BTC, Side::Buy, 100, 1);
        request.quantity = Qty::from_i64(MAX_QUANTITY + 1);
        request
    },
    RejectReason::QuantityTooLarge
)]
#[case::missing_price(
    {
        let mut request = limit(1, ALICE, BTC, Side::Buy, 100, 5);
        request.price = None;
        request
    },
    RejectReason::MissingPrice
)]
#[case::market_with_price(
    {
        let mut request = market(1, ALICE, BTC, Side::Buy, 5);
        request.price = Some(Px::from_units(100));
        request
    },
    RejectReason::UnexpectedPrice
)]
#[case::zero_price(limit(1, ALICE, BTC, Side::Buy, 0, 5), RejectReason::NonPositivePrice)]
#[case::negative_price(limit(1, ALICE, BTC, Side::Buy, -10, 5), RejectReason::NonPositivePrice)]
#[case::oversized_price(
    {
        let mut request = limit(1, ALICE, BTC, Side::Buy, 100, 5);
        request.price = Some(Px::from_i64(MAX_PRICE + 1));
        request
    },
    RejectReason::PriceTooLarge
)]
fn test_validation_rejects(
    #[case] request: arena_engine::order::OrderRequest,
    #[case] expected: RejectReason,
) {
    let engine = test_engine();
    let err = engine.submit(request).expect_err("should reject");
    assert_eq!(err.reject_reason(), Some(expected));

    // a rejection is journaled but never occupies the live order set
    assert_eq!(engine.journal().len(), 1);
    assert!(!engine.cancel(OrderId::new(1)).expect("engine healthy"));
    assert_eq!(engine.metrics().orders_rejected, 1);
}

#[test]
fn test_delisted_instrument_rejects_new_orders() {
    let registry = Arc::new(test_registry());
    let engine = MatchingEngine::new(
        EngineConfig::default(),
        registry.clone(),
        Arc::new(AllowAllVerifier),
    );

    let mut delisted = InstrumentSpec::new(BTC, "BTC-USDT");
    delisted.active = false;
    registry.register_instrument(delisted);

    let err = engine
        .submit(limit(1, ALICE, BTC, Side::Buy, 100, 5))
        .expect_err("delisted");
    assert_eq!(err.reject_reason(), Some(RejectReason::InactiveInstrument));
}

#[test]
fn test_deactivated_account_rejects_new_orders() {
    let registry = Arc::new(test_registry());
    let engine = MatchingEngine::new(
        EngineConfig::default(),
        registry.clone(),
        Arc::new(AllowAllVerifier),
    );

    registry.register_account(AccountRef {
        account: ALICE,
        active: false,
    });

    let err = engine
        .submit(limit(1, ALICE, BTC, Side::Buy, 100, 5))
        .expect_err("account frozen");
    assert_eq!(err.reject_reason(), Some(RejectReason::InactiveAccount));
}

#[test]
fn test_tick_and_lot_conformance() {
    let registry = InMemoryRegistry::new();
    let mut spec = InstrumentSpec::new(BTC, "BTC-USDT");
    spec.tick_size = Px::from_units(1);
    spec.lot_size = Qty::from_units(1);
    registry.register_instrument(spec);
    registry.register_account(AccountRef::new(ALICE));
    let engine = MatchingEngine::new(
        EngineConfig::default(),
        Arc::new(registry),
        Arc::new(AllowAllVerifier),
    );

    // 150.5 is off the whole-unit tick
    let mut off_tick = limit(1, ALICE, BTC, Side::Buy, 100, 5);
    off_tick.price = Some(Px::from_i64(1_505_000));
    let err = engine.submit(off_tick).expect_err("off tick");
    assert_eq!(err.reject_reason(), Some(RejectReason::TickSizeViolation));

    // 1.5 units is off the whole-unit lot
    let mut off_lot = limit(2, ALICE, BTC, Side::Buy, 100, 5);
    off_lot.quantity = Qty::from_i64(15_000);
    let err = engine.submit(off_lot).expect_err("off lot");
    assert_eq!(err.reject_reason(), Some(RejectReason::LotSizeViolation));

    // conforming order goes through
    engine
        .submit(limit(3, ALICE, BTC, Side::Buy, 100, 5))
        .expect("conforming order accepted");
}

#[test]
fn test_signature_verified_at_the_boundary() {
    let (engine, verifier) = signed_engine();

    let mut request = limit(1, ALICE, BTC, Side::Buy, 100, 5);
    request.signature = verifier.sign(&request).expect("secret installed");
    engine.submit(request).expect("valid signature accepted");

    // tampering after signing invalidates the request
    let mut tampered = limit(2, ALICE, BTC, Side::Buy, 100, 5);
    tampered.signature = verifier.sign(&tampered).expect("secret installed");
    tampered.quantity = Qty::from_units(50);
    let err = engine.submit(tampered).expect_err("tampered");
    assert_eq!(err.reject_reason(), Some(RejectReason::InvalidSignature));

    // an unsigned request never reaches a book
    let err = engine
        .submit(limit(3, BOB, BTC, Side::Sell, 101, 5))
        .expect_err("unsigned");
    assert_eq!(err.reject_reason(), Some(RejectReason::InvalidSignature));
    assert_eq!(engine.best_ask(BTC), None);
}

#[test]
fn test_duplicate_live_id_rejected_terminal_id_reusable() {
    let engine = test_engine();
    engine
        .submit(limit(1, ALICE, BTC, Side::Sell, 100, 5))
        .expect("rests");

    let err = engine
        .submit(limit(1, BOB, BTC, Side::Buy, 99, 5))
        .expect_err("id is live");
    assert_eq!(err.reject_reason(), Some(RejectReason::DuplicateOrderId));

    // once the order is terminal, the id may be used again
    engine
        .submit(limit(2, BOB, BTC, Side::Buy, 100, 5))
        .expect("fills order 1");
    engine
        .submit(limit(1, ALICE, ETH, Side::Buy, 90, 5))
        .expect("terminal id reusable");
}

#[test]
fn test_rejections_do_not_consume_arrival_sequence() {
    let engine = test_engine();
    engine
        .submit(limit(1, ALICE, Symbol::new(99), Side::Buy, 100, 5))
        .expect_err("rejected at validation");
    let receipt = engine
        .submit(limit(2, ALICE, BTC, Side::Buy, 100, 5))
        .expect("accepted");
    assert_eq!(receipt.arrival_seq, 1, "validation rejects never sequence");
}

#[test]
fn test_no_liquidity_market_consumes_arrival_sequence() {
    let engine = test_engine();
    let first = engine
        .submit(limit(1, ALICE, BTC, Side::Buy, 100, 5))
        .expect("accepted");
    assert_eq!(first.arrival_seq, 1);

    // the market order was sequenced before its book turned it away
    engine
        .submit(market(2, BOB, ETH, Side::Sell, 5))
        .expect_err("no liquidity");
    let third = engine
        .submit(limit(3, ALICE, ETH, Side::Buy, 100, 5))
        .expect("accepted");
    assert_eq!(third.arrival_seq, 3);
}

#[test]
fn test_trade_sequences_are_per_instrument() {
    let engine = test_engine();
    engine.submit(limit(1, ALICE, BTC, Side::Sell, 100, 5)).expect("rests");
    engine.submit(limit(2, BOB, BTC, Side::Buy, 100, 5)).expect("fills");
    engine.submit(limit(3, ALICE, ETH, Side::Sell, 90, 5)).expect("rests");
    let receipt = engine
        .submit(limit(4, BOB, ETH, Side::Buy, 90, 5))
        .expect("fills");

    // each instrument starts its own sequence at 1
    assert_eq!(receipt.trades[0].trade_seq, 1);
    let btc_trades: Vec<u64> = engine
        .journal()
        .events_from(1)
        .iter()
        .filter_map(|event| match event {
            EngineEvent::TradeExecuted { trade, .. } if trade.symbol == BTC => {
                Some(trade.trade_seq)
            }
            _ => None,
        })
        .collect();
    assert_eq!(btc_trades, vec![1]);
}

#[test]
fn test_cancel_routes_by_id_across_instruments() {
    let engine = test_engine();
    engine.submit(limit(1, ALICE, BTC, Side::Buy, 100, 5)).expect("rests");
    engine.submit(limit(2, ALICE, ETH, Side::Buy, 90, 5)).expect("rests");

    assert!(engine.cancel(OrderId::new(2)).expect("engine healthy"));
    assert_eq!(engine.best_bid(ETH), None);
    assert_eq!(
        engine.best_bid(BTC),
        Some(Px::from_units(100)),
        "other instruments untouched"
    );
    assert!(!engine.cancel(OrderId::new(7)).expect("unknown id misses"));
}

#[test]
fn test_market_remainder_cancelled_in_receipt_and_journal() {
    let engine = test_engine();
    engine.submit(limit(1, ALICE, BTC, Side::Sell, 100, 3)).expect("rests");
    let receipt = engine
        .submit(market(2, BOB, BTC, Side::Buy, 10))
        .expect("partial fill");

    assert_eq!(receipt.status, OrderStatus::Cancelled);
    assert_eq!(receipt.trades.len(), 1);
    assert_eq!(receipt.trades[0].quantity, Qty::from_units(3));
    assert!(receipt.events.iter().any(|event| matches!(
        event,
        EngineEvent::OrderCancelled { order_id, remaining, .. }
            if *order_id == OrderId::new(2) && *remaining == Qty::from_units(7)
    )));

    // nothing rested, both ids are free again
    assert!(!engine.cancel(OrderId::new(2)).expect("engine healthy"));
    assert_eq!(engine.metrics().live_orders, 0);
}

#[test]
fn test_metrics_cover_the_whole_flow() {
    let engine = test_engine();
    engine.submit(limit(1, ALICE, BTC, Side::Sell, 100, 10)).expect("rests");
    engine.submit(limit(2, BOB, BTC, Side::Buy, 100, 4)).expect("fills");
    engine
        .submit(limit(3, ALICE, Symbol::new(99), Side::Buy, 1, 1))
        .expect_err("rejected");
    engine.cancel(OrderId::new(1)).expect("engine healthy");

    let metrics = engine.metrics();
    assert_eq!(metrics.orders_accepted, 2);
    assert_eq!(metrics.orders_rejected, 1);
    assert_eq!(metrics.trades_executed, 1);
    assert_eq!(metrics.cancels_honored, 1);
    assert_eq!(metrics.total_volume, Qty::from_units(4).as_i64() as u64);
    assert_eq!(metrics.instruments_halted, 0);
    assert_eq!(metrics.live_orders, 0);
}

fn scripted_session(engine: &MatchingEngine) {
    engine.submit(limit(1, ALICE, BTC, Side::Sell, 100, 10)).expect("rests");
    engine.submit(limit(2, BOB, BTC, Side::Buy, 100, 4)).expect("fills");
    engine.submit(limit(3, ALICE, ETH, Side::Buy, 90, 5)).expect("rests");
    engine.submit(market(4, BOB, ETH, Side::Sell, 8)).expect("partial");
    let _ = engine.submit(market(5, BOB, ETH, Side::Sell, 2)).expect_err("dry book");
    engine.submit(limit(6, BOB, BTC, Side::Buy, 99, 2)).expect("rests");
    assert!(engine.cancel(OrderId::new(1)).expect("engine healthy"));
    assert!(!engine.cancel(OrderId::new(2)).expect("engine healthy"));
}

#[test]
fn test_replay_reproduces_identical_event_stream() {
    let first = test_engine();
    let second = test_engine();
    scripted_session(&first);
    scripted_session(&second);

    let one: Vec<String> = first
        .journal()
        .events_from(1)
        .iter()
        .map(event_fingerprint)
        .collect();
    let two: Vec<String> = second
        .journal()
        .events_from(1)
        .iter()
        .map(event_fingerprint)
        .collect();

    assert!(!one.is_empty());
    assert_eq!(one, two, "same submissions must journal the same stream");
    assert_journal_dense(&first.journal().events_from(1));
    assert_book_sane(&first, BTC);
    assert_book_sane(&first, ETH);
}
