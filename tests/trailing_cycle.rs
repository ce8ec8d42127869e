//! Full buy -> trail -> sell cycle against the simulated gateway.

use chrono::{TimeZone, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use trailbot::engine::Engine;
use trailbot::market::KlineWindow;
use trailbot::orders::{BuyLedger, GatewayCall, PaperGateway};
use trailbot::trailing::FixedDistance;
use trailbot::{Config, InstrumentInfo, Kline, MarketEvent, MarketTick, Side};

fn cycle_config() -> Config {
    Config {
        symbol: "BTCUSDT".to_string(),
        profit_pct: dec!(0.5),
        distance_pct: dec!(0.2),
        spread_enabled: true,
        spread_distance_pct: dec!(2),
        indicators_enabled: true,
        // Wide bounds: a quiet synthetic market should read near neutral
        indicators_minimum: 0.1,
        indicators_maximum: 3.9,
        wiggle_enabled: false,
        ..Config::default()
    }
}

fn flat_history(len: usize, close: Decimal) -> Vec<Kline> {
    (0..len)
        .map(|i| Kline {
            time: Utc
                .with_ymd_and_hms(2024, 6, 1, i as u32 / 60, i as u32 % 60, 0)
                .unwrap(),
            open: close,
            high: close,
            low: close,
            close,
            volume: dec!(1),
            turnover: close,
        })
        .collect()
}

fn tick(price: Decimal) -> MarketEvent {
    MarketEvent::Ticker(MarketTick {
        time: Utc::now(),
        last_price: price,
    })
}

fn confirmed_kline(close: Decimal) -> MarketEvent {
    MarketEvent::Kline {
        kline: Kline {
            time: Utc::now(),
            open: close,
            high: close,
            low: close,
            close,
            volume: dec!(1),
            turnover: close,
        },
        confirmed: true,
    }
}

#[tokio::test]
async fn test_full_trailing_cycle() {
    let _ = tracing_subscriber::fmt::try_init();

    let config = cycle_config();
    let info = InstrumentInfo {
        base_coin: "BTC".to_string(),
        quote_coin: "USDT".to_string(),
        base_precision: 4,
        min_order_qty: dec!(0.01),
    };
    let window = KlineWindow::from_history(config.limit, flat_history(30, dec!(100)));

    let mut engine = Engine::new(
        config,
        info,
        window,
        BuyLedger::new(),
        PaperGateway::new(),
        Box::new(FixedDistance),
        dec!(100),
    );

    // 1. A confirmed candle with approving signals opens a trailing buy
    engine.handle(confirmed_kline(dec!(100))).await.unwrap();
    let buy = engine.trail().active().expect("trailing buy open").clone();
    assert_eq!(buy.side, Side::Buy);
    assert_eq!(buy.qty, dec!(0.01));
    assert_eq!(buy.trigger, dec!(100.2)); // 0.2% above spot

    // 2. The price runs up through the trigger and the buy fills
    engine.handle(tick(dec!(100.3))).await.unwrap();
    assert!(!engine.trail().is_active());
    assert_eq!(engine.ledger().len(), 1);
    let lot = engine.ledger().lots().next().unwrap().clone();
    assert_eq!(lot.price, dec!(100.2));
    assert!(engine.take_ledger_dirty());

    // 3. A rally past the profit floor opens a trailing sell
    engine.handle(tick(dec!(101.5))).await.unwrap();
    let sell = engine.trail().active().expect("trailing sell open").clone();
    assert_eq!(sell.side, Side::Sell);
    assert_eq!(sell.qty, dec!(0.01));
    assert_eq!(sell.trigger, dec!(101.297)); // 0.2% below spot

    // 4. Further upside ratchets the trigger behind the price
    engine.handle(tick(dec!(102))).await.unwrap();
    let sell = engine.trail().active().unwrap().clone();
    assert_eq!(sell.trigger, dec!(101.796));

    // 5. The pullback crosses the trigger and the sell fills
    engine.handle(tick(dec!(101.7))).await.unwrap();
    assert!(!engine.trail().is_active());
    assert!(engine.ledger().is_empty());
    assert!(engine.take_ledger_dirty());

    // Exact gateway traffic for the whole cycle
    let calls = &engine.gateway().calls;
    assert!(matches!(
        calls[0],
        GatewayCall::Place { side: Side::Buy, .. }
    ));
    assert!(matches!(calls[1], GatewayCall::ConfirmFill { .. }));
    assert!(matches!(
        calls[2],
        GatewayCall::Place { side: Side::Sell, .. }
    ));
    assert!(matches!(calls[3], GatewayCall::AmendTrigger { .. }));
    assert!(matches!(calls[4], GatewayCall::ConfirmFill { .. }));
    assert_eq!(calls.len(), 5);
}

#[tokio::test]
async fn test_unchanged_ticks_generate_no_traffic() {
    let _ = tracing_subscriber::fmt::try_init();

    let mut engine = Engine::new(
        cycle_config(),
        InstrumentInfo {
            base_coin: "BTC".to_string(),
            quote_coin: "USDT".to_string(),
            base_precision: 4,
            min_order_qty: dec!(0.01),
        },
        KlineWindow::from_history(250, flat_history(30, dec!(100))),
        BuyLedger::new(),
        PaperGateway::new(),
        Box::new(FixedDistance),
        dec!(100),
    );

    for _ in 0..5 {
        engine.handle(tick(dec!(100))).await.unwrap();
    }

    assert!(engine.gateway().calls.is_empty());
    assert!(!engine.take_ledger_dirty());
}
