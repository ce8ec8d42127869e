use clap::Parser;
use rust_decimal::Decimal;
use tokio::sync::{broadcast, mpsc};

use trailbot::api::BybitClient;
use trailbot::engine::Engine;
use trailbot::feed::{MarketStream, StreamConfig};
use trailbot::market::KlineWindow;
use trailbot::orders::{BuyLedger, PaperGateway};
use trailbot::persistence::BuyStore;
use trailbot::trailing::{FixedDistance, VolatilityWiggle, WiggleStrategy};
use trailbot::{Config, Result};

/// Trailing spot-trading bot for a single symbol.
#[derive(Parser, Debug)]
#[command(name = "trailbot", version, about)]
struct Args {
    /// Trading symbol, overrides TRAILBOT_SYMBOL
    #[arg(long)]
    symbol: Option<String>,

    /// Kline interval in minutes, overrides TRAILBOT_INTERVAL
    #[arg(long)]
    interval: Option<u32>,

    /// Kline window capacity, overrides TRAILBOT_LIMIT
    #[arg(long)]
    limit: Option<usize>,

    /// Redis URL, overrides REDIS_URL; persistence is skipped without one
    #[arg(long)]
    redis_url: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    setup_logging();

    let args = Args::parse();
    let mut config = Config::from_env();
    if let Some(symbol) = args.symbol {
        config.symbol = symbol;
    }
    if let Some(interval) = args.interval {
        config.interval = interval;
    }
    if let Some(limit) = args.limit {
        config.limit = limit;
    }

    tracing::info!("🚀 Trailbot starting for {}", config.symbol);

    // Preload: instrument limits, kline history, current spot
    let client = BybitClient::new();

    let mut info = client.get_instrument_info(&config.symbol).await?;
    info.min_order_qty *= config.multiplier;
    tracing::info!(
        "instrument {}: {}/{}, precision {}, buy quantity {}",
        config.symbol,
        info.base_coin,
        info.quote_coin,
        info.base_precision,
        info.min_order_qty
    );

    let history = client
        .get_klines(&config.symbol, config.interval, config.limit)
        .await?;
    let window = KlineWindow::from_history(config.limit, history);
    tracing::info!("preloaded {} klines", window.len());

    let spot = client.get_ticker(&config.symbol).await?.last_price;
    tracing::info!("spot price {} {}", spot, info.quote_coin);

    // Resume the buy ledger from Redis when available
    let mut store = connect_to_redis(args.redis_url, &config.symbol).await;
    let ledger = match store.as_mut() {
        Some(store) => match store.load_lots().await {
            Ok(lots) => BuyLedger::from_lots(lots),
            Err(e) => {
                tracing::warn!("failed to load ledger ({e}), starting empty");
                BuyLedger::new()
            }
        },
        None => BuyLedger::new(),
    };
    tracing::info!("resuming with {} open lots", ledger.len());

    let wiggle: Box<dyn WiggleStrategy> = if config.wiggle_enabled {
        Box::new(VolatilityWiggle {
            sensitivity: Decimal::new(25, 2),
            ceiling_pct: config.distance_pct * Decimal::from(5),
        })
    } else {
        Box::new(FixedDistance)
    };

    let mut engine = Engine::new(
        config.clone(),
        info,
        window,
        ledger,
        PaperGateway::new(),
        wiggle,
        spot,
    );

    // Feed task: one channel in, one dispatcher out
    let (event_tx, mut event_rx) = mpsc::channel(256);
    let (shutdown_tx, _) = broadcast::channel(1);

    let stream = MarketStream::new(
        StreamConfig {
            symbol: config.symbol.clone(),
            interval: config.interval,
            subscribe_klines: config.kline_stream,
            subscribe_orderbook: config.orderbook_stream,
            ..Default::default()
        },
        event_tx,
    );
    let stream_task = {
        let shutdown = shutdown_tx.subscribe();
        tokio::spawn(async move { stream.run(shutdown).await })
    };

    tracing::info!("✅ Feed running, press Ctrl+C to stop");

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("⚠️  Received Ctrl+C, shutting down...");
                break;
            }
            event = event_rx.recv() => {
                let Some(event) = event else {
                    tracing::error!("feed channel closed, stopping");
                    break;
                };

                // Handler errors stay inside the event: log and move on
                let kind = event.kind();
                if let Err(e) = engine.handle(event).await {
                    tracing::warn!("{kind} handler error: {e}");
                }

                if engine.take_ledger_dirty() {
                    if let Some(store) = store.as_mut() {
                        if let Err(e) = store.save_ledger(engine.ledger()).await {
                            tracing::warn!("failed to persist ledger: {e}");
                        }
                    }
                }
            }
        }
    }

    let _ = shutdown_tx.send(());
    let _ = stream_task.await;

    tracing::info!("👋 Trailbot stopped");
    Ok(())
}

fn setup_logging() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "trailbot=info".into()),
        )
        .init();
}

async fn connect_to_redis(redis_url: Option<String>, symbol: &str) -> Option<BuyStore> {
    let url = redis_url
        .or_else(|| std::env::var("REDIS_URL").ok())
        .unwrap_or_else(|| "redis://127.0.0.1:6379".to_string());

    match BuyStore::new(&url, symbol).await {
        Ok(store) => Some(store),
        Err(e) => {
            tracing::warn!("Failed to connect to Redis ({e}), continuing without persistence");
            None
        }
    }
}
