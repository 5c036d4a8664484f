//! Crypto-arena matching engine demo binary
//!
//! Drives the matching core end to end:
//! - Registry-backed instrument and account validation
//! - HMAC-signed submissions
//! - Price-time matching with partial fills and market orders
//! - Cancel routing and the append-only execution journal

use anyhow::Result;
use arena_common::{AccountId, OrderId, Px, Qty, Symbol};
use arena_engine::auth::HmacVerifier;
use arena_engine::error::EngineError;
use arena_engine::order::{OrderRequest, PriceType, Side};
use arena_engine::registry::{AccountRef, InMemoryRegistry, InstrumentSpec};
use arena_engine::{EngineConfig, MatchingEngine};
use clap::{Parser, Subcommand};
use std::sync::Arc;
use tracing::{info, warn};

/// Crypto-arena matching engine CLI
#[derive(Parser)]
#[clap(name = "arena-engine")]
#[clap(about = "Per-instrument price-time matching core")]
struct Cli {
    #[clap(subcommand)]
    command: Option<Commands>,

    /// Enable debug output
    #[clap(long, global = true)]
    debug: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a scripted session against two instruments
    Demo {
        /// Depth levels to display
        #[clap(long, default_value = "5")]
        levels: usize,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let directive = if cli.debug {
        "arena_engine=debug"
    } else {
        "arena_engine=info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(directive.parse()?),
        )
        .with_target(false)
        .init();

    match cli.command {
        Some(Commands::Demo { levels }) => run_demo(levels),
        None => run_demo(5),
    }
}

fn run_demo(levels: usize) -> Result<()> {
    info!("🚀 Starting matching engine demo");

    let btc = Symbol::new(1);
    let eth = Symbol::new(2);
    let maker = AccountId::new(1);
    let taker = AccountId::new(2);

    let registry = InMemoryRegistry::new();
    registry.register_instrument(InstrumentSpec::new(btc, "BTC-USDT"));
    registry.register_instrument(InstrumentSpec::new(eth, "ETH-USDT"));
    registry.register_account(AccountRef::new(maker));
    registry.register_account(AccountRef::new(taker));

    let verifier = Arc::new(HmacVerifier::new());
    verifier.register_secret(maker, b"maker-demo-secret");
    verifier.register_secret(taker, b"taker-demo-secret");

    let engine = MatchingEngine::new(
        EngineConfig {
            depth_levels: levels,
            ..EngineConfig::default()
        },
        Arc::new(registry),
        verifier.clone(),
    );

    // Maker offers 10 BTC-USDT at 100, order rests
    let receipt = engine.submit(signed(
        &verifier,
        request(1, maker, btc, Side::Sell, Some(100), 10),
    )?)?;
    info!(
        arrival_seq = receipt.arrival_seq,
        status = ?receipt.status,
        "maker offer resting"
    );

    // Taker lifts 4 of them, maker keeps its queue position with 6 left
    let receipt = engine.submit(signed(
        &verifier,
        request(2, taker, btc, Side::Buy, Some(100), 4),
    )?)?;
    for trade in &receipt.trades {
        info!(
            trade_id = %trade.trade_id,
            price = %trade.price,
            quantity = %trade.quantity,
            maker = %trade.maker_order_id,
            taker = %trade.taker_order_id,
            "trade executed"
        );
    }

    // Bid rests on the empty ETH book
    engine.submit(signed(
        &verifier,
        request(3, maker, eth, Side::Buy, Some(101), 5),
    )?)?;

    // Market sell sweeps the bid; the unfilled remainder is cancelled
    let receipt = engine.submit(signed(
        &verifier,
        request(4, taker, eth, Side::Sell, None, 8),
    )?)?;
    info!(
        status = ?receipt.status,
        trades = receipt.trades.len(),
        "market sell against thin book"
    );

    // Market order against an empty book is rejected outright
    match engine.submit(signed(
        &verifier,
        request(5, taker, eth, Side::Sell, None, 2),
    )?) {
        Err(EngineError::Rejected { order_id, reason }) => {
            warn!(%order_id, %reason, "submission rejected");
        }
        other => {
            warn!(?other, "expected a no-liquidity rejection");
        }
    }

    // First cancel removes the resting remainder, the second finds nothing
    info!(cancelled = engine.cancel(OrderId::new(1))?, "cancel resting offer");
    info!(cancelled = engine.cancel(OrderId::new(1))?, "cancel it again");

    for symbol in engine.symbols() {
        let Some(depth) = engine.depth(symbol) else {
            continue;
        };
        info!("📊 {symbol} depth");
        for level in &depth.bids {
            info!("  bid {} x {}", level.price, level.quantity);
        }
        for level in &depth.asks {
            info!("  ask {} x {}", level.price, level.quantity);
        }
    }

    info!("journal replay:");
    for event in engine.journal().events_from(1) {
        println!("{}", serde_json::to_string(&event)?);
    }

    let metrics = engine.metrics();
    info!(
        accepted = metrics.orders_accepted,
        rejected = metrics.orders_rejected,
        trades = metrics.trades_executed,
        cancels_honored = metrics.cancels_honored,
        cancels_missed = metrics.cancels_missed,
        volume = metrics.total_volume,
        "✅ demo complete"
    );

    Ok(())
}

fn request(
    id: u64,
    account: AccountId,
    symbol: Symbol,
    side: Side,
    price: Option<i64>,
    qty: i64,
) -> OrderRequest {
    OrderRequest {
        order_id: OrderId::new(id),
        account,
        symbol,
        side,
        price_type: if price.is_some() {
            PriceType::Limit
        } else {
            PriceType::Market
        },
        price: price.map(Px::from_units),
        quantity: Qty::from_units(qty),
        signature: String::new(),
    }
}

fn signed(verifier: &HmacVerifier, mut request: OrderRequest) -> Result<OrderRequest> {
    request.signature = verifier
        .sign(&request)
        .ok_or_else(|| anyhow::anyhow!("no signing secret for {}", request.account))?;
    Ok(request)
}
