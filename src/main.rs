//! depthsync - live Binance futures order book in the terminal
//!
//! Discovers the symbol's fixed-point scales, wires the WebSocket depth feed
//! and the REST snapshot source into the synchronizer, and repaints the
//! terminal on every book update until Ctrl-C.

use std::time::Duration;

use tracing::{info, Level};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use depthsync::config::Config;
use depthsync::render::Renderer;
use depthsync::scales::fetch_symbol_scales;
use depthsync::snapshot::BinanceSnapshotSource;
use depthsync::sync::Synchronizer;
use depthsync::websocket::BinanceLiveFeed;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // The book repaints stdout, so logs go to stderr.
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::from_default_env().add_directive(Level::INFO.into()))
        .init();

    let mut config = Config::load()?;
    if let Some(symbol) = std::env::args().nth(1) {
        config.symbol = symbol.trim().to_uppercase();
    }
    info!(symbol = %config.symbol, speed = %config.depth_speed, "starting depthsync");

    let client = reqwest::Client::new();
    let scales = fetch_symbol_scales(&client, &config.rest_endpoint, &config.symbol).await?;

    let feed = BinanceLiveFeed::new(
        &config.ws_endpoint,
        &config.depth_speed,
        Duration::from_secs(config.idle_timeout_secs),
    );
    let snapshots = BinanceSnapshotSource::new(
        client,
        &config.rest_endpoint,
        &config.symbol,
        config.depth_limit,
        scales,
    );

    let mut sync = Synchronizer::new(Box::new(feed), Box::new(snapshots), scales);
    let renderer = Renderer::new(&config.symbol, config.render_levels);
    sync.set_on_book_updated(move |book, scales, stats| renderer.render(book, scales, stats));

    let handle = sync.handle();
    handle.start(&config.symbol);
    let sync_task = tokio::spawn(sync.run());

    tokio::signal::ctrl_c().await?;
    info!("shutting down");
    handle.shutdown();
    let _ = sync_task.await;

    Ok(())
}
