use std::{io, sync::Arc};

use clap::Parser;
use cli::Cli;
use fleet_supervisor::{broker::fake::FakeBroker, reconciler, InMemoryModelStore};
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{info, level_filters::LevelFilter};
use tracing_subscriber::{prelude::*, EnvFilter};

mod cli;

fn make_env_filter(level: LevelFilter) -> EnvFilter {
    EnvFilter::builder()
        .with_env_var("FLEET_LOG")
        .with_default_directive(level.into())
        .from_env_lossy()
}

#[tokio::main]
async fn main() {
    let filter_level = if cfg!(debug_assertions) {
        LevelFilter::DEBUG
    } else {
        LevelFilter::INFO
    };

    let (stdout, _guard) = tracing_appender::non_blocking(io::stdout());
    let output = tracing_subscriber::fmt::layer().with_writer(stdout);
    let output = if cfg!(debug_assertions) {
        output.with_file(true).with_line_number(true)
    } else {
        output
    };

    tracing_subscriber::registry()
        .with(make_env_filter(filter_level))
        .with(output)
        .try_init()
        .unwrap();

    let cli = Cli::parse();
    let config = cli.config();

    info!(bind = %cli.bind_addr, port = cli.port, "starting fleet-supervisor in standalone mode");

    // Standalone/demo mode: no real model store or broker transport is
    // wired in yet, so this crate's own in-memory reference
    // implementations stand in. A production deployment replaces both
    // with adapters over its own database and broker client.
    let model: Arc<dyn fleet_supervisor::ModelStore> = Arc::new(InMemoryModelStore::new());
    let broker: Arc<dyn fleet_supervisor::BrokerPool> = Arc::new(FakeBroker::new());

    let cancel = CancellationToken::new();
    let (_handle, joins) = reconciler::spawn(&config, model, broker, cancel.clone());

    let _ = signal::ctrl_c().await;
    info!("shutdown signal received");

    cancel.cancel();
    for join in joins {
        let _ = join.await;
    }
}
