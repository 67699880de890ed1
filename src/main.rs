//! Operator Console - interactive control of a single on-chain contract
//!
//! Submits activate, deactivate and withdraw transactions behind an explicit
//! cost preview and confirmation, shows balances and market prices.

use anyhow::Result;
use tokio::signal;
use tracing::{info, warn};

mod chain;
mod config;
mod error;
mod feed;
mod session;
mod strategy;
mod tx;

use chain::{ContractInterface, ContractReference, EthersChainClient};
use config::{Secrets, Settings};
use feed::CoinGeckoFeed;
use session::{Session, SessionContext, StdConsole};
use tx::{FeeEstimator, TransactionWorkflow};

#[tokio::main]
async fn main() -> Result<()> {
    // A missing .env file is fine
    let _ = dotenvy::dotenv();

    // Initialize logging
    init_logging();

    info!("Starting Operator Console v{}", env!("CARGO_PKG_VERSION"));

    // Load configuration and secrets
    let settings = Settings::load()?;
    let secrets = Secrets::from_env()?;

    // Load the contract interface
    let interface = ContractInterface::load(&settings.contract.interface_path)?;
    interface.check_operations(&settings.contract.operations)?;
    info!(
        "Loaded interface from {:?}: {} operations, {} bytes of bytecode",
        settings.contract.interface_path,
        interface.operations().len(),
        interface.bytecode.len()
    );
    let contract = ContractReference::new(secrets.contract_address, interface);

    // Connect to the node
    let client =
        EthersChainClient::connect(settings.node.clone(), secrets.wallet, contract).await?;

    let feed = CoinGeckoFeed::new(&settings.price_feed)?;

    let ctx = SessionContext::new(Box::new(client), settings.contract.operations.clone());
    let workflow = TransactionWorkflow::new(FeeEstimator::new(settings.gas.clone()));
    let mut session = Session::new(
        ctx,
        workflow,
        Box::new(feed),
        settings.price_feed.vs_currency.clone(),
        StdConsole::stdio(),
    );

    tokio::select! {
        result = session.run() => result?,
        _ = shutdown_signal() => info!("Shutdown signal received"),
    }

    info!("Operator Console stopped");
    Ok(())
}

fn init_logging() {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("warn,operator_console=info"));

    // stdout belongs to the menu
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(true).with_writer(std::io::stderr))
        .init();
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                warn!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
