use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use dashboard::{
    asset_registry::{AssetRegistry, ContractRegistry, NetworkDescriptor},
    blockchain_manager::{BlockchainManager, ChainClient},
    config::LocalConfig,
    dashboard_service::{Dashboard, DashboardService},
    session_manager::{wallet::StaticWallet, SessionManager},
    utils,
};
use tracing::{error, info};

/// Main entry point for the RiseLend dashboard
///
/// This function performs the following steps:
/// 1. Initializes the pre-run environment
/// 2. Connects a watch-only wallet session for the configured account
/// 3. Starts the dashboard service loop
/// 4. Reports if the service stops with an error
#[tokio::main(flavor = "multi_thread")]
async fn main() -> Result<()> {
    init_pre_run()?;

    info!("Starting the RiseLend dashboard");

    let network = NetworkDescriptor::risechain_testnet();
    let local_config = LocalConfig::load_from_env(&network)?;

    let registry = Arc::new(AssetRegistry::risechain_testnet());
    let contracts = ContractRegistry::risechain_testnet();

    let provider = BlockchainManager::get_provider(&local_config).await?;
    let chain = Arc::new(ChainClient::new(
        provider,
        &contracts,
        Duration::from_millis(local_config.receipt_poll_interval_ms),
    ));

    let wallet = Arc::new(StaticWallet::new(
        local_config.watch_account,
        network.chain_id,
    ));
    let mut session = SessionManager::new(wallet, network);
    session
        .try_reconnect()
        .await
        .context("Failed to recover the watch session")?;

    let dashboard = Arc::new(Dashboard::new(
        chain,
        registry,
        session.epoch_handle(),
    ));

    // No wallet UI drives writes in watch-only mode; the completion channel
    // stays open but idle.
    let (_tx_notifications, tx_events) = tokio::sync::mpsc::unbounded_channel();

    let service = DashboardService::start(
        dashboard,
        session,
        tx_events,
        Duration::from_secs(local_config.refresh_frequency),
    )
    .await?;

    match service.await? {
        Ok(()) => info!("Dashboard service stopped"),
        Err(e) => {
            let error_message = e
                .chain()
                .map(|e| e.to_string())
                .collect::<Vec<String>>()
                .join(" -> ");
            error!("Dashboard service failed with error: {}", error_message);
            return Err(anyhow::anyhow!(
                "Dashboard service failed: {}",
                error_message
            ));
        }
    }

    Ok(())
}

/// Initializes the pre-run environment
///
/// This function performs the following steps:
/// 1. Loads environment variables from the `.env` file
/// 2. Sets up the logger
///
/// # Returns
/// * `Result<()>` - Success or error if any step fails
fn init_pre_run() -> Result<()> {
    dotenvy::dotenv().ok();
    utils::logger::setup_logger().context("Failed to setup logger")?;

    Ok(())
}
