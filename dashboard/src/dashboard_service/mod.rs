use std::sync::Arc;
use std::time::Duration;

use alloy::primitives::Address;
use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument, warn};

use crate::{
    asset_registry::AssetRegistry,
    blockchain_manager::LendingChain,
    positions_helper::{
        models::{total_borrowed_usd, total_supplied_usd, AccountPosition, TokenBalance},
        PositionReader,
    },
    risk_aggregator::{PortfolioRisk, RiskAggregator},
    session_manager::{SessionEpoch, SessionManager, SessionTransition, WalletBridge},
    transaction_orchestrator::TxNotification,
};

/// The last successfully fetched view of the connected account. Last writer
/// wins: overlapping refreshes both describe the same eventually-consistent
/// chain state.
#[derive(Debug, Clone, Default, Serialize)]
pub struct DashboardState {
    pub positions: Vec<AccountPosition>,
    pub balances: Vec<TokenBalance>,
    pub risk: PortfolioRisk,
    pub refreshed_at: Option<DateTime<Utc>>,
}

/// Read-side refresh coordinator: pulls positions, balances and risk through
/// the chain adapter and maintains the shared [`DashboardState`].
pub struct Dashboard<C> {
    reader: PositionReader<C>,
    risk: RiskAggregator<C>,
    epoch: SessionEpoch,
    state: Arc<RwLock<DashboardState>>,
}

impl<C: LendingChain> Dashboard<C> {
    pub fn new(chain: Arc<C>, registry: Arc<AssetRegistry>, epoch: SessionEpoch) -> Self {
        Self {
            reader: PositionReader::new(chain.clone(), registry),
            risk: RiskAggregator::new(chain),
            epoch,
            state: Arc::new(RwLock::new(DashboardState::default())),
        }
    }

    /// Handle to the shared display state.
    pub fn state(&self) -> Arc<RwLock<DashboardState>> {
        self.state.clone()
    }

    /// Re-fetch all three read paths concurrently and apply the result.
    ///
    /// The session epoch is captured before the reads; a result that
    /// completes after the session changed is dropped instead of
    /// repopulating state for a dead session. A failed risk read degrades to
    /// the no-debt view rather than aborting the refresh.
    pub async fn refresh(&self, account: Address) {
        let started_epoch = self.epoch.current();

        let (positions, balances, risk) = tokio::join!(
            self.reader.fetch_positions(account),
            self.reader.fetch_balances(account),
            self.risk.compute_risk(account),
        );

        if !self.epoch.is_current(started_epoch) {
            debug!("Discarding refresh for a stale session");
            return;
        }

        let risk = match risk {
            Ok(risk) => risk,
            Err(err) => {
                warn!("Failed to fetch account risk: {}", err);
                PortfolioRisk::no_debt()
            }
        };

        let mut state = self.state.write().await;
        state.positions = positions;
        state.balances = balances;
        state.risk = risk;
        state.refreshed_at = Some(Utc::now());
    }

    /// Drop all account-derived state, e.g. after a disconnect.
    pub async fn clear(&self) {
        let mut state = self.state.write().await;
        *state = DashboardState::default();
    }

    /// Log a one-line summary of the current view.
    pub async fn log_status(&self) {
        let state = self.state.read().await;
        let health_factor = if state.risk.health_factor.is_infinite() {
            "∞".to_string()
        } else {
            format!("{:.2}", state.risk.health_factor)
        };

        info!(
            "Supplied: ${:.2} | Borrowed: ${:.2} | Health factor: {} ({}) | Utilization: {:.2}%",
            total_supplied_usd(&state.positions),
            total_borrowed_usd(&state.positions),
            health_factor,
            state.risk.classification(),
            state.risk.utilization(),
        );
    }
}

/// The dashboard's long-running service loop.
///
/// Owns the session and its wallet event feed, refreshes on a fixed interval,
/// and reacts to transaction completions with an immediate refresh.
pub struct DashboardService;

impl DashboardService {
    /// Starts the service loop.
    ///
    /// # Arguments
    /// * `dashboard` - The refresh coordinator
    /// * `session` - The session state machine, moved into the loop
    /// * `tx_events` - Completion notifications from the transaction orchestrator
    /// * `refresh_frequency` - Timer-driven refresh period
    ///
    /// # Returns
    /// * `Result<JoinHandle<Result<()>>>` - A handle to the spawned service task
    #[instrument("DASHBOARD_SERVICE", skip_all)]
    pub async fn start<C, W>(
        dashboard: Arc<Dashboard<C>>,
        mut session: SessionManager<W>,
        mut tx_events: UnboundedReceiver<TxNotification>,
        refresh_frequency: Duration,
    ) -> Result<JoinHandle<Result<()>>>
    where
        C: LendingChain + 'static,
        W: WalletBridge + 'static,
    {
        let handle: JoinHandle<Result<()>> = tokio::spawn(async move {
            info!("Starting dashboard service");

            let mut wallet_events = session.subscribe_events();
            let mut interval = tokio::time::interval(refresh_frequency);

            loop {
                tokio::select! {
                    _ = interval.tick() => {
                        if let Some(account) = session.account() {
                            dashboard.refresh(account).await;
                            dashboard.log_status().await;
                        }
                    }
                    Some(event) = wallet_events.recv() => {
                        match session.handle_event(event).await {
                            SessionTransition::Unchanged => {}
                            SessionTransition::Connected => {
                                if let Some(account) = session.account() {
                                    dashboard.refresh(account).await;
                                }
                            }
                            SessionTransition::Disconnected => {
                                dashboard.clear().await;
                            }
                            SessionTransition::RequiresReload => {
                                dashboard.clear().await;
                                match session.try_reconnect().await {
                                    Ok(Some(reconnected)) => {
                                        dashboard.refresh(reconnected.address).await;
                                    }
                                    Ok(None) => {}
                                    Err(err) => {
                                        warn!("Reload after chain change failed: {}", err);
                                    }
                                }
                            }
                        }
                    }
                    Some(notification) = tx_events.recv() => {
                        info!(
                            "Transaction complete: {} of {}, refreshing",
                            notification.action, notification.symbol
                        );
                        if let Some(account) = session.account() {
                            dashboard.refresh(account).await;
                            dashboard.log_status().await;
                        }
                    }
                }
            }
        });

        Ok(handle)
    }
}

#[cfg(test)]
mod tests {
    use alloy::primitives::U256;

    use super::*;
    use crate::asset_registry::NetworkDescriptor;
    use crate::risk_aggregator::RiskClass;
    use crate::session_manager::WalletEvent;
    use crate::test_support::{usdt_address, MockChain, MockWallet, ACCOUNT};

    const CHAIN_ID: u64 = 11155931;

    fn dashboard(chain: Arc<MockChain>, epoch: SessionEpoch) -> Arc<Dashboard<MockChain>> {
        Arc::new(Dashboard::new(
            chain,
            Arc::new(AssetRegistry::risechain_testnet()),
            epoch,
        ))
    }

    #[tokio::test]
    async fn test_debt_free_account_reads_as_safe() {
        let chain = Arc::new(MockChain::new());
        // 1000 USDT supplied at $1, nothing borrowed anywhere
        chain.set_position(usdt_address(), U256::from(1_000_000_000u64), U256::ZERO);
        chain.set_price(usdt_address(), U256::from(100_000_000u64));
        chain.set_health_factor(U256::MAX);
        chain.set_borrowing_power(U256::from(800u64) * U256::from(10u64).pow(U256::from(18u64)), U256::ZERO);

        let dashboard = dashboard(chain, SessionEpoch::default());
        dashboard.refresh(ACCOUNT).await;

        let state = dashboard.state();
        let state = state.read().await;
        assert_eq!(total_supplied_usd(&state.positions), 1000.0);
        assert_eq!(state.risk.health_factor, f64::INFINITY);
        assert_eq!(state.risk.utilization(), 0.0);
        assert_eq!(state.risk.classification(), RiskClass::Safe);
        assert!(state.refreshed_at.is_some());
    }

    #[tokio::test]
    async fn test_state_snapshot_serializes() {
        let chain = Arc::new(MockChain::new());
        chain.set_position(usdt_address(), U256::from(1_000_000u64), U256::ZERO);
        chain.set_price(usdt_address(), U256::from(100_000_000u64));

        let dashboard = dashboard(chain, SessionEpoch::default());
        dashboard.refresh(ACCOUNT).await;

        let state = dashboard.state();
        let snapshot = serde_json::to_string(&*state.read().await).unwrap();
        assert!(snapshot.contains("\"positions\""));
        assert!(snapshot.contains("\"USDT\""));
    }

    #[tokio::test]
    async fn test_failed_risk_read_degrades_to_no_debt_view() {
        let chain = Arc::new(MockChain::new());
        chain.fail_health_factor();

        let dashboard = dashboard(chain, SessionEpoch::default());
        dashboard.refresh(ACCOUNT).await;

        let state = dashboard.state();
        let state = state.read().await;
        assert_eq!(state.risk.health_factor, f64::INFINITY);
        assert_eq!(state.risk.total_borrows_usd, 0.0);
        assert!(state.refreshed_at.is_some());
    }

    #[tokio::test]
    async fn test_refresh_completing_after_disconnect_is_dropped() {
        let chain = Arc::new(MockChain::new());
        chain.set_position(usdt_address(), U256::from(1_000_000_000u64), U256::ZERO);
        chain.set_price(usdt_address(), U256::from(100_000_000u64));

        let wallet = Arc::new(MockWallet::new(vec![ACCOUNT], CHAIN_ID));
        let mut session =
            SessionManager::new(wallet, NetworkDescriptor::risechain_testnet());
        session.connect().await.unwrap();

        let dashboard = dashboard(chain.clone(), session.epoch_handle());

        // Hold the chain's read gate so the refresh is in flight, then
        // disconnect before letting it complete.
        let gate = chain.read_gate.clone();
        let guard = gate.lock().await;
        let task = {
            let dashboard = dashboard.clone();
            tokio::spawn(async move { dashboard.refresh(ACCOUNT).await })
        };
        tokio::task::yield_now().await;

        session.disconnect();
        drop(guard);
        task.await.unwrap();

        let state = dashboard.state();
        let state = state.read().await;
        assert!(state.positions.is_empty());
        assert!(state.refreshed_at.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_service_refreshes_on_interval_and_clears_on_disconnect() {
        let chain = Arc::new(MockChain::new());
        chain.set_position(usdt_address(), U256::from(2_000_000u64), U256::ZERO);
        chain.set_price(usdt_address(), U256::from(100_000_000u64));

        let wallet = Arc::new(MockWallet::new(vec![ACCOUNT], CHAIN_ID));
        let mut session =
            SessionManager::new(wallet.clone(), NetworkDescriptor::risechain_testnet());
        session.connect().await.unwrap();

        let dashboard = dashboard(chain, session.epoch_handle());
        let (_tx, tx_events) = tokio::sync::mpsc::unbounded_channel();
        let _service = DashboardService::start(
            dashboard.clone(),
            session,
            tx_events,
            Duration::from_secs(15),
        )
        .await
        .unwrap();

        tokio::time::sleep(Duration::from_secs(1)).await;
        {
            let state = dashboard.state();
            let state = state.read().await;
            assert_eq!(state.positions.len(), 3);
        }

        wallet.emit(WalletEvent::AccountsChanged(vec![]));
        tokio::time::sleep(Duration::from_secs(1)).await;
        {
            let state = dashboard.state();
            let state = state.read().await;
            assert!(state.positions.is_empty());
            assert!(state.refreshed_at.is_none());
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_transaction_notification_triggers_refresh() {
        let chain = Arc::new(MockChain::new());

        let wallet = Arc::new(MockWallet::new(vec![ACCOUNT], CHAIN_ID));
        let mut session =
            SessionManager::new(wallet, NetworkDescriptor::risechain_testnet());
        session.connect().await.unwrap();

        let dashboard = dashboard(chain.clone(), session.epoch_handle());
        let (tx, tx_events) = tokio::sync::mpsc::unbounded_channel();
        let _service = DashboardService::start(
            dashboard.clone(),
            session,
            tx_events,
            Duration::from_secs(3600),
        )
        .await
        .unwrap();

        // Let the startup tick pass, then update chain state and notify.
        tokio::time::sleep(Duration::from_secs(1)).await;
        chain.set_position(usdt_address(), U256::from(9_000_000u64), U256::ZERO);
        chain.set_price(usdt_address(), U256::from(100_000_000u64));
        tx.send(TxNotification {
            action: crate::transaction_orchestrator::LendAction::Supply,
            symbol: "USDT".to_string(),
            tx_hash: alloy::primitives::TxHash::ZERO,
        })
        .unwrap();

        tokio::time::sleep(Duration::from_secs(1)).await;
        let state = dashboard.state();
        let state = state.read().await;
        let usdt = state.positions.iter().find(|p| p.symbol == "USDT").unwrap();
        assert_eq!(usdt.supplied_usd, 9.0);
    }
}
