pub mod wallet;

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use alloy::primitives::Address;
use async_trait::async_trait;
use tokio::sync::mpsc::UnboundedReceiver;
use tracing::info;

use crate::{asset_registry::NetworkDescriptor, errors::DashboardError};

/// Events pushed by the wallet provider.
#[derive(Debug, Clone)]
pub enum WalletEvent {
    /// The authorized account list changed. Empty means the user revoked
    /// access.
    AccountsChanged(Vec<Address>),
    /// The wallet moved to another chain. Terminal for the session.
    ChainChanged(u64),
}

/// The injected-wallet boundary.
///
/// Everything the session layer needs from a wallet: account authorization
/// (prompting and silent), the active chain, network switching, and the
/// event feed. The production bridge wraps an external wallet; tests script
/// their own.
#[async_trait]
pub trait WalletBridge: Send + Sync {
    /// Request account access, prompting the user if needed.
    async fn request_accounts(&self) -> Result<Vec<Address>, DashboardError>;

    /// Return the already-authorized accounts without prompting. Empty when
    /// nothing was previously authorized.
    async fn authorized_accounts(&self) -> Result<Vec<Address>, DashboardError>;

    async fn chain_id(&self) -> Result<u64, DashboardError>;

    /// Ask the wallet to switch to the given chain. Fails with
    /// [`DashboardError::UnknownNetwork`] when the wallet has never seen it.
    async fn switch_network(&self, chain_id: u64) -> Result<(), DashboardError>;

    /// Register a network with the wallet so it can be switched to.
    async fn add_network(&self, network: &NetworkDescriptor) -> Result<(), DashboardError>;

    /// The wallet's event feed. Owned exclusively by the session's service
    /// loop; dropping the receiver releases the subscription.
    fn subscribe(&self) -> UnboundedReceiver<WalletEvent>;
}

/// An authorized wallet session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WalletSession {
    pub address: Address,
    pub chain_id: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Disconnected,
    Connecting,
    Connected(WalletSession),
}

/// What a wallet event did to the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionTransition {
    Unchanged,
    Connected,
    Disconnected,
    /// The chain changed underneath the session; all dependent state must be
    /// rebuilt from scratch.
    RequiresReload,
}

/// Monotone session generation counter, cloneable into fetch tasks.
///
/// Every connect, disconnect or chain reset bumps the epoch. A fetch captures
/// the epoch before its first read and its result is only applied when the
/// epoch is unchanged on completion, so in-flight reads for a dead session
/// are dropped instead of repopulating state.
#[derive(Debug, Clone, Default)]
pub struct SessionEpoch(Arc<AtomicU64>);

impl SessionEpoch {
    pub fn current(&self) -> u64 {
        self.0.load(Ordering::SeqCst)
    }

    pub fn is_current(&self, epoch: u64) -> bool {
        self.current() == epoch
    }

    fn bump(&self) {
        self.0.fetch_add(1, Ordering::SeqCst);
    }
}

/// Session state machine: `Disconnected → Connecting → Connected`, driven by
/// explicit connect/disconnect calls and by wallet events.
pub struct SessionManager<W> {
    wallet: Arc<W>,
    network: NetworkDescriptor,
    state: SessionState,
    epoch: SessionEpoch,
}

impl<W: WalletBridge> SessionManager<W> {
    pub fn new(wallet: Arc<W>, network: NetworkDescriptor) -> Self {
        Self {
            wallet,
            network,
            state: SessionState::Disconnected,
            epoch: SessionEpoch::default(),
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn session(&self) -> Option<WalletSession> {
        match self.state {
            SessionState::Connected(session) => Some(session),
            _ => None,
        }
    }

    pub fn account(&self) -> Option<Address> {
        self.session().map(|session| session.address)
    }

    /// The connected account, or [`DashboardError::NotConnected`] for callers
    /// that need a session before acting (e.g. the transaction orchestrator).
    pub fn require_account(&self) -> Result<Address, DashboardError> {
        self.account().ok_or(DashboardError::NotConnected)
    }

    pub fn epoch_handle(&self) -> SessionEpoch {
        self.epoch.clone()
    }

    /// Subscribe to the wallet's event feed; called once by the owning
    /// service loop.
    pub fn subscribe_events(&self) -> UnboundedReceiver<WalletEvent> {
        self.wallet.subscribe()
    }

    /// Connect by prompting the wallet for account access.
    ///
    /// Fails with [`DashboardError::NetworkMismatch`] when the wallet sits on
    /// another chain; run [`Self::ensure_network`] first to recover.
    pub async fn connect(&mut self) -> Result<WalletSession, DashboardError> {
        self.state = SessionState::Connecting;

        let accounts = match self.wallet.request_accounts().await {
            Ok(accounts) => accounts,
            Err(err) => {
                self.state = SessionState::Disconnected;
                return Err(err);
            }
        };
        let Some(address) = accounts.first().copied() else {
            self.state = SessionState::Disconnected;
            return Err(DashboardError::WalletRequest(
                "no accounts authorized".to_string(),
            ));
        };

        self.finish_connect(address).await
    }

    /// Silently recover an already-authorized session at startup. Returns
    /// `Ok(None)` without prompting or erroring when nothing was authorized.
    pub async fn try_reconnect(&mut self) -> Result<Option<WalletSession>, DashboardError> {
        let accounts = self.wallet.authorized_accounts().await?;
        let Some(address) = accounts.first().copied() else {
            self.state = SessionState::Disconnected;
            return Ok(None);
        };

        self.state = SessionState::Connecting;
        self.finish_connect(address).await.map(Some)
    }

    async fn finish_connect(&mut self, address: Address) -> Result<WalletSession, DashboardError> {
        let chain_id = match self.wallet.chain_id().await {
            Ok(chain_id) => chain_id,
            Err(err) => {
                self.state = SessionState::Disconnected;
                return Err(err);
            }
        };
        if chain_id != self.network.chain_id {
            self.state = SessionState::Disconnected;
            return Err(DashboardError::NetworkMismatch {
                expected: self.network.chain_id,
                actual: chain_id,
            });
        }

        let session = WalletSession { address, chain_id };
        self.epoch.bump();
        self.state = SessionState::Connected(session);
        info!("Wallet connected: {} on chain {}", address, chain_id);

        Ok(session)
    }

    /// Bring the wallet onto the configured network, registering it first
    /// when the wallet does not know the chain.
    pub async fn ensure_network(&self) -> Result<(), DashboardError> {
        let actual = self.wallet.chain_id().await?;
        if actual == self.network.chain_id {
            return Ok(());
        }

        match self.wallet.switch_network(self.network.chain_id).await {
            Ok(()) => Ok(()),
            Err(DashboardError::UnknownNetwork(_)) => {
                self.wallet.add_network(&self.network).await?;
                self.wallet.switch_network(self.network.chain_id).await
            }
            Err(err) => Err(err),
        }
    }

    /// Explicit teardown.
    pub fn disconnect(&mut self) {
        if self.state != SessionState::Disconnected {
            info!("Wallet disconnected");
        }
        self.state = SessionState::Disconnected;
        self.epoch.bump();
    }

    /// Apply a wallet event to the session.
    pub async fn handle_event(&mut self, event: WalletEvent) -> SessionTransition {
        match event {
            WalletEvent::AccountsChanged(accounts) => match accounts.first().copied() {
                None => {
                    self.disconnect();
                    SessionTransition::Disconnected
                }
                Some(address) => {
                    if self.account() == Some(address) {
                        return SessionTransition::Unchanged;
                    }
                    info!("Wallet accounts changed, reconnecting as {}", address);
                    match self.finish_connect(address).await {
                        Ok(_) => SessionTransition::Connected,
                        Err(err) => {
                            tracing::warn!("Reconnect with new account failed: {}", err);
                            self.disconnect();
                            SessionTransition::Disconnected
                        }
                    }
                }
            },
            WalletEvent::ChainChanged(chain_id) => {
                info!(
                    "Wallet chain changed to {}, resetting session state",
                    chain_id
                );
                self.disconnect();
                SessionTransition::RequiresReload
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{MockWallet, ACCOUNT, OTHER_ACCOUNT};

    const CHAIN_ID: u64 = 11155931;

    fn manager(wallet: Arc<MockWallet>) -> SessionManager<MockWallet> {
        SessionManager::new(wallet, NetworkDescriptor::risechain_testnet())
    }

    #[tokio::test]
    async fn test_connect_bumps_epoch_and_stores_session() {
        let wallet = Arc::new(MockWallet::new(vec![ACCOUNT], CHAIN_ID));
        let mut session = manager(wallet);
        let before = session.epoch_handle().current();

        let connected = session.connect().await.unwrap();

        assert_eq!(connected.address, ACCOUNT);
        assert_eq!(session.account(), Some(ACCOUNT));
        assert!(session.epoch_handle().current() > before);
    }

    #[tokio::test]
    async fn test_connect_rejects_wrong_chain() {
        let wallet = Arc::new(MockWallet::new(vec![ACCOUNT], 1));
        let mut session = manager(wallet);

        let err = session.connect().await.unwrap_err();

        assert!(matches!(
            err,
            DashboardError::NetworkMismatch {
                expected: CHAIN_ID,
                actual: 1
            }
        ));
        assert_eq!(session.state(), SessionState::Disconnected);
    }

    #[tokio::test]
    async fn test_require_account_needs_a_connected_session() {
        let wallet = Arc::new(MockWallet::new(vec![ACCOUNT], CHAIN_ID));
        let mut session = manager(wallet);

        assert!(matches!(
            session.require_account(),
            Err(DashboardError::NotConnected)
        ));

        session.connect().await.unwrap();
        assert_eq!(session.require_account().unwrap(), ACCOUNT);
    }

    #[tokio::test]
    async fn test_try_reconnect_is_silent_without_authorization() {
        let wallet = Arc::new(MockWallet::new(vec![], CHAIN_ID));
        let mut session = manager(wallet.clone());

        let result = session.try_reconnect().await.unwrap();

        assert!(result.is_none());
        assert_eq!(session.state(), SessionState::Disconnected);
        assert_eq!(wallet.prompt_count(), 0);
    }

    #[tokio::test]
    async fn test_try_reconnect_recovers_authorized_session() {
        let wallet = Arc::new(MockWallet::new(vec![ACCOUNT], CHAIN_ID));
        wallet.authorize(ACCOUNT);
        let mut session = manager(wallet.clone());

        let result = session.try_reconnect().await.unwrap();

        assert_eq!(result.unwrap().address, ACCOUNT);
        assert_eq!(wallet.prompt_count(), 0);
    }

    #[tokio::test]
    async fn test_ensure_network_switches_known_chain() {
        let wallet = Arc::new(MockWallet::new(vec![ACCOUNT], 1));
        wallet.learn_chain(CHAIN_ID);
        let session = manager(wallet.clone());

        session.ensure_network().await.unwrap();

        assert_eq!(wallet.switched_to(), vec![CHAIN_ID]);
        assert!(wallet.added_chains().is_empty());
    }

    #[tokio::test]
    async fn test_ensure_network_adds_unknown_chain_then_switches() {
        let wallet = Arc::new(MockWallet::new(vec![ACCOUNT], 1));
        let session = manager(wallet.clone());

        session.ensure_network().await.unwrap();

        assert_eq!(wallet.added_chains(), vec![CHAIN_ID]);
        assert_eq!(wallet.switched_to(), vec![CHAIN_ID, CHAIN_ID]);
    }

    #[tokio::test]
    async fn test_empty_account_list_disconnects() {
        let wallet = Arc::new(MockWallet::new(vec![ACCOUNT], CHAIN_ID));
        let mut session = manager(wallet);
        session.connect().await.unwrap();
        let epoch_before = session.epoch_handle().current();

        let transition = session.handle_event(WalletEvent::AccountsChanged(vec![])).await;

        assert_eq!(transition, SessionTransition::Disconnected);
        assert_eq!(session.state(), SessionState::Disconnected);
        assert!(session.epoch_handle().current() > epoch_before);
    }

    #[tokio::test]
    async fn test_new_account_reconnects() {
        let wallet = Arc::new(MockWallet::new(vec![ACCOUNT], CHAIN_ID));
        let mut session = manager(wallet);
        session.connect().await.unwrap();

        let transition = session
            .handle_event(WalletEvent::AccountsChanged(vec![OTHER_ACCOUNT]))
            .await;

        assert_eq!(transition, SessionTransition::Connected);
        assert_eq!(session.account(), Some(OTHER_ACCOUNT));
    }

    #[tokio::test]
    async fn test_same_account_is_a_no_op() {
        let wallet = Arc::new(MockWallet::new(vec![ACCOUNT], CHAIN_ID));
        let mut session = manager(wallet);
        session.connect().await.unwrap();
        let epoch_before = session.epoch_handle().current();

        let transition = session
            .handle_event(WalletEvent::AccountsChanged(vec![ACCOUNT]))
            .await;

        assert_eq!(transition, SessionTransition::Unchanged);
        assert_eq!(session.epoch_handle().current(), epoch_before);
    }

    #[tokio::test]
    async fn test_chain_change_forces_full_reset() {
        let wallet = Arc::new(MockWallet::new(vec![ACCOUNT], CHAIN_ID));
        let mut session = manager(wallet);
        session.connect().await.unwrap();
        let epoch_before = session.epoch_handle().current();

        let transition = session.handle_event(WalletEvent::ChainChanged(1)).await;

        assert_eq!(transition, SessionTransition::RequiresReload);
        assert_eq!(session.state(), SessionState::Disconnected);
        assert!(session.epoch_handle().current() > epoch_before);
    }
}
