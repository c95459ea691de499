use std::sync::Mutex;

use alloy::primitives::Address;
use async_trait::async_trait;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};

use crate::{asset_registry::NetworkDescriptor, errors::DashboardError};

use super::{WalletBridge, WalletEvent};

/// Watch-only wallet bridge serving one fixed, pre-authorized account on a
/// fixed chain.
///
/// Used by the headless dashboard binary to monitor an address without any
/// wallet UI. It never prompts, never switches networks and never emits
/// events.
pub struct StaticWallet {
    account: Address,
    chain_id: u64,
    events_tx: UnboundedSender<WalletEvent>,
    events_rx: Mutex<Option<UnboundedReceiver<WalletEvent>>>,
}

impl StaticWallet {
    pub fn new(account: Address, chain_id: u64) -> Self {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        Self {
            account,
            chain_id,
            events_tx,
            events_rx: Mutex::new(Some(events_rx)),
        }
    }

    /// Sender half of the event feed, for embedding callers that need to
    /// inject wallet events.
    pub fn event_sender(&self) -> UnboundedSender<WalletEvent> {
        self.events_tx.clone()
    }
}

#[async_trait]
impl WalletBridge for StaticWallet {
    async fn request_accounts(&self) -> Result<Vec<Address>, DashboardError> {
        Ok(vec![self.account])
    }

    async fn authorized_accounts(&self) -> Result<Vec<Address>, DashboardError> {
        Ok(vec![self.account])
    }

    async fn chain_id(&self) -> Result<u64, DashboardError> {
        Ok(self.chain_id)
    }

    async fn switch_network(&self, chain_id: u64) -> Result<(), DashboardError> {
        if chain_id == self.chain_id {
            Ok(())
        } else {
            Err(DashboardError::UnknownNetwork(chain_id))
        }
    }

    async fn add_network(&self, network: &NetworkDescriptor) -> Result<(), DashboardError> {
        Err(DashboardError::WalletRequest(format!(
            "watch-only wallet cannot add network {}",
            network.chain_id
        )))
    }

    fn subscribe(&self) -> UnboundedReceiver<WalletEvent> {
        let receiver = self.events_rx.lock().ok().and_then(|mut slot| slot.take());
        receiver.unwrap_or_else(|| {
            // Subscribed twice: hand out a closed feed instead of panicking.
            let (sender, receiver) = mpsc::unbounded_channel();
            drop(sender);
            receiver
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::ACCOUNT;

    #[tokio::test]
    async fn test_static_wallet_serves_fixed_account() {
        let wallet = StaticWallet::new(ACCOUNT, 11155931);
        assert_eq!(wallet.request_accounts().await.unwrap(), vec![ACCOUNT]);
        assert_eq!(wallet.authorized_accounts().await.unwrap(), vec![ACCOUNT]);
        assert_eq!(wallet.chain_id().await.unwrap(), 11155931);
    }

    #[tokio::test]
    async fn test_injected_events_reach_the_subscriber() {
        let wallet = StaticWallet::new(ACCOUNT, 11155931);
        let mut events = wallet.subscribe();

        wallet
            .event_sender()
            .send(WalletEvent::ChainChanged(1))
            .unwrap();

        match events.recv().await {
            Some(WalletEvent::ChainChanged(chain_id)) => assert_eq!(chain_id, 1),
            other => panic!("unexpected event: {:?}", other),
        }
    }
}
