use std::fmt;
use std::sync::Arc;

use alloy::primitives::{Address, TxHash, U256};
use serde::Serialize;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tracing::{info, warn};

use crate::{
    asset_registry::{Asset, AssetRegistry},
    blockchain_manager::LendingChain,
    errors::DashboardError,
    utils::math_helper,
};

/// A user-initiated pool action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum LendAction {
    Supply,
    Withdraw,
    Borrow,
    Repay,
}

impl LendAction {
    /// Supply and repay move tokens into the protocol and need an ERC20
    /// allowance first; withdraw and borrow move tokens out.
    pub fn requires_allowance(&self) -> bool {
        matches!(self, LendAction::Supply | LendAction::Repay)
    }
}

impl fmt::Display for LendAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LendAction::Supply => write!(f, "supply"),
            LendAction::Withdraw => write!(f, "withdraw"),
            LendAction::Borrow => write!(f, "borrow"),
            LendAction::Repay => write!(f, "repay"),
        }
    }
}

/// Lifecycle of one orchestrated action. Lives only for the duration of a
/// single [`TransactionOrchestrator::execute`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum TxStatus {
    Drafted,
    Approving,
    Submitted,
    Confirmed,
    Failed,
}

#[derive(Debug, Clone)]
pub struct PendingTransaction {
    pub action: LendAction,
    pub symbol: String,
    pub amount_raw: U256,
    pub status: TxStatus,
    pub tx_hash: Option<TxHash>,
}

impl PendingTransaction {
    fn draft(action: LendAction, asset: &Asset, amount_raw: U256) -> Self {
        Self {
            action,
            symbol: asset.symbol.clone(),
            amount_raw,
            status: TxStatus::Drafted,
            tx_hash: None,
        }
    }
}

/// Emitted once per fully confirmed action so read-side components re-fetch.
#[derive(Debug, Clone)]
pub struct TxNotification {
    pub action: LendAction,
    pub symbol: String,
    pub tx_hash: TxHash,
}

/// The result of a confirmed action.
#[derive(Debug, Clone)]
pub struct TxOutcome {
    pub action: LendAction,
    pub symbol: String,
    pub amount_raw: U256,
    pub tx_hash: TxHash,
    pub approval_tx_hash: Option<TxHash>,
}

/// Sequences approve-then-act writes against the pool.
///
/// Each action validates input locally, settles any required ERC20 allowance,
/// submits the primary write, blocks until confirmation, and then emits one
/// completion notification. Any step's failure aborts the remaining steps and
/// surfaces the underlying reason; nothing is retried automatically.
pub struct TransactionOrchestrator<C> {
    chain: Arc<C>,
    registry: Arc<AssetRegistry>,
    pool: Address,
    notifications: UnboundedSender<TxNotification>,
}

impl<C: LendingChain> TransactionOrchestrator<C> {
    /// Build the orchestrator together with the receiving half of its
    /// completion channel.
    pub fn new(
        chain: Arc<C>,
        registry: Arc<AssetRegistry>,
        pool: Address,
    ) -> (Self, UnboundedReceiver<TxNotification>) {
        let (notifications, receiver) = mpsc::unbounded_channel();
        (
            Self {
                chain,
                registry,
                pool,
                notifications,
            },
            receiver,
        )
    }

    /// Execute one user action end to end.
    ///
    /// # Arguments
    /// * `account` - The connected wallet address
    /// * `action` - Which pool entry point to call
    /// * `symbol` - Registry symbol of the asset being acted on
    /// * `amount` - User-entered decimal amount string
    ///
    /// # Returns
    /// * `Result<TxOutcome, DashboardError>` - The confirmed transaction, or the first failing step's error
    pub async fn execute(
        &self,
        account: Address,
        action: LendAction,
        symbol: &str,
        amount: &str,
    ) -> Result<TxOutcome, DashboardError> {
        let asset = self.registry.resolve(symbol)?;
        let amount_raw = math_helper::scale_to_raw(amount, asset.decimals)?;

        let mut pending = PendingTransaction::draft(action, asset, amount_raw);
        match self.run(account, asset, &mut pending).await {
            Ok(outcome) => Ok(outcome),
            Err(err) => {
                pending.status = TxStatus::Failed;
                warn!(
                    "{} of {} {} failed: {}",
                    pending.action, amount, pending.symbol, err
                );
                Err(err)
            }
        }
    }

    async fn run(
        &self,
        account: Address,
        asset: &Asset,
        pending: &mut PendingTransaction,
    ) -> Result<TxOutcome, DashboardError> {
        let approval_tx_hash = self.settle_allowance(account, asset, pending).await?;

        pending.status = TxStatus::Submitted;
        let tx_hash = match pending.action {
            LendAction::Supply => self.chain.supply(asset, pending.amount_raw).await?,
            LendAction::Withdraw => self.chain.withdraw(asset, pending.amount_raw).await?,
            LendAction::Borrow => self.chain.borrow(asset, pending.amount_raw).await?,
            LendAction::Repay => self.chain.repay(asset, pending.amount_raw).await?,
        };
        pending.tx_hash = Some(tx_hash);
        info!(
            "Submitted {} of {} ({})",
            pending.action, pending.symbol, tx_hash
        );

        self.chain.confirm(tx_hash).await?;
        pending.status = TxStatus::Confirmed;
        info!("Confirmed {} of {}", pending.action, pending.symbol);

        let _ = self.notifications.send(TxNotification {
            action: pending.action,
            symbol: pending.symbol.clone(),
            tx_hash,
        });

        Ok(TxOutcome {
            action: pending.action,
            symbol: pending.symbol.clone(),
            amount_raw: pending.amount_raw,
            tx_hash,
            approval_tx_hash,
        })
    }

    /// Check the pool's allowance for token-transferring actions and, when it
    /// is insufficient, approve and wait for the approval to confirm before
    /// the primary write may be submitted.
    async fn settle_allowance(
        &self,
        account: Address,
        asset: &Asset,
        pending: &mut PendingTransaction,
    ) -> Result<Option<TxHash>, DashboardError> {
        if !pending.action.requires_allowance() || asset.native {
            return Ok(None);
        }

        let allowance = self
            .chain
            .token_allowance(asset.address, account, self.pool)
            .await?;
        if allowance >= pending.amount_raw {
            return Ok(None);
        }

        pending.status = TxStatus::Approving;
        info!("Approving {} for the pool before {}", pending.symbol, pending.action);
        let tx_hash = self
            .chain
            .approve(asset.address, self.pool, pending.amount_raw)
            .await?;
        self.chain.confirm(tx_hash).await?;

        Ok(Some(tx_hash))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{usdt_address, MockChain, WriteKind, ACCOUNT};

    fn orchestrator(
        chain: Arc<MockChain>,
    ) -> (
        TransactionOrchestrator<MockChain>,
        UnboundedReceiver<TxNotification>,
    ) {
        let registry = Arc::new(AssetRegistry::risechain_testnet());
        TransactionOrchestrator::new(chain, registry, crate::test_support::POOL)
    }

    #[tokio::test]
    async fn test_supply_with_insufficient_allowance_approves_first() {
        let chain = Arc::new(MockChain::new());
        let (orchestrator, mut notifications) = orchestrator(chain.clone());

        let outcome = orchestrator
            .execute(ACCOUNT, LendAction::Supply, "USDT", "100")
            .await
            .unwrap();

        let writes = chain.writes();
        assert_eq!(writes.len(), 2);
        assert_eq!(writes[0].kind, WriteKind::Approve);
        assert_eq!(writes[0].target, usdt_address());
        assert_eq!(writes[0].amount, U256::from(100_000_000u64));
        assert_eq!(writes[1].kind, WriteKind::Supply);
        assert!(!writes[1].native_value);
        assert_eq!(writes[1].tx_hash, outcome.tx_hash);
        assert!(outcome.approval_tx_hash.is_some());

        // the approval is confirmed before the supply is submitted
        let approval_hash = outcome.approval_tx_hash.unwrap();
        assert!(chain.confirmed_before_submit(approval_hash, outcome.tx_hash));

        let notification = notifications.recv().await.unwrap();
        assert_eq!(notification.action, LendAction::Supply);
        assert!(notifications.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_supply_with_sufficient_allowance_skips_approval() {
        let chain = Arc::new(MockChain::new());
        chain.set_allowance(usdt_address(), U256::from(1_000_000_000u64));
        let (orchestrator, _notifications) = orchestrator(chain.clone());

        orchestrator
            .execute(ACCOUNT, LendAction::Supply, "USDT", "100")
            .await
            .unwrap();

        let writes = chain.writes();
        assert_eq!(writes.len(), 1);
        assert_eq!(writes[0].kind, WriteKind::Supply);
    }

    #[tokio::test]
    async fn test_native_supply_attaches_value_and_never_approves() {
        let chain = Arc::new(MockChain::new());
        let (orchestrator, _notifications) = orchestrator(chain.clone());

        orchestrator
            .execute(ACCOUNT, LendAction::Supply, "ETH", "1.5")
            .await
            .unwrap();

        let writes = chain.writes();
        assert_eq!(writes.len(), 1);
        assert_eq!(writes[0].kind, WriteKind::Supply);
        assert!(writes[0].native_value);
        assert_eq!(chain.allowance_reads(), 0);
    }

    #[tokio::test]
    async fn test_repay_requires_allowance_but_withdraw_and_borrow_do_not() {
        let chain = Arc::new(MockChain::new());
        let (orchestrator, _notifications) = orchestrator(chain.clone());

        orchestrator
            .execute(ACCOUNT, LendAction::Repay, "USDT", "50")
            .await
            .unwrap();
        orchestrator
            .execute(ACCOUNT, LendAction::Withdraw, "USDT", "50")
            .await
            .unwrap();
        orchestrator
            .execute(ACCOUNT, LendAction::Borrow, "USDT", "50")
            .await
            .unwrap();

        let kinds: Vec<WriteKind> = chain.writes().iter().map(|w| w.kind).collect();
        assert_eq!(
            kinds,
            vec![
                WriteKind::Approve,
                WriteKind::Repay,
                WriteKind::Withdraw,
                WriteKind::Borrow
            ]
        );
    }

    #[tokio::test]
    async fn test_invalid_amount_is_rejected_before_any_chain_call() {
        let chain = Arc::new(MockChain::new());
        let (orchestrator, _notifications) = orchestrator(chain.clone());

        let err = orchestrator
            .execute(ACCOUNT, LendAction::Supply, "USDT", "abc")
            .await
            .unwrap_err();

        assert!(matches!(err, DashboardError::InvalidAmount(_)));
        assert!(chain.writes().is_empty());
        assert_eq!(chain.allowance_reads(), 0);
    }

    #[tokio::test]
    async fn test_unknown_asset_is_rejected() {
        let chain = Arc::new(MockChain::new());
        let (orchestrator, _notifications) = orchestrator(chain);

        let err = orchestrator
            .execute(ACCOUNT, LendAction::Supply, "DOGE", "1")
            .await
            .unwrap_err();

        assert!(matches!(err, DashboardError::UnknownAsset(_)));
    }

    #[tokio::test]
    async fn test_write_failure_aborts_and_keeps_reason() {
        let chain = Arc::new(MockChain::new());
        chain.fail_writes("execution reverted: not enough collateral");
        let (orchestrator, mut notifications) = orchestrator(chain.clone());

        let err = orchestrator
            .execute(ACCOUNT, LendAction::Borrow, "USDT", "100")
            .await
            .unwrap_err();

        assert!(err.to_string().contains("not enough collateral"));
        assert!(notifications.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_failed_approval_aborts_the_primary_action() {
        let chain = Arc::new(MockChain::new());
        chain.fail_writes("execution reverted: approve disabled");
        let (orchestrator, _notifications) = orchestrator(chain.clone());

        let err = orchestrator
            .execute(ACCOUNT, LendAction::Supply, "USDT", "100")
            .await
            .unwrap_err();

        assert!(matches!(err, DashboardError::ChainWrite(_)));
        let kinds: Vec<WriteKind> = chain.writes().iter().map(|w| w.kind).collect();
        assert_eq!(kinds, vec![WriteKind::Approve]);
    }
}
