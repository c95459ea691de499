pub mod models;

use std::sync::Arc;

use alloy::primitives::Address;
use futures::future::join_all;
use tracing::warn;

use crate::{
    asset_registry::{Asset, AssetRegistry},
    blockchain_manager::LendingChain,
    errors::DashboardError,
};

use self::models::{AccountPosition, TokenBalance};

/// Reads per-asset protocol positions, oracle prices and wallet balances for
/// an account.
///
/// Fetches are idempotent and safe to repeat on a timer. One asset's failure
/// never aborts the batch: the failing asset degrades to a zero-valued entry
/// and the remaining assets are returned untouched.
pub struct PositionReader<C> {
    chain: Arc<C>,
    registry: Arc<AssetRegistry>,
}

impl<C: LendingChain> PositionReader<C> {
    pub fn new(chain: Arc<C>, registry: Arc<AssetRegistry>) -> Self {
        Self { chain, registry }
    }

    /// Fetches the account's position in every registered asset, in registry
    /// order. Per-asset reads are issued concurrently and joined.
    pub async fn fetch_positions(&self, account: Address) -> Vec<AccountPosition> {
        let fetches = self
            .registry
            .list()
            .iter()
            .map(|asset| self.fetch_position(account, asset));

        join_all(fetches).await
    }

    /// Fetches the account's wallet balance in every registered asset. The
    /// native asset reads the account balance itself, ERC20 assets read
    /// `balanceOf`.
    pub async fn fetch_balances(&self, account: Address) -> Vec<TokenBalance> {
        let fetches = self
            .registry
            .list()
            .iter()
            .map(|asset| self.fetch_balance(account, asset));

        join_all(fetches).await
    }

    async fn fetch_position(&self, account: Address, asset: &Asset) -> AccountPosition {
        match self.try_fetch_position(account, asset).await {
            Ok(position) => position,
            Err(err) => {
                warn!("Failed to fetch {} position: {}", asset.symbol, err);
                AccountPosition::degraded_for(asset)
            }
        }
    }

    async fn try_fetch_position(
        &self,
        account: Address,
        asset: &Asset,
    ) -> Result<AccountPosition, DashboardError> {
        let (position, price) = tokio::try_join!(
            self.chain.user_position(account, asset.address),
            self.chain.asset_price(asset.address),
        )?;

        Ok(AccountPosition::from_chain(asset, position, price))
    }

    async fn fetch_balance(&self, account: Address, asset: &Asset) -> TokenBalance {
        let balance = if asset.native {
            self.chain.native_balance(account).await
        } else {
            self.chain.token_balance(asset.address, account).await
        };

        match balance {
            Ok(raw) => TokenBalance::from_raw(asset, raw),
            Err(err) => {
                warn!("Failed to fetch {} balance: {}", asset.symbol, err);
                TokenBalance::degraded_for(asset)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use alloy::primitives::U256;

    use super::*;
    use crate::test_support::{usdt_address, MockChain, ACCOUNT};

    fn reader(chain: Arc<MockChain>) -> PositionReader<MockChain> {
        PositionReader::new(chain, Arc::new(AssetRegistry::risechain_testnet()))
    }

    #[tokio::test]
    async fn test_positions_follow_registry_order_with_usd_values() {
        let chain = Arc::new(MockChain::new());
        // 1000 USDT supplied at $1.00 (price scaled 1e8)
        chain.set_position(usdt_address(), U256::from(1_000_000_000u64), U256::ZERO);
        chain.set_price(usdt_address(), U256::from(100_000_000u64));

        let positions = reader(chain).fetch_positions(ACCOUNT).await;

        assert_eq!(positions.len(), 3);
        assert_eq!(positions[0].symbol, "USDT");
        assert_eq!(positions[0].supplied, 1000.0);
        assert_eq!(positions[0].supplied_usd, 1000.0);
        assert_eq!(positions[0].borrowed_usd, 0.0);
        assert!(!positions[0].degraded);
    }

    #[tokio::test]
    async fn test_one_failing_oracle_degrades_only_that_asset() {
        let chain = Arc::new(MockChain::new());
        chain.set_position(usdt_address(), U256::from(5_000_000u64), U256::ZERO);
        chain.set_price(usdt_address(), U256::from(100_000_000u64));
        let btc = AssetRegistry::risechain_testnet()
            .resolve("BTC")
            .unwrap()
            .address;
        chain.fail_price(btc);

        let positions = reader(chain).fetch_positions(ACCOUNT).await;

        let usdt = positions.iter().find(|p| p.symbol == "USDT").unwrap();
        assert!(!usdt.degraded);
        assert_eq!(usdt.supplied_usd, 5.0);

        let btc = positions.iter().find(|p| p.symbol == "BTC").unwrap();
        assert!(btc.degraded);
        assert_eq!(btc.supplied_raw, U256::ZERO);
        assert_eq!(btc.supplied_usd, 0.0);
    }

    #[tokio::test]
    async fn test_native_balance_comes_from_the_account() {
        let chain = Arc::new(MockChain::new());
        chain.set_native_balance(U256::from(2_000_000_000_000_000_000u128));
        chain.set_token_balance(usdt_address(), U256::from(7_500_000u64));

        let balances = reader(chain.clone()).fetch_balances(ACCOUNT).await;

        let eth = balances.iter().find(|b| b.symbol == "ETH").unwrap();
        assert_eq!(eth.balance, 2.0);
        let usdt = balances.iter().find(|b| b.symbol == "USDT").unwrap();
        assert_eq!(usdt.balance, 7.5);
        // BTC balance was never set; zero is a legitimate value, not degraded
        let btc = balances.iter().find(|b| b.symbol == "BTC").unwrap();
        assert!(!btc.degraded);
        assert_eq!(btc.balance, 0.0);
    }

    #[tokio::test]
    async fn test_failing_balance_read_degrades_to_zero() {
        let chain = Arc::new(MockChain::new());
        chain.fail_balance(usdt_address());

        let balances = reader(chain).fetch_balances(ACCOUNT).await;

        let usdt = balances.iter().find(|b| b.symbol == "USDT").unwrap();
        assert!(usdt.degraded);
        assert_eq!(usdt.raw, U256::ZERO);
    }
}
