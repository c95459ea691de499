use std::time::Duration;

use alloy::{
    network::Ethereum,
    primitives::{Address, TxHash, U256},
    providers::{Provider, ProviderBuilder},
    rpc::client::RpcClient,
    transports::{http::reqwest::Url, layers::RetryBackoffLayer},
};
use anyhow::Result;
use async_trait::async_trait;

use crate::{
    asset_registry::{Asset, ContractRegistry},
    config::LocalConfig,
    errors::DashboardError,
    utils::contracts::{IERC20, ILendingPool, ILendingPoolCore, IPriceOracle},
};

/// BlockchainManager handles blockchain-related operations and connections.
/// It provides functionality to create provider instances for the configured
/// network.
pub struct BlockchainManager;

impl BlockchainManager {
    /// Creates and returns an HTTP provider instance for blockchain interactions.
    ///
    /// # Arguments
    /// * `local_config` - Local configuration containing the RPC URL
    ///
    /// # Returns
    /// * `Result<impl Provider<Ethereum>>` - A Result containing either the provider instance or an error
    pub async fn get_provider(local_config: &LocalConfig) -> Result<impl Provider<Ethereum>> {
        // Instantiate the RetryBackoffLayer with the configuration
        let retry_layer = RetryBackoffLayer::new(10, 1000, 10000);

        let client = RpcClient::builder()
            .layer(retry_layer)
            .http(Url::parse(&local_config.rpc_url)?);

        let provider = ProviderBuilder::new().on_client(client);

        Ok(provider)
    }
}

/// A user's raw protocol position in a single asset, in asset-native units.
#[derive(Debug, Clone, Copy, Default)]
pub struct RawPosition {
    pub supplied: U256,
    pub borrowed: U256,
}

/// The pool's aggregate account view, both values scaled by 1e18 USD.
#[derive(Debug, Clone, Copy, Default)]
pub struct RawBorrowingPower {
    pub power: U256,
    pub borrows: U256,
}

/// The read/write surface of the lending protocol contracts.
///
/// Readers, the risk aggregator and the transaction orchestrator only see
/// this trait; the alloy-backed [`ChainClient`] implements it against the
/// live network and tests substitute a scripted double. A read failure is
/// always reported as an error, never conflated with a legitimately zero
/// value.
#[async_trait]
pub trait LendingChain: Send + Sync {
    async fn native_balance(&self, account: Address) -> Result<U256, DashboardError>;

    async fn token_balance(&self, token: Address, account: Address)
        -> Result<U256, DashboardError>;

    async fn token_allowance(
        &self,
        token: Address,
        owner: Address,
        spender: Address,
    ) -> Result<U256, DashboardError>;

    async fn user_position(
        &self,
        account: Address,
        asset: Address,
    ) -> Result<RawPosition, DashboardError>;

    async fn asset_price(&self, asset: Address) -> Result<U256, DashboardError>;

    async fn health_factor(&self, account: Address) -> Result<U256, DashboardError>;

    async fn borrowing_power(&self, account: Address)
        -> Result<RawBorrowingPower, DashboardError>;

    /// Submit an ERC20 approval. Returns the transaction hash once the node
    /// has accepted the submission.
    async fn approve(
        &self,
        token: Address,
        spender: Address,
        amount: U256,
    ) -> Result<TxHash, DashboardError>;

    /// Submit a supply. Attaches native value when the asset is the chain's
    /// native currency.
    async fn supply(&self, asset: &Asset, amount: U256) -> Result<TxHash, DashboardError>;

    async fn withdraw(&self, asset: &Asset, amount: U256) -> Result<TxHash, DashboardError>;

    async fn borrow(&self, asset: &Asset, amount: U256) -> Result<TxHash, DashboardError>;

    /// Submit a repayment. Attaches native value when the asset is the chain's
    /// native currency.
    async fn repay(&self, asset: &Asset, amount: U256) -> Result<TxHash, DashboardError>;

    /// Block until the submitted transaction is included, failing when the
    /// receipt reports a revert.
    async fn confirm(&self, tx_hash: TxHash) -> Result<(), DashboardError>;
}

/// Alloy-backed [`LendingChain`] adapter over the deployed protocol contracts.
///
/// Holds no business state; rebuilt from the contract registry whenever the
/// session's provider changes.
pub struct ChainClient<P: Provider<Ethereum>> {
    provider: P,
    lending_pool: Address,
    lending_pool_core: Address,
    price_oracle: Address,
    receipt_poll_interval: Duration,
}

impl<P: Provider<Ethereum>> ChainClient<P> {
    pub fn new(provider: P, contracts: &ContractRegistry, receipt_poll_interval: Duration) -> Self {
        Self {
            provider,
            lending_pool: contracts.lending_pool,
            lending_pool_core: contracts.lending_pool_core,
            price_oracle: contracts.price_oracle,
            receipt_poll_interval,
        }
    }
}

fn read_error(err: impl std::fmt::Display) -> DashboardError {
    DashboardError::ChainRead(err.to_string())
}

fn write_error(err: impl std::fmt::Display) -> DashboardError {
    DashboardError::ChainWrite(err.to_string())
}

#[async_trait]
impl<P: Provider<Ethereum>> LendingChain for ChainClient<P> {
    async fn native_balance(&self, account: Address) -> Result<U256, DashboardError> {
        self.provider
            .get_balance(account)
            .await
            .map_err(read_error)
    }

    async fn token_balance(
        &self,
        token: Address,
        account: Address,
    ) -> Result<U256, DashboardError> {
        let contract = IERC20::new(token, &self.provider);
        let balance = contract
            .balanceOf(account)
            .call()
            .await
            .map_err(read_error)?;
        Ok(balance._0)
    }

    async fn token_allowance(
        &self,
        token: Address,
        owner: Address,
        spender: Address,
    ) -> Result<U256, DashboardError> {
        let contract = IERC20::new(token, &self.provider);
        let allowance = contract
            .allowance(owner, spender)
            .call()
            .await
            .map_err(read_error)?;
        Ok(allowance._0)
    }

    async fn user_position(
        &self,
        account: Address,
        asset: Address,
    ) -> Result<RawPosition, DashboardError> {
        let contract = ILendingPoolCore::new(self.lending_pool_core, &self.provider);
        let position = contract
            .userPositions(account, asset)
            .call()
            .await
            .map_err(read_error)?;
        Ok(RawPosition {
            supplied: position.suppliedAmount,
            borrowed: position.borrowedAmount,
        })
    }

    async fn asset_price(&self, asset: Address) -> Result<U256, DashboardError> {
        let contract = IPriceOracle::new(self.price_oracle, &self.provider);
        let price = contract
            .getAssetPrice(asset)
            .call()
            .await
            .map_err(read_error)?;
        Ok(price._0)
    }

    async fn health_factor(&self, account: Address) -> Result<U256, DashboardError> {
        let contract = ILendingPool::new(self.lending_pool, &self.provider);
        let health_factor = contract
            .getHealthFactor(account)
            .call()
            .await
            .map_err(read_error)?;
        Ok(health_factor._0)
    }

    async fn borrowing_power(
        &self,
        account: Address,
    ) -> Result<RawBorrowingPower, DashboardError> {
        let contract = ILendingPool::new(self.lending_pool, &self.provider);
        let account_data = contract
            .getAccountBorrowingPower(account)
            .call()
            .await
            .map_err(read_error)?;
        Ok(RawBorrowingPower {
            power: account_data.totalBorrowingPower,
            borrows: account_data.totalBorrows,
        })
    }

    async fn approve(
        &self,
        token: Address,
        spender: Address,
        amount: U256,
    ) -> Result<TxHash, DashboardError> {
        let contract = IERC20::new(token, &self.provider);
        let pending = contract
            .approve(spender, amount)
            .send()
            .await
            .map_err(write_error)?;
        Ok(*pending.tx_hash())
    }

    async fn supply(&self, asset: &Asset, amount: U256) -> Result<TxHash, DashboardError> {
        let contract = ILendingPool::new(self.lending_pool, &self.provider);
        let mut call = contract.supply(asset.address, amount);
        if asset.native {
            call = call.value(amount);
        }
        let pending = call.send().await.map_err(write_error)?;
        Ok(*pending.tx_hash())
    }

    async fn withdraw(&self, asset: &Asset, amount: U256) -> Result<TxHash, DashboardError> {
        let contract = ILendingPool::new(self.lending_pool, &self.provider);
        let pending = contract
            .withdraw(asset.address, amount)
            .send()
            .await
            .map_err(write_error)?;
        Ok(*pending.tx_hash())
    }

    async fn borrow(&self, asset: &Asset, amount: U256) -> Result<TxHash, DashboardError> {
        let contract = ILendingPool::new(self.lending_pool, &self.provider);
        let pending = contract
            .borrow(asset.address, amount)
            .send()
            .await
            .map_err(write_error)?;
        Ok(*pending.tx_hash())
    }

    async fn repay(&self, asset: &Asset, amount: U256) -> Result<TxHash, DashboardError> {
        let contract = ILendingPool::new(self.lending_pool, &self.provider);
        let mut call = contract.repay(asset.address, amount);
        if asset.native {
            call = call.value(amount);
        }
        let pending = call.send().await.map_err(write_error)?;
        Ok(*pending.tx_hash())
    }

    async fn confirm(&self, tx_hash: TxHash) -> Result<(), DashboardError> {
        loop {
            let receipt = self
                .provider
                .get_transaction_receipt(tx_hash)
                .await
                .map_err(write_error)?;

            if let Some(receipt) = receipt {
                if receipt.status() {
                    return Ok(());
                }
                return Err(DashboardError::ChainWrite(format!(
                    "transaction {} reverted",
                    tx_hash
                )));
            }

            tokio::time::sleep(self.receipt_poll_interval).await;
        }
    }
}
