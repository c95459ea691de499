//! Static protocol configuration: supported assets, deployed contract
//! addresses and the network descriptor. Loaded once at startup, never
//! mutated afterwards.

use alloy::primitives::{address, Address};
use serde::Serialize;

use crate::errors::DashboardError;

/// A supported lending market asset. Identity is the on-chain address.
#[derive(Debug, Clone, Serialize)]
pub struct Asset {
    pub symbol: String,
    pub name: String,
    pub address: Address,
    pub decimals: u8,
    /// The chain's native currency: balance comes from the account itself and
    /// transfers into the pool attach value instead of going through ERC20
    /// allowances.
    pub native: bool,
}

/// Ordered lookup over the supported assets. The listing order is fixed and
/// used for both display and aggregation.
#[derive(Debug, Clone)]
pub struct AssetRegistry {
    assets: Vec<Asset>,
}

impl AssetRegistry {
    pub fn new(assets: Vec<Asset>) -> Self {
        Self { assets }
    }

    /// The registry for the deployed Risechain testnet markets.
    pub fn risechain_testnet() -> Self {
        Self::new(vec![
            Asset {
                symbol: "USDT".to_string(),
                name: "USDT".to_string(),
                address: address!("40918ba7f132e0acba2ce4de4c4baf9bd2d7d849"),
                decimals: 6,
                native: false,
            },
            Asset {
                symbol: "ETH".to_string(),
                name: "Ethereum".to_string(),
                address: address!("4200000000000000000000000000000000000006"),
                decimals: 18,
                native: true,
            },
            Asset {
                symbol: "BTC".to_string(),
                name: "Bitcoin".to_string(),
                address: address!("f32d39ff9f6aa7a7a64d7a4f00a54826ef791a55"),
                decimals: 8,
                native: false,
            },
        ])
    }

    /// All registered assets in fixed display order.
    pub fn list(&self) -> &[Asset] {
        &self.assets
    }

    /// Look up an asset by its symbol.
    pub fn resolve(&self, symbol: &str) -> Result<&Asset, DashboardError> {
        self.assets
            .iter()
            .find(|asset| asset.symbol == symbol)
            .ok_or_else(|| DashboardError::UnknownAsset(symbol.to_string()))
    }

    /// Look up an asset by its on-chain address, the asset's identity.
    pub fn resolve_address(&self, address: Address) -> Result<&Asset, DashboardError> {
        self.assets
            .iter()
            .find(|asset| asset.address == address)
            .ok_or_else(|| DashboardError::UnknownAsset(address.to_string()))
    }
}

/// Addresses of the deployed protocol contracts.
#[derive(Debug, Clone)]
pub struct ContractRegistry {
    pub lending_pool: Address,
    pub lending_pool_core: Address,
    pub price_oracle: Address,
    pub protocol_configurator: Address,
    pub rewards_controller: Address,
    pub protocol_token: Address,
}

impl ContractRegistry {
    pub fn risechain_testnet() -> Self {
        Self {
            lending_pool: address!("647a234234d51b530e85933b05817ef3505a8687"),
            lending_pool_core: address!("4e1606cc4c83f5c092294948fc1d909aa0417ab3"),
            price_oracle: address!("ebfc1d20d272a9bd8f51f09dc281e3fb9c3bba3e"),
            protocol_configurator: address!("874f8dd69a324d89e685619563f9aba71746a095"),
            rewards_controller: address!("466174d98bdbbf68e53e65c612a8388cd554c290"),
            protocol_token: address!("c3eeab50ba07308acecf8c30c562b7f62a5d6b23"),
        }
    }
}

/// Metadata for the native currency of a network, as wallets expect it when
/// asked to add a chain.
#[derive(Debug, Clone, Serialize)]
pub struct NativeCurrency {
    pub name: String,
    pub symbol: String,
    pub decimals: u8,
}

/// The single configured network.
#[derive(Debug, Clone, Serialize)]
pub struct NetworkDescriptor {
    pub chain_id: u64,
    pub name: String,
    pub rpc_url: String,
    pub native_currency: NativeCurrency,
}

impl NetworkDescriptor {
    pub fn risechain_testnet() -> Self {
        Self {
            chain_id: 11155931,
            name: "Risechain Testnet".to_string(),
            rpc_url: "https://testnet.riselabs.xyz".to_string(),
            native_currency: NativeCurrency {
                name: "ETH".to_string(),
                symbol: "ETH".to_string(),
                decimals: 18,
            },
        }
    }
}
