use alloy::primitives::Address;
use anyhow::Result;

use crate::asset_registry::NetworkDescriptor;

use super::env_helper::{load_env_var, load_env_var_or};

#[derive(Debug, Clone)]
pub struct LocalConfig {
    pub rpc_url: String,
    pub watch_account: Address,
    pub refresh_frequency: u64,
    pub receipt_poll_interval_ms: u64,
}

impl LocalConfig {
    /// Runtime knobs from the environment. The RPC URL defaults to the
    /// configured network's public endpoint.
    pub fn load_from_env(network: &NetworkDescriptor) -> Result<Self> {
        Ok(Self {
            rpc_url: load_env_var_or("RPC_URL", network.rpc_url.clone())?,
            watch_account: load_env_var("WATCH_ACCOUNT")?,
            refresh_frequency: load_env_var_or("REFRESH_FREQUENCY", 15)?,
            receipt_poll_interval_ms: load_env_var_or("RECEIPT_POLL_INTERVAL_MS", 2000)?,
        })
    }
}
