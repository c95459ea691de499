use alloy::primitives::{Address, U256};
use serde::Serialize;

use crate::{
    asset_registry::Asset,
    blockchain_manager::RawPosition,
    utils::{constants::PRICE_FEED_DECIMALS, math_helper},
};

/// A user's protocol position in one asset, with USD values derived from the
/// oracle price at fetch time. Never cached across price changes; rebuilt on
/// every fetch.
#[derive(Debug, Clone, Serialize)]
pub struct AccountPosition {
    pub symbol: String,
    pub asset_address: Address,
    pub supplied_raw: U256,
    pub borrowed_raw: U256,
    pub supplied: f64,
    pub borrowed: f64,
    pub supplied_usd: f64,
    pub borrowed_usd: f64,
    pub price_usd: f64,
    /// Set when the asset's reads failed and the position was zeroed out.
    pub degraded: bool,
}

impl AccountPosition {
    pub fn from_chain(asset: &Asset, position: RawPosition, price_raw: U256) -> Self {
        let price_usd = math_helper::divide_by_precision_f64(price_raw, PRICE_FEED_DECIMALS);
        let supplied = math_helper::divide_by_precision_f64(position.supplied, asset.decimals);
        let borrowed = math_helper::divide_by_precision_f64(position.borrowed, asset.decimals);

        Self {
            symbol: asset.symbol.clone(),
            asset_address: asset.address,
            supplied_raw: position.supplied,
            borrowed_raw: position.borrowed,
            supplied,
            borrowed,
            supplied_usd: supplied * price_usd,
            borrowed_usd: borrowed * price_usd,
            price_usd,
            degraded: false,
        }
    }

    /// Zero-valued placeholder used when the asset's reads failed.
    pub fn degraded_for(asset: &Asset) -> Self {
        Self {
            symbol: asset.symbol.clone(),
            asset_address: asset.address,
            supplied_raw: U256::ZERO,
            borrowed_raw: U256::ZERO,
            supplied: 0.0,
            borrowed: 0.0,
            supplied_usd: 0.0,
            borrowed_usd: 0.0,
            price_usd: 0.0,
            degraded: true,
        }
    }
}

/// A wallet balance for one asset.
#[derive(Debug, Clone, Serialize)]
pub struct TokenBalance {
    pub symbol: String,
    pub decimals: u8,
    pub raw: U256,
    pub balance: f64,
    pub degraded: bool,
}

impl TokenBalance {
    pub fn from_raw(asset: &Asset, raw: U256) -> Self {
        Self {
            symbol: asset.symbol.clone(),
            decimals: asset.decimals,
            raw,
            balance: math_helper::divide_by_precision_f64(raw, asset.decimals),
            degraded: false,
        }
    }

    pub fn degraded_for(asset: &Asset) -> Self {
        Self {
            symbol: asset.symbol.clone(),
            decimals: asset.decimals,
            raw: U256::ZERO,
            balance: 0.0,
            degraded: true,
        }
    }
}

/// Portfolio-wide supplied USD value, degraded assets counting as zero.
pub fn total_supplied_usd(positions: &[AccountPosition]) -> f64 {
    positions.iter().map(|p| p.supplied_usd).sum()
}

/// Portfolio-wide borrowed USD value, degraded assets counting as zero.
pub fn total_borrowed_usd(positions: &[AccountPosition]) -> f64 {
    positions.iter().map(|p| p.borrowed_usd).sum()
}
