use std::fmt;
use std::sync::Arc;

use alloy::primitives::{Address, U256};
use serde::Serialize;

use crate::{
    blockchain_manager::LendingChain,
    errors::DashboardError,
    utils::{
        constants::{
            HEALTH_FACTOR_DECIMALS, HF_GOOD_THRESHOLD, HF_INFINITE_DIGIT_THRESHOLD,
            HF_INFINITE_VALUE_THRESHOLD, HF_RISKY_THRESHOLD, HF_SAFE_THRESHOLD,
            USD_VALUE_DECIMALS,
        },
        math_helper,
    },
};

/// Health factor classification tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum RiskClass {
    Safe,
    Good,
    Risky,
    Danger,
}

impl RiskClass {
    pub fn from_health_factor(health_factor: f64) -> Self {
        if health_factor >= HF_SAFE_THRESHOLD {
            RiskClass::Safe
        } else if health_factor >= HF_GOOD_THRESHOLD {
            RiskClass::Good
        } else if health_factor >= HF_RISKY_THRESHOLD {
            RiskClass::Risky
        } else {
            RiskClass::Danger
        }
    }
}

impl fmt::Display for RiskClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RiskClass::Safe => write!(f, "Safe"),
            RiskClass::Good => write!(f, "Good"),
            RiskClass::Risky => write!(f, "Risky"),
            RiskClass::Danger => write!(f, "Danger"),
        }
    }
}

/// Display tier for the borrow utilization gauge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum UtilizationTier {
    Low,
    Moderate,
    Elevated,
    High,
}

impl UtilizationTier {
    pub fn from_utilization(utilization: f64) -> Self {
        if utilization < 50.0 {
            UtilizationTier::Low
        } else if utilization < 75.0 {
            UtilizationTier::Moderate
        } else if utilization < 90.0 {
            UtilizationTier::Elevated
        } else {
            UtilizationTier::High
        }
    }
}

/// Portfolio-level risk view, derived from the pool's aggregate account
/// calls. A health factor of `f64::INFINITY` means the account has no debt.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct PortfolioRisk {
    pub health_factor: f64,
    pub total_borrowing_power_usd: f64,
    pub total_borrows_usd: f64,
}

impl PortfolioRisk {
    /// The view for an account with no debt: unconditionally safe.
    pub fn no_debt() -> Self {
        Self {
            health_factor: f64::INFINITY,
            total_borrowing_power_usd: 0.0,
            total_borrows_usd: 0.0,
        }
    }

    pub fn classification(&self) -> RiskClass {
        RiskClass::from_health_factor(self.health_factor)
    }

    /// Borrow utilization in percent, clamped to [0, 100]. Zero borrowing
    /// power yields zero, never a division error.
    pub fn utilization(&self) -> f64 {
        if self.total_borrowing_power_usd <= 0.0 {
            return 0.0;
        }
        let rate = (self.total_borrows_usd / self.total_borrowing_power_usd) * 100.0;
        rate.clamp(0.0, 100.0)
    }

    pub fn utilization_tier(&self) -> UtilizationTier {
        UtilizationTier::from_utilization(self.utilization())
    }

    /// Remaining USD borrowing headroom, floored at zero.
    pub fn available_to_borrow_usd(&self) -> f64 {
        (self.total_borrowing_power_usd - self.total_borrows_usd).max(0.0)
    }
}

impl Default for PortfolioRisk {
    fn default() -> Self {
        Self::no_debt()
    }
}

/// Normalize a raw on-chain health factor to a display ratio.
///
/// The pool answers `type(uint256).max`-ish values for debt-free accounts;
/// anything with more than [`HF_INFINITE_DIGIT_THRESHOLD`] decimal digits, or
/// scaling past [`HF_INFINITE_VALUE_THRESHOLD`], becomes the infinite
/// sentinel instead of an enormous finite float.
pub fn normalize_health_factor(raw: U256) -> f64 {
    if raw.to_string().len() > HF_INFINITE_DIGIT_THRESHOLD {
        return f64::INFINITY;
    }

    let health_factor = math_helper::divide_by_precision_f64(raw, HEALTH_FACTOR_DECIMALS);
    if health_factor > HF_INFINITE_VALUE_THRESHOLD {
        return f64::INFINITY;
    }

    health_factor
}

/// Combines the pool's aggregate health-factor and borrowing-power reads into
/// a [`PortfolioRisk`].
///
/// The two contract calls are the same source of truth the protocol's own
/// liquidation logic uses; risk is never recomputed locally from the
/// position set.
pub struct RiskAggregator<C> {
    chain: Arc<C>,
}

impl<C: LendingChain> RiskAggregator<C> {
    pub fn new(chain: Arc<C>) -> Self {
        Self { chain }
    }

    /// Fetches both aggregate reads concurrently and derives the portfolio
    /// risk view.
    pub async fn compute_risk(&self, account: Address) -> Result<PortfolioRisk, DashboardError> {
        let (health_factor_raw, borrowing_power) = tokio::try_join!(
            self.chain.health_factor(account),
            self.chain.borrowing_power(account),
        )?;

        Ok(PortfolioRisk {
            health_factor: normalize_health_factor(health_factor_raw),
            total_borrowing_power_usd: math_helper::divide_by_precision_f64(
                borrowing_power.power,
                USD_VALUE_DECIMALS,
            ),
            total_borrows_usd: math_helper::divide_by_precision_f64(
                borrowing_power.borrows,
                USD_VALUE_DECIMALS,
            ),
        })
    }
}
