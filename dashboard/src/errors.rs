//! Error types for the dashboard core.

use thiserror::Error;

/// Errors surfaced by the chain adapter, readers, orchestrator and session.
///
/// Read failures are recoverable and degrade per-asset; write failures abort
/// the orchestrated sequence and carry the underlying reason verbatim. No
/// error is ever retried automatically.
#[derive(Error, Debug)]
pub enum DashboardError {
    /// RPC or contract read failure. Distinct from a legitimately zero value.
    #[error("chain read failed: {0}")]
    ChainRead(String),

    /// Transaction failed to submit or reverted on-chain.
    #[error("transaction failed: {0}")]
    ChainWrite(String),

    /// User-supplied amount rejected before any network call.
    #[error("invalid amount: {0}")]
    InvalidAmount(String),

    /// Symbol not present in the static asset registry.
    #[error("unknown asset: {0}")]
    UnknownAsset(String),

    /// Wallet is connected to a different chain than the configured network.
    #[error("wallet is on chain {actual}, expected chain {expected}")]
    NetworkMismatch { expected: u64, actual: u64 },

    /// The wallet does not know the requested chain and must add it first.
    #[error("chain {0} is not registered in the wallet")]
    UnknownNetwork(u64),

    /// Operation requires a connected wallet session.
    #[error("wallet session is not connected")]
    NotConnected,

    /// The wallet provider refused or failed a request.
    #[error("wallet request failed: {0}")]
    WalletRequest(String),
}
