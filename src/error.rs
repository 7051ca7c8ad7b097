//! Typed failure taxonomy for the relayer.
//!
//! Precondition errors are produced before any transaction is broadcast;
//! execution errors (`ChainReverted`, `TxTimeout`) carry the transaction hash
//! when one exists. Raw provider internals are never surfaced except as the
//! textual revert reason.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum RelayError {
    #[error("invalid address: {0}")]
    BadAddress(String),

    #[error("chain {0} is not supported")]
    UnsupportedChain(u64),

    #[error("RPC endpoint for chain {chain_id} is unavailable: {reason}")]
    RpcUnavailable { chain_id: u64, reason: String },

    #[error("relayer balance too low on this chain: {balance} {symbol}")]
    InsufficientRelayerFunds { balance: String, symbol: String },

    #[error("no drop code is set for this faucet")]
    CodeMissing,

    #[error("drop code does not match")]
    CodeInvalid,

    #[error("drop code has expired")]
    CodeExpired,

    #[error("drop code is not active yet")]
    CodeFuture,

    #[error("faucet is paused")]
    FaucetPaused,

    #[error("address has already claimed from this faucet")]
    AlreadyClaimed,

    #[error("no custom claim amount is set for this address")]
    NoCustomAmount,

    #[error("custom claim amount is zero")]
    ZeroCustomAmount,

    #[error("transaction reverted: {reason}")]
    ChainReverted {
        reason: String,
        tx_hash: Option<String>,
    },

    #[error("timed out waiting for transaction receipt")]
    TxTimeout { tx_hash: String },

    #[error("address is not authorized for this faucet")]
    Unauthorized,

    #[error("relayer is not the owner of the management contract")]
    NotContractOwner,

    #[error("cache backend unavailable: {0}")]
    CacheUnavailable(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl RelayError {
    /// Stable machine-readable kind, used in the error envelope.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::BadAddress(_) => "BadAddress",
            Self::UnsupportedChain(_) => "UnsupportedChain",
            Self::RpcUnavailable { .. } => "RpcUnavailable",
            Self::InsufficientRelayerFunds { .. } => "InsufficientRelayerFunds",
            Self::CodeMissing => "CodeMissing",
            Self::CodeInvalid => "CodeInvalid",
            Self::CodeExpired => "CodeExpired",
            Self::CodeFuture => "CodeFuture",
            Self::FaucetPaused => "FaucetPaused",
            Self::AlreadyClaimed => "AlreadyClaimed",
            Self::NoCustomAmount => "NoCustomAmount",
            Self::ZeroCustomAmount => "ZeroCustomAmount",
            Self::ChainReverted { .. } => "ChainReverted",
            Self::TxTimeout { .. } => "TxTimeout",
            Self::Unauthorized => "Unauthorized",
            Self::NotContractOwner => "NotContractOwner",
            Self::CacheUnavailable(_) => "CacheUnavailable",
            Self::Internal(_) => "Internal",
        }
    }

    /// Hash of the already-broadcast transaction, when the failure happened
    /// after broadcast.
    pub fn tx_hash(&self) -> Option<&str> {
        match self {
            Self::ChainReverted { tx_hash, .. } => tx_hash.as_deref(),
            Self::TxTimeout { tx_hash } => Some(tx_hash.as_str()),
            _ => None,
        }
    }

    pub fn internal(err: impl std::fmt::Display) -> Self {
        Self::Internal(err.to_string())
    }
}

impl From<sea_orm::DbErr> for RelayError {
    fn from(err: sea_orm::DbErr) -> Self {
        Self::CacheUnavailable(err.to_string())
    }
}

impl From<anyhow::Error> for RelayError {
    fn from(err: anyhow::Error) -> Self {
        Self::Internal(format!("{err:#}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn execution_errors_carry_tx_hash() {
        let reverted = RelayError::ChainReverted {
            reason: "execution reverted: paused".to_string(),
            tx_hash: Some("0xabc".to_string()),
        };
        assert_eq!(reverted.tx_hash(), Some("0xabc"));

        let timeout = RelayError::TxTimeout {
            tx_hash: "0xdef".to_string(),
        };
        assert_eq!(timeout.tx_hash(), Some("0xdef"));

        assert_eq!(RelayError::FaucetPaused.tx_hash(), None);
    }

    #[test]
    fn kinds_are_stable() {
        assert_eq!(RelayError::CodeExpired.kind(), "CodeExpired");
        assert_eq!(RelayError::UnsupportedChain(7).kind(), "UnsupportedChain");
        assert_eq!(
            RelayError::BadAddress("xyz".to_string()).kind(),
            "BadAddress"
        );
    }
}
