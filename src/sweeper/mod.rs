//! USDT sweeper: tops up users below a balance threshold from a managed
//! USDT pool, signed by the operator.

use alloy::primitives::{Address, U256};
use alloy::sol_types::SolCall;
use serde::Serialize;
use tracing::{info, warn};

use crate::chain::contracts::{IERC20Metadata, IUsdtManager};
use crate::chain::{self, tx};
use crate::error::RelayError;
use crate::state::AppState;

/// Users at or above this many USDT are left alone when no threshold is given
pub const DEFAULT_THRESHOLD: f64 = 1.0;

#[derive(Debug, Clone)]
pub struct SweepRequest {
    pub user_address: String,
    pub to_address: String,
    pub management_address: String,
    pub chain_id: u64,
    /// Decimal USDT amount; `None` sweeps the whole pool via transferAllUSDT
    pub amount: Option<f64>,
    pub threshold: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct SweepOutcome {
    pub below_threshold: bool,
    pub transfer_triggered: bool,
    /// User balance in decimal USDT at check time
    pub balance: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tx_hash: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Scale integer token units down to a decimal amount.
pub fn units_to_decimal(value: U256, decimals: u8) -> f64 {
    assert!(decimals <= 36, "Token decimals exceed sane bounds");
    let divisor = 10f64.powi(i32::from(decimals));
    match u128::try_from(value) {
        Ok(units) => units as f64 / divisor,
        // Balances beyond u128 are astronomically above any threshold
        Err(_) => f64::MAX,
    }
}

/// Scale a decimal amount up to integer token units.
pub fn decimal_to_units(value: f64, decimals: u8) -> Result<U256, RelayError> {
    assert!(decimals <= 36, "Token decimals exceed sane bounds");
    if !value.is_finite() || value <= 0.0 {
        return Err(RelayError::Internal(
            "transfer amount must be a positive number".to_string(),
        ));
    }
    let scaled = value * 10f64.powi(i32::from(decimals));
    if scaled > u128::MAX as f64 {
        return Err(RelayError::Internal(
            "transfer amount exceeds token range".to_string(),
        ));
    }
    Ok(U256::from(scaled.round() as u128))
}

/// Check one user's USDT balance and trigger a management-contract transfer
/// when it sits below the threshold.
pub async fn check_and_transfer(
    state: &AppState,
    request: SweepRequest,
) -> Result<SweepOutcome, RelayError> {
    assert!(
        request.threshold.is_finite() && request.threshold > 0.0,
        "Sweep threshold must be positive"
    );

    let user = chain::parse_address(&request.user_address)?;
    let to = chain::parse_address(&request.to_address)?;
    let management = chain::parse_address(&request.management_address)?;

    let client = state.registry.connect(request.chain_id).await?;
    let manager = IUsdtManager::new(management, client.provider().clone());

    // The ERC-20 is discovered through the management contract, never taken
    // from the request
    let token_address = manager
        .USDT()
        .call()
        .await
        .map_err(|err| view_error(&client, "USDT", err))?;
    let token = IERC20Metadata::new(token_address, client.provider().clone());

    let decimals = token
        .decimals()
        .call()
        .await
        .map_err(|err| view_error(&client, "decimals", err))?;
    let raw_balance = token
        .balanceOf(user)
        .call()
        .await
        .map_err(|err| view_error(&client, "balanceOf", err))?;
    let balance = units_to_decimal(raw_balance, decimals);

    if balance >= request.threshold {
        return Ok(SweepOutcome {
            below_threshold: false,
            transfer_triggered: false,
            balance,
            tx_hash: None,
            message: None,
        });
    }

    let owner = manager
        .owner()
        .call()
        .await
        .map_err(|err| view_error(&client, "owner", err))?;
    if owner != state.operator.address() {
        return Err(RelayError::NotContractOwner);
    }

    let pool_balance = manager
        .getUSDTBalance()
        .call()
        .await
        .map_err(|err| view_error(&client, "getUSDTBalance", err))?;
    if pool_balance == U256::ZERO {
        return Ok(SweepOutcome {
            below_threshold: true,
            transfer_triggered: false,
            balance,
            tx_hash: None,
            message: Some("management contract holds no USDT".to_string()),
        });
    }

    let calldata = match request.amount {
        None => IUsdtManager::transferAllUSDTCall { to }.abi_encode(),
        Some(amount) => {
            let units = decimal_to_units(amount, decimals)?;
            IUsdtManager::transferUSDTCall { to, amount: units }.abi_encode()
        }
    };

    state.operator.ensure_funded(&client).await?;
    let operator = state.operator.address();
    let guard = state.operator.lock_chain(request.chain_id).await;
    let transfer_tx = tx::build_call(&client, operator, management, calldata).await?;
    let tx_hash = state.operator.sign_and_send(&client, &transfer_tx).await?;
    drop(guard);
    state
        .operator
        .await_receipt(&client, &transfer_tx, tx_hash)
        .await?;

    info!(
        %tx_hash,
        user = %user,
        chain_id = request.chain_id,
        "USDT transfer triggered"
    );
    Ok(SweepOutcome {
        below_threshold: true,
        transfer_triggered: true,
        balance,
        tx_hash: Some(tx_hash.to_string()),
        message: None,
    })
}

#[derive(Debug, Clone, Serialize)]
pub struct BulkSweepStatus {
    pub user_address: String,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub below_threshold: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transfer_triggered: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tx_hash: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Sweep a batch user-by-user; one failing user never aborts the rest.
pub async fn check_and_transfer_bulk(
    state: &AppState,
    users: Vec<String>,
    to_address: String,
    management_address: String,
    chain_id: u64,
    amount: Option<f64>,
    threshold: f64,
) -> Vec<BulkSweepStatus> {
    assert!(!users.is_empty(), "Bulk sweep requires at least one user");
    let mut statuses = Vec::with_capacity(users.len());

    for user_address in users {
        let request = SweepRequest {
            user_address: user_address.clone(),
            to_address: to_address.clone(),
            management_address: management_address.clone(),
            chain_id,
            amount,
            threshold,
        };
        match check_and_transfer(state, request).await {
            Ok(outcome) => statuses.push(BulkSweepStatus {
                user_address,
                success: true,
                below_threshold: Some(outcome.below_threshold),
                transfer_triggered: Some(outcome.transfer_triggered),
                tx_hash: outcome.tx_hash,
                error: None,
            }),
            Err(err) => {
                warn!(user = %user_address, "Bulk sweep entry failed: {err}");
                statuses.push(BulkSweepStatus {
                    user_address,
                    success: false,
                    below_threshold: None,
                    transfer_triggered: None,
                    tx_hash: None,
                    error: Some(err.to_string()),
                });
            }
        }
    }

    statuses
}

fn view_error(
    client: &crate::chain::ChainClient,
    selector: &str,
    err: impl std::fmt::Display,
) -> RelayError {
    RelayError::RpcUnavailable {
        chain_id: client.chain_id(),
        reason: format!("{selector}() view call failed: {err}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unit_scaling_round_trips() {
        // 0.5 USDT at 6 decimals
        assert_eq!(units_to_decimal(U256::from(500_000u64), 6), 0.5);
        assert_eq!(decimal_to_units(0.5, 6).unwrap(), U256::from(500_000u64));
        // 10 USDT
        assert_eq!(units_to_decimal(U256::from(10_000_000u64), 6), 10.0);
        assert_eq!(decimal_to_units(10.0, 6).unwrap(), U256::from(10_000_000u64));
    }

    #[test]
    fn threshold_comparison_uses_decimal_balance() {
        let balance = units_to_decimal(U256::from(500_000u64), 6);
        assert!(balance < DEFAULT_THRESHOLD);
        let topped_up = units_to_decimal(U256::from(1_000_000u64), 6);
        assert!(topped_up >= DEFAULT_THRESHOLD);
    }

    #[test]
    fn negative_and_oversized_amounts_rejected() {
        assert!(decimal_to_units(0.0, 6).is_err());
        assert!(decimal_to_units(-1.0, 6).is_err());
        assert!(decimal_to_units(f64::NAN, 6).is_err());
        assert!(decimal_to_units(f64::INFINITY, 6).is_err());
    }

    #[test]
    fn oversized_balances_clamp_above_any_threshold() {
        assert_eq!(units_to_decimal(U256::MAX, 6), f64::MAX);
    }
}
