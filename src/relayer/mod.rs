//! Claim orchestration: the gasless operations executed on behalf of users.
//!
//! Every claim variant walks its precondition list in declared order and
//! reports the first violation; nothing is signed or broadcast until every
//! check has passed. The on-chain contract stays the final arbiter for races
//! this service deliberately does not serialize (two users claiming at once).

use alloy::primitives::{Address, U256};
use alloy::sol_types::SolCall;
use chrono::Utc;
use sea_orm::ActiveValue::Set;
use sea_orm::EntityTrait;
use sea_orm::sea_query::OnConflict;
use serde_json::Value;
use tracing::{info, warn};

use crate::chain::contracts::IFaucet;
use crate::chain::{self, ChainClient, tx};
use crate::codes;
use crate::entities::prelude::QuestTask;
use crate::entities::quest_task;
use crate::error::RelayError;
use crate::state::AppState;

/// Which precondition set gates the claim.
#[derive(Debug, Clone)]
pub enum ClaimVariant {
    /// Drop-code gated
    Coded { secret_code: String },
    /// No code; faucet relies on whitelisting alone
    Codeless,
    /// Per-user amount set on the contract beforehand
    Custom,
}

#[derive(Debug, Clone)]
pub struct ClaimRequest {
    pub user_address: String,
    pub faucet_address: String,
    pub chain_id: u64,
    pub should_whitelist: bool,
    /// Raw referral bytes, already hex-decoded by the caller
    pub referral: Vec<u8>,
}

/// Execute a claim variant end to end and return the claim transaction hash.
pub async fn claim(
    state: &AppState,
    request: ClaimRequest,
    variant: ClaimVariant,
) -> Result<String, RelayError> {
    // Shared preconditions, in declared order
    let user = chain::parse_address(&request.user_address)?;
    let faucet = chain::parse_address(&request.faucet_address)?;
    let faucet_key = faucet.to_checksum(None);

    let client = state.registry.connect(request.chain_id).await?;
    let handle = IFaucet::new(faucet, client.provider().clone());

    let paused = handle
        .paused()
        .call()
        .await
        .map_err(|err| view_error(&client, "paused", err))?;
    if paused {
        return Err(RelayError::FaucetPaused);
    }

    state.operator.ensure_funded(&client).await?;

    // Variant preconditions, each short-circuiting before the next view call
    match &variant {
        ClaimVariant::Coded { secret_code } => {
            codes::verify(&state.database, &faucet_key, secret_code).await?;
            ensure_not_claimed(&client, &handle, user).await?;
        }
        ClaimVariant::Codeless => {
            ensure_not_claimed(&client, &handle, user).await?;
        }
        ClaimVariant::Custom => {
            let has_custom = handle
                .hasCustomClaimAmount(user)
                .call()
                .await
                .map_err(|err| view_error(&client, "hasCustomClaimAmount", err))?;
            if !has_custom {
                return Err(RelayError::NoCustomAmount);
            }
            let amount = handle
                .getCustomClaimAmount(user)
                .call()
                .await
                .map_err(|err| view_error(&client, "getCustomClaimAmount", err))?;
            if amount == U256::ZERO {
                return Err(RelayError::ZeroCustomAmount);
            }
            ensure_not_claimed(&client, &handle, user).await?;
        }
    }

    let operator = state.operator.address();
    // The nonce lock covers pending-count reads through broadcast; the
    // receipt wait happens after release so one slow chain does not stall
    // every other request on it
    let guard = state.operator.lock_chain(request.chain_id).await;

    if request.should_whitelist {
        let calldata = IFaucet::setWhitelistCall {
            account: user,
            status: true,
        }
        .abi_encode();
        let whitelist_tx = tx::build_call(&client, operator, faucet, calldata).await?;
        // Whitelisting must land before the claim executes, so this one is
        // awaited under the lock
        let whitelist_hash = state.operator.submit(&client, whitelist_tx).await?;
        info!(%whitelist_hash, user = %user, "Whitelisted before claim");
    }

    let calldata = IFaucet::claimCall { users: vec![user] }.abi_encode();
    let mut claim_tx = tx::build_call(&client, operator, faucet, calldata).await?;
    tx::splice_referral(&client, &mut claim_tx, operator, &request.referral).await?;

    let tx_hash = state.operator.sign_and_send(&client, &claim_tx).await?;
    drop(guard);
    state
        .operator
        .await_receipt(&client, &claim_tx, tx_hash)
        .await?;

    info!(
        %tx_hash,
        user = %user,
        faucet = %faucet_key,
        chain_id = request.chain_id,
        "Claim relayed"
    );
    Ok(tx_hash.to_string())
}

async fn ensure_not_claimed(
    client: &ChainClient,
    handle: &IFaucet::IFaucetInstance<alloy::providers::RootProvider>,
    user: Address,
) -> Result<(), RelayError> {
    let has_claimed = handle
        .hasClaimed(user)
        .call()
        .await
        .map_err(|err| view_error(client, "hasClaimed", err))?;
    if has_claimed {
        return Err(RelayError::AlreadyClaimed);
    }
    Ok(())
}

/// On-chain authorization oracle: owner, admin or designated backend.
/// Individual view failures are swallowed so a faucet missing one selector
/// can still authorize through another; all three failing or returning false
/// means unauthorized.
pub async fn is_authorized(client: &ChainClient, faucet: Address, user: Address) -> bool {
    let handle = IFaucet::new(faucet, client.provider().clone());

    match handle.owner().call().await {
        Ok(owner) if owner == user => return true,
        Ok(_) => {}
        Err(err) => warn!(faucet = %faucet, "owner() check failed: {err}"),
    }
    match handle.isAdmin(user).call().await {
        Ok(true) => return true,
        Ok(false) => {}
        Err(err) => warn!(faucet = %faucet, "isAdmin() check failed: {err}"),
    }
    match handle.BACKEND().call().await {
        Ok(backend) if backend == user => return true,
        Ok(_) => {}
        Err(err) => warn!(faucet = %faucet, "BACKEND() check failed: {err}"),
    }
    false
}

/// Whitelist a user on a faucet, gated on the caller's on-chain authority.
pub async fn whitelist(
    state: &AppState,
    chain_id: u64,
    faucet_address: &str,
    user_address: &str,
    caller_address: &str,
) -> Result<String, RelayError> {
    let faucet = chain::parse_address(faucet_address)?;
    let user = chain::parse_address(user_address)?;
    let caller = chain::parse_address(caller_address)?;

    let client = state.registry.connect(chain_id).await?;
    if !is_authorized(&client, faucet, caller).await {
        return Err(RelayError::Unauthorized);
    }
    state.operator.ensure_funded(&client).await?;

    let operator = state.operator.address();
    let guard = state.operator.lock_chain(chain_id).await;
    let calldata = IFaucet::setWhitelistCall {
        account: user,
        status: true,
    }
    .abi_encode();
    let whitelist_tx = tx::build_call(&client, operator, faucet, calldata).await?;
    let tx_hash = state.operator.sign_and_send(&client, &whitelist_tx).await?;
    drop(guard);
    state
        .operator
        .await_receipt(&client, &whitelist_tx, tx_hash)
        .await?;

    Ok(tx_hash.to_string())
}

#[derive(Debug, Clone)]
pub struct ClaimParameters {
    pub faucet_address: String,
    pub claim_amount: f64,
    pub start_time: i64,
    pub end_time: i64,
    pub chain_id: u64,
    pub tasks: Option<Value>,
}

#[derive(Debug, Clone)]
pub struct ClaimParametersOutcome {
    pub secret_code: String,
    pub tasks_stored: bool,
}

/// Generate and store a fresh drop code for the faucet's claim window. The
/// on-chain `setClaimParameters` is sent by the admin's own wallet, not by
/// this service; only the off-chain state changes here.
pub async fn set_claim_parameters(
    state: &AppState,
    params: ClaimParameters,
) -> Result<ClaimParametersOutcome, RelayError> {
    let faucet_key = chain::checksummed(&params.faucet_address)?;
    state.registry.resolve(params.chain_id)?;

    if params.claim_amount <= 0.0 || !params.claim_amount.is_finite() {
        return Err(RelayError::Internal(
            "claim amount must be a positive number".to_string(),
        ));
    }
    if params.end_time <= params.start_time {
        return Err(RelayError::Internal(
            "claim window must end after it starts".to_string(),
        ));
    }

    let secret_code = codes::generate_code();
    codes::upsert_row(
        &state.database,
        &faucet_key,
        &secret_code,
        params.start_time,
        params.end_time,
    )
    .await?;

    let tasks_stored = match params.tasks {
        Some(tasks) => {
            store_tasks(state, &faucet_key, tasks).await?;
            true
        }
        None => false,
    };

    info!(faucet = %faucet_key, tasks_stored, "Claim parameters set");
    Ok(ClaimParametersOutcome {
        secret_code,
        tasks_stored,
    })
}

async fn store_tasks(state: &AppState, faucet_key: &str, tasks: Value) -> Result<(), RelayError> {
    let model = quest_task::ActiveModel {
        faucet_address: Set(faucet_key.to_string()),
        tasks: Set(tasks),
        updated_at: Set(Utc::now().fixed_offset()),
    };
    QuestTask::insert(model)
        .on_conflict(
            OnConflict::column(quest_task::Column::FaucetAddress)
                .update_columns([quest_task::Column::Tasks, quest_task::Column::UpdatedAt])
                .to_owned(),
        )
        .exec(&state.database)
        .await?;
    Ok(())
}

/// Pre-claim probe the frontend polls before enabling the claim button.
#[derive(Debug, Clone, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClaimStatus {
    pub paused: bool,
    pub has_claimed: bool,
    pub has_custom_amount: bool,
    /// Raw integer units as a decimal string; zero when no custom amount
    pub custom_amount: String,
}

pub async fn claim_status(
    state: &AppState,
    chain_id: u64,
    faucet_address: &str,
    user_address: &str,
) -> Result<ClaimStatus, RelayError> {
    let faucet = chain::parse_address(faucet_address)?;
    let user = chain::parse_address(user_address)?;

    let client = state.registry.connect(chain_id).await?;
    let handle = IFaucet::new(faucet, client.provider().clone());

    let paused = handle
        .paused()
        .call()
        .await
        .map_err(|err| view_error(&client, "paused", err))?;
    let has_claimed = handle
        .hasClaimed(user)
        .call()
        .await
        .map_err(|err| view_error(&client, "hasClaimed", err))?;
    let has_custom_amount = handle
        .hasCustomClaimAmount(user)
        .call()
        .await
        .map_err(|err| view_error(&client, "hasCustomClaimAmount", err))?;
    let custom_amount = if has_custom_amount {
        handle
            .getCustomClaimAmount(user)
            .call()
            .await
            .map_err(|err| view_error(&client, "getCustomClaimAmount", err))?
    } else {
        U256::ZERO
    };

    Ok(ClaimStatus {
        paused,
        has_claimed,
        has_custom_amount,
        custom_amount: custom_amount.to_string(),
    })
}

/// Reveal the faucet's current code to an on-chain-authorized caller. The
/// unauthenticated metadata endpoint never includes the value; this one does.
pub async fn reveal_code(
    state: &AppState,
    chain_id: u64,
    faucet_address: &str,
    caller_address: &str,
) -> Result<crate::entities::drop_code::Model, RelayError> {
    let faucet = chain::parse_address(faucet_address)?;
    let caller = chain::parse_address(caller_address)?;

    let client = state.registry.connect(chain_id).await?;
    if !is_authorized(&client, faucet, caller).await {
        return Err(RelayError::Unauthorized);
    }

    codes::find_row(&state.database, &faucet.to_checksum(None))
        .await?
        .ok_or(RelayError::CodeMissing)
}

/// Swap the faucet's drop code; only on-chain-authorized callers may rotate.
pub async fn rotate_code(
    state: &AppState,
    chain_id: u64,
    faucet_address: &str,
    caller_address: &str,
) -> Result<String, RelayError> {
    let faucet = chain::parse_address(faucet_address)?;
    let caller = chain::parse_address(caller_address)?;

    let client = state.registry.connect(chain_id).await?;
    if !is_authorized(&client, faucet, caller).await {
        return Err(RelayError::Unauthorized);
    }

    let code = codes::rotate(&state.database, &faucet.to_checksum(None)).await?;
    info!(faucet = %faucet, "Drop code rotated");
    Ok(code)
}

fn view_error(client: &ChainClient, selector: &str, err: impl std::fmt::Display) -> RelayError {
    RelayError::RpcUnavailable {
        chain_id: client.chain_id(),
        reason: format!("{selector}() view call failed: {err}"),
    }
}
