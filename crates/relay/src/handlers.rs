//! Relay HTTP endpoints

use crate::abi;
use crate::eip7702::{is_delegated_code, Authorization};
use crate::error::RelayError;
use crate::signer::RelaySigner;
use crate::submit;
use crate::verify::{recover_signer, vote_intent_digest};
use alloy_primitives::{Address, Bytes, B256};
use axum::{
    extract::{Path, State},
    routing::{get, post},
    Json, Router,
};
use chain_client::EvmRpcClient;
use chrono::Utc;
use indexer_types::Action;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Mutex;

#[derive(Debug, Clone)]
pub struct RelayConfig {
    pub chain_id: u64,
    pub vote_contract: Address,
    pub delegation_contract: Address,
    /// Gas limit for the first-use type-4 transaction.
    pub first_use_gas: u64,
    /// Gas limit once the user is delegated.
    pub regular_gas: u64,
}

impl RelayConfig {
    pub fn new(chain_id: u64, vote_contract: Address, delegation_contract: Address) -> Self {
        Self {
            chain_id,
            vote_contract,
            delegation_contract,
            first_use_gas: 300_000,
            regular_gas: 150_000,
        }
    }
}

/// Shared state for the relay handlers.
pub struct RelayContext {
    pub rpc: Arc<EvmRpcClient>,
    pub signer: RelaySigner,
    pub config: RelayConfig,
    /// Locally tracked relay-wallet nonce; None forces a refetch.
    pub tx_nonce: Mutex<Option<u64>>,
}

impl RelayContext {
    pub fn new(rpc: Arc<EvmRpcClient>, signer: RelaySigner, config: RelayConfig) -> Self {
        Self {
            rpc,
            signer,
            config,
            tx_nonce: Mutex::new(None),
        }
    }
}

/// Build the relay router. Mounted alongside the spectator routes.
pub fn router(ctx: Arc<RelayContext>) -> Router {
    Router::new()
        .route("/relay", post(handle_relay))
        .route("/relay/nonce/{address}", get(handle_nonce))
        .route("/relay/delegated/{address}", get(handle_delegated))
        .route("/relay/health", get(handle_health))
        .with_state(ctx)
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct RelayRequest {
    pub user_address: Address,
    pub action: u8,
    pub deadline: u64,
    pub signature: Bytes,
    #[serde(default)]
    pub authorization: Option<Authorization>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RelayResponse {
    pub tx_hash: B256,
    pub duration_ms: u64,
    pub delegated: bool,
}

async fn handle_relay(
    State(ctx): State<Arc<RelayContext>>,
    Json(body): Json<Value>,
) -> Result<Json<RelayResponse>, RelayError> {
    let started = Instant::now();

    // Hand-parse so malformed bodies surface as 400, not the framework's
    // default rejection.
    let request: RelayRequest = serde_json::from_value(body)
        .map_err(|e| RelayError::BadRequest(e.to_string()))?;

    let action =
        Action::from_code(request.action).ok_or(RelayError::InvalidAction(request.action))?;
    if request.deadline <= Utc::now().timestamp() as u64 {
        return Err(RelayError::DeadlineExpired);
    }
    if request.signature.len() != 65 {
        return Err(RelayError::BadRequest(format!(
            "signature must be 65 bytes, got {}",
            request.signature.len()
        )));
    }

    let delegated = user_is_delegated(&ctx, request.user_address).await?;
    if !delegated && request.authorization.is_none() {
        return Err(RelayError::MissingAuthorization);
    }

    // Before delegation the account has never executed, so its nonce is 0.
    let execute_nonce = if delegated {
        read_execute_nonce(&ctx, request.user_address).await?
    } else {
        0
    };

    let digest = vote_intent_digest(
        ctx.config.chain_id,
        request.user_address,
        execute_nonce,
        ctx.config.vote_contract,
        action.code(),
        request.deadline,
    );
    if recover_signer(digest, &request.signature)? != request.user_address {
        return Err(RelayError::BadSignature);
    }

    let tx_hash = submit::submit_vote(
        &ctx,
        request.user_address,
        action.code(),
        request.deadline,
        &request.signature,
        request.authorization,
        delegated,
    )
    .await?;

    Ok(Json(RelayResponse {
        tx_hash,
        duration_ms: started.elapsed().as_millis() as u64,
        delegated: true,
    }))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct NonceResponse {
    address: Address,
    execute_nonce: u64,
}

async fn handle_nonce(
    State(ctx): State<Arc<RelayContext>>,
    Path(address): Path<Address>,
) -> Result<Json<NonceResponse>, RelayError> {
    let execute_nonce = if user_is_delegated(&ctx, address).await? {
        read_execute_nonce(&ctx, address).await?
    } else {
        0
    };
    Ok(Json(NonceResponse {
        address,
        execute_nonce,
    }))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct DelegatedResponse {
    address: Address,
    delegated: bool,
}

async fn handle_delegated(
    State(ctx): State<Arc<RelayContext>>,
    Path(address): Path<Address>,
) -> Result<Json<DelegatedResponse>, RelayError> {
    let delegated = user_is_delegated(&ctx, address).await?;
    Ok(Json(DelegatedResponse { address, delegated }))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct HealthResponse {
    relay_address: Address,
    /// Wallet balance in wei, decimal.
    balance: String,
    vote_contract: Address,
    delegation_contract: Address,
    chain_id: u64,
}

async fn handle_health(
    State(ctx): State<Arc<RelayContext>>,
) -> Result<Json<HealthResponse>, RelayError> {
    let relay_address = ctx.signer.address();
    let balance = ctx.rpc.get_balance(relay_address).await?;
    Ok(Json(HealthResponse {
        relay_address,
        balance: balance.to_string(),
        vote_contract: ctx.config.vote_contract,
        delegation_contract: ctx.config.delegation_contract,
        chain_id: ctx.config.chain_id,
    }))
}

async fn user_is_delegated(ctx: &RelayContext, user: Address) -> Result<bool, RelayError> {
    let code = ctx.rpc.get_code(user).await?;
    Ok(is_delegated_code(&code, ctx.config.delegation_contract))
}

/// Read the execute-nonce from the user's delegated account.
///
/// The call goes to the user's EOA address, not the delegation contract:
/// delegated code runs against the EOA's own storage, so that is where the
/// nonce lives.
pub(crate) async fn read_execute_nonce(
    ctx: &RelayContext,
    user: Address,
) -> Result<u64, RelayError> {
    let calldata = abi::encode_get_nonce(user);
    let output = ctx.rpc.call(user, Bytes::from(calldata)).await?;
    let nonce = abi::decode_uint(&output)
        .ok_or_else(|| RelayError::Upstream("malformed getNonce output".into()))?;
    Ok(nonce.saturating_to::<u64>())
}
