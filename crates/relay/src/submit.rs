//! Transaction building and submission
//!
//! The outer transaction is always addressed to the user's EOA. First use
//! rides the type-4 envelope with the client's authorization tuple attached;
//! once delegated, votes go out as ordinary type-2 transactions with a
//! tighter gas limit.

use crate::abi;
use crate::eip7702::Authorization;
use crate::error::{classify_submit_error, RelayError};
use crate::handlers::RelayContext;
use crate::tx::{Eip1559Tx, Eip7702Tx};
use alloy_primitives::{Address, Bytes, B256, U256};
use chain_client::RpcClientError;

const ONE_GWEI: u64 = 1_000_000_000;

pub async fn submit_vote(
    ctx: &RelayContext,
    user: Address,
    action: u8,
    deadline: u64,
    intent_signature: &[u8],
    authorization: Option<Authorization>,
    delegated: bool,
) -> Result<B256, RelayError> {
    let vote_data = abi::encode_vote(action);
    let execute_data = abi::encode_execute(
        ctx.config.vote_contract,
        U256::ZERO,
        &vote_data,
        U256::from(deadline),
        intent_signature,
    );

    let gas_price = ctx.rpc.gas_price().await?;
    let max_fee = gas_price.saturating_mul(U256::from(2));
    let max_priority_fee = gas_price.min(U256::from(ONE_GWEI));

    // The local nonce is single-writer: hold the lock across the send so two
    // concurrent submissions can't race the same sequence number.
    let mut nonce_guard = ctx.tx_nonce.lock().await;
    let nonce = match *nonce_guard {
        Some(nonce) => nonce,
        None => ctx.rpc.get_transaction_count(ctx.signer.address()).await?,
    };

    let raw = if delegated {
        let tx = Eip1559Tx {
            chain_id: ctx.config.chain_id,
            nonce,
            max_priority_fee,
            max_fee,
            gas_limit: ctx.config.regular_gas,
            to: user,
            value: U256::ZERO,
            data: execute_data,
        };
        tx.raw(&ctx.signer.sign_hash(tx.signing_hash()))
    } else {
        let auth = authorization.ok_or(RelayError::MissingAuthorization)?;
        let tx = Eip7702Tx {
            chain_id: ctx.config.chain_id,
            nonce,
            max_priority_fee,
            max_fee,
            gas_limit: ctx.config.first_use_gas,
            to: user,
            value: U256::ZERO,
            data: execute_data,
            authorization_list: vec![auth],
        };
        tx.raw(&ctx.signer.sign_hash(tx.signing_hash()))
    };

    match ctx.rpc.send_raw_transaction(Bytes::from(raw)).await {
        Ok(tx_hash) => {
            *nonce_guard = Some(nonce + 1);
            tracing::info!(
                "Relayed vote for {}: tx {} (nonce {}, {})",
                user,
                tx_hash,
                nonce,
                if delegated { "delegated" } else { "first use" }
            );
            Ok(tx_hash)
        }
        Err(RpcClientError::Rpc { message, .. }) => {
            // Any rejection may mean our nonce view is stale; refetch on the
            // next submission.
            *nonce_guard = None;
            tracing::warn!("Vote submission rejected for {}: {}", user, message);
            Err(classify_submit_error(&message))
        }
        Err(e) => {
            *nonce_guard = None;
            tracing::warn!("Vote submission failed for {}: {}", user, e);
            Err(RelayError::Upstream(e.to_string()))
        }
    }
}
