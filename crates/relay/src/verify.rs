//! Vote-intent verification
//!
//! The client personal-signs a digest binding chain, user, execute-nonce,
//! vote contract, action, and deadline. The relay recovers the signer before
//! spending any gas; the delegation contract re-verifies on chain.

use crate::error::RelayError;
use crate::signer::address_of;
use alloy_primitives::{keccak256, Address, B256, U256};
use k256::ecdsa::{RecoveryId, Signature, VerifyingKey};

const EIP191_PREFIX: &[u8] = b"\x19Ethereum Signed Message:\n32";

/// Digest a vote intent the way the wallet SDK does: one packed preimage,
/// keccak'd, then wrapped in the EIP-191 personal-sign envelope.
pub fn vote_intent_digest(
    chain_id: u64,
    user: Address,
    execute_nonce: u64,
    vote_contract: Address,
    action: u8,
    deadline: u64,
) -> B256 {
    let mut preimage = Vec::with_capacity(32 + 20 + 32 + 20 + 1 + 32);
    preimage.extend_from_slice(&U256::from(chain_id).to_be_bytes::<32>());
    preimage.extend_from_slice(user.as_slice());
    preimage.extend_from_slice(&U256::from(execute_nonce).to_be_bytes::<32>());
    preimage.extend_from_slice(vote_contract.as_slice());
    preimage.push(action);
    preimage.extend_from_slice(&U256::from(deadline).to_be_bytes::<32>());
    let inner = keccak256(&preimage);

    let mut wrapped = Vec::with_capacity(EIP191_PREFIX.len() + 32);
    wrapped.extend_from_slice(EIP191_PREFIX);
    wrapped.extend_from_slice(inner.as_slice());
    keccak256(&wrapped)
}

/// Recover the signer of a 65-byte `r || s || v` signature over `digest`.
/// Accepts both 0/1 and 27/28 recovery values.
pub fn recover_signer(digest: B256, signature: &[u8]) -> Result<Address, RelayError> {
    if signature.len() != 65 {
        return Err(RelayError::BadRequest(format!(
            "signature must be 65 bytes, got {}",
            signature.len()
        )));
    }

    let v = signature[64];
    let recovery = match v {
        0 | 1 => v,
        27 | 28 => v - 27,
        _ => return Err(RelayError::BadRequest(format!("bad recovery id {v}"))),
    };
    let recovery_id =
        RecoveryId::try_from(recovery).map_err(|_| RelayError::BadSignature)?;
    let parsed =
        Signature::from_slice(&signature[..64]).map_err(|_| RelayError::BadSignature)?;

    let key = VerifyingKey::recover_from_prehash(digest.as_slice(), &parsed, recovery_id)
        .map_err(|_| RelayError::BadSignature)?;
    Ok(address_of(&key.to_encoded_point(false).as_bytes()[1..]))
}
