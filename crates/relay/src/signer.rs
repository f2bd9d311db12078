//! Relay wallet signing

use crate::error::RelayError;
use crate::tx::TxSignature;
use alloy_primitives::{hex, keccak256, Address, B256, U256};
use k256::ecdsa::SigningKey;

/// Holds the relay's secp256k1 key and signs transaction hashes.
pub struct RelaySigner {
    key: SigningKey,
}

impl RelaySigner {
    /// Load from a 32-byte hex private key (with or without 0x prefix).
    pub fn from_hex(private_key: &str) -> Result<Self, RelayError> {
        let bytes = hex::decode(private_key)
            .map_err(|_| RelayError::BadRequest("invalid relay key hex".into()))?;
        let key = SigningKey::from_slice(&bytes)
            .map_err(|_| RelayError::BadRequest("invalid relay private key".into()))?;
        Ok(Self { key })
    }

    /// The relay wallet address.
    pub fn address(&self) -> Address {
        address_of(&self.key.verifying_key().to_encoded_point(false).as_bytes()[1..])
    }

    /// Recoverable signature over a 32-byte hash.
    pub fn sign_hash(&self, hash: B256) -> TxSignature {
        let (signature, recovery_id) = self
            .key
            .sign_prehash_recoverable(hash.as_slice())
            .expect("signing a 32-byte digest cannot fail");
        let bytes = signature.to_bytes();
        TxSignature {
            y_parity: recovery_id.to_byte(),
            r: U256::from_be_slice(&bytes[..32]),
            s: U256::from_be_slice(&bytes[32..]),
        }
    }
}

/// Ethereum address of an uncompressed public key (without the 0x04 tag).
pub fn address_of(uncompressed_pubkey: &[u8]) -> Address {
    let hash = keccak256(uncompressed_pubkey);
    Address::from_slice(&hash[12..])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::verify::recover_signer;

    #[test]
    fn test_known_key_address() {
        // The canonical dev key; its address is well known.
        let signer = RelaySigner::from_hex(
            "0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80",
        )
        .unwrap();
        assert_eq!(
            signer.address(),
            "0xf39Fd6e51aad88F6F4ce6aB8827279cffFb92266"
                .parse::<Address>()
                .unwrap()
        );
    }

    #[test]
    fn test_bad_key_rejected() {
        assert!(RelaySigner::from_hex("0x1234").is_err());
        assert!(RelaySigner::from_hex("not hex").is_err());
    }

    #[test]
    fn test_sign_then_recover_roundtrip() {
        let signer = RelaySigner::from_hex(
            "0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80",
        )
        .unwrap();
        let digest = keccak256(b"relay signing roundtrip");
        let signature = signer.sign_hash(digest);

        let mut wire = [0u8; 65];
        wire[..32].copy_from_slice(&signature.r.to_be_bytes::<32>());
        wire[32..64].copy_from_slice(&signature.s.to_be_bytes::<32>());
        wire[64] = signature.y_parity;

        let recovered = recover_signer(digest, &wire).unwrap();
        assert_eq!(recovered, signer.address());
    }
}
