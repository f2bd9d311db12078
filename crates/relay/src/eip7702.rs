//! EIP-7702 delegation helpers
//!
//! A delegated EOA carries the 3-byte marker `0xef0100` followed by the
//! delegation contract's address as its on-chain code. Checking delegation
//! is a byte-compare against that 23-byte designator.

use alloy_primitives::{Address, U256};
use serde::Deserialize;

/// Delegation designator prefix.
pub const DELEGATION_PREFIX: [u8; 3] = [0xef, 0x01, 0x00];

/// A signed authorization tuple as supplied by the client on first use.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Authorization {
    pub chain_id: u64,
    pub address: Address,
    pub nonce: u64,
    pub y_parity: u8,
    pub r: U256,
    pub s: U256,
}

/// The exact code a delegated EOA carries for `contract`.
pub fn delegation_code(contract: Address) -> [u8; 23] {
    let mut code = [0u8; 23];
    code[..3].copy_from_slice(&DELEGATION_PREFIX);
    code[3..].copy_from_slice(contract.as_slice());
    code
}

/// Whether on-chain `code` marks a delegation to `contract`.
pub fn is_delegated_code(code: &[u8], contract: Address) -> bool {
    code == delegation_code(contract)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_delegation_code_shape() {
        let contract = Address::repeat_byte(0x44);
        let code = delegation_code(contract);
        assert_eq!(code.len(), 23);
        assert_eq!(&code[..3], &[0xef, 0x01, 0x00]);
        assert_eq!(&code[3..], contract.as_slice());
    }

    #[test]
    fn test_is_delegated_code() {
        let contract = Address::repeat_byte(0x44);
        let other = Address::repeat_byte(0x55);

        assert!(is_delegated_code(&delegation_code(contract), contract));
        // Wrong target contract.
        assert!(!is_delegated_code(&delegation_code(other), contract));
        // Plain EOA (no code) and ordinary contract code.
        assert!(!is_delegated_code(&[], contract));
        assert!(!is_delegated_code(&[0x60, 0x80, 0x60, 0x40], contract));
    }

    #[test]
    fn test_authorization_deserializes_from_client_json() {
        let raw = serde_json::json!({
            "chainId": 6342,
            "address": "0x4444444444444444444444444444444444444444",
            "nonce": 0,
            "yParity": 1,
            "r": "0x1",
            "s": "0x2"
        });
        let auth: Authorization = serde_json::from_value(raw).unwrap();
        assert_eq!(auth.chain_id, 6342);
        assert_eq!(auth.nonce, 0);
        assert_eq!(auth.y_parity, 1);
        assert_eq!(auth.r, U256::from(1));
    }
}
