//! Minimal ABI encoding for the two contracts the relay talks to
//!
//! Only the call shapes we actually emit: `vote(uint8)` on the vote
//! contract, and `execute(address,uint256,bytes,uint256,bytes)` plus
//! `getNonce(address)` on the delegation contract.

use alloy_primitives::{keccak256, Address, U256};

const WORD: usize = 32;

/// First four bytes of the keccak of a function signature.
pub fn selector(signature: &str) -> [u8; 4] {
    let hash = keccak256(signature.as_bytes());
    [hash[0], hash[1], hash[2], hash[3]]
}

fn word_from_address(address: Address) -> [u8; WORD] {
    let mut word = [0u8; WORD];
    word[12..].copy_from_slice(address.as_slice());
    word
}

fn word_from_u256(value: U256) -> [u8; WORD] {
    value.to_be_bytes()
}

/// Dynamic `bytes` tail: length word followed by zero-padded content.
fn bytes_tail(data: &[u8]) -> Vec<u8> {
    let padded_len = data.len().div_ceil(WORD) * WORD;
    let mut tail = Vec::with_capacity(WORD + padded_len);
    tail.extend_from_slice(&word_from_u256(U256::from(data.len())));
    tail.extend_from_slice(data);
    tail.resize(WORD + padded_len, 0);
    tail
}

/// `vote(uint8 action)` calldata.
pub fn encode_vote(action: u8) -> Vec<u8> {
    let mut out = selector("vote(uint8)").to_vec();
    out.extend_from_slice(&word_from_u256(U256::from(action)));
    out
}

/// `getNonce(address user)` calldata.
pub fn encode_get_nonce(user: Address) -> Vec<u8> {
    let mut out = selector("getNonce(address)").to_vec();
    out.extend_from_slice(&word_from_address(user));
    out
}

/// `execute(address to, uint256 value, bytes data, uint256 deadline, bytes signature)` calldata.
pub fn encode_execute(
    to: Address,
    value: U256,
    data: &[u8],
    deadline: U256,
    signature: &[u8],
) -> Vec<u8> {
    let data_tail = bytes_tail(data);
    let sig_tail = bytes_tail(signature);

    // Five head words; the two dynamic args point past the head.
    let data_offset = 5 * WORD;
    let sig_offset = data_offset + data_tail.len();

    let mut out = selector("execute(address,uint256,bytes,uint256,bytes)").to_vec();
    out.extend_from_slice(&word_from_address(to));
    out.extend_from_slice(&word_from_u256(value));
    out.extend_from_slice(&word_from_u256(U256::from(data_offset)));
    out.extend_from_slice(&word_from_u256(deadline));
    out.extend_from_slice(&word_from_u256(U256::from(sig_offset)));
    out.extend_from_slice(&data_tail);
    out.extend_from_slice(&sig_tail);
    out
}

/// Decode a single uint256 return word.
pub fn decode_uint(output: &[u8]) -> Option<U256> {
    if output.len() < WORD {
        return None;
    }
    Some(U256::from_be_slice(&output[..WORD]))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vote_calldata() {
        let calldata = encode_vote(4);
        assert_eq!(calldata.len(), 4 + 32);
        assert_eq!(&calldata[..4], &selector("vote(uint8)"));
        assert_eq!(calldata[4 + 31], 4);
        assert!(calldata[4..4 + 31].iter().all(|b| *b == 0));
    }

    #[test]
    fn test_get_nonce_calldata() {
        let user = Address::repeat_byte(0x22);
        let calldata = encode_get_nonce(user);
        assert_eq!(calldata.len(), 4 + 32);
        assert_eq!(&calldata[4 + 12..], user.as_slice());
    }

    #[test]
    fn test_execute_layout() {
        let to = Address::repeat_byte(0x33);
        let data = encode_vote(1); // 36 bytes -> padded to 64
        let signature = vec![0xab; 65]; // padded to 96
        let calldata = encode_execute(to, U256::ZERO, &data, U256::from(1000), &signature);

        let word = |i: usize| &calldata[4 + i * 32..4 + (i + 1) * 32];
        // Head: to, value, data offset, deadline, signature offset.
        assert_eq!(&word(0)[12..], to.as_slice());
        assert_eq!(U256::from_be_slice(word(2)), U256::from(160));
        assert_eq!(U256::from_be_slice(word(3)), U256::from(1000));
        // Data tail = 32 (length) + 64 (padded content).
        assert_eq!(U256::from_be_slice(word(4)), U256::from(160 + 96));

        // Data length word then content.
        assert_eq!(U256::from_be_slice(word(5)), U256::from(36));
        assert_eq!(&calldata[4 + 6 * 32..4 + 6 * 32 + 36], data.as_slice());

        // Signature length word sits right after the data tail.
        let sig_len_at = 4 + 160 + 96;
        assert_eq!(
            U256::from_be_slice(&calldata[sig_len_at..sig_len_at + 32]),
            U256::from(65)
        );
        // Whole calldata ends on a word boundary.
        assert_eq!((calldata.len() - 4) % 32, 0);
    }

    #[test]
    fn test_decode_uint() {
        let mut word = [0u8; 32];
        word[31] = 7;
        assert_eq!(decode_uint(&word), Some(U256::from(7)));
        assert_eq!(decode_uint(&[1, 2, 3]), None);
    }
}
