//! Typed-transaction encoding
//!
//! RLP encodes exactly the two envelopes the relay emits: EIP-1559 (type 2)
//! for delegated users and EIP-7702 (type 4) carrying one authorization for
//! first use. Both use an empty access list.

use crate::eip7702::Authorization;
use alloy_primitives::{keccak256, Address, B256, U256};

/// Recoverable secp256k1 signature over a transaction hash.
#[derive(Debug, Clone, Copy)]
pub struct TxSignature {
    pub y_parity: u8,
    pub r: U256,
    pub s: U256,
}

pub const TX_TYPE_EIP1559: u8 = 0x02;
pub const TX_TYPE_EIP7702: u8 = 0x04;

#[derive(Debug, Clone)]
pub struct Eip1559Tx {
    pub chain_id: u64,
    pub nonce: u64,
    pub max_priority_fee: U256,
    pub max_fee: U256,
    pub gas_limit: u64,
    pub to: Address,
    pub value: U256,
    pub data: Vec<u8>,
}

impl Eip1559Tx {
    fn fields(&self, out: &mut Vec<u8>) {
        rlp::uint64(out, self.chain_id);
        rlp::uint64(out, self.nonce);
        rlp::uint256(out, self.max_priority_fee);
        rlp::uint256(out, self.max_fee);
        rlp::uint64(out, self.gas_limit);
        rlp::bytes(out, self.to.as_slice());
        rlp::uint256(out, self.value);
        rlp::bytes(out, &self.data);
        rlp::empty_list(out); // access list
    }

    /// Hash the relay wallet signs.
    pub fn signing_hash(&self) -> B256 {
        let mut fields = Vec::new();
        self.fields(&mut fields);
        typed_hash(TX_TYPE_EIP1559, fields)
    }

    /// Wire-ready raw transaction.
    pub fn raw(&self, signature: &TxSignature) -> Vec<u8> {
        let mut fields = Vec::new();
        self.fields(&mut fields);
        append_signature(&mut fields, signature);
        typed_envelope(TX_TYPE_EIP1559, fields)
    }
}

#[derive(Debug, Clone)]
pub struct Eip7702Tx {
    pub chain_id: u64,
    pub nonce: u64,
    pub max_priority_fee: U256,
    pub max_fee: U256,
    pub gas_limit: u64,
    pub to: Address,
    pub value: U256,
    pub data: Vec<u8>,
    pub authorization_list: Vec<Authorization>,
}

impl Eip7702Tx {
    fn fields(&self, out: &mut Vec<u8>) {
        rlp::uint64(out, self.chain_id);
        rlp::uint64(out, self.nonce);
        rlp::uint256(out, self.max_priority_fee);
        rlp::uint256(out, self.max_fee);
        rlp::uint64(out, self.gas_limit);
        rlp::bytes(out, self.to.as_slice());
        rlp::uint256(out, self.value);
        rlp::bytes(out, &self.data);
        rlp::empty_list(out); // access list

        let mut auth_payload = Vec::new();
        for auth in &self.authorization_list {
            let mut tuple = Vec::new();
            rlp::uint64(&mut tuple, auth.chain_id);
            rlp::bytes(&mut tuple, auth.address.as_slice());
            rlp::uint64(&mut tuple, auth.nonce);
            rlp::uint64(&mut tuple, auth.y_parity as u64);
            rlp::uint256(&mut tuple, auth.r);
            rlp::uint256(&mut tuple, auth.s);
            rlp::list(&mut auth_payload, tuple);
        }
        rlp::list(out, auth_payload);
    }

    pub fn signing_hash(&self) -> B256 {
        let mut fields = Vec::new();
        self.fields(&mut fields);
        typed_hash(TX_TYPE_EIP7702, fields)
    }

    pub fn raw(&self, signature: &TxSignature) -> Vec<u8> {
        let mut fields = Vec::new();
        self.fields(&mut fields);
        append_signature(&mut fields, signature);
        typed_envelope(TX_TYPE_EIP7702, fields)
    }
}

fn append_signature(fields: &mut Vec<u8>, signature: &TxSignature) {
    rlp::uint64(fields, signature.y_parity as u64);
    rlp::uint256(fields, signature.r);
    rlp::uint256(fields, signature.s);
}

fn typed_envelope(tx_type: u8, fields: Vec<u8>) -> Vec<u8> {
    let mut envelope = vec![tx_type];
    rlp::list(&mut envelope, fields);
    envelope
}

fn typed_hash(tx_type: u8, fields: Vec<u8>) -> B256 {
    keccak256(typed_envelope(tx_type, fields))
}

/// Just enough RLP for typed transactions.
pub mod rlp {
    use alloy_primitives::U256;

    /// Append a string item.
    pub fn bytes(out: &mut Vec<u8>, data: &[u8]) {
        if data.len() == 1 && data[0] < 0x80 {
            out.push(data[0]);
        } else {
            length_prefix(out, data.len(), 0x80);
            out.extend_from_slice(data);
        }
    }

    /// Append an integer as its minimal big-endian representation.
    pub fn uint256(out: &mut Vec<u8>, value: U256) {
        let be = value.to_be_bytes::<32>();
        let start = be.iter().position(|b| *b != 0).unwrap_or(32);
        bytes(out, &be[start..]);
    }

    pub fn uint64(out: &mut Vec<u8>, value: u64) {
        uint256(out, U256::from(value));
    }

    /// Append a list item wrapping an already-encoded payload.
    pub fn list(out: &mut Vec<u8>, payload: Vec<u8>) {
        length_prefix(out, payload.len(), 0xc0);
        out.extend_from_slice(&payload);
    }

    pub fn empty_list(out: &mut Vec<u8>) {
        out.push(0xc0);
    }

    fn length_prefix(out: &mut Vec<u8>, len: usize, offset: u8) {
        if len <= 55 {
            out.push(offset + len as u8);
        } else {
            let len_bytes = (len as u64).to_be_bytes();
            let start = len_bytes.iter().position(|b| *b != 0).expect("len > 55");
            out.push(offset + 55 + (8 - start) as u8);
            out.extend_from_slice(&len_bytes[start..]);
        }
    }
}
