//! Relay - gasless vote submission
//!
//! Verifies signed vote intents over HTTP, attaches an EIP-7702 delegation
//! authorization on a user's first submission, and submits the transaction
//! from the relay wallet so the voter pays no gas. The outer transaction is
//! addressed to the user's own account, whose delegated code routes into the
//! delegation contract while reading the user's storage.

pub mod abi;
pub mod eip7702;
pub mod error;
pub mod handlers;
pub mod signer;
pub mod submit;
pub mod tx;
pub mod verify;

pub use error::RelayError;
pub use handlers::{router, RelayConfig, RelayContext};
pub use signer::RelaySigner;
