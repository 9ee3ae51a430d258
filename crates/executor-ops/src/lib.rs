//! Account-abstraction operation construction and signing.
//!
//! Turns a set of sub-calls plus a capability proof into a signed
//! [`UserOperation`](executor_types::UserOperation) ready for relayer
//! dispatch. Gas, fee and nonce defaults are resolved through the chain
//! boundary at build time.

use alloy_primitives::Address;
use executor_chain::{ChainClient, ChainError};
use std::sync::Arc;
use thiserror::Error;

pub mod builder;
pub mod hashing;

pub use builder::SessionKeyOpBuilder;
pub use hashing::{pack_paymaster_data, pack_user_op, sign_user_op, user_op_hash};

/// Errors raised while building or signing operations.
#[derive(Debug, Error)]
pub enum OpsError {
	/// The builder was finalized without a token.
	#[error("No token provided")]
	MissingToken,
	/// The builder was finalized without any sub-calls.
	#[error("No transactions provided")]
	NoSubCalls,
	/// The session key refused to sign.
	#[error("Signing failed: {0}")]
	Signing(String),
	#[error(transparent)]
	Chain(#[from] ChainError),
}

/// Shared context the builder fills operations against.
pub struct OpEnvironment {
	/// Chain access for nonce, gas and fee resolution.
	pub chain: Arc<dyn ChainClient>,
	/// ERC-4337 entry point the operation hash is salted with.
	pub entry_point: Address,
	/// The session-key module the signature wrap names as authorizer.
	pub session_key_manager: Address,
	/// Chain id the operation hash is salted with.
	pub chain_id: u64,
}
