//! Account-abstraction operation types.
//!
//! A [`UserOperation`] is the off-chain-signed intent object submitted to the
//! entry point on behalf of a smart account. Sub-calls are the individual
//! contract calls batched into one operation's call data.

use alloy_primitives::{Address, Bytes, U256};
use serde::{Deserialize, Serialize};

/// A single contract call executed by a smart account.
///
/// One or more sub-calls are encoded into a [`UserOperation`]'s call data;
/// a single sub-call uses the account's `execute` entry, several use
/// `executeBatch`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubCall {
	/// Destination contract.
	pub to: Address,
	/// Native value forwarded with the call.
	pub value: U256,
	/// Call data, empty for plain transfers.
	pub data: Bytes,
}

impl SubCall {
	/// A plain native-value transfer with no call data.
	pub fn transfer(to: Address, value: U256) -> Self {
		Self {
			to,
			value,
			data: Bytes::new(),
		}
	}
}

/// The capability-operation kind carried in the session-key signature wrap.
///
/// The on-chain session-key module uses this to select the policy applied
/// to the operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OpKind {
	/// Swap base asset into a token.
	Buy,
	/// Swap a token back into the base asset.
	Sell,
	/// Grant an ERC-20 allowance ahead of trading.
	PreApprove,
}

impl OpKind {
	/// Wire value expected by the session-key module.
	pub fn as_u8(self) -> u8 {
		match self {
			OpKind::Buy => 0,
			OpKind::Sell => 1,
			OpKind::PreApprove => 2,
		}
	}
}

/// An ERC-4337-style user operation.
///
/// The signature covers the hash of every other field, salted with the entry
/// point address and chain id. After signing, the signature field is re-wrapped
/// with the session-key capability payload; see `executor-ops`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserOperation {
	/// The smart account the operation acts for.
	pub sender: Address,
	/// Account nonce consumed by the operation.
	pub nonce: U256,
	/// Deployment code for counterfactual accounts, empty once deployed.
	pub init_code: Bytes,
	/// Encoded execute/executeBatch call.
	pub call_data: Bytes,
	/// Gas limit for the execution phase.
	pub call_gas_limit: U256,
	/// Gas limit for the validation phase.
	pub verification_gas_limit: U256,
	/// Gas paid to the bundler for pre-execution overhead.
	pub pre_verification_gas: U256,
	/// EIP-1559 fee cap.
	pub max_fee_per_gas: U256,
	/// EIP-1559 priority fee.
	pub max_priority_fee_per_gas: U256,
	/// Paymaster address plus packed paymaster payload, empty when the
	/// account pays its own gas.
	pub paymaster_and_data: Bytes,
	/// Wrapped session-key signature.
	pub signature: Bytes,
}

impl Default for UserOperation {
	fn default() -> Self {
		Self {
			sender: Address::ZERO,
			nonce: U256::ZERO,
			init_code: Bytes::new(),
			call_data: Bytes::new(),
			call_gas_limit: U256::ZERO,
			verification_gas_limit: U256::from(100_000u64),
			pre_verification_gas: U256::from(21_000u64),
			max_fee_per_gas: U256::ZERO,
			max_priority_fee_per_gas: U256::ZERO,
			paymaster_and_data: Bytes::new(),
			signature: Bytes::new(),
		}
	}
}
