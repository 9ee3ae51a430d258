//! Chain access for the swap executor.
//!
//! Defines the narrow RPC surface the executor depends on: batched static
//! calls, gas estimation, fee data, operation submission and simulation,
//! plus the alloy-backed implementation and call encode/decode helpers.

use alloy_primitives::{Address, Bytes, B256, U256};
use alloy_signer_local::PrivateKeySigner;
use async_trait::async_trait;
use executor_types::UserOperation;
use thiserror::Error;

pub mod abi;
pub mod calls;
pub mod implementations {
	pub mod rpc;
}

pub use implementations::rpc::RpcChainClient;

/// Errors raised by the chain boundary.
#[derive(Debug, Error)]
pub enum ChainError {
	/// Transport or RPC-level failure.
	#[error("Network error: {0}")]
	Network(String),
	/// A contract call reverted or returned malformed data.
	#[error("Call error: {0}")]
	Call(String),
	/// Returned bytes did not decode as the expected type.
	#[error("Decode error: {0}")]
	Decode(String),
}

/// One entry in a batched static call.
#[derive(Debug, Clone)]
pub struct BatchCall {
	/// Contract to call.
	pub target: Address,
	/// Whether the batch tolerates this call reverting.
	pub allow_failure: bool,
	/// Encoded call data.
	pub call_data: Bytes,
}

/// The positional result of one batched call.
#[derive(Debug, Clone)]
pub struct BatchResult {
	/// Whether the call succeeded.
	pub success: bool,
	/// Raw returned bytes.
	pub return_data: Bytes,
}

/// Outcome of a non-mutating operation simulation.
///
/// The entry point's simulate call always reverts; a successful simulation
/// reverts with the probe's result, a failed one with a reason.
#[derive(Debug, Clone)]
pub enum SimulationOutcome {
	/// The operation validated and executed; the probe ran afterwards.
	Executed {
		/// Whether the probe call itself succeeded.
		target_success: bool,
		/// The probe's encoded return data.
		target_result: Bytes,
	},
	/// The operation was rejected.
	Failed {
		/// Entry-point failure reason.
		reason: String,
	},
}

/// The chain RPC surface the executor core depends on.
#[async_trait]
pub trait ChainClient: Send + Sync {
	/// Executes many read-only calls in one round trip, returning results
	/// in call order.
	async fn aggregate(&self, calls: &[BatchCall]) -> Result<Vec<BatchResult>, ChainError>;

	/// Estimates gas for a call.
	async fn estimate_gas(
		&self,
		from: Address,
		to: Address,
		data: Bytes,
	) -> Result<u64, ChainError>;

	/// Base fee of the latest block.
	async fn latest_base_fee(&self) -> Result<u128, ChainError>;

	/// The smart account's operation nonce. Fails when the account is not
	/// yet deployed.
	async fn account_nonce(&self, account: Address) -> Result<U256, ChainError>;

	/// Estimates gas for a `handleOps` batch as submitted by `from`.
	async fn estimate_handle_ops(
		&self,
		from: Address,
		ops: &[UserOperation],
		beneficiary: Address,
	) -> Result<u64, ChainError>;

	/// Submits a `handleOps` batch signed by the given relayer and returns
	/// the transaction hash without waiting for inclusion. `gas_limit` is
	/// the caller's estimate; the implementation pads it.
	async fn submit_handle_ops(
		&self,
		relayer: &PrivateKeySigner,
		ops: &[UserOperation],
		beneficiary: Address,
		gas_limit: u64,
	) -> Result<B256, ChainError>;

	/// Blocks until the transaction is included in a block.
	async fn wait_for_inclusion(&self, hash: B256) -> Result<(), ChainError>;

	/// Simulates one operation with an attached read probe.
	async fn simulate_handle_op(
		&self,
		op: &UserOperation,
		probe: &BatchCall,
	) -> Result<SimulationOutcome, ChainError>;
}
