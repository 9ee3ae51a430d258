//! Alloy-backed implementation of the chain boundary.

use crate::{
	abi::{IEntryPoint, IMulticall3, ISmartAccount, PackedUserOperation},
	BatchCall, BatchResult, ChainClient, ChainError, SimulationOutcome,
};
use alloy_network::EthereumWallet;
use alloy_primitives::{aliases::U192, Address, Bytes, TxKind, B256, U256};
use alloy_provider::{Provider, ProviderBuilder};
use alloy_rpc_types::{BlockNumberOrTag, BlockTransactionsKind, TransactionInput, TransactionRequest};
use alloy_signer_local::PrivateKeySigner;
use alloy_sol_types::{SolCall, SolError};
use alloy_transport_http::Http;
use async_trait::async_trait;
use executor_types::UserOperation;
use std::sync::Arc;

/// Gas padding added on top of the `handleOps` estimate.
const SUBMIT_GAS_PAD: u64 = 5_000;
/// Wei added on top of the base fee for relayer submissions.
const SUBMIT_FEE_PAD: u128 = 100;

fn truncate_hash(hash: &B256) -> String {
	let hash_str = hex::encode(hash.0);
	format!("{}..", &hash_str[..8])
}

/// HTTP RPC implementation of [`ChainClient`].
pub struct RpcChainClient {
	/// Read-only provider for calls and estimates.
	provider: Arc<dyn Provider<Http<reqwest::Client>> + Send + Sync>,
	/// Endpoint URL, used to build per-relayer signing providers.
	url: reqwest::Url,
	/// ERC-4337 entry point.
	entry_point: Address,
	/// Multicall3 aggregator.
	multicall: Address,
	/// Chain id for submissions.
	chain_id: u64,
}

impl RpcChainClient {
	pub fn new(
		rpc_url: &str,
		chain_id: u64,
		entry_point: Address,
		multicall: Address,
	) -> Result<Self, ChainError> {
		let url: reqwest::Url = rpc_url
			.parse()
			.map_err(|e| ChainError::Network(format!("Invalid RPC URL: {}", e)))?;

		let provider = ProviderBuilder::new().on_http(url.clone());

		Ok(Self {
			provider: Arc::new(provider),
			url,
			entry_point,
			multicall,
			chain_id,
		})
	}

	fn static_call(&self, to: Address, data: Vec<u8>) -> TransactionRequest {
		TransactionRequest {
			to: Some(TxKind::Call(to)),
			input: TransactionInput::new(data.into()),
			..Default::default()
		}
	}

	fn handle_ops_data(ops: &[UserOperation], beneficiary: Address) -> Vec<u8> {
		IEntryPoint::handleOpsCall {
			ops: ops.iter().map(PackedUserOperation::from).collect(),
			beneficiary,
		}
		.abi_encode()
	}
}

#[async_trait]
impl ChainClient for RpcChainClient {
	async fn aggregate(&self, calls: &[BatchCall]) -> Result<Vec<BatchResult>, ChainError> {
		let call = IMulticall3::aggregate3Call {
			calls: calls
				.iter()
				.map(|c| IMulticall3::Call3 {
					target: c.target,
					allowFailure: c.allow_failure,
					callData: c.call_data.clone(),
				})
				.collect(),
		};

		let tx = self.static_call(self.multicall, call.abi_encode());
		let raw = self
			.provider
			.call(&tx)
			.await
			.map_err(|e| ChainError::Network(format!("aggregate3 failed: {}", e)))?;

		let decoded = IMulticall3::aggregate3Call::abi_decode_returns(&raw, true)
			.map_err(|e| ChainError::Decode(e.to_string()))?;

		Ok(decoded
			.returnData
			.into_iter()
			.map(|r| BatchResult {
				success: r.success,
				return_data: r.returnData,
			})
			.collect())
	}

	async fn estimate_gas(
		&self,
		from: Address,
		to: Address,
		data: Bytes,
	) -> Result<u64, ChainError> {
		let tx = TransactionRequest {
			from: Some(from),
			to: Some(TxKind::Call(to)),
			input: TransactionInput::new(data),
			..Default::default()
		};

		self.provider
			.estimate_gas(&tx)
			.await
			.map_err(|e| ChainError::Network(format!("estimateGas failed: {}", e)))
	}

	async fn latest_base_fee(&self) -> Result<u128, ChainError> {
		let block = self
			.provider
			.get_block_by_number(BlockNumberOrTag::Latest, BlockTransactionsKind::Hashes)
			.await
			.map_err(|e| ChainError::Network(format!("Failed to get latest block: {}", e)))?
			.ok_or_else(|| ChainError::Network("No latest block".to_string()))?;

		block
			.header
			.base_fee_per_gas
			.map(|fee| fee as u128)
			.ok_or_else(|| ChainError::Network("Latest block has no base fee".to_string()))
	}

	async fn account_nonce(&self, account: Address) -> Result<U256, ChainError> {
		let call = ISmartAccount::nonceCall {
			key: U192::ZERO,
		};
		let tx = self.static_call(account, call.abi_encode());

		let raw = self
			.provider
			.call(&tx)
			.await
			.map_err(|_| ChainError::Call("Abstract wallet is not yet deployed".to_string()))?;

		let decoded = ISmartAccount::nonceCall::abi_decode_returns(&raw, true)
			.map_err(|e| ChainError::Decode(e.to_string()))?;

		Ok(decoded._0)
	}

	async fn estimate_handle_ops(
		&self,
		from: Address,
		ops: &[UserOperation],
		beneficiary: Address,
	) -> Result<u64, ChainError> {
		let data = Self::handle_ops_data(ops, beneficiary);
		self.estimate_gas(from, self.entry_point, data.into()).await
	}

	async fn submit_handle_ops(
		&self,
		relayer: &PrivateKeySigner,
		ops: &[UserOperation],
		beneficiary: Address,
		gas_limit: u64,
	) -> Result<B256, ChainError> {
		let data = Self::handle_ops_data(ops, beneficiary);
		let base_fee = self.latest_base_fee().await?;

		tracing::debug!(gas = gas_limit, base_fee, "Submitting handleOps batch");

		// Fresh signing provider per submission; the relayer identity
		// changes call to call.
		let wallet = EthereumWallet::from(relayer.clone());
		let provider = ProviderBuilder::new()
			.with_recommended_fillers()
			.wallet(wallet)
			.on_http(self.url.clone());

		let tx = TransactionRequest {
			from: Some(relayer.address()),
			to: Some(TxKind::Call(self.entry_point)),
			input: TransactionInput::new(data.into()),
			gas: Some(gas_limit + SUBMIT_GAS_PAD),
			max_fee_per_gas: Some(base_fee + SUBMIT_FEE_PAD),
			max_priority_fee_per_gas: Some(0),
			chain_id: Some(self.chain_id),
			..Default::default()
		};

		let pending = provider
			.send_transaction(tx)
			.await
			.map_err(|e| ChainError::Network(format!("Failed to send transaction: {}", e)))?;

		let tx_hash = *pending.tx_hash();
		tracing::info!(tx_hash = %truncate_hash(&tx_hash), "Submitted handleOps batch");

		Ok(tx_hash)
	}

	async fn wait_for_inclusion(&self, hash: B256) -> Result<(), ChainError> {
		let poll_interval = tokio::time::Duration::from_secs(3);
		let max_wait_time = tokio::time::Duration::from_secs(300);
		let start_time = tokio::time::Instant::now();

		loop {
			if start_time.elapsed() > max_wait_time {
				return Err(ChainError::Network(format!(
					"Timeout waiting for inclusion of {}",
					truncate_hash(&hash)
				)));
			}

			match self.provider.get_transaction_receipt(hash).await {
				Ok(Some(receipt)) => {
					tracing::debug!(
						tx_hash = %truncate_hash(&hash),
						block = receipt.block_number.unwrap_or(0),
						"Transaction included"
					);
					return Ok(());
				}
				Ok(None) => {
					tokio::time::sleep(poll_interval).await;
				}
				Err(e) => {
					return Err(ChainError::Network(format!("Failed to get receipt: {}", e)));
				}
			}
		}
	}

	async fn simulate_handle_op(
		&self,
		op: &UserOperation,
		probe: &BatchCall,
	) -> Result<SimulationOutcome, ChainError> {
		let call = IEntryPoint::simulateHandleOpCall {
			op: op.into(),
			target: probe.target,
			targetCallData: probe.call_data.clone(),
		};
		let tx = self.static_call(self.entry_point, call.abi_encode());

		// simulateHandleOp reverts by design; the outcome is in the revert
		// payload.
		let err = match self.provider.call(&tx).await {
			Ok(_) => {
				return Err(ChainError::Call(
					"simulateHandleOp returned without reverting".to_string(),
				))
			}
			Err(e) => e,
		};

		let revert_data = err
			.as_error_resp()
			.and_then(|payload| payload.as_revert_data())
			.ok_or_else(|| ChainError::Network(format!("Simulation transport error: {}", err)))?;

		if let Ok(result) = IEntryPoint::ExecutionResult::abi_decode(&revert_data, true) {
			return Ok(SimulationOutcome::Executed {
				target_success: result.targetSuccess,
				target_result: result.targetResult,
			});
		}

		if let Ok(failed) = IEntryPoint::FailedOp::abi_decode(&revert_data, true) {
			return Ok(SimulationOutcome::Failed {
				reason: failed.reason,
			});
		}

		Ok(SimulationOutcome::Failed {
			reason: format!("unrecognized revert: 0x{}", hex::encode(&revert_data)),
		})
	}
}
