//! Relayer pool dispatch.
//!
//! Operations leave the executor through a fixed pool of derived relayer
//! identities. Public dispatch round-robins across the pool with one mutex
//! per identity so two submissions never race the same signer's nonce;
//! private dispatch derives a per-user identity and waits for inclusion.

use alloy_primitives::B256;
use executor_account::{AccountError, KeyDeriver};
use executor_chain::{BatchCall, ChainClient, ChainError, SimulationOutcome};
use executor_types::UserOperation;
use std::sync::{
	atomic::{AtomicUsize, Ordering},
	Arc,
};
use thiserror::Error;
use tokio::sync::Mutex;

/// Errors raised while dispatching operations.
#[derive(Debug, Error)]
pub enum DeliveryError {
	#[error(transparent)]
	Account(#[from] AccountError),
	#[error(transparent)]
	Chain(#[from] ChainError),
	#[error("Probe count {probes} does not match operation count {ops}")]
	ProbeMismatch { ops: usize, probes: usize },
}

/// A pool of derived relayer identities with round-robin public dispatch.
pub struct RelayerPool {
	deriver: Arc<KeyDeriver>,
	chain: Arc<dyn ChainClient>,
	/// One mutex per public identity; held across a submission.
	mutexes: Vec<Mutex<()>>,
	/// Round-robin cursor. Racy reads are tolerated: a collision only
	/// means two dispatches share an identity and serialize on its mutex.
	next_index: AtomicUsize,
}

impl RelayerPool {
	pub fn new(deriver: Arc<KeyDeriver>, chain: Arc<dyn ChainClient>, pool_size: u32) -> Self {
		Self {
			deriver,
			chain,
			mutexes: (0..pool_size).map(|_| Mutex::new(())).collect(),
			next_index: AtomicUsize::new(0),
		}
	}

	fn next_relayer_index(&self) -> usize {
		self.next_index.fetch_add(1, Ordering::Relaxed) % self.mutexes.len()
	}

	/// Submits a batch through the next pool identity and returns the
	/// transaction hash without waiting for inclusion.
	pub async fn dispatch_public(&self, ops: &[UserOperation]) -> Result<B256, DeliveryError> {
		let index = self.next_relayer_index();
		let relayer = self.deriver.public_relayer(index as u32)?;
		let beneficiary = relayer.address();

		let gas_estimated = self
			.chain
			.estimate_handle_ops(relayer.address(), ops, beneficiary)
			.await?;

		tracing::debug!(relayer = index, gas = gas_estimated, ops = ops.len(), "Dispatching batch");

		// The guard spans the submission so the identity's nonce cannot be
		// reused by a concurrent dispatch; dropping it on any exit path
		// releases the identity.
		let _guard = self.mutexes[index].lock().await;

		let hash = self
			.chain
			.submit_handle_ops(&relayer, ops, beneficiary, gas_estimated)
			.await?;

		Ok(hash)
	}

	/// Submits a batch through the user's dedicated identity and waits for
	/// inclusion before returning.
	pub async fn dispatch_private(
		&self,
		user_id: i64,
		ops: &[UserOperation],
	) -> Result<B256, DeliveryError> {
		let relayer = self.deriver.private_relayer(user_id)?;
		let beneficiary = relayer.address();

		let gas_estimated = self
			.chain
			.estimate_handle_ops(relayer.address(), ops, beneficiary)
			.await?;

		let hash = self
			.chain
			.submit_handle_ops(&relayer, ops, beneficiary, gas_estimated)
			.await?;

		self.chain.wait_for_inclusion(hash).await?;
		Ok(hash)
	}

	/// Simulates every operation with its probe, without submitting.
	pub async fn simulate(
		&self,
		ops: &[UserOperation],
		probes: &[BatchCall],
	) -> Result<Vec<SimulationOutcome>, DeliveryError> {
		if ops.len() != probes.len() {
			return Err(DeliveryError::ProbeMismatch {
				ops: ops.len(),
				probes: probes.len(),
			});
		}

		futures::future::try_join_all(
			ops.iter()
				.zip(probes)
				.map(|(op, probe)| self.chain.simulate_handle_op(op, probe)),
		)
		.await
		.map_err(DeliveryError::from)
	}
}
