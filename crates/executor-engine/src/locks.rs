//! Wallet lock lifecycle.

use alloy_primitives::Address;
use executor_storage::{StorageError, WalletLockStore};
use std::sync::Arc;

/// Tracks every wallet lock acquired during one request.
///
/// Locks are acquired one wallet at a time as the per-wallet pipeline runs;
/// `release_all` must be awaited on every exit path, so a wallet is never
/// left flagged busy by a failed request.
pub struct LockSet {
	store: Arc<dyn WalletLockStore>,
	acquired: Vec<Address>,
}

impl LockSet {
	pub fn new(store: Arc<dyn WalletLockStore>) -> Self {
		Self {
			store,
			acquired: Vec::new(),
		}
	}

	/// Attempts to flag the wallet busy. Returns `false` when the wallet
	/// already has an operation in flight.
	pub async fn try_acquire(&mut self, wallet: Address) -> Result<bool, StorageError> {
		if self.store.is_locked(wallet).await? {
			return Ok(false);
		}
		self.store.set_locked(wallet, true).await?;
		self.acquired.push(wallet);
		Ok(true)
	}

	/// Wallets acquired so far.
	pub fn acquired(&self) -> &[Address] {
		&self.acquired
	}

	/// Clears every acquired lock. Failures are logged, not propagated:
	/// the caller is usually already on an error path.
	pub async fn release_all(&mut self) {
		for wallet in self.acquired.drain(..) {
			if let Err(e) = self.store.set_locked(wallet, false).await {
				tracing::error!(%wallet, error = %e, "Failed to release wallet lock");
			}
		}
	}
}
