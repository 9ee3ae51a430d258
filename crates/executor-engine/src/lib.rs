//! Order execution engine.
//!
//! Converts buy, sell and pre-approve requests into signed, dispatched
//! account-abstraction operations: capability proofs for every wallet, one
//! batched pre-state read, per-wallet isolated operation builds behind the
//! wallet lock, a single relayer dispatch for the whole batch, and a
//! post-state read that yields per-wallet sent/received deltas.

use alloy_primitives::{Address, Bytes, B256, U256};
use executor_account::{AccountError, KeyDeriver};
use executor_amm::AmmError;
use executor_authority::{AuthorityError, SessionAuthority};
use executor_chain::{ChainClient, ChainError};
use executor_delivery::RelayerPool;
use executor_ops::{pack_paymaster_data, OpEnvironment, OpsError};
use executor_storage::{FeeTokenStore, StorageError, VolumeStore, WalletLockStore};
use executor_types::{Pool, UserOperation};
use rust_decimal::Decimal;
use std::sync::Arc;
use thiserror::Error;

pub mod buy;
pub mod calls;
pub mod locks;
pub mod pre_approve;
pub mod sell;
pub mod simulate;

#[cfg(test)]
mod tests;

pub use locks::LockSet;

/// Paymaster verification gas carried in the packed payload.
const PAYMASTER_VERIFICATION_GAS: u128 = 300_000;
/// Paymaster post-op gas carried in the packed payload.
const PAYMASTER_POST_OP_GAS: u128 = 300_000;
/// Seconds of validity given to swap deadlines.
const SWAP_DEADLINE_SECS: u64 = 1_000;

/// Request-level failures; per-wallet failures live in the response maps.
#[derive(Debug, Error)]
pub enum EngineError {
	/// Buys and sells move through the wrapped base asset; trading it
	/// directly is rejected.
	#[error("Only accept non-native token")]
	NativeTokenRejected,
	/// The caller's pool carries no usable fee for the swap direction.
	#[error("Pool {0} has no fee for this direction")]
	MissingPoolFee(String),
	/// A sell arrived without an amount or a percentage.
	#[error("No spend amount or percent provided")]
	MissingSellAmount,
	#[error(transparent)]
	Authority(#[from] AuthorityError),
	#[error(transparent)]
	Account(#[from] AccountError),
	#[error(transparent)]
	Chain(#[from] ChainError),
	#[error(transparent)]
	Storage(#[from] StorageError),
	#[error(transparent)]
	Amm(#[from] AmmError),
	#[error(transparent)]
	Ops(#[from] OpsError),
	#[error(transparent)]
	Delivery(#[from] executor_delivery::DeliveryError),
}

/// Which router family a pool name resolves to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouterFamily {
	/// Fee-tiered `exactInputSingle`.
	UniswapV3,
	/// Directional fees, `limitSqrtPrice` parameter.
	Algebra,
}

/// Deployed contract addresses the engine encodes against.
#[derive(Debug, Clone)]
pub struct ContractSet {
	pub entry_point: Address,
	pub session_key_manager: Address,
	pub multicall: Address,
	pub wrapped_native: Address,
	pub fee_recipient: Address,
	pub fee_paymaster: Address,
	pub uniswap_v3_router: Address,
	pub algebra_router: Address,
}

/// Engine-wide settings.
#[derive(Debug, Clone)]
pub struct EngineSettings {
	pub chain_id: u64,
	pub fee_rate: u64,
	pub fee_rate_precision: u64,
	/// Venue names routed through the Uniswap-style router.
	pub uniswap_v3_pool_names: Vec<String>,
	pub contracts: ContractSet,
}

/// The sentinel venue name that targets the fee paymaster in pre-approvals.
const PAYMASTER_POOL_NAME: &str = "Paymaster";

/// The order execution engine.
pub struct ExecutionEngine {
	chain: Arc<dyn ChainClient>,
	authority: Arc<SessionAuthority>,
	relayers: Arc<RelayerPool>,
	deriver: Arc<KeyDeriver>,
	locks: Arc<dyn WalletLockStore>,
	volumes: Arc<dyn VolumeStore>,
	fee_tokens: Arc<dyn FeeTokenStore>,
	settings: EngineSettings,
}

impl ExecutionEngine {
	#[allow(clippy::too_many_arguments)]
	pub fn new(
		chain: Arc<dyn ChainClient>,
		authority: Arc<SessionAuthority>,
		relayers: Arc<RelayerPool>,
		deriver: Arc<KeyDeriver>,
		locks: Arc<dyn WalletLockStore>,
		volumes: Arc<dyn VolumeStore>,
		fee_tokens: Arc<dyn FeeTokenStore>,
		settings: EngineSettings,
	) -> Self {
		Self {
			chain,
			authority,
			relayers,
			deriver,
			locks,
			volumes,
			fee_tokens,
			settings,
		}
	}

	pub(crate) fn op_env(&self) -> OpEnvironment {
		OpEnvironment {
			chain: self.chain.clone(),
			entry_point: self.settings.contracts.entry_point,
			session_key_manager: self.settings.contracts.session_key_manager,
			chain_id: self.settings.chain_id,
		}
	}

	/// The swap router and family for a venue name.
	pub(crate) fn swap_router(&self, pool_name: &str) -> (Address, RouterFamily) {
		if self
			.settings
			.uniswap_v3_pool_names
			.iter()
			.any(|name| name == pool_name)
		{
			(self.settings.contracts.uniswap_v3_router, RouterFamily::UniswapV3)
		} else {
			(self.settings.contracts.algebra_router, RouterFamily::Algebra)
		}
	}

	/// The spender a pre-approval targets; the paymaster sentinel resolves
	/// to the fee paymaster instead of a swap router.
	pub(crate) fn approval_router(&self, pool_name: &str) -> Address {
		if pool_name == PAYMASTER_POOL_NAME {
			self.settings.contracts.fee_paymaster
		} else {
			self.swap_router(pool_name).0
		}
	}

	/// The directional fee for a swap, when the pool quotes one.
	pub(crate) fn pool_fee(&self, pool: &Pool, token: Address, is_buy: bool) -> Option<u32> {
		let zero_to_one =
			executor_amm::is_token0(token, self.settings.contracts.wrapped_native) != is_buy;
		pool.fee_for(zero_to_one)
	}

	/// Rejects trades in the native or wrapped base asset.
	pub(crate) fn reject_native(&self, token: Address) -> Result<(), EngineError> {
		if token == Address::ZERO || token == self.settings.contracts.wrapped_native {
			return Err(EngineError::NativeTokenRejected);
		}
		Ok(())
	}

	/// The packed paymaster payload for a wallet, when it pays gas in an
	/// ERC-20.
	pub(crate) async fn paymaster_data_for(
		&self,
		owner: Address,
		wallet: Address,
	) -> Result<Option<Bytes>, StorageError> {
		Ok(self.fee_tokens.fee_token(owner, wallet).await?.map(|token| {
			pack_paymaster_data(
				self.settings.contracts.fee_paymaster,
				PAYMASTER_VERIFICATION_GAS,
				PAYMASTER_POST_OP_GAS,
				token,
			)
		}))
	}

	/// Routes a finished batch through the shared pool or the user's
	/// private relayer.
	pub(crate) async fn dispatch(
		&self,
		user_id: i64,
		use_private_relayer: bool,
		ops: &[UserOperation],
	) -> Result<B256, executor_delivery::DeliveryError> {
		if use_private_relayer {
			self.relayers.dispatch_private(user_id, ops).await
		} else {
			self.relayers.dispatch_public(ops).await
		}
	}

	pub(crate) fn swap_deadline() -> u64 {
		std::time::SystemTime::now()
			.duration_since(std::time::UNIX_EPOCH)
			.map(|d| d.as_secs())
			.unwrap_or_default()
			+ SWAP_DEADLINE_SECS
	}
}

/// Converts a wei amount to ether units for the volume counters.
pub(crate) fn wei_to_ether(amount: U256) -> Decimal {
	let ether = U256::from(1_000_000_000_000_000_000u128);
	let whole = u128::try_from(amount / ether).unwrap_or(u128::MAX);
	let frac = u128::try_from(amount % ether).unwrap_or_default();
	Decimal::from(whole) + Decimal::from(frac) / Decimal::from(1_000_000_000_000_000_000u128)
}
