//! Typed store interfaces and the document-backed implementation.
//!
//! Approvals, wallet locks, volume counters and fee-token preferences are
//! plain documents and are served by [`DocumentStore`] over any
//! [`StorageInterface`](crate::StorageInterface) backend. Resting orders and
//! market snapshots need query semantics owned by the external document
//! store, so they stay behind their own traits.

use crate::{StorageError, StorageService};
use alloy_primitives::Address;
use async_trait::async_trait;
use executor_types::{Approval, BuyOrder, MarketSnapshot, SellOrder};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

const NS_APPROVAL: &str = "approval";
const NS_WALLET_LOCK: &str = "wallet-lock";
const NS_VOLUME: &str = "volume";
const NS_FEE_TOKEN: &str = "fee-token";

/// Aggregate traded volume for one user, in ether units.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TradeVolume {
	pub total_buy: Decimal,
	pub total_sell: Decimal,
}

/// Read/write access to owner approval records.
#[async_trait]
pub trait ApprovalStore: Send + Sync {
	/// The approval for (user, owner), if one was ever committed.
	async fn approval(&self, user_id: i64, owner: Address)
		-> Result<Option<Approval>, StorageError>;

	/// Creates or replaces the approval record.
	async fn upsert_approval(&self, approval: &Approval) -> Result<(), StorageError>;
}

/// The persisted per-wallet busy flag.
#[async_trait]
pub trait WalletLockStore: Send + Sync {
	/// Whether the wallet currently has an operation in flight. A missing
	/// record reads as unlocked.
	async fn is_locked(&self, wallet: Address) -> Result<bool, StorageError>;

	/// Sets or clears the busy flag.
	async fn set_locked(&self, wallet: Address, locked: bool) -> Result<(), StorageError>;
}

/// Aggregate volume counters per user.
#[async_trait]
pub trait VolumeStore: Send + Sync {
	/// Adds to the user's buy volume.
	async fn add_buy_volume(&self, user_id: i64, volume: Decimal) -> Result<(), StorageError>;

	/// Adds to the user's sell volume.
	async fn add_sell_volume(&self, user_id: i64, volume: Decimal) -> Result<(), StorageError>;

	/// Current totals for the user.
	async fn volume(&self, user_id: i64) -> Result<TradeVolume, StorageError>;
}

/// Per-wallet gas fee-token preference.
#[async_trait]
pub trait FeeTokenStore: Send + Sync {
	/// The ERC-20 the wallet pays gas in, or `None` for native gas.
	async fn fee_token(
		&self,
		owner: Address,
		wallet: Address,
	) -> Result<Option<Address>, StorageError>;

	/// Sets the wallet's fee token.
	async fn set_fee_token(
		&self,
		owner: Address,
		wallet: Address,
		token: Address,
	) -> Result<(), StorageError>;
}

/// Resting-order queries served by the external document store.
#[async_trait]
pub trait RestingOrderStore: Send + Sync {
	/// Deletes every buy and sell order whose expiry is before `now_ms`.
	async fn purge_expired(&self, now_ms: i64) -> Result<(), StorageError>;

	/// Buy orders for `token` whose threshold is at or above the live
	/// value of their trigger metric.
	async fn triggered_buy_orders(
		&self,
		token: Address,
		price_usd: Decimal,
		market_cap: Decimal,
	) -> Result<Vec<BuyOrder>, StorageError>;

	/// Sell orders for `token` whose trigger condition is satisfied:
	/// take-profit at or above the threshold, stop-loss at or below.
	async fn triggered_sell_orders(
		&self,
		token: Address,
		price_usd: Decimal,
		market_cap: Decimal,
	) -> Result<Vec<SellOrder>, StorageError>;

	/// Removes a buy order.
	async fn delete_buy_order(&self, id: &str) -> Result<(), StorageError>;

	/// Removes a sell order.
	async fn delete_sell_order(&self, id: &str) -> Result<(), StorageError>;
}

/// Market snapshots for every tracked token.
#[async_trait]
pub trait MarketStore: Send + Sync {
	async fn snapshots(&self) -> Result<Vec<MarketSnapshot>, StorageError>;
}

/// Document-backed implementation of the plain key-value stores.
pub struct DocumentStore {
	service: StorageService,
}

impl DocumentStore {
	pub fn new(service: StorageService) -> Self {
		Self { service }
	}

	fn approval_key(user_id: i64, owner: Address) -> String {
		format!("{}:{}", user_id, owner)
	}

	fn fee_token_key(owner: Address, wallet: Address) -> String {
		format!("{}:{}", owner, wallet)
	}
}

#[async_trait]
impl ApprovalStore for DocumentStore {
	async fn approval(
		&self,
		user_id: i64,
		owner: Address,
	) -> Result<Option<Approval>, StorageError> {
		self.service
			.retrieve_optional(NS_APPROVAL, &Self::approval_key(user_id, owner))
			.await
	}

	async fn upsert_approval(&self, approval: &Approval) -> Result<(), StorageError> {
		self.service
			.store(
				NS_APPROVAL,
				&Self::approval_key(approval.user_id, approval.owner),
				approval,
			)
			.await
	}
}

#[async_trait]
impl WalletLockStore for DocumentStore {
	async fn is_locked(&self, wallet: Address) -> Result<bool, StorageError> {
		Ok(self
			.service
			.retrieve_optional::<bool>(NS_WALLET_LOCK, &wallet.to_string())
			.await?
			.unwrap_or(false))
	}

	async fn set_locked(&self, wallet: Address, locked: bool) -> Result<(), StorageError> {
		self.service
			.store(NS_WALLET_LOCK, &wallet.to_string(), &locked)
			.await
	}
}

#[async_trait]
impl VolumeStore for DocumentStore {
	async fn add_buy_volume(&self, user_id: i64, volume: Decimal) -> Result<(), StorageError> {
		let mut totals: TradeVolume = self
			.service
			.retrieve_optional(NS_VOLUME, &user_id.to_string())
			.await?
			.unwrap_or_default();
		totals.total_buy += volume;
		self.service
			.store(NS_VOLUME, &user_id.to_string(), &totals)
			.await
	}

	async fn add_sell_volume(&self, user_id: i64, volume: Decimal) -> Result<(), StorageError> {
		let mut totals: TradeVolume = self
			.service
			.retrieve_optional(NS_VOLUME, &user_id.to_string())
			.await?
			.unwrap_or_default();
		totals.total_sell += volume;
		self.service
			.store(NS_VOLUME, &user_id.to_string(), &totals)
			.await
	}

	async fn volume(&self, user_id: i64) -> Result<TradeVolume, StorageError> {
		Ok(self
			.service
			.retrieve_optional(NS_VOLUME, &user_id.to_string())
			.await?
			.unwrap_or_default())
	}
}

#[async_trait]
impl FeeTokenStore for DocumentStore {
	async fn fee_token(
		&self,
		owner: Address,
		wallet: Address,
	) -> Result<Option<Address>, StorageError> {
		self.service
			.retrieve_optional(NS_FEE_TOKEN, &Self::fee_token_key(owner, wallet))
			.await
	}

	async fn set_fee_token(
		&self,
		owner: Address,
		wallet: Address,
		token: Address,
	) -> Result<(), StorageError> {
		self.service
			.store(NS_FEE_TOKEN, &Self::fee_token_key(owner, wallet), &token)
			.await
	}
}
