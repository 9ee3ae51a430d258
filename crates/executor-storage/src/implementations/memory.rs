//! In-memory storage backends.

use crate::{MarketStore, RestingOrderStore, StorageError, StorageInterface};
use alloy_primitives::Address;
use async_trait::async_trait;
use executor_types::{BuyOrder, MarketSnapshot, SellOrder};
use rust_decimal::Decimal;

/// In-memory key-value backend.
#[derive(Clone, Default)]
pub struct MemoryStorage {
	data: dashmap::DashMap<String, Vec<u8>>,
}

impl MemoryStorage {
	pub fn new() -> Self {
		Self::default()
	}
}

#[async_trait]
impl StorageInterface for MemoryStorage {
	async fn get_bytes(&self, key: &str) -> Result<Vec<u8>, StorageError> {
		self.data
			.get(key)
			.map(|entry| entry.clone())
			.ok_or(StorageError::NotFound)
	}

	async fn set_bytes(&self, key: &str, value: Vec<u8>) -> Result<(), StorageError> {
		self.data.insert(key.to_string(), value);
		Ok(())
	}

	async fn delete(&self, key: &str) -> Result<(), StorageError> {
		self.data.remove(key);
		Ok(())
	}

	async fn exists(&self, key: &str) -> Result<bool, StorageError> {
		Ok(self.data.contains_key(key))
	}
}

/// In-memory resting-order book with the same query semantics the external
/// document store provides.
#[derive(Clone, Default)]
pub struct MemoryOrderBook {
	buys: dashmap::DashMap<String, BuyOrder>,
	sells: dashmap::DashMap<String, SellOrder>,
	markets: dashmap::DashMap<Address, MarketSnapshot>,
}

impl MemoryOrderBook {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn insert_buy_order(&self, order: BuyOrder) {
		self.buys.insert(order.id.clone(), order);
	}

	pub fn insert_sell_order(&self, order: SellOrder) {
		self.sells.insert(order.id.clone(), order);
	}

	pub fn insert_snapshot(&self, snapshot: MarketSnapshot) {
		self.markets.insert(snapshot.token, snapshot);
	}

	pub fn buy_order_count(&self) -> usize {
		self.buys.len()
	}

	pub fn sell_order_count(&self) -> usize {
		self.sells.len()
	}
}

fn live_value(metric: executor_types::TriggerMetric, price: Decimal, cap: Decimal) -> Decimal {
	match metric {
		executor_types::TriggerMetric::Price => price,
		executor_types::TriggerMetric::MarketCap => cap,
	}
}

#[async_trait]
impl RestingOrderStore for MemoryOrderBook {
	async fn purge_expired(&self, now_ms: i64) -> Result<(), StorageError> {
		self.buys.retain(|_, order| order.expires_at >= now_ms);
		self.sells.retain(|_, order| order.expires_at >= now_ms);
		Ok(())
	}

	async fn triggered_buy_orders(
		&self,
		token: Address,
		price_usd: Decimal,
		market_cap: Decimal,
	) -> Result<Vec<BuyOrder>, StorageError> {
		Ok(self
			.buys
			.iter()
			.filter(|entry| {
				entry.token == token
					&& entry.trigger_value >= live_value(entry.metric, price_usd, market_cap)
			})
			.map(|entry| entry.clone())
			.collect())
	}

	async fn triggered_sell_orders(
		&self,
		token: Address,
		price_usd: Decimal,
		market_cap: Decimal,
	) -> Result<Vec<SellOrder>, StorageError> {
		Ok(self
			.sells
			.iter()
			.filter(|entry| {
				let live = live_value(entry.metric, price_usd, market_cap);
				entry.token == token
					&& if entry.take_profit {
						entry.trigger_value <= live
					} else {
						entry.trigger_value >= live
					}
			})
			.map(|entry| entry.clone())
			.collect())
	}

	async fn delete_buy_order(&self, id: &str) -> Result<(), StorageError> {
		self.buys.remove(id);
		Ok(())
	}

	async fn delete_sell_order(&self, id: &str) -> Result<(), StorageError> {
		self.sells.remove(id);
		Ok(())
	}
}

#[async_trait]
impl MarketStore for MemoryOrderBook {
	async fn snapshots(&self) -> Result<Vec<MarketSnapshot>, StorageError> {
		Ok(self.markets.iter().map(|entry| entry.clone()).collect())
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::{DocumentStore, StorageService, WalletLockStore};
	use alloy_primitives::{address, U256};
	use executor_types::{Pool, TriggerMetric};

	fn pool() -> Pool {
		Pool {
			name: "Pancake".to_string(),
			address: address!("0000000000000000000000000000000000000aaa"),
			fee: Some(2500),
			fee_zto: None,
			fee_otz: None,
			sqrt_price_x96: U256::from(1u64) << 96,
		}
	}

	fn buy_order(id: &str, trigger: Decimal, expires_at: i64) -> BuyOrder {
		BuyOrder {
			id: id.to_string(),
			user_id: 7,
			owner: address!("0000000000000000000000000000000000000001"),
			smart_accounts: vec![address!("0000000000000000000000000000000000000002")],
			token: address!("0000000000000000000000000000000000000003"),
			pool: pool(),
			metric: TriggerMetric::Price,
			trigger_value: trigger,
			native_spend: U256::from(1_000u64),
			slippage: 0.01,
			expires_at,
			use_private_relayer: false,
		}
	}

	#[tokio::test]
	async fn wallet_lock_round_trip() {
		let store = DocumentStore::new(StorageService::new(Box::new(MemoryStorage::new())));
		let wallet = address!("0000000000000000000000000000000000000002");

		assert!(!store.is_locked(wallet).await.unwrap());
		store.set_locked(wallet, true).await.unwrap();
		assert!(store.is_locked(wallet).await.unwrap());
		store.set_locked(wallet, false).await.unwrap();
		assert!(!store.is_locked(wallet).await.unwrap());
	}

	#[tokio::test]
	async fn buy_orders_trigger_at_or_below_threshold() {
		let book = MemoryOrderBook::new();
		let token = address!("0000000000000000000000000000000000000003");
		book.insert_buy_order(buy_order("above", Decimal::new(200, 0), i64::MAX));
		book.insert_buy_order(buy_order("below", Decimal::new(50, 0), i64::MAX));

		let triggered = book
			.triggered_buy_orders(token, Decimal::new(100, 0), Decimal::ZERO)
			.await
			.unwrap();

		// A buy fires once the live price has come down to the threshold.
		assert_eq!(triggered.len(), 1);
		assert_eq!(triggered[0].id, "above");
	}

	#[tokio::test]
	async fn expired_orders_are_purged() {
		let book = MemoryOrderBook::new();
		book.insert_buy_order(buy_order("expired", Decimal::ONE, 1_000));
		book.insert_buy_order(buy_order("live", Decimal::ONE, 5_000));

		book.purge_expired(2_000).await.unwrap();

		assert_eq!(book.buy_order_count(), 1);
	}
}
