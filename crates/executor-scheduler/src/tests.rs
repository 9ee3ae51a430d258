use super::*;
use alloy_primitives::{address, Address, U256};
use executor_storage::implementations::memory::MemoryOrderBook;
use executor_storage::{DocumentStore, StorageService, WalletLockStore};
use executor_types::{
	BuyOrder, MarketSnapshot, PreApproveResponse, PublishError, SimulateResponse, TriggerMetric,
};
use rust_decimal::Decimal;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

const OWNER: Address = address!("0000000000000000000000000000000000000011");
const WALLET: Address = address!("00000000000000000000000000000000000000a1");
const TOKEN: Address = address!("0000000000000000000000000000000000000071");

struct CountingExecutor {
	buys: AtomicUsize,
	sells: AtomicUsize,
}

#[async_trait::async_trait]
impl OrderExecutor for CountingExecutor {
	async fn buy(&self, request: &BuyRequest) -> Result<TradeResponse, EngineError> {
		self.buys.fetch_add(1, Ordering::SeqCst);
		Ok(TradeResponse {
			user_id: request.user_id,
			token: request.token,
			..Default::default()
		})
	}

	async fn sell(&self, request: &SellRequest) -> Result<TradeResponse, EngineError> {
		self.sells.fetch_add(1, Ordering::SeqCst);
		Ok(TradeResponse {
			user_id: request.user_id,
			token: request.token,
			..Default::default()
		})
	}
}

#[derive(Default)]
struct CollectingPublisher {
	outcomes: Mutex<Vec<LimitOrderOutcome>>,
}

#[async_trait::async_trait]
impl ResponsePublisher for CollectingPublisher {
	async fn publish_buy(&self, _response: &TradeResponse) -> Result<(), PublishError> {
		Ok(())
	}

	async fn publish_sell(&self, _response: &TradeResponse) -> Result<(), PublishError> {
		Ok(())
	}

	async fn publish_pre_approve(
		&self,
		_response: &PreApproveResponse,
	) -> Result<(), PublishError> {
		Ok(())
	}

	async fn publish_simulate_buy(&self, _response: &SimulateResponse) -> Result<(), PublishError> {
		Ok(())
	}

	async fn publish_simulate_sell(
		&self,
		_response: &SimulateResponse,
	) -> Result<(), PublishError> {
		Ok(())
	}

	async fn publish_limit_order(&self, outcome: &LimitOrderOutcome) -> Result<(), PublishError> {
		self.outcomes.lock().unwrap().push(outcome.clone());
		Ok(())
	}
}

struct Harness {
	scheduler: LimitOrderScheduler,
	executor: Arc<CountingExecutor>,
	book: Arc<MemoryOrderBook>,
	locks: Arc<DocumentStore>,
	publisher: Arc<CollectingPublisher>,
}

fn harness() -> Harness {
	let executor = Arc::new(CountingExecutor {
		buys: AtomicUsize::new(0),
		sells: AtomicUsize::new(0),
	});
	let book = Arc::new(MemoryOrderBook::new());
	let locks = Arc::new(DocumentStore::new(StorageService::new(Box::new(
		executor_storage::implementations::memory::MemoryStorage::new(),
	))));
	let publisher = Arc::new(CollectingPublisher::default());

	let scheduler = LimitOrderScheduler::new(
		executor.clone(),
		book.clone(),
		book.clone(),
		locks.clone(),
		publisher.clone(),
		Duration::from_secs(3),
	);

	Harness {
		scheduler,
		executor,
		book,
		locks,
		publisher,
	}
}

fn pool() -> Pool {
	Pool {
		name: "Pancake".to_string(),
		address: address!("0000000000000000000000000000000000000aaa"),
		fee: Some(2500),
		fee_zto: None,
		fee_otz: None,
		sqrt_price_x96: U256::from(1u8) << 96,
	}
}

fn snapshot(price: Decimal) -> MarketSnapshot {
	MarketSnapshot {
		token: TOKEN,
		price_usd: price,
		market_cap: Decimal::new(1_000_000, 0),
		most_liquid_pool: pool(),
	}
}

fn buy_order(id: &str, user_id: i64, trigger: Decimal) -> BuyOrder {
	BuyOrder {
		id: id.to_string(),
		user_id,
		owner: OWNER,
		smart_accounts: vec![WALLET],
		token: TOKEN,
		pool: pool(),
		metric: TriggerMetric::Price,
		trigger_value: trigger,
		native_spend: U256::from(1_000u64),
		slippage: 0.05,
		expires_at: i64::MAX,
		use_private_relayer: false,
	}
}

#[tokio::test]
async fn triggered_order_executes_and_is_removed() {
	let h = harness();
	h.book.insert_snapshot(snapshot(Decimal::new(50, 0)));
	h.book.insert_buy_order(buy_order("order-1", 7, Decimal::new(100, 0)));

	h.scheduler.tick().await.unwrap();

	assert_eq!(h.executor.buys.load(Ordering::SeqCst), 1);
	assert_eq!(h.book.buy_order_count(), 0);
	assert_eq!(h.publisher.outcomes.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn untriggered_order_stays_resting() {
	let h = harness();
	h.book.insert_snapshot(snapshot(Decimal::new(200, 0)));
	h.book.insert_buy_order(buy_order("order-1", 7, Decimal::new(100, 0)));

	h.scheduler.tick().await.unwrap();

	assert_eq!(h.executor.buys.load(Ordering::SeqCst), 0);
	assert_eq!(h.book.buy_order_count(), 1);
}

#[tokio::test]
async fn same_tick_siblings_are_dropped_not_queued() {
	let h = harness();
	h.book.insert_snapshot(snapshot(Decimal::new(50, 0)));
	h.book.insert_buy_order(buy_order("order-1", 7, Decimal::new(100, 0)));
	h.book.insert_buy_order(buy_order("order-2", 7, Decimal::new(100, 0)));

	h.scheduler.tick().await.unwrap();

	// Exactly one of the user's orders runs per tick; the sibling is left
	// resting and will trigger again on the next poll.
	assert_eq!(h.executor.buys.load(Ordering::SeqCst), 1);
	assert_eq!(h.book.buy_order_count(), 1);
	assert_eq!(h.publisher.outcomes.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn different_users_run_in_the_same_tick() {
	let h = harness();
	h.book.insert_snapshot(snapshot(Decimal::new(50, 0)));
	h.book.insert_buy_order(buy_order("order-1", 7, Decimal::new(100, 0)));
	h.book.insert_buy_order(buy_order("order-2", 8, Decimal::new(100, 0)));

	h.scheduler.tick().await.unwrap();

	assert_eq!(h.executor.buys.load(Ordering::SeqCst), 2);
	assert_eq!(h.book.buy_order_count(), 0);
}

#[tokio::test]
async fn busy_wallet_defers_the_whole_group() {
	let h = harness();
	h.book.insert_snapshot(snapshot(Decimal::new(50, 0)));
	h.book.insert_buy_order(buy_order("order-1", 7, Decimal::new(100, 0)));
	h.locks.set_locked(WALLET, true).await.unwrap();

	h.scheduler.tick().await.unwrap();

	assert_eq!(h.executor.buys.load(Ordering::SeqCst), 0);
	// The order is not consumed; it can run once the wallet frees up.
	assert_eq!(h.book.buy_order_count(), 1);
	assert!(h.publisher.outcomes.lock().unwrap().is_empty());
}

#[tokio::test]
async fn expired_orders_are_purged_before_matching() {
	let h = harness();
	h.book.insert_snapshot(snapshot(Decimal::new(50, 0)));
	let mut expired = buy_order("order-1", 7, Decimal::new(100, 0));
	expired.expires_at = 1;
	h.book.insert_buy_order(expired);

	h.scheduler.tick().await.unwrap();

	assert_eq!(h.executor.buys.load(Ordering::SeqCst), 0);
	assert_eq!(h.book.buy_order_count(), 0);
}
