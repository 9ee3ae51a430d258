//! Resting (limit) order scheduler.
//!
//! A fixed-interval loop that matches resting orders against live market
//! snapshots and feeds triggered orders into the execution engine. Ticks
//! are guarded by a skip-if-running flag; triggered orders are grouped per
//! user and only the first order of each group runs in a tick.

use executor_engine::{EngineError, ExecutionEngine};
use executor_storage::{MarketStore, RestingOrderStore, StorageError, WalletLockStore};
use executor_types::{
	BuyRequest, LimitOrderOutcome, MarketSnapshot, Pool, ResponsePublisher, SellRequest,
	TradeResponse, TriggeredOrder,
};
use std::sync::{
	atomic::{AtomicBool, Ordering},
	Arc,
};
use thiserror::Error;
use tokio::sync::broadcast;
use tokio::time::{interval, Duration};
use tracing::{debug, error, info};

/// Errors that abort a scheduler tick.
#[derive(Debug, Error)]
pub enum SchedulerError {
	#[error(transparent)]
	Storage(#[from] StorageError),
}

/// The execution seam the scheduler drives.
///
/// Implemented by the execution engine; tests substitute a stub.
#[async_trait::async_trait]
pub trait OrderExecutor: Send + Sync {
	async fn buy(&self, request: &BuyRequest) -> Result<TradeResponse, EngineError>;
	async fn sell(&self, request: &SellRequest) -> Result<TradeResponse, EngineError>;
}

#[async_trait::async_trait]
impl OrderExecutor for ExecutionEngine {
	async fn buy(&self, request: &BuyRequest) -> Result<TradeResponse, EngineError> {
		ExecutionEngine::buy(self, request).await
	}

	async fn sell(&self, request: &SellRequest) -> Result<TradeResponse, EngineError> {
		ExecutionEngine::sell(self, request).await
	}
}

/// A triggered order paired with the market's current deepest pool.
struct Triggered {
	order: TriggeredOrder,
	pool: Pool,
}

impl Triggered {
	fn user_id(&self) -> i64 {
		match &self.order {
			TriggeredOrder::Buy(order) => order.user_id,
			TriggeredOrder::Sell(order) => order.user_id,
		}
	}

	fn wallets(&self) -> &[alloy_primitives::Address] {
		match &self.order {
			TriggeredOrder::Buy(order) => &order.smart_accounts,
			TriggeredOrder::Sell(order) => &order.smart_accounts,
		}
	}
}

/// The resting-order polling loop.
pub struct LimitOrderScheduler {
	executor: Arc<dyn OrderExecutor>,
	orders: Arc<dyn RestingOrderStore>,
	markets: Arc<dyn MarketStore>,
	locks: Arc<dyn WalletLockStore>,
	publisher: Arc<dyn ResponsePublisher>,
	period: Duration,
	/// Skip-if-running guard; an overlapping tick is dropped, not queued.
	running: AtomicBool,
}

impl LimitOrderScheduler {
	pub fn new(
		executor: Arc<dyn OrderExecutor>,
		orders: Arc<dyn RestingOrderStore>,
		markets: Arc<dyn MarketStore>,
		locks: Arc<dyn WalletLockStore>,
		publisher: Arc<dyn ResponsePublisher>,
		period: Duration,
	) -> Self {
		Self {
			executor,
			orders,
			markets,
			locks,
			publisher,
			period,
			running: AtomicBool::new(false),
		}
	}

	/// Runs until the shutdown signal fires.
	pub async fn run(&self, mut shutdown: broadcast::Receiver<()>) {
		info!(period = ?self.period, "Starting limit order scheduler");
		let mut ticker = interval(self.period);

		loop {
			tokio::select! {
				_ = ticker.tick() => {
					if self
						.running
						.compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
						.is_err()
					{
						debug!("Previous tick still running, skipping");
						continue;
					}

					if let Err(e) = self.tick().await {
						error!(error = %e, "Scheduler tick failed");
					}
					self.running.store(false, Ordering::SeqCst);
				}
				_ = shutdown.recv() => {
					info!("Limit order scheduler received shutdown signal");
					break;
				}
			}
		}
	}

	/// One poll: purge expired orders, match triggers per market, then run
	/// one order per user group.
	pub async fn tick(&self) -> Result<(), SchedulerError> {
		let now_ms = chrono::Utc::now().timestamp_millis();
		self.orders.purge_expired(now_ms).await?;

		let snapshots = self.markets.snapshots().await?;
		let mut triggered: Vec<Triggered> = Vec::new();

		for snapshot in snapshots {
			self.collect_triggered(&snapshot, &mut triggered).await?;
		}

		if triggered.is_empty() {
			return Ok(());
		}

		// Contiguous runs after this sort are exactly the per-user groups;
		// no map needed.
		triggered.sort_by_key(Triggered::user_id);

		let mut groups: Vec<Vec<Triggered>> = Vec::new();
		for entry in triggered {
			match groups.last_mut() {
				Some(group) if group[0].user_id() == entry.user_id() => group.push(entry),
				_ => groups.push(vec![entry]),
			}
		}

		let outcomes =
			futures::future::join_all(groups.into_iter().map(|group| self.execute_group(group)))
				.await;

		for outcome in outcomes.into_iter().flatten() {
			if let Err(e) = self.publisher.publish_limit_order(&outcome).await {
				error!(error = %e, "Failed to publish limit order outcome");
			}
		}

		Ok(())
	}

	async fn collect_triggered(
		&self,
		snapshot: &MarketSnapshot,
		triggered: &mut Vec<Triggered>,
	) -> Result<(), SchedulerError> {
		let buys = self
			.orders
			.triggered_buy_orders(snapshot.token, snapshot.price_usd, snapshot.market_cap)
			.await?;
		triggered.extend(buys.into_iter().map(|order| Triggered {
			order: TriggeredOrder::Buy(order),
			pool: snapshot.most_liquid_pool.clone(),
		}));

		let sells = self
			.orders
			.triggered_sell_orders(snapshot.token, snapshot.price_usd, snapshot.market_cap)
			.await?;
		triggered.extend(sells.into_iter().map(|order| Triggered {
			order: TriggeredOrder::Sell(order),
			pool: snapshot.most_liquid_pool.clone(),
		}));

		Ok(())
	}

	/// Runs the first order of a user's group, and only when none of its
	/// wallets are flagged busy. Same-tick siblings are dropped; still-
	/// resting ones surface again on a later tick.
	async fn execute_group(&self, group: Vec<Triggered>) -> Option<LimitOrderOutcome> {
		let first = group.into_iter().next()?;

		for wallet in first.wallets() {
			if self.locks.is_locked(*wallet).await.unwrap_or(false) {
				debug!(%wallet, "Skipping triggered order, wallet busy");
				return None;
			}
		}

		Some(self.execute_order(first).await)
	}

	async fn execute_order(&self, triggered: Triggered) -> LimitOrderOutcome {
		match triggered.order {
			TriggeredOrder::Buy(order) => {
				let request = BuyRequest {
					owner: order.owner,
					smart_accounts: order.smart_accounts.clone(),
					user_id: order.user_id,
					token: order.token,
					native_amount: order.native_spend,
					slippage: order.slippage,
					pool: triggered.pool,
					use_private_relayer: order.use_private_relayer,
				};
				let result = self.executor.buy(&request).await;

				// Triggered orders are deleted whether or not they
				// executed; there is no retry.
				if let Err(e) = self.orders.delete_buy_order(&order.id).await {
					error!(order = %order.id, error = %e, "Failed to delete buy order");
				}

				match result {
					Ok(response) => LimitOrderOutcome {
						order: TriggeredOrder::Buy(order),
						response: Some(response),
						error: None,
					},
					Err(e) => LimitOrderOutcome {
						order: TriggeredOrder::Buy(order),
						response: None,
						error: Some(e.to_string()),
					},
				}
			}
			TriggeredOrder::Sell(order) => {
				let request = SellRequest {
					owner: order.owner,
					smart_accounts: order.smart_accounts.clone(),
					user_id: order.user_id,
					token: order.token,
					spend_amount: order.spend_amount,
					percent: order.percent,
					slippage: order.slippage,
					pool: triggered.pool,
					use_private_relayer: order.use_private_relayer,
				};
				let result = self.executor.sell(&request).await;

				if let Err(e) = self.orders.delete_sell_order(&order.id).await {
					error!(order = %order.id, error = %e, "Failed to delete sell order");
				}

				match result {
					Ok(response) => LimitOrderOutcome {
						order: TriggeredOrder::Sell(order),
						response: Some(response),
						error: None,
					},
					Err(e) => LimitOrderOutcome {
						order: TriggeredOrder::Sell(order),
						response: None,
						error: Some(e.to_string()),
					},
				}
			}
		}
	}
}

#[cfg(test)]
mod tests;
