//! Service wiring.

use crate::{publisher::LogPublisher, router::OrderRouter};
use anyhow::{Context, Result};
use executor_account::KeyDeriver;
use executor_authority::SessionAuthority;
use executor_chain::RpcChainClient;
use executor_config::ExecutorConfig;
use executor_delivery::RelayerPool;
use executor_engine::{ContractSet, EngineSettings, ExecutionEngine};
use executor_scheduler::LimitOrderScheduler;
use executor_storage::{
	implementations::memory::{MemoryOrderBook, MemoryStorage},
	DocumentStore, StorageService,
};
use executor_types::ResponsePublisher;
use std::sync::Arc;
use tokio::time::Duration;

/// The wired executor: engine, router and scheduler sharing one set of
/// collaborators.
pub struct ExecutorService {
	pub engine: Arc<ExecutionEngine>,
	pub router: Arc<OrderRouter>,
	pub scheduler: Arc<LimitOrderScheduler>,
}

impl ExecutorService {
	/// Builds the service from configuration.
	///
	/// The document store and order book here are the in-memory backends;
	/// a deployment substitutes the external document-store and broker
	/// collaborators at this seam.
	pub fn build(config: &ExecutorConfig) -> Result<Self> {
		let chain = Arc::new(
			RpcChainClient::new(
				&config.chain.rpc_url,
				config.chain.chain_id,
				config.contracts.entry_point,
				config.contracts.multicall,
			)
			.context("Failed to create chain client")?,
		);

		let documents = Arc::new(DocumentStore::new(StorageService::new(Box::new(
			MemoryStorage::new(),
		))));
		let order_book = Arc::new(MemoryOrderBook::new());
		let publisher: Arc<dyn ResponsePublisher> = Arc::new(LogPublisher);

		let deriver = Arc::new(
			KeyDeriver::from_hex_seed(&config.relayers.seed)
				.context("Failed to derive relayer keys")?,
		);

		let authority = Arc::new(SessionAuthority::new(
			documents.clone(),
			vec![config.routers.uniswap_v3, config.routers.algebra],
			config.contracts.fee_paymaster,
			config.fees.payment_tokens.clone(),
			config.authority.strict_tokens,
		));

		let relayers = Arc::new(RelayerPool::new(
			deriver.clone(),
			chain.clone(),
			config.relayers.pool_size,
		));

		let engine = Arc::new(ExecutionEngine::new(
			chain,
			authority,
			relayers,
			deriver,
			documents.clone(),
			documents.clone(),
			documents.clone(),
			EngineSettings {
				chain_id: config.chain.chain_id,
				fee_rate: config.fees.rate,
				fee_rate_precision: config.fees.precision,
				uniswap_v3_pool_names: config.routers.uniswap_v3_pools.clone(),
				contracts: ContractSet {
					entry_point: config.contracts.entry_point,
					session_key_manager: config.contracts.session_key_manager,
					multicall: config.contracts.multicall,
					wrapped_native: config.contracts.wrapped_native,
					fee_recipient: config.contracts.fee_recipient,
					fee_paymaster: config.contracts.fee_paymaster,
					uniswap_v3_router: config.routers.uniswap_v3,
					algebra_router: config.routers.algebra,
				},
			},
		));

		let router = Arc::new(OrderRouter::new(engine.clone(), publisher.clone()));

		let scheduler = Arc::new(LimitOrderScheduler::new(
			engine.clone(),
			order_book.clone(),
			order_book,
			documents,
			publisher,
			Duration::from_secs(config.scheduler.period_secs),
		));

		Ok(Self {
			engine,
			router,
			scheduler,
		})
	}
}
