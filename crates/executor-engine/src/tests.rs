use crate::{ContractSet, EngineError, EngineSettings, ExecutionEngine};
use alloy_primitives::{address, Address, Bytes, B256, U256};
use alloy_signer_local::PrivateKeySigner;
use async_trait::async_trait;
use executor_account::KeyDeriver;
use executor_authority::{AuthorityError, SessionAuthority};
use executor_chain::{BatchCall, BatchResult, ChainClient, ChainError, SimulationOutcome};
use executor_delivery::RelayerPool;
use executor_storage::{
	implementations::memory::MemoryStorage, ApprovalStore, DocumentStore, StorageService,
	VolumeStore, WalletLockStore,
};
use executor_types::{Approval, BuyRequest, Pool, SellRequest, UserOperation};
use rust_decimal::Decimal;
use std::sync::{
	atomic::{AtomicUsize, Ordering},
	Arc,
};

const OWNER: Address = address!("0000000000000000000000000000000000000011");
const WALLET_A: Address = address!("00000000000000000000000000000000000000a1");
const WALLET_B: Address = address!("00000000000000000000000000000000000000b2");
const TOKEN: Address = address!("0000000000000000000000000000000000000071");
const POOL: Address = address!("0000000000000000000000000000000000000aaa");
const USER: i64 = 7;

fn contracts() -> ContractSet {
	ContractSet {
		entry_point: address!("5FF137D4b0FDCD49DcA30c7CF57E578a026d2789"),
		session_key_manager: address!("7677BFA00826363F9d4f8fBd866EE89644db0161"),
		multicall: address!("cA11bde05977b3631167028862bE2a173976CA11"),
		wrapped_native: address!("82aF49447D8a07e3bd95BD0d56f35241523fBab1"),
		fee_recipient: address!("443D390b51bEdB620F9c8De2a0a9a060D9BDf4aC"),
		fee_paymaster: address!("3E8E188540eF041Cd4A2BD1d8DeB638Ab30c697C"),
		uniswap_v3_router: address!("E592427A0AEce92De3Edee1F18E0157C05861564"),
		algebra_router: address!("1F721E2E82F6676FCE4eA07A5958cF098D339e18"),
	}
}

/// Plays back one pre-state batch and one post-state batch.
struct ScriptedChain {
	batches: AtomicUsize,
	/// Four positional values per wallet, in the engine's pre-state layout.
	pre: Vec<[U256; 4]>,
	/// Post-state per wallet: native, wrapped, token.
	post: Vec<[U256; 3]>,
	fail_submit: bool,
}

impl ScriptedChain {
	fn word(value: U256) -> BatchResult {
		BatchResult {
			success: true,
			return_data: value.to_be_bytes::<32>().to_vec().into(),
		}
	}
}

#[async_trait]
impl ChainClient for ScriptedChain {
	async fn aggregate(&self, calls: &[BatchCall]) -> Result<Vec<BatchResult>, ChainError> {
		let batch = self.batches.fetch_add(1, Ordering::SeqCst);
		if batch == 0 {
			assert_eq!(calls.len(), self.pre.len() * 4);
			Ok(self
				.pre
				.iter()
				.flat_map(|row| row.iter().copied().map(Self::word))
				.collect())
		} else {
			// Post-state: all natives, then all wrappeds, then all tokens,
			// restricted to the wallets that built an operation.
			let n = calls.len() / 3;
			let mut results = Vec::with_capacity(calls.len());
			for field in 0..3 {
				for row in self.post.iter().take(n) {
					results.push(Self::word(row[field]));
				}
			}
			Ok(results)
		}
	}

	async fn estimate_gas(
		&self,
		_from: Address,
		_to: Address,
		_data: Bytes,
	) -> Result<u64, ChainError> {
		Ok(60_000)
	}

	async fn latest_base_fee(&self) -> Result<u128, ChainError> {
		Ok(1_000_000_000)
	}

	async fn account_nonce(&self, _account: Address) -> Result<U256, ChainError> {
		Ok(U256::ZERO)
	}

	async fn estimate_handle_ops(
		&self,
		_from: Address,
		_ops: &[UserOperation],
		_beneficiary: Address,
	) -> Result<u64, ChainError> {
		Ok(400_000)
	}

	async fn submit_handle_ops(
		&self,
		_relayer: &PrivateKeySigner,
		_ops: &[UserOperation],
		_beneficiary: Address,
		_gas_limit: u64,
	) -> Result<B256, ChainError> {
		if self.fail_submit {
			Err(ChainError::Network("relayer unavailable".to_string()))
		} else {
			Ok(B256::repeat_byte(0xab))
		}
	}

	async fn wait_for_inclusion(&self, _hash: B256) -> Result<(), ChainError> {
		Ok(())
	}

	async fn simulate_handle_op(
		&self,
		_op: &UserOperation,
		_probe: &BatchCall,
	) -> Result<SimulationOutcome, ChainError> {
		unimplemented!("engine tests do not simulate")
	}
}

struct Harness {
	engine: ExecutionEngine,
	store: Arc<DocumentStore>,
}

fn harness(chain: ScriptedChain) -> Harness {
	let chain: Arc<dyn ChainClient> = Arc::new(chain);
	let store = Arc::new(DocumentStore::new(StorageService::new(Box::new(
		MemoryStorage::new(),
	))));
	let contracts = contracts();

	let authority = Arc::new(SessionAuthority::new(
		store.clone(),
		vec![contracts.uniswap_v3_router, contracts.algebra_router],
		contracts.fee_paymaster,
		vec![contracts.wrapped_native],
		false,
	));
	let deriver = Arc::new(KeyDeriver::from_hex_seed("000102030405060708090a0b0c0d0e0f").unwrap());
	let relayers = Arc::new(RelayerPool::new(deriver.clone(), chain.clone(), 2));

	let engine = ExecutionEngine::new(
		chain,
		authority,
		relayers,
		deriver,
		store.clone(),
		store.clone(),
		store.clone(),
		EngineSettings {
			chain_id: 31337,
			fee_rate: 2_500,
			fee_rate_precision: 1_000_000,
			uniswap_v3_pool_names: vec!["Pancake".to_string()],
			contracts,
		},
	);

	Harness { engine, store }
}

fn pool() -> Pool {
	Pool {
		name: "Pancake".to_string(),
		address: POOL,
		fee: Some(2500),
		fee_zto: None,
		fee_otz: None,
		sqrt_price_x96: U256::from(1u8) << 96,
	}
}

fn approval(wallets: Vec<Address>, locked: bool) -> Approval {
	Approval {
		user_id: USER,
		owner: OWNER,
		smart_accounts: wallets,
		tokens: vec![TOKEN],
		locked,
		connected: true,
	}
}

fn buy_request(wallets: Vec<Address>) -> BuyRequest {
	BuyRequest {
		owner: OWNER,
		smart_accounts: wallets,
		user_id: USER,
		token: TOKEN,
		native_amount: U256::from(10u64).pow(U256::from(18u64)),
		slippage: 0.05,
		pool: pool(),
		use_private_relayer: false,
	}
}

fn ether(n: u64) -> U256 {
	U256::from(n) * U256::from(10u64).pow(U256::from(18u64))
}

#[tokio::test]
async fn buy_with_sufficient_funds_succeeds() {
	let h = harness(ScriptedChain {
		batches: AtomicUsize::new(0),
		// token, native, wrapped, allowance
		pre: vec![[U256::ZERO, ether(2), U256::ZERO, U256::ZERO]],
		// native, wrapped, token
		post: vec![[ether(1), U256::ZERO, U256::from(500u64)]],
		fail_submit: false,
	});
	h.store
		.upsert_approval(&approval(vec![WALLET_A], false))
		.await
		.unwrap();

	let response = h.engine.buy(&buy_request(vec![WALLET_A])).await.unwrap();

	assert!(response.op_errors.is_empty());
	assert_eq!(response.succeeded, vec![WALLET_A]);
	assert!(response.tx_hash.is_some());
	assert!(response.tx_error.is_none());
	assert_eq!(response.received[&WALLET_A], U256::from(500u64));
	assert_eq!(response.sent[&WALLET_A], ether(1));

	// One wallet received tokens, so one request-amount of buy volume.
	let volume = h.store.volume(USER).await.unwrap();
	assert_eq!(volume.total_buy, Decimal::ONE);

	assert!(!h.store.is_locked(WALLET_A).await.unwrap());
}

#[tokio::test]
async fn busy_wallet_is_isolated_from_siblings() {
	let h = harness(ScriptedChain {
		batches: AtomicUsize::new(0),
		pre: vec![
			[U256::ZERO, ether(2), U256::ZERO, U256::ZERO],
			[U256::ZERO, ether(2), U256::ZERO, U256::ZERO],
		],
		post: vec![[ether(1), U256::ZERO, U256::from(500u64)]],
		fail_submit: false,
	});
	h.store
		.upsert_approval(&approval(vec![WALLET_A, WALLET_B], false))
		.await
		.unwrap();
	h.store.set_locked(WALLET_B, true).await.unwrap();

	let response = h
		.engine
		.buy(&buy_request(vec![WALLET_A, WALLET_B]))
		.await
		.unwrap();

	assert_eq!(response.op_errors.len(), 1);
	assert_eq!(response.op_errors[&WALLET_B], "Account is busy");
	assert_eq!(response.succeeded, vec![WALLET_A]);
	assert!(response.tx_hash.is_some());

	// Our wallet is released; the busy one still belongs to its own
	// in-flight operation.
	assert!(!h.store.is_locked(WALLET_A).await.unwrap());
	assert!(h.store.is_locked(WALLET_B).await.unwrap());
}

#[tokio::test]
async fn insufficient_funds_is_a_wallet_error() {
	let h = harness(ScriptedChain {
		batches: AtomicUsize::new(0),
		pre: vec![[U256::ZERO, U256::from(1u64), U256::ZERO, U256::ZERO]],
		post: vec![],
		fail_submit: false,
	});
	h.store
		.upsert_approval(&approval(vec![WALLET_A], false))
		.await
		.unwrap();

	let response = h.engine.buy(&buy_request(vec![WALLET_A])).await.unwrap();

	assert_eq!(response.op_errors[&WALLET_A], "Insufficient ETH");
	assert!(response.succeeded.is_empty());
	assert!(response.tx_hash.is_none());
	assert!(!h.store.is_locked(WALLET_A).await.unwrap());
}

#[tokio::test]
async fn locked_approval_rejects_before_any_lock() {
	let h = harness(ScriptedChain {
		batches: AtomicUsize::new(0),
		pre: vec![[U256::ZERO, ether(2), U256::ZERO, U256::ZERO]],
		post: vec![],
		fail_submit: false,
	});
	h.store
		.upsert_approval(&approval(vec![WALLET_A], true))
		.await
		.unwrap();

	let err = h.engine.buy(&buy_request(vec![WALLET_A])).await.unwrap_err();
	assert!(matches!(
		err,
		EngineError::Authority(AuthorityError::ApprovalLocked)
	));
	assert!(!h.store.is_locked(WALLET_A).await.unwrap());
}

#[tokio::test]
async fn missing_approval_rejects_the_request() {
	let h = harness(ScriptedChain {
		batches: AtomicUsize::new(0),
		pre: vec![[U256::ZERO, ether(2), U256::ZERO, U256::ZERO]],
		post: vec![],
		fail_submit: false,
	});

	let err = h.engine.buy(&buy_request(vec![WALLET_A])).await.unwrap_err();
	assert!(matches!(
		err,
		EngineError::Authority(AuthorityError::MissingApproval)
	));
}

#[tokio::test]
async fn native_token_trades_are_rejected() {
	let h = harness(ScriptedChain {
		batches: AtomicUsize::new(0),
		pre: vec![[U256::ZERO, ether(2), U256::ZERO, U256::ZERO]],
		post: vec![],
		fail_submit: false,
	});
	h.store
		.upsert_approval(&approval(vec![WALLET_A], false))
		.await
		.unwrap();

	let mut request = buy_request(vec![WALLET_A]);
	request.token = contracts().wrapped_native;

	let err = h.engine.buy(&request).await.unwrap_err();
	assert!(matches!(err, EngineError::NativeTokenRejected));
	assert!(!h.store.is_locked(WALLET_A).await.unwrap());
}

#[tokio::test]
async fn dispatch_failure_releases_all_locks() {
	let h = harness(ScriptedChain {
		batches: AtomicUsize::new(0),
		pre: vec![
			[U256::ZERO, ether(2), U256::ZERO, U256::ZERO],
			[U256::ZERO, ether(2), U256::ZERO, U256::ZERO],
		],
		post: vec![],
		fail_submit: true,
	});
	h.store
		.upsert_approval(&approval(vec![WALLET_A, WALLET_B], false))
		.await
		.unwrap();

	let response = h
		.engine
		.buy(&buy_request(vec![WALLET_A, WALLET_B]))
		.await
		.unwrap();

	assert!(response.tx_hash.is_none());
	assert!(response.tx_error.is_some());
	assert_eq!(response.succeeded, vec![WALLET_A, WALLET_B]);
	assert!(!h.store.is_locked(WALLET_A).await.unwrap());
	assert!(!h.store.is_locked(WALLET_B).await.unwrap());

	let volume = h.store.volume(USER).await.unwrap();
	assert_eq!(volume.total_buy, Decimal::ZERO);
}

#[tokio::test]
async fn sell_sizes_by_percent_of_live_balance() {
	let h = harness(ScriptedChain {
		batches: AtomicUsize::new(0),
		// token, allowance, native, wrapped
		pre: vec![[U256::from(1_000_000u64), U256::ZERO, ether(1), U256::ZERO]],
		// native, wrapped, token
		post: vec![[ether(1), ether(1), U256::from(500_000u64)]],
		fail_submit: false,
	});
	h.store
		.upsert_approval(&approval(vec![WALLET_A], false))
		.await
		.unwrap();

	let response = h
		.engine
		.sell(&SellRequest {
			owner: OWNER,
			smart_accounts: vec![WALLET_A],
			user_id: USER,
			token: TOKEN,
			spend_amount: None,
			percent: Some(50.0),
			slippage: 0.05,
			pool: pool(),
			use_private_relayer: false,
		})
		.await
		.unwrap();

	assert!(response.op_errors.is_empty());
	assert_eq!(response.sent[&WALLET_A], U256::from(500_000u64));
	assert_eq!(response.received[&WALLET_A], ether(1));
	assert!(!h.store.is_locked(WALLET_A).await.unwrap());

	// One wrapped-ether of proceeds lands in the sell volume counter.
	let volume = h.store.volume(USER).await.unwrap();
	assert_eq!(volume.total_sell, Decimal::ONE);
}

#[tokio::test]
async fn sell_with_zero_balance_is_a_wallet_error() {
	let h = harness(ScriptedChain {
		batches: AtomicUsize::new(0),
		pre: vec![[U256::ZERO, U256::ZERO, ether(1), U256::ZERO]],
		post: vec![],
		fail_submit: false,
	});
	h.store
		.upsert_approval(&approval(vec![WALLET_A], false))
		.await
		.unwrap();

	let response = h
		.engine
		.sell(&SellRequest {
			owner: OWNER,
			smart_accounts: vec![WALLET_A],
			user_id: USER,
			token: TOKEN,
			spend_amount: None,
			percent: Some(100.0),
			slippage: 0.05,
			pool: pool(),
			use_private_relayer: false,
		})
		.await
		.unwrap();

	assert_eq!(response.op_errors[&WALLET_A], "Token balance is zero");
	assert!(!h.store.is_locked(WALLET_A).await.unwrap());
}

#[tokio::test]
async fn pre_approve_to_paymaster_carries_descriptor() {
	let h = harness(ScriptedChain {
		batches: AtomicUsize::new(0),
		pre: vec![],
		post: vec![],
		fail_submit: false,
	});
	h.store
		.upsert_approval(&approval(vec![WALLET_A], false))
		.await
		.unwrap();

	let response = h
		.engine
		.pre_approve(&executor_types::PreApproveRequest {
			owner: OWNER,
			smart_accounts: vec![WALLET_A],
			user_id: USER,
			pool_name: "Paymaster".to_string(),
			token: contracts().wrapped_native,
			allowance: ether(1),
			use_private_relayer: false,
		})
		.await
		.unwrap();

	assert!(response.op_errors.is_empty());
	assert_eq!(response.succeeded, vec![WALLET_A]);
	assert!(response.tx_hash.is_some());

	let descriptor = response.paymaster_approval.unwrap();
	assert_eq!(descriptor.router, contracts().fee_paymaster);
	assert_eq!(descriptor.allowance, ether(1));
	assert!(!h.store.is_locked(WALLET_A).await.unwrap());
}
