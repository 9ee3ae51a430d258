//! Buy execution: native currency into a token.

use crate::{calls, wei_to_ether, EngineError, ExecutionEngine, LockSet, RouterFamily};
use alloy_primitives::{Address, B256, U256};
use alloy_signer_local::PrivateKeySigner;
use executor_amm::{min_output_threshold, split_fee, sqrt_price_limit, FeeSplit};
use executor_chain::{calls as chain_calls, BatchResult, ChainClient};
use executor_ops::SessionKeyOpBuilder;
use executor_storage::VolumeStore;
use executor_types::{BuyRequest, TradeResponse, UserOperation};
use rust_decimal::Decimal;
use std::collections::HashMap;

pub(crate) struct WalletPlan {
	pub op: UserOperation,
	/// Native plus wrapped balance before the trade.
	pub pre_native_total: U256,
	/// Wrapped balance before the trade; sells use it for volume.
	pub pre_wrapped: U256,
	/// Token balance before the trade.
	pub pre_token: U256,
}

impl ExecutionEngine {
	/// Executes a buy across the request's wallets.
	///
	/// One wallet's failure never aborts its siblings; the whole batch is
	/// dispatched as a single relayer submission.
	pub async fn buy(&self, request: &BuyRequest) -> Result<TradeResponse, EngineError> {
		let contracts = self.settings.contracts.clone();
		let session_key = self.deriver.session_key(request.user_id)?;
		let (router, family) = self.swap_router(&request.pool.name);

		let split = split_fee(
			request.native_amount,
			self.settings.fee_rate,
			self.settings.fee_rate_precision,
		)?;
		let price_limit = sqrt_price_limit(
			request.token,
			contracts.wrapped_native,
			request.slippage,
			request.pool.sqrt_price_x96,
			false,
		)?;
		let min_out = min_output_threshold(
			request.token,
			contracts.wrapped_native,
			true,
			split.amount_in,
			price_limit,
		)?;
		let fee = match family {
			RouterFamily::UniswapV3 => self
				.pool_fee(&request.pool, request.token, true)
				.ok_or_else(|| EngineError::MissingPoolFee(request.pool.name.clone()))?,
			RouterFamily::Algebra => 0,
		};

		let proofs = self
			.authority
			.proofs_for(
				request.user_id,
				request.owner,
				&request.smart_accounts,
				session_key.address(),
				request.token,
				router,
			)
			.await?;

		self.reject_native(request.token)?;

		// Pre-state for every wallet in one round trip: token balance,
		// native balance, wrapped balance, wrapped allowance.
		let mut batch = Vec::with_capacity(request.smart_accounts.len() * 4);
		for wallet in &request.smart_accounts {
			batch.push(chain_calls::erc20_balance(request.token, *wallet));
			batch.push(chain_calls::native_balance(contracts.multicall, *wallet));
			batch.push(chain_calls::erc20_balance(contracts.wrapped_native, *wallet));
			batch.push(chain_calls::erc20_allowance(
				contracts.wrapped_native,
				*wallet,
				router,
			));
		}
		let state = self.chain.aggregate(&batch).await?;

		let mut response = TradeResponse {
			user_id: request.user_id,
			token: request.token,
			..Default::default()
		};
		let mut locks = LockSet::new(self.locks.clone());
		let mut ops: Vec<UserOperation> = Vec::new();
		let mut pre_native: HashMap<Address, U256> = HashMap::new();
		let mut pre_token: HashMap<Address, U256> = HashMap::new();

		for (i, wallet) in request.smart_accounts.iter().enumerate() {
			let wallet_state = &state[4 * i..4 * i + 4];
			match self
				.plan_buy_op(
					request,
					*wallet,
					&session_key,
					proofs[i].clone(),
					wallet_state,
					router,
					family,
					fee,
					&split,
					min_out,
					price_limit,
					Some(&mut locks),
				)
				.await
			{
				Ok(plan) => {
					response.succeeded.push(*wallet);
					pre_native.insert(*wallet, plan.pre_native_total);
					pre_token.insert(*wallet, plan.pre_token);
					ops.push(plan.op);
				}
				Err(reason) => {
					response.op_errors.insert(*wallet, reason);
				}
			}
		}

		if ops.is_empty() {
			locks.release_all().await;
			return Ok(response);
		}

		match self
			.dispatch(request.user_id, request.use_private_relayer, &ops)
			.await
		{
			Ok(hash) => {
				response.tx_hash = Some(hash);
				if let Err(reason) = self
					.settle_buy(request, &mut response, &pre_native, &pre_token)
					.await
				{
					response.tx_error = Some(reason);
				}
			}
			Err(e) => {
				response.tx_error = Some(e.to_string());
			}
		}

		locks.release_all().await;
		Ok(response)
	}

	/// Builds one wallet's buy operation; any failure is recorded against
	/// this wallet only. Simulations pass no lock set.
	#[allow(clippy::too_many_arguments)]
	pub(crate) async fn plan_buy_op(
		&self,
		request: &BuyRequest,
		wallet: Address,
		session_key: &PrivateKeySigner,
		proof: Vec<B256>,
		state: &[BatchResult],
		router: Address,
		family: RouterFamily,
		fee: u32,
		split: &FeeSplit,
		min_out: U256,
		price_limit: U256,
		locks: Option<&mut LockSet>,
	) -> Result<WalletPlan, String> {
		if let Some(locks) = locks {
			if !locks.try_acquire(wallet).await.map_err(|e| e.to_string())? {
				return Err("Account is busy".to_string());
			}
		}

		let pre_token = chain_calls::decode_uint(&state[0]).map_err(|e| e.to_string())?;
		let native = chain_calls::decode_uint(&state[1]).map_err(|e| e.to_string())?;
		let wrapped = chain_calls::decode_uint(&state[2]).map_err(|e| e.to_string())?;
		let allowance = chain_calls::decode_uint(&state[3]).map_err(|e| e.to_string())?;

		let pre_native_total = native.saturating_add(wrapped);
		if request.native_amount > pre_native_total {
			return Err("Insufficient ETH".to_string());
		}

		let contracts = &self.settings.contracts;
		let mut sub_calls = Vec::new();

		// A wallet holding wrapped balance trades from it, topping up and
		// approving as needed; otherwise the swap carries native value.
		let call_value = if wrapped > U256::ZERO {
			if wrapped < split.amount_in {
				sub_calls.push(calls::wrap_native(
					contracts.wrapped_native,
					split.amount_in - wrapped,
				));
			}
			if allowance < split.amount_in {
				sub_calls.push(calls::approve(
					contracts.wrapped_native,
					router,
					request.native_amount,
				));
			}
			U256::ZERO
		} else {
			split.amount_in
		};

		let params = calls::SwapParams {
			token_in: contracts.wrapped_native,
			token_out: request.token,
			fee,
			recipient: wallet,
			deadline: Self::swap_deadline(),
			amount_in: split.amount_in,
			amount_out_minimum: min_out,
			sqrt_price_limit_x96: price_limit,
		};
		sub_calls.push(match family {
			RouterFamily::UniswapV3 => calls::uniswap_v3_swap(router, call_value, &params),
			RouterFamily::Algebra => calls::algebra_swap(router, call_value, &params),
		});
		sub_calls.push(calls::buy_fee_payment(contracts.fee_recipient, split.payment));

		let mut builder = SessionKeyOpBuilder::new(wallet, session_key.clone())
			.with_token(request.token)
			.with_router(router)
			.with_merkle_proof(proof)
			.with_buy_calls(sub_calls);

		if let Some(paymaster) = self
			.paymaster_data_for(request.owner, wallet)
			.await
			.map_err(|e| e.to_string())?
		{
			builder = builder.with_paymaster(paymaster);
		}

		let op = builder.build(&self.op_env()).await.map_err(|e| e.to_string())?;

		Ok(WalletPlan {
			op,
			pre_native_total,
			pre_wrapped: wrapped,
			pre_token,
		})
	}

	/// Reads post-state for the built wallets only and fills the response's
	/// sent/received deltas and the user's buy volume.
	async fn settle_buy(
		&self,
		request: &BuyRequest,
		response: &mut TradeResponse,
		pre_native: &HashMap<Address, U256>,
		pre_token: &HashMap<Address, U256>,
	) -> Result<(), String> {
		let contracts = &self.settings.contracts;
		let wallets = response.succeeded.clone();
		let n = wallets.len();

		let mut batch = Vec::with_capacity(n * 3);
		for wallet in &wallets {
			batch.push(chain_calls::native_balance(contracts.multicall, *wallet));
		}
		for wallet in &wallets {
			batch.push(chain_calls::erc20_balance(contracts.wrapped_native, *wallet));
		}
		for wallet in &wallets {
			batch.push(chain_calls::erc20_balance(request.token, *wallet));
		}
		let state = self.chain.aggregate(&batch).await.map_err(|e| e.to_string())?;

		let mut buyers = 0u32;
		for (i, wallet) in wallets.iter().enumerate() {
			let post_native = chain_calls::decode_uint(&state[i]).map_err(|e| e.to_string())?;
			let post_wrapped =
				chain_calls::decode_uint(&state[n + i]).map_err(|e| e.to_string())?;
			let post_token =
				chain_calls::decode_uint(&state[2 * n + i]).map_err(|e| e.to_string())?;

			let sent = pre_native[wallet]
				.saturating_sub(post_wrapped)
				.saturating_sub(post_native);
			let received = post_token.saturating_sub(pre_token[wallet]);

			response.sent.insert(*wallet, sent);
			response.received.insert(*wallet, received);
			if !received.is_zero() {
				buyers += 1;
			}
		}

		if buyers > 0 {
			let volume = wei_to_ether(request.native_amount) * Decimal::from(buyers);
			self.volumes
				.add_buy_volume(request.user_id, volume)
				.await
				.map_err(|e| e.to_string())?;
		}

		Ok(())
	}
}
