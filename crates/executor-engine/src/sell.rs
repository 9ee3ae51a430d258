//! Sell execution: a token back into the native base asset.

use crate::{buy::WalletPlan, calls, wei_to_ether, EngineError, ExecutionEngine, LockSet, RouterFamily};
use alloy_primitives::{Address, B256, U256};
use alloy_signer_local::PrivateKeySigner;
use executor_amm::{min_output_threshold, percent_of, split_fee, sqrt_price_limit};
use executor_chain::{calls as chain_calls, BatchResult, ChainClient};
use executor_ops::SessionKeyOpBuilder;
use executor_storage::VolumeStore;
use executor_types::{SellRequest, TradeResponse, UserOperation};
use std::collections::HashMap;

impl ExecutionEngine {
	/// Executes a sell across the request's wallets.
	///
	/// Sizing: an explicit spend amount wins; otherwise each wallet sells a
	/// percentage of its live balance, computed with integer scaling.
	pub async fn sell(&self, request: &SellRequest) -> Result<TradeResponse, EngineError> {
		let contracts = self.settings.contracts.clone();
		let session_key = self.deriver.session_key(request.user_id)?;
		let (router, family) = self.swap_router(&request.pool.name);

		if request.spend_amount.is_none() && request.percent.is_none() {
			return Err(EngineError::MissingSellAmount);
		}

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

		let price_limit = sqrt_price_limit(
			request.token,
			contracts.wrapped_native,
			request.slippage,
			request.pool.sqrt_price_x96,
			true,
		)?;
		let fee = match family {
			RouterFamily::UniswapV3 => self
				.pool_fee(&request.pool, request.token, false)
				.ok_or_else(|| EngineError::MissingPoolFee(request.pool.name.clone()))?,
			RouterFamily::Algebra => 0,
		};

		// Pre-state per wallet: token balance, token allowance, native
		// balance, wrapped balance.
		let mut batch = Vec::with_capacity(request.smart_accounts.len() * 4);
		for wallet in &request.smart_accounts {
			batch.push(chain_calls::erc20_balance(request.token, *wallet));
			batch.push(chain_calls::erc20_allowance(request.token, *wallet, router));
			batch.push(chain_calls::native_balance(contracts.multicall, *wallet));
			batch.push(chain_calls::erc20_balance(contracts.wrapped_native, *wallet));
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
		let mut pre_wrapped: HashMap<Address, U256> = HashMap::new();
		let mut pre_token: HashMap<Address, U256> = HashMap::new();

		for (i, wallet) in request.smart_accounts.iter().enumerate() {
			let wallet_state = &state[4 * i..4 * i + 4];
			match self
				.plan_sell_op(
					request,
					*wallet,
					&session_key,
					proofs[i].clone(),
					wallet_state,
					router,
					family,
					fee,
					price_limit,
					Some(&mut locks),
				)
				.await
			{
				Ok(plan) => {
					response.succeeded.push(*wallet);
					pre_native.insert(*wallet, plan.pre_native_total);
					pre_wrapped.insert(*wallet, plan.pre_wrapped);
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
					.settle_sell(request, &mut response, &pre_native, &pre_wrapped, &pre_token)
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

	#[allow(clippy::too_many_arguments)]
	pub(crate) async fn plan_sell_op(
		&self,
		request: &SellRequest,
		wallet: Address,
		session_key: &PrivateKeySigner,
		proof: Vec<B256>,
		state: &[BatchResult],
		router: Address,
		family: RouterFamily,
		fee: u32,
		price_limit: U256,
		locks: Option<&mut LockSet>,
	) -> Result<WalletPlan, String> {
		if let Some(locks) = locks {
			if !locks.try_acquire(wallet).await.map_err(|e| e.to_string())? {
				return Err("Account is busy".to_string());
			}
		}

		let pre_token = chain_calls::decode_uint(&state[0]).map_err(|e| e.to_string())?;
		if pre_token.is_zero() {
			return Err("Token balance is zero".to_string());
		}
		let allowance = chain_calls::decode_uint(&state[1]).map_err(|e| e.to_string())?;
		let native = chain_calls::decode_uint(&state[2]).map_err(|e| e.to_string())?;
		let wrapped = chain_calls::decode_uint(&state[3]).map_err(|e| e.to_string())?;

		let spend = match (request.spend_amount, request.percent) {
			(Some(amount), _) => amount,
			(None, Some(percent)) => {
				percent_of(pre_token, percent).map_err(|e| e.to_string())?
			}
			(None, None) => return Err("No spend amount or percent provided".to_string()),
		};

		let split = split_fee(
			spend,
			self.settings.fee_rate,
			self.settings.fee_rate_precision,
		)
		.map_err(|e| e.to_string())?;
		let min_out = min_output_threshold(
			request.token,
			self.settings.contracts.wrapped_native,
			false,
			split.amount_in,
			price_limit,
		)
		.map_err(|e| e.to_string())?;

		let contracts = &self.settings.contracts;
		let mut sub_calls = Vec::new();

		if split.amount_in > allowance {
			sub_calls.push(calls::approve(request.token, router, split.amount_in));
		}

		let params = calls::SwapParams {
			token_in: request.token,
			token_out: contracts.wrapped_native,
			fee,
			recipient: wallet,
			deadline: Self::swap_deadline(),
			amount_in: split.amount_in,
			amount_out_minimum: min_out,
			sqrt_price_limit_x96: price_limit,
		};
		sub_calls.push(match family {
			RouterFamily::UniswapV3 => calls::uniswap_v3_swap(router, U256::ZERO, &params),
			RouterFamily::Algebra => calls::algebra_swap(router, U256::ZERO, &params),
		});
		sub_calls.push(calls::sell_fee_payment(
			request.token,
			contracts.fee_recipient,
			split.payment,
		));

		let mut builder = SessionKeyOpBuilder::new(wallet, session_key.clone())
			.with_token(request.token)
			.with_router(router)
			.with_merkle_proof(proof)
			.with_sell_calls(sub_calls);

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
			pre_native_total: native.saturating_add(wrapped),
			pre_wrapped: wrapped,
			pre_token,
		})
	}

	async fn settle_sell(
		&self,
		request: &SellRequest,
		response: &mut TradeResponse,
		pre_native: &HashMap<Address, U256>,
		pre_wrapped: &HashMap<Address, U256>,
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

		let mut proceeds = rust_decimal::Decimal::ZERO;
		for (i, wallet) in wallets.iter().enumerate() {
			let post_native = chain_calls::decode_uint(&state[i]).map_err(|e| e.to_string())?;
			let post_wrapped =
				chain_calls::decode_uint(&state[n + i]).map_err(|e| e.to_string())?;
			let post_token =
				chain_calls::decode_uint(&state[2 * n + i]).map_err(|e| e.to_string())?;

			let received_wrapped = post_wrapped.saturating_sub(pre_wrapped[wallet]);
			let received = post_wrapped
				.saturating_add(post_native)
				.saturating_sub(pre_native[wallet]);
			let sent = pre_token[wallet].saturating_sub(post_token);

			response.received.insert(*wallet, received);
			response.sent.insert(*wallet, sent);
			if !received_wrapped.is_zero() {
				proceeds += wei_to_ether(received_wrapped);
			}
		}

		if !proceeds.is_zero() {
			self.volumes
				.add_sell_volume(request.user_id, proceeds)
				.await
				.map_err(|e| e.to_string())?;
		}

		Ok(())
	}
}
