//! Simulation-only execution paths.
//!
//! Mirror buy and sell but never submit, never touch wallet locks and never
//! accumulate volume. Each operation is simulated against the entry point
//! with an attached probe that reads the wallet's post-state and the pool's
//! post-trade sqrt price in one aggregated call.

use crate::{EngineError, ExecutionEngine, RouterFamily};
use alloy_primitives::{Address, Bytes, I256, U256};
use alloy_sol_types::SolCall;
use executor_amm::{min_output_threshold, price_impact, split_fee, sqrt_price_limit};
use executor_chain::{
	abi::{IAlgebraPool, IMulticall3, IUniswapV3Pool},
	calls as chain_calls, BatchCall, BatchResult, ChainClient, SimulationOutcome,
};
use executor_types::{BuyRequest, Pool, SellRequest, SimulateResponse, UserOperation};
use std::collections::HashMap;

/// `a - b` over unsigned balances, widened to a signed delta.
fn signed_delta(a: U256, b: U256) -> I256 {
	if a >= b {
		I256::try_from(a - b).unwrap_or(I256::MAX)
	} else {
		-I256::try_from(b - a).unwrap_or(I256::MAX)
	}
}

impl ExecutionEngine {
	/// Simulates a buy, returning per-wallet deltas, price impact and the
	/// gas consumed beyond the requested spend.
	pub async fn simulate_buy(&self, request: &BuyRequest) -> Result<SimulateResponse, EngineError> {
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

		let mut response = SimulateResponse {
			user_id: request.user_id,
			token: request.token,
			..Default::default()
		};
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
					None,
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
			return Ok(response);
		}

		let probes: Vec<BatchCall> = response
			.succeeded
			.iter()
			.map(|wallet| self.state_probe(*wallet, request.token, &request.pool, family))
			.collect();

		let outcomes = self.relayers.simulate(&ops, &probes).await?;

		for (i, wallet) in response.succeeded.clone().iter().enumerate() {
			let probe_results = match Self::probe_results(&outcomes[i]) {
				Ok(results) => results,
				Err(reason) => {
					response.tx_error = Some(reason);
					break;
				}
			};

			let post_native = chain_calls::decode_uint(&probe_results[0])
				.map_err(EngineError::Chain)?;
			let post_wrapped = chain_calls::decode_uint(&probe_results[1])
				.map_err(EngineError::Chain)?;
			let post_token = chain_calls::decode_uint(&probe_results[2])
				.map_err(EngineError::Chain)?;

			let sent = pre_native[wallet]
				.saturating_sub(post_wrapped)
				.saturating_sub(post_native);
			let received = post_token.saturating_sub(pre_token[wallet]);

			response.sent.insert(*wallet, sent);
			response.received.insert(*wallet, received);
			response
				.gas_delta
				.insert(*wallet, signed_delta(sent, request.native_amount));

			if let Ok(post_sqrt_price) = chain_calls::decode_uint(&probe_results[3]) {
				let impact = price_impact(
					request.token,
					contracts.wrapped_native,
					request.pool.sqrt_price_x96,
					post_sqrt_price,
				)?;
				response.price_impact.insert(*wallet, impact);
			}
		}

		Ok(response)
	}

	/// Simulates a sell; the gas delta is the wrapped proceeds the wallet
	/// did not keep as native value.
	pub async fn simulate_sell(
		&self,
		request: &SellRequest,
	) -> Result<SimulateResponse, EngineError> {
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

		let mut batch = Vec::with_capacity(request.smart_accounts.len() * 4);
		for wallet in &request.smart_accounts {
			batch.push(chain_calls::erc20_balance(request.token, *wallet));
			batch.push(chain_calls::erc20_allowance(request.token, *wallet, router));
			batch.push(chain_calls::native_balance(contracts.multicall, *wallet));
			batch.push(chain_calls::erc20_balance(contracts.wrapped_native, *wallet));
		}
		let state = self.chain.aggregate(&batch).await?;

		let mut response = SimulateResponse {
			user_id: request.user_id,
			token: request.token,
			..Default::default()
		};
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
					None,
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
			return Ok(response);
		}

		let probes: Vec<BatchCall> = response
			.succeeded
			.iter()
			.map(|wallet| self.state_probe(*wallet, request.token, &request.pool, family))
			.collect();

		let outcomes = self.relayers.simulate(&ops, &probes).await?;

		for (i, wallet) in response.succeeded.clone().iter().enumerate() {
			let probe_results = match Self::probe_results(&outcomes[i]) {
				Ok(results) => results,
				Err(reason) => {
					response.tx_error = Some(reason);
					break;
				}
			};

			let post_native = chain_calls::decode_uint(&probe_results[0])
				.map_err(EngineError::Chain)?;
			let post_wrapped = chain_calls::decode_uint(&probe_results[1])
				.map_err(EngineError::Chain)?;
			let post_token = chain_calls::decode_uint(&probe_results[2])
				.map_err(EngineError::Chain)?;

			let received_wrapped = post_wrapped.saturating_sub(pre_wrapped[wallet]);
			let received = post_wrapped
				.saturating_add(post_native)
				.saturating_sub(pre_native[wallet]);
			let sent = pre_token[wallet].saturating_sub(post_token);

			response.sent.insert(*wallet, sent);
			response.received.insert(*wallet, received);
			response
				.gas_delta
				.insert(*wallet, signed_delta(received_wrapped, received));

			if let Ok(post_sqrt_price) = chain_calls::decode_uint(&probe_results[3]) {
				let impact = price_impact(
					request.token,
					contracts.wrapped_native,
					request.pool.sqrt_price_x96,
					post_sqrt_price,
				)?;
				response.price_impact.insert(*wallet, impact);
			}
		}

		Ok(response)
	}

	/// The post-state probe attached to a simulated operation: wallet
	/// balances plus the pool's sqrt price, aggregated into one call.
	fn state_probe(&self, wallet: Address, token: Address, pool: &Pool, family: RouterFamily) -> BatchCall {
		let contracts = &self.settings.contracts;

		let pool_state = match family {
			RouterFamily::UniswapV3 => BatchCall {
				target: pool.address,
				allow_failure: false,
				call_data: IUniswapV3Pool::slot0Call {}.abi_encode().into(),
			},
			RouterFamily::Algebra => BatchCall {
				target: pool.address,
				allow_failure: true,
				call_data: IAlgebraPool::globalStateCall {}.abi_encode().into(),
			},
		};

		let inner = [
			chain_calls::native_balance(contracts.multicall, wallet),
			chain_calls::erc20_balance(contracts.wrapped_native, wallet),
			chain_calls::erc20_balance(token, wallet),
			pool_state,
		];

		BatchCall {
			target: contracts.multicall,
			allow_failure: false,
			call_data: IMulticall3::aggregate3Call {
				calls: inner
					.iter()
					.map(|c| IMulticall3::Call3 {
						target: c.target,
						allowFailure: c.allow_failure,
						callData: c.call_data.clone(),
					})
					.collect(),
			}
			.abi_encode()
			.into(),
		}
	}

	/// Unpacks a simulation outcome into the probe's aggregated results.
	fn probe_results(outcome: &SimulationOutcome) -> Result<Vec<BatchResult>, String> {
		match outcome {
			SimulationOutcome::Failed { reason } => Err(reason.clone()),
			SimulationOutcome::Executed {
				target_success,
				target_result,
			} => {
				if !*target_success {
					return Err("state probe reverted".to_string());
				}
				let results = Self::decode_probe(target_result)?;
				if results.len() < 4 {
					return Err(format!("state probe returned {} results", results.len()));
				}
				Ok(results)
			}
		}
	}

	fn decode_probe(target_result: &Bytes) -> Result<Vec<BatchResult>, String> {
		let decoded = IMulticall3::aggregate3Call::abi_decode_returns(target_result, true)
			.map_err(|e| e.to_string())?;
		Ok(decoded
			.returnData
			.into_iter()
			.map(|r| BatchResult {
				success: r.success,
				return_data: r.returnData,
			})
			.collect())
	}
}
