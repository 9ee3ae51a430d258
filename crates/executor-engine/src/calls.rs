//! Sub-call builders for the operations the engine assembles.

use alloy_primitives::{
	aliases::{U160, U24},
	Address, U256,
};
use alloy_sol_types::SolCall;
use executor_chain::abi::{IAlgebraRouter, IUniswapV3Router, IWrappedNative, IERC20};
use executor_types::SubCall;

/// Wraps native currency into the base token.
pub fn wrap_native(wrapped: Address, amount: U256) -> SubCall {
	SubCall {
		to: wrapped,
		value: amount,
		data: IWrappedNative::depositCall {}.abi_encode().into(),
	}
}

/// Grants an ERC-20 allowance to a spender.
pub fn approve(token: Address, spender: Address, amount: U256) -> SubCall {
	SubCall {
		to: token,
		value: U256::ZERO,
		data: IERC20::approveCall { spender, amount }.abi_encode().into(),
	}
}

/// Pays the buy-side fee in native currency.
pub fn buy_fee_payment(fee_recipient: Address, payment: U256) -> SubCall {
	SubCall::transfer(fee_recipient, payment)
}

/// Pays the sell-side fee in the sold token.
pub fn sell_fee_payment(token: Address, fee_recipient: Address, payment: U256) -> SubCall {
	SubCall {
		to: token,
		value: U256::ZERO,
		data: IERC20::transferCall {
			to: fee_recipient,
			amount: payment,
		}
		.abi_encode()
		.into(),
	}
}

/// Parameters shared by both router families.
#[derive(Debug, Clone)]
pub struct SwapParams {
	pub token_in: Address,
	pub token_out: Address,
	/// Fee tier; only the Uniswap-style router encodes it.
	pub fee: u32,
	pub recipient: Address,
	pub deadline: u64,
	pub amount_in: U256,
	pub amount_out_minimum: U256,
	pub sqrt_price_limit_x96: U256,
}

fn to_u160(value: U256) -> U160 {
	// Mirrors the on-chain uint160 narrowing of the price limit.
	U160::from_be_slice(&value.to_be_bytes::<32>()[12..])
}

/// An `exactInputSingle` swap through the Uniswap-style router.
pub fn uniswap_v3_swap(router: Address, call_value: U256, params: &SwapParams) -> SubCall {
	let data = IUniswapV3Router::exactInputSingleCall {
		params: IUniswapV3Router::ExactInputSingleParams {
			tokenIn: params.token_in,
			tokenOut: params.token_out,
			fee: U24::from(params.fee),
			recipient: params.recipient,
			deadline: U256::from(params.deadline),
			amountIn: params.amount_in,
			amountOutMinimum: params.amount_out_minimum,
			sqrtPriceLimitX96: to_u160(params.sqrt_price_limit_x96),
		},
	}
	.abi_encode();

	SubCall {
		to: router,
		value: call_value,
		data: data.into(),
	}
}

/// An `exactInputSingle` swap through the Algebra-style router.
pub fn algebra_swap(router: Address, call_value: U256, params: &SwapParams) -> SubCall {
	let data = IAlgebraRouter::exactInputSingleCall {
		params: IAlgebraRouter::ExactInputSingleParams {
			tokenIn: params.token_in,
			tokenOut: params.token_out,
			recipient: params.recipient,
			deadline: U256::from(params.deadline),
			amountIn: params.amount_in,
			amountOutMinimum: params.amount_out_minimum,
			limitSqrtPrice: to_u160(params.sqrt_price_limit_x96),
		},
	}
	.abi_encode();

	SubCall {
		to: router,
		value: call_value,
		data: data.into(),
	}
}
