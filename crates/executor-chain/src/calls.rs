//! Encode/decode helpers for the batched state reads.
//!
//! Callers assemble [`BatchCall`]s with these helpers and decode the
//! positional results; the layout of a batch is owned by the caller.

use crate::{
	abi::{IMulticall3, IERC20},
	BatchCall, BatchResult, ChainError,
};
use alloy_primitives::{Address, U256};
use alloy_sol_types::SolCall;

/// ERC-20 balance of `owner`.
pub fn erc20_balance(token: Address, owner: Address) -> BatchCall {
	BatchCall {
		target: token,
		allow_failure: false,
		call_data: IERC20::balanceOfCall { account: owner }.abi_encode().into(),
	}
}

/// ERC-20 allowance from `owner` to `spender`.
pub fn erc20_allowance(token: Address, owner: Address, spender: Address) -> BatchCall {
	BatchCall {
		target: token,
		allow_failure: false,
		call_data: IERC20::allowanceCall { owner, spender }.abi_encode().into(),
	}
}

/// Native balance of `account`, read through the multicall contract so it
/// can join an aggregated batch.
pub fn native_balance(multicall: Address, account: Address) -> BatchCall {
	BatchCall {
		target: multicall,
		allow_failure: false,
		call_data: IMulticall3::getEthBalanceCall { addr: account }
			.abi_encode()
			.into(),
	}
}

/// Decodes a `uint256` result (balances, allowances).
pub fn decode_uint(result: &BatchResult) -> Result<U256, ChainError> {
	if !result.success {
		return Err(ChainError::Call("batched call reverted".to_string()));
	}
	if result.return_data.len() < 32 {
		return Err(ChainError::Decode(format!(
			"expected 32 bytes, got {}",
			result.return_data.len()
		)));
	}
	Ok(U256::from_be_slice(&result.return_data[..32]))
}

#[cfg(test)]
mod tests {
	use super::*;
	use alloy_primitives::address;

	#[test]
	fn decode_uint_round_trips() {
		let value = U256::from(123_456u64);
		let result = BatchResult {
			success: true,
			return_data: value.to_be_bytes::<32>().to_vec().into(),
		};
		assert_eq!(decode_uint(&result).unwrap(), value);
	}

	#[test]
	fn decode_uint_rejects_failed_call() {
		let result = BatchResult {
			success: false,
			return_data: Default::default(),
		};
		assert!(decode_uint(&result).is_err());
	}

	#[test]
	fn balance_call_targets_token() {
		let token = address!("82aF49447D8a07e3bd95BD0d56f35241523fBab1");
		let owner = address!("0000000000000000000000000000000000000001");
		let call = erc20_balance(token, owner);
		assert_eq!(call.target, token);
		assert!(!call.allow_failure);
		// balanceOf selector
		assert_eq!(&call.call_data[..4], &[0x70, 0xa0, 0x82, 0x31]);
	}
}
