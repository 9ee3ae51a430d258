//! Pure swap math over sqrt-price pool state.
//!
//! Pools quote a square-root-scaled price in X96 fixed point. All money
//! math here stays on wide integers; the only floating-point step is the
//! square root applied to the slippage tolerance itself.

use alloy_primitives::{Address, U256, U512};
use rust_decimal::Decimal;
use thiserror::Error;

/// Fixed-point scale for the slippage ratio.
const RATIO_SCALE: u128 = 1_000_000_000_000_000_000;
/// Scale factor turning a raw ratio into a percentage with 4 decimals.
const IMPACT_SCALE: u64 = 1_000_000;

/// Errors raised by the math layer.
#[derive(Debug, Error)]
pub enum AmmError {
	#[error("Slippage out of range: {0}")]
	InvalidSlippage(f64),
	#[error("Percent out of range: {0}")]
	InvalidPercent(f64),
	#[error("Zero sqrt price")]
	ZeroPrice,
	#[error("Arithmetic overflow")]
	Overflow,
}

/// Pool token ordering: whether `token` sorts before the base asset.
pub fn is_token0(token: Address, base: Address) -> bool {
	token < base
}

fn widen(value: U256) -> U512 {
	U512::from_be_slice(&value.to_be_bytes::<32>())
}

fn narrow(value: U512) -> Result<U256, AmmError> {
	let bytes = value.to_be_bytes::<64>();
	if bytes[..32].iter().any(|b| *b != 0) {
		return Err(AmmError::Overflow);
	}
	Ok(U256::from_be_slice(&bytes[32..]))
}

/// The worst acceptable sqrt price for a swap at the given slippage.
///
/// Scales the current sqrt price by `sqrt(1 - slippage)` for sells and
/// `sqrt(1 + slippage)` for buys; whether that scales up or down depends on
/// the pool's token ordering.
pub fn sqrt_price_limit(
	token: Address,
	base: Address,
	slippage: f64,
	sqrt_price_x96: U256,
	is_sell: bool,
) -> Result<U256, AmmError> {
	if !(slippage > 0.0 && slippage < 1.0) {
		return Err(AmmError::InvalidSlippage(slippage));
	}

	let ratio = if is_sell {
		(1.0 - slippage).sqrt()
	} else {
		(1.0 + slippage).sqrt()
	};
	let scaled_ratio = U256::from((ratio * RATIO_SCALE as f64) as u128);
	let scale = U256::from(RATIO_SCALE);

	if is_token0(token, base) {
		Ok(sqrt_price_x96
			.checked_mul(scaled_ratio)
			.ok_or(AmmError::Overflow)?
			/ scale)
	} else {
		Ok(sqrt_price_x96.checked_mul(scale).ok_or(AmmError::Overflow)? / scaled_ratio)
	}
}

/// The minimum acceptable output for `amount_in` at the price limit.
///
/// Converts the input through the squared price ratio; the direction of the
/// conversion follows from the token ordering and the swap side.
pub fn min_output_threshold(
	token: Address,
	base: Address,
	is_buy: bool,
	amount_in: U256,
	sqrt_price_limit_x96: U256,
) -> Result<U256, AmmError> {
	if sqrt_price_limit_x96.is_zero() {
		return Err(AmmError::ZeroPrice);
	}

	let zero_to_one = is_token0(token, base) != is_buy;
	let amount = widen(amount_in);
	let limit = widen(sqrt_price_limit_x96);
	let limit_sq = limit * limit;

	let out = if zero_to_one {
		amount.checked_mul(limit_sq).ok_or(AmmError::Overflow)? >> 192
	} else {
		amount
			.checked_mul(U512::from(1u8) << 192)
			.ok_or(AmmError::Overflow)?
			/ limit_sq
	};

	narrow(out)
}

/// Percentage deviation between a pre- and post-trade sqrt price, with 4
/// decimal places, oriented by token ordering.
pub fn price_impact(
	token: Address,
	base: Address,
	pre_sqrt_price_x96: U256,
	post_sqrt_price_x96: U256,
) -> Result<Decimal, AmmError> {
	let (lead, trail, denom) = if is_token0(token, base) {
		(post_sqrt_price_x96, pre_sqrt_price_x96, pre_sqrt_price_x96)
	} else {
		(pre_sqrt_price_x96, post_sqrt_price_x96, post_sqrt_price_x96)
	};
	if denom.is_zero() {
		return Err(AmmError::ZeroPrice);
	}

	let negative = lead < trail;
	let diff = widen(if negative { trail - lead } else { lead - trail });
	let sum = widen(lead) + widen(trail);
	let denom = widen(denom);

	// (lead^2 - trail^2) / denom^2 via the difference of squares.
	let scaled = diff
		.checked_mul(sum)
		.and_then(|n| n.checked_mul(U512::from(IMPACT_SCALE)))
		.ok_or(AmmError::Overflow)?
		/ (denom * denom);

	let magnitude = i128::try_from(scaled).map_err(|_| AmmError::Overflow)?;
	Ok(Decimal::from_i128_with_scale(
		if negative { -magnitude } else { magnitude },
		4,
	))
}

/// The fee split applied to every spend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeeSplit {
	/// Fee forwarded to the fee recipient.
	pub payment: U256,
	/// Remainder actually swapped.
	pub amount_in: U256,
}

/// Splits a spend amount into fee payment and swap input.
///
/// `payment + amount_in == amount` holds exactly; the only rounding is the
/// single integer division.
pub fn split_fee(amount: U256, fee_rate: u64, fee_rate_precision: u64) -> Result<FeeSplit, AmmError> {
	let payment = amount
		.checked_mul(U256::from(fee_rate))
		.ok_or(AmmError::Overflow)?
		/ U256::from(fee_rate_precision);
	Ok(FeeSplit {
		payment,
		amount_in: amount - payment,
	})
}

/// The integer share of `balance` for a percentage in (0, 100].
pub fn percent_of(balance: U256, percent: f64) -> Result<U256, AmmError> {
	if !(percent > 0.0 && percent <= 100.0) {
		return Err(AmmError::InvalidPercent(percent));
	}
	let scaled = (percent * 1e6).floor() as u64;
	Ok(balance
		.checked_mul(U256::from(scaled))
		.ok_or(AmmError::Overflow)?
		/ U256::from(100_000_000u64))
}

#[cfg(test)]
mod tests {
	use super::*;
	use alloy_primitives::address;

	const TOKEN0: Address = address!("1000000000000000000000000000000000000000");
	const TOKEN1: Address = address!("f000000000000000000000000000000000000000");
	const BASE: Address = address!("8000000000000000000000000000000000000000");

	fn q96() -> U256 {
		U256::from(1u8) << 96
	}

	#[test]
	fn sell_limit_never_exceeds_current_price_for_token0() {
		for slippage in [0.001, 0.01, 0.05, 0.3, 0.9] {
			let limit = sqrt_price_limit(TOKEN0, BASE, slippage, q96(), true).unwrap();
			assert!(limit <= q96(), "slippage {}", slippage);
		}
	}

	#[test]
	fn buy_limit_never_undercuts_current_price_for_token0() {
		for slippage in [0.001, 0.01, 0.05, 0.3, 0.9] {
			let limit = sqrt_price_limit(TOKEN0, BASE, slippage, q96(), false).unwrap();
			assert!(limit >= q96(), "slippage {}", slippage);
		}
	}

	#[test]
	fn token1_limits_move_opposite() {
		let sell = sqrt_price_limit(TOKEN1, BASE, 0.05, q96(), true).unwrap();
		let buy = sqrt_price_limit(TOKEN1, BASE, 0.05, q96(), false).unwrap();
		assert!(sell >= q96());
		assert!(buy <= q96());
	}

	#[test]
	fn slippage_bounds_are_enforced() {
		assert!(sqrt_price_limit(TOKEN0, BASE, 0.0, q96(), true).is_err());
		assert!(sqrt_price_limit(TOKEN0, BASE, 1.0, q96(), true).is_err());
	}

	#[test]
	fn threshold_is_identity_at_unit_price() {
		let amount = U256::from(1_000_000_000u64);
		// At sqrt price 1.0 both directions convert one-to-one.
		let buy = min_output_threshold(TOKEN0, BASE, true, amount, q96()).unwrap();
		let sell = min_output_threshold(TOKEN0, BASE, false, amount, q96()).unwrap();
		assert_eq!(buy, amount);
		assert_eq!(sell, amount);
	}

	#[test]
	fn threshold_follows_squared_ratio() {
		let amount = U256::from(400u64);
		// sqrt price 2.0, price 4.0.
		let limit = q96() * U256::from(2u8);
		// token0 + sell is zero-for-one: multiply by the squared ratio.
		let out = min_output_threshold(TOKEN0, BASE, false, amount, limit).unwrap();
		assert_eq!(out, U256::from(1600u64));
		// token0 + buy is one-for-zero: divide.
		let out = min_output_threshold(TOKEN0, BASE, true, amount, limit).unwrap();
		assert_eq!(out, U256::from(100u64));
	}

	#[test]
	fn price_impact_matches_difference_of_squares() {
		let pre = U256::from(10u8) << 92;
		let post = U256::from(11u8) << 92;
		// (121 - 100) / 100 = 21%
		let impact = price_impact(TOKEN0, BASE, pre, post).unwrap();
		assert_eq!(impact, Decimal::new(210_000, 4));
	}

	#[test]
	fn price_impact_is_signed() {
		let pre = U256::from(10u8) << 92;
		let post = U256::from(9u8) << 92;
		let impact = price_impact(TOKEN0, BASE, pre, post).unwrap();
		assert!(impact < Decimal::ZERO);
	}

	#[test]
	fn fee_split_is_exact() {
		for amount in [1u64, 999, 1_000_000, 123_456_789] {
			let amount = U256::from(amount);
			let split = split_fee(amount, 2_500, 1_000_000).unwrap();
			assert_eq!(split.payment + split.amount_in, amount);
			assert_eq!(
				split.payment,
				amount * U256::from(2_500u64) / U256::from(1_000_000u64)
			);
		}
	}

	#[test]
	fn percent_of_balance_uses_integer_scaling() {
		let balance = U256::from(1_000_000u64);
		assert_eq!(percent_of(balance, 50.0).unwrap(), U256::from(500_000u64));
		assert_eq!(percent_of(balance, 0.5).unwrap(), U256::from(5_000u64));
		assert!(percent_of(balance, 0.0).is_err());
		assert!(percent_of(balance, 150.0).is_err());
	}
}
