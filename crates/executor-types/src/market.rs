//! Market data types.

use alloy_primitives::{Address, U256};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// A liquidity pool descriptor supplied by the caller.
///
/// Route selection happens upstream; the executor only needs the pool's
/// identity, its fee structure and the current sqrt price. Uniswap-style
/// pools carry a single `fee`; Algebra-style pools quote directional fees.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Pool {
	/// Venue name, resolved to a router through configuration.
	pub name: String,
	/// Pool contract address, used as the state probe target in simulations.
	pub address: Address,
	/// Flat fee in hundredths of a bip, when the venue has one.
	pub fee: Option<u32>,
	/// Zero-for-one directional fee.
	pub fee_zto: Option<u32>,
	/// One-for-zero directional fee.
	pub fee_otz: Option<u32>,
	/// Current sqrt price in X96 fixed point.
	pub sqrt_price_x96: U256,
}

impl Pool {
	/// Fee applicable to a swap in the given direction.
	pub fn fee_for(&self, zero_to_one: bool) -> Option<u32> {
		self.fee
			.or(if zero_to_one { self.fee_zto } else { self.fee_otz })
	}
}

/// A polled market snapshot for one tracked token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarketSnapshot {
	/// Token the snapshot describes.
	pub token: Address,
	/// Spot price in USD.
	pub price_usd: Decimal,
	/// Fully diluted market capitalization in USD.
	pub market_cap: Decimal,
	/// The deepest pool for the token, used to execute triggered orders.
	pub most_liquid_pool: Pool,
}
