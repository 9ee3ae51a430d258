//! Resting (limit) order records.
//!
//! Resting orders are created by the messaging layer and consumed by the
//! scheduler: read when their trigger condition is met, deleted on execution
//! or expiry, never mutated in place.

use crate::market::Pool;
use alloy_primitives::{Address, U256};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// The market quantity a trigger threshold is denominated in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TriggerMetric {
	/// Compare against the token's USD price.
	Price,
	/// Compare against the token's market capitalization.
	MarketCap,
}

/// A resting buy order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuyOrder {
	/// Store-assigned identifier.
	pub id: String,
	/// Owning user.
	pub user_id: i64,
	/// Owner of the participating smart accounts.
	pub owner: Address,
	/// Wallets the order trades through.
	pub smart_accounts: Vec<Address>,
	/// Token to acquire.
	pub token: Address,
	/// Pool to route through once triggered.
	pub pool: Pool,
	/// Which market quantity the threshold compares against.
	pub metric: TriggerMetric,
	/// Trigger threshold; the order fires once the live value is at or
	/// below it.
	pub trigger_value: Decimal,
	/// Native amount to spend, in wei.
	pub native_spend: U256,
	/// Slippage tolerance in (0, 1).
	pub slippage: f64,
	/// Expiry as unix milliseconds.
	pub expires_at: i64,
	/// Route the submission through the user's private relayer.
	pub use_private_relayer: bool,
}

/// A resting sell order, either take-profit or stop-loss.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SellOrder {
	/// Store-assigned identifier.
	pub id: String,
	/// Owning user.
	pub user_id: i64,
	/// Owner of the participating smart accounts.
	pub owner: Address,
	/// Wallets the order trades through.
	pub smart_accounts: Vec<Address>,
	/// Token to dispose of.
	pub token: Address,
	/// Pool to route through once triggered.
	pub pool: Pool,
	/// Which market quantity the threshold compares against.
	pub metric: TriggerMetric,
	/// Trigger threshold. Take-profit fires at or above it, stop-loss at
	/// or below.
	pub trigger_value: Decimal,
	/// Take-profit when true, stop-loss otherwise.
	pub take_profit: bool,
	/// Explicit token amount to sell; takes precedence over `percent`.
	pub spend_amount: Option<U256>,
	/// Percentage of the live token balance to sell when no explicit
	/// amount is given.
	pub percent: Option<f64>,
	/// Slippage tolerance in (0, 1).
	pub slippage: f64,
	/// Expiry as unix milliseconds.
	pub expires_at: i64,
	/// Route the submission through the user's private relayer.
	pub use_private_relayer: bool,
}
