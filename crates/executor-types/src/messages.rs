//! Broker boundary messages.
//!
//! Requests are consumed from the message broker, responses are published
//! back. The transport itself is owned by an external collaborator; the
//! executor only defines the shapes and the [`ResponsePublisher`] seam.

use crate::{
	market::Pool,
	orders::{BuyOrder, SellOrder},
};
use alloy_primitives::{Address, B256, I256, U256};
use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;

/// A request to buy a token with the native asset.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuyRequest {
	/// Owner of the participating smart accounts.
	pub owner: Address,
	/// Wallets to trade through.
	pub smart_accounts: Vec<Address>,
	/// Requesting user.
	pub user_id: i64,
	/// Token to acquire.
	pub token: Address,
	/// Native amount to spend per wallet, in wei.
	pub native_amount: U256,
	/// Slippage tolerance in (0, 1).
	pub slippage: f64,
	/// Pool chosen by the caller.
	pub pool: Pool,
	/// Route through the user's private relayer instead of the shared pool.
	#[serde(default)]
	pub use_private_relayer: bool,
}

/// A request to sell a token back into the native asset.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SellRequest {
	/// Owner of the participating smart accounts.
	pub owner: Address,
	/// Wallets to trade through.
	pub smart_accounts: Vec<Address>,
	/// Requesting user.
	pub user_id: i64,
	/// Token to dispose of.
	pub token: Address,
	/// Explicit token amount to sell; takes precedence over `percent`.
	pub spend_amount: Option<U256>,
	/// Percentage of the live balance to sell when no amount is given.
	pub percent: Option<f64>,
	/// Slippage tolerance in (0, 1).
	pub slippage: f64,
	/// Pool chosen by the caller.
	pub pool: Pool,
	/// Route through the user's private relayer instead of the shared pool.
	#[serde(default)]
	pub use_private_relayer: bool,
}

/// A request to grant an ERC-20 allowance ahead of trading.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PreApproveRequest {
	/// Owner of the participating smart accounts.
	pub owner: Address,
	/// Wallets to approve from.
	pub smart_accounts: Vec<Address>,
	/// Requesting user.
	pub user_id: i64,
	/// Venue name resolved to the spender router through configuration.
	pub pool_name: String,
	/// Token to approve.
	pub token: Address,
	/// Allowance to grant.
	pub allowance: U256,
	/// Route through the user's private relayer instead of the shared pool.
	#[serde(default)]
	pub use_private_relayer: bool,
}

/// The per-wallet outcome of a buy or sell request.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TradeResponse {
	/// Requesting user.
	pub user_id: i64,
	/// Traded token.
	pub token: Address,
	/// Wallets that failed before submission, with the reason.
	pub op_errors: HashMap<Address, String>,
	/// Wallets whose operation was built and submitted.
	pub succeeded: Vec<Address>,
	/// Amount each successful wallet spent, measured by pre/post deltas.
	pub sent: HashMap<Address, U256>,
	/// Amount each successful wallet received, measured by pre/post deltas.
	pub received: HashMap<Address, U256>,
	/// Submission hash, when at least one operation was dispatched.
	pub tx_hash: Option<B256>,
	/// Dispatch or post-state failure affecting the whole batch.
	pub tx_error: Option<String>,
}

/// Paymaster allowance metadata echoed back on pre-approvals that target
/// the fee paymaster itself.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymasterApproval {
	/// Owner of the approving wallets.
	pub owner: Address,
	/// Wallets that granted the allowance.
	pub smart_accounts: Vec<Address>,
	/// The paymaster that was approved as spender.
	pub router: Address,
	/// Approved fee token.
	pub token: Address,
	/// Granted allowance.
	pub allowance: U256,
}

/// The outcome of a pre-approve request.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PreApproveResponse {
	/// Requesting user.
	pub user_id: i64,
	/// Wallets that failed before submission, with the reason.
	pub op_errors: HashMap<Address, String>,
	/// Wallets whose operation was built and submitted.
	pub succeeded: Vec<Address>,
	/// Submission hash, when at least one operation was dispatched.
	pub tx_hash: Option<B256>,
	/// Dispatch failure affecting the whole batch.
	pub tx_error: Option<String>,
	/// Present when the approval targeted the fee paymaster.
	pub paymaster_approval: Option<PaymasterApproval>,
}

/// The outcome of a simulate-buy or simulate-sell request.
///
/// Mirrors [`TradeResponse`] but is produced without submitting anything
/// on-chain, and adds the simulated price impact and gas delta per wallet.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SimulateResponse {
	/// Requesting user.
	pub user_id: i64,
	/// Traded token.
	pub token: Address,
	/// Wallets that failed before simulation, with the reason.
	pub op_errors: HashMap<Address, String>,
	/// Wallets whose operation was built and simulated.
	pub succeeded: Vec<Address>,
	/// Simulated spend per wallet.
	pub sent: HashMap<Address, U256>,
	/// Simulated proceeds per wallet.
	pub received: HashMap<Address, U256>,
	/// Simulated pool price impact per wallet, as a percentage.
	pub price_impact: HashMap<Address, Decimal>,
	/// Simulated gas cost per wallet: spend beyond the requested amount.
	pub gas_delta: HashMap<Address, I256>,
	/// Simulation failure affecting the whole batch.
	pub tx_error: Option<String>,
}

/// A triggered resting order, tagged by side.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum TriggeredOrder {
	/// A buy order.
	Buy(BuyOrder),
	/// A sell order.
	Sell(SellOrder),
}

/// The published outcome of one triggered resting order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LimitOrderOutcome {
	/// The order that fired, as it was stored.
	pub order: TriggeredOrder,
	/// Execution result when the engine was reached.
	pub response: Option<TradeResponse>,
	/// Failure that prevented execution.
	pub error: Option<String>,
}

/// Errors surfaced by the publish boundary.
#[derive(Debug, Error)]
pub enum PublishError {
	/// The broker rejected or dropped the message.
	#[error("publish failed: {0}")]
	Transport(String),
}

/// The outbound half of the broker boundary.
///
/// Implemented by the external transport; the engine and scheduler only
/// ever publish through this trait.
#[async_trait]
pub trait ResponsePublisher: Send + Sync {
	/// Publish a buy result.
	async fn publish_buy(&self, response: &TradeResponse) -> Result<(), PublishError>;
	/// Publish a sell result.
	async fn publish_sell(&self, response: &TradeResponse) -> Result<(), PublishError>;
	/// Publish a pre-approve result.
	async fn publish_pre_approve(&self, response: &PreApproveResponse) -> Result<(), PublishError>;
	/// Publish a simulate-buy result.
	async fn publish_simulate_buy(&self, response: &SimulateResponse) -> Result<(), PublishError>;
	/// Publish a simulate-sell result.
	async fn publish_simulate_sell(&self, response: &SimulateResponse)
		-> Result<(), PublishError>;
	/// Publish the outcome of a triggered resting order.
	async fn publish_limit_order(&self, outcome: &LimitOrderOutcome) -> Result<(), PublishError>;
}
