//! Inbound request routing.
//!
//! The broker consumer (external) hands decoded JSON payloads to
//! [`OrderRouter::route`]; every outcome, including engine rejections, goes
//! back out as a structured response.

use anyhow::{bail, Result};
use executor_engine::ExecutionEngine;
use executor_types::{
	BuyRequest, PreApproveRequest, PreApproveResponse, ResponsePublisher, SellRequest,
	SimulateResponse, TradeResponse,
};
use std::sync::Arc;
use tracing::warn;

/// Dispatches typed order requests to the engine and publishes the results.
pub struct OrderRouter {
	engine: Arc<ExecutionEngine>,
	publisher: Arc<dyn ResponsePublisher>,
}

impl OrderRouter {
	pub fn new(engine: Arc<ExecutionEngine>, publisher: Arc<dyn ResponsePublisher>) -> Self {
		Self { engine, publisher }
	}

	/// Routes one decoded broker message by action name.
	pub async fn route(&self, action: &str, payload: serde_json::Value) -> Result<()> {
		match action {
			"buy" => self.buy(serde_json::from_value(payload)?).await,
			"sell" => self.sell(serde_json::from_value(payload)?).await,
			"pre-approve" => self.pre_approve(serde_json::from_value(payload)?).await,
			"simulate-buy" => self.simulate_buy(serde_json::from_value(payload)?).await,
			"simulate-sell" => self.simulate_sell(serde_json::from_value(payload)?).await,
			other => bail!("Unknown action: {}", other),
		}
	}

	async fn buy(&self, request: BuyRequest) -> Result<()> {
		let response = match self.engine.buy(&request).await {
			Ok(response) => response,
			Err(e) => {
				warn!(user = request.user_id, error = %e, "Buy rejected");
				TradeResponse {
					user_id: request.user_id,
					token: request.token,
					tx_error: Some(e.to_string()),
					..Default::default()
				}
			}
		};
		self.publisher.publish_buy(&response).await?;
		Ok(())
	}

	async fn sell(&self, request: SellRequest) -> Result<()> {
		let response = match self.engine.sell(&request).await {
			Ok(response) => response,
			Err(e) => {
				warn!(user = request.user_id, error = %e, "Sell rejected");
				TradeResponse {
					user_id: request.user_id,
					token: request.token,
					tx_error: Some(e.to_string()),
					..Default::default()
				}
			}
		};
		self.publisher.publish_sell(&response).await?;
		Ok(())
	}

	async fn pre_approve(&self, request: PreApproveRequest) -> Result<()> {
		let response = match self.engine.pre_approve(&request).await {
			Ok(response) => response,
			Err(e) => {
				warn!(user = request.user_id, error = %e, "Pre-approve rejected");
				PreApproveResponse {
					user_id: request.user_id,
					tx_error: Some(e.to_string()),
					..Default::default()
				}
			}
		};
		self.publisher.publish_pre_approve(&response).await?;
		Ok(())
	}

	async fn simulate_buy(&self, request: BuyRequest) -> Result<()> {
		let response = match self.engine.simulate_buy(&request).await {
			Ok(response) => response,
			Err(e) => {
				warn!(user = request.user_id, error = %e, "Simulate-buy rejected");
				SimulateResponse {
					user_id: request.user_id,
					token: request.token,
					tx_error: Some(e.to_string()),
					..Default::default()
				}
			}
		};
		self.publisher.publish_simulate_buy(&response).await?;
		Ok(())
	}

	async fn simulate_sell(&self, request: SellRequest) -> Result<()> {
		let response = match self.engine.simulate_sell(&request).await {
			Ok(response) => response,
			Err(e) => {
				warn!(user = request.user_id, error = %e, "Simulate-sell rejected");
				SimulateResponse {
					user_id: request.user_id,
					token: request.token,
					tx_error: Some(e.to_string()),
					..Default::default()
				}
			}
		};
		self.publisher.publish_simulate_sell(&response).await?;
		Ok(())
	}
}
