//! Response publishing.
//!
//! The real broker transport is an external collaborator wired in at
//! deployment; this logging publisher stands in for it on local runs and
//! keeps every response observable.

use async_trait::async_trait;
use executor_types::{
	LimitOrderOutcome, PreApproveResponse, PublishError, ResponsePublisher, SimulateResponse,
	TradeResponse,
};
use tracing::info;

/// Publishes responses to the log.
pub struct LogPublisher;

fn render<T: serde::Serialize>(value: &T) -> String {
	serde_json::to_string(value).unwrap_or_else(|e| format!("<unserializable: {}>", e))
}

#[async_trait]
impl ResponsePublisher for LogPublisher {
	async fn publish_buy(&self, response: &TradeResponse) -> Result<(), PublishError> {
		info!(response = %render(response), "buy response");
		Ok(())
	}

	async fn publish_sell(&self, response: &TradeResponse) -> Result<(), PublishError> {
		info!(response = %render(response), "sell response");
		Ok(())
	}

	async fn publish_pre_approve(&self, response: &PreApproveResponse) -> Result<(), PublishError> {
		info!(response = %render(response), "pre-approve response");
		Ok(())
	}

	async fn publish_simulate_buy(&self, response: &SimulateResponse) -> Result<(), PublishError> {
		info!(response = %render(response), "simulate-buy response");
		Ok(())
	}

	async fn publish_simulate_sell(&self, response: &SimulateResponse) -> Result<(), PublishError> {
		info!(response = %render(response), "simulate-sell response");
		Ok(())
	}

	async fn publish_limit_order(&self, outcome: &LimitOrderOutcome) -> Result<(), PublishError> {
		info!(outcome = %render(outcome), "limit order outcome");
		Ok(())
	}
}
