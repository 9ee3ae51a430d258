//! Owner approval records.

use alloy_primitives::Address;
use serde::{Deserialize, Serialize};

/// The set of smart accounts and tokens an owner has committed on-chain.
///
/// The Merkle root published by the owner commits to every
/// (account, session key, token, router) tuple derivable from this record.
/// While `locked` is set, no inclusion proof may be issued against it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Approval {
	/// Owner-scoped user id assigned by the messaging layer.
	pub user_id: i64,
	/// Owner of the smart accounts.
	pub owner: Address,
	/// Participating smart accounts, in commitment order.
	pub smart_accounts: Vec<Address>,
	/// Approved tokens. A single zero address means every token is approved.
	pub tokens: Vec<Address>,
	/// Set while the owner is rotating the committed root.
	pub locked: bool,
	/// Whether the owner's session is currently connected.
	pub connected: bool,
}

impl Approval {
	/// True when the token list is the all-tokens sentinel.
	pub fn approves_all_tokens(&self) -> bool {
		self.tokens.len() == 1 && self.tokens[0] == Address::ZERO
	}
}
