//! Session-key capability authority.
//!
//! Owners commit a Merkle root over every (account, session key, token,
//! router) tuple they authorize. This crate rebuilds that tree from the
//! stored approval record and produces the inclusion proofs attached to
//! outgoing operations.

use alloy_primitives::{keccak256, Address, B256};
use executor_storage::{ApprovalStore, StorageError};
use std::sync::Arc;
use thiserror::Error;

pub mod merkle;

pub use merkle::MerkleTree;

/// Errors raised while producing capability proofs.
#[derive(Debug, Error)]
pub enum AuthorityError {
	/// The owner has never committed an approval.
	#[error("No approval data found")]
	MissingApproval,
	/// The approval is locked while the owner rotates the root.
	#[error("Account is locked")]
	ApprovalLocked,
	/// Strict mode only: the token is not in the approved set.
	#[error("Token not approved")]
	TokenNotApproved,
	/// A calling wallet is not part of the committed account set.
	#[error("Wallet not committed: {0}")]
	WalletNotCommitted(Address),
	#[error("Storage error: {0}")]
	Storage(#[from] StorageError),
}

/// Leaf for a (wallet, session key, token, router) capability.
///
/// The packed layout must match the on-chain verifier byte for byte.
pub fn token_leaf(wallet: Address, session_key: Address, token: Address, router: Address) -> B256 {
	let mut buf = [0u8; 80];
	buf[..20].copy_from_slice(wallet.as_slice());
	buf[20..40].copy_from_slice(session_key.as_slice());
	buf[40..60].copy_from_slice(token.as_slice());
	buf[60..].copy_from_slice(router.as_slice());
	keccak256(buf)
}

/// Leaf for an all-tokens capability; the token field is omitted entirely,
/// giving this variant a distinct preimage length.
pub fn all_tokens_leaf(wallet: Address, session_key: Address, router: Address) -> B256 {
	let mut buf = [0u8; 60];
	buf[..20].copy_from_slice(wallet.as_slice());
	buf[20..40].copy_from_slice(session_key.as_slice());
	buf[40..].copy_from_slice(router.as_slice());
	keccak256(buf)
}

/// Produces capability proofs against an owner's committed approval.
pub struct SessionAuthority {
	approvals: Arc<dyn ApprovalStore>,
	/// Routers included in every commitment.
	routers: Vec<Address>,
	/// The fee paymaster, committed as a spender for the payment tokens.
	fee_paymaster: Address,
	/// Tokens committed as paymaster fee leaves for every account.
	fee_payment_tokens: Vec<Address>,
	/// Reject unapproved tokens locally instead of letting the proof fail
	/// on-chain.
	strict_tokens: bool,
}

impl SessionAuthority {
	pub fn new(
		approvals: Arc<dyn ApprovalStore>,
		routers: Vec<Address>,
		fee_paymaster: Address,
		fee_payment_tokens: Vec<Address>,
		strict_tokens: bool,
	) -> Self {
		Self {
			approvals,
			routers,
			fee_paymaster,
			fee_payment_tokens,
			strict_tokens,
		}
	}

	/// One inclusion proof per calling wallet for the given token and
	/// router, in wallet order.
	pub async fn proofs_for(
		&self,
		user_id: i64,
		owner: Address,
		calling_wallets: &[Address],
		session_key: Address,
		token: Address,
		router: Address,
	) -> Result<Vec<Vec<B256>>, AuthorityError> {
		let approval = self
			.approvals
			.approval(user_id, owner)
			.await?
			.ok_or(AuthorityError::MissingApproval)?;

		if approval.locked {
			return Err(AuthorityError::ApprovalLocked);
		}

		let mut leaves = Vec::new();
		let calling_leaves: Vec<B256>;

		if approval.approves_all_tokens() {
			calling_leaves = calling_wallets
				.iter()
				.map(|wallet| all_tokens_leaf(*wallet, session_key, router))
				.collect();
			for account in &approval.smart_accounts {
				for committed_router in &self.routers {
					leaves.push(all_tokens_leaf(*account, session_key, *committed_router));
				}
			}
		} else {
			if self.strict_tokens && !approval.tokens.contains(&token) {
				return Err(AuthorityError::TokenNotApproved);
			}
			calling_leaves = calling_wallets
				.iter()
				.map(|wallet| token_leaf(*wallet, session_key, token, router))
				.collect();
			for approved_token in &approval.tokens {
				for account in &approval.smart_accounts {
					for committed_router in &self.routers {
						leaves.push(token_leaf(
							*account,
							session_key,
							*approved_token,
							*committed_router,
						));
					}
				}
			}
		}

		// Every account also commits the fee payment tokens against the
		// paymaster, so gas can be sponsored in ERC-20.
		for account in &approval.smart_accounts {
			for fee_token in &self.fee_payment_tokens {
				leaves.push(token_leaf(*account, session_key, *fee_token, self.fee_paymaster));
			}
		}

		let tree = MerkleTree::new(leaves);

		calling_wallets
			.iter()
			.zip(calling_leaves)
			.map(|(wallet, leaf)| match tree.proof(leaf) {
				Some(proof) => Ok(proof),
				// Lenient mode: hand out the empty path and let the
				// on-chain verifier reject it.
				None if !self.strict_tokens => Ok(Vec::new()),
				None => Err(AuthorityError::WalletNotCommitted(*wallet)),
			})
			.collect()
	}
}
