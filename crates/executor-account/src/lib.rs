//! Signer identity derivation for the swap executor.
//!
//! Every signing identity the executor uses (session keys, the shared
//! public relayer pool, the per-user private relayers) is derived
//! deterministically from one master seed via BIP-32 hierarchical
//! derivation. Each identity family lives under its own hardened branch.

use alloy_primitives::{Address, B256};
use alloy_signer_local::PrivateKeySigner;
use coins_bip32::prelude::*;
use thiserror::Error;

/// Errors raised while deriving signer identities.
#[derive(Debug, Error)]
pub enum AccountError {
	#[error("Invalid seed: {0}")]
	InvalidSeed(String),
	#[error("Derivation failed: {0}")]
	Derivation(String),
	#[error("Invalid key: {0}")]
	InvalidKey(String),
}

/// Hardened branch for session keys.
const SESSION_BRANCH: &str = "m/0'/0'/0'";
/// Hardened branch for the shared public relayer pool.
const PUBLIC_RELAYER_BRANCH: &str = "m/1'/1'/1'";
/// Hardened branch for per-user private relayers.
const PRIVATE_RELAYER_BRANCH: &str = "m/2'/2'/2'";

/// Deterministic signer derivation from a master seed.
pub struct KeyDeriver {
	root: XPriv,
}

impl KeyDeriver {
	/// Creates a deriver from a hex-encoded master seed.
	pub fn from_hex_seed(seed_hex: &str) -> Result<Self, AccountError> {
		let seed = hex::decode(seed_hex.trim_start_matches("0x"))
			.map_err(|e| AccountError::InvalidSeed(format!("Seed must be hex: {}", e)))?;

		let root = XPriv::root_from_seed(&seed, None)
			.map_err(|e| AccountError::InvalidSeed(e.to_string()))?;

		Ok(Self { root })
	}

	/// The session key acting for the given user's smart accounts.
	pub fn session_key(&self, user_id: i64) -> Result<PrivateKeySigner, AccountError> {
		self.derive(&user_path(SESSION_BRANCH, user_id))
	}

	/// The public relayer at the given pool index.
	pub fn public_relayer(&self, index: u32) -> Result<PrivateKeySigner, AccountError> {
		self.derive(&format!("{}/{}", PUBLIC_RELAYER_BRANCH, index))
	}

	/// The private relayer dedicated to the given user.
	pub fn private_relayer(&self, user_id: i64) -> Result<PrivateKeySigner, AccountError> {
		self.derive(&user_path(PRIVATE_RELAYER_BRANCH, user_id))
	}

	/// The address of the session key without constructing a signer twice.
	pub fn session_key_address(&self, user_id: i64) -> Result<Address, AccountError> {
		Ok(self.session_key(user_id)?.address())
	}

	fn derive(&self, path: &str) -> Result<PrivateKeySigner, AccountError> {
		let child = self
			.root
			.derive_path(path)
			.map_err(|e| AccountError::Derivation(format!("{}: {}", path, e)))?;

		let signing_key: &SigningKey = child.as_ref();
		let key_bytes: [u8; 32] = signing_key.to_bytes().into();
		PrivateKeySigner::from_bytes(&B256::from(key_bytes))
			.map_err(|e| AccountError::InvalidKey(e.to_string()))
	}
}

/// Child indexes are 31-bit; user ids are wider, so they span two
/// non-hardened segments.
fn user_path(branch: &str, user_id: i64) -> String {
	let id = user_id as u64;
	let high = (id >> 31) & 0x7fff_ffff;
	let low = id & 0x7fff_ffff;
	format!("{}/{}/{}", branch, high, low)
}
