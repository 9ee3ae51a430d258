//! Typed configuration sections.

use alloy_primitives::Address;
use serde::Deserialize;

/// Top-level executor configuration, loaded from TOML.
#[derive(Debug, Clone, Deserialize)]
pub struct ExecutorConfig {
	/// Service-wide settings.
	pub service: ServiceConfig,
	/// Chain endpoint settings.
	pub chain: ChainConfig,
	/// Deployed contract addresses.
	pub contracts: ContractsConfig,
	/// Router resolution settings.
	pub routers: RoutersConfig,
	/// Trade fee settings.
	pub fees: FeesConfig,
	/// Relayer identity settings.
	pub relayers: RelayersConfig,
	/// Capability-proof settings.
	pub authority: AuthorityConfig,
	/// Resting-order scheduler settings.
	pub scheduler: SchedulerConfig,
}

/// Service-wide settings.
#[derive(Debug, Clone, Deserialize)]
pub struct ServiceConfig {
	/// Instance name used in logs.
	pub name: String,
	/// Default tracing filter when RUST_LOG is unset.
	#[serde(default = "default_log_level")]
	pub log_level: String,
}

/// Chain endpoint settings.
#[derive(Debug, Clone, Deserialize)]
pub struct ChainConfig {
	/// HTTP RPC endpoint.
	pub rpc_url: String,
	/// Chain id used for replay protection and operation hashing.
	pub chain_id: u64,
}

/// Deployed contract addresses the executor interacts with.
#[derive(Debug, Clone, Deserialize)]
pub struct ContractsConfig {
	/// ERC-4337 entry point.
	pub entry_point: Address,
	/// Session-key module that validates capability proofs.
	pub session_key_manager: Address,
	/// Multicall3 aggregator.
	pub multicall: Address,
	/// Wrapped native token (swap base asset).
	pub wrapped_native: Address,
	/// Recipient of the executor's trade fee.
	pub fee_recipient: Address,
	/// Token paymaster that sponsors gas in ERC-20.
	pub fee_paymaster: Address,
}

/// Router resolution settings.
///
/// Pool descriptors arrive with a venue name; this section maps names to
/// the two supported router families.
#[derive(Debug, Clone, Deserialize)]
pub struct RoutersConfig {
	/// Uniswap-V3-style router (fee-tiered `exactInputSingle`).
	pub uniswap_v3: Address,
	/// Algebra-style router (directional fees, `limitSqrtPrice`).
	pub algebra: Address,
	/// Venue names routed through the Uniswap-style router; every other
	/// name uses the Algebra router.
	pub uniswap_v3_pools: Vec<String>,
}

/// Trade fee settings.
#[derive(Debug, Clone, Deserialize)]
pub struct FeesConfig {
	/// Fee rate numerator.
	pub rate: u64,
	/// Fee rate denominator.
	pub precision: u64,
	/// Tokens committed as paymaster fee leaves for every wallet.
	pub payment_tokens: Vec<Address>,
}

/// Relayer identity settings.
#[derive(Debug, Clone, Deserialize)]
pub struct RelayersConfig {
	/// Hex-encoded master seed for hierarchical key derivation.
	pub seed: String,
	/// Number of identities in the shared public pool.
	pub pool_size: u32,
}

/// Capability-proof settings.
#[derive(Debug, Clone, Deserialize)]
pub struct AuthorityConfig {
	/// Reject proof requests for tokens missing from the approval instead
	/// of letting the proof fail on-chain.
	#[serde(default)]
	pub strict_tokens: bool,
}

/// Resting-order scheduler settings.
#[derive(Debug, Clone, Deserialize)]
pub struct SchedulerConfig {
	/// Poll period in seconds.
	#[serde(default = "default_scheduler_period")]
	pub period_secs: u64,
}

fn default_log_level() -> String {
	"info".to_string()
}

fn default_scheduler_period() -> u64 {
	3
}
