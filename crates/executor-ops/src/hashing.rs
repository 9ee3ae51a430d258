//! Operation packing, hashing and signing.

use crate::OpsError;
use alloy_primitives::{keccak256, Address, Bytes, B256, U256};
use alloy_signer::Signer;
use alloy_signer_local::PrivateKeySigner;
use alloy_sol_types::SolValue;
use executor_types::UserOperation;

/// Packs an operation for signing: dynamic byte fields enter as their
/// keccak hash so the packed form is fixed-width.
pub fn pack_user_op(op: &UserOperation) -> Vec<u8> {
	(
		op.sender,
		op.nonce,
		keccak256(&op.init_code),
		keccak256(&op.call_data),
		op.call_gas_limit,
		op.verification_gas_limit,
		op.pre_verification_gas,
		op.max_fee_per_gas,
		op.max_priority_fee_per_gas,
		keccak256(&op.paymaster_and_data),
	)
		.abi_encode_params()
}

/// The hash an operation is signed over, salted with the entry point
/// address and chain id.
pub fn user_op_hash(op: &UserOperation, entry_point: Address, chain_id: u64) -> B256 {
	let inner = keccak256(pack_user_op(op));
	keccak256((inner, entry_point, U256::from(chain_id)).abi_encode_params())
}

/// Signs the operation hash with the session key under EIP-191.
pub async fn sign_user_op(
	op: &UserOperation,
	signer: &PrivateKeySigner,
	entry_point: Address,
	chain_id: u64,
) -> Result<Bytes, OpsError> {
	let hash = user_op_hash(op, entry_point, chain_id);
	let signature = signer
		.sign_message(hash.as_slice())
		.await
		.map_err(|e| OpsError::Signing(e.to_string()))?;
	Ok(signature.as_bytes().to_vec().into())
}

/// Packs the token-paymaster payload appended to sponsored operations:
/// paymaster address, two 16-byte gas limits, then the fee token.
pub fn pack_paymaster_data(
	paymaster: Address,
	verification_gas_limit: u128,
	post_op_gas_limit: u128,
	fee_token: Address,
) -> Bytes {
	let mut buf = Vec::with_capacity(72);
	buf.extend_from_slice(paymaster.as_slice());
	buf.extend_from_slice(&verification_gas_limit.to_be_bytes());
	buf.extend_from_slice(&post_op_gas_limit.to_be_bytes());
	buf.extend_from_slice(fee_token.as_slice());
	buf.into()
}
