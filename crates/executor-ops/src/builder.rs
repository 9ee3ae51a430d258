//! Session-key operation builder.
//!
//! Accumulates the pieces of one operation (sub-calls, capability proof,
//! validity window, paymaster payload), then encodes, gas-fills, signs and
//! wraps it into the form the on-chain session-key module parses.

use crate::{hashing::sign_user_op, OpEnvironment, OpsError};
use alloy_primitives::{aliases::U48, Address, Bytes, B256, U256};
use alloy_signer_local::PrivateKeySigner;
use alloy_sol_types::{SolCall, SolValue};
use executor_chain::{abi::ISmartAccount, ChainClient};
use executor_types::{OpKind, SubCall, UserOperation};

/// Extra pre-verification gas on top of the entry-point estimate.
const EXTRA_PRE_VERIFICATION_GAS: u64 = 3_000;
/// Wei added to the base fee for the operation's fee cap.
const OP_FEE_PAD: u128 = 100_000;

fn manual_call_gas_limit(kind: OpKind) -> u64 {
	match kind {
		OpKind::Buy | OpKind::Sell => 800_000,
		OpKind::PreApprove => 200_000,
	}
}

/// Incremental configuration for one session-key operation.
pub struct SessionKeyOpBuilder {
	sender: Address,
	session_key: PrivateKeySigner,
	sub_calls: Vec<SubCall>,
	kind: OpKind,
	valid_until: u64,
	valid_after: u64,
	approve_all: bool,
	merkle_proof: Vec<B256>,
	router: Address,
	token: Option<Address>,
	paymaster_and_data: Bytes,
	nonce: Option<U256>,
}

impl SessionKeyOpBuilder {
	pub fn new(sender: Address, session_key: PrivateKeySigner) -> Self {
		Self {
			sender,
			session_key,
			sub_calls: Vec::new(),
			kind: OpKind::Buy,
			valid_until: 0,
			valid_after: 0,
			approve_all: false,
			merkle_proof: Vec::new(),
			router: Address::ZERO,
			token: None,
			paymaster_and_data: Bytes::new(),
			nonce: None,
		}
	}

	pub fn with_token(mut self, token: Address) -> Self {
		self.token = Some(token);
		self
	}

	pub fn with_router(mut self, router: Address) -> Self {
		self.router = router;
		self
	}

	pub fn with_merkle_proof(mut self, proof: Vec<B256>) -> Self {
		self.merkle_proof = proof;
		self
	}

	/// Validity window; zero on either side means no restriction.
	pub fn with_validity_window(mut self, valid_until: u64, valid_after: u64) -> Self {
		self.valid_until = valid_until;
		self.valid_after = valid_after;
		self
	}

	pub fn with_approve_all(mut self, approve_all: bool) -> Self {
		self.approve_all = approve_all;
		self
	}

	pub fn with_paymaster(mut self, paymaster_and_data: Bytes) -> Self {
		self.paymaster_and_data = paymaster_and_data;
		self
	}

	pub fn with_nonce(mut self, nonce: U256) -> Self {
		self.nonce = Some(nonce);
		self
	}

	pub fn with_buy_calls(mut self, calls: Vec<SubCall>) -> Self {
		self.sub_calls = calls;
		self.kind = OpKind::Buy;
		self
	}

	pub fn with_sell_calls(mut self, calls: Vec<SubCall>) -> Self {
		self.sub_calls = calls;
		self.kind = OpKind::Sell;
		self
	}

	pub fn with_pre_approve_call(mut self, call: SubCall) -> Self {
		self.sub_calls = vec![call];
		self.kind = OpKind::PreApprove;
		self
	}

	/// Encodes, gas-fills, signs and wraps the operation.
	pub async fn build(self, env: &OpEnvironment) -> Result<UserOperation, OpsError> {
		let token = self.token.ok_or(OpsError::MissingToken)?;
		if self.sub_calls.is_empty() {
			return Err(OpsError::NoSubCalls);
		}

		let call_data: Bytes = if self.sub_calls.len() == 1 {
			let call = &self.sub_calls[0];
			ISmartAccount::executeCall {
				dest: call.to,
				value: call.value,
				func: call.data.clone(),
			}
			.abi_encode()
			.into()
		} else {
			ISmartAccount::executeBatchCall {
				dest: self.sub_calls.iter().map(|c| c.to).collect(),
				value: self.sub_calls.iter().map(|c| c.value).collect(),
				func: self.sub_calls.iter().map(|c| c.data.clone()).collect(),
			}
			.abi_encode()
			.into()
		};

		let mut op = UserOperation {
			sender: self.sender,
			call_data,
			paymaster_and_data: self.paymaster_and_data.clone(),
			..Default::default()
		};

		self.fill_gas(&mut op, env).await?;

		let inner_signature =
			sign_user_op(&op, &self.session_key, env.entry_point, env.chain_id).await?;

		op.signature = self.wrap_signature(token, inner_signature, env.session_key_manager);
		Ok(op)
	}

	/// Resolves nonce, gas limits and fee fields through the chain client.
	async fn fill_gas(&self, op: &mut UserOperation, env: &OpEnvironment) -> Result<(), OpsError> {
		op.nonce = match self.nonce {
			Some(nonce) => nonce,
			None => env.chain.account_nonce(self.sender).await?,
		};

		// A failed estimate is tolerated; the entry point re-validates.
		let estimated = env
			.chain
			.estimate_gas(env.entry_point, self.sender, op.call_data.clone())
			.await
			.unwrap_or(0);
		op.pre_verification_gas = U256::from(estimated + EXTRA_PRE_VERIFICATION_GAS);

		op.call_gas_limit = U256::from(manual_call_gas_limit(self.kind));

		let base_fee = env.chain.latest_base_fee().await?;
		op.max_fee_per_gas = U256::from(base_fee + OP_FEE_PAD);
		op.max_priority_fee_per_gas = U256::ZERO;

		Ok(())
	}

	/// Wraps the inner signature with the capability payload, then with the
	/// authorizing module address.
	fn wrap_signature(
		&self,
		token: Address,
		inner_signature: Bytes,
		session_key_manager: Address,
	) -> Bytes {
		let payload: Bytes = (
			U48::from(self.valid_until),
			U48::from(self.valid_after),
			self.router,
			token,
			self.session_key.address(),
			self.kind.as_u8() as u16,
			self.approve_all,
			self.merkle_proof.clone(),
			inner_signature,
		)
			.abi_encode_params()
			.into();

		(payload, session_key_manager).abi_encode_params().into()
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::hashing::user_op_hash as compute_hash;
	use alloy_primitives::{address, PrimitiveSignature};
	use async_trait::async_trait;
	use executor_chain::{BatchCall, BatchResult, ChainClient, ChainError, SimulationOutcome};
	use std::sync::Arc;

	struct StubChain {
		nonce: U256,
		estimate_fails: bool,
	}

	#[async_trait]
	impl ChainClient for StubChain {
		async fn aggregate(&self, _calls: &[BatchCall]) -> Result<Vec<BatchResult>, ChainError> {
			Ok(Vec::new())
		}

		async fn estimate_gas(
			&self,
			_from: Address,
			_to: Address,
			_data: Bytes,
		) -> Result<u64, ChainError> {
			if self.estimate_fails {
				Err(ChainError::Network("no node".to_string()))
			} else {
				Ok(60_000)
			}
		}

		async fn latest_base_fee(&self) -> Result<u128, ChainError> {
			Ok(1_000_000_000)
		}

		async fn account_nonce(&self, _account: Address) -> Result<U256, ChainError> {
			Ok(self.nonce)
		}

		async fn estimate_handle_ops(
			&self,
			_from: Address,
			_ops: &[UserOperation],
			_beneficiary: Address,
		) -> Result<u64, ChainError> {
			unimplemented!("not used in builder tests")
		}

		async fn submit_handle_ops(
			&self,
			_relayer: &PrivateKeySigner,
			_ops: &[UserOperation],
			_beneficiary: Address,
			_gas_limit: u64,
		) -> Result<alloy_primitives::B256, ChainError> {
			unimplemented!("not used in builder tests")
		}

		async fn wait_for_inclusion(&self, _hash: alloy_primitives::B256) -> Result<(), ChainError> {
			Ok(())
		}

		async fn simulate_handle_op(
			&self,
			_op: &UserOperation,
			_probe: &BatchCall,
		) -> Result<SimulationOutcome, ChainError> {
			unimplemented!("not used in builder tests")
		}
	}

	fn env(estimate_fails: bool) -> OpEnvironment {
		OpEnvironment {
			chain: Arc::new(StubChain {
				nonce: U256::from(5u64),
				estimate_fails,
			}),
			entry_point: address!("5FF137D4b0FDCD49DcA30c7CF57E578a026d2789"),
			session_key_manager: address!("7677BFA00826363F9d4f8fBd866EE89644db0161"),
			chain_id: 31337,
		}
	}

	fn sub_call(n: u8) -> SubCall {
		SubCall {
			to: Address::repeat_byte(n),
			value: U256::from(n),
			data: vec![n; 4].into(),
		}
	}

	const TOKEN: Address = address!("0000000000000000000000000000000000000071");
	const ROUTER: Address = address!("0000000000000000000000000000000000000091");

	#[tokio::test]
	async fn single_call_uses_execute_encoding() {
		let sender = Address::repeat_byte(0xaa);
		let op = SessionKeyOpBuilder::new(sender, PrivateKeySigner::random())
			.with_token(TOKEN)
			.with_router(ROUTER)
			.with_buy_calls(vec![sub_call(1)])
			.build(&env(false))
			.await
			.unwrap();

		assert_eq!(&op.call_data[..4], ISmartAccount::executeCall::SELECTOR);
		assert_eq!(op.nonce, U256::from(5u64));
		assert_eq!(op.pre_verification_gas, U256::from(63_000u64));
		assert_eq!(op.call_gas_limit, U256::from(800_000u64));
	}

	#[tokio::test]
	async fn multiple_calls_use_batch_encoding() {
		let op = SessionKeyOpBuilder::new(Address::repeat_byte(0xaa), PrivateKeySigner::random())
			.with_token(TOKEN)
			.with_router(ROUTER)
			.with_sell_calls(vec![sub_call(1), sub_call(2), sub_call(3)])
			.build(&env(false))
			.await
			.unwrap();

		assert_eq!(&op.call_data[..4], ISmartAccount::executeBatchCall::SELECTOR);
	}

	#[tokio::test]
	async fn failed_estimate_falls_back_to_padding_only() {
		let op = SessionKeyOpBuilder::new(Address::repeat_byte(0xaa), PrivateKeySigner::random())
			.with_token(TOKEN)
			.with_router(ROUTER)
			.with_pre_approve_call(sub_call(1))
			.build(&env(true))
			.await
			.unwrap();

		assert_eq!(op.pre_verification_gas, U256::from(3_000u64));
		assert_eq!(op.call_gas_limit, U256::from(200_000u64));
	}

	#[tokio::test]
	async fn missing_token_is_rejected() {
		let err = SessionKeyOpBuilder::new(Address::repeat_byte(0xaa), PrivateKeySigner::random())
			.with_buy_calls(vec![sub_call(1)])
			.build(&env(false))
			.await
			.unwrap_err();
		assert!(matches!(err, OpsError::MissingToken));
	}

	#[tokio::test]
	async fn signature_wrap_decodes_back_to_payload() {
		let session_key = PrivateKeySigner::random();
		let session_address = session_key.address();
		let environment = env(false);
		let proof = vec![alloy_primitives::B256::repeat_byte(0x11)];

		let op = SessionKeyOpBuilder::new(Address::repeat_byte(0xaa), session_key)
			.with_token(TOKEN)
			.with_router(ROUTER)
			.with_merkle_proof(proof.clone())
			.with_validity_window(1_900_000_000, 0)
			.with_buy_calls(vec![sub_call(1)])
			.build(&environment)
			.await
			.unwrap();

		let (payload, module): (Bytes, Address) =
			SolValue::abi_decode_params(&op.signature, true).unwrap();
		assert_eq!(module, environment.session_key_manager);

		let (valid_until, valid_after, router, token, key, kind, approve_all, decoded_proof, inner): (
			U48,
			U48,
			Address,
			Address,
			Address,
			u16,
			bool,
			Vec<alloy_primitives::B256>,
			Bytes,
		) = SolValue::abi_decode_params(&payload, true).unwrap();

		assert_eq!(valid_until, U48::from(1_900_000_000u64));
		assert_eq!(valid_after, U48::ZERO);
		assert_eq!(router, ROUTER);
		assert_eq!(token, TOKEN);
		assert_eq!(key, session_address);
		assert_eq!(kind as u8, OpKind::Buy.as_u8());
		assert!(!approve_all);
		assert_eq!(decoded_proof, proof);

		// The inner signature covers the unwrapped operation hash.
		let mut unsigned = op.clone();
		unsigned.signature = Bytes::new();
		let hash = compute_hash(&unsigned, environment.entry_point, environment.chain_id);
		let signature = PrimitiveSignature::try_from(inner.as_ref()).unwrap();
		let recovered = signature.recover_address_from_msg(hash.as_slice()).unwrap();
		assert_eq!(recovered, session_address);
	}
}
