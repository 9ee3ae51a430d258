//! Pre-approval execution: a single allowance grant per wallet.

use crate::{calls, EngineError, ExecutionEngine, LockSet};
use alloy_primitives::{Address, B256};
use alloy_signer_local::PrivateKeySigner;
use executor_ops::SessionKeyOpBuilder;
use executor_types::{PaymasterApproval, PreApproveRequest, PreApproveResponse, SubCall, UserOperation};

impl ExecutionEngine {
	/// Grants an ERC-20 allowance from every wallet to the resolved
	/// spender. When the spender is the fee paymaster itself, the response
	/// carries the paymaster-approval descriptor for the caller to persist.
	pub async fn pre_approve(
		&self,
		request: &PreApproveRequest,
	) -> Result<PreApproveResponse, EngineError> {
		let router = self.approval_router(&request.pool_name);
		let session_key = self.deriver.session_key(request.user_id)?;

		let paymaster_approval = (router == self.settings.contracts.fee_paymaster).then(|| {
			PaymasterApproval {
				owner: request.owner,
				smart_accounts: request.smart_accounts.clone(),
				router,
				token: request.token,
				allowance: request.allowance,
			}
		});

		let proofs = self
			.authority
			.proofs_for(
				request.user_id,
				request.owner,
				&request.smart_accounts,
				session_key.address(),
				request.token,
				router,
			)
			.await?;

		let approve_call = calls::approve(request.token, router, request.allowance);

		let mut response = PreApproveResponse {
			user_id: request.user_id,
			paymaster_approval,
			..Default::default()
		};
		let mut locks = LockSet::new(self.locks.clone());
		let mut ops: Vec<UserOperation> = Vec::new();

		for (i, wallet) in request.smart_accounts.iter().enumerate() {
			match self
				.plan_approve_op(
					request,
					*wallet,
					&session_key,
					proofs[i].clone(),
					router,
					approve_call.clone(),
					&mut locks,
				)
				.await
			{
				Ok(op) => {
					response.succeeded.push(*wallet);
					ops.push(op);
				}
				Err(reason) => {
					response.op_errors.insert(*wallet, reason);
				}
			}
		}

		if !ops.is_empty() {
			match self
				.dispatch(request.user_id, request.use_private_relayer, &ops)
				.await
			{
				Ok(hash) => response.tx_hash = Some(hash),
				Err(e) => response.tx_error = Some(e.to_string()),
			}
		}

		locks.release_all().await;
		Ok(response)
	}

	async fn plan_approve_op(
		&self,
		request: &PreApproveRequest,
		wallet: Address,
		session_key: &PrivateKeySigner,
		proof: Vec<B256>,
		router: Address,
		approve_call: SubCall,
		locks: &mut LockSet,
	) -> Result<UserOperation, String> {
		if !locks.try_acquire(wallet).await.map_err(|e| e.to_string())? {
			return Err("Account is busy".to_string());
		}

		SessionKeyOpBuilder::new(wallet, session_key.clone())
			.with_pre_approve_call(approve_call)
			.with_token(request.token)
			.with_router(router)
			.with_merkle_proof(proof)
			.build(&self.op_env())
			.await
			.map_err(|e| e.to_string())
	}
}
