//! Solidity interface definitions for every contract the executor touches.

use alloy_sol_types::sol;

sol! {
	/// ERC-20 surface used for balance reads, approvals and fee transfers.
	interface IERC20 {
		function balanceOf(address account) external view returns (uint256);
		function allowance(address owner, address spender) external view returns (uint256);
		function approve(address spender, uint256 amount) external returns (bool);
		function transfer(address to, uint256 amount) external returns (bool);
	}

	/// Wrapped native token.
	interface IWrappedNative {
		function deposit() external payable;
	}

	/// Multicall3 aggregator.
	interface IMulticall3 {
		struct Call3 {
			address target;
			bool allowFailure;
			bytes callData;
		}

		struct Result {
			bool success;
			bytes returnData;
		}

		function aggregate3(Call3[] calldata calls) external payable returns (Result[] memory returnData);
		function getEthBalance(address addr) external view returns (uint256 balance);
	}

	/// The account-abstraction operation as the entry point consumes it.
	struct PackedUserOperation {
		address sender;
		uint256 nonce;
		bytes initCode;
		bytes callData;
		uint256 callGasLimit;
		uint256 verificationGasLimit;
		uint256 preVerificationGas;
		uint256 maxFeePerGas;
		uint256 maxPriorityFeePerGas;
		bytes paymasterAndData;
		bytes signature;
	}

	/// ERC-4337 entry point surface.
	interface IEntryPoint {
		function handleOps(PackedUserOperation[] calldata ops, address payable beneficiary) external;
		function simulateHandleOp(PackedUserOperation calldata op, address target, bytes calldata targetCallData) external;

		/// Successful simulation outcome; simulateHandleOp always reverts.
		error ExecutionResult(
			uint256 preOpGas,
			uint256 paid,
			uint48 validAfter,
			uint48 validUntil,
			bool targetSuccess,
			bytes targetResult
		);

		/// Simulation failed while validating or executing the operation.
		error FailedOp(uint256 opIndex, string reason);
	}

	/// Smart account execution surface.
	interface ISmartAccount {
		function execute(address dest, uint256 value, bytes calldata func) external;
		function executeBatch(address[] calldata dest, uint256[] calldata value, bytes[] calldata func) external;
		function nonce(uint192 key) external view returns (uint256);
	}

	/// Uniswap-V3-style swap router.
	interface IUniswapV3Router {
		struct ExactInputSingleParams {
			address tokenIn;
			address tokenOut;
			uint24 fee;
			address recipient;
			uint256 deadline;
			uint256 amountIn;
			uint256 amountOutMinimum;
			uint160 sqrtPriceLimitX96;
		}

		function exactInputSingle(ExactInputSingleParams calldata params) external payable returns (uint256 amountOut);
	}

	/// Algebra-style swap router (directional fees, no fee parameter).
	interface IAlgebraRouter {
		struct ExactInputSingleParams {
			address tokenIn;
			address tokenOut;
			address recipient;
			uint256 deadline;
			uint256 amountIn;
			uint256 amountOutMinimum;
			uint160 limitSqrtPrice;
		}

		function exactInputSingle(ExactInputSingleParams calldata params) external payable returns (uint256 amountOut);
	}

	/// Uniswap-V3 pool state probe.
	interface IUniswapV3Pool {
		function slot0() external view returns (
			uint160 sqrtPriceX96,
			int24 tick,
			uint16 observationIndex,
			uint16 observationCardinality,
			uint16 observationCardinalityNext,
			uint8 feeProtocol,
			bool unlocked
		);
	}

	/// Algebra pool state probe.
	interface IAlgebraPool {
		function globalState() external view returns (
			uint160 price,
			int24 tick,
			uint16 feeZto,
			uint16 feeOtz,
			uint16 timepointIndex,
			uint8 communityFee,
			bool unlocked
		);
	}
}

use executor_types::UserOperation;

impl From<&UserOperation> for PackedUserOperation {
	fn from(op: &UserOperation) -> Self {
		Self {
			sender: op.sender,
			nonce: op.nonce,
			initCode: op.init_code.clone(),
			callData: op.call_data.clone(),
			callGasLimit: op.call_gas_limit,
			verificationGasLimit: op.verification_gas_limit,
			preVerificationGas: op.pre_verification_gas,
			maxFeePerGas: op.max_fee_per_gas,
			maxPriorityFeePerGas: op.max_priority_fee_per_gas,
			paymasterAndData: op.paymaster_and_data.clone(),
			signature: op.signature.clone(),
		}
	}
}
