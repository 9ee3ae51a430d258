//! Configuration loading for the swap executor.
//!
//! Loads TOML configuration with `${VAR}` environment substitution, applies
//! a small set of environment overrides, and validates the result before
//! the service starts.

use std::env;
use std::path::Path;
use thiserror::Error;

pub mod types;

pub use types::*;

/// Errors raised while loading or validating configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
	#[error("File not found: {0}")]
	FileNotFound(String),

	#[error("Parse error: {0}")]
	ParseError(String),

	#[error("Validation error: {0}")]
	ValidationError(String),

	#[error("Environment variable not found: {0}")]
	EnvVarNotFound(String),

	#[error("IO error: {0}")]
	IoError(#[from] std::io::Error),
}

/// Configuration loader with environment variable substitution.
#[derive(Default)]
pub struct ConfigLoader {
	file_path: Option<String>,
	env_prefix: String,
}

impl ConfigLoader {
	pub fn new() -> Self {
		Self {
			file_path: None,
			env_prefix: "EXECUTOR_".to_string(),
		}
	}

	pub fn with_file<P: AsRef<Path>>(mut self, path: P) -> Self {
		self.file_path = Some(path.as_ref().to_string_lossy().to_string());
		self
	}

	pub fn with_env_prefix(mut self, prefix: impl Into<String>) -> Self {
		self.env_prefix = prefix.into();
		self
	}

	pub async fn load(&self) -> Result<ExecutorConfig, ConfigError> {
		let mut config = if let Some(file_path) = &self.file_path {
			self.load_from_file(file_path).await?
		} else {
			return Err(ConfigError::FileNotFound(
				"No configuration file specified".to_string(),
			));
		};

		self.apply_env_overrides(&mut config)?;
		self.validate_config(&config)?;

		Ok(config)
	}

	async fn load_from_file(&self, file_path: &str) -> Result<ExecutorConfig, ConfigError> {
		let content = tokio::fs::read_to_string(file_path).await?;

		let substituted_content = self.substitute_env_vars(&content)?;

		let config: ExecutorConfig = toml::from_str(&substituted_content)
			.map_err(|e| ConfigError::ParseError(e.to_string()))?;

		Ok(config)
	}

	fn substitute_env_vars(&self, content: &str) -> Result<String, ConfigError> {
		let mut result = content.to_string();

		// Find and replace ${VAR_NAME} patterns
		let re = regex::Regex::new(r"\$\{([^}]+)\}").unwrap();

		for cap in re.captures_iter(content) {
			let full_match = &cap[0];
			let var_name = &cap[1];

			let env_value = env::var(var_name)
				.map_err(|_| ConfigError::EnvVarNotFound(var_name.to_string()))?;

			result = result.replace(full_match, &env_value);
		}

		Ok(result)
	}

	fn apply_env_overrides(&self, config: &mut ExecutorConfig) -> Result<(), ConfigError> {
		if let Ok(log_level) = env::var(format!("{}LOG_LEVEL", self.env_prefix)) {
			config.service.log_level = log_level;
		}

		if let Ok(rpc_url) = env::var(format!("{}RPC_URL", self.env_prefix)) {
			config.chain.rpc_url = rpc_url;
		}

		Ok(())
	}

	fn validate_config(&self, config: &ExecutorConfig) -> Result<(), ConfigError> {
		if !config.chain.rpc_url.starts_with("http://") && !config.chain.rpc_url.starts_with("https://")
		{
			return Err(ConfigError::ValidationError(
				"chain.rpc_url must start with http:// or https://".to_string(),
			));
		}

		if config.fees.rate >= config.fees.precision {
			return Err(ConfigError::ValidationError(
				"fees.rate must be below fees.precision".to_string(),
			));
		}

		if config.relayers.pool_size == 0 {
			return Err(ConfigError::ValidationError(
				"relayers.pool_size must be at least 1".to_string(),
			));
		}

		let seed = config.relayers.seed.trim_start_matches("0x");
		match hex::decode(seed) {
			Ok(bytes) if bytes.len() >= 16 => {}
			Ok(_) => {
				return Err(ConfigError::ValidationError(
					"relayers.seed must be at least 16 bytes of hex".to_string(),
				));
			}
			Err(_) => {
				return Err(ConfigError::ValidationError(
					"relayers.seed must be valid hexadecimal".to_string(),
				));
			}
		}

		if config.scheduler.period_secs == 0 {
			return Err(ConfigError::ValidationError(
				"scheduler.period_secs must be at least 1".to_string(),
			));
		}

		Ok(())
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::io::Write;

	fn sample_config() -> String {
		r#"
[service]
name = "swap-executor"

[chain]
rpc_url = "http://localhost:8545"
chain_id = 31337

[contracts]
entry_point = "0x5FF137D4b0FDCD49DcA30c7CF57E578a026d2789"
session_key_manager = "0x7677BFA00826363F9d4f8fBd866EE89644db0161"
multicall = "0xcA11bde05977b3631167028862bE2a173976CA11"
wrapped_native = "0x82aF49447D8a07e3bd95BD0d56f35241523fBab1"
fee_recipient = "0x443D390b51bEdB620F9c8De2a0a9a060D9BDf4aC"
fee_paymaster = "0x3E8E188540eF041Cd4A2BD1d8DeB638Ab30c697C"

[routers]
uniswap_v3 = "0xE592427A0AEce92De3Edee1F18E0157C05861564"
algebra = "0x1F721E2E82F6676FCE4eA07A5958cF098D339e18"
uniswap_v3_pools = ["Pancake"]

[fees]
rate = 2500
precision = 1000000
payment_tokens = ["0x82aF49447D8a07e3bd95BD0d56f35241523fBab1"]

[relayers]
seed = "000102030405060708090a0b0c0d0e0f"
pool_size = 4

[authority]
strict_tokens = false

[scheduler]
period_secs = 3
"#
		.to_string()
	}

	#[tokio::test]
	async fn loads_and_validates_sample() {
		let mut file = tempfile::NamedTempFile::new().unwrap();
		file.write_all(sample_config().as_bytes()).unwrap();

		let config = ConfigLoader::new()
			.with_file(file.path())
			.load()
			.await
			.unwrap();

		assert_eq!(config.chain.chain_id, 31337);
		assert_eq!(config.relayers.pool_size, 4);
		assert_eq!(config.fees.rate, 2500);
		assert!(!config.authority.strict_tokens);
	}

	#[tokio::test]
	async fn rejects_fee_rate_above_precision() {
		let bad = sample_config().replace("rate = 2500", "rate = 2000000");
		let mut file = tempfile::NamedTempFile::new().unwrap();
		file.write_all(bad.as_bytes()).unwrap();

		let err = ConfigLoader::new()
			.with_file(file.path())
			.load()
			.await
			.unwrap_err();
		assert!(matches!(err, ConfigError::ValidationError(_)));
	}

	#[tokio::test]
	async fn missing_env_var_is_reported() {
		let with_env = sample_config().replace(
			"\"http://localhost:8545\"",
			"\"${EXECUTOR_TEST_MISSING_RPC}\"",
		);
		let mut file = tempfile::NamedTempFile::new().unwrap();
		file.write_all(with_env.as_bytes()).unwrap();

		let err = ConfigLoader::new()
			.with_file(file.path())
			.load()
			.await
			.unwrap_err();
		assert!(matches!(err, ConfigError::EnvVarNotFound(_)));
	}
}
