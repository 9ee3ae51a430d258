use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use executor_config::ConfigLoader;
use executor_service::service;
use std::path::PathBuf;
use tokio::signal;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "swap-executor")]
#[command(about = "Session-key swap executor", long_about = None)]
struct Cli {
	#[command(subcommand)]
	command: Option<Commands>,

	#[arg(short, long, value_name = "FILE", default_value = "config/local.toml")]
	config: PathBuf,

	#[arg(long, env = "EXECUTOR_LOG_LEVEL", default_value = "info")]
	log_level: String,
}

#[derive(Subcommand)]
enum Commands {
	/// Start the executor service
	Start,
	/// Validate the configuration file
	Validate,
}

#[tokio::main]
async fn main() -> Result<()> {
	let cli = Cli::parse();

	setup_tracing(&cli.log_level)?;

	match cli.command {
		Some(Commands::Start) | None => start_service(cli).await,
		Some(Commands::Validate) => validate_config(cli).await,
	}
}

async fn start_service(cli: Cli) -> Result<()> {
	info!("Starting swap executor");
	info!("Loading configuration from: {:?}", cli.config);

	let config = ConfigLoader::new()
		.with_file(&cli.config)
		.load()
		.await
		.context("Failed to load configuration")?;

	info!("Configuration loaded successfully");
	info!("Service name: {}", config.service.name);
	info!("Chain id: {}", config.chain.chain_id);
	info!("Relayer pool size: {}", config.relayers.pool_size);

	let service = service::ExecutorService::build(&config).context("Failed to build service")?;

	let (shutdown_tx, _) = tokio::sync::broadcast::channel(16);

	let scheduler = service.scheduler.clone();
	let scheduler_shutdown = shutdown_tx.subscribe();
	let scheduler_handle =
		tokio::spawn(async move { scheduler.run(scheduler_shutdown).await });

	info!("Swap executor started");

	setup_shutdown_signal().await;

	info!("Shutdown signal received, stopping services...");
	let _ = shutdown_tx.send(());
	let _ = scheduler_handle.await;

	info!("Swap executor stopped");
	Ok(())
}

async fn validate_config(cli: Cli) -> Result<()> {
	info!("Validating configuration file: {:?}", cli.config);

	let config = ConfigLoader::new()
		.with_file(&cli.config)
		.load()
		.await
		.context("Failed to load configuration")?;

	info!("Configuration is valid");
	info!("Service name: {}", config.service.name);
	info!("RPC endpoint: {}", config.chain.rpc_url);
	info!("Entry point: {}", config.contracts.entry_point);
	info!("Session key manager: {}", config.contracts.session_key_manager);
	info!(
		"Fee rate: {}/{}",
		config.fees.rate, config.fees.precision
	);
	info!("Scheduler period: {}s", config.scheduler.period_secs);

	Ok(())
}

fn setup_tracing(log_level: &str) -> Result<()> {
	let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
		.unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level));

	tracing_subscriber::registry()
		.with(env_filter)
		.with(tracing_subscriber::fmt::layer())
		.init();

	Ok(())
}

async fn setup_shutdown_signal() {
	let ctrl_c = async {
		signal::ctrl_c()
			.await
			.expect("failed to install Ctrl+C handler");
	};

	#[cfg(unix)]
	let terminate = async {
		signal::unix::signal(signal::unix::SignalKind::terminate())
			.expect("failed to install signal handler")
			.recv()
			.await;
	};

	#[cfg(not(unix))]
	let terminate = std::future::pending::<()>();

	tokio::select! {
		_ = ctrl_c => {},
		_ = terminate => {},
	}
}
