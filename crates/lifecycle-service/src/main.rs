//! Main entry point for the order lifecycle service.
//!
//! Loads the configuration, builds the lifecycle engine with every
//! registered storage backend and notification transport, and runs the
//! engine alongside the HTTP API until interrupted.

use clap::Parser;
use lifecycle_config::Config;
use lifecycle_core::{BuilderError, LifecycleBuilder, LifecycleEngine, LifecycleFactories};
use std::path::PathBuf;
use std::sync::Arc;

mod apis;
mod server;

/// Command-line arguments for the lifecycle service.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
	/// Path to configuration file
	#[arg(short, long, env = "LIFECYCLE_CONFIG", default_value = "config/order-lifecycle.toml")]
	config: PathBuf,

	/// Log level (trace, debug, info, warn, error)
	#[arg(short, long, default_value = "info")]
	log_level: String,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
	let args = Args::parse();

	use tracing_subscriber::{fmt, EnvFilter};

	let env_filter =
		EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));

	fmt()
		.with_env_filter(env_filter)
		.with_thread_ids(true)
		.with_target(true)
		.init();

	tracing::info!("Started order lifecycle service");

	let config_path = args
		.config
		.to_str()
		.ok_or_else(|| format!("Config path is not valid UTF-8: {}", args.config.display()))?;
	let config = Config::from_file(config_path).await?;
	tracing::info!("Loaded configuration [{}]", config.service.id);

	let engine = Arc::new(build_engine(config.clone())?);

	match config.api.clone().filter(|api| api.enabled) {
		Some(api_config) => {
			let api_engine = Arc::clone(&engine);

			tokio::select! {
				result = engine.run() => {
					tracing::info!("Engine finished");
					result?;
				}
				result = server::start_server(api_config, api_engine) => {
					tracing::info!("API server finished");
					result?;
				}
			}
		},
		None => {
			tracing::info!("Starting engine only");
			engine.run().await?;
		},
	}

	tracing::info!("Stopped order lifecycle service");
	Ok(())
}

/// Builds the engine with every registered implementation available to the
/// configuration.
fn build_engine(config: Config) -> Result<LifecycleEngine, BuilderError> {
	let factories = LifecycleFactories {
		storage_factories: lifecycle_storage::get_all_implementations()
			.into_iter()
			.map(|(name, factory)| (name.to_string(), factory))
			.collect(),
		transport_factories: lifecycle_notify::get_all_implementations()
			.into_iter()
			.map(|(name, factory)| (name.to_string(), factory))
			.collect(),
	};

	LifecycleBuilder::new(config).build(factories)
}

#[cfg(test)]
mod tests {
	use super::*;

	#[tokio::test]
	async fn test_bundled_config_builds_engine() {
		let dir = tempfile::tempdir().unwrap();
		std::env::set_var("LIFECYCLE_DATA_DIR", dir.path().join("storage"));

		let path = concat!(env!("CARGO_MANIFEST_DIR"), "/config/order-lifecycle.toml");
		let config = Config::from_file(path).await.unwrap();
		let engine = build_engine(config).unwrap();

		assert_eq!(engine.config().service.id, "order-lifecycle");
		assert!(engine.config().api.as_ref().is_some_and(|api| api.enabled));

		std::env::remove_var("LIFECYCLE_DATA_DIR");
	}

	#[test]
	fn test_args_defaults() {
		let args = Args::parse_from(["order-lifecycle"]);
		assert_eq!(args.log_level, "info");
	}
}
