use clap::Parser;
use reveal_core::RuntimeConfig;
use serde::{Deserialize, Serialize};

/// Mirrors the `DepositTrackerSettings`/`TrackerOptions` split: a serde
/// struct the `config` crate populates from file + environment, overlaid by
/// a `clap::Parser` struct whose `Some` fields win over both.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RevealServerSettings {
	pub redis_url: String,
	pub bind_address: String,
	pub metrics_port: u16,
	pub base_url: String,
	pub cors_allowed_origins: Vec<String>,
	pub archive_path: String,
	pub broadcast_interval_ms: u64,
	pub chat_max_messages: usize,
	pub chat_max_length: usize,
	pub name_max_length: usize,
	pub ttl_session_hours: i64,
	pub ttl_post_reveal_hours: i64,
}

impl Default for RevealServerSettings {
	fn default() -> Self {
		Self {
			redis_url: "redis://127.0.0.1:6379".to_string(),
			bind_address: "0.0.0.0:8000".to_string(),
			metrics_port: 9090,
			base_url: "http://localhost:8000".to_string(),
			cors_allowed_origins: vec![],
			archive_path: "reveal-archive.jsonl".to_string(),
			broadcast_interval_ms: 500,
			chat_max_messages: 500,
			chat_max_length: 280,
			name_max_length: 50,
			ttl_session_hours: 24,
			ttl_post_reveal_hours: 1,
		}
	}
}

impl RevealServerSettings {
	pub fn runtime_config(&self) -> RuntimeConfig {
		RuntimeConfig {
			broadcast_interval_ms: self.broadcast_interval_ms,
			chat_max_messages: self.chat_max_messages,
			chat_max_length: self.chat_max_length,
			name_max_length: self.name_max_length,
			ttl_session_hours: self.ttl_session_hours,
			ttl_post_reveal_hours: self.ttl_post_reveal_hours,
			..RuntimeConfig::default()
		}
	}
}

/// Command-line overlay. Every field is optional so absence means "defer to
/// the file/environment layer"; only `Some` values are applied.
#[derive(Debug, Parser, Default)]
#[command(name = "reveal-server", about = "Reveal session fan-out server")]
pub struct CommandLineOptions {
	#[arg(long, env = "REVEAL_REDIS_URL")]
	pub redis_url: Option<String>,

	#[arg(long, env = "REVEAL_BIND_ADDRESS")]
	pub bind_address: Option<String>,

	#[arg(long, env = "REVEAL_METRICS_PORT")]
	pub metrics_port: Option<u16>,

	#[arg(long, env = "REVEAL_BASE_URL")]
	pub base_url: Option<String>,

	#[arg(long, env = "REVEAL_CORS_ALLOWED_ORIGINS", value_delimiter = ',')]
	pub cors_allowed_origins: Option<Vec<String>>,

	#[arg(long, env = "REVEAL_ARCHIVE_PATH")]
	pub archive_path: Option<String>,

	#[arg(long, value_name = "FILE")]
	pub config_file: Option<String>,
}

impl config::Source for CommandLineOptions {
	fn clone_into_box(&self) -> Box<dyn config::Source + Send + Sync> {
		Box::new(CommandLineOptions {
			redis_url: self.redis_url.clone(),
			bind_address: self.bind_address.clone(),
			metrics_port: self.metrics_port,
			base_url: self.base_url.clone(),
			cors_allowed_origins: self.cors_allowed_origins.clone(),
			archive_path: self.archive_path.clone(),
			config_file: self.config_file.clone(),
		})
	}

	fn collect(&self) -> Result<config::Map<String, config::Value>, config::ConfigError> {
		let mut map = config::Map::new();
		let origin = "command line".to_string();
		macro_rules! insert {
			($key:literal, $field:expr) => {
				if let Some(value) = &$field {
					map.insert($key.to_string(), config::Value::new(Some(&origin), value.clone()));
				}
			};
		}
		insert!("redis_url", self.redis_url);
		insert!("bind_address", self.bind_address);
		insert!("base_url", self.base_url);
		insert!("archive_path", self.archive_path);
		if let Some(port) = self.metrics_port {
			map.insert("metrics_port".to_string(), config::Value::new(Some(&origin), port as i64));
		}
		if let Some(origins) = &self.cors_allowed_origins {
			let values: Vec<config::Value> = origins.iter().map(|o| config::Value::new(Some(&origin), o.clone())).collect();
			map.insert("cors_allowed_origins".to_string(), config::Value::new(Some(&origin), values));
		}
		Ok(map)
	}
}

/// Layering order, lowest to highest precedence: built-in defaults (serde
/// `#[serde(default)]`), an optional config file, `REVEAL__`-prefixed
/// environment variables, then command-line flags.
pub fn load(cli: CommandLineOptions) -> anyhow::Result<RevealServerSettings> {
	let mut builder = config::Config::builder().add_source(config::Config::try_from(&RevealServerSettings::default())?);

	if let Some(path) = &cli.config_file {
		builder = builder.add_source(config::File::with_name(path));
	}

	builder = builder.add_source(config::Environment::default().prefix("REVEAL").separator("__"));
	builder = builder.add_source(cli);

	let settings = builder.build()?.try_deserialize()?;
	Ok(settings)
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn defaults_round_trip_into_runtime_config() {
		let settings = RevealServerSettings::default();
		let config = settings.runtime_config();
		assert_eq!(config.broadcast_interval_ms, 500);
		assert_eq!(config.chat_max_length, 280);
	}

	#[test]
	fn command_line_overlay_only_sets_provided_fields() {
		let cli = CommandLineOptions { redis_url: Some("redis://override:6379".to_string()), ..Default::default() };
		let map = config::Source::collect(&cli).unwrap();
		assert!(map.contains_key("redis_url"));
		assert!(!map.contains_key("bind_address"));
	}
}
