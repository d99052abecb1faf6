//! Engine configuration loaded from TOML.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors that can occur when loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
	/// Error reading a configuration file.
	#[error("I/O error reading {path}: {error}")]
	Io {
		/// Path to the file that failed to read.
		path: PathBuf,
		/// The underlying I/O error.
		error: std::io::Error,
	},

	/// Error parsing TOML syntax or field types.
	#[error("TOML parse error: {0}")]
	Parse(#[from] toml::de::Error),

	/// A value parsed but is not usable.
	#[error("invalid configuration: {0}")]
	Invalid(String),
}

/// Tunables for the fixup engine. Every field has a default.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FixupConfig {
	/// Maximum number of model submissions per task before it fails.
	pub max_spin: u32,
	/// Delay before coalesced diff recomputation runs.
	pub idle_delay_ms: u64,
	/// Capacity of the speculative generation cache.
	pub prefetch_capacity: usize,
	/// Capacity of the live streaming session cache.
	pub session_capacity: usize,
	/// Accept applied tasks when their document is saved.
	pub accept_on_save: bool,
	/// Expand empty selections to the enclosing indentation block.
	pub expand_point_selection: bool,
	/// Message shown in place of raw network failures.
	pub network_error_message: String,
}

impl Default for FixupConfig {
	fn default() -> Self {
		Self {
			max_spin: 5,
			idle_delay_ms: 10,
			prefetch_capacity: 20,
			session_capacity: 20,
			accept_on_save: true,
			expand_point_selection: true,
			network_error_message: String::from("Request failed because of a network error. Check your connection and try again."),
		}
	}
}

impl FixupConfig {
	/// Reads and validates a config file.
	pub fn load(path: &Path) -> Result<Self, ConfigError> {
		let text = std::fs::read_to_string(path).map_err(|error| ConfigError::Io {
			path: path.to_path_buf(),
			error,
		})?;
		Self::from_toml_str(&text)
	}

	/// Parses and validates config text.
	pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
		let config: Self = toml::from_str(text)?;
		config.validate()?;
		Ok(config)
	}

	pub fn validate(&self) -> Result<(), ConfigError> {
		if self.max_spin == 0 {
			return Err(ConfigError::Invalid("max_spin must be at least 1".into()));
		}
		if self.prefetch_capacity == 0 || self.session_capacity == 0 {
			return Err(ConfigError::Invalid("cache capacities must be at least 1".into()));
		}
		Ok(())
	}

	pub fn idle_delay(&self) -> Duration {
		Duration::from_millis(self.idle_delay_ms)
	}
}
