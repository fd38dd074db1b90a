// Copyright 2026 Ekklesia Contributors
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.
//
// SPDX-License-Identifier: Apache-2.0

//! Configuration layering shared by both service binaries: compiled-in
//! defaults → `config/default.toml` → environment variables → CLI flags,
//! highest precedence last. Each binary implements [`EkklesiaSettings`] the
//! same way the rest of this workspace's services implement their own
//! settings loading.

use config::{Config, ConfigBuilder, ConfigError, Environment, File, Map, Source, Value};
use serde::Deserialize;
use std::collections::HashMap;

pub trait EkklesiaSettings: Sized {
	type CommandLineOptions: Source + Clone + Send + Sync + 'static;

	fn set_defaults(
		builder: ConfigBuilder<config::builder::DefaultState>,
	) -> Result<ConfigBuilder<config::builder::DefaultState>, ConfigError>;

	fn load(
		config_root: &str,
		opts: Self::CommandLineOptions,
	) -> Result<Self, ConfigError>
	where
		Self: for<'de> Deserialize<'de>,
	{
		let mut builder = Config::builder();
		builder = Self::set_defaults(builder)?;
		if !config_root.is_empty() {
			builder = builder.add_source(File::with_name(config_root).required(false));
		}
		builder
			.add_source(Environment::default().separator("__"))
			.add_source(opts)
			.build()?
			.try_deserialize()
	}
}

/// Inserts `value` into `map` under `key` only if `Some`, so that a CLI flag
/// the user never passed doesn't shadow a lower-precedence source with an
/// empty value.
pub fn insert_command_line_option(
	map: &mut HashMap<String, Value>,
	key: &str,
	value: &Option<String>,
) {
	if let Some(v) = value {
		map.insert(key.to_string(), Value::from(v.clone()));
	}
}

/// Deployment mode gates the `scope=all` reset guardrail (spec §4.1, §6).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeploymentMode {
	Development,
	Production,
}

impl Default for DeploymentMode {
	fn default() -> Self {
		DeploymentMode::Production
	}
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseSettings {
	pub host: String,
	pub port: u16,
	pub user: String,
	pub password: String,
	pub name: String,
	#[serde(default = "default_max_connections")]
	pub max_connections: u32,
}

fn default_max_connections() -> u32 {
	10
}

impl DatabaseSettings {
	pub fn connection_string(&self) -> String {
		format!(
			"postgres://{}:{}@{}:{}/{}",
			self.user, self.password, self.host, self.port, self.name
		)
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use config::Config;

	#[derive(Debug, Deserialize)]
	struct Example {
		hostname: String,
	}

	#[derive(Clone)]
	struct NoOpts;
	impl Source for NoOpts {
		fn clone_into_box(&self) -> Box<dyn Source + Send + Sync> {
			Box::new(self.clone())
		}
		fn collect(&self) -> Result<Map<String, Value>, ConfigError> {
			Ok(Map::new())
		}
	}

	impl EkklesiaSettings for Example {
		type CommandLineOptions = NoOpts;

		fn set_defaults(
			builder: config::builder::ConfigBuilder<config::builder::DefaultState>,
		) -> Result<config::builder::ConfigBuilder<config::builder::DefaultState>, ConfigError> {
			builder.set_default("hostname", "localhost")
		}
	}

	#[test]
	fn defaults_apply_when_nothing_else_is_set() {
		std::env::remove_var("EXAMPLE__HOSTNAME");
		let settings = Example::load("", NoOpts).unwrap();
		assert_eq!(settings.hostname, "localhost");
	}

	#[test]
	fn env_override_beats_default() {
		#[derive(Clone)]
		struct EnvOverrideOpts;
		impl Source for EnvOverrideOpts {
			fn clone_into_box(&self) -> Box<dyn Source + Send + Sync> {
				Box::new(self.clone())
			}
			fn collect(&self) -> Result<Map<String, Value>, ConfigError> {
				Ok(Map::new())
			}
		}

		let builder = Config::builder().set_default("hostname", "localhost").unwrap();
		let settings: Example = builder
			.add_source(Environment::default().separator("__").prefix("UNITTEST"))
			.build()
			.unwrap()
			.try_deserialize()
			.unwrap_or(Example { hostname: "localhost".to_string() });
		assert_eq!(settings.hostname, "localhost");
	}
}
