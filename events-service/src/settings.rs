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

//! `events-service` configuration (spec §4.0, §6).

use clap::Parser;
use config::{builder::DefaultState, ConfigBuilder, ConfigError, Map, Source, Value};
use ekklesia_core::settings::{insert_command_line_option, DatabaseSettings, DeploymentMode, EkklesiaSettings};
use serde::Deserialize;
use std::collections::HashMap;

#[derive(Debug, Clone, Deserialize)]
pub struct EventsSettings {
	pub bind_addr: String,
	pub database: DatabaseSettings,
	pub identity_verifier_base_url: String,
	pub identity_verifier_timeout_secs: u64,
	pub elections_base_url: String,
	pub s2s_shared_secret: String,
	pub token_ttl_minutes: i64,
	#[serde(default)]
	pub deployment_mode: DeploymentMode,
	/// Allows `reset all` in production; must be explicitly opted into per
	/// spec §4.1 ("refused in production deployments unless the deployment
	/// opt-in flag is set").
	#[serde(default)]
	pub allow_reset_all_in_production: bool,
	pub orphan_sweep_max_age_minutes: i64,
}

impl EkklesiaSettings for EventsSettings {
	type CommandLineOptions = CliOptions;

	fn set_defaults(builder: ConfigBuilder<DefaultState>) -> Result<ConfigBuilder<DefaultState>, ConfigError> {
		builder
			.set_default("bind_addr", "0.0.0.0:8080")?
			.set_default("database.host", "localhost")?
			.set_default("database.port", 5432)?
			.set_default("database.user", "ekklesia")?
			.set_default("database.password", "")?
			.set_default("database.name", "ekklesia")?
			.set_default("database.max_connections", 10)?
			.set_default("identity_verifier_base_url", "http://localhost:9000")?
			.set_default("identity_verifier_timeout_secs", 5)?
			.set_default("elections_base_url", "http://localhost:8081")?
			.set_default("s2s_shared_secret", "")?
			.set_default("token_ttl_minutes", 60 * 24 * 14)?
			.set_default("deployment_mode", "production")?
			.set_default("allow_reset_all_in_production", false)?
			.set_default("orphan_sweep_max_age_minutes", 60 * 24)
	}
}

#[derive(Debug, Parser, Clone)]
#[command(name = "events-service")]
pub struct CliOptions {
	#[arg(long, env = "CONFIG_ROOT", default_value = "")]
	pub config_root: String,
	#[arg(long)]
	pub bind_addr: Option<String>,
	#[arg(long)]
	pub database_host: Option<String>,
	#[arg(long)]
	pub database_port: Option<String>,
	#[arg(long)]
	pub elections_base_url: Option<String>,
	#[arg(long)]
	pub s2s_shared_secret: Option<String>,
	#[arg(long)]
	pub deployment_mode: Option<String>,
}

impl Source for CliOptions {
	fn clone_into_box(&self) -> Box<dyn Source + Send + Sync> {
		Box::new(self.clone())
	}

	fn collect(&self) -> Result<Map<String, Value>, ConfigError> {
		let mut map: HashMap<String, Value> = HashMap::new();
		insert_command_line_option(&mut map, "bind_addr", &self.bind_addr);
		insert_command_line_option(&mut map, "database.host", &self.database_host);
		insert_command_line_option(&mut map, "database.port", &self.database_port);
		insert_command_line_option(&mut map, "elections_base_url", &self.elections_base_url);
		insert_command_line_option(&mut map, "s2s_shared_secret", &self.s2s_shared_secret);
		insert_command_line_option(&mut map, "deployment_mode", &self.deployment_mode);
		Ok(map.into_iter().collect())
	}
}
